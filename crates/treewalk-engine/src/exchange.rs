//! Exchange: moves queued exports to their destination ranks and brings
//! results back, via three sub-phases: export counts, export payloads,
//! result payloads.

use treewalk_core::{QueryPayload, Rank, Result, ResultPayload, TreeWalkError};

use crate::export::ExportRecord;
use crate::transport::Transport;

/// A query imported from a peer rank, ready for the Secondary Runner's
/// ghost walk.
pub struct ImportedQuery<Q> {
    pub source_rank: Rank,
    pub query: Q,
}

/// Runs the export phase: serializes every queued export, exchanges
/// counts, then payloads, and returns what arrived for this rank to walk.
///
/// Results are serialized with a fixed-size little-endian encoding derived
/// from the payload's `Clone + Default` bound rather than a general
/// serializer, since [`treewalk_core::assert_payload_size_aligned`] has
/// already guaranteed a stable, 8-byte-aligned in-memory layout.
pub fn exchange_exports<Q: QueryPayload>(
    transport: &dyn Transport,
    exports: Vec<ExportRecord<Q>>,
    encode: impl Fn(&Q) -> Vec<u8>,
    decode: impl Fn(&[u8]) -> Q,
    payload_len: usize,
) -> Result<Vec<ImportedQuery<Q>>> {
    let world_size = transport.world_size();
    let mut by_rank: Vec<Vec<ExportRecord<Q>>> = (0..world_size).map(|_| Vec::new()).collect();
    for record in exports {
        let rank = record.target_rank.0 as usize;
        if rank >= world_size {
            return Err(TreeWalkError::Protocol(format!(
                "export targets rank {rank}, but world size is {world_size}"
            )));
        }
        by_rank[rank].push(record);
    }

    let send_counts: Vec<usize> = by_rank.iter().map(|records| records.len()).collect();
    let recv_counts = transport.alltoall_counts(&send_counts)?;

    let send_bytes: Vec<Vec<u8>> = by_rank
        .iter()
        .map(|records| {
            let mut buf = Vec::with_capacity(records.len() * payload_len);
            for record in records {
                buf.extend(encode(&record.query));
            }
            buf
        })
        .collect();
    let recv_byte_counts: Vec<usize> = recv_counts.iter().map(|&n| n * payload_len).collect();

    let recv_bytes = transport.alltoallv_bytes(&send_bytes, &recv_byte_counts)?;

    let mut imported = Vec::new();
    for (peer, buf) in recv_bytes.into_iter().enumerate() {
        let count = recv_counts[peer];
        for i in 0..count {
            let chunk = &buf[i * payload_len..(i + 1) * payload_len];
            imported.push(ImportedQuery {
                source_rank: Rank(peer as i32),
                query: decode(chunk),
            });
        }
    }

    Ok(imported)
}

/// Runs the result phase: the inverse exchange, sending each rank's
/// computed results for the queries it imported back to their origin.
pub fn exchange_results<R: ResultPayload>(
    transport: &dyn Transport,
    results_by_destination: Vec<Vec<R>>,
    encode: impl Fn(&R) -> Vec<u8>,
    decode: impl Fn(&[u8]) -> R,
    payload_len: usize,
) -> Result<Vec<Vec<R>>> {
    let world_size = transport.world_size();
    if results_by_destination.len() != world_size {
        return Err(TreeWalkError::Protocol(format!(
            "result exchange expected {world_size} destination buckets, got {}",
            results_by_destination.len()
        )));
    }

    let send_counts: Vec<usize> = results_by_destination.iter().map(|r| r.len()).collect();
    let recv_counts = transport.alltoall_counts(&send_counts)?;

    let send_bytes: Vec<Vec<u8>> = results_by_destination
        .iter()
        .map(|results| {
            let mut buf = Vec::with_capacity(results.len() * payload_len);
            for result in results {
                buf.extend(encode(result));
            }
            buf
        })
        .collect();
    let recv_byte_counts: Vec<usize> = recv_counts.iter().map(|&n| n * payload_len).collect();

    let recv_bytes = transport.alltoallv_bytes(&send_bytes, &recv_byte_counts)?;

    let mut by_source = Vec::with_capacity(world_size);
    for (peer, buf) in recv_bytes.into_iter().enumerate() {
        let count = recv_counts[peer];
        let mut results = Vec::with_capacity(count);
        for i in 0..count {
            let chunk = &buf[i * payload_len..(i + 1) * payload_len];
            results.push(decode(chunk));
        }
        by_source.push(results);
    }
    Ok(by_source)
}
