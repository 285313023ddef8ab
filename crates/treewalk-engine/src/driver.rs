//! Outer Driver: the single entry point a kernel calls to run one walk,
//! wiring the Queue Builder, Top-tree Runner, Exchange, Primary/Secondary
//! Runners, and result reduction together.

use std::time::Instant;

use tracing::{debug, info};

use treewalk_core::{
    assert_payload_size_aligned, ParticleIndex, ParticleTable, ReduceMode, Tree, TreeWalkError,
    Visitor,
};
use treewalk_core::Result;

use crate::context::EngineContext;
use crate::exchange::{exchange_exports, exchange_results};
use crate::phase::primary::PrimaryOutcome;
use crate::phase::{run_primary, run_secondary, run_top_tree};
use crate::queue::build_work_set;
use crate::transport::Transport;

/// Declares the shape of one walk: whether it's symmetric (requires a
/// valid `hmax` cache) and whether it produces exports at all (a
/// single-rank run with no peers can skip the Top-tree/Exchange phases
/// entirely).
#[derive(Debug, Clone, Copy)]
pub struct WalkDescriptor {
    pub symmetric: bool,
}

impl WalkDescriptor {
    pub fn new(symmetric: bool) -> Self {
        Self { symmetric }
    }
}

/// Runs one complete walk: Top-tree pass, Exchange, Primary pass,
/// Secondary pass, result Exchange, and ghost reduction.
///
/// Returns, for every particle in `work`, the visitor's locally-reduced
/// state is available by the time this returns (reduction happens as a
/// side effect through `Visitor::reduce`); the function itself returns
/// nothing because the result lives wherever the kernel's `reduce`
/// implementation chose to store it (typically back into the particle
/// table via interior mutability, mirroring `set_hsml`).
pub fn run<T, P, V>(
    ctx: &EngineContext,
    transport: &dyn Transport,
    tree: &T,
    particles: &P,
    visitor: &V,
    descriptor: WalkDescriptor,
) -> Result<()>
where
    T: Tree,
    P: ParticleTable,
    V: Visitor,
{
    assert_payload_size_aligned::<V::Query>("query")?;
    assert_payload_size_aligned::<V::Result>("result")?;

    if descriptor.symmetric && !tree.hmax_valid() {
        return Err(TreeWalkError::Configuration(
            "symmetric walk requested but the tree's hmax cache is not valid".to_string(),
        ));
    }

    let walk_started = Instant::now();
    info!(
        event = "walk_start",
        rank = ctx.rank().0,
        world_size = transport.world_size(),
        symmetric = descriptor.symmetric,
    );

    for i in ParticleIndex(0).as_usize()..tree.num_particles() {
        visitor.preprocess(ParticleIndex(i as u32));
    }

    let work = build_work_set(particles, tree, visitor);
    debug!(particles = work.len(), "queue builder: work set assembled");

    let world_size = transport.world_size();
    let mut origins_by_rank: Vec<Vec<ParticleIndex>> = (0..world_size).map(|_| Vec::new()).collect();

    let (imported, primary): (Vec<_>, Vec<PrimaryOutcome<V::Result>>) = if world_size > 1 {
        info!(event = "phase_start", phase = "top_tree");
        let top_tree_started = Instant::now();
        let outputs = run_top_tree(ctx, tree, particles, visitor, &work);
        let mut redo: Vec<ParticleIndex> = outputs.iter().flat_map(|o| o.redo.clone()).collect();
        let mut exports = Vec::new();
        for output in outputs {
            exports.extend(output.region.records().iter().cloned());
        }

        // Retry any particle whose per-thread export region filled up,
        // each time with a fresh empty region, until every worker drains
        // cleanly. The Top-tree pass is idempotent per particle (it only
        // enumerates, never mutates), so re-running it on the shrinking
        // `redo` set is safe.
        while !redo.is_empty() {
            debug!(remaining = redo.len(), "top-tree runner: retrying full export regions");
            let outputs = run_top_tree(ctx, tree, particles, visitor, &redo);
            redo = outputs.iter().flat_map(|o| o.redo.clone()).collect();
            for output in outputs {
                exports.extend(output.region.records().iter().cloned());
            }
        }

        debug!(exports = exports.len(), "top-tree runner: complete");

        // `exchange_exports` buckets by `target_rank` in the same
        // encounter order used below; recording origins here, in lock
        // step, lets the result exchange route a returned result back to
        // its particle without a side channel.
        for record in &exports {
            origins_by_rank[record.target_rank.0 as usize].push(record.origin);
        }
        info!(
            event = "phase_end",
            phase = "top_tree",
            duration_ms = top_tree_started.elapsed().as_millis() as u64,
            exports = exports.len() as u64,
        );

        // The export exchange only waits on peers; it touches neither the
        // local tree nor the particle table, so it overlaps with the
        // Primary pass instead of blocking it. A second scoped thread runs
        // the (blocking) `Transport` alltoall/alltoallv calls while this
        // thread runs Primary directly; both join before Secondary, which
        // is the earliest point that genuinely needs the imported queries.
        info!(event = "phase_start", phase = "exchange");
        info!(event = "phase_start", phase = "primary");
        let exchange_started = Instant::now();
        let primary_started = Instant::now();
        let payload_len = std::mem::size_of::<V::Query>();

        let (imported_result, primary) = std::thread::scope(|scope| {
            let exchange_handle = scope.spawn(move || {
                exchange_exports(
                    transport,
                    exports,
                    |q| encode_payload(q),
                    |bytes| decode_payload(bytes),
                    payload_len,
                )
            });
            let primary = run_primary(ctx, tree, particles, visitor, &work, descriptor.symmetric);
            let imported_result = exchange_handle.join().unwrap();
            (imported_result, primary)
        });
        let imported = imported_result?;

        info!(
            event = "phase_end",
            phase = "exchange",
            duration_ms = exchange_started.elapsed().as_millis() as u64,
            imported = imported.len(),
        );
        info!(
            event = "phase_end",
            phase = "primary",
            duration_ms = primary_started.elapsed().as_millis() as u64,
            results = primary.len(),
        );
        debug!(results = primary.len(), "primary runner: complete");

        (imported, primary)
    } else {
        info!(event = "phase_start", phase = "primary");
        let primary_started = Instant::now();
        let primary = run_primary(ctx, tree, particles, visitor, &work, descriptor.symmetric);
        info!(
            event = "phase_end",
            phase = "primary",
            duration_ms = primary_started.elapsed().as_millis() as u64,
            results = primary.len(),
        );
        debug!(results = primary.len(), "primary runner: complete");
        (Vec::new(), primary)
    };

    if world_size > 1 && !imported.is_empty() {
        info!(event = "phase_start", phase = "secondary");
        let secondary_started = Instant::now();
        let secondary = run_secondary(ctx, tree, particles, visitor, &imported, descriptor.symmetric);
        info!(
            event = "phase_end",
            phase = "secondary",
            duration_ms = secondary_started.elapsed().as_millis() as u64,
            results = secondary.len(),
        );
        debug!(results = secondary.len(), "secondary runner: complete");

        let mut by_destination: Vec<Vec<V::Result>> = (0..world_size).map(|_| Vec::new()).collect();
        for outcome in secondary {
            by_destination[outcome.destination_rank as usize].push(outcome.result);
        }

        let payload_len = std::mem::size_of::<V::Result>();
        let by_source = exchange_results(
            transport,
            by_destination,
            |r| encode_payload(r),
            |bytes| decode_payload(bytes),
            payload_len,
        )?;

        let mut local = V::Local::default();
        for (peer, results) in by_source.into_iter().enumerate() {
            let origins = &origins_by_rank[peer];
            debug_assert_eq!(
                origins.len(),
                results.len(),
                "result exchange returned a different count than was exported to rank {peer}"
            );
            for (origin, result) in origins.iter().zip(results.iter()) {
                visitor.reduce(*origin, result, ReduceMode::Ghosts, &mut local);
            }
        }
    }

    for i in ParticleIndex(0).as_usize()..tree.num_particles() {
        visitor.postprocess(ParticleIndex(i as u32));
    }

    let snapshot = ctx.counters().snapshot();
    info!(
        event = "walk_end",
        duration_ms = walk_started.elapsed().as_millis() as u64,
        particles_visited = snapshot.particles_visited,
        interactions = snapshot.interactions,
        exports = snapshot.exports,
        imports = snapshot.imports,
        nodes_culled = snapshot.nodes_culled,
    );

    Ok(())
}

fn encode_payload<T: Copy>(value: &T) -> Vec<u8> {
    let size = std::mem::size_of::<T>();
    let mut buf = vec![0u8; size];
    // SAFETY: `T` has been validated by `assert_payload_size_aligned` to
    // be a plain, 8-byte-aligned POD-shaped payload before any call here;
    // this mirrors the source protocol's raw `memcpy` of a query/result
    // struct into the MPI send buffer.
    unsafe {
        std::ptr::copy_nonoverlapping(value as *const T as *const u8, buf.as_mut_ptr(), size);
    }
    buf
}

fn decode_payload<T: Copy>(bytes: &[u8]) -> T {
    debug_assert_eq!(bytes.len(), std::mem::size_of::<T>());
    // SAFETY: see `encode_payload`; the buffer was produced by encoding a
    // `T` and is exactly `size_of::<T>()` bytes.
    unsafe { std::ptr::read_unaligned(bytes.as_ptr() as *const T) }
}
