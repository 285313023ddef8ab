//! Export Table: the per-thread buffer of queries destined for remote
//! ranks, built during the Top-tree Runner and drained by the Exchange.
//!
//! Each worker thread owns a disjoint region of the table (sized by
//! `EngineConfig::bunch_size`), so `export_particle` never takes a lock.
//! When a region fills, the call returns `Err(ExportFull)` rather than
//! blocking or growing — a transient, recoverable condition the Top-tree
//! Runner handles by requeuing the particle for this worker's next pass,
//! not a `TreeWalkError`.

use treewalk_core::{NodeId, ParticleIndex, QueryPayload, Rank};

/// One query queued for export to a remote rank.
#[derive(Debug, Clone)]
pub struct ExportRecord<Q> {
    /// The originating local particle, so the Secondary Runner's reduce
    /// pass can route the eventual result back.
    pub origin: ParticleIndex,
    pub target_rank: Rank,
    /// Remote entry node the peer should start its ghost walk from.
    pub entry_node: NodeId,
    pub query: Q,
}

/// Coalescing key: queries for the same particle bound for the same rank
/// collapse into a single export with the entry node pointing at the
/// smaller of the two candidates' remote nodes, mirroring the source
/// protocol's behaviour for `NODE_LIST_LENGTH == 2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CoalesceKey {
    origin: ParticleIndex,
    target_rank: Rank,
}

/// A worker thread's disjoint slice of the export table.
pub struct ExportRegion<Q> {
    capacity: usize,
    records: Vec<ExportRecord<Q>>,
    /// Index within `records` of the last export for a given
    /// `(origin, target_rank)` pair, to implement the coalescing rule
    /// without a full rescan.
    last_index_for_key: std::collections::HashMap<CoalesceKey, usize>,
}

/// Returned by [`ExportRegion::export_particle`] when the region's
/// configured capacity has been reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportFull;

impl<Q> ExportRegion<Q> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            records: Vec::with_capacity(capacity),
            last_index_for_key: std::collections::HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn records(&self) -> &[ExportRecord<Q>] {
        &self.records
    }

    pub fn drain(&mut self) -> Vec<ExportRecord<Q>> {
        self.last_index_for_key.clear();
        std::mem::take(&mut self.records)
    }

    /// Rolls the region back to `checkpoint` records, discarding everything
    /// written after it and forgetting any coalescing keys that pointed
    /// into the discarded tail.
    ///
    /// Used by the Top-tree Runner to unwind a particle's partial exports
    /// when it hits [`ExportFull`] partway through that particle's hit
    /// list, so the particle's next (retried) pass starts from a clean
    /// slate instead of leaving stray duplicate records behind.
    pub fn truncate(&mut self, checkpoint: usize) {
        self.records.truncate(checkpoint);
        self.last_index_for_key.retain(|_, idx| *idx < checkpoint);
    }
}

impl<Q: QueryPayload> ExportRegion<Q> {
    /// Queues a query for export, coalescing with an already-queued export
    /// for the same `(origin, target_rank)` pair by merging `node_list`
    /// slots (the node list has exactly [`treewalk_core::NODE_LIST_LENGTH`]
    /// slots, so a particle can reference at most two distinct remote
    /// entry nodes on a given rank without a second export record).
    pub fn export_particle(
        &mut self,
        origin: ParticleIndex,
        target_rank: Rank,
        entry_node: NodeId,
        query: Q,
    ) -> Result<(), ExportFull> {
        let key = CoalesceKey {
            origin,
            target_rank,
        };

        if let Some(&existing_idx) = self.last_index_for_key.get(&key) {
            let existing = &mut self.records[existing_idx];
            let mut node_list = existing.query.node_list();
            if let Some(slot) = node_list.iter_mut().find(|slot| slot.is_none()) {
                *slot = Some(entry_node);
                existing.query = Q::new(existing.query.position(), node_list);
                return Ok(());
            }
            // Both slots already occupied: the coalescing rule has no room
            // left, fall through and queue a fresh record.
        }

        if self.records.len() >= self.capacity {
            return Err(ExportFull);
        }

        let query = Q::new(query.position(), [Some(entry_node), None]);
        self.last_index_for_key.insert(key, self.records.len());
        self.records.push(ExportRecord {
            origin,
            target_rank,
            entry_node,
            query,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use treewalk_test::fixtures::TestQuery;

    #[test]
    fn export_fails_once_capacity_is_reached() {
        let mut region: ExportRegion<TestQuery> = ExportRegion::new(1);
        assert!(region
            .export_particle(ParticleIndex(0), Rank(1), NodeId(5), TestQuery::new([0.0; 3], [None, None]))
            .is_ok());
        let err = region.export_particle(
            ParticleIndex(1),
            Rank(1),
            NodeId(6),
            TestQuery::new([0.0; 3], [None, None]),
        );
        assert_eq!(err, Err(ExportFull));
    }

    #[test]
    fn coalesces_a_second_export_to_the_same_origin_and_rank() {
        let mut region: ExportRegion<TestQuery> = ExportRegion::new(8);
        region
            .export_particle(ParticleIndex(0), Rank(2), NodeId(10), TestQuery::new([1.0, 2.0, 3.0], [None, None]))
            .unwrap();
        region
            .export_particle(ParticleIndex(0), Rank(2), NodeId(11), TestQuery::new([1.0, 2.0, 3.0], [None, None]))
            .unwrap();

        assert_eq!(region.len(), 1);
        let record = &region.records()[0];
        assert_eq!(record.query.node_list(), [Some(NodeId(10)), Some(NodeId(11))]);
    }

    #[test]
    fn does_not_coalesce_across_different_target_ranks() {
        let mut region: ExportRegion<TestQuery> = ExportRegion::new(8);
        region
            .export_particle(ParticleIndex(0), Rank(1), NodeId(1), TestQuery::new([0.0; 3], [None, None]))
            .unwrap();
        region
            .export_particle(ParticleIndex(0), Rank(2), NodeId(2), TestQuery::new([0.0; 3], [None, None]))
            .unwrap();
        assert_eq!(region.len(), 2);
    }

    #[test]
    fn drain_empties_the_region_and_resets_coalescing_state() {
        let mut region: ExportRegion<TestQuery> = ExportRegion::new(8);
        region
            .export_particle(ParticleIndex(0), Rank(1), NodeId(1), TestQuery::new([0.0; 3], [None, None]))
            .unwrap();
        let drained = region.drain();
        assert_eq!(drained.len(), 1);
        assert!(region.is_empty());
    }
}
