//! Top-tree Runner: enumerates, for every local particle, which remote
//! sub-domains must be visited on its behalf, and queues the corresponding
//! exports.
//!
//! Work is handed out with a shared fetch-add cursor rather than a static
//! split, since the top-tree is shallow and replicated so per-particle
//! cost varies with how many remote sub-domains a query's sphere
//! overlaps — a static split would leave some threads idle while others
//! are still walking wide queries.

use std::sync::atomic::{AtomicUsize, Ordering};

use treewalk_core::{ParticleIndex, ParticleTable, QueryPayload, Tree, Visitor};

use crate::context::EngineContext;
use crate::dispatch::{enumerate_exports, seed_query_state};
use crate::export::{ExportFull, ExportRegion};

/// One thread's output from a Top-tree pass: its export region and any
/// particles it couldn't finish because the region filled up.
pub struct TopTreeThreadOutput<Q> {
    pub region: ExportRegion<Q>,
    pub redo: Vec<ParticleIndex>,
}

/// Runs the Top-tree pass over `work`, splitting it across
/// `ctx.thread_count()` worker threads via a shared fetch-add cursor.
///
/// Returns one [`TopTreeThreadOutput`] per thread. Callers merge the
/// regions' records before handing them to the Exchange, and retry `redo`
/// particles (with a fresh, empty region) until every thread reports no
/// redo work — the same alternating-pass shape as the adaptive hsml loop.
pub fn run_top_tree<T, P, V>(
    ctx: &EngineContext,
    tree: &T,
    particles: &P,
    visitor: &V,
    work: &[ParticleIndex],
) -> Vec<TopTreeThreadOutput<V::Query>>
where
    T: Tree,
    P: ParticleTable,
    V: Visitor,
{
    let thread_count = ctx.thread_count().max(1);
    let cursor = AtomicUsize::new(0);
    let bunch_size = ctx.config().bunch_size;

    std::thread::scope(|scope| {
        let mut handles = Vec::with_capacity(thread_count);
        for _ in 0..thread_count {
            let cursor = &cursor;
            handles.push(scope.spawn(move || {
                run_worker(ctx, tree, particles, visitor, work, cursor, bunch_size)
            }));
        }
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
}

fn run_worker<T, P, V>(
    ctx: &EngineContext,
    tree: &T,
    particles: &P,
    visitor: &V,
    work: &[ParticleIndex],
    cursor: &AtomicUsize,
    bunch_size: usize,
) -> TopTreeThreadOutput<V::Query>
where
    T: Tree,
    P: ParticleTable,
    V: Visitor,
{
    let mut region = ExportRegion::new(bunch_size);
    let mut redo = Vec::new();
    let mut local = V::Local::default();
    let mut exported_this_pass = 0u64;
    let mut opened_this_pass = 0u64;

    loop {
        let i = cursor.fetch_add(1, Ordering::Relaxed);
        if i >= work.len() {
            break;
        }
        let particle = work[i];
        if !region.is_empty() && region.len() >= region.capacity() {
            redo.push(particle);
            continue;
        }

        let pos = particles.position(particle);
        let query = V::Query::new(pos, [None, None]);
        let iter = seed_query_state(visitor, &query, &mut local);

        let hits = enumerate_exports(tree, pos, iter.hsml, 0.0);
        opened_this_pass += hits.len() as u64;

        // Remember where this particle's exports start so a mid-particle
        // `ExportFull` can be unwound cleanly: the particle is retried in
        // its entirety next pass, so any records it already wrote into
        // this region must not also survive alongside the retry's output.
        let checkpoint = region.len();
        let mut ran_out = false;
        let mut written_this_particle = 0u64;
        for node in hits {
            let (target_rank, entry_node) = tree.top_leaf_map().resolve(node);
            let query = V::Query::new(pos, [None, None]);
            match region.export_particle(particle, target_rank, entry_node, query) {
                Ok(()) => written_this_particle += 1,
                Err(ExportFull) => {
                    ran_out = true;
                    break;
                }
            }
        }
        if ran_out {
            region.truncate(checkpoint);
            redo.push(particle);
        } else {
            exported_this_pass += written_this_particle;
        }
    }

    ctx.counters().add_exports(exported_this_pass);
    ctx.counters().add_top_tree_nodes_opened(opened_this_pass);
    TopTreeThreadOutput { region, redo }
}

#[cfg(test)]
mod tests {
    use super::*;
    use treewalk_config::{EngineConfig, ThreadCount};
    use treewalk_core::{NgbIterState, NodeId, Rank, ReduceMode};
    use treewalk_test::fixtures::{FlatParticleTable, TestQuery, TestResult, TwoDomainTree};

    /// Seeds every query with a fixed search radius, so test cases control
    /// which pseudo-nodes open purely through node placement.
    struct FixedRadiusVisitor {
        hsml: f64,
    }

    impl Visitor for FixedRadiusVisitor {
        type Query = TestQuery;
        type Result = TestResult;
        type Local = ();

        fn haswork(&self, _i: ParticleIndex) -> bool {
            true
        }

        fn fill(&self, _i: ParticleIndex, _query: &mut Self::Query) {}

        fn ngbiter(
            &self,
            _query: &Self::Query,
            _result: &mut Self::Result,
            iter: &mut NgbIterState,
            _local: &mut Self::Local,
        ) {
            iter.hsml = self.hsml;
        }

        fn reduce(&self, _i: ParticleIndex, _result: &Self::Result, _mode: ReduceMode, _local: &mut Self::Local) {}
    }

    fn ctx_with_bunch_size(bunch_size: usize) -> EngineContext {
        let mut config = EngineConfig::default().with_bunch_size(bunch_size);
        config.thread_count = ThreadCount::Count(1);
        EngineContext::new(config, Rank(0), 2)
    }

    #[test]
    fn exports_one_record_per_pseudo_node_when_both_are_in_range() {
        let particles = FlatParticleTable::new(vec![[0.0; 3]; 1]);
        let tree = TwoDomainTree::new(1, Rank(1), NodeId(0), Rank(2), NodeId(0));
        let visitor = FixedRadiusVisitor { hsml: 1.0 };
        let ctx = ctx_with_bunch_size(8);
        let work = vec![ParticleIndex(0)];

        let outputs = run_top_tree(&ctx, &tree, &particles, &visitor, &work);
        assert_eq!(outputs.len(), 1);
        assert!(outputs[0].redo.is_empty());
        assert_eq!(outputs[0].region.records().len(), 2);
        let ranks: std::collections::HashSet<_> =
            outputs[0].region.records().iter().map(|r| r.target_rank).collect();
        assert_eq!(ranks.len(), 2, "expected one record per distinct target rank");
    }

    #[test]
    fn a_particle_that_overflows_mid_export_is_not_left_with_duplicate_records() {
        // Two pseudo-nodes on different ranks, so a single particle writes
        // two non-coalescing records. A region with room for exactly one
        // record forces `ExportFull` on the second export of the first
        // particle processed; the rollback must remove that particle's
        // first (already-written) record too, so the retried pass is the
        // only source of truth for it.
        let particles = FlatParticleTable::new(vec![[0.0; 3]; 1]);
        let tree = TwoDomainTree::new(1, Rank(1), NodeId(0), Rank(2), NodeId(0));
        let visitor = FixedRadiusVisitor { hsml: 1.0 };
        let ctx = ctx_with_bunch_size(1);
        let work = vec![ParticleIndex(0)];

        let mut outputs = run_top_tree(&ctx, &tree, &particles, &visitor, &work);
        assert_eq!(outputs.len(), 1);
        let first_pass = outputs.pop().unwrap();
        assert!(
            first_pass.region.records().is_empty(),
            "the overflowing particle's partial export must be rolled back, not left behind"
        );
        assert_eq!(first_pass.redo, vec![ParticleIndex(0)]);

        // Retry with room for both: the particle's full pair of exports
        // should appear exactly once each, not duplicated from the first
        // pass's rolled-back attempt.
        let ctx = ctx_with_bunch_size(8);
        let retried = run_top_tree(&ctx, &tree, &particles, &visitor, &first_pass.redo);
        assert_eq!(retried.len(), 1);
        assert!(retried[0].redo.is_empty());
        assert_eq!(retried[0].region.records().len(), 2);
    }
}
