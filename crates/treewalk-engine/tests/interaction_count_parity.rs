//! Cross-checks the Primary Runner's reported interaction count, and the
//! per-particle neighbour count it actually computes, against a brute-force
//! O(n^2) reference over the same particle set.

use std::sync::atomic::{AtomicU32, Ordering};

use treewalk_config::EngineConfig;
use treewalk_core::{NgbIterState, ParticleIndex, ParticleTable, ReduceMode, Visitor};
use treewalk_core::Rank;
use treewalk_engine::{run, EngineContext, LoopbackTransport, WalkDescriptor};
use treewalk_test::fixtures::{brute_force_neighbour_count, FlatParticleTable, SingleLeafTree, TestQuery, TestResult};

/// Counts neighbours within a fixed radius and, via `reduce`, writes each
/// particle's tally into a shared slot so the test can compare it against
/// the brute-force reference after the walk completes.
struct NeighbourCountingVisitor {
    hsml: f64,
    tallies: Vec<AtomicU32>,
}

impl Visitor for NeighbourCountingVisitor {
    type Query = TestQuery;
    type Result = TestResult;
    type Local = ();

    fn haswork(&self, _index: ParticleIndex) -> bool {
        true
    }

    fn fill(&self, _index: ParticleIndex, _query: &mut Self::Query) {}

    fn ngbiter(
        &self,
        _query: &Self::Query,
        result: &mut Self::Result,
        iter: &mut NgbIterState,
        _local: &mut Self::Local,
    ) {
        if iter.other < 0 {
            iter.hsml = self.hsml;
            return;
        }
        result.neighbour_count += 1;
    }

    fn reduce(
        &self,
        index: ParticleIndex,
        result: &Self::Result,
        _mode: ReduceMode,
        _local: &mut Self::Local,
    ) {
        self.tallies[index.as_usize()].fetch_add(result.neighbour_count, Ordering::Relaxed);
    }
}

#[test]
fn primary_walk_matches_brute_force_neighbour_counts() {
    let positions = vec![
        [0.0, 0.0, 0.0],
        [0.05, 0.0, 0.0],
        [0.0, 0.05, 0.0],
        [5.0, 5.0, 5.0],
        [0.02, 0.02, 0.0],
    ];
    let n = positions.len();
    let hsml = 0.1;
    let particles = FlatParticleTable::new(positions).with_hsml(hsml);
    let tree = SingleLeafTree::new(n);

    let visitor = NeighbourCountingVisitor {
        hsml,
        tallies: (0..n).map(|_| AtomicU32::new(0)).collect(),
    };

    let config = EngineConfig::default();
    let ctx = EngineContext::new(config, Rank(0), 1);
    let transport = LoopbackTransport;
    run(
        &ctx,
        &transport,
        &tree,
        &particles,
        &visitor,
        WalkDescriptor::new(false),
    )
    .unwrap();

    for i in 0..n {
        let expected = brute_force_neighbour_count(&particles, ParticleIndex(i as u32), hsml);
        let actual = visitor.tallies[i].load(Ordering::Relaxed);
        assert_eq!(actual, expected, "particle {i} neighbour count mismatch");
    }

    let snapshot = ctx.counters().snapshot();
    let total_expected: u64 = (0..n)
        .map(|i| brute_force_neighbour_count(&particles, ParticleIndex(i as u32), hsml) as u64)
        .sum();
    assert_eq!(snapshot.interactions, total_expected);
}
