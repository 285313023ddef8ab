//! Queue Builder: assembles the initial work set of local particle indices
//! a phase runner will walk.
//!
//! Candidates are drawn from `0..tree.num_particles()`, filtered by
//! garbage status and the visitor's `haswork`. The result is a plain
//! `Vec<ParticleIndex>`; phase runners then partition ranges of it across
//! worker threads.

use treewalk_core::{ParticleIndex, ParticleTable, Tree, Visitor};

/// Builds the work set for one walk: every non-garbage particle the
/// visitor reports as needing this kernel's computation.
pub fn build_work_set<P, T, V>(particles: &P, tree: &T, visitor: &V) -> Vec<ParticleIndex>
where
    P: ParticleTable,
    T: Tree,
    V: Visitor,
{
    let n = tree.num_particles();
    let mut work = Vec::with_capacity(n);
    for raw in 0..n {
        let index = ParticleIndex(raw as u32);
        if particles.is_garbage(index) {
            continue;
        }
        if !visitor.haswork(index) {
            continue;
        }
        work.push(index);
    }
    work
}

#[cfg(test)]
mod tests {
    use super::*;
    use treewalk_test::fixtures::{FlatParticleTable, SingleLeafTree};

    struct EvenOnly;

    impl Visitor for EvenOnly {
        type Query = treewalk_test::fixtures::TestQuery;
        type Result = treewalk_test::fixtures::TestResult;
        type Local = ();

        fn haswork(&self, i: ParticleIndex) -> bool {
            i.0 % 2 == 0
        }

        fn fill(&self, _i: ParticleIndex, _query: &mut Self::Query) {}

        fn ngbiter(
            &self,
            _query: &Self::Query,
            _result: &mut Self::Result,
            _iter: &mut treewalk_core::NgbIterState,
            _local: &mut Self::Local,
        ) {
        }

        fn reduce(
            &self,
            _i: ParticleIndex,
            _result: &Self::Result,
            _mode: treewalk_core::ReduceMode,
            _local: &mut Self::Local,
        ) {
        }
    }

    #[test]
    fn skips_garbage_and_haswork_rejects() {
        let positions = vec![[0.0; 3]; 6];
        let mut particles = FlatParticleTable::new(positions);
        particles.set_garbage(3, true);
        let tree = SingleLeafTree::new(6);

        let work = build_work_set(&particles, &tree, &EvenOnly);
        assert_eq!(
            work,
            vec![
                ParticleIndex(0),
                ParticleIndex(2),
                ParticleIndex(4),
            ]
        );
    }
}
