//! Secondary Runner: computes results for queries imported from peer
//! ranks (the Ghosts walk mode) and, once exchanged back, reduces any
//! per-rank results into the originating local particle.

use treewalk_core::{ParticleTable, Tree, Visitor, WalkMode};

use crate::context::EngineContext;
use crate::dispatch::ngbiter_walk;
use crate::exchange::ImportedQuery;
use crate::stats::WalkCounters;

/// A computed result paired with the rank that should receive it.
pub struct SecondaryOutcome<R> {
    pub destination_rank: i32,
    pub result: R,
}

/// Runs the Ghosts walk over every query imported from peers, entering
/// each one at the remote entry node recorded in its `node_list` rather
/// than `tree.first_node()` — the peer already narrowed the search to the
/// sub-domain the query's sphere overlaps.
pub fn run_secondary<T, P, V>(
    ctx: &EngineContext,
    tree: &T,
    particles: &P,
    visitor: &V,
    imported: &[ImportedQuery<V::Query>],
    symmetric: bool,
) -> Vec<SecondaryOutcome<V::Result>>
where
    T: Tree,
    P: ParticleTable,
    V: Visitor,
{
    let thread_count = ctx.thread_count().max(1);
    let chunk_size = imported.len().div_ceil(thread_count).max(1);

    let counters = ctx.counters();
    let outcomes = std::thread::scope(|scope| {
        let mut handles = Vec::new();
        for chunk in imported.chunks(chunk_size) {
            handles.push(scope.spawn(move || run_chunk(tree, particles, visitor, chunk, symmetric, counters)));
        }
        handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect::<Vec<_>>()
    });

    ctx.counters().add_imports(outcomes.len() as u64);
    outcomes
}

fn run_chunk<T, P, V>(
    tree: &T,
    particles: &P,
    visitor: &V,
    chunk: &[ImportedQuery<V::Query>],
    symmetric: bool,
    counters: &WalkCounters,
) -> Vec<SecondaryOutcome<V::Result>>
where
    T: Tree,
    P: ParticleTable,
    V: Visitor,
{
    let mut local = V::Local::default();
    let mut out = Vec::with_capacity(chunk.len());
    for imported in chunk {
        let roots = imported.query.node_list().into_iter().flatten();
        let result = ngbiter_walk(
            tree,
            particles,
            visitor,
            roots,
            &imported.query,
            symmetric,
            WalkMode::Ghosts,
            &mut local,
            counters,
        );
        out.push(SecondaryOutcome {
            destination_rank: imported.source_rank.0,
            result,
        });
    }
    out
}
