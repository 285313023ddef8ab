//! Primary Runner: computes each local particle's purely-local result by
//! walking the caller's own sub-domain.
//!
//! Work is split into contiguous chunks across threads (unlike the
//! Top-tree Runner's fetch-add scheduler) since a local walk's cost is far
//! more uniform across particles than a top-tree export enumeration's is.

use treewalk_core::{ParticleIndex, ParticleTable, QueryPayload, ReduceMode, Tree, Visitor, WalkMode};

use crate::context::EngineContext;
use crate::dispatch::ngbiter_walk;
use crate::stats::WalkCounters;

/// One particle's locally-computed result, paired with its origin so the
/// caller can reduce it (and later merge in any ghost-returned results).
pub struct PrimaryOutcome<R> {
    pub origin: ParticleIndex,
    pub result: R,
}

/// Runs the Primary pass over `work`, returning one result per particle.
///
/// Each worker thread gets its own `Local` scratch instance and calls
/// `visitor.reduce(..., ReduceMode::Primary, ...)` as soon as its result is
/// ready, mirroring the source engine's single-pass local reduce.
pub fn run_primary<T, P, V>(
    ctx: &EngineContext,
    tree: &T,
    particles: &P,
    visitor: &V,
    work: &[ParticleIndex],
    symmetric: bool,
) -> Vec<PrimaryOutcome<V::Result>>
where
    T: Tree,
    P: ParticleTable,
    V: Visitor,
{
    let thread_count = ctx.thread_count().max(1);
    let chunk_size = work.len().div_ceil(thread_count).max(1);

    let counters = ctx.counters();
    let outcomes = std::thread::scope(|scope| {
        let mut handles = Vec::new();
        for chunk in work.chunks(chunk_size) {
            handles.push(scope.spawn(move || run_chunk(tree, particles, visitor, chunk, symmetric, counters)));
        }
        handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect::<Vec<_>>()
    });

    ctx.counters().add_particles_visited(outcomes.len() as u64);
    outcomes
}

fn run_chunk<T, P, V>(
    tree: &T,
    particles: &P,
    visitor: &V,
    chunk: &[ParticleIndex],
    symmetric: bool,
    counters: &WalkCounters,
) -> Vec<PrimaryOutcome<V::Result>>
where
    T: Tree,
    P: ParticleTable,
    V: Visitor,
{
    let mut local = V::Local::default();
    let mut out = Vec::with_capacity(chunk.len());
    for &particle in chunk {
        let pos = particles.position(particle);
        let mut query = V::Query::new(pos, [None, None]);
        visitor.fill(particle, &mut query);

        let result = ngbiter_walk(
            tree,
            particles,
            visitor,
            [tree.first_node()],
            &query,
            symmetric,
            WalkMode::Primary,
            &mut local,
            counters,
        );
        visitor.reduce(particle, &result, ReduceMode::Primary, &mut local);
        out.push(PrimaryOutcome {
            origin: particle,
            result,
        });
    }
    out
}
