//! The polymorphic visitor contract the engine drives.
//!
//! A concrete kernel (gravity, density, friends-of-friends, ...)
//! implements [`Visitor`] once; the engine is generic over it rather than
//! reaching for `Box<dyn Visitor>` in the hot path. `Local` is per-thread
//! scratch state the engine allocates one of per worker and threads
//! through every callback for that worker — thread extrema, accumulators,
//! whatever the kernel needs that must not be shared.

use super::particle::{ParticleIndex, TypeMask};
use super::payload::{QueryPayload, ResultPayload};

/// Which phase of the walk is currently invoking the visitor.
///
/// The three traversal states a walk passes through; the
/// Neighbour Finder and Visitor Dispatcher both branch on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkMode {
    /// Export-enumeration pass over the replicated top-tree.
    TopTree,
    /// Local compute pass over the caller's own sub-domain.
    Primary,
    /// Compute pass over queries imported from peer ranks.
    Ghosts,
}

/// Which side of a reduction a [`Visitor::reduce`] call represents.
///
/// `reduce` is called twice per exported particle: once locally (mode =
/// `Primary`) and once per distinct remote rank's returned result (mode =
/// `Ghosts`). A purely-local particle (no exports) is reduced only once,
/// with `Primary`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceMode {
    Primary,
    Ghosts,
}

/// Mutable per-candidate state threaded through repeated `ngbiter` calls.
///
/// The dispatcher calls `ngbiter` once with `other = -1` before any
/// candidate is examined, so the kernel can seed `hsml`, `mask`, and
/// `symmetric` from the query/local state; every subsequent call carries
/// one in-range candidate's index and periodic separation in `other`,
/// `r2`, `r`, and `dist`.
#[derive(Debug, Clone)]
pub struct NgbIterState {
    /// Search radius for this query. Seeded by the kernel on the `other =
    /// -1` call.
    pub hsml: f64,
    /// Acceptable particle type tags for candidates under this query.
    pub mask: TypeMask,
    /// Symmetric search: candidates are accepted within
    /// `max(hsml, candidate.hsml)` rather than `hsml` alone. Requires the
    /// tree's cached `hmax` to be valid (checked at walk start).
    pub symmetric: bool,
    /// Sentinel `-1` on the initialisation call; otherwise the local
    /// index of the current in-range candidate.
    pub other: i64,
    pub r2: f64,
    pub r: f64,
    pub dist: [f64; 3],
}

impl NgbIterState {
    /// Constructs the initialisation state handed to `ngbiter` with
    /// `other = -1`.
    pub fn init() -> Self {
        NgbIterState {
            hsml: 0.0,
            mask: TypeMask::ALL,
            symmetric: false,
            other: -1,
            r2: 0.0,
            r: 0.0,
            dist: [0.0; 3],
        }
    }

    pub fn is_init_call(&self) -> bool {
        self.other < 0
    }
}

/// The capability set a kernel implements: what it needs from the engine
/// (`haswork`, `fill`) and what the engine needs from it at each stage of
/// a walk (`ngbiter`, `reduce`, `preprocess`/`postprocess`).
pub trait Visitor: Send + Sync {
    type Query: QueryPayload;
    type Result: ResultPayload;
    /// Per-thread scratch state. One instance lives for the duration of a
    /// phase runner's thread and is threaded through every callback that
    /// thread makes.
    type Local: Default + Send;

    /// Optional filter on active particles; `true` (the default) accepts
    /// every non-garbage particle the queue builder sees.
    fn haswork(&self, _i: ParticleIndex) -> bool {
        true
    }

    /// Populates kernel-specific fields of a query after the engine has
    /// set `position` and `node_list`.
    fn fill(&self, i: ParticleIndex, query: &mut Self::Query);

    /// Called once per candidate in range (plus once more at the start of
    /// each walk, with `iter.other == -1`, to let the kernel seed `hsml`/
    /// `mask`/`symmetric`).
    fn ngbiter(
        &self,
        query: &Self::Query,
        result: &mut Self::Result,
        iter: &mut NgbIterState,
        local: &mut Self::Local,
    );

    /// Merges a partial result into the particle that originated the
    /// query. Called once per distinct remote rank visited, plus once for
    /// the local portion of the walk.
    fn reduce(&self, i: ParticleIndex, result: &Self::Result, mode: ReduceMode, local: &mut Self::Local);

    /// Optional per-particle hook run serially before the walk begins.
    fn preprocess(&self, _i: ParticleIndex) {}

    /// Optional per-particle hook run serially after the walk completes.
    fn postprocess(&self, _i: ParticleIndex) {}
}
