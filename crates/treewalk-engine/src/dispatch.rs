//! Visitor Dispatcher and Neighbour Finder.
//!
//! Two tree walks share the same node-stepping shape (follow `first_child`
//! when a node opens, otherwise `sibling`) but do different things at a
//! leaf: [`enumerate_exports`] walks the replicated top-tree looking for
//! pseudo-nodes that must be visited on a remote rank; [`ngbiter_walk`]
//! walks a local (or imported) sub-domain invoking the kernel's `ngbiter`
//! on every in-range particle.

use treewalk_core::{
    NgbIterState, NodeId, NodeKind, ParticleIndex, ParticleTable, QueryPayload, Tree, Visitor,
};

use crate::cull::{test_node, CullDecision};
use crate::stats::WalkCounters;

/// Runs the kernel's `other == -1` initialisation call for `query`,
/// returning the seeded search radius, mask, and symmetry flag. Shared by
/// [`enumerate_exports`]'s callers (who need `hsml`/`mask` before walking
/// the top-tree) and [`ngbiter_walk`].
pub fn seed_query_state<V: Visitor>(visitor: &V, query: &V::Query, local: &mut V::Local) -> NgbIterState {
    let mut result = V::Result::default();
    let mut iter = NgbIterState::init();
    visitor.ngbiter(query, &mut result, &mut iter, local);
    iter
}

/// Walks the replicated top-tree from `tree.first_node()`, returning every
/// pseudo-node whose remote sub-domain must be visited for `query_pos`/
/// `hsml`.
///
/// Only called in [`treewalk_core::WalkMode::TopTree`]; callers turn each
/// returned [`NodeId`] into an export via `tree.top_leaf_map().resolve`.
pub fn enumerate_exports<T: Tree>(
    tree: &T,
    query_pos: [f64; 3],
    hsml: f64,
    extra_radius: f64,
) -> Vec<NodeId> {
    let box_size = tree.box_size();
    let mut hits = Vec::new();
    let mut current = Some(tree.first_node());

    while let Some(id) = current {
        let node = tree.node(id);
        match node.kind {
            NodeKind::Pseudo => {
                if test_node(&node, query_pos, hsml, extra_radius, box_size) == CullDecision::Open
                {
                    hits.push(id);
                }
                current = node.sibling;
            }
            NodeKind::TopLevelInternal => {
                if test_node(&node, query_pos, hsml, extra_radius, box_size) == CullDecision::Open
                {
                    current = node.first_child;
                } else {
                    current = node.sibling;
                }
            }
            NodeKind::Internal | NodeKind::Leaf => {
                // The top-tree ends where the locally-owned subtree begins;
                // nothing below this point can be remote.
                current = node.sibling;
            }
        }
    }

    hits
}

/// Walks the (local or ghost) sub-domain rooted at `root`, invoking the
/// kernel's `ngbiter` on every particle within range and returning the
/// accumulated result.
///
/// `extra_radius` is `node.hmax` for a symmetric search rooted at the
/// current node, or `0.0` for an asymmetric one.
/// Walks every node in `roots` in turn against a single shared `result`/
/// `iter` pair, so a query with more than one remote entry node (up to
/// [`treewalk_core::NODE_LIST_LENGTH`] of them) reduces to exactly one
/// result — matching [`Visitor::reduce`]'s "once per distinct remote rank"
/// contract rather than once per node-list slot.
pub fn ngbiter_walk<T, P, V>(
    tree: &T,
    particles: &P,
    visitor: &V,
    roots: impl IntoIterator<Item = NodeId>,
    query: &V::Query,
    symmetric: bool,
    mode: treewalk_core::WalkMode,
    local: &mut V::Local,
    counters: &WalkCounters,
) -> V::Result
where
    T: Tree,
    P: ParticleTable,
    V: Visitor,
{
    let box_size = tree.box_size();
    let query_pos = query.position();

    let mut result = V::Result::default();
    let mut iter = NgbIterState::init();
    iter.symmetric = symmetric;
    visitor.ngbiter(query, &mut result, &mut iter, local);
    let hsml = iter.hsml;
    let mask = iter.mask;

    let mut culled = 0u64;
    let mut interactions = 0u64;

    for root in roots {
        let mut current = Some(root);
        while let Some(id) = current {
            let node = tree.node(id);
            let extra_radius = if symmetric { node.hmax.unwrap_or(0.0) } else { 0.0 };

            let decision = test_node(&node, query_pos, hsml, extra_radius, box_size);
            if decision == CullDecision::Cull {
                culled += 1;
                current = node.sibling;
                continue;
            }

            match node.kind {
                NodeKind::Leaf => {
                    for &candidate in tree.leaf_particles(id) {
                        if visit_candidate(
                            particles, visitor, query, &mut result, &mut iter, local, candidate,
                            hsml, mask, symmetric, box_size,
                        ) {
                            interactions += 1;
                        }
                    }
                    current = node.sibling;
                }
                NodeKind::Pseudo => {
                    // In Primary mode a pseudo-node is a remote sub-domain
                    // already handled by the Top-tree Runner's export;
                    // skip it silently. A ghost walk should never see one
                    // at all, since a peer only ships its own local tree
                    // fragment.
                    debug_assert!(
                        mode != treewalk_core::WalkMode::Ghosts,
                        "pseudo-node encountered during a Ghosts walk (node {id:?})"
                    );
                    current = node.sibling;
                }
                NodeKind::Internal | NodeKind::TopLevelInternal => {
                    current = node.first_child;
                }
            }
        }
    }

    counters.add_nodes_culled(culled);
    counters.add_interactions(interactions);
    result
}

/// Tests and, if in range, invokes `ngbiter` on one candidate particle.
/// Returns whether the candidate was accepted, so the caller can tally
/// interactions without re-deriving the distance test.
#[allow(clippy::too_many_arguments)]
fn visit_candidate<P, V>(
    particles: &P,
    visitor: &V,
    query: &V::Query,
    result: &mut V::Result,
    iter: &mut NgbIterState,
    local: &mut V::Local,
    candidate: ParticleIndex,
    hsml: f64,
    mask: treewalk_core::TypeMask,
    symmetric: bool,
    box_size: Option<f64>,
) -> bool
where
    P: ParticleTable,
    V: Visitor,
{
    if particles.is_garbage(candidate) {
        return false;
    }
    if !mask.contains(particles.type_tag(candidate)) {
        return false;
    }

    let pos = particles.position(candidate);
    let query_pos = query.position();
    let dist = treewalk_core::geometry::wrap_delta3(
        [
            pos[0] - query_pos[0],
            pos[1] - query_pos[1],
            pos[2] - query_pos[2],
        ],
        box_size,
    );
    let r2 = dist[0] * dist[0] + dist[1] * dist[1] + dist[2] * dist[2];

    let reach = if symmetric {
        hsml.max(particles.hsml(candidate))
    } else {
        hsml
    };
    if r2 > reach * reach {
        return false;
    }

    iter.other = candidate.as_usize() as i64;
    iter.r2 = r2;
    iter.r = r2.sqrt();
    iter.dist = dist;
    visitor.ngbiter(query, result, iter, local);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use treewalk_core::Rank;
    use treewalk_test::fixtures::TwoDomainTree;

    #[test]
    fn enumerate_exports_returns_every_pseudo_node_in_range() {
        let tree = TwoDomainTree::new(1, Rank(1), NodeId(7), Rank(2), NodeId(9))
            .with_boxes(([0.0, 0.0, 0.0], 0.5), ([0.0, 0.0, 0.0], 0.5));
        let hits = enumerate_exports(&tree, [0.0, 0.0, 0.0], 1.0, 0.0);
        assert_eq!(hits, vec![NodeId(1), NodeId(2)]);
    }

    #[test]
    fn enumerate_exports_culls_a_pseudo_node_outside_the_search_radius() {
        let tree = TwoDomainTree::new(1, Rank(1), NodeId(7), Rank(2), NodeId(9))
            .with_boxes(([0.0, 0.0, 0.0], 0.5), ([100.0, 0.0, 0.0], 0.5));
        let hits = enumerate_exports(&tree, [0.0, 0.0, 0.0], 1.0, 0.0);
        assert_eq!(hits, vec![NodeId(1)], "the far pseudo-node must be culled, not exported");
    }
}
