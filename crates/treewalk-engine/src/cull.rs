//! Node Culler: the geometric accept/reject test applied to every node the
//! Neighbour Finder considers descending into.
//!
//! A node is culled (skipped, following its sibling pointer) when its
//! circumscribing sphere cannot possibly contain a particle within the
//! query's search radius, accounting for periodic wrap. This is the single
//! most frequently evaluated routine in the engine, so it takes plain
//! values rather than going through a trait dispatch.

use treewalk_core::geometry::{wrap_delta, CIRCUMSCRIBED_SPHERE_FACTOR};
use treewalk_core::NodeView;

/// Outcome of testing one node against a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullDecision {
    /// The node's sphere overlaps the search radius; descend into it (or,
    /// if a leaf, test its particles individually).
    Open,
    /// No particle under this node can be in range; skip to its sibling.
    Cull,
}

/// Tests whether `node` can be culled for a query at `query_pos` with
/// search radius `hsml`, relative to a periodic box of side `box_size`
/// (`None` for an aperiodic simulation).
///
/// `extra_radius` folds in a symmetric walk's `hmax` contribution: callers
/// performing a symmetric search pass `node.hmax.unwrap_or(0.0)` here since
/// a node's widest candidate may itself reach out `hmax` beyond its own
/// sphere.
pub fn test_node(
    node: &NodeView,
    query_pos: [f64; 3],
    hsml: f64,
    extra_radius: f64,
    box_size: Option<f64>,
) -> CullDecision {
    let reach = hsml + extra_radius;

    // Stage one: axis-aligned extended box against the query sphere. Each
    // axis is wrapped and tested in turn so a node far away on just one
    // axis culls before the other two are even touched.
    let box_reach = node.half_side + reach;
    let mut delta = [0.0; 3];
    for axis in 0..3 {
        let d = wrap_delta(node.center[axis] - query_pos[axis], box_size);
        if d.abs() > box_reach {
            return CullDecision::Cull;
        }
        delta[axis] = d;
    }

    // Stage two: the tighter circumscribing-sphere test.
    let dist2 = delta[0] * delta[0] + delta[1] * delta[1] + delta[2] * delta[2];
    let sphere_reach = node.half_side * CIRCUMSCRIBED_SPHERE_FACTOR + reach;
    if dist2 <= sphere_reach * sphere_reach {
        CullDecision::Open
    } else {
        CullDecision::Cull
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use treewalk_core::NodeKind;

    fn node(center: [f64; 3], half_side: f64) -> NodeView {
        NodeView {
            kind: NodeKind::Internal,
            center,
            half_side,
            sibling: None,
            first_child: None,
            occupancy: 1,
            top_level: false,
            hmax: None,
        }
    }

    #[test]
    fn opens_when_query_is_inside_the_node() {
        let n = node([0.0, 0.0, 0.0], 1.0);
        assert_eq!(test_node(&n, [0.1, 0.0, 0.0], 0.1, 0.0, None), CullDecision::Open);
    }

    #[test]
    fn culls_when_far_beyond_reach() {
        let n = node([0.0, 0.0, 0.0], 1.0);
        assert_eq!(
            test_node(&n, [100.0, 100.0, 100.0], 0.1, 0.0, None),
            CullDecision::Cull
        );
    }

    #[test]
    fn periodic_wrap_can_bring_a_far_node_back_in_range() {
        let n = node([0.05, 0.0, 0.0], 0.01);
        let far_query = [0.95, 0.0, 0.0];
        assert_eq!(
            test_node(&n, far_query, 0.2, 0.0, None),
            CullDecision::Cull
        );
        assert_eq!(
            test_node(&n, far_query, 0.2, 0.0, Some(1.0)),
            CullDecision::Open
        );
    }

    #[test]
    fn extra_radius_widens_reach_for_symmetric_walks() {
        let n = node([0.0, 0.0, 0.0], 1.0);
        let far_query = [3.0, 0.0, 0.0];
        assert_eq!(
            test_node(&n, far_query, 0.1, 0.0, None),
            CullDecision::Cull
        );
        assert_eq!(
            test_node(&n, far_query, 0.1, 2.0, None),
            CullDecision::Open
        );
    }

    #[test]
    fn axis_box_test_culls_nodes_the_sphere_test_alone_would_open() {
        // half_side = 1.0, no extra reach: the sphere test's radius is
        // 1.366..., but the per-axis box test's radius is only 1.0. A
        // node offset 1.2 on a single axis sits inside the sphere's
        // radius but outside the box's, so it must be culled.
        let n = node([1.2, 0.0, 0.0], 1.0);
        assert_eq!(test_node(&n, [0.0, 0.0, 0.0], 0.0, 0.0, None), CullDecision::Cull);
    }
}
