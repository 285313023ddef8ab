//! Periodic-boundary distance helpers shared by the Node Culler and the
//! Visitor Dispatcher.
//!
//! Both components need to wrap a coordinate delta to its nearest periodic
//! image; keeping the routine here (rather than duplicated in
//! `treewalk-engine`) is the only reason this module exists in `core`
//! rather than the engine crate — it has no dependency on [`crate::domain`].

/// Wraps a single coordinate delta to its nearest periodic image.
///
/// `box_size = None` means the simulation is not periodic; the delta is
/// returned unchanged.
#[inline]
pub fn wrap_delta(mut delta: f64, box_size: Option<f64>) -> f64 {
    if let Some(box_size) = box_size {
        let half = 0.5 * box_size;
        if delta > half {
            delta -= box_size;
        } else if delta < -half {
            delta += box_size;
        }
    }
    delta
}

/// Wraps each axis of a 3D delta to its nearest periodic image.
#[inline]
pub fn wrap_delta3(delta: [f64; 3], box_size: Option<f64>) -> [f64; 3] {
    [
        wrap_delta(delta[0], box_size),
        wrap_delta(delta[1], box_size),
        wrap_delta(delta[2], box_size),
    ]
}

/// Minor pre-factor from the source's tighter circumscribing-sphere test:
/// `0.5 * (1 + sqrt(3))`.
pub const CIRCUMSCRIBED_SPHERE_FACTOR: f64 = 0.5 * 2.732_050_807_568_877_2;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_delta_identity_when_aperiodic() {
        assert_eq!(wrap_delta(0.9, None), 0.9);
        assert_eq!(wrap_delta(-0.9, None), -0.9);
    }

    #[test]
    fn wrap_delta_folds_to_nearest_image() {
        // box = 1.0: a separation of 0.9 should fold to -0.1.
        assert!((wrap_delta(0.9, Some(1.0)) - (-0.1)).abs() < 1e-12);
        assert!((wrap_delta(-0.9, Some(1.0)) - 0.1).abs() < 1e-12);
    }

    #[test]
    fn wrap_delta_leaves_short_separations_alone() {
        assert!((wrap_delta(0.2, Some(1.0)) - 0.2).abs() < 1e-12);
    }

    #[test]
    fn circumscribed_sphere_factor_matches_known_constant() {
        assert!((CIRCUMSCRIBED_SPHERE_FACTOR - 1.366_025_403_784_438_6).abs() < 1e-12);
    }
}
