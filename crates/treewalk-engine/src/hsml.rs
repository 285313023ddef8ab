//! Adaptive hsml Loop: repeatedly re-walks particles whose neighbour count
//! fell outside `[target - tolerance, target + tolerance]`, bisecting each
//! one's search radius until it converges or the iteration ceiling
//! (`EngineConfig::hsml.max_iterations`) is exceeded.

use treewalk_core::{ParticleIndex, ParticleTable, Result, TreeWalkError};
use treewalk_config::HsmlLoopConfig;

/// Per-particle bisection bounds, carried across iterations for the
/// particles that haven't yet converged.
#[derive(Debug, Clone, Copy)]
struct Bounds {
    left: f64,
    right: f64,
    /// `right` has never been set by an over-count; growing `hsml`
    /// unboundedly (rather than bisecting) until the first upper bound is
    /// found, mirroring the source engine's initial search.
    right_is_open: bool,
}

/// Multiplicative growth cap applied to the open-right branch: the next
/// guess is never more than this many times the last radius tried, no
/// matter how far under-target the measured count is.
const MAX_GROWTH_FACTOR: f64 = 4.0;

impl Bounds {
    fn seed(initial_hsml: f64) -> Self {
        Bounds {
            left: 0.0,
            right: initial_hsml,
            right_is_open: true,
        }
    }

    /// Narrows the bounds given the `hsml` that was just measured and its
    /// resulting neighbour count, returning the next `hsml` to try.
    ///
    /// Neighbour count scales with volume (`~ hsml^3`), so the next guess
    /// extrapolates along that curve rather than bisecting blindly:
    /// `tried * (target / count).cbrt()`. While the right bound is still
    /// open (no over-count has been seen yet), that extrapolated factor is
    /// used directly as multiplicative growth, capped at
    /// [`MAX_GROWTH_FACTOR`] and at the box size for a periodic
    /// simulation (the search radius can never usefully exceed it). Once
    /// both bounds are known, the extrapolated guess is clamped into
    /// `[left, right]`.
    fn narrow(&mut self, tried: f64, count: u32, target: u32, box_size: Option<f64>) -> f64 {
        let volume_factor = (target as f64 / count.max(1) as f64).cbrt();

        if count < target {
            self.left = tried;
            if self.right_is_open {
                let growth = volume_factor.min(MAX_GROWTH_FACTOR).max(1.0);
                let mut next = (tried * growth).max(tried + 1e-12);
                if let Some(box_size) = box_size {
                    next = next.min(box_size);
                }
                self.right = next;
                next
            } else {
                (tried * volume_factor).clamp(self.left, self.right)
            }
        } else {
            self.right = tried;
            self.right_is_open = false;
            (tried * volume_factor).clamp(self.left, self.right)
        }
    }
}

/// Drives the adaptive hsml loop to convergence.
///
/// `measure` performs one full walk pass (Top-tree + Primary + ghost
/// exchange) and returns each active particle's measured neighbour count.
/// The loop only re-measures particles that haven't converged, shrinking
/// the work set each iteration the way the source engine's `redo` queue
/// does. `box_size` bounds how far an unconverged particle's radius may
/// grow while searching for an upper bound.
pub fn run_hsml_loop<P>(
    particles: &P,
    config: &HsmlLoopConfig,
    initial_work: &[ParticleIndex],
    box_size: Option<f64>,
    mut measure: impl FnMut(&[ParticleIndex]) -> Vec<(ParticleIndex, u32)>,
) -> Result<()>
where
    P: ParticleTable,
{
    let mut bounds: std::collections::HashMap<ParticleIndex, Bounds> = initial_work
        .iter()
        .map(|&i| (i, Bounds::seed(particles.hsml(i).max(f64::MIN_POSITIVE))))
        .collect();

    let mut pending: Vec<ParticleIndex> = initial_work.to_vec();
    let mut iterations = 0u32;

    while !pending.is_empty() {
        if iterations >= config.max_iterations {
            return Err(TreeWalkError::Convergence(format!(
                "{} particle(s) did not converge within {} iterations",
                pending.len(),
                config.max_iterations
            )));
        }
        iterations += 1;

        let measured = measure(&pending);
        let mut next_pending = Vec::new();

        for (index, count) in measured {
            let target = config.target_neighbours;
            let tolerance = config.tolerance;
            let lower = target.saturating_sub(tolerance);
            let upper = target + tolerance;

            if count >= lower && count <= upper {
                continue;
            }

            let tried = particles.hsml(index);
            let b = bounds.entry(index).or_insert_with(|| Bounds::seed(tried));
            let next_hsml = b.narrow(tried, count, target, box_size);
            particles.set_hsml(index, next_hsml);
            next_pending.push(index);
        }

        pending = next_pending;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use treewalk_test::fixtures::FlatParticleTable;

    #[test]
    fn converges_when_count_is_already_in_tolerance() {
        let particles = FlatParticleTable::new(vec![[0.0; 3]; 1]);
        let config = HsmlLoopConfig {
            target_neighbours: 32,
            tolerance: 2,
            max_iterations: 10,
        };
        let work = vec![ParticleIndex(0)];
        let result = run_hsml_loop(&particles, &config, &work, None, |pending| {
            pending.iter().map(|&i| (i, 32)).collect()
        });
        assert!(result.is_ok());
    }

    #[test]
    fn bisects_toward_target_and_converges() {
        let particles = FlatParticleTable::new(vec![[0.0; 3]; 1]);
        particles.set_hsml(ParticleIndex(0), 1.0);
        let config = HsmlLoopConfig {
            target_neighbours: 32,
            tolerance: 2,
            max_iterations: 60,
        };
        let work = vec![ParticleIndex(0)];

        // A fake density field: neighbour count grows with hsml^3.
        let result = run_hsml_loop(&particles, &config, &work, None, |pending| {
            pending
                .iter()
                .map(|&i| {
                    let h = particles.hsml(i);
                    let count = (h.powi(3) * 32.0).round().max(0.0) as u32;
                    (i, count)
                })
                .collect()
        });
        assert!(result.is_ok(), "expected convergence, got {result:?}");
        let h = particles.hsml(ParticleIndex(0));
        let count = (h.powi(3) * 32.0).round() as i64;
        assert!((count - 32).abs() <= 2);
    }

    #[test]
    fn fails_with_convergence_error_past_the_iteration_ceiling() {
        let particles = FlatParticleTable::new(vec![[0.0; 3]; 1]);
        particles.set_hsml(ParticleIndex(0), 1.0);
        let config = HsmlLoopConfig {
            target_neighbours: 32,
            tolerance: 0,
            max_iterations: 2,
        };
        let work = vec![ParticleIndex(0)];

        // A count that can never land exactly on the target.
        let result = run_hsml_loop(&particles, &config, &work, None, |pending| {
            pending.iter().map(|&i| (i, 31)).collect()
        });
        assert!(matches!(result, Err(TreeWalkError::Convergence(_))));
    }
}
