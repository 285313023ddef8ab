//! Per-walk counters reported by the Outer Driver and rendered by
//! `treewalk-console`.

use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe accumulator for one walk's counters.
///
/// Phase runners update this concurrently from worker threads; all fields
/// use relaxed atomics since the counters are purely observational and
/// never gate control flow.
#[derive(Debug, Default)]
pub struct WalkCounters {
    particles_visited: AtomicU64,
    interactions: AtomicU64,
    exports: AtomicU64,
    imports: AtomicU64,
    top_tree_nodes_opened: AtomicU64,
    nodes_culled: AtomicU64,
}

impl WalkCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_particles_visited(&self, n: u64) {
        self.particles_visited.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_interactions(&self, n: u64) {
        self.interactions.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_exports(&self, n: u64) {
        self.exports.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_imports(&self, n: u64) {
        self.imports.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_top_tree_nodes_opened(&self, n: u64) {
        self.top_tree_nodes_opened.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_nodes_culled(&self, n: u64) {
        self.nodes_culled.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> WalkCountersSnapshot {
        WalkCountersSnapshot {
            particles_visited: self.particles_visited.load(Ordering::Relaxed),
            interactions: self.interactions.load(Ordering::Relaxed),
            exports: self.exports.load(Ordering::Relaxed),
            imports: self.imports.load(Ordering::Relaxed),
            top_tree_nodes_opened: self.top_tree_nodes_opened.load(Ordering::Relaxed),
            nodes_culled: self.nodes_culled.load(Ordering::Relaxed),
        }
    }
}

/// An immutable snapshot of [`WalkCounters`] taken at a point in time, used
/// for reporting once a walk phase has finished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkCountersSnapshot {
    pub particles_visited: u64,
    pub interactions: u64,
    pub exports: u64,
    pub imports: u64,
    pub top_tree_nodes_opened: u64,
    pub nodes_culled: u64,
}

impl WalkCountersSnapshot {
    pub fn mean_interactions_per_particle(&self) -> f64 {
        if self.particles_visited == 0 {
            0.0
        } else {
            self.interactions as f64 / self.particles_visited as f64
        }
    }
}
