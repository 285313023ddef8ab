//! Process-wide engine state.
//!
//! A small piece of state that is expensive or awkward to thread through
//! every call and is instead created once per walk and handed to every
//! phase runner by reference.

use treewalk_config::EngineConfig;
use treewalk_core::Rank;

use crate::stats::WalkCounters;

/// State shared by every component of one `WalkDescriptor::run` call.
///
/// An `EngineContext` is scoped to a single walk. Reusing one across walks
/// is intentionally not supported: counters would conflate two walks'
/// statistics, and the whole point of building a fresh context is that it
/// can be dropped at `finish()` without coordination.
pub struct EngineContext {
    pub(crate) config: EngineConfig,
    pub(crate) rank: Rank,
    pub(crate) world_size: usize,
    pub(crate) counters: WalkCounters,
}

impl EngineContext {
    pub fn new(config: EngineConfig, rank: Rank, world_size: usize) -> Self {
        Self {
            config,
            rank,
            world_size,
            counters: WalkCounters::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn rank(&self) -> Rank {
        self.rank
    }

    pub fn world_size(&self) -> usize {
        self.world_size
    }

    pub fn counters(&self) -> &WalkCounters {
        &self.counters
    }

    pub fn thread_count(&self) -> usize {
        self.config.thread_count.resolve()
    }
}
