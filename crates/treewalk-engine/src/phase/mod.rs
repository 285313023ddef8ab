//! Phase runners: the three passes a walk makes over its work, run with a
//! scoped thread pool sized by [`crate::context::EngineContext::thread_count`].

pub mod primary;
pub mod secondary;
pub mod toptree;

pub use primary::run_primary;
pub use secondary::run_secondary;
pub use toptree::run_top_tree;
