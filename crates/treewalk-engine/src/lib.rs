//! Treewalk Engine
//!
//! The distributed tree-walk engine itself, generic over the domain
//! traits defined in `treewalk-core`:
//! - Queue Builder and Node Culler (work-set assembly and the geometric
//!   accept/reject test)
//! - Neighbour Finder and Visitor Dispatcher (tree traversal and kernel
//!   callback dispatch)
//! - Export Table and Exchange (cross-rank query/result transport)
//! - Phase Runners (Top-tree, Primary, Secondary) and the Outer Driver
//! - The adaptive hsml convergence loop

pub mod context;
pub mod cull;
pub mod dispatch;
pub mod driver;
pub mod exchange;
pub mod export;
pub mod hsml;
pub mod phase;
pub mod queue;
pub mod stats;
pub mod transport;

pub use context::EngineContext;
pub use driver::{run, WalkDescriptor};
pub use exchange::{exchange_exports, exchange_results, ImportedQuery};
pub use export::{ExportFull, ExportRecord, ExportRegion};
pub use hsml::run_hsml_loop;
pub use stats::{WalkCounters, WalkCountersSnapshot};
pub use transport::{ExchangeHub, InProcessTransport, LoopbackTransport, Transport};

#[cfg(feature = "mpi-transport")]
pub use transport::mpi_backend::MpiTransport;
