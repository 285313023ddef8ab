//! Distributed tree-walk engine for N-body cosmological simulation.
//!
//! This crate re-exports the pieces of `treewalk-core`, `treewalk-config`,
//! and `treewalk-engine` a kernel author needs, so that a dependent crate
//! can depend on `treewalk` alone rather than the individual members of
//! the workspace.

// ============================================================================
// Domain traits (kernel-facing)
// ============================================================================
pub use treewalk_core::{
    assert_payload_size_aligned, NgbIterState, NodeId, NodeKind, NodeList, NodeView,
    ParticleIndex, ParticleTable, QueryPayload, Rank, ReduceMode, ResultPayload, Tree, TopLeafMap,
    TypeMask, Visitor, WalkMode, NODE_LIST_LENGTH,
};
pub use treewalk_core::{Result, TreeWalkError};

// ============================================================================
// Configuration
// ============================================================================
pub use treewalk_config::{
    BufferConfig, ConfigError, EngineConfig, HsmlLoopConfig, ThreadCount,
};

// ============================================================================
// Engine: driver, context, and phase runners
// ============================================================================
pub use treewalk_engine::{
    exchange_exports, exchange_results, run, run_hsml_loop, EngineContext, ExportFull,
    ExportRecord, ExportRegion, ImportedQuery, WalkDescriptor,
};

// ============================================================================
// Transport (cross-rank query/result exchange)
// ============================================================================
pub use treewalk_engine::{ExchangeHub, InProcessTransport, LoopbackTransport, Transport};

#[cfg(feature = "mpi-transport")]
pub use treewalk_engine::MpiTransport;

// ============================================================================
// Observability
// ============================================================================
pub use treewalk_engine::{WalkCounters, WalkCountersSnapshot};

#[cfg(feature = "console")]
pub use treewalk_console as console;

/// Common imports for implementing a tree-walk kernel.
pub mod prelude {
    pub use crate::{
        EngineConfig, EngineContext, NgbIterState, ParticleTable, QueryPayload, ReduceMode,
        ResultPayload, Tree, Transport, Visitor, WalkDescriptor, WalkMode,
    };
    pub use crate::run;
}
