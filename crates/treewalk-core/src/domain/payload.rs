//! Query and result payload traits.
//!
//! The original engine ships these as opaque byte blocks sliced by offset;
//! here they are ordinary Rust types carried through generic parameters, so
//! the compiler enforces layout instead of a runtime `memcpy` recipe. The
//! 8-byte-size requirement from the source protocol is kept as a
//! constructor-time check, since it still bounds the MPI transfer maths in
//! the Exchange sizing formula.

use crate::domain::tree::NodeList;
use crate::error::{Result, TreeWalkError};

/// A query sent from the originating rank to a peer whose sub-domain must
/// be visited on the originator's behalf.
///
/// `position` and `node_list` are engine-owned fields, set by the Top-tree
/// Runner before `fill` is called; everything else in an implementor is
/// kernel-specific (e.g. gravity softening, density target neighbour
/// count).
pub trait QueryPayload: Send + Sync + Clone + Copy {
    /// Builds a query with the engine-owned fields populated; kernel-owned
    /// fields take their `Default` value until `fill` runs.
    fn new(position: [f64; 3], node_list: NodeList) -> Self;

    fn position(&self) -> [f64; 3];
    fn node_list(&self) -> NodeList;
}

/// A result returned from a peer (or produced locally) that the owning
/// rank reduces into its particle.
///
/// `debug_source_id` mirrors the source engine's "first field of a Result
/// is reserved for an identity echo (debug)" — populated by Secondary
/// Runner, checked by [`crate::domain::visitor::Visitor::reduce`]
/// implementations in debug builds only.
pub trait ResultPayload: Send + Sync + Clone + Copy + Default {
    fn debug_source_id(&self) -> u64;
    fn set_debug_source_id(&mut self, id: u64);
}

/// Validates that a payload type's size is an 8-byte multiple, as the
/// source protocol requires for its `memcpy`/MPI-datatype staging. Returns
/// `Err(TreeWalkError::Configuration)` rather than panicking directly, so
/// callers (`WalkDescriptor::begin`) can surface it through the normal
/// error path.
pub fn assert_payload_size_aligned<T>(label: &'static str) -> Result<()> {
    let size = std::mem::size_of::<T>();
    if size % 8 != 0 {
        return Err(TreeWalkError::Configuration(format!(
            "{label} payload size {size} is not a multiple of 8 bytes"
        )));
    }
    Ok(())
}
