//! Small index-type infrastructure shared by the IR and runtime crates.
//!
//! Every graph/process/value table in this workspace is addressed by a
//! newtype wrapping a `u32` rather than a raw `usize`, so that, e.g., a
//! [`ProcessId`](../xsim/struct.ProcessId.html) can't accidentally be used to
//! index a variable table. [`impl_index`] generates the boilerplate for such
//! a newtype; [`indexed_map::IndexedMap`] is the dense, append-only map keyed
//! by it.

mod index_trait;
mod indexed_map;
mod macros;

pub use index_trait::{
    ConcatenatedIndexRanges, IndexRange, IndexRangeIterator, IndexRef,
    OwnedIndexRangeIterator, SplitIndexRange,
};
pub use indexed_map::{IndexedMap, SecondaryMap};
