//! Geometry operations over the vector model
//!
//! - Buffer: grow or shrink geometries by a distance
//! - Union: dissolve a geometry set, optionally grouped by attribute

mod buffer;
mod union;

pub use buffer::{buffer, buffer_collection, BufferParams};
pub use union::{dissolve_by, union, union_collection};
