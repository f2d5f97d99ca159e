//! Predicate engine
//!
//! Binary topological relations derived from the DE-9IM matrix, planar
//! distance, and batched evaluation (many-to-one, pairwise, matrix).

mod batch;
mod distance;
mod index;
mod relation;

pub use batch::{
    collection_matrix, distance_matrix, distances_to, filter_by, many_to_one, matrix, pairwise,
    pairwise_distance, MatrixOptions, PredicateMatrix,
};
pub use distance::distance;
pub(crate) use distance::prepared_distance;
pub use index::SpatialIndex;
pub use relation::{
    contains, covered_by, covers, crosses, disjoint, equals, evaluate, intersects, overlaps, relate,
    relate_pattern, touches, within, Predicate,
};
pub(crate) use relation::Prepared;
