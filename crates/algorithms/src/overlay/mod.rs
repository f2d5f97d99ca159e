//! Overlay and spatial join engine
//!
//! - Intersection: clip one feature set by another
//! - Area-weighted interpolation between incongruent polygon layers
//! - Spatial join keyed by a predicate, and the buffered join for
//!   features that are near but disjoint

mod interpolate;
mod intersection;
mod join;

pub use interpolate::{area_weighted_interpolate, AreaWeightedInterpolation, InterpolateParams, Variable};
pub use intersection::{intersect_geometries, intersection};
pub use join::{
    buffered_join, spatial_join, BufferedJoinParams, JoinKind, Reducer, SpatialJoin, SpatialJoinParams,
};
