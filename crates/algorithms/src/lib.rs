//! # geocomp algorithms
//!
//! Engines over the geocomp data model.
//!
//! ## Available Engines
//!
//! - **predicates**: DE-9IM relations, distance, batched and matrix evaluation
//! - **vector**: Buffer, union and dissolve
//! - **overlay**: Intersection, area-weighted interpolation, spatial joins
//! - **map_algebra**: Local, focal, zonal and global raster operations
//! - **conversion**: Rasterization, vectorization, sampling and masking

pub(crate) mod maybe_rayon;

pub mod conversion;
pub mod map_algebra;
pub mod overlay;
pub mod predicates;
pub mod vector;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::conversion::{
        mask_by_geometries, point_query, rasterize, rasterize_collection, vectorize, vectorize_points,
        MaskParams, MergeAlg, PixelActivation, PolygonizeParams, RasterizeParams,
    };
    pub use crate::map_algebra::{
        focal, local_arithmetic, narrow, reclassify, zonal, zonal_statistics, EdgeMode, FocalParams,
        FocalStatistic, OverflowPolicy, ReclassifyParams, Unmatched, ZonalStatistic,
    };
    pub use crate::overlay::{
        area_weighted_interpolate, buffered_join, intersection, spatial_join, BufferedJoinParams,
        InterpolateParams, SpatialJoinParams,
    };
    pub use crate::predicates::{distance, evaluate, matrix, MatrixOptions, Predicate};
    pub use crate::vector::{buffer, dissolve_by, BufferParams};
    pub use geocomp_core::prelude::*;
}
