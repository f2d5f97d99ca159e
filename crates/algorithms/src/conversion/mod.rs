//! Conversion between the raster and vector models
//!
//! - Rasterize: burn geometries into a grid with a merge policy
//! - Vectorize: dissolve equal-valued regions into polygons, or cells into points
//! - Sampling: point queries and masking a grid by geometries

mod rasterize;
mod sample;
mod vectorize;

pub use rasterize::{rasterize, rasterize_collection, MergeAlg, PixelActivation, Rasterize, RasterizeParams};
pub(crate) use rasterize::covered_cells;
pub use sample::{mask_by_geometries, point_query, sample, MaskParams, Samples};
pub use vectorize::{vectorize, vectorize_points, PolygonizeParams, Vectorize};
