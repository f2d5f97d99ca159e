//! Raster data structures and operations

mod element;
mod geotransform;
mod grid;
mod neighborhood;
mod window;

pub use element::{DataType, RasterElement};
pub use geotransform::GeoTransform;
pub use grid::{Raster, RasterStatistics};
pub use neighborhood::Neighborhood;
pub use window::{RasterTemplate, Window};
