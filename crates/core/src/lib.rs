//! # geocomp core
//!
//! Data model shared by the geocomp engines:
//! - `Geometry` / `FeatureCollection`: validated vector features with a schema
//! - `Raster<T>`: multi-band typed grid with a no-data policy
//! - `GeoTransform`: affine cell-to-world mapping
//! - `CRS`: identity tag checked whenever two inputs are combined
//! - `Algorithm`: uniform entry point implemented by the engines
//!
//! Decoding and encoding files is left to the caller; this crate only
//! deals with in-memory values.

pub mod crs;
pub mod error;
pub mod raster;
pub mod vector;

pub use crs::CRS;
pub use error::{Error, Result};
pub use raster::{DataType, GeoTransform, Neighborhood, Raster, RasterElement, RasterTemplate, Window};
pub use vector::{AttributeValue, BoundingBox, FeatureCollection, Geometry, GeometryKind};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::CRS;
    pub use crate::error::{Error, Result};
    pub use crate::raster::{GeoTransform, Neighborhood, Raster, RasterElement, RasterTemplate, Window};
    pub use crate::vector::{
        AttributeValue, Feature, FeatureCollection, Field, FieldType, Geometry, GeometryKind, Schema,
    };
    pub use crate::Algorithm;
}

/// Common shape of the engines' operations.
///
/// Operations are pure: inputs are borrowed read-only and a new value is
/// returned. Parameters that change results in surprising ways have no
/// default, so `execute_default` is only available where one exists.
pub trait Algorithm {
    type Input;
    type Output;
    type Params;
    type Error: std::error::Error;

    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn execute(&self, input: Self::Input, params: Self::Params) -> std::result::Result<Self::Output, Self::Error>;

    fn execute_default(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error>
    where
        Self::Params: Default,
    {
        self.execute(input, Self::Params::default())
    }
}
