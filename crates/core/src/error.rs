//! Error types for geocomp

use thiserror::Error;

/// Main error type for geocomp operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("CRS mismatch: {0} vs {1}")]
    CrsMismatch(String, String),

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Band {band} out of range for raster with {count} band(s)")]
    BandOutOfRange { band: usize, count: usize },

    #[error("Length mismatch: {left} vs {right}")]
    LengthMismatch { left: usize, right: usize },

    #[error("Raster shape mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    ShapeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("Rasters are not co-registered: transforms differ")]
    TransformMismatch,

    #[error("Type overflow: {value} does not fit in {target}")]
    TypeOverflow { value: String, target: &'static str },

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Invalid geotransform: {0}")]
    InvalidTransform(String),

    #[error("No-data value {value} is not representable as {dtype}")]
    NoDataNotRepresentable { value: f64, dtype: &'static str },

    #[error("No-data value {value} already occurs among the valid {dtype} cells")]
    NoDataInUse { value: String, dtype: &'static str },

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub(crate) fn invalid_geometry(msg: impl Into<String>) -> Self {
        Error::InvalidGeometry(msg.into())
    }
}

/// Result type alias for geocomp operations
pub type Result<T> = std::result::Result<T, Error>;
