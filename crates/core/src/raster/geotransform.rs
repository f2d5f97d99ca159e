//! Affine cell-to-coordinate transform

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Affine transformation coefficients for georeferencing rasters.
///
/// Maps fractional pixel coordinates (col, row) to planar (x, y):
/// ```text
/// x = origin_x + col * pixel_width + row * row_rotation
/// y = origin_y + col * col_rotation + row * pixel_height
/// ```
///
/// For north-up grids the rotation terms are 0 and `pixel_height` is the
/// negated cell height, so the centre of cell (row, col) lies at
/// `(origin_x + (col + 0.5) * cell_w, origin_y - (row + 0.5) * cell_h)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    /// X coordinate of the upper-left corner
    pub origin_x: f64,
    /// Y coordinate of the upper-left corner
    pub origin_y: f64,
    /// Cell size in X direction
    pub pixel_width: f64,
    /// Cell size in Y direction, negative for north-up grids
    pub pixel_height: f64,
    /// Contribution of the row index to x (usually 0)
    pub row_rotation: f64,
    /// Contribution of the column index to y (usually 0)
    pub col_rotation: f64,
}

impl GeoTransform {
    /// Create a new GeoTransform with no rotation
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
            row_rotation: 0.0,
            col_rotation: 0.0,
        }
    }

    /// North-up transform from the upper-left corner and positive cell sizes
    pub fn from_origin(west: f64, north: f64, xsize: f64, ysize: f64) -> Self {
        Self::new(west, north, xsize, -ysize)
    }

    /// Create from GDAL-style array [origin_x, pixel_width, row_rotation, origin_y, col_rotation, pixel_height]
    pub fn from_gdal(coeffs: [f64; 6]) -> Self {
        Self {
            origin_x: coeffs[0],
            pixel_width: coeffs[1],
            row_rotation: coeffs[2],
            origin_y: coeffs[3],
            col_rotation: coeffs[4],
            pixel_height: coeffs[5],
        }
    }

    /// Convert to GDAL-style array
    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.origin_x,
            self.pixel_width,
            self.row_rotation,
            self.origin_y,
            self.col_rotation,
            self.pixel_height,
        ]
    }

    /// Check that the transform is finite and invertible with nonzero cell sizes
    pub fn validate(&self) -> Result<()> {
        let coeffs = self.to_gdal();
        if coeffs.iter().any(|c| !c.is_finite()) {
            return Err(Error::InvalidTransform("non-finite coefficient".into()));
        }
        if self.pixel_width == 0.0 || self.pixel_height == 0.0 {
            return Err(Error::InvalidTransform(format!(
                "cell size must be nonzero, got {} x {}",
                self.pixel_width, self.pixel_height
            )));
        }
        if self.determinant().abs() < 1e-12 {
            return Err(Error::InvalidTransform("transform is not invertible".into()));
        }
        Ok(())
    }

    fn determinant(&self) -> f64 {
        self.pixel_width * self.pixel_height - self.row_rotation * self.col_rotation
    }

    /// Map fractional pixel coordinates to planar coordinates
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        let x = self.origin_x + col * self.pixel_width + row * self.row_rotation;
        let y = self.origin_y + col * self.col_rotation + row * self.pixel_height;
        (x, y)
    }

    /// Coordinates of the centre of cell (row, col)
    pub fn pixel_to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        self.apply(col as f64 + 0.5, row as f64 + 0.5)
    }

    /// Coordinates of the upper-left corner of cell (row, col)
    pub fn pixel_to_geo_corner(&self, col: usize, row: usize) -> (f64, f64) {
        self.apply(col as f64, row as f64)
    }

    /// Convert planar coordinates to fractional pixel coordinates (col, row).
    ///
    /// Use `.floor()` to get the index of the containing cell.
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        let det = self.determinant();
        if det.abs() < 1e-12 {
            return (f64::NAN, f64::NAN);
        }

        let dx = x - self.origin_x;
        let dy = y - self.origin_y;

        let col = (self.pixel_height * dx - self.row_rotation * dy) / det;
        let row = (-self.col_rotation * dx + self.pixel_width * dy) / det;

        (col, row)
    }

    /// Index of the cell containing (x, y), if it lies inside a `rows x cols` grid
    pub fn cell_at(&self, x: f64, y: f64, rows: usize, cols: usize) -> Option<(usize, usize)> {
        let (col, row) = self.geo_to_pixel(x, y);
        if !(col.is_finite() && row.is_finite()) || col < 0.0 || row < 0.0 {
            return None;
        }
        let (r, c) = (row.floor() as usize, col.floor() as usize);
        (r < rows && c < cols).then_some((r, c))
    }

    /// Corner coordinates of cell (row, col) as a closed ring
    pub fn cell_ring(&self, col: usize, row: usize) -> [(f64, f64); 5] {
        let (c, r) = (col as f64, row as f64);
        let ul = self.apply(c, r);
        [ul, self.apply(c + 1.0, r), self.apply(c + 1.0, r + 1.0), self.apply(c, r + 1.0), ul]
    }

    /// Cell width (absolute)
    pub fn cell_size(&self) -> f64 {
        self.pixel_width.abs()
    }

    /// Planar area covered by one cell
    pub fn cell_area(&self) -> f64 {
        self.determinant().abs()
    }

    /// Whether the grid axes are parallel to the coordinate axes
    pub fn is_axis_aligned(&self) -> bool {
        self.row_rotation.abs() < 1e-10 && self.col_rotation.abs() < 1e-10
    }

    /// Check if this is a north-up image (no rotation, rows run southwards)
    pub fn is_north_up(&self) -> bool {
        self.is_axis_aligned() && self.pixel_height < 0.0
    }

    /// Transform of the sub-grid whose upper-left cell is (row_off, col_off)
    pub fn shifted(&self, row_off: usize, col_off: usize) -> Self {
        let (origin_x, origin_y) = self.pixel_to_geo_corner(col_off, row_off);
        Self {
            origin_x,
            origin_y,
            ..*self
        }
    }

    /// Whether two transforms describe the same grid lattice, within `tol`
    pub fn approx_eq(&self, other: &GeoTransform, tol: f64) -> bool {
        self.to_gdal()
            .iter()
            .zip(other.to_gdal().iter())
            .all(|(a, b)| (a - b).abs() <= tol)
    }

    /// Calculate the bounding box for a raster of given dimensions
    pub fn bounds(&self, width: usize, height: usize) -> (f64, f64, f64, f64) {
        let corners = [
            self.pixel_to_geo_corner(0, 0),
            self.pixel_to_geo_corner(width, 0),
            self.pixel_to_geo_corner(0, height),
            self.pixel_to_geo_corner(width, height),
        ];

        corners.iter().fold(
            (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
            |(min_x, min_y, max_x, max_y), &(x, y)| {
                (min_x.min(x), min_y.min(y), max_x.max(x), max_y.max(y))
            },
        )
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, -1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_cell_centre_formula() {
        let gt = GeoTransform::from_origin(100.0, 200.0, 10.0, 5.0);
        let (x, y) = gt.pixel_to_geo(3, 2);
        assert_relative_eq!(x, 100.0 + 3.5 * 10.0);
        assert_relative_eq!(y, 200.0 - 2.5 * 5.0);
    }

    #[test]
    fn test_pixel_to_geo_roundtrip() {
        let gt = GeoTransform::new(100.0, 200.0, 10.0, -10.0);

        let (x, y) = gt.pixel_to_geo(5, 10);
        let (col, row) = gt.geo_to_pixel(x, y);

        assert_relative_eq!(col, 5.5, epsilon = 1e-10);
        assert_relative_eq!(row, 10.5, epsilon = 1e-10);
        assert_eq!(gt.cell_at(x, y, 20, 20), Some((10, 5)));
        assert_eq!(gt.cell_at(x, y, 5, 5), None);
        assert_eq!(gt.cell_at(50.0, 250.0, 20, 20), None);
    }

    #[test]
    fn test_validate() {
        assert!(GeoTransform::default().validate().is_ok());
        assert!(GeoTransform::new(0.0, 0.0, 0.0, -1.0).validate().is_err());
        assert!(GeoTransform::new(0.0, f64::NAN, 1.0, -1.0).validate().is_err());
    }

    #[test]
    fn test_shifted_window_origin() {
        let gt = GeoTransform::from_origin(0.0, 10.0, 2.0, 2.0);
        let sub = gt.shifted(1, 3);
        assert_relative_eq!(sub.origin_x, 6.0);
        assert_relative_eq!(sub.origin_y, 8.0);
        assert_relative_eq!(sub.pixel_height, -2.0);
    }

    #[test]
    fn test_bounds() {
        let gt = GeoTransform::new(0.0, 100.0, 1.0, -1.0);
        let (min_x, min_y, max_x, max_y) = gt.bounds(100, 100);

        assert_relative_eq!(min_x, 0.0, epsilon = 1e-10);
        assert_relative_eq!(min_y, 0.0, epsilon = 1e-10);
        assert_relative_eq!(max_x, 100.0, epsilon = 1e-10);
        assert_relative_eq!(max_y, 100.0, epsilon = 1e-10);
        assert_relative_eq!(gt.cell_area(), 1.0);
    }
}
