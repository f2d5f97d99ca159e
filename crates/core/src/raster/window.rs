//! Rectangular sub-windows and grid templates

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use ndarray::Array2;

/// A rectangular block of cells: offset of its upper-left cell plus size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Window {
    pub row_off: usize,
    pub col_off: usize,
    pub height: usize,
    pub width: usize,
}

impl Window {
    pub fn new(row_off: usize, col_off: usize, height: usize, width: usize) -> Self {
        Self {
            row_off,
            col_off,
            height,
            width,
        }
    }

    /// Window covering a whole `rows x cols` grid
    pub fn full(rows: usize, cols: usize) -> Self {
        Self::new(0, 0, rows, cols)
    }

    pub fn row_end(&self) -> usize {
        self.row_off + self.height
    }

    pub fn col_end(&self) -> usize {
        self.col_off + self.width
    }

    pub fn is_empty(&self) -> bool {
        self.height == 0 || self.width == 0
    }

    /// Fail with [`Error::IndexOutOfBounds`] unless the window lies inside the grid
    pub fn check_within(&self, rows: usize, cols: usize) -> Result<()> {
        if self.is_empty() {
            return Err(Error::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }
        if self.row_end() > rows || self.col_end() > cols {
            return Err(Error::IndexOutOfBounds {
                row: self.row_end() - 1,
                col: self.col_end() - 1,
                rows,
                cols,
            });
        }
        Ok(())
    }

    /// Window of the cells of a `rows x cols` grid touched by a fractional
    /// pixel-space rectangle, or `None` when they do not overlap.
    pub fn from_pixel_bounds(
        col_min: f64,
        row_min: f64,
        col_max: f64,
        row_max: f64,
        rows: usize,
        cols: usize,
    ) -> Option<Self> {
        let c0 = col_min.floor().max(0.0);
        let r0 = row_min.floor().max(0.0);
        let c1 = col_max.ceil().min(cols as f64);
        let r1 = row_max.ceil().min(rows as f64);
        if !(c0 < c1 && r0 < r1) {
            return None;
        }
        let (c0, r0) = (c0 as usize, r0 as usize);
        Some(Self::new(r0, c0, r1 as usize - r0, c1 as usize - c0))
    }
}

/// Shape and georeferencing of a grid, without cell storage.
///
/// Used as the target of rasterization and as the unit of co-registration.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterTemplate {
    pub rows: usize,
    pub cols: usize,
    pub transform: GeoTransform,
    pub crs: Option<CRS>,
}

impl RasterTemplate {
    pub fn new(rows: usize, cols: usize, transform: GeoTransform, crs: Option<CRS>) -> Result<Self> {
        if rows == 0 || cols == 0 {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }
        transform.validate()?;
        Ok(Self {
            rows,
            cols,
            transform,
            crs,
        })
    }

    /// North-up template covering `(min_x, min_y, max_x, max_y)` with square
    /// cells of size `res`; partial cells at the east and south edges are kept.
    pub fn from_bounds(bounds: (f64, f64, f64, f64), res: f64, crs: Option<CRS>) -> Result<Self> {
        let (min_x, min_y, max_x, max_y) = bounds;
        if !(res > 0.0) || !res.is_finite() {
            return Err(Error::InvalidParameter {
                name: "res",
                value: res.to_string(),
                reason: "cell size must be positive".into(),
            });
        }
        let rows = ((max_y - min_y) / res).ceil().max(1.0) as usize;
        let cols = ((max_x - min_x) / res).ceil().max(1.0) as usize;
        Self::new(rows, cols, GeoTransform::from_origin(min_x, max_y, res, res), crs)
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Allocate a single-band raster on this template filled with `value`
    pub fn allocate<T: RasterElement>(&self, value: T, nodata: Option<T>) -> Raster<T> {
        let mut raster = Raster::from_array(Array2::from_elem((self.rows, self.cols), value));
        raster.set_transform(self.transform);
        raster.set_crs(self.crs.clone());
        raster.set_nodata(nodata);
        raster
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_bounds_check() {
        assert!(Window::new(1, 1, 2, 2).check_within(3, 3).is_ok());
        assert!(matches!(
            Window::new(2, 0, 2, 1).check_within(3, 3),
            Err(Error::IndexOutOfBounds { .. })
        ));
        assert!(Window::new(0, 0, 0, 1).check_within(3, 3).is_err());
    }

    #[test]
    fn test_window_from_pixel_bounds_clamps() {
        let w = Window::from_pixel_bounds(-1.5, 0.2, 2.1, 9.0, 5, 5).unwrap();
        assert_eq!(w, Window::new(0, 0, 5, 3));
        assert!(Window::from_pixel_bounds(6.0, 0.0, 8.0, 1.0, 5, 5).is_none());
    }

    #[test]
    fn test_template_from_bounds_rounds_up() {
        let t = RasterTemplate::from_bounds((0.0, 0.0, 2500.0, 1200.0), 1000.0, None).unwrap();
        assert_eq!(t.shape(), (2, 3));
        assert_eq!(t.transform.origin_y, 1200.0);
        assert_eq!(t.transform.pixel_height, -1000.0);
    }
}
