//! Main Raster type

use crate::crs::{ensure_same_crs, CRS};
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, RasterElement, RasterTemplate, Window};
use ndarray::{s, Array2, ArrayView2, ArrayViewMut2};

/// A georeferenced grid with one or more bands of identical shape.
///
/// Band 0 is the "primary" band: the short accessors (`get`, `set`, `data`,
/// `view`) address it, band-aware code goes through `read`/`write`/`band`.
/// Every band shares the same transform, CRS and no-data sentinel.
///
/// # Example
///
/// ```ignore
/// use geocomp_core::Raster;
///
/// let mut raster: Raster<f32> = Raster::new(100, 100);
/// raster.set(10, 20, 42.0)?;
/// let value = raster.get(10, 20)?;
/// ```
#[derive(Debug, Clone)]
pub struct Raster<T: RasterElement> {
    /// Band stack, each stored row-major (row, col). Never empty.
    bands: Vec<Array2<T>>,
    transform: GeoTransform,
    crs: Option<CRS>,
    nodata: Option<T>,
}

impl<T: RasterElement> Raster<T> {
    /// Create a new single-band raster filled with zeros
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::from_array(Array2::zeros((rows, cols)))
    }

    /// Create a new single-band raster filled with a specific value
    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Self::from_array(Array2::from_elem((rows, cols), value))
    }

    /// Create a single-band raster from row-major data
    pub fn from_vec(data: Vec<T>, rows: usize, cols: usize) -> Result<Self> {
        if rows == 0 || cols == 0 || data.len() != rows * cols {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }

        let array = Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| Error::Other(e.to_string()))?;
        Ok(Self::from_array(array))
    }

    /// Create a single-band raster from an ndarray
    pub fn from_array(data: Array2<T>) -> Self {
        Self {
            bands: vec![data],
            transform: GeoTransform::default(),
            crs: None,
            nodata: None,
        }
    }

    /// Validated constructor used when ingesting grids from outside.
    ///
    /// Checks that there is at least one non-empty band, that all bands
    /// share a shape, that the transform is invertible and that the
    /// declared no-data value is representable in `T`.
    pub fn from_bands(
        bands: Vec<Array2<T>>,
        transform: GeoTransform,
        crs: Option<CRS>,
        nodata: Option<f64>,
    ) -> Result<Self> {
        let Some(first) = bands.first() else {
            return Err(Error::InvalidDimensions {
                width: 0,
                height: 0,
            });
        };
        let (rows, cols) = first.dim();
        if rows == 0 || cols == 0 {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }
        if let Some(other) = bands.iter().find(|b| b.dim() != (rows, cols)) {
            return Err(Error::ShapeMismatch {
                er: rows,
                ec: cols,
                ar: other.nrows(),
                ac: other.ncols(),
            });
        }
        transform.validate()?;

        let nodata = match nodata {
            None => None,
            Some(v) => Some(T::from_f64_exact(v).ok_or(Error::NoDataNotRepresentable {
                value: v,
                dtype: T::data_type().name(),
            })?),
        };

        Ok(Self {
            bands,
            transform,
            crs,
            nodata,
        })
    }

    /// Create a single-band raster with the same georeferencing but another
    /// cell type. The no-data sentinel is not carried over.
    pub fn with_same_meta<U: RasterElement>(&self, rows: usize, cols: usize) -> Raster<U> {
        Raster {
            bands: vec![Array2::zeros((rows, cols))],
            transform: self.transform,
            crs: self.crs.clone(),
            nodata: None,
        }
    }

    /// Single-band raster with the same shape and metadata, filled with a value
    pub fn like(&self, fill_value: T) -> Self {
        Self {
            bands: vec![Array2::from_elem(self.shape(), fill_value)],
            transform: self.transform,
            crs: self.crs.clone(),
            nodata: self.nodata,
        }
    }

    /// Replace the band stack while keeping georeferencing.
    pub fn with_bands<U: RasterElement>(&self, bands: Vec<Array2<U>>, nodata: Option<U>) -> Result<Raster<U>> {
        let (rows, cols) = self.shape();
        if bands.is_empty() {
            return Err(Error::InvalidDimensions { width: 0, height: 0 });
        }
        if let Some(other) = bands.iter().find(|b| b.dim() != (rows, cols)) {
            return Err(Error::ShapeMismatch {
                er: rows,
                ec: cols,
                ar: other.nrows(),
                ac: other.ncols(),
            });
        }
        Ok(Raster {
            bands,
            transform: self.transform,
            crs: self.crs.clone(),
            nodata,
        })
    }

    /// Shape, transform and CRS of this grid
    pub fn template(&self) -> RasterTemplate {
        RasterTemplate {
            rows: self.rows(),
            cols: self.cols(),
            transform: self.transform,
            crs: self.crs.clone(),
        }
    }

    // Dimensions

    pub fn rows(&self) -> usize {
        self.bands[0].nrows()
    }

    pub fn cols(&self) -> usize {
        self.bands[0].ncols()
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.bands[0].dim()
    }

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    /// Number of cells per band
    pub fn len(&self) -> usize {
        self.bands[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.bands[0].is_empty()
    }

    fn out_of_bounds(&self, row: usize, col: usize) -> Error {
        Error::IndexOutOfBounds {
            row,
            col,
            rows: self.rows(),
            cols: self.cols(),
        }
    }

    fn check_band(&self, band: usize) -> Result<()> {
        if band >= self.bands.len() {
            return Err(Error::BandOutOfRange {
                band,
                count: self.bands.len(),
            });
        }
        Ok(())
    }

    // Data access

    /// Value at (row, col) of band 0
    pub fn get(&self, row: usize, col: usize) -> Result<T> {
        self.read(row, col, 0)
    }

    /// Value at (row, col) of `band`
    pub fn read(&self, row: usize, col: usize, band: usize) -> Result<T> {
        self.check_band(band)?;
        self.bands[band]
            .get((row, col))
            .copied()
            .ok_or_else(|| self.out_of_bounds(row, col))
    }

    /// Set value at (row, col) of band 0
    pub fn set(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        self.write(row, col, 0, value)
    }

    pub fn write(&mut self, row: usize, col: usize, band: usize, value: T) -> Result<()> {
        self.check_band(band)?;
        if row >= self.rows() || col >= self.cols() {
            return Err(self.out_of_bounds(row, col));
        }
        self.bands[band][(row, col)] = value;
        Ok(())
    }

    pub fn view(&self) -> ArrayView2<'_, T> {
        self.bands[0].view()
    }

    pub fn view_mut(&mut self) -> ArrayViewMut2<'_, T> {
        self.bands[0].view_mut()
    }

    /// Band 0 as an array
    pub fn data(&self) -> &Array2<T> {
        &self.bands[0]
    }

    pub fn data_mut(&mut self) -> &mut Array2<T> {
        &mut self.bands[0]
    }

    pub fn band(&self, band: usize) -> Result<&Array2<T>> {
        self.check_band(band)?;
        Ok(&self.bands[band])
    }

    pub fn band_mut(&mut self, band: usize) -> Result<&mut Array2<T>> {
        self.check_band(band)?;
        Ok(&mut self.bands[band])
    }

    pub fn bands(&self) -> &[Array2<T>] {
        &self.bands
    }

    pub fn bands_mut(&mut self) -> &mut [Array2<T>] {
        &mut self.bands
    }

    /// Consume the raster and return band 0
    pub fn into_array(mut self) -> Array2<T> {
        self.bands.swap_remove(0)
    }

    pub fn into_bands(self) -> Vec<Array2<T>> {
        self.bands
    }

    /// Borrowed view of a window of one band; no cells are copied
    pub fn window_view(&self, window: Window, band: usize) -> Result<ArrayView2<'_, T>> {
        self.check_band(band)?;
        window.check_within(self.rows(), self.cols())?;
        Ok(self.bands[band].slice(s![
            window.row_off..window.row_end(),
            window.col_off..window.col_end()
        ]))
    }

    /// Copy a window of every band into a new raster whose transform is
    /// shifted so each cell keeps its world position.
    pub fn read_window(&self, window: Window) -> Result<Raster<T>> {
        window.check_within(self.rows(), self.cols())?;
        let bands = self
            .bands
            .iter()
            .map(|b| {
                b.slice(s![
                    window.row_off..window.row_end(),
                    window.col_off..window.col_end()
                ])
                .to_owned()
            })
            .collect();
        Ok(Raster {
            bands,
            transform: self.transform.shifted(window.row_off, window.col_off),
            crs: self.crs.clone(),
            nodata: self.nodata,
        })
    }

    /// Crop to the cells touched by a world-space bounding box
    /// `(min_x, min_y, max_x, max_y)`; `None` when it misses the grid.
    pub fn crop_to_bounds(&self, bounds: (f64, f64, f64, f64)) -> Result<Option<Raster<T>>> {
        let (min_x, min_y, max_x, max_y) = bounds;
        let corners = [
            self.transform.geo_to_pixel(min_x, min_y),
            self.transform.geo_to_pixel(min_x, max_y),
            self.transform.geo_to_pixel(max_x, min_y),
            self.transform.geo_to_pixel(max_x, max_y),
        ];
        let col_min = corners.iter().map(|c| c.0).fold(f64::INFINITY, f64::min);
        let col_max = corners.iter().map(|c| c.0).fold(f64::NEG_INFINITY, f64::max);
        let row_min = corners.iter().map(|c| c.1).fold(f64::INFINITY, f64::min);
        let row_max = corners.iter().map(|c| c.1).fold(f64::NEG_INFINITY, f64::max);

        match Window::from_pixel_bounds(col_min, row_min, col_max, row_max, self.rows(), self.cols()) {
            Some(window) => self.read_window(window).map(Some),
            None => Ok(None),
        }
    }

    // Metadata

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: GeoTransform) {
        self.transform = transform;
    }

    pub fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    pub fn set_crs(&mut self, crs: Option<CRS>) {
        self.crs = crs;
    }

    pub fn nodata(&self) -> Option<T> {
        self.nodata
    }

    pub fn set_nodata(&mut self, nodata: Option<T>) {
        self.nodata = nodata;
    }

    /// Sentinel for operations that introduce no-data cells: the declared
    /// one, else [`RasterElement::default_nodata`]. Fails with
    /// [`Error::NoDataInUse`] when the default already holds a valid value
    /// somewhere in the grid.
    pub fn nodata_or_default(&self) -> Result<T> {
        if let Some(nodata) = self.nodata {
            return Ok(nodata);
        }
        let fallback = T::default_nodata();
        if self.bands.iter().any(|b| b.iter().any(|&v| v == fallback)) {
            return Err(Error::NoDataInUse {
                value: fallback.to_string(),
                dtype: T::data_type().name(),
            });
        }
        Ok(fallback)
    }

    /// Cell size (assumes square cells)
    pub fn cell_size(&self) -> f64 {
        self.transform.cell_size()
    }

    /// Geographic bounds (min_x, min_y, max_x, max_y)
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.transform.bounds(self.cols(), self.rows())
    }

    /// Fail unless `other` has the same shape, transform and CRS
    pub fn ensure_co_registered<U: RasterElement>(&self, other: &Raster<U>) -> Result<()> {
        if self.shape() != other.shape() {
            return Err(Error::ShapeMismatch {
                er: self.rows(),
                ec: self.cols(),
                ar: other.rows(),
                ac: other.cols(),
            });
        }
        if !self.transform.approx_eq(&other.transform, 1e-9) {
            return Err(Error::TransformMismatch);
        }
        ensure_same_crs(self.crs(), other.crs())
    }

    // Coordinate conversion

    /// World coordinates of the center of (col, row)
    pub fn pixel_to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        self.transform.pixel_to_geo(col, row)
    }

    /// Fractional (col, row) of a world position
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        self.transform.geo_to_pixel(x, y)
    }

    /// Cell containing a world position, if inside the grid
    pub fn cell_at(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        self.transform.cell_at(x, y, self.rows(), self.cols())
    }

    // Value checks

    pub fn is_nodata(&self, value: T) -> bool {
        value.is_nodata(self.nodata)
    }

    /// Check if cell at (row, col) of band 0 contains no-data
    pub fn is_nodata_at(&self, row: usize, col: usize) -> Result<bool> {
        let value = self.get(row, col)?;
        Ok(self.is_nodata(value))
    }

    /// Iterate the valid cells of a band as `(row, col, value)`
    pub fn valid_cells(&self, band: usize) -> Result<impl Iterator<Item = (usize, usize, T)> + '_> {
        self.check_band(band)?;
        let nodata = self.nodata;
        Ok(self.bands[band]
            .indexed_iter()
            .filter(move |(_, v)| !v.is_nodata(nodata))
            .map(|((r, c), &v)| (r, c, v)))
    }

    // Statistics

    /// Basic statistics over the valid cells of band 0
    pub fn statistics(&self) -> RasterStatistics<T> {
        self.band_statistics_unchecked(0)
    }

    pub fn band_statistics(&self, band: usize) -> Result<RasterStatistics<T>> {
        self.check_band(band)?;
        Ok(self.band_statistics_unchecked(band))
    }

    fn band_statistics_unchecked(&self, band: usize) -> RasterStatistics<T> {
        let mut min: Option<T> = None;
        let mut max: Option<T> = None;
        let mut sum: f64 = 0.0;
        let mut count: usize = 0;

        for &value in self.bands[band].iter() {
            if self.is_nodata(value) {
                continue;
            }
            if min.is_none_or(|m| value < m) {
                min = Some(value);
            }
            if max.is_none_or(|m| value > m) {
                max = Some(value);
            }
            if let Some(v) = value.to_f64() {
                sum += v;
                count += 1;
            }
        }

        let mean = if count > 0 {
            Some(sum / count as f64)
        } else {
            None
        };

        RasterStatistics {
            min,
            max,
            sum,
            mean,
            valid_count: count,
            nodata_count: self.len() - count,
        }
    }
}

/// Basic statistics for a raster band
#[derive(Debug, Clone)]
pub struct RasterStatistics<T> {
    pub min: Option<T>,
    pub max: Option<T>,
    pub sum: f64,
    pub mean: Option<f64>,
    pub valid_count: usize,
    pub nodata_count: usize,
}
