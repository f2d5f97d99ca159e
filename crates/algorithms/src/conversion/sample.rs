//! Sampling and masking grids with vector data

use geocomp_core::crs::ensure_same_crs;
use geocomp_core::raster::{Raster, RasterElement};
use geocomp_core::vector::{FeatureCollection, Geometry};
use geocomp_core::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::rasterize::{covered_cells, PixelActivation};

/// Lazy, single-pass sequence of cell values at point locations.
///
/// Yields `None` for points outside the grid or on no-data cells. Collect
/// it when random access is needed.
pub struct Samples<'a, T: RasterElement, I> {
    raster: &'a Raster<T>,
    band: usize,
    points: I,
}

impl<T: RasterElement, I: Iterator<Item = (f64, f64)>> Iterator for Samples<'_, T, I> {
    type Item = Option<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let (x, y) = self.points.next()?;
        let value = self
            .raster
            .cell_at(x, y)
            .and_then(|(r, c)| self.raster.read(r, c, self.band).ok())
            .filter(|v| !self.raster.is_nodata(*v));
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.points.size_hint()
    }
}

/// Sample `band` at each `(x, y)` without materializing the results
pub fn sample<T, P>(raster: &Raster<T>, points: P, band: usize) -> Result<Samples<'_, T, P::IntoIter>>
where
    T: RasterElement,
    P: IntoIterator<Item = (f64, f64)>,
{
    if band >= raster.band_count() {
        return Err(Error::BandOutOfRange {
            band,
            count: raster.band_count(),
        });
    }
    Ok(Samples {
        raster,
        band,
        points: points.into_iter(),
    })
}

/// Value of the cell under each point feature, materialized in feature
/// order. Only point features are accepted.
pub fn point_query<T: RasterElement>(raster: &Raster<T>, points: &FeatureCollection, band: usize) -> Result<Vec<Option<T>>> {
    ensure_same_crs(raster.crs(), points.crs())?;
    let coords = points
        .geometries()
        .map(|g| match g {
            Geometry::Point(p) => Ok((p.x(), p.y())),
            other => Err(Error::Unsupported(format!("point query needs points, got {}", other.kind()))),
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(sample(raster, coords, band)?.collect())
}

/// Parameters for [`mask_by_geometries`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaskParams {
    /// Keep every cell a geometry touches, not only cells whose center
    /// lies inside one
    pub all_touched: bool,
    /// Mask the cells inside the geometries instead of those outside
    pub invert: bool,
    /// Shrink the result to the window covering the geometries
    pub crop: bool,
}

/// Set to no-data every cell outside the geometries (inside with
/// `invert`), optionally cropping to their bounding window first.
///
/// Returns `Ok(None)` when cropping and the geometries miss the grid.
pub fn mask_by_geometries<T: RasterElement>(
    raster: &Raster<T>,
    shapes: &FeatureCollection,
    params: &MaskParams,
) -> Result<Option<Raster<T>>> {
    ensure_same_crs(raster.crs(), shapes.crs())?;
    let base = if params.crop && !params.invert {
        match shapes.bounding_box() {
            Some(bbox) => match raster.crop_to_bounds(bbox.as_tuple())? {
                Some(cropped) => cropped,
                None => return Ok(None),
            },
            None => return Ok(None),
        }
    } else {
        raster.clone()
    };

    let activation = if params.all_touched {
        PixelActivation::AllTouched
    } else {
        PixelActivation::CellCenter
    };
    let template = base.template();
    let mut inside = ndarray::Array2::from_elem(template.shape(), false);
    for g in shapes.geometries() {
        for cell in covered_cells(g, &template, activation) {
            inside[cell] = true;
        }
    }

    let nodata = base.nodata_or_default()?;
    let mut out = base;
    let mut masked = 0usize;
    for band in out.bands_mut() {
        for (v, &hit) in band.iter_mut().zip(inside.iter()) {
            if hit == params.invert {
                *v = nodata;
                masked += 1;
            }
        }
    }
    out.set_nodata(Some(nodata));
    debug!(shapes = shapes.len(), masked, ?params, "mask by geometries");
    Ok(Some(out))
}
