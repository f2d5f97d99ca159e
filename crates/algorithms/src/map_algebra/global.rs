//! Global operations
//!
//! Whole-grid reductions, value frequencies, distance fields and mosaics.

use geocomp_core::crs::ensure_same_crs;
use geocomp_core::raster::{GeoTransform, Raster, RasterElement};
use geocomp_core::vector::{FeatureCollection, Geometry};
use geocomp_core::{Error, Result};
use geocomp_parallel::{default_band_rows, map_partitions, row_bands, Mergeable, ProcessingMode};
use ndarray::Array2;
use rstar::RTree;
use std::cmp::Ordering;
use tracing::debug;

use super::zonal::{ZonalStatistic, ZoneStats};
use crate::conversion::{rasterize, vectorize_points, MergeAlg, PixelActivation, RasterizeParams};
use crate::maybe_rayon::*;
use crate::predicates::{prepared_distance, Prepared};

/// Reduce the valid cells of one band, the whole grid being a single zone
pub fn global_statistics<T: RasterElement>(raster: &Raster<T>, band: usize) -> Result<ZoneStats> {
    let data = raster.band(band)?;
    let rows = raster.rows();
    let partitions = row_bands(rows, default_band_rows(rows), 0);
    let partials = map_partitions(partitions, ProcessingMode::Parallel, |b| {
        let mut stats = ZoneStats::default();
        for row in b.start..b.end {
            for &v in data.row(row) {
                match v.to_f64() {
                    Some(x) if !raster.is_nodata(v) => stats.push(x),
                    _ => stats.nodata_count += 1,
                }
            }
        }
        stats
    });
    let mut total = ZoneStats::default();
    for p in partials {
        total.merge(p);
    }
    debug!(band, valid = total.count, nodata = total.nodata_count, "global statistics");
    Ok(total)
}

/// One whole-band reduction; `None` when the band has no valid cell
pub fn global<T: RasterElement>(raster: &Raster<T>, band: usize, stat: ZonalStatistic) -> Result<Option<f64>> {
    Ok(global_statistics(raster, band)?.get(stat))
}

/// Distinct valid values of a band with their cell counts, ascending
pub fn value_counts<T: RasterElement>(raster: &Raster<T>, band: usize) -> Result<Vec<(T, usize)>> {
    let mut values: Vec<T> = raster.valid_cells(band)?.map(|(_, _, v)| v).collect();
    values.sort_unstable_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let mut counts: Vec<(T, usize)> = Vec::new();
    for v in values {
        match counts.last_mut() {
            Some((last, n)) if *last == v => *n += 1,
            _ => counts.push((v, 1)),
        }
    }
    Ok(counts)
}

fn nearest(point: &Prepared<'_>, targets: &[Prepared<'_>]) -> f64 {
    let Some(pb) = point.bbox else {
        return f64::INFINITY;
    };
    let mut order: Vec<(f64, usize)> = targets
        .iter()
        .enumerate()
        .map(|(i, t)| (t.bbox.map_or(0.0, |b| b.distance(&pb)), i))
        .collect();
    order.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));

    let mut best = f64::INFINITY;
    for (gap, i) in order {
        if gap >= best {
            break;
        }
        best = best.min(prepared_distance(point, &targets[i]));
    }
    best
}

/// Distance from every valid cell center of `grid` to the nearest target
/// geometry.
///
/// Valid cells are turned into center points, each point's distance to the
/// target set is measured, and the distances are burned back onto the
/// grid. Cells that are no-data in band 0 of `grid` stay NaN; with no
/// targets every valid cell is infinite.
pub fn distance_to_geometries<T: RasterElement>(grid: &Raster<T>, targets: &FeatureCollection) -> Result<Raster<f64>> {
    ensure_same_crs(grid.crs(), targets.crs())?;
    let points = vectorize_points(grid, 0)?;
    let prepared: Vec<Prepared<'_>> = targets.geometries().map(Prepared::new).collect();
    debug!(cells = points.len(), targets = prepared.len(), "distance field");

    let sources: Vec<&Geometry> = points.geometries().collect();
    let distances: Vec<f64> = sources
        .par_iter()
        .map(|p| nearest(&Prepared::new(p), &prepared))
        .collect();

    let params = RasterizeParams::new(PixelActivation::CellCenter, MergeAlg::ReplaceLast, f64::NAN).with_nodata(f64::NAN);
    rasterize(sources.into_iter().zip(distances), &grid.template(), &params)
}

/// Distance from every valid cell center to the nearest cell center whose
/// value satisfies `is_target`. Target cells are 0; no-data cells stay NaN,
/// and every cell is NaN when there is no target.
pub fn distance_to_cells<T, F>(raster: &Raster<T>, is_target: F) -> Result<Raster<f64>>
where
    T: RasterElement,
    F: Fn(T) -> bool,
{
    let centers: Vec<[f64; 2]> = raster
        .valid_cells(0)?
        .filter(|&(_, _, v)| is_target(v))
        .map(|(r, c, _)| {
            let (x, y) = raster.pixel_to_geo(c, r);
            [x, y]
        })
        .collect();
    debug!(targets = centers.len(), "cell distance field");
    let tree = RTree::bulk_load(centers);

    let mut out = Array2::from_elem(raster.shape(), f64::NAN);
    for (r, c, _) in raster.valid_cells(0)? {
        let (x, y) = raster.pixel_to_geo(c, r);
        if let Some(p) = tree.nearest_neighbor(&[x, y]) {
            out[(r, c)] = (p[0] - x).hypot(p[1] - y);
        }
    }
    raster.with_bands(vec![out], Some(f64::NAN))
}

const ALIGN_TOL: f64 = 1e-6;

fn lattice_offset(base: &GeoTransform, other: &GeoTransform) -> Result<(i64, i64)> {
    if !other.is_axis_aligned()
        || (other.pixel_width - base.pixel_width).abs() > ALIGN_TOL * base.pixel_width.abs()
        || (other.pixel_height - base.pixel_height).abs() > ALIGN_TOL * base.pixel_height.abs()
    {
        return Err(Error::TransformMismatch);
    }
    let col = (other.origin_x - base.origin_x) / base.pixel_width;
    let row = (other.origin_y - base.origin_y) / base.pixel_height;
    if (col - col.round()).abs() > ALIGN_TOL || (row - row.round()).abs() > ALIGN_TOL {
        return Err(Error::TransformMismatch);
    }
    Ok((row.round() as i64, col.round() as i64))
}

/// Mosaic co-aligned grids into their union extent.
///
/// Inputs must share cell size, CRS and band count, be axis-aligned and sit
/// on the same lattice. Where they overlap the first valid value in input
/// order wins. The output uses the first input's no-data value (or the
/// type default) for cells no input covers; a valid input value equal to
/// that sentinel fails with [`Error::NoDataInUse`].
pub fn merge_rasters<T: RasterElement>(rasters: &[Raster<T>]) -> Result<Raster<T>> {
    let Some(first) = rasters.first() else {
        return Err(Error::InvalidParameter {
            name: "rasters",
            value: "[]".into(),
            reason: "at least one grid is required".into(),
        });
    };
    let base = *first.transform();
    if !base.is_axis_aligned() {
        return Err(Error::Unsupported("mosaic of rotated grids".into()));
    }

    let mut placed = Vec::with_capacity(rasters.len());
    let (mut r0, mut c0, mut r1, mut c1) = (i64::MAX, i64::MAX, i64::MIN, i64::MIN);
    for raster in rasters {
        ensure_same_crs(first.crs(), raster.crs())?;
        if raster.band_count() != first.band_count() {
            return Err(Error::InvalidParameter {
                name: "rasters",
                value: raster.band_count().to_string(),
                reason: format!("band count differs from the first grid ({})", first.band_count()),
            });
        }
        let (row, col) = lattice_offset(&base, raster.transform())?;
        r0 = r0.min(row);
        c0 = c0.min(col);
        r1 = r1.max(row + raster.rows() as i64);
        c1 = c1.max(col + raster.cols() as i64);
        placed.push((raster, row, col));
    }

    let (rows, cols) = ((r1 - r0) as usize, (c1 - c0) as usize);
    let nodata = first.nodata_or_default()?;
    debug!(inputs = rasters.len(), rows, cols, "merge rasters");

    let mut bands = vec![Array2::from_elem((rows, cols), nodata); first.band_count()];
    let mut filled = vec![Array2::from_elem((rows, cols), false); first.band_count()];
    for (raster, row, col) in placed {
        let (dr, dc) = ((row - r0) as usize, (col - c0) as usize);
        for (b, (out, done)) in bands.iter_mut().zip(filled.iter_mut()).enumerate() {
            for (r, c, v) in raster.valid_cells(b)? {
                if v == nodata {
                    return Err(Error::NoDataInUse {
                        value: v.to_string(),
                        dtype: T::data_type().name(),
                    });
                }
                let cell = (r + dr, c + dc);
                if !done[cell] {
                    out[cell] = v;
                    done[cell] = true;
                }
            }
        }
    }

    let transform = GeoTransform {
        origin_x: base.origin_x + c0 as f64 * base.pixel_width,
        origin_y: base.origin_y + r0 as f64 * base.pixel_height,
        ..base
    };
    let mut out = Raster::from_bands(bands, transform, first.crs().cloned(), None)?;
    out.set_nodata(Some(nodata));
    Ok(out)
}
