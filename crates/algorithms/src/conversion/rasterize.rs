//! Rasterization: burn geometries into a grid
//!
//! Coverage is computed in pixel space (the geometry is mapped through the
//! inverse transform), so rotated grids are handled like north-up ones.
//! Polygons use an even-odd scanline through cell centers; lines are
//! traversed column strip by column strip, which yields every cell the
//! segment passes through.

use geo::Coord;
use geocomp_core::crs::ensure_same_crs;
use geocomp_core::raster::{GeoTransform, Raster, RasterElement, RasterTemplate};
use geocomp_core::vector::{FeatureCollection, Geometry};
use geocomp_core::{Algorithm, Error, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::maybe_rayon::*;

/// Which cells a geometry activates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelActivation {
    /// Cells whose center lies inside the geometry. Lines and points still
    /// burn every cell they pass through.
    CellCenter,
    /// Every cell whose footprint the geometry touches
    AllTouched,
}

/// Resolution of several geometries targeting the same cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeAlg {
    ReplaceLast,
    ReplaceFirst,
    Min,
    Max,
    Sum,
}

/// Rasterization parameters. Activation, merge policy and fill are all
/// required; none of them has a default.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RasterizeParams {
    pub activation: PixelActivation,
    pub merge: MergeAlg,
    /// Value of cells no geometry touches
    pub fill: f64,
    /// Sentinel declared on the output grid
    pub nodata: Option<f64>,
}

impl RasterizeParams {
    pub fn new(activation: PixelActivation, merge: MergeAlg, fill: f64) -> Self {
        Self {
            activation,
            merge,
            fill,
            nodata: None,
        }
    }

    pub fn with_nodata(mut self, nodata: f64) -> Self {
        self.nodata = Some(nodata);
        self
    }
}

type PixelEdge = ((f64, f64), (f64, f64));

fn to_pixel(t: &GeoTransform, c: Coord<f64>) -> (f64, f64) {
    t.geo_to_pixel(c.x, c.y)
}

/// Cells of the span `[lo, hi]` along one axis of length `n`; a span that
/// ends exactly on a cell boundary does not enter the next cell.
fn span(lo: f64, hi: f64, n: usize) -> Option<(usize, usize)> {
    let first = lo.floor();
    let mut last = hi.floor();
    if hi > lo && hi == last {
        last -= 1.0;
    }
    let first = first.max(0.0);
    let last = last.min(n as f64 - 1.0);
    (first <= last).then(|| (first as usize, last as usize))
}

/// Every cell a pixel-space segment passes through
fn segment_cells(a: (f64, f64), b: (f64, f64), rows: usize, cols: usize, out: &mut Vec<(usize, usize)>) {
    let ((x0, y0), (x1, y1)) = if a.0 <= b.0 { (a, b) } else { (b, a) };
    if !(x0.is_finite() && y0.is_finite() && x1.is_finite() && y1.is_finite()) {
        return;
    }
    let dx = x1 - x0;
    let y_at = |x: f64| if dx == 0.0 { y0 } else { y0 + (x - x0) * (y1 - y0) / dx };

    let Some((c0, c1)) = span(x0, x1, cols) else {
        return;
    };
    for c in c0..=c1 {
        let xa = x0.max(c as f64);
        let xb = x1.min(c as f64 + 1.0);
        if xb < xa || (dx != 0.0 && xb == xa) {
            continue;
        }
        let (ya, yb) = if dx == 0.0 { (y0, y1) } else { (y_at(xa), y_at(xb)) };
        let (ylo, yhi) = (ya.min(yb), ya.max(yb));
        if let Some((r0, r1)) = span(ylo, yhi, rows) {
            out.extend((r0..=r1).map(|r| (r, c)));
        }
    }
}

/// Cells whose center lies inside the rings (even-odd rule)
fn scanline_cells(edges: &[PixelEdge], rows: usize, cols: usize, out: &mut Vec<(usize, usize)>) {
    let (ymin, ymax) = edges
        .iter()
        .flat_map(|(a, b)| [a.1, b.1])
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), y| (lo.min(y), hi.max(y)));
    if !(ymin.is_finite() && ymax.is_finite()) {
        return;
    }
    let r0 = (ymin - 0.5).ceil().max(0.0) as usize;
    let r1 = ((ymax - 0.5).floor().min(rows as f64 - 1.0)).max(-1.0);
    if r1 < 0.0 {
        return;
    }

    let mut xs = Vec::new();
    for r in r0..=(r1 as usize) {
        let yc = r as f64 + 0.5;
        xs.clear();
        for &((xa, ya), (xb, yb)) in edges {
            if (ya <= yc) != (yb <= yc) {
                xs.push(xa + (yc - ya) * (xb - xa) / (yb - ya));
            }
        }
        xs.sort_by(|a, b| a.total_cmp(b));
        for pair in xs.chunks_exact(2) {
            let start = (pair[0] - 0.5).ceil().max(0.0);
            let end = (pair[1] - 0.5).ceil().min(cols as f64);
            if start < end {
                out.extend((start as usize..end as usize).map(|c| (r, c)));
            }
        }
    }
}

/// Sorted, de-duplicated cells activated by one geometry
pub(crate) fn covered_cells(geom: &Geometry, template: &RasterTemplate, activation: PixelActivation) -> Vec<(usize, usize)> {
    let (rows, cols) = template.shape();
    let t = &template.transform;
    let mut cells = Vec::new();

    match geom.dimension() {
        0 => {
            for c in geom.vertices() {
                if let Some(cell) = t.cell_at(c.x, c.y, rows, cols) {
                    cells.push(cell);
                }
            }
        }
        1 => {
            for (a, b) in geom.segments() {
                segment_cells(to_pixel(t, a), to_pixel(t, b), rows, cols, &mut cells);
            }
        }
        _ => {
            for polygon in geom.to_multi_polygon().into_iter().flat_map(|mp| mp.0) {
                let edges: Vec<PixelEdge> = std::iter::once(polygon.exterior())
                    .chain(polygon.interiors())
                    .flat_map(|ring| ring.lines())
                    .map(|l| (to_pixel(t, l.start), to_pixel(t, l.end)))
                    .collect();
                scanline_cells(&edges, rows, cols, &mut cells);
                if activation == PixelActivation::AllTouched {
                    for &(a, b) in &edges {
                        segment_cells(a, b, rows, cols, &mut cells);
                    }
                }
            }
        }
    }
    cells.sort_unstable();
    cells.dedup();
    cells
}

fn convert<T: RasterElement>(value: f64, what: &'static str) -> Result<T> {
    T::from_f64_exact(value).ok_or(Error::InvalidParameter {
        name: what,
        value: value.to_string(),
        reason: format!("not representable as {}", T::data_type()),
    })
}

/// Burn `(geometry, value)` pairs into a new grid on `template`.
///
/// Geometries are applied in order; when several reach the same cell the
/// merge policy decides. A geometry counts once per cell even if several
/// of its parts reach it. `Sum` fails with [`Error::TypeOverflow`] rather
/// than wrap.
pub fn rasterize<'a, T: RasterElement>(
    shapes: impl IntoIterator<Item = (&'a Geometry, T)>,
    template: &RasterTemplate,
    params: &RasterizeParams,
) -> Result<Raster<T>> {
    let fill: T = convert(params.fill, "fill")?;
    let nodata = params.nodata.map(|v| convert::<T>(v, "nodata")).transpose()?;
    let shapes: Vec<(&Geometry, T)> = shapes.into_iter().collect();
    debug!(
        shapes = shapes.len(),
        rows = template.rows,
        cols = template.cols,
        activation = ?params.activation,
        merge = ?params.merge,
        "rasterize"
    );

    let coverage: Vec<Vec<(usize, usize)>> = shapes
        .par_iter()
        .map(|(g, _)| covered_cells(g, template, params.activation))
        .collect();

    let mut out = template.allocate(fill, nodata);
    let mut touched = ndarray::Array2::from_elem(template.shape(), false);
    let grid = out.data_mut();
    for ((_, value), cells) in shapes.iter().zip(&coverage) {
        let value = *value;
        for &cell in cells {
            let current = grid[cell];
            grid[cell] = if !touched[cell] {
                value
            } else {
                match params.merge {
                    MergeAlg::ReplaceLast => value,
                    MergeAlg::ReplaceFirst => current,
                    MergeAlg::Min if value < current => value,
                    MergeAlg::Max if value > current => value,
                    MergeAlg::Min | MergeAlg::Max => current,
                    MergeAlg::Sum => current.try_add(value).ok_or_else(|| Error::TypeOverflow {
                        value: format!("{current} + {value}"),
                        target: T::data_type().name(),
                    })?,
                }
            };
            touched[cell] = true;
        }
    }
    Ok(out)
}

/// Rasterize a feature collection, burning attribute `field` (or 1 when
/// `field` is `None`). Features whose value is null are skipped.
pub fn rasterize_collection<T: RasterElement>(
    fc: &FeatureCollection,
    field: Option<&str>,
    template: &RasterTemplate,
    params: &RasterizeParams,
) -> Result<Raster<T>> {
    ensure_same_crs(fc.crs(), template.crs.as_ref())?;
    let col = field.map(|f| fc.schema().require(f)).transpose()?;
    let mut shapes = Vec::with_capacity(fc.len());
    for feature in fc.iter() {
        let value = match col {
            None => T::one(),
            Some(c) => match &feature.properties[c] {
                v if v.is_null() => continue,
                v => {
                    let x = v.as_f64().ok_or_else(|| {
                        Error::SchemaMismatch(format!("field {} is not numeric", field.unwrap_or_default()))
                    })?;
                    T::from_f64_exact(x).ok_or(Error::TypeOverflow {
                        value: x.to_string(),
                        target: T::data_type().name(),
                    })?
                }
            },
        };
        shapes.push((&feature.geometry, value));
    }
    rasterize(shapes, template, params)
}

/// [`rasterize`] as an [`Algorithm`] over float values
#[derive(Debug, Clone, Default)]
pub struct Rasterize;

impl Algorithm for Rasterize {
    type Input = (Vec<(Geometry, f64)>, RasterTemplate);
    type Output = Raster<f64>;
    type Params = RasterizeParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Rasterize"
    }

    fn description(&self) -> &'static str {
        "Burn geometries into a grid with explicit activation and merge policies"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        let (shapes, template) = input;
        rasterize(shapes.iter().map(|(g, v)| (g, *v)), &template, &params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geocomp_core::vector::{AttributeValue, FieldType};
    use geocomp_core::CRS;

    fn template() -> RasterTemplate {
        RasterTemplate::from_bounds((0.0, 0.0, 4.0, 4.0), 1.0, None).unwrap()
    }

    fn burned(r: &Raster<u8>) -> Vec<(usize, usize)> {
        r.data()
            .indexed_iter()
            .filter(|(_, v)| **v != 0)
            .map(|(ij, _)| ij)
            .collect()
    }

    #[test]
    fn test_polygon_cell_center_vs_all_touched() {
        let square = Geometry::rect(0.2, 0.2, 2.2, 2.2).unwrap();
        let center = RasterizeParams::new(PixelActivation::CellCenter, MergeAlg::ReplaceLast, 0.0);
        let r: Raster<u8> = rasterize([(&square, 1u8)], &template(), &center).unwrap();
        assert_eq!(burned(&r), vec![(2, 0), (2, 1), (3, 0), (3, 1)]);

        let touched = RasterizeParams::new(PixelActivation::AllTouched, MergeAlg::ReplaceLast, 0.0);
        let r: Raster<u8> = rasterize([(&square, 1u8)], &template(), &touched).unwrap();
        assert_eq!(burned(&r).len(), 9);
        assert_eq!(r.get(1, 2).unwrap(), 1);
    }

    #[test]
    fn test_polygon_hole_not_burned() {
        let ring = Geometry::polygon(
            &[(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0), (0.0, 0.0)],
            &[vec![(1.0, 1.0), (3.0, 1.0), (3.0, 3.0), (1.0, 3.0), (1.0, 1.0)]],
        )
        .unwrap();
        let params = RasterizeParams::new(PixelActivation::CellCenter, MergeAlg::ReplaceLast, 0.0);
        let r: Raster<u8> = rasterize([(&ring, 1u8)], &template(), &params).unwrap();
        assert_eq!(burned(&r).len(), 12);
        assert_eq!(r.get(1, 1).unwrap(), 0);
        assert_eq!(r.get(2, 2).unwrap(), 0);
    }

    #[test]
    fn test_thin_line_burns_cells() {
        let line = Geometry::line_string(&[(0.0, 0.0), (4.0, 4.0)]).unwrap();
        let params = RasterizeParams::new(PixelActivation::AllTouched, MergeAlg::ReplaceLast, 0.0);
        let r: Raster<u8> = rasterize([(&line, 1u8)], &template(), &params).unwrap();
        assert_eq!(burned(&r), vec![(0, 3), (1, 2), (2, 1), (3, 0)]);
    }

    #[test]
    fn test_points_and_fill() {
        let pts = Geometry::multi_point(&[(0.5, 3.5), (3.9, 0.1), (10.0, 10.0)]).unwrap();
        let params = RasterizeParams::new(PixelActivation::CellCenter, MergeAlg::Sum, -1.0).with_nodata(-1.0);
        let r: Raster<i16> = rasterize([(&pts, 7i16)], &template(), &params).unwrap();
        assert_eq!(r.get(0, 0).unwrap(), 7);
        assert_eq!(r.get(3, 3).unwrap(), 7);
        assert_eq!(r.get(1, 1).unwrap(), -1);
        assert_eq!(r.nodata(), Some(-1));
    }

    #[test]
    fn test_merge_policies() {
        let a = Geometry::rect(0.0, 0.0, 2.0, 2.0).unwrap();
        let b = Geometry::rect(1.0, 1.0, 3.0, 3.0).unwrap();
        let at_overlap = |merge| {
            let params = RasterizeParams::new(PixelActivation::CellCenter, merge, 0.0);
            let r: Raster<f32> = rasterize([(&a, 1.0f32), (&b, 2.0f32)], &template(), &params).unwrap();
            r.get(2, 1).unwrap()
        };
        assert_eq!(at_overlap(MergeAlg::ReplaceLast), 2.0);
        assert_eq!(at_overlap(MergeAlg::ReplaceFirst), 1.0);
        assert_eq!(at_overlap(MergeAlg::Min), 1.0);
        assert_eq!(at_overlap(MergeAlg::Max), 2.0);
        assert_eq!(at_overlap(MergeAlg::Sum), 3.0);
    }

    #[test]
    fn test_sum_overflow_reported() {
        let a = Geometry::rect(0.0, 0.0, 1.0, 1.0).unwrap();
        let params = RasterizeParams::new(PixelActivation::CellCenter, MergeAlg::Sum, 0.0);
        let err = rasterize::<u8>([(&a, 200u8), (&a, 100u8)], &template(), &params).unwrap_err();
        assert!(matches!(err, Error::TypeOverflow { .. }));
    }

    #[test]
    fn test_collection_field_and_crs() {
        let fc = FeatureCollection::from_geometries(
            vec![Geometry::rect(0.0, 0.0, 1.0, 1.0).unwrap(), Geometry::rect(3.0, 3.0, 4.0, 4.0).unwrap()],
            None,
        )
        .unwrap()
        .with_column("code", FieldType::Integer, vec![3i64.into(), AttributeValue::Null])
        .unwrap();
        let params = RasterizeParams::new(PixelActivation::CellCenter, MergeAlg::ReplaceLast, 0.0);
        let r: Raster<i32> = rasterize_collection(&fc, Some("code"), &template(), &params).unwrap();
        assert_eq!(r.get(3, 0).unwrap(), 3);
        assert_eq!(r.get(0, 3).unwrap(), 0);

        let other = RasterTemplate::from_bounds((0.0, 0.0, 4.0, 4.0), 1.0, Some(CRS::from_epsg(4326))).unwrap();
        let fc_crs = FeatureCollection::from_geometries(vec![Geometry::point(1.0, 1.0).unwrap()], Some(CRS::from_epsg(3857))).unwrap();
        assert!(rasterize_collection::<u8>(&fc_crs, None, &other, &params).is_err());
    }
}
