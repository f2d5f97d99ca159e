//! Vectorization: grid cells to polygons or points
//!
//! Cells are grouped into maximal 4-connected regions of equal value. Each
//! region's boundary is assembled from the cell sides it does not share
//! with itself, oriented so the region lies to the right of every edge in
//! pixel space (rows growing downward). Exterior rings then have positive
//! shoelace area in pixel space and holes negative.

use std::collections::{HashMap, VecDeque};

use geo::{Coord, LineString, MultiPolygon, Point, Polygon};
use geocomp_core::raster::{DataType, GeoTransform, Raster, RasterElement};
use geocomp_core::vector::{AttributeValue, FeatureCollection, FieldType, Geometry};
use geocomp_core::{Algorithm, Error, Result};
use ndarray::Array2;
use num_traits::NumCast;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Parameters for polygonizing a grid
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolygonizeParams {
    /// Band to read
    pub band: usize,
    /// Emit one polygon per cell instead of dissolving equal neighbors
    pub preserve_ids: bool,
}

const UNLABELED: usize = usize::MAX;

type Vertex = (i64, i64);

/// Attribute type used for cell values of `T`
fn value_field_type<T: RasterElement>() -> FieldType {
    match T::data_type() {
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32 => FieldType::Integer,
        _ => FieldType::Float,
    }
}

fn attribute<T: RasterElement>(v: T) -> AttributeValue {
    match value_field_type::<T>() {
        FieldType::Integer => NumCast::from(v).map(AttributeValue::Int).unwrap_or(AttributeValue::Null),
        _ => v.to_f64().map(AttributeValue::Float).unwrap_or(AttributeValue::Null),
    }
}

/// Label 4-connected regions of equal valid value, in row-major order of
/// their first cell. Returns the label grid and one seed value per label.
fn label_regions<T: RasterElement>(band: &Array2<T>, nodata: Option<T>) -> (Array2<usize>, Vec<T>) {
    let (rows, cols) = band.dim();
    let mut labels = Array2::from_elem((rows, cols), UNLABELED);
    let mut values = Vec::new();
    let mut queue = VecDeque::new();

    for ((r, c), &v) in band.indexed_iter() {
        if labels[(r, c)] != UNLABELED || v.is_nodata(nodata) {
            continue;
        }
        let label = values.len();
        values.push(v);
        labels[(r, c)] = label;
        queue.push_back((r, c));
        while let Some((r, c)) = queue.pop_front() {
            let neighbors = [
                (r.wrapping_sub(1), c),
                (r + 1, c),
                (r, c.wrapping_sub(1)),
                (r, c + 1),
            ];
            for (nr, nc) in neighbors {
                if nr < rows && nc < cols && labels[(nr, nc)] == UNLABELED && band[(nr, nc)] == v {
                    labels[(nr, nc)] = label;
                    queue.push_back((nr, nc));
                }
            }
        }
    }
    (labels, values)
}

/// Boundary edges of every region, region on the right
fn boundary_edges(labels: &Array2<usize>, regions: usize) -> Vec<Vec<(Vertex, Vertex)>> {
    let (rows, cols) = labels.dim();
    let mut edges = vec![Vec::new(); regions];
    let label_at = |r: isize, c: isize| -> usize {
        if r < 0 || c < 0 || r as usize >= rows || c as usize >= cols {
            UNLABELED
        } else {
            labels[(r as usize, c as usize)]
        }
    };
    for ((r, c), &l) in labels.indexed_iter() {
        if l == UNLABELED {
            continue;
        }
        let (ri, ci) = (r as isize, c as isize);
        let (x, y) = (c as i64, r as i64);
        if label_at(ri - 1, ci) != l {
            edges[l].push(((x, y), (x + 1, y)));
        }
        if label_at(ri, ci + 1) != l {
            edges[l].push(((x + 1, y), (x + 1, y + 1)));
        }
        if label_at(ri + 1, ci) != l {
            edges[l].push(((x + 1, y + 1), (x, y + 1)));
        }
        if label_at(ri, ci - 1) != l {
            edges[l].push(((x, y + 1), (x, y)));
        }
    }
    edges
}

/// Chain directed edges into closed rings. Where a region touches itself
/// diagonally two edges leave the same vertex; taking the leftmost turn
/// closes the enclosed side as its own hole ring instead of folding it
/// into the shell.
fn trace_rings(edges: &[(Vertex, Vertex)]) -> Vec<Vec<Vertex>> {
    let mut outgoing: HashMap<Vertex, Vec<usize>> = HashMap::new();
    for (i, (start, _)) in edges.iter().enumerate() {
        outgoing.entry(*start).or_default().push(i);
    }
    let mut used = vec![false; edges.len()];
    let mut rings = Vec::new();

    for first in 0..edges.len() {
        if used[first] {
            continue;
        }
        used[first] = true;
        let origin = edges[first].0;
        let mut ring = vec![origin];
        let mut current = first;
        loop {
            let (start, end) = edges[current];
            ring.push(end);
            let d_in = (end.0 - start.0, end.1 - start.1);
            // back at the origin, `first` competes with any unused exit
            let next = outgoing
                .get(&end)
                .into_iter()
                .flatten()
                .copied()
                .filter(|&i| !used[i] || (i == first && end == origin))
                .min_by_key(|&i| {
                    let (s, e) = edges[i];
                    let d_out = (e.0 - s.0, e.1 - s.1);
                    d_in.0 * d_out.1 - d_in.1 * d_out.0
                });
            match next {
                Some(i) if i != first => {
                    used[i] = true;
                    current = i;
                }
                _ => break,
            }
        }
        rings.push(simplify_ring(ring));
    }
    rings
}

/// Drop vertices in the middle of straight runs; the ring stays closed
fn simplify_ring(ring: Vec<Vertex>) -> Vec<Vertex> {
    let n = ring.len() - 1;
    if n < 3 {
        return ring;
    }
    let mut out: Vec<Vertex> = (0..n)
        .filter(|&i| {
            let prev = ring[(i + n - 1) % n];
            let (cur, next) = (ring[i], ring[(i + 1) % n]);
            (cur.0 - prev.0) * (next.1 - cur.1) - (cur.1 - prev.1) * (next.0 - cur.0) != 0
        })
        .map(|i| ring[i])
        .collect();
    if let Some(&first) = out.first() {
        out.push(first);
    }
    out
}

fn shoelace(ring: &[Vertex]) -> i64 {
    ring.windows(2).map(|w| w[0].0 * w[1].1 - w[1].0 * w[0].1).sum()
}

fn to_world(ring: &[Vertex], t: &GeoTransform) -> LineString<f64> {
    LineString::from(
        ring.iter()
            .map(|&(x, y)| {
                let (wx, wy) = t.apply(x as f64, y as f64);
                Coord { x: wx, y: wy }
            })
            .collect::<Vec<_>>(),
    )
}

fn bbox(ring: &[Vertex]) -> (i64, i64, i64, i64) {
    ring.iter().fold((i64::MAX, i64::MAX, i64::MIN, i64::MIN), |(a, b, c, d), &(x, y)| {
        (a.min(x), b.min(y), c.max(x), d.max(y))
    })
}

/// Midpoint of a ring's first edge, in doubled coordinates. Every unit
/// edge belongs to exactly one ring, so it never lies on another ring.
fn edge_midpoint(ring: &[Vertex]) -> Option<Vertex> {
    let (a, b) = (ring.first()?, ring.get(1)?);
    Some((2 * a.0 + (b.0 - a.0).signum(), 2 * a.1 + (b.1 - a.1).signum()))
}

/// Even-odd test of a doubled-coordinate point against a closed ring
fn ring_contains(ring: &[Vertex], p: Vertex) -> bool {
    let mut inside = false;
    for w in ring.windows(2) {
        let ((x0, y0), (x1, y1)) = ((2 * w[0].0, 2 * w[0].1), (2 * w[1].0, 2 * w[1].1));
        if (y0 > p.1) != (y1 > p.1) {
            let lhs = (p.0 - x0) * (y1 - y0);
            let rhs = (x1 - x0) * (p.1 - y0);
            if (y1 > y0 && lhs < rhs) || (y1 < y0 && lhs > rhs) {
                inside = !inside;
            }
        }
    }
    inside
}

/// Assemble the rings of one region into a geometry
fn region_geometry(rings: Vec<Vec<Vertex>>, t: &GeoTransform) -> Geometry {
    let (shells, holes): (Vec<_>, Vec<_>) = rings.into_iter().partition(|r| shoelace(r) > 0);
    let mut parts: Vec<(Vec<Vertex>, Vec<Vec<Vertex>>)> = shells.into_iter().map(|s| (s, Vec::new())).collect();
    for hole in holes {
        let hb = bbox(&hole);
        let Some(mid) = edge_midpoint(&hole) else {
            continue;
        };
        // the smallest shell that holds the hole
        let owner = parts
            .iter()
            .enumerate()
            .filter(|(_, (s, _))| {
                let sb = bbox(s);
                sb.0 <= hb.0 && sb.1 <= hb.1 && sb.2 >= hb.2 && sb.3 >= hb.3 && ring_contains(s, mid)
            })
            .min_by_key(|(_, (s, _))| shoelace(s))
            .map(|(i, _)| i);
        if let Some(i) = owner {
            parts[i].1.push(hole);
        }
    }
    let mut polygons: Vec<Polygon<f64>> = parts
        .into_iter()
        .map(|(shell, holes)| {
            Polygon::new(
                to_world(&shell, t),
                holes.iter().map(|h| to_world(h, t)).collect(),
            )
        })
        .collect();
    if polygons.len() == 1 {
        Geometry::Polygon(polygons.remove(0))
    } else {
        Geometry::MultiPolygon(MultiPolygon::new(polygons))
    }
}

fn polygonize<T: RasterElement>(band: &Array2<T>, nodata: Option<T>, t: &GeoTransform) -> (Vec<Geometry>, Vec<T>) {
    let (labels, values) = label_regions(band, nodata);
    let edges = boundary_edges(&labels, values.len());
    let geometries = edges
        .iter()
        .map(|e| region_geometry(trace_rings(e), t))
        .collect();
    (geometries, values)
}

/// Polygonize a band: one feature per connected region of equal value,
/// with a `value` column. No-data cells form no region.
///
/// With `preserve_ids` every valid cell becomes its own polygon: the grid
/// is relabelled with a unique id per cell, polygonized on the ids, and the
/// true values are looked up at each polygon's centroid. The output then
/// also carries the `id` column (row-major cell index).
pub fn vectorize<T: RasterElement>(raster: &Raster<T>, params: &PolygonizeParams) -> Result<FeatureCollection> {
    let band = raster.band(params.band)?;
    let t = raster.transform();
    debug!(rows = raster.rows(), cols = raster.cols(), preserve_ids = params.preserve_ids, "vectorize");

    if !params.preserve_ids {
        let (geometries, values) = polygonize(band, raster.nodata(), t);
        let column = values.into_iter().map(attribute).collect();
        return FeatureCollection::from_geometries(geometries, raster.crs().cloned())?
            .with_column("value", value_field_type::<T>(), column);
    }

    let cols = raster.cols();
    let ids = Array2::from_shape_fn(band.dim(), |(r, c)| {
        if band[(r, c)].is_nodata(raster.nodata()) {
            -1i64
        } else {
            (r * cols + c) as i64
        }
    });
    let (geometries, id_values) = polygonize(&ids, Some(-1), t);
    let mut column = Vec::with_capacity(geometries.len());
    for g in &geometries {
        let cell = g
            .centroid()
            .and_then(|p| raster.cell_at(p.x(), p.y()))
            .ok_or_else(|| Error::Other("polygon centroid falls outside the grid".into()))?;
        column.push(attribute(band[cell]));
    }
    FeatureCollection::from_geometries(geometries, raster.crs().cloned())?
        .with_column("id", FieldType::Integer, id_values.into_iter().map(AttributeValue::Int).collect())?
        .with_column("value", value_field_type::<T>(), column)
}

/// One point per valid cell at the cell center, with `value` and `row` /
/// `col` columns. Equivalent to taking the centroids of an id-preserving
/// [`vectorize`], without building the polygons.
pub fn vectorize_points<T: RasterElement>(raster: &Raster<T>, band: usize) -> Result<FeatureCollection> {
    let cells: Vec<(usize, usize, T)> = raster.valid_cells(band)?.collect();
    let mut geometries = Vec::with_capacity(cells.len());
    let (mut values, mut rows, mut cols) = (Vec::new(), Vec::new(), Vec::new());
    for (r, c, v) in cells {
        let (x, y) = raster.pixel_to_geo(c, r);
        geometries.push(Geometry::Point(Point::new(x, y)));
        values.push(attribute(v));
        rows.push(AttributeValue::Int(r as i64));
        cols.push(AttributeValue::Int(c as i64));
    }
    FeatureCollection::from_geometries(geometries, raster.crs().cloned())?
        .with_column("value", value_field_type::<T>(), values)?
        .with_column("row", FieldType::Integer, rows)?
        .with_column("col", FieldType::Integer, cols)
}

/// [`vectorize`] as an [`Algorithm`]
#[derive(Debug, Clone, Default)]
pub struct Vectorize;

impl Algorithm for Vectorize {
    type Input = Raster<i32>;
    type Output = FeatureCollection;
    type Params = PolygonizeParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Vectorize"
    }

    fn description(&self) -> &'static str {
        "Polygonize connected regions of equal value"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        vectorize(&input, &params)
    }
}
