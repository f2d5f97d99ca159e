//! Buffer operations
//!
//! Buffers are built from exact offset pieces (a circle per point, a
//! "stadium" capsule per segment) that are then unioned. Curves are
//! approximated with `quadrant_segments` chords per quarter circle, with
//! every vertex lying exactly at the buffer distance.

use geo::{BooleanOps, Coord, LineString, MultiPolygon, Polygon};
use geocomp_core::vector::{FeatureCollection, Geometry};
use geocomp_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::debug;

use super::union::cascaded_union;
use crate::maybe_rayon::*;

/// Parameters for buffer operations
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BufferParams {
    /// Buffer distance (positive = expand, negative = shrink polygons)
    pub distance: f64,
    /// Chords per quarter circle (default: 16)
    pub quadrant_segments: usize,
}

impl BufferParams {
    pub fn new(distance: f64) -> Self {
        Self {
            distance,
            quadrant_segments: 16,
        }
    }

    pub fn with_quadrant_segments(mut self, quadrant_segments: usize) -> Self {
        self.quadrant_segments = quadrant_segments;
        self
    }

    fn validate(&self) -> Result<()> {
        if !self.distance.is_finite() {
            return Err(Error::InvalidParameter {
                name: "distance",
                value: self.distance.to_string(),
                reason: "buffer distance must be finite".into(),
            });
        }
        if self.quadrant_segments == 0 {
            return Err(Error::InvalidParameter {
                name: "quadrant_segments",
                value: "0".into(),
                reason: "at least one segment per quadrant is required".into(),
            });
        }
        Ok(())
    }
}

fn closed_ring(mut coords: Vec<Coord<f64>>) -> LineString<f64> {
    if let Some(&first) = coords.first() {
        coords.push(first);
    }
    LineString::new(coords)
}

/// Circle around `c` with all vertices at distance `r`
pub(crate) fn circle(c: Coord<f64>, r: f64, quadrant_segments: usize) -> Polygon<f64> {
    let n = 4 * quadrant_segments;
    let coords = (0..n)
        .map(|i| {
            let angle = 2.0 * PI * i as f64 / n as f64;
            Coord {
                x: c.x + r * angle.cos(),
                y: c.y + r * angle.sin(),
            }
        })
        .collect();
    Polygon::new(closed_ring(coords), vec![])
}

/// Region within `r` of the segment `a`-`b`
fn capsule(a: Coord<f64>, b: Coord<f64>, r: f64, quadrant_segments: usize) -> Polygon<f64> {
    let len = (b.x - a.x).hypot(b.y - a.y);
    if len == 0.0 {
        return circle(a, r, quadrant_segments);
    }
    // Angle of the left normal; each half circle sweeps clockwise from it.
    let theta = (b.y - a.y).atan2(b.x - a.x) + PI / 2.0;
    let m = 2 * quadrant_segments;
    let step = PI / m as f64;

    let mut coords = Vec::with_capacity(2 * m + 2);
    for k in 0..=m {
        let angle = theta - k as f64 * step;
        coords.push(Coord {
            x: b.x + r * angle.cos(),
            y: b.y + r * angle.sin(),
        });
    }
    for k in 0..=m {
        let angle = theta - PI - k as f64 * step;
        coords.push(Coord {
            x: a.x + r * angle.cos(),
            y: a.y + r * angle.sin(),
        });
    }
    Polygon::new(closed_ring(coords), vec![])
}

/// Union of the capsules around every segment
fn segments_buffer(segments: &[(Coord<f64>, Coord<f64>)], r: f64, q: usize) -> MultiPolygon<f64> {
    let pieces: Vec<MultiPolygon<f64>> = segments
        .par_iter()
        .map(|&(a, b)| MultiPolygon::new(vec![capsule(a, b, r, q)]))
        .collect();
    cascaded_union(pieces)
}

fn points_buffer(points: &[Coord<f64>], r: f64, q: usize) -> MultiPolygon<f64> {
    let pieces: Vec<MultiPolygon<f64>> = points
        .iter()
        .map(|&c| MultiPolygon::new(vec![circle(c, r, q)]))
        .collect();
    cascaded_union(pieces)
}

/// Buffer a geometry by a signed distance.
///
/// Points and lines grow into polygons for positive distances and vanish
/// (empty multipolygon) otherwise. Polygons grow by their boundary
/// buffer, or shrink by subtracting it when the distance is negative.
pub fn buffer(geom: &Geometry, params: &BufferParams) -> Result<Geometry> {
    params.validate()?;
    let d = params.distance;
    let q = params.quadrant_segments;
    let empty = || Geometry::MultiPolygon(MultiPolygon::new(vec![]));

    let result = match geom.to_multi_polygon() {
        Some(area) => {
            if d == 0.0 {
                Geometry::MultiPolygon(area)
            } else {
                let ring_buffer = segments_buffer(&geom.segments(), d.abs(), q);
                if d > 0.0 {
                    Geometry::MultiPolygon(area.union(&ring_buffer))
                } else {
                    Geometry::MultiPolygon(area.difference(&ring_buffer))
                }
            }
        }
        None if d <= 0.0 => empty(),
        None => match geom {
            Geometry::Point(_) | Geometry::MultiPoint(_) => {
                Geometry::MultiPolygon(points_buffer(&geom.vertices(), d, q))
            }
            _ => {
                let segments = geom.segments();
                Geometry::MultiPolygon(segments_buffer(&segments, d, q))
            }
        },
    };
    Ok(result.simplify_multi())
}

/// Buffer every feature, keeping attributes, schema and CRS
pub fn buffer_collection(fc: &FeatureCollection, params: &BufferParams) -> Result<FeatureCollection> {
    params.validate()?;
    debug!(features = fc.len(), distance = params.distance, "buffering collection");

    let geometries = fc
        .features()
        .par_iter()
        .map(|f| buffer(&f.geometry, params))
        .collect::<Result<Vec<_>>>()?;
    let records = fc.iter().map(|f| f.properties.clone()).collect();
    FeatureCollection::new(geometries, records, fc.schema().clone(), fc.crs().cloned())
}
