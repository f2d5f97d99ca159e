//! Closed geometry model over `geo-types`

use crate::error::{Error, Result};
use geo::{Area, BoundingRect, Centroid};
use geo_types::{
    Coord, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon, Rect,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The six supported geometry kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeometryKind {
    Point,
    LineString,
    Polygon,
    MultiPoint,
    MultiLineString,
    MultiPolygon,
}

impl GeometryKind {
    /// Topological dimension: 0 for points, 1 for lines, 2 for polygons
    pub fn dimension(&self) -> u8 {
        match self {
            GeometryKind::Point | GeometryKind::MultiPoint => 0,
            GeometryKind::LineString | GeometryKind::MultiLineString => 1,
            GeometryKind::Polygon | GeometryKind::MultiPolygon => 2,
        }
    }

    pub fn is_multi(&self) -> bool {
        matches!(
            self,
            GeometryKind::MultiPoint | GeometryKind::MultiLineString | GeometryKind::MultiPolygon
        )
    }

    /// The Multi-equivalent of this kind
    pub fn multi(&self) -> GeometryKind {
        match self.dimension() {
            0 => GeometryKind::MultiPoint,
            1 => GeometryKind::MultiLineString,
            _ => GeometryKind::MultiPolygon,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            GeometryKind::Point => "Point",
            GeometryKind::LineString => "LineString",
            GeometryKind::Polygon => "Polygon",
            GeometryKind::MultiPoint => "MultiPoint",
            GeometryKind::MultiLineString => "MultiLineString",
            GeometryKind::MultiPolygon => "MultiPolygon",
        }
    }
}

impl fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Axis-aligned envelope
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self { min_x, min_y, max_x, max_y }
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Closed-interval overlap test; boxes sharing an edge intersect
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }

    /// Grow by `d` on every side
    pub fn expand(&self, d: f64) -> BoundingBox {
        BoundingBox::new(self.min_x - d, self.min_y - d, self.max_x + d, self.max_y + d)
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox::new(
            self.min_x.min(other.min_x),
            self.min_y.min(other.min_y),
            self.max_x.max(other.max_x),
            self.max_y.max(other.max_y),
        )
    }

    /// Smallest distance between the two boxes, 0 when they overlap
    pub fn distance(&self, other: &BoundingBox) -> f64 {
        let dx = (other.min_x - self.max_x).max(self.min_x - other.max_x).max(0.0);
        let dy = (other.min_y - self.max_y).max(self.min_y - other.max_y).max(0.0);
        dx.hypot(dy)
    }

    pub fn as_tuple(&self) -> (f64, f64, f64, f64) {
        (self.min_x, self.min_y, self.max_x, self.max_y)
    }

    pub fn to_polygon(&self) -> Polygon<f64> {
        Rect::new(
            Coord { x: self.min_x, y: self.min_y },
            Coord { x: self.max_x, y: self.max_y },
        )
        .to_polygon()
    }
}

impl From<Rect<f64>> for BoundingBox {
    fn from(rect: Rect<f64>) -> Self {
        BoundingBox::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
    }
}

/// A planar geometry. Values are checked on construction (see
/// [`Geometry::validate`]) and never mutated afterwards; every operation
/// that derives a geometry allocates a new one.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(Point<f64>),
    LineString(LineString<f64>),
    Polygon(Polygon<f64>),
    MultiPoint(MultiPoint<f64>),
    MultiLineString(MultiLineString<f64>),
    MultiPolygon(MultiPolygon<f64>),
}

fn to_coords(pts: &[(f64, f64)]) -> Vec<Coord<f64>> {
    pts.iter().map(|&(x, y)| Coord { x, y }).collect()
}

fn check_coord(c: &Coord<f64>) -> Result<()> {
    if !c.x.is_finite() || !c.y.is_finite() {
        return Err(Error::invalid_geometry(format!(
            "non-finite coordinate ({}, {})",
            c.x, c.y
        )));
    }
    Ok(())
}

fn check_line(ls: &LineString<f64>) -> Result<()> {
    if ls.0.len() < 2 {
        return Err(Error::invalid_geometry(format!(
            "line string needs at least 2 points, got {}",
            ls.0.len()
        )));
    }
    ls.0.iter().try_for_each(check_coord)
}

fn check_ring(ring: &LineString<f64>) -> Result<()> {
    let n = ring.0.len();
    if n < 4 {
        return Err(Error::invalid_geometry(format!(
            "ring needs at least 4 coordinates, got {n}"
        )));
    }
    ring.0.iter().try_for_each(check_coord)?;
    if ring.0[0] != ring.0[n - 1] {
        return Err(Error::invalid_geometry("ring is not closed"));
    }
    let mut distinct: Vec<Coord<f64>> = Vec::with_capacity(3);
    for c in &ring.0[..n - 1] {
        if !distinct.contains(c) {
            distinct.push(*c);
            if distinct.len() == 3 {
                return Ok(());
            }
        }
    }
    Err(Error::invalid_geometry("ring needs at least 3 distinct coordinates"))
}

// `Polygon::new` closes open rings, so raw rings are checked first
fn closed_polygon(exterior: &[(f64, f64)], holes: &[Vec<(f64, f64)>]) -> Result<Polygon<f64>> {
    let exterior = LineString::new(to_coords(exterior));
    check_ring(&exterior)?;
    let holes = holes
        .iter()
        .map(|h| {
            let ring = LineString::new(to_coords(h));
            check_ring(&ring).map(|_| ring)
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Polygon::new(exterior, holes))
}

fn check_polygon(p: &Polygon<f64>) -> Result<()> {
    check_ring(p.exterior())?;
    p.interiors().iter().try_for_each(check_ring)
}

fn line_length(ls: &LineString<f64>) -> f64 {
    ls.0.windows(2)
        .map(|w| (w[1].x - w[0].x).hypot(w[1].y - w[0].y))
        .sum()
}

fn polygon_perimeter(p: &Polygon<f64>) -> f64 {
    line_length(p.exterior()) + p.interiors().iter().map(line_length).sum::<f64>()
}

impl Geometry {
    pub fn point(x: f64, y: f64) -> Result<Self> {
        let g = Geometry::Point(Point::new(x, y));
        g.validate()?;
        Ok(g)
    }

    pub fn line_string(coords: &[(f64, f64)]) -> Result<Self> {
        let g = Geometry::LineString(LineString::new(to_coords(coords)));
        g.validate()?;
        Ok(g)
    }

    /// Polygon from an exterior ring and holes. Rings must already be
    /// closed; they are not closed implicitly.
    pub fn polygon(exterior: &[(f64, f64)], holes: &[Vec<(f64, f64)>]) -> Result<Self> {
        Ok(Geometry::Polygon(closed_polygon(exterior, holes)?))
    }

    /// Multi-polygon from `(exterior, holes)` parts, each checked like
    /// [`Geometry::polygon`]
    pub fn multi_polygon(parts: &[(Vec<(f64, f64)>, Vec<Vec<(f64, f64)>>)]) -> Result<Self> {
        let polygons = parts
            .iter()
            .map(|(exterior, holes)| closed_polygon(exterior, holes))
            .collect::<Result<Vec<_>>>()?;
        Ok(Geometry::MultiPolygon(MultiPolygon::new(polygons)))
    }

    pub fn multi_point(coords: &[(f64, f64)]) -> Result<Self> {
        let g = Geometry::MultiPoint(MultiPoint::new(
            coords.iter().map(|&(x, y)| Point::new(x, y)).collect(),
        ));
        g.validate()?;
        Ok(g)
    }

    /// Axis-aligned rectangle as a polygon
    pub fn rect(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Result<Self> {
        Self::polygon(
            &[
                (min_x, min_y),
                (max_x, min_y),
                (max_x, max_y),
                (min_x, max_y),
                (min_x, min_y),
            ],
            &[],
        )
    }

    /// Convert and validate a `geo-types` geometry. `Line`, `Rect` and
    /// `Triangle` are accepted as their line or polygon equivalents;
    /// geometry collections are rejected.
    pub fn try_from_geo(geom: geo_types::Geometry<f64>) -> Result<Self> {
        let g = match geom {
            geo_types::Geometry::Point(p) => Geometry::Point(p),
            geo_types::Geometry::Line(l) => {
                Geometry::LineString(LineString::new(vec![l.start, l.end]))
            }
            geo_types::Geometry::LineString(ls) => Geometry::LineString(ls),
            geo_types::Geometry::Polygon(p) => Geometry::Polygon(p),
            geo_types::Geometry::MultiPoint(mp) => Geometry::MultiPoint(mp),
            geo_types::Geometry::MultiLineString(ml) => Geometry::MultiLineString(ml),
            geo_types::Geometry::MultiPolygon(mp) => Geometry::MultiPolygon(mp),
            geo_types::Geometry::Rect(r) => Geometry::Polygon(r.to_polygon()),
            geo_types::Geometry::Triangle(t) => Geometry::Polygon(t.to_polygon()),
            geo_types::Geometry::GeometryCollection(_) => {
                return Err(Error::invalid_geometry(
                    "geometry collections are not supported",
                ));
            }
        };
        g.validate()?;
        Ok(g)
    }

    /// Check finiteness, minimum point counts and ring closure
    pub fn validate(&self) -> Result<()> {
        match self {
            Geometry::Point(p) => check_coord(&p.0),
            Geometry::LineString(ls) => check_line(ls),
            Geometry::Polygon(p) => check_polygon(p),
            Geometry::MultiPoint(mp) => mp.0.iter().try_for_each(|p| check_coord(&p.0)),
            Geometry::MultiLineString(ml) => ml.0.iter().try_for_each(check_line),
            Geometry::MultiPolygon(mp) => mp.0.iter().try_for_each(check_polygon),
        }
    }

    pub fn kind(&self) -> GeometryKind {
        match self {
            Geometry::Point(_) => GeometryKind::Point,
            Geometry::LineString(_) => GeometryKind::LineString,
            Geometry::Polygon(_) => GeometryKind::Polygon,
            Geometry::MultiPoint(_) => GeometryKind::MultiPoint,
            Geometry::MultiLineString(_) => GeometryKind::MultiLineString,
            Geometry::MultiPolygon(_) => GeometryKind::MultiPolygon,
        }
    }

    pub fn dimension(&self) -> u8 {
        self.kind().dimension()
    }

    /// True for Multi* values with no parts
    pub fn is_empty(&self) -> bool {
        match self {
            Geometry::MultiPoint(mp) => mp.0.is_empty(),
            Geometry::MultiLineString(ml) => ml.0.is_empty(),
            Geometry::MultiPolygon(mp) => mp.0.is_empty(),
            _ => false,
        }
    }

    pub fn to_geo(&self) -> geo_types::Geometry<f64> {
        self.clone().into()
    }

    pub fn bounding_box(&self) -> Option<BoundingBox> {
        let rect = match self {
            Geometry::Point(p) => Some(p.bounding_rect()),
            Geometry::LineString(ls) => ls.bounding_rect(),
            Geometry::Polygon(p) => p.bounding_rect(),
            Geometry::MultiPoint(mp) => mp.bounding_rect(),
            Geometry::MultiLineString(ml) => ml.bounding_rect(),
            Geometry::MultiPolygon(mp) => mp.bounding_rect(),
        };
        rect.map(BoundingBox::from)
    }

    /// Shoelace area; positive for counter-clockwise exteriors, zero for
    /// points and lines
    pub fn signed_area(&self) -> f64 {
        match self {
            Geometry::Polygon(p) => p.signed_area(),
            Geometry::MultiPolygon(mp) => mp.0.iter().map(|p| p.signed_area()).sum(),
            _ => 0.0,
        }
    }

    pub fn area(&self) -> f64 {
        match self {
            Geometry::Polygon(p) => p.unsigned_area(),
            Geometry::MultiPolygon(mp) => mp.unsigned_area(),
            _ => 0.0,
        }
    }

    /// Length of lineal geometries, zero otherwise
    pub fn length(&self) -> f64 {
        match self {
            Geometry::LineString(ls) => line_length(ls),
            Geometry::MultiLineString(ml) => ml.0.iter().map(line_length).sum(),
            _ => 0.0,
        }
    }

    /// Total ring length of polygonal geometries, zero otherwise
    pub fn perimeter(&self) -> f64 {
        match self {
            Geometry::Polygon(p) => polygon_perimeter(p),
            Geometry::MultiPolygon(mp) => mp.0.iter().map(polygon_perimeter).sum(),
            _ => 0.0,
        }
    }

    /// Area-weighted for polygons, length-weighted for lines, arithmetic
    /// mean for points. Degenerate inputs fall back to the lower-dimension
    /// rule; empty multis have no centroid.
    pub fn centroid(&self) -> Option<Point<f64>> {
        match self {
            Geometry::Point(p) => Some(*p),
            Geometry::LineString(ls) => ls.centroid(),
            Geometry::Polygon(p) => p.centroid(),
            Geometry::MultiPoint(mp) => mp.centroid(),
            Geometry::MultiLineString(ml) => ml.centroid(),
            Geometry::MultiPolygon(mp) => mp.centroid(),
        }
    }

    /// All vertices, ring closing coordinates included
    pub fn vertices(&self) -> Vec<Coord<f64>> {
        match self {
            Geometry::Point(p) => vec![p.0],
            Geometry::LineString(ls) => ls.0.clone(),
            Geometry::Polygon(p) => polygon_rings(p).flat_map(|r| r.0.iter().copied()).collect(),
            Geometry::MultiPoint(mp) => mp.0.iter().map(|p| p.0).collect(),
            Geometry::MultiLineString(ml) => ml.0.iter().flat_map(|l| l.0.iter().copied()).collect(),
            Geometry::MultiPolygon(mp) => mp
                .0
                .iter()
                .flat_map(polygon_rings)
                .flat_map(|r| r.0.iter().copied())
                .collect(),
        }
    }

    /// Boundary and line segments; empty for puntal geometries
    pub fn segments(&self) -> Vec<(Coord<f64>, Coord<f64>)> {
        let pairs = |ls: &LineString<f64>| -> Vec<(Coord<f64>, Coord<f64>)> {
            ls.0.windows(2).map(|w| (w[0], w[1])).collect()
        };
        match self {
            Geometry::Point(_) | Geometry::MultiPoint(_) => Vec::new(),
            Geometry::LineString(ls) => pairs(ls),
            Geometry::Polygon(p) => polygon_rings(p).flat_map(pairs).collect(),
            Geometry::MultiLineString(ml) => ml.0.iter().flat_map(pairs).collect(),
            Geometry::MultiPolygon(mp) => mp.0.iter().flat_map(polygon_rings).flat_map(pairs).collect(),
        }
    }

    /// Polygonal content as a multipolygon, `None` for other dimensions
    pub fn to_multi_polygon(&self) -> Option<MultiPolygon<f64>> {
        match self {
            Geometry::Polygon(p) => Some(MultiPolygon::new(vec![p.clone()])),
            Geometry::MultiPolygon(mp) => Some(mp.clone()),
            _ => None,
        }
    }

    pub fn to_multi_line_string(&self) -> Option<MultiLineString<f64>> {
        match self {
            Geometry::LineString(ls) => Some(MultiLineString::new(vec![ls.clone()])),
            Geometry::MultiLineString(ml) => Some(ml.clone()),
            _ => None,
        }
    }

    pub fn to_multi_point(&self) -> Option<MultiPoint<f64>> {
        match self {
            Geometry::Point(p) => Some(MultiPoint::new(vec![*p])),
            Geometry::MultiPoint(mp) => Some(mp.clone()),
            _ => None,
        }
    }

    /// Collapse a single-part multi into its part; other values unchanged
    pub fn simplify_multi(self) -> Geometry {
        match self {
            Geometry::MultiPolygon(mut mp) if mp.0.len() == 1 => Geometry::Polygon(mp.0.remove(0)),
            Geometry::MultiLineString(mut ml) if ml.0.len() == 1 => {
                Geometry::LineString(ml.0.remove(0))
            }
            Geometry::MultiPoint(mp) if mp.0.len() == 1 => Geometry::Point(mp.0[0]),
            other => other,
        }
    }
}

fn polygon_rings(p: &Polygon<f64>) -> impl Iterator<Item = &LineString<f64>> {
    std::iter::once(p.exterior()).chain(p.interiors().iter())
}

impl From<Geometry> for geo_types::Geometry<f64> {
    fn from(g: Geometry) -> Self {
        match g {
            Geometry::Point(p) => p.into(),
            Geometry::LineString(ls) => ls.into(),
            Geometry::Polygon(p) => p.into(),
            Geometry::MultiPoint(mp) => mp.into(),
            Geometry::MultiLineString(ml) => ml.into(),
            Geometry::MultiPolygon(mp) => mp.into(),
        }
    }
}

impl TryFrom<geo_types::Geometry<f64>> for Geometry {
    type Error = Error;

    fn try_from(g: geo_types::Geometry<f64>) -> Result<Self> {
        Geometry::try_from_geo(g)
    }
}

impl From<Point<f64>> for Geometry {
    fn from(p: Point<f64>) -> Self {
        Geometry::Point(p)
    }
}
