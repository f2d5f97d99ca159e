//! Named DE-9IM relations between two geometries

use geo::coordinate_position::CoordPos;
use geo::dimensions::Dimensions;
use geo::algorithm::relate::IntersectionMatrix;
use geo::{Intersects, Relate};
use geocomp_core::vector::{BoundingBox, Geometry};
use geocomp_core::{Error, Result};
use serde::{Deserialize, Serialize};

use super::distance::prepared_distance;

/// Binary spatial relation
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    #[default]
    Intersects,
    Disjoint,
    Touches,
    Crosses,
    Within,
    Contains,
    Overlaps,
    Equals,
    Covers,
    CoveredBy,
    /// Planar distance of at most the given value
    WithinDistance(f64),
}

impl Predicate {
    /// Whether `p(a, b) == p(b, a)` for all inputs
    pub fn is_symmetric(&self) -> bool {
        !matches!(
            self,
            Predicate::Within | Predicate::Contains | Predicate::Covers | Predicate::CoveredBy
        )
    }

    /// The relation with its arguments swapped
    pub fn converse(&self) -> Predicate {
        match self {
            Predicate::Within => Predicate::Contains,
            Predicate::Contains => Predicate::Within,
            Predicate::Covers => Predicate::CoveredBy,
            Predicate::CoveredBy => Predicate::Covers,
            other => *other,
        }
    }

    /// Envelope gap beyond which the relation is decided without
    /// evaluating the geometries: `Some(gap)` for relations that need the
    /// geometries to come within `gap` of each other.
    pub(crate) fn reach(&self) -> Option<f64> {
        match self {
            Predicate::Disjoint => None,
            Predicate::WithinDistance(d) => Some(*d),
            _ => Some(0.0),
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if let Predicate::WithinDistance(d) = self
            && !(d.is_finite() && *d >= 0.0)
        {
            return Err(Error::InvalidParameter {
                name: "distance",
                value: d.to_string(),
                reason: "must be finite and non-negative".into(),
            });
        }
        Ok(())
    }
}

/// A geometry converted once for repeated evaluation
#[derive(Debug, Clone)]
pub(crate) struct Prepared<'a> {
    pub source: &'a Geometry,
    pub geo: geo::Geometry<f64>,
    pub bbox: Option<BoundingBox>,
}

impl<'a> Prepared<'a> {
    pub fn new(source: &'a Geometry) -> Self {
        Self {
            source,
            geo: source.to_geo(),
            bbox: source.bounding_box(),
        }
    }

    pub fn prepare_all(geoms: &'a [Geometry]) -> Vec<Prepared<'a>> {
        geoms.iter().map(Prepared::new).collect()
    }

    pub fn intersects(&self, other: &Prepared<'_>) -> bool {
        self.geo.intersects(&other.geo)
    }

    /// Decide the relation from envelopes alone when they are too far
    /// apart; `None` means the geometries must be evaluated.
    pub fn envelope_verdict(&self, other: &Prepared<'_>, predicate: Predicate) -> Option<bool> {
        let (a, b) = (self.bbox?, other.bbox?);
        let gap = a.distance(&b);
        match predicate.reach() {
            Some(reach) if gap > reach => Some(false),
            None if gap > 0.0 => Some(true),
            _ => None,
        }
    }

    pub fn relate(&self, other: &Prepared<'_>) -> IntersectionMatrix {
        self.geo.relate(&other.geo)
    }

    pub fn evaluate(&self, other: &Prepared<'_>, predicate: Predicate) -> bool {
        match predicate {
            Predicate::Intersects => self.intersects(other),
            Predicate::Disjoint => !self.intersects(other),
            Predicate::WithinDistance(d) => prepared_distance(self, other) <= d,
            Predicate::Touches => self.relate(other).is_touches(),
            Predicate::Crosses => self.relate(other).is_crosses(),
            Predicate::Within => self.relate(other).is_within(),
            Predicate::Contains => self.relate(other).is_contains(),
            Predicate::Overlaps => self.relate(other).is_overlaps(),
            Predicate::Equals => self.relate(other).is_equal_topo(),
            Predicate::Covers => self.relate(other).is_covers(),
            Predicate::CoveredBy => self.relate(other).is_coveredby(),
        }
    }
}

/// Evaluate `predicate(a, b)`
pub fn evaluate(a: &Geometry, b: &Geometry, predicate: Predicate) -> Result<bool> {
    predicate.validate()?;
    Ok(Prepared::new(a).evaluate(&Prepared::new(b), predicate))
}

pub fn intersects(a: &Geometry, b: &Geometry) -> bool {
    Prepared::new(a).intersects(&Prepared::new(b))
}

pub fn disjoint(a: &Geometry, b: &Geometry) -> bool {
    !intersects(a, b)
}

pub fn within(a: &Geometry, b: &Geometry) -> bool {
    Prepared::new(a).evaluate(&Prepared::new(b), Predicate::Within)
}

pub fn contains(a: &Geometry, b: &Geometry) -> bool {
    within(b, a)
}

pub fn touches(a: &Geometry, b: &Geometry) -> bool {
    Prepared::new(a).evaluate(&Prepared::new(b), Predicate::Touches)
}

pub fn crosses(a: &Geometry, b: &Geometry) -> bool {
    Prepared::new(a).evaluate(&Prepared::new(b), Predicate::Crosses)
}

pub fn overlaps(a: &Geometry, b: &Geometry) -> bool {
    Prepared::new(a).evaluate(&Prepared::new(b), Predicate::Overlaps)
}

pub fn equals(a: &Geometry, b: &Geometry) -> bool {
    Prepared::new(a).evaluate(&Prepared::new(b), Predicate::Equals)
}

pub fn covers(a: &Geometry, b: &Geometry) -> bool {
    Prepared::new(a).evaluate(&Prepared::new(b), Predicate::Covers)
}

pub fn covered_by(a: &Geometry, b: &Geometry) -> bool {
    covers(b, a)
}

fn dim_char(d: Dimensions) -> char {
    match d {
        Dimensions::Empty => 'F',
        Dimensions::ZeroDimensional => '0',
        Dimensions::OneDimensional => '1',
        Dimensions::TwoDimensional => '2',
    }
}

fn matrix_string(matrix: &IntersectionMatrix) -> String {
    let positions = [CoordPos::Inside, CoordPos::OnBoundary, CoordPos::Outside];
    let mut s = String::with_capacity(9);
    for &lhs in &positions {
        for &rhs in &positions {
            s.push(dim_char(matrix.get(lhs, rhs)));
        }
    }
    s
}

/// The DE-9IM matrix of `a` against `b`, row-major over
/// interior/boundary/exterior (e.g. `"212101212"`)
pub fn relate(a: &Geometry, b: &Geometry) -> String {
    matrix_string(&Prepared::new(a).relate(&Prepared::new(b)))
}

/// Match the DE-9IM matrix of `a` against `b` with a pattern of nine
/// characters from `T F * 0 1 2`.
pub fn relate_pattern(a: &Geometry, b: &Geometry, pattern: &str) -> Result<bool> {
    let pattern = pattern.to_ascii_uppercase();
    if pattern.chars().count() != 9 || !pattern.chars().all(|c| "TF*012".contains(c)) {
        return Err(Error::InvalidParameter {
            name: "pattern",
            value: pattern,
            reason: "expected 9 characters from T, F, *, 0, 1, 2".into(),
        });
    }
    let matrix = relate(a, b);
    Ok(matrix.chars().zip(pattern.chars()).all(|(m, p)| match p {
        '*' => true,
        'T' => m != 'F',
        _ => m == p,
    }))
}
