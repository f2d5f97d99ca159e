//! Union and dissolve
//!
//! Union is always a separate, explicit step: callers that test many
//! geometries against a dissolved set should union once and reuse it.

use geo::{BooleanOps, LineString, MultiLineString, MultiPoint, MultiPolygon, Point};
use geocomp_core::vector::{AttributeValue, FeatureCollection, Field, Geometry, Schema};
use geocomp_core::{Error, Result};
use std::collections::HashMap;
use tracing::debug;

use crate::maybe_rayon::*;

/// Balanced pairwise union of polygon sets
pub(crate) fn cascaded_union(mut parts: Vec<MultiPolygon<f64>>) -> MultiPolygon<f64> {
    while parts.len() > 1 {
        let mut pairs = Vec::with_capacity(parts.len().div_ceil(2));
        let mut iter = parts.into_iter();
        while let Some(a) = iter.next() {
            pairs.push((a, iter.next()));
        }
        parts = pairs
            .into_par_iter()
            .map(|(a, b)| match b {
                Some(b) => a.union(&b),
                None => a,
            })
            .collect();
    }
    parts.pop().unwrap_or_else(|| MultiPolygon::new(vec![]))
}

/// Dissolve geometries of one dimension into a single geometry.
///
/// Polygons are merged into a minimal set of rings, lines are gathered
/// into one multi line string (identical parts dropped), and points into
/// a multi point without duplicates. Mixed dimensions are rejected.
pub fn union<'a>(geometries: impl IntoIterator<Item = &'a Geometry>) -> Result<Geometry> {
    let geometries: Vec<&Geometry> = geometries.into_iter().collect();
    let Some(first) = geometries.first() else {
        return Ok(Geometry::MultiPolygon(MultiPolygon::new(vec![])));
    };
    let dim = first.dimension();
    if let Some(other) = geometries.iter().find(|g| g.dimension() != dim) {
        return Err(Error::Unsupported(format!(
            "cannot union {} with {}",
            first.kind(),
            other.kind()
        )));
    }
    debug!(count = geometries.len(), dimension = dim, "union");

    let merged = match dim {
        2 => Geometry::MultiPolygon(cascaded_union(
            geometries.iter().filter_map(|g| g.to_multi_polygon()).collect(),
        )),
        1 => {
            let mut lines: Vec<LineString<f64>> = Vec::new();
            for ls in geometries
                .iter()
                .filter_map(|g| g.to_multi_line_string())
                .flat_map(|ml| ml.0)
            {
                if !lines.contains(&ls) {
                    lines.push(ls);
                }
            }
            Geometry::MultiLineString(MultiLineString::new(lines))
        }
        _ => {
            let mut points: Vec<Point<f64>> = Vec::new();
            for p in geometries
                .iter()
                .filter_map(|g| g.to_multi_point())
                .flat_map(|mp| mp.0)
            {
                if !points.contains(&p) {
                    points.push(p);
                }
            }
            Geometry::MultiPoint(MultiPoint::new(points))
        }
    };
    Ok(merged.simplify_multi())
}

/// Union every geometry of a collection
pub fn union_collection(fc: &FeatureCollection) -> Result<Geometry> {
    union(fc.geometries())
}

/// Union geometries per distinct value of `field`.
///
/// Output has one feature per group, ordered by first appearance, with a
/// single attribute: the group value.
pub fn dissolve_by(fc: &FeatureCollection, field: &str) -> Result<FeatureCollection> {
    let col = fc.schema().require(field)?;
    let field_def = fc.schema().fields()[col].clone();

    let mut order: Vec<(String, AttributeValue)> = Vec::new();
    let mut groups: HashMap<String, Vec<&Geometry>> = HashMap::new();
    for feature in fc.iter() {
        let value = &feature.properties[col];
        let key = value.group_key();
        let members = groups.entry(key.clone()).or_insert_with(|| {
            order.push((key, value.clone()));
            Vec::new()
        });
        members.push(&feature.geometry);
    }
    debug!(field, groups = order.len(), "dissolve");

    let mut geometries = Vec::with_capacity(order.len());
    let mut records = Vec::with_capacity(order.len());
    for (key, value) in order {
        let members = groups.remove(&key).unwrap_or_default();
        geometries.push(union(members)?);
        records.push(vec![value]);
    }
    let schema = Schema::new(vec![Field::new(field_def.name, field_def.field_type)])?;
    FeatureCollection::new(geometries, records, schema, fc.crs().cloned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geocomp_core::vector::{FieldType, GeometryKind};

    #[test]
    fn test_union_adjacent_squares() {
        let a = Geometry::rect(0.0, 0.0, 1.0, 1.0).unwrap();
        let b = Geometry::rect(1.0, 0.0, 2.0, 1.0).unwrap();
        let u = union([&a, &b]).unwrap();
        assert_eq!(u.kind(), GeometryKind::Polygon);
        assert_relative_eq!(u.area(), 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_union_overlap_counts_once() {
        let a = Geometry::rect(0.0, 0.0, 2.0, 2.0).unwrap();
        let b = Geometry::rect(1.0, 1.0, 3.0, 3.0).unwrap();
        let c = Geometry::rect(10.0, 10.0, 11.0, 11.0).unwrap();
        let u = union([&a, &b, &c]).unwrap();
        assert_eq!(u.kind(), GeometryKind::MultiPolygon);
        assert_relative_eq!(u.area(), 8.0, epsilon = 1e-9);
    }

    #[test]
    fn test_union_points_dedup_and_mixed_rejected() {
        let p = Geometry::point(1.0, 1.0).unwrap();
        let q = Geometry::point(2.0, 1.0).unwrap();
        let u = union([&p, &q, &p]).unwrap();
        assert_eq!(u.vertices().len(), 2);

        let sq = Geometry::rect(0.0, 0.0, 1.0, 1.0).unwrap();
        assert!(matches!(union([&p, &sq]), Err(Error::Unsupported(_))));
        assert!(union(std::iter::empty()).unwrap().is_empty());
    }

    #[test]
    fn test_dissolve_by_field() {
        let fc = FeatureCollection::from_geometries(
            vec![
                Geometry::rect(0.0, 0.0, 1.0, 1.0).unwrap(),
                Geometry::rect(5.0, 0.0, 6.0, 1.0).unwrap(),
                Geometry::rect(1.0, 0.0, 2.0, 1.0).unwrap(),
            ],
            None,
        )
        .unwrap()
        .with_column("region", FieldType::Text, vec!["n".into(), "s".into(), "n".into()])
        .unwrap();

        let out = dissolve_by(&fc, "region").unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out.value(0, "region"), Some(&AttributeValue::Text("n".into())));
        assert_relative_eq!(out.get(0).unwrap().geometry.area(), 2.0, epsilon = 1e-9);
        assert_eq!(out.get(0).unwrap().geometry.kind(), GeometryKind::Polygon);
        assert!(dissolve_by(&fc, "missing").is_err());
    }
}
