//! Pairwise overlay: clip one feature set by another

use geo::line_intersection::{line_intersection, LineIntersection};
use geo::{BooleanOps, Coord, Intersects, Line, MultiPoint, MultiPolygon, Point};
use geocomp_core::crs::ensure_same_crs;
use geocomp_core::vector::{FeatureCollection, Field, Geometry, Schema};
use geocomp_core::Result;
use tracing::debug;

use crate::maybe_rayon::*;
use crate::predicates::SpatialIndex;

/// One non-empty intersection of feature `a` of the first collection
/// with feature `b` of the second
#[derive(Debug, Clone)]
pub(crate) struct Fragment {
    pub a: usize,
    pub b: usize,
    pub geometry: Geometry,
}

fn keep_points(points: MultiPoint<f64>, other: &geo::Geometry<f64>) -> Option<Geometry> {
    let kept: Vec<_> = points.0.into_iter().filter(|p| p.intersects(other)).collect();
    (!kept.is_empty()).then(|| Geometry::MultiPoint(MultiPoint::new(kept)).simplify_multi())
}

fn clip_lines(area: &MultiPolygon<f64>, lines: &Geometry) -> Option<Geometry> {
    let mls = lines.to_multi_line_string()?;
    let clipped = area.clip(&mls, false);
    (!clipped.0.is_empty()).then(|| Geometry::MultiLineString(clipped).simplify_multi())
}

/// Points where two linear geometries meet. A shared stretch contributes
/// its two endpoints.
fn cross_lines(a: &Geometry, b: &Geometry) -> Option<Geometry> {
    let others: Vec<Line<f64>> = b.segments().into_iter().map(|(p, q)| Line::new(p, q)).collect();
    let mut hits: Vec<Coord<f64>> = Vec::new();
    for (p, q) in a.segments() {
        let line = Line::new(p, q);
        for &other in &others {
            match line_intersection(line, other) {
                Some(LineIntersection::SinglePoint { intersection, .. }) => hits.push(intersection),
                Some(LineIntersection::Collinear { intersection }) => {
                    hits.push(intersection.start);
                    hits.push(intersection.end);
                }
                None => {}
            }
        }
    }
    hits.sort_by(|u, v| u.x.total_cmp(&v.x).then(u.y.total_cmp(&v.y)));
    hits.dedup();
    (!hits.is_empty()).then(|| {
        Geometry::MultiPoint(hits.into_iter().map(Point::from).collect()).simplify_multi()
    })
}

/// Set intersection of two geometries, `None` when empty.
///
/// The result has the lower of the two dimensions, except that two linear
/// inputs meet in points (see [`cross_lines`]), so every line/line
/// fragment is a point geometry.
pub fn intersect_geometries(a: &Geometry, b: &Geometry) -> Result<Option<Geometry>> {
    match (a.dimension(), b.dimension()) {
        (0, _) => Ok(a.to_multi_point().and_then(|mp| keep_points(mp, &b.to_geo()))),
        (_, 0) => Ok(b.to_multi_point().and_then(|mp| keep_points(mp, &a.to_geo()))),
        (2, 2) => {
            let (Some(pa), Some(pb)) = (a.to_multi_polygon(), b.to_multi_polygon()) else {
                return Ok(None);
            };
            let out = pa.intersection(&pb);
            Ok((!out.0.is_empty()).then(|| Geometry::MultiPolygon(out).simplify_multi()))
        }
        (2, 1) => Ok(a.to_multi_polygon().and_then(|area| clip_lines(&area, b))),
        (1, 2) => Ok(b.to_multi_polygon().and_then(|area| clip_lines(&area, a))),
        _ => Ok(cross_lines(a, b)),
    }
}

/// All non-empty pairwise intersections, ordered by `a` then `b`.
/// Partitioned by feature of `a`; each partition emits its own fragments.
pub(crate) fn fragments(a: &[Geometry], b: &[Geometry]) -> Result<Vec<Fragment>> {
    let index = SpatialIndex::new(b);
    let per_feature = a
        .par_iter()
        .enumerate()
        .map(|(i, ga)| {
            let Some(bbox) = ga.bounding_box() else {
                return Ok(Vec::new());
            };
            let mut out = Vec::new();
            for j in index.candidates(&bbox, 0.0) {
                if let Some(geometry) = intersect_geometries(ga, &b[j])? {
                    out.push(Fragment { a: i, b: j, geometry });
                }
            }
            Ok(out)
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(per_feature.into_iter().flatten().collect())
}

/// Concatenate two schemas, suffixing both sides of a name collision
pub(crate) fn merge_schemas(left: &Schema, right: &Schema, suffixes: (&str, &str)) -> Result<Schema> {
    let mut merged = Schema::default();
    for f in left.fields() {
        let name = if right.index_of(&f.name).is_some() {
            format!("{}{}", f.name, suffixes.0)
        } else {
            f.name.clone()
        };
        merged.push(Field::new(name, f.field_type))?;
    }
    for f in right.fields() {
        let name = if left.index_of(&f.name).is_some() {
            format!("{}{}", f.name, suffixes.1)
        } else {
            f.name.clone()
        };
        merged.push(Field::new(name, f.field_type))?;
    }
    Ok(merged)
}

/// `name`, or `name_2`, `name_3`, ... when the schema already has it
pub(crate) fn free_name(schema: &Schema, name: &str) -> String {
    if schema.index_of(name).is_none() {
        return name.to_string();
    }
    let mut n = 2;
    loop {
        let candidate = format!("{name}_{n}");
        if schema.index_of(&candidate).is_none() {
            return candidate;
        }
        n += 1;
    }
}

/// Intersect every feature of `a` with every feature of `b`.
///
/// Each output feature is one non-empty intersection carrying the
/// attributes of both inputs; colliding names get `_1` / `_2` suffixes.
pub fn intersection(a: &FeatureCollection, b: &FeatureCollection) -> Result<FeatureCollection> {
    ensure_same_crs(a.crs(), b.crs())?;
    let ga: Vec<Geometry> = a.geometries().cloned().collect();
    let gb: Vec<Geometry> = b.geometries().cloned().collect();
    let frags = fragments(&ga, &gb)?;
    debug!(left = a.len(), right = b.len(), fragments = frags.len(), "overlay intersection");

    let schema = merge_schemas(a.schema(), b.schema(), ("_1", "_2"))?;
    let mut geometries = Vec::with_capacity(frags.len());
    let mut records = Vec::with_capacity(frags.len());
    for frag in frags {
        let mut record = a.features()[frag.a].properties.clone();
        record.extend(b.features()[frag.b].properties.iter().cloned());
        geometries.push(frag.geometry);
        records.push(record);
    }
    FeatureCollection::new(geometries, records, schema, a.crs().cloned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geocomp_core::vector::{AttributeValue, FieldType, GeometryKind};
    use geocomp_core::{Error, CRS};

    fn labelled(geoms: Vec<Geometry>, field: &str, labels: &[&str]) -> FeatureCollection {
        FeatureCollection::from_geometries(geoms, None)
            .unwrap()
            .with_column(
                field,
                FieldType::Text,
                labels.iter().map(|&l| AttributeValue::from(l)).collect(),
            )
            .unwrap()
    }

    #[test]
    fn test_polygon_overlay() {
        let a = labelled(
            vec![Geometry::rect(0.0, 0.0, 2.0, 2.0).unwrap()],
            "name",
            &["a"],
        );
        let b = labelled(
            vec![
                Geometry::rect(1.0, 1.0, 3.0, 3.0).unwrap(),
                Geometry::rect(10.0, 10.0, 11.0, 11.0).unwrap(),
                Geometry::rect(2.0, 0.0, 3.0, 1.0).unwrap(),
            ],
            "name",
            &["b0", "b1", "b2"],
        );
        let out = intersection(&a, &b).unwrap();
        assert_eq!(out.len(), 1);
        assert_relative_eq!(out.get(0).unwrap().geometry.area(), 1.0, epsilon = 1e-9);
        assert_eq!(out.value(0, "name_1"), Some(&AttributeValue::from("a")));
        assert_eq!(out.value(0, "name_2"), Some(&AttributeValue::from("b0")));
    }

    #[test]
    fn test_line_and_point_overlay() {
        let sq = Geometry::rect(0.0, 0.0, 2.0, 2.0).unwrap();
        let line = Geometry::line_string(&[(-1.0, 1.0), (3.0, 1.0)]).unwrap();
        let clipped = intersect_geometries(&line, &sq).unwrap().unwrap();
        assert_eq!(clipped.kind(), GeometryKind::LineString);
        assert_relative_eq!(clipped.length(), 2.0, epsilon = 1e-9);

        let pts = Geometry::multi_point(&[(1.0, 1.0), (5.0, 5.0)]).unwrap();
        let kept = intersect_geometries(&sq, &pts).unwrap().unwrap();
        assert_eq!(kept, Geometry::point(1.0, 1.0).unwrap());
    }

    #[test]
    fn test_line_line_overlay_yields_points() {
        let cross = Geometry::line_string(&[(0.0, 0.0), (2.0, 2.0)]).unwrap();
        let other = Geometry::line_string(&[(0.0, 2.0), (2.0, 0.0)]).unwrap();
        let Some(Geometry::Point(hit)) = intersect_geometries(&cross, &other).unwrap() else {
            panic!("expected a single crossing point");
        };
        assert_relative_eq!(hit.x(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(hit.y(), 1.0, epsilon = 1e-12);

        let zigzag = Geometry::line_string(&[(0.0, 1.0), (1.0, 1.0), (1.0, 0.0), (3.0, 0.0)]).unwrap();
        let axis = Geometry::line_string(&[(0.0, 0.0), (2.0, 0.0)]).unwrap();
        let shared = intersect_geometries(&zigzag, &axis).unwrap().unwrap();
        assert_eq!(shared, Geometry::multi_point(&[(1.0, 0.0), (2.0, 0.0)]).unwrap());

        let far = Geometry::line_string(&[(5.0, 5.0), (6.0, 6.0)]).unwrap();
        assert_eq!(intersect_geometries(&cross, &far).unwrap(), None);

        let roads = labelled(vec![cross, far], "road", &["r1", "r2"]);
        let rivers = labelled(vec![other, axis], "river", &["w1", "w2"]);
        let bridges = intersection(&roads, &rivers).unwrap();
        assert_eq!(bridges.len(), 2);
        assert_eq!(bridges.value(0, "river"), Some(&AttributeValue::from("w1")));
        assert_eq!(bridges.get(1).unwrap().geometry, Geometry::point(0.0, 0.0).unwrap());
    }

    #[test]
    fn test_overlay_requires_same_crs() {
        let a = FeatureCollection::from_geometries(vec![], Some(CRS::from_epsg(3857))).unwrap();
        let b = FeatureCollection::from_geometries(vec![], None).unwrap();
        assert!(matches!(intersection(&a, &b), Err(Error::CrsMismatch(..))));
    }
}
