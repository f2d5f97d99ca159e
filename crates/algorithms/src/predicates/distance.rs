//! Planar minimum distance between geometries

use geo::Coord;
use geocomp_core::vector::Geometry;

use super::relation::Prepared;

/// Distance from `p` to the closed segment `a`-`b`
pub(crate) fn point_segment_distance(p: Coord<f64>, a: Coord<f64>, b: Coord<f64>) -> f64 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len_sq = dx * dx + dy * dy;
    if len_sq == 0.0 {
        return (p.x - a.x).hypot(p.y - a.y);
    }
    let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / len_sq).clamp(0.0, 1.0);
    (p.x - (a.x + t * dx)).hypot(p.y - (a.y + t * dy))
}

/// Smallest distance from any vertex of `from` to the other geometry's
/// segments, or to its vertices when it has no segments
fn one_way(from: &[Coord<f64>], segments: &[(Coord<f64>, Coord<f64>)], vertices: &[Coord<f64>]) -> f64 {
    let mut best = f64::INFINITY;
    for &p in from {
        if segments.is_empty() {
            for &q in vertices {
                best = best.min((p.x - q.x).hypot(p.y - q.y));
            }
        } else {
            for &(a, b) in segments {
                best = best.min(point_segment_distance(p, a, b));
            }
        }
    }
    best
}

pub(crate) fn prepared_distance(a: &Prepared<'_>, b: &Prepared<'_>) -> f64 {
    if a.intersects(b) {
        return 0.0;
    }
    // Disjoint geometries reach their minimum at a vertex of one of them.
    let (va, sa) = (a.source.vertices(), a.source.segments());
    let (vb, sb) = (b.source.vertices(), b.source.segments());
    one_way(&va, &sb, &vb).min(one_way(&vb, &sa, &va))
}

/// Minimum planar Euclidean distance between any point of `a` and any
/// point of `b`; zero when they intersect, infinite when either is empty.
pub fn distance(a: &Geometry, b: &Geometry) -> f64 {
    prepared_distance(&Prepared::new(a), &Prepared::new(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_point_segment_distance() {
        let a = Coord { x: 0.0, y: 0.0 };
        let b = Coord { x: 10.0, y: 0.0 };
        assert_relative_eq!(point_segment_distance(Coord { x: 5.0, y: 3.0 }, a, b), 3.0);
        assert_relative_eq!(point_segment_distance(Coord { x: -3.0, y: 4.0 }, a, b), 5.0);
        assert_relative_eq!(point_segment_distance(Coord { x: 1.0, y: 1.0 }, a, a), 2f64.sqrt());
    }

    #[test]
    fn test_distance_between_kinds() {
        let sq = Geometry::rect(0.0, 0.0, 1.0, 1.0).unwrap();
        let p = Geometry::point(4.0, 5.0).unwrap();
        assert_relative_eq!(distance(&sq, &p), 5.0);
        assert_relative_eq!(distance(&p, &sq), 5.0);

        let inside = Geometry::point(0.5, 0.5).unwrap();
        assert_eq!(distance(&sq, &inside), 0.0);

        let line = Geometry::line_string(&[(3.0, -5.0), (3.0, 5.0)]).unwrap();
        assert_relative_eq!(distance(&sq, &line), 2.0);

        let q = Geometry::point(1.0, 1.0).unwrap();
        let r = Geometry::point(4.0, 5.0).unwrap();
        assert_relative_eq!(distance(&q, &r), 5.0);
    }

    #[test]
    fn test_distance_to_hole_edge() {
        let donut = Geometry::polygon(
            &[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0), (0.0, 0.0)],
            &[vec![(2.0, 2.0), (8.0, 2.0), (8.0, 8.0), (2.0, 8.0), (2.0, 2.0)]],
        )
        .unwrap();
        let centre = Geometry::point(5.0, 5.0).unwrap();
        assert_relative_eq!(distance(&donut, &centre), 3.0);
    }
}
