//! Property tests for the predicate engine and the raster/vector round trip

use geocomp_algorithms::conversion::{
    rasterize_collection, vectorize, MergeAlg, PixelActivation, PolygonizeParams, RasterizeParams,
};
use geocomp_algorithms::predicates::{contains, distance, intersects, within};
use geocomp_core::prelude::*;
use proptest::prelude::*;

/// Coordinates on a half-unit lattice, so that touching and collinear
/// configurations come up often.
fn coord() -> impl Strategy<Value = f64> {
    (-8i32..8).prop_map(|v| v as f64 * 0.5)
}

fn geometry() -> impl Strategy<Value = Geometry> {
    prop_oneof![
        (coord(), coord()).prop_map(|(x, y)| Geometry::point(x, y).unwrap()),
        (coord(), coord(), 1i32..5, -4i32..5).prop_map(|(x, y, dx, dy)| {
            Geometry::line_string(&[(x, y), (x + dx as f64 * 0.5, y + dy as f64 * 0.5)]).unwrap()
        }),
        (coord(), coord(), 1i32..6, 1i32..6).prop_map(|(x, y, w, h)| {
            Geometry::rect(x, y, x + w as f64 * 0.5, y + h as f64 * 0.5).unwrap()
        }),
    ]
}

fn grid(max_side: usize, values: i32) -> impl Strategy<Value = Raster<i32>> {
    (1..=max_side, 1..=max_side).prop_flat_map(move |(rows, cols)| {
        prop::collection::vec(0..values, rows * cols).prop_map(move |data| {
            let mut r = Raster::from_vec(data, rows, cols).unwrap();
            r.set_transform(GeoTransform::from_origin(10.0, 20.0, 2.0, 2.0));
            r
        })
    })
}

fn round_trip(grid: &Raster<i32>) -> Raster<i32> {
    let polygons = vectorize(grid, &PolygonizeParams::default()).unwrap();
    let params = RasterizeParams::new(PixelActivation::CellCenter, MergeAlg::ReplaceLast, -1.0);
    rasterize_collection(&polygons, Some("value"), &grid.template(), &params).unwrap()
}

proptest! {
    #[test]
    fn prop_intersects_is_symmetric(a in geometry(), b in geometry()) {
        prop_assert_eq!(intersects(&a, &b), intersects(&b, &a));
    }

    #[test]
    fn prop_within_is_converse_of_contains(a in geometry(), b in geometry()) {
        prop_assert_eq!(within(&a, &b), contains(&b, &a));
    }

    #[test]
    fn prop_distance_is_zero_iff_intersecting(a in geometry(), b in geometry()) {
        let d = distance(&a, &b);
        prop_assert!(d >= 0.0);
        prop_assert_eq!(d == 0.0, intersects(&a, &b));
        prop_assert_eq!(d, distance(&b, &a));
    }

    #[test]
    fn prop_unique_ids_round_trip(rows in 1usize..9, cols in 1usize..9) {
        let mut g = Raster::from_vec((0..(rows * cols) as i32).collect(), rows, cols).unwrap();
        g.set_transform(GeoTransform::from_origin(10.0, 20.0, 2.0, 2.0));
        let back = round_trip(&g);
        prop_assert_eq!(back.data(), g.data());
    }

    #[test]
    fn prop_dissolved_regions_round_trip(g in grid(8, 3)) {
        let back = round_trip(&g);
        prop_assert_eq!(back.data(), g.data());
    }
}
