//! End-to-end scenarios across the engines.
//!
//! Each test builds its inputs in memory, runs one or more engines and
//! checks a result that is known in closed form.

use approx::assert_relative_eq;
use geocomp_algorithms::conversion::{
    rasterize_collection, vectorize, MergeAlg, PixelActivation, PolygonizeParams, RasterizeParams,
};
use geocomp_algorithms::map_algebra::{
    distance_to_geometries, focal, local_arithmetic, narrow, reclassify, zonal, ArithOp, EdgeMode, FocalParams,
    FocalStatistic, OverflowPolicy, ReclassifyParams, Unmatched, ZonalStatistic,
};
use geocomp_algorithms::overlay::{area_weighted_interpolate, InterpolateParams};
use geocomp_algorithms::predicates::{many_to_one, matrix, MatrixOptions, Predicate};
use geocomp_core::prelude::*;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn points(coords: &[(f64, f64)]) -> Vec<Geometry> {
    coords.iter().map(|&(x, y)| Geometry::point(x, y).unwrap()).collect()
}

fn scenario_polygon() -> Geometry {
    Geometry::polygon(&[(0.0, 0.0), (0.0, 1.0), (1.0, 1.0), (1.0, 0.5), (0.0, 0.0)], &[]).unwrap()
}

#[test]
fn matrix_predicate_scenario() {
    init_tracing();
    let pts = points(&[(0.2, 0.1), (0.7, 0.2), (0.4, 0.8)]);
    let poly = vec![scenario_polygon()];

    for prefilter in [true, false] {
        let options = MatrixOptions {
            bbox_prefilter: prefilter,
        };
        let column = |p| matrix(&pts, &poly, p, &options).unwrap().column(0);
        assert_eq!(column(Predicate::Intersects), vec![true, false, true]);
        assert_eq!(column(Predicate::Within), vec![false, false, true]);
        assert_eq!(column(Predicate::Touches), vec![true, false, false]);
    }

    let within = many_to_one(&pts, &poly[0], Predicate::Within).unwrap();
    assert_eq!(within, vec![false, false, true]);
}

#[test]
fn extensive_interpolation_conserves_totals() {
    let source = FeatureCollection::from_geometries(
        vec![
            Geometry::rect(0.0, 0.0, 2.0, 2.0).unwrap(),
            Geometry::rect(2.0, 0.0, 4.0, 2.0).unwrap(),
        ],
        None,
    )
    .unwrap()
    .with_column("pop", FieldType::Float, vec![100.0.into(), 50.0.into()])
    .unwrap();
    let target = FeatureCollection::from_geometries(
        vec![
            Geometry::rect(0.0, 0.0, 1.0, 2.0).unwrap(),
            Geometry::rect(1.0, 0.0, 3.0, 2.0).unwrap(),
            Geometry::rect(3.0, 0.0, 4.0, 2.0).unwrap(),
        ],
        None,
    )
    .unwrap();

    let out = area_weighted_interpolate(&source, &target, &InterpolateParams::new().extensive("pop")).unwrap();
    let values: Vec<f64> = out.column("pop").unwrap().iter().map(|v| v.as_f64().unwrap()).collect();
    assert_relative_eq!(values[0], 50.0, epsilon = 1e-9);
    assert_relative_eq!(values[1], 75.0, epsilon = 1e-9);
    assert_relative_eq!(values[2], 25.0, epsilon = 1e-9);
    assert_relative_eq!(values.iter().sum::<f64>(), 150.0, epsilon = 1e-9);
}

#[test]
fn unique_ids_survive_vectorize_then_rasterize() {
    init_tracing();
    let (rows, cols) = (5, 7);
    let mut grid = Raster::from_vec((0..(rows * cols) as i32).collect(), rows, cols).unwrap();
    grid.set_transform(GeoTransform::from_origin(500.0, 2000.0, 30.0, 30.0));
    grid.set_crs(Some(CRS::from_epsg(32719)));

    let polygons = vectorize(&grid, &PolygonizeParams::default()).unwrap();
    assert_eq!(polygons.len(), rows * cols);

    let params = RasterizeParams::new(PixelActivation::CellCenter, MergeAlg::ReplaceLast, -1.0);
    let back: Raster<i32> = rasterize_collection(&polygons, Some("value"), &grid.template(), &params).unwrap();
    assert_eq!(back.data(), grid.data());
    assert_eq!(back.transform(), grid.transform());
}

#[test]
fn focal_min_shrink_literal_case() {
    let grid = Raster::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0], 3, 3).unwrap();
    let params = FocalParams::new(Neighborhood::square(1), FocalStatistic::Min, EdgeMode::Shrink);
    let out = focal(&grid, &params).unwrap();
    assert_eq!(out.get(1, 1).unwrap(), 1.0);
    for (r, c) in [(0, 0), (0, 1), (0, 2), (1, 0), (1, 2), (2, 0), (2, 1), (2, 2)] {
        assert!(out.is_nodata_at(r, c).unwrap(), "cell ({r}, {c}) should be no-data");
    }
}

#[test]
fn squaring_promotes_and_narrowing_needs_a_policy() {
    let grid: Raster<u8> = Raster::filled(2, 2, 16);
    let squared = local_arithmetic(&grid, &grid, ArithOp::Mul).unwrap();
    assert_eq!(squared.get(0, 0).unwrap(), 256u16);

    let err = narrow::<u16, u8>(&squared, OverflowPolicy::Fail).unwrap_err();
    assert!(matches!(err, Error::TypeOverflow { target: "uint8", .. }));
    assert_eq!(narrow::<u16, u8>(&squared, OverflowPolicy::Saturate).unwrap().get(1, 1).unwrap(), 255);
}

#[test]
fn reclassify_is_idempotent_on_its_output() {
    let grid = Raster::from_vec(vec![1.0, 4.5, 12.0, 19.0, 25.0, 0.0], 2, 3).unwrap();
    let table = ReclassifyParams::from_table(&[(0.0, 10.0, 5.0), (10.0, 20.0, 15.0)], Unmatched::Keep);
    let once = reclassify(&grid, &table).unwrap();
    let twice = reclassify(&once, &table).unwrap();
    assert_eq!(once.data(), twice.data());
    assert_eq!(once.data().iter().copied().collect::<Vec<_>>(), vec![5.0, 5.0, 15.0, 15.0, 25.0, 5.0]);
}

#[test]
fn zonal_over_rasterized_polygons() {
    init_tracing();
    let template = RasterTemplate::from_bounds((0.0, 0.0, 4.0, 4.0), 1.0, None).unwrap();
    let zones_fc = FeatureCollection::from_geometries(
        vec![
            Geometry::rect(0.0, 0.0, 2.0, 4.0).unwrap(),
            Geometry::rect(2.0, 0.0, 4.0, 4.0).unwrap(),
        ],
        None,
    )
    .unwrap()
    .with_column("zone", FieldType::Integer, vec![1i64.into(), 2i64.into()])
    .unwrap();
    let params = RasterizeParams::new(PixelActivation::CellCenter, MergeAlg::ReplaceLast, 0.0).with_nodata(0.0);
    let zones: Raster<i32> = rasterize_collection(&zones_fc, Some("zone"), &template, &params).unwrap();

    let mut values = template.allocate(0.0f64, None);
    for r in 0..4 {
        for c in 0..4 {
            values.set(r, c, c as f64).unwrap();
        }
    }
    let means = zonal(&values, &zones, ZonalStatistic::Mean).unwrap();
    assert_eq!(means.len(), 2);
    assert_relative_eq!(means[&1].unwrap(), 0.5);
    assert_relative_eq!(means[&2].unwrap(), 2.5);
}

#[test]
fn distance_field_from_a_line() {
    let template = RasterTemplate::from_bounds((0.0, 0.0, 5.0, 3.0), 1.0, None).unwrap();
    let grid = template.allocate(1u8, None);
    let line = FeatureCollection::from_geometries(
        vec![Geometry::line_string(&[(0.0, 0.0), (0.0, 3.0)]).unwrap()],
        None,
    )
    .unwrap();
    let d = distance_to_geometries(&grid, &line).unwrap();
    for r in 0..3 {
        for c in 0..5 {
            assert_relative_eq!(d.get(r, c).unwrap(), c as f64 + 0.5, epsilon = 1e-12);
        }
    }
}
