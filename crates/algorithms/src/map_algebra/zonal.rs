//! Zonal statistics
//!
//! Aggregates the cells of a value grid per zone of a co-registered
//! integer zone grid. Each row band accumulates its own zone map; the maps
//! are combined once every band is done.

use std::collections::{BTreeMap, HashMap};

use geocomp_core::crs::ensure_same_crs;
use geocomp_core::raster::{Raster, RasterElement};
use geocomp_core::vector::FeatureCollection;
use geocomp_core::{Algorithm, Error, Result};
use geocomp_parallel::{default_band_rows, map_partitions, merge_keyed, row_bands, Mergeable, ProcessingMode, RowBand};
use ndarray::Array2;
use num_traits::{NumCast, PrimInt};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::conversion::{covered_cells, PixelActivation};
use crate::maybe_rayon::*;

/// Available zonal statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZonalStatistic {
    /// Number of valid cells
    Count,
    Sum,
    Mean,
    Min,
    Max,
    /// Population standard deviation
    StdDev,
    /// max - min
    Range,
}

/// Running aggregate for one zone
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ZoneStats {
    /// Valid cells
    pub count: usize,
    /// Cells of the zone whose value is no-data
    pub nodata_count: usize,
    pub sum: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    #[serde(skip)]
    sum_sq: f64,
}

impl ZoneStats {
    pub(crate) fn push(&mut self, v: f64) {
        self.count += 1;
        self.sum += v;
        self.sum_sq += v * v;
        self.min = Some(self.min.map_or(v, |m| m.min(v)));
        self.max = Some(self.max.map_or(v, |m| m.max(v)));
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }

    pub fn std_dev(&self) -> Option<f64> {
        let mean = self.mean()?;
        let var = (self.sum_sq / self.count as f64 - mean * mean).max(0.0);
        Some(var.sqrt())
    }

    /// Value of `stat`; `None` when the zone has no valid cell, except for
    /// [`ZonalStatistic::Count`]
    pub fn get(&self, stat: ZonalStatistic) -> Option<f64> {
        match stat {
            ZonalStatistic::Count => Some(self.count as f64),
            ZonalStatistic::Sum => (self.count > 0).then_some(self.sum),
            ZonalStatistic::Mean => self.mean(),
            ZonalStatistic::Min => self.min,
            ZonalStatistic::Max => self.max,
            ZonalStatistic::StdDev => self.std_dev(),
            ZonalStatistic::Range => Some(self.max? - self.min?),
        }
    }
}

impl Mergeable for ZoneStats {
    fn merge(&mut self, other: Self) {
        self.count += other.count;
        self.nodata_count += other.nodata_count;
        self.sum += other.sum;
        self.sum_sq += other.sum_sq;
        self.min = match (self.min, other.min) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        self.max = match (self.max, other.max) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
    }
}

fn zone_code<Z: RasterElement + PrimInt>(z: Z) -> Result<i64> {
    <i64 as NumCast>::from(z).ok_or_else(|| Error::TypeOverflow {
        value: format!("{:?}", z),
        target: "int64",
    })
}

fn accumulate_band<T, Z>(values: &Raster<T>, zones: &Raster<Z>, band: RowBand) -> Result<HashMap<i64, ZoneStats>>
where
    T: RasterElement,
    Z: RasterElement + PrimInt,
{
    let (vals, codes) = (values.data(), zones.data());
    let mut partial: HashMap<i64, ZoneStats> = HashMap::new();
    for row in band.start..band.end {
        for col in 0..values.cols() {
            let z = codes[(row, col)];
            if zones.is_nodata(z) {
                continue;
            }
            let entry = partial.entry(zone_code(z)?).or_default();
            let v = vals[(row, col)];
            match v.to_f64() {
                Some(x) if !values.is_nodata(v) => entry.push(x),
                _ => entry.nodata_count += 1,
            }
        }
    }
    trace!(band = band.index, zones = partial.len(), "zonal band");
    Ok(partial)
}

/// Aggregate band 0 of `values` per zone of `zones`.
///
/// Cells whose zone code is no-data are ignored. A zone whose cells are all
/// no-data is still reported, with a count of zero and no aggregates.
pub fn zonal_statistics<T, Z>(values: &Raster<T>, zones: &Raster<Z>) -> Result<BTreeMap<i64, ZoneStats>>
where
    T: RasterElement,
    Z: RasterElement + PrimInt,
{
    values.ensure_co_registered(zones)?;
    let rows = values.rows();
    debug!(rows, cols = values.cols(), "zonal statistics");

    let partitions = row_bands(rows, default_band_rows(rows), 0);
    let partials = map_partitions(partitions, ProcessingMode::Parallel, |b| accumulate_band(values, zones, b))
        .into_iter()
        .collect::<Result<Vec<_>>>()?;
    Ok(merge_keyed(partials).into_iter().collect())
}

/// One statistic per zone; `None` for zones without valid cells
pub fn zonal<T, Z>(values: &Raster<T>, zones: &Raster<Z>, stat: ZonalStatistic) -> Result<BTreeMap<i64, Option<f64>>>
where
    T: RasterElement,
    Z: RasterElement + PrimInt,
{
    Ok(zonal_statistics(values, zones)?
        .into_iter()
        .map(|(zone, s)| (zone, s.get(stat)))
        .collect())
}

/// Grid where every cell holds its zone's statistic (NaN for no-data zones)
pub fn zonal_statistics_raster<T, Z>(values: &Raster<T>, zones: &Raster<Z>, stat: ZonalStatistic) -> Result<Raster<f64>>
where
    T: RasterElement,
    Z: RasterElement + PrimInt,
{
    let stats = zonal(values, zones, stat)?;
    let codes = zones.data();
    let mut out = Array2::from_elem(values.shape(), f64::NAN);
    for ((r, c), cell) in out.indexed_iter_mut() {
        let z = codes[(r, c)];
        if zones.is_nodata(z) {
            continue;
        }
        if let Some(Some(v)) = stats.get(&zone_code(z)?) {
            *cell = *v;
        }
    }
    values.with_bands(vec![out], Some(f64::NAN))
}

/// Aggregate band `band` of `raster` under each feature of `zones`.
///
/// A cell belongs to a polygon when its center lies inside; lines and
/// points take every cell they pass through. Features are independent, so
/// a cell may count toward several overlapping polygons.
pub fn polygon_zonal_statistics<T: RasterElement>(
    raster: &Raster<T>,
    zones: &FeatureCollection,
    band: usize,
) -> Result<Vec<ZoneStats>> {
    ensure_same_crs(raster.crs(), zones.crs())?;
    let data = raster.band(band)?;
    let template = raster.template();
    debug!(features = zones.len(), band, "polygon zonal statistics");

    let geometries: Vec<_> = zones.geometries().collect();
    Ok(geometries
        .par_iter()
        .map(|g| {
            let mut stats = ZoneStats::default();
            for cell in covered_cells(g, &template, PixelActivation::CellCenter) {
                let v = data[cell];
                match v.to_f64() {
                    Some(x) if !raster.is_nodata(v) => stats.push(x),
                    _ => stats.nodata_count += 1,
                }
            }
            stats
        })
        .collect())
}

/// Zonal statistics as an [`Algorithm`]
#[derive(Debug, Clone, Default)]
pub struct Zonal;

impl Algorithm for Zonal {
    type Input = (Raster<f64>, Raster<i32>);
    type Output = BTreeMap<i64, Option<f64>>;
    type Params = ZonalStatistic;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Zonal"
    }

    fn description(&self) -> &'static str {
        "Per-zone aggregate of a value grid over a co-registered zone grid"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        let (values, zones) = input;
        zonal(&values, &zones, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geocomp_core::vector::Geometry;
    use geocomp_core::GeoTransform;

    fn grids() -> (Raster<f64>, Raster<i32>) {
        let t = GeoTransform::from_origin(0.0, 4.0, 1.0, 1.0);
        let mut values = Raster::from_vec((0..16).map(|v| v as f64).collect(), 4, 4).unwrap();
        values.set_transform(t);
        for c in 0..4 {
            values.set(3, c, f64::NAN).unwrap();
        }
        let codes = (0..16)
            .map(|i| match (i / 4, i % 4) {
                (3, _) => 3,
                (_, c) if c < 2 => 1,
                _ => 2,
            })
            .collect();
        let mut zones = Raster::from_vec(codes, 4, 4).unwrap();
        zones.set_transform(t);
        (values, zones)
    }

    #[test]
    fn test_zonal_basic() {
        let (values, zones) = grids();
        let stats = zonal_statistics(&values, &zones).unwrap();
        assert_eq!(stats.len(), 3);

        let z1 = &stats[&1];
        assert_eq!(z1.count, 6);
        assert_eq!(z1.sum, 27.0);
        assert_eq!(z1.min, Some(0.0));
        assert_eq!(z1.max, Some(9.0));
        assert_relative_eq!(z1.mean().unwrap(), 4.5);
        assert_relative_eq!(z1.std_dev().unwrap(), (65.5f64 / 6.0).sqrt(), epsilon = 1e-9);

        assert_relative_eq!(stats[&2].mean().unwrap(), 6.5);
    }

    #[test]
    fn test_nodata_zone_is_not_an_error() {
        let (values, zones) = grids();
        let stats = zonal_statistics(&values, &zones).unwrap();
        let z3 = &stats[&3];
        assert_eq!(z3.count, 0);
        assert_eq!(z3.nodata_count, 4);
        assert_eq!(z3.get(ZonalStatistic::Mean), None);
        assert_eq!(z3.get(ZonalStatistic::Count), Some(0.0));

        let means = zonal(&values, &zones, ZonalStatistic::Mean).unwrap();
        assert_eq!(means[&3], None);
        assert_eq!(means[&1], Some(4.5));
    }

    #[test]
    fn test_zone_nodata_cells_are_skipped() {
        let (values, mut zones) = grids();
        zones.set_nodata(Some(-1));
        zones.set(0, 0, -1).unwrap();
        let stats = zonal_statistics(&values, &zones).unwrap();
        assert!(!stats.contains_key(&-1));
        assert_eq!(stats[&1].count, 5);
        assert_eq!(stats[&1].min, Some(1.0));
    }

    #[test]
    fn test_zonal_raster() {
        let (values, zones) = grids();
        let out = zonal_statistics_raster(&values, &zones, ZonalStatistic::Range).unwrap();
        assert_eq!(out.get(0, 0).unwrap(), 9.0);
        assert_eq!(out.get(2, 3).unwrap(), 9.0);
        assert!(out.get(3, 0).unwrap().is_nan());
        assert_eq!(out.transform(), values.transform());
    }

    #[test]
    fn test_shape_mismatch() {
        let (values, _) = grids();
        let zones: Raster<i32> = Raster::new(3, 3);
        assert!(matches!(
            zonal_statistics(&values, &zones),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_partials_merge_across_bands() {
        let (rows, cols) = (300, 40);
        let values = Raster::from_vec((0..rows * cols).map(|i| (i % 97) as f64).collect(), rows, cols).unwrap();
        let zones = Raster::from_vec((0..rows * cols).map(|i| ((i / cols) / 7 % 5) as u16).collect(), rows, cols).unwrap();

        let stats = zonal_statistics(&values, &zones).unwrap();
        let mut expected: BTreeMap<i64, (usize, f64)> = BTreeMap::new();
        for i in 0..rows * cols {
            let e = expected.entry(((i / cols) / 7 % 5) as i64).or_default();
            e.0 += 1;
            e.1 += (i % 97) as f64;
        }
        assert_eq!(stats.len(), expected.len());
        for (zone, (count, sum)) in expected {
            assert_eq!(stats[&zone].count, count);
            assert_relative_eq!(stats[&zone].sum, sum);
        }
    }

    #[test]
    fn test_polygon_zonal_statistics() {
        let (values, _) = grids();
        let fc = FeatureCollection::from_geometries(
            vec![
                Geometry::rect(0.0, 2.0, 2.0, 4.0).unwrap(),
                Geometry::rect(10.0, 10.0, 12.0, 12.0).unwrap(),
                Geometry::rect(0.0, 0.0, 4.0, 1.0).unwrap(),
            ],
            None,
        )
        .unwrap();
        let stats = polygon_zonal_statistics(&values, &fc, 0).unwrap();
        assert_eq!(stats[0].count, 4);
        assert_eq!(stats[0].sum, 10.0);
        assert_eq!(stats[0].max, Some(5.0));
        assert_eq!(stats[1].count, 0);
        assert_eq!(stats[1].mean(), None);
        assert_eq!(stats[2].count, 0);
        assert_eq!(stats[2].nodata_count, 4);
    }
}
