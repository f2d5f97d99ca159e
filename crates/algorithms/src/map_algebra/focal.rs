//! Focal (moving window) operations
//!
//! Computes an aggregate over the window centered on each cell.
//! Supports: Min, Max, Mean, Median, Mode, Sum, StdDev, Range, Count,
//! Percentile, or any user function over the window values.
//!
//! Work is split into row bands; each band's worker reads the shared input
//! (its rows plus a halo of half the window height) and writes only its
//! own output rows.

use geocomp_core::raster::{Neighborhood, Raster, RasterElement};
use geocomp_core::{Algorithm, Error, Result};
use geocomp_parallel::{default_band_rows, map_partitions, row_bands, ProcessingMode, RowBand};
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::{debug, trace};

/// Available focal statistics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FocalStatistic {
    Min,
    Max,
    /// Arithmetic mean
    Mean,
    Median,
    /// Most frequent value; ties go to the smallest
    Mode,
    Sum,
    /// Standard deviation (population)
    StdDev,
    /// max - min
    Range,
    /// Number of valid values in the window
    Count,
    /// Percentile (0-100), nearest rank
    Percentile(f64),
}

/// How the window is filled where it extends past the grid
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeMode {
    /// Mirror including the edge cell: `d c b a | a b c d | d c b a`
    Reflect,
    /// Mirror about the edge cell: `d c b | a b c d | c b a`
    Mirror,
    /// Out-of-grid positions take this value (NaN contributes nothing)
    Constant(f64),
    /// Repeat the edge cell: `a a a | a b c d | d d d`
    Nearest,
    /// Periodic: `a b c d | a b c d | a b c d`
    Wrap,
    /// No extension: cells whose window leaves the grid become no-data
    Shrink,
}

impl EdgeMode {
    fn resolve(&self, i: isize, n: usize) -> Option<usize> {
        let n_i = n as isize;
        if (0..n_i).contains(&i) {
            return Some(i as usize);
        }
        match self {
            EdgeMode::Reflect => {
                let period = 2 * n_i;
                let m = i.rem_euclid(period);
                Some(if m < n_i { m } else { period - 1 - m } as usize)
            }
            EdgeMode::Mirror if n == 1 => Some(0),
            EdgeMode::Mirror => {
                let period = 2 * n_i - 2;
                let m = i.rem_euclid(period);
                Some(if m < n_i { m } else { period - m } as usize)
            }
            EdgeMode::Nearest => Some(i.clamp(0, n_i - 1) as usize),
            EdgeMode::Wrap => Some(i.rem_euclid(n_i) as usize),
            EdgeMode::Constant(_) | EdgeMode::Shrink => None,
        }
    }
}

/// Parameters for focal statistics. The edge policy has no default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocalParams {
    pub neighborhood: Neighborhood,
    pub statistic: FocalStatistic,
    pub edge: EdgeMode,
}

impl FocalParams {
    pub fn new(neighborhood: Neighborhood, statistic: FocalStatistic, edge: EdgeMode) -> Self {
        Self {
            neighborhood,
            statistic,
            edge,
        }
    }

    fn validate(&self) -> Result<()> {
        self.neighborhood.validate()?;
        if let FocalStatistic::Percentile(p) = self.statistic
            && !(0.0..=100.0).contains(&p)
        {
            return Err(Error::InvalidParameter {
                name: "percentile",
                value: p.to_string(),
                reason: "must be between 0 and 100".into(),
            });
        }
        Ok(())
    }
}

fn sort_values(values: &mut [f64]) {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
}

/// Aggregate a non-empty window of valid values
pub fn compute_statistic(values: &mut [f64], stat: FocalStatistic) -> f64 {
    let n = values.len() as f64;

    match stat {
        FocalStatistic::Mean => values.iter().sum::<f64>() / n,
        FocalStatistic::StdDev => {
            let mean = values.iter().sum::<f64>() / n;
            let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
            var.sqrt()
        }
        FocalStatistic::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
        FocalStatistic::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        FocalStatistic::Range => {
            let min = values.iter().copied().fold(f64::INFINITY, f64::min);
            let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            max - min
        }
        FocalStatistic::Sum => values.iter().sum::<f64>(),
        FocalStatistic::Count => n,
        FocalStatistic::Median => {
            sort_values(values);
            let mid = values.len() / 2;
            if values.len() % 2 == 0 {
                (values[mid - 1] + values[mid]) / 2.0
            } else {
                values[mid]
            }
        }
        FocalStatistic::Mode => {
            sort_values(values);
            let (mut best, mut best_run) = (values[0], 0);
            let mut i = 0;
            while i < values.len() {
                let run = values[i..].iter().take_while(|&&v| v == values[i]).count();
                // strictly greater keeps the smallest value on ties
                if run > best_run {
                    best = values[i];
                    best_run = run;
                }
                i += run;
            }
            best
        }
        FocalStatistic::Percentile(p) => {
            sort_values(values);
            let idx = (p / 100.0 * (values.len() - 1) as f64).round() as usize;
            values[idx.min(values.len() - 1)]
        }
    }
}

/// Window geometry shared by all workers
struct Kernel {
    offsets: Vec<(isize, isize)>,
    radii: (usize, usize),
    edge: EdgeMode,
}

impl Kernel {
    fn gather(&self, src: &ArrayView2<f64>, row: usize, col: usize, values: &mut Vec<f64>) -> bool {
        let (rows, cols) = src.dim();
        values.clear();
        if let EdgeMode::Shrink = self.edge {
            let (rr, rc) = self.radii;
            if row < rr || col < rc || row + rr >= rows || col + rc >= cols {
                return false;
            }
        }
        for &(dr, dc) in &self.offsets {
            let r = self.edge.resolve(row as isize + dr, rows);
            let c = self.edge.resolve(col as isize + dc, cols);
            let v = match (r, c) {
                (Some(r), Some(c)) => src[(r, c)],
                _ => match self.edge {
                    EdgeMode::Constant(k) => k,
                    _ => continue,
                },
            };
            // no-data was converted to NaN on input
            if !v.is_nan() {
                values.push(v);
            }
        }
        !values.is_empty()
    }

    fn band_rows<F>(&self, src: &ArrayView2<f64>, band: RowBand, f: &F) -> Vec<f64>
    where
        F: Fn(&mut [f64]) -> f64,
    {
        let cols = src.ncols();
        let mut out = vec![f64::NAN; band.rows() * cols];
        let mut values = Vec::with_capacity(self.offsets.len());
        for row in band.start..band.end {
            for col in 0..cols {
                if self.gather(src, row, col, &mut values) {
                    out[(row - band.start) * cols + col] = f(&mut values);
                }
            }
        }
        trace!(band = band.index, start = band.start, end = band.end, "focal band");
        out
    }
}

fn to_f64_band<T: RasterElement>(band: &Array2<T>, nodata: Option<T>) -> Array2<f64> {
    band.mapv(|v| {
        if v.is_nodata(nodata) {
            f64::NAN
        } else {
            v.to_f64().unwrap_or(f64::NAN)
        }
    })
}

/// Apply `f` to the valid values of the window around each cell.
///
/// The output is a float grid with NaN no-data. A cell is NaN when its
/// window holds no valid value, or under [`EdgeMode::Shrink`] when the
/// window would leave the grid. `f` receives the window values in
/// neighborhood order (row-major) and may reorder them.
pub fn focal_apply<T, F>(
    raster: &Raster<T>,
    neighborhood: &Neighborhood,
    edge: EdgeMode,
    f: F,
) -> Result<Raster<f64>>
where
    T: RasterElement,
    F: Fn(&mut [f64]) -> f64 + Sync + Send,
{
    neighborhood.validate()?;
    let (rows, cols) = raster.shape();
    let (rr, _) = neighborhood.radii();
    let kernel = Kernel {
        offsets: neighborhood.offsets(),
        radii: neighborhood.radii(),
        edge,
    };
    debug!(rows, cols, window = ?neighborhood.extent(), ?edge, "focal");

    let mut bands = Vec::with_capacity(raster.band_count());
    for band in raster.bands() {
        let src = to_f64_band(band, raster.nodata());
        let view = src.view();
        let partitions = row_bands(rows, default_band_rows(rows), rr);
        let chunks = map_partitions(partitions, ProcessingMode::Parallel, |b| kernel.band_rows(&view, b, &f));
        let data: Vec<f64> = chunks.into_iter().flatten().collect();
        bands.push(Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?);
    }
    raster.with_bands(bands, Some(f64::NAN))
}

/// Compute a focal statistic on every band
pub fn focal<T: RasterElement>(raster: &Raster<T>, params: &FocalParams) -> Result<Raster<f64>> {
    params.validate()?;
    let stat = params.statistic;
    focal_apply(raster, &params.neighborhood, params.edge, move |values| {
        compute_statistic(values, stat)
    })
}

/// Focal statistics as an [`Algorithm`]
#[derive(Debug, Clone, Default)]
pub struct Focal;

impl Algorithm for Focal {
    type Input = Raster<f64>;
    type Output = Raster<f64>;
    type Params = FocalParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Focal"
    }

    fn description(&self) -> &'static str {
        "Moving-window statistic with an explicit edge policy"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        focal(&input, &params)
    }
}
