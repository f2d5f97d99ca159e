//! Raster reclassification
//!
//! Map value ranges to new values with a breakpoint table.

use geocomp_core::raster::{Raster, RasterElement};
use geocomp_core::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::local::local_map;

/// A reclassification entry mapping `[min, max)` to `value`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReclassEntry {
    /// Minimum value (inclusive)
    pub min: f64,
    /// Maximum value (exclusive)
    pub max: f64,
    /// Output value for this class
    pub value: f64,
}

impl ReclassEntry {
    pub fn new(min: f64, max: f64, value: f64) -> Self {
        Self { min, max, value }
    }

    fn matches(&self, v: f64) -> bool {
        v >= self.min && v < self.max
    }
}

/// Fate of valid cells that fall in no interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unmatched {
    /// Leave the value unchanged
    Keep,
    /// Set the cell to no-data
    NoData,
}

/// Breakpoint table plus the unmatched-cell policy.
///
/// There is no default: callers must say what happens to cells outside
/// every interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReclassifyParams {
    /// Entries are tried in order; the first match wins
    pub classes: Vec<ReclassEntry>,
    pub unmatched: Unmatched,
}

impl ReclassifyParams {
    pub fn new(classes: Vec<ReclassEntry>, unmatched: Unmatched) -> Self {
        Self { classes, unmatched }
    }

    /// Build from `(min, max, value)` triples
    pub fn from_table(table: &[(f64, f64, f64)], unmatched: Unmatched) -> Self {
        let classes = table.iter().map(|&(lo, hi, v)| ReclassEntry::new(lo, hi, v)).collect();
        Self::new(classes, unmatched)
    }

    fn validate(&self) -> Result<()> {
        for entry in &self.classes {
            if entry.min.is_nan() || entry.max.is_nan() || entry.min >= entry.max {
                return Err(Error::InvalidParameter {
                    name: "classes",
                    value: format!("[{}, {})", entry.min, entry.max),
                    reason: "interval must satisfy min < max".into(),
                });
            }
        }
        Ok(())
    }

    /// Target values converted to `T`, failing when one cannot be stored
    fn targets<T: RasterElement>(&self) -> Result<Vec<T>> {
        self.classes
            .iter()
            .map(|e| {
                T::from_f64_exact(e.value).ok_or(Error::TypeOverflow {
                    value: e.value.to_string(),
                    target: T::data_type().name(),
                })
            })
            .collect()
    }

    fn lookup<T: RasterElement>(&self, targets: &[T], v: T) -> Option<Option<T>> {
        let x = v.to_f64()?;
        match self.classes.iter().position(|e| e.matches(x)) {
            Some(i) => Some(Some(targets[i])),
            None => match self.unmatched {
                Unmatched::Keep => Some(Some(v)),
                Unmatched::NoData => Some(None),
            },
        }
    }
}

/// Output sentinel, `None` when no cell can become no-data. A class
/// target equal to the sentinel would read back as no-data, so it fails.
fn output_nodata<T: RasterElement>(raster: &Raster<T>, params: &ReclassifyParams, targets: &[T]) -> Result<Option<T>> {
    if raster.nodata().is_none() && params.unmatched == Unmatched::Keep {
        return Ok(None);
    }
    let nodata = raster.nodata_or_default()?;
    if targets.contains(&nodata) {
        return Err(Error::NoDataInUse {
            value: nodata.to_string(),
            dtype: T::data_type().name(),
        });
    }
    Ok(Some(nodata))
}

/// Reclassify every band; no-data cells stay no-data.
///
/// # Example
/// ```ignore
/// let params = ReclassifyParams::from_table(
///     &[(-1.0, 0.0, 1.0), (0.0, 0.2, 2.0), (0.2, 1.01, 3.0)],
///     Unmatched::NoData,
/// );
/// let classes = reclassify(&ndvi, &params)?;
/// ```
pub fn reclassify<T: RasterElement>(raster: &Raster<T>, params: &ReclassifyParams) -> Result<Raster<T>> {
    params.validate()?;
    let targets = params.targets::<T>()?;
    debug!(classes = params.classes.len(), unmatched = ?params.unmatched, "reclassify");
    let nodata = output_nodata(raster, params, &targets)?;
    let fill = nodata.unwrap_or_else(T::default_nodata);
    let mut out = local_map(raster, fill, |v| params.lookup(&targets, v).flatten())?;
    out.set_nodata(nodata);
    Ok(out)
}

/// [`reclassify`] writing into `raster`. The caller must hold the only
/// reference to the grid for the duration of the call.
pub fn reclassify_in_place<T: RasterElement>(raster: &mut Raster<T>, params: &ReclassifyParams) -> Result<()> {
    params.validate()?;
    let targets = params.targets::<T>()?;
    let src_nodata = raster.nodata();
    let nodata = output_nodata(raster, params, &targets)?;
    let fill = nodata.unwrap_or_else(T::default_nodata);
    for band in raster.bands_mut() {
        for v in band.iter_mut() {
            if v.is_nodata(src_nodata) {
                continue;
            }
            *v = params.lookup(&targets, *v).flatten().unwrap_or(fill);
        }
    }
    raster.set_nodata(nodata);
    Ok(())
}
