//! Map algebra engine
//!
//! - Local: per-cell arithmetic (promoted), comparison, logic and masking
//! - Cast: explicit narrowing with an overflow policy
//! - Reclassify: breakpoint tables over half-open intervals
//! - Focal: moving-window statistics with an explicit edge policy
//! - Zonal: aggregates per category of a co-registered zone grid
//! - Global: whole-grid reductions, distance fields and mosaics

mod cast;
mod focal;
mod global;
mod local;
mod reclassify;
mod zonal;

pub use cast::{narrow, OverflowPolicy};
pub use focal::{compute_statistic, focal, focal_apply, EdgeMode, Focal, FocalParams, FocalStatistic};
pub use global::{distance_to_cells, distance_to_geometries, global, global_statistics, merge_rasters, value_counts};
pub use local::{
    apply_mask, apply_mask_in_place, compare, compare_scalar, local_arithmetic, local_combine, local_map,
    local_scalar, logical, logical_not, mask_with, ArithOp, CompareOp, LogicalOp, BOOL_NODATA,
};
pub use reclassify::{reclassify, reclassify_in_place, ReclassEntry, ReclassifyParams, Unmatched};
pub use zonal::{
    polygon_zonal_statistics, zonal, zonal_statistics, zonal_statistics_raster, Zonal, ZonalStatistic, ZoneStats,
};
