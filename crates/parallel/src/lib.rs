//! # geocomp parallel
//!
//! Partitioning helpers shared by the geocomp engines:
//! - Row bands with read-only halos for neighborhood operations
//! - Ordered execution of independent partitions (rayon when the
//!   `parallel` feature is on, sequential otherwise)
//! - Keyed merge of partial aggregates

pub mod bands;
pub mod merge;

pub use bands::{default_band_rows, row_bands, RowBand, RowBandIterator};
pub use merge::{map_partitions, merge_keyed, Mergeable, ProcessingMode};

/// Number of workers partitions are spread across
pub fn worker_count() -> usize {
    #[cfg(feature = "parallel")]
    {
        rayon::current_num_threads()
    }
    #[cfg(not(feature = "parallel"))]
    {
        1
    }
}
