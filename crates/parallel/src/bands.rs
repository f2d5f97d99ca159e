//! Row-band partitioning with read-only halos

/// A horizontal band of rows `[start, end)` plus the halo rows a
/// neighborhood operation needs to read above and below it.
///
/// Workers write only `start..end`; the halo belongs to the neighboring
/// bands and is read, never written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowBand {
    pub index: usize,
    pub start: usize,
    pub end: usize,
    pub halo: usize,
    total_rows: usize,
}

impl RowBand {
    pub fn rows(&self) -> usize {
        self.end - self.start
    }

    /// First row readable by this band's worker
    pub fn read_start(&self) -> usize {
        self.start.saturating_sub(self.halo)
    }

    /// One past the last row readable by this band's worker
    pub fn read_end(&self) -> usize {
        (self.end + self.halo).min(self.total_rows)
    }

    pub fn contains(&self, row: usize) -> bool {
        row >= self.start && row < self.end
    }
}

/// Iterator over the bands covering `total_rows` rows
#[derive(Debug, Clone)]
pub struct RowBandIterator {
    total_rows: usize,
    band_rows: usize,
    halo: usize,
    next_start: usize,
    index: usize,
}

impl RowBandIterator {
    pub fn new(total_rows: usize, band_rows: usize, halo: usize) -> Self {
        Self {
            total_rows,
            band_rows: band_rows.max(1),
            halo,
            next_start: 0,
            index: 0,
        }
    }
}

impl Iterator for RowBandIterator {
    type Item = RowBand;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_start >= self.total_rows {
            return None;
        }
        let start = self.next_start;
        let end = (start + self.band_rows).min(self.total_rows);
        let band = RowBand {
            index: self.index,
            start,
            end,
            halo: self.halo,
            total_rows: self.total_rows,
        };
        self.next_start = end;
        self.index += 1;
        Some(band)
    }
}

/// Partition `total_rows` into bands of `band_rows` with a `halo`
pub fn row_bands(total_rows: usize, band_rows: usize, halo: usize) -> Vec<RowBand> {
    RowBandIterator::new(total_rows, band_rows, halo).collect()
}

/// Band height giving about four bands per available worker
pub fn default_band_rows(total_rows: usize) -> usize {
    let workers = crate::worker_count().max(1);
    total_rows.div_ceil(workers * 4).max(1)
}
