//! Banded double-buffer storage for the shared-memory backend.
//!
//! Each of the two grid buffers is split into one contiguous band per
//! worker. Band `w` starts at the first cell of worker `w`'s assignment
//! (band 0 starts at index 0, the last band runs to the end of the buffer),
//! so a worker's writes always land inside its own band.
//!
//! During a pass every worker read-locks all bands of the current buffer,
//! copies out the rows it reads, and then write-locks only its own band of
//! the next buffer. Writers of the next buffer are therefore disjoint, and
//! nobody writes the current one.

use std::ops::Range;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use relax_core::{RelaxError, WorkAssignment, WorkerStage};

/// One grid buffer, split into per-worker bands.
#[derive(Debug)]
pub struct BandedBuffer {
    starts: Vec<usize>,
    bands: Vec<RwLock<Vec<f64>>>,
    len: usize,
}

/// Band start offsets for a set of assignments over a `cols`-wide grid.
pub fn band_starts(assignments: &[WorkAssignment], cols: usize) -> Vec<usize> {
    assignments
        .iter()
        .enumerate()
        .map(|(w, a)| if w == 0 { 0 } else { a.grid_range(cols).start })
        .collect()
}

impl BandedBuffer {
    /// Copy `values` into bands beginning at `starts`.
    ///
    /// `starts` must be non-decreasing, begin at 0 and stay within
    /// `values.len()`.
    pub fn from_slice(values: &[f64], starts: &[usize]) -> Result<Self, RelaxError> {
        let len = values.len();
        let mut bands = Vec::with_capacity(starts.len());
        for (i, &start) in starts.iter().enumerate() {
            let end = starts.get(i + 1).copied().unwrap_or(len);
            let mut band = Vec::new();
            band.try_reserve_exact(end - start)
                .map_err(|_| RelaxError::Allocation {
                    what: "grid band",
                    cells: end - start,
                })?;
            band.extend_from_slice(&values[start..end]);
            bands.push(RwLock::new(band));
        }
        Ok(Self {
            starts: starts.to_vec(),
            bands,
            len,
        })
    }

    /// Number of bands.
    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    /// Total cells across all bands.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the buffer holds no cells.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Flat index of the first cell of band `band`.
    pub fn band_start(&self, band: usize) -> usize {
        self.starts[band]
    }

    /// Read-lock every band, on behalf of `worker`.
    pub fn read_all(&self, worker: usize) -> Result<BandView<'_>, RelaxError> {
        let mut guards = Vec::with_capacity(self.bands.len());
        for band in &self.bands {
            guards.push(band.read().map_err(|_| poisoned(worker))?);
        }
        Ok(BandView {
            starts: &self.starts,
            guards,
        })
    }

    /// Write-lock band `band`, on behalf of `worker`.
    pub fn write_band(
        &self,
        band: usize,
        worker: usize,
    ) -> Result<RwLockWriteGuard<'_, Vec<f64>>, RelaxError> {
        self.bands[band].write().map_err(|_| poisoned(worker))
    }

    /// Reassemble the whole buffer.
    pub fn to_vec(&self) -> Result<Vec<f64>, RelaxError> {
        let mut out = Vec::new();
        out.try_reserve_exact(self.len)
            .map_err(|_| RelaxError::Allocation {
                what: "grid buffer",
                cells: self.len,
            })?;
        for (w, band) in self.bands.iter().enumerate() {
            out.extend_from_slice(&band.read().map_err(|_| poisoned(w))?);
        }
        Ok(out)
    }
}

fn poisoned(worker: usize) -> RelaxError {
    RelaxError::worker(worker, WorkerStage::Lock, "grid band lock poisoned")
}

/// Read-only view over every band of one buffer.
pub struct BandView<'a> {
    starts: &'a [usize],
    guards: Vec<RwLockReadGuard<'a, Vec<f64>>>,
}

impl BandView<'_> {
    /// Copy cells `range` into `out`, which must be `range.len()` long.
    pub fn copy_range(&self, range: Range<usize>, out: &mut [f64]) {
        debug_assert_eq!(out.len(), range.len());
        for (start, band) in self.starts.iter().zip(&self.guards) {
            let lo = range.start.max(*start);
            let hi = range.end.min(start + band.len());
            if lo < hi {
                out[lo - range.start..hi - range.start]
                    .copy_from_slice(&band[lo - start..hi - start]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relax_core::{partition_cells, partition_rows, relax_assignment, Window};

    #[test]
    fn band_starts_follow_assignments() {
        let parts = partition_cells(5, 5, 2).unwrap();
        assert_eq!(band_starts(&parts, 5), vec![0, 13]);
        let parts = partition_rows(6, 4, 2).unwrap();
        assert_eq!(band_starts(&parts, 4), vec![0, 3 * 4 + 1]);
    }

    #[test]
    fn view_reads_across_bands() {
        let values: Vec<f64> = (0..25).map(f64::from).collect();
        let parts = partition_cells(5, 5, 3).unwrap();
        let buf = BandedBuffer::from_slice(&values, &band_starts(&parts, 5)).unwrap();
        assert_eq!(buf.band_count(), 3);
        let view = buf.read_all(0).unwrap();
        let mut out = vec![0.0; 25];
        view.copy_range(0..25, &mut out);
        assert_eq!(out, values);
        // A window straddling the band boundary at 13.
        let mut part = vec![0.0; 8];
        view.copy_range(9..17, &mut part);
        assert_eq!(part, values[9..17]);
        drop(view);
        assert_eq!(buf.to_vec().unwrap(), values);
    }

    #[test]
    fn empty_bands_are_skipped() {
        // 3x3 has one interior cell; workers 1..4 own nothing.
        let values: Vec<f64> = (0..9).map(f64::from).collect();
        let parts = partition_cells(3, 3, 4).unwrap();
        let starts = band_starts(&parts, 3);
        let buf = BandedBuffer::from_slice(&values, &starts).unwrap();
        let view = buf.read_all(2).unwrap();
        let mut out = vec![0.0; 9];
        view.copy_range(0..9, &mut out);
        assert_eq!(out, values);
        let mut tail = vec![0.0; 3];
        view.copy_range(6..9, &mut tail);
        assert_eq!(tail, values[6..9]);
    }

    #[test]
    fn worker_writes_stay_in_own_band() {
        let values: Vec<f64> = (0..30).map(|i| (i % 7) as f64).collect();
        let parts = partition_cells(5, 6, 4).unwrap();
        let starts = band_starts(&parts, 6);
        let read = BandedBuffer::from_slice(&values, &starts).unwrap();
        let write = BandedBuffer::from_slice(&values, &starts).unwrap();
        for (w, part) in parts.iter().enumerate() {
            let range = Window::read_range(part, 6, read.len());
            let mut scratch = vec![0.0; range.len()];
            read.read_all(w).unwrap().copy_range(range.clone(), &mut scratch);
            let window = Window::new(range.start, &scratch);
            let mut band = write.write_band(w, w).unwrap();
            relax_assignment(&window, band.as_mut_slice(), write.band_start(w), 6, part, 0.0);
        }
        let mut expected = values.clone();
        relax_assignment(
            &values,
            &mut expected,
            0,
            6,
            &WorkAssignment::whole(5, 6),
            0.0,
        );
        assert_eq!(write.to_vec().unwrap(), expected);
    }
}
