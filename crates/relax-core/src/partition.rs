//! Work partitioning of the grid interior.
//!
//! The interior of a `rows × cols` grid is the `(rows-2) × (cols-2)` block
//! of cells that get relaxed. It is split across `W` workers into
//! contiguous, non-overlapping [`WorkAssignment`]s. With `N` interior units,
//! every worker receives `⌊N/W⌋` units and the first `N mod W` workers
//! receive one extra.
//!
//! Two granularities are supported:
//! - [`Granularity::Cells`] flattens the interior row-major and splits by
//!   cell count. A worker may start and end mid-row.
//! - [`Granularity::Rows`] splits whole interior rows.

use std::ops::Range;

use crate::error::ConfigError;
use crate::grid::MIN_DIM;

/// Unit of work distribution.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Granularity {
    /// Split the flattened interior by cell count.
    #[default]
    Cells,
    /// Split whole interior rows.
    Rows,
}

/// A contiguous slice of the interior index space owned by one worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkAssignment {
    /// Worker (or participant rank) that owns this slice.
    pub worker: usize,
    /// Unit of `start` and `count`.
    pub granularity: Granularity,
    /// First unit, zero-based within the interior.
    pub start: usize,
    /// Number of units.
    pub count: usize,
    /// Interior column count of the grid this was computed for.
    pub interior_cols: usize,
}

impl WorkAssignment {
    /// A single assignment covering the whole interior of a grid.
    pub fn whole(rows: usize, cols: usize) -> Self {
        Self {
            worker: 0,
            granularity: Granularity::Cells,
            start: 0,
            count: (rows - 2) * (cols - 2),
            interior_cols: cols - 2,
        }
    }

    /// Offset of the first assigned cell in the flattened interior.
    pub fn cell_offset(&self) -> usize {
        match self.granularity {
            Granularity::Cells => self.start,
            Granularity::Rows => self.start * self.interior_cols,
        }
    }

    /// Number of assigned cells.
    pub fn cell_count(&self) -> usize {
        match self.granularity {
            Granularity::Cells => self.count,
            Granularity::Rows => self.count * self.interior_cols,
        }
    }

    /// Grid row of the first assigned cell.
    pub fn start_row(&self) -> usize {
        1 + self.cell_offset() / self.interior_cols
    }

    /// Grid column of the first assigned cell.
    pub fn start_col(&self) -> usize {
        1 + self.cell_offset() % self.interior_cols
    }

    /// Whether no cells are assigned.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Flat grid indices spanned by the assignment, from its first cell to
    /// one past its last. Boundary cells between rows fall inside the range.
    pub fn grid_range(&self, cols: usize) -> Range<usize> {
        let start = interior_to_grid(self.cell_offset(), self.interior_cols, cols);
        if self.is_empty() {
            return start..start;
        }
        let last = interior_to_grid(
            self.cell_offset() + self.cell_count() - 1,
            self.interior_cols,
            cols,
        );
        start..last + 1
    }

    /// The assigned cells as per-row spans in grid coordinates.
    pub fn spans(&self) -> RowSpans {
        RowSpans {
            row: self.start_row(),
            col: self.start_col(),
            remaining: self.cell_count(),
            last_col: self.interior_cols + 1,
        }
    }
}

/// A run of assigned cells within one grid row: columns `cols`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RowSpan {
    /// Grid row.
    pub row: usize,
    /// Grid columns, end exclusive.
    pub cols: Range<usize>,
}

/// Iterator over the [`RowSpan`]s of an assignment.
///
/// The first span starts at the assignment's start column (possibly
/// mid-row); every later span starts at column 1.
#[derive(Clone, Debug)]
pub struct RowSpans {
    row: usize,
    col: usize,
    remaining: usize,
    last_col: usize,
}

impl Iterator for RowSpans {
    type Item = RowSpan;

    fn next(&mut self) -> Option<RowSpan> {
        if self.remaining == 0 {
            return None;
        }
        let width = (self.last_col - self.col).min(self.remaining);
        let span = RowSpan {
            row: self.row,
            cols: self.col..self.col + width,
        };
        self.remaining -= width;
        self.row += 1;
        self.col = 1;
        Some(span)
    }
}

/// Map a flattened-interior offset to a flat grid index.
///
/// `offset == interior_len` maps to the cell just past the last interior
/// row's start, which keeps band boundaries monotonic.
pub fn interior_to_grid(offset: usize, interior_cols: usize, cols: usize) -> usize {
    let row = 1 + offset / interior_cols;
    let col = 1 + offset % interior_cols;
    row * cols + col
}

fn check(rows: usize, cols: usize, workers: usize) -> Result<(), ConfigError> {
    if rows < MIN_DIM {
        return Err(ConfigError::DimensionTooSmall {
            axis: "rows",
            value: rows,
        });
    }
    if cols < MIN_DIM {
        return Err(ConfigError::DimensionTooSmall {
            axis: "cols",
            value: cols,
        });
    }
    if workers == 0 {
        return Err(ConfigError::NoWorkers);
    }
    Ok(())
}

fn split(
    units: usize,
    workers: usize,
    granularity: Granularity,
    interior_cols: usize,
) -> Vec<WorkAssignment> {
    let base = units / workers;
    let extra = units % workers;
    let mut out = Vec::with_capacity(workers);
    let mut next = 0usize;
    for worker in 0..workers {
        let count = base + usize::from(worker < extra);
        out.push(WorkAssignment {
            worker,
            granularity,
            start: next,
            count,
            interior_cols,
        });
        next += count;
    }
    out
}

/// Split the flattened interior across `workers` by cell count.
pub fn partition_cells(
    rows: usize,
    cols: usize,
    workers: usize,
) -> Result<Vec<WorkAssignment>, ConfigError> {
    check(rows, cols, workers)?;
    Ok(split(
        (rows - 2) * (cols - 2),
        workers,
        Granularity::Cells,
        cols - 2,
    ))
}

/// Split the interior rows across `workers`.
pub fn partition_rows(
    rows: usize,
    cols: usize,
    workers: usize,
) -> Result<Vec<WorkAssignment>, ConfigError> {
    check(rows, cols, workers)?;
    Ok(split(rows - 2, workers, Granularity::Rows, cols - 2))
}

/// Partition with the given granularity.
///
/// Fails with [`ConfigError`] if `workers == 0` or either dimension is
/// below 3.
pub fn partition(
    rows: usize,
    cols: usize,
    workers: usize,
    granularity: Granularity,
) -> Result<Vec<WorkAssignment>, ConfigError> {
    match granularity {
        Granularity::Cells => partition_cells(rows, cols, workers),
        Granularity::Rows => partition_rows(rows, cols, workers),
    }
}
