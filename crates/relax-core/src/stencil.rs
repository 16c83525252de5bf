//! The 4-neighbour relaxation kernel.
//!
//! Each interior cell is replaced by the mean of its north, south, west and
//! east neighbours, read from the *current* buffer and written to the
//! *next* buffer:
//!
//! ```text
//! next[r][c] = (cur[r-1][c] + cur[r+1][c] + cur[r][c-1] + cur[r][c+1]) / 4
//! ```
//!
//! A cell counts as *changed* when `|old - new| > precision`; equality
//! counts as converged.

use std::ops::Range;

use crate::partition::WorkAssignment;

/// Read access to a flat row-major buffer.
///
/// Implemented for whole buffers and for [`Window`]s copied out of one.
pub trait CellSource {
    /// Value at flat index `index`.
    fn cell(&self, index: usize) -> f64;
}

impl CellSource for [f64] {
    #[inline]
    fn cell(&self, index: usize) -> f64 {
        self[index]
    }
}

impl CellSource for Vec<f64> {
    #[inline]
    fn cell(&self, index: usize) -> f64 {
        self[index]
    }
}

/// A contiguous run of a buffer, addressed by flat grid index.
#[derive(Clone, Copy, Debug)]
pub struct Window<'a> {
    base: usize,
    values: &'a [f64],
}

impl<'a> Window<'a> {
    /// `values` holds the cells starting at flat index `base`.
    pub fn new(base: usize, values: &'a [f64]) -> Self {
        Self { base, values }
    }

    /// Cells a pass over `assignment` reads in a buffer of `len` cells: its
    /// grid range widened by one row on each side.
    pub fn read_range(assignment: &WorkAssignment, cols: usize, len: usize) -> Range<usize> {
        let range = assignment.grid_range(cols);
        range.start.saturating_sub(cols)..(range.end + cols).min(len)
    }
}

impl CellSource for Window<'_> {
    #[inline]
    fn cell(&self, index: usize) -> f64 {
        self.values[index - self.base]
    }
}

/// Outcome of relaxing one assignment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Relaxed {
    /// Cells relaxed.
    pub cells: usize,
    /// Cells whose value moved by more than the precision.
    pub changed: usize,
}

/// Stencil value for the cell at flat `index` in a grid `cols` wide.
#[inline]
pub fn relax_cell<S: CellSource + ?Sized>(read: &S, cols: usize, index: usize) -> f64 {
    let adjacent = read.cell(index - cols) // N
        + read.cell(index + cols) // S
        + read.cell(index - 1) // W
        + read.cell(index + 1); // E
    adjacent / 4.0
}

/// Relax every cell of `assignment`.
///
/// `write` holds the writable slice of the next buffer, starting at flat
/// grid index `write_base`; it must cover `assignment.grid_range(cols)`.
/// Only cells inside the assignment are written.
pub fn relax_assignment<S: CellSource + ?Sized>(
    read: &S,
    write: &mut [f64],
    write_base: usize,
    cols: usize,
    assignment: &WorkAssignment,
    precision: f64,
) -> Relaxed {
    let mut out = Relaxed::default();
    for span in assignment.spans() {
        let row_base = span.row * cols;
        for col in span.cols {
            let index = row_base + col;
            let old = read.cell(index);
            let new = relax_cell(read, cols, index);
            write[index - write_base] = new;
            out.cells += 1;
            if (old - new).abs() > precision {
                out.changed += 1;
            }
        }
    }
    out
}
