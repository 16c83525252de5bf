//! Double-buffered 2D grid.
//!
//! A [`Grid`] owns two same-shape row-major buffers of `f64` cells. One is
//! the *current* buffer (read during a relaxation pass) and the other the
//! *next* buffer (written during the pass). The roles are tracked by an
//! `active` index that [`Grid::swap`] toggles; the buffers themselves never
//! move.
//!
//! ```text
//! buffers[active]      ←── current (read)
//! buffers[1 - active]  ←── next (write)
//! ```
//!
//! Boundary cells (first/last row, first/last column) are seeded once in
//! both buffers and never relaxed.

use crate::error::{ConfigError, RelaxError};
use crate::partition::WorkAssignment;
use crate::stencil::relax_assignment;

/// Minimum length of either axis: a 3×3 grid has exactly one interior cell.
pub const MIN_DIM: usize = 3;

/// Which of the two buffers to address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferRole {
    /// The buffer read during the next pass (holds the latest values).
    Current,
    /// The buffer written during the next pass.
    Next,
}

/// Two same-shape buffers of `rows × cols` cells.
#[derive(Clone, Debug, PartialEq)]
pub struct Grid {
    rows: usize,
    cols: usize,
    buffers: [Vec<f64>; 2],
    active: usize,
}

impl Grid {
    /// Allocate a zero-filled grid.
    ///
    /// Returns `Err(ConfigError::DimensionTooSmall)` if either axis is below
    /// 3, or `Err(RelaxError::Allocation)` if the buffers cannot be reserved.
    pub fn new(rows: usize, cols: usize) -> Result<Self, RelaxError> {
        check_dims(rows, cols)?;
        let len = cell_count(rows, cols)?;
        let a = alloc_filled(len, 0.0)?;
        let b = alloc_filled(len, 0.0)?;
        Ok(Self {
            rows,
            cols,
            buffers: [a, b],
            active: 0,
        })
    }

    /// Build a grid whose two buffers both hold `values` (row-major).
    ///
    /// Returns `Err(RelaxError::SeedMismatch)` if `values.len()` is not
    /// `rows * cols`.
    pub fn from_values(rows: usize, cols: usize, values: Vec<f64>) -> Result<Self, RelaxError> {
        check_dims(rows, cols)?;
        let len = cell_count(rows, cols)?;
        if values.len() != len {
            return Err(RelaxError::SeedMismatch {
                expected: len,
                found: values.len(),
            });
        }
        let mut copy = Vec::new();
        copy.try_reserve_exact(len)
            .map_err(|_| RelaxError::Allocation {
                what: "grid buffer",
                cells: len,
            })?;
        copy.extend_from_slice(&values);
        Ok(Self {
            rows,
            cols,
            buffers: [values, copy],
            active: 0,
        })
    }

    /// Number of rows, boundary included.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns, boundary included.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Cells per buffer.
    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    /// Always false: a grid has at least 9 cells.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Rows eligible for relaxation.
    pub fn interior_rows(&self) -> usize {
        self.rows - 2
    }

    /// Columns eligible for relaxation.
    pub fn interior_cols(&self) -> usize {
        self.cols - 2
    }

    /// Index of the current buffer (0 or 1).
    pub fn active(&self) -> usize {
        self.active
    }

    /// Flat row-major index of `(row, col)`. Not bounds-checked.
    #[inline]
    pub fn index(&self, row: usize, col: usize) -> usize {
        row * self.cols + col
    }

    /// Whether `(row, col)` lies on the outer boundary.
    pub fn is_boundary(&self, row: usize, col: usize) -> bool {
        row == 0 || col == 0 || row + 1 == self.rows || col + 1 == self.cols
    }

    /// Bounds-checked read.
    pub fn get(&self, role: BufferRole, row: usize, col: usize) -> Option<f64> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        Some(self.buffer(role)[self.index(row, col)])
    }

    /// Write `value` into both buffers at `(row, col)`.
    ///
    /// Used for seeding. Returns `false` if the coordinate is out of bounds.
    pub fn seed_cell(&mut self, row: usize, col: usize, value: f64) -> bool {
        if row >= self.rows || col >= self.cols {
            return false;
        }
        let i = self.index(row, col);
        self.buffers[0][i] = value;
        self.buffers[1][i] = value;
        true
    }

    /// The whole buffer in the given role.
    pub fn buffer(&self, role: BufferRole) -> &[f64] {
        match role {
            BufferRole::Current => &self.buffers[self.active],
            BufferRole::Next => &self.buffers[1 - self.active],
        }
    }

    /// The latest values (the current buffer).
    pub fn current(&self) -> &[f64] {
        self.buffer(BufferRole::Current)
    }

    /// One row of the current buffer.
    pub fn row(&self, row: usize) -> Option<&[f64]> {
        if row >= self.rows {
            return None;
        }
        let start = row * self.cols;
        Some(&self.current()[start..start + self.cols])
    }

    /// Split into `(current, next)` for one relaxation pass.
    pub fn split_mut(&mut self) -> (&[f64], &mut [f64]) {
        let (a, b) = self.buffers.split_at_mut(1);
        if self.active == 0 {
            (&a[0], &mut b[0])
        } else {
            (&b[0], &mut a[0])
        }
    }

    /// Toggle buffer roles: next becomes current.
    pub fn swap(&mut self) {
        self.active = 1 - self.active;
    }

    /// Relax every interior cell from current into next, then swap.
    ///
    /// Single-threaded reference pass. Returns the number of cells whose
    /// value changed by more than `precision`.
    pub fn step(&mut self, precision: f64) -> usize {
        let whole = WorkAssignment::whole(self.rows, self.cols);
        let cols = self.cols;
        let (read, write) = self.split_mut();
        let relaxed = relax_assignment(read, write, 0, cols, &whole, precision);
        self.swap();
        relaxed.changed
    }

    /// Consume the grid, returning `(rows, cols, current buffer)`.
    pub fn into_current(self) -> (usize, usize, Vec<f64>) {
        let [a, b] = self.buffers;
        let current = if self.active == 0 { a } else { b };
        (self.rows, self.cols, current)
    }
}

fn check_dims(rows: usize, cols: usize) -> Result<(), ConfigError> {
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
    Ok(())
}

fn cell_count(rows: usize, cols: usize) -> Result<usize, RelaxError> {
    rows.checked_mul(cols).ok_or(RelaxError::Allocation {
        what: "grid buffer",
        cells: usize::MAX,
    })
}

/// Allocate `len` copies of `value`, reporting failure instead of aborting.
pub fn alloc_filled(len: usize, value: f64) -> Result<Vec<f64>, RelaxError> {
    let mut v = Vec::new();
    v.try_reserve_exact(len).map_err(|_| RelaxError::Allocation {
        what: "grid buffer",
        cells: len,
    })?;
    v.resize(len, value);
    Ok(v)
}
