//! Test utilities for relax development.
//!
//! Provides the reference grids used across the test suites, a serial
//! reference solver built on [`Grid::step`], tolerant grid comparison, and
//! a [`FailingComm`] that drops out of a collective on demand.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

pub use fixtures::{FailAt, FailingComm};

use relax_core::Grid;

/// Result of the serial reference solver.
#[derive(Clone, Debug, PartialEq)]
pub struct Reference {
    pub iterations: usize,
    pub converged: bool,
    pub values: Vec<f64>,
}

/// Relax `grid` single-threaded until no cell moves by more than
/// `precision`, or until `cap` iterations.
pub fn serial_reference(mut grid: Grid, precision: f64, cap: Option<usize>) -> Reference {
    let mut iterations = 0;
    loop {
        iterations += 1;
        let changed = grid.step(precision);
        let capped = cap.is_some_and(|c| iterations >= c);
        if changed == 0 || capped {
            return Reference {
                iterations,
                converged: changed == 0,
                values: grid.current().to_vec(),
            };
        }
    }
}

/// Largest movement of any interior cell under one more relaxation pass.
pub fn max_residual(values: &[f64], rows: usize, cols: usize) -> f64 {
    let mut worst: f64 = 0.0;
    for r in 1..rows - 1 {
        for c in 1..cols - 1 {
            let i = r * cols + c;
            let mean = (values[i - cols] + values[i + cols] + values[i - 1] + values[i + 1]) / 4.0;
            worst = worst.max((mean - values[i]).abs());
        }
    }
    worst
}

/// Panic unless `a` and `b` agree cell-by-cell within `tol`.
pub fn assert_grids_close(a: &[f64], b: &[f64], tol: f64) {
    assert_eq!(a.len(), b.len(), "grid sizes differ");
    for (i, (x, y)) in a.iter().zip(b).enumerate() {
        assert!(
            (x - y).abs() <= tol,
            "cell {i}: {x} vs {y} differs by more than {tol}"
        );
    }
}

/// Row-major values of the boundary ring of a `rows × cols` buffer.
pub fn boundary_values(values: &[f64], rows: usize, cols: usize) -> Vec<f64> {
    (0..rows * cols)
        .filter(|&i| {
            let (r, c) = (i / cols, i % cols);
            r == 0 || c == 0 || r + 1 == rows || c + 1 == cols
        })
        .map(|i| values[i])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::example_grid;

    #[test]
    fn serial_reference_respects_cap() {
        let r = serial_reference(example_grid(), 0.0, Some(2));
        assert_eq!(r.iterations, 2);
        assert!(!r.converged);
    }

    #[test]
    fn boundary_ring_of_example() {
        let g = example_grid();
        let ring = boundary_values(g.current(), 5, 5);
        assert_eq!(ring.len(), 16);
        assert!(ring.iter().all(|&v| v == 1.0));
    }
}
