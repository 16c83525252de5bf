//! Initial-value strategies.
//!
//! A [`Seed`] produces a [`Grid`] whose two buffers hold identical values,
//! so the first convergence check compares like with like. Random fills use
//! a seeded ChaCha8 RNG and are reproducible for a given seed.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::error::{ConfigError, RelaxError};
use crate::grid::{alloc_filled, Grid};

/// Upper bound (exclusive) of random fill values.
pub const RANDOM_FILL_MAX: f64 = 10.0;

/// How to fill a grid before the first iteration.
#[derive(Clone, Debug, PartialEq)]
pub enum Seed {
    /// Every cell, boundary included, uniform in `[0, 10)`.
    Random {
        /// RNG seed.
        seed: u64,
    },
    /// Boundary cells at one value, interior cells at another.
    FixedBoundary {
        /// Value held by every boundary cell.
        boundary: f64,
        /// Initial value of every interior cell.
        interior: f64,
    },
    /// Explicit row-major values; count must be `rows * cols`.
    Values(Vec<f64>),
}

impl Seed {
    /// Build a `rows × cols` grid from this seed.
    pub fn build(&self, rows: usize, cols: usize) -> Result<Grid, RelaxError> {
        match self {
            Self::Random { seed } => {
                let mut grid = Grid::new(rows, cols)?;
                let mut rng = ChaCha8Rng::seed_from_u64(*seed);
                for r in 0..rows {
                    for c in 0..cols {
                        let v = rng.random::<f64>() * RANDOM_FILL_MAX;
                        grid.seed_cell(r, c, v);
                    }
                }
                Ok(grid)
            }
            Self::FixedBoundary { boundary, interior } => {
                let len = rows.saturating_mul(cols);
                let mut values = alloc_filled(len, *interior)?;
                for r in 0..rows {
                    for c in 0..cols {
                        if r == 0 || c == 0 || r + 1 == rows || c + 1 == cols {
                            values[r * cols + c] = *boundary;
                        }
                    }
                }
                Grid::from_values(rows, cols, values)
            }
            Self::Values(values) => Grid::from_values(rows, cols, values.clone()),
        }
    }
}

/// Parse a flat listing of floating-point values.
///
/// Tokens are separated by whitespace and/or commas. Every token must parse
/// as a finite `f64`.
pub fn parse_seed_values(text: &str) -> Result<Vec<f64>, ConfigError> {
    text.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .enumerate()
        .map(|(index, token)| match token.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(v),
            _ => Err(ConfigError::InvalidSeedValue {
                index,
                token: token.to_string(),
            }),
        })
        .collect()
}
