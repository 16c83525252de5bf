//! Benchmark profiles for the relax Jacobi engine.
//!
//! - [`reference_profile`]: 100x100 random grid at precision 0.5, the
//!   classic command-line default.
//! - [`stress_profile`]: 400x400 fixed-boundary grid at precision 0.01.

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use relax_core::{Grid, RelaxError, Seed};
use relax_engine::{Backend, EngineConfig};

/// A configuration plus the grid it runs on.
#[derive(Clone, Debug)]
pub struct Profile {
    /// Engine configuration.
    pub config: EngineConfig,
    /// Seed used to build the grid.
    pub seed: Seed,
}

impl Profile {
    /// Build a fresh grid for one run.
    pub fn grid(&self) -> Result<Grid, RelaxError> {
        self.seed.build(self.config.rows, self.config.cols)
    }

    /// The same profile on another backend and worker count.
    pub fn with(&self, backend: Backend, workers: usize) -> Self {
        Self {
            config: EngineConfig {
                backend,
                workers,
                ..self.config.clone()
            },
            seed: self.seed.clone(),
        }
    }
}

/// 100x100 random grid, precision 0.5.
pub fn reference_profile(seed: u64) -> Profile {
    Profile {
        config: EngineConfig::default(),
        seed: Seed::Random { seed },
    }
}

/// 400x400 grid with the boundary at 1 and interior at 0, precision 0.01.
///
/// Capped so one run stays bounded regardless of convergence speed.
pub fn stress_profile() -> Profile {
    Profile {
        config: EngineConfig {
            precision: 0.01,
            max_iterations: Some(200),
            ..EngineConfig::square(400)
        },
        seed: Seed::FixedBoundary {
            boundary: 1.0,
            interior: 0.0,
        },
    }
}
