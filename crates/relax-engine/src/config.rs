//! Engine configuration and validation.
//!
//! [`EngineConfig`] is the builder-input for an [`Engine`](crate::Engine).
//! [`validate()`](EngineConfig::validate) checks every structural invariant
//! before any worker thread is started.

use relax_core::grid::MIN_DIM;
use relax_core::{ConfigError, Granularity};

// ── Backend ────────────────────────────────────────────────────────

/// Execution strategy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Backend {
    /// A fixed pool of threads over shared double buffers, synchronized by
    /// two rendezvous points per iteration.
    #[default]
    SharedMemory,
    /// One participant per partition with private buffers, exchanging data
    /// through scatter/gather/all-reduce collectives.
    Distributed,
}

// ── EngineConfig ───────────────────────────────────────────────────

/// Complete configuration for a relaxation run.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    /// Grid rows, boundary included. Minimum: 3.
    pub rows: usize,
    /// Grid columns, boundary included. Minimum: 3.
    pub cols: usize,
    /// Convergence threshold. A cell is still changing while
    /// `|new - old| > precision`. Must be finite and `>= 0`.
    pub precision: f64,
    /// Worker threads (shared memory) or participants (distributed).
    pub workers: usize,
    /// Execution strategy.
    pub backend: Backend,
    /// Work split for the shared-memory backend. The distributed backend
    /// always splits by rows.
    pub granularity: Granularity,
    /// Stop after this many iterations even if not converged.
    pub max_iterations: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rows: 100,
            cols: 100,
            precision: 0.5,
            workers: 1,
            backend: Backend::SharedMemory,
            granularity: Granularity::Cells,
            max_iterations: None,
        }
    }
}

impl EngineConfig {
    /// Square `dimension × dimension` grid with all other settings default.
    pub fn square(dimension: usize) -> Self {
        Self {
            rows: dimension,
            cols: dimension,
            ..Self::default()
        }
    }

    /// Validate all structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // 1. Both axes need an interior.
        if self.rows < MIN_DIM {
            return Err(ConfigError::DimensionTooSmall {
                axis: "rows",
                value: self.rows,
            });
        }
        if self.cols < MIN_DIM {
            return Err(ConfigError::DimensionTooSmall {
                axis: "cols",
                value: self.cols,
            });
        }
        // 2. At least one worker.
        if self.workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        // 3. Precision finite and non-negative.
        if !self.precision.is_finite() || self.precision < 0.0 {
            return Err(ConfigError::InvalidPrecision {
                value: self.precision,
            });
        }
        // 4. A cap of zero never runs a pass.
        if self.max_iterations == Some(0) {
            return Err(ConfigError::InvalidIterationCap);
        }
        Ok(())
    }

    /// Work split actually used by the configured backend.
    pub fn effective_granularity(&self) -> Granularity {
        match self.backend {
            Backend::SharedMemory => self.granularity,
            Backend::Distributed => Granularity::Rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = EngineConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!((cfg.rows, cfg.cols, cfg.workers), (100, 100, 1));
        assert_eq!(cfg.precision, 0.5);
    }

    #[test]
    fn rejects_tiny_grid() {
        let cfg = EngineConfig::square(2);
        match cfg.validate() {
            Err(ConfigError::DimensionTooSmall { axis: "rows", value: 2 }) => {}
            other => panic!("expected DimensionTooSmall, got {other:?}"),
        }
        let cfg = EngineConfig {
            cols: 1,
            ..EngineConfig::square(5)
        };
        match cfg.validate() {
            Err(ConfigError::DimensionTooSmall { axis: "cols", value: 1 }) => {}
            other => panic!("expected DimensionTooSmall(cols), got {other:?}"),
        }
    }

    #[test]
    fn rejects_zero_workers() {
        let cfg = EngineConfig {
            workers: 0,
            ..EngineConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::NoWorkers));
    }

    #[test]
    fn rejects_bad_precision() {
        for value in [-0.1, f64::NAN, f64::INFINITY] {
            let cfg = EngineConfig {
                precision: value,
                ..EngineConfig::default()
            };
            match cfg.validate() {
                Err(ConfigError::InvalidPrecision { .. }) => {}
                other => panic!("expected InvalidPrecision for {value}, got {other:?}"),
            }
        }
        let zero = EngineConfig {
            precision: 0.0,
            ..EngineConfig::default()
        };
        assert!(zero.validate().is_ok());
    }

    #[test]
    fn rejects_zero_iteration_cap() {
        let cfg = EngineConfig {
            max_iterations: Some(0),
            ..EngineConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::InvalidIterationCap));
    }

    #[test]
    fn distributed_always_splits_rows() {
        let cfg = EngineConfig {
            backend: Backend::Distributed,
            granularity: Granularity::Cells,
            ..EngineConfig::default()
        };
        assert_eq!(cfg.effective_granularity(), Granularity::Rows);
        assert_eq!(
            EngineConfig::default().effective_granularity(),
            Granularity::Cells
        );
    }
}
