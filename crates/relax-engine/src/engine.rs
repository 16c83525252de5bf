//! The engine driver: validation, backend dispatch, reporting.
//!
//! [`Engine`] owns a validated [`EngineConfig`] and runs one relaxation per
//! call to [`run`](Engine::run) or [`run_observed`](Engine::run_observed).
//! Every run either returns a complete [`RelaxReport`] or a [`RelaxError`];
//! there are no partial results.

use relax_core::{Grid, RelaxError};
use tracing::{error, info, warn};

use crate::config::{Backend, EngineConfig};
use crate::distributed::DistributedEngine;
use crate::metrics::RunMetrics;
use crate::shared::SharedMemoryEngine;

// ── Reporting ──────────────────────────────────────────────────────

/// Read-only view of the buffer written by one iteration.
#[derive(Clone, Copy, Debug)]
pub struct IterationView<'a> {
    /// 1-based iteration number.
    pub iteration: usize,
    /// Grid rows.
    pub rows: usize,
    /// Grid columns.
    pub cols: usize,
    /// Row-major cell values after this iteration.
    pub values: &'a [f64],
    /// Cells that moved by more than the precision.
    pub changed: usize,
    /// Whether this iteration converged.
    pub converged: bool,
    /// Whether this is the final iteration of the run.
    pub last: bool,
}

impl IterationView<'_> {
    /// One row of the view.
    pub fn row(&self, row: usize) -> &[f64] {
        &self.values[row * self.cols..(row + 1) * self.cols]
    }
}

/// Callback invoked on the driver thread after each iteration's decision.
pub type Observer<'a> = dyn FnMut(IterationView<'_>) + 'a;

/// Result of a completed run.
#[derive(Clone, Debug)]
pub struct RelaxReport {
    /// Iterations executed, counting the final converged pass.
    pub iterations: usize,
    /// `false` only when the iteration cap stopped the run.
    pub converged: bool,
    /// The final grid; its current buffer holds the result.
    pub grid: Grid,
    /// Timing and work counters.
    pub metrics: RunMetrics,
}

// ── Relaxer ────────────────────────────────────────────────────────

/// A backend able to relax a grid.
pub trait Relaxer {
    /// Relax `grid` until convergence or the configured cap.
    fn relax(
        &self,
        grid: Grid,
        observer: Option<&mut Observer<'_>>,
    ) -> Result<RelaxReport, RelaxError>;
}

impl Relaxer for SharedMemoryEngine {
    fn relax(
        &self,
        grid: Grid,
        observer: Option<&mut Observer<'_>>,
    ) -> Result<RelaxReport, RelaxError> {
        self.run(grid, observer)
    }
}

impl Relaxer for DistributedEngine {
    fn relax(
        &self,
        grid: Grid,
        observer: Option<&mut Observer<'_>>,
    ) -> Result<RelaxReport, RelaxError> {
        self.run(grid, observer)
    }
}

// ── Engine ─────────────────────────────────────────────────────────

/// Validated entry point for relaxation runs.
#[derive(Clone, Debug)]
pub struct Engine {
    config: EngineConfig,
}

impl Engine {
    /// Validate `config` and build an engine.
    pub fn new(config: EngineConfig) -> Result<Self, RelaxError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The validated configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Relax `grid` without observation.
    pub fn run(&self, grid: Grid) -> Result<RelaxReport, RelaxError> {
        self.dispatch(grid, None)
    }

    /// Relax `grid`, calling `observer` after every iteration.
    pub fn run_observed<F>(&self, grid: Grid, mut observer: F) -> Result<RelaxReport, RelaxError>
    where
        F: FnMut(IterationView<'_>),
    {
        self.dispatch(grid, Some(&mut observer))
    }

    fn dispatch(
        &self,
        grid: Grid,
        observer: Option<&mut Observer<'_>>,
    ) -> Result<RelaxReport, RelaxError> {
        let expected = self.config.rows * self.config.cols;
        if grid.rows() != self.config.rows || grid.cols() != self.config.cols {
            return Err(RelaxError::SeedMismatch {
                expected,
                found: grid.len(),
            });
        }

        let result = match self.config.backend {
            Backend::SharedMemory => {
                SharedMemoryEngine::new(self.config.clone()).relax(grid, observer)
            }
            Backend::Distributed => {
                DistributedEngine::new(self.config.clone()).relax(grid, observer)
            }
        };

        match &result {
            Ok(report) if report.converged => {
                info!(iterations = report.iterations, "converged");
            }
            Ok(report) => {
                warn!(
                    iterations = report.iterations,
                    "iteration cap reached before convergence"
                );
            }
            Err(e) => error!(error = %e, "relaxation failed"),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relax_core::{ConfigError, Seed};

    #[test]
    fn new_validates_config() {
        let cfg = EngineConfig {
            workers: 0,
            ..EngineConfig::default()
        };
        match Engine::new(cfg) {
            Err(RelaxError::Config(ConfigError::NoWorkers)) => {}
            other => panic!("expected NoWorkers, got {other:?}"),
        }
    }

    #[test]
    fn grid_shape_must_match_config() {
        let engine = Engine::new(EngineConfig::square(5)).unwrap();
        let grid = Grid::new(4, 5).unwrap();
        match engine.run(grid) {
            Err(RelaxError::SeedMismatch {
                expected: 25,
                found: 20,
            }) => {}
            other => panic!("expected SeedMismatch, got {other:?}"),
        }
    }

    #[test]
    fn cap_reports_unconverged() {
        let cfg = EngineConfig {
            precision: 0.0,
            max_iterations: Some(3),
            ..EngineConfig::square(8)
        };
        let grid = Seed::Random { seed: 1 }.build(8, 8).unwrap();
        let report = Engine::new(cfg).unwrap().run(grid).unwrap();
        assert_eq!(report.iterations, 3);
        assert!(!report.converged);
    }

    #[test]
    fn both_backends_dispatch() {
        for backend in [Backend::SharedMemory, Backend::Distributed] {
            let cfg = EngineConfig {
                backend,
                workers: 2,
                ..EngineConfig::square(6)
            };
            let grid = Seed::FixedBoundary {
                boundary: 1.0,
                interior: 0.0,
            }
            .build(6, 6)
            .unwrap();
            let mut calls = 0;
            let report = Engine::new(cfg)
                .unwrap()
                .run_observed(grid, |view| {
                    calls += 1;
                    assert_eq!(view.row(0), &[1.0; 6]);
                })
                .unwrap();
            assert!(report.converged, "{backend:?}");
            assert_eq!(calls, report.iterations, "{backend:?}");
        }
    }
}
