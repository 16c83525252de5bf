//! Shared-memory backend: a persistent worker pool over banded buffers.
//!
//! The pool is created once per run. Each worker owns one
//! [`WorkAssignment`] for the whole run and loops:
//!
//! 1. relax its assignment from the current buffer into the next,
//! 2. arrive at rendezvous A with its change count,
//! 3. wait at rendezvous B for the driver's decision,
//! 4. on `Continue`, swap its notion of current/next and repeat.
//!
//! The driver thread performs no relaxation. It collects, decides, runs the
//! observer, and releases. Every worker holds the same parity, so all of
//! them agree on which buffer is current without shared state.

use std::thread;
use std::time::Instant;

use relax_core::grid::alloc_filled;
use relax_core::{
    partition, relax_assignment, BufferRole, Grid, RelaxError, Window, WorkAssignment,
    WorkerStage,
};
use tracing::{debug, trace};

use crate::band::{band_starts, BandedBuffer};
use crate::config::EngineConfig;
use crate::engine::{IterationView, Observer, RelaxReport};
use crate::metrics::{RunMetrics, WorkerStats};
use crate::rendezvous::{rendezvous, Coordinator, Decision, WorkerSide};

/// Runs the shared-memory protocol.
#[derive(Clone, Debug)]
pub struct SharedMemoryEngine {
    config: EngineConfig,
}

/// What one worker thread borrows for the run.
struct WorkerContext<'a> {
    buffers: &'a [BandedBuffer; 2],
    assignment: WorkAssignment,
    cols: usize,
    precision: f64,
    active: usize,
}

type WorkerBody = fn(WorkerContext<'_>, WorkerSide) -> Result<(), RelaxError>;

impl SharedMemoryEngine {
    /// Engine for an already-validated configuration.
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Relax `grid` to convergence (or the iteration cap).
    pub fn run(
        &self,
        grid: Grid,
        observer: Option<&mut Observer<'_>>,
    ) -> Result<RelaxReport, RelaxError> {
        self.run_with(grid, observer, worker_loop)
    }

    fn run_with(
        &self,
        grid: Grid,
        observer: Option<&mut Observer<'_>>,
        body: WorkerBody,
    ) -> Result<RelaxReport, RelaxError> {
        let cfg = &self.config;
        let (rows, cols) = (grid.rows(), grid.cols());
        let assignments = partition(rows, cols, cfg.workers, cfg.granularity)?;
        for a in &assignments {
            debug!(
                worker = a.worker,
                row = a.start_row(),
                col = a.start_col(),
                cells = a.cell_count(),
                "worker assignment"
            );
        }

        let starts = band_starts(&assignments, cols);
        // Index 0 holds the current values, so every worker starts at parity 0.
        let buffers = [
            BandedBuffer::from_slice(grid.buffer(BufferRole::Current), &starts)?,
            BandedBuffer::from_slice(grid.buffer(BufferRole::Next), &starts)?,
        ];
        let active = 0;
        drop(grid);

        let started = Instant::now();
        let (iterations, converged, written, cells_relaxed) = thread::scope(|s| {
            let (mut coord, sides) = rendezvous(cfg.workers);
            let mut handles = Vec::with_capacity(cfg.workers);
            for (side, assignment) in sides.into_iter().zip(assignments.iter().copied()) {
                let worker = side.worker();
                let ctx = WorkerContext {
                    buffers: &buffers,
                    assignment,
                    cols,
                    precision: cfg.precision,
                    active,
                };
                let spawned = thread::Builder::new()
                    .name(format!("relax-worker-{worker}"))
                    .spawn_scoped(s, move || body(ctx, side));
                match spawned {
                    Ok(h) => handles.push(h),
                    Err(e) => {
                        // Closing the decision channels lets running workers exit.
                        drop(coord);
                        join_all(handles);
                        return Err(RelaxError::worker(worker, WorkerStage::Spawn, e.to_string()));
                    }
                }
            }

            let driven = drive(
                &mut coord,
                &buffers,
                active,
                rows,
                cols,
                cfg.max_iterations,
                observer,
            );
            let cells_relaxed = coord.cells_relaxed().to_vec();
            drop(coord);
            let failed = join_all(handles);
            match (driven, failed) {
                (_, Some(e)) | (Err(e), None) => Err(e),
                (Ok((iterations, converged, written)), None) => {
                    Ok((iterations, converged, written, cells_relaxed))
                }
            }
        })?;
        let elapsed = started.elapsed();

        let values = buffers[written].to_vec()?;
        let grid = Grid::from_values(rows, cols, values)?;
        let total_us = elapsed.as_micros() as u64;
        let metrics = RunMetrics {
            total_us,
            mean_iteration_us: total_us / iterations.max(1) as u64,
            workers: assignments
                .iter()
                .zip(cells_relaxed)
                .map(|(a, relaxed)| WorkerStats {
                    worker: a.worker,
                    cells: a.cell_count(),
                    cells_relaxed: relaxed,
                })
                .collect(),
        };
        Ok(RelaxReport {
            iterations,
            converged,
            grid,
            metrics,
        })
    }
}

/// Driver loop. Returns `(iterations, converged, index of final buffer)`.
fn drive(
    coord: &mut Coordinator,
    buffers: &[BandedBuffer; 2],
    active: usize,
    rows: usize,
    cols: usize,
    max_iterations: Option<usize>,
    mut observer: Option<&mut Observer<'_>>,
) -> Result<(usize, bool, usize), RelaxError> {
    let mut written = 1 - active;
    loop {
        let state = coord.collect()?;
        let (iteration, changed, converged) =
            (state.iteration, state.total_changed(), state.converged);
        trace!(iteration, changed, "iteration complete");
        let decision = coord.decide(max_iterations);

        if let Some(obs) = observer.as_deref_mut() {
            let values = buffers[written].to_vec()?;
            obs(IterationView {
                iteration,
                rows,
                cols,
                values: &values,
                changed,
                converged,
                last: decision == Decision::Stop,
            });
        }

        coord.release(decision)?;
        if decision == Decision::Stop {
            return Ok((iteration, converged, written));
        }
        written = 1 - written;
    }
}

fn worker_loop(ctx: WorkerContext<'_>, side: WorkerSide) -> Result<(), RelaxError> {
    let worker = side.worker();
    let mut active = ctx.active;
    // Own rows plus one halo row each side, copied out once per pass.
    let range = Window::read_range(&ctx.assignment, ctx.cols, ctx.buffers[active].len());
    let mut scratch = alloc_filled(range.len(), 0.0)?;
    loop {
        ctx.buffers[active]
            .read_all(worker)?
            .copy_range(range.clone(), &mut scratch);
        let relaxed = {
            let next = &ctx.buffers[1 - active];
            let mut band = next.write_band(worker, worker)?;
            relax_assignment(
                &Window::new(range.start, &scratch),
                band.as_mut_slice(),
                next.band_start(worker),
                ctx.cols,
                &ctx.assignment,
                ctx.precision,
            )
        };
        side.arrive(relaxed)?;
        match side.await_decision()? {
            Decision::Continue => active = 1 - active,
            Decision::Stop => return Ok(()),
        }
    }
}

/// Join every handle, returning the most telling failure: a worker's own
/// error outranks the rendezvous errors its exit causes in the others.
fn join_all(
    handles: Vec<thread::ScopedJoinHandle<'_, Result<(), RelaxError>>>,
) -> Option<RelaxError> {
    let mut first: Option<RelaxError> = None;
    for (worker, h) in handles.into_iter().enumerate() {
        let err = match h.join() {
            Ok(Ok(())) => continue,
            Ok(Err(e)) => e,
            Err(_) => RelaxError::worker(worker, WorkerStage::Join, "worker panicked"),
        };
        let replace = match &first {
            None => true,
            Some(prev) => is_rendezvous(prev) && !is_rendezvous(&err),
        };
        if replace {
            first = Some(err);
        }
    }
    first
}

fn is_rendezvous(err: &RelaxError) -> bool {
    matches!(
        err,
        RelaxError::WorkerFailure {
            stage: WorkerStage::Rendezvous,
            ..
        }
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use relax_core::Granularity;

    fn config(rows: usize, cols: usize, workers: usize) -> EngineConfig {
        EngineConfig {
            rows,
            cols,
            workers,
            precision: 0.01,
            ..EngineConfig::default()
        }
    }

    fn ramp(rows: usize, cols: usize) -> Grid {
        let values = (0..rows * cols).map(|i| ((i * 13) % 17) as f64).collect();
        Grid::from_values(rows, cols, values).unwrap()
    }

    fn serial(mut grid: Grid, precision: f64) -> (usize, Vec<f64>) {
        let mut iterations = 0;
        loop {
            iterations += 1;
            if grid.step(precision) == 0 {
                return (iterations, grid.current().to_vec());
            }
        }
    }

    #[test]
    fn matches_serial_reference() {
        let (expected_iters, expected) = serial(ramp(7, 9), 0.01);
        for workers in [1, 2, 3, 8] {
            for granularity in [Granularity::Cells, Granularity::Rows] {
                let cfg = EngineConfig {
                    granularity,
                    ..config(7, 9, workers)
                };
                let out = SharedMemoryEngine::new(cfg)
                    .run(ramp(7, 9), None)
                    .unwrap();
                assert!(out.converged);
                assert_eq!(out.iterations, expected_iters, "workers={workers}");
                assert_eq!(out.grid.current(), expected.as_slice(), "workers={workers}");
            }
        }
    }

    #[test]
    fn observer_sees_every_iteration() {
        let mut seen = Vec::new();
        let mut obs = |view: IterationView<'_>| {
            seen.push((view.iteration, view.last, view.values.len()));
        };
        let out = SharedMemoryEngine::new(config(5, 5, 2))
            .run(ramp(5, 5), Some(&mut obs))
            .unwrap();
        assert_eq!(seen.len(), out.iterations);
        assert!(seen.iter().enumerate().all(|(i, s)| s.0 == i + 1 && s.2 == 25));
        assert!(seen.last().is_some_and(|s| s.1));
        assert_eq!(seen.iter().filter(|s| s.1).count(), 1);
    }

    #[test]
    fn metrics_count_every_relaxation() {
        let out = SharedMemoryEngine::new(config(6, 6, 3))
            .run(ramp(6, 6), None)
            .unwrap();
        assert_eq!(out.metrics.workers.len(), 3);
        assert_eq!(out.metrics.cells_relaxed(), 16 * out.iterations as u64);
    }

    fn panics_as_worker_one(ctx: WorkerContext<'_>, side: WorkerSide) -> Result<(), RelaxError> {
        if side.worker() == 1 {
            panic!("worker 1 gave up");
        }
        worker_loop(ctx, side)
    }

    #[test]
    fn panicking_worker_fails_the_run() {
        let engine = SharedMemoryEngine::new(config(7, 7, 3));
        match engine.run_with(ramp(7, 7), None, panics_as_worker_one) {
            Err(RelaxError::WorkerFailure {
                worker: 1,
                stage: WorkerStage::Join,
                ..
            }) => {}
            other => panic!("expected Join failure for worker 1, got {other:?}"),
        }
    }

    #[test]
    fn panicking_worker_never_reaches_the_observer() {
        let mut calls = 0;
        let mut obs = |_: IterationView<'_>| calls += 1;
        let result = SharedMemoryEngine::new(config(5, 5, 2)).run_with(
            ramp(5, 5),
            Some(&mut obs),
            panics_as_worker_one,
        );
        assert!(result.is_err());
        assert_eq!(calls, 0);
    }
}
