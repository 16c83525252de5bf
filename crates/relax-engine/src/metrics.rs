//! Per-iteration state and whole-run metrics.
//!
//! [`IterationState`] is the transient record the driver merges once per
//! iteration. [`RunMetrics`] summarises a finished run.

use smallvec::SmallVec;

/// Convergence bookkeeping for the iteration in progress.
///
/// Owned by the driver (or the distributed root) and reset every iteration.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IterationState {
    /// Completed iterations, including the current one once merged.
    pub iteration: usize,
    /// Whether the last merged iteration had no changing cell.
    pub converged: bool,
    /// Changed-cell count reported by each worker, indexed by worker.
    pub per_worker_changed: SmallVec<[usize; 8]>,
}

impl IterationState {
    /// Fresh state for `workers` workers.
    pub fn new(workers: usize) -> Self {
        Self {
            iteration: 0,
            converged: false,
            per_worker_changed: SmallVec::from_elem(0, workers),
        }
    }

    /// Clear per-worker counts before collecting the next iteration.
    pub fn reset(&mut self) {
        self.per_worker_changed.iter_mut().for_each(|c| *c = 0);
    }

    /// Sum of all workers' changed-cell counts.
    pub fn total_changed(&self) -> usize {
        self.per_worker_changed.iter().sum()
    }
}

/// What one worker did over a whole run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// Worker index (or participant rank).
    pub worker: usize,
    /// Cells assigned per iteration.
    pub cells: usize,
    /// Total cell relaxations performed across all iterations.
    pub cells_relaxed: u64,
}

/// Timing and work summary for a completed run.
///
/// Durations are in microseconds.
#[derive(Clone, Debug, Default)]
pub struct RunMetrics {
    /// Wall-clock time from first dispatch to termination.
    pub total_us: u64,
    /// Mean wall-clock time per iteration.
    pub mean_iteration_us: u64,
    /// Per-worker work counters, indexed by worker.
    pub workers: Vec<WorkerStats>,
}

impl RunMetrics {
    /// Total cell relaxations across all workers.
    pub fn cells_relaxed(&self) -> u64 {
        self.workers.iter().map(|w| w.cells_relaxed).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iteration_state_sums_and_resets() {
        let mut s = IterationState::new(3);
        s.per_worker_changed[0] = 2;
        s.per_worker_changed[2] = 5;
        assert_eq!(s.total_changed(), 7);
        s.reset();
        assert_eq!(s.total_changed(), 0);
        assert_eq!(s.per_worker_changed.len(), 3);
    }

    #[test]
    fn run_metrics_totals() {
        let m = RunMetrics {
            total_us: 10,
            mean_iteration_us: 5,
            workers: vec![
                WorkerStats {
                    worker: 0,
                    cells: 3,
                    cells_relaxed: 6,
                },
                WorkerStats {
                    worker: 1,
                    cells: 2,
                    cells_relaxed: 4,
                },
            ],
        };
        assert_eq!(m.cells_relaxed(), 10);
    }
}
