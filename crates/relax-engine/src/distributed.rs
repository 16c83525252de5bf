//! Distributed backend: participants with private buffers and collectives.
//!
//! Participant 0 is the root and holds the full grid. Every iteration:
//!
//! 1. the root scatters each participant its owned rows plus one halo row
//!    above and below (consecutive windows overlap by two rows),
//! 2. each participant relaxes its owned rows into a private next slab,
//! 3. the owned rows (halo excluded) are gathered into the root's next
//!    buffer and the root swaps buffer roles,
//! 4. changed-cell counts are summed with an all-reduce,
//! 5. the root decides and broadcasts whether to stop.
//!
//! Participants execute identical arithmetic to the shared-memory backend,
//! so both produce the same iteration count and values.

use std::thread;
use std::time::Instant;

use relax_core::{
    partition_rows, relax_assignment, ConfigError, Granularity, Grid, RelaxError,
    WorkAssignment, WorkerStage,
};
use tracing::{debug, trace};

use crate::comm::{ChannelUniverse, Communicator};
use crate::config::EngineConfig;
use crate::engine::{IterationView, Observer, RelaxReport};
use crate::metrics::{RunMetrics, WorkerStats};

/// Rank that owns the full grid and makes decisions.
pub const ROOT: usize = 0;

// ── Topology ───────────────────────────────────────────────────────

/// Per-participant counts and displacements, in cells, computed once.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Topology {
    /// Grid rows.
    pub rows: usize,
    /// Grid columns.
    pub cols: usize,
    /// Row assignment of each participant.
    pub assignments: Vec<WorkAssignment>,
    /// Scatter window sizes: owned rows plus two halo rows.
    pub scatter_counts: Vec<usize>,
    /// Scatter window offsets: one row above the first owned row.
    pub scatter_displs: Vec<usize>,
    /// Gather sizes: owned rows only.
    pub gather_counts: Vec<usize>,
    /// Gather offsets: the first owned row.
    pub gather_displs: Vec<usize>,
}

impl Topology {
    /// Lay out `participants` over a `rows × cols` grid.
    pub fn new(rows: usize, cols: usize, participants: usize) -> Result<Self, ConfigError> {
        let assignments = partition_rows(rows, cols, participants)?;
        let mut topo = Self {
            rows,
            cols,
            scatter_counts: Vec::with_capacity(participants),
            scatter_displs: Vec::with_capacity(participants),
            gather_counts: Vec::with_capacity(participants),
            gather_displs: Vec::with_capacity(participants),
            assignments: Vec::new(),
        };
        for a in &assignments {
            let first_row = 1 + a.start;
            topo.scatter_counts.push((a.count + 2) * cols);
            topo.scatter_displs.push((first_row - 1) * cols);
            topo.gather_counts.push(a.count * cols);
            topo.gather_displs.push(first_row * cols);
        }
        topo.assignments = assignments;
        Ok(topo)
    }

    /// Number of participants.
    pub fn participants(&self) -> usize {
        self.assignments.len()
    }

    /// Rows owned by `rank`.
    pub fn owned_rows(&self, rank: usize) -> usize {
        self.assignments[rank].count
    }
}

// ── Participant ────────────────────────────────────────────────────

/// How a participant's run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParticipantOutcome {
    /// Iterations executed.
    pub iterations: usize,
    /// Whether the last iteration had no changing cell.
    pub converged: bool,
}

/// Run one participant to termination.
///
/// The root passes `Some(grid)` and optionally an observer; every other
/// participant passes `None` for both. On return the root's grid holds the
/// result in its current buffer.
pub fn run_participant<C: Communicator + ?Sized>(
    comm: &C,
    topology: &Topology,
    mut grid: Option<&mut Grid>,
    precision: f64,
    max_iterations: Option<usize>,
    mut observer: Option<&mut Observer<'_>>,
) -> Result<ParticipantOutcome, RelaxError> {
    let rank = comm.rank();
    let cols = topology.cols;
    if rank == ROOT && grid.is_none() {
        return Err(RelaxError::worker(
            rank,
            WorkerStage::Collective,
            "root participant has no grid",
        ));
    }

    let owned = topology.owned_rows(rank);
    let local = WorkAssignment {
        worker: rank,
        granularity: Granularity::Rows,
        start: 0,
        count: owned,
        interior_cols: cols - 2,
    };
    let slab_len = topology.scatter_counts[rank];
    let mut slab = relax_core::grid::alloc_filled(slab_len, 0.0)?;
    let mut next = relax_core::grid::alloc_filled(slab_len, 0.0)?;
    let owned_cells = cols..cols + owned * cols;

    let mut iteration = 0;
    loop {
        comm.scatterv(
            ROOT,
            grid.as_deref().map(Grid::current),
            &topology.scatter_counts,
            &topology.scatter_displs,
            &mut slab,
        )?;
        // Edge columns pass through untouched.
        next.copy_from_slice(&slab);
        let relaxed = relax_assignment(&slab, &mut next, 0, cols, &local, precision);

        let target = grid.as_deref_mut().map(|g| g.split_mut().1);
        comm.gatherv(
            ROOT,
            &next[owned_cells.clone()],
            target,
            &topology.gather_counts,
            &topology.gather_displs,
        )?;
        if let Some(g) = grid.as_deref_mut() {
            g.swap();
        }

        let changed = comm.all_reduce_sum(relaxed.changed as u64)?;
        iteration += 1;
        let converged = changed == 0;
        let capped = max_iterations.is_some_and(|cap| iteration >= cap);

        let mut stop = false;
        if rank == ROOT {
            trace!(iteration, changed, "iteration complete");
            stop = converged || capped;
            if let (Some(obs), Some(g)) = (observer.as_deref_mut(), grid.as_deref()) {
                obs(IterationView {
                    iteration,
                    rows: g.rows(),
                    cols,
                    values: g.current(),
                    changed: changed as usize,
                    converged,
                    last: stop,
                });
            }
        }
        if comm.broadcast_flag(ROOT, stop)? {
            return Ok(ParticipantOutcome {
                iterations: iteration,
                converged,
            });
        }
    }
}

// ── DistributedEngine ──────────────────────────────────────────────

/// Runs the distributed protocol over in-process participants.
#[derive(Clone, Debug)]
pub struct DistributedEngine {
    config: EngineConfig,
}

impl DistributedEngine {
    /// Engine for an already-validated configuration.
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Relax `grid` with one participant per row partition.
    ///
    /// The root runs on the calling thread; the rest run as scoped threads.
    pub fn run(
        &self,
        mut grid: Grid,
        observer: Option<&mut Observer<'_>>,
    ) -> Result<RelaxReport, RelaxError> {
        let cfg = &self.config;
        let (rows, cols) = (grid.rows(), grid.cols());
        let topology = Topology::new(rows, cols, cfg.workers)?;
        for (p, a) in topology.assignments.iter().enumerate() {
            debug!(
                participant = p,
                row = a.start_row(),
                rows = a.count,
                scatter = topology.scatter_counts[p],
                "participant layout"
            );
        }

        let mut endpoints = ChannelUniverse::new(topology.participants())
            .into_endpoints()
            .into_iter();
        let root = endpoints
            .next()
            .ok_or(RelaxError::Config(ConfigError::NoWorkers))?;

        let started = Instant::now();
        let outcome = thread::scope(|s| {
            let mut handles = Vec::with_capacity(topology.participants() - 1);
            for comm in endpoints {
                let rank = comm.rank();
                let topology = &topology;
                let spawned = thread::Builder::new()
                    .name(format!("relax-rank-{rank}"))
                    .spawn_scoped(s, move || {
                        run_participant(
                            &comm,
                            topology,
                            None,
                            cfg.precision,
                            cfg.max_iterations,
                            None,
                        )
                    });
                match spawned {
                    Ok(h) => handles.push((rank, h)),
                    Err(e) => {
                        drop(root);
                        join_ranks(handles);
                        return Err(RelaxError::worker(rank, WorkerStage::Spawn, e.to_string()));
                    }
                }
            }

            let driven = run_participant(
                &root,
                &topology,
                Some(&mut grid),
                cfg.precision,
                cfg.max_iterations,
                observer,
            );
            drop(root);
            match (driven, join_ranks(handles)) {
                (_, Some(e)) | (Err(e), None) => Err(e),
                (Ok(outcome), None) => Ok(outcome),
            }
        })?;
        let total_us = started.elapsed().as_micros() as u64;

        let iterations = outcome.iterations;
        let metrics = RunMetrics {
            total_us,
            mean_iteration_us: total_us / iterations.max(1) as u64,
            workers: topology
                .assignments
                .iter()
                .map(|a| WorkerStats {
                    worker: a.worker,
                    cells: a.cell_count(),
                    cells_relaxed: (a.cell_count() * iterations) as u64,
                })
                .collect(),
        };
        Ok(RelaxReport {
            iterations,
            converged: outcome.converged,
            grid,
            metrics,
        })
    }
}

fn join_ranks(
    handles: Vec<(usize, thread::ScopedJoinHandle<'_, Result<ParticipantOutcome, RelaxError>>)>,
) -> Option<RelaxError> {
    let mut first = None;
    for (rank, h) in handles {
        let err = match h.join() {
            Ok(Ok(_)) => continue,
            Ok(Err(e)) => e,
            Err(_) => RelaxError::worker(rank, WorkerStage::Join, "participant panicked"),
        };
        first.get_or_insert(err);
    }
    first
}
