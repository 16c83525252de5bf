//! The two-rendezvous iteration protocol.
//!
//! Every iteration passes through two synchronization points:
//!
//! ```text
//!  worker:  relax ──► arrive (A) ─────────────► await decision (B) ──► relax ...
//!  driver:            collect all (A) ─► decide ─► release all (B)
//! ```
//!
//! - **A** guarantees every write of the iteration is complete before the
//!   driver reads the aggregate change count.
//! - **B** guarantees no worker starts the next pass (reading what was just
//!   written) before the decision is published.
//!
//! Each worker owns a `bounded(1)` arrival channel to the driver and a
//! `bounded(1)` decision channel from it. Aggregation is race-free: each
//! worker's count travels in its own message and only the driver sums.
//! A closed channel means the peer is gone and surfaces as
//! [`RelaxError::WorkerFailure`].

use crossbeam_channel::{bounded, Receiver, Sender};
use relax_core::{RelaxError, Relaxed, WorkerStage};

use crate::metrics::IterationState;

/// A worker's report at rendezvous A.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Arrival {
    /// Reporting worker.
    pub worker: usize,
    /// What it did this pass.
    pub relaxed: Relaxed,
}

/// The driver's verdict, published at rendezvous B.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    /// Swap buffer roles and run another pass.
    Continue,
    /// Terminate; the buffer just written is the result.
    Stop,
}

/// Protocol phase as seen by the driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PhaseState {
    /// Workers are relaxing their assignments.
    Relaxing,
    /// All workers arrived; the decision is pending.
    AwaitingDecision,
    /// Decided; workers not yet released.
    AwaitingRestart,
    /// Stop was published.
    Terminated,
}

/// Driver side of the protocol.
#[derive(Debug)]
pub struct Coordinator {
    arrivals: Vec<Receiver<Arrival>>,
    decisions: Vec<Sender<Decision>>,
    phase: PhaseState,
    state: IterationState,
    cells_relaxed: Vec<u64>,
}

/// Worker side of the protocol.
#[derive(Debug)]
pub struct WorkerSide {
    worker: usize,
    arrive: Sender<Arrival>,
    decisions: Receiver<Decision>,
}

/// Build the channels for `workers` workers.
pub fn rendezvous(workers: usize) -> (Coordinator, Vec<WorkerSide>) {
    let mut arrivals = Vec::with_capacity(workers);
    let mut decisions = Vec::with_capacity(workers);
    let mut sides = Vec::with_capacity(workers);
    for worker in 0..workers {
        let (arrive_tx, arrive_rx) = bounded(1);
        let (decide_tx, decide_rx) = bounded(1);
        arrivals.push(arrive_rx);
        decisions.push(decide_tx);
        sides.push(WorkerSide {
            worker,
            arrive: arrive_tx,
            decisions: decide_rx,
        });
    }
    let coordinator = Coordinator {
        arrivals,
        decisions,
        phase: PhaseState::Relaxing,
        state: IterationState::new(workers),
        cells_relaxed: vec![0; workers],
    };
    (coordinator, sides)
}

impl Coordinator {
    /// Current protocol phase.
    pub fn phase(&self) -> PhaseState {
        self.phase
    }

    /// State of the last collected iteration.
    pub fn state(&self) -> &IterationState {
        &self.state
    }

    /// Cells relaxed per worker so far.
    pub fn cells_relaxed(&self) -> &[u64] {
        &self.cells_relaxed
    }

    /// Rendezvous A: block until every worker has arrived.
    pub fn collect(&mut self) -> Result<&IterationState, RelaxError> {
        debug_assert_eq!(self.phase, PhaseState::Relaxing);
        self.state.reset();
        for (worker, rx) in self.arrivals.iter().enumerate() {
            let arrival = rx.recv().map_err(|_| {
                RelaxError::worker(worker, WorkerStage::Rendezvous, "left before arriving")
            })?;
            debug_assert_eq!(arrival.worker, worker);
            self.state.per_worker_changed[worker] = arrival.relaxed.changed;
            self.cells_relaxed[worker] += arrival.relaxed.cells as u64;
        }
        self.state.iteration += 1;
        self.state.converged = self.state.total_changed() == 0;
        self.phase = PhaseState::AwaitingDecision;
        Ok(&self.state)
    }

    /// Decide whether to run another pass.
    pub fn decide(&mut self, max_iterations: Option<usize>) -> Decision {
        debug_assert_eq!(self.phase, PhaseState::AwaitingDecision);
        self.phase = PhaseState::AwaitingRestart;
        let capped = max_iterations.is_some_and(|cap| self.state.iteration >= cap);
        if self.state.converged || capped {
            Decision::Stop
        } else {
            Decision::Continue
        }
    }

    /// Rendezvous B: publish `decision` to every worker.
    pub fn release(&mut self, decision: Decision) -> Result<(), RelaxError> {
        debug_assert_eq!(self.phase, PhaseState::AwaitingRestart);
        for (worker, tx) in self.decisions.iter().enumerate() {
            tx.send(decision).map_err(|_| {
                RelaxError::worker(worker, WorkerStage::Rendezvous, "left before release")
            })?;
        }
        self.phase = match decision {
            Decision::Continue => PhaseState::Relaxing,
            Decision::Stop => PhaseState::Terminated,
        };
        Ok(())
    }
}

impl WorkerSide {
    /// This worker's index.
    pub fn worker(&self) -> usize {
        self.worker
    }

    /// Rendezvous A: report this pass.
    pub fn arrive(&self, relaxed: Relaxed) -> Result<(), RelaxError> {
        self.arrive
            .send(Arrival {
                worker: self.worker,
                relaxed,
            })
            .map_err(|_| {
                RelaxError::worker(self.worker, WorkerStage::Rendezvous, "driver is gone")
            })
    }

    /// Rendezvous B: wait for the driver's decision.
    pub fn await_decision(&self) -> Result<Decision, RelaxError> {
        self.decisions.recv().map_err(|_| {
            RelaxError::worker(self.worker, WorkerStage::Rendezvous, "driver is gone")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn relaxed(changed: usize) -> Relaxed {
        Relaxed { cells: 4, changed }
    }

    #[test]
    fn full_cycle_continue_then_stop() {
        let (mut coord, sides) = rendezvous(2);
        thread::scope(|s| {
            for side in &sides {
                s.spawn(move || {
                    side.arrive(relaxed(side.worker() + 1)).unwrap();
                    assert_eq!(side.await_decision().unwrap(), Decision::Continue);
                    side.arrive(relaxed(0)).unwrap();
                    assert_eq!(side.await_decision().unwrap(), Decision::Stop);
                });
            }

            let state = coord.collect().unwrap();
            assert_eq!(state.iteration, 1);
            assert_eq!(state.total_changed(), 3);
            assert!(!state.converged);
            assert_eq!(coord.phase(), PhaseState::AwaitingDecision);
            let d = coord.decide(None);
            assert_eq!(d, Decision::Continue);
            coord.release(d).unwrap();
            assert_eq!(coord.phase(), PhaseState::Relaxing);

            let state = coord.collect().unwrap();
            assert_eq!(state.iteration, 2);
            assert!(state.converged);
            let d = coord.decide(None);
            assert_eq!(d, Decision::Stop);
            coord.release(d).unwrap();
            assert_eq!(coord.phase(), PhaseState::Terminated);
        });
        assert_eq!(coord.cells_relaxed(), &[8, 8]);
    }

    #[test]
    fn cap_stops_unconverged_run() {
        let (mut coord, sides) = rendezvous(1);
        sides[0].arrive(relaxed(5)).unwrap();
        coord.collect().unwrap();
        assert_eq!(coord.decide(Some(1)), Decision::Stop);
        assert!(!coord.state().converged);
    }

    #[test]
    fn dropped_worker_is_a_failure() {
        let (mut coord, mut sides) = rendezvous(3);
        sides[0].arrive(relaxed(1)).unwrap();
        // Worker 1 vanishes without arriving.
        let gone = sides.remove(1);
        drop(gone);
        match coord.collect() {
            Err(RelaxError::WorkerFailure {
                worker: 1,
                stage: WorkerStage::Rendezvous,
                ..
            }) => {}
            other => panic!("expected WorkerFailure for worker 1, got {other:?}"),
        }
    }

    #[test]
    fn dropped_driver_releases_workers() {
        let (coord, sides) = rendezvous(1);
        drop(coord);
        match sides[0].await_decision() {
            Err(RelaxError::WorkerFailure { worker: 0, .. }) => {}
            other => panic!("expected WorkerFailure, got {other:?}"),
        }
    }
}
