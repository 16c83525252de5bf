//! Reusable grids and communicators.
//!
//! - [`example_grid`]: the 5×5 worked example (boundary 1, mixed interior).
//! - [`ramp_grid`]: a deterministic non-uniform grid of any shape.
//! - [`FailingComm`]: a [`Communicator`] that fails deterministically.

use std::sync::atomic::{AtomicUsize, Ordering};

use relax_core::{Grid, RelaxError, WorkerStage};
use relax_engine::{ChannelComm, Communicator};

/// Precision used with [`example_grid`].
pub const EXAMPLE_PRECISION: f64 = 0.75;

/// The 5×5 worked example: boundary 1, interior
///
/// ```text
/// 3 7 2
/// 8 6 5
/// 9 0 4
/// ```
pub fn example_grid() -> Grid {
    let values = vec![
        1.0, 1.0, 1.0, 1.0, 1.0, //
        1.0, 3.0, 7.0, 2.0, 1.0, //
        1.0, 8.0, 6.0, 5.0, 1.0, //
        1.0, 9.0, 0.0, 4.0, 1.0, //
        1.0, 1.0, 1.0, 1.0, 1.0,
    ];
    Grid::from_values(5, 5, values).expect("5x5 example grid")
}

/// A `rows × cols` grid with a deterministic, non-uniform fill.
pub fn ramp_grid(rows: usize, cols: usize) -> Grid {
    let values = (0..rows * cols).map(|i| ((i * 37) % 23) as f64 / 2.0).collect();
    Grid::from_values(rows, cols, values).expect("ramp grid")
}

/// A grid whose every cell holds `value`.
pub fn constant_grid(rows: usize, cols: usize, value: f64) -> Grid {
    Grid::from_values(rows, cols, vec![value; rows * cols]).expect("constant grid")
}

/// Which collective a [`FailingComm`] drops out of.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailAt {
    Scatter,
    Gather,
    AllReduce,
}

/// Forwards to a real endpoint, then fails on the `after`-th call (0-based)
/// of the chosen collective.
pub struct FailingComm {
    inner: ChannelComm,
    at: FailAt,
    after: usize,
    calls: AtomicUsize,
}

impl FailingComm {
    pub fn new(inner: ChannelComm, at: FailAt, after: usize) -> Self {
        Self {
            inner,
            at,
            after,
            calls: AtomicUsize::new(0),
        }
    }

    fn check(&self, op: FailAt) -> Result<(), RelaxError> {
        if op != self.at {
            return Ok(());
        }
        let n = self.calls.fetch_add(1, Ordering::Relaxed);
        if n >= self.after {
            return Err(RelaxError::worker(
                self.inner.rank(),
                WorkerStage::Collective,
                format!("injected failure in {op:?} call {n}"),
            ));
        }
        Ok(())
    }
}

impl Communicator for FailingComm {
    fn rank(&self) -> usize {
        self.inner.rank()
    }

    fn size(&self) -> usize {
        self.inner.size()
    }

    fn scatterv(
        &self,
        root: usize,
        send: Option<&[f64]>,
        counts: &[usize],
        displs: &[usize],
        recv: &mut [f64],
    ) -> Result<(), RelaxError> {
        self.check(FailAt::Scatter)?;
        self.inner.scatterv(root, send, counts, displs, recv)
    }

    fn gatherv(
        &self,
        root: usize,
        send: &[f64],
        recv: Option<&mut [f64]>,
        counts: &[usize],
        displs: &[usize],
    ) -> Result<(), RelaxError> {
        self.check(FailAt::Gather)?;
        self.inner.gatherv(root, send, recv, counts, displs)
    }

    fn all_reduce_sum(&self, value: u64) -> Result<u64, RelaxError> {
        self.check(FailAt::AllReduce)?;
        self.inner.all_reduce_sum(value)
    }

    fn broadcast_flag(&self, root: usize, flag: bool) -> Result<bool, RelaxError> {
        self.inner.broadcast_flag(root, flag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relax_engine::ChannelUniverse;

    #[test]
    fn failing_comm_counts_only_its_collective() {
        let comm = ChannelUniverse::new(1).into_endpoints().remove(0);
        let comm = FailingComm::new(comm, FailAt::AllReduce, 1);
        let mut recv = [0.0; 1];
        comm.scatterv(0, Some(&[4.0][..]), &[1], &[0], &mut recv)
            .unwrap();
        assert_eq!(comm.all_reduce_sum(3).unwrap(), 3);
        match comm.all_reduce_sum(3) {
            Err(RelaxError::WorkerFailure {
                worker: 0,
                stage: WorkerStage::Collective,
                ..
            }) => {}
            other => panic!("expected injected failure, got {other:?}"),
        }
    }

    #[test]
    fn example_grid_layout() {
        let g = example_grid();
        assert_eq!(g.row(2), Some(&[1.0, 8.0, 6.0, 5.0, 1.0][..]));
    }
}
