//! Collective communication between distributed participants.
//!
//! [`Communicator`] is the small set of blocking collectives the
//! distributed backend needs. Every participant calls the same collectives
//! in the same order; a collective completes on a participant once its own
//! part of the exchange is done.
//!
//! [`ChannelComm`] implements it in-process: a [`ChannelUniverse`] of `n`
//! participants is a full mesh of point-to-point `crossbeam-channel` links.
//! Messages between one pair of participants arrive in send order, so
//! matching collectives pair up without tags. A peer whose endpoint has
//! been dropped surfaces as [`RelaxError::WorkerFailure`].

use crossbeam_channel::{unbounded, Receiver, Sender};
use relax_core::{RelaxError, WorkerStage};

/// Blocking collective operations over a fixed set of participants.
pub trait Communicator: Send {
    /// This participant's rank, `0..size()`.
    fn rank(&self) -> usize;

    /// Number of participants.
    fn size(&self) -> usize;

    /// Distribute `counts[p]` values starting at `displs[p]` of the root's
    /// `send` buffer to each participant `p`'s `recv`.
    ///
    /// Only the root passes `Some(send)`. `recv.len()` must equal
    /// `counts[rank]`.
    fn scatterv(
        &self,
        root: usize,
        send: Option<&[f64]>,
        counts: &[usize],
        displs: &[usize],
        recv: &mut [f64],
    ) -> Result<(), RelaxError>;

    /// Collect each participant's `send` into the root's `recv` at
    /// `displs[p]`. Only the root passes `Some(recv)`.
    fn gatherv(
        &self,
        root: usize,
        send: &[f64],
        recv: Option<&mut [f64]>,
        counts: &[usize],
        displs: &[usize],
    ) -> Result<(), RelaxError>;

    /// Sum `value` across all participants; every participant gets the total.
    fn all_reduce_sum(&self, value: u64) -> Result<u64, RelaxError>;

    /// Return the root's `flag` on every participant.
    fn broadcast_flag(&self, root: usize, flag: bool) -> Result<bool, RelaxError>;
}

/// Payload on a point-to-point link.
#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    /// A run of cell values.
    Data(Vec<f64>),
    /// A partial or total count.
    Count(u64),
    /// A control flag.
    Flag(bool),
}

/// In-process participant endpoint.
#[derive(Debug)]
pub struct ChannelComm {
    rank: usize,
    to: Vec<Sender<Message>>,
    from: Vec<Receiver<Message>>,
}

/// Factory for a fully connected set of [`ChannelComm`] endpoints.
#[derive(Debug)]
pub struct ChannelUniverse {
    endpoints: Vec<ChannelComm>,
}

impl ChannelUniverse {
    /// Connect `size` participants pairwise.
    pub fn new(size: usize) -> Self {
        let mut to: Vec<Vec<Sender<Message>>> =
            (0..size).map(|_| Vec::with_capacity(size)).collect();
        let mut from: Vec<Vec<Receiver<Message>>> =
            (0..size).map(|_| Vec::with_capacity(size)).collect();
        for src in 0..size {
            for dst in 0..size {
                let (tx, rx) = unbounded();
                to[src].push(tx);
                from[dst].push(rx);
            }
        }
        let endpoints = to
            .into_iter()
            .zip(from)
            .enumerate()
            .map(|(rank, (to, from))| ChannelComm { rank, to, from })
            .collect();
        Self { endpoints }
    }

    /// Hand out the endpoints, indexed by rank.
    pub fn into_endpoints(self) -> Vec<ChannelComm> {
        self.endpoints
    }
}

impl ChannelComm {
    fn send(&self, dst: usize, msg: Message) -> Result<(), RelaxError> {
        self.to[dst]
            .send(msg)
            .map_err(|_| RelaxError::worker(dst, WorkerStage::Collective, "peer disconnected"))
    }

    fn recv(&self, src: usize) -> Result<Message, RelaxError> {
        self.from[src]
            .recv()
            .map_err(|_| RelaxError::worker(src, WorkerStage::Collective, "peer disconnected"))
    }

    fn recv_data(&self, src: usize, into: &mut [f64]) -> Result<(), RelaxError> {
        match self.recv(src)? {
            Message::Data(values) if values.len() == into.len() => {
                into.copy_from_slice(&values);
                Ok(())
            }
            Message::Data(values) => Err(RelaxError::worker(
                src,
                WorkerStage::Collective,
                format!("expected {} values, received {}", into.len(), values.len()),
            )),
            other => Err(unexpected(src, "data", &other)),
        }
    }

    fn recv_count(&self, src: usize) -> Result<u64, RelaxError> {
        match self.recv(src)? {
            Message::Count(n) => Ok(n),
            other => Err(unexpected(src, "count", &other)),
        }
    }

    fn root_buffer_missing(&self) -> RelaxError {
        RelaxError::worker(self.rank, WorkerStage::Collective, "root called without a buffer")
    }
}

fn unexpected(src: usize, wanted: &str, got: &Message) -> RelaxError {
    RelaxError::worker(
        src,
        WorkerStage::Collective,
        format!("expected {wanted} message, received {got:?}"),
    )
}

impl Communicator for ChannelComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.to.len()
    }

    fn scatterv(
        &self,
        root: usize,
        send: Option<&[f64]>,
        counts: &[usize],
        displs: &[usize],
        recv: &mut [f64],
    ) -> Result<(), RelaxError> {
        if self.rank != root {
            return self.recv_data(root, recv);
        }
        let send = send.ok_or_else(|| self.root_buffer_missing())?;
        for dst in 0..self.size() {
            let part = &send[displs[dst]..displs[dst] + counts[dst]];
            if dst == root {
                recv.copy_from_slice(part);
            } else {
                self.send(dst, Message::Data(part.to_vec()))?;
            }
        }
        Ok(())
    }

    fn gatherv(
        &self,
        root: usize,
        send: &[f64],
        recv: Option<&mut [f64]>,
        counts: &[usize],
        displs: &[usize],
    ) -> Result<(), RelaxError> {
        if self.rank != root {
            return self.send(root, Message::Data(send.to_vec()));
        }
        let recv = recv.ok_or_else(|| self.root_buffer_missing())?;
        for src in 0..self.size() {
            let part = &mut recv[displs[src]..displs[src] + counts[src]];
            if src == root {
                part.copy_from_slice(send);
            } else {
                self.recv_data(src, part)?;
            }
        }
        Ok(())
    }

    fn all_reduce_sum(&self, value: u64) -> Result<u64, RelaxError> {
        // Reduce to rank 0, then broadcast the total.
        if self.rank != 0 {
            self.send(0, Message::Count(value))?;
            return self.recv_count(0);
        }
        let mut total = value;
        for src in 1..self.size() {
            total += self.recv_count(src)?;
        }
        for dst in 1..self.size() {
            self.send(dst, Message::Count(total))?;
        }
        Ok(total)
    }

    fn broadcast_flag(&self, root: usize, flag: bool) -> Result<bool, RelaxError> {
        if self.rank != root {
            return match self.recv(root)? {
                Message::Flag(f) => Ok(f),
                other => Err(unexpected(root, "flag", &other)),
            };
        }
        for dst in (0..self.size()).filter(|&d| d != root) {
            self.send(dst, Message::Flag(flag))?;
        }
        Ok(flag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    /// Run `f` on every endpoint of a fresh universe, returning per-rank results.
    fn on_all<T, F>(size: usize, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(ChannelComm) -> T + Sync,
    {
        let endpoints = ChannelUniverse::new(size).into_endpoints();
        let f = &f;
        thread::scope(|s| {
            let handles: Vec<_> = endpoints
                .into_iter()
                .map(|comm| s.spawn(move || f(comm)))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        })
    }

    #[test]
    fn scatter_then_gather_with_overlap() {
        // Overlapping scatter windows, disjoint gather windows.
        let results = on_all(3, |comm| {
            let source: Vec<f64> = (0..10).map(f64::from).collect();
            let scatter_counts = [4, 4, 4];
            let scatter_displs = [0, 3, 6];
            let mut local = vec![0.0; 4];
            let send = (comm.rank() == 0).then_some(source.as_slice());
            comm.scatterv(0, send, &scatter_counts, &scatter_displs, &mut local)
                .unwrap();

            let middle = &local[1..3];
            let mut out = vec![-1.0; 10];
            let recv = (comm.rank() == 0).then_some(out.as_mut_slice());
            comm.gatherv(0, middle, recv, &[2, 2, 2], &[1, 4, 7]).unwrap();
            (local, out)
        });
        assert_eq!(results[1].0, vec![3.0, 4.0, 5.0, 6.0]);
        assert_eq!(results[2].0, vec![6.0, 7.0, 8.0, 9.0]);
        assert_eq!(
            results[0].1,
            vec![-1.0, 1.0, 2.0, -1.0, 4.0, 5.0, -1.0, 7.0, 8.0, -1.0]
        );
    }

    #[test]
    fn all_reduce_and_broadcast_agree() {
        let results = on_all(4, |comm| {
            let total = comm.all_reduce_sum(comm.rank() as u64 + 1).unwrap();
            let flag = comm.broadcast_flag(2, comm.rank() == 2).unwrap();
            (total, flag)
        });
        assert!(results.iter().all(|&r| r == (10, true)));
    }

    #[test]
    fn single_participant_is_identity() {
        let comm = ChannelUniverse::new(1).into_endpoints().remove(0);
        assert_eq!(comm.size(), 1);
        assert_eq!(comm.all_reduce_sum(7).unwrap(), 7);
        let mut recv = [0.0; 2];
        let send = [1.0, 2.0, 3.0];
        comm.scatterv(0, Some(&send[..]), &[2], &[1], &mut recv)
            .unwrap();
        assert_eq!(recv, [2.0, 3.0]);
    }

    #[test]
    fn dropped_peer_fails_collective() {
        let mut endpoints = ChannelUniverse::new(2).into_endpoints();
        let peer = endpoints.pop().unwrap();
        drop(peer);
        match endpoints[0].all_reduce_sum(1) {
            Err(RelaxError::WorkerFailure {
                worker: 1,
                stage: WorkerStage::Collective,
                ..
            }) => {}
            other => panic!("expected Collective failure from rank 1, got {other:?}"),
        }
    }

    #[test]
    fn mismatched_message_is_rejected() {
        let endpoints = ChannelUniverse::new(2).into_endpoints();
        endpoints[1].send(0, Message::Flag(true)).unwrap();
        let mut out = [0.0; 2];
        match endpoints[0].gatherv(0, &[1.0], Some(&mut out[..]), &[1, 1], &[0, 1]) {
            Err(RelaxError::WorkerFailure { worker: 1, .. }) => {}
            other => panic!("expected WorkerFailure, got {other:?}"),
        }
    }
}
