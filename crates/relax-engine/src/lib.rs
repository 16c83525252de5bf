//! Parallel drivers for the relax Jacobi engine.
//!
//! Provides the top-level [`Engine`] that validates an [`EngineConfig`] and
//! runs a relaxation to convergence on one of two backends:
//!
//! - [`SharedMemoryEngine`]: a persistent worker pool over one shared pair
//!   of buffers, synchronized by the two-rendezvous protocol in
//!   [`rendezvous`].
//! - [`DistributedEngine`]: participants with private buffers that exchange
//!   data only through the collectives of a [`Communicator`].
//!
//! Both backends produce the same values and iteration count for the same
//! input, independent of worker count.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod band;
pub mod comm;
pub mod config;
pub mod distributed;
pub mod engine;
pub mod metrics;
pub mod rendezvous;
pub mod shared;

pub use comm::{ChannelComm, ChannelUniverse, Communicator, Message};
pub use config::{Backend, EngineConfig};
pub use distributed::{run_participant, DistributedEngine, ParticipantOutcome, Topology};
pub use engine::{Engine, IterationView, Observer, RelaxReport, Relaxer};
pub use metrics::{IterationState, RunMetrics, WorkerStats};
pub use rendezvous::{Decision, PhaseState};
pub use shared::SharedMemoryEngine;
