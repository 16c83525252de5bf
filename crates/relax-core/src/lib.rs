//! Core types and kernels for the relax Jacobi engine.
//!
//! This is the leaf crate with zero internal dependencies. It defines the
//! double-buffered [`Grid`], the [`partition`](mod@partition) rules that split the grid
//! interior across workers, the 4-neighbour [`stencil`] kernel, the
//! [`seed`] strategies for initial values, and the error taxonomy shared by
//! every engine backend.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod grid;
pub mod partition;
pub mod seed;
pub mod stencil;

pub use error::{ConfigError, RelaxError, WorkerStage};
pub use grid::{BufferRole, Grid};
pub use partition::{
    partition, partition_cells, partition_rows, Granularity, RowSpan, RowSpans, WorkAssignment,
};
pub use seed::{parse_seed_values, Seed};
pub use stencil::{relax_assignment, relax_cell, CellSource, Relaxed, Window};
