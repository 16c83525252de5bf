//! Relax: parallel Jacobi relaxation of 2D grids.
//!
//! This is the top-level facade crate that re-exports the public API of the
//! relax sub-crates. For most users, adding `relax` as a single dependency
//! is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use relax::prelude::*;
//!
//! // Boundary held at 1.0, interior starting at 0.0.
//! let grid = Seed::FixedBoundary { boundary: 1.0, interior: 0.0 }
//!     .build(16, 16)
//!     .unwrap();
//! let config = EngineConfig {
//!     precision: 1e-3,
//!     workers: 4,
//!     ..EngineConfig::square(16)
//! };
//! let report = Engine::new(config).unwrap().run(grid).unwrap();
//! assert!(report.converged);
//! assert!(report.grid.current().iter().all(|&v| v > 0.9));
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `relax-core` | Grid, partitioning, stencil kernel, seeding, errors |
//! | [`engine`] | `relax-engine` | Configuration, shared-memory and distributed engines |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Grid, partitioning, stencil and seeding (`relax-core`).
///
/// Most users only need [`types::Grid`] and [`types::Seed`], which are also
/// in the [`prelude`].
pub use relax_core as types;

/// Relaxation engines (`relax-engine`).
///
/// [`engine::Engine`] validates a configuration and dispatches to
/// [`engine::SharedMemoryEngine`] or [`engine::DistributedEngine`].
pub use relax_engine as engine;

/// Common imports for typical relax usage.
///
/// ```rust
/// use relax::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use relax_core::{Granularity, Grid, Seed};

    // Errors
    pub use relax_core::{ConfigError, RelaxError};

    // Engine
    pub use relax_engine::{
        Backend, Engine, EngineConfig, IterationView, RelaxReport, RunMetrics,
    };
}
