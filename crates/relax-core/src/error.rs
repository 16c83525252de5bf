//! Error types for the relax engine.
//!
//! [`ConfigError`] covers everything detected before a worker starts.
//! [`RelaxError`] is the top-level taxonomy returned by every engine
//! backend: configuration, allocation, worker failure and seed mismatch.

use std::error::Error;
use std::fmt;

// ── ConfigError ────────────────────────────────────────────────────

/// Invalid run configuration, detected before any worker starts.
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigError {
    /// A grid axis is too short to have an interior.
    DimensionTooSmall {
        /// Which axis (`"rows"` or `"cols"`).
        axis: &'static str,
        /// The configured length.
        value: usize,
    },
    /// Worker count is zero.
    NoWorkers,
    /// Precision is negative, NaN, or infinite.
    InvalidPrecision {
        /// The rejected value.
        value: f64,
    },
    /// An iteration cap of zero would stop before the first pass.
    InvalidIterationCap,
    /// A token in a seed-value listing is not a finite number.
    InvalidSeedValue {
        /// Zero-based position of the token.
        index: usize,
        /// The offending token.
        token: String,
    },
    /// The seed file could not be read.
    Io {
        /// Path that was being read.
        path: String,
        /// The underlying I/O failure.
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DimensionTooSmall { axis, value } => {
                write!(f, "{axis} must be at least 3, got {value}")
            }
            Self::NoWorkers => write!(f, "worker count must be at least 1"),
            Self::InvalidPrecision { value } => {
                write!(f, "precision must be finite and non-negative, got {value}")
            }
            Self::InvalidIterationCap => write!(f, "max_iterations must be at least 1"),
            Self::InvalidSeedValue { index, token } => {
                write!(f, "seed value {index} is not a finite number: '{token}'")
            }
            Self::Io { path, reason } => write!(f, "cannot read '{path}': {reason}"),
        }
    }
}

impl Error for ConfigError {}

// ── WorkerStage ────────────────────────────────────────────────────

/// The point in a worker's lifecycle at which it failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerStage {
    /// The worker thread could not be created.
    Spawn,
    /// The worker did not arrive at, or leave, a rendezvous point.
    Rendezvous,
    /// A distributed participant dropped out of a collective operation.
    Collective,
    /// A grid band lock was poisoned by a panicking worker.
    Lock,
    /// The worker thread could not be joined.
    Join,
}

impl fmt::Display for WorkerStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spawn => write!(f, "spawn"),
            Self::Rendezvous => write!(f, "rendezvous"),
            Self::Collective => write!(f, "collective"),
            Self::Lock => write!(f, "lock"),
            Self::Join => write!(f, "join"),
        }
    }
}

// ── RelaxError ─────────────────────────────────────────────────────

/// Errors that abort a relaxation run. There are no partial results.
#[derive(Clone, Debug, PartialEq)]
pub enum RelaxError {
    /// The configuration is invalid.
    Config(ConfigError),
    /// A buffer or partition table could not be allocated.
    Allocation {
        /// What was being allocated.
        what: &'static str,
        /// Number of elements requested.
        cells: usize,
    },
    /// A worker or participant could not be started, or failed to reach a
    /// rendezvous point or collective.
    WorkerFailure {
        /// Worker (or participant rank) that failed.
        worker: usize,
        /// Where in its lifecycle it failed.
        stage: WorkerStage,
        /// Human-readable detail.
        reason: String,
    },
    /// The seed-value count does not match the grid size.
    SeedMismatch {
        /// `rows * cols`.
        expected: usize,
        /// Number of values supplied.
        found: usize,
    },
}

impl RelaxError {
    /// Shorthand for a [`RelaxError::WorkerFailure`].
    pub fn worker(worker: usize, stage: WorkerStage, reason: impl Into<String>) -> Self {
        Self::WorkerFailure {
            worker,
            stage,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for RelaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "invalid configuration: {e}"),
            Self::Allocation { what, cells } => {
                write!(f, "failed to allocate {what} ({cells} elements)")
            }
            Self::WorkerFailure {
                worker,
                stage,
                reason,
            } => write!(f, "worker {worker} failed at {stage}: {reason}"),
            Self::SeedMismatch { expected, found } => {
                write!(f, "seed has {found} values, grid needs {expected}")
            }
        }
    }
}

impl Error for RelaxError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for RelaxError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}
