// Fatal startup conditions and their exit codes

use std::path::PathBuf;
use thiserror::Error;

/// Conditions the daemon cannot recover from.
///
/// Each variant maps to a stable exit code so wrapper scripts and monitoring
/// can distinguish failure modes. Everything below `main` returns one of
/// these instead of exiting; the top-level handler performs the actual exit.
#[derive(Debug, Error)]
pub enum FatalError {
    #[error("-k does not support -i")]
    ConflictingFlags,

    #[error("could not read {path}: {reason}")]
    Telemetry {
        path: PathBuf,
        reason: anyhow::Error,
    },

    #[error("could not access process table at {path}: {reason}")]
    ProcRootMissing {
        path: PathBuf,
        reason: std::io::Error,
    },

    #[error("could not enumerate process table at {path}: {reason}")]
    ProcRootUnreadable {
        path: PathBuf,
        reason: std::io::Error,
    },

    #[error("could not compile pattern `{pattern}`: {reason}")]
    BadPattern {
        pattern: String,
        reason: anyhow::Error,
    },

    #[error("startup probe found no process to evaluate")]
    EmptyProcessTable,

    #[error("could not lock memory: {0}")]
    MemoryLock(nix::errno::Errno),

    #[error("-m: percentage must be greater than 0")]
    InvalidMemPercent,

    #[error("-s: percentage must be in (0, 100]")]
    InvalidSwapPercent,

    #[error("{var}: invalid value `{value}`")]
    InvalidEnv { var: String, value: String },
}

impl FatalError {
    /// Exit code for this condition. Codes are part of the external
    /// interface and must stay stable across releases.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::ConflictingFlags => 2,
            Self::Telemetry { .. } => 3,
            Self::ProcRootMissing { .. } => 4,
            Self::ProcRootUnreadable { .. } => 5,
            Self::BadPattern { .. } => 6,
            Self::EmptyProcessTable => 9,
            Self::MemoryLock(_) => 10,
            Self::InvalidMemPercent => 15,
            Self::InvalidSwapPercent => 16,
            Self::InvalidEnv { .. } => 17,
        }
    }
}
