//! Error types for the stub runner.

use crate::runner::RunnerState;

/// Errors raised while configuring, starting, querying or stopping stubs
#[derive(Debug, thiserror::Error)]
pub enum StubRunnerError {
    #[error("Malformed stub identifier '{0}': expected [group:]artifact[:classifier]")]
    MalformedIdentifier(String),
    #[error("Stub repository unavailable for '{coordinates}': {reason}")]
    RepositoryUnavailable { coordinates: String, reason: String },
    #[error("No stub artifact found for '{0}'")]
    StubNotFound(String),
    #[error("Failed to start stub server for '{coordinates}': {reason}")]
    StubServerStartFailure { coordinates: String, reason: String },
    #[error("No running stub matches '{0}'")]
    StubNotRunning(String),
    #[error("Stub runner is not running (state: {0})")]
    RunnerNotStarted(RunnerState),
    #[error("Stub runner cannot start from state {0}")]
    InvalidState(RunnerState),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = StubRunnerError> = std::result::Result<T, E>;
