// Stub runner library: resolve contract stubs and serve each on its own mock server.

pub mod config;
pub mod coordinates;
pub mod error;
pub mod metrics;
pub mod pool;
pub mod resolver;
pub mod runner;
pub mod server;

pub use config::StubRunnerOptions;
pub use coordinates::{StubCoordinates, StubQuery, DEFAULT_CLASSIFIER};
pub use error::{Result, StubRunnerError};
pub use pool::{RunningStubInfo, RunningStubs, StopFailure, StubServerPool};
pub use resolver::{LocalRepository, LocatedArtifact, ResolvedStub, StubRepository, StubResolver};
pub use runner::{RunnerState, StubRunner};
pub use server::{HyperEngine, MockServerEngine, ServerHandle};
