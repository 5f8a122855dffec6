//! StubRunner - resolves the configured stubs and keeps their servers running.
//!
//! ```text
//! Created --start()--> Starting --ok--> Running --stop()--> Stopped
//!                          \--error----------------------->/
//! ```
//!
//! Lookups are only answered while `Running`. Dropping the runner stops any servers
//! that are still up, so a runner bound to a scope is always torn down.

use crate::config::StubRunnerOptions;
use crate::coordinates::StubQuery;
use crate::error::{Result, StubRunnerError};
use crate::metrics;
use crate::pool::{RunningStubs, StopFailure, StubServerPool};
use crate::resolver::{LocalRepository, StubRepository, StubResolver};
use crate::server::{HyperEngine, MockServerEngine};
use parking_lot::RwLock;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunnerState {
    Created,
    Starting,
    Running,
    Stopped,
}

impl fmt::Display for RunnerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunnerState::Created => "CREATED",
            RunnerState::Starting => "STARTING",
            RunnerState::Running => "RUNNING",
            RunnerState::Stopped => "STOPPED",
        };
        f.write_str(name)
    }
}

pub struct StubRunner {
    options: StubRunnerOptions,
    resolver: StubResolver,
    pool: StubServerPool,
    state: RwLock<RunnerState>,
}

impl StubRunner {
    /// Create a runner with explicit collaborators.
    ///
    /// Fails with `MalformedIdentifier` if any configured stub identifier is invalid.
    pub fn new(
        options: StubRunnerOptions,
        repository: Arc<dyn StubRepository>,
        engine: Arc<dyn MockServerEngine>,
    ) -> Result<Self> {
        options.requested_coordinates()?;
        let pool = StubServerPool::new(engine, options.bind_host.clone());
        Ok(Self {
            resolver: StubResolver::new(repository),
            pool,
            options,
            state: RwLock::new(RunnerState::Created),
        })
    }

    /// Create a runner backed by the filesystem repository and the hyper engine
    pub fn with_defaults(options: StubRunnerOptions) -> Result<Self> {
        let repository = LocalRepository::with_search_paths(options.stubs_search_paths.clone());
        Self::new(options, Arc::new(repository), Arc::new(HyperEngine::new()))
    }

    pub fn options(&self) -> &StubRunnerOptions {
        &self.options
    }

    pub fn state(&self) -> RunnerState {
        *self.state.read()
    }

    /// Resolve and start every configured stub.
    ///
    /// On failure all servers are stopped, the runner ends up `Stopped`, and the
    /// error is returned. A `stop()` issued while starting is honoured: the servers
    /// are torn down once they are up and `InvalidState(Stopped)` is returned.
    pub async fn start(&self) -> Result<RunningStubs> {
        {
            let mut state = self.state.write();
            if *state != RunnerState::Created {
                return Err(StubRunnerError::InvalidState(*state));
            }
            *state = RunnerState::Starting;
        }

        match self.start_stubs().await {
            Ok(running) => {
                let mut state = self.state.write();
                if *state != RunnerState::Starting {
                    // stop() ran while servers were starting; it wins
                    let current = *state;
                    drop(state);
                    warn!(
                        "Stub runner stopped while starting, stopping {} stub(s)",
                        running.len()
                    );
                    self.pool.stop_all();
                    return Err(StubRunnerError::InvalidState(current));
                }
                *state = RunnerState::Running;
                drop(state);
                info!("Stub runner started {} stub(s)", running.len());
                Ok(running)
            }
            Err(e) => {
                error!("Stub runner failed to start: {}", e);
                self.pool.stop_all();
                *self.state.write() = RunnerState::Stopped;
                Err(e)
            }
        }
    }

    async fn start_stubs(&self) -> Result<RunningStubs> {
        let requested = self.options.requested_coordinates()?;

        let started_at = Instant::now();
        let resolved = self
            .resolver
            .resolve(&requested, self.options.repository_root());
        metrics::record_resolution(
            started_at.elapsed().as_secs_f64() * 1000.0,
            resolved.is_ok(),
        );

        let resolved = resolved?
            .into_iter()
            .map(|stub| {
                let port = self.options.port_for(&stub.coordinates);
                stub.with_port(port)
            })
            .collect();
        self.pool.start_all(resolved).await
    }

    /// Stop every stub server. Stopping a stopped runner does nothing.
    ///
    /// Servers that failed to stop are returned for inspection; stopping never fails.
    pub fn stop(&self) -> Vec<StopFailure> {
        let previous = std::mem::replace(&mut *self.state.write(), RunnerState::Stopped);
        if previous == RunnerState::Stopped {
            return Vec::new();
        }
        let failures = self.pool.stop_all();
        info!("Stub runner stopped");
        failures
    }

    /// URL of the stub matching `identifier` (`artifact`, `group:artifact`,
    /// `group/artifact` or `group:artifact:classifier`).
    ///
    /// The URL is `http://{host}:{port}` without a trailing slash, so request paths can
    /// be appended directly. See [`crate::pool::RunningStubInfo::base_url`].
    pub fn find_stub_url(&self, identifier: &str) -> Result<String> {
        self.ensure_running()?;
        self.pool.find_url(&StubQuery::parse(identifier)?)
    }

    /// URL of the stub with the given group and artifact
    pub fn find_stub_url_in(&self, group: &str, artifact: &str) -> Result<String> {
        self.ensure_running()?;
        self.pool.find_url(&StubQuery::in_group(group, artifact)?)
    }

    pub fn find_all_running_stubs(&self) -> Result<RunningStubs> {
        self.ensure_running()?;
        Ok(self.pool.running_stubs())
    }

    fn ensure_running(&self) -> Result<()> {
        match self.state() {
            RunnerState::Running => Ok(()),
            state => Err(StubRunnerError::RunnerNotStarted(state)),
        }
    }
}

impl Drop for StubRunner {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinates::StubCoordinates;
    use crate::resolver::{ArtifactLocation, LocatedArtifact, RepositoryError};
    use crate::server::{EngineError, ServerHandle, StubServerSpec};
    use async_trait::async_trait;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;
    use tracing_test::traced_test;

    /// Repository mapping artifacts to directories created by the test
    struct DirRepository {
        root: TempDir,
    }

    impl DirRepository {
        fn with_stubs(artifacts: &[&str]) -> Self {
            let root = TempDir::new().unwrap();
            for artifact in artifacts {
                let mappings = root.path().join(artifact).join("mappings");
                fs::create_dir_all(&mappings).unwrap();
                fs::write(
                    mappings.join("name.json"),
                    format!(
                        r#"{{"request":{{"method":"GET","url":"/name"}},"response":{{"body":"{artifact}"}}}}"#
                    ),
                )
                .unwrap();
            }
            Self { root }
        }
    }

    impl StubRepository for DirRepository {
        fn locate(
            &self,
            coordinates: &StubCoordinates,
            _root: Option<&str>,
        ) -> std::result::Result<LocatedArtifact, RepositoryError> {
            let dir = self.root.path().join(coordinates.artifact());
            if dir.is_dir() {
                Ok(ArtifactLocation::Directory(dir).into())
            } else {
                Err(RepositoryError::NotFound)
            }
        }
    }

    fn runner(options: StubRunnerOptions, artifacts: &[&str]) -> StubRunner {
        StubRunner::new(
            options.with_repository_root("memory"),
            Arc::new(DirRepository::with_stubs(artifacts)),
            Arc::new(HyperEngine::new()),
        )
        .unwrap()
    }

    /// Hyper engine that waits before starting each server
    struct SlowEngine {
        delay: Duration,
        inner: HyperEngine,
    }

    #[async_trait]
    impl MockServerEngine for SlowEngine {
        async fn start(
            &self,
            spec: StubServerSpec,
        ) -> std::result::Result<Box<dyn ServerHandle>, EngineError> {
            tokio::time::sleep(self.delay).await;
            self.inner.start(spec).await
        }
    }

    fn options() -> StubRunnerOptions {
        StubRunnerOptions::new()
            .download_stub_in("g", "loanIssuance")
            .download_stub("g:fraudDetectionServer")
    }

    #[test]
    fn test_malformed_identifier_rejected_at_construction() {
        let result = StubRunner::with_defaults(StubRunnerOptions::new().download_stub("a:b:c:d"));
        assert!(matches!(
            result.err(),
            Some(StubRunnerError::MalformedIdentifier(_))
        ));
    }

    #[tokio::test]
    async fn test_lookups_require_running_state() {
        let runner = runner(options(), &["loanIssuance", "fraudDetectionServer"]);
        assert_eq!(runner.state(), RunnerState::Created);
        assert!(matches!(
            runner.find_stub_url("loanIssuance"),
            Err(StubRunnerError::RunnerNotStarted(RunnerState::Created))
        ));

        runner.start().await.unwrap();
        assert_eq!(runner.state(), RunnerState::Running);
        assert!(runner.find_stub_url("loanIssuance").is_ok());

        runner.stop();
        assert!(matches!(
            runner.find_all_running_stubs(),
            Err(StubRunnerError::RunnerNotStarted(RunnerState::Stopped))
        ));
    }

    #[tokio::test]
    async fn test_all_identifier_forms_resolve_to_same_url() {
        let runner = runner(options(), &["loanIssuance", "fraudDetectionServer"]);
        runner.start().await.unwrap();

        let url = runner.find_stub_url("loanIssuance").unwrap();
        assert_eq!(runner.find_stub_url_in("g", "loanIssuance").unwrap(), url);
        assert_eq!(runner.find_stub_url("g:loanIssuance").unwrap(), url);
        assert_eq!(runner.find_stub_url("g/loanIssuance").unwrap(), url);
        assert_ne!(runner.find_stub_url("fraudDetectionServer").unwrap(), url);
        assert!(matches!(
            runner.find_stub_url("bookService"),
            Err(StubRunnerError::StubNotRunning(_))
        ));
    }

    #[tokio::test]
    async fn test_start_twice_is_invalid() {
        let runner = runner(options(), &["loanIssuance", "fraudDetectionServer"]);
        runner.start().await.unwrap();
        assert!(matches!(
            runner.start().await,
            Err(StubRunnerError::InvalidState(RunnerState::Running))
        ));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_missing_stub_leaves_runner_stopped() {
        let runner = runner(options(), &["loanIssuance"]);
        let err = runner.start().await.unwrap_err();
        assert!(matches!(err, StubRunnerError::StubNotFound(_)));
        assert_eq!(runner.state(), RunnerState::Stopped);
        assert!(runner.find_all_running_stubs().is_err());
        assert!(logs_contain("Stub runner failed to start"));
    }

    #[tokio::test]
    async fn test_stop_twice_is_noop() {
        let runner = runner(options(), &["loanIssuance", "fraudDetectionServer"]);
        let running = runner.start().await.unwrap();
        assert!(running.is_present("loanIssuance"));

        assert!(runner.stop().is_empty());
        assert!(runner.stop().is_empty());
        assert_eq!(runner.state(), RunnerState::Stopped);
        assert!(!running.is_present("loanIssuance"));
    }

    #[tokio::test]
    async fn test_stop_before_start_prevents_start() {
        let runner = runner(options(), &["loanIssuance", "fraudDetectionServer"]);
        runner.stop();
        assert_eq!(runner.state(), RunnerState::Stopped);
        assert!(matches!(
            runner.start().await,
            Err(StubRunnerError::InvalidState(RunnerState::Stopped))
        ));
    }

    #[tokio::test]
    async fn test_stop_while_starting_is_not_undone() {
        let runner = Arc::new(
            StubRunner::new(
                options().with_repository_root("memory"),
                Arc::new(DirRepository::with_stubs(&[
                    "loanIssuance",
                    "fraudDetectionServer",
                ])),
                Arc::new(SlowEngine {
                    delay: Duration::from_millis(200),
                    inner: HyperEngine::new(),
                }),
            )
            .unwrap(),
        );

        let starting = {
            let runner = Arc::clone(&runner);
            tokio::spawn(async move { runner.start().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(runner.state(), RunnerState::Starting);
        assert!(runner.stop().is_empty());

        let result = starting.await.unwrap();
        assert!(matches!(
            result,
            Err(StubRunnerError::InvalidState(RunnerState::Stopped))
        ));
        assert_eq!(runner.state(), RunnerState::Stopped);
        assert!(runner.pool.is_empty(), "servers started late were torn down");
        assert!(matches!(
            runner.find_stub_url("loanIssuance"),
            Err(StubRunnerError::RunnerNotStarted(RunnerState::Stopped))
        ));
    }
}
