//! StubServerPool - one mock server per resolved stub.
//!
//! Servers are started sequentially. A batch either starts completely or not at all:
//! when one server fails, every server already started for that batch is stopped
//! before the error is returned.

mod registry;


pub use registry::{RunningStub, RunningStubInfo, RunningStubs};

use crate::coordinates::{StubCoordinates, StubQuery};
use crate::error::{Result, StubRunnerError};
use crate::metrics;
use crate::resolver::ResolvedStub;
use crate::server::{MockServerEngine, StubServerSpec};
use parking_lot::RwLock;
use registry::Registry;
use std::sync::Arc;
use tracing::{info, warn};

/// A server that could not be stopped cleanly
#[derive(Debug, Clone, PartialEq)]
pub struct StopFailure {
    pub coordinates: StubCoordinates,
    pub reason: String,
}

/// Starts, tracks and stops stub servers
pub struct StubServerPool {
    engine: Arc<dyn MockServerEngine>,
    bind_host: String,
    registry: Arc<RwLock<Registry>>,
}

impl StubServerPool {
    pub fn new(engine: Arc<dyn MockServerEngine>, bind_host: impl Into<String>) -> Self {
        Self {
            engine,
            bind_host: bind_host.into(),
            registry: Arc::new(RwLock::new(Registry::default())),
        }
    }

    /// Start one server per resolved stub and register them all
    pub async fn start_all(&self, resolved: Vec<ResolvedStub>) -> Result<RunningStubs> {
        let mut started: Vec<RunningStub> = Vec::with_capacity(resolved.len());

        for stub in resolved {
            let (coordinates, stub_dir, workdir, port) = stub.into_parts();

            if let Some(reason) = self.conflict(&started, &coordinates, port) {
                metrics::record_server_start_failure();
                rollback(started);
                return Err(start_failure(&coordinates, reason));
            }

            let spec = StubServerSpec {
                name: coordinates.to_string(),
                host: self.bind_host.clone(),
                port: port.unwrap_or(0),
                stub_dir,
            };
            match self.engine.start(spec).await {
                Ok(handle) => {
                    metrics::record_server_started();
                    info!("Started stub {} at {}", coordinates, handle.base_url());
                    started.push(RunningStub {
                        base_url: handle.base_url().to_string(),
                        port: handle.port(),
                        started_at: chrono::Utc::now(),
                        coordinates,
                        handle,
                        workdir,
                    });
                }
                Err(e) => {
                    metrics::record_server_start_failure();
                    warn!("Stub {} failed to start: {}", coordinates, e);
                    rollback(started);
                    return Err(start_failure(&coordinates, e.to_string()));
                }
            }
        }

        let mut registry = self.registry.write();
        for stub in started {
            registry.insert(stub);
        }
        drop(registry);
        Ok(self.running_stubs())
    }

    /// Why `coordinates` cannot join the pool, if it cannot
    fn conflict(
        &self,
        started: &[RunningStub],
        coordinates: &StubCoordinates,
        port: Option<u16>,
    ) -> Option<String> {
        let registry = self.registry.read();
        if registry.contains(coordinates) || started.iter().any(|s| s.coordinates == *coordinates)
        {
            return Some("stub is already running".to_string());
        }
        let port = port?;
        if registry.port_in_use(port) || started.iter().any(|s| s.port == port) {
            return Some(format!("port {port} is already used by another stub"));
        }
        None
    }

    /// Stop every running server. Failures are logged and returned, never raised.
    /// Calling it again once the pool is empty does nothing.
    pub fn stop_all(&self) -> Vec<StopFailure> {
        let stubs = self.registry.write().drain();
        if stubs.is_empty() {
            return Vec::new();
        }
        let count = stubs.len();
        let failures = stop_stubs(stubs);
        info!(
            "Stopped {} stub server(s), {} failure(s)",
            count,
            failures.len()
        );
        failures
    }

    pub fn find_url(&self, query: &StubQuery) -> Result<String> {
        self.running_stubs().find_url_for(query)
    }

    pub fn running_stubs(&self) -> RunningStubs {
        RunningStubs::new(Arc::clone(&self.registry))
    }

    pub fn len(&self) -> usize {
        self.registry.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for StubServerPool {
    fn drop(&mut self) {
        self.stop_all();
    }
}

fn start_failure(coordinates: &StubCoordinates, reason: String) -> StubRunnerError {
    StubRunnerError::StubServerStartFailure {
        coordinates: coordinates.to_string(),
        reason,
    }
}

fn rollback(started: Vec<RunningStub>) {
    if started.is_empty() {
        return;
    }
    warn!("Rolling back {} stub server(s) started in this batch", started.len());
    stop_stubs(started);
}

fn stop_stubs(stubs: Vec<RunningStub>) -> Vec<StopFailure> {
    let mut failures = Vec::new();
    for stub in stubs {
        metrics::record_server_stopped();
        match stub.handle.stop() {
            Ok(()) => info!("Stopped stub {} on port {}", stub.coordinates, stub.port),
            Err(e) => {
                warn!("Failed to stop stub {}: {}", stub.coordinates, e);
                failures.push(StopFailure {
                    coordinates: stub.coordinates.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }
    failures
}
