//! Registry of running stubs and the read-only view handed to callers.

use crate::coordinates::{StubCoordinates, StubQuery};
use crate::error::{Result, StubRunnerError};
use crate::server::ServerHandle;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;

type CoordinatesKey = (Option<String>, String, String);

/// A stub whose server is running. Owned by the pool.
#[derive(Debug)]
pub struct RunningStub {
    pub coordinates: StubCoordinates,
    pub base_url: String,
    pub port: u16,
    pub started_at: DateTime<Utc>,
    pub(crate) handle: Box<dyn ServerHandle>,
    /// Unpacked artifact, removed when the stub is dropped
    pub(crate) workdir: Option<TempDir>,
}

impl RunningStub {
    pub fn info(&self) -> RunningStubInfo {
        RunningStubInfo {
            coordinates: self.coordinates.clone(),
            base_url: self.base_url.clone(),
            port: self.port,
            started_at: self.started_at,
        }
    }
}

/// Copy of a running stub's public details
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunningStubInfo {
    pub coordinates: StubCoordinates,
    /// `http://{host}:{port}` with no trailing slash, ready for `format!("{url}/path")`.
    /// Parse it with `hyper::Uri` or `reqwest::Url` where a typed URI is needed.
    pub base_url: String,
    pub port: u16,
    pub started_at: DateTime<Utc>,
}

/// Running stubs in registration order, indexed by exact coordinates and by artifact
#[derive(Debug, Default)]
pub(crate) struct Registry {
    stubs: Vec<RunningStub>,
    by_key: HashMap<CoordinatesKey, usize>,
    by_artifact: HashMap<String, Vec<usize>>,
}

impl Registry {
    pub(crate) fn insert(&mut self, stub: RunningStub) {
        let index = self.stubs.len();
        self.by_key.insert(stub.coordinates.key(), index);
        self.by_artifact
            .entry(stub.coordinates.artifact().to_string())
            .or_default()
            .push(index);
        self.stubs.push(stub);
    }

    pub(crate) fn contains(&self, coordinates: &StubCoordinates) -> bool {
        self.by_key.contains_key(&coordinates.key())
    }

    pub(crate) fn port_in_use(&self, port: u16) -> bool {
        self.stubs.iter().any(|s| s.port == port)
    }

    /// Look a stub up. Partial queries resolve to the first registered match.
    pub(crate) fn find(&self, query: &StubQuery) -> Option<&RunningStub> {
        let index = match query {
            StubQuery::Full {
                group,
                artifact,
                classifier,
            } => self
                .by_key
                .get(&(Some(group.clone()), artifact.clone(), classifier.clone()))
                .copied(),
            StubQuery::Artifact(artifact) => self
                .by_artifact
                .get(artifact)
                .and_then(|indexes| indexes.first().copied()),
            StubQuery::GroupArtifact { .. } => self
                .by_artifact
                .get(query.artifact())
                .and_then(|indexes| {
                    indexes
                        .iter()
                        .copied()
                        .find(|&i| self.stubs[i].coordinates.matches(query))
                }),
        };
        index.map(|i| &self.stubs[i])
    }

    pub(crate) fn infos(&self) -> Vec<RunningStubInfo> {
        self.stubs.iter().map(RunningStub::info).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.stubs.len()
    }

    /// Remove every stub, in registration order
    pub(crate) fn drain(&mut self) -> Vec<RunningStub> {
        self.by_key.clear();
        self.by_artifact.clear();
        std::mem::take(&mut self.stubs)
    }
}

/// Read-only view of the stubs running in a pool.
///
/// The view shares the pool's registry: once the pool is stopped it reports nothing
/// as present.
#[derive(Debug, Clone)]
pub struct RunningStubs {
    registry: Arc<RwLock<Registry>>,
}

impl RunningStubs {
    pub(crate) fn new(registry: Arc<RwLock<Registry>>) -> Self {
        Self { registry }
    }

    /// Whether a stub matching `identifier` (any of the three forms) is running
    pub fn is_present(&self, identifier: &str) -> bool {
        StubQuery::parse(identifier)
            .map(|query| self.find(&query).is_some())
            .unwrap_or(false)
    }

    pub fn is_present_in(&self, group: &str, artifact: &str) -> bool {
        StubQuery::in_group(group, artifact)
            .map(|query| self.find(&query).is_some())
            .unwrap_or(false)
    }

    /// Base URL of the matching stub, in the form described on [`RunningStubInfo::base_url`]
    pub fn find_url(&self, identifier: &str) -> Result<String> {
        self.find_url_for(&StubQuery::parse(identifier)?)
    }

    pub fn find_url_in(&self, group: &str, artifact: &str) -> Result<String> {
        self.find_url_for(&StubQuery::in_group(group, artifact)?)
    }

    pub fn find_url_for(&self, query: &StubQuery) -> Result<String> {
        self.find(query)
            .map(|info| info.base_url)
            .ok_or_else(|| StubRunnerError::StubNotRunning(query.to_string()))
    }

    pub fn find(&self, query: &StubQuery) -> Option<RunningStubInfo> {
        self.registry.read().find(query).map(RunningStub::info)
    }

    /// Details of every running stub, in registration order
    pub fn entries(&self) -> Vec<RunningStubInfo> {
        self.registry.read().infos()
    }

    pub fn len(&self) -> usize {
        self.registry.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
