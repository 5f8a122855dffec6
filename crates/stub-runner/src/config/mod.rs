//! Configuration for the stub runner.
//!
//! `StubRunnerOptions` is an immutable snapshot handed to the runner at construction.
//! It can be loaded from YAML, built fluently, or assembled from CLI flags.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::coordinates::{StubCoordinates, DEFAULT_CLASSIFIER};
use crate::error::{Result, StubRunnerError};

fn default_classifier() -> String {
    DEFAULT_CLASSIFIER.to_string()
}

fn default_bind_host() -> String {
    "127.0.0.1".to_string()
}

fn default_receive_timeout_ms() -> u64 {
    5_000
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StubRunnerOptions {
    /// Repository root: a filesystem path or a `file://` URI.
    /// Empty or absent means stubs are looked up on `stubs_search_paths`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository_root: Option<String>,

    /// Local directories searched when no repository root is configured
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stubs_search_paths: Vec<PathBuf>,

    /// Classifier used for identifiers that do not carry one
    #[serde(default = "default_classifier")]
    pub classifier: String,

    /// Requested stub identifiers (`[group:]artifact[:classifier]`)
    #[serde(default)]
    pub stubs: Vec<String>,

    /// Fixed ports keyed by stub identifier. Stubs without an entry get an OS-assigned port.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub ports: HashMap<String, u16>,

    /// Host the stub servers bind to
    #[serde(default = "default_bind_host")]
    pub bind_host: String,

    /// Default receive timeout for messaging destinations, in milliseconds
    #[serde(default = "default_receive_timeout_ms")]
    pub receive_timeout_ms: u64,
}

impl Default for StubRunnerOptions {
    fn default() -> Self {
        Self {
            repository_root: None,
            stubs_search_paths: Vec::new(),
            classifier: default_classifier(),
            stubs: Vec::new(),
            ports: HashMap::new(),
            bind_host: default_bind_host(),
            receive_timeout_ms: default_receive_timeout_ms(),
        }
    }
}

impl StubRunnerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let contents = std::fs::read_to_string(path)?;
        let options: StubRunnerOptions = serde_yaml::from_str(&contents)?;
        options.validate()?;
        Ok(options)
    }

    /// Validate configuration. Every stub identifier is parsed here so malformed
    /// identifiers surface before anything is resolved or started.
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.classifier.trim().is_empty() {
            anyhow::bail!("Default classifier must not be empty");
        }
        if self.bind_host.trim().is_empty() {
            anyhow::bail!("bindHost must not be empty");
        }
        self.requested_coordinates()?;
        for identifier in self.ports.keys() {
            StubCoordinates::parse(identifier, &self.classifier)?;
        }
        Ok(())
    }

    pub fn with_repository_root(mut self, root: impl Into<String>) -> Self {
        self.repository_root = Some(root.into());
        self
    }

    pub fn with_search_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.stubs_search_paths.push(path.into());
        self
    }

    pub fn with_classifier(mut self, classifier: impl Into<String>) -> Self {
        self.classifier = classifier.into();
        self
    }

    pub fn with_bind_host(mut self, host: impl Into<String>) -> Self {
        self.bind_host = host.into();
        self
    }

    /// Set the messaging receive timeout. Kept at millisecond precision; a non-zero
    /// timeout below one millisecond rounds up to one.
    pub fn with_receive_timeout(mut self, timeout: Duration) -> Self {
        let millis = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self.receive_timeout_ms = if millis == 0 && !timeout.is_zero() {
            1
        } else {
            millis
        };
        self
    }

    /// Request a stub by identifier
    pub fn download_stub(mut self, identifier: impl Into<String>) -> Self {
        self.stubs.push(identifier.into());
        self
    }

    /// Request a stub by group and artifact
    pub fn download_stub_in(self, group: &str, artifact: &str) -> Self {
        self.download_stub(format!("{group}:{artifact}"))
    }

    /// Pin a stub to a fixed port
    pub fn with_port(mut self, identifier: impl Into<String>, port: u16) -> Self {
        self.ports.insert(identifier.into(), port);
        self
    }

    /// Repository root, with the empty string treated as absent
    pub fn repository_root(&self) -> Option<&str> {
        self.repository_root
            .as_deref()
            .map(str::trim)
            .filter(|root| !root.is_empty())
    }

    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }

    /// Parsed coordinates of every requested stub, in declaration order
    pub fn requested_coordinates(&self) -> Result<Vec<StubCoordinates>> {
        self.stubs
            .iter()
            .map(|raw| StubCoordinates::parse(raw, &self.classifier))
            .collect()
    }

    /// Fixed port for a stub, if one was configured for any of its identifier forms.
    ///
    /// When several identifiers match, the most specific one wins (`g:a:c` over `g:a`
    /// over `a`); equally specific identifiers are ordered by name.
    pub fn port_for(&self, coordinates: &StubCoordinates) -> Option<u16> {
        self.ports
            .iter()
            .filter_map(|(identifier, port)| {
                let configured = StubCoordinates::parse(identifier, &self.classifier).ok()?;
                let same_group =
                    configured.group().is_none() || configured.group() == coordinates.group();
                (same_group
                    && configured.artifact() == coordinates.artifact()
                    && configured.classifier() == coordinates.classifier())
                .then_some((identifier.as_str(), *port))
            })
            .max_by(|(a, _), (b, _)| {
                specificity(a)
                    .cmp(&specificity(b))
                    .then_with(|| b.cmp(a))
            })
            .map(|(_, port)| port)
    }
}

/// Number of coordinate parts spelled out in an identifier
fn specificity(identifier: &str) -> usize {
    identifier.split(':').count()
}
