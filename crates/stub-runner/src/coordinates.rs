//! Stub coordinates and the typed queries used to look running stubs up.
//!
//! Coordinates identify the artifact a stub was published in:
//! `group:artifact:classifier`. Callers may refer to a running stub with any of
//! three forms, each mapped to a [`StubQuery`] variant:
//!
//! - `artifact` - matches any group and classifier
//! - `group:artifact` (or `group/artifact`) - matches any classifier
//! - `group:artifact:classifier` - exact match

use crate::error::{Result, StubRunnerError};
use serde::Serialize;
use std::fmt;

/// Classifier assumed when an identifier does not carry one
pub const DEFAULT_CLASSIFIER: &str = "stubs";

/// Immutable `(group, artifact, classifier)` triple
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct StubCoordinates {
    group: Option<String>,
    artifact: String,
    classifier: String,
}

impl StubCoordinates {
    /// Build coordinates from already validated parts
    pub fn new(
        group: Option<&str>,
        artifact: &str,
        classifier: &str,
    ) -> Result<Self> {
        let artifact = artifact.trim();
        if artifact.is_empty() {
            return Err(StubRunnerError::MalformedIdentifier(format!(
                "{}:{}",
                group.unwrap_or_default(),
                artifact
            )));
        }
        Ok(Self {
            group: group
                .map(str::trim)
                .filter(|g| !g.is_empty())
                .map(str::to_string),
            artifact: artifact.to_string(),
            classifier: classifier.trim().to_string(),
        })
    }

    /// Parse `artifact`, `group:artifact` or `group:artifact:classifier`.
    ///
    /// The default classifier is applied when the identifier has fewer than three tokens.
    pub fn parse(raw: &str, default_classifier: &str) -> Result<Self> {
        let tokens = split_identifier(raw, ':')?;
        let (group, artifact, classifier) = match tokens.as_slice() {
            [artifact] => (None, *artifact, default_classifier),
            [group, artifact] => (Some(*group), *artifact, default_classifier),
            [group, artifact, classifier] => (Some(*group), *artifact, *classifier),
            _ => return Err(StubRunnerError::MalformedIdentifier(raw.to_string())),
        };
        Self::new(group, artifact, classifier)
    }

    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    pub fn artifact(&self) -> &str {
        &self.artifact
    }

    pub fn classifier(&self) -> &str {
        &self.classifier
    }

    /// Group as a repository path (`org.example` -> `org/example`)
    /// Same coordinates with the group filled in. An existing group is kept.
    pub fn with_group(&self, group: &str) -> Self {
        let group = group.trim();
        let mut completed = self.clone();
        if completed.group.is_none() && !group.is_empty() {
            completed.group = Some(group.to_string());
        }
        completed
    }

    pub fn group_path(&self) -> Option<String> {
        self.group.as_ref().map(|g| g.replace('.', "/"))
    }

    /// Whether this coordinate is what `query` asks for
    pub fn matches(&self, query: &StubQuery) -> bool {
        match query {
            StubQuery::Artifact(artifact) => self.artifact == *artifact,
            StubQuery::GroupArtifact { group, artifact } => {
                self.artifact == *artifact && self.group.as_deref() == Some(group.as_str())
            }
            StubQuery::Full {
                group,
                artifact,
                classifier,
            } => {
                self.artifact == *artifact
                    && self.group.as_deref() == Some(group.as_str())
                    && self.classifier == *classifier
            }
        }
    }

    /// Exact lookup key
    pub(crate) fn key(&self) -> (Option<String>, String, String) {
        (
            self.group.clone(),
            self.artifact.clone(),
            self.classifier.clone(),
        )
    }
}

impl fmt::Display for StubCoordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.group {
            Some(group) => write!(f, "{}:{}:{}", group, self.artifact, self.classifier),
            None => write!(f, "{}:{}", self.artifact, self.classifier),
        }
    }
}

/// Typed lookup key for running stubs
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StubQuery {
    Artifact(String),
    GroupArtifact {
        group: String,
        artifact: String,
    },
    Full {
        group: String,
        artifact: String,
        classifier: String,
    },
}

impl StubQuery {
    /// Parse a query identifier. `group/artifact` is accepted as a two-part form.
    pub fn parse(raw: &str) -> Result<Self> {
        let separator = if !raw.contains(':') && raw.contains('/') {
            '/'
        } else {
            ':'
        };
        let tokens = split_identifier(raw, separator)?;
        match tokens.as_slice() {
            [artifact] => Ok(StubQuery::Artifact(artifact.to_string())),
            [group, artifact] => Ok(StubQuery::GroupArtifact {
                group: group.to_string(),
                artifact: artifact.to_string(),
            }),
            [group, artifact, classifier] if separator == ':' => Ok(StubQuery::Full {
                group: group.to_string(),
                artifact: artifact.to_string(),
                classifier: classifier.to_string(),
            }),
            _ => Err(StubRunnerError::MalformedIdentifier(raw.to_string())),
        }
    }

    /// Two-argument form
    pub fn in_group(group: &str, artifact: &str) -> Result<Self> {
        let (group, artifact) = (group.trim(), artifact.trim());
        if group.is_empty() || artifact.is_empty() {
            return Err(StubRunnerError::MalformedIdentifier(format!(
                "{group}:{artifact}"
            )));
        }
        Ok(StubQuery::GroupArtifact {
            group: group.to_string(),
            artifact: artifact.to_string(),
        })
    }

    pub fn artifact(&self) -> &str {
        match self {
            StubQuery::Artifact(artifact)
            | StubQuery::GroupArtifact { artifact, .. }
            | StubQuery::Full { artifact, .. } => artifact,
        }
    }
}

impl fmt::Display for StubQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StubQuery::Artifact(artifact) => write!(f, "{artifact}"),
            StubQuery::GroupArtifact { group, artifact } => write!(f, "{group}:{artifact}"),
            StubQuery::Full {
                group,
                artifact,
                classifier,
            } => write!(f, "{group}:{artifact}:{classifier}"),
        }
    }
}

fn split_identifier(raw: &str, separator: char) -> Result<Vec<&str>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(StubRunnerError::MalformedIdentifier(raw.to_string()));
    }
    let tokens: Vec<&str> = trimmed.split(separator).map(str::trim).collect();
    if tokens.len() > 3 || tokens.iter().any(|t| t.is_empty()) {
        return Err(StubRunnerError::MalformedIdentifier(raw.to_string()));
    }
    Ok(tokens)
}
