//! Repository collaborator contract.

use crate::coordinates::StubCoordinates;
use std::path::PathBuf;

/// Where a stub artifact was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactLocation {
    /// Already extracted stub content
    Directory(PathBuf),
    /// Packed artifact (`.jar` / `.zip`) that still has to be unpacked
    Archive(PathBuf),
}

impl ArtifactLocation {
    pub fn path(&self) -> &std::path::Path {
        match self {
            ArtifactLocation::Directory(path) | ArtifactLocation::Archive(path) => path,
        }
    }
}

/// A located artifact and the group it was found under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedArtifact {
    pub location: ArtifactLocation,
    /// Group revealed by the repository layout, if any
    pub group: Option<String>,
}

impl LocatedArtifact {
    pub fn new(location: ArtifactLocation, group: Option<String>) -> Self {
        Self { location, group }
    }
}

impl From<ArtifactLocation> for LocatedArtifact {
    fn from(location: ArtifactLocation) -> Self {
        Self::new(location, None)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("artifact not found")]
    NotFound,
    #[error("{0}")]
    Unavailable(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Source of stub artifacts.
///
/// `root` is the configured repository root, already normalised so that an empty
/// string arrives as `None`. Implementations decide how to search when it is absent.
/// When the request carries no group, implementations should report the group the
/// artifact was found under so the stub is registered with full coordinates.
pub trait StubRepository: Send + Sync {
    fn locate(
        &self,
        coordinates: &StubCoordinates,
        root: Option<&str>,
    ) -> Result<LocatedArtifact, RepositoryError>;
}
