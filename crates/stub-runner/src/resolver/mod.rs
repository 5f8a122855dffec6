//! Stub resolution: turns requested coordinates into local stub content.
//!
//! - `repository`: the `StubRepository` collaborator contract
//! - `local`: filesystem implementation (Maven-style layout + search paths)
//! - `archive`: unpacking of `.jar`/`.zip` artifacts into temporary directories

mod archive;
mod local;
mod repository;

pub use archive::unpack;
pub use local::LocalRepository;
pub use repository::{ArtifactLocation, LocatedArtifact, RepositoryError, StubRepository};

use crate::coordinates::StubCoordinates;
use crate::error::{Result, StubRunnerError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tracing::{debug, info};

/// Stub content materialised on the local filesystem
#[derive(Debug)]
pub struct ResolvedStub {
    pub coordinates: StubCoordinates,
    path: PathBuf,
    /// Owns the unpack directory so it lives as long as the stub
    workdir: Option<TempDir>,
    /// Fixed port requested for this stub's server
    port: Option<u16>,
}

impl ResolvedStub {
    pub fn new(coordinates: StubCoordinates, path: PathBuf) -> Self {
        Self {
            coordinates,
            path,
            workdir: None,
            port: None,
        }
    }

    /// Ask for the stub to be served on a fixed port instead of an OS-assigned one
    pub fn with_port(mut self, port: Option<u16>) -> Self {
        self.port = port;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub(crate) fn into_parts(self) -> (StubCoordinates, PathBuf, Option<TempDir>, Option<u16>) {
        (self.coordinates, self.path, self.workdir, self.port)
    }
}

/// Resolves stubs through a `StubRepository`
#[derive(Clone)]
pub struct StubResolver {
    repository: Arc<dyn StubRepository>,
}

impl StubResolver {
    pub fn new(repository: Arc<dyn StubRepository>) -> Self {
        Self { repository }
    }

    /// Resolve every requested stub, failing on the first one that cannot be found.
    ///
    /// Archives already unpacked for earlier entries are cleaned up when the error
    /// drops them.
    pub fn resolve(
        &self,
        requested: &[StubCoordinates],
        repository_root: Option<&str>,
    ) -> Result<Vec<ResolvedStub>> {
        let repository_root = repository_root.map(str::trim).filter(|r| !r.is_empty());
        let mut resolved = Vec::with_capacity(requested.len());

        for coordinates in requested {
            let located = self
                .repository
                .locate(coordinates, repository_root)
                .map_err(|e| to_runner_error(coordinates, repository_root, e))?;

            // Register bare requests under the group they were found in
            let completed = match &located.group {
                Some(group) => coordinates.with_group(group),
                None => coordinates.clone(),
            };

            let stub = match located.location {
                ArtifactLocation::Directory(path) => ResolvedStub::new(completed, path),
                ArtifactLocation::Archive(archive) => {
                    let workdir = unpack(&archive).map_err(|reason| {
                        StubRunnerError::RepositoryUnavailable {
                            coordinates: coordinates.to_string(),
                            reason,
                        }
                    })?;
                    ResolvedStub {
                        coordinates: completed,
                        path: workdir.path().to_path_buf(),
                        workdir: Some(workdir),
                        port: None,
                    }
                }
            };
            debug!("Resolved {} to {}", stub.coordinates, stub.path.display());
            resolved.push(stub);
        }

        info!("Resolved {} stub(s)", resolved.len());
        Ok(resolved)
    }
}

fn to_runner_error(
    coordinates: &StubCoordinates,
    repository_root: Option<&str>,
    error: RepositoryError,
) -> StubRunnerError {
    match (error, repository_root) {
        (RepositoryError::NotFound, Some(_)) => {
            StubRunnerError::StubNotFound(coordinates.to_string())
        }
        (RepositoryError::NotFound, None) => StubRunnerError::RepositoryUnavailable {
            coordinates: coordinates.to_string(),
            reason: "no repository root configured and the stub is not on any search path"
                .to_string(),
        },
        (RepositoryError::Unavailable(reason), _) => StubRunnerError::RepositoryUnavailable {
            coordinates: coordinates.to_string(),
            reason,
        },
        (RepositoryError::Io(e), _) => StubRunnerError::RepositoryUnavailable {
            coordinates: coordinates.to_string(),
            reason: e.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn coords(raw: &str) -> StubCoordinates {
        StubCoordinates::parse(raw, "stubs").unwrap()
    }

    fn resolver(search_paths: Vec<PathBuf>) -> StubResolver {
        StubResolver::new(Arc::new(LocalRepository::with_search_paths(search_paths)))
    }

    #[test]
    fn test_resolve_unpacks_archives() {
        let root = TempDir::new().unwrap();
        let version_dir = root.path().join("g/loanIssuance/1.0.0");
        fs::create_dir_all(&version_dir).unwrap();
        let jar = File::create(version_dir.join("loanIssuance-1.0.0-stubs.jar")).unwrap();
        let mut writer = zip::ZipWriter::new(jar);
        writer
            .start_file("mappings/name.json", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"{}").unwrap();
        writer.finish().unwrap();

        let resolved = resolver(vec![])
            .resolve(&[coords("g:loanIssuance")], root.path().to_str())
            .unwrap();
        assert_eq!(resolved.len(), 1);
        let unpacked = resolved[0].path().to_path_buf();
        assert!(unpacked.join("mappings/name.json").is_file());

        drop(resolved);
        assert!(!unpacked.exists(), "unpack directory removed with the stub");
    }

    #[test]
    fn test_missing_stub_with_root_is_not_found() {
        let root = TempDir::new().unwrap();
        let err = resolver(vec![])
            .resolve(&[coords("g:missing")], root.path().to_str())
            .unwrap_err();
        assert!(matches!(err, StubRunnerError::StubNotFound(_)));
    }

    #[test]
    fn test_missing_stub_without_root_is_unavailable() {
        let err = resolver(vec![])
            .resolve(&[coords("g:loanIssuance")], Some(""))
            .unwrap_err();
        assert!(matches!(err, StubRunnerError::RepositoryUnavailable { .. }));
    }

    #[test]
    fn test_without_root_uses_search_paths() {
        let search = TempDir::new().unwrap();
        fs::create_dir_all(search.path().join("loanIssuance/mappings")).unwrap();

        let resolved = resolver(vec![search.path().to_path_buf()])
            .resolve(&[coords("g:loanIssuance")], None)
            .unwrap();
        assert_eq!(resolved[0].path(), search.path().join("loanIssuance"));
    }

    #[test]
    fn test_bare_request_takes_group_from_repository() {
        let root = TempDir::new().unwrap();
        fs::create_dir_all(
            root.path()
                .join("com/acme/fraudDetectionServer/1.0.0/fraudDetectionServer-1.0.0-stubs"),
        )
        .unwrap();

        let resolved = resolver(vec![])
            .resolve(&[coords("fraudDetectionServer")], root.path().to_str())
            .unwrap();
        assert_eq!(resolved[0].coordinates, coords("com.acme:fraudDetectionServer"));
    }
}
