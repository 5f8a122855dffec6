//! Filesystem-backed stub repository.
//!
//! Understands a Maven-style layout:
//!
//! ```text
//! {root}/{group path}/{artifact}/{version}/{artifact}-{version}-{classifier}.jar
//! {root}/{group path}/{artifact}/{version}/{artifact}-{version}-{classifier}.zip
//! {root}/{group path}/{artifact}/{version}/{artifact}-{version}-{classifier}/
//! ```
//!
//! When several versions are present the highest one wins. Without a repository root
//! the configured search paths are tried, each either in the layout above or holding
//! an already extracted `{path}/{artifact}/` directory.

use super::repository::{ArtifactLocation, LocatedArtifact, RepositoryError, StubRepository};
use crate::coordinates::StubCoordinates;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

const ARCHIVE_EXTENSIONS: [&str; 2] = ["jar", "zip"];

#[derive(Debug, Clone, Default)]
pub struct LocalRepository {
    search_paths: Vec<PathBuf>,
}

impl LocalRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search_paths(search_paths: Vec<PathBuf>) -> Self {
        Self { search_paths }
    }

    fn locate_in_root(
        &self,
        coordinates: &StubCoordinates,
        root: &Path,
    ) -> Result<Option<LocatedArtifact>, RepositoryError> {
        match coordinates.group_path() {
            Some(group_path) => {
                let artifact_dir = root.join(group_path).join(coordinates.artifact());
                Ok(locate_in_artifact_dir(&artifact_dir, coordinates)?.map(|location| {
                    LocatedArtifact::new(location, coordinates.group().map(str::to_string))
                }))
            }
            None => {
                // No group: any directory named after the artifact is a candidate
                let mut candidates: Vec<PathBuf> = WalkDir::new(root)
                    .sort_by_file_name()
                    .into_iter()
                    .filter_map(|entry| entry.ok())
                    .filter(|entry| {
                        entry.file_type().is_dir()
                            && entry.file_name().to_str() == Some(coordinates.artifact())
                    })
                    .map(|entry| entry.into_path())
                    .collect();
                candidates.sort();
                for candidate in candidates {
                    if let Some(location) = locate_in_artifact_dir(&candidate, coordinates)? {
                        let group = group_of(root, &candidate);
                        return Ok(Some(LocatedArtifact::new(location, group)));
                    }
                }
                Ok(None)
            }
        }
    }

    fn locate_on_search_paths(
        &self,
        coordinates: &StubCoordinates,
    ) -> Result<Option<LocatedArtifact>, RepositoryError> {
        for path in &self.search_paths {
            if !path.is_dir() {
                debug!("Skipping missing stub search path {}", path.display());
                continue;
            }
            if let Some(found) = self.locate_in_root(coordinates, path)? {
                return Ok(Some(found));
            }
            let exploded = path.join(coordinates.artifact());
            if exploded.is_dir() {
                return Ok(Some(LocatedArtifact::new(
                    ArtifactLocation::Directory(exploded),
                    coordinates.group().map(str::to_string),
                )));
            }
        }
        Ok(None)
    }
}

impl StubRepository for LocalRepository {
    fn locate(
        &self,
        coordinates: &StubCoordinates,
        root: Option<&str>,
    ) -> Result<LocatedArtifact, RepositoryError> {
        let found = match root {
            Some(root) => {
                let root = root_to_path(root)?;
                if !root.is_dir() {
                    return Err(RepositoryError::Unavailable(format!(
                        "repository root {} is not a directory",
                        root.display()
                    )));
                }
                self.locate_in_root(coordinates, &root)?
            }
            None => self.locate_on_search_paths(coordinates)?,
        };

        match found {
            Some(found) => {
                debug!(
                    "Located stub {} at {}",
                    coordinates,
                    found.location.path().display()
                );
                Ok(found)
            }
            None => Err(RepositoryError::NotFound),
        }
    }
}

/// Group of an artifact directory found under `root`: its parent path, dot separated
fn group_of(root: &Path, artifact_dir: &Path) -> Option<String> {
    let group_dir = artifact_dir.parent()?.strip_prefix(root).ok()?;
    let segments: Vec<&str> = group_dir
        .components()
        .filter_map(|c| c.as_os_str().to_str())
        .collect();
    (!segments.is_empty()).then(|| segments.join("."))
}

/// Accept plain paths and `file://` URIs; any other scheme is not served locally
fn root_to_path(root: &str) -> Result<PathBuf, RepositoryError> {
    if let Some(path) = root.strip_prefix("file://") {
        let decoded = urlencoding::decode(path)
            .map_err(|e| RepositoryError::Unavailable(format!("invalid repository URI: {e}")))?;
        return Ok(PathBuf::from(decoded.into_owned()));
    }
    if let Some((scheme, _)) = root.split_once("://") {
        return Err(RepositoryError::Unavailable(format!(
            "unsupported repository scheme '{scheme}'"
        )));
    }
    Ok(PathBuf::from(root))
}

fn locate_in_artifact_dir(
    artifact_dir: &Path,
    coordinates: &StubCoordinates,
) -> Result<Option<ArtifactLocation>, RepositoryError> {
    if !artifact_dir.is_dir() {
        return Ok(None);
    }

    let mut versions: Vec<String> = std::fs::read_dir(artifact_dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .collect();
    versions.sort_by(|a, b| compare_versions(b, a));

    for version in versions {
        let version_dir = artifact_dir.join(&version);
        let base = format!(
            "{}-{}-{}",
            coordinates.artifact(),
            version,
            coordinates.classifier()
        );
        for extension in ARCHIVE_EXTENSIONS {
            let archive = version_dir.join(format!("{base}.{extension}"));
            if archive.is_file() {
                return Ok(Some(ArtifactLocation::Archive(archive)));
            }
        }
        let exploded = version_dir.join(&base);
        if exploded.is_dir() {
            return Ok(Some(ArtifactLocation::Directory(exploded)));
        }
    }
    Ok(None)
}

/// Numeric-aware version ordering. A trailing qualifier such as `-SNAPSHOT` sorts
/// below the bare release; trailing numeric parts sort above it.
pub(crate) fn compare_versions(a: &str, b: &str) -> Ordering {
    let split = |v: &str| -> Vec<String> {
        v.split(['.', '-'])
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    };
    let (left, right) = (split(a), split(b));

    for i in 0..left.len().max(right.len()) {
        let ordering = match (left.get(i), right.get(i)) {
            (Some(l), Some(r)) => match (l.parse::<u64>(), r.parse::<u64>()) {
                (Ok(l), Ok(r)) => l.cmp(&r),
                (Ok(_), Err(_)) => Ordering::Greater,
                (Err(_), Ok(_)) => Ordering::Less,
                (Err(_), Err(_)) => l.cmp(r),
            },
            (Some(l), None) => {
                if l.parse::<u64>().is_ok() {
                    Ordering::Greater
                } else {
                    Ordering::Less
                }
            }
            (None, Some(r)) => {
                if r.parse::<u64>().is_ok() {
                    Ordering::Less
                } else {
                    Ordering::Greater
                }
            }
            (None, None) => Ordering::Equal,
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}
