//! Loading mapping files from a stub directory.
//!
//! Every `*.json` file below a directory named `mappings` is a mapping file. Stub
//! artifacts usually nest that directory (`META-INF/{group}/{artifact}/{version}/mappings`),
//! so it is searched for recursively. A directory without any `mappings` folder is
//! treated as a flat collection of mapping files.

use super::matching::CompiledMapping;
use super::types::{EngineError, MappingFile};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

const MAPPINGS_DIR: &str = "mappings";
const FILES_DIR: &str = "__files";

/// Load and compile every mapping under `stub_dir`, ordered by priority then file order
pub fn load_mappings(stub_dir: &Path) -> Result<Vec<CompiledMapping>, EngineError> {
    if !stub_dir.is_dir() {
        return Err(EngineError::InvalidStubs {
            path: stub_dir.to_path_buf(),
            reason: "not a directory".to_string(),
        });
    }

    let json_files: Vec<PathBuf> = WalkDir::new(stub_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().and_then(|e| e.to_str()) == Some("json"))
        .collect();

    let (in_mappings, loose): (Vec<PathBuf>, Vec<PathBuf>) = json_files
        .into_iter()
        .partition(|path| mappings_ancestor(stub_dir, path).is_some());
    let files = if in_mappings.is_empty() {
        loose
            .into_iter()
            .filter(|path| !path.components().any(|c| c.as_os_str() == FILES_DIR))
            .collect()
    } else {
        in_mappings
    };

    let mut compiled = Vec::new();
    for file in files {
        let contents = std::fs::read_to_string(&file).map_err(|e| EngineError::InvalidStubs {
            path: file.clone(),
            reason: e.to_string(),
        })?;
        let parsed: MappingFile =
            serde_json::from_str(&contents).map_err(|e| EngineError::InvalidStubs {
                path: file.clone(),
                reason: e.to_string(),
            })?;

        let files_root = match mappings_ancestor(stub_dir, &file) {
            Some(mappings) => mappings
                .parent()
                .unwrap_or(stub_dir)
                .join(FILES_DIR),
            None => stub_dir.join(FILES_DIR),
        };

        for mapping in parsed.into_mappings() {
            let mapping = CompiledMapping::compile(mapping, files_root.clone()).map_err(
                |reason| EngineError::InvalidStubs {
                    path: file.clone(),
                    reason,
                },
            )?;
            compiled.push(mapping);
        }
        debug!("Loaded mappings from {}", file.display());
    }

    if compiled.is_empty() {
        warn!("No stub mappings found in {}", stub_dir.display());
    }

    // Stable sort keeps file order within a priority
    compiled.sort_by_key(|m| m.mapping.effective_priority());
    Ok(compiled)
}

/// Nearest ancestor of `file` named `mappings`, not looking above `stub_dir`
fn mappings_ancestor(stub_dir: &Path, file: &Path) -> Option<PathBuf> {
    file.ancestors()
        .skip(1)
        .take_while(|dir| dir.starts_with(stub_dir))
        .find(|dir| dir.file_name().and_then(|n| n.to_str()) == Some(MAPPINGS_DIR))
        .map(Path::to_path_buf)
}
