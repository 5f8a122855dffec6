//! Unpacking of packed stub artifacts.

use std::fs::File;
use std::path::Path;
use tempfile::TempDir;
use tracing::debug;
use zip::ZipArchive;

/// Extract a `.jar`/`.zip` archive into a fresh temporary directory.
///
/// The directory is removed when the returned handle is dropped.
pub fn unpack(archive: &Path) -> Result<TempDir, String> {
    let file = File::open(archive).map_err(|e| format!("cannot open {}: {e}", archive.display()))?;
    let mut zip = ZipArchive::new(file)
        .map_err(|e| format!("{} is not a valid archive: {e}", archive.display()))?;

    let target = tempfile::Builder::new()
        .prefix("stub-runner-")
        .tempdir()
        .map_err(|e| format!("cannot create temporary directory: {e}"))?;

    zip.extract(target.path())
        .map_err(|e| format!("cannot unpack {}: {e}", archive.display()))?;

    debug!(
        "Unpacked {} ({} entries) to {}",
        archive.display(),
        zip.len(),
        target.path().display()
    );
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    #[test]
    fn test_unpack_archive() {
        let dir = TempDir::new().unwrap();
        let archive_path = dir.path().join("stubs.jar");
        {
            let mut writer = zip::ZipWriter::new(File::create(&archive_path).unwrap());
            writer
                .start_file("mappings/name.json", SimpleFileOptions::default())
                .unwrap();
            writer.write_all(br#"{"request":{}}"#).unwrap();
            writer.finish().unwrap();
        }

        let unpacked = unpack(&archive_path).unwrap();
        let contents = std::fs::read_to_string(unpacked.path().join("mappings/name.json")).unwrap();
        assert_eq!(contents, r#"{"request":{}}"#);
    }

    #[test]
    fn test_unpack_rejects_non_archive() {
        let dir = TempDir::new().unwrap();
        let bogus = dir.path().join("stubs.jar");
        std::fs::write(&bogus, b"not a zip").unwrap();
        assert!(unpack(&bogus).is_err());
    }
}
