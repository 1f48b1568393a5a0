//! Lookup of the Detect jar inside an air-gapped installation.

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::debug;

use crate::error::RsdetectError;

const JAR_PREFIX: &str = "detect-";
const JAR_SUFFIX: &str = ".jar";

/// Finds the single `detect-*.jar` directly inside `home`.
///
/// # Errors
///
/// - [`RsdetectError::ArtifactResolution`] unless exactly one jar matches
/// - [`RsdetectError::Io`] if the directory cannot be read
pub fn find_detect_jar(home: &Utf8Path) -> Result<Utf8PathBuf, RsdetectError> {
    let entries = fs::read_dir(home)
        .map_err(|e| {
            RsdetectError::io(format!("failed to read installation directory: {}", home), e)
        })?;

    let mut matches = Vec::new();
    for entry in entries {
        let entry = entry
            .map_err(|e| {
                RsdetectError::io(format!("failed to read directory entry in {}", home), e)
            })?;
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if name.starts_with(JAR_PREFIX) && name.ends_with(JAR_SUFFIX) && entry.path().is_file() {
            matches.push(home.join(name));
        }
    }
    matches.sort();
    debug!("found {} Detect jar(s) in {}: {:?}", matches.len(), home, matches);

    match <[Utf8PathBuf; 1]>::try_from(matches) {
        Ok([jar]) => Ok(jar),
        Err(matches) => Err(RsdetectError::ArtifactResolution {
            count: matches.len(),
            directory: home.to_path_buf(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn utf8(dir: &tempfile::TempDir) -> &Utf8Path {
        Utf8Path::from_path(dir.path()).expect("temp dir should be UTF-8")
    }

    #[test]
    fn test_single_jar_found() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("detect-10.0.0.jar"), b"jar").unwrap();
        fs::write(dir.path().join("README.txt"), b"readme").unwrap();
        fs::write(dir.path().join("other-1.0.jar"), b"jar").unwrap();

        let jar = find_detect_jar(utf8(&dir)).unwrap();
        assert_eq!(jar.file_name(), Some("detect-10.0.0.jar"));
    }

    #[test]
    fn test_directories_are_ignored() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("detect-old.jar")).unwrap();
        fs::write(dir.path().join("detect-10.0.0.jar"), b"jar").unwrap();

        assert!(find_detect_jar(utf8(&dir)).is_ok());
    }

    #[test]
    fn test_missing_directory_is_io_error() {
        let dir = tempdir().unwrap();
        let missing = utf8(&dir).join("missing");
        let err = find_detect_jar(&missing).unwrap_err();
        assert!(matches!(err, RsdetectError::Io { .. }));
    }
}
