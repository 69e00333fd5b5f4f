//! Versioned artifact store.
//!
//! Each save produces two byte-identical copies of the source:
//!
//! ```text
//! <root>/<type>/<type>_<YYYYMMDD_HHMMSS><ext>
//! <root>/latest/<type>_latest<ext>
//! ```
//!
//! The timestamped copy is written first. The latest copy goes through a
//! temporary file and a rename; if that fails the timestamped copy is
//! removed again so the store never holds only one of the two.

use super::{Clock, SystemClock, LATEST_DIR, TIMESTAMP_FORMAT};
use crate::core::{ArtifactRecord, ArtifactType};
use crate::errors::{InvalidSourceError, IoError, PipelineError};
use dashmap::DashMap;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// File-backed store of versioned artifacts.
#[derive(Debug)]
pub struct ArtifactStore {
    root: PathBuf,
    clock: Arc<dyn Clock>,
    // Serializes latest-alias updates per type within this process.
    locks: DashMap<ArtifactType, Arc<Mutex<()>>>,
}

impl ArtifactStore {
    /// Creates a store rooted at `root` using the system clock.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_clock(root, Arc::new(SystemClock))
    }

    /// Creates a store with a custom clock.
    #[must_use]
    pub fn with_clock(root: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            root: root.into(),
            clock,
            locks: DashMap::new(),
        }
    }

    /// Returns the store root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the timestamped copies of a type.
    #[must_use]
    pub fn type_dir(&self, artifact_type: ArtifactType) -> PathBuf {
        self.root.join(artifact_type.as_str())
    }

    /// Directory holding the latest copies.
    #[must_use]
    pub fn latest_dir(&self) -> PathBuf {
        self.root.join(LATEST_DIR)
    }

    /// Saves `source` as a new version of `artifact_type`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSourceError` if `source` is not a regular file and
    /// `IoError` if either copy cannot be completed.
    pub fn save(
        &self,
        source: impl AsRef<Path>,
        artifact_type: ArtifactType,
    ) -> Result<ArtifactRecord, PipelineError> {
        let source = source.as_ref();
        let is_file = fs::metadata(source).map(|m| m.is_file()).unwrap_or(false);
        if !is_file {
            return Err(InvalidSourceError::NotAFile {
                path: source.to_path_buf(),
            }
            .into());
        }

        let source_digest = digest_file(source)?;
        self.write_copies(source, artifact_type, &source_digest)
    }

    /// Writes the versioned copy, verifies it against `expected`, then
    /// replaces the latest alias. Either both copies land or neither does.
    fn write_copies(
        &self,
        source: &Path,
        artifact_type: ArtifactType,
        expected: &(String, u64),
    ) -> Result<ArtifactRecord, PipelineError> {
        let type_dir = self.type_dir(artifact_type);
        let latest_dir = self.latest_dir();
        create_dir(&type_dir)?;
        create_dir(&latest_dir)?;

        let lock = self.locks.entry(artifact_type).or_default().clone();
        let _guard = lock.lock();

        let timestamp = self.clock.now();
        let extension = extension_of(source);
        let stem = format!(
            "{}_{}",
            artifact_type.as_str(),
            timestamp.format(TIMESTAMP_FORMAT)
        );

        let versioned_path = unique_path(&type_dir, &stem, &extension);
        copy_verified(source, &versioned_path, expected)?;

        let latest_path = latest_dir.join(format!("{}_latest{extension}", artifact_type.as_str()));
        if let Err(err) = write_latest(source, &latest_path, expected) {
            discard(&versioned_path, "Failed to remove versioned copy after latest copy failed");
            return Err(err);
        }
        remove_stale_latest(&latest_dir, artifact_type, &latest_path);

        info!(
            artifact_type = %artifact_type,
            source = %source.display(),
            versioned = %versioned_path.display(),
            latest = %latest_path.display(),
            "Saved artifact"
        );

        Ok(ArtifactRecord {
            artifact_type,
            timestamp,
            extension,
            versioned_path,
            latest_path,
            size_bytes: expected.1,
            sha256: expected.0.clone(),
        })
    }

    /// Returns the latest copy of a type, if one exists.
    ///
    /// The alias matching the newest version's extension wins; other
    /// `<type>_latest.*` files are leftovers of an earlier extension.
    #[must_use]
    pub fn latest(&self, artifact_type: ArtifactType) -> Option<PathBuf> {
        let prefix = format!("{}_latest", artifact_type.as_str());
        let latest_dir = self.latest_dir();

        let newest = self.versions(artifact_type).ok().and_then(|v| v.last().cloned());
        if let Some(newest) = newest {
            let path = latest_dir.join(format!("{prefix}{}", extension_of(&newest)));
            if path.is_file() {
                return Some(path);
            }
        }

        let mut candidates: Vec<PathBuf> = fs::read_dir(latest_dir)
            .ok()?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && is_latest_alias(path, &prefix))
            .collect();
        candidates.sort();
        candidates.into_iter().next()
    }

    /// Lists the timestamped copies of a type, oldest first.
    ///
    /// Same-second copies are ordered by their numeric suffix, so `_2`
    /// precedes `_10`.
    ///
    /// # Errors
    ///
    /// Returns `IoError` if the type directory exists but cannot be read.
    pub fn versions(&self, artifact_type: ArtifactType) -> Result<Vec<PathBuf>, PipelineError> {
        let dir = self.type_dir(artifact_type);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&dir).map_err(|e| IoError::new("listing", &dir, e))?;
        let mut paths: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect();
        paths.sort_by_cached_key(|path| (version_key(artifact_type, path), path.clone()));
        Ok(paths)
    }
}

/// Length of a `TIMESTAMP_FORMAT` string.
const TIMESTAMP_LEN: usize = "YYYYmmdd_HHMMSS".len();

/// Sort key of a versioned file name: its timestamp and same-second suffix.
fn version_key(artifact_type: ArtifactType, path: &Path) -> (String, u32) {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let prefix = format!("{}_", artifact_type.as_str());
    let rest = stem.strip_prefix(&prefix).unwrap_or(&stem);

    match rest.get(..TIMESTAMP_LEN) {
        Some(timestamp) => {
            let suffix = rest[TIMESTAMP_LEN..]
                .strip_prefix('_')
                .and_then(|n| n.parse().ok())
                .unwrap_or(0);
            (timestamp.to_string(), suffix)
        }
        None => (rest.to_string(), 0),
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default()
}

fn is_latest_alias(path: &Path, prefix: &str) -> bool {
    path.file_stem()
        .is_some_and(|stem| stem.to_string_lossy() == prefix)
}

/// Removes latest aliases of `artifact_type` left behind by a save with a
/// different extension.
fn remove_stale_latest(latest_dir: &Path, artifact_type: ArtifactType, current: &Path) {
    let prefix = format!("{}_latest", artifact_type.as_str());
    let Ok(entries) = fs::read_dir(latest_dir) else {
        return;
    };
    for path in entries.filter_map(Result::ok).map(|entry| entry.path()) {
        if path != current && path.is_file() && is_latest_alias(&path, &prefix) {
            discard(&path, "Failed to remove stale latest alias");
        }
    }
}

/// Best-effort removal; failures are logged.
fn discard(path: &Path, message: &str) {
    if !path.exists() {
        return;
    }
    if let Err(err) = fs::remove_file(path) {
        warn!(path = %path.display(), error = %err, "{message}");
    }
}

/// Copies `source` to `dest` and checks the copy's digest. On failure `dest`
/// is removed.
fn copy_verified(source: &Path, dest: &Path, expected: &(String, u64)) -> Result<(), PipelineError> {
    let result = copy_preserving(source, dest).and_then(|()| {
        let written = digest_file(dest)?;
        if written.0 == expected.0 {
            Ok(())
        } else {
            Err(IoError::new("verifying", dest, "copy differs from source").into())
        }
    });
    if result.is_err() {
        discard(dest, "Failed to remove unverified copy");
    }
    result
}

/// Writes the latest alias through a temporary file and a rename.
fn write_latest(
    source: &Path,
    latest_path: &Path,
    expected: &(String, u64),
) -> Result<(), PipelineError> {
    let file_name = latest_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp_path = latest_path.with_file_name(format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4()));

    copy_verified(source, &tmp_path, expected)?;
    fs::rename(&tmp_path, latest_path).map_err(|e| {
        discard(&tmp_path, "Failed to remove temporary latest copy");
        IoError::new("replacing", latest_path, e).into()
    })
}

fn create_dir(path: &Path) -> Result<(), PipelineError> {
    fs::create_dir_all(path).map_err(|e| IoError::new("creating directory", path, e).into())
}

/// Picks `<stem><ext>`, or `<stem>_<n><ext>` when earlier saves in the same
/// second already claimed the name.
fn unique_path(dir: &Path, stem: &str, extension: &str) -> PathBuf {
    let candidate = dir.join(format!("{stem}{extension}"));
    if !candidate.exists() {
        return candidate;
    }

    let mut n = 1u32;
    loop {
        let candidate = dir.join(format!("{stem}_{n}{extension}"));
        if !candidate.exists() {
            debug!(path = %candidate.display(), "Timestamp collision, using suffixed name");
            return candidate;
        }
        n += 1;
    }
}

/// Copies content and permissions, then carries over the modification time.
fn copy_preserving(source: &Path, dest: &Path) -> Result<(), PipelineError> {
    fs::copy(source, dest).map_err(|e| IoError::new("copying", dest, e))?;

    let modified = fs::metadata(source)
        .and_then(|meta| meta.modified())
        .map_err(|e| IoError::new("reading metadata of", source, e))?;
    File::options()
        .write(true)
        .open(dest)
        .and_then(|file| file.set_modified(modified))
        .map_err(|e| IoError::new("setting modification time of", dest, e))?;
    Ok(())
}

/// Returns the hex SHA-256 and length of a file.
fn digest_file(path: &Path) -> Result<(String, u64), PipelineError> {
    let mut file = File::open(path).map_err(|e| IoError::new("opening", path, e))?;
    let mut hasher = Sha256::new();
    let len = io::copy(&mut file, &mut hasher).map_err(|e| IoError::new("hashing", path, e))?;
    Ok((hex::encode(hasher.finalize()), len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FixedClock;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn fixed_store(root: &Path) -> (ArtifactStore, FixedClock) {
        let clock = FixedClock::new(
            NaiveDate::from_ymd_opt(2024, 5, 17)
                .unwrap()
                .and_hms_opt(9, 15, 30)
                .unwrap(),
        );
        let store = ArtifactStore::with_clock(root.join("results"), Arc::new(clock.clone()));
        (store, clock)
    }

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_save_creates_versioned_and_latest_copies() {
        let tmp = TempDir::new().unwrap();
        let (store, _clock) = fixed_store(tmp.path());
        let source = write(tmp.path(), "model.json", r#"{"w":[1,2]}"#);

        let record = store.save(&source, ArtifactType::Model).unwrap();

        assert_eq!(
            record.versioned_path,
            tmp.path().join("results/model/model_20240517_091530.json")
        );
        assert_eq!(
            record.latest_path,
            tmp.path().join("results/latest/model_latest.json")
        );
        assert_eq!(fs::read(&record.versioned_path).unwrap(), fs::read(&source).unwrap());
        assert_eq!(fs::read(&record.latest_path).unwrap(), fs::read(&source).unwrap());
        assert_eq!(record.extension, ".json");
        assert_eq!(record.size_bytes, 11);
        assert_eq!(record.sha256.len(), 64);
    }

    #[test]
    fn test_second_save_supersedes_latest_only() {
        let tmp = TempDir::new().unwrap();
        let (store, clock) = fixed_store(tmp.path());
        let source = write(tmp.path(), "metrics.json", "first");

        let first = store.save(&source, ArtifactType::Metrics).unwrap();

        fs::write(&source, "second").unwrap();
        clock.advance(chrono::Duration::seconds(5));
        let second = store.save(&source, ArtifactType::Metrics).unwrap();

        assert_ne!(first.versioned_path, second.versioned_path);
        assert_eq!(fs::read_to_string(&first.versioned_path).unwrap(), "first");
        assert_eq!(fs::read_to_string(&second.versioned_path).unwrap(), "second");
        assert_eq!(fs::read_to_string(&second.latest_path).unwrap(), "second");
        assert_eq!(store.versions(ArtifactType::Metrics).unwrap().len(), 2);
    }

    #[test]
    fn test_same_second_saves_do_not_overwrite() {
        let tmp = TempDir::new().unwrap();
        let (store, _clock) = fixed_store(tmp.path());
        let source = write(tmp.path(), "cm.csv", "a");

        let first = store.save(&source, ArtifactType::Plots).unwrap();
        fs::write(&source, "b").unwrap();
        let second = store.save(&source, ArtifactType::Plots).unwrap();

        assert_eq!(
            second.versioned_path.file_name().unwrap().to_string_lossy(),
            "plots_20240517_091530_1.csv"
        );
        assert_eq!(fs::read_to_string(&first.versioned_path).unwrap(), "a");
        assert_eq!(fs::read_to_string(&second.versioned_path).unwrap(), "b");
    }

    #[test]
    fn test_save_rejects_directory_source() {
        let tmp = TempDir::new().unwrap();
        let (store, _clock) = fixed_store(tmp.path());

        let err = store.save(tmp.path(), ArtifactType::Model).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InvalidSource(InvalidSourceError::NotAFile { .. })
        ));
    }

    #[test]
    fn test_save_rejects_missing_source() {
        let tmp = TempDir::new().unwrap();
        let (store, _clock) = fixed_store(tmp.path());

        let err = store
            .save(tmp.path().join("nope.json"), ArtifactType::Model)
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_source");
        assert!(!store.type_dir(ArtifactType::Model).exists());
    }

    #[test]
    fn test_failed_latest_copy_rolls_back_versioned_copy() {
        let tmp = TempDir::new().unwrap();
        let (store, _clock) = fixed_store(tmp.path());
        let source = write(tmp.path(), "model.json", "{}");

        // A directory squatting on the latest alias makes the rename fail.
        fs::create_dir_all(store.latest_dir().join("model_latest.json/blocker")).unwrap();

        let err = store.save(&source, ArtifactType::Model).unwrap_err();
        assert_eq!(err.kind(), "io");
        assert!(store.versions(ArtifactType::Model).unwrap().is_empty());

        let leftovers: Vec<_> = fs::read_dir(store.latest_dir())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_failed_verification_leaves_previous_state() {
        let tmp = TempDir::new().unwrap();
        let (store, clock) = fixed_store(tmp.path());
        let source = write(tmp.path(), "cm.csv", "first");
        let first = store.save(&source, ArtifactType::Plots).unwrap();

        fs::write(&source, "second").unwrap();
        clock.advance(chrono::Duration::seconds(1));
        let wrong = ("0".repeat(64), 6);
        let err = store
            .write_copies(&source, ArtifactType::Plots, &wrong)
            .unwrap_err();

        assert_eq!(err.kind(), "io");
        assert_eq!(
            store.versions(ArtifactType::Plots).unwrap(),
            vec![first.versioned_path]
        );
        assert_eq!(fs::read_to_string(&first.latest_path).unwrap(), "first");
        let leftovers = fs::read_dir(store.latest_dir())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_versions_order_numeric_suffixes() {
        let tmp = TempDir::new().unwrap();
        let (store, clock) = fixed_store(tmp.path());
        let source = write(tmp.path(), "metrics.json", "{}");

        for _ in 0..12 {
            store.save(&source, ArtifactType::Metrics).unwrap();
        }
        clock.advance(chrono::Duration::seconds(1));
        store.save(&source, ArtifactType::Metrics).unwrap();

        let names: Vec<String> = store
            .versions(ArtifactType::Metrics)
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 13);
        assert_eq!(names[0], "metrics_20240517_091530.json");
        assert_eq!(names[2], "metrics_20240517_091530_2.json");
        assert_eq!(names[10], "metrics_20240517_091530_10.json");
        assert_eq!(names[11], "metrics_20240517_091530_11.json");
        assert_eq!(names[12], "metrics_20240517_091531.json");
    }

    #[test]
    fn test_latest_follows_extension_change() {
        let tmp = TempDir::new().unwrap();
        let (store, clock) = fixed_store(tmp.path());
        let json = write(tmp.path(), "model.json", "{}");
        let csv = write(tmp.path(), "model.csv", "a,b");

        store.save(&json, ArtifactType::Model).unwrap();
        clock.advance(chrono::Duration::seconds(1));
        let second = store.save(&csv, ArtifactType::Model).unwrap();

        assert_eq!(store.latest(ArtifactType::Model), Some(second.latest_path));
        assert!(!store.latest_dir().join("model_latest.json").exists());
    }

    #[test]
    fn test_save_preserves_modification_time() {
        let tmp = TempDir::new().unwrap();
        let (store, _clock) = fixed_store(tmp.path());
        let source = write(tmp.path(), "model.json", "{}");
        let past = std::time::SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_600_000_000);
        File::options()
            .write(true)
            .open(&source)
            .unwrap()
            .set_modified(past)
            .unwrap();

        let record = store.save(&source, ArtifactType::Model).unwrap();

        let copied = fs::metadata(&record.versioned_path).unwrap().modified().unwrap();
        assert_eq!(copied, past);
        let latest = fs::metadata(&record.latest_path).unwrap().modified().unwrap();
        assert_eq!(latest, past);
    }

    #[test]
    fn test_latest_lookup_and_extensionless_source() {
        let tmp = TempDir::new().unwrap();
        let (store, _clock) = fixed_store(tmp.path());
        assert!(store.latest(ArtifactType::Model).is_none());

        let source = write(tmp.path(), "MODEL", "bin");
        let record = store.save(&source, ArtifactType::Model).unwrap();

        assert_eq!(record.extension, "");
        assert_eq!(store.latest(ArtifactType::Model), Some(record.latest_path));
    }
}
