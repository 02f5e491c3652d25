//! Rotated file discovery and retention
//!
//! Rotated files are found by scanning the active file's directory, never tracked
//! separately. After each rotation the files over the count limit or older than the
//! age limit are deleted. One failed deletion never stops the others.

use std::cmp::Reverse;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, info};

use super::compress::COMPRESSED_SUFFIX;
use super::naming::FileNaming;
use super::RotationPolicy;
use crate::error::WriterError;

/// A rotated log file found on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotatedFile {
    /// Full path to the rotated file
    pub path: PathBuf,
    /// Last modification time
    pub modified: SystemTime,
    /// Whether the file is gzip-compressed
    pub compressed: bool,
}

/// List the rotated files of an active file, newest first
///
/// Files are ordered by modification time; equal times fall back to the
/// timestamp and suffix embedded in the name. A missing directory yields no files.
pub fn discover_rotated_files(naming: &FileNaming) -> io::Result<Vec<RotatedFile>> {
    if !naming.dir().exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(naming.dir())? {
        let Ok(entry) = entry else {
            continue;
        };
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if !naming.is_rotated_name(&name) {
            continue;
        }
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }
        let Ok(modified) = metadata.modified() else {
            continue;
        };

        files.push((
            naming.order_key(&name),
            RotatedFile {
                path: entry.path(),
                modified,
                compressed: name.ends_with(COMPRESSED_SUFFIX),
            },
        ));
    }

    files.sort_by_key(|(key, file)| Reverse((file.modified, key.clone())));
    Ok(files.into_iter().map(|(_, file)| file).collect())
}

/// Pick the files to delete from a newest-first listing
///
/// With `max_file_count = K` the active file takes one slot, so only the `K - 1`
/// newest rotated files survive. With `max_age`, anything modified before
/// `now - max_age` goes regardless of its position.
pub fn select_for_deletion(
    files: &[RotatedFile],
    policy: &RotationPolicy,
    now: SystemTime,
) -> Vec<PathBuf> {
    let keep = policy.max_file_count.map(|count| count.saturating_sub(1));
    let cutoff = policy.max_age.and_then(|age| now.checked_sub(age));

    files
        .iter()
        .enumerate()
        .filter(|(index, file)| {
            let over_count = keep.is_some_and(|keep| *index >= keep);
            let too_old = cutoff.is_some_and(|cutoff| file.modified < cutoff);
            over_count || too_old
        })
        .map(|(_, file)| file.path.clone())
        .collect()
}

/// Delete rotated files that violate the policy's retention limits
///
/// Each failed deletion is passed to `on_error` and skipped. Returns the number of
/// files deleted; only a failure to scan the directory is returned as an error.
pub fn apply_retention<F>(
    naming: &FileNaming,
    policy: &RotationPolicy,
    now: SystemTime,
    on_error: F,
) -> io::Result<usize>
where
    F: FnMut(&Path, WriterError),
{
    if !policy.retains() {
        return Ok(0);
    }

    let files = discover_rotated_files(naming)?;
    let doomed = select_for_deletion(&files, policy, now);
    debug!(
        rotated = files.len(),
        deleting = doomed.len(),
        "applying retention"
    );

    Ok(delete_files(doomed, on_error))
}

/// Delete each path, reporting failures without stopping
pub(crate) fn delete_files<F>(paths: Vec<PathBuf>, mut on_error: F) -> usize
where
    F: FnMut(&Path, WriterError),
{
    let mut deleted_count = 0;
    for path in paths {
        match fs::remove_file(&path) {
            Ok(()) => {
                info!("deleting {}", path.display());
                deleted_count += 1;
            }
            Err(source) => on_error(
                &path,
                WriterError::Delete {
                    path: path.clone(),
                    source,
                },
            ),
        }
    }
    deleted_count
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::TempDir;

    fn rotated(name: &str, age_secs: u64, now: SystemTime) -> RotatedFile {
        RotatedFile {
            path: PathBuf::from(name),
            modified: now - Duration::from_secs(age_secs),
            compressed: name.ends_with(".gz"),
        }
    }

    fn touch(path: &Path, modified: SystemTime) {
        let file = File::create(path).unwrap();
        file.set_modified(modified).unwrap();
    }

    #[test]
    fn test_select_by_count_keeps_newest() {
        let now = SystemTime::now();
        let files = vec![
            rotated("a", 10, now),
            rotated("b", 20, now),
            rotated("c", 30, now),
            rotated("d", 40, now),
        ];
        let policy = RotationPolicy::default().with_max_file_count(3);

        let doomed = select_for_deletion(&files, &policy, now);
        assert_eq!(doomed, vec![PathBuf::from("c"), PathBuf::from("d")]);
    }

    #[test]
    fn test_select_by_age() {
        let now = SystemTime::now();
        let files = vec![rotated("new", 60, now), rotated("old", 7200, now)];
        let policy = RotationPolicy::default().with_max_age(Duration::from_secs(3600));

        let doomed = select_for_deletion(&files, &policy, now);
        assert_eq!(doomed, vec![PathBuf::from("old")]);
    }

    #[test]
    fn test_select_is_union_of_limits() {
        let now = SystemTime::now();
        let files = vec![
            rotated("a", 10, now),
            rotated("b", 9000, now),
            rotated("c", 20, now),
        ];
        let policy = RotationPolicy::default()
            .with_max_file_count(3)
            .with_max_age(Duration::from_secs(3600));

        let doomed = select_for_deletion(&files, &policy, now);
        assert_eq!(doomed, vec![PathBuf::from("b"), PathBuf::from("c")]);
    }

    #[test]
    fn test_select_without_limits_keeps_all() {
        let now = SystemTime::now();
        let files = vec![rotated("a", 10, now), rotated("b", 1_000_000, now)];
        assert!(select_for_deletion(&files, &RotationPolicy::default(), now).is_empty());
    }

    #[test]
    fn test_discover_nonexistent_dir() {
        let naming = FileNaming::new("/nonexistent/path/for/testing/app.log");
        assert!(discover_rotated_files(&naming).unwrap().is_empty());
    }

    #[test]
    fn test_discover_ignores_foreign_files() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        let naming = FileNaming::new(dir.join("app.log"));

        File::create(dir.join("app.log"))
            .unwrap()
            .write_all(b"active")
            .unwrap();
        File::create(dir.join("other.2024-01-01_00-00-00.log")).unwrap();
        File::create(dir.join("app.notes.txt")).unwrap();
        File::create(dir.join("app.archive.gz")).unwrap();
        File::create(dir.join("app.2024-01-01_00-00-00.log")).unwrap();
        File::create(dir.join("app.2024-01-02_00-00-00.log.gz")).unwrap();

        let files = discover_rotated_files(&naming).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|f| f.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(files.len(), 2);
        assert!(names.contains(&"app.2024-01-01_00-00-00.log".to_string()));
        assert!(names.contains(&"app.2024-01-02_00-00-00.log.gz".to_string()));
        assert!(files.iter().any(|f| f.compressed));
    }

    #[test]
    fn test_discover_orders_newest_first_with_name_tiebreak() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        let naming = FileNaming::new(dir.join("app.log"));
        let same_time = SystemTime::now() - Duration::from_secs(60);

        touch(&dir.join("app.2024-01-01_00-00-00.log"), same_time);
        touch(&dir.join("app.2024-01-01_00-00-00_1.log"), same_time);
        touch(&dir.join("app.2024-01-01_00-00-00_2.log"), same_time);
        touch(
            &dir.join("app.2023-06-01_00-00-00.log"),
            same_time - Duration::from_secs(3600),
        );

        let files = discover_rotated_files(&naming).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|f| f.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec![
                "app.2024-01-01_00-00-00_2.log",
                "app.2024-01-01_00-00-00_1.log",
                "app.2024-01-01_00-00-00.log",
                "app.2023-06-01_00-00-00.log",
            ]
        );
    }

    #[test]
    fn test_apply_retention_deletes_and_keeps_active() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        let naming = FileNaming::new(dir.join("app.log"));
        let now = SystemTime::now();

        File::create(dir.join("app.log")).unwrap();
        touch(&dir.join("app.old.gz"), now - Duration::from_secs(3600));
        touch(
            &dir.join("app.2024-01-03_00-00-00.log"),
            now - Duration::from_secs(10),
        );
        touch(
            &dir.join("app.2024-01-02_00-00-00.log"),
            now - Duration::from_secs(20),
        );
        touch(
            &dir.join("app.2024-01-01_00-00-00.log"),
            now - Duration::from_secs(30),
        );

        let policy = RotationPolicy::default().with_max_file_count(2);
        let mut errors = Vec::new();
        let deleted = apply_retention(&naming, &policy, now, |path, _| {
            errors.push(path.to_path_buf())
        })
        .unwrap();

        assert_eq!(deleted, 2);
        assert!(errors.is_empty());
        assert!(dir.join("app.log").exists());
        assert!(dir.join("app.old.gz").exists());
        assert!(dir.join("app.2024-01-03_00-00-00.log").exists());
        assert!(!dir.join("app.2024-01-02_00-00-00.log").exists());
        assert!(!dir.join("app.2024-01-01_00-00-00.log").exists());
    }

    #[test]
    fn test_delete_files_reports_each_failure_and_continues() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        let first = dir.join("app.2024-01-01_00-00-00.log");
        let missing = dir.join("app.2024-01-02_00-00-00.log");
        let last = dir.join("app.2024-01-03_00-00-00.log");
        File::create(&first).unwrap();
        File::create(&last).unwrap();

        let mut failures = Vec::new();
        let deleted = delete_files(
            vec![first.clone(), missing.clone(), last.clone()],
            |path, error| failures.push((path.to_path_buf(), error)),
        );

        assert_eq!(deleted, 2);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, missing);
        assert!(matches!(failures[0].1, WriterError::Delete { .. }));
        assert!(!first.exists());
        assert!(!last.exists());
    }
}
