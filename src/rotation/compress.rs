//! Gzip compression of rotated files

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;

/// Suffix appended to compressed rotated files
pub const COMPRESSED_SUFFIX: &str = ".gz";

/// `<path>.gz`
pub(crate) fn compressed_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(COMPRESSED_SUFFIX);
    PathBuf::from(name)
}

/// Gzip `path` into `<path>.gz` and remove the original
///
/// Returns the compressed path. On failure exactly one of the two files is left
/// behind: the original if compression did not complete, never both.
pub fn gzip_file(path: &Path) -> io::Result<PathBuf> {
    let target = compressed_path(path);

    if let Err(e) = write_compressed(path, &target) {
        let _ = fs::remove_file(&target);
        return Err(e);
    }

    if let Err(e) = fs::remove_file(path) {
        let _ = fs::remove_file(&target);
        return Err(e);
    }

    Ok(target)
}

fn write_compressed(source: &Path, target: &Path) -> io::Result<()> {
    let mut input = File::open(source)?;
    let modified = input.metadata().and_then(|m| m.modified()).ok();

    let output = File::create(target)?;
    let mut encoder = GzEncoder::new(BufWriter::new(output), Compression::default());
    io::copy(&mut input, &mut encoder)?;

    let mut writer = encoder.finish()?;
    writer.flush()?;
    let output = writer.into_inner().map_err(|e| e.into_error())?;
    output.sync_all()?;

    // Keep the rotation time so age-based retention sees the original file age
    if let Some(modified) = modified {
        let _ = output.set_modified(modified);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;
    use tempfile::TempDir;

    #[test]
    fn test_compressed_path() {
        assert_eq!(
            compressed_path(Path::new("/logs/app.2024-01-01_00-00-00.log")),
            PathBuf::from("/logs/app.2024-01-01_00-00-00.log.gz")
        );
    }

    #[test]
    fn test_gzip_file_replaces_original() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("app.2024-01-01_00-00-00.log");
        fs::write(&path, "line one\nline two\n").unwrap();

        let gz = gzip_file(&path).unwrap();
        assert!(!path.exists());
        assert!(gz.exists());

        let mut text = String::new();
        GzDecoder::new(File::open(&gz).unwrap())
            .read_to_string(&mut text)
            .unwrap();
        assert_eq!(text, "line one\nline two\n");
    }

    #[test]
    fn test_gzip_missing_file_leaves_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("missing.log");

        assert!(gzip_file(&path).is_err());
        assert!(!compressed_path(&path).exists());
    }
}
