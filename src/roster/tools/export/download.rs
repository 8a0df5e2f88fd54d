use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::{debug, info};

use crate::roster::tools::error::{Result, ToolError};
use crate::roster::tools::poll::{WaitError, await_condition};

/// Extension of a finished portal export.
pub const EXPORT_EXTENSION: &str = "xlsx";

/// Extensions browsers give a file while it is still being written.
const IN_PROGRESS_EXTENSIONS: &[&str] = &["crdownload", "part"];

const WRITE_PROBE: &str = ".roster-tools-write-probe";

/// Ensures the download directory exists and accepts new files, returning
/// its absolute path. Any failure is an environment error.
pub fn prepare_download_dir(dir: &Path) -> Result<PathBuf> {
    let unusable = |reason: String| ToolError::Environment {
        path: dir.to_path_buf(),
        reason,
    };

    if dir.exists() {
        if !dir.is_dir() {
            return Err(unusable("not a directory".into()));
        }
    } else {
        fs::create_dir_all(dir).map_err(|err| unusable(format!("cannot create: {err}")))?;
        info!(dir = %dir.display(), "created download directory");
    }

    let probe = dir.join(WRITE_PROBE);
    fs::write(&probe, b"").map_err(|err| unusable(format!("not writable: {err}")))?;
    fs::remove_file(&probe).map_err(|err| unusable(format!("not writable: {err}")))?;

    dir.canonicalize()
        .map_err(|err| unusable(format!("cannot resolve: {err}")))
}

/// Removes every file in `dir` so a stale export cannot satisfy the
/// completion check. Returns how many files were removed.
pub fn clear_download_dir(dir: &Path) -> Result<usize> {
    let mut removed = 0;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            fs::remove_file(entry.path())?;
            removed += 1;
        }
    }
    debug!(dir = %dir.display(), removed, "cleared download directory");
    Ok(removed)
}

/// Returns the newest finished export in `dir`, or `None` while nothing is
/// there yet or any file in the directory is still being downloaded.
pub fn find_completed_export(dir: &Path) -> io::Result<Option<PathBuf>> {
    let mut newest: Option<(SystemTime, PathBuf)> = None;

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let Some(extension) = path.extension().and_then(|ext| ext.to_str()) else {
            continue;
        };

        if IN_PROGRESS_EXTENSIONS.contains(&extension) {
            debug!(file = %path.display(), "download still in progress");
            return Ok(None);
        }
        if !extension.eq_ignore_ascii_case(EXPORT_EXTENSION) {
            continue;
        }

        let metadata = entry.metadata()?;
        let stamp = metadata.created().or_else(|_| metadata.modified())?;
        if newest.as_ref().is_none_or(|(best, _)| stamp >= *best) {
            newest = Some((stamp, path));
        }
    }

    Ok(newest.map(|(_, path)| path))
}

/// Polls `dir` until a finished export appears.
pub fn wait_for_export(dir: &Path, interval: Duration, timeout: Duration) -> Result<PathBuf> {
    match await_condition(interval, timeout, || find_completed_export(dir)) {
        Ok(path) => Ok(path),
        Err(WaitError::TimedOut(waited)) => Err(ToolError::DownloadTimeout {
            dir: dir.to_path_buf(),
            waited,
        }),
        Err(WaitError::Failed(err)) => Err(ToolError::Io(err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const FAST: Duration = Duration::from_millis(10);

    #[test]
    fn prepare_creates_missing_directory() {
        let root = tempdir().expect("temporary directory");
        let target = root.path().join("nested").join("downloads");

        let resolved = prepare_download_dir(&target).expect("directory prepared");
        assert!(resolved.is_absolute());
        assert!(target.is_dir());
        assert!(!target.join(WRITE_PROBE).exists());
    }

    #[test]
    fn prepare_rejects_plain_file() {
        let root = tempdir().expect("temporary directory");
        let target = root.path().join("downloads");
        fs::write(&target, b"not a dir").expect("file written");

        let err = prepare_download_dir(&target).expect_err("file is not a directory");
        assert!(matches!(err, ToolError::Environment { .. }));
    }

    #[test]
    fn clear_removes_files_only() {
        let root = tempdir().expect("temporary directory");
        fs::write(root.path().join("old.xlsx"), b"stale").expect("file written");
        fs::write(root.path().join("old.xlsx.crdownload"), b"stale").expect("file written");
        fs::create_dir(root.path().join("keep")).expect("dir created");

        assert_eq!(clear_download_dir(root.path()).expect("cleared"), 2);
        assert!(root.path().join("keep").is_dir());
    }

    #[test]
    fn finds_finished_export() {
        let root = tempdir().expect("temporary directory");
        fs::write(root.path().join("notes.txt"), b"ignored").expect("file written");
        let export = root.path().join("roster.xlsx");
        fs::write(&export, b"data").expect("file written");

        let found = find_completed_export(root.path()).expect("listing");
        assert_eq!(found, Some(export));
    }

    #[test]
    fn in_progress_marker_blocks_completion() {
        let root = tempdir().expect("temporary directory");
        fs::write(root.path().join("roster.xlsx"), b"old").expect("file written");
        fs::write(root.path().join("roster (1).xlsx.crdownload"), b"partial")
            .expect("file written");

        assert_eq!(find_completed_export(root.path()).expect("listing"), None);
    }

    #[test]
    fn lingering_partial_download_times_out() {
        let root = tempdir().expect("temporary directory");
        fs::write(root.path().join("roster.xlsx.crdownload"), b"partial").expect("file written");

        let err = wait_for_export(root.path(), FAST, Duration::from_millis(80))
            .expect_err("never completes");
        match err {
            ToolError::DownloadTimeout { dir, waited } => {
                assert_eq!(dir, root.path());
                assert!(waited >= Duration::from_millis(80));
            }
            other => panic!("expected download timeout, got {other:?}"),
        }
    }

    #[test]
    fn waits_for_export_that_arrives_later() {
        let root = tempdir().expect("temporary directory");
        let dir = root.path().to_path_buf();
        let export = dir.join("roster.xlsx");
        let writer = {
            let export = export.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(50));
                fs::write(export, b"data").expect("file written");
            })
        };

        let found = wait_for_export(&dir, FAST, Duration::from_secs(5)).expect("export found");
        writer.join().expect("writer thread");
        assert_eq!(found, export);
    }
}
