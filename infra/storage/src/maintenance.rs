//! Startup self-healing: removes temp files orphaned by interrupted writes.
//!
//! Only files carrying the temp marker and older than [`STALE_AFTER`] are
//! touched. Folders are left alone, empty or not; a user folder is data.

use crate::engine::TMP_MARKER;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing::{error, info, warn};
use walkdir::{DirEntry, WalkDir};

/// Younger temp files may belong to a write still in flight in another process.
const STALE_AFTER: Duration = Duration::from_secs(300);

pub(crate) async fn purge_tmp(root: &Path) {
    let scan_root = root.to_path_buf();
    let scan = tokio::task::spawn_blocking(move || {
        remove_stale(&scan_root, SystemTime::now(), STALE_AFTER)
    });

    match scan.await {
        Ok((0, 0)) => {},
        Ok((removed, failed)) => {
            info!(root = %root.display(), removed, failed, "Purged stale temp files");
        },
        Err(err) => error!(root = %root.display(), error = %err, "Temp file purge did not complete"),
    }
}

fn remove_stale(root: &Path, now: SystemTime, threshold: Duration) -> (usize, usize) {
    let mut removed = 0;
    let mut failed = 0;

    for entry in WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .flatten()
        .filter(|e| is_tmp(e) && is_stale(e, now, threshold))
    {
        match std::fs::remove_file(entry.path()) {
            Ok(()) => removed += 1,
            Err(e) => {
                warn!(path = %entry.path().display(), error = %e, "Failed to remove stale temp file");
                failed += 1;
            },
        }
    }

    (removed, failed)
}

fn is_tmp(entry: &DirEntry) -> bool {
    entry.file_type().is_file()
        && entry.file_name().to_str().is_some_and(|name| name.contains(TMP_MARKER))
}

fn is_stale(entry: &DirEntry, now: SystemTime, threshold: Duration) -> bool {
    entry
        .metadata()
        .ok()
        .and_then(|m| m.modified().ok())
        .and_then(|modified| now.duration_since(modified).ok())
        .is_none_or(|age| age > threshold)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn only_stale_temp_files_are_removed() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        std::fs::create_dir_all(root.join("cats")).unwrap();
        std::fs::create_dir_all(root.join("empty")).unwrap();
        std::fs::write(root.join("cats/a.png"), b"a").unwrap();
        std::fs::write(root.join(format!("cats/a.png{TMP_MARKER}1.1")), b"partial").unwrap();

        let later = SystemTime::now() + Duration::from_secs(3_600);
        let (removed, failed) = remove_stale(root, later, STALE_AFTER);

        assert_eq!((removed, failed), (1, 0));
        assert!(root.join("cats/a.png").exists());
        assert!(root.join("empty").is_dir());
    }

    #[test]
    fn fresh_temp_files_survive() {
        let tmp = TempDir::new().unwrap();
        let partial = tmp.path().join(format!("b.png{TMP_MARKER}1.2"));
        std::fs::write(&partial, b"partial").unwrap();

        let (removed, _) = remove_stale(tmp.path(), SystemTime::now(), STALE_AFTER);

        assert_eq!(removed, 0);
        assert!(partial.exists());
    }
}
