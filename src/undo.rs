/// Reverting the most recent sort session.
///
/// Records are replayed newest first, so each file goes back before anything that was moved
/// earlier. Directories the files came out of are then pruned bottom-up while they are empty,
/// never climbing to or past the sort root.
use crate::error::{LogStoreFailure, MoveFailure, PruneFailure};
use crate::mover::move_file;
use crate::session_log::{FileMoveRecord, SessionLogStore};
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// What an undo did.
#[derive(Debug)]
pub struct UndoReport {
    pub session_id: Uuid,
    /// Number of files moved back.
    pub restored_files: usize,
    /// Records with nothing at their new location (already restored, or removed by hand).
    pub skipped_files: Vec<(PathBuf, String)>,
    /// Files that could not be moved back; their records stay in the log.
    pub failed_restores: Vec<MoveFailure>,
    /// Directories removed because the undo left them empty.
    pub pruned_dirs: Vec<PathBuf>,
    pub prune_failures: Vec<PruneFailure>,
    /// Whether the whole session was removed from the log.
    pub session_deleted: bool,
}

impl UndoReport {
    fn new(session_id: Uuid) -> Self {
        Self {
            session_id,
            restored_files: 0,
            skipped_files: Vec::new(),
            failed_restores: Vec::new(),
            pruned_dirs: Vec::new(),
            prune_failures: Vec::new(),
            session_deleted: false,
        }
    }

    /// Returns the total number of records processed.
    pub fn total_processed(&self) -> usize {
        self.restored_files + self.failed_restores.len() + self.skipped_files.len()
    }

    /// Returns true if every file went back and every emptied directory was removed.
    pub fn is_complete_success(&self) -> bool {
        self.failed_restores.is_empty() && self.prune_failures.is_empty()
    }
}

/// Result of asking for an undo.
#[derive(Debug)]
pub enum UndoOutcome {
    /// The log holds no session.
    NothingToUndo,
    Completed(UndoReport),
}

enum Restore {
    Restored,
    Missing,
}

/// Undoes the latest session in `store`.
///
/// # Errors
///
/// Only log store problems are errors. Per-file and per-directory problems are collected
/// in the report; records whose file could not be moved back are kept in the log so the
/// undo can be retried once the cause is fixed.
pub fn undo_latest(store: &SessionLogStore) -> Result<UndoOutcome, LogStoreFailure> {
    let Some(session_id) = store.latest_session()? else {
        info!("no sort session to undo");
        return Ok(UndoOutcome::NothingToUndo);
    };

    let records = store.records_for(session_id)?;
    info!(%session_id, records = records.len(), "undoing sort session");
    let mut report = UndoReport::new(session_id);

    let mut settled = Vec::with_capacity(records.len());
    let mut vacated: BTreeSet<(PathBuf, PathBuf)> = BTreeSet::new();

    for record in records.iter().rev() {
        match restore_file(record) {
            Ok(Restore::Restored) => {
                debug!(file = %record.original_path.display(), "restored");
                report.restored_files += 1;
                settled.push(record.seq);
                if let Some(dir) = record.new_path.parent() {
                    vacated.insert((dir.to_path_buf(), record.root.clone()));
                }
            }
            Ok(Restore::Missing) => {
                debug!(file = %record.new_path.display(), "nothing to restore");
                report.skipped_files.push((
                    record.new_path.clone(),
                    "File not found at expected location".to_string(),
                ));
                settled.push(record.seq);
                if let Some(dir) = record.new_path.parent() {
                    vacated.insert((dir.to_path_buf(), record.root.clone()));
                }
            }
            Err(failure) => {
                warn!(%failure, "restore failed");
                report.failed_restores.push(failure);
            }
        }
    }

    // Deepest directories first, so a parent is only checked once its children are gone.
    let mut dirs: Vec<_> = vacated.into_iter().collect();
    dirs.sort_by_key(|(dir, _)| std::cmp::Reverse(dir.components().count()));
    for (dir, root) in &dirs {
        prune_empty_ancestors(dir, root, &mut report);
    }

    if report.failed_restores.is_empty() {
        store.delete_session(session_id)?;
        report.session_deleted = true;
    } else {
        store.remove_records(session_id, &settled)?;
    }

    info!(
        %session_id,
        restored = report.restored_files,
        skipped = report.skipped_files.len(),
        failed = report.failed_restores.len(),
        pruned = report.pruned_dirs.len(),
        "undo finished"
    );
    Ok(UndoOutcome::Completed(report))
}

/// Moves one file back to where the record says it came from.
///
/// Never overwrites: an occupied original location is a failure.
fn restore_file(record: &FileMoveRecord) -> Result<Restore, MoveFailure> {
    if fs::symlink_metadata(&record.new_path).is_err() {
        return Ok(Restore::Missing);
    }

    if fs::symlink_metadata(&record.original_path).is_ok() {
        return Err(MoveFailure {
            from: record.new_path.clone(),
            to: record.original_path.clone(),
            source: io::Error::new(
                io::ErrorKind::AlreadyExists,
                "original location is occupied",
            ),
        });
    }

    move_file(&record.new_path, &record.original_path)?;
    Ok(Restore::Restored)
}

/// Removes `dir` and then its ancestors while they are empty, stopping below `root`.
fn prune_empty_ancestors(dir: &Path, root: &Path, report: &mut UndoReport) {
    let mut current = dir.to_path_buf();

    loop {
        if current == root || !current.starts_with(root) || current.parent().is_none() {
            return;
        }

        match fs::read_dir(&current) {
            Ok(mut entries) => {
                if entries.next().is_some() {
                    return;
                }
            }
            // Already gone, e.g. pruned through another record: keep climbing.
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(source) => {
                warn!(dir = %current.display(), error = %source, "cannot inspect directory");
                report.prune_failures.push(PruneFailure {
                    path: current,
                    source,
                });
                return;
            }
        }

        if current.exists() {
            if let Err(source) = fs::remove_dir(&current) {
                warn!(dir = %current.display(), error = %source, "cannot remove empty directory");
                report.prune_failures.push(PruneFailure {
                    path: current,
                    source,
                });
                return;
            }
            debug!(dir = %current.display(), "pruned");
            report.pruned_dirs.push(current.clone());
        }

        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session_log::NewRecord;
    use tempfile::TempDir;

    struct Setup {
        root_dir: TempDir,
        _log_dir: TempDir,
        store: SessionLogStore,
    }

    impl Setup {
        fn new() -> Self {
            let root_dir = TempDir::new().expect("Failed to create temp directory");
            let log_dir = TempDir::new().expect("Failed to create temp directory");
            let store = SessionLogStore::open(log_dir.path().join("log.jsonl"))
                .expect("Failed to open store");
            Self {
                root_dir,
                _log_dir: log_dir,
                store,
            }
        }

        fn root(&self) -> PathBuf {
            fs::canonicalize(self.root_dir.path()).unwrap()
        }

        /// Moves `rel_from` to `rel_to` and logs it under `session`.
        fn moved(&mut self, session: Uuid, rel_from: &str, rel_to: &str) {
            let root = self.root();
            let from = root.join(rel_from);
            let to = root.join(rel_to);
            if let Some(parent) = from.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(&from, rel_from).unwrap();
            move_file(&from, &to).unwrap();
            self.store
                .append(NewRecord {
                    session_id: session,
                    root: root.clone(),
                    filename: to.file_name().unwrap().to_string_lossy().into_owned(),
                    original_path: from,
                    new_path: to,
                })
                .unwrap();
        }
    }

    fn completed(outcome: UndoOutcome) -> UndoReport {
        match outcome {
            UndoOutcome::Completed(report) => report,
            UndoOutcome::NothingToUndo => panic!("expected a completed undo"),
        }
    }

    #[test]
    fn test_undo_no_history() {
        let setup = Setup::new();
        let outcome = undo_latest(&setup.store).expect("Undo failed");
        assert!(matches!(outcome, UndoOutcome::NothingToUndo));
    }

    #[test]
    fn test_undo_single_file() {
        let mut setup = Setup::new();
        let session = Uuid::new_v4();
        setup.moved(session, "test.txt", "Documents/test.txt");

        let report = completed(undo_latest(&setup.store).expect("Undo failed"));

        let root = setup.root();
        assert_eq!(report.restored_files, 1);
        assert!(report.is_complete_success());
        assert!(report.session_deleted);
        assert!(root.join("test.txt").exists());
        assert!(!root.join("Documents").exists());
        assert_eq!(setup.store.latest_session().unwrap(), None);
    }

    #[test]
    fn test_undo_only_latest_session() {
        let mut setup = Setup::new();
        let older = Uuid::new_v4();
        let newer = Uuid::new_v4();
        setup.moved(older, "a.pdf", "Documents/a.pdf");
        setup.moved(newer, "b.jpg", "Images/b.jpg");

        let report = completed(undo_latest(&setup.store).unwrap());
        assert_eq!(report.session_id, newer);

        let root = setup.root();
        assert!(root.join("b.jpg").exists());
        assert!(root.join("Documents").join("a.pdf").exists());
        assert_eq!(setup.store.latest_session().unwrap(), Some(older));
    }

    #[test]
    fn test_prunes_nested_date_folders() {
        let mut setup = Setup::new();
        let session = Uuid::new_v4();
        setup.moved(session, "old.txt", "2023/03/old.txt");
        setup.moved(session, "older.txt", "2022/11/older.txt");

        let report = completed(undo_latest(&setup.store).unwrap());

        let root = setup.root();
        assert_eq!(report.restored_files, 2);
        assert!(!root.join("2023").exists());
        assert!(!root.join("2022").exists());
        assert_eq!(report.pruned_dirs.len(), 4);
        assert!(root.exists());
    }

    #[test]
    fn test_prune_stops_at_non_empty_directory() {
        let mut setup = Setup::new();
        let root = setup.root();
        fs::create_dir_all(root.join("Documents")).unwrap();
        fs::write(root.join("Documents").join("keep.pdf"), "keep").unwrap();

        let session = Uuid::new_v4();
        setup.moved(session, "a.pdf", "Documents/a.pdf");

        completed(undo_latest(&setup.store).unwrap());
        assert!(root.join("Documents").join("keep.pdf").exists());
        assert!(root.join("a.pdf").exists());
    }

    #[test]
    fn test_undo_recreates_source_directories() {
        let mut setup = Setup::new();
        let session = Uuid::new_v4();
        setup.moved(session, "inbox/deep/a.pdf", "Documents/a.pdf");
        let root = setup.root();
        fs::remove_dir_all(root.join("inbox")).unwrap();

        completed(undo_latest(&setup.store).unwrap());
        assert!(root.join("inbox").join("deep").join("a.pdf").exists());
    }

    #[test]
    fn test_undo_with_missing_file() {
        let mut setup = Setup::new();
        let session = Uuid::new_v4();
        setup.moved(session, "gone.txt", "Documents/gone.txt");
        setup.moved(session, "here.txt", "Documents/here.txt");
        let root = setup.root();
        fs::remove_file(root.join("Documents").join("gone.txt")).unwrap();

        let report = completed(undo_latest(&setup.store).unwrap());
        assert_eq!(report.restored_files, 1);
        assert_eq!(report.skipped_files.len(), 1);
        assert!(report.session_deleted);
        assert!(!root.join("Documents").exists());
    }

    #[test]
    fn test_undo_with_occupied_original_keeps_record() {
        let mut setup = Setup::new();
        let session = Uuid::new_v4();
        setup.moved(session, "test.txt", "Documents/test.txt");
        setup.moved(session, "other.txt", "Documents/other.txt");
        let root = setup.root();
        fs::write(root.join("test.txt"), "new content").unwrap();

        let report = completed(undo_latest(&setup.store).unwrap());
        assert_eq!(report.restored_files, 1);
        assert_eq!(report.failed_restores.len(), 1);
        assert!(!report.session_deleted);
        assert_eq!(
            fs::read_to_string(root.join("test.txt")).unwrap(),
            "new content"
        );
        assert!(root.join("Documents").join("test.txt").exists());

        let left = setup.store.records_for(session).unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].filename, "test.txt");

        // Clearing the obstacle lets a second undo finish the job.
        fs::remove_file(root.join("test.txt")).unwrap();
        let retry = completed(undo_latest(&setup.store).unwrap());
        assert_eq!(retry.restored_files, 1);
        assert!(retry.session_deleted);
        assert!(!root.join("Documents").exists());
    }

    #[test]
    fn test_undo_is_idempotent_after_crash() {
        let mut setup = Setup::new();
        let session = Uuid::new_v4();
        setup.moved(session, "a.pdf", "Documents/a.pdf");
        let root = setup.root();

        // Simulate a crash after the file went back but before the log was cleaned.
        move_file(&root.join("Documents").join("a.pdf"), &root.join("a.pdf")).unwrap();

        let report = completed(undo_latest(&setup.store).unwrap());
        assert_eq!(report.restored_files, 0);
        assert_eq!(report.skipped_files.len(), 1);
        assert!(report.session_deleted);
        assert!(root.join("a.pdf").exists());
        assert!(!root.join("Documents").exists());
    }

    #[test]
    fn test_prune_never_removes_root() {
        let setup = Setup::new();
        let root = setup.root();
        let mut report = UndoReport::new(Uuid::new_v4());

        prune_empty_ancestors(&root, &root, &mut report);
        assert!(root.exists());
        assert!(report.pruned_dirs.is_empty());

        let outside = TempDir::new().unwrap();
        let outside_path = fs::canonicalize(outside.path()).unwrap();
        prune_empty_ancestors(&outside_path, &root, &mut report);
        assert!(outside_path.exists());
    }
}
