/// Moving files into their destination folders.
///
/// A sort is two passes. [`plan`] walks the tree and resolves where every file belongs,
/// dropping files that are already in place; [`execute`] performs the moves one by one and
/// logs each success. A file that can't be moved is reported and the run goes on.
use crate::classifier::Classifier;
use crate::config::{CollisionPolicy, ScanFilter, SortConfig};
use crate::destination;
use crate::error::{ConfigError, LogStoreFailure, MoveFailure};
use crate::session_log::{NewRecord, SessionLogStore};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

/// Where one file would go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedMove {
    pub filename: String,
    pub from: PathBuf,
    /// Full destination path, before any collision handling.
    pub to: PathBuf,
}

/// A move that happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovedFile {
    pub filename: String,
    pub from: PathBuf,
    pub to: PathBuf,
}

/// Outcome of a sort run.
#[derive(Debug)]
pub struct SortReport {
    pub session_id: Uuid,
    pub root: PathBuf,
    pub moved: Vec<MovedFile>,
    /// Files left in place because their destination was taken (`Skip` policy).
    pub skipped: Vec<(PathBuf, String)>,
    pub failures: Vec<MoveFailure>,
}

impl SortReport {
    fn new(session_id: Uuid, root: PathBuf) -> Self {
        Self {
            session_id,
            root,
            moved: Vec::new(),
            skipped: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn moved_count(&self) -> usize {
        self.moved.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failures.len()
    }

    pub fn is_complete_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Moved files per destination folder, relative to the root (e.g. `2024/05`).
    pub fn folder_counts(&self) -> BTreeMap<String, usize> {
        folder_counts(
            &self.root,
            self.moved.iter().map(|moved| moved.to.as_path()),
        )
    }
}

/// Counts paths by their parent folder relative to `root`.
pub fn folder_counts<'a>(
    root: &Path,
    paths: impl Iterator<Item = &'a Path>,
) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for path in paths {
        let folder = path
            .parent()
            .and_then(|parent| parent.strip_prefix(root).ok())
            .map(|rel| rel.to_string_lossy().into_owned())
            .unwrap_or_default();
        *counts.entry(folder).or_insert(0) += 1;
    }
    counts
}

/// Checks that `root` is an existing directory and returns its canonical form.
pub fn validate_root(root: &Path) -> Result<PathBuf, ConfigError> {
    let metadata = fs::metadata(root).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            ConfigError::RootNotFound(root.to_path_buf())
        } else {
            ConfigError::RootUnreadable {
                path: root.to_path_buf(),
                source,
            }
        }
    })?;
    if !metadata.is_dir() {
        return Err(ConfigError::RootNotDirectory(root.to_path_buf()));
    }
    fs::canonicalize(root).map_err(|source| ConfigError::RootUnreadable {
        path: root.to_path_buf(),
        source,
    })
}

/// Walks `root` and resolves a destination for every regular file.
///
/// `root` must already be canonical. Files listed in `exclude` (such as the session log)
/// and files rejected by `filter` are left out, as are files already at their destination.
/// Nothing on disk is changed.
pub fn plan(
    root: &Path,
    classifier: &Classifier,
    config: &SortConfig,
    filter: &ScanFilter,
    exclude: &[&Path],
) -> Vec<PlannedMove> {
    let mut planned = Vec::new();

    let entries = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry");
                None
            }
        });

    for entry in entries {
        if !entry.file_type().is_file() {
            continue;
        }
        let from = entry.path();
        if exclude.contains(&from) {
            continue;
        }
        let relative = from.strip_prefix(root).unwrap_or(from);
        if !filter.should_include(relative) {
            debug!(file = %relative.display(), "excluded by filter");
            continue;
        }

        let target_dir = destination::resolve(root, from, config.mode, |file| {
            classifier.classify(file, config)
        });
        let filename = entry.file_name().to_string_lossy().into_owned();
        let to = target_dir.join(entry.file_name());

        if to == from {
            debug!(file = %relative.display(), "already in place");
            continue;
        }

        planned.push(PlannedMove {
            filename,
            from: from.to_path_buf(),
            to,
        });
    }

    planned
}

/// Performs `planned` moves as one session, logging each success to `store`.
///
/// `on_progress(position, total, item)` is called once per planned file, before it is
/// processed; `position` counts from 1. Per-file failures are collected in the report. A
/// log failure stops the run: the file whose record could not be written is moved back, so
/// every file left moved is in the log.
pub fn execute<F>(
    root: &Path,
    planned: &[PlannedMove],
    collision: CollisionPolicy,
    store: &mut SessionLogStore,
    mut on_progress: F,
) -> Result<SortReport, LogStoreFailure>
where
    F: FnMut(usize, usize, &PlannedMove),
{
    let session_id = Uuid::new_v4();
    let mut report = SortReport::new(session_id, root.to_path_buf());
    info!(%session_id, root = %root.display(), files = planned.len(), "sort session started");

    for (index, item) in planned.iter().enumerate() {
        on_progress(index + 1, planned.len(), item);

        let to = match resolve_collision(&item.to, collision) {
            Some(to) => to,
            None => {
                debug!(file = %item.from.display(), "destination taken, skipping");
                report
                    .skipped
                    .push((item.from.clone(), format!("{} already exists", item.to.display())));
                continue;
            }
        };

        if let Err(failure) = move_file(&item.from, &to) {
            warn!(%failure, "move failed");
            report.failures.push(failure);
            continue;
        }

        let record = NewRecord {
            session_id,
            root: root.to_path_buf(),
            filename: item.filename.clone(),
            original_path: item.from.clone(),
            new_path: to.clone(),
        };
        if let Err(e) = store.append(record) {
            if let Err(failure) = move_file(&to, &item.from) {
                warn!(%failure, "could not roll back unlogged move");
            }
            return Err(e);
        }

        info!(from = %item.from.display(), to = %to.display(), "moved");
        report.moved.push(MovedFile {
            filename: item.filename.clone(),
            from: item.from.clone(),
            to,
        });
    }

    info!(
        %session_id,
        moved = report.moved_count(),
        failed = report.failed_count(),
        skipped = report.skipped.len(),
        "sort session finished"
    );
    Ok(report)
}

/// Final destination under `policy`, or `None` when the file should stay put.
fn resolve_collision(to: &Path, policy: CollisionPolicy) -> Option<PathBuf> {
    if fs::symlink_metadata(to).is_err() {
        return Some(to.to_path_buf());
    }
    match policy {
        CollisionPolicy::Overwrite => Some(to.to_path_buf()),
        CollisionPolicy::Rename => Some(unique_destination(to)),
        CollisionPolicy::Skip => None,
    }
}

/// First free `stem (N).ext` next to `candidate`.
fn unique_destination(candidate: &Path) -> PathBuf {
    let stem = candidate
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string());
    let ext = candidate
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    (1..)
        .map(|n| candidate.with_file_name(format!("{} ({}){}", stem, n, ext)))
        .find(|path| fs::symlink_metadata(path).is_err())
        .unwrap_or_else(|| candidate.to_path_buf())
}

/// Moves one file, creating the destination's parent directories.
///
/// Renames when possible and falls back to copy-then-remove across filesystems.
pub fn move_file(from: &Path, to: &Path) -> Result<(), MoveFailure> {
    let fail = |source| MoveFailure {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };

    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).map_err(fail)?;
    }

    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            debug!(from = %from.display(), "rename crosses devices, copying");
            copy_then_remove(from, to).map_err(fail)
        }
        Err(e) => Err(fail(e)),
    }
}

/// Copies `from` to `to` keeping its modification time, then removes `from`.
///
/// Date mode places files by mtime, so the copy carries it over.
fn copy_then_remove(from: &Path, to: &Path) -> io::Result<()> {
    let modified = fs::metadata(from)?.modified()?;
    let copied = fs::copy(from, to).and_then(|_| {
        File::options()
            .write(true)
            .open(to)
            .and_then(|file| file.set_modified(modified))
    });
    if let Err(e) = copied {
        let _ = fs::remove_file(to);
        return Err(e);
    }
    fs::remove_file(from)
}
