//! The caller-facing operations: sort, preview, undo, and log listing.

use crate::classifier::Classifier;
use crate::config::{ScanFilter, SortConfig};
use crate::error::{SortError, SortResult};
use crate::mover::{self, PlannedMove, SortReport};
use crate::session_log::{FileMoveRecord, SessionLogStore};
use crate::undo::{self, UndoOutcome};
use std::path::Path;

/// Sorting engine bound to one classifier and one session log.
///
/// Every operation is synchronous. Front ends that must stay responsive should run a whole
/// call on a worker thread.
pub struct Sorter {
    classifier: Classifier,
    store: SessionLogStore,
    filter: ScanFilter,
}

impl Sorter {
    pub fn new(classifier: Classifier, store: SessionLogStore) -> Self {
        Self {
            classifier,
            store,
            filter: ScanFilter::default(),
        }
    }

    /// Restricts which files the walk picks up.
    pub fn with_filter(mut self, filter: ScanFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn store(&self) -> &SessionLogStore {
        &self.store
    }

    /// Sorts `root` as a new session.
    ///
    /// # Errors
    ///
    /// `SortError::Config` if `root` is not a usable directory (nothing is touched);
    /// `SortError::LogStore` if a move could not be logged (earlier moves stay logged).
    pub fn run_sort(&mut self, root: &Path, config: &SortConfig) -> SortResult<SortReport> {
        self.run_sort_with_progress(root, config, |_, _, _| {})
    }

    /// Like [`Sorter::run_sort`], calling `on_progress(position, total, item)` once per
    /// planned file.
    pub fn run_sort_with_progress<F>(
        &mut self,
        root: &Path,
        config: &SortConfig,
        on_progress: F,
    ) -> SortResult<SortReport>
    where
        F: FnMut(usize, usize, &PlannedMove),
    {
        let root = mover::validate_root(root)?;
        let planned = self.plan(&root, config);
        mover::execute(&root, &planned, config.collision, &mut self.store, on_progress)
            .map_err(SortError::from)
    }

    /// Where every file under `root` would go. Changes nothing.
    pub fn preview_sort(&self, root: &Path, config: &SortConfig) -> SortResult<Vec<PlannedMove>> {
        let root = mover::validate_root(root)?;
        Ok(self.plan(&root, config))
    }

    /// Reverts the most recent session.
    pub fn undo_latest(&self) -> SortResult<UndoOutcome> {
        Ok(undo::undo_latest(&self.store)?)
    }

    /// Latest log entries across sessions, newest first.
    pub fn recent_log_entries(&self, limit: usize) -> SortResult<Vec<FileMoveRecord>> {
        Ok(self.store.recent(limit)?)
    }

    fn plan(&self, root: &Path, config: &SortConfig) -> Vec<PlannedMove> {
        let scratch = self.store.scratch_path();
        mover::plan(
            root,
            &self.classifier,
            config,
            &self.filter,
            &[self.store.path(), scratch.as_path()],
        )
    }
}
