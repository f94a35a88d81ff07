//! Output formatting and styling module.
//!
//! Everything the command-line front end shows the user goes through [`OutputFormatter`]:
//! status lines, the sort progress bar, and the tables printed after a sort, a preview, an
//! undo, or a log listing. Diagnostics go through `tracing` instead.

use crate::mover::{PlannedMove, SortReport};
use crate::session_log::FileMoveRecord;
use crate::undo::UndoReport;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use std::path::Path;

/// Manages all CLI output with consistent styling and formatting.
///
/// This struct provides methods for:
/// - Success messages (green with ✓)
/// - Error messages (red with ✗)
/// - Warning messages (yellow with ⚠)
/// - Progress bars for sort runs
/// - Summary tables per destination folder
pub struct OutputFormatter;

impl OutputFormatter {
    /// Turns colors off for the rest of the process.
    pub fn disable_colors() {
        colored::control::set_override(false);
    }

    /// Prints a success message in green with a checkmark.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use smartsort::output::OutputFormatter;
    /// OutputFormatter::success("Sorted 12 files");
    /// ```
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark, on stderr.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints a warning message in yellow with a warning symbol.
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    pub fn plain(message: &str) {
        println!("{}", message);
    }

    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Creates a progress bar for a sort run.
    ///
    /// The length may be set later with `set_length` once the number of files is known.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use smartsort::output::OutputFormatter;
    /// let pb = OutputFormatter::create_progress_bar(100);
    /// pb.inc(1);
    /// pb.finish_and_clear();
    /// ```
    pub fn create_progress_bar(total: u64) -> ProgressBar {
        let pb = ProgressBar::new(total);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░");
        pb.set_style(style);
        pb
    }

    /// Prints file counts per destination folder.
    ///
    /// # Arguments
    ///
    /// * `folder_counts` - Folder (relative to the sort root) to number of files
    /// * `total_files` - Total number of files moved or planned
    ///
    /// # Example
    ///
    /// ```no_run
    /// use smartsort::output::OutputFormatter;
    /// use std::collections::BTreeMap;
    ///
    /// let mut counts = BTreeMap::new();
    /// counts.insert("Documents".to_string(), 15);
    /// counts.insert("Images".to_string(), 8);
    /// OutputFormatter::summary_table(&counts, 23);
    /// ```
    pub fn summary_table(folder_counts: &BTreeMap<String, usize>, total_files: usize) {
        Self::header("SUMMARY");

        let width = folder_counts
            .keys()
            .map(|name| name.len())
            .max()
            .unwrap_or(0)
            .max("Folder".len());

        println!(
            "{:<width$} | {}",
            "Folder".bold(),
            "Files".bold(),
            width = width
        );
        println!("{}", "-".repeat(width + 10));

        for (folder, count) in folder_counts {
            println!(
                "{:<width$} | {} {}",
                folder,
                count.to_string().green(),
                plural(*count),
                width = width
            );
        }

        println!("{}", "-".repeat(width + 10));
        println!(
            "{:<width$} | {} {}",
            "Total".bold(),
            total_files.to_string().green().bold(),
            plural(total_files),
            width = width
        );
    }

    /// Prints a dry-run notice message.
    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }

    /// Lists what a preview found, then the per-folder table.
    pub fn planned_moves(root: &Path, planned: &[PlannedMove]) {
        if planned.is_empty() {
            Self::dry_run_notice("Nothing to move; every file is already in place.");
            return;
        }

        Self::dry_run_notice("Files would be moved as follows:");
        for item in planned {
            println!(
                " - {} {} {}",
                relative(root, &item.from),
                "→".cyan(),
                relative(root, &item.to)
            );
        }

        let counts = crate::mover::folder_counts(root, planned.iter().map(|p| p.to.as_path()));
        Self::summary_table(&counts, planned.len());
        Self::dry_run_notice("No files were modified.");
    }

    /// Reports a finished sort.
    pub fn sort_report(report: &SortReport) {
        for (path, reason) in &report.skipped {
            Self::warning(&format!("Skipped {}: {}", relative(&report.root, path), reason));
        }
        for failure in &report.failures {
            Self::error(&failure.to_string());
        }

        if report.moved_count() > 0 {
            Self::summary_table(&report.folder_counts(), report.moved_count());
        }

        if report.is_complete_success() {
            Self::success(&format!(
                "Sorted {} {} (session {})",
                report.moved_count(),
                plural(report.moved_count()),
                report.session_id
            ));
        } else {
            Self::warning(&format!(
                "Sorted {} {}, {} failed",
                report.moved_count(),
                plural(report.moved_count()),
                report.failed_count()
            ));
        }
    }

    /// Reports a finished undo.
    pub fn undo_report(report: &UndoReport) {
        Self::plain(&format!("  Restored: {}", report.restored_files));

        if !report.skipped_files.is_empty() {
            Self::plain(&format!("  Skipped: {}", report.skipped_files.len()));
            for (path, reason) in &report.skipped_files {
                Self::plain(&format!("    - {}: {}", path.display(), reason));
            }
        }

        if !report.pruned_dirs.is_empty() {
            Self::plain(&format!("  Removed folders: {}", report.pruned_dirs.len()));
        }

        if !report.failed_restores.is_empty() {
            Self::plain(&format!("  Failed: {}", report.failed_restores.len()));
            for failure in &report.failed_restores {
                Self::error(&format!("    {}", failure));
            }
        }
        for failure in &report.prune_failures {
            Self::warning(&failure.to_string());
        }

        if report.session_deleted {
            Self::success("Undo complete");
        } else {
            Self::warning("Some moves were not reverted and remain in the log; fix the errors above and run undo again.");
        }
    }

    /// Prints log entries as a table, in the order given.
    pub fn log_table(records: &[FileMoveRecord]) {
        if records.is_empty() {
            Self::info("The session log is empty.");
            return;
        }

        Self::header("SESSION LOG");
        for record in records {
            let session = record.session_id.simple().to_string();
            println!(
                "{:>5}  {}  {}  {} {} {}",
                record.seq,
                record.moved_at.format("%Y-%m-%d %H:%M:%S"),
                session[..8].dimmed(),
                record.original_path.display(),
                "→".cyan(),
                record.new_path.display()
            );
        }
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "file" } else { "files" }
}

fn relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plural() {
        assert_eq!(plural(0), "files");
        assert_eq!(plural(1), "file");
        assert_eq!(plural(2), "files");
    }

    #[test]
    fn test_relative_strips_root() {
        let root = Path::new("/data");
        assert_eq!(relative(root, Path::new("/data/Images/b.jpg")), "Images/b.jpg");
        assert_eq!(relative(root, Path::new("/elsewhere/c.txt")), "/elsewhere/c.txt");
    }

    #[test]
    fn test_progress_bar_length() {
        let pb = OutputFormatter::create_progress_bar(0);
        pb.set_length(3);
        pb.inc(2);
        assert_eq!(pb.length(), Some(3));
        assert_eq!(pb.position(), 2);
    }
}
