//! Computing the folder a file belongs in.

use crate::config::SortMode;
use chrono::{DateTime, Datelike, Local};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Target directory for `file` under `root`.
///
/// Category mode puts the file in `root/<category>`. Date mode puts it in
/// `root/<year>/<month>` using the local-time modification date; when that date can't be
/// read, the file gets its category folder instead.
///
/// # Examples
///
/// ```
/// use smartsort::config::SortMode;
/// use smartsort::destination::resolve;
/// use std::path::Path;
///
/// let target = resolve(
///     Path::new("/data"),
///     Path::new("/data/inbox/report.pdf"),
///     SortMode::Category,
///     |_| "Documents".to_string(),
/// );
/// assert_eq!(target, Path::new("/data/Documents"));
/// ```
pub fn resolve<F>(root: &Path, file: &Path, mode: SortMode, classify: F) -> PathBuf
where
    F: Fn(&Path) -> String,
{
    match mode {
        SortMode::Category => root.join(classify(file)),
        SortMode::Date => match modified_local(file) {
            Some(modified) => date_folder(root, &modified),
            None => {
                warn!(file = %file.display(), "modification time unavailable, sorting by category");
                root.join(classify(file))
            }
        },
    }
}

/// `root/YYYY/MM` for a timestamp.
pub fn date_folder(root: &Path, when: &DateTime<Local>) -> PathBuf {
    root.join(format!("{:04}", when.year()))
        .join(format!("{:02}", when.month()))
}

fn modified_local(file: &Path) -> Option<DateTime<Local>> {
    let modified = fs::metadata(file).and_then(|meta| meta.modified()).ok()?;
    Some(DateTime::<Local>::from(modified))
}
