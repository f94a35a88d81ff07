//! Command-line interface for smartsort.
//!
//! Parses arguments with `clap`, merges them over the settings file, builds a [`Sorter`],
//! and prints results through [`OutputFormatter`].

use crate::category::CategoryRules;
use crate::classifier::{Classifier, ContentSniffer, FallbackClassifier, NoFallback};
use crate::config::{AppConfig, CollisionPolicy, SortConfig, SortMode};
use crate::engine::Sorter;
use crate::error::{ConfigError, SortResult};
use crate::output::OutputFormatter;
use crate::session_log::SessionLogStore;
use crate::undo::UndoOutcome;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Parser)]
#[command(name = "smartsort", version, about = "Sort a directory into category or date folders, with undo")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Settings file (default: ./.smartsortrc.toml, then ~/.config/smartsort/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Session log file, overriding the settings file
    #[arg(long, global = true, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Show debug diagnostics on stderr (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Move every file under DIR into its destination folder
    Sort {
        dir: PathBuf,
        #[command(flatten)]
        args: SortArgs,
        /// Show what would happen without moving anything
        #[arg(long)]
        dry_run: bool,
    },
    /// Show where every file under DIR would go
    Preview {
        dir: PathBuf,
        #[command(flatten)]
        args: SortArgs,
    },
    /// Revert the most recent sort
    Undo,
    /// List logged moves, newest first
    Log {
        #[arg(long, default_value_t = 100)]
        limit: usize,
    },
}

#[derive(Debug, Clone, Default, Args)]
pub struct SortArgs {
    /// Sort into YYYY/MM folders by modification time
    #[arg(long)]
    pub by_date: bool,

    /// Send this category's files to Others (repeatable)
    #[arg(long, value_name = "CATEGORY")]
    pub disable: Vec<String>,

    /// Enable only these categories (repeatable)
    #[arg(long, value_name = "CATEGORY")]
    pub only: Vec<String>,

    /// What to do when the destination name is taken
    #[arg(long, value_enum)]
    pub collision: Option<CollisionArg>,

    /// Classify by extension only, without reading file contents
    #[arg(long)]
    pub no_sniff: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CollisionArg {
    Overwrite,
    Rename,
    Skip,
}

impl From<CollisionArg> for CollisionPolicy {
    fn from(arg: CollisionArg) -> Self {
        match arg {
            CollisionArg::Overwrite => CollisionPolicy::Overwrite,
            CollisionArg::Rename => CollisionPolicy::Rename,
            CollisionArg::Skip => CollisionPolicy::Skip,
        }
    }
}

/// Runs a parsed command line.
///
/// Returns `Ok(false)` when the command ran but some files failed, so the caller can exit
/// non-zero.
pub fn run(cli: Cli) -> SortResult<bool> {
    if cli.no_color {
        OutputFormatter::disable_colors();
    }

    let app = AppConfig::load(cli.config.as_deref())?;
    let rules = app.category_rules()?;
    let log_path = cli.log_file.clone().unwrap_or_else(|| app.log_path());
    debug!(log = %log_path.display(), "using session log");

    match cli.command {
        Command::Sort { dir, args, dry_run } => {
            let (mut sorter, config) = prepare(&app, rules, &log_path, &args)?;
            if dry_run {
                preview(&sorter, &dir, &config)
            } else {
                sort(&mut sorter, &dir, &config)
            }
        }
        Command::Preview { dir, args } => {
            let (sorter, config) = prepare(&app, rules, &log_path, &args)?;
            preview(&sorter, &dir, &config)
        }
        Command::Undo => {
            let sorter = Sorter::new(
                Classifier::new(rules, Box::new(NoFallback)),
                SessionLogStore::open(&log_path)?,
            );
            undo(&sorter)
        }
        Command::Log { limit } => {
            let store = SessionLogStore::open(&log_path)?;
            OutputFormatter::log_table(&store.recent(limit)?);
            Ok(true)
        }
    }
}

fn prepare(
    app: &AppConfig,
    rules: CategoryRules,
    log_path: &Path,
    args: &SortArgs,
) -> SortResult<(Sorter, SortConfig)> {
    let config = build_sort_config(app, &rules, args)?;
    let fallback: Box<dyn FallbackClassifier> = if args.no_sniff {
        Box::new(NoFallback)
    } else {
        Box::new(ContentSniffer)
    };

    let sorter = Sorter::new(Classifier::new(rules, fallback), SessionLogStore::open(log_path)?)
        .with_filter(app.filters.compile()?);
    Ok((sorter, config))
}

/// Settings file values with command-line overrides applied.
pub fn build_sort_config(
    app: &AppConfig,
    rules: &CategoryRules,
    args: &SortArgs,
) -> Result<SortConfig, ConfigError> {
    let mut config = app.sort_config(rules);

    if args.by_date {
        config.mode = SortMode::Date;
    }
    if let Some(collision) = args.collision {
        config.collision = collision.into();
    }

    if !args.only.is_empty() {
        config.enabled_categories = args
            .only
            .iter()
            .map(|name| canonical_name(rules, name))
            .collect::<Result<BTreeSet<_>, _>>()?;
    }
    for name in &args.disable {
        let name = canonical_name(rules, name)?;
        config.disable(&name);
    }

    Ok(config)
}

fn canonical_name(rules: &CategoryRules, name: &str) -> Result<String, ConfigError> {
    rules
        .get(name)
        .map(|rule| rule.name.clone())
        .ok_or_else(|| ConfigError::UnknownCategory(name.to_string()))
}

fn sort(sorter: &mut Sorter, dir: &Path, config: &SortConfig) -> SortResult<bool> {
    OutputFormatter::info(&format!("Sorting contents of: {}", dir.display()));

    let pb = OutputFormatter::create_progress_bar(0);
    let result = sorter.run_sort_with_progress(dir, config, |position, total, item| {
        if position == 1 {
            pb.set_length(total as u64);
        }
        pb.set_message(item.filename.clone());
        pb.set_position(position as u64);
    });
    pb.finish_and_clear();

    let report = result?;
    OutputFormatter::sort_report(&report);
    if report.moved_count() > 0 {
        OutputFormatter::plain("Run 'smartsort undo' to revert these moves.");
    }
    Ok(report.is_complete_success())
}

fn preview(sorter: &Sorter, dir: &Path, config: &SortConfig) -> SortResult<bool> {
    OutputFormatter::dry_run_notice(&format!("Analyzing contents of: {}", dir.display()));
    let planned = sorter.preview_sort(dir, config)?;
    let root = crate::mover::validate_root(dir)?;
    OutputFormatter::planned_moves(&root, &planned);
    Ok(true)
}

fn undo(sorter: &Sorter) -> SortResult<bool> {
    OutputFormatter::info("Undoing the most recent sort...");
    match sorter.undo_latest()? {
        UndoOutcome::NothingToUndo => {
            OutputFormatter::info("Nothing to undo.");
            Ok(true)
        }
        UndoOutcome::Completed(report) => {
            OutputFormatter::undo_report(&report);
            Ok(report.is_complete_success())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sort_args(cmdline: &[&str]) -> SortArgs {
        match Cli::try_parse_from(cmdline).unwrap().command {
            Command::Sort { args, .. } | Command::Preview { args, .. } => args,
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_sort_flags() {
        let cli = Cli::try_parse_from([
            "smartsort",
            "--log-file",
            "/tmp/log.jsonl",
            "sort",
            "/data",
            "--by-date",
            "--disable",
            "images",
            "--collision",
            "skip",
            "--dry-run",
        ])
        .unwrap();

        assert_eq!(cli.log_file, Some(PathBuf::from("/tmp/log.jsonl")));
        match cli.command {
            Command::Sort { dir, args, dry_run } => {
                assert_eq!(dir, PathBuf::from("/data"));
                assert!(dry_run);
                assert!(args.by_date);
                assert_eq!(args.disable, vec!["images"]);
                assert_eq!(args.collision, Some(CollisionArg::Skip));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_log_default_limit() {
        let cli = Cli::try_parse_from(["smartsort", "log"]).unwrap();
        assert!(matches!(cli.command, Command::Log { limit: 100 }));
    }

    #[test]
    fn test_invalid_collision_rejected() {
        assert!(Cli::try_parse_from(["smartsort", "sort", "/data", "--collision", "merge"]).is_err());
    }

    #[test]
    fn test_flags_override_settings() {
        let app = AppConfig::from_toml("[sort]\nmode = \"category\"\ncollision = \"overwrite\"\n")
            .unwrap();
        let rules = app.category_rules().unwrap();
        let args = sort_args(&["smartsort", "preview", "/data", "--by-date", "--collision", "rename"]);

        let config = build_sort_config(&app, &rules, &args).unwrap();
        assert_eq!(config.mode, SortMode::Date);
        assert_eq!(config.collision, CollisionPolicy::Rename);
    }

    #[test]
    fn test_only_and_disable() {
        let app = AppConfig::default();
        let rules = app.category_rules().unwrap();

        let args = sort_args(&["smartsort", "sort", "/data", "--only", "images", "--only", "Code"]);
        let config = build_sort_config(&app, &rules, &args).unwrap();
        let enabled: Vec<_> = config.enabled_categories.iter().cloned().collect();
        assert_eq!(enabled, vec!["Code", "Images"]);

        let args = sort_args(&["smartsort", "sort", "/data", "--disable", "AUDIO"]);
        let config = build_sort_config(&app, &rules, &args).unwrap();
        assert!(!config.is_enabled("Audio"));
        assert!(config.is_enabled("Videos"));
    }

    #[test]
    fn test_unknown_category_is_error() {
        let app = AppConfig::default();
        let rules = app.category_rules().unwrap();
        let args = sort_args(&["smartsort", "sort", "/data", "--disable", "Spreadsheets"]);

        assert!(matches!(
            build_sort_config(&app, &rules, &args),
            Err(ConfigError::UnknownCategory(name)) if name == "Spreadsheets"
        ));
    }
}
