//! Configuration: per-run sort settings and the optional TOML settings file.
//!
//! [`SortConfig`] is the transient value passed into every sort or preview. [`AppConfig`]
//! is what a `.smartsortrc.toml` holds; it seeds the defaults from which a `SortConfig` is
//! built, adds custom categories, and names the session log location.
//!
//! # Configuration File Format
//!
//! ```toml
//! [sort]
//! mode = "date"
//! collision = "skip"
//!
//! [log]
//! path = "/var/tmp/smartsort.jsonl"
//!
//! [categories]
//! disabled = ["Applications"]
//!
//! [[categories.custom]]
//! name = "Ebooks"
//! extensions = ["epub", "mobi"]
//!
//! [filters]
//! enable_hidden_files = false
//!
//! [filters.exclude]
//! filenames = ["Thumbs.db"]
//! patterns = ["**/node_modules/**"]
//! extensions = ["part"]
//! regex = []
//! ```

use crate::category::{CategoryRule, CategoryRules};
use crate::error::ConfigError;
use glob::Pattern;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

/// How destinations are chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    /// `root/<category>`
    #[default]
    Category,
    /// `root/<year>/<month>`
    Date,
}

/// What happens when the destination file name is already taken.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollisionPolicy {
    /// Replace the existing file.
    Overwrite,
    /// Move to `name (N).ext` instead.
    #[default]
    Rename,
    /// Leave the source file where it is.
    Skip,
}

/// Settings for a single sort or preview run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortConfig {
    pub enabled_categories: BTreeSet<String>,
    pub mode: SortMode,
    pub collision: CollisionPolicy,
}

impl SortConfig {
    /// Category mode, rename on collision, every rule that is enabled by default.
    pub fn for_rules(rules: &CategoryRules) -> Self {
        Self {
            enabled_categories: rules.enabled_names(),
            mode: SortMode::default(),
            collision: CollisionPolicy::default(),
        }
    }

    pub fn with_mode(mut self, mode: SortMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_collision(mut self, collision: CollisionPolicy) -> Self {
        self.collision = collision;
        self
    }

    /// Case-insensitive, since category names double as folder names.
    pub fn is_enabled(&self, category: &str) -> bool {
        self.enabled_categories
            .iter()
            .any(|name| name.eq_ignore_ascii_case(category))
    }

    pub fn disable(&mut self, category: &str) {
        self.enabled_categories
            .retain(|name| !name.eq_ignore_ascii_case(category));
    }

    pub fn enable(&mut self, category: &str) {
        if !self.is_enabled(category) {
            self.enabled_categories.insert(category.to_string());
        }
    }
}

/// Contents of a settings file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub sort: SortSection,
    pub log: LogSection,
    pub categories: CategorySection,
    pub filters: FilterRules,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SortSection {
    pub mode: SortMode,
    pub collision: CollisionPolicy,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSection {
    /// Session log file; see [`default_log_path`] when absent.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CategorySection {
    /// Categories that start out disabled.
    pub disabled: Vec<String>,
    /// Extra categories, appended after the built-in ones.
    pub custom: Vec<CustomCategory>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomCategory {
    pub name: String,
    pub extensions: Vec<String>,
}

impl AppConfig {
    /// Loads settings, with fallback to defaults.
    ///
    /// Attempts to load configuration in the following order:
    /// 1. If `config_path` is provided, load from that file
    /// 2. Look for `.smartsortrc.toml` in the current directory
    /// 3. Look for `~/.config/smartsort/config.toml`
    /// 4. Fall back to default configuration
    ///
    /// # Errors
    ///
    /// Returns an error if an explicitly provided file cannot be read, or if any file found
    /// is not valid TOML for this schema.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_config = PathBuf::from(".smartsortrc.toml");
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Some(home) = std::env::var_os("HOME") {
            let home_config = PathBuf::from(home)
                .join(".config")
                .join("smartsort")
                .join("config.toml");
            if home_config.exists() {
                return Self::load_from_file(&home_config);
            }
        }

        Ok(Self::default())
    }

    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::ConfigUnreadable {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))
    }

    /// Built-in rules plus custom categories, with `disabled` applied.
    pub fn category_rules(&self) -> Result<CategoryRules, ConfigError> {
        let mut rules = CategoryRules::default();
        for custom in &self.categories.custom {
            rules.push(CategoryRule::new(&custom.name, &custom.extensions))?;
        }
        for name in &self.categories.disabled {
            rules.set_enabled(name, false)?;
        }
        Ok(rules)
    }

    /// Run settings seeded from this file.
    pub fn sort_config(&self, rules: &CategoryRules) -> SortConfig {
        SortConfig::for_rules(rules)
            .with_mode(self.sort.mode)
            .with_collision(self.sort.collision)
    }

    /// The configured log path, or the default location.
    pub fn log_path(&self) -> PathBuf {
        self.log.path.clone().unwrap_or_else(default_log_path)
    }
}

/// `$HOME/.local/share/smartsort/sort_log.jsonl`, or `./smartsort_log.jsonl` without a home.
pub fn default_log_path() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home)
            .join(".local")
            .join("share")
            .join("smartsort")
            .join("sort_log.jsonl"),
        None => PathBuf::from("smartsort_log.jsonl"),
    }
}

/// Which files the walk considers at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterRules {
    /// Whether files starting with "." are sorted. Defaults to true.
    pub enable_hidden_files: bool,
    pub exclude: ExcludeRules,
}

impl Default for FilterRules {
    fn default() -> Self {
        Self {
            enable_hidden_files: true,
            exclude: ExcludeRules::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExcludeRules {
    /// Exact file names (e.g. "Thumbs.db").
    pub filenames: Vec<String>,
    /// Glob patterns matched against the path relative to the sort root.
    pub patterns: Vec<String>,
    /// Extensions, with or without a leading dot.
    pub extensions: Vec<String>,
    /// Regexes matched against the file name.
    pub regex: Vec<String>,
}

impl FilterRules {
    /// Compiles every pattern once, up front.
    ///
    /// # Errors
    ///
    /// Returns an error if any glob or regex pattern is invalid.
    pub fn compile(&self) -> Result<ScanFilter, ConfigError> {
        let exclude_patterns = self
            .exclude
            .patterns
            .iter()
            .map(|pattern| {
                Pattern::new(pattern).map_err(|_| ConfigError::InvalidGlobPattern(pattern.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let exclude_regexes = self
            .exclude
            .regex
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| ConfigError::InvalidRegexPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ScanFilter {
            enable_hidden_files: self.enable_hidden_files,
            exclude_filenames: self.exclude.filenames.iter().cloned().collect(),
            exclude_extensions: self
                .exclude
                .extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
            exclude_patterns,
            exclude_regexes,
        })
    }
}

/// Compiled form of [`FilterRules`].
#[derive(Debug, Clone)]
pub struct ScanFilter {
    enable_hidden_files: bool,
    exclude_filenames: HashSet<String>,
    exclude_extensions: HashSet<String>,
    exclude_patterns: Vec<Pattern>,
    exclude_regexes: Vec<Regex>,
}

impl Default for ScanFilter {
    fn default() -> Self {
        Self {
            enable_hidden_files: true,
            exclude_filenames: HashSet::new(),
            exclude_extensions: HashSet::new(),
            exclude_patterns: Vec::new(),
            exclude_regexes: Vec::new(),
        }
    }
}

impl ScanFilter {
    /// Whether the file at `relative_path` (relative to the sort root) gets sorted.
    pub fn should_include(&self, relative_path: &Path) -> bool {
        let file_name = relative_path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();

        if !self.enable_hidden_files && file_name.starts_with('.') {
            return false;
        }

        if self.exclude_filenames.contains(file_name.as_ref()) {
            return false;
        }

        if let Some(ext) = relative_path.extension() {
            let ext_lower = ext.to_string_lossy().to_lowercase();
            if self.exclude_extensions.contains(&ext_lower) {
                return false;
            }
        }

        if self
            .exclude_patterns
            .iter()
            .any(|pattern| pattern.matches_path(relative_path))
        {
            return false;
        }

        !self
            .exclude_regexes
            .iter()
            .any(|regex| regex.is_match(&file_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config.sort.mode, SortMode::Category);
        assert_eq!(config.sort.collision, CollisionPolicy::Rename);
        assert!(config.filters.enable_hidden_files);
        assert!(config.log.path.is_none());
    }

    #[test]
    fn test_full_file() {
        let config = AppConfig::from_toml(
            r#"
            [sort]
            mode = "date"
            collision = "overwrite"

            [log]
            path = "/tmp/log.jsonl"

            [categories]
            disabled = ["applications"]

            [[categories.custom]]
            name = "Ebooks"
            extensions = ["epub", ".MOBI"]
            "#,
        )
        .unwrap();

        assert_eq!(config.sort.mode, SortMode::Date);
        assert_eq!(config.sort.collision, CollisionPolicy::Overwrite);
        assert_eq!(config.log_path(), PathBuf::from("/tmp/log.jsonl"));

        let rules = config.category_rules().unwrap();
        assert!(rules.get("Ebooks").unwrap().contains_extension("mobi"));
        assert_eq!(rules.names().last(), Some("Ebooks"));

        let sort_config = config.sort_config(&rules);
        assert!(!sort_config.is_enabled("Applications"));
        assert!(sort_config.is_enabled("Ebooks"));
        assert_eq!(sort_config.mode, SortMode::Date);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            AppConfig::from_toml("[sort]\nmode = \"size\""),
            Err(ConfigError::ConfigInvalid(_))
        ));

        let config = AppConfig::from_toml("[categories]\ndisabled = [\"Fonts\"]").unwrap();
        assert!(matches!(
            config.category_rules(),
            Err(ConfigError::UnknownCategory(_))
        ));
    }

    #[test]
    fn test_custom_category_cannot_shadow_builtin() {
        let config = AppConfig::from_toml(
            "[[categories.custom]]\nname = \"images\"\nextensions = [\"heic\"]",
        )
        .unwrap();
        assert!(matches!(
            config.category_rules(),
            Err(ConfigError::DuplicateCategory(_))
        ));
    }

    #[test]
    fn test_explicit_missing_file() {
        let result = AppConfig::load(Some(Path::new("/non/existent/smartsort.toml")));
        assert!(matches!(result, Err(ConfigError::ConfigNotFound(_))));
    }

    #[test]
    fn test_sort_config_enable_disable() {
        let mut config = SortConfig::for_rules(&CategoryRules::default());
        config.disable("IMAGES");
        assert!(!config.is_enabled("Images"));
        config.enable("Images");
        config.enable("images");
        assert!(config.is_enabled("Images"));
        assert_eq!(config.enabled_categories.len(), 7);
    }

    #[test]
    fn test_default_filter_includes_everything() {
        let filter = FilterRules::default().compile().unwrap();
        assert!(filter.should_include(Path::new(".hidden")));
        assert!(filter.should_include(Path::new("sub/a.pdf")));
    }

    #[test]
    fn test_hidden_files_excluded_when_disabled() {
        let rules = FilterRules {
            enable_hidden_files: false,
            exclude: ExcludeRules::default(),
        };
        let filter = rules.compile().unwrap();
        assert!(!filter.should_include(Path::new(".DS_Store")));
        assert!(filter.should_include(Path::new("photo.jpg")));
    }

    #[test]
    fn test_exclude_rules() {
        let rules = FilterRules {
            enable_hidden_files: true,
            exclude: ExcludeRules {
                filenames: vec!["Thumbs.db".to_string()],
                patterns: vec!["**/node_modules/**".to_string()],
                extensions: vec![".PART".to_string(), "tmp".to_string()],
                regex: vec![r"^~\$".to_string()],
            },
        };
        let filter = rules.compile().unwrap();

        assert!(!filter.should_include(Path::new("Thumbs.db")));
        assert!(!filter.should_include(Path::new("movie.mkv.part")));
        assert!(!filter.should_include(Path::new("x.TMP")));
        assert!(!filter.should_include(Path::new("web/node_modules/pkg/index.js")));
        assert!(!filter.should_include(Path::new("~$report.docx")));

        assert!(filter.should_include(Path::new("report.docx")));
        assert!(filter.should_include(Path::new("web/my_node_modules/index.js")));
    }

    #[test]
    fn test_invalid_patterns_return_error() {
        let bad_glob = FilterRules {
            enable_hidden_files: true,
            exclude: ExcludeRules {
                patterns: vec!["[invalid".to_string()],
                ..Default::default()
            },
        };
        assert!(matches!(
            bad_glob.compile(),
            Err(ConfigError::InvalidGlobPattern(_))
        ));

        let bad_regex = FilterRules {
            enable_hidden_files: true,
            exclude: ExcludeRules {
                regex: vec!["[invalid(".to_string()],
                ..Default::default()
            },
        };
        assert!(matches!(
            bad_regex.compile(),
            Err(ConfigError::InvalidRegexPattern { .. })
        ));
    }
}
