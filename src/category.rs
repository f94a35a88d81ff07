//! Category rules: the ordered table that maps file extensions to folder names.
//!
//! Rules are matched in table order and the first enabled rule containing the extension
//! wins, so the order of the table is part of its behavior.
//!
//! # Examples
//!
//! ```
//! use smartsort::category::CategoryRules;
//!
//! let rules = CategoryRules::default();
//! assert_eq!(rules.names().next(), Some("Documents"));
//! assert!(rules.get("Images").unwrap().contains_extension(".JPG"));
//! ```

use crate::error::ConfigError;
use std::collections::BTreeSet;

/// Bucket used when nothing else claims a file.
pub const DEFAULT_CATEGORY: &str = "Others";

const BUILTIN_RULES: &[(&str, &[&str])] = &[
    ("Documents", &[".pdf", ".docx", ".doc", ".txt", ".xlsx"]),
    ("Images", &[".jpg", ".jpeg", ".png", ".svg", ".gif"]),
    ("Videos", &[".mp4", ".mkv", ".avi", ".mov"]),
    ("Audio", &[".mp3", ".wav", ".aac"]),
    ("Applications", &[".exe", ".msi", ".apk"]),
    ("Archives", &[".zip", ".rar", ".7z", ".tar"]),
    ("Code", &[".py", ".js", ".html", ".css", ".java", ".cpp"]),
];

/// A named set of extensions that share a destination folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRule {
    /// Folder name, unique within a table.
    pub name: String,
    /// Lowercase, dot-prefixed extensions.
    pub extensions: BTreeSet<String>,
    /// Whether the rule is enabled when no explicit selection is made.
    pub enabled: bool,
}

impl CategoryRule {
    /// Creates an enabled rule, normalizing every extension.
    pub fn new<I, S>(name: &str, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            name: name.to_string(),
            extensions: extensions
                .into_iter()
                .map(|ext| normalize_extension(ext.as_ref()))
                .filter(|ext| ext.len() > 1)
                .collect(),
            enabled: true,
        }
    }

    /// Case-insensitive membership test. Accepts `jpg`, `.jpg` or `.JPG`.
    pub fn contains_extension(&self, extension: &str) -> bool {
        self.extensions.contains(&normalize_extension(extension))
    }
}

/// Lowercases an extension and makes sure it starts with a dot.
///
/// ```
/// use smartsort::category::normalize_extension;
///
/// assert_eq!(normalize_extension("PDF"), ".pdf");
/// assert_eq!(normalize_extension(".Tar"), ".tar");
/// ```
pub fn normalize_extension(ext: &str) -> String {
    let trimmed = ext.trim();
    let lower = trimmed.to_lowercase();
    if lower.starts_with('.') {
        lower
    } else {
        format!(".{}", lower)
    }
}

/// The ordered rule table.
#[derive(Debug, Clone)]
pub struct CategoryRules {
    rules: Vec<CategoryRule>,
}

impl CategoryRules {
    /// Builds a table from rules in precedence order.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::DuplicateCategory` if two rules share a name (compared
    /// case-insensitively, since the name becomes a folder).
    pub fn new(rules: Vec<CategoryRule>) -> Result<Self, ConfigError> {
        let mut seen = BTreeSet::new();
        for rule in &rules {
            if !seen.insert(rule.name.to_lowercase()) {
                return Err(ConfigError::DuplicateCategory(rule.name.clone()));
            }
        }
        Ok(Self { rules })
    }

    /// Appends a rule at the lowest precedence.
    pub fn push(&mut self, rule: CategoryRule) -> Result<(), ConfigError> {
        if self.get(&rule.name).is_some() {
            return Err(ConfigError::DuplicateCategory(rule.name));
        }
        self.rules.push(rule);
        Ok(())
    }

    /// Sets the default enabled flag of a rule.
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> Result<(), ConfigError> {
        let rule = self
            .rules
            .iter_mut()
            .find(|rule| rule.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| ConfigError::UnknownCategory(name.to_string()))?;
        rule.enabled = enabled;
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&CategoryRule> {
        self.rules
            .iter()
            .find(|rule| rule.name.eq_ignore_ascii_case(name))
    }

    /// Rules in precedence order.
    pub fn iter(&self) -> impl Iterator<Item = &CategoryRule> {
        self.rules.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|rule| rule.name.as_str())
    }

    /// Names of the rules whose `enabled` flag is set.
    pub fn enabled_names(&self) -> BTreeSet<String> {
        self.rules
            .iter()
            .filter(|rule| rule.enabled)
            .map(|rule| rule.name.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for CategoryRules {
    fn default() -> Self {
        Self {
            rules: BUILTIN_RULES
                .iter()
                .map(|(name, extensions)| CategoryRule::new(name, extensions.iter()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_order() {
        let rules = CategoryRules::default();
        let names: Vec<_> = rules.names().collect();
        assert_eq!(
            names,
            vec![
                "Documents",
                "Images",
                "Videos",
                "Audio",
                "Applications",
                "Archives",
                "Code"
            ]
        );
    }

    #[test]
    fn test_extensions_are_normalized() {
        let rule = CategoryRule::new("Ebooks", ["EPUB", ".Mobi", "  azw3 "]);
        assert!(rule.extensions.contains(".epub"));
        assert!(rule.extensions.contains(".mobi"));
        assert!(rule.extensions.contains(".azw3"));
        assert!(rule.contains_extension("MOBI"));
    }

    #[test]
    fn test_empty_extension_dropped() {
        let rule = CategoryRule::new("Weird", ["", "."]);
        assert!(rule.extensions.is_empty());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let result = CategoryRules::new(vec![
            CategoryRule::new("Images", ["png"]),
            CategoryRule::new("images", ["jpg"]),
        ]);
        assert!(matches!(result, Err(ConfigError::DuplicateCategory(_))));

        let mut rules = CategoryRules::default();
        assert!(rules.push(CategoryRule::new("Code", ["rs"])).is_err());
        assert!(rules.push(CategoryRule::new("Ebooks", ["epub"])).is_ok());
        assert_eq!(rules.names().last(), Some("Ebooks"));
    }

    #[test]
    fn test_set_enabled() {
        let mut rules = CategoryRules::default();
        rules.set_enabled("images", false).unwrap();
        assert!(!rules.enabled_names().contains("Images"));
        assert_eq!(rules.enabled_names().len(), rules.len() - 1);
        assert!(matches!(
            rules.set_enabled("Fonts", false),
            Err(ConfigError::UnknownCategory(_))
        ));
    }
}
