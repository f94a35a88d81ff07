//! Resolving a file to a category name.
//!
//! Extension rules are consulted first, in table order, skipping categories the current
//! [`SortConfig`] disables. Files no enabled rule claims go to a pluggable
//! [`FallbackClassifier`]; if that fails, or answers with a category that is not enabled,
//! the file lands in [`DEFAULT_CATEGORY`].

use crate::category::{CategoryRules, DEFAULT_CATEGORY, normalize_extension};
use crate::config::SortConfig;
use crate::error::ClassificationFailure;
use infer::MatcherType;
use std::path::Path;
use tracing::debug;

/// Second-chance classification for files no extension rule claims.
///
/// Receives the full path of the file; its file name is the part most implementations care
/// about. Any closure with the same signature is a fallback too.
pub trait FallbackClassifier {
    fn classify(&self, file: &Path) -> Result<String, ClassificationFailure>;
}

impl<F> FallbackClassifier for F
where
    F: Fn(&Path) -> Result<String, ClassificationFailure>,
{
    fn classify(&self, file: &Path) -> Result<String, ClassificationFailure> {
        self(file)
    }
}

/// Fallback that never answers.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFallback;

impl FallbackClassifier for NoFallback {
    fn classify(&self, _file: &Path) -> Result<String, ClassificationFailure> {
        Err(ClassificationFailure::Unavailable)
    }
}

/// Fallback that looks at the file's magic bytes.
///
/// Uses the `infer` crate, so a JPEG saved as `photo.dat` is still recognized as an image.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentSniffer;

impl ContentSniffer {
    /// Maps a detected matcher type to a category label.
    ///
    /// Labels without a matching built-in rule (fonts, custom matchers) are returned as-is
    /// and end up in the default bucket.
    fn label_for(matcher: MatcherType) -> &'static str {
        match matcher {
            MatcherType::Image => "Images",
            MatcherType::Video => "Videos",
            MatcherType::Audio => "Audio",
            MatcherType::Archive => "Archives",
            MatcherType::App => "Applications",
            MatcherType::Doc | MatcherType::Book | MatcherType::Text => "Documents",
            MatcherType::Font => "Fonts",
            MatcherType::Custom => "Custom",
        }
    }
}

impl FallbackClassifier for ContentSniffer {
    fn classify(&self, file: &Path) -> Result<String, ClassificationFailure> {
        let kind = infer::get_from_path(file)
            .map_err(|source| ClassificationFailure::Unreadable {
                path: file.to_path_buf(),
                source,
            })?
            .ok_or_else(|| ClassificationFailure::Undetected(file.to_path_buf()))?;

        debug!(file = %file.display(), mime = kind.mime_type(), "content sniffed");
        Ok(Self::label_for(kind.matcher_type()).to_string())
    }
}

/// Rules plus fallback.
pub struct Classifier {
    rules: CategoryRules,
    fallback: Box<dyn FallbackClassifier>,
}

impl Classifier {
    pub fn new(rules: CategoryRules, fallback: Box<dyn FallbackClassifier>) -> Self {
        Self { rules, fallback }
    }

    /// Classifier over the built-in rules with the content sniffer as fallback.
    pub fn with_defaults() -> Self {
        Self::new(CategoryRules::default(), Box::new(ContentSniffer))
    }

    pub fn rules(&self) -> &CategoryRules {
        &self.rules
    }

    /// First enabled rule containing `extension`, if any.
    pub fn match_rule(&self, extension: &str, config: &SortConfig) -> Option<&str> {
        let extension = normalize_extension(extension);
        self.rules
            .iter()
            .find(|rule| config.is_enabled(&rule.name) && rule.extensions.contains(&extension))
            .map(|rule| rule.name.as_str())
    }

    /// Category name for `file` under `config`. Never fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use smartsort::classifier::{Classifier, NoFallback};
    /// use smartsort::category::CategoryRules;
    /// use smartsort::config::SortConfig;
    /// use std::path::Path;
    ///
    /// let classifier = Classifier::new(CategoryRules::default(), Box::new(NoFallback));
    /// let mut config = SortConfig::for_rules(classifier.rules());
    /// assert_eq!(classifier.classify(Path::new("b.JPG"), &config), "Images");
    ///
    /// config.disable("Images");
    /// assert_eq!(classifier.classify(Path::new("b.jpg"), &config), "Others");
    /// ```
    pub fn classify(&self, file: &Path, config: &SortConfig) -> String {
        let extension = file
            .extension()
            .map(|ext| ext.to_string_lossy().into_owned())
            .unwrap_or_default();

        if !extension.is_empty()
            && let Some(name) = self.match_rule(&extension, config)
        {
            return name.to_string();
        }

        match self.fallback.classify(file) {
            Ok(label) => match self.enabled_name(&label, config) {
                Some(name) => name.to_string(),
                None => {
                    debug!(file = %file.display(), %label, "fallback label not enabled, using default");
                    DEFAULT_CATEGORY.to_string()
                }
            },
            Err(failure) => {
                debug!(file = %file.display(), %failure, "fallback classification failed");
                DEFAULT_CATEGORY.to_string()
            }
        }
    }

    /// Canonical spelling of `label` if it names an enabled rule.
    fn enabled_name(&self, label: &str, config: &SortConfig) -> Option<&str> {
        self.rules
            .get(label)
            .filter(|rule| config.is_enabled(&rule.name))
            .map(|rule| rule.name.as_str())
    }
}
