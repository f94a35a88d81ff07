//! smartsort - sort a directory tree into category or date folders
//!
//! This library classifies files by extension (with a content-sniffing fallback), moves them
//! into `root/<Category>` or `root/<YYYY>/<MM>` folders, records every move in a durable
//! session log, and can revert the latest session exactly, removing the folders it created.

pub mod category;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod destination;
pub mod engine;
pub mod error;
pub mod logging;
pub mod mover;
pub mod output;
pub mod session_log;
pub mod undo;

pub use category::{CategoryRule, CategoryRules, DEFAULT_CATEGORY};
pub use classifier::{Classifier, ContentSniffer, FallbackClassifier, NoFallback};
pub use config::{AppConfig, CollisionPolicy, SortConfig, SortMode};
pub use engine::Sorter;
pub use error::{
    ClassificationFailure, ConfigError, LogStoreFailure, MoveFailure, PruneFailure, SortError,
    SortResult,
};
pub use mover::{PlannedMove, SortReport};
pub use session_log::{FileMoveRecord, SessionLogStore};
pub use undo::{UndoOutcome, UndoReport};

pub use cli::{Cli, run};
