use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::protocol::ToolError;

/// Default wall-clock budget for multi-file search and file finding (seconds)
pub const DEFAULT_SEARCH_TIMEOUT_SECS: u64 = 60;

/// Budget for the `--version` check of an external tool
pub const TOOL_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Budget for a single `grep` invocation in the POSIX tier
pub const PER_FILE_GREP_TIMEOUT: Duration = Duration::from_secs(5);

/// Leading bytes inspected when deciding whether a file is text
pub const TEXT_SAMPLE_SIZE: usize = 8 * 1024;

pub const DEFAULT_TREE_DEPTH: usize = 3;
pub const MAX_TREE_DEPTH: usize = 10;
pub const DEFAULT_TAIL_LINES: usize = 10;

/// Rotated log files kept when logging to a file (one per day)
pub const LOG_RETENTION_DAYS: usize = 7;

/// Agent context files read by `read_project_context`, in reporting order
pub const CONTEXT_FILE_NAMES: &[&str] = &["AGENTS.md", "CLAUDE.md"];

/// Process-wide project configuration, immutable once built
#[derive(Debug, Clone)]
pub struct ProjectConfig {
    /// Canonical project root; every tool is confined to it
    pub root_path: PathBuf,

    /// Default timeout for search/find operations
    pub search_timeout: Duration,
}

impl ProjectConfig {
    pub fn new(root: impl AsRef<Path>, search_timeout_secs: u64) -> Result<Self, ToolError> {
        let root = root.as_ref();
        if search_timeout_secs == 0 {
            return Err(ToolError::Configuration {
                message: format!("search timeout must be positive: {}", search_timeout_secs),
            });
        }

        let root_path = root.canonicalize().map_err(|e| ToolError::Configuration {
            message: format!("project root does not exist: {} ({})", root.display(), e),
        })?;

        if !root_path.is_dir() {
            return Err(ToolError::Configuration {
                message: format!("project root is not a directory: {}", root_path.display()),
            });
        }

        Ok(Self {
            root_path,
            search_timeout: Duration::from_secs(search_timeout_secs),
        })
    }

    pub fn with_root(root: impl AsRef<Path>) -> Result<Self, ToolError> {
        Self::new(root, DEFAULT_SEARCH_TIMEOUT_SECS)
    }
}
