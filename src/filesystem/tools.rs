//! Detection of the external binaries behind the fast search/find tiers

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tokio::sync::OnceCell;

use super::config::TOOL_CHECK_TIMEOUT;

static DETECTED: OnceCell<ToolAvailability> = OnceCell::const_new();

/// Which external tools are usable on this host.
///
/// Computed once at startup and handed to the search engine and file finder;
/// never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolAvailability {
    search: Option<PathBuf>,
    finder: Option<PathBuf>,
    posix: Option<PosixTools>,
}

/// `grep` + `find`, only ever populated on unix hosts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PosixTools {
    pub grep: PathBuf,
    pub find: PathBuf,
}

impl ToolAvailability {
    /// Detect once per process and return the cached result afterwards
    pub async fn detect() -> &'static ToolAvailability {
        DETECTED.get_or_init(Self::scan).await
    }

    /// Check every candidate binary now
    pub async fn scan() -> Self {
        let search = locate_binary("rg").await;
        let finder = match locate_binary("fd").await {
            Some(path) => Some(path),
            None => locate_binary("fdfind").await,
        };
        Self {
            search,
            finder,
            posix: locate_posix(),
        }
    }

    /// No external tools at all: everything runs in-process
    pub fn none() -> Self {
        Self::default()
    }

    pub fn has_primary_search(&self) -> bool {
        self.search.is_some()
    }

    pub fn has_primary_finder(&self) -> bool {
        self.finder.is_some()
    }

    pub fn primary_search(&self) -> Option<&Path> {
        self.search.as_deref()
    }

    pub fn primary_finder(&self) -> Option<&Path> {
        self.finder.as_deref()
    }

    pub fn posix(&self) -> Option<&PosixTools> {
        self.posix.as_ref()
    }

    pub fn log_summary(&self) {
        tracing::debug!(
            "tool detection: rg={} fd={} posix={}",
            self.has_primary_search(),
            self.has_primary_finder(),
            self.posix.is_some()
        );
        match &self.search {
            Some(path) => tracing::info!("ripgrep detected at {} - using high-performance search", path.display()),
            None => tracing::warn!(
                "ripgrep not available, search_in_files will use grep or the in-process fallback. \
                 Install ripgrep for better performance: https://github.com/BurntSushi/ripgrep#installation"
            ),
        }
        match &self.finder {
            Some(path) => tracing::info!("fd detected at {} - using high-performance file finding", path.display()),
            None => tracing::warn!(
                "fd not available, file finding will use find or the in-process fallback. \
                 Install fd for better performance: https://github.com/sharkdp/fd#installation"
            ),
        }
        match &self.posix {
            Some(tools) => tracing::debug!(
                "POSIX fallback: {} and {}",
                tools.grep.display(),
                tools.find.display()
            ),
            None => tracing::debug!("POSIX grep/find tier unavailable on this host"),
        }
    }
}

impl PosixTools {
    /// Resolve `grep` and `find` from PATH
    pub fn locate() -> Option<Self> {
        Some(Self {
            grep: which::which("grep").ok()?,
            find: which::which("find").ok()?,
        })
    }
}

/// Locate `name` on PATH and confirm it actually runs
async fn locate_binary(name: &str) -> Option<PathBuf> {
    let path = which::which(name).ok()?;

    let status = Command::new(&path)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .status();

    match tokio::time::timeout(TOOL_CHECK_TIMEOUT, status).await {
        Ok(Ok(status)) if status.success() => Some(path),
        Ok(Ok(status)) => {
            tracing::debug!("{} --version exited with {}", path.display(), status);
            None
        }
        Ok(Err(e)) => {
            tracing::debug!("{} could not be executed: {}", path.display(), e);
            None
        }
        Err(_) => {
            tracing::debug!("{} --version timed out", path.display());
            None
        }
    }
}

#[cfg(unix)]
fn locate_posix() -> Option<PosixTools> {
    PosixTools::locate()
}

#[cfg(not(unix))]
fn locate_posix() -> Option<PosixTools> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_detect_is_cached_for_the_process() {
        let first = ToolAvailability::detect().await;
        let second = ToolAvailability::detect().await;
        assert!(std::ptr::eq(first, second));
    }

    #[tokio::test]
    async fn test_scan_agrees_with_path_lookup() {
        let tools = ToolAvailability::scan().await;
        if which::which("rg").is_err() {
            assert!(!tools.has_primary_search());
        }
        if which::which("fd").is_err() && which::which("fdfind").is_err() {
            assert!(!tools.has_primary_finder());
        }
    }

    #[tokio::test]
    async fn test_missing_binary_is_not_an_error() {
        assert_eq!(locate_binary("definitely-not-a-real-tool-4f1c").await, None);
    }

    #[test]
    fn test_none_disables_every_tier() {
        let tools = ToolAvailability::none();
        assert!(tools.primary_search().is_none());
        assert!(tools.primary_finder().is_none());
        assert!(tools.posix().is_none());
    }
}
