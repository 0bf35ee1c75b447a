use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::fs;
use tokio::process::Command;
use tokio::time::Instant;

use crate::protocol::{FoundFiles, RecentFile, RecentFiles, ToolError};

use super::config::ProjectConfig;
use super::external::stream_lines;
use super::security::{ConfinedPaths, PathValidator};
use super::tools::ToolAvailability;
use super::walk::{collect_files, GlobFilter};

/// One enumeration request handed to a finder tier
pub struct FindRequest<'a> {
    pub dir: &'a Path,
    pub glob: &'a GlobFilter,
    /// Only files modified within this window, when set
    pub changed_within: Option<Duration>,
    pub deadline: Instant,
}

/// Absolute candidate paths from a tier
pub struct FindOutcome {
    pub paths: Vec<PathBuf>,
    /// The tier already applied `changed_within` itself
    pub recency_applied: bool,
}

pub trait FindTier: Send + Sync {
    fn name(&self) -> &'static str;

    /// External tiers only match base names
    fn is_external(&self) -> bool {
        true
    }

    /// `None` sends the request on to the next tier
    fn attempt<'a>(&'a self, request: &'a FindRequest<'a>) -> BoxFuture<'a, Option<FindOutcome>>;
}

/// `fd`, with its own `--changed-within` filter
pub struct FdTier {
    binary: PathBuf,
}

impl FdTier {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl FindTier for FdTier {
    fn name(&self) -> &'static str {
        "fd"
    }

    fn attempt<'a>(&'a self, request: &'a FindRequest<'a>) -> BoxFuture<'a, Option<FindOutcome>> {
        async move {
            let mut cmd = Command::new(&self.binary);
            cmd.arg("--type")
                .arg("f")
                .arg("--hidden")
                .arg("--absolute-path")
                .arg("--color")
                .arg("never")
                .arg("--glob");
            if let Some(window) = request.changed_within {
                cmd.arg("--changed-within")
                    .arg(format!("{}h", window.as_secs() / 3600));
            }
            cmd.arg(request.glob.as_str()).arg(request.dir);

            let streamed = stream_lines(cmd, request.deadline).await?;
            if streamed.timed_out || !streamed.status.is_some_and(|s| s.success()) {
                return None;
            }
            Some(FindOutcome {
                paths: streamed
                    .lines
                    .into_iter()
                    .filter(|l| !l.is_empty())
                    .map(PathBuf::from)
                    .collect(),
                recency_applied: request.changed_within.is_some(),
            })
        }
        .boxed()
    }
}

/// POSIX `find -type f -name`
pub struct PosixFindTier {
    binary: PathBuf,
}

impl PosixFindTier {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl FindTier for PosixFindTier {
    fn name(&self) -> &'static str {
        "find"
    }

    fn attempt<'a>(&'a self, request: &'a FindRequest<'a>) -> BoxFuture<'a, Option<FindOutcome>> {
        async move {
            let mut cmd = Command::new(&self.binary);
            cmd.arg(request.dir).arg("-type").arg("f");
            if !request.glob.is_match_all() {
                cmd.arg("-name").arg(request.glob.as_str());
            }

            let streamed = stream_lines(cmd, request.deadline).await?;
            if streamed.timed_out || !streamed.status.is_some_and(|s| s.success()) {
                return None;
            }
            Some(FindOutcome {
                paths: streamed
                    .lines
                    .into_iter()
                    .filter(|l| !l.is_empty())
                    .map(PathBuf::from)
                    .collect(),
                recency_applied: false,
            })
        }
        .boxed()
    }
}

/// In-process walk; always available
pub struct WalkFindTier;

impl FindTier for WalkFindTier {
    fn name(&self) -> &'static str {
        "in-process"
    }

    fn is_external(&self) -> bool {
        false
    }

    fn attempt<'a>(&'a self, request: &'a FindRequest<'a>) -> BoxFuture<'a, Option<FindOutcome>> {
        async move {
            let walked = collect_files(request.dir, request.glob, request.deadline).await;
            if walked.timed_out {
                tracing::warn!(
                    "File walk hit the deadline, returning {} files found so far",
                    walked.files.len()
                );
            }
            Some(FindOutcome {
                paths: walked.files,
                recency_applied: false,
            })
        }
        .boxed()
    }
}

pub fn default_find_tiers(tools: &ToolAvailability) -> Vec<Box<dyn FindTier>> {
    let mut tiers: Vec<Box<dyn FindTier>> = Vec::new();
    if let Some(fd) = tools.primary_finder() {
        tiers.push(Box::new(FdTier::new(fd)));
    }
    if let Some(posix) = tools.posix() {
        tiers.push(Box::new(PosixFindTier::new(posix.find.clone())));
    }
    tiers.push(Box::new(WalkFindTier));
    tiers
}

#[derive(Clone)]
pub struct FileFinder {
    config: Arc<ProjectConfig>,
    validator: Arc<PathValidator>,
    tiers: Arc<Vec<Box<dyn FindTier>>>,
}

impl FileFinder {
    pub fn new(
        config: Arc<ProjectConfig>,
        validator: Arc<PathValidator>,
        tools: &ToolAvailability,
    ) -> Self {
        Self::with_tiers(config, validator, default_find_tiers(tools))
    }

    pub fn with_tiers(
        config: Arc<ProjectConfig>,
        validator: Arc<PathValidator>,
        tiers: Vec<Box<dyn FindTier>>,
    ) -> Self {
        Self {
            config,
            validator,
            tiers: Arc::new(tiers),
        }
    }

    pub async fn find_files_by_name(
        &self,
        name_pattern: &str,
        path: &str,
    ) -> Result<FoundFiles, ToolError> {
        let dir = self.validate_dir(path).await?;
        let glob = GlobFilter::new(name_pattern)?;

        let outcome = self.run_tiers(&dir, &glob, None).await;
        let mut confined = ConfinedPaths::new(&self.validator);
        let files: Vec<String> = outcome
            .paths
            .iter()
            .filter_map(|p| confined.relative(p))
            .collect();

        Ok(FoundFiles {
            total_found: files.len(),
            files,
        })
    }

    /// Files under `path` modified in the last `hours_ago` hours, newest first
    pub async fn find_recently_modified_files(
        &self,
        hours_ago: u64,
        path: &str,
        file_pattern: &str,
    ) -> Result<RecentFiles, ToolError> {
        let dir = self.validate_dir(path).await?;
        if hours_ago < 1 {
            return Err(ToolError::InvalidArgument {
                message: "hours_ago must be at least 1".to_string(),
            });
        }
        let glob = GlobFilter::new(file_pattern)?;

        let window = Duration::from_secs(hours_ago.saturating_mul(3600));
        let cutoff = SystemTime::now()
            .checked_sub(window)
            .unwrap_or(UNIX_EPOCH);

        let outcome = self.run_tiers(&dir, &glob, Some(window)).await;
        let mut confined = ConfinedPaths::new(&self.validator);
        let mut files = Vec::new();
        for path in &outcome.paths {
            let Some(relative) = confined.relative(path) else {
                continue;
            };
            // Files that vanish between listing and stat are dropped.
            let Ok(modified) = fs::metadata(path).await.and_then(|m| m.modified()) else {
                continue;
            };
            if !outcome.recency_applied && modified < cutoff {
                continue;
            }
            files.push(RecentFile {
                path: relative,
                mtime: unix_seconds(modified),
            });
        }

        files.sort_by(|a, b| b.mtime.total_cmp(&a.mtime));

        Ok(RecentFiles {
            total_found: files.len(),
            files,
        })
    }

    async fn validate_dir(&self, path: &str) -> Result<PathBuf, ToolError> {
        let dir = self.validator.validate(path)?;
        let metadata = fs::metadata(&dir)
            .await
            .map_err(|e| ToolError::from_path_io(&e, path))?;
        if !metadata.is_dir() {
            return Err(ToolError::NotADirectory {
                path: path.to_string(),
            });
        }
        Ok(dir)
    }

    async fn run_tiers(
        &self,
        dir: &Path,
        glob: &GlobFilter,
        changed_within: Option<Duration>,
    ) -> FindOutcome {
        // Each tier gets the full budget.
        for tier in self.tiers.iter() {
            if tier.is_external() && glob.is_path_pattern() {
                tracing::debug!("{} skipped for path glob {}", tier.name(), glob.as_str());
                continue;
            }
            let request = FindRequest {
                dir,
                glob,
                changed_within,
                deadline: Instant::now() + self.config.search_timeout,
            };
            match tier.attempt(&request).await {
                Some(outcome) => {
                    tracing::debug!("{} found {} candidates", tier.name(), outcome.paths.len());
                    return outcome;
                }
                None => tracing::debug!("{} finder failed, falling back", tier.name()),
            }
        }

        FindOutcome {
            paths: Vec::new(),
            recency_applied: false,
        }
    }
}

pub fn unix_seconds(time: SystemTime) -> f64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
