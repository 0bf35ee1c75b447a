use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use regex::Regex;
use tokio::fs;
use tokio::time::Instant;

use crate::protocol::{FileSearchResult, LineMatch, MatchRecord, SearchResults, ToolError};

use super::config::ProjectConfig;
use super::content::read_text_file;
use super::external::{PosixGrepTier, RipgrepTier};
use super::security::{ConfinedPaths, PathValidator};
use super::tools::ToolAvailability;
use super::walk::{collect_files, GlobFilter};

/// Literal substring or compiled regex, applied per line
#[derive(Debug, Clone)]
pub enum LineMatcher {
    Literal(String),
    Pattern(Regex),
}

impl LineMatcher {
    pub fn new(query: &str, use_regex: bool) -> Result<Self, ToolError> {
        if !use_regex {
            return Ok(LineMatcher::Literal(query.to_string()));
        }
        Regex::new(query)
            .map(LineMatcher::Pattern)
            .map_err(|e| ToolError::InvalidPattern {
                pattern: query.to_string(),
                reason: e.to_string(),
            })
    }

    pub fn is_match(&self, line: &str) -> bool {
        match self {
            LineMatcher::Literal(needle) => line.contains(needle.as_str()),
            LineMatcher::Pattern(re) => re.is_match(line),
        }
    }

    /// Matching lines of `text`, numbered from 1
    pub fn scan(&self, text: &str) -> Vec<LineMatch> {
        text.lines()
            .enumerate()
            .filter(|(_, line)| self.is_match(line))
            .map(|(i, line)| LineMatch {
                line_number: i + 1,
                line_content: line.to_string(),
            })
            .collect()
    }
}

/// Everything a tier needs for one `search_in_files` call
pub struct SearchContext<'a> {
    pub validator: &'a PathValidator,
    /// Canonical directory being searched
    pub dir: &'a Path,
    pub query: &'a str,
    pub use_regex: bool,
    pub matcher: &'a LineMatcher,
    pub glob: &'a GlobFilter,
    pub deadline: Instant,
}

#[derive(Debug, Default)]
pub struct TierOutcome {
    pub matches: Vec<MatchRecord>,
    pub timed_out: bool,
}

/// One way of running a multi-file search.
///
/// `None` means the tier could not run (missing binary, spawn failure, tool
/// error) and the next tier should be tried.
pub trait SearchTier: Send + Sync {
    fn name(&self) -> &'static str;

    /// External tiers are mutually exclusive: once one has produced an
    /// outcome the others are skipped.
    fn is_external(&self) -> bool {
        true
    }

    fn attempt<'a>(&'a self, ctx: &'a SearchContext<'a>) -> BoxFuture<'a, Option<TierOutcome>>;
}

/// Pure in-process scan over an ignore-aware walk
pub struct InProcessTier;

impl SearchTier for InProcessTier {
    fn name(&self) -> &'static str {
        "in-process"
    }

    fn is_external(&self) -> bool {
        false
    }

    fn attempt<'a>(&'a self, ctx: &'a SearchContext<'a>) -> BoxFuture<'a, Option<TierOutcome>> {
        async move {
            let walked = collect_files(ctx.dir, ctx.glob, ctx.deadline).await;
            let mut outcome = TierOutcome {
                matches: Vec::new(),
                timed_out: walked.timed_out,
            };

            let mut confined = ConfinedPaths::new(ctx.validator);
            for file in walked.files {
                if Instant::now() >= ctx.deadline {
                    outcome.timed_out = true;
                    break;
                }
                let Some(file_path) = confined.relative(&file) else {
                    continue;
                };
                // Unreadable and binary files are skipped.
                let Ok(decoded) = read_text_file(&file, &file_path).await else {
                    continue;
                };
                outcome
                    .matches
                    .extend(ctx.matcher.scan(&decoded.text).into_iter().map(|m| MatchRecord {
                        file_path: file_path.clone(),
                        line_number: m.line_number,
                        line_content: m.line_content,
                    }));
            }
            Some(outcome)
        }
        .boxed()
    }
}

/// The default tier order for the tools present on this host
pub fn default_tiers(tools: &ToolAvailability) -> Vec<Box<dyn SearchTier>> {
    let mut tiers: Vec<Box<dyn SearchTier>> = Vec::new();
    if let Some(rg) = tools.primary_search() {
        tiers.push(Box::new(RipgrepTier::new(rg)));
    }
    if let Some(posix) = tools.posix() {
        tiers.push(Box::new(PosixGrepTier::new(posix.clone())));
    }
    tiers.push(Box::new(InProcessTier));
    tiers
}

#[derive(Clone)]
pub struct SearchEngine {
    config: Arc<ProjectConfig>,
    validator: Arc<PathValidator>,
    tiers: Arc<Vec<Box<dyn SearchTier>>>,
}

impl SearchEngine {
    pub fn new(
        config: Arc<ProjectConfig>,
        validator: Arc<PathValidator>,
        tools: &ToolAvailability,
    ) -> Self {
        Self::with_tiers(config, validator, default_tiers(tools))
    }

    pub fn with_tiers(
        config: Arc<ProjectConfig>,
        validator: Arc<PathValidator>,
        tiers: Vec<Box<dyn SearchTier>>,
    ) -> Self {
        Self {
            config,
            validator,
            tiers: Arc::new(tiers),
        }
    }

    /// Search one text file for a literal or regex query
    pub async fn search_in_file(
        &self,
        query: &str,
        file_path: &str,
        use_regex: bool,
    ) -> Result<FileSearchResult, ToolError> {
        let path = self.validator.validate(file_path)?;
        let matcher = LineMatcher::new(query, use_regex)?;
        let decoded = read_text_file(&path, file_path).await?;

        let matches = matcher.scan(&decoded.text);
        Ok(FileSearchResult {
            total_matches: matches.len(),
            matches,
        })
    }

    /// Search every file under `path` whose name matches `file_glob`.
    ///
    /// Lines containing `exclude` are dropped after matching, whichever tier
    /// ran. A timeout returns what was found so far with `timed_out` set.
    pub async fn search_in_files(
        &self,
        query: &str,
        file_glob: &str,
        path: &str,
        use_regex: bool,
        exclude: &str,
        timeout: Option<Duration>,
    ) -> Result<SearchResults, ToolError> {
        let dir = self.validator.validate(path)?;
        let timeout = timeout.unwrap_or(self.config.search_timeout);
        if timeout.is_zero() {
            return Err(ToolError::InvalidArgument {
                message: "timeout must be at least one second".to_string(),
            });
        }
        let matcher = LineMatcher::new(query, use_regex)?;
        let glob = GlobFilter::new(file_glob)?;

        let metadata = fs::metadata(&dir)
            .await
            .map_err(|e| ToolError::from_path_io(&e, path))?;
        if !metadata.is_dir() {
            return Err(ToolError::NotADirectory {
                path: path.to_string(),
            });
        }

        let ctx = SearchContext {
            validator: &self.validator,
            dir: &dir,
            query,
            use_regex,
            matcher: &matcher,
            glob: &glob,
            deadline: Instant::now() + timeout,
        };

        let mut outcome = TierOutcome::default();
        let mut external_done = false;
        for tier in self.tiers.iter() {
            if tier.is_external() && (external_done || glob.is_path_pattern()) {
                continue;
            }
            let Some(result) = tier.attempt(&ctx).await else {
                tracing::debug!("{} search unavailable, falling back", tier.name());
                continue;
            };
            tracing::debug!(
                "{} search produced {} matches (timed_out={})",
                tier.name(),
                result.matches.len(),
                result.timed_out
            );
            external_done |= tier.is_external();
            let finished = result.timed_out || !result.matches.is_empty();
            outcome = result;
            if finished {
                break;
            }
        }

        if outcome.timed_out {
            tracing::warn!(
                "search_in_files timed out after {:?}, returning {} partial matches",
                timeout,
                outcome.matches.len()
            );
        }

        let matches: Vec<MatchRecord> = outcome
            .matches
            .into_iter()
            .filter(|m| exclude.is_empty() || !m.line_content.contains(exclude))
            .collect();

        Ok(SearchResults {
            total_matches: matches.len(),
            matches,
            timed_out: outcome.timed_out,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_matcher_does_not_interpret_regex() {
        let matcher = LineMatcher::new("test[0-9]+", false).unwrap();
        assert!(matcher.is_match("see test[0-9]+ here"));
        assert!(!matcher.is_match("test42"));
    }

    #[test]
    fn test_regex_matcher() {
        let matcher = LineMatcher::new(r"fn\s+\w+", true).unwrap();
        assert!(matcher.is_match("pub fn main() {}"));
        assert!(!matcher.is_match("let f = 1;"));
    }

    #[test]
    fn test_invalid_regex_is_invalid_pattern() {
        let err = LineMatcher::new("(unclosed", true).unwrap_err();
        assert_eq!(err.code(), "INVALID_PATTERN");
    }

    #[test]
    fn test_scan_numbers_lines_from_one() {
        let matcher = LineMatcher::new("hit", false).unwrap();
        let found = matcher.scan("miss\nhit one\r\nmiss\nhit two");
        assert_eq!(
            found,
            vec![
                LineMatch {
                    line_number: 2,
                    line_content: "hit one".into()
                },
                LineMatch {
                    line_number: 4,
                    line_content: "hit two".into()
                },
            ]
        );
    }
}
