use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use tokio::time::Instant;

use crate::protocol::ToolError;

/// File-name glob shared by every tier; `*` means "no filter"
#[derive(Debug, Clone)]
pub struct GlobFilter {
    raw: String,
    pattern: glob::Pattern,
}

impl GlobFilter {
    pub fn new(raw: &str) -> Result<Self, ToolError> {
        let raw = if raw.trim().is_empty() { "*" } else { raw };
        let pattern = glob::Pattern::new(raw).map_err(|e| ToolError::InvalidPattern {
            pattern: raw.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            raw: raw.to_string(),
            pattern,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_match_all(&self) -> bool {
        self.raw == "*"
    }

    /// The glob names a path below the search root rather than a file name.
    /// `find -name` and `fd --glob` only see base names, so such globs are
    /// left to the in-process walk.
    pub fn is_path_pattern(&self) -> bool {
        self.raw.contains('/')
    }

    /// Match by file name, or by the path below `base` when the glob has a slash
    pub fn matches(&self, base: &Path, path: &Path) -> bool {
        if self.is_match_all() {
            return true;
        }
        if self.is_path_pattern() {
            return path
                .strip_prefix(base)
                .map(|rel| self.pattern.matches_path(rel))
                .unwrap_or(false);
        }
        path.file_name()
            .map(|name| self.pattern.matches(&name.to_string_lossy()))
            .unwrap_or(false)
    }
}

/// Files collected by an in-process walk
#[derive(Debug, Default)]
pub struct WalkedFiles {
    pub files: Vec<PathBuf>,
    pub timed_out: bool,
}

/// Recursively collect regular files under `dir` that match `glob`.
///
/// Hidden files are included, ignore files are honoured, symlinks are not
/// followed. The deadline is checked on every entry. The walk itself runs on
/// the blocking pool.
pub async fn collect_files(dir: &Path, glob: &GlobFilter, deadline: Instant) -> WalkedFiles {
    let dir = dir.to_path_buf();
    let glob = glob.clone();
    match tokio::task::spawn_blocking(move || walk_files(&dir, &glob, deadline)).await {
        Ok(walked) => walked,
        Err(e) => {
            tracing::warn!("file walk failed: {}", e);
            WalkedFiles::default()
        }
    }
}

fn walk_files(dir: &Path, glob: &GlobFilter, deadline: Instant) -> WalkedFiles {
    let walker = WalkBuilder::new(dir)
        .hidden(false)
        .git_ignore(true)
        .git_global(true)
        .git_exclude(true)
        .follow_links(false)
        .build();

    let mut walked = WalkedFiles::default();
    for entry in walker {
        if Instant::now() >= deadline {
            walked.timed_out = true;
            break;
        }
        let entry = match entry {
            Ok(e) => e,
            Err(_) => continue,
        };
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }
        if glob.matches(dir, entry.path()) {
            walked.files.push(entry.into_path());
        }
    }
    walked
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_invalid_glob_is_invalid_pattern() {
        let err = GlobFilter::new("[").unwrap_err();
        assert_eq!(err.code(), "INVALID_PATTERN");
    }

    #[test]
    fn test_glob_matches_file_names_at_any_depth() {
        let glob = GlobFilter::new("*.rs").unwrap();
        let base = Path::new("/p");
        assert!(glob.matches(base, Path::new("/p/src/deep/lib.rs")));
        assert!(!glob.matches(base, Path::new("/p/src/lib.py")));
    }

    #[test]
    fn test_slash_glob_matches_relative_path() {
        let glob = GlobFilter::new("src/*.rs").unwrap();
        assert!(glob.is_path_pattern());
        assert!(!GlobFilter::new("*.rs").unwrap().is_path_pattern());
        let base = Path::new("/p");
        assert!(glob.matches(base, Path::new("/p/src/main.rs")));
        assert!(!glob.matches(base, Path::new("/p/main.rs")));
    }

    #[tokio::test]
    async fn test_collect_files_includes_hidden_and_nested() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("a/b")).unwrap();
        std::fs::write(temp.path().join("a/b/one.txt"), "1").unwrap();
        std::fs::write(temp.path().join(".hidden.txt"), "2").unwrap();
        std::fs::write(temp.path().join("skip.md"), "3").unwrap();

        let glob = GlobFilter::new("*.txt").unwrap();
        let deadline = Instant::now() + Duration::from_secs(10);
        let walked = collect_files(temp.path(), &glob, deadline).await;

        assert!(!walked.timed_out);
        let mut names: Vec<String> = walked
            .files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec![".hidden.txt", "one.txt"]);
    }

    #[tokio::test]
    async fn test_collect_files_stops_at_deadline() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("a.txt"), "1").unwrap();
        let glob = GlobFilter::new("*").unwrap();
        let walked = collect_files(temp.path(), &glob, Instant::now()).await;
        assert!(walked.timed_out);
        assert!(walked.files.is_empty());
    }
}
