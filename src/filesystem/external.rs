//! Subprocess plumbing for the ripgrep and POSIX grep search tiers

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::time::Instant;

use crate::protocol::MatchRecord;

use super::config::PER_FILE_GREP_TIMEOUT;
use super::search::{SearchContext, SearchTier, TierOutcome};
use super::security::ConfinedPaths;
use super::tools::PosixTools;

/// Stdout of a child process, collected line by line
#[derive(Debug, Default)]
pub struct StreamedLines {
    pub lines: Vec<String>,
    /// Set when the deadline hit first; the child was killed
    pub timed_out: bool,
    /// Exit status, when the child ran to completion
    pub status: Option<ExitStatus>,
}

/// Spawn `cmd` and read its stdout until EOF or `deadline`.
///
/// Returns `None` only when the process could not be started. Lines read
/// before a timeout are kept.
pub async fn stream_lines(mut cmd: Command, deadline: Instant) -> Option<StreamedLines> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            tracing::debug!("Failed to spawn {:?}: {}", cmd.as_std().get_program(), e);
            return None;
        }
    };
    let stdout = child.stdout.take()?;
    let mut segments = BufReader::new(stdout).split(b'\n');

    let mut streamed = StreamedLines::default();
    loop {
        match tokio::time::timeout_at(deadline, segments.next_segment()).await {
            Ok(Ok(Some(raw))) => {
                let line = String::from_utf8_lossy(&raw);
                streamed
                    .lines
                    .push(line.trim_end_matches('\r').to_string());
            }
            Ok(Ok(None)) => break,
            Ok(Err(e)) => {
                tracing::debug!("Error reading child stdout: {}", e);
                break;
            }
            Err(_) => {
                streamed.timed_out = true;
                let _ = child.start_kill();
                return Some(streamed);
            }
        }
    }

    match tokio::time::timeout_at(deadline, child.wait()).await {
        Ok(Ok(status)) => streamed.status = Some(status),
        Ok(Err(e)) => tracing::debug!("Failed to reap child: {}", e),
        Err(_) => {
            streamed.timed_out = true;
            let _ = child.start_kill();
        }
    }
    Some(streamed)
}

/// Split a ripgrep `path:line:content` line.
///
/// The delimiters are the first two colons, except a colon at index 1 that
/// follows a drive letter and precedes a separator (`C:\x` or `C:/x`).
/// Anything that does not yield three fields with a positive line number is
/// rejected.
pub fn parse_rg_line(line: &str) -> Option<(&str, usize, &str)> {
    let bytes = line.as_bytes();
    let mut delimiters = [0usize; 2];
    let mut found = 0;

    for (i, &b) in bytes.iter().enumerate() {
        if b != b':' {
            continue;
        }
        if i == 1
            && bytes[0].is_ascii_alphabetic()
            && matches!(bytes.get(2), Some(b'\\') | Some(b'/'))
        {
            continue;
        }
        delimiters[found] = i;
        found += 1;
        if found == 2 {
            break;
        }
    }
    if found < 2 {
        return None;
    }

    let [first, second] = delimiters;
    let file = &line[..first];
    let line_number = line[first + 1..second].parse::<usize>().ok()?;
    if file.is_empty() || line_number == 0 {
        return None;
    }
    Some((file, line_number, &line[second + 1..]))
}

/// ripgrep over the whole directory in one process
pub struct RipgrepTier {
    binary: PathBuf,
}

impl RipgrepTier {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn command(&self, ctx: &SearchContext<'_>) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("--line-number")
            .arg("--no-heading")
            .arg("--with-filename")
            .arg("--color")
            .arg("never")
            .arg("--hidden")
            .arg("--no-messages");
        if !ctx.use_regex {
            cmd.arg("--fixed-strings");
        }
        if !ctx.glob.is_match_all() {
            cmd.arg("--glob").arg(ctx.glob.as_str());
        }
        cmd.arg("--").arg(ctx.query).arg(ctx.dir);
        cmd.current_dir(ctx.validator.root());
        cmd
    }
}

impl SearchTier for RipgrepTier {
    fn name(&self) -> &'static str {
        "ripgrep"
    }

    fn attempt<'a>(&'a self, ctx: &'a SearchContext<'a>) -> BoxFuture<'a, Option<TierOutcome>> {
        async move {
            let streamed = stream_lines(self.command(ctx), ctx.deadline).await?;

            let mut confined = ConfinedPaths::new(ctx.validator);
            let mut matches = Vec::new();
            for line in &streamed.lines {
                let Some((file, line_number, content)) = parse_rg_line(line) else {
                    continue;
                };
                if let Some(file_path) = confined.relative(Path::new(file)) {
                    matches.push(MatchRecord {
                        file_path,
                        line_number,
                        line_content: content.to_string(),
                    });
                }
            }

            // Exit code 2 means ripgrep itself failed; with nothing parsed
            // there is nothing worth keeping.
            if !streamed.timed_out
                && matches.is_empty()
                && streamed.status.and_then(|s| s.code()).map_or(true, |c| c > 1)
            {
                return None;
            }

            Some(TierOutcome {
                matches,
                timed_out: streamed.timed_out,
            })
        }
        .boxed()
    }
}

/// `find` to enumerate files, then one `grep` per file
pub struct PosixGrepTier {
    tools: PosixTools,
}

impl PosixGrepTier {
    pub fn new(tools: PosixTools) -> Self {
        Self { tools }
    }

    async fn list_files(&self, ctx: &SearchContext<'_>) -> Option<Vec<PathBuf>> {
        // The listing gets half of what is left; grep gets the rest.
        let now = Instant::now();
        let find_deadline = now + ctx.deadline.saturating_duration_since(now) / 2;

        let mut cmd = Command::new(&self.tools.find);
        cmd.arg(ctx.dir).arg("-type").arg("f");
        if !ctx.glob.is_match_all() {
            cmd.arg("-name").arg(ctx.glob.as_str());
        }
        let streamed = stream_lines(cmd, find_deadline).await?;
        if streamed.timed_out {
            tracing::debug!(
                "find listing cut short after {} files, continuing with grep",
                streamed.lines.len()
            );
        }

        Some(
            streamed
                .lines
                .into_iter()
                .filter(|line| !line.is_empty())
                .map(PathBuf::from)
                .collect(),
        )
    }

    async fn grep_file(&self, ctx: &SearchContext<'_>, file: &Path) -> GrepOutcome {
        let remaining = ctx.deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return GrepOutcome::OutOfTime;
        }
        let budget = remaining.min(PER_FILE_GREP_TIMEOUT);

        let mut cmd = Command::new(&self.tools.grep);
        cmd.arg("-n")
            .arg(if ctx.use_regex { "-E" } else { "-F" })
            .arg("-e")
            .arg(ctx.query)
            .arg("--")
            .arg(file)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        match tokio::time::timeout(budget, cmd.output()).await {
            // 0 = matches, 1 = none; anything else is a grep error for this file.
            Ok(Ok(output)) if matches!(output.status.code(), Some(0) | Some(1)) => {
                GrepOutcome::Lines(String::from_utf8_lossy(&output.stdout).into_owned())
            }
            Ok(Ok(_)) | Ok(Err(_)) => GrepOutcome::Skipped,
            Err(_) if budget < PER_FILE_GREP_TIMEOUT => GrepOutcome::OutOfTime,
            Err(_) => GrepOutcome::Skipped,
        }
    }
}

enum GrepOutcome {
    Lines(String),
    Skipped,
    OutOfTime,
}

impl SearchTier for PosixGrepTier {
    fn name(&self) -> &'static str {
        "posix grep"
    }

    fn attempt<'a>(&'a self, ctx: &'a SearchContext<'a>) -> BoxFuture<'a, Option<TierOutcome>> {
        async move {
            let files = self.list_files(ctx).await?;

            let mut confined = ConfinedPaths::new(ctx.validator);
            let mut outcome = TierOutcome::default();
            for file in files {
                let Some(file_path) = confined.relative(&file) else {
                    continue;
                };
                let output = match self.grep_file(ctx, &file).await {
                    GrepOutcome::Lines(output) => output,
                    GrepOutcome::Skipped => continue,
                    GrepOutcome::OutOfTime => {
                        outcome.timed_out = true;
                        break;
                    }
                };

                for line in output.lines() {
                    let Some((number, content)) = line.split_once(':') else {
                        continue;
                    };
                    let Ok(line_number) = number.parse::<usize>() else {
                        continue;
                    };
                    outcome.matches.push(MatchRecord {
                        file_path: file_path.clone(),
                        line_number,
                        line_content: content.trim_end_matches('\r').to_string(),
                    });
                }
            }
            Some(outcome)
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rg_line_unix_path() {
        assert_eq!(
            parse_rg_line("src/main.rs:12:fn main() {"),
            Some(("src/main.rs", 12, "fn main() {"))
        );
    }

    #[test]
    fn test_parse_rg_line_keeps_colons_in_content() {
        assert_eq!(
            parse_rg_line("a.py:3:x = {'k': 1}"),
            Some(("a.py", 3, "x = {'k': 1}"))
        );
    }

    #[test]
    fn test_parse_rg_line_windows_drive_letter() {
        assert_eq!(
            parse_rg_line(r"C:\work\proj\lib.rs:7:let x = 1;"),
            Some((r"C:\work\proj\lib.rs", 7, "let x = 1;"))
        );
        assert_eq!(
            parse_rg_line("D:/proj/lib.rs:1:"),
            Some(("D:/proj/lib.rs", 1, ""))
        );
    }

    #[test]
    fn test_parse_rg_line_rejects_malformed() {
        assert_eq!(parse_rg_line("no delimiters here"), None);
        assert_eq!(parse_rg_line("file.rs:notanumber:content"), None);
        assert_eq!(parse_rg_line("file.rs:0:content"), None);
        assert_eq!(parse_rg_line(":3:content"), None);
        assert_eq!(parse_rg_line("only:one"), None);
    }

    #[tokio::test]
    async fn test_stream_lines_reports_spawn_failure() {
        let cmd = Command::new("definitely-not-a-real-binary-9c2e");
        let deadline = Instant::now() + std::time::Duration::from_secs(5);
        assert!(stream_lines(cmd, deadline).await.is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stream_lines_keeps_partial_output_on_timeout() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("echo first; sleep 5; echo second");
        let deadline = Instant::now() + std::time::Duration::from_millis(500);

        let streamed = stream_lines(cmd, deadline).await.unwrap();
        assert!(streamed.timed_out);
        assert_eq!(streamed.lines, vec!["first".to_string()]);
        assert!(streamed.status.is_none());
    }
}
