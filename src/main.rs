//! context-mcp: read-only project inspection tools for coding agents, over MCP stdio

mod filesystem;
mod mcp;
mod protocol;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;

use filesystem::config::{ProjectConfig, DEFAULT_SEARCH_TIMEOUT_SECS, LOG_RETENTION_DAYS};
use filesystem::tools::ToolAvailability;
use filesystem::ProjectService;
use mcp::server::McpServer;

#[derive(Parser)]
#[command(name = "context-mcp", version, about, long_about = None)]
struct Args {
    /// Project root; every tool is confined to this directory
    #[arg(long, env = "PROJECT_ROOT")]
    root: PathBuf,

    /// Default time budget for multi-file search and file finding, in seconds
    #[arg(long, env = "SEARCH_TIMEOUT", default_value_t = DEFAULT_SEARCH_TIMEOUT_SECS)]
    search_timeout: u64,

    /// Log level (error, warn, info, debug, trace); RUST_LOG overrides it
    #[arg(long, env = "LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Log to this file instead of stderr, rotated daily and kept for a week
    /// (`logs/context-mcp.log` becomes `logs/context-mcp.<date>.log`)
    #[arg(long, env = "LOG_FILE")]
    log_file: Option<PathBuf>,
}

/// Daily-rotating appender for `path`: the stem becomes the file prefix and
/// the extension the suffix, with the date in between.
fn rolling_appender(path: &Path) -> std::io::Result<RollingFileAppender> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let prefix = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| "context-mcp".to_string());
    let mut builder = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(prefix)
        .max_log_files(LOG_RETENTION_DAYS);
    if let Some(ext) = path.extension() {
        builder = builder.filename_suffix(ext.to_string_lossy().to_string());
    }
    builder.build(dir).map_err(std::io::Error::other)
}

/// Logs never go to stdout: it carries the protocol.
fn init_logging(level: &str, log_file: Option<&Path>) -> std::io::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    match log_file {
        Some(path) => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(rolling_appender(path)?)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = init_logging(&args.log_level, args.log_file.as_deref()) {
        eprintln!("context-mcp: cannot open log file: {}", e);
        return ExitCode::FAILURE;
    }

    let config = match ProjectConfig::new(&args.root, args.search_timeout) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("context-mcp: {}", e);
            eprintln!("hint: set PROJECT_ROOT or pass --root <DIR> with an existing directory");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(
        "Starting context-mcp {} for {} (search timeout {:?})",
        env!("CARGO_PKG_VERSION"),
        config.root_path.display(),
        config.search_timeout
    );

    let tools = ToolAvailability::detect().await.clone();
    let service = match ProjectService::new(config, tools) {
        Ok(service) => service,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("context-mcp: {}", e);
            return ExitCode::FAILURE;
        }
    };
    service.tools().log_summary();

    let server = McpServer::new(Arc::new(service));
    match server.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("stdio transport failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_rolling_appender_writes_dated_file_next_to_requested_path() {
        let temp = TempDir::new().unwrap();
        let requested = temp.path().join("logs").join("server.log");

        let mut appender = rolling_appender(&requested).unwrap();
        appender.write_all(b"hello\n").unwrap();
        appender.flush().unwrap();

        let names: Vec<String> = std::fs::read_dir(temp.path().join("logs"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names.len(), 1, "{:?}", names);
        assert!(names[0].starts_with("server."), "{}", names[0]);
        assert!(names[0].ends_with(".log"), "{}", names[0]);
        assert_ne!(names[0], "server.log");
    }
}
