//! Tool catalog, typed arguments and dispatch onto the project service

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::filesystem::config::{DEFAULT_TAIL_LINES, DEFAULT_TREE_DEPTH, MAX_TREE_DEPTH};
use crate::filesystem::ProjectService;
use crate::protocol::{SortField, SortOrder, ToolError};

use super::guide;
use super::protocol::{ToolCallResult, ToolDefinition};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolCategory {
    Navigation,
    Search,
    Read,
    Guide,
}

impl ToolCategory {
    pub const ALL: [ToolCategory; 4] = [
        ToolCategory::Navigation,
        ToolCategory::Search,
        ToolCategory::Read,
        ToolCategory::Guide,
    ];

    pub fn title(self) -> &'static str {
        match self {
            ToolCategory::Navigation => "Navigation",
            ToolCategory::Search => "Search",
            ToolCategory::Read => "Read",
            ToolCategory::Guide => "Guide",
        }
    }
}

/// A registered tool and the guide section it belongs to
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub category: ToolCategory,
    pub definition: ToolDefinition,
}

fn entry(category: ToolCategory, name: &str, description: &str, input_schema: Value) -> CatalogEntry {
    CatalogEntry {
        category,
        definition: ToolDefinition {
            name: name.to_string(),
            description: description.to_string(),
            input_schema,
        },
    }
}

/// Every tool, in registration order
pub fn tool_catalog() -> Vec<CatalogEntry> {
    use ToolCategory::*;
    vec![
        entry(
            Navigation,
            "list_directory",
            "List directory contents with sorting and limiting. Returns entries (name, type, size, mtime, path), total and truncated.",
            json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "Directory relative to the project root (default: \".\")" },
                    "sort_by": { "type": "string", "enum": ["name", "size", "time"], "description": "Sort field (default: name)" },
                    "order": { "type": "string", "enum": ["asc", "desc"], "description": "Sort order (default: asc)" },
                    "limit": { "type": "integer", "description": "Maximum entries to return, -1 for unlimited (default: -1)" }
                }
            }),
        ),
        entry(
            Navigation,
            "show_tree",
            "Show the directory tree. Directories at max_depth are not expanded; max_depth_reached reports whether that hid anything.",
            json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "Directory relative to the project root (default: \".\")" },
                    "max_depth": { "type": "integer", "minimum": 1, "maximum": MAX_TREE_DEPTH, "description": "Depth limit (default: 3)" }
                }
            }),
        ),
        entry(
            Navigation,
            "read_project_context",
            "Read the agent context files (AGENTS.md, CLAUDE.md) from the project root.",
            json!({ "type": "object", "properties": {} }),
        ),
        entry(
            Search,
            "search_in_file",
            "Search one file for a literal string or regular expression. Returns matching lines with 1-based line numbers.",
            json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "Text or pattern to find" },
                    "file_path": { "type": "string", "description": "File relative to the project root" },
                    "use_regex": { "type": "boolean", "description": "Treat query as a regular expression (default: false)" }
                },
                "required": ["query", "file_path"]
            }),
        ),
        entry(
            Search,
            "search_in_files",
            "Search every file under a directory. Uses ripgrep when installed, then grep, then an in-process scan. timed_out is set when the budget ran out; matches found so far are kept.",
            json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "Text or pattern to find" },
                    "file_pattern": { "type": "string", "description": "File name glob, e.g. \"*.py\" (default: \"*\")" },
                    "path": { "type": "string", "description": "Directory relative to the project root (default: \".\")" },
                    "use_regex": { "type": "boolean", "description": "Treat query as a regular expression (default: false)" },
                    "exclude_query": { "type": "string", "description": "Drop matching lines that contain this text" },
                    "timeout": { "type": "integer", "minimum": 1, "description": "Budget in seconds (default: server search timeout)" }
                },
                "required": ["query"]
            }),
        ),
        entry(
            Search,
            "find_files_by_name",
            "Find files whose name matches a glob pattern.",
            json!({
                "type": "object",
                "properties": {
                    "name_pattern": { "type": "string", "description": "Glob, e.g. \"*.rs\" or \"test_*\"" },
                    "path": { "type": "string", "description": "Directory relative to the project root (default: \".\")" }
                },
                "required": ["name_pattern"]
            }),
        ),
        entry(
            Search,
            "find_recently_modified_files",
            "Find files modified within the last N hours, most recent first.",
            json!({
                "type": "object",
                "properties": {
                    "hours_ago": { "type": "integer", "minimum": 1, "description": "Look-back window in hours" },
                    "path": { "type": "string", "description": "Directory relative to the project root (default: \".\")" },
                    "file_pattern": { "type": "string", "description": "File name glob (default: \"*\")" }
                },
                "required": ["hours_ago"]
            }),
        ),
        entry(
            Read,
            "read_entire_file",
            "Read a complete text file. Binary files are rejected with BINARY_FILE.",
            json!({
                "type": "object",
                "properties": {
                    "file_path": { "type": "string", "description": "File relative to the project root" }
                },
                "required": ["file_path"]
            }),
        ),
        entry(
            Read,
            "read_file_lines",
            "Read an inclusive 1-based line range. end_line past the end of the file is clamped.",
            json!({
                "type": "object",
                "properties": {
                    "file_path": { "type": "string", "description": "File relative to the project root" },
                    "start_line": { "type": "integer", "minimum": 1, "description": "First line (1-based)" },
                    "end_line": { "type": "integer", "minimum": 1, "description": "Last line, inclusive" }
                },
                "required": ["file_path", "start_line", "end_line"]
            }),
        ),
        entry(
            Read,
            "read_file_tail",
            "Read the last N lines of a file.",
            json!({
                "type": "object",
                "properties": {
                    "file_path": { "type": "string", "description": "File relative to the project root" },
                    "num_lines": { "type": "integer", "minimum": 1, "description": "Lines to return (default: 10)" }
                },
                "required": ["file_path"]
            }),
        ),
        entry(
            Read,
            "read_files",
            "Read several files at once. Each file succeeds or fails on its own; success_count + error_count equals the number of paths.",
            json!({
                "type": "object",
                "properties": {
                    "file_paths": { "type": "array", "items": { "type": "string" }, "description": "Files relative to the project root" }
                },
                "required": ["file_paths"]
            }),
        ),
        entry(
            Guide,
            "get_tool_usage_guide",
            "Return Markdown documentation for the registered tools, optionally filtered by name.",
            json!({
                "type": "object",
                "properties": {
                    "tool_names": { "type": ["array", "null"], "items": { "type": "string" }, "description": "Tools to document (default: all)" }
                }
            }),
        ),
    ]
}

pub fn tool_definitions() -> Vec<ToolDefinition> {
    tool_catalog().into_iter().map(|e| e.definition).collect()
}

fn dot() -> String {
    ".".to_string()
}

fn match_all() -> String {
    "*".to_string()
}

fn unlimited() -> i64 {
    -1
}

fn default_tree_depth() -> usize {
    DEFAULT_TREE_DEPTH
}

fn default_tail_lines() -> usize {
    DEFAULT_TAIL_LINES
}

#[derive(Deserialize)]
struct ListDirectoryArgs {
    #[serde(default = "dot")]
    path: String,
    #[serde(default)]
    sort_by: SortField,
    #[serde(default)]
    order: SortOrder,
    #[serde(default = "unlimited")]
    limit: i64,
}

#[derive(Deserialize)]
struct ShowTreeArgs {
    #[serde(default = "dot")]
    path: String,
    #[serde(default = "default_tree_depth")]
    max_depth: usize,
}

#[derive(Deserialize)]
struct SearchInFileArgs {
    query: String,
    file_path: String,
    #[serde(default)]
    use_regex: bool,
}

#[derive(Deserialize)]
struct SearchInFilesArgs {
    query: String,
    #[serde(default = "match_all")]
    file_pattern: String,
    #[serde(default = "dot")]
    path: String,
    #[serde(default)]
    use_regex: bool,
    #[serde(default)]
    exclude_query: String,
    timeout: Option<u64>,
}

#[derive(Deserialize)]
struct FindFilesByNameArgs {
    name_pattern: String,
    #[serde(default = "dot")]
    path: String,
}

#[derive(Deserialize)]
struct FindRecentArgs {
    hours_ago: u64,
    #[serde(default = "dot")]
    path: String,
    #[serde(default = "match_all")]
    file_pattern: String,
}

#[derive(Deserialize)]
struct FilePathArgs {
    file_path: String,
}

#[derive(Deserialize)]
struct ReadFileLinesArgs {
    file_path: String,
    start_line: usize,
    end_line: usize,
}

#[derive(Deserialize)]
struct ReadFileTailArgs {
    file_path: String,
    #[serde(default = "default_tail_lines")]
    num_lines: usize,
}

#[derive(Deserialize)]
struct ReadFilesArgs {
    file_paths: Vec<String>,
}

#[derive(Deserialize)]
struct GuideArgs {
    #[serde(default)]
    tool_names: Option<Vec<String>>,
}

fn parse_args<T: DeserializeOwned>(tool: &str, arguments: &Value) -> Result<T, ToolError> {
    // Clients may send `null` for a tool without parameters.
    let arguments = if arguments.is_null() {
        json!({})
    } else {
        arguments.clone()
    };
    serde_json::from_value(arguments).map_err(|e| ToolError::InvalidArgument {
        message: format!("{}: {}", tool, e),
    })
}

fn render<T: Serialize>(result: Result<T, ToolError>) -> ToolCallResult {
    match result {
        Ok(value) => match serde_json::to_string_pretty(&value) {
            Ok(text) => ToolCallResult::success(text),
            Err(e) => ToolCallResult::error(
                ToolError::Io {
                    message: format!("failed to serialize result: {}", e),
                }
                .to_string(),
            ),
        },
        Err(e) => ToolCallResult::error(e.to_string()),
    }
}

/// Run one `tools/call`
pub async fn dispatch_tool(service: &ProjectService, name: &str, arguments: &Value) -> ToolCallResult {
    tracing::info!("tools/call {} {}", name, arguments);
    let result = match name {
        "list_directory" => render(
            async {
                let args: ListDirectoryArgs = parse_args(name, arguments)?;
                service
                    .navigator()
                    .list_directory(&args.path, args.sort_by, args.order, args.limit)
                    .await
            }
            .await,
        ),
        "show_tree" => render(
            async {
                let args: ShowTreeArgs = parse_args(name, arguments)?;
                service.navigator().show_tree(&args.path, args.max_depth).await
            }
            .await,
        ),
        "read_project_context" => render(Ok::<_, ToolError>(
            service.navigator().read_project_context().await,
        )),
        "search_in_file" => render(
            async {
                let args: SearchInFileArgs = parse_args(name, arguments)?;
                service
                    .search()
                    .search_in_file(&args.query, &args.file_path, args.use_regex)
                    .await
            }
            .await,
        ),
        "search_in_files" => render(
            async {
                let args: SearchInFilesArgs = parse_args(name, arguments)?;
                service
                    .search()
                    .search_in_files(
                        &args.query,
                        &args.file_pattern,
                        &args.path,
                        args.use_regex,
                        &args.exclude_query,
                        args.timeout.map(Duration::from_secs),
                    )
                    .await
            }
            .await,
        ),
        "find_files_by_name" => render(
            async {
                let args: FindFilesByNameArgs = parse_args(name, arguments)?;
                service
                    .finder()
                    .find_files_by_name(&args.name_pattern, &args.path)
                    .await
            }
            .await,
        ),
        "find_recently_modified_files" => render(
            async {
                let args: FindRecentArgs = parse_args(name, arguments)?;
                service
                    .finder()
                    .find_recently_modified_files(args.hours_ago, &args.path, &args.file_pattern)
                    .await
            }
            .await,
        ),
        "read_entire_file" => render(
            async {
                let args: FilePathArgs = parse_args(name, arguments)?;
                service.reader().read_entire_file(&args.file_path).await
            }
            .await,
        ),
        "read_file_lines" => render(
            async {
                let args: ReadFileLinesArgs = parse_args(name, arguments)?;
                service
                    .reader()
                    .read_file_lines(&args.file_path, args.start_line, args.end_line)
                    .await
            }
            .await,
        ),
        "read_file_tail" => render(
            async {
                let args: ReadFileTailArgs = parse_args(name, arguments)?;
                service
                    .reader()
                    .read_file_tail(&args.file_path, args.num_lines)
                    .await
            }
            .await,
        ),
        "read_files" => render(
            async {
                let args: ReadFilesArgs = parse_args(name, arguments)?;
                Ok(service.reader().read_files(&args.file_paths).await)
            }
            .await,
        ),
        "get_tool_usage_guide" => render(parse_args::<GuideArgs>(name, arguments).map(|args| {
            guide::generate_guide(&tool_catalog(), args.tool_names.as_deref())
        })),
        _ => ToolCallResult::error(
            ToolError::InvalidArgument {
                message: format!("Unknown tool: {}", name),
            }
            .to_string(),
        ),
    };

    if result.is_error {
        if let Some(content) = result.content.first() {
            tracing::warn!("{} failed: {}", name, content.text);
        }
    }
    result
}
