//! Result records returned by the inspection tools
//!
//! Every path-bearing field is relative to the project root and uses forward
//! slashes, whichever execution tier produced it.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    Name,
    Size,
    Time,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    File,
    Dir,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub size: u64,
    pub mtime: f64, // Unix timestamp, seconds
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryListing {
    pub entries: Vec<FileEntry>,
    pub total: usize,
    pub truncated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeNode {
    pub name: String,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub depth: usize,
    /// Present only for directories that were expanded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<TreeNode>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeResult {
    pub tree: TreeNode,
    pub max_depth_reached: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextFile {
    pub file_name: String,
    pub file_path: String,
    pub size: u64,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectContext {
    pub files: Vec<ContextFile>,
    pub message: String,
    pub total_found: usize,
}

/// A matching line inside a single file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineMatch {
    pub line_number: usize,
    pub line_content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSearchResult {
    pub matches: Vec<LineMatch>,
    pub total_matches: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MatchRecord {
    pub file_path: String,
    pub line_number: usize,
    pub line_content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResults {
    pub matches: Vec<MatchRecord>,
    pub total_matches: usize,
    pub timed_out: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoundFiles {
    pub files: Vec<String>,
    pub total_found: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentFile {
    pub path: String,
    pub mtime: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentFiles {
    pub files: Vec<RecentFile>,
    pub total_found: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileContent {
    pub content: String,
    pub encoding: String,
    pub line_count: usize,
    pub file_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadResult {
    pub content: String,
    pub encoding: String,
    pub line_count: usize,
    pub file_path: String,
    pub is_partial: bool,
    pub total_lines: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub code: String,
    pub message: String,
}

/// One element of a batch read: the file's content or the reason it failed
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BatchReadEntry {
    Success(FileContent),
    Failure { file_path: String, error: ErrorRecord },
}

impl BatchReadEntry {
    pub fn file_path(&self) -> &str {
        match self {
            BatchReadEntry::Success(file) => &file.file_path,
            BatchReadEntry::Failure { file_path, .. } => file_path,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, BatchReadEntry::Success(_))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReadResult {
    pub files: Vec<BatchReadEntry>,
    pub success_count: usize,
    pub error_count: usize,
}

/// Failure kinds surfaced to callers.
///
/// The `Display` text always starts with the stable code so agents can branch
/// on it without parsing prose.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToolError {
    #[error("PATH_SECURITY_ERROR: Path resolves outside project root: {path}")]
    PathSecurity { path: String },
    #[error("FILE_NOT_FOUND: File does not exist: {path}")]
    FileNotFound { path: String },
    #[error("PATH_NOT_FOUND: Path does not exist: {path}")]
    PathNotFound { path: String },
    #[error("NOT_A_DIRECTORY: Path is not a directory: {path}")]
    NotADirectory { path: String },
    #[error("IS_A_DIRECTORY: Path is a directory, not a file: {path}")]
    IsADirectory { path: String },
    #[error("PERMISSION_DENIED: Cannot access {path}")]
    PermissionDenied { path: String },
    #[error("BINARY_FILE: File appears to be binary: {path}")]
    BinaryFile { path: String },
    #[error("INVALID_PATTERN: {pattern}: {reason}")]
    InvalidPattern { pattern: String, reason: String },
    #[error("INVALID_RANGE: {message}")]
    InvalidRange { message: String },
    #[error("INVALID_ARGUMENT: {message}")]
    InvalidArgument { message: String },
    #[error("CONFIGURATION_ERROR: {message}")]
    Configuration { message: String },
    #[error("IO_ERROR: {message}")]
    Io { message: String },
}

impl ToolError {
    pub fn code(&self) -> &'static str {
        match self {
            ToolError::PathSecurity { .. } => "PATH_SECURITY_ERROR",
            ToolError::FileNotFound { .. } => "FILE_NOT_FOUND",
            ToolError::PathNotFound { .. } => "PATH_NOT_FOUND",
            ToolError::NotADirectory { .. } => "NOT_A_DIRECTORY",
            ToolError::IsADirectory { .. } => "IS_A_DIRECTORY",
            ToolError::PermissionDenied { .. } => "PERMISSION_DENIED",
            ToolError::BinaryFile { .. } => "BINARY_FILE",
            ToolError::InvalidPattern { .. } => "INVALID_PATTERN",
            ToolError::InvalidRange { .. } => "INVALID_RANGE",
            ToolError::InvalidArgument { .. } => "INVALID_ARGUMENT",
            ToolError::Configuration { .. } => "CONFIGURATION_ERROR",
            ToolError::Io { .. } => "IO_ERROR",
        }
    }

    pub fn to_record(&self) -> ErrorRecord {
        ErrorRecord {
            code: self.code().to_string(),
            message: self.to_string(),
        }
    }

    /// Map an I/O failure on a file target
    pub fn from_file_io(err: &std::io::Error, path: &str) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => ToolError::FileNotFound {
                path: path.to_string(),
            },
            _ => Self::from_io(err, path),
        }
    }

    /// Map an I/O failure on a directory or start path
    pub fn from_path_io(err: &std::io::Error, path: &str) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => ToolError::PathNotFound {
                path: path.to_string(),
            },
            _ => Self::from_io(err, path),
        }
    }

    fn from_io(err: &std::io::Error, path: &str) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => ToolError::PermissionDenied {
                path: path.to_string(),
            },
            _ => ToolError::Io {
                message: format!("{}: {}", path, err),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_starts_with_code() {
        let errors = vec![
            ToolError::PathSecurity { path: "../x".into() },
            ToolError::FileNotFound { path: "a.txt".into() },
            ToolError::PathNotFound { path: "dir".into() },
            ToolError::NotADirectory { path: "a.txt".into() },
            ToolError::IsADirectory { path: "src".into() },
            ToolError::PermissionDenied { path: "secret".into() },
            ToolError::BinaryFile { path: "a.bin".into() },
            ToolError::InvalidPattern {
                pattern: "(".into(),
                reason: "unclosed group".into(),
            },
            ToolError::InvalidRange { message: "start > end".into() },
            ToolError::InvalidArgument { message: "bad".into() },
            ToolError::Configuration { message: "no root".into() },
            ToolError::Io { message: "boom".into() },
        ];
        for err in errors {
            let text = err.to_string();
            assert!(
                text.starts_with(&format!("{}: ", err.code())),
                "{} should start with {}",
                text,
                err.code()
            );
        }
    }

    #[test]
    fn test_io_error_mapping() {
        let missing = std::io::Error::from(std::io::ErrorKind::NotFound);
        let denied = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
        assert_eq!(
            ToolError::from_file_io(&missing, "a.txt").code(),
            "FILE_NOT_FOUND"
        );
        assert_eq!(ToolError::from_path_io(&missing, "dir").code(), "PATH_NOT_FOUND");
        assert_eq!(
            ToolError::from_file_io(&denied, "a.txt").code(),
            "PERMISSION_DENIED"
        );
    }

    #[test]
    fn test_batch_entries_serialize_flat() {
        let ok = BatchReadEntry::Success(FileContent {
            content: "hi\n".into(),
            encoding: "utf-8".into(),
            line_count: 1,
            file_path: "a.txt".into(),
        });
        let failed = BatchReadEntry::Failure {
            file_path: "b.txt".into(),
            error: ToolError::FileNotFound { path: "b.txt".into() }.to_record(),
        };

        let ok = serde_json::to_value(&ok).unwrap();
        assert_eq!(ok["file_path"], "a.txt");
        assert_eq!(ok["line_count"], 1);
        assert!(ok.get("error").is_none());

        let failed = serde_json::to_value(&failed).unwrap();
        assert_eq!(failed["file_path"], "b.txt");
        assert_eq!(failed["error"]["code"], "FILE_NOT_FOUND");
        assert!(failed.get("content").is_none());
    }

    #[test]
    fn test_tree_node_omits_missing_children() {
        let leaf = TreeNode {
            name: "deep".into(),
            entry_type: EntryType::Dir,
            depth: 3,
            children: None,
        };
        let json = serde_json::to_value(&leaf).unwrap();
        assert_eq!(json["type"], "dir");
        assert!(json.get("children").is_none());
    }
}
