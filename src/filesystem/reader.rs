use std::sync::Arc;

use crate::protocol::{BatchReadEntry, BatchReadResult, FileContent, ReadResult, ToolError};

use super::content::{read_text_file, split_lines, DecodedText};
use super::security::PathValidator;

#[derive(Clone)]
pub struct FileReader {
    validator: Arc<PathValidator>,
}

impl FileReader {
    pub fn new(validator: Arc<PathValidator>) -> Self {
        Self { validator }
    }

    async fn load(&self, file_path: &str) -> Result<DecodedText, ToolError> {
        let path = self.validator.validate(file_path)?;
        read_text_file(&path, file_path).await
    }

    pub async fn read_entire_file(&self, file_path: &str) -> Result<FileContent, ToolError> {
        let decoded = self.load(file_path).await?;
        Ok(FileContent {
            line_count: decoded.lines().len(),
            content: decoded.text,
            encoding: decoded.encoding.to_string(),
            file_path: file_path.to_string(),
        })
    }

    /// Read the 1-indexed inclusive range `start_line..=end_line`.
    ///
    /// An `end_line` past the last line is clamped and the read still counts
    /// as partial; only an exact `1..=total_lines` request is complete.
    pub async fn read_file_lines(
        &self,
        file_path: &str,
        start_line: usize,
        end_line: usize,
    ) -> Result<ReadResult, ToolError> {
        let path = self.validator.validate(file_path)?;
        if start_line < 1 {
            return Err(ToolError::InvalidRange {
                message: format!("start_line must be >= 1, got {}", start_line),
            });
        }
        if start_line > end_line {
            return Err(ToolError::InvalidRange {
                message: format!(
                    "start_line ({}) must not exceed end_line ({})",
                    start_line, end_line
                ),
            });
        }

        let decoded = read_text_file(&path, file_path).await?;
        let lines = decoded.lines();
        let total_lines = lines.len();

        if total_lines == 0 {
            return Ok(partial_result(&decoded, file_path, String::new(), 0, true, 0));
        }
        if start_line > total_lines {
            return Err(ToolError::InvalidRange {
                message: format!(
                    "start_line ({}) is beyond the end of {} ({} lines)",
                    start_line, file_path, total_lines
                ),
            });
        }

        let end = end_line.min(total_lines);
        let content = lines[start_line - 1..end].concat();
        let is_partial = start_line > 1 || end_line > total_lines;

        Ok(partial_result(
            &decoded,
            file_path,
            content,
            end - start_line + 1,
            is_partial,
            total_lines,
        ))
    }

    /// Read the last `num_lines` lines, or the whole file if it is shorter
    pub async fn read_file_tail(
        &self,
        file_path: &str,
        num_lines: usize,
    ) -> Result<ReadResult, ToolError> {
        let path = self.validator.validate(file_path)?;
        if num_lines < 1 {
            return Err(ToolError::InvalidRange {
                message: format!("num_lines must be >= 1, got {}", num_lines),
            });
        }

        let decoded = read_text_file(&path, file_path).await?;
        let lines = decoded.lines();
        let total_lines = lines.len();

        if num_lines >= total_lines {
            let text = decoded.text.clone();
            return Ok(partial_result(
                &decoded,
                file_path,
                text,
                total_lines,
                false,
                total_lines,
            ));
        }

        let content = lines[total_lines - num_lines..].concat();
        Ok(partial_result(
            &decoded,
            file_path,
            content,
            num_lines,
            true,
            total_lines,
        ))
    }

    /// Read several files; one failure never aborts the rest
    pub async fn read_files(&self, file_paths: &[String]) -> BatchReadResult {
        let mut files = Vec::with_capacity(file_paths.len());
        for file_path in file_paths {
            let entry = match self.read_entire_file(file_path).await {
                Ok(content) => BatchReadEntry::Success(content),
                Err(e) => BatchReadEntry::Failure {
                    file_path: file_path.clone(),
                    error: e.to_record(),
                },
            };
            files.push(entry);
        }

        let success_count = files.iter().filter(|f| f.is_success()).count();
        for failed in files.iter().filter(|f| !f.is_success()) {
            tracing::debug!("read_files: {} failed", failed.file_path());
        }

        BatchReadResult {
            error_count: files.len() - success_count,
            success_count,
            files,
        }
    }
}

fn partial_result(
    decoded: &DecodedText,
    file_path: &str,
    content: String,
    line_count: usize,
    is_partial: bool,
    total_lines: usize,
) -> ReadResult {
    ReadResult {
        content,
        encoding: decoded.encoding.to_string(),
        line_count,
        file_path: file_path.to_string(),
        is_partial,
        total_lines,
    }
}
