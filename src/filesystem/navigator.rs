use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;

use crate::protocol::{
    ContextFile, DirectoryListing, EntryType, FileEntry, ProjectContext, SortField, SortOrder,
    ToolError, TreeNode, TreeResult,
};

use super::config::{CONTEXT_FILE_NAMES, MAX_TREE_DEPTH};
use super::content::read_text_file;
use super::finder::unix_seconds;
use super::path_utils::to_protocol_path;
use super::security::PathValidator;

#[derive(Clone)]
pub struct Navigator {
    validator: Arc<PathValidator>,
}

impl Navigator {
    pub fn new(validator: Arc<PathValidator>) -> Self {
        Self { validator }
    }

    /// List the immediate children of `path`.
    ///
    /// A positive `limit` caps the returned entries; zero or negative means
    /// unlimited.
    pub async fn list_directory(
        &self,
        path: &str,
        sort_by: SortField,
        order: SortOrder,
        limit: i64,
    ) -> Result<DirectoryListing, ToolError> {
        let dir = self.open_dir(path).await?;

        let mut entries = Vec::new();
        let mut read_dir = fs::read_dir(&dir)
            .await
            .map_err(|e| ToolError::from_path_io(&e, path))?;
        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| ToolError::from_path_io(&e, path))?
        {
            let entry_path = entry.path();
            let Ok(link_metadata) = fs::symlink_metadata(&entry_path).await else {
                continue;
            };
            // Links are only followed when their target stays inside the root;
            // dangling or escaping links describe the link itself.
            let metadata = if link_metadata.file_type().is_symlink()
                && self.validator.confines(&entry_path)
            {
                fs::metadata(&entry_path).await.unwrap_or(link_metadata)
            } else {
                link_metadata
            };
            let Some(relative) = to_protocol_path(self.validator.root(), &entry_path) else {
                continue;
            };

            entries.push(FileEntry {
                name: entry.file_name().to_string_lossy().to_string(),
                entry_type: if metadata.is_dir() {
                    EntryType::Dir
                } else {
                    EntryType::File
                },
                size: if metadata.is_dir() { 0 } else { metadata.len() },
                mtime: metadata.modified().map(unix_seconds).unwrap_or(0.0),
                path: relative,
            });
        }

        sort_entries(&mut entries, sort_by, order);

        let total = entries.len();
        let truncated = limit > 0 && total > limit as usize;
        if truncated {
            entries.truncate(limit as usize);
        }

        Ok(DirectoryListing {
            entries,
            total,
            truncated,
        })
    }

    /// Depth-first tree of `path`, the root at depth 0
    pub async fn show_tree(&self, path: &str, max_depth: usize) -> Result<TreeResult, ToolError> {
        let dir = self.open_dir(path).await?;
        if !(1..=MAX_TREE_DEPTH).contains(&max_depth) {
            return Err(ToolError::InvalidArgument {
                message: format!(
                    "max_depth must be between 1 and {}, got {}",
                    MAX_TREE_DEPTH, max_depth
                ),
            });
        }
        let name = if dir == self.validator.root() {
            ".".to_string()
        } else {
            dir.file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.to_string())
        };

        tokio::task::spawn_blocking(move || {
            let mut max_depth_reached = false;
            let tree = build_tree(&dir, name, 0, max_depth, &mut max_depth_reached);
            TreeResult {
                tree,
                max_depth_reached,
            }
        })
        .await
        .map_err(|e| ToolError::Io {
            message: format!("tree walk failed: {}", e),
        })
    }

    /// Agent context files sitting directly in the project root
    pub async fn read_project_context(&self) -> ProjectContext {
        let mut files = Vec::new();

        for name in CONTEXT_FILE_NAMES {
            let path = self.validator.root().join(name);
            let Ok(metadata) = fs::metadata(&path).await else {
                continue;
            };
            if !metadata.is_file() {
                continue;
            }
            match read_text_file(&path, name).await {
                Ok(decoded) => files.push(ContextFile {
                    file_name: name.to_string(),
                    file_path: name.to_string(),
                    size: metadata.len(),
                    content: decoded.text,
                }),
                Err(e) => tracing::warn!("Skipping context file {}: {}", name, e),
            }
        }

        let message = if files.is_empty() {
            "No context files found in project root".to_string()
        } else {
            let names: Vec<&str> = files.iter().map(|f| f.file_name.as_str()).collect();
            format!("Found {} context file(s): {}", files.len(), names.join(", "))
        };

        ProjectContext {
            total_found: files.len(),
            files,
            message,
        }
    }

    async fn open_dir(&self, path: &str) -> Result<PathBuf, ToolError> {
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
}

fn build_tree(
    dir: &Path,
    name: String,
    depth: usize,
    max_depth: usize,
    max_depth_reached: &mut bool,
) -> TreeNode {
    let leaf = |children| TreeNode {
        name: name.clone(),
        entry_type: EntryType::Dir,
        depth,
        children,
    };

    // Unreadable directories become leaves.
    let read_dir = match std::fs::read_dir(dir) {
        Ok(rd) => rd,
        Err(e) => {
            tracing::debug!("show_tree: cannot read {}: {}", dir.display(), e);
            return leaf(None);
        }
    };

    if depth >= max_depth {
        if read_dir.flatten().next().is_some() {
            *max_depth_reached = true;
        }
        return leaf(None);
    }

    let mut children: Vec<(String, PathBuf, std::fs::FileType)> = read_dir
        .flatten()
        .filter_map(|entry| {
            let file_type = entry.file_type().ok()?;
            Some((
                entry.file_name().to_string_lossy().to_string(),
                entry.path(),
                file_type,
            ))
        })
        .collect();
    children.sort_by(|a, b| a.0.cmp(&b.0));

    let nodes = children
        .into_iter()
        .map(|(child_name, child_path, file_type)| {
            if file_type.is_dir() {
                build_tree(&child_path, child_name, depth + 1, max_depth, max_depth_reached)
            } else {
                // Symlinks are reported by target kind but never descended.
                let is_dir = file_type.is_symlink()
                    && std::fs::metadata(&child_path).is_ok_and(|m| m.is_dir());
                TreeNode {
                    name: child_name,
                    entry_type: if is_dir { EntryType::Dir } else { EntryType::File },
                    depth: depth + 1,
                    children: None,
                }
            }
        })
        .collect();

    leaf(Some(nodes))
}

fn sort_entries(entries: &mut [FileEntry], sort_by: SortField, order: SortOrder) {
    entries.sort_by(|a, b| {
        let ord = match sort_by {
            SortField::Name => a.name.cmp(&b.name),
            SortField::Size => a.size.cmp(&b.size),
            SortField::Time => a.mtime.total_cmp(&b.mtime),
        }
        .then_with(|| a.name.cmp(&b.name));

        match order {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        }
    });
}
