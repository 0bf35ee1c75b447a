use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use path_jail::Jail;

use crate::protocol::ToolError;

use super::config::ProjectConfig;
use super::path_utils::to_protocol_path;

/// Confines every user-supplied path to the project root.
///
/// Validation follows symlinks before the containment check and never
/// touches the target itself, so "escapes root" and "does not exist" stay
/// distinguishable for callers.
pub struct PathValidator {
    config: Arc<ProjectConfig>,
    jail: Jail,
}

impl PathValidator {
    pub fn new(config: Arc<ProjectConfig>) -> Result<Self, ToolError> {
        let jail = Jail::new(&config.root_path).map_err(|e| ToolError::Configuration {
            message: format!(
                "cannot confine to project root {}: {}",
                config.root_path.display(),
                e
            ),
        })?;
        Ok(Self { config, jail })
    }

    pub fn root(&self) -> &Path {
        &self.config.root_path
    }

    /// Resolve `relative_path` against the root and reject anything outside it.
    ///
    /// Every existing prefix is re-canonicalized as components are applied,
    /// so a symlink reached after `..` is still followed before the check.
    pub fn validate(&self, relative_path: &str) -> Result<PathBuf, ToolError> {
        self.jail.join(relative_path).map_err(|e| {
            tracing::debug!("Rejected path {:?}: {}", relative_path, e);
            ToolError::PathSecurity {
                path: relative_path.to_string(),
            }
        })
    }

    /// Whether an already-absolute path lies at or below the root after
    /// symlink resolution. Paths that cannot be resolved are not confined.
    pub fn confines(&self, path: &Path) -> bool {
        match path.canonicalize() {
            Ok(canonical) => self.is_within_root(&canonical),
            Err(_) => false,
        }
    }

    fn is_within_root(&self, path: &Path) -> bool {
        path == self.root() || path.starts_with(self.root())
    }
}

/// Memoized confinement of paths reported by a walk or an external tool.
///
/// Each distinct path is canonicalized once; paths outside the root map to
/// `None` and are dropped by callers.
pub struct ConfinedPaths<'a> {
    validator: &'a PathValidator,
    cache: HashMap<PathBuf, Option<String>>,
}

impl<'a> ConfinedPaths<'a> {
    pub fn new(validator: &'a PathValidator) -> Self {
        Self {
            validator,
            cache: HashMap::new(),
        }
    }

    /// Root-relative, forward-slash form of `path`, if it stays inside the root.
    /// Relative inputs are taken relative to the root.
    pub fn relative(&mut self, path: &Path) -> Option<String> {
        if let Some(hit) = self.cache.get(path) {
            return hit.clone();
        }

        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.validator.root().join(path)
        };
        let rendered = if self.validator.confines(&absolute) {
            to_protocol_path(self.validator.root(), &absolute)
        } else {
            tracing::debug!("Dropping path outside project root: {}", absolute.display());
            None
        };

        self.cache.insert(path.to_path_buf(), rendered.clone());
        rendered
    }
}
