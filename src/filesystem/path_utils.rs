use std::path::{Component, Path};

/// Render `path` relative to `root` with forward slashes.
///
/// Returns `None` when `path` does not live under `root`. The root itself
/// renders as ".".
pub fn to_protocol_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    if relative.as_os_str().is_empty() {
        return Some(".".to_string());
    }

    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if parts.is_empty() {
        return Some(".".to_string());
    }
    Some(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_protocol_path_is_relative_with_forward_slashes() {
        let root = PathBuf::from("/project");
        let nested = root.join("src").join("lib.rs");
        assert_eq!(to_protocol_path(&root, &nested).as_deref(), Some("src/lib.rs"));
        assert_eq!(to_protocol_path(&root, &root).as_deref(), Some("."));
    }

    #[test]
    fn test_protocol_path_rejects_outside_paths() {
        let root = PathBuf::from("/project");
        assert_eq!(to_protocol_path(&root, Path::new("/etc/passwd")), None);
        assert_eq!(to_protocol_path(&root, Path::new("/project/../etc")), None);
    }
}
