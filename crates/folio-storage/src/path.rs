//! Path validation and path-convention conversion.
//!
//! API paths carry a leading `/` and are relative to a project root. Local
//! mode resolves them against a real directory with [`validate_path`]; cloud
//! mode turns them into blob/ledger keys with [`to_storage_path`].

use std::path::{Component, Path, PathBuf};

use crate::error::{StorageError, StorageResult};

/// Resolve `relative` under `repo_root`, refusing anything that escapes it.
///
/// Existing paths are checked after symlink resolution, so a link inside the
/// repository pointing outside is rejected. Paths that don't exist yet (new
/// files) are checked through their deepest existing ancestor; dangling links
/// along the way are followed to where a write would land. A missing tail
/// may not contain `..`.
///
/// Returns the joined path, not the canonical one, so callers act on the path
/// the user named rather than a symlink target.
pub fn validate_path(repo_root: &Path, relative: &str) -> StorageResult<PathBuf> {
    let candidate = repo_root.join(relative.trim_start_matches('/'));

    let real_root =
        dunce::canonicalize(repo_root).map_err(|source| StorageError::RepoRootInaccessible {
            root: repo_root.to_path_buf(),
            source,
        })?;

    let inside = match dunce::canonicalize(&candidate) {
        Ok(real) => is_within(&real_root, &real),
        Err(_) => missing_path_within(&real_root, &candidate, MAX_LINK_HOPS),
    };

    if !inside {
        return Err(StorageError::path_traversal(relative));
    }
    Ok(candidate)
}

const MAX_LINK_HOPS: usize = 40;

/// Containment for a path that doesn't resolve: find the deepest ancestor
/// that exists and bounds-check where the rest would be created.
fn missing_path_within(real_root: &Path, path: &Path, hops: usize) -> bool {
    let mut ancestor = path;
    let mut tail = Vec::new();
    loop {
        if let Ok(meta) = std::fs::symlink_metadata(ancestor) {
            if meta.file_type().is_symlink() && dunce::canonicalize(ancestor).is_err() {
                // Dangling link: creating through it writes at its target.
                if hops == 0 {
                    return false;
                }
                let Ok(target) = std::fs::read_link(ancestor) else {
                    return false;
                };
                let mut next = match ancestor.parent() {
                    Some(parent) => parent.join(target),
                    None => target,
                };
                next.extend(tail.iter().rev());
                return missing_path_within(real_root, &next, hops - 1);
            }
            if tail.iter().any(|c| !matches!(c, Component::Normal(_))) {
                return false;
            }
            return match dunce::canonicalize(ancestor) {
                Ok(real) => is_within(real_root, &real),
                Err(_) => false,
            };
        }
        match (ancestor.parent(), ancestor.components().next_back()) {
            (Some(parent), Some(last)) => {
                tail.push(last);
                ancestor = parent;
            }
            _ => return false,
        }
    }
}

/// Component-wise containment: `/repo-other` is not inside `/repo`.
fn is_within(root: &Path, path: &Path) -> bool {
    path.starts_with(root)
}

/// API path → storage key: no leading slash, no empty or `.` segments.
///
/// `..` is rejected outright; there is no root on disk to resolve it against.
pub fn to_storage_path(path: &str) -> StorageResult<String> {
    let mut segments = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => return Err(StorageError::path_traversal(path)),
            s if s.contains('\\') || s.contains('\0') => {
                return Err(StorageError::invalid_path(path));
            }
            s => segments.push(s),
        }
    }
    Ok(segments.join("/"))
}

/// Storage key → API path.
pub fn to_api_path(path: &str) -> String {
    format!("/{}", path.trim_start_matches('/'))
}

/// API path of `name` inside the directory `dir` (either convention).
pub fn join_api_path(dir: &str, name: &str) -> String {
    match dir.trim_matches('/') {
        "" => format!("/{name}"),
        dir => format!("/{dir}/{name}"),
    }
}

/// Final segment of a storage or API path.
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Drop `.` and apply `..` without touching the filesystem.
    fn lexical_normalize(path: &Path) -> PathBuf {
        let mut result = PathBuf::new();
        for component in path.components() {
            match component {
                Component::CurDir => {}
                Component::ParentDir => {
                    result.pop();
                }
                other => result.push(other.as_os_str()),
            }
        }
        result
    }

    fn repo() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("docs")).unwrap();
        std::fs::write(dir.path().join("docs/readme.md"), "# hi").unwrap();
        dir
    }

    #[test]
    fn test_existing_file_inside_root() {
        let dir = repo();
        let resolved = validate_path(dir.path(), "/docs/readme.md").unwrap();
        assert_eq!(resolved, dir.path().join("docs/readme.md"));
    }

    #[test]
    fn test_root_itself_is_allowed() {
        let dir = repo();
        assert_eq!(validate_path(dir.path(), "/").unwrap(), dir.path().join(""));
        assert!(validate_path(dir.path(), "").is_ok());
    }

    #[test]
    fn test_parent_traversal_rejected() {
        let dir = repo();
        let err = validate_path(dir.path(), "../../../etc/passwd").unwrap_err();
        assert!(matches!(err, StorageError::PathTraversal(_)));
    }

    #[test]
    fn test_absolute_path_is_rooted() {
        let dir = repo();
        let resolved = validate_path(dir.path(), "/etc/passwd").unwrap();
        assert!(resolved.starts_with(dir.path()));
    }

    #[test]
    fn test_sibling_prefix_is_not_inside() {
        let parent = TempDir::new().unwrap();
        let root = parent.path().join("repo");
        let sibling = parent.path().join("repo-other");
        std::fs::create_dir(&root).unwrap();
        std::fs::create_dir(&sibling).unwrap();
        std::fs::write(sibling.join("secret.md"), "x").unwrap();

        let err = validate_path(&root, "../repo-other/secret.md").unwrap_err();
        assert!(matches!(err, StorageError::PathTraversal(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_escape_rejected() {
        let outside = TempDir::new().unwrap();
        std::fs::write(outside.path().join("secret.md"), "x").unwrap();
        let dir = repo();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();

        let err = validate_path(dir.path(), "/link/secret.md").unwrap_err();
        assert!(matches!(err, StorageError::PathTraversal(_)));
        // New files through the link are caught by the parent check.
        let err = validate_path(dir.path(), "/link/new.md").unwrap_err();
        assert!(matches!(err, StorageError::PathTraversal(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_symlink_escape_rejected() {
        let outside = TempDir::new().unwrap();
        let dir = repo();
        let target = outside.path().join("escaped.md");
        std::os::unix::fs::symlink(&target, dir.path().join("link.md")).unwrap();
        std::os::unix::fs::symlink(outside.path().join("gone"), dir.path().join("dlink"))
            .unwrap();

        let err = validate_path(dir.path(), "/link.md").unwrap_err();
        assert!(matches!(err, StorageError::PathTraversal(_)));
        let err = validate_path(dir.path(), "/dlink/new.md").unwrap_err();
        assert!(matches!(err, StorageError::PathTraversal(_)));
        assert!(!target.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_symlink_inside_root_allowed() {
        let dir = repo();
        std::os::unix::fs::symlink("docs/later.md", dir.path().join("alias.md")).unwrap();
        assert!(validate_path(dir.path(), "/alias.md").is_ok());
    }

    #[test]
    fn test_new_file_in_existing_dir() {
        let dir = repo();
        let resolved = validate_path(dir.path(), "/docs/new.md").unwrap();
        assert_eq!(resolved, dir.path().join("docs/new.md"));
    }

    #[test]
    fn test_new_file_in_missing_dirs() {
        let dir = repo();
        assert!(validate_path(dir.path(), "/a/b/c.md").is_ok());
        let err = validate_path(dir.path(), "/a/b/../../../../escape.md").unwrap_err();
        assert!(matches!(err, StorageError::PathTraversal(_)));
    }

    #[test]
    fn test_missing_root() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        let err = validate_path(&missing, "/a.md").unwrap_err();
        assert!(matches!(err, StorageError::RepoRootInaccessible { .. }));
    }

    #[test]
    fn test_containment_holds_for_hostile_inputs() {
        let dir = repo();
        let real_root = dunce::canonicalize(dir.path()).unwrap();
        let inputs = [
            "..",
            "../",
            "docs/../../x.md",
            "/docs/./../readme.md",
            "docs/../docs/readme.md",
            "./././../x",
            "missing/../../x",
            "missing/../docs/readme.md",
            "//..//..//etc",
        ];
        for input in inputs {
            match validate_path(dir.path(), input) {
                Ok(path) => {
                    let normalized = lexical_normalize(&path);
                    let lexical_root = lexical_normalize(dir.path());
                    assert!(
                        normalized.starts_with(&lexical_root) || normalized.starts_with(&real_root),
                        "{input} resolved outside root: {}",
                        path.display()
                    );
                }
                Err(StorageError::PathTraversal(_)) => {}
                Err(other) => panic!("{input}: unexpected error {other:?}"),
            }
        }
    }

    #[test]
    fn test_storage_path_conversion() {
        assert_eq!(to_storage_path("/docs/a.md").unwrap(), "docs/a.md");
        assert_eq!(to_storage_path("docs//./a.md").unwrap(), "docs/a.md");
        assert_eq!(to_storage_path("/").unwrap(), "");
        assert!(matches!(
            to_storage_path("/docs/../../a.md"),
            Err(StorageError::PathTraversal(_))
        ));
        assert_eq!(to_api_path("docs/a.md"), "/docs/a.md");
        assert_eq!(to_api_path("/docs/a.md"), "/docs/a.md");
        assert_eq!(join_api_path("/", "a.md"), "/a.md");
        assert_eq!(join_api_path("/docs/", "a.md"), "/docs/a.md");
        assert_eq!(join_api_path("docs", "a.md"), "/docs/a.md");
        assert_eq!(file_name("docs/a.md"), "a.md");
        assert_eq!(file_name("a.md"), "a.md");
    }
}
