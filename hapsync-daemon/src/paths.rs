use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(500);

/// How long a path stays in the debounce table after its last event.
pub const DEBOUNCE_RETENTION: Duration = Duration::from_secs(30);

/// `path` with its parent directory canonicalized.
///
/// Watch events arrive with resolved directories (e.g. `/private/var/...` on
/// macOS) while the file itself may be replaced by an editor, so only the
/// parent is resolved.
pub fn canonical_file_path(path: &Path) -> PathBuf {
    let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
        return path.to_path_buf();
    };
    let parent = if parent.as_os_str().is_empty() {
        Path::new(".")
    } else {
        parent
    };
    std::fs::canonicalize(parent)
        .map(|dir| dir.join(name))
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Directories to watch (non-recursively) so that every target is covered.
pub fn watch_dirs(targets: &[PathBuf]) -> Vec<PathBuf> {
    targets
        .iter()
        .filter_map(|target| target.parent().map(Path::to_path_buf))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn canonical_path_resolves_parent_only() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("conf");
        std::fs::create_dir_all(&nested).unwrap();
        let dotted = nested.join("..").join("conf").join("topology.yaml");

        let resolved = canonical_file_path(&dotted);
        let expected = std::fs::canonicalize(&nested).unwrap().join("topology.yaml");
        assert_eq!(resolved, expected);
        assert!(!resolved.exists(), "file itself need not exist");
    }

    #[test]
    fn unresolvable_path_is_returned_as_is() {
        let path = PathBuf::from("/nonexistent/hapsync/config.yaml");
        assert_eq!(canonical_file_path(&path), path);
    }

    #[test]
    fn shared_parent_is_watched_once() {
        let dirs = watch_dirs(&[
            PathBuf::from("/etc/hapsync/config.yaml"),
            PathBuf::from("/etc/hapsync/topology.yaml"),
            PathBuf::from("/srv/topology.yaml"),
        ]);
        assert_eq!(dirs, vec![PathBuf::from("/etc/hapsync"), PathBuf::from("/srv")]);
    }
}
