//! Pure traversal of the local build-output tree.
//!
//! Walking is separated from metadata derivation and from uploading so each
//! stage can be tested on its own. The walker produces one [`FileEntry`] per
//! regular file; directories only contribute their name to the key prefix.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};

/// One regular file found under the sync root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Object key: path relative to the root, `/`-separated on every host,
    /// no leading slash.
    pub relative_key: String,
    /// Absolute path to read the bytes from at upload time.
    pub path: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum WalkError {
    #[error(
        "local root {0:?} does not exist or is not a directory; \
         run the site build first so its output directory is present"
    )]
    RootNotFound(PathBuf),
    #[error("failed to read directory entry under {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Walk `root` depth-first and return every regular file beneath it.
///
/// Symbolic links are only followed when their target resolves inside the
/// root; anything escaping the root is skipped with a warning so a stray
/// link cannot pull foreign files into the bucket. Each physical directory
/// is visited at most once, so a link cycle cannot enumerate the same file
/// under an ever-growing key prefix. Files whose names are not valid UTF-8
/// cannot form an object key and are skipped with a warning.
pub fn walk_tree(root: &Path) -> Result<Vec<FileEntry>, WalkError> {
    if !root.is_dir() {
        return Err(WalkError::RootNotFound(root.to_path_buf()));
    }
    // Canonical root anchors the symlink containment check.
    let canonical_root = root.canonicalize().map_err(|e| WalkError::Io {
        path: root.to_path_buf(),
        source: e,
    })?;

    let mut visited = HashSet::new();
    visited.insert(canonical_root.clone());
    let mut entries = Vec::new();
    visit_dir(root, root, &canonical_root, &mut visited, &mut entries)?;
    debug!(root = %root.display(), files = entries.len(), "Tree walk complete");
    Ok(entries)
}

fn visit_dir(
    dir: &Path,
    root: &Path,
    canonical_root: &Path,
    visited: &mut HashSet<PathBuf>,
    entries: &mut Vec<FileEntry>,
) -> Result<(), WalkError> {
    let read = std::fs::read_dir(dir).map_err(|e| WalkError::Io {
        path: dir.to_path_buf(),
        source: e,
    })?;
    for entry_res in read {
        let entry = entry_res.map_err(|e| WalkError::Io {
            path: dir.to_path_buf(),
            source: e,
        })?;
        let path = entry.path();

        let file_type = entry.file_type().map_err(|e| WalkError::Io {
            path: path.clone(),
            source: e,
        })?;
        if file_type.is_symlink() {
            match path.canonicalize() {
                Ok(target) if target.starts_with(canonical_root) => {}
                Ok(target) => {
                    warn!(
                        link = %path.display(),
                        target = %target.display(),
                        "Skipping symlink escaping the sync root"
                    );
                    continue;
                }
                Err(e) => {
                    warn!(link = %path.display(), error = %e, "Skipping unresolvable symlink");
                    continue;
                }
            }
        }

        if path.is_dir() {
            let canonical = path.canonicalize().map_err(|e| WalkError::Io {
                path: path.clone(),
                source: e,
            })?;
            // A directory link pointing back at the root (or any ancestor)
            // would otherwise be recursed forever.
            if !visited.insert(canonical) {
                warn!(dir = %path.display(), "Skipping already-visited directory (link cycle)");
                continue;
            }
            visit_dir(&path, root, canonical_root, visited, entries)?;
        } else if path.is_file() {
            let relative = path
                .strip_prefix(root)
                .expect("walked path is always under the root");
            match posix_key(relative) {
                Some(relative_key) => entries.push(FileEntry { relative_key, path }),
                None => {
                    warn!(path = %path.display(), "Skipping file with non-UTF-8 name");
                }
            }
        }
    }
    Ok(())
}

/// Join path components with `/` regardless of the host separator.
/// `None` when a component is not valid UTF-8: lossy replacement could make
/// distinct files collide on the same key.
fn posix_key(relative: &Path) -> Option<String> {
    let mut parts = Vec::new();
    for component in relative.components() {
        if let Component::Normal(os) = component {
            parts.push(os.to_str()?);
        }
    }
    Some(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn posix_key_joins_with_forward_slashes() {
        let p: PathBuf = ["assets", "img", "logo.png"].iter().collect();
        assert_eq!(posix_key(&p).as_deref(), Some("assets/img/logo.png"));
    }

    #[cfg(unix)]
    #[test]
    fn posix_key_refuses_non_utf8_components() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let p = Path::new(OsStr::from_bytes(b"assets/bad-\xff-name.bin"));
        assert_eq!(posix_key(p), None);
    }
}
