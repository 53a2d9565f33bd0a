//! Common utilities for the indexer
//!
//! Path normalization, file admission filters and the retry helper shared
//! by the merge and embedding steps.

use codegraph_core::config::IndexerConfig;
use codegraph_core::error::{Error, Result};
use std::future::Future;
use std::path::{Component, Path};
use std::time::Duration;
use tracing::{debug, warn};

/// Workspace-relative, `/`-separated form of `path`
///
/// Relative paths are taken relative to `root`. `.` and `..` components are
/// resolved lexically; a path that leaves the workspace is rejected.
pub fn normalize_path(root: &Path, path: &Path) -> Result<String> {
    let relative = if path.is_absolute() {
        match path.strip_prefix(root) {
            Ok(p) => p.to_path_buf(),
            Err(_) => {
                // The root may have been given in a non-canonical form
                // (symlinked temp dirs, for instance)
                let canonical_root = root.canonicalize().map_err(Error::Io)?;
                let canonical_path = path
                    .parent()
                    .and_then(|parent| parent.canonicalize().ok())
                    .zip(path.file_name())
                    .map(|(parent, name)| parent.join(name))
                    .unwrap_or_else(|| path.to_path_buf());
                canonical_path
                    .strip_prefix(&canonical_root)
                    .map(Path::to_path_buf)
                    .map_err(|_| {
                        Error::invalid_input(format!(
                            "{} is outside the workspace {}",
                            path.display(),
                            root.display()
                        ))
                    })?
            }
        }
    } else {
        path.to_path_buf()
    };

    let mut parts: Vec<String> = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            Component::ParentDir => {
                if parts.pop().is_none() {
                    return Err(Error::invalid_input(format!(
                        "{} escapes the workspace root",
                        path.display()
                    )));
                }
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(Error::invalid_input(format!(
                    "{} is outside the workspace {}",
                    path.display(),
                    root.display()
                )))
            }
        }
    }

    if parts.is_empty() {
        return Err(Error::invalid_input(format!(
            "{} does not name a file",
            path.display()
        )));
    }
    Ok(parts.join("/"))
}

/// Why a file on disk is not indexed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exclusion {
    Symlink,
    NotAFile,
    TooLarge,
}

/// Check if a file should be included in indexing; `Ok(None)` means yes
///
/// Uses `symlink_metadata` so that a symlink is judged itself, not its
/// target.
pub fn check_file(file_path: &Path, max_file_size: u64) -> std::io::Result<Option<Exclusion>> {
    let metadata = file_path.symlink_metadata()?;

    if metadata.is_symlink() {
        debug!("Excluding symlink: {}", file_path.display());
        return Ok(Some(Exclusion::Symlink));
    }
    if !metadata.is_file() {
        return Ok(Some(Exclusion::NotAFile));
    }
    if metadata.len() > max_file_size {
        debug!(
            "Excluding large file: {} (size: {} bytes)",
            file_path.display(),
            metadata.len()
        );
        return Ok(Some(Exclusion::TooLarge));
    }
    Ok(None)
}

/// Content with a NUL byte in its first 8 KiB is treated as binary
pub fn is_binary(content: &[u8]) -> bool {
    content.iter().take(8192).any(|&b| b == 0)
}

/// Bounded exponential backoff for retryable errors
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &IndexerConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_backoff: Duration::from_millis(config.retry_initial_backoff_ms),
            max_backoff: Duration::from_millis(config.retry_max_backoff_ms),
        }
    }

    /// Delay before retry number `attempt` (0-based): `initial * 2^attempt`, capped
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.min(20)).unwrap_or(u32::MAX);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Run `op`, retrying while it fails with a retryable error
pub async fn retry_with_backoff<T, F, Fut>(policy: RetryPolicy, what: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < policy.max_retries => {
                let delay = policy.backoff(attempt);
                warn!(
                    error = %e,
                    attempt = attempt + 1,
                    max_retries = policy.max_retries,
                    "{what} failed, retrying in {}ms",
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::TempDir;

    #[test]
    fn test_normalize_relative_and_absolute_paths() {
        let root = Path::new("/work/repo");
        assert_eq!(
            normalize_path(root, Path::new("src/./lib.rs")).unwrap(),
            "src/lib.rs"
        );
        assert_eq!(
            normalize_path(root, Path::new("/work/repo/src/a/../b.py")).unwrap(),
            "src/b.py"
        );
    }

    #[test]
    fn test_normalize_rejects_escaping_paths() {
        let root = Path::new("/work/repo");
        let err = normalize_path(root, Path::new("../other/x.rs")).unwrap_err();
        assert_eq!(err.kind_label(), "invalid_input");
        assert!(normalize_path(root, Path::new("src/../../x.rs")).is_err());
    }

    #[test]
    fn test_normalize_rejects_outside_absolute_path() {
        let dir = TempDir::new().unwrap();
        let err = normalize_path(dir.path(), Path::new("/definitely/elsewhere.rs")).unwrap_err();
        assert_eq!(err.kind_label(), "invalid_input");
    }

    #[test]
    fn test_check_file_filters() {
        let dir = TempDir::new().unwrap();
        let small = dir.path().join("small.rs");
        fs::write(&small, "fn main() {}").unwrap();
        assert_eq!(check_file(&small, 1024).unwrap(), None);
        assert_eq!(check_file(&small, 4).unwrap(), Some(Exclusion::TooLarge));
        assert_eq!(
            check_file(dir.path(), 1024).unwrap(),
            Some(Exclusion::NotAFile)
        );

        #[cfg(unix)]
        {
            let link = dir.path().join("link.rs");
            std::os::unix::fs::symlink(&small, &link).unwrap();
            assert_eq!(check_file(&link, 1024).unwrap(), Some(Exclusion::Symlink));
        }
    }

    #[test]
    fn test_binary_detection() {
        assert!(is_binary(b"\x7fELF\x00\x01"));
        assert!(!is_binary(b"def f():\n    pass\n"));
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_retries: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(350),
        };
        assert_eq!(policy.backoff(0), Duration::from_millis(100));
        assert_eq!(policy.backoff(1), Duration::from_millis(200));
        assert_eq!(policy.backoff(2), Duration::from_millis(350));
        assert_eq!(policy.backoff(30), Duration::from_millis(350));
    }

    #[tokio::test]
    async fn test_retry_stops_on_success_and_on_permanent_errors() {
        let policy = RetryPolicy {
            max_retries: 3,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
        };

        let calls = AtomicU32::new(0);
        let value = retry_with_backoff(policy, "op", || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(Error::store_unavailable("down"))
            } else {
                Ok(7)
            }
        })
        .await
        .unwrap();
        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        let calls = AtomicU32::new(0);
        let err = retry_with_backoff(policy, "op", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(Error::storage("bad query"))
        })
        .await
        .unwrap_err();
        assert_eq!(err.kind_label(), "storage");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let calls = AtomicU32::new(0);
        let err = retry_with_backoff(policy, "op", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(Error::store_unavailable("still down"))
        })
        .await
        .unwrap_err();
        assert_eq!(err.kind_label(), "store_unavailable");
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }
}
