//! Glob-based ignore filtering for watcher events
//!
//! Editor temporaries, build output and VCS internals produce a steady
//! stream of events that never correspond to source changes.

use codegraph_core::error::{Error, Result};
use glob::{MatchOptions, Pattern};
use std::path::Path;
use std::sync::Arc;
use tracing::trace;

/// Drops events for paths matching any configured pattern
#[derive(Clone, Default)]
pub struct IgnoreFilter {
    patterns: Arc<Vec<Pattern>>,
}

impl IgnoreFilter {
    /// Compile `patterns`; an invalid pattern is a configuration error
    pub fn from_patterns(patterns: &[String]) -> Result<Self> {
        let compiled = patterns
            .iter()
            .map(|p| {
                Pattern::new(p)
                    .map_err(|e| Error::config(format!("Invalid ignore pattern '{p}': {e}")))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            patterns: Arc::new(compiled),
        })
    }

    /// Whether `path` matches an ignore pattern
    ///
    /// Patterns are tried against the full path and against the file name,
    /// so `*.swp` and `**/target/**` both behave as expected.
    pub fn should_ignore(&self, path: &Path) -> bool {
        let options = MatchOptions {
            case_sensitive: true,
            require_literal_separator: false,
            require_literal_leading_dot: false,
        };
        let file_name = path.file_name().map(|n| n.to_string_lossy());

        let ignored = self.patterns.iter().any(|pattern| {
            pattern.matches_path_with(path, options)
                || file_name
                    .as_deref()
                    .is_some_and(|name| pattern.matches_with(name, options))
        });
        if ignored {
            trace!("Ignoring path: {:?}", path);
        }
        ignored
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codegraph_core::WatcherConfig;

    fn default_filter() -> IgnoreFilter {
        IgnoreFilter::from_patterns(&WatcherConfig::default().ignore_patterns).unwrap()
    }

    #[test]
    fn test_default_patterns_skip_editor_and_build_noise() {
        let filter = default_filter();
        assert!(filter.should_ignore(Path::new("/repo/src/main.rs.swp")));
        assert!(filter.should_ignore(Path::new("/repo/src/main.rs~")));
        assert!(filter.should_ignore(Path::new("/repo/target/debug/build.rs")));
        assert!(filter.should_ignore(Path::new("/repo/.git/index")));
        assert!(filter.should_ignore(Path::new("/repo/web/node_modules/x/index.js")));
    }

    #[test]
    fn test_source_files_pass() {
        let filter = default_filter();
        assert!(!filter.should_ignore(Path::new("/repo/src/main.rs")));
        assert!(!filter.should_ignore(Path::new("/repo/pkg/targets.py")));
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let err = IgnoreFilter::from_patterns(&["[".to_string()])
            .err()
            .unwrap();
        assert_eq!(err.kind_label(), "config");
    }

    #[test]
    fn test_empty_filter_ignores_nothing() {
        let filter = IgnoreFilter::default();
        assert!(filter.is_empty());
        assert!(!filter.should_ignore(Path::new("anything.tmp")));
    }
}
