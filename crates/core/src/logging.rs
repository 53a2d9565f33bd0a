//! Logging bootstrap for hosts embedding codegraph

use crate::error::{Error, Result};
use tracing_subscriber::EnvFilter;

/// Install a global fmt subscriber
///
/// `RUST_LOG` takes precedence; otherwise codegraph crates log at `info`
/// (`debug` when `verbose`). Calling this more than once is harmless.
pub fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directives(level)))
        .map_err(|e| Error::config(format!("Invalid log filter: {e}")))?;

    // A subscriber installed by the host (or an earlier call) wins.
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    Ok(())
}

fn default_directives(level: &str) -> String {
    [
        "codegraph_core",
        "codegraph_languages",
        "codegraph_storage",
        "codegraph_embeddings",
        "codegraph_watcher",
        "codegraph_indexer",
        "codegraph_api_service",
    ]
    .iter()
    .map(|target| format!("{target}={level}"))
    .collect::<Vec<_>>()
    .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives_cover_all_crates() {
        let directives = default_directives("debug");
        assert!(directives.contains("codegraph_indexer=debug"));
        assert!(directives.contains("codegraph_api_service=debug"));
        assert!(EnvFilter::try_new(directives).is_ok());
    }

    #[test]
    fn test_init_logging_is_idempotent() {
        assert!(init_logging(false).is_ok());
        assert!(init_logging(true).is_ok());
    }
}
