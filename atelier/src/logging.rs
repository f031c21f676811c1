//! Tracing setup for the `atelier` binary.
//!
//! Lifecycle events are emitted under the `atelier` target with structured
//! fields (`workspace_id`, `run_id`, `artifact_id`, `path`, `version`):
//!
//! - `info`: workspace created, upload registered, run created, run completed,
//!   chat turn started run, artifact published.
//! - `debug`: run phase advanced, artifact already published, sqlite store
//!   opened.
//!
//! Events go to stderr so JSON printed by commands on stdout stays parseable.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Directive used when `RUST_LOG` is unset or unparseable.
pub const DEFAULT_DIRECTIVE: &str = "warn";

/// Filter for `directives`, falling back to [`DEFAULT_DIRECTIVE`].
pub fn filter(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_DIRECTIVE))
}

/// Install a compact stderr subscriber filtered by `RUST_LOG`.
///
/// A subscriber that is already installed is left in place.
///
/// ```bash
/// RUST_LOG=atelier=info atelier chain 3
/// ```
pub fn init() {
    let directives = std::env::var("RUST_LOG").ok();
    let _ = tracing_subscriber::registry()
        .with(filter(directives.as_deref()))
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_falls_back_to_warn() {
        assert_eq!(filter(None).to_string(), "warn");
        assert_eq!(filter(Some("atelier=notalevel")).to_string(), "warn");
        assert_eq!(filter(Some("atelier=debug")).to_string(), "atelier=debug");
    }
}
