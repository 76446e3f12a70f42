//! Tracing subscriber setup for the `igraph` binary.
//!
//! Logs go to stderr; stdout is reserved for command output (JSON for the
//! query commands). `RUST_LOG` overrides the default filter.

use tracing_subscriber::EnvFilter;

pub const DEFAULT_FILTER: &str = "infragraph=info,infragraph_core=info,igraph=info";

/// Install the global subscriber. `verbose` raises the default to `debug`.
pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("infragraph=debug,infragraph_core=debug,igraph=debug")
        } else {
            EnvFilter::new(DEFAULT_FILTER)
        }
    });
    // A second init (e.g. from tests) is harmless.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
