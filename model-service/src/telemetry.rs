//! Log formatting shared by the workspace binaries.
//!
//! [`layer`] renders events from the workspace crates only; the global level
//! filter stays with the binary that installs the subscriber.

use std::io::{self, IsTerminal};

use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{Layer, filter, fmt};

/// Target prefixes of the workspace crates; events from other crates are dropped by [`layer`].
pub const TARGET_PREFIXES: &[&str] = &["model_service", "rag_store", "api", "docs_hybrid_search"];

/// RFC3339 UTC timestamps with second precision, e.g. `2025-09-12T10:20:30Z`.
#[derive(Clone, Debug, Default)]
struct Rfc3339Seconds;

impl FormatTime for Rfc3339Seconds {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
        w.write_str(&now)
    }
}

fn is_workspace_target(target: &str) -> bool {
    TARGET_PREFIXES.iter().any(|p| target.starts_with(p))
}

/// Compact single-line fmt layer for the workspace crates.
///
/// Each line carries the timestamp, level, target and `file:line`; span close
/// events add durations. ANSI colors only when stdout is a terminal. The
/// filter is per-layer, so other layers still see third-party events.
pub fn layer<S>() -> impl Layer<S> + Send + Sync
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    fmt::layer()
        .with_timer(Rfc3339Seconds)
        .with_level(true)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(io::stdout().is_terminal())
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .event_format(fmt::format().compact().with_source_location(true))
        .with_filter(filter::filter_fn(|meta| is_workspace_target(meta.target())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_workspace_targets_pass() {
        assert!(is_workspace_target("rag_store::ingest"));
        assert!(is_workspace_target("api::routes::search"));
        assert!(!is_workspace_target("hyper::proto"));
        assert!(!is_workspace_target("qdrant_client"));
    }

    #[test]
    fn timestamps_are_utc_seconds() {
        let mut out = String::new();
        Rfc3339Seconds.format_time(&mut Writer::new(&mut out)).unwrap();
        assert!(out.ends_with('Z'), "{out}");
        assert!(!out.contains('.'), "{out}");
        assert_eq!(out.len(), "2025-09-12T10:20:30Z".len());
    }
}
