//! Log output for the `scenesmith` binary.
//!
//! Logs always go to stderr: stdout carries the JSON results the CLI prints.
//! Filtering comes from `SCENESMITH_LOG`, then `RUST_LOG`, then a default
//! that keeps dependencies (the parser, tokio) at `warn` and the scenesmith
//! crates at the requested level.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

/// Filter directives read before `RUST_LOG`.
pub const LOG_ENV: &str = "SCENESMITH_LOG";

const CRATES: &[&str] = &["scenesmith", "scenesmith_cli", "scenesmith_core", "scenesmith_render"];

/// Install the global subscriber. Only the first call in a process has any
/// effect.
///
/// * `json` - one JSON object per line, for log shippers.
/// * `level` - verbosity of the scenesmith crates when no env filter is set.
pub fn init_tracing(json: bool, level: Level) {
    let directives = std::env::var(LOG_ENV)
        .or_else(|_| std::env::var(EnvFilter::DEFAULT_ENV))
        .ok();
    let filter = filter_for(directives, level);

    let layer = fmt::layer().with_writer(std::io::stderr).with_target(true);
    let layer: Box<dyn Layer<Registry> + Send + Sync> = if json {
        layer.json().flatten_event(true).boxed()
    } else {
        layer.compact().boxed()
    };

    tracing_subscriber::registry()
        .with(layer.with_filter(filter))
        .try_init()
        .ok();
}

/// Directives used when neither env variable is set.
pub fn default_directives(level: Level) -> String {
    let level = level.as_str().to_ascii_lowercase();
    std::iter::once("warn".to_string())
        .chain(CRATES.iter().map(|krate| format!("{krate}={level}")))
        .collect::<Vec<_>>()
        .join(",")
}

fn filter_for(directives: Option<String>, level: Level) -> EnvFilter {
    directives
        .filter(|d| !d.trim().is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(default_directives(level)))
}
