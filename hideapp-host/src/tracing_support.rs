//! Tracing subscriber setup
//!
//! The engine only emits `tracing` events. A host that already installed a
//! subscriber keeps it; these helpers install one otherwise and report
//! whether they did.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

/// Filter used when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "hideapp_host=info";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracingFormat {
    /// Multi-line, human-readable
    Pretty,
    /// One line per event
    Compact,
    Json,
}

#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Overrides `RUST_LOG` when set
    pub level: Option<tracing::Level>,
    pub format: TracingFormat,
    pub timestamps: bool,
    pub target: bool,
    pub thread_ids: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: None,
            format: TracingFormat::Compact,
            timestamps: true,
            target: true,
            // Interceptions run on arbitrary caller threads
            thread_ids: true,
        }
    }
}

fn env_filter(level: Option<tracing::Level>) -> EnvFilter {
    match level {
        Some(level) => EnvFilter::new(level.to_string()),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
    }
}

/// Install a compact subscriber filtered by `RUST_LOG`
pub fn init_subscriber() -> bool {
    init_subscriber_with_config(TracingConfig::default())
}

/// Install a subscriber built from `config`
///
/// Returns `false` when a global subscriber was already set.
pub fn init_subscriber_with_config(config: TracingConfig) -> bool {
    macro_rules! finish {
        ($layer:expr) => {
            $layer
                .with_target(config.target)
                .with_thread_ids(config.thread_ids)
                .boxed()
        };
    }

    let layer: Box<dyn Layer<Registry> + Send + Sync> = match (config.format, config.timestamps) {
        (TracingFormat::Pretty, true) => finish!(fmt::layer().pretty()),
        (TracingFormat::Pretty, false) => finish!(fmt::layer().pretty().without_time()),
        (TracingFormat::Compact, true) => finish!(fmt::layer().compact()),
        (TracingFormat::Compact, false) => finish!(fmt::layer().compact().without_time()),
        (TracingFormat::Json, true) => finish!(fmt::layer().json()),
        (TracingFormat::Json, false) => finish!(fmt::layer().json().without_time()),
    };

    tracing_subscriber::registry()
        .with(layer.with_filter(env_filter(config.level)))
        .try_init()
        .is_ok()
}
