use crate::error::SinkError;
use crate::layer::SlsLayer;
use crate::sink::RecordSink;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Settings for the global subscriber installed by [`init_tracing_with_config`].
///
/// **Fields**
/// - `min_level`: least severe level forwarded to the sink.
/// - `enable_stdout`: if `true`, a `tracing_subscriber::fmt` layer is stacked
///   on top of [`SlsLayer`] so events are also printed to the console.
#[derive(Clone, Debug)]
pub struct LayerConfig {
    pub min_level: Level,
    pub enable_stdout: bool,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            min_level: Level::INFO,
            enable_stdout: true,
        }
    }
}

/// Install a global `tracing` subscriber that forwards events to `sink`.
///
/// **Returns**
/// - `Err(SinkError::Subscriber)` if a global subscriber is already set.
///
/// The caller keeps its own handle to the sink and is responsible for
/// calling [`RecordSink::close`] on shutdown.
pub fn init_tracing_with_config(sink: Arc<dyn RecordSink>, config: LayerConfig) -> Result<(), SinkError> {
    let layer = SlsLayer::new(sink).with_min_level(config.min_level);

    // Two branches because the stacked subscriber types differ.
    let installed = if config.enable_stdout {
        let subscriber = Registry::default()
            .with(layer)
            .with(tracing_subscriber::fmt::layer());
        tracing::subscriber::set_global_default(subscriber)
    } else {
        tracing::subscriber::set_global_default(Registry::default().with(layer))
    };
    installed.map_err(|e| SinkError::Subscriber(e.to_string()))
}

/// [`init_tracing_with_config`] with [`LayerConfig::default`].
pub fn init_tracing(sink: Arc<dyn RecordSink>) -> Result<(), SinkError> {
    init_tracing_with_config(sink, LayerConfig::default())
}
