//! `tracing` sink that ships log records in batches to Alibaba Cloud Log
//! Service (SLS).
//!
//! ```no_run
//! use std::sync::Arc;
//! use tracing_sls_sink::{init_tracing, SinkConfig, SlsSink};
//!
//! let config = SinkConfig::builder("my-project", "app-log", "cn-hangzhou")
//!     .app_name("checkout")
//!     .build()?;
//! let sink = Arc::new(SlsSink::new(config)?);
//! init_tracing(sink.clone())?;
//!
//! tracing::info!(order_id = 17, "order placed");
//!
//! sink.close();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod client;
pub mod config;
pub mod env;
pub mod error;
pub mod host;
pub mod init;
pub mod layer;
pub mod noop;
pub mod pack_id;
pub mod record;
pub mod registry;
pub mod sender;
pub mod sink;
pub mod stats;
pub mod url;

#[cfg(feature = "http")]
pub mod http;

mod queue;
mod worker;

pub use config::{SinkConfig, SinkConfigBuilder};
pub use error::{ConfigError, IngestError, SinkError};
pub use init::{init_tracing, init_tracing_with_config, LayerConfig};
pub use layer::SlsLayer;
pub use pack_id::{PackIdConfig, PackIdPolicy};
pub use record::{LogRecord, RecordInput};
pub use registry::SinkRegistry;
pub use sink::{RecordSink, SinkState, SlsSink};
pub use worker::on_sink_thread;
