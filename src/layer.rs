use crate::record::RecordInput;
use crate::sink::RecordSink;
use crate::worker;
use chrono::Utc;
use std::fmt;
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// Target prefix of this crate's own diagnostics.
const INTERNAL_TARGET: &str = "tracing_sls_sink";

/// `tracing_subscriber` layer that turns events into [`RecordInput`]s and
/// hands them to a [`RecordSink`].
///
/// Only events at or above `min_level` (default `INFO`) are forwarded.
/// Events from this crate and events raised on sink-owned threads (the
/// flush worker and HTTP stack running on it) are skipped so transport
/// diagnostics never loop back into the sink.
pub struct SlsLayer {
    sink: Arc<dyn RecordSink>,
    min_level: Level,
}

impl SlsLayer {
    pub fn new(sink: Arc<dyn RecordSink>) -> Self {
        Self {
            sink,
            min_level: Level::INFO,
        }
    }

    pub fn with_min_level(mut self, level: Level) -> Self {
        self.min_level = level;
        self
    }
}

impl<S> Layer<S> for SlsLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let meta = event.metadata();
        if *meta.level() > self.min_level {
            return;
        }
        if worker::on_sink_thread() || meta.target().starts_with(INTERNAL_TARGET) {
            return;
        }

        let mut message: Option<String> = None;
        let mut extra = Vec::new();
        let mut visitor = FieldVisitor {
            extra: &mut extra,
            message: &mut message,
        };
        event.record(&mut visitor);

        let span = ctx.event_span(event);
        let function = span.as_ref().map(|s| s.name()).unwrap_or_default();
        let message = message.unwrap_or_default();

        let input = RecordInput {
            time: Utc::now(),
            level: meta.level().as_str(),
            message: &message,
            module: meta.module_path().unwrap_or_else(|| meta.target()),
            function,
            line: meta.line().unwrap_or(0),
            extra: &extra,
        };
        self.sink.handle(&input);
    }
}

/// Collects the `message` field and every other field as a string pair.
pub struct FieldVisitor<'a> {
    pub extra: &'a mut Vec<(String, String)>,
    pub message: &'a mut Option<String>,
}

impl FieldVisitor<'_> {
    fn put(&mut self, field: &Field, value: String) {
        if field.name() == "message" {
            *self.message = Some(value);
        } else {
            self.extra.push((field.name().to_string(), value));
        }
    }
}

impl Visit for FieldVisitor<'_> {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, value.to_string());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, value.to_string());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, value.to_string());
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.put(field, value.to_string());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, value.to_string());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.put(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.put(field, format!("{:?}", value));
    }
}
