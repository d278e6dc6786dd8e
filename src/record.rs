use crate::error::RecordError;
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::fmt::{self, Write as _};

/// Inbound record shape handed to a sink by the logging front-end.
///
/// Borrowed so that the front-end does not allocate before the sink
/// decides to keep the record.
#[derive(Clone, Copy)]
pub struct RecordInput<'a> {
    pub time: DateTime<Utc>,
    pub level: &'a str,
    pub message: &'a dyn fmt::Display,
    pub module: &'a str,
    pub function: &'a str,
    pub line: u32,
    pub extra: &'a [(String, String)],
}

impl fmt::Debug for RecordInput<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordInput")
            .field("time", &self.time)
            .field("level", &self.level)
            .field("module", &self.module)
            .field("function", &self.function)
            .field("line", &self.line)
            .field("extra", &self.extra)
            .finish_non_exhaustive()
    }
}

/// Normalized record queued for the flush worker.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
    pub level: String,
    pub message: String,
    pub module: String,
    pub function: String,
    pub line: u32,
    pub category: String,
    pub thread: Option<String>,
    pub extra: Vec<(String, String)>,
}

impl LogRecord {
    /// Normalize a [`RecordInput`].
    ///
    /// `default_category` is used when no category rule matches; when
    /// `capture_thread` is set the calling thread is recorded.
    pub fn from_input(
        input: &RecordInput<'_>,
        default_category: &str,
        capture_thread: bool,
    ) -> Result<Self, RecordError> {
        let seconds = input.time.timestamp();
        if seconds < 0 || seconds > i64::from(u32::MAX) {
            return Err(RecordError::InvalidTimestamp(input.time));
        }
        let timestamp = seconds as f64 + f64::from(input.time.timestamp_subsec_nanos()) / 1e9;

        let mut message = String::new();
        write!(message, "{}", input.message).map_err(|_| RecordError::Format)?;

        let category = derive_category(input.level, input.module, &message, default_category);

        Ok(LogRecord {
            timestamp,
            level: input.level.to_string(),
            message,
            module: input.module.to_string(),
            function: input.function.to_string(),
            line: input.line,
            category,
            thread: capture_thread.then(current_thread_descriptor),
            extra: input.extra.to_vec(),
        })
    }

    /// The `extra` pairs as a compact JSON object, `None` when empty.
    pub fn extra_json(&self) -> Option<String> {
        if self.extra.is_empty() {
            return None;
        }
        serde_json::to_string(&ExtraFields(&self.extra)).ok()
    }
}

struct ExtraFields<'a>(&'a [(String, String)]);

impl Serialize for ExtraFields<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(k, v)| (k, v)))
    }
}

/// Pick a category for a record.
///
/// Error levels and messages mentioning errors map to `error`; modules
/// with an `api` or `business` path segment map to those names.
pub fn derive_category(level: &str, module: &str, message: &str, default_category: &str) -> String {
    if ["ERROR", "CRITICAL", "FATAL"]
        .iter()
        .any(|l| level.eq_ignore_ascii_case(l))
    {
        return "error".to_string();
    }

    let lower = message.to_ascii_lowercase();
    if lower.contains("exception") || lower.contains("error") {
        return "error".to_string();
    }

    let mut segments = module.split(|c| c == '.' || c == ':').filter(|s| !s.is_empty());
    if let Some(found) = segments.find(|s| *s == "api" || *s == "business") {
        return found.to_string();
    }

    default_category.to_string()
}

fn current_thread_descriptor() -> String {
    let thread = std::thread::current();
    format!("{}({:?})", thread.name().unwrap_or("unnamed"), thread.id())
}
