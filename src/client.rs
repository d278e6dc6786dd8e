use crate::error::IngestError;
use async_trait::async_trait;

/// One time-stamped log entry of a log group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogItem {
    /// Seconds since the Unix epoch.
    pub time: u32,
    /// Ordered key/value contents. Absent optional fields are not present.
    pub contents: Vec<(String, String)>,
}

impl LogItem {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.contents
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// A single put-logs submission: one batch of items destined for one
/// logstore, with optional log-group level tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutLogsRequest {
    pub project: String,
    pub logstore: String,
    pub topic: String,
    pub source: String,
    pub items: Vec<LogItem>,
    pub tags: Vec<(String, String)>,
    pub compress: bool,
}

impl PutLogsRequest {
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Client of a log ingestion service.
///
/// `put_logs` returns `Ok(())` once the service accepted the request; any
/// failure is an [`IngestError`]. The flush worker calls it from its own
/// runtime and never from an application thread.
#[async_trait]
pub trait IngestionClient: Send + Sync {
    async fn put_logs(&self, request: &PutLogsRequest) -> Result<(), IngestError>;
}
