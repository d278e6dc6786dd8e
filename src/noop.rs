use crate::client::{IngestionClient, PutLogsRequest};
use crate::error::IngestError;
use async_trait::async_trait;

/// A client that accepts and drops every request.
///
/// Useful for measuring the overhead of the sink itself without any
/// network I/O, and for tests that don't care about delivery.
#[derive(Clone, Default)]
pub struct NoopClient;

#[async_trait]
impl IngestionClient for NoopClient {
    async fn put_logs(&self, _request: &PutLogsRequest) -> Result<(), IngestError> {
        Ok(())
    }
}
