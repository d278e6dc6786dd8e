use crate::client::{IngestionClient, LogItem, PutLogsRequest};
use crate::config::SinkConfig;
use crate::host::HostInfo;
use crate::pack_id::{PackIdManager, PACK_ID_TAG};
use crate::record::LogRecord;
use crate::stats::SinkStats;
use std::sync::Arc;
use tracing::{debug, error};

/// Maps batches of [`LogRecord`]s to put-logs requests and submits them.
///
/// A failed submission is reported and the batch is dropped; nothing is
/// retried and nothing propagates to the caller.
pub struct BatchSender {
    client: Arc<dyn IngestionClient>,
    config: Arc<SinkConfig>,
    host: HostInfo,
    pack_ids: PackIdManager,
    stats: Arc<SinkStats>,
}

impl BatchSender {
    pub fn new(
        client: Arc<dyn IngestionClient>,
        config: Arc<SinkConfig>,
        host: HostInfo,
        stats: Arc<SinkStats>,
    ) -> Self {
        let pack_ids = PackIdManager::new(&config.pack_id);
        Self {
            client,
            config,
            host,
            pack_ids,
            stats,
        }
    }

    pub fn pack_ids(&self) -> &PackIdManager {
        &self.pack_ids
    }

    /// Build the request for `batch`, drawing one PackId for it when
    /// PackIds are enabled.
    pub fn build_request(&self, batch: &[LogRecord]) -> PutLogsRequest {
        let tags = self
            .pack_ids
            .batch_pack_id()
            .map(|id| vec![(PACK_ID_TAG.to_string(), id)])
            .unwrap_or_default();

        PutLogsRequest {
            project: self.config.project.clone(),
            logstore: self.config.logstore.clone(),
            topic: self.config.topic.clone(),
            source: self.config.source.clone(),
            items: batch.iter().map(|r| self.to_item(r)).collect(),
            tags,
            compress: self.config.compress,
        }
    }

    fn to_item(&self, record: &LogRecord) -> LogItem {
        let mut contents = vec![
            ("level".to_string(), record.level.clone()),
            ("message".to_string(), record.message.clone()),
            ("module".to_string(), record.module.clone()),
            ("function".to_string(), record.function.clone()),
            ("line".to_string(), record.line.to_string()),
            ("app_name".to_string(), self.config.app_name.clone()),
            ("version".to_string(), self.config.app_version.clone()),
            ("environment".to_string(), self.config.environment.clone()),
            ("category".to_string(), record.category.clone()),
        ];
        if let Some(hostname) = &self.host.hostname {
            contents.push(("hostname".to_string(), hostname.clone()));
        }
        if let Some(host_ip) = &self.host.host_ip {
            contents.push(("host_ip".to_string(), host_ip.clone()));
        }
        if let Some(thread) = &record.thread {
            contents.push(("thread".to_string(), thread.clone()));
        }
        if let Some(extra) = record.extra_json() {
            contents.push(("extra".to_string(), extra));
        }

        LogItem {
            // Truncation to whole seconds is the wire format.
            time: record.timestamp as u32,
            contents,
        }
    }

    /// Submit one batch. Empty batches are ignored.
    pub async fn send(&self, batch: Vec<LogRecord>) {
        if batch.is_empty() {
            return;
        }
        let count = batch.len() as u64;
        let request = self.build_request(&batch);
        drop(batch);

        match self.client.put_logs(&request).await {
            Ok(()) => {
                SinkStats::incr(&self.stats.batches_sent, 1);
                SinkStats::incr(&self.stats.records_sent, count);
                debug!(
                    records = count,
                    pack_id = request.tag(PACK_ID_TAG).unwrap_or_default(),
                    logstore = %request.logstore,
                    "log batch sent"
                );
            }
            Err(e) => {
                SinkStats::incr(&self.stats.batches_failed, 1);
                SinkStats::incr(&self.stats.records_failed, count);
                error!(
                    error = %e,
                    records = count,
                    pack_id = request.tag(PACK_ID_TAG).unwrap_or_default(),
                    logstore = %request.logstore,
                    "failed to send log batch, dropping it"
                );
            }
        }
    }
}
