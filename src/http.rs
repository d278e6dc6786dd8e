use crate::client::{IngestionClient, LogItem, PutLogsRequest};
use crate::config::{Credentials, SinkConfig};
use crate::error::{IngestError, SinkError};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::ser::{Serialize, SerializeMap, Serializer};
use sha2::Sha256;
use std::net::IpAddr;

type HmacSha256 = Hmac<Sha256>;

const API_VERSION: &str = "0.6.0";
const CONTENT_TYPE: &str = "application/json";
const SIGNATURE_METHOD: &str = "hmac-sha256";
const ZSTD_LEVEL: i32 = 3;

/// [`IngestionClient`] speaking the SLS put-logs REST interface over HTTP.
///
/// Each batch becomes one JSON log group posted to
/// `/logstores/{logstore}/shards/lb` on the project host. Requests are
/// signed with the access key pair and, when the request asks for it, the
/// body is zstd-compressed.
#[derive(Clone)]
pub struct HttpIngestionClient {
    client: Client,
    scheme: String,
    host: String,
    credentials: Credentials,
}

impl HttpIngestionClient {
    /// Construct a client for the endpoint and credentials of `config`.
    ///
    /// **Returns**
    /// - `Err(SinkError::Config)` if the endpoint is not an absolute URL.
    /// - `Err(SinkError::Client)` if the HTTP client could not be built.
    pub fn new(config: &SinkConfig) -> Result<Self, SinkError> {
        let (scheme, host) = split_endpoint(&config.endpoint)?;
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SinkError::Client(e.to_string()))?;

        Ok(Self {
            client,
            scheme,
            host,
            credentials: config.credentials.clone(),
        })
    }

    /// Host serving `project`. Public endpoints are addressed through a
    /// project subdomain; IP and `localhost` endpoints are used as-is.
    fn project_host(&self, project: &str) -> String {
        let bare = self.host.split(':').next().unwrap_or_default();
        if bare == "localhost" || bare.parse::<IpAddr>().is_ok() {
            self.host.clone()
        } else {
            format!("{}.{}", project, self.host)
        }
    }

    pub fn request_url(&self, request: &PutLogsRequest) -> String {
        format!(
            "{}://{}{}",
            self.scheme,
            self.project_host(&request.project),
            resource(&request.logstore)
        )
    }
}

fn split_endpoint(endpoint: &str) -> Result<(String, String), SinkError> {
    let invalid = || crate::error::ConfigError::InvalidUrl(endpoint.to_string());
    let (scheme, rest) = endpoint.split_once("://").ok_or_else(invalid)?;
    let host = rest.trim_end_matches('/');
    if host.is_empty() || host.contains('/') || !(scheme == "http" || scheme == "https") {
        return Err(invalid().into());
    }
    Ok((scheme.to_string(), host.to_string()))
}

fn resource(logstore: &str) -> String {
    format!("/logstores/{}/shards/lb", urlencoding::encode(logstore))
}

/// Serialize a request into its JSON log-group body.
pub fn encode_log_group(request: &PutLogsRequest) -> Result<Vec<u8>, IngestError> {
    serde_json::to_vec(&LogGroup(request)).map_err(|e| IngestError::Encode(e.to_string()))
}

struct LogGroup<'a>(&'a PutLogsRequest);

impl Serialize for LogGroup<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let request = self.0;
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("__topic__", &request.topic)?;
        map.serialize_entry("__source__", &request.source)?;
        let logs: Vec<WireLog<'_>> = request.items.iter().map(WireLog).collect();
        map.serialize_entry("__logs__", &logs)?;
        if !request.tags.is_empty() {
            map.serialize_entry("__tags__", &Pairs(&request.tags))?;
        }
        map.end()
    }
}

struct WireLog<'a>(&'a LogItem);

impl Serialize for WireLog<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.contents.len() + 1))?;
        map.serialize_entry("__time__", &self.0.time)?;
        for (key, value) in &self.0.contents {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

struct Pairs<'a>(&'a [(String, String)]);

impl Serialize for Pairs<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(k, v)| (k, v)))
    }
}

/// String-to-sign: verb, content type, date, the `x-log-*` headers
/// sorted by name, then the resource path.
pub fn canonical_string(
    verb: &str,
    content_type: &str,
    date: &str,
    log_headers: &[(&str, String)],
    resource: &str,
) -> String {
    let mut headers: Vec<_> = log_headers.iter().collect();
    headers.sort_by(|a, b| a.0.cmp(b.0));

    let mut canonical = format!("{verb}\n{content_type}\n{date}\n");
    for (name, value) in headers {
        canonical.push_str(name);
        canonical.push(':');
        canonical.push_str(value);
        canonical.push('\n');
    }
    canonical.push_str(resource);
    canonical
}

/// Base64 HMAC-SHA256 of `canonical` keyed by the access key secret.
pub fn sign(secret: &str, canonical: &str) -> Result<String, IngestError> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e| IngestError::Encode(format!("signing key: {e}")))?;
    mac.update(canonical.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

#[async_trait]
impl IngestionClient for HttpIngestionClient {
    async fn put_logs(&self, request: &PutLogsRequest) -> Result<(), IngestError> {
        let raw = encode_log_group(request)?;
        let raw_size = raw.len();
        let body = if request.compress {
            zstd::stream::encode_all(raw.as_slice(), ZSTD_LEVEL).map_err(|e| IngestError::Encode(e.to_string()))?
        } else {
            raw
        };

        let mut log_headers: Vec<(&str, String)> = vec![
            ("x-log-apiversion", API_VERSION.to_string()),
            ("x-log-bodyrawsize", raw_size.to_string()),
            ("x-log-signaturemethod", SIGNATURE_METHOD.to_string()),
        ];
        if request.compress {
            log_headers.push(("x-log-compresstype", "zstd".to_string()));
        }

        let date = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        let path = resource(&request.logstore);
        let signature = sign(
            &self.credentials.access_key_secret,
            &canonical_string("POST", CONTENT_TYPE, &date, &log_headers, &path),
        )?;

        let mut builder = self
            .client
            .post(self.request_url(request))
            .header("Content-Type", CONTENT_TYPE)
            .header("Date", &date)
            .header(
                "Authorization",
                format!("LOG {}:{}", self.credentials.access_key_id, signature),
            );
        for (name, value) in &log_headers {
            builder = builder.header(*name, value);
        }

        let resp = builder
            .body(body)
            .send()
            .await
            .map_err(|e| IngestError::Transport(e.to_string()))?;

        if resp.status().is_success() {
            Ok(())
        } else {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_else(|_| "<no body>".to_string());
            Err(IngestError::Rejected { status, body })
        }
    }
}
