use crate::env::{self, env_flag, env_opt, env_or};
use crate::error::ConfigError;
use crate::pack_id::PackIdConfig;
use std::fmt;
use std::time::Duration;

pub const DEFAULT_TOPIC: &str = "rust-app";
pub const DEFAULT_SOURCE: &str = "tracing-sls-sink";
pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(5);
/// Largest accepted flush interval.
pub const MAX_FLUSH_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_APP_NAME: &str = "unknown-app";
pub const DEFAULT_APP_VERSION: &str = "1.0.0";
pub const DEFAULT_ENVIRONMENT: &str = "development";
pub const DEFAULT_CATEGORY: &str = "application";

/// Derive the public SLS endpoint for a region, e.g. `cn-hangzhou`.
pub fn endpoint_for_region(region: &str) -> String {
    format!("https://{region}.log.aliyuncs.com")
}

/// Access key pair. The secret is never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub access_key_secret: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("access_key_secret", &"[REDACTED]")
            .finish()
    }
}

/// Resolve credentials, preferring explicit values over
/// `SLS_ACCESS_KEY_ID` / `SLS_ACCESS_KEY_SECRET`.
pub fn resolve_credentials(
    access_key_id: Option<String>,
    access_key_secret: Option<String>,
) -> Result<Credentials, ConfigError> {
    let access_key_id = access_key_id
        .filter(|v| !v.is_empty())
        .or_else(|| env_opt(env::SLS_ACCESS_KEY_ID_ENV));
    let access_key_secret = access_key_secret
        .filter(|v| !v.is_empty())
        .or_else(|| env_opt(env::SLS_ACCESS_KEY_SECRET_ENV));

    match (access_key_id, access_key_secret) {
        (Some(access_key_id), Some(access_key_secret)) => Ok(Credentials {
            access_key_id,
            access_key_secret,
        }),
        _ => Err(ConfigError::MissingCredentials),
    }
}

/// Configuration of one [`SlsSink`](crate::sink::SlsSink).
///
/// Owned by the sink and never mutated after construction.
#[derive(Clone, Debug)]
pub struct SinkConfig {
    pub project: String,
    pub logstore: String,
    /// Base URL, e.g. `https://cn-hangzhou.log.aliyuncs.com`.
    pub endpoint: String,
    pub credentials: Credentials,
    pub topic: String,
    pub source: String,
    /// Maximum number of records per batch.
    pub batch_size: usize,
    /// Maximum wait for records before a partial batch is sent.
    pub flush_interval: Duration,
    pub compress: bool,
    /// HTTP request timeout of the ingestion client.
    pub timeout: Duration,
    pub app_name: String,
    pub app_version: String,
    pub environment: String,
    pub auto_detect_hostname: bool,
    pub auto_detect_host_ip: bool,
    pub auto_detect_thread: bool,
    pub default_category: String,
    pub pack_id: PackIdConfig,
}

impl SinkConfig {
    pub fn builder(
        project: impl Into<String>,
        logstore: impl Into<String>,
        region: impl Into<String>,
    ) -> SinkConfigBuilder {
        SinkConfigBuilder::new(project, logstore, region)
    }

    /// Check required identity fields and batching bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.project.trim().is_empty() {
            return Err(ConfigError::MissingField("project"));
        }
        if self.logstore.trim().is_empty() {
            return Err(ConfigError::MissingField("logstore"));
        }
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::MissingField("endpoint"));
        }
        if self.credentials.access_key_id.is_empty() || self.credentials.access_key_secret.is_empty() {
            return Err(ConfigError::MissingCredentials);
        }
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "batch_size",
                value: "0".to_string(),
            });
        }
        if self.flush_interval.is_zero() || self.flush_interval > MAX_FLUSH_INTERVAL {
            return Err(ConfigError::InvalidValue {
                key: "flush_interval",
                value: format!("{:?}", self.flush_interval),
            });
        }
        Ok(())
    }
}

/// Builder for [`SinkConfig`].
///
/// Unset fields fall back to environment variables (see [`crate::env`])
/// and then to the crate defaults.
#[derive(Debug, Clone, Default)]
pub struct SinkConfigBuilder {
    project: String,
    logstore: String,
    region: String,
    endpoint: Option<String>,
    access_key_id: Option<String>,
    access_key_secret: Option<String>,
    topic: Option<String>,
    source: Option<String>,
    batch_size: Option<usize>,
    flush_interval: Option<Duration>,
    compress: Option<bool>,
    timeout: Option<Duration>,
    app_name: Option<String>,
    app_version: Option<String>,
    environment: Option<String>,
    auto_detect_hostname: Option<bool>,
    auto_detect_host_ip: Option<bool>,
    auto_detect_thread: Option<bool>,
    default_category: Option<String>,
    pack_id: PackIdConfig,
}

macro_rules! setter {
    ($name:ident, String) => {
        pub fn $name(mut self, value: impl Into<String>) -> Self {
            self.$name = Some(value.into());
            self
        }
    };
    ($name:ident, $ty:ty) => {
        pub fn $name(mut self, value: $ty) -> Self {
            self.$name = Some(value);
            self
        }
    };
}

impl SinkConfigBuilder {
    pub fn new(project: impl Into<String>, logstore: impl Into<String>, region: impl Into<String>) -> Self {
        SinkConfigBuilder {
            project: project.into(),
            logstore: logstore.into(),
            region: region.into(),
            ..Default::default()
        }
    }

    setter!(endpoint, String);
    setter!(access_key_id, String);
    setter!(access_key_secret, String);
    setter!(topic, String);
    setter!(source, String);
    setter!(batch_size, usize);
    setter!(flush_interval, Duration);
    setter!(compress, bool);
    setter!(timeout, Duration);
    setter!(app_name, String);
    setter!(app_version, String);
    setter!(environment, String);
    setter!(auto_detect_hostname, bool);
    setter!(auto_detect_host_ip, bool);
    setter!(auto_detect_thread, bool);
    setter!(default_category, String);

    /// Set the flush interval from fractional seconds.
    pub fn flush_interval_secs(mut self, secs: f64) -> Result<Self, ConfigError> {
        let interval = Duration::try_from_secs_f64(secs).map_err(|_| ConfigError::InvalidValue {
            key: "flush_interval",
            value: secs.to_string(),
        })?;
        self.flush_interval = Some(interval);
        Ok(self)
    }

    pub fn pack_id(mut self, pack_id: PackIdConfig) -> Self {
        self.pack_id = pack_id;
        self
    }

    /// Resolve credentials and defaults, then validate.
    pub fn build(self) -> Result<SinkConfig, ConfigError> {
        if self.project.trim().is_empty() {
            return Err(ConfigError::MissingField("project"));
        }
        if self.logstore.trim().is_empty() {
            return Err(ConfigError::MissingField("logstore"));
        }
        let endpoint = match self.endpoint {
            Some(endpoint) => endpoint,
            None if self.region.trim().is_empty() => return Err(ConfigError::MissingField("region")),
            None => endpoint_for_region(&self.region),
        };
        let credentials = resolve_credentials(self.access_key_id, self.access_key_secret)?;

        let config = SinkConfig {
            project: self.project,
            logstore: self.logstore,
            endpoint,
            credentials,
            topic: self.topic.unwrap_or_else(|| DEFAULT_TOPIC.to_string()),
            source: self.source.unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
            batch_size: self.batch_size.unwrap_or(DEFAULT_BATCH_SIZE),
            flush_interval: self.flush_interval.unwrap_or(DEFAULT_FLUSH_INTERVAL),
            compress: self.compress.unwrap_or(true),
            timeout: self.timeout.unwrap_or(DEFAULT_TIMEOUT),
            app_name: self
                .app_name
                .unwrap_or_else(|| env_or(env::APP_NAME_ENV, DEFAULT_APP_NAME)),
            app_version: self
                .app_version
                .unwrap_or_else(|| env_or(env::APP_VERSION_ENV, DEFAULT_APP_VERSION)),
            environment: self
                .environment
                .unwrap_or_else(|| env_or(env::ENVIRONMENT_ENV, DEFAULT_ENVIRONMENT)),
            auto_detect_hostname: self
                .auto_detect_hostname
                .unwrap_or_else(|| env_flag(env::SLS_AUTO_DETECT_HOSTNAME_ENV, true)),
            auto_detect_host_ip: self
                .auto_detect_host_ip
                .unwrap_or_else(|| env_flag(env::SLS_AUTO_DETECT_HOST_IP_ENV, true)),
            auto_detect_thread: self
                .auto_detect_thread
                .unwrap_or_else(|| env_flag(env::SLS_AUTO_DETECT_THREAD_ENV, false)),
            default_category: self
                .default_category
                .unwrap_or_else(|| env_or(env::SLS_DEFAULT_CATEGORY_ENV, DEFAULT_CATEGORY)),
            pack_id: self.pack_id,
        };
        config.validate()?;
        Ok(config)
    }
}
