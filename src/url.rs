//! `sls://project/logstore?region=...` configuration URLs.

use crate::config::{SinkConfig, SinkConfigBuilder};
use crate::env::parse_flag;
use crate::error::ConfigError;
use crate::pack_id::{PackIdConfig, PackIdPolicy};
use std::time::Duration;

pub const SLS_SCHEME: &str = "sls";

/// A parsed `sls://` URL, ready to be resolved into a [`SinkConfig`].
#[derive(Debug, Clone)]
pub struct SlsUrl {
    pub project: String,
    pub logstore: String,
    builder: SinkConfigBuilder,
}

impl SlsUrl {
    /// Resolve credentials and defaults (including environment fallbacks).
    pub fn into_config(self) -> Result<SinkConfig, ConfigError> {
        self.builder.build()
    }

    pub fn into_builder(self) -> SinkConfigBuilder {
        self.builder
    }
}

/// Scheme of `url`, lowercased, if it has one.
pub fn scheme_of(url: &str) -> Option<String> {
    url.split_once("://").map(|(scheme, _)| scheme.to_ascii_lowercase())
}

/// Parse `sls://project/logstore?region=cn-hangzhou&key=value`.
///
/// Query values are percent-decoded. Unknown keys are ignored; malformed
/// values for known keys are rejected. `region` may be omitted only when
/// `endpoint` is given, which [`SlsUrl::into_config`] enforces.
///
/// Examples:
/// - `sls://my-project/app-log?region=cn-hangzhou`
/// - `sls://my-project/app-log?region=cn-beijing&batch_size=50&flush_interval=2.5&compress=false`
/// - `sls://p/l?endpoint=http%3A%2F%2F127.0.0.1%3A8080&access_key_id=id&access_key_secret=secret`
pub fn parse_sls_url(url: &str) -> Result<SlsUrl, ConfigError> {
    let invalid = || ConfigError::InvalidUrl(url.to_string());

    let (scheme, rest) = url.split_once("://").ok_or_else(invalid)?;
    if !scheme.eq_ignore_ascii_case(SLS_SCHEME) {
        return Err(ConfigError::UnknownScheme(scheme.to_string()));
    }

    let (path, query) = rest.split_once('?').unwrap_or((rest, ""));
    let mut segments = path.trim_end_matches('/').split('/');
    let project = decode(segments.next().unwrap_or_default(), url)?;
    let logstore = decode(segments.next().unwrap_or_default(), url)?;
    if segments.next().is_some() {
        return Err(invalid());
    }
    if project.is_empty() {
        return Err(ConfigError::MissingField("project"));
    }
    if logstore.is_empty() {
        return Err(ConfigError::MissingField("logstore"));
    }

    let mut params = Vec::new();
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        params.push((decode(key, url)?, decode(value, url)?));
    }

    let region = params
        .iter()
        .find(|(k, _)| k == "region")
        .map(|(_, v)| v.clone())
        .unwrap_or_default();

    let mut builder = SinkConfig::builder(project.clone(), logstore.clone(), region);
    let mut pack_id = PackIdConfig::default();
    for (key, value) in params {
        builder = apply(builder, &mut pack_id, &key, value)?;
    }

    Ok(SlsUrl {
        project,
        logstore,
        builder: builder.pack_id(pack_id),
    })
}

fn apply(
    builder: SinkConfigBuilder,
    pack_id: &mut PackIdConfig,
    key: &str,
    value: String,
) -> Result<SinkConfigBuilder, ConfigError> {
    Ok(match key {
        "endpoint" => builder.endpoint(value),
        "access_key_id" => builder.access_key_id(value),
        "access_key_secret" => builder.access_key_secret(value),
        "topic" => builder.topic(value),
        "source" => builder.source(value),
        "batch_size" => {
            let size = value.parse::<usize>().map_err(|_| ConfigError::InvalidValue {
                key: "batch_size",
                value,
            })?;
            builder.batch_size(size)
        }
        "flush_interval" => builder.flush_interval_secs(seconds("flush_interval", &value)?)?,
        "timeout" => {
            let secs = seconds("timeout", &value)?;
            let timeout = Duration::try_from_secs_f64(secs).map_err(|_| ConfigError::InvalidValue {
                key: "timeout",
                value,
            })?;
            builder.timeout(timeout)
        }
        "compress" => builder.compress(parse_flag(&value)),
        "app_name" => builder.app_name(value),
        "app_version" => builder.app_version(value),
        "environment" => builder.environment(value),
        "default_category" => builder.default_category(value),
        "auto_detect_hostname" => builder.auto_detect_hostname(parse_flag(&value)),
        "auto_detect_host_ip" => builder.auto_detect_host_ip(parse_flag(&value)),
        "auto_detect_thread" => builder.auto_detect_thread(parse_flag(&value)),
        "pack_id" => {
            pack_id.enabled = parse_flag(&value);
            builder
        }
        "pack_id_policy" => {
            pack_id.policy = value.parse::<PackIdPolicy>().map_err(|_| ConfigError::InvalidValue {
                key: "pack_id_policy",
                value,
            })?;
            builder
        }
        "context_prefix" => {
            pack_id.context_prefix = Some(value).filter(|v| !v.is_empty());
            builder
        }
        // `region` is consumed by the builder constructor.
        _ => builder,
    })
}

fn seconds(key: &'static str, value: &str) -> Result<f64, ConfigError> {
    value.parse::<f64>().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}

fn decode(raw: &str, url: &str) -> Result<String, ConfigError> {
    // `+` is a space in query strings.
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|s| s.into_owned())
        .map_err(|_| ConfigError::InvalidUrl(url.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const CREDS: &str = "access_key_id=id&access_key_secret=secret";

    #[test]
    #[serial]
    fn minimal_url_uses_defaults() {
        let url = format!("sls://my-project/app-log?region=cn-hangzhou&{CREDS}");
        let parsed = parse_sls_url(&url).unwrap();
        assert_eq!(parsed.project, "my-project");
        assert_eq!(parsed.logstore, "app-log");

        let config = parsed.into_config().unwrap();
        assert_eq!(config.endpoint, "https://cn-hangzhou.log.aliyuncs.com");
        assert_eq!(config.credentials.access_key_id, "id");
        assert_eq!(config.batch_size, 100);
        assert!(config.compress);
        assert_eq!(config.pack_id, PackIdConfig::default());
    }

    #[test]
    #[serial]
    fn typed_parameters_are_coerced() {
        let url = format!(
            "sls://p/l?region=cn-beijing&{CREDS}&batch_size=50&flush_interval=2.5&timeout=10\
             &compress=false&auto_detect_thread=TRUE&auto_detect_host_ip=no\
             &pack_id_policy=fixed&context_prefix=deadbeef&topic=web%20tier"
        );
        let config = parse_sls_url(&url).unwrap().into_config().unwrap();
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.flush_interval, Duration::from_millis(2500));
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert!(!config.compress);
        assert!(config.auto_detect_thread);
        assert!(!config.auto_detect_host_ip);
        assert_eq!(config.topic, "web tier");
        assert_eq!(config.pack_id.policy, PackIdPolicy::Fixed);
        assert_eq!(config.pack_id.context_prefix.as_deref(), Some("deadbeef"));
    }

    #[test]
    #[serial]
    fn endpoint_is_percent_decoded() {
        let url = format!("sls://p/l?endpoint=http%3A%2F%2F127.0.0.1%3A8080&{CREDS}");
        let config = parse_sls_url(&url).unwrap().into_config().unwrap();
        assert_eq!(config.endpoint, "http://127.0.0.1:8080");
    }

    #[test]
    fn unknown_keys_are_ignored() {
        assert!(parse_sls_url("sls://p/l?region=r&colour=blue&flag").is_ok());
    }

    #[test]
    fn malformed_values_are_rejected() {
        assert!(matches!(
            parse_sls_url("sls://p/l?region=r&batch_size=lots"),
            Err(ConfigError::InvalidValue { key: "batch_size", .. })
        ));
        assert!(matches!(
            parse_sls_url("sls://p/l?region=r&flush_interval=soon"),
            Err(ConfigError::InvalidValue { key: "flush_interval", .. })
        ));
        assert!(matches!(
            parse_sls_url("sls://p/l?region=r&pack_id_policy=per_message"),
            Err(ConfigError::InvalidValue { key: "pack_id_policy", .. })
        ));
    }

    #[test]
    #[serial]
    fn huge_flush_interval_is_rejected() {
        let url = format!("sls://p/l?region=r&{CREDS}&flush_interval=1e19");
        let err = parse_sls_url(&url).unwrap().into_config().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "flush_interval", .. }));
    }

    #[test]
    fn structural_errors() {
        assert!(matches!(parse_sls_url("p/l"), Err(ConfigError::InvalidUrl(_))));
        assert!(matches!(
            parse_sls_url("kafka://b/t"),
            Err(ConfigError::UnknownScheme(s)) if s == "kafka"
        ));
        assert!(matches!(parse_sls_url("sls:///l"), Err(ConfigError::MissingField("project"))));
        assert!(matches!(parse_sls_url("sls://p"), Err(ConfigError::MissingField("logstore"))));
        assert!(matches!(parse_sls_url("sls://p/l/x"), Err(ConfigError::InvalidUrl(_))));
    }

    #[test]
    #[serial]
    fn region_required_without_endpoint() {
        let url = format!("sls://p/l?{CREDS}");
        let err = parse_sls_url(&url).unwrap().into_config().unwrap_err();
        assert!(matches!(err, ConfigError::MissingField("region")));
    }

    #[test]
    fn scheme_detection() {
        assert_eq!(scheme_of("SLS://p/l").as_deref(), Some("sls"));
        assert_eq!(scheme_of("nope"), None);
    }
}
