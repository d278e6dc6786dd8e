//! Environment variable names used by this crate as fallbacks when a
//! [`SinkConfig`](crate::config::SinkConfig) field is not set explicitly.
//!
//! These are purely helpers; the worker, queue and sender never read the
//! environment themselves.

/// SLS access key id.
pub const SLS_ACCESS_KEY_ID_ENV: &str = "SLS_ACCESS_KEY_ID";

/// SLS access key secret.
pub const SLS_ACCESS_KEY_SECRET_ENV: &str = "SLS_ACCESS_KEY_SECRET";

/// Application name attached to every log item.
pub const APP_NAME_ENV: &str = "APP_NAME";

/// Application version attached to every log item.
pub const APP_VERSION_ENV: &str = "APP_VERSION";

/// Deployment environment, e.g. `production`.
pub const ENVIRONMENT_ENV: &str = "ENVIRONMENT";

/// `true` to attach the detected hostname.
pub const SLS_AUTO_DETECT_HOSTNAME_ENV: &str = "SLS_AUTO_DETECT_HOSTNAME";

/// `true` to attach the detected host IP.
pub const SLS_AUTO_DETECT_HOST_IP_ENV: &str = "SLS_AUTO_DETECT_HOST_IP";

/// `true` to attach the calling thread descriptor.
pub const SLS_AUTO_DETECT_THREAD_ENV: &str = "SLS_AUTO_DETECT_THREAD";

/// Category used when no rule matches a record.
pub const SLS_DEFAULT_CATEGORY_ENV: &str = "SLS_DEFAULT_CATEGORY";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Read a non-empty environment variable.
pub fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Read a boolean environment variable. Only a case-insensitive `true`
/// counts as `true`; any other value is `false`; unset yields `default`.
pub fn env_flag(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(value) => parse_flag(&value),
        Err(_) => default,
    }
}

pub(crate) fn parse_flag(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}
