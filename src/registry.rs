use crate::error::{ConfigError, SinkError};
use crate::sink::RecordSink;
use crate::url::scheme_of;
use std::collections::HashMap;
use std::sync::Arc;

/// Builds a sink from a configuration URL.
pub type SinkFactory = fn(&str) -> Result<Arc<dyn RecordSink>, SinkError>;

/// Explicit map from URL scheme to sink factory.
///
/// Lets applications pick a destination with a single URL string instead of
/// constructing sinks by hand:
///
/// ```no_run
/// use tracing_sls_sink::registry::SinkRegistry;
///
/// let sink = SinkRegistry::with_defaults()
///     .build("sls://my-project/app-log?region=cn-hangzhou")
///     .expect("sink");
/// ```
#[derive(Clone, Default)]
pub struct SinkRegistry {
    factories: HashMap<String, SinkFactory>,
}

impl SinkRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in schemes (`sls` when the `http` feature is
    /// enabled).
    pub fn with_defaults() -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::new();
        #[cfg(feature = "http")]
        registry.register(crate::url::SLS_SCHEME, build_sls_sink);
        registry
    }

    /// Register `factory` for `scheme`, replacing any previous entry.
    pub fn register(&mut self, scheme: &str, factory: SinkFactory) -> &mut Self {
        self.factories.insert(scheme.to_ascii_lowercase(), factory);
        self
    }

    pub fn schemes(&self) -> Vec<&str> {
        let mut schemes: Vec<_> = self.factories.keys().map(String::as_str).collect();
        schemes.sort_unstable();
        schemes
    }

    /// Build a sink for `url` using the factory registered for its scheme.
    pub fn build(&self, url: &str) -> Result<Arc<dyn RecordSink>, SinkError> {
        let scheme = scheme_of(url).ok_or_else(|| ConfigError::InvalidUrl(url.to_string()))?;
        let factory = self
            .factories
            .get(&scheme)
            .ok_or(ConfigError::UnknownScheme(scheme))?;
        factory(url)
    }
}

impl std::fmt::Debug for SinkRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SinkRegistry").field("schemes", &self.schemes()).finish()
    }
}

/// Factory for `sls://` URLs.
#[cfg(feature = "http")]
pub fn build_sls_sink(url: &str) -> Result<Arc<dyn RecordSink>, SinkError> {
    let config = crate::url::parse_sls_url(url)?.into_config()?;
    let sink = crate::sink::SlsSink::new(config)?;
    Ok(Arc::new(sink))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordInput;

    struct Discard;

    impl RecordSink for Discard {
        fn handle(&self, _input: &RecordInput<'_>) {}
    }

    fn discard(_url: &str) -> Result<Arc<dyn RecordSink>, SinkError> {
        Ok(Arc::new(Discard))
    }

    #[test]
    fn dispatches_on_scheme_case_insensitively() {
        let mut registry = SinkRegistry::new();
        registry.register("Mem", discard);
        assert!(registry.build("mem://anything").is_ok());
        assert!(registry.build("MEM://anything").is_ok());
    }

    #[test]
    fn unknown_scheme_is_an_error() {
        let registry = SinkRegistry::new();
        let err = registry.build("kafka://broker/topic").err().unwrap();
        assert!(matches!(err, SinkError::Config(ConfigError::UnknownScheme(s)) if s == "kafka"));

        let err = registry.build("no-scheme").err().unwrap();
        assert!(matches!(err, SinkError::Config(ConfigError::InvalidUrl(_))));
    }

    #[cfg(feature = "http")]
    #[test]
    fn defaults_include_sls() {
        assert_eq!(SinkRegistry::with_defaults().schemes(), vec!["sls"]);
    }

    #[cfg(feature = "http")]
    #[test]
    fn sls_factory_surfaces_config_errors() {
        let err = SinkRegistry::with_defaults().build("sls://p/l?region=r&batch_size=0&access_key_id=a&access_key_secret=b");
        assert!(matches!(
            err,
            Err(SinkError::Config(ConfigError::InvalidValue { key: "batch_size", .. }))
        ));
    }
}
