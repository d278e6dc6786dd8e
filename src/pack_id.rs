//! PackId generation.
//!
//! A PackId has the form `{context_prefix}-{counter:06}`. The prefix is a
//! short hash of host identity, process id and construction time; the
//! counter increments under a mutex so concurrent callers never observe
//! the same value. SLS uses the PackId log tag to group log groups that
//! belong to the same producer context.

use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

/// Log tag key under which the PackId is attached to a batch.
pub const PACK_ID_TAG: &str = "__pack_id__";

const PREFIX_LEN: usize = 8;

static GENERATOR_SEQ: AtomicU64 = AtomicU64::new(0);

/// Thread-safe PackId generator.
#[derive(Debug)]
pub struct PackIdGenerator {
    context_prefix: String,
    counter: Mutex<u64>,
}

impl PackIdGenerator {
    /// Create a generator. When `context_prefix` is `None` a fresh prefix
    /// is derived for this instance.
    pub fn new(context_prefix: Option<String>) -> Self {
        let context_prefix = context_prefix
            .filter(|p| !p.is_empty())
            .unwrap_or_else(generate_context_prefix);
        Self {
            context_prefix,
            counter: Mutex::new(0),
        }
    }

    /// Return the next PackId. Counters start at 1.
    pub fn next_id(&self) -> String {
        let mut counter = self.counter.lock();
        *counter += 1;
        format!("{}-{:06}", self.context_prefix, *counter)
    }

    pub fn context_prefix(&self) -> &str {
        &self.context_prefix
    }

    /// Number of ids handed out so far.
    pub fn current_count(&self) -> u64 {
        *self.counter.lock()
    }
}

impl Default for PackIdGenerator {
    fn default() -> Self {
        Self::new(None)
    }
}

/// Hash of hostname, pid, wall clock and a per-process sequence number,
/// truncated to [`PREFIX_LEN`] hex characters.
fn generate_context_prefix() -> String {
    let hostname = crate::host::detect_hostname().unwrap_or_else(|| "unknown".to_string());
    let pid = std::process::id();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let seq = GENERATOR_SEQ.fetch_add(1, Ordering::Relaxed);

    let mut hasher = Sha256::new();
    hasher.update(format!("{hostname}-{pid}-{nanos}-{seq}").as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..PREFIX_LEN].to_string()
}

/// When a new PackId is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PackIdPolicy {
    /// A fresh id for every batch sent.
    #[default]
    PerBatch,
    /// One id generated at sink construction and reused for its lifetime.
    Fixed,
}

impl std::str::FromStr for PackIdPolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "per_batch" | "per-batch" | "batch" => Ok(PackIdPolicy::PerBatch),
            "fixed" | "lifetime" => Ok(PackIdPolicy::Fixed),
            _ => Err(()),
        }
    }
}

/// PackId settings of a sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackIdConfig {
    pub enabled: bool,
    /// Explicit prefix to group several sinks under one context.
    pub context_prefix: Option<String>,
    pub policy: PackIdPolicy,
}

impl Default for PackIdConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            context_prefix: None,
            policy: PackIdPolicy::PerBatch,
        }
    }
}

/// Hands out the batch-level PackId according to the configured policy.
///
/// The policy is fixed at construction.
#[derive(Debug)]
pub struct PackIdManager {
    generator: Option<PackIdGenerator>,
    policy: PackIdPolicy,
    fixed: Option<String>,
}

impl PackIdManager {
    pub fn new(config: &PackIdConfig) -> Self {
        if !config.enabled {
            return Self {
                generator: None,
                policy: config.policy,
                fixed: None,
            };
        }

        let generator = PackIdGenerator::new(config.context_prefix.clone());
        let fixed = match config.policy {
            PackIdPolicy::Fixed => Some(generator.next_id()),
            PackIdPolicy::PerBatch => None,
        };
        Self {
            generator: Some(generator),
            policy: config.policy,
            fixed,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.generator.is_some()
    }

    pub fn policy(&self) -> PackIdPolicy {
        self.policy
    }

    pub fn context_prefix(&self) -> Option<&str> {
        self.generator.as_ref().map(PackIdGenerator::context_prefix)
    }

    /// PackId to tag the next batch with, or `None` when disabled.
    pub fn batch_pack_id(&self) -> Option<String> {
        match (&self.generator, &self.fixed) {
            (None, _) => None,
            (Some(_), Some(fixed)) => Some(fixed.clone()),
            (Some(generator), None) => Some(generator.next_id()),
        }
    }
}

/// Process-wide generator, lazily created on first access.
///
/// Sinks never use it; each sink owns its own [`PackIdManager`]. It exists
/// for application code that wants to correlate its own records with a
/// single process-wide context.
pub fn default_generator() -> &'static PackIdGenerator {
    static DEFAULT: OnceLock<PackIdGenerator> = OnceLock::new();
    DEFAULT.get_or_init(PackIdGenerator::default)
}
