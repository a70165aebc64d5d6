//! Configuration for the simulator.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use dvsim_routing::{
    GraphConfig, JitteredLatency, Latency, NoLatency, OverflowPolicy, DEFAULT_MAILBOX_CAPACITY,
};

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// How the final routing table is printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Simulator configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bounded capacity of each node's mailbox.
    pub mailbox_capacity: usize,

    /// Full-mailbox behavior.
    pub overflow: OverflowPolicy,

    /// Upper bound of the simulated per-message delay, in milliseconds.
    pub max_latency_ms: u64,

    /// Seed for reproducible latency; random when unset.
    pub latency_seed: Option<u64>,

    /// How long to wait for the protocol to go quiet.
    pub settle_timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error), overridden by `RUST_LOG`.
    pub log_level: String,

    pub log_format: LogFormat,

    pub output: OutputFormat,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mailbox_capacity = lookup("DVSIM_MAILBOX_CAPACITY")
            .and_then(|s| s.parse().ok())
            .filter(|n: &usize| *n > 0)
            .unwrap_or(DEFAULT_MAILBOX_CAPACITY);

        let overflow = match lookup("DVSIM_OVERFLOW") {
            Some(s) => s
                .parse::<OverflowPolicy>()
                .map_err(anyhow::Error::msg)
                .context("DVSIM_OVERFLOW")?,
            None => OverflowPolicy::default(),
        };

        // Each advertisement waits up to three seconds by default.
        let max_latency_ms = lookup("DVSIM_MAX_LATENCY_MS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(3000);

        let latency_seed = match lookup("DVSIM_LATENCY_SEED") {
            Some(s) => Some(
                s.parse()
                    .with_context(|| format!("DVSIM_LATENCY_SEED is not a number: {}", s))?,
            ),
            None => None,
        };

        let settle_timeout_secs = lookup("DVSIM_SETTLE_TIMEOUT_SECS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(60);

        let log_level = lookup("DVSIM_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        let log_format = match lookup("DVSIM_LOG_FORMAT").as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => bail!("DVSIM_LOG_FORMAT must be pretty or json, got '{}'", other),
        };

        let output = match lookup("DVSIM_OUTPUT").as_deref() {
            None | Some("text") => OutputFormat::Text,
            Some("json") => OutputFormat::Json,
            Some(other) => bail!("DVSIM_OUTPUT must be text or json, got '{}'", other),
        };

        Ok(Self {
            mailbox_capacity,
            overflow,
            max_latency_ms,
            latency_seed,
            settle_timeout_secs,
            log_level,
            log_format,
            output,
        })
    }

    /// Settle timeout as a duration.
    pub fn settle_timeout(&self) -> Duration {
        Duration::from_secs(self.settle_timeout_secs)
    }

    /// Protocol configuration for the graph.
    pub fn graph_config(&self) -> GraphConfig {
        let max = Duration::from_millis(self.max_latency_ms);
        let latency: Arc<dyn Latency> = match (self.max_latency_ms, self.latency_seed) {
            (0, _) => Arc::new(NoLatency),
            (_, Some(seed)) => Arc::new(JitteredLatency::seeded(max, seed)),
            (_, None) => Arc::new(JitteredLatency::new(max)),
        };

        GraphConfig {
            mailbox_capacity: self.mailbox_capacity,
            overflow: self.overflow,
            latency,
            ..GraphConfig::default()
        }
    }
}
