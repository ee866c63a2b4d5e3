//! # Playback Engine Configuration
//!
//! Tunables for retry, health checks, lifecycle handling and metadata polling.
//! Every field has a serde default so hosts can override a subset from JSON.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Aggregate configuration for the playback engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlaybackConfig {
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub health: HealthCheckConfig,
    #[serde(default)]
    pub watchdog: WatchdogConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
}

impl PlaybackConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        self.retry.validate()?;
        self.health.validate()?;
        self.watchdog.validate()?;
        self.metadata.validate()
    }
}

// ============================================================================
// Retry Policy
// ============================================================================

/// Bounded exponential backoff for play attempts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Additional attempts after the first one.
    ///
    /// Default: 3.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay for attempt `n` is `base_delay * 2^n`, capped at `max_delay`.
    ///
    /// Default: 1 second.
    #[serde(default = "default_base_delay")]
    pub base_delay: Duration,

    /// Default: 8 seconds.
    #[serde(default = "default_max_delay")]
    pub max_delay: Duration,

    /// Uniform jitter as a fraction of the delay (0.2 = ±20%).
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay: default_base_delay(),
            max_delay: default_max_delay(),
            jitter: default_jitter(),
        }
    }
}

impl RetryPolicy {
    pub fn validate(&self) -> Result<(), String> {
        if self.base_delay.is_zero() {
            return Err("retry.base_delay must be > 0".to_string());
        }
        if self.max_delay < self.base_delay {
            return Err("retry.max_delay cannot be shorter than retry.base_delay".to_string());
        }
        if !(0.0..1.0).contains(&self.jitter) {
            return Err("retry.jitter must be in [0.0, 1.0)".to_string());
        }
        Ok(())
    }
}

// ============================================================================
// Health Check
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckConfig {
    /// Verification period while playing.
    ///
    /// Default: 30 seconds.
    #[serde(default = "default_health_interval")]
    pub interval: Duration,

    /// Consecutive failed checks before reconnecting on native transports.
    #[serde(default = "default_native_failure_threshold")]
    pub native_failure_threshold: u32,

    /// Consecutive failed checks before reconnecting on web transports.
    #[serde(default = "default_web_failure_threshold")]
    pub web_failure_threshold: u32,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            interval: default_health_interval(),
            native_failure_threshold: default_native_failure_threshold(),
            web_failure_threshold: default_web_failure_threshold(),
        }
    }
}

impl HealthCheckConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.interval.is_zero() {
            return Err("health.interval must be > 0".to_string());
        }
        if self.native_failure_threshold == 0 || self.web_failure_threshold == 0 {
            return Err("health failure thresholds must be > 0".to_string());
        }
        Ok(())
    }
}

// ============================================================================
// Lifecycle Watchdog
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchdogConfig {
    /// Background stays shorter than this are ignored.
    ///
    /// Default: 5 seconds.
    #[serde(default = "default_min_background")]
    pub min_background: Duration,

    /// Wait after returning to foreground before verifying output.
    ///
    /// Default: 500 ms.
    #[serde(default = "default_foreground_settle")]
    pub foreground_settle: Duration,

    /// Single-shot delay before reconnecting after connectivity returns.
    ///
    /// Default: 2 seconds.
    #[serde(default = "default_reconnect_debounce")]
    pub reconnect_debounce: Duration,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            min_background: default_min_background(),
            foreground_settle: default_foreground_settle(),
            reconnect_debounce: default_reconnect_debounce(),
        }
    }
}

impl WatchdogConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.reconnect_debounce.is_zero() {
            return Err("watchdog.reconnect_debounce must be > 0".to_string());
        }
        Ok(())
    }
}

// ============================================================================
// Metadata
// ============================================================================

/// Upper bound accepted for [`MetadataConfig::backoff_factor`].
pub const MAX_POLL_BACKOFF_FACTOR: f64 = 10.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataConfig {
    /// Default: 5 seconds.
    #[serde(default = "default_poll_base_interval")]
    pub base_interval: Duration,

    /// Default: 30 seconds.
    #[serde(default = "default_poll_max_interval")]
    pub max_interval: Duration,

    /// Interval multiplier applied per unchanged result once backing off.
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,

    /// Unchanged results needed before the interval starts growing.
    #[serde(default = "default_unchanged_threshold")]
    pub unchanged_threshold: u32,

    /// How long pushed metadata suppresses polled results.
    ///
    /// Default: 10 seconds.
    #[serde(default = "default_priority_window")]
    pub priority_window: Duration,

    /// Timeout for a single feed request.
    #[serde(default = "default_request_timeout")]
    pub request_timeout: Duration,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            base_interval: default_poll_base_interval(),
            max_interval: default_poll_max_interval(),
            backoff_factor: default_backoff_factor(),
            unchanged_threshold: default_unchanged_threshold(),
            priority_window: default_priority_window(),
            request_timeout: default_request_timeout(),
        }
    }
}

impl MetadataConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.base_interval.is_zero() {
            return Err("metadata.base_interval must be > 0".to_string());
        }
        if self.max_interval < self.base_interval {
            return Err("metadata.max_interval cannot be shorter than metadata.base_interval".to_string());
        }
        if !(1.0..=MAX_POLL_BACKOFF_FACTOR).contains(&self.backoff_factor) {
            return Err(format!(
                "metadata.backoff_factor must be between 1.0 and {}",
                MAX_POLL_BACKOFF_FACTOR
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Default Functions (for serde)
// ============================================================================

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay() -> Duration {
    Duration::from_millis(1000)
}

fn default_max_delay() -> Duration {
    Duration::from_millis(8000)
}

fn default_jitter() -> f64 {
    0.2
}

fn default_health_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_native_failure_threshold() -> u32 {
    2
}

fn default_web_failure_threshold() -> u32 {
    3
}

fn default_min_background() -> Duration {
    Duration::from_secs(5)
}

fn default_foreground_settle() -> Duration {
    Duration::from_millis(500)
}

fn default_reconnect_debounce() -> Duration {
    Duration::from_secs(2)
}

fn default_poll_base_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_poll_max_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_factor() -> f64 {
    1.5
}

fn default_unchanged_threshold() -> u32 {
    3
}

fn default_priority_window() -> Duration {
    Duration::from_secs(10)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(8)
}
