use super::defaults::*;
use serde::{Deserialize, Serialize};

/// Main gateway configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default)]
    pub pool: PoolSettings,
    #[serde(default)]
    pub admission: AdmissionSettings,
    #[serde(default)]
    pub breaker: BreakerSettings,
    #[serde(default)]
    pub validator: ValidatorSettings,
    #[serde(default)]
    pub limits: LimitsSettings,
    #[serde(default)]
    pub store: StoreSettings,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// 0 = one worker per CPU core
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: default_workers(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// error | warn | info | debug | trace
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Analytical engine endpoints and credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Flight RPC endpoint, e.g. "http://engine:32010"
    #[serde(default = "default_engine_endpoint")]
    pub endpoint: String,

    /// Base URL of the HTTP auth endpoint; the login path is appended.
    #[serde(default = "default_auth_base")]
    pub auth_base: String,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    /// Accept invalid TLS certificates on the auth endpoint. Off by default;
    /// enabling it is logged loudly. Lab environments only.
    #[serde(default)]
    pub danger_accept_invalid_certs: bool,

    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,

    #[serde(default = "default_connect_timeout_seconds")]
    pub connect_timeout_seconds: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            endpoint: default_engine_endpoint(),
            auth_base: default_auth_base(),
            username: String::new(),
            password: String::new(),
            danger_accept_invalid_certs: false,
            request_timeout_seconds: default_request_timeout_seconds(),
            connect_timeout_seconds: default_connect_timeout_seconds(),
        }
    }
}

/// Connection pool settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolSettings {
    #[serde(default = "default_pool_max_size")]
    pub max_size: usize,

    /// Idle sweeps never shrink the pool below this size.
    #[serde(default = "default_pool_min_size")]
    pub min_size: usize,

    #[serde(default = "default_pool_idle_timeout_seconds")]
    pub idle_timeout_seconds: u64,

    /// Wait before the single retry when the pool is exhausted.
    #[serde(default = "default_pool_retry_wait_millis")]
    pub retry_wait_millis: u64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_size: default_pool_max_size(),
            min_size: default_pool_min_size(),
            idle_timeout_seconds: default_pool_idle_timeout_seconds(),
            retry_wait_millis: default_pool_retry_wait_millis(),
        }
    }
}

/// Query admission (throttling) settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmissionSettings {
    /// When false, AcquireSlot is a no-op.
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_max_concurrent_queries")]
    pub max_concurrent: usize,

    /// Optional post-acquire delay to smooth bursts.
    #[serde(default = "default_admission_delay_millis")]
    pub acquire_delay_millis: u64,

    /// Tracked slots older than this are swept and their permits recovered.
    #[serde(default = "default_admission_stale_after_seconds")]
    pub stale_after_seconds: u64,
}

impl Default for AdmissionSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_concurrent: default_max_concurrent_queries(),
            acquire_delay_millis: default_admission_delay_millis(),
            stale_after_seconds: default_admission_stale_after_seconds(),
        }
    }
}

/// Circuit breaker settings, applied to every registered dependency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerSettings {
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    #[serde(default = "default_open_timeout_seconds")]
    pub open_timeout_seconds: u64,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            open_timeout_seconds: default_open_timeout_seconds(),
        }
    }
}

/// SQL safety validator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorSettings {
    /// Pattern matching characters that are rejected outright.
    #[serde(default = "default_non_ascii_pattern")]
    pub non_ascii_pattern: String,

    /// When true, any comment occurrence is itself a rejection instead of
    /// being stripped.
    #[serde(default)]
    pub reject_comments: bool,
}

impl Default for ValidatorSettings {
    fn default() -> Self {
        Self {
            non_ascii_pattern: default_non_ascii_pattern(),
            reject_comments: false,
        }
    }
}

/// Row and rewrite limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsSettings {
    /// Applied when the caller supplies no positive limit.
    #[serde(default = "default_query_limit")]
    pub default_limit: u32,

    /// Hard row cap enforced mid-stream.
    #[serde(default = "default_max_rows")]
    pub max_rows: u64,

    /// Streaming mode flushes the sink every this many rows.
    #[serde(default = "default_flush_rows")]
    pub flush_rows: usize,

    /// Interval of the pool/admission maintenance sweep.
    #[serde(default = "default_sweep_interval_seconds")]
    pub sweep_interval_seconds: u64,
}

impl Default for LimitsSettings {
    fn default() -> Self {
        Self {
            default_limit: default_query_limit(),
            max_rows: default_max_rows(),
            flush_rows: default_flush_rows(),
            sweep_interval_seconds: default_sweep_interval_seconds(),
        }
    }
}

/// View definition source for the in-memory store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Optional JSON file with an array of stored view definitions,
    /// loaded into the in-memory store at startup.
    #[serde(default)]
    pub views_path: Option<String>,
}
