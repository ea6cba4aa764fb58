// Default value functions

pub fn default_host() -> String {
    "127.0.0.1".to_string()
}

pub fn default_port() -> u16 {
    8080
}

pub fn default_workers() -> usize {
    0 // 0 = one worker per CPU
}

pub fn default_log_level() -> String {
    "info".to_string()
}

pub fn default_true() -> bool {
    true
}

pub fn default_engine_endpoint() -> String {
    "http://127.0.0.1:32010".to_string()
}

pub fn default_auth_base() -> String {
    "https://127.0.0.1:9047".to_string()
}

pub fn default_request_timeout_seconds() -> u64 {
    120
}

pub fn default_connect_timeout_seconds() -> u64 {
    10
}

pub fn default_pool_max_size() -> usize {
    16
}

pub fn default_pool_min_size() -> usize {
    2
}

pub fn default_pool_idle_timeout_seconds() -> u64 {
    300
}

pub fn default_pool_retry_wait_millis() -> u64 {
    50
}

pub fn default_max_concurrent_queries() -> usize {
    20
}

pub fn default_admission_delay_millis() -> u64 {
    0
}

pub fn default_admission_stale_after_seconds() -> u64 {
    1800 // 30 minutes
}

pub fn default_failure_threshold() -> u32 {
    5
}

pub fn default_open_timeout_seconds() -> u64 {
    30
}

pub fn default_non_ascii_pattern() -> String {
    r"[^\x00-\x7F]".to_string()
}

pub fn default_query_limit() -> u32 {
    150
}

pub fn default_max_rows() -> u64 {
    1_000_000
}

pub fn default_flush_rows() -> usize {
    500
}

pub fn default_sweep_interval_seconds() -> u64 {
    60
}
