// Logging initialization
use anyhow::Result;

/// Initialize the process-wide logger. The configured level is the default
/// filter; RUST_LOG still overrides it for ad-hoc debugging.
pub fn init_logging(level: &str) -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_millis()
        .try_init()?;
    Ok(())
}
