use super::types::GatewayConfig;
use std::fs;
use std::path::Path;

impl GatewayConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;

        let config: GatewayConfig = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file: {}", e))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration settings
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(anyhow::anyhow!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_levels.join(", ")
            ));
        }

        if self.pool.max_size == 0 {
            return Err(anyhow::anyhow!("pool.max_size must be at least 1"));
        }
        if self.pool.min_size > self.pool.max_size {
            return Err(anyhow::anyhow!(
                "pool.min_size ({}) cannot exceed pool.max_size ({})",
                self.pool.min_size,
                self.pool.max_size
            ));
        }

        if self.admission.enabled && self.admission.max_concurrent == 0 {
            return Err(anyhow::anyhow!(
                "admission.max_concurrent must be at least 1 when throttling is enabled"
            ));
        }

        if self.breaker.failure_threshold == 0 {
            return Err(anyhow::anyhow!("breaker.failure_threshold must be at least 1"));
        }

        if self.limits.default_limit == 0 {
            return Err(anyhow::anyhow!("limits.default_limit must be at least 1"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = GatewayConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.limits.default_limit, 150);
        assert_eq!(config.admission.stale_after_seconds, 1800);
        assert!(!config.engine.danger_accept_invalid_certs);
    }

    #[test]
    fn test_parse_partial_toml() {
        let toml = r#"
            [server]
            port = 9090

            [engine]
            endpoint = "http://engine:32010"
            username = "svc"
            password = "secret"

            [admission]
            max_concurrent = 4
        "#;
        let config: GatewayConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.engine.username, "svc");
        assert_eq!(config.admission.max_concurrent, 4);
        // untouched sections fall back to defaults
        assert_eq!(config.pool.max_size, 16);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_pool_sizes_rejected() {
        let mut config = GatewayConfig::default();
        config.pool.min_size = 32;
        config.pool.max_size = 4;
        assert!(config.validate().is_err());
    }
}
