use super::{types::Config, ConfigError};

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(invalid("server.port cannot be 0"));
    }

    if config.discovery.api_key.trim().is_empty() {
        return Err(invalid("discovery.api_key is required"));
    }

    let scheduler = &config.scheduler;
    if !(1..=50).contains(&scheduler.page_size) {
        return Err(invalid("scheduler.page_size must be between 1 and 50"));
    }
    if !(1..=50).contains(&scheduler.batch_size) {
        return Err(invalid("scheduler.batch_size must be between 1 and 50"));
    }
    if scheduler.cycle_interval_secs == 0 {
        return Err(invalid("scheduler.cycle_interval_secs cannot be 0"));
    }

    let filters = &config.filters;
    if let (Some(min), Some(max)) = (filters.min_subscribers, filters.max_subscribers) {
        if min > max {
            return Err(invalid(
                "filters.min_subscribers cannot exceed filters.max_subscribers",
            ));
        }
    }
    if !(0.0..=1.0).contains(&filters.shorts_ratio_threshold) {
        return Err(invalid(
            "filters.shorts_ratio_threshold must be between 0.0 and 1.0",
        ));
    }
    if filters.analyze_recent_uploads && !(1..=50).contains(&filters.sample_size) {
        return Err(invalid("filters.sample_size must be between 1 and 50"));
    }

    Ok(())
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::ValidationError(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;

    fn base_config() -> Config {
        load_config_from_str(
            r#"
[discovery]
api_key = "key"
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&base_config()).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let mut config = base_config();
        config.server.port = 0;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_validate_empty_api_key_fails() {
        let mut config = base_config();
        config.discovery.api_key = "  ".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_page_size_bounds() {
        let mut config = base_config();
        config.scheduler.page_size = 51;
        assert!(validate_config(&config).is_err());
        config.scheduler.page_size = 0;
        assert!(validate_config(&config).is_err());
        config.scheduler.page_size = 25;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_inverted_subscriber_bounds_fails() {
        let mut config = base_config();
        config.filters.min_subscribers = Some(10_000);
        config.filters.max_subscribers = Some(1_000);
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_open_ended_bounds() {
        let mut config = base_config();
        config.filters.min_subscribers = Some(10_000);
        config.filters.max_subscribers = None;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_shorts_threshold_range() {
        let mut config = base_config();
        config.filters.shorts_ratio_threshold = 1.5;
        assert!(validate_config(&config).is_err());
    }
}
