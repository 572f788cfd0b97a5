use std::str::FromStr;
use std::time::Duration;

/// Engine configuration
///
/// # Environment variables
///
/// | Variable | Default | Meaning |
/// |----------|---------|---------|
/// | DATABASE_URL | unset | PostgreSQL URL; unset runs against the in-memory store |
/// | DATABASE_MAX_CONNECTIONS | 5 | Pool size |
/// | METRICS_ENABLED | true | Serve `/metrics` and `/health` |
/// | METRICS_PORT | 9090 | Metrics HTTP port |
/// | ORDER_SAVE_ATTEMPTS | 2 | Attempts per order mutation when the version guard fails |
/// | ORDER_RETRY_DELAY_MS | 25 | Pause before re-running a conflicted mutation |
///
/// A `.env` file in the working directory is read first.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub metrics_enabled: bool,
    pub metrics_port: u16,
    pub order_save_attempts: u32,
    pub order_retry_delay: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            database_max_connections: 5,
            metrics_enabled: true,
            metrics_port: 9090,
            order_save_attempts: 2,
            order_retry_delay: Duration::from_millis(25),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset or unparsable values fall
    /// back to the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            database_max_connections: parse_var(&lookup, "DATABASE_MAX_CONNECTIONS")
                .unwrap_or(defaults.database_max_connections),
            metrics_enabled: parse_var(&lookup, "METRICS_ENABLED").unwrap_or(defaults.metrics_enabled),
            metrics_port: parse_var(&lookup, "METRICS_PORT").unwrap_or(defaults.metrics_port),
            order_save_attempts: parse_var(&lookup, "ORDER_SAVE_ATTEMPTS")
                .map(|attempts: u32| attempts.max(1))
                .unwrap_or(defaults.order_save_attempts),
            order_retry_delay: parse_var(&lookup, "ORDER_RETRY_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.order_retry_delay),
        }
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|value| value.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        assert_eq!(Config::from_lookup(lookup(&[])), Config::default());
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/books"),
            ("DATABASE_MAX_CONNECTIONS", "12"),
            ("METRICS_ENABLED", "false"),
            ("METRICS_PORT", "9100"),
            ("ORDER_SAVE_ATTEMPTS", "3"),
            ("ORDER_RETRY_DELAY_MS", "0"),
        ]));

        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/books"));
        assert_eq!(config.database_max_connections, 12);
        assert!(!config.metrics_enabled);
        assert_eq!(config.metrics_port, 9100);
        assert_eq!(config.order_save_attempts, 3);
        assert_eq!(config.order_retry_delay, Duration::ZERO);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "  "),
            ("METRICS_PORT", "not-a-port"),
            ("ORDER_SAVE_ATTEMPTS", "0"),
        ]));

        assert_eq!(config.database_url, None);
        assert_eq!(config.metrics_port, 9090);
        assert_eq!(config.order_save_attempts, 1);
    }
}
