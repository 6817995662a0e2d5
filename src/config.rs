use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "Mediconnect";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default listen address (port 5000, all interfaces).
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5000";

/// Bearer tokens stay valid for 7 days.
pub const DEFAULT_TOKEN_TTL_DAYS: i64 = 7;

/// OTP challenges expire after 5 minutes.
pub const DEFAULT_OTP_TTL_SECS: i64 = 300;

/// Wrong codes allowed before a challenge is invalidated.
pub const DEFAULT_OTP_MAX_ATTEMPTS: u32 = 5;

/// Prefix applied to phone numbers that carry no country code.
pub const DEFAULT_COUNTRY_CODE: &str = "+91";

/// Interval between expired-challenge sweeps.
pub const OTP_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Log filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "mediconnect_lib=info,tower_http=warn"
}

/// Get the application data directory
/// ~/Mediconnect/ on all platforms
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_NAME)
}

/// Default location of the SQLite database file.
pub fn default_db_path() -> PathBuf {
    app_data_dir().join("mediconnect.db")
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value}")]
    InvalidValue { var: &'static str, value: String },
}

/// Credentials for the outbound SMS gateway. Absent means log-only dispatch.
#[derive(Debug, Clone)]
pub struct SmsGatewayConfig {
    pub base_url: String,
    pub account_sid: String,
    pub auth_token: String,
    pub from: String,
}

/// Runtime configuration, resolved from the environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub db_path: PathBuf,
    pub token_ttl: chrono::Duration,
    pub otp_ttl: chrono::Duration,
    pub otp_max_attempts: u32,
    pub country_code: String,
    pub sms_gateway: Option<SmsGatewayConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR
                .parse()
                .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], 5000))),
            db_path: default_db_path(),
            token_ttl: chrono::Duration::days(DEFAULT_TOKEN_TTL_DAYS),
            otp_ttl: chrono::Duration::seconds(DEFAULT_OTP_TTL_SECS),
            otp_max_attempts: DEFAULT_OTP_MAX_ATTEMPTS,
            country_code: DEFAULT_COUNTRY_CODE.to_string(),
            sms_gateway: None,
        }
    }
}

impl ServerConfig {
    /// Resolve configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Resolve configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(bind) = lookup("MEDICONNECT_BIND") {
            config.bind_addr = parse_var("MEDICONNECT_BIND", &bind)?;
        }
        if let Some(path) = lookup("MEDICONNECT_DB_PATH") {
            config.db_path = PathBuf::from(path);
        }
        if let Some(days) = lookup("MEDICONNECT_TOKEN_TTL_DAYS") {
            let days: u32 = parse_var("MEDICONNECT_TOKEN_TTL_DAYS", &days)?;
            config.token_ttl = chrono::Duration::days(days.into());
        }
        if let Some(secs) = lookup("MEDICONNECT_OTP_TTL_SECS") {
            let secs: u32 = parse_var("MEDICONNECT_OTP_TTL_SECS", &secs)?;
            config.otp_ttl = chrono::Duration::seconds(secs.into());
        }
        if let Some(max) = lookup("MEDICONNECT_OTP_MAX_ATTEMPTS") {
            let max: u32 = parse_var("MEDICONNECT_OTP_MAX_ATTEMPTS", &max)?;
            if max == 0 {
                return Err(ConfigError::InvalidValue {
                    var: "MEDICONNECT_OTP_MAX_ATTEMPTS",
                    value: "0".into(),
                });
            }
            config.otp_max_attempts = max;
        }
        if let Some(code) = lookup("MEDICONNECT_COUNTRY_CODE") {
            if !code.starts_with('+') || code.len() < 2 {
                return Err(ConfigError::InvalidValue {
                    var: "MEDICONNECT_COUNTRY_CODE",
                    value: code,
                });
            }
            config.country_code = code;
        }

        config.sms_gateway = match (
            lookup("SMS_GATEWAY_URL"),
            lookup("SMS_ACCOUNT_SID"),
            lookup("SMS_AUTH_TOKEN"),
            lookup("SMS_FROM"),
        ) {
            (Some(base_url), Some(account_sid), Some(auth_token), Some(from)) => {
                Some(SmsGatewayConfig {
                    base_url,
                    account_sid,
                    auth_token,
                    from,
                })
            }
            _ => None,
        };

        Ok(config)
    }
}

fn parse_var<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        var,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn app_data_dir_ends_with_app_name() {
        assert!(app_data_dir().ends_with("Mediconnect"));
    }

    #[test]
    fn db_path_under_app_data() {
        assert!(default_db_path().starts_with(app_data_dir()));
    }

    #[test]
    fn defaults_when_environment_empty() {
        let config = ServerConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.bind_addr.port(), 5000);
        assert_eq!(config.token_ttl, chrono::Duration::days(7));
        assert_eq!(config.otp_ttl, chrono::Duration::minutes(5));
        assert_eq!(config.otp_max_attempts, 5);
        assert_eq!(config.country_code, "+91");
        assert!(config.sms_gateway.is_none());
    }

    #[test]
    fn overrides_are_applied() {
        let config = ServerConfig::from_lookup(lookup_from(&[
            ("MEDICONNECT_BIND", "127.0.0.1:8080"),
            ("MEDICONNECT_OTP_TTL_SECS", "60"),
            ("MEDICONNECT_OTP_MAX_ATTEMPTS", "3"),
            ("MEDICONNECT_COUNTRY_CODE", "+44"),
        ]))
        .unwrap();
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.otp_ttl, chrono::Duration::seconds(60));
        assert_eq!(config.otp_max_attempts, 3);
        assert_eq!(config.country_code, "+44");
    }

    #[test]
    fn malformed_number_is_rejected() {
        let result =
            ServerConfig::from_lookup(lookup_from(&[("MEDICONNECT_OTP_TTL_SECS", "five")]));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { var: "MEDICONNECT_OTP_TTL_SECS", .. })
        ));
    }

    #[test]
    fn zero_attempts_rejected() {
        let result =
            ServerConfig::from_lookup(lookup_from(&[("MEDICONNECT_OTP_MAX_ATTEMPTS", "0")]));
        assert!(result.is_err());
    }

    #[test]
    fn gateway_requires_all_four_variables() {
        let partial = ServerConfig::from_lookup(lookup_from(&[
            ("SMS_GATEWAY_URL", "https://sms.example"),
            ("SMS_ACCOUNT_SID", "AC1"),
        ]))
        .unwrap();
        assert!(partial.sms_gateway.is_none());

        let full = ServerConfig::from_lookup(lookup_from(&[
            ("SMS_GATEWAY_URL", "https://sms.example"),
            ("SMS_ACCOUNT_SID", "AC1"),
            ("SMS_AUTH_TOKEN", "secret"),
            ("SMS_FROM", "+15550000"),
        ]))
        .unwrap();
        assert_eq!(full.sms_gateway.unwrap().from, "+15550000");
    }

    #[test]
    fn app_name_is_mediconnect() {
        assert_eq!(APP_NAME, "Mediconnect");
    }
}
