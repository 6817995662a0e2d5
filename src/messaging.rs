//! Outbound SMS delivery.
//!
//! `MessageDispatcher` is blocking; async callers wrap it in
//! `tokio::task::spawn_blocking`.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::config::SmsGatewayConfig;

const GATEWAY_TIMEOUT_SECS: u64 = 10;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Cannot reach SMS gateway at {0}")]
    Connection(String),

    #[error("SMS gateway returned {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

/// Sends a text message to a phone number in `+<country><number>` form.
pub trait MessageDispatcher: Send + Sync {
    fn send(&self, to: &str, body: &str) -> Result<(), DispatchError>;
}

/// Twilio-compatible REST gateway: form-encoded POST with basic auth to
/// `{base}/2010-04-01/Accounts/{sid}/Messages.json`.
pub struct SmsGatewayClient {
    config: SmsGatewayConfig,
    client: reqwest::blocking::Client,
}

impl SmsGatewayClient {
    pub fn new(config: SmsGatewayConfig) -> Result<Self, DispatchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(GATEWAY_TIMEOUT_SECS))
            .build()
            .map_err(|e| DispatchError::HttpClient(e.to_string()))?;
        Ok(Self {
            config: SmsGatewayConfig {
                base_url: config.base_url.trim_end_matches('/').to_string(),
                ..config
            },
            client,
        })
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.config.base_url, self.config.account_sid
        )
    }
}

impl MessageDispatcher for SmsGatewayClient {
    fn send(&self, to: &str, body: &str) -> Result<(), DispatchError> {
        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&[("To", to), ("From", self.config.from.as_str()), ("Body", body)])
            .send()
            .map_err(|e| {
                if e.is_connect() {
                    DispatchError::Connection(self.config.base_url.clone())
                } else if e.is_timeout() {
                    DispatchError::HttpClient(format!(
                        "Request timed out after {GATEWAY_TIMEOUT_SECS}s"
                    ))
                } else {
                    DispatchError::HttpClient(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(DispatchError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        tracing::debug!(to = %mask_phone(to), "SMS accepted by gateway");
        Ok(())
    }
}

/// Development dispatcher: logs the message with digits masked.
#[derive(Debug, Default)]
pub struct LogDispatcher;

impl MessageDispatcher for LogDispatcher {
    fn send(&self, to: &str, body: &str) -> Result<(), DispatchError> {
        tracing::info!(to = %mask_phone(to), body = %mask_digits(body), "SMS (log only)");
        Ok(())
    }
}

/// Pick the gateway client when configured, otherwise log-only.
pub fn dispatcher_from_config(
    gateway: Option<&SmsGatewayConfig>,
) -> Result<Arc<dyn MessageDispatcher>, DispatchError> {
    match gateway {
        Some(config) => {
            tracing::info!(gateway = %config.base_url, "SMS gateway configured");
            Ok(Arc::new(SmsGatewayClient::new(config.clone())?))
        }
        None => {
            tracing::warn!("No SMS gateway configured, OTP codes will only be logged (masked)");
            Ok(Arc::new(LogDispatcher))
        }
    }
}

fn mask_digits(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_ascii_digit() { '*' } else { c })
        .collect()
}

/// Keep the last four characters of a phone number.
fn mask_phone(phone: &str) -> String {
    let count = phone.chars().count();
    phone
        .chars()
        .enumerate()
        .map(|(i, c)| if i + 4 < count && c.is_ascii_digit() { '*' } else { c })
        .collect()
}

/// Records every message instead of sending it. Can be told to fail.
#[cfg(test)]
#[derive(Default)]
pub struct RecordingDispatcher {
    pub sent: std::sync::Mutex<Vec<(String, String)>>,
    pub fail: std::sync::atomic::AtomicBool,
}

#[cfg(test)]
impl RecordingDispatcher {
    pub fn failing() -> Self {
        let d = Self::default();
        d.fail.store(true, std::sync::atomic::Ordering::SeqCst);
        d
    }

    pub fn last(&self) -> Option<(String, String)> {
        self.sent.lock().unwrap().last().cloned()
    }
}

#[cfg(test)]
impl MessageDispatcher for RecordingDispatcher {
    fn send(&self, to: &str, body: &str) -> Result<(), DispatchError> {
        if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(DispatchError::Rejected {
                status: 503,
                body: "unavailable".into(),
            });
        }
        self.sent.lock().unwrap().push((to.to_string(), body.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway(base_url: &str) -> SmsGatewayConfig {
        SmsGatewayConfig {
            base_url: base_url.into(),
            account_sid: "AC123".into(),
            auth_token: "secret".into(),
            from: "+15550000000".into(),
        }
    }

    #[test]
    fn messages_url_trims_trailing_slash() {
        let client = SmsGatewayClient::new(gateway("https://sms.example.com/")).unwrap();
        assert_eq!(
            client.messages_url(),
            "https://sms.example.com/2010-04-01/Accounts/AC123/Messages.json"
        );
    }

    #[test]
    fn unreachable_gateway_is_connection_error() {
        let client = SmsGatewayClient::new(gateway("http://127.0.0.1:1")).unwrap();
        let err = client.send("+919999999999", "hello").unwrap_err();
        assert!(matches!(err, DispatchError::Connection(_) | DispatchError::HttpClient(_)));
    }

    #[test]
    fn log_dispatcher_always_succeeds() {
        assert!(LogDispatcher.send("+919999999999", "Your OTP is 123456").is_ok());
    }

    #[test]
    fn masking_hides_codes_and_most_of_phone() {
        assert_eq!(mask_digits("code 123456"), "code ******");
        assert_eq!(mask_phone("+919999991234"), "+********1234");
        assert_eq!(mask_phone("12"), "12");
    }

    #[test]
    fn factory_falls_back_to_log_only() {
        let dispatcher = dispatcher_from_config(None).unwrap();
        assert!(dispatcher.send("+911234567890", "x").is_ok());
    }

    #[test]
    fn recording_dispatcher_captures_and_fails_on_demand() {
        let ok = RecordingDispatcher::default();
        ok.send("+91", "hi").unwrap();
        assert_eq!(ok.last(), Some(("+91".into(), "hi".into())));
        assert!(RecordingDispatcher::failing().send("+91", "hi").is_err());
    }
}
