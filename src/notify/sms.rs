// src/notify/sms.rs
//! Twilio-style SMS transport over the REST messages endpoint.
//!
//! Degrades gracefully: without credentials the transport reports itself
//! unconfigured and every send fails with `NotConfigured` (the scheduler
//! logs and moves on). `SMS_DRY_RUN=1` logs the message instead of sending.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::errors::TransportError;
use crate::notify::AlertTransport;

const DEFAULT_API_BASE: &str = "https://api.twilio.com/2010-04-01";

#[derive(Clone)]
pub struct SmsTransport {
    credentials: Option<Credentials>,
    api_base: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
    dry_run: bool,
}

#[derive(Clone)]
struct Credentials {
    account_sid: String,
    auth_token: String,
    from_number: String,
}

impl SmsTransport {
    /// Reads TWILIO_ACCOUNT_SID / TWILIO_AUTH_TOKEN / TWILIO_FROM_NUMBER.
    /// Missing credentials leave the transport in disabled mode.
    pub fn from_env() -> Self {
        let credentials = match (
            std::env::var("TWILIO_ACCOUNT_SID").ok(),
            std::env::var("TWILIO_AUTH_TOKEN").ok(),
            std::env::var("TWILIO_FROM_NUMBER").ok(),
        ) {
            (Some(account_sid), Some(auth_token), Some(from_number)) => Some(Credentials {
                account_sid,
                auth_token,
                from_number,
            }),
            _ => {
                tracing::warn!("Twilio credentials not configured; SMS alerts disabled");
                None
            }
        };
        let dry_run = std::env::var("SMS_DRY_RUN").ok().is_some_and(|v| v == "1");
        Self {
            credentials,
            api_base: std::env::var("TWILIO_API_BASE")
                .unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
            client: Client::new(),
            timeout: Duration::from_secs(10),
            max_retries: 3,
            dry_run,
        }
    }

    /// Builder for tests and tools pointing at a stub server.
    pub fn new(account_sid: String, auth_token: String, from_number: String) -> Self {
        Self {
            credentials: Some(Credentials {
                account_sid,
                auth_token,
                from_number,
            }),
            api_base: DEFAULT_API_BASE.to_string(),
            client: Client::new(),
            timeout: Duration::from_secs(10),
            max_retries: 3,
            dry_run: false,
        }
    }

    pub fn with_api_base(mut self, base: String) -> Self {
        self.api_base = base;
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }
}

#[async_trait]
impl AlertTransport for SmsTransport {
    async fn send(&self, phone: &str, message: &str) -> Result<(), TransportError> {
        let Some(creds) = &self.credentials else {
            return Err(TransportError::NotConfigured);
        };
        if self.dry_run {
            tracing::info!(to = %phone, body = %message, "[dry-run] would send SMS");
            return Ok(());
        }

        let url = format!(
            "{}/Accounts/{}/Messages.json",
            self.api_base, creds.account_sid
        );
        let form = [
            ("To", phone),
            ("From", creds.from_number.as_str()),
            ("Body", message),
        ];

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(&url)
                .basic_auth(&creds.account_sid, Some(&creds.auth_token))
                .timeout(self.timeout)
                .form(&form)
                .send()
                .await;

            match res {
                Ok(rsp) if rsp.status().is_success() => return Ok(()),
                Ok(rsp) => {
                    let status = rsp.status().as_u16();
                    // 4xx is a terminal rejection; retrying the same payload
                    // will not change the answer.
                    let retryable = rsp.status().is_server_error();
                    let body = rsp.text().await.unwrap_or_default();
                    if retryable && attempt < self.max_retries {
                        tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1))).await;
                        continue;
                    }
                    return Err(TransportError::Rejected { status, body });
                }
                Err(e) => {
                    if attempt < self.max_retries {
                        tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1))).await;
                        continue;
                    }
                    return Err(TransportError::Http(e));
                }
            }
        }
    }

    fn is_configured(&self) -> bool {
        self.credentials.is_some()
    }
}
