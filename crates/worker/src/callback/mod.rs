//! Result delivery to the job's callback endpoint.

pub mod signature;

use crate::config::CallbackConfig;
use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::time::Duration;

/// Delivers processing results with a single bounded POST.
///
/// There is deliberately no retry loop here: retrying delivery would risk
/// duplicate side effects on the receiver, and the redelivery path for
/// failed processing lives on the broker side. A failed delivery is the
/// caller's to log and account for.
#[derive(Clone)]
pub struct CallbackPublisher {
    http: reqwest::Client,
    secret: Option<String>,
}

impl CallbackPublisher {
    pub fn new(config: &CallbackConfig) -> Result<Self> {
        Self::with_timeout(config.timeout(), config.hmac_secret.clone())
    }

    pub fn with_timeout(timeout: Duration, secret: Option<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build callback HTTP client")?;
        Ok(Self { http, secret })
    }

    /// POST the payload to the callback endpoint, signing it first when a
    /// secret is configured. A non-2xx response counts as a failed delivery.
    pub async fn publish(&self, callback_url: &str, mut payload: Value) -> Result<()> {
        if let Some(secret) = &self.secret {
            let signature = signature::sign(&payload, secret)?;
            if let Value::Object(map) = &mut payload {
                map.insert("hmac".to_string(), Value::String(signature));
            }
        }

        let response = self
            .http
            .post(callback_url)
            .json(&payload)
            .send()
            .await
            .context("callback request failed")?;

        let status = response.status();
        if !status.is_success() {
            bail!("callback endpoint returned {status}");
        }

        Ok(())
    }
}
