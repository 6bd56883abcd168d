//! HTTP inference collaborator.

use super::tokens::TokenPool;
use super::Processor;
use crate::config::InferenceConfig;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use tracing::warn;
use veristream_domain::Verdict;

/// Calls the inference service over HTTP.
///
/// POSTs the job payload to the configured endpoint and decodes the verdict
/// from the response body. On an auth or rate-limit rejection the token pool
/// is rotated and the call fails; the entry stays pending and the redelivery
/// runs with the next token.
pub struct HttpProcessor {
    http: reqwest::Client,
    endpoint: String,
    tokens: TokenPool,
}

impl HttpProcessor {
    pub fn new(config: &InferenceConfig, tokens: TokenPool) -> Result<Self> {
        let endpoint = config
            .endpoint
            .clone()
            .context("no inference endpoint configured")?;
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .context("failed to build inference HTTP client")?;
        Ok(Self {
            http,
            endpoint,
            tokens,
        })
    }
}

#[async_trait]
impl<P: Serialize + Send + Sync> Processor<P> for HttpProcessor {
    async fn process(&self, payload: &P) -> Result<Verdict> {
        let mut request = self.http.post(&self.endpoint).json(payload);
        if let Some(token) = self.tokens.current() {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.context("inference request failed")?;
        let status = response.status();

        if matches!(
            status,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS
        ) {
            self.tokens.rotate();
            warn!(%status, "inference token rejected, rotated to next token");
            bail!("inference endpoint rejected token ({status})");
        }

        if !status.is_success() {
            bail!("inference endpoint returned {status}");
        }

        response
            .json::<Verdict>()
            .await
            .context("invalid verdict from inference endpoint")
    }
}
