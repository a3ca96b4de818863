//! FCM legacy HTTP gateway.
//!
//! Speaks the legacy `/fcm/send` JSON protocol: multicast requests use
//! `registration_ids`, single sends use `to`, and per-token outcomes
//! come back in a `results` array aligned with the request order.

use async_trait::async_trait;
use serde::Deserialize;

use super::{MulticastReport, PushAddress, PushGateway, PushMessage, SendOutcome};
use crate::config::PushConfig;
use crate::error::{DispatchError, Result};

/// Production push gateway backed by FCM's legacy HTTP API.
#[derive(Debug, Clone)]
pub struct FcmGateway {
    endpoint: String,
    server_key: String,
    multicast_limit: usize,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct FcmResponse {
    #[serde(default)]
    success: u32,
    #[serde(default)]
    results: Vec<FcmResult>,
}

/// One per-address result. Only the error code matters; a missing
/// error means the message was accepted.
#[derive(Debug, Deserialize)]
struct FcmResult {
    #[serde(default)]
    error: Option<String>,
}

fn outcome_from(result: &FcmResult) -> SendOutcome {
    match result.error.as_deref() {
        None => SendOutcome::Delivered,
        Some("NotRegistered") | Some("InvalidRegistration") => SendOutcome::Unregistered,
        Some(other) => SendOutcome::Failed(other.to_owned()),
    }
}

impl FcmGateway {
    /// Build a gateway from push settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &PushConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| DispatchError::Push(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            endpoint: config.endpoint.clone(),
            server_key: config.server_key.clone(),
            multicast_limit: config.multicast_limit,
            client,
        })
    }

    async fn post(&self, body: &serde_json::Value) -> Result<FcmResponse> {
        if self.server_key.trim().is_empty() {
            return Err(DispatchError::Push("push server key is empty".to_owned()));
        }

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("key={}", self.server_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| DispatchError::Push(format!("gateway request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DispatchError::Push(format!(
                "gateway returned {status}: {body}"
            )));
        }

        response
            .json::<FcmResponse>()
            .await
            .map_err(|e| DispatchError::Push(format!("invalid gateway response: {e}")))
    }
}

#[async_trait]
impl PushGateway for FcmGateway {
    async fn send(&self, address: &str, message: &PushMessage) -> Result<SendOutcome> {
        let body = serde_json::json!({
            "to": address,
            "notification": {
                "title": message.title,
                "body": message.body,
            },
        });
        let response = self.post(&body).await?;
        match response.results.first() {
            Some(result) => Ok(outcome_from(result)),
            None if response.success > 0 => Ok(SendOutcome::Delivered),
            None => Err(DispatchError::Push(
                "gateway returned no per-address result".to_owned(),
            )),
        }
    }

    async fn send_multicast(
        &self,
        addresses: &[PushAddress],
        message: &PushMessage,
    ) -> Result<MulticastReport> {
        if addresses.is_empty() {
            return Ok(MulticastReport::default());
        }
        if addresses.len() > self.multicast_limit {
            return Err(DispatchError::Push(format!(
                "multicast of {} addresses exceeds limit {}",
                addresses.len(),
                self.multicast_limit
            )));
        }

        let body = serde_json::json!({
            "registration_ids": addresses,
            "notification": {
                "title": message.title,
                "body": message.body,
            },
        });
        let response = self.post(&body).await?;
        if response.results.len() != addresses.len() {
            return Err(DispatchError::Push(format!(
                "gateway returned {} results for {} addresses",
                response.results.len(),
                addresses.len()
            )));
        }

        Ok(MulticastReport {
            results: response.results.iter().map(outcome_from).collect(),
        })
    }
}
