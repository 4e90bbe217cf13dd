// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the WhatsApp Cloud (Graph) API.

use std::time::Duration;

use parley_core::ParleyError;
use reqwest::{Response, StatusCode};
use serde::Serialize;
use tracing::{debug, warn};

use crate::types::{ErrorEnvelope, SendResponse};

/// Graph API base including the pinned version.
pub const API_BASE_URL: &str = "https://graph.facebook.com/v19.0";

/// Graph API client bound to one business phone number.
#[derive(Clone)]
pub struct CloudClient {
    client: reqwest::Client,
    phone_number_id: String,
    access_token: String,
    base_url: String,
}

impl std::fmt::Debug for CloudClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudClient")
            .field("phone_number_id", &self.phone_number_id)
            .field("access_token", &"[redacted]")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl CloudClient {
    pub fn new(
        phone_number_id: String,
        access_token: String,
        base_url: Option<String>,
    ) -> Result<Self, ParleyError> {
        if phone_number_id.is_empty() || access_token.is_empty() {
            return Err(ParleyError::Configuration(
                "whatsapp requires account_id (phone number id) and auth_token (access token)"
                    .into(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ParleyError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self {
            client,
            phone_number_id,
            access_token,
            base_url: base_url
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_else(|| API_BASE_URL.to_string()),
        })
    }

    fn messages_url(&self) -> String {
        format!("{}/{}/messages", self.base_url, self.phone_number_id)
    }

    /// POST a message payload and return the assigned `wamid`.
    pub async fn post_message<T: Serialize + ?Sized>(
        &self,
        payload: &T,
    ) -> Result<String, ParleyError> {
        let response = self
            .client
            .post(self.messages_url())
            .bearer_auth(&self.access_token)
            .json(payload)
            .send()
            .await
            .map_err(transport_error)?;
        let body = success_body(response).await?;
        let parsed: SendResponse = serde_json::from_str(&body).map_err(|e| ParleyError::Provider {
            message: format!("failed to parse whatsapp response: {e}"),
            source: Some(Box::new(e)),
        })?;
        let id = parsed
            .messages
            .into_iter()
            .next()
            .map(|m| m.id)
            .ok_or_else(|| ParleyError::provider("whatsapp response carried no message id"))?;
        debug!(wamid = %id, "whatsapp message accepted");
        Ok(id)
    }

    /// POST a payload whose response body is irrelevant (read receipts).
    pub async fn post_ack<T: Serialize + ?Sized>(&self, payload: &T) -> Result<(), ParleyError> {
        let response = self
            .client
            .post(self.messages_url())
            .bearer_auth(&self.access_token)
            .json(payload)
            .send()
            .await
            .map_err(transport_error)?;
        success_body(response).await.map(|_| ())
    }

    /// GET the phone number node; the status code is the health signal.
    pub async fn fetch_phone_number(&self) -> Result<StatusCode, ParleyError> {
        let response = self
            .client
            .get(format!("{}/{}", self.base_url, self.phone_number_id))
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(transport_error)?;
        Ok(response.status())
    }
}

fn transport_error(e: reqwest::Error) -> ParleyError {
    ParleyError::Provider {
        message: format!("whatsapp request failed: {e}"),
        source: Some(Box::new(e)),
    }
}

async fn success_body(response: Response) -> Result<String, ParleyError> {
    let status = response.status();
    let body = response.text().await.map_err(transport_error)?;
    if status.is_success() {
        return Ok(body);
    }
    let detail = match serde_json::from_str::<ErrorEnvelope>(&body) {
        Ok(env) => match env.error.code {
            Some(code) => format!("{} (code {code})", env.error.message),
            None => env.error.message,
        },
        Err(_) => body,
    };
    warn!(status = %status, "whatsapp API error");
    Err(ParleyError::provider(format!(
        "whatsapp returned {status}: {detail}"
    )))
}
