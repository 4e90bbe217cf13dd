// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Twilio provider client for the Parley messaging core.
//!
//! Sends through the Messaging REST API, decodes form-encoded webhooks, and
//! implements [`SyncableProvider`] by reading the account's message log and
//! the Lookup API's caller-name data.

pub mod client;
pub mod types;
pub mod webhook;

use std::collections::HashSet;

use async_trait::async_trait;
use parley_core::types::{
    CustomerProfile, HealthStatus, InboundEvent, MessageStatus, OutboundRequest, ProviderMessage,
    RemoteConversation, SendReceipt,
};
use parley_core::{ParleyError, ProviderClient, ProviderConfig, SyncableProvider};
use reqwest::StatusCode;
use tracing::{debug, info};

use crate::client::TwilioClient;
use crate::types::{ApiMessage, SendForm};

/// Messages fetched per peer when rebuilding a conversation.
const HISTORY_LIMIT: u32 = 1000;

/// Messages scanned to build a conversation list.
const SCAN_FACTOR: u32 = 5;

/// Twilio implementation of [`ProviderClient`].
pub struct TwilioProvider {
    config: ProviderConfig,
    client: TwilioClient,
}

impl TwilioProvider {
    /// Build a provider from a tenant configuration.
    pub fn new(config: ProviderConfig) -> Result<Self, ParleyError> {
        let client = TwilioClient::new(
            config.credentials.account_id.clone(),
            config.credentials.auth_token.clone(),
            config.api_base_url.clone(),
        )?;
        info!(tenant_id = config.tenant_id, "twilio provider initialized");
        Ok(Self { config, client })
    }

    /// Sender fields: a messaging service SID wins over the business number.
    fn sender<'a>(&'a self, request: &'a OutboundRequest) -> (Option<&'a str>, Option<&'a str>) {
        match self.config.credentials.sender_id.as_deref() {
            Some(sid) if sid.starts_with("MG") => (None, Some(sid)),
            _ => (Some(request.from.as_str()), None),
        }
    }

    async fn history(&self, peer: &str, limit: u32) -> Result<Vec<ProviderMessage>, ParleyError> {
        let native = self.to_native_address(peer);
        let inbound = self.client.list_messages(&[("From", native.as_str())], limit).await?;
        let outbound = self.client.list_messages(&[("To", native.as_str())], limit).await?;

        let mut seen = HashSet::new();
        let mut messages: Vec<ProviderMessage> = inbound
            .into_iter()
            .chain(outbound)
            .filter(|m| seen.insert(m.sid.clone()))
            .map(ApiMessage::into_provider_message)
            .collect();
        messages.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        let skip = messages.len().saturating_sub(limit as usize);
        Ok(messages.split_off(skip))
    }
}

#[async_trait]
impl ProviderClient for TwilioProvider {
    fn name(&self) -> &str {
        "twilio"
    }

    fn get_config(&self) -> &ProviderConfig {
        &self.config
    }

    fn to_native_address(&self, canonical: &str) -> String {
        canonical.trim().to_string()
    }

    fn decode_webhook(&self, body: &[u8]) -> Result<InboundEvent, ParleyError> {
        webhook::decode(body)
    }

    async fn send_message(&self, request: &OutboundRequest) -> Result<SendReceipt, ParleyError> {
        let (from, messaging_service_sid) = self.sender(request);
        let form = SendForm {
            to: &request.to,
            from,
            messaging_service_sid,
            body: &request.body,
            media_url: request.media_url.as_deref(),
        };
        let created = self.client.create_message(&form).await?;
        Ok(SendReceipt {
            status: created
                .status
                .as_deref()
                .map(MessageStatus::from_provider)
                .unwrap_or(MessageStatus::Queued),
            external_id: created.sid,
        })
    }

    async fn list_conversations(
        &self,
        limit: u32,
    ) -> Result<Vec<RemoteConversation>, ParleyError> {
        let recent = self
            .client
            .list_messages(&[], limit.saturating_mul(SCAN_FACTOR))
            .await?;

        let mut seen = HashSet::new();
        let mut conversations = Vec::new();
        for message in &recent {
            let Some(peer) = message.peer() else {
                continue;
            };
            if !seen.insert(peer.to_string()) {
                continue;
            }
            conversations.push(RemoteConversation {
                peer_address: peer.to_string(),
                last_message_at: Some(message.timestamp()),
                last_message_preview: message.body.clone(),
            });
            if conversations.len() >= limit as usize {
                break;
            }
        }
        debug!(count = conversations.len(), "twilio conversations listed");
        Ok(conversations)
    }

    async fn list_messages(
        &self,
        peer: &str,
        limit: u32,
    ) -> Result<Vec<ProviderMessage>, ParleyError> {
        self.history(peer, limit).await
    }

    async fn mark_read(&self, external_id: &str) -> Result<(), ParleyError> {
        // SMS has no read receipts.
        debug!(external_id, "twilio mark_read is a no-op");
        Ok(())
    }

    async fn test_connection(&self) -> Result<HealthStatus, ParleyError> {
        let status = match self.client.fetch_account().await {
            Ok(status) => status,
            Err(e) => return Ok(HealthStatus::Unhealthy(e.to_string())),
        };
        Ok(match status {
            s if s.is_success() => HealthStatus::Healthy,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                HealthStatus::Unhealthy("twilio rejected the credentials".into())
            }
            s => HealthStatus::Degraded(format!("twilio answered {s}")),
        })
    }

    fn syncable(&self) -> Option<&dyn SyncableProvider> {
        Some(self)
    }
}

#[async_trait]
impl SyncableProvider for TwilioProvider {
    async fn refresh_since(&self, since: &str) -> Result<Vec<ProviderMessage>, ParleyError> {
        // DateSent filters by day; the exact cut happens locally.
        let day = since.get(..10).unwrap_or(since);
        let messages = self
            .client
            .list_messages(&[("DateSent>", day)], HISTORY_LIMIT)
            .await?;
        let mut fresh: Vec<ProviderMessage> = messages
            .into_iter()
            .map(ApiMessage::into_provider_message)
            .filter(|m| m.timestamp.as_str() > since)
            .collect();
        fresh.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(fresh)
    }

    async fn enrich_profile(&self, peer: &str) -> Result<Option<CustomerProfile>, ParleyError> {
        let name = self
            .client
            .lookup_caller_name(&self.to_native_address(peer))
            .await?;
        Ok(name.map(|name| CustomerProfile {
            name: Some(name),
            avatar_url: None,
        }))
    }

    async fn rebuild_history(&self, peer: &str) -> Result<Vec<ProviderMessage>, ParleyError> {
        self.history(peer, HISTORY_LIMIT).await
    }
}
