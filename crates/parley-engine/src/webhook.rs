// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound webhook ingestion.
//!
//! `received -> token-checked -> header-checked -> deduplicated -> persisted
//! -> acknowledged`. Only configuration and authentication failures are
//! returned to the caller; everything after authentication is logged and
//! acknowledged so providers do not retry deliveries we cannot fix.

use std::collections::BTreeSet;
use std::sync::Arc;

use http::HeaderMap;
use parley_core::types::{
    ContactProfile, ConversationKey, CustomerProfile, Direction, InboundEvent, StatusUpdate,
    WebhookEvent, now_timestamp,
};
use parley_core::{AuthFailure, MessageStore, ParleyError, ProviderClient, ProviderConfig};
use tracing::{debug, error, info, warn};

use crate::address::normalize_address;
use crate::cache::InboxCaches;
use crate::events::{EventBus, NotificationEvent};
use crate::factory::ProviderFactory;
use crate::resolver::{ConversationResolver, message_from_provider};

/// What happened to an authenticated delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// New event; counts of newly stored messages and applied status changes.
    Processed { messages: usize, statuses: usize },
    /// The event id was already in the event log.
    Duplicate,
    /// Authenticated, but the body could not be decoded.
    Undecodable,
}

/// Authenticates, deduplicates and applies provider webhooks.
#[derive(Clone)]
pub struct WebhookIngestor {
    store: Arc<dyn MessageStore>,
    factory: Arc<ProviderFactory>,
    resolver: ConversationResolver,
    caches: InboxCaches,
    events: EventBus,
}

impl WebhookIngestor {
    pub fn new(
        store: Arc<dyn MessageStore>,
        factory: Arc<ProviderFactory>,
        caches: InboxCaches,
        events: EventBus,
    ) -> Self {
        Self {
            resolver: ConversationResolver::new(Arc::clone(&store)),
            store,
            factory,
            caches,
            events,
        }
    }

    /// Handle one delivery to `/webhooks/{provider}/{tenant_id}/{token}`.
    ///
    /// Errors: `Configuration`/`UnknownProvider` (no active config),
    /// `Auth(Token)`, `Auth(Header)`. Any other failure is absorbed.
    pub async fn ingest(
        &self,
        tenant_id: i64,
        provider_segment: &str,
        token: &str,
        headers: &HeaderMap,
        body: &[u8],
    ) -> Result<WebhookOutcome, ParleyError> {
        let provider = self
            .factory
            .resolve_for_webhook(tenant_id, provider_segment)
            .await?;
        let config = provider.get_config();
        authenticate(config, provider_segment, token, headers)?;

        Ok(self.process(provider.as_ref(), body).await)
    }

    async fn process(&self, provider: &dyn ProviderClient, body: &[u8]) -> WebhookOutcome {
        let config = provider.get_config();
        let tenant_id = config.tenant_id;

        let event = match provider.decode_webhook(body) {
            Ok(event) => event,
            Err(e) => {
                error!(tenant_id, provider = provider.name(), error = %e, "webhook payload could not be decoded");
                return WebhookOutcome::Undecodable;
            }
        };

        let log_entry = WebhookEvent {
            tenant_id,
            provider: provider.name().to_string(),
            event_id: event.event_id.clone(),
            event_type: event.event_type.clone(),
            payload: String::from_utf8_lossy(body).into_owned(),
            received_at: now_timestamp(),
        };
        match self.store.record_webhook_event(&log_entry).await {
            Ok(true) => {}
            Ok(false) => {
                info!(
                    tenant_id,
                    provider = provider.name(),
                    event_id = event.event_id.as_deref().unwrap_or_default(),
                    "duplicate webhook delivery acknowledged"
                );
                return WebhookOutcome::Duplicate;
            }
            // Message-level idempotency still protects the apply step.
            Err(e) => error!(tenant_id, error = %e, "recording webhook event failed"),
        }

        self.apply(provider, &event).await
    }

    async fn apply(&self, provider: &dyn ProviderClient, event: &InboundEvent) -> WebhookOutcome {
        let config = provider.get_config();
        let tenant_id = config.tenant_id;
        let mut touched = BTreeSet::new();
        let mut messages = 0;
        let mut statuses = 0;

        for incoming in &event.messages {
            let customer = match incoming.direction {
                Direction::Inbound => &incoming.from,
                Direction::Outbound => &incoming.to,
            };
            let resolved = match self
                .resolver
                .resolve_phone(
                    tenant_id,
                    customer,
                    &config.business_address,
                    &config.default_country_code,
                )
                .await
            {
                Ok(resolved) => resolved,
                Err(e) => {
                    error!(tenant_id, external_id = %incoming.external_id, error = %e, "could not resolve conversation for inbound message");
                    continue;
                }
            };
            let conversation = resolved.conversation;
            touched.insert(conversation.id.clone());
            if resolved.created {
                self.events.publish(NotificationEvent::ConversationCreated {
                    conversation: conversation.clone(),
                });
            }

            let message = message_from_provider(&conversation, provider.name(), incoming);
            match self.store.append_message(&message).await {
                Ok(true) => {
                    messages += 1;
                    self.caches.invalidate_conversation(tenant_id, &conversation.id);
                    debug!(tenant_id, conversation_id = %conversation.id, external_id = %incoming.external_id, "inbound message stored");
                    self.events
                        .publish(NotificationEvent::MessageReceived { message });
                }
                Ok(false) => {
                    debug!(tenant_id, external_id = %incoming.external_id, "inbound message already stored");
                }
                Err(e) => {
                    error!(tenant_id, external_id = %incoming.external_id, error = %e, "storing inbound message failed");
                }
            }
        }

        for update in &event.statuses {
            if let Some(conversation_id) = self.apply_status(provider, update).await {
                statuses += 1;
                touched.insert(conversation_id);
            }
        }

        for contact in &event.contacts {
            if let Some(conversation_id) = self.apply_contact(config, contact).await {
                touched.insert(conversation_id);
            }
        }

        let at = now_timestamp();
        for conversation_id in &touched {
            if let Err(e) = self
                .store
                .touch_last_event(tenant_id, conversation_id, &at)
                .await
            {
                error!(tenant_id, conversation_id = %conversation_id, error = %e, "updating last event time failed");
            }
        }

        WebhookOutcome::Processed { messages, statuses }
    }

    async fn apply_status(
        &self,
        provider: &dyn ProviderClient,
        update: &StatusUpdate,
    ) -> Option<String> {
        let tenant_id = provider.get_config().tenant_id;
        match self
            .store
            .update_message_status(tenant_id, provider.name(), &update.external_id, update.status)
            .await
        {
            Ok(Some(message)) => {
                self.caches
                    .invalidate_conversation(tenant_id, &message.conversation_id);
                self.events.publish(NotificationEvent::MessageStatusChanged {
                    tenant_id,
                    conversation_id: message.conversation_id.clone(),
                    message_id: message.id,
                    status: message.status,
                });
                Some(message.conversation_id)
            }
            Ok(None) => {
                debug!(tenant_id, external_id = %update.external_id, status = %update.status, "status update ignored");
                None
            }
            Err(e) => {
                error!(tenant_id, external_id = %update.external_id, error = %e, "applying status update failed");
                None
            }
        }
    }

    async fn apply_contact(&self, config: &ProviderConfig, contact: &ContactProfile) -> Option<String> {
        let tenant_id = config.tenant_id;
        let key = ConversationKey::Phone {
            customer_address: normalize_address(&contact.address, &config.default_country_code)
                .ok()?,
            business_address: normalize_address(
                &config.business_address,
                &config.default_country_code,
            )
            .ok()?,
        };
        let conversation = match self.store.find_conversation(tenant_id, &key).await {
            Ok(Some(conversation)) => conversation,
            Ok(None) => return None,
            Err(e) => {
                error!(tenant_id, error = %e, "looking up contact conversation failed");
                return None;
            }
        };
        if conversation.customer_name.as_deref() == Some(contact.name.as_str()) {
            return Some(conversation.id);
        }
        let profile = CustomerProfile {
            name: Some(contact.name.clone()),
            avatar_url: None,
        };
        match self
            .store
            .update_profile(tenant_id, &conversation.id, &profile)
            .await
        {
            Ok(()) => {
                self.caches.invalidate_lists(tenant_id);
                Some(conversation.id)
            }
            Err(e) => {
                error!(tenant_id, conversation_id = %conversation.id, error = %e, "saving contact profile failed");
                None
            }
        }
    }
}

/// Path token, then the configured auth header. Both are exact matches.
fn authenticate(
    config: &ProviderConfig,
    provider_segment: &str,
    token: &str,
    headers: &HeaderMap,
) -> Result<(), ParleyError> {
    let tenant_id = config.tenant_id;
    if token != config.webhook_token {
        warn!(
            tenant_id,
            provider = provider_segment,
            "security: webhook token mismatch, delivery rejected"
        );
        return Err(ParleyError::Auth(AuthFailure::Token));
    }

    let expected = config.auth_header.render(&config.webhook_secret);
    let presented = headers
        .get(config.auth_header.name.as_str())
        .and_then(|v| v.to_str().ok());
    if presented != Some(expected.as_str()) {
        warn!(
            tenant_id,
            provider = provider_segment,
            header = %config.auth_header.name,
            present = presented.is_some(),
            "security: webhook auth header mismatch, delivery rejected"
        );
        return Err(ParleyError::Auth(AuthFailure::Header));
    }
    Ok(())
}
