// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound send pipeline.
//!
//! validate -> blacklist -> rate limit -> native address -> provider send
//! (bounded) -> persist -> invalidate caches -> notify.

use std::sync::Arc;
use std::time::Duration;

use parley_core::types::{
    ConversationKey, Direction, Message, MessageType, OutboundRequest, Source, now_timestamp,
};
use parley_core::{MessageStore, ParleyError};
use serde::Deserialize;
use tracing::{info, warn};

use crate::address::{check_address_shape, normalize_address};
use crate::cache::InboxCaches;
use crate::events::{EventBus, NotificationEvent};
use crate::factory::ProviderFactory;
use crate::rate_limit::RateLimiter;
use crate::resolver::ConversationResolver;

/// A caller's request to message a customer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SendRequest {
    pub to: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub media_url: Option<String>,
    #[serde(default)]
    pub media_content_type: Option<String>,
}

impl SendRequest {
    pub fn text(to: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            body: body.into(),
            media_url: None,
            media_content_type: None,
        }
    }
}

/// Sends messages through the tenant's provider and records them.
#[derive(Clone)]
pub struct OutboundPipeline {
    store: Arc<dyn MessageStore>,
    factory: Arc<ProviderFactory>,
    limiter: Arc<RateLimiter>,
    resolver: ConversationResolver,
    caches: InboxCaches,
    events: EventBus,
    provider_timeout: Duration,
}

impl OutboundPipeline {
    pub fn new(
        store: Arc<dyn MessageStore>,
        factory: Arc<ProviderFactory>,
        limiter: Arc<RateLimiter>,
        caches: InboxCaches,
        events: EventBus,
        provider_timeout: Duration,
    ) -> Self {
        Self {
            resolver: ConversationResolver::new(Arc::clone(&store)),
            store,
            factory,
            limiter,
            caches,
            events,
            provider_timeout,
        }
    }

    /// Send one message and return the persisted record.
    pub async fn send(&self, tenant_id: i64, request: &SendRequest) -> Result<Message, ParleyError> {
        let result = self.send_inner(tenant_id, request).await;
        if let Err(e) = &result {
            if e.is_caller_error() {
                info!(tenant_id, to = %request.to, error = %e, "outbound send refused");
            } else {
                warn!(tenant_id, to = %request.to, error = %e, "outbound send failed");
            }
        }
        result
    }

    /// Run the pipeline for each request concurrently. Results line up with
    /// `requests`.
    pub async fn send_bulk(
        &self,
        tenant_id: i64,
        requests: &[SendRequest],
    ) -> Vec<Result<Message, ParleyError>> {
        let sends = requests.iter().map(|r| self.send(tenant_id, r));
        futures::future::join_all(sends).await
    }

    async fn send_inner(
        &self,
        tenant_id: i64,
        request: &SendRequest,
    ) -> Result<Message, ParleyError> {
        if request.body.trim().is_empty() && request.media_url.is_none() {
            return Err(ParleyError::Validation(
                "message needs a body or a media_url".into(),
            ));
        }

        check_address_shape(&request.to)?;

        let provider = self.factory.resolve(tenant_id).await?;
        let config = provider.get_config();
        let customer = normalize_address(&request.to, &config.default_country_code)?;
        let business = normalize_address(&config.business_address, &config.default_country_code)?;

        if self.store.is_blacklisted(tenant_id, &customer).await? {
            return Err(ParleyError::Blacklisted { address: customer });
        }
        self.limiter.check(tenant_id, &config.rate_limit)?;

        let native = OutboundRequest {
            to: provider.to_native_address(&customer),
            from: provider.to_native_address(&business),
            body: request.body.clone(),
            media_url: request.media_url.clone(),
            media_content_type: request.media_content_type.clone(),
        };
        let receipt = match tokio::time::timeout(
            self.provider_timeout,
            provider.send_message(&native),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(ParleyError::Timeout {
                    duration: self.provider_timeout,
                });
            }
        };

        let resolved = self
            .resolver
            .resolve(
                tenant_id,
                &ConversationKey::Phone {
                    customer_address: customer.clone(),
                    business_address: business.clone(),
                },
            )
            .await?;
        let conversation = resolved.conversation;

        let message = Message {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id,
            conversation_id: conversation.id.clone(),
            provider: provider.name().to_string(),
            external_id: Some(receipt.external_id.clone()),
            from_address: business,
            to_address: customer,
            body: request.body.clone(),
            message_type: if request.media_url.is_some() {
                MessageType::from_content_type(request.media_content_type.as_deref())
            } else {
                MessageType::Text
            },
            media_url: request.media_url.clone(),
            media_content_type: request.media_content_type.clone(),
            direction: Direction::Outbound,
            status: receipt.status,
            source: Source::Provider,
            session_id: None,
            timestamp: now_timestamp(),
            read_at: None,
        };

        let message = if self.store.append_message(&message).await? {
            message
        } else {
            // Provider ids are unique per tenant; the first row wins.
            self.store
                .find_message_by_external_id(tenant_id, provider.name(), &receipt.external_id)
                .await?
                .unwrap_or(message)
        };
        self.caches.invalidate_conversation(tenant_id, &conversation.id);

        info!(
            tenant_id,
            conversation_id = %conversation.id,
            provider = provider.name(),
            external_id = %receipt.external_id,
            "message sent"
        );
        if resolved.created {
            self.events
                .publish(NotificationEvent::ConversationCreated { conversation });
        }
        self.events.publish(NotificationEvent::MessageSent {
            message: message.clone(),
        });
        Ok(message)
    }
}
