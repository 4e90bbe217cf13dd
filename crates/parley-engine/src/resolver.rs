// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation get-or-create.
//!
//! The store's unique indexes arbitrate concurrent creation: the loser of an
//! insert race re-reads and returns the winner's row.

use std::sync::Arc;

use parley_core::types::{
    Conversation, ConversationKey, Direction, Message, ProviderMessage, Source,
};
use parley_core::{MessageStore, ParleyError};
use tracing::{debug, info};

use crate::address::normalize_address;

/// Outcome of [`ConversationResolver::resolve`].
#[derive(Debug, Clone)]
pub struct Resolved {
    pub conversation: Conversation,
    /// True when this call inserted the row.
    pub created: bool,
}

/// Finds or lazily creates conversations by natural key.
#[derive(Clone)]
pub struct ConversationResolver {
    store: Arc<dyn MessageStore>,
}

impl ConversationResolver {
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self { store }
    }

    /// Get or create the conversation for `key`.
    pub async fn resolve(
        &self,
        tenant_id: i64,
        key: &ConversationKey,
    ) -> Result<Resolved, ParleyError> {
        if let Some(conversation) = self.store.find_conversation(tenant_id, key).await? {
            return Ok(Resolved {
                conversation,
                created: false,
            });
        }

        let fresh = Conversation::new(tenant_id, key);
        if self.store.insert_conversation(&fresh).await? {
            info!(
                tenant_id,
                conversation_id = %fresh.id,
                source = %fresh.source,
                "conversation created"
            );
            return Ok(Resolved {
                conversation: fresh,
                created: true,
            });
        }

        debug!(tenant_id, "lost conversation insert race, re-reading");
        let existing = self
            .store
            .find_conversation(tenant_id, key)
            .await?
            .ok_or_else(|| {
                ParleyError::Internal("conversation vanished after insert conflict".into())
            })?;
        Ok(Resolved {
            conversation: existing,
            created: false,
        })
    }

    /// Normalize both phone addresses, then get or create their thread.
    pub async fn resolve_phone(
        &self,
        tenant_id: i64,
        customer_address: &str,
        business_address: &str,
        default_country_code: &str,
    ) -> Result<Resolved, ParleyError> {
        let key = ConversationKey::Phone {
            customer_address: normalize_address(customer_address, default_country_code)?,
            business_address: normalize_address(business_address, default_country_code)?,
        };
        self.resolve(tenant_id, &key).await
    }

    /// Widget thread for `session_id`.
    pub async fn resolve_widget(
        &self,
        tenant_id: i64,
        session_id: &str,
    ) -> Result<Resolved, ParleyError> {
        if session_id.trim().is_empty() {
            return Err(ParleyError::Validation("session_id must not be empty".into()));
        }
        self.resolve(
            tenant_id,
            &ConversationKey::Widget {
                session_id: session_id.to_string(),
            },
        )
        .await
    }
}

/// The local record for a provider-side message in `conversation`.
pub fn message_from_provider(
    conversation: &Conversation,
    provider: &str,
    message: &ProviderMessage,
) -> Message {
    let (from_address, to_address) = match message.direction {
        Direction::Inbound => (
            conversation.customer_address.clone(),
            conversation.business_address.clone(),
        ),
        Direction::Outbound => (
            conversation.business_address.clone(),
            conversation.customer_address.clone(),
        ),
    };
    Message {
        id: uuid::Uuid::new_v4().to_string(),
        tenant_id: conversation.tenant_id,
        conversation_id: conversation.id.clone(),
        provider: provider.to_string(),
        external_id: Some(message.external_id.clone()),
        from_address,
        to_address,
        body: message.body.clone(),
        message_type: message.message_type,
        media_url: message.media_url.clone(),
        media_content_type: message.media_content_type.clone(),
        direction: message.direction,
        status: message.status,
        source: Source::Provider,
        session_id: None,
        timestamp: message.timestamp.clone(),
        read_at: None,
    }
}
