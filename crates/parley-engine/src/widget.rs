// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Web chat widget bridge.
//!
//! Widget threads are keyed by browser session. Posts are idempotent on the
//! client message id when one is supplied, and on `(direction, body)` within
//! a short window when not.

use std::sync::Arc;
use std::time::Duration;

use parley_core::types::{
    Conversation, ConversationKey, Direction, Message, MessageStatus, MessageType, Source,
    WIDGET_PROVIDER, format_timestamp, normalize_timestamp, now_timestamp,
};
use parley_core::{MessageStore, ParleyError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cache::InboxCaches;
use crate::events::{EventBus, NotificationEvent};
use crate::resolver::ConversationResolver;

/// A customer message from the widget.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WidgetPost {
    pub session_id: String,
    pub body: String,
    #[serde(default)]
    pub client_message_id: Option<String>,
}

/// An agent reply into a widget thread.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WidgetReply {
    pub session_id: String,
    pub body: String,
    #[serde(default)]
    pub client_message_id: Option<String>,
    /// Move the thread to this session before replying.
    #[serde(default)]
    pub rebind_session_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WidgetOutcome {
    pub message: Message,
    /// True when an earlier identical post was returned instead.
    pub duplicate: bool,
}

#[derive(Clone)]
pub struct WidgetBridge {
    store: Arc<dyn MessageStore>,
    resolver: ConversationResolver,
    caches: InboxCaches,
    events: EventBus,
    duplicate_window: Duration,
}

impl WidgetBridge {
    pub fn new(
        store: Arc<dyn MessageStore>,
        caches: InboxCaches,
        events: EventBus,
        duplicate_window: Duration,
    ) -> Self {
        Self {
            resolver: ConversationResolver::new(Arc::clone(&store)),
            store,
            caches,
            events,
            duplicate_window,
        }
    }

    /// Customer to business. Creates the session thread on first use.
    pub async fn post_customer_message(
        &self,
        tenant_id: i64,
        post: &WidgetPost,
    ) -> Result<WidgetOutcome, ParleyError> {
        require_body(&post.body)?;
        let resolved = self.resolver.resolve_widget(tenant_id, &post.session_id).await?;
        if resolved.created {
            self.events.publish(NotificationEvent::ConversationCreated {
                conversation: resolved.conversation.clone(),
            });
        }
        self.post(
            &resolved.conversation,
            Direction::Inbound,
            &post.body,
            post.client_message_id.as_deref(),
        )
        .await
    }

    /// Business to customer. The session thread must already exist, under
    /// either `session_id` or `rebind_session_id`.
    pub async fn post_business_response(
        &self,
        tenant_id: i64,
        reply: &WidgetReply,
    ) -> Result<WidgetOutcome, ParleyError> {
        require_body(&reply.body)?;
        let mut conversation = match self.find_session(tenant_id, &reply.session_id).await? {
            Some(conversation) => conversation,
            None => match reply.rebind_session_id.as_deref() {
                Some(new_session) => self
                    .find_session(tenant_id, new_session)
                    .await?
                    .ok_or_else(|| session_not_found(&reply.session_id))?,
                None => return Err(session_not_found(&reply.session_id)),
            },
        };

        if let Some(new_session) = reply.rebind_session_id.as_deref() {
            if conversation.session_id.as_deref() != Some(new_session) {
                conversation = self.rebind(&conversation, new_session).await?;
            }
        }

        self.post(
            &conversation,
            Direction::Outbound,
            &reply.body,
            reply.client_message_id.as_deref(),
        )
        .await
    }

    /// Messages of a session newer than `since` (RFC 3339), ascending. An
    /// unknown session has no messages yet.
    pub async fn poll(
        &self,
        tenant_id: i64,
        session_id: &str,
        since: Option<&str>,
    ) -> Result<Vec<Message>, ParleyError> {
        let since = since
            .map(|raw| {
                normalize_timestamp(raw).ok_or_else(|| {
                    ParleyError::Validation(format!("`{raw}` is not an RFC 3339 timestamp"))
                })
            })
            .transpose()?;
        let Some(conversation) = self.find_session(tenant_id, session_id).await? else {
            return Ok(Vec::new());
        };
        self.store
            .list_messages_since(tenant_id, &conversation.id, since.as_deref())
            .await
    }

    async fn find_session(
        &self,
        tenant_id: i64,
        session_id: &str,
    ) -> Result<Option<Conversation>, ParleyError> {
        let key = ConversationKey::Widget {
            session_id: session_id.to_string(),
        };
        self.store.find_conversation(tenant_id, &key).await
    }

    async fn rebind(
        &self,
        conversation: &Conversation,
        new_session: &str,
    ) -> Result<Conversation, ParleyError> {
        let tenant_id = conversation.tenant_id;
        if new_session.trim().is_empty() {
            return Err(ParleyError::Validation(
                "rebind_session_id must not be empty".into(),
            ));
        }
        if !self
            .store
            .rebind_session(tenant_id, &conversation.id, new_session)
            .await?
        {
            return Err(ParleyError::Validation(format!(
                "session `{new_session}` already belongs to another conversation"
            )));
        }
        info!(tenant_id, conversation_id = %conversation.id, "widget conversation rebound to new session");
        self.caches.invalidate_conversation(tenant_id, &conversation.id);
        let rebound = self
            .store
            .get_conversation(tenant_id, &conversation.id)
            .await?
            .ok_or_else(|| session_not_found(new_session))?;
        self.events.publish(NotificationEvent::ConversationUpdated {
            conversation: rebound.clone(),
        });
        Ok(rebound)
    }

    async fn post(
        &self,
        conversation: &Conversation,
        direction: Direction,
        body: &str,
        client_message_id: Option<&str>,
    ) -> Result<WidgetOutcome, ParleyError> {
        let tenant_id = conversation.tenant_id;

        if let Some(existing) = self
            .find_duplicate(conversation, direction, body, client_message_id)
            .await?
        {
            debug!(tenant_id, conversation_id = %conversation.id, message_id = %existing.id, "duplicate widget post");
            return Ok(WidgetOutcome {
                message: existing,
                duplicate: true,
            });
        }

        let message = widget_message(conversation, direction, body, client_message_id);
        if !self.store.append_message(&message).await? {
            // Lost an insert race on the client id.
            let existing = match client_message_id {
                Some(id) => self.find_by_client_id(conversation, direction, id).await?,
                None => None,
            };
            return existing
                .map(|message| WidgetOutcome {
                    message,
                    duplicate: true,
                })
                .ok_or_else(|| {
                    ParleyError::Internal("widget message vanished after insert conflict".into())
                });
        }

        self.caches.invalidate_conversation(tenant_id, &conversation.id);
        let event = match direction {
            Direction::Inbound => NotificationEvent::MessageReceived {
                message: message.clone(),
            },
            Direction::Outbound => NotificationEvent::MessageSent {
                message: message.clone(),
            },
        };
        self.events.publish(event);
        Ok(WidgetOutcome {
            message,
            duplicate: false,
        })
    }

    async fn find_duplicate(
        &self,
        conversation: &Conversation,
        direction: Direction,
        body: &str,
        client_message_id: Option<&str>,
    ) -> Result<Option<Message>, ParleyError> {
        match client_message_id {
            Some(id) => self.find_by_client_id(conversation, direction, id).await,
            None => {
                let window = chrono::Duration::from_std(self.duplicate_window)
                    .map_err(|e| ParleyError::Internal(e.to_string()))?;
                let since = format_timestamp(chrono::Utc::now() - window);
                self.store
                    .find_recent_duplicate(
                        conversation.tenant_id,
                        &conversation.id,
                        direction,
                        body,
                        &since,
                    )
                    .await
            }
        }
    }

    /// Client ids are scoped to one thread and direction, so the same id in
    /// another session or from the other side is a different message.
    async fn find_by_client_id(
        &self,
        conversation: &Conversation,
        direction: Direction,
        client_message_id: &str,
    ) -> Result<Option<Message>, ParleyError> {
        let key = client_key(&conversation.id, direction, client_message_id);
        self.store
            .find_message_by_external_id(conversation.tenant_id, WIDGET_PROVIDER, &key)
            .await
    }
}

fn require_body(body: &str) -> Result<(), ParleyError> {
    if body.trim().is_empty() {
        return Err(ParleyError::Validation("body must not be empty".into()));
    }
    Ok(())
}

fn session_not_found(session_id: &str) -> ParleyError {
    ParleyError::NotFound(format!("widget session `{session_id}`"))
}

/// The stored `external_id` of a widget message posted with a client id.
fn client_key(conversation_id: &str, direction: Direction, client_message_id: &str) -> String {
    format!("{conversation_id}:{direction}:{client_message_id}")
}

fn widget_message(
    conversation: &Conversation,
    direction: Direction,
    body: &str,
    client_message_id: Option<&str>,
) -> Message {
    let (from_address, to_address, status) = match direction {
        Direction::Inbound => (
            conversation.customer_address.clone(),
            conversation.business_address.clone(),
            MessageStatus::Received,
        ),
        Direction::Outbound => (
            conversation.business_address.clone(),
            conversation.customer_address.clone(),
            MessageStatus::Sent,
        ),
    };
    Message {
        id: uuid::Uuid::new_v4().to_string(),
        tenant_id: conversation.tenant_id,
        conversation_id: conversation.id.clone(),
        provider: WIDGET_PROVIDER.to_string(),
        external_id: client_message_id.map(|id| client_key(&conversation.id, direction, id)),
        from_address,
        to_address,
        body: body.to_string(),
        message_type: MessageType::Text,
        media_url: None,
        media_content_type: None,
        direction,
        status,
        source: Source::Widget,
        session_id: conversation.session_id.clone(),
        timestamp: now_timestamp(),
        read_at: None,
    }
}
