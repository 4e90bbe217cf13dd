// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Notification events for UI and notification collaborators.

use parley_core::types::{Conversation, Message, MessageStatus};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

/// Default number of events a slow subscriber may fall behind by.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Something observable happened to a tenant's inbox.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationEvent {
    ConversationCreated {
        conversation: Conversation,
    },
    MessageReceived {
        message: Message,
    },
    MessageSent {
        message: Message,
    },
    MessageStatusChanged {
        tenant_id: i64,
        conversation_id: String,
        message_id: String,
        status: MessageStatus,
    },
    ConversationUpdated {
        conversation: Conversation,
    },
}

impl NotificationEvent {
    pub fn tenant_id(&self) -> i64 {
        match self {
            Self::ConversationCreated { conversation }
            | Self::ConversationUpdated { conversation } => conversation.tenant_id,
            Self::MessageReceived { message } | Self::MessageSent { message } => message.tenant_id,
            Self::MessageStatusChanged { tenant_id, .. } => *tenant_id,
        }
    }
}

/// In-process broadcast bus. Publishing never blocks; subscribers that lag
/// past the capacity lose the oldest events.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<NotificationEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NotificationEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: NotificationEvent) {
        let tenant_id = event.tenant_id();
        if self.sender.send(event).is_err() {
            debug!(tenant_id, "notification dropped, no subscribers");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
