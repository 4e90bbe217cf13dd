// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable message/conversation store contract (the system of record).

use async_trait::async_trait;

use crate::error::ParleyError;
use crate::types::{
    Conversation, ConversationFilter, ConversationKey, ConversationPatch, CustomerProfile,
    Direction, Message, MessageStatus, WebhookEvent,
};

/// Durable mirror of every conversation and message.
///
/// Uniqueness constraints live here and are the arbiter for idempotency and
/// get-or-create races: inserts report a conflict with `Ok(false)` rather
/// than an error. Caches are never consulted for those decisions.
#[async_trait]
pub trait MessageStore: Send + Sync + 'static {
    // --- Conversations ---

    /// Look up a conversation by its natural key.
    async fn find_conversation(
        &self,
        tenant_id: i64,
        key: &ConversationKey,
    ) -> Result<Option<Conversation>, ParleyError>;

    /// Look up a conversation by id, scoped to the tenant.
    async fn get_conversation(
        &self,
        tenant_id: i64,
        id: &str,
    ) -> Result<Option<Conversation>, ParleyError>;

    /// Insert a new conversation. Returns `false` if its natural key already exists.
    async fn insert_conversation(&self, conversation: &Conversation) -> Result<bool, ParleyError>;

    /// List conversations, most recently active first.
    async fn list_conversations(
        &self,
        tenant_id: i64,
        filter: &ConversationFilter,
    ) -> Result<Vec<Conversation>, ParleyError>;

    /// Apply agent-driven changes. Returns the updated row, or `None` if absent.
    async fn update_conversation(
        &self,
        tenant_id: i64,
        id: &str,
        patch: &ConversationPatch,
    ) -> Result<Option<Conversation>, ParleyError>;

    /// Record the time of the latest provider event for the conversation.
    async fn touch_last_event(&self, tenant_id: i64, id: &str, at: &str)
    -> Result<(), ParleyError>;

    /// Store enriched customer profile fields. `None` fields are left untouched.
    async fn update_profile(
        &self,
        tenant_id: i64,
        id: &str,
        profile: &CustomerProfile,
    ) -> Result<(), ParleyError>;

    /// Move a widget conversation to a new session id.
    async fn rebind_session(
        &self,
        tenant_id: i64,
        id: &str,
        session_id: &str,
    ) -> Result<bool, ParleyError>;

    /// Zero the unread counter and stamp `read_at` on unread inbound messages.
    async fn mark_conversation_read(
        &self,
        tenant_id: i64,
        id: &str,
        at: &str,
    ) -> Result<(), ParleyError>;

    // --- Messages ---

    /// Insert a message and update its conversation's counters and preview in
    /// one transaction. Returns `false` (and changes nothing) when the
    /// message's `external_id` already exists for the tenant and provider.
    async fn append_message(&self, message: &Message) -> Result<bool, ParleyError>;

    /// Look up a message by its idempotency key.
    async fn find_message_by_external_id(
        &self,
        tenant_id: i64,
        provider: &str,
        external_id: &str,
    ) -> Result<Option<Message>, ParleyError>;

    /// The latest `limit` messages (all when `None`), ordered by timestamp ascending.
    async fn list_messages(
        &self,
        tenant_id: i64,
        conversation_id: &str,
        limit: Option<u32>,
    ) -> Result<Vec<Message>, ParleyError>;

    /// Messages strictly newer than `since`, ordered by timestamp ascending.
    async fn list_messages_since(
        &self,
        tenant_id: i64,
        conversation_id: &str,
        since: Option<&str>,
    ) -> Result<Vec<Message>, ParleyError>;

    /// Most recent message with identical body and direction at or after `since`.
    async fn find_recent_duplicate(
        &self,
        tenant_id: i64,
        conversation_id: &str,
        direction: Direction,
        body: &str,
        since: &str,
    ) -> Result<Option<Message>, ParleyError>;

    /// Newest inbound message id known to the provider, if any.
    async fn latest_inbound_external_id(
        &self,
        tenant_id: i64,
        conversation_id: &str,
    ) -> Result<Option<String>, ParleyError>;

    /// Apply a delivery-status callback. Returns the message when its status
    /// changed; unknown ids and backwards transitions return `None`.
    async fn update_message_status(
        &self,
        tenant_id: i64,
        provider: &str,
        external_id: &str,
        status: MessageStatus,
    ) -> Result<Option<Message>, ParleyError>;

    // --- Webhook event log ---

    /// Insert-if-absent on (tenant, event id). Returns `false` for a duplicate.
    /// Events without an id are always recorded.
    async fn record_webhook_event(&self, event: &WebhookEvent) -> Result<bool, ParleyError>;

    // --- Blacklist ---

    async fn is_blacklisted(&self, tenant_id: i64, address: &str) -> Result<bool, ParleyError>;

    async fn add_to_blacklist(
        &self,
        tenant_id: i64,
        address: &str,
        reason: Option<&str>,
    ) -> Result<(), ParleyError>;

    /// Returns `false` if the address was not listed.
    async fn remove_from_blacklist(
        &self,
        tenant_id: i64,
        address: &str,
    ) -> Result<bool, ParleyError>;
}
