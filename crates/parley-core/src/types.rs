// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Canonical conversation and message types shared by every Parley component.
//!
//! Provider clients normalize their native payloads into these shapes at the
//! boundary; nothing downstream inspects raw provider JSON.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Provider name recorded on widget-originated messages.
pub const WIDGET_PROVIDER: &str = "widget";

/// Sentinel business address used by widget conversations.
pub const WIDGET_BUSINESS_ADDRESS: &str = "widget";

/// Timestamp format used for every persisted timestamp.
///
/// Fixed-width UTC with millisecond precision so lexicographic order in
/// SQLite equals chronological order.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Current time in [`TIMESTAMP_FORMAT`].
pub fn now_timestamp() -> String {
    format_timestamp(chrono::Utc::now())
}

/// Format a UTC instant in [`TIMESTAMP_FORMAT`].
pub fn format_timestamp(at: chrono::DateTime<chrono::Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse an RFC 3339 timestamp and re-render it in [`TIMESTAMP_FORMAT`].
pub fn normalize_timestamp(raw: &str) -> Option<String> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| format_timestamp(dt.with_timezone(&chrono::Utc)))
}

/// Where a conversation or message originated.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Source {
    Provider,
    Widget,
}

/// Lifecycle state of a conversation. Conversations are never deleted.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ConversationStatus {
    Active,
    Closed,
    Archived,
}

/// Agent-facing priority of a conversation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Priority {
    Low,
    Normal,
    High,
    Urgent,
}

/// Kind of content a message carries.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MessageType {
    Text,
    Image,
    Video,
    Audio,
    Document,
}

impl MessageType {
    /// Infer the message type from a media MIME type. No media means text.
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        match content_type {
            None => Self::Text,
            Some(ct) if ct.starts_with("image/") => Self::Image,
            Some(ct) if ct.starts_with("video/") => Self::Video,
            Some(ct) if ct.starts_with("audio/") => Self::Audio,
            Some(_) => Self::Document,
        }
    }
}

/// Message direction relative to the business.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Direction {
    Inbound,
    Outbound,
}

/// Delivery status of a message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MessageStatus {
    Received,
    Queued,
    Sent,
    Delivered,
    Read,
    Failed,
}

impl MessageStatus {
    /// Map a provider-native status string onto the canonical status set.
    pub fn from_provider(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "received" | "receiving" => Self::Received,
            "accepted" | "queued" | "scheduled" | "sending" => Self::Queued,
            "sent" => Self::Sent,
            "delivered" => Self::Delivered,
            "read" => Self::Read,
            "failed" | "undelivered" | "canceled" => Self::Failed,
            _ => Self::Sent,
        }
    }

    /// Whether a status callback may move a message from `self` to `next`.
    ///
    /// Delivery progress only moves forward; `failed` is accepted from any
    /// state that is not already terminal.
    pub fn advances_to(self, next: Self) -> bool {
        match (self, next) {
            (Self::Read | Self::Failed, _) => false,
            (_, Self::Failed) => true,
            _ => next.progress() > self.progress(),
        }
    }

    fn progress(self) -> u8 {
        match self {
            Self::Received | Self::Queued => 0,
            Self::Sent => 1,
            Self::Delivered => 2,
            Self::Read => 3,
            Self::Failed => 4,
        }
    }
}

/// Natural key identifying a conversation within a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConversationKey {
    /// Provider thread between a customer and a business address (canonical form).
    Phone {
        customer_address: String,
        business_address: String,
    },
    /// Website widget thread keyed by session.
    Widget { session_id: String },
}

/// A threaded exchange between one customer and one business address (or widget session).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub tenant_id: i64,
    pub customer_address: String,
    pub business_address: String,
    pub source: Source,
    pub session_id: Option<String>,
    pub status: ConversationStatus,
    pub priority: Priority,
    pub unread_count: i64,
    pub message_count: i64,
    pub last_message_preview: Option<String>,
    pub last_message_at: Option<String>,
    pub last_message_sender: Option<Direction>,
    pub last_event_at: Option<String>,
    pub assigned_agent_id: Option<i64>,
    pub tags: Vec<String>,
    pub notes: Option<String>,
    pub customer_name: Option<String>,
    pub customer_avatar_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Conversation {
    /// A fresh, active conversation for `key` with zeroed counters.
    pub fn new(tenant_id: i64, key: &ConversationKey) -> Self {
        let now = now_timestamp();
        let (customer_address, business_address, source, session_id) = match key {
            ConversationKey::Phone {
                customer_address,
                business_address,
            } => (
                customer_address.clone(),
                business_address.clone(),
                Source::Provider,
                None,
            ),
            ConversationKey::Widget { session_id } => (
                session_id.clone(),
                WIDGET_BUSINESS_ADDRESS.to_string(),
                Source::Widget,
                Some(session_id.clone()),
            ),
        };
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id,
            customer_address,
            business_address,
            source,
            session_id,
            status: ConversationStatus::Active,
            priority: Priority::Normal,
            unread_count: 0,
            message_count: 0,
            last_message_preview: None,
            last_message_at: None,
            last_message_sender: None,
            last_event_at: None,
            assigned_agent_id: None,
            tags: Vec::new(),
            notes: None,
            customer_name: None,
            customer_avatar_url: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub tenant_id: i64,
    pub conversation_id: String,
    pub provider: String,
    /// Provider-native id (or widget client id). Idempotency key within (tenant, provider).
    pub external_id: Option<String>,
    pub from_address: String,
    pub to_address: String,
    pub body: String,
    pub message_type: MessageType,
    pub media_url: Option<String>,
    pub media_content_type: Option<String>,
    pub direction: Direction,
    pub status: MessageStatus,
    pub source: Source,
    pub session_id: Option<String>,
    pub timestamp: String,
    pub read_at: Option<String>,
}

/// One row of the durable webhook dedup ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub tenant_id: i64,
    pub provider: String,
    pub event_id: Option<String>,
    pub event_type: Option<String>,
    pub payload: String,
    pub received_at: String,
}

/// Optional enriched customer profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerProfile {
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

/// A message as reported by a provider (webhook or history listing), already
/// normalized. Addresses are provider-native until the engine canonicalizes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderMessage {
    pub external_id: String,
    pub from: String,
    pub to: String,
    pub body: String,
    pub message_type: MessageType,
    pub media_url: Option<String>,
    pub media_content_type: Option<String>,
    pub direction: Direction,
    pub status: MessageStatus,
    pub timestamp: String,
}

/// Delivery-status callback for a previously sent message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub external_id: String,
    pub status: MessageStatus,
    pub timestamp: String,
}

/// Contact name reported alongside inbound messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactProfile {
    pub address: String,
    pub name: String,
}

/// A decoded webhook delivery.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InboundEvent {
    /// Provider-native event id used for dedup. `None` skips the event-log dedup.
    pub event_id: Option<String>,
    pub event_type: Option<String>,
    pub messages: Vec<ProviderMessage>,
    pub statuses: Vec<StatusUpdate>,
    pub contacts: Vec<ContactProfile>,
}

/// An outbound message in provider-native addressing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundRequest {
    pub to: String,
    pub from: String,
    pub body: String,
    pub media_url: Option<String>,
    pub media_content_type: Option<String>,
}

/// Provider acknowledgement of an accepted send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendReceipt {
    pub external_id: String,
    pub status: MessageStatus,
}

/// A conversation summary as the live provider reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConversation {
    pub peer_address: String,
    pub last_message_at: Option<String>,
    pub last_message_preview: Option<String>,
}

/// Query parameters for conversation listings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationFilter {
    pub status: Option<ConversationStatus>,
    pub search: Option<String>,
    pub limit: u32,
    pub offset: u32,
}

impl Default for ConversationFilter {
    fn default() -> Self {
        Self {
            status: None,
            search: None,
            limit: 50,
            offset: 0,
        }
    }
}

impl ConversationFilter {
    /// Stable string form used as part of cache keys.
    pub fn cache_key(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.status.map(|s| s.to_string()).unwrap_or_default(),
            self.search.as_deref().unwrap_or_default(),
            self.limit,
            self.offset
        )
    }
}

/// Agent-driven changes to a conversation. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConversationPatch {
    pub status: Option<ConversationStatus>,
    pub priority: Option<Priority>,
    /// `Some(None)` unassigns. In JSON: absent leaves it, `null` unassigns.
    #[serde(deserialize_with = "present_or_null")]
    pub assigned_agent_id: Option<Option<i64>>,
    pub tags: Option<Vec<String>>,
    pub notes: Option<String>,
}

fn present_or_null<'de, D>(deserializer: D) -> Result<Option<Option<i64>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<i64>::deserialize(deserializer).map(Some)
}

/// Health status reported by provider connection tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "detail", rename_all = "lowercase")]
pub enum HealthStatus {
    /// Provider is fully operational.
    Healthy,
    /// Provider answered but reported a problem.
    Degraded(String),
    /// Provider is unreachable or rejected the credentials.
    Unhealthy(String),
}
