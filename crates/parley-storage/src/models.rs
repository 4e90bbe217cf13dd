// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row mapping between SQLite and the canonical types in `parley-core`.

use std::str::FromStr;

use rusqlite::Row;
use rusqlite::types::Type;

pub use parley_core::types::{Conversation, Message, WebhookEvent};

/// Column list matching [`conversation_from_row`].
pub(crate) const CONVERSATION_COLUMNS: &str = "id, tenant_id, customer_address, business_address, \
     source, session_id, status, priority, unread_count, message_count, last_message_preview, \
     last_message_at, last_message_sender, last_event_at, assigned_agent_id, tags, notes, \
     customer_name, customer_avatar_url, created_at, updated_at";

/// Column list matching [`message_from_row`].
pub(crate) const MESSAGE_COLUMNS: &str = "id, tenant_id, conversation_id, provider, external_id, \
     from_address, to_address, body, message_type, media_url, media_content_type, direction, \
     status, source, session_id, timestamp, read_at";

/// Longest preview kept on the conversation row, in characters.
const PREVIEW_CHARS: usize = 100;

fn conversion_err(
    idx: usize,
    e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

/// Read a text column and parse it with `FromStr` (strum enums).
fn parse_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion_err(idx, e))
}

fn parse_opt_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| s.parse().map_err(|e| conversion_err(idx, e)))
        .transpose()
}

pub(crate) fn conversation_from_row(row: &Row<'_>) -> rusqlite::Result<Conversation> {
    let tags: String = row.get(15)?;
    Ok(Conversation {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        customer_address: row.get(2)?,
        business_address: row.get(3)?,
        source: parse_col(row, 4)?,
        session_id: row.get(5)?,
        status: parse_col(row, 6)?,
        priority: parse_col(row, 7)?,
        unread_count: row.get(8)?,
        message_count: row.get(9)?,
        last_message_preview: row.get(10)?,
        last_message_at: row.get(11)?,
        last_message_sender: parse_opt_col(row, 12)?,
        last_event_at: row.get(13)?,
        assigned_agent_id: row.get(14)?,
        tags: serde_json::from_str(&tags).map_err(|e| conversion_err(15, e))?,
        notes: row.get(16)?,
        customer_name: row.get(17)?,
        customer_avatar_url: row.get(18)?,
        created_at: row.get(19)?,
        updated_at: row.get(20)?,
    })
}

pub(crate) fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        conversation_id: row.get(2)?,
        provider: row.get(3)?,
        external_id: row.get(4)?,
        from_address: row.get(5)?,
        to_address: row.get(6)?,
        body: row.get(7)?,
        message_type: parse_col(row, 8)?,
        media_url: row.get(9)?,
        media_content_type: row.get(10)?,
        direction: parse_col(row, 11)?,
        status: parse_col(row, 12)?,
        source: parse_col(row, 13)?,
        session_id: row.get(14)?,
        timestamp: row.get(15)?,
        read_at: row.get(16)?,
    })
}

/// Conversation preview text for a message: the body, or a media marker.
pub(crate) fn preview_for(message: &Message) -> String {
    if message.body.trim().is_empty() {
        format!("[{}]", message.message_type)
    } else {
        message.body.chars().take(PREVIEW_CHARS).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::types::{Direction, MessageStatus, MessageType, Source};

    fn message(body: &str, message_type: MessageType) -> Message {
        Message {
            id: "m".into(),
            tenant_id: 1,
            conversation_id: "c".into(),
            provider: "twilio".into(),
            external_id: None,
            from_address: "+1".into(),
            to_address: "+2".into(),
            body: body.into(),
            message_type,
            media_url: None,
            media_content_type: None,
            direction: Direction::Inbound,
            status: MessageStatus::Received,
            source: Source::Provider,
            session_id: None,
            timestamp: "2026-01-01T00:00:00.000Z".into(),
            read_at: None,
        }
    }

    #[test]
    fn preview_truncates_by_chars() {
        let long = "é".repeat(150);
        let preview = preview_for(&message(&long, MessageType::Text));
        assert_eq!(preview.chars().count(), 100);
    }

    #[test]
    fn preview_marks_media_without_body() {
        assert_eq!(preview_for(&message("", MessageType::Image)), "[image]");
    }
}
