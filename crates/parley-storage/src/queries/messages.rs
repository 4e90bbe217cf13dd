// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message queries.

use parley_core::ParleyError;
use parley_core::types::{Direction, MessageStatus};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err};
use crate::models::{MESSAGE_COLUMNS, Message, message_from_row, preview_for};

/// Insert a message and bump its conversation's counters in one transaction.
///
/// Returns `false` without touching the conversation when the message's
/// `(tenant, provider, external_id)` already exists. The preview, timestamp
/// and sender only move forward, so backfilled older messages don't replace
/// the latest preview.
pub async fn append(db: &Database, msg: &Message, updated_at: &str) -> Result<bool, ParleyError> {
    let msg = msg.clone();
    let preview = preview_for(&msg);
    let updated_at = updated_at.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let inserted = tx.execute(
                "INSERT INTO messages (id, tenant_id, conversation_id, provider, external_id,
                     from_address, to_address, body, message_type, media_url, media_content_type,
                     direction, status, source, session_id, timestamp, read_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
                 ON CONFLICT DO NOTHING",
                params![
                    msg.id,
                    msg.tenant_id,
                    msg.conversation_id,
                    msg.provider,
                    msg.external_id,
                    msg.from_address,
                    msg.to_address,
                    msg.body,
                    msg.message_type.to_string(),
                    msg.media_url,
                    msg.media_content_type,
                    msg.direction.to_string(),
                    msg.status.to_string(),
                    msg.source.to_string(),
                    msg.session_id,
                    msg.timestamp,
                    msg.read_at,
                ],
            )?;
            if inserted == 0 {
                return Ok(false);
            }

            let unread = i64::from(msg.direction == Direction::Inbound && msg.read_at.is_none());
            tx.execute(
                "UPDATE conversations SET
                     message_count = message_count + 1,
                     unread_count = unread_count + ?3,
                     last_message_preview = CASE WHEN last_message_at IS NULL OR ?4 >= last_message_at
                         THEN ?5 ELSE last_message_preview END,
                     last_message_sender = CASE WHEN last_message_at IS NULL OR ?4 >= last_message_at
                         THEN ?6 ELSE last_message_sender END,
                     last_message_at = CASE WHEN last_message_at IS NULL OR ?4 >= last_message_at
                         THEN ?4 ELSE last_message_at END,
                     updated_at = ?7
                 WHERE tenant_id = ?1 AND id = ?2",
                params![
                    msg.tenant_id,
                    msg.conversation_id,
                    unread,
                    msg.timestamp,
                    preview,
                    msg.direction.to_string(),
                    updated_at,
                ],
            )?;
            tx.commit()?;
            Ok(true)
        })
        .await
        .map_err(map_tr_err)
}

/// Look up a message by its idempotency key.
pub async fn find_by_external_id(
    db: &Database,
    tenant_id: i64,
    provider: &str,
    external_id: &str,
) -> Result<Option<Message>, ParleyError> {
    let (provider, external_id) = (provider.to_string(), external_id.to_string());
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {MESSAGE_COLUMNS} FROM messages
                     WHERE tenant_id = ?1 AND provider = ?2 AND external_id = ?3"
                ),
                params![tenant_id, provider, external_id],
                message_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// The latest `limit` messages of a conversation (all when `None`), oldest first.
pub async fn list_for_conversation(
    db: &Database,
    tenant_id: i64,
    conversation_id: &str,
    limit: Option<u32>,
) -> Result<Vec<Message>, ParleyError> {
    let conversation_id = conversation_id.to_string();
    // SQLite treats a negative LIMIT as unbounded.
    let limit = limit.map_or(-1, i64::from);
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM (
                     SELECT {MESSAGE_COLUMNS}, rowid AS seq FROM messages
                     WHERE tenant_id = ?1 AND conversation_id = ?2
                     ORDER BY timestamp DESC, seq DESC LIMIT ?3
                 ) ORDER BY timestamp ASC, seq ASC"
            ))?;
            let rows = stmt.query_map(params![tenant_id, conversation_id, limit], message_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Messages strictly newer than `since`, oldest first.
pub async fn list_since(
    db: &Database,
    tenant_id: i64,
    conversation_id: &str,
    since: Option<&str>,
) -> Result<Vec<Message>, ParleyError> {
    let conversation_id = conversation_id.to_string();
    let since = since.unwrap_or_default().to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE tenant_id = ?1 AND conversation_id = ?2 AND timestamp > ?3
                 ORDER BY timestamp ASC, rowid ASC"
            ))?;
            let rows = stmt.query_map(params![tenant_id, conversation_id, since], message_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Most recent message with the same body and direction at or after `since`.
pub async fn find_recent_duplicate(
    db: &Database,
    tenant_id: i64,
    conversation_id: &str,
    direction: Direction,
    body: &str,
    since: &str,
) -> Result<Option<Message>, ParleyError> {
    let (conversation_id, body, since) =
        (conversation_id.to_string(), body.to_string(), since.to_string());
    let direction = direction.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {MESSAGE_COLUMNS} FROM messages
                     WHERE tenant_id = ?1 AND conversation_id = ?2 AND direction = ?3
                       AND body = ?4 AND timestamp >= ?5
                     ORDER BY timestamp DESC LIMIT 1"
                ),
                params![tenant_id, conversation_id, direction, body, since],
                message_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// External id of the newest inbound message, if the provider assigned one.
pub async fn latest_inbound_external_id(
    db: &Database,
    tenant_id: i64,
    conversation_id: &str,
) -> Result<Option<String>, ParleyError> {
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT external_id FROM messages
                 WHERE tenant_id = ?1 AND conversation_id = ?2
                   AND direction = 'inbound' AND external_id IS NOT NULL
                 ORDER BY timestamp DESC, rowid DESC LIMIT 1",
                params![tenant_id, conversation_id],
                |row| row.get(0),
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Apply a status callback if it moves the message forward.
pub async fn update_status(
    db: &Database,
    tenant_id: i64,
    provider: &str,
    external_id: &str,
    status: MessageStatus,
) -> Result<Option<Message>, ParleyError> {
    let (provider, external_id) = (provider.to_string(), external_id.to_string());
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let current = tx
                .query_row(
                    &format!(
                        "SELECT {MESSAGE_COLUMNS} FROM messages
                         WHERE tenant_id = ?1 AND provider = ?2 AND external_id = ?3"
                    ),
                    params![tenant_id, provider, external_id],
                    message_from_row,
                )
                .optional()?;
            let Some(mut message) = current else {
                return Ok(None);
            };
            if !message.status.advances_to(status) {
                return Ok(None);
            }
            tx.execute(
                "UPDATE messages SET status = ?2 WHERE id = ?1",
                params![message.id, status.to_string()],
            )?;
            tx.commit()?;
            message.status = status;
            Ok(Some(message))
        })
        .await
        .map_err(map_tr_err)
}
