// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Decoding of Twilio's form-encoded webhook deliveries.
//!
//! Twilio posts two shapes to the same endpoint: inbound messages (carrying
//! `Body` and/or media) and status callbacks (carrying `MessageStatus` only).

use parley_core::ParleyError;
use parley_core::types::{
    ContactProfile, Direction, InboundEvent, MessageStatus, MessageType, ProviderMessage,
    StatusUpdate, now_timestamp,
};
use serde::Deserialize;

use crate::types::strip_channel_prefix;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WebhookForm {
    message_sid: Option<String>,
    sms_sid: Option<String>,
    from: Option<String>,
    to: Option<String>,
    body: Option<String>,
    num_media: Option<String>,
    media_url0: Option<String>,
    media_content_type0: Option<String>,
    message_status: Option<String>,
    sms_status: Option<String>,
    profile_name: Option<String>,
}

/// Decode one webhook body into canonical events.
pub fn decode(body: &[u8]) -> Result<InboundEvent, ParleyError> {
    let form: WebhookForm = serde_urlencoded::from_bytes(body)
        .map_err(|e| ParleyError::Validation(format!("malformed twilio webhook: {e}")))?;

    let sid = form
        .message_sid
        .or(form.sms_sid)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ParleyError::Validation("twilio webhook has no MessageSid".into()))?;

    let num_media = form
        .num_media
        .as_deref()
        .and_then(|n| n.parse::<u32>().ok())
        .unwrap_or(0);
    let has_content = form.body.as_deref().is_some_and(|b| !b.is_empty()) || num_media > 0;

    if has_content {
        let from = form
            .from
            .as_deref()
            .map(strip_channel_prefix)
            .unwrap_or_default()
            .to_string();
        let to = form
            .to
            .as_deref()
            .map(strip_channel_prefix)
            .unwrap_or_default()
            .to_string();
        if from.is_empty() {
            return Err(ParleyError::Validation("twilio webhook has no From".into()));
        }

        let (media_url, media_content_type) = if num_media > 0 {
            (form.media_url0, form.media_content_type0)
        } else {
            (None, None)
        };
        let contacts = form
            .profile_name
            .filter(|n| !n.trim().is_empty())
            .map(|name| ContactProfile {
                address: from.clone(),
                name,
            })
            .into_iter()
            .collect();

        return Ok(InboundEvent {
            event_id: Some(sid.clone()),
            event_type: Some("message".into()),
            messages: vec![ProviderMessage {
                external_id: sid,
                from,
                to,
                body: form.body.unwrap_or_default(),
                message_type: MessageType::from_content_type(media_content_type.as_deref()),
                media_url,
                media_content_type,
                direction: Direction::Inbound,
                status: MessageStatus::Received,
                timestamp: now_timestamp(),
            }],
            statuses: Vec::new(),
            contacts,
        });
    }

    let raw_status = form
        .message_status
        .or(form.sms_status)
        .ok_or_else(|| ParleyError::Validation("unrecognized twilio webhook payload".into()))?;

    Ok(InboundEvent {
        // One delivery per (sid, status) pair; Twilio retries reuse both.
        event_id: Some(format!("{sid}:{raw_status}")),
        event_type: Some("status".into()),
        messages: Vec::new(),
        statuses: vec![StatusUpdate {
            external_id: sid,
            status: MessageStatus::from_provider(&raw_status),
            timestamp: now_timestamp(),
        }],
        contacts: Vec::new(),
    })
}
