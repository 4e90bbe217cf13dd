// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Decoding of WhatsApp Cloud API webhook notifications.

use parley_core::ParleyError;
use parley_core::types::{
    ContactProfile, Direction, InboundEvent, MessageStatus, MessageType, ProviderMessage,
    StatusUpdate, format_timestamp, now_timestamp,
};

use crate::types::{InboundMessage, Media, Notification};

/// Meta's `object` value for WhatsApp notifications.
const OBJECT_KIND: &str = "whatsapp_business_account";

/// Decode one notification body into canonical events.
///
/// A notification may batch several messages, statuses and contacts.
pub fn decode(body: &[u8]) -> Result<InboundEvent, ParleyError> {
    let notification: Notification = serde_json::from_slice(body)
        .map_err(|e| ParleyError::Validation(format!("malformed whatsapp webhook: {e}")))?;
    if !notification.object.is_empty() && notification.object != OBJECT_KIND {
        return Err(ParleyError::Validation(format!(
            "unexpected webhook object `{}`",
            notification.object
        )));
    }

    let mut event = InboundEvent::default();
    let mut ids = Vec::new();

    for entry in notification.entry {
        for change in entry.changes {
            let Some(value) = change.value else { continue };
            let business = value
                .metadata
                .as_ref()
                .map(|m| canonical(&m.display_phone_number))
                .unwrap_or_default();

            for contact in value.contacts {
                if let Some(name) = contact.profile.map(|p| p.name).filter(|n| !n.is_empty()) {
                    event.contacts.push(ContactProfile {
                        address: canonical(&contact.wa_id),
                        name,
                    });
                }
            }

            for message in value.messages {
                ids.push(message.id.clone());
                event.messages.push(to_provider_message(message, &business));
            }

            for status in value.statuses {
                ids.push(format!("{}:{}", status.id, status.status));
                event.statuses.push(StatusUpdate {
                    external_id: status.id,
                    status: MessageStatus::from_provider(&status.status),
                    timestamp: unix_timestamp(&status.timestamp),
                });
            }
        }
    }

    event.event_type = Some(
        if !event.messages.is_empty() {
            "message"
        } else if !event.statuses.is_empty() {
            "status"
        } else {
            "other"
        }
        .to_string(),
    );
    if !ids.is_empty() {
        event.event_id = Some(ids.join(","));
    }
    Ok(event)
}

fn to_provider_message(message: InboundMessage, business: &str) -> ProviderMessage {
    let media = match message.kind.as_str() {
        "image" => message.image,
        "video" => message.video,
        "audio" => message.audio,
        "document" => message.document,
        _ => None,
    };
    let message_type = match message.kind.as_str() {
        "text" => MessageType::Text,
        "image" => MessageType::Image,
        "video" => MessageType::Video,
        "audio" | "voice" => MessageType::Audio,
        _ => MessageType::Document,
    };
    let (body, media_content_type) = match (message.text, media) {
        (Some(text), _) => (text.body, None),
        (None, Some(Media {
            caption, mime_type, ..
        })) => (caption.unwrap_or_default(), mime_type),
        (None, None) => (String::new(), None),
    };

    ProviderMessage {
        external_id: message.id,
        from: canonical(&message.from),
        to: business.to_string(),
        body,
        message_type,
        media_url: None,
        media_content_type,
        direction: Direction::Inbound,
        status: MessageStatus::Received,
        timestamp: unix_timestamp(&message.timestamp),
    }
}

/// WhatsApp ids are bare digits; canonical addresses carry a leading `+`.
pub(crate) fn canonical(wa_id: &str) -> String {
    let digits: String = wa_id.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        String::new()
    } else {
        format!("+{digits}")
    }
}

fn unix_timestamp(raw: &str) -> String {
    raw.parse::<i64>()
        .ok()
        .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
        .map(format_timestamp)
        .unwrap_or_else(now_timestamp)
}
