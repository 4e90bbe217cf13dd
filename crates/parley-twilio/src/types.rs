// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Twilio REST API request and response types.

use parley_core::types::{
    Direction, MessageStatus, MessageType, ProviderMessage, format_timestamp, now_timestamp,
};
use serde::{Deserialize, Serialize};

/// Prefix Twilio puts on WhatsApp-channel addresses.
pub(crate) const WHATSAPP_PREFIX: &str = "whatsapp:";

/// Form body for `POST /Accounts/{sid}/Messages.json`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SendForm<'a> {
    pub to: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messaging_service_sid: Option<&'a str>,
    pub body: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_url: Option<&'a str>,
}

/// A message resource.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiMessage {
    pub sid: String,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    /// `inbound`, `outbound-api`, `outbound-call` or `outbound-reply`.
    #[serde(default)]
    pub direction: Option<String>,
    /// RFC 2822, e.g. `Thu, 30 Jul 2015 20:12:31 +0000`.
    #[serde(default)]
    pub date_sent: Option<String>,
    #[serde(default)]
    pub date_created: Option<String>,
    #[serde(default)]
    pub num_media: Option<String>,
}

impl ApiMessage {
    pub fn direction(&self) -> Direction {
        match self.direction.as_deref() {
            Some("inbound") => Direction::Inbound,
            _ => Direction::Outbound,
        }
    }

    /// The non-business side of the message.
    pub fn peer(&self) -> Option<&str> {
        match self.direction() {
            Direction::Inbound => self.from.as_deref(),
            Direction::Outbound => self.to.as_deref(),
        }
        .map(strip_channel_prefix)
    }

    pub fn timestamp(&self) -> String {
        self.date_sent
            .as_deref()
            .or(self.date_created.as_deref())
            .and_then(parse_twilio_date)
            .unwrap_or_else(now_timestamp)
    }

    pub fn into_provider_message(self) -> ProviderMessage {
        let direction = self.direction();
        let timestamp = self.timestamp();
        let has_media = self
            .num_media
            .as_deref()
            .and_then(|n| n.parse::<u32>().ok())
            .is_some_and(|n| n > 0);
        ProviderMessage {
            external_id: self.sid,
            from: self.from.as_deref().map(strip_channel_prefix).unwrap_or_default().to_string(),
            to: self.to.as_deref().map(strip_channel_prefix).unwrap_or_default().to_string(),
            body: self.body.unwrap_or_default(),
            // Media URLs live on a sub-resource; listings only say whether media exists.
            message_type: if has_media {
                MessageType::Document
            } else {
                MessageType::Text
            },
            media_url: None,
            media_content_type: None,
            direction,
            status: self
                .status
                .as_deref()
                .map(MessageStatus::from_provider)
                .unwrap_or(MessageStatus::Sent),
            timestamp,
        }
    }
}

/// A page of message resources.
#[derive(Debug, Deserialize)]
pub struct MessagePage {
    #[serde(default)]
    pub messages: Vec<ApiMessage>,
    #[serde(default)]
    pub next_page_uri: Option<String>,
}

/// Twilio error body.
#[derive(Debug, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub code: Option<i64>,
    pub message: String,
}

/// Lookup v2 response with the `caller_name` package.
#[derive(Debug, Deserialize)]
pub struct LookupResponse {
    #[serde(default)]
    pub caller_name: Option<CallerName>,
}

#[derive(Debug, Deserialize)]
pub struct CallerName {
    #[serde(default)]
    pub caller_name: Option<String>,
}

pub(crate) fn strip_channel_prefix(address: &str) -> &str {
    address.strip_prefix(WHATSAPP_PREFIX).unwrap_or(address)
}

/// Parse Twilio's RFC 2822 dates into the canonical timestamp format.
pub(crate) fn parse_twilio_date(raw: &str) -> Option<String> {
    chrono::DateTime::parse_from_rfc2822(raw)
        .ok()
        .map(|dt| format_timestamp(dt.with_timezone(&chrono::Utc)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_form_uses_twilio_field_names() {
        let form = SendForm {
            to: "+15551234567",
            from: Some("+15550000000"),
            messaging_service_sid: None,
            body: "hi there",
            media_url: None,
        };
        let encoded = serde_urlencoded::to_string(&form).unwrap();
        assert_eq!(encoded, "To=%2B15551234567&From=%2B15550000000&Body=hi+there");
    }

    #[test]
    fn rfc2822_dates_are_normalized() {
        assert_eq!(
            parse_twilio_date("Thu, 30 Jul 2015 20:12:31 +0000").as_deref(),
            Some("2015-07-30T20:12:31.000Z")
        );
        assert!(parse_twilio_date("not a date").is_none());
    }

    #[test]
    fn peer_depends_on_direction() {
        let msg: ApiMessage = serde_json::from_value(serde_json::json!({
            "sid": "SM1",
            "from": "whatsapp:+15551112222",
            "to": "+15550000000",
            "direction": "inbound"
        }))
        .unwrap();
        assert_eq!(msg.peer(), Some("+15551112222"));

        let out: ApiMessage = serde_json::from_value(serde_json::json!({
            "sid": "SM2",
            "from": "+15550000000",
            "to": "+15553334444",
            "direction": "outbound-api"
        }))
        .unwrap();
        assert_eq!(out.peer(), Some("+15553334444"));
        assert_eq!(out.direction(), Direction::Outbound);
    }
}
