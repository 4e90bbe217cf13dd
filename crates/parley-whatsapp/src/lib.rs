// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WhatsApp Cloud API provider client for the Parley messaging core.
//!
//! The Cloud API is push-only: it has no endpoint for listing past
//! conversations or messages, so this provider does not offer the sync
//! capability and its listing calls return empty results.

pub mod client;
pub mod types;
pub mod webhook;

use async_trait::async_trait;
use parley_core::types::{
    HealthStatus, InboundEvent, MessageStatus, MessageType, OutboundRequest, ProviderMessage,
    RemoteConversation, SendReceipt,
};
use parley_core::{ParleyError, ProviderClient, ProviderConfig};
use reqwest::StatusCode;
use tracing::{debug, info};

use crate::client::CloudClient;
use crate::types::{MediaLink, ReadReceipt, SendRequest, TextBody};

const MESSAGING_PRODUCT: &str = "whatsapp";

/// WhatsApp Cloud implementation of [`ProviderClient`].
pub struct WhatsAppProvider {
    config: ProviderConfig,
    client: CloudClient,
}

impl WhatsAppProvider {
    /// Build a provider; `account_id` is the phone number id and
    /// `auth_token` the system-user access token.
    pub fn new(config: ProviderConfig) -> Result<Self, ParleyError> {
        let client = CloudClient::new(
            config.credentials.account_id.clone(),
            config.credentials.auth_token.clone(),
            config.api_base_url.clone(),
        )?;
        info!(tenant_id = config.tenant_id, "whatsapp provider initialized");
        Ok(Self { config, client })
    }
}

fn build_request<'a>(request: &'a OutboundRequest) -> SendRequest<'a> {
    let mut payload = SendRequest {
        messaging_product: MESSAGING_PRODUCT,
        recipient_type: "individual",
        to: &request.to,
        kind: "text",
        text: None,
        image: None,
        video: None,
        audio: None,
        document: None,
    };

    let Some(link) = request.media_url.as_deref() else {
        payload.text = Some(TextBody {
            preview_url: false,
            body: &request.body,
        });
        return payload;
    };

    let caption = (!request.body.is_empty()).then_some(request.body.as_str());
    let media = MediaLink { link, caption };
    match MessageType::from_content_type(request.media_content_type.as_deref()) {
        MessageType::Image => {
            payload.kind = "image";
            payload.image = Some(media);
        }
        MessageType::Video => {
            payload.kind = "video";
            payload.video = Some(media);
        }
        MessageType::Audio => {
            // Audio messages take no caption.
            payload.kind = "audio";
            payload.audio = Some(MediaLink {
                link,
                caption: None,
            });
        }
        MessageType::Text | MessageType::Document => {
            payload.kind = "document";
            payload.document = Some(media);
        }
    }
    payload
}

#[async_trait]
impl ProviderClient for WhatsAppProvider {
    fn name(&self) -> &str {
        "whatsapp"
    }

    fn get_config(&self) -> &ProviderConfig {
        &self.config
    }

    /// WhatsApp addresses are bare digits.
    fn to_native_address(&self, canonical: &str) -> String {
        canonical.chars().filter(char::is_ascii_digit).collect()
    }

    fn decode_webhook(&self, body: &[u8]) -> Result<InboundEvent, ParleyError> {
        webhook::decode(body)
    }

    async fn send_message(&self, request: &OutboundRequest) -> Result<SendReceipt, ParleyError> {
        let payload = build_request(request);
        let external_id = self.client.post_message(&payload).await?;
        Ok(SendReceipt {
            external_id,
            status: MessageStatus::Sent,
        })
    }

    async fn list_conversations(
        &self,
        _limit: u32,
    ) -> Result<Vec<RemoteConversation>, ParleyError> {
        Ok(Vec::new())
    }

    async fn list_messages(
        &self,
        _peer: &str,
        _limit: u32,
    ) -> Result<Vec<ProviderMessage>, ParleyError> {
        Ok(Vec::new())
    }

    async fn mark_read(&self, external_id: &str) -> Result<(), ParleyError> {
        self.client
            .post_ack(&ReadReceipt {
                messaging_product: MESSAGING_PRODUCT,
                status: "read",
                message_id: external_id,
            })
            .await?;
        debug!(external_id, "whatsapp message marked read");
        Ok(())
    }

    async fn test_connection(&self) -> Result<HealthStatus, ParleyError> {
        let status = match self.client.fetch_phone_number().await {
            Ok(status) => status,
            Err(e) => return Ok(HealthStatus::Unhealthy(e.to_string())),
        };
        Ok(match status {
            s if s.is_success() => HealthStatus::Healthy,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                HealthStatus::Unhealthy("graph API rejected the access token".into())
            }
            s => HealthStatus::Degraded(format!("graph API answered {s}")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::provider_config::{HeaderTemplate, ProviderCredentials, RateLimit};
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base: &str) -> ProviderConfig {
        ProviderConfig {
            tenant_id: 9,
            provider: "whatsapp".into(),
            active: true,
            credentials: ProviderCredentials {
                account_id: "PN1".into(),
                auth_token: "EAAG-token".into(),
                sender_id: None,
            },
            business_address: "+15550000000".into(),
            api_base_url: Some(base.to_string()),
            webhook_token: "tok".into(),
            webhook_secret: "sec".into(),
            auth_header: HeaderTemplate::default(),
            rate_limit: RateLimit::default(),
            default_country_code: "1".into(),
        }
    }

    fn text_request() -> OutboundRequest {
        OutboundRequest {
            to: "15551112222".into(),
            from: "15550000000".into(),
            body: "Your order shipped".into(),
            media_url: None,
            media_content_type: None,
        }
    }

    #[test]
    fn native_address_drops_plus() {
        let provider = WhatsAppProvider::new(config("http://127.0.0.1:9")).unwrap();
        assert_eq!(provider.to_native_address("+447700900000"), "447700900000");
        assert!(provider.syncable().is_none());
    }

    #[test]
    fn media_request_uses_typed_object() {
        let mut request = text_request();
        request.media_url = Some("https://cdn.example/a.png".into());
        request.media_content_type = Some("image/png".into());
        let value = serde_json::to_value(build_request(&request)).unwrap();
        assert_eq!(value["type"], "image");
        assert_eq!(value["image"]["link"], "https://cdn.example/a.png");
        assert_eq!(value["image"]["caption"], "Your order shipped");
        assert!(value.get("text").is_none());
    }

    #[tokio::test]
    async fn send_text_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/PN1/messages"))
            .and(header("authorization", "Bearer EAAG-token"))
            .and(body_json(serde_json::json!({
                "messaging_product": "whatsapp",
                "recipient_type": "individual",
                "to": "15551112222",
                "type": "text",
                "text": {"preview_url": false, "body": "Your order shipped"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "messaging_product": "whatsapp",
                "contacts": [{"input": "15551112222", "wa_id": "15551112222"}],
                "messages": [{"id": "wamid.OUT1"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = WhatsAppProvider::new(config(&server.uri())).unwrap();
        let receipt = provider.send_message(&text_request()).await.unwrap();
        assert_eq!(receipt.external_id, "wamid.OUT1");
        assert_eq!(receipt.status, MessageStatus::Sent);
    }

    #[tokio::test]
    async fn graph_error_is_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": {"message": "Recipient phone number not in allowed list", "code": 131030}
            })))
            .mount(&server)
            .await;

        let provider = WhatsAppProvider::new(config(&server.uri())).unwrap();
        let err = provider.send_message(&text_request()).await.unwrap_err();
        assert!(matches!(err, ParleyError::Provider { .. }));
        assert!(err.to_string().contains("131030"));
    }

    #[tokio::test]
    async fn mark_read_posts_receipt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/PN1/messages"))
            .and(body_json(serde_json::json!({
                "messaging_product": "whatsapp",
                "status": "read",
                "message_id": "wamid.IN1"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"success": true})))
            .expect(1)
            .mount(&server)
            .await;

        let provider = WhatsAppProvider::new(config(&server.uri())).unwrap();
        provider.mark_read("wamid.IN1").await.unwrap();
    }

    #[tokio::test]
    async fn test_connection_reports_health() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/PN1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "PN1", "display_phone_number": "+1 555-000-0000"
            })))
            .mount(&server)
            .await;

        let provider = WhatsAppProvider::new(config(&server.uri())).unwrap();
        assert_eq!(provider.test_connection().await.unwrap(), HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn listing_is_empty() {
        let provider = WhatsAppProvider::new(config("http://127.0.0.1:9")).unwrap();
        assert!(provider.list_conversations(10).await.unwrap().is_empty());
        assert!(provider.list_messages("15551112222", 10).await.unwrap().is_empty());
    }
}
