// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider client contract for third-party messaging backends (SMS, WhatsApp, ...).

use async_trait::async_trait;

use crate::error::ParleyError;
use crate::provider_config::ProviderConfig;
use crate::types::{
    CustomerProfile, HealthStatus, InboundEvent, OutboundRequest, ProviderMessage,
    RemoteConversation, SendReceipt,
};

/// Uniform surface every provider backend implements.
///
/// Implementations talk to exactly one third-party API and normalize its
/// payloads into the canonical types. Callers never inspect which concrete
/// client they hold; optional extras are exposed through capability probes
/// such as [`ProviderClient::syncable`].
#[async_trait]
pub trait ProviderClient: Send + Sync + 'static {
    /// Normalized provider name (e.g. `twilio`).
    fn name(&self) -> &str;

    /// The tenant configuration this client was built from.
    fn get_config(&self) -> &ProviderConfig;

    /// Translate a canonical `+<digits>` address into the provider's native form.
    fn to_native_address(&self, canonical: &str) -> String;

    /// Decode a raw webhook body into canonical events.
    ///
    /// This is the only place provider-specific payload shapes are inspected.
    fn decode_webhook(&self, body: &[u8]) -> Result<InboundEvent, ParleyError>;

    /// Send one message.
    async fn send_message(&self, request: &OutboundRequest) -> Result<SendReceipt, ParleyError>;

    /// Send several messages. Results are positionally aligned with `requests`.
    async fn send_bulk(
        &self,
        requests: &[OutboundRequest],
    ) -> Vec<Result<SendReceipt, ParleyError>> {
        let sends = requests.iter().map(|r| self.send_message(r));
        futures::future::join_all(sends).await
    }

    /// Conversations as the live provider sees them (most recent first).
    async fn list_conversations(
        &self,
        limit: u32,
    ) -> Result<Vec<RemoteConversation>, ParleyError>;

    /// Recent messages exchanged with `peer` (provider-native address).
    async fn list_messages(
        &self,
        peer: &str,
        limit: u32,
    ) -> Result<Vec<ProviderMessage>, ParleyError>;

    /// Tell the provider a message was read by the business.
    async fn mark_read(&self, external_id: &str) -> Result<(), ParleyError>;

    /// Verify credentials and reachability.
    async fn test_connection(&self) -> Result<HealthStatus, ParleyError>;

    /// Probe for the optional sync capability.
    fn syncable(&self) -> Option<&dyn SyncableProvider> {
        None
    }
}

/// Optional capability for providers that can backfill and enrich local state.
#[async_trait]
pub trait SyncableProvider: Send + Sync {
    /// Messages exchanged since `since` (canonical timestamp), any peer.
    async fn refresh_since(&self, since: &str) -> Result<Vec<ProviderMessage>, ParleyError>;

    /// Look up a customer's display profile.
    async fn enrich_profile(&self, peer: &str) -> Result<Option<CustomerProfile>, ParleyError>;

    /// Full history with `peer`, for rebuilding a conversation from scratch.
    async fn rebuild_history(&self, peer: &str) -> Result<Vec<ProviderMessage>, ParleyError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider_config::{HeaderTemplate, ProviderCredentials, RateLimit};
    use crate::types::MessageStatus;

    struct EchoProvider {
        config: ProviderConfig,
    }

    #[async_trait]
    impl ProviderClient for EchoProvider {
        fn name(&self) -> &str {
            "echo"
        }

        fn get_config(&self) -> &ProviderConfig {
            &self.config
        }

        fn to_native_address(&self, canonical: &str) -> String {
            canonical.to_string()
        }

        fn decode_webhook(&self, _body: &[u8]) -> Result<InboundEvent, ParleyError> {
            Ok(InboundEvent::default())
        }

        async fn send_message(
            &self,
            request: &OutboundRequest,
        ) -> Result<SendReceipt, ParleyError> {
            if request.body.is_empty() {
                return Err(ParleyError::provider("empty body"));
            }
            Ok(SendReceipt {
                external_id: format!("ext-{}", request.to),
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

        async fn mark_read(&self, _external_id: &str) -> Result<(), ParleyError> {
            Ok(())
        }

        async fn test_connection(&self) -> Result<HealthStatus, ParleyError> {
            Ok(HealthStatus::Healthy)
        }
    }

    fn request(to: &str, body: &str) -> OutboundRequest {
        OutboundRequest {
            to: to.into(),
            from: "+15550000000".into(),
            body: body.into(),
            media_url: None,
            media_content_type: None,
        }
    }

    #[tokio::test]
    async fn default_send_bulk_keeps_positions() {
        let provider = EchoProvider {
            config: ProviderConfig {
                tenant_id: 1,
                provider: "echo".into(),
                active: true,
                credentials: ProviderCredentials::default(),
                business_address: "+15550000000".into(),
                api_base_url: None,
                webhook_token: "t".into(),
                webhook_secret: "s".into(),
                auth_header: HeaderTemplate::default(),
                rate_limit: RateLimit::default(),
                default_country_code: "1".into(),
            },
        };
        let results = provider
            .send_bulk(&[request("+1", "hi"), request("+2", ""), request("+3", "yo")])
            .await;
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().external_id, "ext-+1");
        assert!(results[1].is_err());
        assert_eq!(results[2].as_ref().unwrap().external_id, "ext-+3");
        assert!(provider.syncable().is_none());
    }
}
