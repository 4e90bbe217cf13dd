// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scriptable provider client for deterministic tests.
//!
//! `MockProvider` implements `ProviderClient` (and, when enabled,
//! `SyncableProvider`) without any network access. Clones share state, so a
//! test can keep one handle while the factory builds fresh clients per call
//! and still observe every send.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use parley_core::provider_config::{
    HeaderTemplate, ProviderConfig, ProviderCredentials, RateLimit,
};
use parley_core::types::{
    CustomerProfile, Direction, HealthStatus, InboundEvent, MessageStatus, MessageType,
    OutboundRequest, ProviderMessage, RemoteConversation, SendReceipt, now_timestamp,
};
use parley_core::{ParleyError, ProviderClient, SyncableProvider};

/// Registered provider name of the mock.
pub const MOCK_PROVIDER: &str = "mock";

/// Business address every [`mock_config`] uses.
pub const MOCK_BUSINESS_ADDRESS: &str = "+15550000000";

/// A provider configuration for `tenant_id` that authenticates webhooks with
/// `Authorization: Bearer secret-<tenant>` on path token `token-<tenant>`.
pub fn mock_config(tenant_id: i64, provider: &str) -> ProviderConfig {
    ProviderConfig {
        tenant_id,
        provider: provider.to_string(),
        active: true,
        credentials: ProviderCredentials {
            account_id: format!("acct-{tenant_id}"),
            auth_token: "mock-token".into(),
            sender_id: None,
        },
        business_address: MOCK_BUSINESS_ADDRESS.into(),
        api_base_url: None,
        webhook_token: format!("token-{tenant_id}"),
        webhook_secret: format!("secret-{tenant_id}"),
        auth_header: HeaderTemplate::default(),
        rate_limit: RateLimit::default(),
        default_country_code: "1".into(),
    }
}

#[derive(Default)]
struct MockState {
    sent: Mutex<Vec<OutboundRequest>>,
    read_receipts: Mutex<Vec<String>>,
    send_failure: Mutex<Option<String>>,
    send_delay: Mutex<Option<Duration>>,
    remote: Mutex<Vec<ProviderMessage>>,
    profile: Mutex<Option<CustomerProfile>>,
    health: Mutex<Option<HealthStatus>>,
    syncable: AtomicBool,
    next_id: AtomicU64,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A provider client whose behavior tests script up front.
///
/// Webhook bodies are JSON-encoded [`InboundEvent`]s.
#[derive(Clone)]
pub struct MockProvider {
    config: ProviderConfig,
    state: Arc<MockState>,
}

impl MockProvider {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            config,
            state: Arc::new(MockState::default()),
        }
    }

    /// A client for `config` sharing this mock's script and recordings.
    pub fn with_config(&self, config: ProviderConfig) -> Self {
        Self {
            config,
            state: Arc::clone(&self.state),
        }
    }

    /// Make every send fail with a provider error carrying `message`.
    pub fn fail_sends(&self, message: &str) {
        *lock(&self.state.send_failure) = Some(message.to_string());
    }

    /// Delay every send by `delay` before answering.
    pub fn delay_sends(&self, delay: Duration) {
        *lock(&self.state.send_delay) = Some(delay);
    }

    /// Expose the sync capability.
    pub fn enable_sync(&self) {
        self.state.syncable.store(true, Ordering::SeqCst);
    }

    /// Messages the remote side holds, returned by listings and sync.
    pub fn push_remote(&self, message: ProviderMessage) {
        lock(&self.state.remote).push(message);
    }

    /// Profile returned by `enrich_profile`.
    pub fn set_profile(&self, profile: CustomerProfile) {
        *lock(&self.state.profile) = Some(profile);
    }

    pub fn set_health(&self, health: HealthStatus) {
        *lock(&self.state.health) = Some(health);
    }

    /// Every request that reached `send_message`, in order.
    pub fn sent(&self) -> Vec<OutboundRequest> {
        lock(&self.state.sent).clone()
    }

    /// External ids passed to `mark_read`, in order.
    pub fn read_receipts(&self) -> Vec<String> {
        lock(&self.state.read_receipts).clone()
    }

    fn remote_with(&self, peer: &str) -> Vec<ProviderMessage> {
        lock(&self.state.remote)
            .iter()
            .filter(|m| m.from == peer || m.to == peer)
            .cloned()
            .collect()
    }
}

/// An inbound text from `from` to the mock business address.
pub fn inbound_text(external_id: &str, from: &str, body: &str) -> ProviderMessage {
    ProviderMessage {
        external_id: external_id.to_string(),
        from: from.to_string(),
        to: MOCK_BUSINESS_ADDRESS.to_string(),
        body: body.to_string(),
        message_type: MessageType::Text,
        media_url: None,
        media_content_type: None,
        direction: Direction::Inbound,
        status: MessageStatus::Received,
        timestamp: now_timestamp(),
    }
}

/// A mock webhook body carrying `messages` under `event_id`.
pub fn webhook_body(event_id: &str, messages: Vec<ProviderMessage>) -> Vec<u8> {
    let event = InboundEvent {
        event_id: Some(event_id.to_string()),
        event_type: Some("message".into()),
        messages,
        ..InboundEvent::default()
    };
    serde_json::to_vec(&event).unwrap_or_default()
}

#[async_trait]
impl ProviderClient for MockProvider {
    fn name(&self) -> &str {
        MOCK_PROVIDER
    }

    fn get_config(&self) -> &ProviderConfig {
        &self.config
    }

    fn to_native_address(&self, canonical: &str) -> String {
        canonical.to_string()
    }

    fn decode_webhook(&self, body: &[u8]) -> Result<InboundEvent, ParleyError> {
        serde_json::from_slice(body)
            .map_err(|e| ParleyError::provider(format!("mock webhook payload: {e}")))
    }

    async fn send_message(&self, request: &OutboundRequest) -> Result<SendReceipt, ParleyError> {
        let delay = *lock(&self.state.send_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = lock(&self.state.send_failure).clone() {
            return Err(ParleyError::provider(message));
        }
        lock(&self.state.sent).push(request.clone());
        let n = self.state.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(SendReceipt {
            external_id: format!("mock-{n}"),
            status: MessageStatus::Sent,
        })
    }

    async fn list_conversations(
        &self,
        limit: u32,
    ) -> Result<Vec<RemoteConversation>, ParleyError> {
        let mut peers: Vec<RemoteConversation> = Vec::new();
        for m in lock(&self.state.remote).iter().rev() {
            let peer = match m.direction {
                Direction::Inbound => &m.from,
                Direction::Outbound => &m.to,
            };
            if peers.iter().any(|p| &p.peer_address == peer) {
                continue;
            }
            peers.push(RemoteConversation {
                peer_address: peer.clone(),
                last_message_at: Some(m.timestamp.clone()),
                last_message_preview: Some(m.body.clone()),
            });
        }
        peers.truncate(limit as usize);
        Ok(peers)
    }

    async fn list_messages(
        &self,
        peer: &str,
        limit: u32,
    ) -> Result<Vec<ProviderMessage>, ParleyError> {
        let mut messages = self.remote_with(peer);
        messages.truncate(limit as usize);
        Ok(messages)
    }

    async fn mark_read(&self, external_id: &str) -> Result<(), ParleyError> {
        lock(&self.state.read_receipts).push(external_id.to_string());
        Ok(())
    }

    async fn test_connection(&self) -> Result<HealthStatus, ParleyError> {
        Ok(lock(&self.state.health)
            .clone()
            .unwrap_or(HealthStatus::Healthy))
    }

    fn syncable(&self) -> Option<&dyn SyncableProvider> {
        if self.state.syncable.load(Ordering::SeqCst) {
            Some(self)
        } else {
            None
        }
    }
}

#[async_trait]
impl SyncableProvider for MockProvider {
    async fn refresh_since(&self, since: &str) -> Result<Vec<ProviderMessage>, ParleyError> {
        Ok(lock(&self.state.remote)
            .iter()
            .filter(|m| m.timestamp.as_str() >= since)
            .cloned()
            .collect())
    }

    async fn enrich_profile(&self, _peer: &str) -> Result<Option<CustomerProfile>, ParleyError> {
        Ok(lock(&self.state.profile).clone())
    }

    async fn rebuild_history(&self, peer: &str) -> Result<Vec<ProviderMessage>, ParleyError> {
        Ok(self.remote_with(peer))
    }
}
