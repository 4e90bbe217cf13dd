// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Messaging engine for Parley.
//!
//! The [`Engine`] wires the shared pieces together:
//! - [`ProviderFactory`] turns tenant configuration into provider clients
//! - [`WebhookIngestor`] authenticates and applies provider webhooks
//! - [`OutboundPipeline`] sends, persists, and notifies
//! - [`WidgetBridge`] threads web chat sessions
//! - [`Inbox`] serves cached reads and agent actions
//!
//! All components share one store, one cache pair, and one event bus, so a
//! write through any of them is visible to the others on the next read.

pub mod address;
pub mod cache;
pub mod config_store;
pub mod events;
pub mod factory;
pub mod inbox;
pub mod outbound;
pub mod rate_limit;
pub mod resolver;
pub mod webhook;
pub mod widget;

use std::sync::Arc;
use std::time::Duration;

use parley_config::model::ParleyConfig;
use parley_core::{MessageStore, ProviderConfigStore};
use tokio::sync::broadcast;

pub use address::normalize_address;
pub use cache::{Cache, InboxCaches, MemoryCache};
pub use config_store::StaticConfigStore;
pub use events::{EventBus, NotificationEvent};
pub use factory::ProviderFactory;
pub use inbox::Inbox;
pub use outbound::{OutboundPipeline, SendRequest};
pub use rate_limit::RateLimiter;
pub use resolver::{ConversationResolver, Resolved};
pub use webhook::{WebhookIngestor, WebhookOutcome};
pub use widget::{WidgetBridge, WidgetOutcome, WidgetPost, WidgetReply};

/// Tunables shared by the engine components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    pub conversation_ttl: Duration,
    pub message_ttl: Duration,
    /// Messages served from the store before a background refresh fills in.
    pub quick_page_size: u32,
    pub refresh_timeout: Duration,
    pub provider_timeout: Duration,
    pub widget_duplicate_window: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            conversation_ttl: Duration::from_secs(60),
            message_ttl: Duration::from_secs(10),
            quick_page_size: 50,
            refresh_timeout: Duration::from_secs(5),
            provider_timeout: Duration::from_secs(5),
            widget_duplicate_window: Duration::from_secs(10),
        }
    }
}

impl EngineSettings {
    pub fn from_config(config: &ParleyConfig) -> Self {
        Self {
            conversation_ttl: Duration::from_secs(config.cache.conversation_ttl_secs),
            message_ttl: Duration::from_secs(config.cache.message_ttl_secs),
            quick_page_size: config.cache.quick_page_size,
            refresh_timeout: Duration::from_secs(config.cache.refresh_timeout_secs),
            provider_timeout: Duration::from_secs(config.outbound.provider_timeout_secs),
            widget_duplicate_window: Duration::from_secs(config.widget.duplicate_window_secs),
        }
    }
}

/// The assembled engine. Cheap to clone.
#[derive(Clone)]
pub struct Engine {
    factory: Arc<ProviderFactory>,
    resolver: ConversationResolver,
    events: EventBus,
    inbox: Inbox,
    outbound: OutboundPipeline,
    webhooks: WebhookIngestor,
    widget: WidgetBridge,
}

impl Engine {
    /// Engine with the built-in Twilio and WhatsApp clients.
    pub fn new(
        store: Arc<dyn MessageStore>,
        configs: Arc<dyn ProviderConfigStore>,
        settings: EngineSettings,
    ) -> Self {
        let factory = ProviderFactory::with_builtin_providers(configs);
        Self::with_factory(store, Arc::new(factory), settings)
    }

    /// Engine over a caller-assembled provider registry.
    pub fn with_factory(
        store: Arc<dyn MessageStore>,
        factory: Arc<ProviderFactory>,
        settings: EngineSettings,
    ) -> Self {
        let caches = InboxCaches::in_memory(settings.conversation_ttl, settings.message_ttl);
        let events = EventBus::default();
        let limiter = Arc::new(RateLimiter::new());

        Self {
            resolver: ConversationResolver::new(Arc::clone(&store)),
            inbox: Inbox::new(
                Arc::clone(&store),
                Arc::clone(&factory),
                caches.clone(),
                events.clone(),
                &settings,
            ),
            outbound: OutboundPipeline::new(
                Arc::clone(&store),
                Arc::clone(&factory),
                limiter,
                caches.clone(),
                events.clone(),
                settings.provider_timeout,
            ),
            webhooks: WebhookIngestor::new(
                Arc::clone(&store),
                Arc::clone(&factory),
                caches.clone(),
                events.clone(),
            ),
            widget: WidgetBridge::new(
                store,
                caches,
                events.clone(),
                settings.widget_duplicate_window,
            ),
            factory,
            events,
        }
    }

    pub fn inbox(&self) -> &Inbox {
        &self.inbox
    }

    pub fn outbound(&self) -> &OutboundPipeline {
        &self.outbound
    }

    pub fn webhooks(&self) -> &WebhookIngestor {
        &self.webhooks
    }

    pub fn widget(&self) -> &WidgetBridge {
        &self.widget
    }

    pub fn factory(&self) -> &ProviderFactory {
        &self.factory
    }

    pub fn resolver(&self) -> &ConversationResolver {
        &self.resolver
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Receive every notification published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<NotificationEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_follow_config_defaults() {
        let settings = EngineSettings::from_config(&ParleyConfig::default());
        assert_eq!(settings, EngineSettings::default());
    }

    #[test]
    fn settings_read_every_section() {
        let mut config = ParleyConfig::default();
        config.cache.quick_page_size = 7;
        config.outbound.provider_timeout_secs = 2;
        config.widget.duplicate_window_secs = 30;
        let settings = EngineSettings::from_config(&config);
        assert_eq!(settings.quick_page_size, 7);
        assert_eq!(settings.provider_timeout, Duration::from_secs(2));
        assert_eq!(settings.widget_duplicate_window, Duration::from_secs(30));
    }
}
