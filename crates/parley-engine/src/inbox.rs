// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbox read path and agent-side conversation management.
//!
//! Reads are served from cache, then from a quick page of the store. A cache
//! miss also kicks off a background refresh from the live provider; callers
//! never wait for it.

use std::sync::Arc;
use std::time::Duration;

use parley_core::types::{
    Conversation, ConversationFilter, ConversationPatch, ConversationStatus,
    Direction, HealthStatus, Message, Priority, ProviderMessage, Source, now_timestamp,
};
use parley_core::{MessageStore, ParleyError, ProviderClient};
use tracing::{debug, info, warn};

use crate::EngineSettings;
use crate::address::normalize_address;
use crate::cache::{InFlight, InboxCaches};
use crate::events::{EventBus, NotificationEvent};
use crate::factory::ProviderFactory;
use crate::resolver::{ConversationResolver, message_from_provider};

/// How far back a first sync looks when the tenant has no local history.
const INITIAL_SYNC_WINDOW: chrono::Duration = chrono::Duration::days(1);

/// Conversation listing, history, and agent actions for one store.
#[derive(Clone)]
pub struct Inbox {
    store: Arc<dyn MessageStore>,
    factory: Arc<ProviderFactory>,
    resolver: ConversationResolver,
    caches: InboxCaches,
    events: EventBus,
    in_flight: Arc<InFlight>,
    quick_page_size: u32,
    refresh_timeout: Duration,
    provider_timeout: Duration,
}

impl Inbox {
    pub fn new(
        store: Arc<dyn MessageStore>,
        factory: Arc<ProviderFactory>,
        caches: InboxCaches,
        events: EventBus,
        settings: &EngineSettings,
    ) -> Self {
        Self {
            resolver: ConversationResolver::new(Arc::clone(&store)),
            store,
            factory,
            caches,
            events,
            in_flight: Arc::new(InFlight::default()),
            quick_page_size: settings.quick_page_size,
            refresh_timeout: settings.refresh_timeout,
            provider_timeout: settings.provider_timeout,
        }
    }

    /// Conversations matching `filter`, most recent activity first.
    pub async fn list_conversations(
        &self,
        tenant_id: i64,
        filter: &ConversationFilter,
    ) -> Result<Vec<Conversation>, ParleyError> {
        let key = InboxCaches::list_key(tenant_id, filter);
        if let Some(hit) = self.caches.conversations.get(&key) {
            debug!(tenant_id, "conversation list cache hit");
            return Ok(hit);
        }

        let generation = self.caches.conversations.generation(&key);
        let conversations = self.store.list_conversations(tenant_id, filter).await?;
        self.caches.conversations.set_if_current(
            &key,
            conversations.clone(),
            self.caches.conversation_ttl,
            generation,
        );

        self.spawn_list_refresh(tenant_id, filter.clone(), key);
        Ok(conversations)
    }

    /// Messages of one conversation, oldest first.
    ///
    /// Provider threads start from a quick page and are completed by a
    /// background refresh. Widget threads have no remote side, so the store
    /// holds all of them and they are read in full.
    pub async fn message_history(
        &self,
        tenant_id: i64,
        conversation_id: &str,
    ) -> Result<Vec<Message>, ParleyError> {
        let key = InboxCaches::history_key(tenant_id, conversation_id);
        if let Some(hit) = self.caches.messages.get(&key) {
            debug!(tenant_id, conversation_id, "message history cache hit");
            return Ok(hit);
        }

        let generation = self.caches.messages.generation(&key);
        let conversation = self.require_conversation(tenant_id, conversation_id).await?;
        let limit = match conversation.source {
            Source::Provider => Some(self.quick_page_size),
            Source::Widget => None,
        };
        let messages = self
            .store
            .list_messages(tenant_id, conversation_id, limit)
            .await?;
        self.caches.messages.set_if_current(
            &key,
            messages.clone(),
            self.caches.message_ttl,
            generation,
        );

        if conversation.source == Source::Provider {
            self.spawn_history_refresh(conversation, key);
        }
        Ok(messages)
    }

    /// Zero the unread count, stamp read times, and tell the provider.
    pub async fn mark_read(
        &self,
        tenant_id: i64,
        conversation_id: &str,
    ) -> Result<Conversation, ParleyError> {
        let conversation = self.require_conversation(tenant_id, conversation_id).await?;
        self.store
            .mark_conversation_read(tenant_id, conversation_id, &now_timestamp())
            .await?;
        self.caches.invalidate_conversation(tenant_id, conversation_id);

        if conversation.source == Source::Provider {
            self.forward_read_receipt(tenant_id, conversation_id).await;
        }

        let updated = self.require_conversation(tenant_id, conversation_id).await?;
        self.events.publish(NotificationEvent::ConversationUpdated {
            conversation: updated.clone(),
        });
        Ok(updated)
    }

    /// Apply an agent-side change and announce it.
    pub async fn update_conversation(
        &self,
        tenant_id: i64,
        conversation_id: &str,
        patch: &ConversationPatch,
    ) -> Result<Conversation, ParleyError> {
        let updated = self
            .store
            .update_conversation(tenant_id, conversation_id, patch)
            .await?
            .ok_or_else(|| not_found(conversation_id))?;
        self.caches.invalidate_lists(tenant_id);
        info!(tenant_id, conversation_id, "conversation updated");
        self.events.publish(NotificationEvent::ConversationUpdated {
            conversation: updated.clone(),
        });
        Ok(updated)
    }

    /// Close, archive, or reactivate.
    pub async fn set_status(
        &self,
        tenant_id: i64,
        conversation_id: &str,
        status: ConversationStatus,
    ) -> Result<Conversation, ParleyError> {
        let patch = ConversationPatch {
            status: Some(status),
            ..Default::default()
        };
        self.update_conversation(tenant_id, conversation_id, &patch)
            .await
    }

    /// Assign to an agent, or unassign with `None`.
    pub async fn assign(
        &self,
        tenant_id: i64,
        conversation_id: &str,
        agent_id: Option<i64>,
    ) -> Result<Conversation, ParleyError> {
        let patch = ConversationPatch {
            assigned_agent_id: Some(agent_id),
            ..Default::default()
        };
        self.update_conversation(tenant_id, conversation_id, &patch)
            .await
    }

    pub async fn set_priority(
        &self,
        tenant_id: i64,
        conversation_id: &str,
        priority: Priority,
    ) -> Result<Conversation, ParleyError> {
        let patch = ConversationPatch {
            priority: Some(priority),
            ..Default::default()
        };
        self.update_conversation(tenant_id, conversation_id, &patch)
            .await
    }

    /// Replace tags and/or notes; `None` leaves the field as is.
    pub async fn update_tags_notes(
        &self,
        tenant_id: i64,
        conversation_id: &str,
        tags: Option<Vec<String>>,
        notes: Option<String>,
    ) -> Result<Conversation, ParleyError> {
        let patch = ConversationPatch {
            tags,
            notes,
            ..Default::default()
        };
        self.update_conversation(tenant_id, conversation_id, &patch)
            .await
    }

    /// Block outbound sends to `address`. Returns the canonical address.
    pub async fn blacklist_add(
        &self,
        tenant_id: i64,
        address: &str,
        reason: Option<&str>,
    ) -> Result<String, ParleyError> {
        let cc = self.factory.default_country_code(tenant_id).await;
        let canonical = normalize_address(address, &cc)?;
        self.store
            .add_to_blacklist(tenant_id, &canonical, reason)
            .await?;
        info!(tenant_id, address = %canonical, "address blacklisted");
        Ok(canonical)
    }

    /// Lift a block. Returns whether an entry existed.
    pub async fn blacklist_remove(&self, tenant_id: i64, address: &str) -> Result<bool, ParleyError> {
        let cc = self.factory.default_country_code(tenant_id).await;
        let canonical = normalize_address(address, &cc)?;
        let removed = self.store.remove_from_blacklist(tenant_id, &canonical).await?;
        if removed {
            info!(tenant_id, address = %canonical, "address removed from blacklist");
        }
        Ok(removed)
    }

    /// Backfill a provider thread from the provider's full history. Messages
    /// already stored are skipped by their external id. Returns how many
    /// were added.
    pub async fn rebuild_conversation(
        &self,
        tenant_id: i64,
        conversation_id: &str,
    ) -> Result<usize, ParleyError> {
        let conversation = self.require_conversation(tenant_id, conversation_id).await?;
        if conversation.source != Source::Provider {
            return Err(ParleyError::Validation(format!(
                "conversation {conversation_id} is a widget thread and has no provider history"
            )));
        }
        let provider = self.factory.resolve(tenant_id).await?;
        let Some(sync) = provider.syncable() else {
            return Err(ParleyError::Validation(format!(
                "provider `{}` cannot rebuild history",
                provider.name()
            )));
        };

        let peer = provider.to_native_address(&conversation.customer_address);
        let remote = match tokio::time::timeout(self.provider_timeout, sync.rebuild_history(&peer))
            .await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(ParleyError::Timeout {
                    duration: self.provider_timeout,
                });
            }
        };

        let mut added = 0;
        for message in &remote {
            if self
                .store_provider_message(provider.as_ref(), &conversation, message)
                .await?
            {
                added += 1;
            }
        }
        self.enrich(provider.as_ref(), &conversation).await;
        self.caches.invalidate_conversation(tenant_id, conversation_id);

        info!(
            tenant_id,
            conversation_id,
            fetched = remote.len(),
            added,
            "conversation rebuilt from provider history"
        );
        let updated = self.require_conversation(tenant_id, conversation_id).await?;
        self.events
            .publish(NotificationEvent::ConversationUpdated { conversation: updated });
        Ok(added)
    }

    /// Probe the tenant's provider. Failures are reported as health, not errors.
    pub async fn provider_health(&self, tenant_id: i64) -> Result<HealthStatus, ParleyError> {
        let provider = self.factory.resolve(tenant_id).await?;
        match tokio::time::timeout(self.provider_timeout, provider.test_connection()).await {
            Ok(Ok(status)) => Ok(status),
            Ok(Err(e)) => Ok(HealthStatus::Unhealthy(e.to_string())),
            Err(_) => Ok(HealthStatus::Unhealthy(format!(
                "no answer within {:?}",
                self.provider_timeout
            ))),
        }
    }

    async fn require_conversation(
        &self,
        tenant_id: i64,
        conversation_id: &str,
    ) -> Result<Conversation, ParleyError> {
        self.store
            .get_conversation(tenant_id, conversation_id)
            .await?
            .ok_or_else(|| not_found(conversation_id))
    }

    async fn forward_read_receipt(&self, tenant_id: i64, conversation_id: &str) {
        let external_id = match self
            .store
            .latest_inbound_external_id(tenant_id, conversation_id)
            .await
        {
            Ok(Some(id)) => id,
            Ok(None) => return,
            Err(e) => {
                warn!(tenant_id, conversation_id, error = %e, "could not look up read receipt target");
                return;
            }
        };
        let provider = match self.factory.resolve(tenant_id).await {
            Ok(provider) => provider,
            Err(e) => {
                debug!(tenant_id, error = %e, "no provider for read receipt");
                return;
            }
        };
        match tokio::time::timeout(self.provider_timeout, provider.mark_read(&external_id)).await {
            Ok(Ok(())) => debug!(tenant_id, external_id = %external_id, "read receipt forwarded"),
            Ok(Err(e)) => {
                warn!(tenant_id, external_id = %external_id, error = %e, "provider rejected read receipt")
            }
            Err(_) => warn!(tenant_id, external_id = %external_id, "read receipt timed out"),
        }
    }

    fn spawn_list_refresh(&self, tenant_id: i64, filter: ConversationFilter, key: String) {
        let Some(guard) = self.in_flight.try_begin(&key) else {
            debug!(tenant_id, "conversation refresh already running");
            return;
        };
        let inbox = self.clone();
        tokio::spawn(async move {
            let _guard = guard;
            let work = inbox.sync_tenant(tenant_id);
            match tokio::time::timeout(inbox.refresh_timeout, work).await {
                Ok(Ok(synced)) => debug!(tenant_id, synced, "conversation refresh finished"),
                Ok(Err(e)) => {
                    warn!(tenant_id, error = %e, "conversation refresh failed");
                    return;
                }
                Err(_) => {
                    warn!(tenant_id, "conversation refresh timed out");
                    return;
                }
            }
            // Taken after the sync's own writes so they do not refuse the fill.
            let generation = inbox.caches.conversations.generation(&key);
            match inbox.store.list_conversations(tenant_id, &filter).await {
                Ok(fresh) => {
                    inbox.caches.conversations.set_if_current(
                        &key,
                        fresh,
                        inbox.caches.conversation_ttl,
                        generation,
                    );
                }
                Err(e) => warn!(tenant_id, error = %e, "re-reading conversations failed"),
            }
        });
    }

    fn spawn_history_refresh(&self, conversation: Conversation, key: String) {
        let Some(guard) = self.in_flight.try_begin(&key) else {
            return;
        };
        let inbox = self.clone();
        tokio::spawn(async move {
            let _guard = guard;
            let tenant_id = conversation.tenant_id;
            let work = inbox.sync_conversation(&conversation);
            match tokio::time::timeout(inbox.refresh_timeout, work).await {
                Ok(Ok(synced)) => debug!(tenant_id, conversation_id = %conversation.id, synced, "history refresh finished"),
                Ok(Err(e)) => {
                    warn!(tenant_id, conversation_id = %conversation.id, error = %e, "history refresh failed");
                    return;
                }
                Err(_) => {
                    warn!(tenant_id, conversation_id = %conversation.id, "history refresh timed out");
                    return;
                }
            }
            let generation = inbox.caches.messages.generation(&key);
            match inbox
                .store
                .list_messages(tenant_id, &conversation.id, None)
                .await
            {
                Ok(fresh) => {
                    inbox.caches.messages.set_if_current(
                        &key,
                        fresh,
                        inbox.caches.message_ttl,
                        generation,
                    );
                }
                Err(e) => warn!(tenant_id, error = %e, "re-reading history failed"),
            }
        });
    }

    /// Pull recent provider-side messages for the whole tenant into the store.
    async fn sync_tenant(&self, tenant_id: i64) -> Result<usize, ParleyError> {
        let provider = self.factory.resolve(tenant_id).await?;
        let config = provider.get_config();

        let remote: Vec<ProviderMessage> = match provider.syncable() {
            Some(sync) => {
                let since = self.newest_activity(tenant_id).await?;
                sync.refresh_since(&since).await?
            }
            None => {
                let mut collected = Vec::new();
                for thread in provider.list_conversations(self.quick_page_size).await? {
                    collected.extend(
                        provider
                            .list_messages(&thread.peer_address, self.quick_page_size)
                            .await?,
                    );
                }
                collected
            }
        };

        let mut synced = 0;
        for message in &remote {
            let peer = match message.direction {
                Direction::Inbound => &message.from,
                Direction::Outbound => &message.to,
            };
            let resolved = match self
                .resolver
                .resolve_phone(
                    tenant_id,
                    peer,
                    &config.business_address,
                    &config.default_country_code,
                )
                .await
            {
                Ok(resolved) => resolved,
                Err(e) => {
                    debug!(tenant_id, error = %e, "skipping unaddressable provider message");
                    continue;
                }
            };
            if self
                .store_provider_message(provider.as_ref(), &resolved.conversation, message)
                .await?
            {
                synced += 1;
            }
            if resolved.created {
                self.events.publish(NotificationEvent::ConversationCreated {
                    conversation: resolved.conversation.clone(),
                });
                self.enrich(provider.as_ref(), &resolved.conversation).await;
            }
        }
        Ok(synced)
    }

    /// Pull one conversation's provider-side history into the store.
    async fn sync_conversation(&self, conversation: &Conversation) -> Result<usize, ParleyError> {
        let provider = self.factory.resolve(conversation.tenant_id).await?;
        let peer = provider.to_native_address(&conversation.customer_address);
        let remote = provider.list_messages(&peer, self.quick_page_size).await?;

        let mut synced = 0;
        for message in &remote {
            if self
                .store_provider_message(provider.as_ref(), conversation, message)
                .await?
            {
                synced += 1;
            }
        }
        if conversation.customer_name.is_none() {
            self.enrich(provider.as_ref(), conversation).await;
        }
        Ok(synced)
    }

    /// Append through the store's single insert path. A new row invalidates
    /// the conversation's history and every listing of the tenant.
    async fn store_provider_message(
        &self,
        provider: &dyn ProviderClient,
        conversation: &Conversation,
        message: &ProviderMessage,
    ) -> Result<bool, ParleyError> {
        let record = message_from_provider(conversation, provider.name(), message);
        let inserted = self.store.append_message(&record).await?;
        if inserted {
            self.caches
                .invalidate_conversation(conversation.tenant_id, &conversation.id);
        }
        Ok(inserted)
    }

    async fn enrich(&self, provider: &dyn ProviderClient, conversation: &Conversation) {
        let Some(sync) = provider.syncable() else {
            return;
        };
        let peer = provider.to_native_address(&conversation.customer_address);
        match sync.enrich_profile(&peer).await {
            Ok(Some(profile)) => {
                match self
                    .store
                    .update_profile(conversation.tenant_id, &conversation.id, &profile)
                    .await
                {
                    Ok(()) => self.caches.invalidate_lists(conversation.tenant_id),
                    Err(e) => {
                        warn!(conversation_id = %conversation.id, error = %e, "saving profile failed")
                    }
                }
            }
            Ok(None) => {}
            Err(e) => debug!(conversation_id = %conversation.id, error = %e, "profile lookup failed"),
        }
    }

    async fn newest_activity(&self, tenant_id: i64) -> Result<String, ParleyError> {
        let newest = self
            .store
            .list_conversations(
                tenant_id,
                &ConversationFilter {
                    limit: 1,
                    ..Default::default()
                },
            )
            .await?
            .into_iter()
            .next()
            .and_then(|c| c.last_message_at);
        Ok(newest.unwrap_or_else(|| {
            parley_core::types::format_timestamp(chrono::Utc::now() - INITIAL_SYNC_WINDOW)
        }))
    }
}

fn not_found(conversation_id: &str) -> ParleyError {
    ParleyError::NotFound(format!("conversation {conversation_id}"))
}

