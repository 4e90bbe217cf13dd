// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the [`MessageStore`] trait.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use parley_config::model::StorageConfig;
use parley_core::types::{
    ConversationFilter, ConversationKey, ConversationPatch, CustomerProfile, Direction,
    MessageStatus, now_timestamp,
};
use parley_core::{HealthStatus, MessageStore, ParleyError};

use crate::database::{Database, map_tr_err};
use crate::models::{Conversation, Message, WebhookEvent};
use crate::queries;

/// SQLite-backed message store.
///
/// Wraps a [`Database`] handle and delegates to the per-table query modules.
/// The database is opened lazily by [`SqliteStore::initialize`].
pub struct SqliteStore {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStore {
    /// Create a store for the configured path. Nothing is opened yet.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Open the database and run migrations. Fails if called twice.
    pub async fn initialize(&self) -> Result<(), ParleyError> {
        let db = Database::open_with(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| ParleyError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite store initialized");
        Ok(())
    }

    /// Round-trip a trivial statement through the writer thread.
    pub async fn health_check(&self) -> Result<HealthStatus, ParleyError> {
        self.db()?
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    /// Checkpoint the WAL so the main database file is self-contained.
    pub async fn checkpoint(&self) -> Result<(), ParleyError> {
        if let Some(db) = self.db.get() {
            db.connection()
                .call(|conn| -> Result<(), rusqlite::Error> {
                    conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                    Ok(())
                })
                .await
                .map_err(map_tr_err)?;
            debug!("WAL checkpoint complete");
        }
        Ok(())
    }

    fn db(&self) -> Result<&Database, ParleyError> {
        self.db.get().ok_or_else(|| ParleyError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl MessageStore for SqliteStore {
    // --- Conversations ---

    async fn find_conversation(
        &self,
        tenant_id: i64,
        key: &ConversationKey,
    ) -> Result<Option<Conversation>, ParleyError> {
        queries::conversations::find_by_key(self.db()?, tenant_id, key).await
    }

    async fn get_conversation(
        &self,
        tenant_id: i64,
        id: &str,
    ) -> Result<Option<Conversation>, ParleyError> {
        queries::conversations::get(self.db()?, tenant_id, id).await
    }

    async fn insert_conversation(&self, conversation: &Conversation) -> Result<bool, ParleyError> {
        queries::conversations::insert(self.db()?, conversation).await
    }

    async fn list_conversations(
        &self,
        tenant_id: i64,
        filter: &ConversationFilter,
    ) -> Result<Vec<Conversation>, ParleyError> {
        queries::conversations::list(self.db()?, tenant_id, filter).await
    }

    async fn update_conversation(
        &self,
        tenant_id: i64,
        id: &str,
        patch: &ConversationPatch,
    ) -> Result<Option<Conversation>, ParleyError> {
        queries::conversations::update(self.db()?, tenant_id, id, patch, &now_timestamp()).await
    }

    async fn touch_last_event(
        &self,
        tenant_id: i64,
        id: &str,
        at: &str,
    ) -> Result<(), ParleyError> {
        queries::conversations::touch_last_event(self.db()?, tenant_id, id, at).await
    }

    async fn update_profile(
        &self,
        tenant_id: i64,
        id: &str,
        profile: &CustomerProfile,
    ) -> Result<(), ParleyError> {
        queries::conversations::update_profile(self.db()?, tenant_id, id, profile, &now_timestamp())
            .await
    }

    async fn rebind_session(
        &self,
        tenant_id: i64,
        id: &str,
        session_id: &str,
    ) -> Result<bool, ParleyError> {
        queries::conversations::rebind_session(
            self.db()?,
            tenant_id,
            id,
            session_id,
            &now_timestamp(),
        )
        .await
    }

    async fn mark_conversation_read(
        &self,
        tenant_id: i64,
        id: &str,
        at: &str,
    ) -> Result<(), ParleyError> {
        queries::conversations::mark_read(self.db()?, tenant_id, id, at).await
    }

    // --- Messages ---

    async fn append_message(&self, message: &Message) -> Result<bool, ParleyError> {
        queries::messages::append(self.db()?, message, &now_timestamp()).await
    }

    async fn find_message_by_external_id(
        &self,
        tenant_id: i64,
        provider: &str,
        external_id: &str,
    ) -> Result<Option<Message>, ParleyError> {
        queries::messages::find_by_external_id(self.db()?, tenant_id, provider, external_id).await
    }

    async fn list_messages(
        &self,
        tenant_id: i64,
        conversation_id: &str,
        limit: Option<u32>,
    ) -> Result<Vec<Message>, ParleyError> {
        queries::messages::list_for_conversation(self.db()?, tenant_id, conversation_id, limit)
            .await
    }

    async fn list_messages_since(
        &self,
        tenant_id: i64,
        conversation_id: &str,
        since: Option<&str>,
    ) -> Result<Vec<Message>, ParleyError> {
        queries::messages::list_since(self.db()?, tenant_id, conversation_id, since).await
    }

    async fn find_recent_duplicate(
        &self,
        tenant_id: i64,
        conversation_id: &str,
        direction: Direction,
        body: &str,
        since: &str,
    ) -> Result<Option<Message>, ParleyError> {
        queries::messages::find_recent_duplicate(
            self.db()?,
            tenant_id,
            conversation_id,
            direction,
            body,
            since,
        )
        .await
    }

    async fn latest_inbound_external_id(
        &self,
        tenant_id: i64,
        conversation_id: &str,
    ) -> Result<Option<String>, ParleyError> {
        queries::messages::latest_inbound_external_id(self.db()?, tenant_id, conversation_id).await
    }

    async fn update_message_status(
        &self,
        tenant_id: i64,
        provider: &str,
        external_id: &str,
        status: MessageStatus,
    ) -> Result<Option<Message>, ParleyError> {
        queries::messages::update_status(self.db()?, tenant_id, provider, external_id, status)
            .await
    }

    // --- Webhook event log ---

    async fn record_webhook_event(&self, event: &WebhookEvent) -> Result<bool, ParleyError> {
        queries::webhook_events::record(self.db()?, event).await
    }

    // --- Blacklist ---

    async fn is_blacklisted(&self, tenant_id: i64, address: &str) -> Result<bool, ParleyError> {
        queries::blacklist::contains(self.db()?, tenant_id, address).await
    }

    async fn add_to_blacklist(
        &self,
        tenant_id: i64,
        address: &str,
        reason: Option<&str>,
    ) -> Result<(), ParleyError> {
        queries::blacklist::add(self.db()?, tenant_id, address, reason, &now_timestamp()).await
    }

    async fn remove_from_blacklist(
        &self,
        tenant_id: i64,
        address: &str,
    ) -> Result<bool, ParleyError> {
        queries::blacklist::remove(self.db()?, tenant_id, address).await
    }
}
