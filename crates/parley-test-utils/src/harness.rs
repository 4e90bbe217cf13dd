// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end engine tests.
//!
//! `TestHarness` assembles a complete engine over a temp SQLite database with
//! the mock provider registered next to the built-in ones.

use std::sync::Arc;

use parley_config::model::StorageConfig;
use parley_core::types::Message;
use parley_core::{MessageStore, ParleyError, ProviderClient, ProviderConfig};
use parley_engine::{
    Engine, EngineSettings, ProviderFactory, StaticConfigStore, WebhookOutcome,
};
use parley_storage::SqliteStore;

use crate::mock_provider::{MOCK_PROVIDER, MockProvider, mock_config};

/// Builder for configuring the harness's tenants and engine settings.
pub struct TestHarnessBuilder {
    tenants: Vec<ProviderConfig>,
    settings: EngineSettings,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            tenants: Vec::new(),
            settings: EngineSettings::default(),
        }
    }

    /// Add a tenant on the mock provider with [`mock_config`] defaults.
    pub fn with_mock_tenant(self, tenant_id: i64) -> Self {
        self.with_tenant(mock_config(tenant_id, MOCK_PROVIDER))
    }

    /// Add a tenant with an explicit configuration.
    pub fn with_tenant(mut self, config: ProviderConfig) -> Self {
        self.tenants.push(config);
        self
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Open the temp database and assemble the engine.
    pub async fn build(self) -> Result<TestHarness, ParleyError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| ParleyError::Storage { source: e.into() })?;
        let db_path = temp_dir.path().join("test.db");

        let store = SqliteStore::new(StorageConfig {
            database_path: db_path.to_string_lossy().into_owned(),
            wal_mode: true,
        });
        store.initialize().await?;
        let store: Arc<dyn MessageStore> = Arc::new(store);

        let configs = self
            .tenants
            .into_iter()
            .fold(StaticConfigStore::new(), StaticConfigStore::with);

        let mock = MockProvider::new(mock_config(0, MOCK_PROVIDER));
        let mut factory = ProviderFactory::with_builtin_providers(Arc::new(configs));
        let shared = mock.clone();
        factory.register(MOCK_PROVIDER, move |config| {
            Ok(Arc::new(shared.with_config(config)) as Arc<dyn ProviderClient>)
        });

        let engine = Engine::with_factory(Arc::clone(&store), Arc::new(factory), self.settings);
        Ok(TestHarness {
            engine,
            store,
            mock,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete engine over temp storage and the mock provider.
pub struct TestHarness {
    pub engine: Engine,
    /// The store behind the engine, for direct assertions.
    pub store: Arc<dyn MessageStore>,
    /// Shares state with every mock client the factory builds.
    pub mock: MockProvider,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Deliver `body` as an authenticated mock webhook for `tenant_id`.
    pub async fn deliver_webhook(
        &self,
        tenant_id: i64,
        body: &[u8],
    ) -> Result<WebhookOutcome, ParleyError> {
        let config = mock_config(tenant_id, MOCK_PROVIDER);
        let mut headers = http::HeaderMap::new();
        let value = config.auth_header.render(&config.webhook_secret);
        headers.insert(
            http::header::AUTHORIZATION,
            http::HeaderValue::from_str(&value).map_err(|e| ParleyError::Internal(e.to_string()))?,
        );
        self.engine
            .webhooks()
            .ingest(tenant_id, MOCK_PROVIDER, &config.webhook_token, &headers, body)
            .await
    }

    /// Every message stored for the tenant, across conversations.
    pub async fn all_messages(&self, tenant_id: i64) -> Result<Vec<Message>, ParleyError> {
        let conversations = self
            .store
            .list_conversations(tenant_id, &Default::default())
            .await?;
        let mut messages = Vec::new();
        for conversation in conversations {
            messages.extend(
                self.store
                    .list_messages(tenant_id, &conversation.id, None)
                    .await?,
            );
        }
        Ok(messages)
    }
}
