// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A [`ProviderConfigStore`] backed by a fixed map, fed from `[[tenants]]`.

use std::collections::HashMap;

use async_trait::async_trait;
use parley_config::model::TenantConfig;
use parley_core::{ParleyError, ProviderConfig, ProviderConfigStore};

/// Provider configurations held in memory.
#[derive(Debug, Default, Clone)]
pub struct StaticConfigStore {
    configs: HashMap<i64, ProviderConfig>,
}

impl StaticConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the `[[tenants]]` section of the config file.
    pub fn from_tenants(tenants: &[TenantConfig]) -> Self {
        Self {
            configs: tenants
                .iter()
                .map(|t| (t.tenant_id, t.to_provider_config()))
                .collect(),
        }
    }

    /// Insert or replace a tenant's configuration.
    pub fn insert(&mut self, config: ProviderConfig) {
        self.configs.insert(config.tenant_id, config);
    }

    pub fn with(mut self, config: ProviderConfig) -> Self {
        self.insert(config);
        self
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }
}

#[async_trait]
impl ProviderConfigStore for StaticConfigStore {
    async fn active_config(&self, tenant_id: i64) -> Result<Option<ProviderConfig>, ParleyError> {
        Ok(self.configs.get(&tenant_id).cloned())
    }
}
