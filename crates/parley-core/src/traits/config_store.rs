// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Source of decrypted per-tenant provider configuration.

use async_trait::async_trait;

use crate::error::ParleyError;
use crate::provider_config::ProviderConfig;

/// Supplies the provider configuration for a tenant.
///
/// Implemented by the configuration-management collaborator; Parley ships a
/// static implementation fed from its own config file.
#[async_trait]
pub trait ProviderConfigStore: Send + Sync + 'static {
    /// The tenant's configuration, if one exists. Inactive configs are returned
    /// too; callers decide how to treat them.
    async fn active_config(&self, tenant_id: i64) -> Result<Option<ProviderConfig>, ParleyError>;
}
