// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks semantic constraints serde attributes cannot express: a usable bind
//! address, positive TTLs and limits, and a consistent tenant table.

use std::collections::HashSet;

use parley_core::provider_config::SECRET_PLACEHOLDER;

use crate::diagnostic::ConfigError;
use crate::model::{ParleyConfig, TenantConfig};

/// Validate a deserialized configuration.
///
/// Collects every failure instead of stopping at the first one.
pub fn validate_config(config: &ParleyConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let addr = config.server.bind_address.trim();
    if addr.is_empty() {
        errors.push(ConfigError::validation("server.bind_address must not be empty"));
    } else {
        let is_valid_ip = addr.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = addr
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            errors.push(ConfigError::validation(format!(
                "server.bind_address `{addr}` is not a valid IP address or hostname"
            )));
        }
    }

    if config.server.api_key.as_deref().is_some_and(|k| k.trim().is_empty()) {
        errors.push(ConfigError::validation(
            "server.api_key must not be empty when set",
        ));
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::validation("storage.database_path must not be empty"));
    }

    for (key, value) in [
        ("cache.conversation_ttl_secs", config.cache.conversation_ttl_secs),
        ("cache.message_ttl_secs", config.cache.message_ttl_secs),
        ("cache.refresh_timeout_secs", config.cache.refresh_timeout_secs),
        ("outbound.provider_timeout_secs", config.outbound.provider_timeout_secs),
    ] {
        if value == 0 {
            errors.push(ConfigError::validation(format!("{key} must be greater than 0")));
        }
    }

    if config.cache.quick_page_size == 0 {
        errors.push(ConfigError::validation(
            "cache.quick_page_size must be greater than 0",
        ));
    }

    let mut seen = HashSet::new();
    for (i, tenant) in config.tenants.iter().enumerate() {
        if !seen.insert(tenant.tenant_id) {
            errors.push(ConfigError::validation(format!(
                "duplicate tenant_id {} in [[tenants]] array",
                tenant.tenant_id
            )));
        }
        validate_tenant(i, tenant, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_tenant(i: usize, tenant: &TenantConfig, errors: &mut Vec<ConfigError>) {
    if tenant.provider.trim().is_empty() {
        errors.push(ConfigError::validation(format!(
            "tenants[{i}].provider must not be empty"
        )));
    }
    if tenant.webhook_token.trim().is_empty() {
        errors.push(ConfigError::validation(format!(
            "tenants[{i}].webhook_token must not be empty"
        )));
    }
    if tenant.auth_header_name.trim().is_empty() {
        errors.push(ConfigError::validation(format!(
            "tenants[{i}].auth_header_name must not be empty"
        )));
    }
    if tenant.auth_header_template.contains(SECRET_PLACEHOLDER) && tenant.webhook_secret.is_empty()
    {
        errors.push(ConfigError::validation(format!(
            "tenants[{i}].webhook_secret must be set when auth_header_template uses {SECRET_PLACEHOLDER}"
        )));
    }
    if tenant.rate_limit_window_minutes == 0 || tenant.rate_limit_max_messages == 0 {
        errors.push(ConfigError::validation(format!(
            "tenants[{i}] rate limit window and max messages must be greater than 0"
        )));
    }
    let cc = &tenant.default_country_code;
    if cc.is_empty() || cc.len() > 3 || !cc.chars().all(|c| c.is_ascii_digit()) {
        errors.push(ConfigError::validation(format!(
            "tenants[{i}].default_country_code `{cc}` must be 1-3 digits"
        )));
    }
}
