// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Parley messaging service.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use parley_core::provider_config::{
    HeaderTemplate, ProviderConfig, ProviderCredentials, RateLimit, SECRET_PLACEHOLDER,
};
use serde::{Deserialize, Serialize};

/// Top-level Parley configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ParleyConfig {
    /// HTTP listener and API authentication.
    #[serde(default)]
    pub server: ServerConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Read-through cache TTLs and quick-page size.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Outbound send pipeline settings.
    #[serde(default)]
    pub outbound: OutboundConfig,

    /// Website widget bridge settings.
    #[serde(default)]
    pub widget: WidgetConfig,

    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Static per-tenant provider configuration.
    #[serde(default)]
    pub tenants: Vec<TenantConfig>,
}

/// HTTP server configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to bind the server to.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// TCP port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bearer token for the REST API. `None` rejects every API request.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Allowed CORS origins for the widget endpoints. Empty allows any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            api_key: None,
            cors_origins: Vec::new(),
        }
    }
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind_address", &self.bind_address)
            .field("port", &self.port)
            .field("api_key", &self.api_key.as_ref().map(|_| "[redacted]"))
            .field("cors_origins", &self.cors_origins)
            .finish()
    }
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("parley").join("parley.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("parley.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Read-through cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// TTL of cached conversation listings.
    #[serde(default = "default_conversation_ttl_secs")]
    pub conversation_ttl_secs: u64,

    /// TTL of cached message histories.
    #[serde(default = "default_message_ttl_secs")]
    pub message_ttl_secs: u64,

    /// Rows served from the store on a cache miss.
    #[serde(default = "default_quick_page_size")]
    pub quick_page_size: u32,

    /// Upper bound on a background refresh from the live provider.
    #[serde(default = "default_refresh_timeout_secs")]
    pub refresh_timeout_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            conversation_ttl_secs: default_conversation_ttl_secs(),
            message_ttl_secs: default_message_ttl_secs(),
            quick_page_size: default_quick_page_size(),
            refresh_timeout_secs: default_refresh_timeout_secs(),
        }
    }
}

fn default_conversation_ttl_secs() -> u64 {
    60
}

fn default_message_ttl_secs() -> u64 {
    10
}

fn default_quick_page_size() -> u32 {
    50
}

fn default_refresh_timeout_secs() -> u64 {
    5
}

/// Outbound send pipeline configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OutboundConfig {
    /// Timeout applied to every provider send call.
    #[serde(default = "default_provider_timeout_secs")]
    pub provider_timeout_secs: u64,
}

impl Default for OutboundConfig {
    fn default() -> Self {
        Self {
            provider_timeout_secs: default_provider_timeout_secs(),
        }
    }
}

fn default_provider_timeout_secs() -> u64 {
    5
}

/// Widget bridge configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WidgetConfig {
    /// Identical bodies within this window count as duplicates when no client id is sent.
    #[serde(default = "default_duplicate_window_secs")]
    pub duplicate_window_secs: u64,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            duplicate_window_secs: default_duplicate_window_secs(),
        }
    }
}

fn default_duplicate_window_secs() -> u64 {
    10
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Default filter directive (trace, debug, info, warn, error). `RUST_LOG` wins.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// One tenant's provider configuration, as written in `[[tenants]]`.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TenantConfig {
    /// Tenant (company) identifier.
    pub tenant_id: i64,

    /// Provider name, e.g. `twilio` or `whatsapp`.
    pub provider: String,

    /// Inactive tenants are treated as not configured.
    #[serde(default = "default_active")]
    pub active: bool,

    /// Provider account identifier.
    #[serde(default)]
    pub account_id: String,

    /// Provider API secret.
    #[serde(default)]
    pub auth_token: String,

    /// Provider-side sender handle (messaging service SID, phone number id).
    #[serde(default)]
    pub sender_id: Option<String>,

    /// The tenant's own number in canonical `+<digits>` form.
    pub business_address: String,

    /// Overrides the provider API base URL.
    #[serde(default)]
    pub api_base_url: Option<String>,

    /// Token embedded in the webhook URL path.
    pub webhook_token: String,

    /// Secret expected in the webhook auth header.
    #[serde(default)]
    pub webhook_secret: String,

    /// Name of the webhook auth header.
    #[serde(default = "default_auth_header_name")]
    pub auth_header_name: String,

    /// Expected header value; `{secret}` is replaced by `webhook_secret`.
    #[serde(default = "default_auth_header_template")]
    pub auth_header_template: String,

    /// Rate-limit window length.
    #[serde(default = "default_rate_limit_window_minutes")]
    pub rate_limit_window_minutes: u64,

    /// Messages allowed per window.
    #[serde(default = "default_rate_limit_max_messages")]
    pub rate_limit_max_messages: u32,

    /// Country calling code prepended to bare national numbers.
    #[serde(default = "default_country_code")]
    pub default_country_code: String,
}

impl std::fmt::Debug for TenantConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantConfig")
            .field("tenant_id", &self.tenant_id)
            .field("provider", &self.provider)
            .field("active", &self.active)
            .field("account_id", &self.account_id)
            .field("auth_token", &"[redacted]")
            .field("business_address", &self.business_address)
            .field("webhook_token", &"[redacted]")
            .field("webhook_secret", &"[redacted]")
            .field("auth_header_name", &self.auth_header_name)
            .field("rate_limit_window_minutes", &self.rate_limit_window_minutes)
            .field("rate_limit_max_messages", &self.rate_limit_max_messages)
            .finish_non_exhaustive()
    }
}

impl TenantConfig {
    /// Build the provider configuration the engine consumes.
    pub fn to_provider_config(&self) -> ProviderConfig {
        ProviderConfig {
            tenant_id: self.tenant_id,
            provider: self.provider.clone(),
            active: self.active,
            credentials: ProviderCredentials {
                account_id: self.account_id.clone(),
                auth_token: self.auth_token.clone(),
                sender_id: self.sender_id.clone(),
            },
            business_address: self.business_address.clone(),
            api_base_url: self.api_base_url.clone(),
            webhook_token: self.webhook_token.clone(),
            webhook_secret: self.webhook_secret.clone(),
            auth_header: HeaderTemplate {
                name: self.auth_header_name.clone(),
                value_template: self.auth_header_template.clone(),
            },
            rate_limit: RateLimit {
                window_minutes: self.rate_limit_window_minutes,
                max_messages: self.rate_limit_max_messages,
            },
            default_country_code: self.default_country_code.clone(),
        }
    }
}

fn default_active() -> bool {
    true
}

fn default_auth_header_name() -> String {
    "authorization".to_string()
}

fn default_auth_header_template() -> String {
    format!("Bearer {SECRET_PLACEHOLDER}")
}

fn default_rate_limit_window_minutes() -> u64 {
    1
}

fn default_rate_limit_max_messages() -> u32 {
    60
}

fn default_country_code() -> String {
    "1".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_converts_to_provider_config() {
        let tenant: TenantConfig = toml::from_str(
            r#"
tenant_id = 9
provider = "twilio"
business_address = "+15550001111"
webhook_token = "tok"
webhook_secret = "sec"
"#,
        )
        .unwrap();
        let cfg = tenant.to_provider_config();
        assert_eq!(cfg.tenant_id, 9);
        assert!(cfg.active);
        assert_eq!(cfg.auth_header.render(&cfg.webhook_secret), "Bearer sec");
        assert_eq!(cfg.rate_limit.max_messages, 60);
        assert_eq!(cfg.default_country_code, "1");
    }

    #[test]
    fn tenant_debug_redacts_secrets() {
        let tenant: TenantConfig = toml::from_str(
            r#"
tenant_id = 1
provider = "whatsapp"
auth_token = "very-secret-token"
business_address = "+15550001111"
webhook_token = "path-token"
"#,
        )
        .unwrap();
        let debug = format!("{tenant:?}");
        assert!(!debug.contains("very-secret-token"));
        assert!(!debug.contains("path-token"));
    }

    #[test]
    fn server_debug_redacts_api_key() {
        let server = ServerConfig {
            api_key: Some("k-123".into()),
            ..Default::default()
        };
        assert!(!format!("{server:?}").contains("k-123"));
    }
}
