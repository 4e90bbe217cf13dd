// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Decrypted per-tenant provider configuration.
//!
//! Owned by the external configuration collaborator; this core only reads it.

use serde::{Deserialize, Serialize};

/// Placeholder substituted with the webhook secret in [`HeaderTemplate`].
pub const SECRET_PLACEHOLDER: &str = "{secret}";

/// Credentials used to call the provider API.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderCredentials {
    /// Account identifier (Twilio account SID, WhatsApp business account id).
    pub account_id: String,
    /// API secret or access token.
    pub auth_token: String,
    /// Provider-side sender handle (messaging service SID, phone number id).
    pub sender_id: Option<String>,
}

impl std::fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderCredentials")
            .field("account_id", &self.account_id)
            .field("auth_token", &"[redacted]")
            .field("sender_id", &self.sender_id)
            .finish()
    }
}

/// Name and value template of the header a webhook caller must present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderTemplate {
    /// Header name, matched case-insensitively.
    pub name: String,
    /// Expected value with [`SECRET_PLACEHOLDER`] standing in for the secret.
    pub value_template: String,
}

impl Default for HeaderTemplate {
    fn default() -> Self {
        Self {
            name: "authorization".to_string(),
            value_template: format!("Bearer {SECRET_PLACEHOLDER}"),
        }
    }
}

impl HeaderTemplate {
    /// The exact header value expected for `secret`.
    pub fn render(&self, secret: &str) -> String {
        self.value_template.replace(SECRET_PLACEHOLDER, secret)
    }
}

/// Sliding-window outbound rate limit: at most `max_messages` per `window_minutes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimit {
    pub window_minutes: u64,
    pub max_messages: u32,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            window_minutes: 1,
            max_messages: 60,
        }
    }
}

/// Structured, already-decrypted provider configuration for one tenant.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub tenant_id: i64,
    /// Stored provider name; normalized by the provider factory.
    pub provider: String,
    pub active: bool,
    pub credentials: ProviderCredentials,
    /// The tenant's own address on this provider (canonical form).
    pub business_address: String,
    /// Overrides the provider's API base URL (sandboxes, tests).
    pub api_base_url: Option<String>,
    /// Token embedded in the webhook path.
    pub webhook_token: String,
    /// Secret rendered into the auth header template.
    pub webhook_secret: String,
    pub auth_header: HeaderTemplate,
    pub rate_limit: RateLimit,
    /// Country calling code assumed for bare national numbers.
    pub default_country_code: String,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("tenant_id", &self.tenant_id)
            .field("provider", &self.provider)
            .field("active", &self.active)
            .field("credentials", &self.credentials)
            .field("business_address", &self.business_address)
            .field("api_base_url", &self.api_base_url)
            .field("webhook_token", &"[redacted]")
            .field("webhook_secret", &"[redacted]")
            .field("auth_header", &self.auth_header.name)
            .field("rate_limit", &self.rate_limit)
            .field("default_country_code", &self.default_country_code)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ProviderConfig {
        ProviderConfig {
            tenant_id: 42,
            provider: "twilio".into(),
            active: true,
            credentials: ProviderCredentials {
                account_id: "AC123".into(),
                auth_token: "tok-very-secret".into(),
                sender_id: None,
            },
            business_address: "+14155550000".into(),
            api_base_url: None,
            webhook_token: "path-token".into(),
            webhook_secret: "hdr-secret".into(),
            auth_header: HeaderTemplate::default(),
            rate_limit: RateLimit::default(),
            default_country_code: "1".into(),
        }
    }

    #[test]
    fn default_template_is_bearer() {
        let tpl = HeaderTemplate::default();
        assert_eq!(tpl.name, "authorization");
        assert_eq!(tpl.render("s3cr3t"), "Bearer s3cr3t");
    }

    #[test]
    fn custom_template_renders_secret() {
        let tpl = HeaderTemplate {
            name: "x-webhook-key".into(),
            value_template: "key={secret};v1".into(),
        };
        assert_eq!(tpl.render("abc"), "key=abc;v1");
    }

    #[test]
    fn debug_redacts_secrets() {
        let debug = format!("{:?}", sample());
        assert!(!debug.contains("tok-very-secret"));
        assert!(!debug.contains("hdr-secret"));
        assert!(!debug.contains("path-token"));
        assert!(debug.contains("[redacted]"));
    }
}
