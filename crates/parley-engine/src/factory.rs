// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider factory: tenant configuration in, provider client out.
//!
//! Clients are cheap to build and are constructed on every call, so a
//! configuration change takes effect on the next request.

use std::collections::HashMap;
use std::sync::Arc;

use parley_core::{ParleyError, ProviderClient, ProviderConfig, ProviderConfigStore};
use parley_twilio::TwilioProvider;
use parley_whatsapp::WhatsAppProvider;
use tracing::{debug, warn};

/// Builds a client from a tenant's configuration.
pub type ProviderConstructor =
    Arc<dyn Fn(ProviderConfig) -> Result<Arc<dyn ProviderClient>, ParleyError> + Send + Sync>;

/// Fallback when a tenant has no configuration to read a country code from.
const FALLBACK_COUNTRY_CODE: &str = "1";

/// Lowercase, trim, and fold `-` and spaces into `_`.
pub fn normalize_provider_name(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == '-' || c.is_whitespace() { '_' } else { c })
        .collect()
}

/// Registry of provider constructors keyed by normalized name and alias.
pub struct ProviderFactory {
    configs: Arc<dyn ProviderConfigStore>,
    constructors: HashMap<String, ProviderConstructor>,
    aliases: HashMap<String, String>,
}

impl ProviderFactory {
    /// An empty registry. Use [`ProviderFactory::with_builtin_providers`] for
    /// the shipped clients.
    pub fn new(configs: Arc<dyn ProviderConfigStore>) -> Self {
        Self {
            configs,
            constructors: HashMap::new(),
            aliases: HashMap::new(),
        }
    }

    /// Registry with the Twilio and WhatsApp Cloud clients.
    pub fn with_builtin_providers(configs: Arc<dyn ProviderConfigStore>) -> Self {
        let mut factory = Self::new(configs);
        factory.register("twilio", |config| {
            Ok(Arc::new(TwilioProvider::new(config)?) as Arc<dyn ProviderClient>)
        });
        factory.alias("twilio_sms", "twilio");
        factory.alias("sms", "twilio");

        factory.register("whatsapp", |config| {
            Ok(Arc::new(WhatsAppProvider::new(config)?) as Arc<dyn ProviderClient>)
        });
        factory.alias("whatsapp_cloud", "whatsapp");
        factory.alias("wa", "whatsapp");
        factory
    }

    /// Register a constructor under `name` (normalized).
    pub fn register<F>(&mut self, name: &str, constructor: F)
    where
        F: Fn(ProviderConfig) -> Result<Arc<dyn ProviderClient>, ParleyError>
            + Send
            + Sync
            + 'static,
    {
        self.constructors
            .insert(normalize_provider_name(name), Arc::new(constructor));
    }

    /// Make `alias` resolve to the registered provider `name`.
    pub fn alias(&mut self, alias: &str, name: &str) {
        self.aliases
            .insert(normalize_provider_name(alias), normalize_provider_name(name));
    }

    /// The registered name `raw` refers to, if any.
    pub fn canonical_name(&self, raw: &str) -> Option<String> {
        let normalized = normalize_provider_name(raw);
        let name = self.aliases.get(&normalized).cloned().unwrap_or(normalized);
        self.constructors.contains_key(&name).then_some(name)
    }

    /// Names of all registered providers, sorted.
    pub fn provider_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.constructors.keys().cloned().collect();
        names.sort();
        names
    }

    /// The tenant's active configuration, or a not-configured error.
    pub async fn active_config(&self, tenant_id: i64) -> Result<ProviderConfig, ParleyError> {
        match self.configs.active_config(tenant_id).await? {
            Some(config) if config.active => Ok(config),
            Some(_) => Err(ParleyError::Configuration(format!(
                "provider configuration for tenant {tenant_id} is inactive"
            ))),
            None => Err(ParleyError::Configuration(format!(
                "no provider configured for tenant {tenant_id}"
            ))),
        }
    }

    /// Country code for bare national numbers; falls back to `1`.
    pub async fn default_country_code(&self, tenant_id: i64) -> String {
        match self.configs.active_config(tenant_id).await {
            Ok(Some(config)) => config.default_country_code,
            _ => FALLBACK_COUNTRY_CODE.to_string(),
        }
    }

    /// Build the client for the tenant's active configuration.
    pub async fn resolve(&self, tenant_id: i64) -> Result<Arc<dyn ProviderClient>, ParleyError> {
        let config = self.active_config(tenant_id).await?;
        self.build(config)
    }

    /// Like [`resolve`](Self::resolve), but the provider named in the webhook
    /// path must be the one the tenant is configured for.
    pub async fn resolve_for_webhook(
        &self,
        tenant_id: i64,
        provider_segment: &str,
    ) -> Result<Arc<dyn ProviderClient>, ParleyError> {
        let config = self.active_config(tenant_id).await?;
        let requested = self.canonical_name(provider_segment);
        let configured = self.canonical_name(&config.provider);
        if requested.is_none() || requested != configured {
            debug!(
                tenant_id,
                provider = provider_segment,
                "webhook provider does not match tenant configuration"
            );
            return Err(ParleyError::Configuration(format!(
                "tenant {tenant_id} has no active `{provider_segment}` configuration"
            )));
        }
        self.build(config)
    }

    fn build(&self, config: ProviderConfig) -> Result<Arc<dyn ProviderClient>, ParleyError> {
        let Some(name) = self.canonical_name(&config.provider) else {
            warn!(
                tenant_id = config.tenant_id,
                provider = %config.provider,
                "tenant configured with an unknown provider"
            );
            return Err(ParleyError::UnknownProvider {
                name: config.provider,
            });
        };
        match self.constructors.get(&name) {
            Some(constructor) => constructor(config),
            None => Err(ParleyError::UnknownProvider { name }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_store::StaticConfigStore;
    use parley_test_utils::{MockProvider, mock_config};

    fn factory_with(config: ProviderConfig) -> ProviderFactory {
        let store = StaticConfigStore::new().with(config);
        let mut factory = ProviderFactory::with_builtin_providers(Arc::new(store));
        factory.register("mock", |config| {
            Ok(Arc::new(MockProvider::new(config)) as Arc<dyn ProviderClient>)
        });
        factory.alias("mock-sms", "mock");
        factory
    }

    #[test]
    fn names_are_normalized() {
        assert_eq!(normalize_provider_name("  WhatsApp-Cloud "), "whatsapp_cloud");
        assert_eq!(normalize_provider_name("Twilio SMS"), "twilio_sms");
    }

    #[tokio::test]
    async fn resolves_aliases_case_insensitively() {
        let factory = factory_with(mock_config(1, "Mock SMS"));
        let client = factory.resolve(1).await.unwrap();
        assert_eq!(client.name(), "mock");
        assert_eq!(factory.canonical_name("SMS").as_deref(), Some("twilio"));
        assert_eq!(factory.canonical_name("WA").as_deref(), Some("whatsapp"));
    }

    #[tokio::test]
    async fn missing_and_inactive_configs_are_not_configured() {
        let mut inactive = mock_config(2, "mock");
        inactive.active = false;
        let factory = factory_with(inactive);

        assert!(matches!(
            factory.resolve(2).await,
            Err(ParleyError::Configuration(_))
        ));
        assert!(matches!(
            factory.resolve(3).await,
            Err(ParleyError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn unknown_provider_is_rejected() {
        let factory = factory_with(mock_config(4, "carrier-pigeon"));
        match factory.resolve(4).await {
            Err(ParleyError::UnknownProvider { name }) => assert_eq!(name, "carrier-pigeon"),
            Err(other) => panic!("unexpected error {other}"),
            Ok(_) => panic!("unknown provider resolved"),
        }
    }

    #[tokio::test]
    async fn webhook_segment_must_match_configuration() {
        let factory = factory_with(mock_config(5, "mock"));
        assert!(factory.resolve_for_webhook(5, "mock").await.is_ok());
        assert!(factory.resolve_for_webhook(5, "MOCK-SMS").await.is_ok());
        assert!(matches!(
            factory.resolve_for_webhook(5, "twilio").await,
            Err(ParleyError::Configuration(_))
        ));
        assert!(matches!(
            factory.resolve_for_webhook(5, "nope").await,
            Err(ParleyError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn builtin_clients_are_constructed() {
        let mut config = mock_config(6, "twilio");
        config.credentials.account_id = "AC1".into();
        config.credentials.auth_token = "t".into();
        let factory = factory_with(config);
        assert_eq!(factory.resolve(6).await.unwrap().name(), "twilio");
        assert_eq!(
            factory.provider_names(),
            vec!["mock".to_string(), "twilio".to_string(), "whatsapp".to_string()]
        );
    }
}
