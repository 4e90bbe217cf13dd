// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Parley messaging service.
//!
//! This crate provides the canonical conversation and message types, the
//! error type, and the trait seams (provider clients, durable store,
//! configuration source) that every other Parley crate builds on.

pub mod error;
pub mod provider_config;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::{AuthFailure, ParleyError};
pub use provider_config::{HeaderTemplate, ProviderConfig, ProviderCredentials, RateLimit};
pub use types::{
    Conversation, ConversationKey, Direction, HealthStatus, Message, MessageStatus, Source,
};

pub use traits::{MessageStore, ProviderClient, ProviderConfigStore, SyncableProvider};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_trait_seams_are_exported() {
        fn _assert_provider<T: ProviderClient>() {}
        fn _assert_syncable<T: SyncableProvider>() {}
        fn _assert_store<T: MessageStore>() {}
        fn _assert_config_store<T: ProviderConfigStore>() {}
    }

    #[test]
    fn trait_objects_are_usable() {
        fn _dyn_provider(_: &dyn ProviderClient) {}
        fn _dyn_store(_: std::sync::Arc<dyn MessageStore>) {}
        fn _dyn_config(_: std::sync::Arc<dyn ProviderConfigStore>) {}
    }
}
