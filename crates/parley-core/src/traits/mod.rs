// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions.
//!
//! All adapters use `#[async_trait]` for dynamic dispatch compatibility.

pub mod config_store;
pub mod provider;
pub mod storage;

pub use config_store::ProviderConfigStore;
pub use provider::{ProviderClient, SyncableProvider};
pub use storage::MessageStore;
