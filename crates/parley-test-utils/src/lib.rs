// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Parley integration tests.
//!
//! Provides a scriptable provider client and a harness that assembles the
//! engine over temp storage, for fast deterministic tests without network
//! access.
//!
//! # Components
//!
//! - [`MockProvider`] - provider client with scripted sends, sync data and health
//! - [`TestHarness`] - engine, store and mock wired together

pub mod harness;
pub mod mock_provider;

pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_provider::{
    MOCK_BUSINESS_ADDRESS, MOCK_PROVIDER, MockProvider, inbound_text, mock_config, webhook_body,
};
