// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway for Parley.
//!
//! Exposes the provider webhook endpoint, the web chat widget endpoints, and
//! the bearer-authenticated management API on top of a
//! [`parley_engine::Engine`].

pub mod auth;
pub mod error;
pub mod handlers;
pub mod server;

pub use auth::AuthConfig;
pub use error::{ApiError, ErrorResponse, status_for};
pub use server::{GatewayState, ServerConfig, router, start_server};
