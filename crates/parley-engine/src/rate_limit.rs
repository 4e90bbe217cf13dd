// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-tenant outbound rate limiting.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use dashmap::DashMap;
use parley_core::{ParleyError, RateLimit};
use tokio::time::Instant;
use tracing::debug;

struct Window {
    started_at: Instant,
    count: u32,
}

/// Fixed-length window limiter keyed by tenant.
///
/// Each tenant has its own lock; tenants never contend with each other.
#[derive(Default)]
pub struct RateLimiter {
    windows: DashMap<i64, Arc<Mutex<Window>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one send slot for `tenant_id`, or fail with `RateLimited`.
    pub fn check(&self, tenant_id: i64, limit: &RateLimit) -> Result<(), ParleyError> {
        let window = Arc::clone(&self.windows.entry(tenant_id).or_insert_with(|| {
            Arc::new(Mutex::new(Window {
                started_at: Instant::now(),
                count: 0,
            }))
        }));

        let mut window = window.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        let length = Duration::from_secs(limit.window_minutes.saturating_mul(60));
        if now.duration_since(window.started_at) >= length {
            window.started_at = now;
            window.count = 0;
        }

        if window.count >= limit.max_messages {
            debug!(tenant_id, count = window.count, "rate limit reached");
            return Err(ParleyError::RateLimited {
                tenant_id,
                window_minutes: limit.window_minutes,
                max_messages: limit.max_messages,
            });
        }
        window.count += 1;
        Ok(())
    }

    /// Sends left in the tenant's current window.
    pub fn remaining(&self, tenant_id: i64, limit: &RateLimit) -> u32 {
        let Some(window) = self.windows.get(&tenant_id).map(|w| Arc::clone(&w)) else {
            return limit.max_messages;
        };
        let window = window.lock().unwrap_or_else(PoisonError::into_inner);
        let length = Duration::from_secs(limit.window_minutes.saturating_mul(60));
        if Instant::now().duration_since(window.started_at) >= length {
            limit.max_messages
        } else {
            limit.max_messages.saturating_sub(window.count)
        }
    }
}
