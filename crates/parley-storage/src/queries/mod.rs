// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules, one per table.

pub mod blacklist;
pub mod conversations;
pub mod messages;
pub mod webhook_events;
