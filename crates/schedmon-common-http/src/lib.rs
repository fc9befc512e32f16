// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Shared HTTP utilities for schedmon.
//!
//! This crate provides:
//! - A pre-configured HTTP client with a consistent User-Agent and timeouts
//! - Bounded retry for transient failures (connection errors, 5xx)

mod client;
mod retry;

pub use client::{builder, new_client, user_agent, Timeouts};
pub use retry::{retry, RetryConfig, RetryableError};
