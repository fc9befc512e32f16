// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Shared HTTP client with consistent User-Agent header and timeouts.

use reqwest::{Client, ClientBuilder};
use std::time::Duration;

/// Connect and overall request timeouts applied to every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
	/// Time allowed to establish the TCP/TLS connection.
	pub connect: Duration,
	/// Time allowed for the whole request once connected.
	pub request: Duration,
}

impl Default for Timeouts {
	fn default() -> Self {
		Self {
			connect: Duration::from_secs(2),
			request: Duration::from_secs(5),
		}
	}
}

/// Creates a new HTTP client builder with the schedmon User-Agent and the
/// given timeouts.
///
/// # Example
/// ```ignore
/// let client = schedmon_common_http::builder(Timeouts::default())
///     .https_only(true)
///     .build()?;
/// ```
pub fn builder(timeouts: Timeouts) -> ClientBuilder {
	Client::builder()
		.user_agent(user_agent())
		.connect_timeout(timeouts.connect)
		.timeout(timeouts.request)
}

/// Creates a client with the given timeouts.
pub fn new_client(timeouts: Timeouts) -> reqwest::Result<Client> {
	builder(timeouts).build()
}

/// Returns the schedmon User-Agent string.
///
/// Format: `schedmon/{version}`
pub fn user_agent() -> String {
	format!("schedmon/{}", env!("CARGO_PKG_VERSION"))
}
