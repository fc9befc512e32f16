// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the schedmon SDK.

use schedmon_common_http::RetryableError;
use schedmon_core::{CoreError, IntrospectionError};
use thiserror::Error;

/// Result type for schedmon SDK operations.
pub type Result<T> = std::result::Result<T, MonitorError>;

/// Errors that can occur when talking to the monitoring service.
#[derive(Debug, Error)]
pub enum MonitorError {
	/// Missing or blank API token.
	#[error("invalid or missing API token")]
	InvalidAuthToken,

	/// Missing or malformed base URL.
	#[error("invalid base URL: {0}")]
	InvalidBaseUrl(String),

	/// Connection failure, DNS failure or timeout.
	#[error("HTTP request failed: {0}")]
	Transport(#[from] reqwest::Error),

	/// The service answered 5xx.
	#[error("server error (HTTP {status}): {body}")]
	Server { status: u16, body: String },

	/// The service rejected the request.
	#[error("request rejected (HTTP {status}): {body}")]
	Client { status: u16, body: String },

	/// The response body was not the JSON we expected.
	#[error("failed to decode response: {0}")]
	Decode(#[from] serde_json::Error),

	/// A heartbeat could not be handed to the background queue.
	#[error("failed to enqueue heartbeat on queue {queue}: {message}")]
	Queue { queue: String, message: String },

	/// One scheduled task could not be read.
	#[error(transparent)]
	Introspection(#[from] IntrospectionError),

	#[error(transparent)]
	Core(CoreError),
}

impl MonitorError {
	/// HTTP status carried by the error, if the service answered at all.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Server { status, .. } | Self::Client { status, .. } => Some(*status),
			Self::Transport(err) => err.status().map(|s| s.as_u16()),
			_ => None,
		}
	}

	/// Response body carried by the error.
	pub fn body(&self) -> Option<&str> {
		match self {
			Self::Server { body, .. } | Self::Client { body, .. } => Some(body),
			_ => None,
		}
	}
}

impl From<CoreError> for MonitorError {
	fn from(err: CoreError) -> Self {
		match err {
			CoreError::Introspection(err) => Self::Introspection(err),
			other => Self::Core(other),
		}
	}
}

impl RetryableError for MonitorError {
	fn is_retryable(&self) -> bool {
		match self {
			Self::Transport(err) => err.is_retryable(),
			Self::Server { .. } => true,
			_ => false,
		}
	}
}
