// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration validation rules.

use tracing::warn;

use crate::runtime::{MonitorConfig, DEFAULT_API_URL};
use crate::ConfigError;

/// Validate the configuration.
///
/// A missing token only warns; commands that never reach the service still
/// work without one.
pub fn validate_config(config: &MonitorConfig) -> Result<(), ConfigError> {
	validate_api(config)?;
	validate_http(config)?;
	validate_heartbeats(config)?;
	config.identity_resolver()?;

	Ok(())
}

fn validate_api(config: &MonitorConfig) -> Result<(), ConfigError> {
	let url = config.api_url.as_str();
	if url.is_empty() {
		return Err(ConfigError::invalid_value("api_url", "api_url cannot be empty"));
	}
	if !(url.starts_with("http://") || url.starts_with("https://")) {
		return Err(ConfigError::invalid_value(
			"api_url",
			format!("'{url}' must start with http:// or https://"),
		));
	}
	if url == DEFAULT_API_URL {
		warn!(api_url = url, "api_url is still the placeholder default");
	}

	if !config.has_api_token() {
		warn!("api_token is not configured; requests to the service will be rejected");
	}

	Ok(())
}

fn validate_http(config: &MonitorConfig) -> Result<(), ConfigError> {
	if config.timeout.is_zero() {
		return Err(ConfigError::invalid_value("timeout", "must be at least 1 second"));
	}
	if config.connect_timeout.is_zero() {
		return Err(ConfigError::invalid_value(
			"connect_timeout",
			"must be at least 1 second",
		));
	}
	if config.retry_count == 0 {
		return Err(ConfigError::invalid_value(
			"retry_count",
			"must be at least 1 (the first attempt counts)",
		));
	}

	Ok(())
}

fn validate_heartbeats(config: &MonitorConfig) -> Result<(), ConfigError> {
	if config.heartbeat_queue.trim().is_empty() {
		return Err(ConfigError::invalid_value(
			"heartbeat_queue",
			"heartbeat_queue cannot be empty",
		));
	}

	for (index, pattern) in config.ignore_patterns.iter().enumerate() {
		if pattern.trim().is_empty() {
			warn!(index, "ignore_patterns contains an empty pattern");
		}
	}

	Ok(())
}
