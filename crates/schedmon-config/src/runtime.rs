// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Runtime configuration types with resolved defaults.

use schedmon_common_secret::SecretString;
use schedmon_core::{
	CoreError, EligibilityFilter, IdentityResolver, IgnorePatterns, JobAdapter, Overrides,
	DEFAULT_GRACE_MINUTES,
};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::layer::*;
use crate::paths::PathsConfig;
use crate::ConfigError;

pub const DEFAULT_API_URL: &str = "https://your-monitor-app.pages.dev";
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 2;
pub const DEFAULT_RETRY_COUNT: u32 = 3;
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 3;
pub const DEFAULT_HEARTBEAT_QUEUE: &str = "default";
pub const DEFAULT_INTERPRETER: &str = "php";
pub const DEFAULT_ENTRY_POINT: &str = "artisan";
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// The final configuration for schedmon.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
	pub api_url: String,
	pub api_token: Option<SecretString>,
	pub timeout: Duration,
	pub connect_timeout: Duration,
	/// Total attempts per request, including the first.
	pub retry_count: u32,
	pub retry_delay: Duration,
	/// Minutes.
	pub default_grace_period: u32,
	pub ignore_patterns: Vec<String>,
	pub use_queue: bool,
	pub heartbeat_queue: String,
	pub interpreter: String,
	pub entry_point: String,
	pub overrides: Overrides,
	pub logging: LoggingConfig,

	/// Resolved config file paths
	pub paths: PathsConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
	/// `EnvFilter` directive, e.g. `info` or `schedmon=debug`.
	pub level: String,
	pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
	#[default]
	Pretty,
	Compact,
	Json,
}

impl FromStr for LogFormat {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"pretty" => Ok(Self::Pretty),
			"compact" => Ok(Self::Compact),
			"json" => Ok(Self::Json),
			other => Err(ConfigError::invalid_value(
				"logging.format",
				format!("unknown format '{other}', expected pretty, compact or json"),
			)),
		}
	}
}

impl fmt::Display for LogFormat {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Pretty => write!(f, "pretty"),
			Self::Compact => write!(f, "compact"),
			Self::Json => write!(f, "json"),
		}
	}
}

impl Default for LoggingConfig {
	fn default() -> Self {
		Self {
			level: DEFAULT_LOG_LEVEL.to_string(),
			format: LogFormat::default(),
		}
	}
}

impl Default for MonitorConfig {
	fn default() -> Self {
		Self {
			api_url: DEFAULT_API_URL.to_string(),
			api_token: None,
			timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
			connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
			retry_count: DEFAULT_RETRY_COUNT,
			retry_delay: Duration::from_secs(DEFAULT_RETRY_DELAY_SECS),
			default_grace_period: DEFAULT_GRACE_MINUTES,
			ignore_patterns: Vec::new(),
			use_queue: true,
			heartbeat_queue: DEFAULT_HEARTBEAT_QUEUE.to_string(),
			interpreter: DEFAULT_INTERPRETER.to_string(),
			entry_point: DEFAULT_ENTRY_POINT.to_string(),
			overrides: Overrides::default(),
			logging: LoggingConfig::default(),
			paths: PathsConfig::default(),
		}
	}
}

impl MonitorConfig {
	/// Build runtime config from a merged layer, filling in defaults.
	pub fn from_layer(layer: ConfigLayer, paths: PathsConfig) -> Result<Self, ConfigError> {
		let defaults = Self::default();
		let logging = layer.logging.unwrap_or_default();

		Ok(Self {
			api_url: layer
				.api_url
				.map(|url| url.trim().trim_end_matches('/').to_string())
				.unwrap_or(defaults.api_url),
			api_token: layer.api_token,
			timeout: layer
				.timeout
				.map(Duration::from_secs)
				.unwrap_or(defaults.timeout),
			connect_timeout: layer
				.connect_timeout
				.map(Duration::from_secs)
				.unwrap_or(defaults.connect_timeout),
			retry_count: layer.retry_count.unwrap_or(defaults.retry_count),
			retry_delay: layer
				.retry_delay
				.map(Duration::from_secs)
				.unwrap_or(defaults.retry_delay),
			default_grace_period: layer
				.default_grace_period
				.unwrap_or(defaults.default_grace_period),
			ignore_patterns: layer.ignore_patterns.unwrap_or_default(),
			use_queue: layer.use_queue.unwrap_or(defaults.use_queue),
			heartbeat_queue: layer.heartbeat_queue.unwrap_or(defaults.heartbeat_queue),
			interpreter: layer.interpreter.unwrap_or(defaults.interpreter),
			entry_point: layer.entry_point.unwrap_or(defaults.entry_point),
			overrides: layer
				.overrides
				.map(|entries| entries.into_iter().collect())
				.unwrap_or_default(),
			logging: LoggingConfig {
				level: logging.level.unwrap_or(defaults.logging.level),
				format: match logging.format {
					Some(format) => format.parse()?,
					None => defaults.logging.format,
				},
			},
			paths,
		})
	}

	pub fn identity_resolver(&self) -> Result<IdentityResolver, ConfigError> {
		IdentityResolver::new(&self.interpreter, &self.entry_point).map_err(|e| match e {
			CoreError::InvalidResolver { field, message } => ConfigError::invalid_value(field, message),
			other => ConfigError::invalid_value("interpreter", other.to_string()),
		})
	}

	/// Adapter carrying the configured grace default and per-job overrides.
	pub fn job_adapter(&self) -> Result<JobAdapter, ConfigError> {
		Ok(JobAdapter::new(self.identity_resolver()?)
			.with_default_grace_minutes(self.default_grace_period)
			.with_overrides(self.overrides.clone()))
	}

	pub fn eligibility_filter(&self) -> Result<EligibilityFilter, ConfigError> {
		Ok(EligibilityFilter::new(
			IgnorePatterns::compile(&self.ignore_patterns),
			self.identity_resolver()?,
		))
	}

	/// Whether a token is present and not blank.
	pub fn has_api_token(&self) -> bool {
		self
			.api_token
			.as_ref()
			.is_some_and(|token| !token.is_blank())
	}
}
