// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: files, environment, CLI, defaults.

use std::path::PathBuf;
use std::str::FromStr;

use schedmon_common_secret::load_secret_with;
use tracing::{debug, trace, warn};

use crate::layer::*;
use crate::paths::{self, PathsConfig};
use crate::ConfigError;

/// Prefix shared by every environment variable the loader reads.
pub const ENV_PREFIX: &str = "SCHEDULE_MONITOR_";
pub const API_TOKEN_ENV: &str = "SCHEDULE_MONITOR_API_TOKEN";

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	SystemFile = 20,
	UserFile = 30,
	WorkspaceFile = 40,
	/// A file passed with `--config`.
	ExplicitFile = 45,
	Environment = 50,
	Cli = 60,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	/// Name for logging
	fn name(&self) -> &'static str;

	/// Precedence level
	fn precedence(&self) -> Precedence;

	/// Load configuration layer from this source
	fn load(&self) -> Result<ConfigLayer, ConfigError>;

	/// Whether a load failure aborts configuration instead of being skipped.
	fn required(&self) -> bool {
		false
	}
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}
	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<ConfigLayer, ConfigError> {
		debug!("loading defaults");
		// Defaults are applied when building the runtime config
		Ok(ConfigLayer::default())
	}
}

/// File-based configuration source (TOML).
pub struct FileSource {
	path: PathBuf,
	precedence: Precedence,
	name: &'static str,
	required: bool,
}

impl FileSource {
	/// System config: /etc/schedmon/config.toml
	pub fn system(paths: &PathsConfig) -> Self {
		Self::custom(
			paths.system_config_file.clone(),
			Precedence::SystemFile,
			"system-config",
		)
	}

	/// User config: ~/.config/schedmon/config.toml
	pub fn user(paths: &PathsConfig) -> Self {
		Self::custom(
			paths.user_config_file.clone(),
			Precedence::UserFile,
			"user-config",
		)
	}

	/// Workspace config: .schedmon/config.toml
	pub fn workspace() -> Result<Self, ConfigError> {
		Ok(Self::custom(
			paths::workspace_config_path()?,
			Precedence::WorkspaceFile,
			"workspace-config",
		))
	}

	/// A file the user asked for by name. It must exist and parse.
	pub fn explicit(path: PathBuf) -> Self {
		Self {
			required: true,
			..Self::custom(path, Precedence::ExplicitFile, "explicit-config")
		}
	}

	/// Custom file path with specified precedence
	pub fn custom(path: PathBuf, precedence: Precedence, name: &'static str) -> Self {
		Self {
			path,
			precedence,
			name,
			required: false,
		}
	}
}

impl ConfigSource for FileSource {
	fn name(&self) -> &'static str {
		self.name
	}
	fn precedence(&self) -> Precedence {
		self.precedence
	}
	fn required(&self) -> bool {
		self.required
	}

	fn load(&self) -> Result<ConfigLayer, ConfigError> {
		if !self.path.exists() {
			if self.required {
				return Err(ConfigError::FileNotFound(self.path.clone()));
			}
			debug!(path = %self.path.display(), source = self.name, "config file not found, skipping");
			return Ok(ConfigLayer::default());
		}

		debug!(path = %self.path.display(), source = self.name, "loading config file");

		let content = std::fs::read_to_string(&self.path)?;
		let layer: ConfigLayer = toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
			path: self.path.clone(),
			source: e,
		})?;

		trace!(source = self.name, "parsed config layer");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: `SCHEDULE_MONITOR_<FIELD>`. The token may instead be read
/// from the file named by `SCHEDULE_MONITOR_API_TOKEN_FILE`.
#[derive(Debug, Default)]
pub struct EnvSource {
	vars: Option<Vec<(String, String)>>,
}

impl EnvSource {
	/// Reads the process environment.
	pub fn new() -> Self {
		Self::default()
	}

	/// Reads a fixed set of variables instead of the process environment.
	pub fn from_vars<I, K, V>(vars: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		Self {
			vars: Some(
				vars
					.into_iter()
					.map(|(k, v)| (k.into(), v.into()))
					.collect(),
			),
		}
	}

	fn vars(&self) -> Vec<(String, String)> {
		match &self.vars {
			Some(vars) => vars.clone(),
			None => std::env::vars().collect(),
		}
	}

	fn lookup(&self, key: &str) -> Option<String> {
		match &self.vars {
			Some(vars) => vars
				.iter()
				.rev()
				.find(|(k, _)| k == key)
				.map(|(_, v)| v.clone()),
			None => std::env::var(key).ok(),
		}
	}
}

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}
	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}
	fn required(&self) -> bool {
		// An unreadable token file must not silently fall back to no token.
		true
	}

	fn load(&self) -> Result<ConfigLayer, ConfigError> {
		debug!("loading environment variables");
		let mut layer = ConfigLayer::default();

		if let Some(token) = load_secret_with(API_TOKEN_ENV, |key| self.lookup(key))? {
			trace!("loaded API token from environment");
			layer.api_token = Some(token);
		}

		for (key, value) in self.vars() {
			let Some(field) = key.strip_prefix(ENV_PREFIX) else {
				continue;
			};

			let value = value.trim().to_string();
			if value.is_empty() {
				continue;
			}

			trace!(key = %key, "processing env var");

			match field {
				"API_URL" => layer.api_url = Some(value),
				"TIMEOUT" => layer.timeout = parse(&key, &value),
				"CONNECT_TIMEOUT" => layer.connect_timeout = parse(&key, &value),
				"RETRY_COUNT" => layer.retry_count = parse(&key, &value),
				"RETRY_DELAY" => layer.retry_delay = parse(&key, &value),
				"DEFAULT_GRACE" => layer.default_grace_period = parse(&key, &value),
				"IGNORE_PATTERNS" => {
					layer.ignore_patterns = Some(
						value
							.split(',')
							.map(str::trim)
							.filter(|p| !p.is_empty())
							.map(String::from)
							.collect(),
					);
				}
				"USE_QUEUE" => layer.use_queue = parse_bool(&key, &value),
				"QUEUE" => layer.heartbeat_queue = Some(value),
				"INTERPRETER" => layer.interpreter = Some(value),
				"ENTRY_POINT" => layer.entry_point = Some(value),
				"LOG_LEVEL" => {
					layer
						.logging
						.get_or_insert_with(LoggingLayer::default)
						.level = Some(value);
				}
				"LOG_FORMAT" => {
					layer
						.logging
						.get_or_insert_with(LoggingLayer::default)
						.format = Some(value);
				}
				_ => {
					// API_TOKEN, API_TOKEN_FILE or unknown
				}
			}
		}

		Ok(layer)
	}
}

fn parse<T: FromStr>(key: &str, value: &str) -> Option<T> {
	match value.parse() {
		Ok(v) => Some(v),
		Err(_) => {
			warn!(key, value, "ignoring unparseable environment variable");
			None
		}
	}
}

fn parse_bool(key: &str, value: &str) -> Option<bool> {
	match value.to_ascii_lowercase().as_str() {
		"1" | "true" | "yes" | "on" => Some(true),
		"0" | "false" | "no" | "off" => Some(false),
		_ => {
			warn!(key, value, "ignoring unparseable environment variable");
			None
		}
	}
}

/// CLI override source.
pub struct CliSource {
	overrides: CliOverrides,
}

/// CLI argument overrides.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
	pub api_url: Option<String>,
	pub use_queue: Option<bool>,
	pub log_level: Option<String>,
	pub log_format: Option<String>,
	pub config_file: Option<PathBuf>,
}

impl CliSource {
	pub fn new(overrides: CliOverrides) -> Self {
		Self { overrides }
	}
}

impl ConfigSource for CliSource {
	fn name(&self) -> &'static str {
		"cli"
	}
	fn precedence(&self) -> Precedence {
		Precedence::Cli
	}

	fn load(&self) -> Result<ConfigLayer, ConfigError> {
		debug!("loading CLI overrides");
		let mut layer = ConfigLayer {
			api_url: self.overrides.api_url.clone(),
			use_queue: self.overrides.use_queue,
			..Default::default()
		};

		if let Some(ref level) = self.overrides.log_level {
			layer
				.logging
				.get_or_insert_with(LoggingLayer::default)
				.level = Some(level.clone());
		}

		if let Some(ref format) = self.overrides.log_format {
			layer
				.logging
				.get_or_insert_with(LoggingLayer::default)
				.format = Some(format.clone());
		}

		Ok(layer)
	}
}
