// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Config file locations.

use std::path::PathBuf;

use crate::ConfigError;

pub const SYSTEM_CONFIG_FILE: &str = "/etc/schedmon/config.toml";
pub const WORKSPACE_CONFIG_FILE: &str = ".schedmon/config.toml";

/// Resolved config file paths.
#[derive(Debug, Clone)]
pub struct PathsConfig {
	/// User config file: ~/.config/schedmon/config.toml
	pub user_config_file: PathBuf,
	/// System config file: /etc/schedmon/config.toml
	pub system_config_file: PathBuf,
}

impl Default for PathsConfig {
	fn default() -> Self {
		Self {
			user_config_file: PathBuf::from("~/.config/schedmon/config.toml"),
			system_config_file: PathBuf::from(SYSTEM_CONFIG_FILE),
		}
	}
}

/// Resolve paths, honouring `XDG_CONFIG_HOME` when set.
pub fn resolve_paths() -> Result<PathsConfig, ConfigError> {
	let home = dirs::home_dir().ok_or(ConfigError::HomeDirNotFound)?;

	let config_home = std::env::var_os("XDG_CONFIG_HOME")
		.map(PathBuf::from)
		.unwrap_or_else(|| home.join(".config"));

	tracing::debug!(config_home = %config_home.display(), "resolved config home");

	Ok(PathsConfig {
		user_config_file: config_home.join("schedmon/config.toml"),
		system_config_file: PathBuf::from(SYSTEM_CONFIG_FILE),
	})
}

/// Workspace config file path relative to the current directory.
pub fn workspace_config_path() -> Result<PathBuf, ConfigError> {
	let cwd = std::env::current_dir()?;
	Ok(cwd.join(WORKSPACE_CONFIG_FILE))
}
