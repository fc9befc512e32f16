// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Partial configuration layer for merging from multiple sources.

use schedmon_common_secret::SecretString;
use schedmon_core::TaskOverride;
use serde::Deserialize;
use std::collections::HashMap;

/// Partial configuration layer - all fields are Option for merging.
///
/// Durations are whole seconds, grace periods whole minutes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigLayer {
	#[serde(default)]
	pub api_url: Option<String>,
	#[serde(default)]
	pub api_token: Option<SecretString>,
	#[serde(default)]
	pub timeout: Option<u64>,
	#[serde(default)]
	pub connect_timeout: Option<u64>,
	#[serde(default)]
	pub retry_count: Option<u32>,
	#[serde(default)]
	pub retry_delay: Option<u64>,
	#[serde(default)]
	pub default_grace_period: Option<u32>,
	#[serde(default)]
	pub ignore_patterns: Option<Vec<String>>,
	#[serde(default)]
	pub use_queue: Option<bool>,
	#[serde(default)]
	pub heartbeat_queue: Option<String>,
	#[serde(default)]
	pub interpreter: Option<String>,
	#[serde(default)]
	pub entry_point: Option<String>,
	/// Per-job settings keyed by canonical job name.
	#[serde(default)]
	pub overrides: Option<HashMap<String, TaskOverride>>,
	#[serde(default)]
	pub logging: Option<LoggingLayer>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingLayer {
	#[serde(default)]
	pub level: Option<String>,
	#[serde(default)]
	pub format: Option<String>,
}

impl ConfigLayer {
	/// Merge another layer into this one. Other layer takes precedence.
	///
	/// `ignore_patterns` is replaced as a whole; `overrides` merge per job.
	pub fn merge(&mut self, other: ConfigLayer) {
		replace(&mut self.api_url, other.api_url);
		replace(&mut self.api_token, other.api_token);
		replace(&mut self.timeout, other.timeout);
		replace(&mut self.connect_timeout, other.connect_timeout);
		replace(&mut self.retry_count, other.retry_count);
		replace(&mut self.retry_delay, other.retry_delay);
		replace(&mut self.default_grace_period, other.default_grace_period);
		replace(&mut self.ignore_patterns, other.ignore_patterns);
		replace(&mut self.use_queue, other.use_queue);
		replace(&mut self.heartbeat_queue, other.heartbeat_queue);
		replace(&mut self.interpreter, other.interpreter);
		replace(&mut self.entry_point, other.entry_point);
		merge_option(&mut self.overrides, other.overrides, merge_overrides);
		merge_option(&mut self.logging, other.logging, LoggingLayer::merge);
	}
}

impl LoggingLayer {
	fn merge(&mut self, other: LoggingLayer) {
		replace(&mut self.level, other.level);
		replace(&mut self.format, other.format);
	}
}

fn replace<T>(target: &mut Option<T>, source: Option<T>) {
	if source.is_some() {
		*target = source;
	}
}

fn merge_option<T, F>(target: &mut Option<T>, source: Option<T>, merge_fn: F)
where
	F: FnOnce(&mut T, T),
{
	match (target.as_mut(), source) {
		(Some(t), Some(s)) => merge_fn(t, s),
		(None, Some(s)) => *target = Some(s),
		_ => {}
	}
}

fn merge_overrides(target: &mut HashMap<String, TaskOverride>, source: HashMap<String, TaskOverride>) {
	for (name, entry) in source {
		let existing = target.entry(name).or_default();
		replace(&mut existing.monitored, entry.monitored);
		replace(&mut existing.grace_minutes, entry.grace_minutes);
	}
}
