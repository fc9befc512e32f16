// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Host-facing task model.
//!
//! Host schedulers expose very different job objects (shell commands, job
//! classes, closures). [`ScheduledTask`] is the narrow, fallible view the
//! adapter reads; every accessor may be unsupported or fail, and the adapter
//! treats both as "nothing here".

use serde::Deserialize;

use crate::adapter::KnownTypes;
use crate::error::{IntrospectionError, Result};

/// Reference to a job handler type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerRef {
	/// Handler referenced by its type name only.
	Named(String),
	/// Handler referenced through a constructed instance.
	Instance { type_name: String },
}

impl HandlerRef {
	pub fn type_name(&self) -> &str {
		match self {
			Self::Named(name) => name,
			Self::Instance { type_name } => type_name,
		}
	}
}

/// Reference to a callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackRef {
	/// Method bound to an object instance.
	Bound {
		type_name: String,
		method: Option<String>,
	},
	/// Free function referenced by name.
	Function(String),
	/// Anonymous closure; carries no identity.
	Closure,
}

/// A scheduled job as exposed by the host scheduler.
///
/// Only [`ScheduledTask::expression`] is required. Everything else defaults
/// to "not available".
pub trait ScheduledTask {
	/// Cron expression.
	fn expression(&self) -> std::result::Result<String, IntrospectionError>;

	/// Literal shell command, for command jobs.
	fn command(&self) -> std::result::Result<Option<String>, IntrospectionError> {
		Ok(None)
	}

	fn handler(&self) -> std::result::Result<Option<HandlerRef>, IntrospectionError> {
		Ok(None)
	}

	fn callback(&self) -> std::result::Result<Option<CallbackRef>, IntrospectionError> {
		Ok(None)
	}

	fn description(&self) -> std::result::Result<Option<String>, IntrospectionError> {
		Ok(None)
	}

	/// `Some(false)` when the host definition opted out of monitoring.
	fn monitoring_enabled(&self) -> std::result::Result<Option<bool>, IntrospectionError> {
		Ok(None)
	}

	fn grace_minutes(&self) -> std::result::Result<Option<u32>, IntrospectionError> {
		Ok(None)
	}

	/// Identity of the underlying host object for this process run, used to
	/// derive synthetic names for jobs with nothing else to go on.
	fn identity_key(&self) -> Option<u64> {
		None
	}
}

/// Callback section of a manifest entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CallbackEntry {
	/// Type of the bound object, when the callback is a method.
	#[serde(default)]
	pub target: Option<String>,
	#[serde(default)]
	pub method: Option<String>,
}

/// One entry of a [`Schedule`] manifest.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TaskDefinition {
	#[serde(default)]
	pub command: Option<String>,
	#[serde(default)]
	pub handler: Option<String>,
	#[serde(default)]
	pub callback: Option<CallbackEntry>,
	#[serde(default)]
	pub description: Option<String>,
	pub expression: String,
	#[serde(default)]
	pub monitored: Option<bool>,
	#[serde(default)]
	pub grace_minutes: Option<u32>,

	#[serde(skip)]
	position: u64,
}

impl TaskDefinition {
	pub fn command(command: impl Into<String>, expression: impl Into<String>) -> Self {
		Self {
			command: Some(command.into()),
			expression: expression.into(),
			..Self::default()
		}
	}

	pub fn handler(handler: impl Into<String>, expression: impl Into<String>) -> Self {
		Self {
			handler: Some(handler.into()),
			expression: expression.into(),
			..Self::default()
		}
	}

	pub fn callback(callback: CallbackEntry, expression: impl Into<String>) -> Self {
		Self {
			callback: Some(callback),
			expression: expression.into(),
			..Self::default()
		}
	}

	pub fn with_description(mut self, description: impl Into<String>) -> Self {
		self.description = Some(description.into());
		self
	}

	pub fn without_monitoring(mut self) -> Self {
		self.monitored = Some(false);
		self
	}

	pub fn with_grace_minutes(mut self, minutes: u32) -> Self {
		self.grace_minutes = Some(minutes);
		self
	}

	pub fn with_position(mut self, position: u64) -> Self {
		self.position = position;
		self
	}
}

impl ScheduledTask for TaskDefinition {
	fn expression(&self) -> std::result::Result<String, IntrospectionError> {
		Ok(self.expression.clone())
	}

	fn command(&self) -> std::result::Result<Option<String>, IntrospectionError> {
		Ok(self.command.clone().filter(|c| !c.trim().is_empty()))
	}

	fn handler(&self) -> std::result::Result<Option<HandlerRef>, IntrospectionError> {
		Ok(self
			.handler
			.as_ref()
			.filter(|h| !h.trim().is_empty())
			.map(|h| HandlerRef::Named(h.clone())))
	}

	fn callback(&self) -> std::result::Result<Option<CallbackRef>, IntrospectionError> {
		Ok(self.callback.as_ref().map(|entry| match (&entry.target, &entry.method) {
			(Some(target), method) => CallbackRef::Bound {
				type_name: target.clone(),
				method: method.clone(),
			},
			(None, Some(function)) => CallbackRef::Function(function.clone()),
			(None, None) => CallbackRef::Closure,
		}))
	}

	fn description(&self) -> std::result::Result<Option<String>, IntrospectionError> {
		Ok(self.description.clone())
	}

	fn monitoring_enabled(&self) -> std::result::Result<Option<bool>, IntrospectionError> {
		Ok(self.monitored)
	}

	fn grace_minutes(&self) -> std::result::Result<Option<u32>, IntrospectionError> {
		Ok(self.grace_minutes)
	}

	fn identity_key(&self) -> Option<u64> {
		Some(self.position)
	}
}

/// A TOML manifest of scheduled tasks, for hosts that describe their
/// schedule in a file.
///
/// ```toml
/// known_types = ["App\\Jobs\\PruneReports"]
///
/// [[tasks]]
/// command = "'/usr/bin/php8.2' 'artisan' emails:send"
/// expression = "*/5 * * * *"
///
/// [[tasks]]
/// handler = "App\\Jobs\\PruneReports"
/// expression = "0 3 * * *"
/// grace_minutes = 30
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Schedule {
	#[serde(default)]
	pub tasks: Vec<TaskDefinition>,
	/// Type names that exist in the host application, besides handlers.
	#[serde(default)]
	pub known_types: Vec<String>,
}

impl Schedule {
	pub fn from_toml_str(content: &str) -> Result<Self> {
		let mut schedule: Schedule = toml::from_str(content)?;
		for (position, task) in schedule.tasks.iter_mut().enumerate() {
			task.position = position as u64;
		}
		Ok(schedule)
	}

	/// Declared types plus every handler and callback target in the manifest.
	pub fn known_types(&self) -> KnownTypes {
		let handlers = self.tasks.iter().filter_map(|t| t.handler.clone());
		let targets = self
			.tasks
			.iter()
			.filter_map(|t| t.callback.as_ref().and_then(|c| c.target.clone()));

		KnownTypes::new(
			self
				.known_types
				.iter()
				.cloned()
				.chain(handlers)
				.chain(targets),
		)
	}
}
