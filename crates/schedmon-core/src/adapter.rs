// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Best-effort extraction of [`JobDescriptor`]s from host tasks.
//!
//! The name is taken from the first slot that yields one:
//!
//! 1. the literal shell command
//! 2. the handler's type name
//! 3. the type of the object a callback is bound to
//! 4. the description, when it names a type the host knows about
//! 5. a synthetic `scheduled-closure-<token>` name
//!
//! A slot that fails to read counts as empty. The failure is kept on the
//! [`Resolution`] and logged, and extraction moves on to the next slot.

use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

use crate::error::{IntrospectionError, Result};
use crate::identity::IdentityResolver;
use crate::payload::JobDescriptor;
use crate::task::{CallbackRef, ScheduledTask};

pub const DEFAULT_GRACE_MINUTES: u32 = 15;

const SYNTHETIC_PREFIX: &str = "scheduled-closure-";

/// Answers whether a type name exists in the host application.
pub trait TypeCatalog: Send + Sync {
	fn type_exists(&self, name: &str) -> bool;
}

/// A fixed set of known type names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnownTypes {
	names: HashSet<String>,
}

impl KnownTypes {
	pub fn new(names: impl IntoIterator<Item = String>) -> Self {
		Self {
			names: names.into_iter().filter(|n| !n.trim().is_empty()).collect(),
		}
	}

	pub fn len(&self) -> usize {
		self.names.len()
	}

	pub fn is_empty(&self) -> bool {
		self.names.is_empty()
	}
}

impl TypeCatalog for KnownTypes {
	fn type_exists(&self, name: &str) -> bool {
		self.names.contains(name)
	}
}

/// How a job's name was derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobShape {
	Command,
	Handler,
	Callback,
	Unknown,
}

impl fmt::Display for JobShape {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Command => write!(f, "command"),
			Self::Handler => write!(f, "handler"),
			Self::Callback => write!(f, "callback"),
			Self::Unknown => write!(f, "unknown"),
		}
	}
}

/// Per-job settings supplied outside the host task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOverride {
	#[serde(default)]
	pub monitored: Option<bool>,
	#[serde(default)]
	pub grace_minutes: Option<u32>,
}

/// Overrides keyed by canonical job name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Overrides {
	entries: HashMap<String, TaskOverride>,
}

impl Overrides {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&mut self, name: impl Into<String>, entry: TaskOverride) {
		self.entries.insert(name.into(), entry);
	}

	pub fn with(mut self, name: impl Into<String>, entry: TaskOverride) -> Self {
		self.insert(name, entry);
		self
	}

	pub fn get(&self, name: &str) -> Option<&TaskOverride> {
		self.entries.get(name)
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

impl FromIterator<(String, TaskOverride)> for Overrides {
	fn from_iter<I: IntoIterator<Item = (String, TaskOverride)>>(iter: I) -> Self {
		Self {
			entries: iter.into_iter().collect(),
		}
	}
}

/// Result of running the adapter over one task.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
	pub descriptor: JobDescriptor,
	/// Name before interpreter normalization.
	pub raw_name: String,
	pub shape: JobShape,
	/// Slots that failed to read. Never fatal.
	pub errors: Vec<IntrospectionError>,
}

impl Resolution {
	pub fn name(&self) -> &str {
		&self.descriptor.name
	}

	pub fn is_synthetic(&self) -> bool {
		self.descriptor.name.starts_with(SYNTHETIC_PREFIX)
	}
}

/// Diagnostic dump of what a task exposes.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaskProperties {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub command: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub handler: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub callback: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub expression: Option<String>,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	pub errors: Vec<String>,
}

/// Turns host tasks into [`JobDescriptor`]s.
#[derive(Clone)]
pub struct JobAdapter {
	resolver: IdentityResolver,
	default_grace_minutes: u32,
	overrides: Overrides,
	types: Arc<dyn TypeCatalog>,
}

impl fmt::Debug for JobAdapter {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("JobAdapter")
			.field("resolver", &self.resolver)
			.field("default_grace_minutes", &self.default_grace_minutes)
			.field("overrides", &self.overrides.len())
			.finish_non_exhaustive()
	}
}

impl Default for JobAdapter {
	fn default() -> Self {
		Self::new(IdentityResolver::default())
	}
}

impl JobAdapter {
	pub fn new(resolver: IdentityResolver) -> Self {
		Self {
			resolver,
			default_grace_minutes: DEFAULT_GRACE_MINUTES,
			overrides: Overrides::default(),
			types: Arc::new(KnownTypes::default()),
		}
	}

	pub fn with_default_grace_minutes(mut self, minutes: u32) -> Self {
		self.default_grace_minutes = minutes;
		self
	}

	pub fn with_overrides(mut self, overrides: Overrides) -> Self {
		self.overrides = overrides;
		self
	}

	pub fn with_type_catalog(mut self, types: Arc<dyn TypeCatalog>) -> Self {
		self.types = types;
		self
	}

	pub fn identity(&self) -> &IdentityResolver {
		&self.resolver
	}

	pub fn overrides(&self) -> &Overrides {
		&self.overrides
	}

	/// Extracts a descriptor from `task`.
	///
	/// Fails only when the schedule expression cannot be read.
	pub fn resolve<T: ScheduledTask + ?Sized>(&self, task: &T) -> Result<Resolution> {
		let expression = task.expression()?;
		let mut errors = Vec::new();

		let (raw_name, shape) = self.raw_name(task, &expression, &mut errors);
		let name = self.resolver.resolve_name(&raw_name);
		let entry = self.overrides.get(&name).copied().unwrap_or_default();

		let description = match record(task.description(), &mut errors).flatten() {
			Some(d) if !d.trim().is_empty() => Some(d),
			_ if shape == JobShape::Command && self.resolver.is_interpreter_command(&raw_name) => {
				Some(self.resolver.default_description(&name))
			}
			_ => None,
		};

		let monitored = match entry.monitored {
			Some(flag) => flag,
			None => record(task.monitoring_enabled(), &mut errors)
				.flatten()
				.unwrap_or(true),
		};

		let grace_minutes = match entry.grace_minutes {
			Some(minutes) => minutes,
			None => record(task.grace_minutes(), &mut errors)
				.flatten()
				.unwrap_or(self.default_grace_minutes),
		};

		for err in &errors {
			warn!(job = %name, slot = %err.slot, error = %err.message, "failed to read scheduled task");
		}
		debug!(job = %name, shape = %shape, monitored, grace_minutes, "resolved scheduled task");

		Ok(Resolution {
			descriptor: JobDescriptor {
				name,
				description,
				schedule_expression: expression,
				grace_minutes,
				monitored,
			},
			raw_name,
			shape,
			errors,
		})
	}

	/// Lists everything the task exposes, for verbose output.
	pub fn describe_task<T: ScheduledTask + ?Sized>(&self, task: &T) -> TaskProperties {
		let mut errors = Vec::new();

		let command = record(task.command(), &mut errors).flatten();
		let handler = record(task.handler(), &mut errors)
			.flatten()
			.map(|h| h.type_name().to_string());
		let callback = record(task.callback(), &mut errors)
			.flatten()
			.map(|c| match c {
				CallbackRef::Bound {
					type_name,
					method: Some(method),
				} => format!("bound to {type_name}::{method}"),
				CallbackRef::Bound { type_name, .. } => format!("bound to {type_name}"),
				CallbackRef::Function(name) => format!("function {name}"),
				CallbackRef::Closure => "closure".to_string(),
			});
		let description = record(task.description(), &mut errors).flatten();
		let expression = record(task.expression(), &mut errors);

		TaskProperties {
			command,
			handler,
			callback,
			description,
			expression,
			errors: errors.iter().map(ToString::to_string).collect(),
		}
	}

	fn raw_name<T: ScheduledTask + ?Sized>(
		&self,
		task: &T,
		expression: &str,
		errors: &mut Vec<IntrospectionError>,
	) -> (String, JobShape) {
		if let Some(command) = record(task.command(), errors).flatten() {
			if !command.trim().is_empty() {
				return (command, JobShape::Command);
			}
		}

		if let Some(handler) = record(task.handler(), errors).flatten() {
			let type_name = handler.type_name();
			if !type_name.is_empty() {
				return (type_name.to_string(), JobShape::Handler);
			}
		}

		let callback = record(task.callback(), errors).flatten();
		if let Some(CallbackRef::Bound { type_name, .. }) = &callback {
			if !type_name.is_empty() {
				return (type_name.clone(), JobShape::Callback);
			}
		}

		let description = match task.description() {
			Ok(d) => d.filter(|d| !d.trim().is_empty()),
			Err(err) => {
				// Recorded once, when the description itself is read.
				debug!(error = %err, "description unavailable for naming");
				None
			}
		};
		if let Some(description) = &description {
			if self.types.type_exists(description) {
				return (description.clone(), JobShape::Handler);
			}
		}

		let shape = if callback.is_some() {
			JobShape::Callback
		} else {
			JobShape::Unknown
		};
		(
			synthetic_name(task.identity_key(), expression, description.as_deref()),
			shape,
		)
	}
}

fn record<T>(
	result: std::result::Result<T, IntrospectionError>,
	errors: &mut Vec<IntrospectionError>,
) -> Option<T> {
	match result {
		Ok(value) => Some(value),
		Err(err) => {
			if !errors.contains(&err) {
				errors.push(err);
			}
			None
		}
	}
}

/// Random per process, so synthetic names never collide across runs by
/// accident.
fn process_salt() -> u64 {
	static SALT: OnceLock<u64> = OnceLock::new();
	*SALT.get_or_init(|| uuid::Uuid::new_v4().as_u64_pair().0)
}

/// Deterministic within one process for the same task.
fn synthetic_name(identity_key: Option<u64>, expression: &str, description: Option<&str>) -> String {
	let mut hasher = DefaultHasher::new();
	process_salt().hash(&mut hasher);
	match identity_key {
		Some(key) => key.hash(&mut hasher),
		None => {
			expression.hash(&mut hasher);
			description.hash(&mut hasher);
		}
	}
	format!("{SYNTHETIC_PREFIX}{:016x}", hasher.finish())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::TaskSlot;
	use crate::task::{CallbackEntry, HandlerRef, TaskDefinition};

	/// A task whose optional slots all fail to read.
	struct BrokenTask {
		expression: Option<String>,
		description: Option<String>,
	}

	impl ScheduledTask for BrokenTask {
		fn expression(&self) -> std::result::Result<String, IntrospectionError> {
			self
				.expression
				.clone()
				.ok_or_else(|| IntrospectionError::new(TaskSlot::Expression, "not exposed"))
		}

		fn command(&self) -> std::result::Result<Option<String>, IntrospectionError> {
			Err(IntrospectionError::new(TaskSlot::Command, "private property"))
		}

		fn handler(&self) -> std::result::Result<Option<HandlerRef>, IntrospectionError> {
			Err(IntrospectionError::new(TaskSlot::Handler, "private property"))
		}

		fn callback(&self) -> std::result::Result<Option<CallbackRef>, IntrospectionError> {
			Err(IntrospectionError::new(TaskSlot::Callback, "private property"))
		}

		fn description(&self) -> std::result::Result<Option<String>, IntrospectionError> {
			Ok(self.description.clone())
		}

		fn monitoring_enabled(&self) -> std::result::Result<Option<bool>, IntrospectionError> {
			Err(IntrospectionError::new(TaskSlot::MonitoringFlag, "private property"))
		}
	}

	struct InstanceTask;

	impl ScheduledTask for InstanceTask {
		fn expression(&self) -> std::result::Result<String, IntrospectionError> {
			Ok("0 * * * *".to_string())
		}

		fn handler(&self) -> std::result::Result<Option<HandlerRef>, IntrospectionError> {
			Ok(Some(HandlerRef::Instance {
				type_name: "App\\Jobs\\SyncInventory".to_string(),
			}))
		}
	}

	#[test]
	fn command_job_is_normalized_and_described() {
		let task = TaskDefinition::command("'/usr/bin/php8.2' 'artisan' emails:send", "*/5 * * * *");
		let resolution = JobAdapter::default().resolve(&task).unwrap();

		assert_eq!(resolution.shape, JobShape::Command);
		assert_eq!(resolution.raw_name, "'/usr/bin/php8.2' 'artisan' emails:send");
		assert_eq!(
			resolution.descriptor,
			JobDescriptor {
				name: "php artisan emails:send".to_string(),
				description: Some("Artisan command: php artisan emails:send".to_string()),
				schedule_expression: "*/5 * * * *".to_string(),
				grace_minutes: DEFAULT_GRACE_MINUTES,
				monitored: true,
			}
		);
		assert!(resolution.errors.is_empty());
	}

	#[test]
	fn declared_description_wins_over_generated_one() {
		let task = TaskDefinition::command("php artisan emails:send", "* * * * *")
			.with_description("Send queued emails");
		let resolution = JobAdapter::default().resolve(&task).unwrap();
		assert_eq!(
			resolution.descriptor.description.as_deref(),
			Some("Send queued emails")
		);
	}

	#[test]
	fn plain_shell_command_has_no_description() {
		let task = TaskDefinition::command("/opt/backup.sh --full", "0 1 * * *");
		let resolution = JobAdapter::default().resolve(&task).unwrap();
		assert_eq!(resolution.name(), "/opt/backup.sh --full");
		assert_eq!(resolution.descriptor.description, None);
	}

	#[test]
	fn handler_type_name_is_used() {
		let task = TaskDefinition::handler("App\\Jobs\\PruneReports", "0 3 * * *");
		let resolution = JobAdapter::default().resolve(&task).unwrap();
		assert_eq!(resolution.shape, JobShape::Handler);
		assert_eq!(resolution.name(), "App\\Jobs\\PruneReports");

		let resolution = JobAdapter::default().resolve(&InstanceTask).unwrap();
		assert_eq!(resolution.name(), "App\\Jobs\\SyncInventory");
	}

	#[test]
	fn bound_callback_uses_object_type() {
		let task = TaskDefinition::callback(
			CallbackEntry {
				target: Some("App\\Console\\Kernel".to_string()),
				method: Some("cleanup".to_string()),
			},
			"0 * * * *",
		);
		let resolution = JobAdapter::default().resolve(&task).unwrap();
		assert_eq!(resolution.shape, JobShape::Callback);
		assert_eq!(resolution.name(), "App\\Console\\Kernel");
	}

	#[test]
	fn description_naming_known_type_is_used() {
		let task = TaskDefinition::callback(CallbackEntry::default(), "30 2 * * *")
			.with_description("App\\Jobs\\RebuildSearchIndex");
		let adapter = JobAdapter::default().with_type_catalog(Arc::new(KnownTypes::new([
			"App\\Jobs\\RebuildSearchIndex".to_string(),
		])));

		let resolution = adapter.resolve(&task).unwrap();
		assert_eq!(resolution.shape, JobShape::Handler);
		assert_eq!(resolution.name(), "App\\Jobs\\RebuildSearchIndex");
	}

	#[test]
	fn closure_falls_back_to_synthetic_name() {
		let task = TaskDefinition::callback(CallbackEntry::default(), "30 2 * * *")
			.with_description("Nightly cleanup")
			.with_position(7);
		let adapter = JobAdapter::default();

		let first = adapter.resolve(&task).unwrap();
		let second = adapter.resolve(&task).unwrap();

		assert_eq!(first.shape, JobShape::Callback);
		assert!(first.is_synthetic());
		assert!(first.name().starts_with("scheduled-closure-"));
		assert_eq!(first.name(), second.name());
		assert_eq!(first.descriptor.description.as_deref(), Some("Nightly cleanup"));

		let other = adapter
			.resolve(&task.clone().with_position(8))
			.unwrap();
		assert_ne!(first.name(), other.name());
	}

	#[test]
	fn introspection_failures_degrade_and_are_recorded() {
		let task = BrokenTask {
			expression: Some("* * * * *".to_string()),
			description: None,
		};
		let resolution = JobAdapter::default().resolve(&task).unwrap();

		assert_eq!(resolution.shape, JobShape::Unknown);
		assert!(resolution.is_synthetic());
		assert!(resolution.descriptor.monitored);
		let slots: Vec<TaskSlot> = resolution.errors.iter().map(|e| e.slot).collect();
		assert_eq!(
			slots,
			vec![
				TaskSlot::Command,
				TaskSlot::Handler,
				TaskSlot::Callback,
				TaskSlot::MonitoringFlag
			]
		);
	}

	#[test]
	fn missing_expression_is_an_error() {
		let task = BrokenTask {
			expression: None,
			description: None,
		};
		let err = JobAdapter::default().resolve(&task).unwrap_err();
		assert!(matches!(
			err,
			crate::CoreError::Introspection(IntrospectionError {
				slot: TaskSlot::Expression,
				..
			})
		));
	}

	#[test]
	fn host_flags_and_grace_are_read() {
		let task = TaskDefinition::handler("App\\Jobs\\Prune", "0 3 * * *")
			.without_monitoring()
			.with_grace_minutes(45);
		let resolution = JobAdapter::default()
			.with_default_grace_minutes(20)
			.resolve(&task)
			.unwrap();
		assert!(!resolution.descriptor.monitored);
		assert_eq!(resolution.descriptor.grace_minutes, 45);

		let task = TaskDefinition::handler("App\\Jobs\\Prune", "0 3 * * *");
		let resolution = JobAdapter::default()
			.with_default_grace_minutes(20)
			.resolve(&task)
			.unwrap();
		assert_eq!(resolution.descriptor.grace_minutes, 20);
	}

	#[test]
	fn overrides_take_precedence_over_host_values() {
		let overrides = Overrides::new().with(
			"php artisan emails:send",
			TaskOverride {
				monitored: Some(false),
				grace_minutes: Some(60),
			},
		);
		let adapter = JobAdapter::default().with_overrides(overrides);

		let task = TaskDefinition::command("/usr/bin/php artisan emails:send", "* * * * *")
			.with_grace_minutes(5);
		let resolution = adapter.resolve(&task).unwrap();
		assert!(!resolution.descriptor.monitored);
		assert_eq!(resolution.descriptor.grace_minutes, 60);
	}

	#[test]
	fn describe_task_lists_exposed_slots() {
		let task = TaskDefinition::callback(
			CallbackEntry {
				target: Some("App\\Console\\Kernel".to_string()),
				method: Some("cleanup".to_string()),
			},
			"0 * * * *",
		);
		let props = JobAdapter::default().describe_task(&task);
		assert_eq!(props.callback.as_deref(), Some("bound to App\\Console\\Kernel::cleanup"));
		assert_eq!(props.expression.as_deref(), Some("0 * * * *"));
		assert!(props.errors.is_empty());

		let value = serde_json::to_value(&props).unwrap();
		assert!(value.get("command").is_none());

		let props = JobAdapter::default().describe_task(&BrokenTask {
			expression: None,
			description: Some("x".to_string()),
		});
		assert_eq!(props.errors.len(), 4);
		assert_eq!(props.description.as_deref(), Some("x"));
	}
}
