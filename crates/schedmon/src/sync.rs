// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Reconciles the host's scheduled jobs with the service's registry.
//!
//! The full eligible set is sent in one request; the service works out what
//! was created, updated or removed.

use schedmon_core::{
	EligibilityFilter, IntrospectionError, JobAdapter, JobDescriptor, ScheduledTask, SyncRequest,
	SyncResponse,
};
use std::fmt;
use tracing::{info, instrument, warn};

use crate::client::MonitorClient;
use crate::error::{MonitorError, Result};

/// Result of a sync that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
	/// No eligible jobs; the service was not called.
	NothingToSync,
	Synced(SyncResponse),
}

/// Why a job was left out of the sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
	/// The job opted out of monitoring.
	Disabled,
	/// The job matched this ignore pattern.
	Ignored(String),
}

impl fmt::Display for SkipReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Disabled => write!(f, "monitoring disabled"),
			Self::Ignored(pattern) => write!(f, "matches ignore pattern {pattern}"),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedJob {
	pub name: String,
	pub reason: SkipReason,
}

/// A task that could not be read at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedTask {
	/// Position of the task in the host's enumeration.
	pub index: usize,
	pub error: IntrospectionError,
}

/// Host tasks sorted into what will be synced and what will not.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskCollection {
	pub found: Vec<JobDescriptor>,
	pub skipped: Vec<SkippedJob>,
	pub failed: Vec<FailedTask>,
}

/// What [`SyncEngine::sync_tasks`] did.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncReport {
	pub tasks: TaskCollection,
	pub outcome: SyncOutcome,
}

/// Sends the eligible job set to the service.
pub struct SyncEngine {
	client: MonitorClient,
	adapter: JobAdapter,
	filter: EligibilityFilter,
}

impl SyncEngine {
	pub fn new(client: MonitorClient, adapter: JobAdapter, filter: EligibilityFilter) -> Self {
		Self {
			client,
			adapter,
			filter,
		}
	}

	pub fn adapter(&self) -> &JobAdapter {
		&self.adapter
	}

	/// See [`collect_tasks`].
	pub fn collect<'a, T, I>(&self, tasks: I) -> TaskCollection
	where
		T: ScheduledTask + ?Sized + 'a,
		I: IntoIterator<Item = &'a T>,
	{
		collect_tasks(&self.adapter, &self.filter, tasks)
	}

	/// Sends `descriptors` that pass the eligibility filter as one batch.
	///
	/// Returns [`SyncOutcome::NothingToSync`] without calling the service
	/// when none are eligible. Failures are returned as-is; the client has
	/// already retried what it retries.
	#[instrument(skip(self, descriptors), fields(count = descriptors.len()))]
	pub async fn sync(&self, descriptors: Vec<JobDescriptor>) -> Result<SyncOutcome> {
		let jobs: Vec<JobDescriptor> = descriptors
			.into_iter()
			.filter(|d| self.filter.monitored(d))
			.collect();

		if jobs.is_empty() {
			info!("No scheduled tasks found to sync");
			return Ok(SyncOutcome::NothingToSync);
		}

		let response = self.client.post_sync(&SyncRequest { jobs }).await?;
		if let Some(stats) = &response.stats {
			info!(
				created = stats.created,
				updated = stats.updated,
				removed = stats.removed,
				"Sync complete"
			);
		}
		Ok(SyncOutcome::Synced(response))
	}

	/// [`SyncEngine::collect`] followed by [`SyncEngine::sync`].
	pub async fn sync_tasks<'a, T, I>(&self, tasks: I) -> Result<SyncReport>
	where
		T: ScheduledTask + ?Sized + 'a,
		I: IntoIterator<Item = &'a T>,
	{
		let tasks = self.collect(tasks);
		let outcome = self.sync(tasks.found.clone()).await?;
		Ok(SyncReport { tasks, outcome })
	}
}

/// Resolves and filters host tasks. Makes no network calls.
///
/// A task that cannot be read is recorded in [`TaskCollection::failed`];
/// the others are still processed.
pub fn collect_tasks<'a, T, I>(
	adapter: &JobAdapter,
	filter: &EligibilityFilter,
	tasks: I,
) -> TaskCollection
where
	T: ScheduledTask + ?Sized + 'a,
	I: IntoIterator<Item = &'a T>,
{
	let mut collection = TaskCollection::default();

	for (index, task) in tasks.into_iter().enumerate() {
		let resolution = match adapter.resolve(task) {
			Ok(resolution) => resolution,
			Err(err) => {
				let error = match MonitorError::from(err) {
					MonitorError::Introspection(error) => error,
					other => {
						warn!(index, error = %other, "Unexpected error resolving task");
						continue;
					}
				};
				warn!(index, error = %error, "Skipping unreadable scheduled task");
				collection.failed.push(FailedTask { index, error });
				continue;
			}
		};

		let descriptor = &resolution.descriptor;
		let reason = if !descriptor.monitored {
			Some(SkipReason::Disabled)
		} else {
			filter
				.excluded_by(&descriptor.name, Some(&resolution.raw_name))
				.map(|pattern| SkipReason::Ignored(pattern.to_string()))
		};

		match reason {
			Some(reason) => {
				info!(job = %descriptor.name, reason = %reason, "Skipping scheduled task");
				collection.skipped.push(SkippedJob {
					name: descriptor.name.clone(),
					reason,
				});
			}
			None => collection.found.push(resolution.descriptor),
		}
	}

	collection
}
