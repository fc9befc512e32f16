// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Subcommand implementations.
//!
//! Each returns `Ok(false)` when the command ran but its work failed, which
//! maps to exit status 1.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use schedmon::{
	collect_tasks, ChannelQueue, DispatchSettings, HeartbeatDispatcher, HeartbeatQueue,
	MonitorClient, RetryConfig, SyncEngine, SyncOutcome, TracingReporter,
};
use schedmon_config::MonitorConfig;
use schedmon_core::{HeartbeatStatus, JobAdapter, Schedule, TaskDefinition};
use tracing::{debug, info, instrument, warn};

use crate::output;

pub fn build_client(config: &MonitorConfig) -> Result<MonitorClient> {
	let mut builder = MonitorClient::builder()
		.base_url(&config.api_url)
		.timeout(config.timeout)
		.connect_timeout(config.connect_timeout)
		.retry_config(RetryConfig::fixed(config.retry_count, config.retry_delay));
	if let Some(token) = config.api_token.clone() {
		builder = builder.api_token_secret(token);
	}
	builder
		.build()
		.context("failed to build monitoring API client (is SCHEDULE_MONITOR_API_TOKEN set?)")
}

pub fn load_schedule(path: &Path) -> Result<Schedule> {
	let content = std::fs::read_to_string(path)
		.with_context(|| format!("failed to read schedule {}", path.display()))?;
	Schedule::from_toml_str(&content)
		.with_context(|| format!("failed to parse schedule {}", path.display()))
}

fn adapter_for(config: &MonitorConfig, schedule: Option<&Schedule>) -> Result<JobAdapter> {
	let adapter = config.job_adapter()?;
	Ok(match schedule {
		Some(schedule) => adapter.with_type_catalog(Arc::new(schedule.known_types())),
		None => adapter,
	})
}

/// `schedmon sync`
#[instrument(skip(config))]
pub async fn sync(config: &MonitorConfig, schedule_path: &Path, verbose: bool) -> Result<bool> {
	println!("Syncing scheduled tasks...");

	let schedule = load_schedule(schedule_path)?;
	let adapter = adapter_for(config, Some(&schedule))?;
	let filter = config.eligibility_filter()?;

	if verbose {
		for task in &schedule.tasks {
			let properties = serde_json::to_string(&adapter.describe_task(task))?;
			println!("Task properties: {properties}");
		}
	}

	let engine = SyncEngine::new(build_client(config)?, adapter, filter);
	let collection = engine.collect(schedule.tasks.iter());

	for failed in &collection.failed {
		eprintln!("{}", output::failed_line(failed));
	}
	for skipped in &collection.skipped {
		println!("{}", output::skipped_line(skipped));
	}
	for descriptor in &collection.found {
		println!("{}", output::found_line(descriptor));
	}

	match engine.sync(collection.found).await {
		Ok(SyncOutcome::NothingToSync) => {
			println!("No scheduled tasks found to sync");
			Ok(true)
		}
		Ok(SyncOutcome::Synced(response)) => {
			for line in output::sync_summary(&response) {
				println!("{line}");
			}
			Ok(true)
		}
		Err(err) => {
			eprintln!("Failed to sync scheduled tasks");
			eprintln!("{}", output::failure_detail(&err));
			Ok(false)
		}
	}
}

/// `schedmon list`
pub fn list(config: &MonitorConfig, schedule_path: &Path, json: bool) -> Result<bool> {
	let schedule = load_schedule(schedule_path)?;
	let adapter = adapter_for(config, Some(&schedule))?;
	let filter = config.eligibility_filter()?;

	let collection = collect_tasks(&adapter, &filter, schedule.tasks.iter());

	if json {
		println!("{}", serde_json::to_string_pretty(&collection.found)?);
		return Ok(true);
	}

	for descriptor in &collection.found {
		println!("{}", output::descriptor_row(descriptor));
	}
	for skipped in &collection.skipped {
		println!("{}", output::skipped_line(skipped));
	}
	for failed in &collection.failed {
		eprintln!("{}", output::failed_line(failed));
	}

	Ok(true)
}

/// `schedmon test-heartbeat`
pub async fn test_heartbeat(
	config: &MonitorConfig,
	job: &str,
	status: HeartbeatStatus,
	runtime: f64,
) -> Result<bool> {
	println!("Sending test heartbeat for job: {job}");
	println!("Status: {status}");
	println!("Runtime: {runtime} seconds");

	let dispatcher = HeartbeatDispatcher::new(
		build_client(config)?,
		config.job_adapter()?,
		config.eligibility_filter()?,
	);

	if dispatcher.test_heartbeat(job, status, Some(runtime)).await {
		println!("Heartbeat sent successfully!");
		println!("Note: Check your monitoring dashboard to verify it was received.");
		Ok(true)
	} else {
		eprintln!("Failed to send heartbeat.");
		Ok(false)
	}
}

/// `schedmon report`
///
/// Looks `job` up in the schedule when one is given so its overrides and
/// opt-out apply; otherwise treats `job` as a command line.
#[instrument(skip(config))]
pub async fn report(
	config: &MonitorConfig,
	job: &str,
	exit_code: i32,
	runtime: Option<f64>,
	schedule_path: Option<&Path>,
) -> Result<bool> {
	let schedule = schedule_path.map(load_schedule).transpose()?;
	let adapter = adapter_for(config, schedule.as_ref())?;
	let filter = config.eligibility_filter()?;

	let task = match schedule
		.as_ref()
		.and_then(|s| find_task(&adapter, &s.tasks, job))
	{
		Some(task) => task.clone(),
		None => {
			if schedule.is_some() {
				warn!(job, "job not found in schedule, reporting it as a command");
			}
			TaskDefinition::command(job, "")
		}
	};

	let resolution = adapter.resolve(&task)?;
	if !filter.is_eligible(&resolution) {
		println!("{} is not monitored; no heartbeat sent", resolution.name());
		return Ok(true);
	}

	let client = build_client(config)?;
	let settings = DispatchSettings {
		use_queue: config.use_queue,
		queue_name: config.heartbeat_queue.clone(),
	};
	let mut dispatcher =
		HeartbeatDispatcher::new(client.clone(), adapter, filter).with_settings(settings);

	let worker = if config.use_queue {
		let (queue, worker) = ChannelQueue::spawn(client, Arc::new(TracingReporter));
		let queue: Arc<dyn HeartbeatQueue> = Arc::new(queue);
		dispatcher = dispatcher.with_queue(queue);
		Some(worker)
	} else {
		None
	};

	let accepted = dispatcher.handle_task_finished(&task, exit_code, runtime).await;
	let delivered = match worker {
		Some(worker) => {
			let stats = worker.shutdown().await?;
			debug!(delivered = stats.delivered, failed = stats.failed, "queue drained");
			accepted && stats.failed == 0
		}
		None => accepted,
	};

	let status = HeartbeatStatus::from_exit_code(exit_code);
	if delivered {
		info!(job = %resolution.name(), status = %status, "heartbeat reported");
		println!("Reported {status} for {}", resolution.name());
		Ok(true)
	} else {
		eprintln!("Failed to report {status} for {}", resolution.name());
		Ok(false)
	}
}

fn find_task<'a>(
	adapter: &JobAdapter,
	tasks: &'a [TaskDefinition],
	job: &str,
) -> Option<&'a TaskDefinition> {
	let wanted = adapter.identity().resolve_name(job);
	tasks.iter().find(|task| match adapter.resolve(*task) {
		Ok(resolution) => resolution.name() == wanted || resolution.raw_name == job,
		Err(_) => false,
	})
}

/// `schedmon status`
pub async fn status(config: &MonitorConfig) -> Result<bool> {
	match build_client(config)?.get_status().await {
		Ok(body) => {
			println!("{}", serde_json::to_string_pretty(&body)?);
			Ok(true)
		}
		Err(err) => {
			eprintln!("Failed to fetch monitor status");
			eprintln!("{}", output::failure_detail(&err));
			Ok(false)
		}
	}
}
