// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Console text for command results.

use schedmon::{FailedTask, JobDescriptor, MonitorError, SkippedJob};
use schedmon_core::SyncResponse;

pub fn found_line(descriptor: &JobDescriptor) -> String {
	format!("Found scheduled task: {}", descriptor.name)
}

pub fn skipped_line(skipped: &SkippedJob) -> String {
	format!(
		"Skipping {} (excluded from monitoring: {})",
		skipped.name, skipped.reason
	)
}

pub fn failed_line(failed: &FailedTask) -> String {
	format!(
		"Error processing task #{}: {}",
		failed.index + 1,
		failed.error
	)
}

/// Lines printed after a successful sync.
pub fn sync_summary(response: &SyncResponse) -> Vec<String> {
	let mut lines = vec![
		format!("Successfully synced {} scheduled tasks", response.job_count),
		format!("Synced at: {}", response.synced_at),
	];

	if let Some(stats) = &response.stats {
		lines.push(String::new());
		lines.push("Sync summary:".to_string());
		lines.push(format!("- {} new jobs added", stats.created));
		lines.push(format!("- {} existing jobs updated", stats.updated));
		lines.push(format!("- {} jobs removed", stats.removed));
	}

	lines
}

/// `<status>: <body>` for HTTP failures, the error text otherwise.
pub fn failure_detail(err: &MonitorError) -> String {
	match (err.status(), err.body()) {
		(Some(status), Some(body)) => format!("{status}: {body}"),
		_ => err.to_string(),
	}
}

/// One row of `schedmon list`.
pub fn descriptor_row(descriptor: &JobDescriptor) -> String {
	format!(
		"{:<40} {:<15} grace={}m  {}",
		descriptor.name,
		descriptor.schedule_expression,
		descriptor.grace_minutes,
		descriptor.description.as_deref().unwrap_or("-")
	)
}
