// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Wire types exchanged with the monitoring API.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Uniform view of one scheduled job, as sent to `POST /api/sync`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDescriptor {
	/// Canonical job name. Never empty.
	pub name: String,
	pub description: Option<String>,
	/// Cron expression as declared by the host scheduler.
	#[serde(rename = "schedule")]
	pub schedule_expression: String,
	pub grace_minutes: u32,
	#[serde(rename = "isMonitored")]
	pub monitored: bool,
}

/// Outcome of one job execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeartbeatStatus {
	Success,
	Failure,
}

impl HeartbeatStatus {
	/// Exit code 0 is success, anything else is failure.
	pub fn from_exit_code(exit_code: i32) -> Self {
		if exit_code == 0 {
			Self::Success
		} else {
			Self::Failure
		}
	}
}

impl fmt::Display for HeartbeatStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Success => write!(f, "success"),
			Self::Failure => write!(f, "failure"),
		}
	}
}

impl FromStr for HeartbeatStatus {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"success" => Ok(Self::Success),
			"failure" => Ok(Self::Failure),
			other => Err(format!("unknown heartbeat status: {other} (expected success or failure)")),
		}
	}
}

/// Body of `POST /api/heartbeat`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatPayload {
	pub job: String,
	pub status: HeartbeatStatus,
	/// Seconds; serialized as `null` when unknown.
	pub runtime: Option<f64>,
}

impl HeartbeatPayload {
	pub fn new(job: impl Into<String>, status: HeartbeatStatus, runtime: Option<f64>) -> Self {
		Self {
			job: job.into(),
			status,
			runtime,
		}
	}
}

/// Delivery task handed to a background queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatTask {
	pub job_name: String,
	pub status: HeartbeatStatus,
	pub runtime: Option<f64>,
}

impl HeartbeatTask {
	pub fn into_payload(self) -> HeartbeatPayload {
		HeartbeatPayload {
			job: self.job_name,
			status: self.status,
			runtime: self.runtime,
		}
	}
}

impl From<HeartbeatPayload> for HeartbeatTask {
	fn from(payload: HeartbeatPayload) -> Self {
		Self {
			job_name: payload.job,
			status: payload.status,
			runtime: payload.runtime,
		}
	}
}

/// Body of `POST /api/sync`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncRequest {
	pub jobs: Vec<JobDescriptor>,
}

/// Counts computed by the server while reconciling its registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
	#[serde(default)]
	pub created: u64,
	#[serde(default)]
	pub updated: u64,
	#[serde(default)]
	pub removed: u64,
}

/// Response of `POST /api/sync`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
	#[serde(default)]
	pub job_count: u64,
	#[serde(default)]
	pub synced_at: String,
	#[serde(default)]
	pub stats: Option<SyncStats>,
}
