// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Scheduled-job health reporting.
//!
//! Lets a host scheduler announce which jobs exist and report the outcome of
//! each run to a monitoring service.
//!
//! # Example
//!
//! ```ignore
//! use schedmon::{HeartbeatDispatcher, MonitorClient, SyncEngine};
//! use schedmon_core::{EligibilityFilter, JobAdapter, Schedule};
//!
//! let client = MonitorClient::builder()
//!     .api_token("your_api_token")
//!     .base_url("https://your-monitor-app.pages.dev")
//!     .build()?;
//!
//! let schedule = Schedule::from_toml_str(&std::fs::read_to_string("schedule.toml")?)?;
//! let engine = SyncEngine::new(client.clone(), JobAdapter::default(), EligibilityFilter::default());
//! let report = engine.sync_tasks(schedule.tasks.iter()).await?;
//!
//! let dispatcher = HeartbeatDispatcher::new(client, JobAdapter::default(), EligibilityFilter::default());
//! dispatcher.handle_task_finished(&schedule.tasks[0], 0, Some(1.7)).await;
//! ```

mod client;
mod error;
mod heartbeat;
mod queue;
mod reporter;
mod sync;

pub use client::{ClientConfig, MonitorClient, MonitorClientBuilder};
pub use error::{MonitorError, Result};
pub use heartbeat::{DispatchSettings, HeartbeatDispatcher};
pub use queue::{
	deliver, ChannelQueue, HeartbeatQueue, QueueWorker, QueuedHeartbeat, WorkerStats,
	DEFAULT_QUEUE,
};
pub use reporter::{CollectingReporter, ErrorReporter, TracingReporter};
pub use sync::{
	collect_tasks, FailedTask, SkipReason, SkippedJob, SyncEngine, SyncOutcome, SyncReport,
	TaskCollection,
};

pub use schedmon_common_http::{RetryConfig, Timeouts};
pub use schedmon_core::{HeartbeatPayload, HeartbeatStatus, HeartbeatTask, JobDescriptor};
