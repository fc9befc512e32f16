// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Heartbeats after each job execution.
//!
//! Nothing in here returns an error. A monitoring outage must never fail the
//! job that was being monitored, so every failure is handed to the
//! [`ErrorReporter`] and turned into `false`.

use std::sync::Arc;

use schedmon_core::{
	EligibilityFilter, HeartbeatPayload, HeartbeatStatus, HeartbeatTask, JobAdapter,
	ScheduledTask,
};
use tracing::{debug, info, instrument};

use crate::client::MonitorClient;
use crate::error::MonitorError;
use crate::queue::{HeartbeatQueue, DEFAULT_QUEUE};
use crate::reporter::{ErrorReporter, TracingReporter};

/// How heartbeats are delivered by default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchSettings {
	pub use_queue: bool,
	pub queue_name: String,
}

impl Default for DispatchSettings {
	fn default() -> Self {
		Self {
			use_queue: true,
			queue_name: DEFAULT_QUEUE.to_string(),
		}
	}
}

/// Builds heartbeats and delivers them inline or through a queue.
pub struct HeartbeatDispatcher {
	client: MonitorClient,
	adapter: JobAdapter,
	filter: EligibilityFilter,
	queue: Option<Arc<dyn HeartbeatQueue>>,
	reporter: Arc<dyn ErrorReporter>,
	settings: DispatchSettings,
}

impl HeartbeatDispatcher {
	pub fn new(client: MonitorClient, adapter: JobAdapter, filter: EligibilityFilter) -> Self {
		Self {
			client,
			adapter,
			filter,
			queue: None,
			reporter: Arc::new(TracingReporter),
			settings: DispatchSettings::default(),
		}
	}

	pub fn with_queue(mut self, queue: Arc<dyn HeartbeatQueue>) -> Self {
		self.queue = Some(queue);
		self
	}

	pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
		self.reporter = reporter;
		self
	}

	pub fn with_settings(mut self, settings: DispatchSettings) -> Self {
		self.settings = settings;
		self
	}

	pub fn settings(&self) -> &DispatchSettings {
		&self.settings
	}

	/// Sends a heartbeat for `job_name`.
	///
	/// With `use_queue` the heartbeat is enqueued on `queue_name` and `true`
	/// means it was accepted by the queue. Without it the heartbeat is
	/// delivered inline and `true` means the service accepted it.
	/// Interpreter commands are normalized first.
	#[instrument(skip(self, runtime))]
	pub async fn dispatch(
		&self,
		job_name: &str,
		status: HeartbeatStatus,
		runtime: Option<f64>,
		use_queue: bool,
		queue_name: &str,
	) -> bool {
		let job = self.adapter.identity().resolve_name(job_name);
		let payload = HeartbeatPayload::new(job, status, runtime);

		if use_queue {
			return self.enqueue(queue_name, payload).await;
		}
		self.deliver_inline(payload).await
	}

	/// [`HeartbeatDispatcher::dispatch`] with the configured delivery mode.
	pub async fn send_heartbeat(
		&self,
		job_name: &str,
		status: HeartbeatStatus,
		runtime: Option<f64>,
	) -> bool {
		self.dispatch(
			job_name,
			status,
			runtime,
			self.settings.use_queue,
			&self.settings.queue_name,
		)
		.await
	}

	/// Called by the host when a scheduled task finishes.
	///
	/// Exit code 0 reports success, anything else failure. Tasks that are not
	/// monitored, or that cannot be resolved, report nothing and return
	/// `false`.
	pub async fn handle_task_finished<T: ScheduledTask + ?Sized>(
		&self,
		task: &T,
		exit_code: i32,
		runtime: Option<f64>,
	) -> bool {
		let resolution = match self.adapter.resolve(task) {
			Ok(resolution) => resolution,
			Err(err) => {
				self
					.reporter
					.report("resolving finished task", &MonitorError::from(err));
				return false;
			}
		};

		if !self.filter.is_eligible(&resolution) {
			debug!(job = %resolution.name(), "Task not monitored, skipping heartbeat");
			return false;
		}

		let status = HeartbeatStatus::from_exit_code(exit_code);
		info!(job = %resolution.name(), exit_code, status = %status, "Scheduled task finished");

		self
			.send_heartbeat(&resolution.descriptor.name, status, runtime)
			.await
	}

	/// Delivers a heartbeat for the literal `job_name`, inline, without
	/// normalization.
	pub async fn test_heartbeat(
		&self,
		job_name: &str,
		status: HeartbeatStatus,
		runtime: Option<f64>,
	) -> bool {
		self
			.deliver_inline(HeartbeatPayload::new(job_name, status, runtime))
			.await
	}

	async fn enqueue(&self, queue_name: &str, payload: HeartbeatPayload) -> bool {
		let Some(queue) = &self.queue else {
			self.reporter.report(
				&format!("heartbeat for {}", payload.job),
				&MonitorError::Queue {
					queue: queue_name.to_string(),
					message: "no queue configured".to_string(),
				},
			);
			return false;
		};

		let job = payload.job.clone();
		match queue.enqueue(queue_name, HeartbeatTask::from(payload)).await {
			Ok(()) => {
				debug!(job = %job, queue = queue_name, "Heartbeat queued");
				true
			}
			Err(err) => {
				self.reporter.report(&format!("heartbeat for {job}"), &err);
				false
			}
		}
	}

	async fn deliver_inline(&self, payload: HeartbeatPayload) -> bool {
		match self.client.post_heartbeat(&payload).await {
			Ok(()) => true,
			Err(err) => {
				self
					.reporter
					.report(&format!("heartbeat for {}", payload.job), &err);
				false
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::queue::ChannelQueue;
	use crate::reporter::CollectingReporter;
	use schedmon_common_http::RetryConfig;
	use schedmon_core::{IdentityResolver, IgnorePatterns, TaskDefinition};
	use serde_json::json;
	use std::time::Duration;
	use wiremock::matchers::{body_json, method, path};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	fn client_for(uri: &str) -> MonitorClient {
		MonitorClient::builder()
			.api_token("t")
			.base_url(uri)
			.retry_config(RetryConfig::fixed(2, Duration::from_millis(1)))
			.build()
			.unwrap()
	}

	fn build_dispatcher(uri: &str, patterns: &[&str]) -> (HeartbeatDispatcher, Arc<CollectingReporter>) {
		let reporter = Arc::new(CollectingReporter::new());
		let dispatcher = HeartbeatDispatcher::new(
			client_for(uri),
			JobAdapter::default(),
			EligibilityFilter::new(IgnorePatterns::compile(patterns), IdentityResolver::default()),
		)
		.with_reporter(reporter.clone());
		(dispatcher, reporter)
	}

	#[tokio::test]
	async fn queued_dispatch_returns_true_without_http() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.respond_with(ResponseTemplate::new(200))
			.expect(0)
			.mount(&server)
			.await;

		let (queue, mut receiver) = ChannelQueue::channel();
		let (dispatcher, reporter) = build_dispatcher(&server.uri(), &[]);
		let dispatcher = dispatcher.with_queue(Arc::new(queue));

		let sent = dispatcher
			.dispatch(
				"/usr/bin/php8.2 artisan emails:send",
				HeartbeatStatus::Success,
				Some(2.0),
				true,
				"monitoring",
			)
			.await;

		assert!(sent);
		assert!(reporter.is_empty());
		let queued = receiver.recv().await.unwrap();
		assert_eq!(queued.queue, "monitoring");
		assert_eq!(queued.task.job_name, "php artisan emails:send");
		assert!(server.received_requests().await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn queued_dispatch_without_queue_reports_and_returns_false() {
		let (dispatcher, reporter) = build_dispatcher("http://127.0.0.1:9", &[]);
		let sent = dispatcher
			.dispatch("backup:run", HeartbeatStatus::Success, None, true, "default")
			.await;
		assert!(!sent);
		assert_eq!(reporter.len(), 1);
	}

	#[tokio::test]
	async fn enqueue_failure_is_reported() {
		let (queue, receiver) = ChannelQueue::channel();
		drop(receiver);
		let (dispatcher, reporter) = build_dispatcher("http://127.0.0.1:9", &[]);
		let dispatcher = dispatcher.with_queue(Arc::new(queue));

		assert!(
			!dispatcher
				.dispatch("backup:run", HeartbeatStatus::Success, None, true, "default")
				.await
		);
		assert!(reporter.reports()[0].contains("failed to enqueue heartbeat on queue default"));
	}

	#[tokio::test]
	async fn inline_dispatch_normalizes_and_delivers() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/api/heartbeat"))
			.and(body_json(json!({
				"job": "php artisan reports:generate --daily",
				"status": "failure",
				"runtime": 12.5
			})))
			.respond_with(ResponseTemplate::new(200))
			.expect(1)
			.mount(&server)
			.await;

		let (dispatcher, reporter) = build_dispatcher(&server.uri(), &[]);
		let sent = dispatcher
			.dispatch(
				"'/usr/bin/php8.2' 'artisan' reports:generate --daily",
				HeartbeatStatus::Failure,
				Some(12.5),
				false,
				"default",
			)
			.await;
		assert!(sent);
		assert!(reporter.is_empty());
	}

	#[tokio::test]
	async fn inline_network_failure_returns_false() {
		let (dispatcher, reporter) = build_dispatcher("http://127.0.0.1:9", &[]);
		let sent = dispatcher
			.dispatch("backup:run", HeartbeatStatus::Success, None, false, "default")
			.await;
		assert!(!sent);
		assert_eq!(reporter.len(), 1);
		assert!(reporter.reports()[0].starts_with("heartbeat for backup:run: HTTP request failed"));
	}

	#[tokio::test]
	async fn task_finished_maps_exit_code_to_status() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/api/heartbeat"))
			.and(body_json(json!({
				"job": "php artisan emails:send",
				"status": "failure",
				"runtime": 0.75
			})))
			.respond_with(ResponseTemplate::new(200))
			.expect(1)
			.mount(&server)
			.await;

		let (dispatcher, _) = build_dispatcher(&server.uri(), &[]);
		let dispatcher = dispatcher.with_settings(DispatchSettings {
			use_queue: false,
			queue_name: DEFAULT_QUEUE.to_string(),
		});

		let task = TaskDefinition::command("/usr/bin/php artisan emails:send", "* * * * *");
		assert!(dispatcher.handle_task_finished(&task, 3, Some(0.75)).await);
	}

	#[tokio::test]
	async fn task_finished_skips_ineligible_tasks() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.respond_with(ResponseTemplate::new(200))
			.expect(0)
			.mount(&server)
			.await;

		let (dispatcher, reporter) = build_dispatcher(&server.uri(), &["backup:*"]);
		let dispatcher = dispatcher.with_settings(DispatchSettings {
			use_queue: false,
			queue_name: DEFAULT_QUEUE.to_string(),
		});

		let ignored = TaskDefinition::command("php artisan backup:run", "0 1 * * *");
		let disabled = TaskDefinition::command("php artisan emails:send", "* * * * *")
			.without_monitoring();

		assert!(!dispatcher.handle_task_finished(&ignored, 0, None).await);
		assert!(!dispatcher.handle_task_finished(&disabled, 0, None).await);
		assert!(reporter.is_empty());
	}

	#[tokio::test]
	async fn test_heartbeat_sends_literal_name_inline() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/api/heartbeat"))
			.and(body_json(json!({
				"job": "/usr/bin/php artisan emails:send",
				"status": "success",
				"runtime": 0.1
			})))
			.respond_with(ResponseTemplate::new(200))
			.expect(1)
			.mount(&server)
			.await;

		let (queue, mut receiver) = ChannelQueue::channel();
		let (dispatcher, _) = build_dispatcher(&server.uri(), &[]);
		let dispatcher = dispatcher.with_queue(Arc::new(queue));

		assert!(
			dispatcher
				.test_heartbeat(
					"/usr/bin/php artisan emails:send",
					HeartbeatStatus::Success,
					Some(0.1)
				)
				.await
		);
		assert!(receiver.try_recv().is_err());
	}
}
