// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Background delivery of heartbeats.
//!
//! Enqueueing hands a [`HeartbeatTask`] to a queue and returns. A worker
//! drains the queue and delivers each task through the [`MonitorClient`],
//! reporting failures instead of raising them.

use std::sync::Arc;

use async_trait::async_trait;
use schedmon_core::HeartbeatTask;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

use crate::client::MonitorClient;
use crate::error::{MonitorError, Result};
use crate::reporter::ErrorReporter;

pub const DEFAULT_QUEUE: &str = "default";

/// A queue that accepts heartbeat deliveries.
#[async_trait]
pub trait HeartbeatQueue: Send + Sync {
	/// Hands `task` to the named queue. Must not wait for delivery.
	async fn enqueue(&self, queue: &str, task: HeartbeatTask) -> Result<()>;
}

/// A task together with the queue it was sent to.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedHeartbeat {
	pub queue: String,
	pub task: HeartbeatTask,
}

/// In-process queue backed by an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelQueue {
	sender: mpsc::UnboundedSender<QueuedHeartbeat>,
}

impl ChannelQueue {
	/// Creates a queue and the receiving end a worker reads from.
	pub fn channel() -> (Self, mpsc::UnboundedReceiver<QueuedHeartbeat>) {
		let (sender, receiver) = mpsc::unbounded_channel();
		(Self { sender }, receiver)
	}

	/// Creates a queue with a worker already running on the current runtime.
	pub fn spawn(client: MonitorClient, reporter: Arc<dyn ErrorReporter>) -> (Self, QueueWorker) {
		let (queue, receiver) = Self::channel();
		let worker = QueueWorker::spawn(receiver, client, reporter);
		(queue, worker)
	}
}

#[async_trait]
impl HeartbeatQueue for ChannelQueue {
	async fn enqueue(&self, queue: &str, task: HeartbeatTask) -> Result<()> {
		debug!(queue, job = %task.job_name, "Enqueueing heartbeat");
		self
			.sender
			.send(QueuedHeartbeat {
				queue: queue.to_string(),
				task,
			})
			.map_err(|_| MonitorError::Queue {
				queue: queue.to_string(),
				message: "worker is not running".to_string(),
			})
	}
}

/// Counts kept by a worker over its lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
	pub delivered: u64,
	pub failed: u64,
}

/// Handle to a running queue worker.
///
/// Dropping the handle stops the worker once the queue is drained.
pub struct QueueWorker {
	shutdown_tx: broadcast::Sender<()>,
	handle: JoinHandle<WorkerStats>,
}

impl QueueWorker {
	pub fn spawn(
		mut receiver: mpsc::UnboundedReceiver<QueuedHeartbeat>,
		client: MonitorClient,
		reporter: Arc<dyn ErrorReporter>,
	) -> Self {
		let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);

		let handle = tokio::spawn(async move {
			let mut stats = WorkerStats::default();

			loop {
				tokio::select! {
					biased;
					next = receiver.recv() => {
						match next {
							Some(queued) => record(&mut stats, deliver(&client, reporter.as_ref(), queued).await),
							None => break,
						}
					}
					_ = shutdown_rx.recv() => {
						receiver.close();
						while let Some(queued) = receiver.recv().await {
							record(&mut stats, deliver(&client, reporter.as_ref(), queued).await);
						}
						break;
					}
				}
			}

			info!(
				delivered = stats.delivered,
				failed = stats.failed,
				"Heartbeat worker stopped"
			);
			stats
		});

		Self {
			shutdown_tx,
			handle,
		}
	}

	/// Stops accepting new tasks, delivers what is already queued, and
	/// waits for the worker to finish.
	#[instrument(skip(self))]
	pub async fn shutdown(self) -> Result<WorkerStats> {
		// Fails only when the worker already exited because every sender
		// was dropped; joining below still yields its stats.
		self.shutdown_tx.send(()).ok();
		self.handle.await.map_err(|e| MonitorError::Queue {
			queue: DEFAULT_QUEUE.to_string(),
			message: format!("worker task failed: {e}"),
		})
	}
}

fn record(stats: &mut WorkerStats, delivered: bool) {
	if delivered {
		stats.delivered += 1;
	} else {
		stats.failed += 1;
	}
}

/// Delivers one queued heartbeat. Failures go to `reporter`.
pub async fn deliver(
	client: &MonitorClient,
	reporter: &dyn ErrorReporter,
	queued: QueuedHeartbeat,
) -> bool {
	let job = queued.task.job_name.clone();
	match client.post_heartbeat(&queued.task.into_payload()).await {
		Ok(()) => {
			debug!(queue = %queued.queue, job = %job, "Queued heartbeat delivered");
			true
		}
		Err(err) => {
			reporter.report(&format!("heartbeat for {job}"), &err);
			false
		}
	}
}
