// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Where swallowed heartbeat failures go.

use std::sync::Mutex;

use tracing::error;

use crate::error::MonitorError;

/// Receives failures that must not reach the host's job execution.
pub trait ErrorReporter: Send + Sync {
	fn report(&self, context: &str, error: &MonitorError);
}

/// Logs failures at error level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
	fn report(&self, context: &str, err: &MonitorError) {
		error!(
			context,
			error = %err,
			status = ?err.status(),
			"schedule monitor failure"
		);
	}
}

/// Keeps reported failures in memory.
#[derive(Debug, Default)]
pub struct CollectingReporter {
	reports: Mutex<Vec<String>>,
}

impl CollectingReporter {
	pub fn new() -> Self {
		Self::default()
	}

	/// `"<context>: <error>"` for each report, oldest first.
	pub fn reports(&self) -> Vec<String> {
		self
			.reports
			.lock()
			.map(|r| r.clone())
			.unwrap_or_default()
	}

	pub fn len(&self) -> usize {
		self.reports.lock().map(|r| r.len()).unwrap_or_default()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

impl ErrorReporter for CollectingReporter {
	fn report(&self, context: &str, err: &MonitorError) {
		if let Ok(mut reports) = self.reports.lock() {
			reports.push(format!("{context}: {err}"));
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn collecting_reporter_keeps_order() {
		let reporter = CollectingReporter::new();
		assert!(reporter.is_empty());

		reporter.report("first", &MonitorError::InvalidAuthToken);
		reporter.report(
			"second",
			&MonitorError::Client {
				status: 401,
				body: "unauthorized".to_string(),
			},
		);

		assert_eq!(
			reporter.reports(),
			vec![
				"first: invalid or missing API token".to_string(),
				"second: request rejected (HTTP 401): unauthorized".to_string(),
			]
		);
	}

	#[test]
	fn tracing_reporter_does_not_panic() {
		TracingReporter.report("heartbeat", &MonitorError::InvalidAuthToken);
	}
}
