// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for job resolution.

use std::fmt;
use thiserror::Error;

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Which part of a scheduled task could not be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskSlot {
	Command,
	Handler,
	Callback,
	Description,
	Expression,
	MonitoringFlag,
	GraceMinutes,
}

impl fmt::Display for TaskSlot {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			Self::Command => "command",
			Self::Handler => "handler",
			Self::Callback => "callback",
			Self::Description => "description",
			Self::Expression => "expression",
			Self::MonitoringFlag => "monitoring flag",
			Self::GraceMinutes => "grace minutes",
		};
		f.write_str(name)
	}
}

/// Reading one slot of a host task failed.
///
/// Optional slots degrade to "no match"; only a missing schedule expression
/// makes a task unusable.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("failed to read {slot} from scheduled task: {message}")]
pub struct IntrospectionError {
	pub slot: TaskSlot,
	pub message: String,
}

impl IntrospectionError {
	pub fn new(slot: TaskSlot, message: impl Into<String>) -> Self {
		Self {
			slot,
			message: message.into(),
		}
	}
}

/// Errors raised by the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
	#[error(transparent)]
	Introspection(#[from] IntrospectionError),

	#[error("invalid {field}: {message}")]
	InvalidResolver { field: &'static str, message: String },

	#[error("failed to parse schedule: {0}")]
	Schedule(#[from] toml::de::Error),
}
