// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for schedmon.
//!
//! A host scheduler hands us opaque task definitions. This crate turns them
//! into [`JobDescriptor`]s with a stable canonical name, a grace period and
//! a monitoring flag, and decides which of them are reported at all:
//!
//! - [`task`]: the host-facing [`ScheduledTask`] trait and a serde-loadable
//!   [`Schedule`] manifest
//! - [`adapter`]: best-effort extraction of a descriptor from a task
//! - [`identity`]: interpreter-invocation detection and normalization
//! - [`eligibility`]: opt-out flags and glob ignore patterns
//! - [`payload`]: wire types for the monitoring API

pub mod adapter;
pub mod eligibility;
pub mod error;
pub mod identity;
pub mod payload;
pub mod task;

pub use adapter::{
	JobAdapter, JobShape, KnownTypes, Overrides, Resolution, TaskOverride, TaskProperties,
	TypeCatalog, DEFAULT_GRACE_MINUTES,
};
pub use eligibility::{EligibilityFilter, IgnorePatterns};
pub use error::{CoreError, IntrospectionError, Result, TaskSlot};
pub use identity::IdentityResolver;
pub use payload::{
	HeartbeatPayload, HeartbeatStatus, HeartbeatTask, JobDescriptor, SyncRequest, SyncResponse,
	SyncStats,
};
pub use task::{CallbackRef, CallbackEntry, HandlerRef, Schedule, ScheduledTask, TaskDefinition};
