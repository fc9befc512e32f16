// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Which jobs are reported at all.

use glob::{MatchOptions, Pattern};
use tracing::{debug, warn};

use crate::adapter::Resolution;
use crate::identity::IdentityResolver;
use crate::payload::JobDescriptor;

/// `*`, `?` and `[...]` like `fnmatch(3)` without flags: case-sensitive,
/// `*` crosses `/`, leading dots need no literal match.
const MATCH_OPTIONS: MatchOptions = MatchOptions {
	case_sensitive: true,
	require_literal_separator: false,
	require_literal_leading_dot: false,
};

/// Compiled ignore patterns.
#[derive(Debug, Clone, Default)]
pub struct IgnorePatterns {
	patterns: Vec<Pattern>,
}

impl IgnorePatterns {
	/// Compiles `patterns`. Invalid patterns are logged and dropped.
	pub fn compile<I, S>(patterns: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		let patterns = patterns
			.into_iter()
			.filter_map(|raw| {
				let raw = raw.as_ref();
				match Pattern::new(raw) {
					Ok(pattern) => Some(pattern),
					Err(err) => {
						warn!(pattern = raw, error = %err, "ignoring invalid ignore pattern");
						None
					}
				}
			})
			.collect();
		Self { patterns }
	}

	pub fn is_empty(&self) -> bool {
		self.patterns.is_empty()
	}

	pub fn len(&self) -> usize {
		self.patterns.len()
	}

	/// First pattern matching `name`, if any.
	pub fn find_match(&self, name: &str) -> Option<&str> {
		self
			.patterns
			.iter()
			.find(|p| p.matches_with(name, MATCH_OPTIONS))
			.map(Pattern::as_str)
	}

	pub fn matches(&self, name: &str) -> bool {
		self.find_match(name).is_some()
	}
}

/// Decides whether a resolved job is monitored.
#[derive(Debug, Clone, Default)]
pub struct EligibilityFilter {
	patterns: IgnorePatterns,
	resolver: IdentityResolver,
}

impl EligibilityFilter {
	pub fn new(patterns: IgnorePatterns, resolver: IdentityResolver) -> Self {
		Self { patterns, resolver }
	}

	pub fn patterns(&self) -> &IgnorePatterns {
		&self.patterns
	}

	/// False when the job opted out or its name matches an ignore pattern.
	///
	/// The name is tested as given and, for interpreter commands, as its
	/// bare sub-command, so `emails:*` and `php artisan emails:*` both
	/// exclude `php artisan emails:send`.
	pub fn monitored(&self, descriptor: &JobDescriptor) -> bool {
		if !descriptor.monitored {
			debug!(job = %descriptor.name, "monitoring disabled for job");
			return false;
		}
		self.excluded_by(&descriptor.name, None).is_none()
	}

	/// Like [`EligibilityFilter::monitored`], also testing the raw
	/// pre-normalization name.
	pub fn is_eligible(&self, resolution: &Resolution) -> bool {
		if !resolution.descriptor.monitored {
			debug!(job = %resolution.name(), "monitoring disabled for job");
			return false;
		}
		self
			.excluded_by(&resolution.descriptor.name, Some(&resolution.raw_name))
			.is_none()
	}

	/// Pattern that excludes the job, if any.
	pub fn excluded_by(&self, name: &str, raw_name: Option<&str>) -> Option<&str> {
		if self.patterns.is_empty() {
			return None;
		}

		let candidates = std::iter::once(name)
			.chain(raw_name.filter(|raw| *raw != name))
			.chain(self.resolver.sub_command(name));

		for candidate in candidates {
			if let Some(pattern) = self.patterns.find_match(candidate) {
				debug!(job = %name, pattern, "job matches ignore pattern");
				return Some(pattern);
			}
		}
		None
	}
}

/// Whether `descriptor` is monitored under `patterns`.
pub fn monitored(descriptor: &JobDescriptor, patterns: &[String]) -> bool {
	EligibilityFilter::new(IgnorePatterns::compile(patterns), IdentityResolver::default())
		.monitored(descriptor)
}
