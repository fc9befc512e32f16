// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Canonical names for interpreter-driven commands.
//!
//! Hosts render the same command in many ways depending on how the
//! scheduler was configured:
//!
//! ```text
//! '/usr/bin/php8.2' 'artisan' emails:send
//! /usr/local/bin/php artisan emails:send
//! php artisan emails:send
//! ```
//!
//! All of them must report under one name, `php artisan emails:send`, so the
//! monitoring service sees a single job.

use regex::Regex;
use std::sync::LazyLock;

use crate::error::{CoreError, Result};

/// A shell word: runs of unquoted text and quoted strings with no
/// whitespace between them. A quote without a partner is plain text.
static TOKEN_REGEX: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r#"(?:[^\s"']+|"[^"]*"|'[^']*'|["'])+"#).unwrap());

pub const DEFAULT_INTERPRETER: &str = "php";
pub const DEFAULT_ENTRY_POINT: &str = "artisan";

/// Detects and normalizes `<interpreter> <entry-point> <args...>` commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityResolver {
	interpreter: String,
	entry_point: String,
}

impl Default for IdentityResolver {
	fn default() -> Self {
		Self {
			interpreter: DEFAULT_INTERPRETER.to_string(),
			entry_point: DEFAULT_ENTRY_POINT.to_string(),
		}
	}
}

impl IdentityResolver {
	pub fn new(interpreter: impl Into<String>, entry_point: impl Into<String>) -> Result<Self> {
		let interpreter = interpreter.into();
		let entry_point = entry_point.into();
		validate_word("interpreter", &interpreter)?;
		validate_word("entry_point", &entry_point)?;
		Ok(Self {
			interpreter,
			entry_point,
		})
	}

	pub fn interpreter(&self) -> &str {
		&self.interpreter
	}

	pub fn entry_point(&self) -> &str {
		&self.entry_point
	}

	/// Whether `command` runs the entry point through the interpreter.
	///
	/// The interpreter may carry a path (`/usr/bin/php`, `./bin/php`,
	/// `C:\php\php`), a version suffix (`php8.2`) and quotes.
	pub fn is_interpreter_command(&self, command: &str) -> bool {
		let tokens = tokenize(command);
		self.entry_index(&tokens).is_some()
	}

	/// Rewrites an interpreter command to `<interpreter> <entry-point> <args>`.
	///
	/// Arguments keep their order and inner text; a token wrapped in matching
	/// quotes loses them. Anything that is not an interpreter command is
	/// returned unchanged.
	pub fn normalize(&self, command: &str) -> String {
		let tokens = tokenize(command);
		let Some(index) = self.entry_index(&tokens) else {
			return command.to_string();
		};

		let mut words = Vec::with_capacity(tokens.len() - index + 1);
		words.push(self.interpreter.as_str());
		words.push(self.entry_point.as_str());
		words.extend(tokens[index + 1..].iter().map(|t| unquote(t)));
		words.join(" ")
	}

	/// Canonical name for a raw adapter name.
	pub fn resolve_name(&self, raw: &str) -> String {
		self.normalize(raw)
	}

	/// The part of a canonical name after `<interpreter> <entry-point> `.
	pub fn sub_command<'a>(&self, name: &'a str) -> Option<&'a str> {
		name
			.strip_prefix(self.interpreter.as_str())?
			.strip_prefix(' ')?
			.strip_prefix(self.entry_point.as_str())?
			.strip_prefix(' ')
			.filter(|rest| !rest.is_empty())
	}

	/// Description used for interpreter commands that declare none, such as
	/// `Artisan command: php artisan emails:send`.
	pub fn default_description(&self, name: &str) -> String {
		let mut chars = self.entry_point.chars();
		let label: String = match chars.next() {
			Some(first) => first.to_uppercase().chain(chars).collect(),
			None => String::new(),
		};
		format!("{label} command: {name}")
	}

	/// Index of the entry-point token. The interpreter must be the first
	/// word; `cd app && php artisan ...` is a different command.
	fn entry_index(&self, tokens: &[&str]) -> Option<usize> {
		match tokens {
			[interpreter, entry, ..]
				if self.is_interpreter_token(unquote(interpreter))
					&& unquote(entry) == self.entry_point =>
			{
				Some(1)
			}
			_ => None,
		}
	}

	fn is_interpreter_token(&self, token: &str) -> bool {
		let basename = token.rsplit(['/', '\\']).next().unwrap_or(token);
		let Some(version) = basename.strip_prefix(self.interpreter.as_str()) else {
			return false;
		};
		version.is_empty() || is_version(version)
	}
}

fn validate_word(field: &'static str, value: &str) -> Result<()> {
	if value.is_empty() {
		return Err(CoreError::InvalidResolver {
			field,
			message: "must not be empty".to_string(),
		});
	}
	if value.chars().any(|c| c.is_whitespace() || c == '\'' || c == '"') {
		return Err(CoreError::InvalidResolver {
			field,
			message: format!("must be a single unquoted word, got {value:?}"),
		});
	}
	Ok(())
}

fn tokenize(command: &str) -> Vec<&str> {
	TOKEN_REGEX.find_iter(command).map(|m| m.as_str()).collect()
}

/// `8`, `8.2`, `8.2.1`.
fn is_version(s: &str) -> bool {
	s.split('.')
		.all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()))
}

fn unquote(token: &str) -> &str {
	let bytes = token.as_bytes();
	if bytes.len() >= 2 {
		let first = bytes[0];
		if (first == b'\'' || first == b'"') && bytes[bytes.len() - 1] == first {
			return &token[1..token.len() - 1];
		}
	}
	token
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	fn resolver() -> IdentityResolver {
		IdentityResolver::default()
	}

	#[test]
	fn strips_interpreter_path_and_version() {
		assert_eq!(
			resolver().normalize("/usr/bin/php8.2 artisan reports:generate --daily"),
			"php artisan reports:generate --daily"
		);
	}

	#[test]
	fn strips_quotes_around_interpreter_and_entry_point() {
		assert_eq!(
			resolver().normalize("'/usr/bin/php8.2' 'artisan' emails:send"),
			"php artisan emails:send"
		);
		assert_eq!(
			resolver().normalize("\"/opt/php 8/bin/php\" \"artisan\" queue:prune --hours=48"),
			"php artisan queue:prune --hours=48"
		);
	}

	#[test]
	fn plain_command_is_already_canonical() {
		assert_eq!(
			resolver().normalize("php artisan emails:send"),
			"php artisan emails:send"
		);
	}

	#[test]
	fn collapses_repeated_whitespace() {
		assert_eq!(
			resolver().normalize("  php   artisan    cache:clear   --force "),
			"php artisan cache:clear --force"
		);
	}

	#[test]
	fn keeps_embedded_quotes_inside_arguments() {
		assert_eq!(
			resolver().normalize("/usr/bin/php artisan mail:send --to=\"ops team\" 'weekly'"),
			"php artisan mail:send --to=\"ops team\" weekly"
		);
	}

	#[test]
	fn unpaired_quotes_stay_in_arguments() {
		let r = resolver();
		assert_eq!(
			r.normalize("php artisan notify --msg=it's"),
			"php artisan notify --msg=it's"
		);
		assert_eq!(
			r.normalize("/usr/bin/php artisan say \"hello"),
			"php artisan say \"hello"
		);
		assert_eq!(
			r.normalize("php8.2 artisan say don't \"stop now\""),
			"php artisan say don't stop now"
		);
	}

	#[test]
	fn prefixed_commands_are_not_rewritten() {
		let r = resolver();
		for command in [
			"cd /var/www && php artisan emails:send",
			"/usr/bin/env php artisan inspire",
			"nice -n 10 php artisan queue:work",
		] {
			assert!(!r.is_interpreter_command(command), "{command:?}");
			assert_eq!(r.normalize(command), command);
		}
	}

	#[test]
	fn entry_point_alone_is_canonical() {
		assert_eq!(resolver().normalize("php artisan"), "php artisan");
	}

	#[test]
	fn windows_path_is_accepted() {
		assert_eq!(
			resolver().normalize("C:\\php\\php.exe artisan inspire"),
			"C:\\php\\php.exe artisan inspire"
		);
		assert_eq!(
			resolver().normalize("C:\\php\\php8 artisan inspire"),
			"php artisan inspire"
		);
	}

	#[test]
	fn non_matching_commands_are_unchanged() {
		let r = resolver();
		for command in [
			"",
			"   ",
			"backup.sh --full",
			"python manage.py clearsessions",
			"phpunit artisan",
			"php vendor/bin/artisan",
			"artisan php emails:send",
		] {
			assert!(!r.is_interpreter_command(command), "{command:?}");
			assert_eq!(r.normalize(command), command);
		}
	}

	#[test]
	fn custom_interpreter_and_entry_point() {
		let r = IdentityResolver::new("python3", "manage.py").unwrap();
		assert!(r.is_interpreter_command("/usr/bin/python3 manage.py clearsessions"));
		assert_eq!(
			r.normalize("/usr/bin/python3 manage.py clearsessions"),
			"python3 manage.py clearsessions"
		);
		assert_eq!(r.default_description("x"), "Manage.py command: x");
	}

	#[test]
	fn rejects_invalid_words() {
		assert!(matches!(
			IdentityResolver::new("", "artisan"),
			Err(CoreError::InvalidResolver { field: "interpreter", .. })
		));
		assert!(matches!(
			IdentityResolver::new("php", "my entry"),
			Err(CoreError::InvalidResolver { field: "entry_point", .. })
		));
	}

	#[test]
	fn sub_command_strips_canonical_prefix() {
		let r = resolver();
		assert_eq!(r.sub_command("php artisan emails:send"), Some("emails:send"));
		assert_eq!(r.sub_command("php artisan"), None);
		assert_eq!(r.sub_command("App\\Jobs\\Prune"), None);
	}

	#[test]
	fn default_description_capitalizes_entry_point() {
		assert_eq!(
			resolver().default_description("php artisan emails:send"),
			"Artisan command: php artisan emails:send"
		);
	}

	fn argument() -> impl Strategy<Value = String> {
		"[a-z][a-z0-9:=_-]{0,12}"
	}

	fn interpreter_path() -> impl Strategy<Value = String> {
		(
			prop::sample::select(vec!["", "/usr/bin/", "/usr/local/bin/", "./", "../bin/"]),
			prop::sample::select(vec!["", "7", "8.1", "8.2", "8.3.4"]),
			prop::sample::select(vec!["", "'", "\""]),
		)
			.prop_map(|(dir, version, quote)| format!("{quote}{dir}php{version}{quote}"))
	}

	proptest! {
		#[test]
		fn normalization_keeps_arguments_in_order(
			interp in interpreter_path(),
			args in prop::collection::vec(argument(), 0..5),
			gap in "[ ]{1,3}",
		) {
			let command = format!("{interp}{gap}artisan{gap}{}", args.join(&gap));
			let expected = std::iter::once("php artisan".to_string())
				.chain(args.iter().cloned())
				.collect::<Vec<_>>()
				.join(" ");

			let r = resolver();
			prop_assert!(r.is_interpreter_command(&command));
			let normalized = r.normalize(&command);
			prop_assert_eq!(normalized.trim_end(), expected.as_str());
		}

		#[test]
		fn normalization_is_idempotent(
			interp in interpreter_path(),
			args in prop::collection::vec(argument(), 0..5),
		) {
			let r = resolver();
			let once = r.normalize(&format!("{interp} artisan {}", args.join(" ")));
			prop_assert_eq!(r.normalize(&once), once.clone());
		}

		#[test]
		fn commands_without_interpreter_are_unchanged(command in "[a-z./ -]{0,40}") {
			prop_assume!(!command.contains("php"));
			prop_assert_eq!(resolver().normalize(&command), command);
		}
	}
}
