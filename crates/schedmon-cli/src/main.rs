// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! schedmon CLI - scheduled-job health monitoring
//!
//! Syncs a schedule manifest with the monitoring service and reports job
//! outcomes as heartbeats.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use schedmon_config::{load_config_with_cli, CliOverrides, LogFormat, LoggingConfig};
use schedmon_core::HeartbeatStatus;
use tracing::debug;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod output;

/// schedmon - report scheduled job health to a monitoring service
#[derive(Parser, Debug)]
#[command(name = "schedmon", version, about, long_about = None)]
struct Args {
	/// Path to custom configuration file
	#[arg(short, long, global = true, env = "SCHEDULE_MONITOR_CONFIG")]
	config: Option<PathBuf>,

	/// Log level (overrides config)
	#[arg(short, long, global = true)]
	log_level: Option<String>,

	/// Output logs as JSON (overrides config)
	#[arg(long, global = true)]
	json_logs: bool,

	/// Print task details and debug logs
	#[arg(short, long, global = true)]
	verbose: bool,

	/// Monitoring API URL (overrides config)
	#[arg(long, global = true)]
	api_url: Option<String>,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Sync scheduled tasks with the monitoring service
	Sync {
		/// Schedule manifest (TOML)
		#[arg(short, long)]
		schedule: PathBuf,
	},
	/// List the jobs a sync would send, without contacting the service
	List {
		/// Schedule manifest (TOML)
		#[arg(short, long)]
		schedule: PathBuf,
		/// Output raw JSON
		#[arg(long)]
		json: bool,
	},
	/// Send a test heartbeat for a specific job
	#[command(name = "test-heartbeat")]
	TestHeartbeat {
		/// The name of the job to test
		job: String,
		/// The status of the job (success or failure)
		#[arg(long, default_value = "success")]
		status: HeartbeatStatus,
		/// The runtime of the job in seconds
		#[arg(long, default_value_t = 0.1)]
		runtime: f64,
	},
	/// Report that a job finished, for shell-driven schedulers
	Report {
		/// Job name or command line
		job: String,
		/// Exit code of the job; 0 is success
		#[arg(long, allow_hyphen_values = true)]
		exit_code: i32,
		/// Runtime in seconds
		#[arg(long)]
		runtime: Option<f64>,
		/// Schedule manifest used to look up overrides for the job
		#[arg(short, long)]
		schedule: Option<PathBuf>,
		/// Deliver inline instead of through the heartbeat queue
		#[arg(long)]
		no_queue: bool,
	},
	/// Show the service's view of the registered jobs
	Status,
}

impl From<&Args> for CliOverrides {
	fn from(args: &Args) -> Self {
		let log_level = args
			.log_level
			.clone()
			.or_else(|| args.verbose.then(|| "debug".to_string()));

		Self {
			api_url: args.api_url.clone(),
			use_queue: match args.command {
				Command::Report { no_queue: true, .. } => Some(false),
				_ => None,
			},
			log_level,
			log_format: if args.json_logs {
				Some("json".to_string())
			} else {
				None
			},
			config_file: args.config.clone(),
		}
	}
}

fn init_tracing(logging: &LoggingConfig) {
	let filter = EnvFilter::try_from_default_env()
		.or_else(|_| EnvFilter::try_new(&logging.level))
		.unwrap_or_else(|_| EnvFilter::new("info"));

	// stdout carries command output; logs go to stderr.
	match logging.format {
		LogFormat::Json => {
			tracing_subscriber::registry()
				.with(filter)
				.with(fmt::layer().json().with_writer(std::io::stderr))
				.init();
		}
		LogFormat::Compact => {
			tracing_subscriber::registry()
				.with(filter)
				.with(fmt::layer().compact().with_writer(std::io::stderr))
				.init();
		}
		LogFormat::Pretty => {
			tracing_subscriber::registry()
				.with(filter)
				.with(fmt::layer().with_writer(std::io::stderr))
				.init();
		}
	}
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
	let args = Args::parse();

	let cli_overrides = CliOverrides::from(&args);
	let config = load_config_with_cli(cli_overrides).context("failed to load configuration")?;

	init_tracing(&config.logging);

	debug!(api_url = %config.api_url, use_queue = config.use_queue, "starting schedmon");

	let ok = match &args.command {
		Command::Sync { schedule } => commands::sync(&config, schedule, args.verbose).await?,
		Command::List { schedule, json } => commands::list(&config, schedule, *json)?,
		Command::TestHeartbeat {
			job,
			status,
			runtime,
		} => commands::test_heartbeat(&config, job, *status, *runtime).await?,
		Command::Report {
			job,
			exit_code,
			runtime,
			schedule,
			..
		} => {
			commands::report(&config, job, *exit_code, *runtime, schedule.as_deref()).await?
		}
		Command::Status => commands::status(&config).await?,
	};

	Ok(if ok {
		ExitCode::SUCCESS
	} else {
		ExitCode::FAILURE
	})
}
