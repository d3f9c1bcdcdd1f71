// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! vidforge CLI (vf)
//!
//! Talks to a running `vfd` over its control-plane socket, spawning one in
//! the background on first use. `run` and `loadtest` instead embed the
//! processor in-process, for single-shot and load-test use without a
//! persistent daemon.

mod client;
mod exit_error;
mod output;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use client::DaemonClient;
use exit_error::ExitError;
use output::{print_response, OutputFormat};
use vf_core::{JobRequest, Quality, SystemClock, VfConfig};
use vf_daemon::Daemon;
use vf_loadgen::{LoadProfile, LoadTestConfig, LoadTester};
use vf_wire::{Request, Response, SessionFilterDto};

#[derive(Parser)]
#[command(name = "vf", version, about = "vidforge control CLI")]
struct Cli {
    #[arg(long, value_enum, default_value = "text", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Submits a job to the running daemon and prints its request id.
    Submit {
        #[arg(long)]
        prompt: String,
        #[arg(long, default_value_t = 60)]
        duration: u32,
        #[arg(long, default_value = "professional")]
        style: String,
        #[arg(long, default_value = "neutral")]
        voice: String,
        #[arg(long, default_value = "medium")]
        quality: String,
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        priority: Option<String>,
    },
    /// Shows the current status of one request.
    Status { request_id: String },
    /// Lists sessions, optionally filtered.
    List {
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Cancels a queued or in-flight request.
    Cancel { request_id: String },
    /// Processor throughput counters.
    Metrics,
    /// Current system-resource usage and allocation headroom.
    ResourceUsage,
    /// Per-service rate-limit status.
    RateLimitStatus {
        #[arg(long)]
        service: Option<String>,
    },
    /// Daemon/component health check.
    Health,
    /// Starts the processor's admission loop.
    Start,
    /// Pauses admission of new work; in-flight requests continue.
    Pause,
    /// Resumes admission after a pause.
    Resume,
    /// Stops admission and waits for in-flight work to drain.
    Stop {
        #[arg(long)]
        timeout_seconds: Option<u64>,
    },
    /// Runs one maintenance sweep pass immediately.
    Cleanup,
    /// Prints (or copies) the daemon's current log file.
    Log {
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },
    /// Submits one job against an embedded, in-process daemon and blocks
    /// until it reaches a terminal status.
    Run {
        #[arg(long)]
        prompt: String,
        #[arg(long, default_value_t = 60)]
        duration: u32,
        #[arg(long, default_value = "professional")]
        style: String,
        #[arg(long, default_value = "neutral")]
        voice: String,
        #[arg(long, default_value = "medium")]
        quality: String,
    },
    /// Runs a load test against an embedded, in-process daemon.
    Loadtest {
        #[arg(long)]
        name: String,
        #[arg(long, value_enum, default_value = "constant-load")]
        profile: ProfileArg,
        #[arg(long, default_value_t = 60)]
        duration_seconds: u64,
        #[arg(long, default_value_t = 10)]
        users: usize,
        #[arg(long, default_value_t = 30)]
        ramp_up_seconds: u64,
        #[arg(long, default_value_t = 1)]
        requests_per_user: usize,
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum ProfileArg {
    ConstantLoad,
    RampUp,
    Spike,
    Stress,
    Endurance,
    Burst,
}

impl From<ProfileArg> for LoadProfile {
    fn from(p: ProfileArg) -> Self {
        match p {
            ProfileArg::ConstantLoad => LoadProfile::ConstantLoad,
            ProfileArg::RampUp => LoadProfile::RampUp,
            ProfileArg::Spike => LoadProfile::Spike,
            ProfileArg::Stress => LoadProfile::Stress,
            ProfileArg::Endurance => LoadProfile::Endurance,
            ProfileArg::Burst => LoadProfile::Burst,
        }
    }
}

fn parse_quality(s: &str) -> Result<Quality, ExitError> {
    match s.to_ascii_lowercase().as_str() {
        "low" => Ok(Quality::Low),
        "medium" => Ok(Quality::Medium),
        "high" => Ok(Quality::High),
        "ultra" => Ok(Quality::Ultra),
        other => Err(ExitError::new(format!("unknown quality '{other}' (expected low|medium|high|ultra)"))),
    }
}

fn parse_priority(s: &str) -> Result<vf_core::Priority, ExitError> {
    use vf_core::Priority;
    match s.to_ascii_lowercase().as_str() {
        "urgent" => Ok(Priority::Urgent),
        "high" => Ok(Priority::High),
        "normal" => Ok(Priority::Normal),
        "low" => Ok(Priority::Low),
        other => Err(ExitError::new(format!("unknown priority '{other}' (expected urgent|high|normal|low)"))),
    }
}

fn parse_status(s: &str) -> Result<vf_core::SessionStatus, ExitError> {
    use vf_core::SessionStatus;
    match s.to_ascii_lowercase().as_str() {
        "queued" => Ok(SessionStatus::Queued),
        "processing" => Ok(SessionStatus::Processing),
        "completed" => Ok(SessionStatus::Completed),
        "failed" => Ok(SessionStatus::Failed),
        "cancelled" => Ok(SessionStatus::Cancelled),
        other => Err(ExitError::new(format!("unknown status '{other}'"))),
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        eprintln!("error: {err}");
        std::process::exit(err.code);
    }
}

async fn run(cli: Cli) -> Result<(), ExitError> {
    match cli.command {
        Command::Submit { prompt, duration, style, voice, quality, user, priority } => {
            let request = JobRequest { prompt, duration_seconds: duration, style, voice, quality: parse_quality(&quality)? };
            let priority = priority.map(|p| parse_priority(&p)).transpose()?;
            let mut client = DaemonClient::connect_or_start().await?;
            let response = client.submit(request, user, priority).await?;
            print_response(cli.format, &response);
            exit_on_error(&response)
        }
        Command::Status { request_id } => {
            let mut client = DaemonClient::connect_or_start().await?;
            let response = client.status(request_id).await?;
            print_response(cli.format, &response);
            exit_on_error(&response)
        }
        Command::List { user, status, limit } => {
            let status = status.map(|s| parse_status(&s)).transpose()?;
            let mut client = DaemonClient::connect_or_start().await?;
            let response = client.list_sessions(SessionFilterDto { user, status, limit }).await?;
            print_response(cli.format, &response);
            Ok(())
        }
        Command::Cancel { request_id } => {
            let mut client = DaemonClient::connect_or_start().await?;
            let response = client.cancel(request_id).await?;
            print_response(cli.format, &response);
            exit_on_error(&response)
        }
        Command::Metrics => {
            let mut client = DaemonClient::connect_or_start().await?;
            let response = client.metrics().await?;
            print_response(cli.format, &response);
            Ok(())
        }
        Command::ResourceUsage => {
            let mut client = DaemonClient::connect_or_start().await?;
            let response = client.resource_usage().await?;
            print_response(cli.format, &response);
            Ok(())
        }
        Command::RateLimitStatus { service } => {
            let mut client = DaemonClient::connect_or_start().await?;
            let response = client.rate_limit_status(service).await?;
            print_response(cli.format, &response);
            Ok(())
        }
        Command::Health => {
            let mut client = DaemonClient::connect_or_start().await?;
            let response = client.health().await?;
            print_response(cli.format, &response);
            Ok(())
        }
        Command::Start => {
            let mut client = DaemonClient::connect_or_start().await?;
            let response = client.start().await?;
            print_response(cli.format, &response);
            Ok(())
        }
        Command::Pause => {
            let mut client = DaemonClient::connect_or_start().await?;
            let response = client.pause().await?;
            print_response(cli.format, &response);
            Ok(())
        }
        Command::Resume => {
            let mut client = DaemonClient::connect_or_start().await?;
            let response = client.resume().await?;
            print_response(cli.format, &response);
            Ok(())
        }
        Command::Stop { timeout_seconds } => {
            let mut client = DaemonClient::connect_or_start().await?;
            let response = client.stop(timeout_seconds).await?;
            print_response(cli.format, &response);
            Ok(())
        }
        Command::Cleanup => {
            let mut client = DaemonClient::connect_or_start().await?;
            let response = client.sweep().await?;
            print_response(cli.format, &response);
            Ok(())
        }
        Command::Log { output } => print_log(output),
        Command::Run { prompt, duration, style, voice, quality } => {
            let request = JobRequest { prompt, duration_seconds: duration, style, voice, quality: parse_quality(&quality)? };
            run_embedded(request, cli.format).await
        }
        Command::Loadtest { name, profile, duration_seconds, users, ramp_up_seconds, requests_per_user, output } => {
            run_loadtest(name, profile.into(), duration_seconds, users, ramp_up_seconds, requests_per_user, output, cli.format).await
        }
    }
}

fn exit_on_error(response: &Response) -> Result<(), ExitError> {
    match response {
        Response::Error { message, .. } => Err(ExitError::new(message.clone())),
        Response::NotFound => Err(ExitError::new("not found")),
        _ => Ok(()),
    }
}

/// Locates and prints (or copies) the daemon's current daily log file under
/// `<state_dir>/logs`.
fn print_log(output: Option<PathBuf>) -> Result<(), ExitError> {
    let state_dir = vf_daemon::env::state_dir().map_err(|err| ExitError::new(err.to_string()))?;
    let log_dir = state_dir.join("logs");
    let mut entries: Vec<_> = std::fs::read_dir(&log_dir)
        .map_err(|err| ExitError::new(format!("reading {}: {err}", log_dir.display())))?
        .filter_map(|e| e.ok())
        .collect();
    entries.sort_by_key(|e| e.file_name());
    let latest = entries.last().ok_or_else(|| ExitError::new(format!("no log files under {}", log_dir.display())))?;
    let contents = std::fs::read_to_string(latest.path()).map_err(|err| ExitError::new(err.to_string()))?;

    match output {
        Some(path) => std::fs::write(&path, contents).map_err(|err| ExitError::new(err.to_string())),
        None => {
            print!("{contents}");
            Ok(())
        }
    }
}

fn embedded_config() -> VfConfig {
    let mut cfg = VfConfig::default();
    cfg.apply_env_overrides();
    cfg
}

/// Submits one job against a freshly assembled, in-process daemon and polls
/// status until it reaches a terminal state — no persistent `vfd` needed.
async fn run_embedded(request: JobRequest, format: OutputFormat) -> Result<(), ExitError> {
    let dir = tempfile::tempdir().map_err(|err| ExitError::new(err.to_string()))?;
    let mut config = embedded_config();
    config.storage.sessions_dir = dir.path().join("sessions");
    config.storage.temp_dir = dir.path().join("temp");
    std::fs::create_dir_all(&config.storage.sessions_dir).map_err(|err| ExitError::new(err.to_string()))?;
    std::fs::create_dir_all(&config.storage.temp_dir).map_err(|err| ExitError::new(err.to_string()))?;

    let store = Arc::new(
        vf_storage::SessionStore::open(config.storage.sessions_dir.clone(), SystemClock)
            .map_err(|err| ExitError::new(err.to_string()))?,
    );
    let daemon = Daemon::assemble(config, store, SystemClock);
    daemon.processor.start();

    let submitted = daemon.handle(Request::Submit { request, user: None, priority: None }).await;
    let request_id = match submitted {
        Response::Submitted { request_id } => request_id,
        other => {
            print_response(format, &other);
            return exit_on_error(&other);
        }
    };

    loop {
        let status = daemon.handle(Request::Status { request_id: request_id.clone() }).await;
        if let Response::Status(record) = &status {
            if record.status.is_terminal() {
                print_response(format, &status);
                return exit_on_error(&status);
            }
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_loadtest(
    name: String,
    profile: LoadProfile,
    duration_seconds: u64,
    users: usize,
    ramp_up_seconds: u64,
    requests_per_user: usize,
    output: Option<PathBuf>,
    format: OutputFormat,
) -> Result<(), ExitError> {
    let dir = tempfile::tempdir().map_err(|err| ExitError::new(err.to_string()))?;
    let mut config = embedded_config();
    config.storage.sessions_dir = dir.path().join("sessions");
    config.storage.temp_dir = dir.path().join("temp");
    config.processor.max_concurrent_requests = users.max(1) * 2;
    config.processor.max_queue_size = (users.max(1) * requests_per_user.max(1)).max(16) * 4;
    std::fs::create_dir_all(&config.storage.sessions_dir).map_err(|err| ExitError::new(err.to_string()))?;
    std::fs::create_dir_all(&config.storage.temp_dir).map_err(|err| ExitError::new(err.to_string()))?;

    let store = Arc::new(
        vf_storage::SessionStore::open(config.storage.sessions_dir.clone(), SystemClock)
            .map_err(|err| ExitError::new(err.to_string()))?,
    );
    let daemon = Daemon::assemble(config, store, SystemClock);
    daemon.spawn_background_tasks();

    let mut test_config = LoadTestConfig::new(name, profile);
    test_config.duration_seconds = duration_seconds;
    test_config.max_concurrent_users = users;
    test_config.ramp_up_seconds = ramp_up_seconds;
    test_config.requests_per_user = requests_per_user;

    let tester = LoadTester::new(daemon);
    let metrics = tester.run(test_config).await;

    if let Some(path) = &output {
        vf_loadgen::export_results(&metrics, path).map_err(|err| ExitError::new(err.to_string()))?;
    }
    if format == OutputFormat::Json {
        match serde_json::to_string_pretty(&metrics) {
            Ok(json) => println!("{json}"),
            Err(err) => eprintln!("failed to serialize metrics: {err}"),
        }
    } else {
        println!("test:              {}", metrics.test_name);
        println!("profile:           {}", metrics.profile);
        println!("total requests:    {}", metrics.total_requests);
        println!("successful:        {}", metrics.successful_requests);
        println!("failed:            {}", metrics.failed_requests);
        println!("success rate:      {:.1}%", metrics.success_rate * 100.0);
        println!("p50 (ms):          {:.1}", metrics.p50_response_time_ms);
        println!("p95 (ms):          {:.1}", metrics.p95_response_time_ms);
        println!("p99 (ms):          {:.1}", metrics.p99_response_time_ms);
        println!("requests/sec:      {:.2}", metrics.requests_per_second);
        println!("peak concurrency:  {}", metrics.peak_concurrent_users);
    }
    Ok(())
}
