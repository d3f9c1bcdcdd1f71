// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! vidforge daemon (vfd)
//!
//! Background process that owns the Session Store, Resource Governor,
//! Concurrent Processor, Progress Monitor, Rate Limiter, and Maintenance
//! Sweeper, and exposes them over a Unix-domain-socket control plane.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::io::Write;
use std::path::PathBuf;

use fs2::FileExt;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use vf_core::VfConfig;
use vf_daemon::{env, listener, Daemon, LifecycleError};

fn socket_path(state_dir: &std::path::Path) -> PathBuf {
    state_dir.join("vfd.sock")
}

/// Acquires the single-instance lock file, writing our pid into it. Held for
/// the lifetime of the process; dropping the returned `File` releases it.
/// Fails loudly if another `vfd` already holds it, rather than letting a
/// second instance race the first over the same session store.
fn acquire_lock(state_dir: &std::path::Path) -> Result<std::fs::File, LifecycleError> {
    let lock_path = env::lock_path(state_dir);
    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)
        .map_err(LifecycleError::Io)?;
    lock_file.try_lock_exclusive().map_err(LifecycleError::LockFailed)?;
    lock_file.set_len(0).map_err(LifecycleError::Io)?;
    let mut lock_file = lock_file;
    writeln!(lock_file, "{}", std::process::id()).map_err(LifecycleError::Io)?;
    Ok(lock_file)
}

fn load_config() -> Result<VfConfig, LifecycleError> {
    match env::config_path() {
        Some(path) => Ok(VfConfig::load(&path)?),
        None => {
            let mut cfg = VfConfig::default();
            cfg.apply_env_overrides();
            Ok(cfg)
        }
    }
}

fn setup_logging(state_dir: &std::path::Path, filter: &str) -> tracing_appender::non_blocking::WorkerGuard {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let log_dir = state_dir.join("logs");
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "vfd.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();
    guard
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("vfd {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" => {
                println!("vfd {}", env!("CARGO_PKG_VERSION"));
                println!("vidforge daemon — background process that owns the job pipeline.");
                println!("Typically started by the `vf` CLI, not invoked directly.");
                return Ok(());
            }
            other => {
                eprintln!("error: unexpected argument '{other}'");
                std::process::exit(1);
            }
        }
    }

    let state_dir = env::state_dir()?;
    std::fs::create_dir_all(&state_dir)?;
    let _lock_file = match acquire_lock(&state_dir) {
        Ok(file) => file,
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    };
    let config = load_config()?;
    let _log_guard = setup_logging(&state_dir, &config.logging.filter);

    info!("starting vidforge daemon");
    let daemon = match Daemon::bootstrap(config) {
        Ok(daemon) => daemon,
        Err(err) => {
            error!(%err, "failed to bootstrap daemon");
            return Err(err.into());
        }
    };

    let sock_path = socket_path(&state_dir);
    let unix_listener = listener::bind(&sock_path)?;
    let shutdown = CancellationToken::new();
    let listener_handle = {
        let daemon = daemon.clone();
        let shutdown = shutdown.clone();
        let sock_path = sock_path.clone();
        tokio::spawn(async move {
            listener::serve(unix_listener, daemon, sock_path, shutdown).await;
        })
    };

    println!("READY");
    info!(path = %sock_path.display(), "daemon ready");

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
        _ = sigint.recv() => info!("received SIGINT, shutting down"),
    }

    shutdown.cancel();
    daemon.shutdown(env::drain_timeout()).await;
    let _ = listener_handle.await;
    info!("daemon stopped");
    Ok(())
}
