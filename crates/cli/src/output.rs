// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dual text/JSON rendering of control-plane responses.

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use vf_wire::{
    HealthView, ProcessorMetrics, RateLimitStatusView, Response, ResourceUsageView, SessionDto,
    StatusRecord, SweepReportDto,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

pub fn print_response(format: OutputFormat, response: &Response) {
    if format == OutputFormat::Json {
        match serde_json::to_string_pretty(response) {
            Ok(json) => println!("{json}"),
            Err(err) => eprintln!("failed to serialize response: {err}"),
        }
        return;
    }
    match response {
        Response::Submitted { request_id } => println!("submitted: {request_id}"),
        Response::Status(status) => print_status(status),
        Response::Sessions(sessions) => print_sessions(sessions),
        Response::Cancelled => println!("cancelled"),
        Response::Metrics(metrics) => print_metrics(metrics),
        Response::ResourceUsage(usage) => print_resource_usage(usage),
        Response::RateLimitStatus(status) => print_rate_limit_status(status),
        Response::Health(health) => print_health(health),
        Response::Started { ok } => println!("{}", if *ok { "started" } else { "already running" }),
        Response::Paused => println!("paused"),
        Response::Resumed => println!("resumed"),
        Response::Stopped { graceful } => {
            println!("stopped ({})", if *graceful { "graceful" } else { "forced after timeout" })
        }
        Response::SweepReport(report) => print_sweep_report(report),
        Response::NotFound => println!("not found"),
        Response::Error { kind, message } => eprintln!("error ({kind}): {message}"),
    }
}

fn print_status(status: &StatusRecord) {
    println!("request:   {}", status.request_id);
    println!("session:   {}", status.session_id);
    println!("state:     {:?}", status.state);
    println!("status:    {:?}", status.status);
    println!("stage:     {:?}", status.stage);
    println!("progress:  {:.1}%", status.progress * 100.0);
    if let Some(eta) = status.estimated_completion {
        println!("eta:       {}", format_time(eta));
    }
    if let Some(error) = &status.error {
        println!("error:     {error}");
    }
}

fn print_sessions(sessions: &[SessionDto]) {
    if sessions.is_empty() {
        println!("no sessions");
        return;
    }
    for session in sessions {
        println!(
            "{}  {:<10?}  {:<14?}  {:>5.1}%  updated {}",
            session.id,
            session.status,
            session.stage,
            session.progress * 100.0,
            format_time_ago(session.updated_at),
        );
    }
}

fn print_metrics(metrics: &ProcessorMetrics) {
    println!("processed:      {}", metrics.total_processed);
    println!("failed:         {}", metrics.total_failed);
    println!("queued (total): {}", metrics.total_queued);
    println!("active now:     {}", metrics.current_active);
    println!("queue size:     {}", metrics.current_queue_size);
    println!("avg proc (s):   {:.2}", metrics.avg_processing_seconds);
    println!("peak concurr.:  {}", metrics.peak_concurrent);
    println!("uptime (s):     {}", metrics.uptime_seconds);
}

fn print_resource_usage(usage: &ResourceUsageView) {
    println!("processor state: {}", usage.processor_state);
    println!("cpu:    {:.1}% allocated, {:.1}% available", usage.cpu_allocated, usage.cpu_available);
    println!("memory: {} MB allocated, {} MB available", usage.memory_allocated_mb, usage.memory_available_mb);
    println!("disk:   {} MB allocated, {} MB available", usage.disk_allocated_mb, usage.disk_available_mb);
}

fn print_rate_limit_status(status: &RateLimitStatusView) {
    if status.per_service.is_empty() {
        println!("no configured services");
        return;
    }
    for (name, service) in &status.per_service {
        println!("{name}: {service:?}");
    }
    println!("statistics: {:?}", status.statistics);
}

fn print_sweep_report(report: &SweepReportDto) {
    println!("sessions cleaned: {}", report.sessions_cleaned);
    println!("files deleted:    {}", report.files_deleted);
    println!("dirs deleted:     {}", report.directories_deleted);
    println!("bytes freed:      {}", report.bytes_freed);
    if !report.errors.is_empty() {
        println!("errors:");
        for err in &report.errors {
            println!("  {err}");
        }
    }
}

fn print_health(health: &HealthView) {
    println!("ok: {}", health.ok);
    for (component, healthy) in &health.components {
        println!("  {component}: {}", if *healthy { "ok" } else { "down" });
    }
}

fn format_time(t: DateTime<Utc>) -> String {
    t.to_rfc3339()
}

pub fn format_time_ago(t: DateTime<Utc>) -> String {
    let delta = Utc::now().signed_duration_since(t);
    let secs = delta.num_seconds();
    if secs < 60 {
        format!("{secs}s ago")
    } else if secs < 3600 {
        format!("{}m ago", secs / 60)
    } else if secs < 86_400 {
        format!("{}h ago", secs / 3600)
    } else {
        format!("{}d ago", secs / 86_400)
    }
}
