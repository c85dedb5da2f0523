//! Subcommand implementations.

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use covidtrack_core::{
    CycleReport, FeedOutcome, LocationRecord, MetricKind, RefreshSchedule, Summary, Tracker,
};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::format::{format_count, format_delta, truncate_string};

/// Width of the location column in tables
const LOCATION_WIDTH: usize = 36;

pub async fn refresh(tracker: &Tracker, json: bool) -> Result<()> {
    let report = tracker.run_cycle().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

pub async fn show(
    tracker: &Tracker,
    metric: Option<MetricKind>,
    limit: Option<usize>,
    json: bool,
) -> Result<()> {
    match metric {
        Some(kind) => {
            let view = tracker.view(kind).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                print_summary(kind, view.summary);
                // Ascending order puts the largest counts last
                let skip = limit.map(|n| view.records.len().saturating_sub(n)).unwrap_or(0);
                print_table(&view.records[skip..], &[kind]);
            }
        }
        None => {
            let dashboard = tracker.dashboard().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&dashboard)?);
            } else {
                for kind in MetricKind::ALL {
                    print_summary(kind, dashboard.summary(kind));
                }
                let take = limit.unwrap_or(dashboard.records.len());
                print_table(
                    &dashboard.records[..take.min(dashboard.records.len())],
                    &MetricKind::ALL,
                );
            }
        }
    }

    // Let a refresh started by this read land in the store before exiting
    tracker.wait_for_background().await;
    Ok(())
}

pub async fn status(tracker: &Tracker, json: bool) -> Result<()> {
    let freshness = tracker.freshness().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&freshness)?);
        return Ok(());
    }

    let now = Utc::now();
    println!("Staleness window: {}h", tracker.gate().window().num_hours());
    for feed in &freshness {
        let label = feed.kind.map(|k| k.title()).unwrap_or("All records");
        println!(
            "{:<12} {:<10} {}",
            label,
            format!("{:?}", feed.freshness).to_lowercase(),
            feed.age_display(now)
        );
    }
    Ok(())
}

pub async fn serve(tracker: Arc<Tracker>, schedule: RefreshSchedule) -> Result<()> {
    // Warm the store on startup if it is stale or empty
    let served = tracker.serve(&MetricKind::ALL).await?;
    info!(
        records = served.records.len(),
        freshness = ?served.freshness,
        refreshing = served.refreshing,
        "Startup staleness check"
    );

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let scheduler = tokio::spawn(covidtrack_core::run_scheduled(
        Arc::clone(&tracker),
        schedule,
        shutdown_rx,
    ));

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");
    if shutdown_tx.send(()).is_err() {
        warn!("Scheduler already stopped");
    }
    scheduler.await?;
    tracker.wait_for_background().await;
    Ok(())
}

fn print_report(report: &CycleReport) {
    let elapsed = report.finished_at - report.started_at;
    println!(
        "Reconciled {} locations ({} new, {} updated) in {}ms",
        report.reconciled(),
        report.created,
        report.updated,
        elapsed.num_milliseconds()
    );
    for feed in &report.feeds {
        match feed {
            FeedOutcome::Loaded { kind, rows } => println!("  {:<10} {} rows", kind, rows),
            FeedOutcome::Failed { kind, reason } => println!("  {:<10} FAILED: {}", kind, reason),
        }
    }
    if !report.orphaned.is_empty() {
        println!(
            "  {} location(s) have no confirmed-cases row and were skipped",
            report.orphaned.len()
        );
    }
}

fn print_summary(kind: MetricKind, summary: Summary) {
    println!(
        "{:<10} {:>14} {:>12}",
        kind.title(),
        format_count(summary.current_count),
        format_delta(summary.new_count)
    );
}

fn print_table(records: &[LocationRecord], kinds: &[MetricKind]) {
    println!();
    let mut header = format!("{:<width$}", "Location", width = LOCATION_WIDTH);
    for kind in kinds {
        header.push_str(&format!(" {:>12} {:>9}", kind.title(), "New"));
    }
    println!("{}", header);

    for record in records {
        let mut line = format!(
            "{:<width$}",
            truncate_string(&record.key.to_string(), LOCATION_WIDTH),
            width = LOCATION_WIDTH
        );
        for &kind in kinds {
            let (latest, delta) = match record.get(kind) {
                Some(series) => (
                    format_count(series.latest_count),
                    series
                        .difference_since_previous_day()
                        .map(format_delta)
                        .unwrap_or_else(|_| "?".to_string()),
                ),
                None => ("-".to_string(), "-".to_string()),
            };
            line.push_str(&format!(" {:>12} {:>9}", latest, delta));
        }
        println!("{}", line);
    }
}
