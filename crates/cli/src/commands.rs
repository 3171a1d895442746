use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use colored::Colorize;
use ingest_core::config::loader::{load_config, pusher_config_from_lookup};
use ingest_core::config::models::AppConfig;
use ingest_core::ingest::ProgressService;
use ingest_core::pusher::{HttpSink, ProgressSink};
use ingest_core::store::MemoryStore;
use ingest_protocol::event_models::ProgressEventRequest;
use ingest_protocol::run_models::{Aggregate, RunSnapshot};
use ingest_protocol::step_models::ProgressStatus;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

pub async fn serve(root: &Path, bind: Option<String>) -> Result<()> {
    let mut config = load_config(root)?;
    if let Some(bind) = bind {
        config.server.bind = bind;
    }

    let service = ProgressService::new(Arc::new(MemoryStore::new()), config.progress.clone());
    ingest_server::serve(&config.server, service)
        .await
        .map_err(|err| eyre!("{err:#}"))
}

/// Outcome of replaying a JSONL file.
#[derive(Debug, Default)]
pub struct ReplayReport {
    pub accepted: usize,
    pub rejected: usize,
    pub runs: Vec<(String, Aggregate, Option<RunSnapshot>)>,
}

/// Feeds every line of `path` through an in-process service.
///
/// Blank lines are skipped. Lines that fail to parse or are rejected by the
/// service are counted and logged, and the replay continues.
pub async fn replay(root: &Path, path: &Path, user: Option<&str>) -> Result<ReplayReport> {
    let config = load_config(root)?;
    let content = tokio::fs::read_to_string(path)
        .await
        .wrap_err_with(|| format!("Failed to read {}", path.display()))?;

    let service = ProgressService::new(Arc::new(MemoryStore::new()), config.progress);
    let mut report = ReplayReport::default();
    let mut run_ids = BTreeSet::new();

    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let request: ProgressEventRequest = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(err) => {
                warn!(line = index + 1, error = %err, "Skipping malformed event");
                report.rejected += 1;
                continue;
            }
        };
        let run_id = request.run_id.clone();
        match service.push_event(request, user).await {
            Ok(_) => {
                report.accepted += 1;
                if let Some(run_id) = run_id.filter(|id| !id.trim().is_empty()) {
                    run_ids.insert(run_id.trim().to_string());
                }
            }
            Err(err) => {
                warn!(line = index + 1, error = %err, "Event rejected");
                report.rejected += 1;
            }
        }
    }

    for run_id in run_ids {
        let aggregate = service.aggregate_run(&run_id).await?;
        let snapshot = service.snapshot(&run_id).await?;
        report.runs.push((run_id, aggregate, snapshot));
    }

    info!(
        accepted = report.accepted,
        rejected = report.rejected,
        runs = report.runs.len(),
        "Replay finished"
    );
    Ok(report)
}

pub fn print_replay(report: &ReplayReport, json: bool) -> Result<()> {
    if json {
        let runs: Vec<_> = report
            .runs
            .iter()
            .map(|(run_id, aggregate, snapshot)| {
                serde_json::json!({
                    "runId": run_id,
                    "aggregate": aggregate,
                    "snapshot": snapshot,
                })
            })
            .collect();
        let body = serde_json::json!({
            "accepted": report.accepted,
            "rejected": report.rejected,
            "runs": runs,
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    println!(
        "{} accepted, {} rejected",
        report.accepted.to_string().green(),
        report.rejected.to_string().red()
    );
    for (run_id, aggregate, snapshot) in &report.runs {
        let step = aggregate
            .current_step
            .map_or_else(|| "-".to_string(), |step| step.to_string());
        let published = snapshot
            .as_ref()
            .map_or_else(|| "-".to_string(), |s| format!("{:.1}%", s.overall_pct));
        println!(
            "run {:<8} {:<10} {:>6.1}%  step {:<13} published {}",
            run_id.bold(),
            paint_status(aggregate.status),
            aggregate.overall_pct,
            step,
            published
        );
    }
    Ok(())
}

fn paint_status(status: ProgressStatus) -> colored::ColoredString {
    let label = status.to_string();
    match status {
        ProgressStatus::Completed => label.green(),
        ProgressStatus::Failed => label.red(),
        ProgressStatus::Running => label.yellow(),
        ProgressStatus::Pending => label.normal(),
    }
}

/// Sends one event to the configured ingestion endpoint.
pub async fn push(
    root: &Path,
    endpoint: Option<String>,
    request: ProgressEventRequest,
    user: Option<&str>,
) -> Result<()> {
    let base = load_config(root)?.pusher;
    let mut config = pusher_config_from_lookup(base, |name| std::env::var(name).ok());
    if let Some(endpoint) = endpoint {
        config.endpoint = endpoint;
    }

    let sink = HttpSink::new(&config)?;
    sink.send(&request, user)
        .await
        .wrap_err_with(|| format!("Failed to push progress to {}", sink.endpoint()))?;
    println!("{} sent to {}", "ok".green(), sink.endpoint());
    Ok(())
}

pub fn show_config(root: &Path, json: bool) -> Result<()> {
    let config: AppConfig = load_config(root)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&config)?);
    } else {
        print!("{}", toml::to_string_pretty(&config)?);
    }
    Ok(())
}
