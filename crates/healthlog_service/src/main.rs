use std::sync::Arc;

use anyhow::{Context, bail};
use healthlog_core::config::Config;
use healthlog_core::retry::RetryPolicy;
use healthlog_core::{JsonFileStore, Reconciler, SourceGroup};
use healthlog_service::{AlertService, ManualEntry, WeeklyReporter};

const USAGE: &str = "usage: healthlog <command> [args]
  entry \"<YYYY-MM-DD weight protein carbs fats calories>\"   record a manual nutrition entry
  range <start> <end>                                       print daily records as JSON
  weekly <monday>                                           print the weekly aggregate as JSON
  alerts [--evening]                                        evaluate alert rules for today";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Configure logging from env var `HEALTHLOG_LOG_LEVEL` (or fallback to `RUST_LOG`, default `info`).
    let log_env = std::env::var("HEALTHLOG_LOG_LEVEL")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_new(&log_env)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .compact()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .with_env_filter(env_filter)
        .init();

    let config = Config::from_env().context("reading configuration")?;
    let store = JsonFileStore::open(&config.data_file)
        .await
        .with_context(|| format!("opening data file {}", config.data_file.display()))?;
    let reconciler = Arc::new(Reconciler::with_policy(
        store,
        RetryPolicy {
            max_retries: config.store_retries,
            ..RetryPolicy::default()
        },
        config.conflict_retries,
    ));

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("entry") => {
            let Some(line) = args.get(1) else {
                bail!("entry needs a quoted line argument\n{USAGE}");
            };
            let entry = ManualEntry::parse(line)?;
            for warning in entry.warnings() {
                tracing::warn!("{warning}");
            }
            let record = reconciler
                .reconcile(&entry.date, SourceGroup::Nutrition, &entry.to_patch())
                .await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Some("range") => {
            let (Some(start), Some(end)) = (args.get(1), args.get(2)) else {
                bail!("range needs <start> <end> dates\n{USAGE}");
            };
            let records = reconciler.get_range(start, end).await?;
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        Some("weekly") => {
            let Some(monday) = args.get(1) else {
                bail!("weekly needs a <monday> date\n{USAGE}");
            };
            let aggregate = reconciler.weekly_aggregate(monday).await?;
            println!("{}", serde_json::to_string_pretty(&aggregate)?);
        }
        Some("alerts") => {
            let evening = args.iter().any(|a| a == "--evening");
            let today = chrono::Local::now().date_naive();
            let alerts = AlertService::new(reconciler.clone())
                .check(today, evening)
                .await?;
            if alerts.is_empty() {
                println!("no alerts");
            }
            for alert in alerts {
                println!("[{}] {}: {}", alert.severity, alert.title, alert.message);
            }

            // The weekly job runs alongside the evening alert check.
            if evening {
                let report = WeeklyReporter::new(reconciler).report(today).await?;
                tracing::info!(
                    week = report.current.iso_week,
                    complete_days = report.current.days_complete,
                    "weekly summary refreshed"
                );
            }
        }
        _ => bail!("{USAGE}"),
    }
    Ok(())
}
