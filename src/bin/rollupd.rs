//! Rollup daemon and one-shot metrics runner.
//!
//! With no arguments, runs the aggregation scheduler loop until SIGINT.
//! One-shot modes recompute a single day (for one tenant or all of them)
//! or backfill a date range for one tenant, then exit:
//!
//! ```text
//! rollupd --date YYYY-MM-DD                 # all tenants, one day
//! rollupd --tenant <uuid> [--date YYYY-MM-DD]
//! rollupd --tenant <uuid> --backfill --start YYYY-MM-DD --end YYYY-MM-DD
//! rollupd --config config.yaml              # daemon mode
//! ```

use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use tokio::sync::watch;
use tracing::{error, info};
use uuid::Uuid;

use metrics_rollup::config::Config;
use metrics_rollup::interfaces::{NullAdSpendSource, RecordStore};
use metrics_rollup::scheduler::AggregationScheduler;
use metrics_rollup::sink::TracingSink;
use metrics_rollup::storage;
use metrics_rollup::utils::bootstrap::init_tracing;

enum Mode {
    Daemon,
    SingleDay {
        /// None means every tenant, matching the nightly rollup job.
        tenant: Option<Uuid>,
        date: Option<NaiveDate>,
    },
    Backfill {
        tenant: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    },
}

struct Args {
    config: Option<String>,
    mode: Mode,
}

fn parse_date(flag: &str, value: Option<String>) -> Result<NaiveDate, String> {
    let value = value.ok_or_else(|| format!("{} requires a value", flag))?;
    NaiveDate::parse_from_str(&value, "%Y-%m-%d")
        .map_err(|_| format!("{}: expected YYYY-MM-DD, got {}", flag, value))
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args, String> {
    let mut config = None;
    let mut tenant: Option<Uuid> = None;
    let mut date = None;
    let mut backfill = false;
    let mut start = None;
    let mut end = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                config = Some(
                    args.next()
                        .ok_or_else(|| "--config requires a value".to_string())?,
                );
            }
            "--tenant" => {
                let value = args
                    .next()
                    .ok_or_else(|| "--tenant requires a value".to_string())?;
                tenant = Some(
                    Uuid::parse_str(&value)
                        .map_err(|_| format!("--tenant: invalid UUID {}", value))?,
                );
            }
            "--date" => date = Some(parse_date("--date", args.next())?),
            "--backfill" => backfill = true,
            "--start" => start = Some(parse_date("--start", args.next())?),
            "--end" => end = Some(parse_date("--end", args.next())?),
            other => return Err(format!("unknown argument: {}", other)),
        }
    }

    let mode = if backfill {
        let tenant = tenant.ok_or_else(|| "--backfill requires --tenant".to_string())?;
        let start = start.ok_or_else(|| "--backfill requires --start".to_string())?;
        let end = end.ok_or_else(|| "--backfill requires --end".to_string())?;
        if start > end {
            return Err("--start must not be after --end".to_string());
        }
        Mode::Backfill { tenant, start, end }
    } else if tenant.is_some() || date.is_some() {
        Mode::SingleDay { tenant, date }
    } else {
        Mode::Daemon
    };

    Ok(Args { config, mode })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(message) => {
            error!("{}", message);
            return Err(message.into());
        }
    };

    let config = Config::load(args.config.as_deref())?;
    let (records, rollups) = storage::init_storage(&config.storage).await?;

    let scheduler = AggregationScheduler::new(
        config.scheduler.clone(),
        records.clone(),
        rollups,
        Arc::new(NullAdSpendSource),
        Arc::new(TracingSink),
    )?;

    match args.mode {
        Mode::Daemon => {
            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    let _ = shutdown_tx.send(true);
                }
            });
            scheduler.run(shutdown_rx).await?;
        }
        Mode::SingleDay { tenant, date } => {
            // Default to yesterday, matching the nightly rollup window.
            let date = date.unwrap_or_else(|| (Utc::now() - Duration::days(1)).date_naive());
            let tenants = match tenant {
                Some(tenant) => vec![tenant],
                None => records.list_tenants().await?,
            };
            for tenant in &tenants {
                scheduler.mark_dirty_range(*tenant, date, date).await?;
            }
            let report = scheduler.run_cycle().await?;
            info!(
                tenants = tenants.len(),
                date = %date,
                succeeded = report.succeeded,
                failed = report.failed,
                "Metrics calculated"
            );
        }
        Mode::Backfill { tenant, start, end } => {
            let marked = scheduler.mark_dirty_range(tenant, start, end).await?;
            let report = scheduler.run_cycle().await?;
            info!(
                tenant = %tenant,
                start = %start,
                end = %end,
                partitions = marked,
                succeeded = report.succeeded,
                failed = report.failed,
                "Backfill completed"
            );
        }
    }

    Ok(())
}
