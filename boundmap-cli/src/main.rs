//! boundmap-demo: run the bounded mapper over a delayed doubling workload.

mod args;
mod logging;

use std::process;
use std::time::{Duration, Instant};

use anyhow::Context;
use tracing::{debug, info};

use boundmap::{BoundedMapper, MapConfig};

use crate::args::{DemoOptions, USAGE, parse_args};
use crate::logging::LogSettings;

#[derive(Debug, PartialEq, thiserror::Error)]
enum DemoError {
    #[error("input {0} rejected by --fail-on")]
    Rejected(i64),
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let env_concurrency = std::env::var(boundmap::CONCURRENCY_ENV).ok();

    let opts = match parse_args(&args, env_concurrency) {
        Ok(v) => v,
        Err(msg) => {
            if !msg.is_empty() {
                eprintln!("error: {msg}");
                eprintln!();
            }
            eprintln!("{USAGE}");
            process::exit(2);
        }
    };

    LogSettings::from_env().init();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("error: failed to start runtime: {e}");
            process::exit(1);
        }
    };

    match runtime.block_on(run(opts)) {
        Ok(results) => println!("{results}"),
        Err(e) => {
            eprintln!("error: {e:#}");
            process::exit(1);
        }
    }
}

/// Map the values and render the results as a JSON array.
async fn run(opts: DemoOptions) -> anyhow::Result<String> {
    let mapper = BoundedMapper::from_config(&MapConfig::new(opts.concurrency));
    let unit = Duration::from_millis(opts.unit_ms);
    let fail_on = opts.fail_on;

    debug!(values = ?opts.values, concurrency = %opts.concurrency, "Running demo workload");
    let started = Instant::now();

    let results = mapper
        .map(opts.values, move |value| async move {
            tokio::time::sleep(delay_for(unit, value)).await;
            if fail_on == Some(value) {
                return Err(DemoError::Rejected(value));
            }
            Ok(value.saturating_mul(2))
        })
        .await
        .context("bounded map failed")?;

    info!(elapsed = ?started.elapsed(), "Demo workload complete");

    Ok(serde_json::to_string(&results)?)
}

/// `unit * |value|`, saturating.
fn delay_for(unit: Duration, value: i64) -> Duration {
    let factor = u32::try_from(value.unsigned_abs()).unwrap_or(u32::MAX);
    unit.saturating_mul(factor)
}
