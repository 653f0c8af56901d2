//! Command-line parsing for the demo driver.

use boundmap::{CONCURRENCY_ENV, Concurrency, ConfigError};

pub const DEFAULT_VALUES: [i64; 5] = [1, 2, 3, 4, 5];
pub const DEFAULT_CONCURRENCY: i64 = 5;
pub const DEFAULT_UNIT_MS: u64 = 1000;

pub const USAGE: &str = "\
Usage: boundmap-demo [--concurrency N] [--unit-ms MS] [--fail-on V] [VALUES...]

Arguments:
  [VALUES...]          Integers to map (each sleeps VALUE * unit, then doubles) [default: 1 2 3 4 5]

Options:
  --concurrency <N>    Maximum transforms in flight [default: 5, env: BOUNDMAP_CONCURRENCY]
  --unit-ms <MS>       Milliseconds of delay per unit of value [default: 1000]
  --fail-on <V>        Make the transform fail for input V";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoOptions {
    pub values: Vec<i64>,
    pub concurrency: Concurrency,
    pub unit_ms: u64,
    pub fail_on: Option<i64>,
}

/// Parse `argv` (including argv[0]). `env_concurrency` is the raw value of
/// `BOUNDMAP_CONCURRENCY`, used when `--concurrency` is absent.
pub fn parse_args(args: &[String], env_concurrency: Option<String>) -> Result<DemoOptions, String> {
    let mut values = Vec::new();
    let mut concurrency: Option<String> = None;
    let mut unit_ms = DEFAULT_UNIT_MS;
    let mut fail_on = None;

    let mut i = 1; // skip argv[0]
    while i < args.len() {
        match args[i].as_str() {
            "--concurrency" => {
                i += 1;
                concurrency = Some(args.get(i).ok_or("--concurrency requires a value")?.clone());
            }
            "--unit-ms" => {
                i += 1;
                let raw = args.get(i).ok_or("--unit-ms requires a value")?;
                unit_ms = raw
                    .parse()
                    .map_err(|_| format!("invalid --unit-ms value: {raw}"))?;
            }
            "--fail-on" => {
                i += 1;
                let raw = args.get(i).ok_or("--fail-on requires a value")?;
                fail_on = Some(parse_value(raw)?);
            }
            "--help" | "-h" => return Err(String::new()),
            arg if arg.starts_with("--") => return Err(format!("unknown flag: {arg}")),
            arg => values.push(parse_value(arg)?),
        }
        i += 1;
    }

    if values.is_empty() {
        values = DEFAULT_VALUES.to_vec();
    }

    let concurrency = match concurrency {
        Some(raw) => parse_concurrency(&raw, "--concurrency")?,
        None => match env_concurrency {
            Some(raw) => parse_concurrency(&raw, CONCURRENCY_ENV)?,
            None => Concurrency::try_from(DEFAULT_CONCURRENCY).map_err(|e| e.to_string())?,
        },
    };

    Ok(DemoOptions {
        values,
        concurrency,
        unit_ms,
        fail_on,
    })
}

fn parse_value(raw: &str) -> Result<i64, String> {
    raw.parse().map_err(|_| format!("invalid value: {raw}"))
}

fn parse_concurrency(raw: &str, source: &str) -> Result<Concurrency, String> {
    let value: i64 = raw
        .trim()
        .parse()
        .map_err(|_| format!("invalid {source} value: {raw}"))?;
    Concurrency::try_from(value).map_err(|e: ConfigError| e.to_string())
}
