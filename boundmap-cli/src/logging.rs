//! Log setup for the demo driver.
//!
//! `RUST_LOG` wins when set. Otherwise `BOUNDMAP_LOG` picks one level for the
//! library and the driver. `LOG_FORMAT=json` switches to JSON lines on stderr.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const TARGETS: [&str; 2] = ["boundmap", "boundmap_demo"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub directives: String,
    pub json: bool,
}

impl LogSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let directives = match lookup("RUST_LOG") {
            Some(directives) => directives,
            None => {
                let level = level_name(lookup("BOUNDMAP_LOG").as_deref());
                TARGETS
                    .iter()
                    .map(|target| format!("{target}={level}"))
                    .collect::<Vec<_>>()
                    .join(",")
            }
        };

        Self {
            directives,
            json: lookup("LOG_FORMAT").as_deref() == Some("json"),
        }
    }

    /// Install the global subscriber. A subscriber that is already set is kept.
    pub fn init(&self) {
        let filter = EnvFilter::new(&self.directives);
        let json = self
            .json
            .then(|| fmt::layer().json().with_writer(std::io::stderr));
        let text = (!self.json).then(|| fmt::layer().with_writer(std::io::stderr));

        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(json)
            .with(text)
            .try_init();
    }
}

fn level_name(raw: Option<&str>) -> &'static str {
    match raw.map(str::to_ascii_lowercase).as_deref() {
        Some("trace") => "trace",
        Some("debug") => "debug",
        Some("warn") | Some("warning") => "warn",
        Some("error") => "error",
        Some("off") => "off",
        _ => "info",
    }
}
