//! Subscriber setup for hosts embedding ticketbook.
//!
//! - `TICKETBOOK_LOG` sets the filter (`EnvFilter` syntax).
//! - Without it, `DEBUG` in the environment selects `ticketbook=debug,info`,
//!   otherwise `ticketbook=info,warn`.
//! - `TICKETBOOK_LOG_FORMAT=json` switches from compact text to JSON lines.

use std::env;

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

pub const LOG_ENV: &str = "TICKETBOOK_LOG";
pub const LOG_FORMAT_ENV: &str = "TICKETBOOK_LOG_FORMAT";

/// Output shape of log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl LogFormat {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Compact,
        }
    }
}

fn default_directive(debug: bool) -> &'static str {
    if debug {
        "ticketbook=debug,info"
    } else {
        "ticketbook=info,warn"
    }
}

/// Install the global subscriber. Does nothing if one is already set.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(default_directive(env::var("DEBUG").is_ok())));

    let format = env::var(LOG_FORMAT_ENV).map_or(LogFormat::Compact, |raw| LogFormat::parse(&raw));

    let registry = tracing_subscriber::registry().with(filter);

    let _ = match format {
        LogFormat::Json => registry.with(fmt::layer().json().with_ansi(false)).try_init(),
        LogFormat::Compact => registry.with(fmt::layer().compact()).try_init(),
    };
}
