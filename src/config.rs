//! Command-line configuration for pyromon.
//!
//! This module defines all CLI arguments using `clap` for parsing.
//! The configuration controls the polled endpoint, poll timing, chart
//! history and display mode.

use std::time::Duration;

use clap::Parser;

use crate::error::ConfigError;
use crate::format::UnitMode;

/// Terminal dashboard for a PyroScope monitoring endpoint.
///
/// pyromon polls a JSON status snapshot at a fixed cadence, shows the
/// scalar values in panels and streams the numeric ones into rolling
/// charts: request latency, CPU, RAM and swap usage, disk and network
/// throughput, and the torrent engine's transfer rates.
///
/// # Examples
///
/// ```bash
/// # Watch a local instance with the TUI
/// pyromon
///
/// # Poll a remote host every 5 seconds, logging to a file
/// pyromon --url http://seedbox:8042/json/charts --wait-ms 5000 --log-file pyromon.log
///
/// # Headless mode, one line per poll
/// pyromon --headless
/// ```
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Poll a /json/charts endpoint and chart the results")]
pub struct Config {
    /// URL of the status snapshot endpoint.
    #[arg(short, long, default_value = "http://localhost:8042/json/charts")]
    pub url: String,

    /// Nominal time between polls in milliseconds.
    ///
    /// The loop subtracts each request's latency from this, so polls
    /// start roughly `wait` apart regardless of how long requests take.
    #[arg(short, long, default_value_t = 2000)]
    pub wait_ms: u64,

    /// Minimum time the heartbeat indicator stays lit, in milliseconds.
    ///
    /// Also used as the cooldown before the next poll when a request
    /// overruns the nominal period.
    #[arg(short, long, default_value_t = 250)]
    pub margin_ms: u64,

    /// HTTP request timeout in milliseconds.
    #[arg(short, long, default_value_t = 5000)]
    pub timeout_ms: u64,

    /// Use decimal byte units (KB, MB) instead of binary ones (KiB, MiB).
    #[arg(long)]
    pub decimal: bool,

    /// Number of points kept per chart.
    ///
    /// At the default 2-second period, 300 points = 10 minutes of history.
    #[arg(long, default_value_t = 300)]
    pub history_size: usize,

    /// Run in headless mode (no TUI, one summary line per poll).
    #[arg(long)]
    pub headless: bool,

    /// Write log output to this file.
    ///
    /// In TUI mode logs are dropped unless this is set; in headless
    /// mode they go to stderr when it is not.
    #[arg(long)]
    pub log_file: Option<String>,
}

impl Config {
    /// Check flag combinations that `clap` cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Url(self.url.clone()));
        }
        if self.wait_ms == 0 {
            return Err(ConfigError::Zero { flag: "wait-ms" });
        }
        if self.margin_ms == 0 {
            return Err(ConfigError::Zero { flag: "margin-ms" });
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::Zero { flag: "timeout-ms" });
        }
        if self.history_size == 0 {
            return Err(ConfigError::Zero {
                flag: "history-size",
            });
        }
        if self.margin_ms.saturating_mul(2) > self.wait_ms {
            return Err(ConfigError::MarginTooLarge {
                margin: self.margin_ms,
                wait: self.wait_ms,
            });
        }
        Ok(())
    }

    pub fn wait(&self) -> Duration {
        Duration::from_millis(self.wait_ms)
    }

    pub fn margin(&self) -> Duration {
        Duration::from_millis(self.margin_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn unit_mode(&self) -> UnitMode {
        if self.decimal {
            UnitMode::Decimal
        } else {
            UnitMode::Binary
        }
    }
}
