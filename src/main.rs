//! # pyromon
//!
//! Terminal dashboard for a PyroScope `/json/charts` endpoint.
//!
//! ```text
//! pyromon --url http://seedbox:8042/json/charts --wait-ms 2000
//! ```
//!
//! Runs a ratatui dashboard when stdout is a terminal and falls back to
//! one summary line per poll otherwise (or with `--headless`). Logs go to
//! `--log-file` if given, else to stderr in headless mode; `RUST_LOG`
//! sets the level.

use std::fs::OpenOptions;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::EnvFilter;

use pyromon::config::Config;
use pyromon::handlers::Dashboard;
use pyromon::poll::{HttpFetcher, Poller};
use pyromon::ui;

/// Log timestamps in local time with the UTC offset, matching the
/// clock shown in the dashboard's "last updated" field.
struct LocalClock;

impl FormatTime for LocalClock {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = chrono::Local::now();
        write!(w, "{}", now.format("%Y-%m-%d %H:%M:%S%.3f %:z"))
    }
}

fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    config.validate()?;

    // Piped output gets summary lines instead of a TUI
    let tty = stdout_is_tty();
    let use_headless = config.headless || !tty;
    if !config.headless && !tty {
        eprintln!("Warning: stdout is not a TTY, running in headless mode");
    }

    init_logging(&config, use_headless)?;

    tracing::info!(
        url = %config.url,
        wait_ms = config.wait_ms,
        margin_ms = config.margin_ms,
        timeout_ms = config.timeout_ms,
        headless = use_headless,
        "starting pyromon"
    );

    let fetcher = HttpFetcher::new(config.url.clone(), config.timeout())
        .context("building HTTP client")?;
    let dashboard = Dashboard::new(config.history_size, config.unit_mode());
    let poller = Poller::new(fetcher, dashboard, config.wait(), config.margin());

    let running = Arc::new(AtomicBool::new(true));
    install_stop_signals(running.clone());

    if use_headless {
        ui::run_headless(poller, running)?;
    } else {
        let window = config
            .wait()
            .saturating_mul(u32::try_from(config.history_size).unwrap_or(u32::MAX));
        ui::run(poller, running, window)?;
    }

    tracing::info!("stopped");
    Ok(())
}

/// Install the tracing subscriber.
///
/// Logs go to `--log-file` when given, to stderr in headless mode, and
/// nowhere in TUI mode so they cannot tear the alternate screen.
fn init_logging(config: &Config, headless: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if let Some(path) = &config.log_file {
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .with_context(|| format!("opening log file {}", path))?;
        tracing_subscriber::fmt()
            .with_timer(LocalClock)
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init();
    } else if headless {
        tracing_subscriber::fmt()
            .with_timer(LocalClock)
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
    Ok(())
}

/// Raised from the signal handler; only an atomic store is safe there.
static STOP_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Route SIGINT and SIGTERM into `running` so the poll loop exits and
/// restores the terminal.
fn install_stop_signals(running: Arc<AtomicBool>) {
    let handler = on_stop_signal as *const () as libc::sighandler_t;
    unsafe {
        libc::signal(libc::SIGINT, handler);
        libc::signal(libc::SIGTERM, handler);
    }

    std::thread::spawn(move || {
        while running.load(Ordering::Relaxed) {
            if STOP_REQUESTED.swap(false, Ordering::Relaxed) {
                tracing::info!("stop signal received");
                running.store(false, Ordering::Relaxed);
            }
            std::thread::sleep(std::time::Duration::from_millis(50));
        }
    });
}

extern "C" fn on_stop_signal(_signum: libc::c_int) {
    STOP_REQUESTED.store(true, Ordering::Relaxed);
}

fn stdout_is_tty() -> bool {
    unsafe { libc::isatty(libc::STDOUT_FILENO) == 1 }
}
