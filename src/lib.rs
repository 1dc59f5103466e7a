//! # pyromon
//!
//! A terminal dashboard for a PyroScope-style monitoring endpoint.
//!
//! ## Overview
//!
//! `pyromon` polls `GET /json/charts` on a fixed cadence and shows what
//! comes back: scalar values in panels, numeric ones in rolling charts.
//! The snapshot covers:
//!
//! - The torrent engine (id, uptime, versions, view sizes, transfer rates)
//! - Host uptime, CPU, RAM and swap usage
//! - Disk usage, per volume when available
//! - Disk and network I/O rates, derived from cumulative counters
//!
//! A heartbeat indicator is lit while a request is in flight, and a
//! failing endpoint shows a banner until the next successful poll.
//!
//! ## Module Organization
//!
//! - [`config`]: CLI argument parsing and configuration
//! - [`format`]: Display formatting for seconds, bytes and percentages
//! - [`snapshot`]: Typed view of one poll response
//! - [`handlers`]: Per-field rendering into the display and charts
//! - [`display`]: Named display values
//! - [`charts`]: Rolling chart series
//! - [`poll`]: Poll loop, timing policy and scheduler
//! - [`ui`]: Terminal user interface
//! - [`error`]: Error types

pub mod charts;
pub mod config;
pub mod display;
pub mod error;
pub mod format;
pub mod handlers;
pub mod poll;
pub mod snapshot;
pub mod ui;
