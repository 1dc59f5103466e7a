//! Metric handlers: one per snapshot field.
//!
//! [`apply`] takes a parsed [`Metric`], writes its formatted values into
//! the [`Display`] and appends the numeric ones to the chart series.
//! Disk and network I/O arrive as cumulative counters; they are turned
//! into rates against the previous sample kept in [`MetricState`].

use chrono::{DateTime, Local, Utc};

use crate::charts::{ChartId, ChartRegistry};
use crate::display::Display;
use crate::format::{format_bytes, format_duration, format_percent, format_ratio, UnitMode, MIB};
use crate::snapshot::{DiskUsage, EngineInfo, IoCounters, Metric, RamUsage, SwapUsage, Throughput};

/// Render targets shared by all handlers.
#[derive(Clone, Debug)]
pub struct Dashboard {
    pub display: Display,
    pub charts: ChartRegistry,
    pub units: UnitMode,
}

impl Dashboard {
    pub fn new(history_size: usize, units: UnitMode) -> Self {
        Self {
            display: Display::new(),
            charts: ChartRegistry::new(history_size),
            units,
        }
    }

    fn bytes(&self, value: f64) -> String {
        format_bytes(value, self.units)
    }

    fn rate(&self, bytes_per_sec: f64) -> String {
        format!("{}/s", self.bytes(bytes_per_sec))
    }
}

/// A counter reading and when it was taken.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CounterSample {
    pub counters: IoCounters,
    pub at: DateTime<Utc>,
}

/// Throughput derived from two counter samples, bytes per second.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rates {
    pub read: f64,
    pub write: f64,
}

/// Last-seen values needed to compute rates. Overwritten every sample.
#[derive(Clone, Debug, Default)]
pub struct MetricState {
    pub disk_io: Option<CounterSample>,
    pub net_io: Option<CounterSample>,
}

/// Store `counters` as the new baseline and return the rates since the
/// previous one, if there was a previous one strictly earlier in time.
///
/// Counters that went backwards (backend restart) read as zero throughput.
pub fn advance_rates(
    last: &mut Option<CounterSample>,
    counters: IoCounters,
    at: DateTime<Utc>,
) -> Option<Rates> {
    let rates = last.and_then(|prev| {
        let elapsed = (at - prev.at).num_milliseconds() as f64 / 1000.0;
        if elapsed <= 0.0 {
            return None;
        }
        Some(Rates {
            read: counters.read.saturating_sub(prev.counters.read) as f64 / elapsed,
            write: counters.write.saturating_sub(prev.counters.write) as f64 / elapsed,
        })
    });
    *last = Some(CounterSample { counters, at });
    rates
}

/// Dispatch one parsed field to its handler.
pub fn apply(metric: &Metric, dash: &mut Dashboard, state: &mut MetricState, at: DateTime<Utc>) {
    let ts = at.timestamp_millis() as f64;
    match metric {
        Metric::Engine(engine) => engine_status(engine, dash, ts),
        Metric::Uptime(secs) => dash.display.set_text("uptime", format_duration(*secs)),
        Metric::Fqdn(fqdn) => dash.display.set_host(fqdn),
        Metric::DiskUsage(disk) => disk_usage(disk, dash),
        Metric::DiskIo(counters) => {
            io_counters(dash, ["diskr", "diskw"], *counters);
            if let Some(rates) = advance_rates(&mut state.disk_io, *counters, at) {
                io_rates(dash, ["diskrs", "diskws"], rates);
                dash.charts.append(ChartId::DiskRead, ts, rates.read / MIB);
                dash.charts.append(ChartId::DiskWrite, ts, rates.write / MIB);
            }
        }
        Metric::NetIo(counters) => {
            io_counters(dash, ["netr", "netw"], *counters);
            if let Some(rates) = advance_rates(&mut state.net_io, *counters, at) {
                io_rates(dash, ["netrs", "netws"], rates);
                dash.charts.append(ChartId::NetRead, ts, rates.read / MIB);
                dash.charts.append(ChartId::NetWrite, ts, rates.write / MIB);
            }
        }
        Metric::CpuUsage(percent) => {
            dash.display.set_text("cpu_usage", format_percent(*percent));
            dash.charts.append(ChartId::CpuUsage, ts, *percent);
        }
        Metric::RamUsage(ram) => ram_usage(ram, dash, ts),
        Metric::SwapUsage(swap) => swap_usage(swap, dash, ts),
    }
}

fn io_counters(dash: &mut Dashboard, [read_id, write_id]: [&str; 2], counters: IoCounters) {
    let read = dash.bytes(counters.read as f64);
    let write = dash.bytes(counters.write as f64);
    dash.display.set_text(read_id, read);
    dash.display.set_text(write_id, write);
}

fn io_rates(dash: &mut Dashboard, [read_id, write_id]: [&str; 2], rates: Rates) {
    let read = dash.rate(rates.read);
    let write = dash.rate(rates.write);
    dash.display.set_text(read_id, read);
    dash.display.set_text(write_id, write);
}

fn engine_status(engine: &EngineInfo, dash: &mut Dashboard, ts: f64) {
    let display = &mut dash.display;
    display.set_text("engine_id", engine.engine_id.as_str());
    display.set_text("engine_uptime", format_duration(engine.uptime));
    display.set_text("rt_version", engine.versions.0.as_str());
    display.set_text("lt_version", engine.versions.1.as_str());
    for (name, size) in &engine.views {
        display.set_text(format!("v_{}", name), size.value().to_string());
    }
    if let Some(fqdn) = &engine.fqdn {
        display.set_host(fqdn);
    }
    if let Some(now) = engine.now {
        display.set_text("last_updated", backend_time(now));
    }

    if let Some(download) = engine.download {
        transfer(dash, "rtrs", download, ChartId::EngineDown, ts);
    }
    if let Some(upload) = engine.upload {
        transfer(dash, "rtws", upload, ChartId::EngineUp, ts);
    }
}

fn transfer(dash: &mut Dashboard, id: &str, throughput: Throughput, chart: ChartId, ts: f64) {
    let text = dash.rate(throughput.rate);
    dash.display.set_text(id, text);
    if throughput.capacity > 0.0 {
        dash.display
            .set_title(id, format_ratio(throughput.rate, throughput.capacity));
    }
    dash.charts.append(chart, ts, throughput.rate / MIB);
}

fn disk_usage(disk: &DiskUsage, dash: &mut Dashboard) {
    let used = dash.bytes(disk.used);
    let total = dash.bytes(disk.total);
    let display = &mut dash.display;
    display.set_text("disku", used);
    display.set_text("diskt", total);
    display.set_text("diskp", format_ratio(disk.used, disk.total));

    for (i, volume) in disk.volumes.iter().enumerate() {
        let used = format_bytes(volume.used, dash.units);
        let total = format_bytes(volume.total, dash.units);
        dash.display.set_text(format!("disku_{}", i), used);
        dash.display.set_text(format!("diskt_{}", i), total);
        dash.display
            .set_text(format!("diskp_{}", i), format_ratio(volume.used, volume.total));
    }
}

fn ram_usage(ram: &RamUsage, dash: &mut Dashboard, ts: f64) {
    let in_use = dash.bytes(ram.total - ram.free);
    dash.display.set_text("ram_usage", format_percent(ram.percent));
    dash.display.set_title("ram_usage", in_use);
    dash.charts.append(ChartId::RamUsage, ts, ram.percent);
}

fn swap_usage(swap: &SwapUsage, dash: &mut Dashboard, ts: f64) {
    let used = dash.bytes(swap.used);
    dash.display.set_text("swap_usage", format_percent(swap.percent));
    dash.display.set_title("swap_usage", used);
    dash.charts.append(ChartId::SwapUsage, ts, swap.percent);
}

/// Backend unix time as local wall-clock text.
fn backend_time(unix_secs: f64) -> String {
    let secs = unix_secs.floor() as i64;
    let nanos = ((unix_secs - unix_secs.floor()) * 1e9) as u32;
    match DateTime::from_timestamp(secs, nanos) {
        Some(utc) => utc
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        None => "-".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{ViewSize, Volume};
    use chrono::{Duration, TimeZone};
    use std::collections::BTreeMap;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    fn dashboard() -> Dashboard {
        Dashboard::new(100, UnitMode::Binary)
    }

    #[test]
    fn test_first_sample_only_seeds_baseline() {
        let mut last = None;
        let rates = advance_rates(&mut last, IoCounters { read: 100, write: 200 }, t0());
        assert_eq!(rates, None);
        assert_eq!(last.map(|s| s.counters.read), Some(100));
    }

    #[test]
    fn test_rates_use_wall_clock_elapsed() {
        let mut last = None;
        advance_rates(&mut last, IoCounters { read: 100, write: 200 }, t0());
        let rates = advance_rates(
            &mut last,
            IoCounters { read: 150, write: 260 },
            t0() + Duration::seconds(2),
        );
        assert_eq!(rates, Some(Rates { read: 25.0, write: 30.0 }));
    }

    #[test]
    fn test_non_advancing_clock_reseeds_without_rate() {
        let mut last = None;
        advance_rates(&mut last, IoCounters { read: 100, write: 100 }, t0());
        let rates = advance_rates(&mut last, IoCounters { read: 200, write: 200 }, t0());
        assert_eq!(rates, None);
        assert_eq!(last.map(|s| s.counters.read), Some(200));
    }

    #[test]
    fn test_counter_reset_reads_as_zero() {
        let mut last = None;
        advance_rates(&mut last, IoCounters { read: 1000, write: 1000 }, t0());
        let rates = advance_rates(
            &mut last,
            IoCounters { read: 10, write: 2000 },
            t0() + Duration::seconds(1),
        );
        assert_eq!(rates, Some(Rates { read: 0.0, write: 1000.0 }));
    }

    #[test]
    fn test_disk_io_handler_emits_after_second_sample() {
        let mut dash = dashboard();
        let mut state = MetricState::default();
        let first = Metric::DiskIo(IoCounters { read: 100, write: 200 });
        apply(&first, &mut dash, &mut state, t0());
        assert_eq!(dash.display.text("diskr"), Some("100.00 B"));
        assert_eq!(dash.display.text("diskrs"), None);
        assert!(dash.charts.series(ChartId::DiskRead).is_empty());

        let second = Metric::DiskIo(IoCounters { read: 150, write: 260 });
        apply(&second, &mut dash, &mut state, t0() + Duration::seconds(2));
        assert_eq!(dash.display.text("diskrs"), Some("25.00 B/s"));
        assert_eq!(dash.display.text("diskws"), Some("30.00 B/s"));
        assert_eq!(dash.charts.series(ChartId::DiskWrite).len(), 1);
    }

    #[test]
    fn test_net_io_maps_sent_to_write() {
        let mut dash = dashboard();
        let mut state = MetricState::default();
        apply(
            &Metric::NetIo(IoCounters { read: 2048, write: 1024 }),
            &mut dash,
            &mut state,
            t0(),
        );
        assert_eq!(dash.display.text("netr"), Some("2.00 KiB"));
        assert_eq!(dash.display.text("netw"), Some("1.00 KiB"));
    }

    #[test]
    fn test_engine_handler() {
        let mut dash = dashboard();
        let mut state = MetricState::default();
        let mut views = BTreeMap::new();
        views.insert("main".to_string(), ViewSize::Count(12.0));
        let engine = EngineInfo {
            engine_id: "seedbox".to_string(),
            uptime: 90_061.0,
            versions: ("0.9.8".to_string(), "0.13.8".to_string()),
            views,
            download: Some(Throughput {
                rate: 1_048_576.0,
                capacity: 0.0,
            }),
            upload: Some(Throughput {
                rate: 1024.0,
                capacity: 4096.0,
            }),
            fqdn: Some("seedbox.example.org".to_string()),
            now: Some(1_700_000_000.0),
        };
        apply(&Metric::Engine(engine), &mut dash, &mut state, t0());

        let display = &dash.display;
        assert_eq!(display.text("engine_id"), Some("seedbox"));
        assert_eq!(display.text("engine_uptime"), Some("1d 01:01:01"));
        assert_eq!(display.text("lt_version"), Some("0.13.8"));
        assert_eq!(display.text("v_main"), Some("12"));
        assert_eq!(display.text("rtrs"), Some("1.00 MiB/s"));
        assert_eq!(display.title("rtrs"), None);
        assert_eq!(display.title("rtws"), Some("25.0%"));
        assert_eq!(display.page_title(), "seedbox.example.org - PyroScope Monitoring");
        assert!(display.text("last_updated").is_some());
        assert_eq!(
            dash.charts.series(ChartId::EngineDown).latest(),
            Some((t0().timestamp_millis() as f64, 1.0))
        );
    }

    #[test]
    fn test_engine_without_rates_keeps_status() {
        let mut dash = dashboard();
        let mut state = MetricState::default();
        let engine = EngineInfo {
            engine_id: "seedbox".to_string(),
            uptime: 61.0,
            versions: ("0.9.8".to_string(), "0.13.8".to_string()),
            views: BTreeMap::new(),
            download: None,
            upload: None,
            fqdn: None,
            now: None,
        };
        apply(&Metric::Engine(engine), &mut dash, &mut state, t0());

        assert_eq!(dash.display.text("engine_id"), Some("seedbox"));
        assert_eq!(dash.display.text("engine_uptime"), Some("0d 00:01:01"));
        assert_eq!(dash.display.text("rtrs"), None);
        assert_eq!(dash.display.text("rtws"), None);
        assert!(dash.charts.series(ChartId::EngineDown).is_empty());
        assert!(dash.charts.series(ChartId::EngineUp).is_empty());
    }

    #[test]
    fn test_disk_usage_handler_guards_zero_total() {
        let mut dash = dashboard();
        let mut state = MetricState::default();
        let disk = DiskUsage {
            used: 0.0,
            total: 0.0,
            volumes: vec![
                Volume {
                    used: 512.0,
                    total: 1024.0,
                },
                Volume {
                    used: 0.0,
                    total: 0.0,
                },
            ],
        };
        apply(&Metric::DiskUsage(disk), &mut dash, &mut state, t0());
        assert_eq!(dash.display.text("diskp"), Some("n/a"));
        assert_eq!(dash.display.text("diskp_0"), Some("50.0%"));
        assert_eq!(dash.display.text("diskt_0"), Some("1.00 KiB"));
        assert_eq!(dash.display.text("diskp_1"), Some("n/a"));
    }

    #[test]
    fn test_memory_handlers_set_titles_and_charts() {
        let mut dash = dashboard();
        let mut state = MetricState::default();
        apply(
            &Metric::RamUsage(RamUsage {
                total: 4096.0,
                free: 2048.0,
                percent: 50.0,
            }),
            &mut dash,
            &mut state,
            t0(),
        );
        apply(
            &Metric::SwapUsage(SwapUsage {
                used: 1024.0,
                percent: 12.5,
            }),
            &mut dash,
            &mut state,
            t0(),
        );
        assert_eq!(dash.display.text("ram_usage"), Some("50.0%"));
        assert_eq!(dash.display.title("ram_usage"), Some("2.00 KiB"));
        assert_eq!(dash.display.text("swap_usage"), Some("12.5%"));
        assert_eq!(dash.display.title("swap_usage"), Some("1.00 KiB"));
        assert_eq!(dash.charts.series(ChartId::RamUsage).len(), 1);
        assert_eq!(dash.charts.series(ChartId::SwapUsage).len(), 1);
    }

    #[test]
    fn test_uptime_and_cpu() {
        let mut dash = dashboard();
        let mut state = MetricState::default();
        apply(&Metric::Uptime(61.0), &mut dash, &mut state, t0());
        apply(&Metric::CpuUsage(33.333), &mut dash, &mut state, t0());
        assert_eq!(dash.display.text("uptime"), Some("0d 00:01:01"));
        assert_eq!(dash.display.text("cpu_usage"), Some("33.3%"));
    }
}
