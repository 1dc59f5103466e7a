//! Rolling chart series.
//!
//! One [`Series`] per [`ChartId`], created up front. Handlers append
//! `(timestamp_ms, value)` points; each series evicts its oldest point once
//! it holds `capacity` of them.

use std::collections::VecDeque;

/// The fixed set of charts on the dashboard.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ChartId {
    Latency,
    CpuUsage,
    RamUsage,
    SwapUsage,
    DiskRead,
    DiskWrite,
    NetRead,
    NetWrite,
    EngineDown,
    EngineUp,
}

impl ChartId {
    pub const ALL: [ChartId; 10] = [
        ChartId::Latency,
        ChartId::CpuUsage,
        ChartId::RamUsage,
        ChartId::SwapUsage,
        ChartId::DiskRead,
        ChartId::DiskWrite,
        ChartId::NetRead,
        ChartId::NetWrite,
        ChartId::EngineDown,
        ChartId::EngineUp,
    ];

    /// Element id of the chart, matching the text binding it mirrors.
    pub fn name(self) -> &'static str {
        match self {
            ChartId::Latency => "latency",
            ChartId::CpuUsage => "cpu_usage",
            ChartId::RamUsage => "ram_usage",
            ChartId::SwapUsage => "swap_usage",
            ChartId::DiskRead => "diskrs",
            ChartId::DiskWrite => "diskws",
            ChartId::NetRead => "netrs",
            ChartId::NetWrite => "netws",
            ChartId::EngineDown => "rtrs",
            ChartId::EngineUp => "rtws",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ChartId::Latency => "Latency ms",
            ChartId::CpuUsage => "CPU %",
            ChartId::RamUsage => "RAM %",
            ChartId::SwapUsage => "Swap %",
            ChartId::DiskRead => "Disk Read MiB/s",
            ChartId::DiskWrite => "Disk Write MiB/s",
            ChartId::NetRead => "Net In MiB/s",
            ChartId::NetWrite => "Net Out MiB/s",
            ChartId::EngineDown => "Engine Down MiB/s",
            ChartId::EngineUp => "Engine Up MiB/s",
        }
    }

    /// Percentage charts are drawn on a fixed `[0, 100]` range.
    pub fn is_percentage(self) -> bool {
        matches!(
            self,
            ChartId::CpuUsage | ChartId::RamUsage | ChartId::SwapUsage
        )
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Append-only, capacity-bounded buffer of `(timestamp_ms, value)` points.
#[derive(Clone, Debug)]
pub struct Series {
    points: VecDeque<(f64, f64)>,
    capacity: usize,
}

impl Series {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            points: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn append(&mut self, timestamp_ms: f64, value: f64) {
        if self.points.len() >= self.capacity {
            self.points.pop_front();
        }
        self.points.push_back((timestamp_ms, value));
    }

    pub fn points(&self) -> &VecDeque<(f64, f64)> {
        &self.points
    }

    pub fn latest(&self) -> Option<(f64, f64)> {
        self.points.back().copied()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// All chart series of the dashboard.
#[derive(Clone, Debug)]
pub struct ChartRegistry {
    series: Vec<Series>,
}

impl ChartRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            series: ChartId::ALL.iter().map(|_| Series::new(capacity)).collect(),
        }
    }

    pub fn append(&mut self, id: ChartId, timestamp_ms: f64, value: f64) {
        self.series[id.index()].append(timestamp_ms, value);
    }

    pub fn series(&self, id: ChartId) -> &Series {
        &self.series[id.index()]
    }
}
