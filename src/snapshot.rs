//! Typed view of one `/json/charts` response.
//!
//! The backend sends a loosely shaped JSON object: most values are
//! tuples serialized as arrays, some fields may be `null` when the
//! backend could not measure them, and newer backends add fields this
//! client does not know. [`Snapshot`] filters those out and
//! [`Metric::parse`] turns each remaining value into a typed payload.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::FieldError;

/// Snapshot fields this client has a handler for.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum MetricKind {
    Engine,
    Uptime,
    Fqdn,
    DiskUsage,
    DiskIo,
    NetIo,
    CpuUsage,
    RamUsage,
    SwapUsage,
}

impl MetricKind {
    pub const ALL: [MetricKind; 9] = [
        MetricKind::Engine,
        MetricKind::Uptime,
        MetricKind::Fqdn,
        MetricKind::DiskUsage,
        MetricKind::DiskIo,
        MetricKind::NetIo,
        MetricKind::CpuUsage,
        MetricKind::RamUsage,
        MetricKind::SwapUsage,
    ];

    /// Map a snapshot key to its kind; unknown keys have none.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.key() == key)
    }

    pub fn key(self) -> &'static str {
        match self {
            MetricKind::Engine => "engine",
            MetricKind::Uptime => "uptime",
            MetricKind::Fqdn => "fqdn",
            MetricKind::DiskUsage => "disk_usage",
            MetricKind::DiskIo => "disk_io",
            MetricKind::NetIo => "net_io",
            MetricKind::CpuUsage => "cpu_usage",
            MetricKind::RamUsage => "ram_usage",
            MetricKind::SwapUsage => "swap_usage",
        }
    }
}

/// One poll response.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    fields: Map<String, Value>,
}

impl Snapshot {
    /// Wrap a decoded response body; `None` if it is not a JSON object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self { fields }),
            _ => None,
        }
    }

    /// Known fields that are present and not `null`, in key order.
    pub fn fields(&self) -> impl Iterator<Item = (MetricKind, &Value)> {
        self.fields.iter().filter_map(|(key, value)| {
            if value.is_null() {
                return None;
            }
            MetricKind::from_key(key).map(|kind| (kind, value))
        })
    }

    /// Total number of keys, including unknown and null ones.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Current and cap of one transfer direction; a cap of 0 means unlimited.
#[derive(Clone, Copy, PartialEq, Debug, Default)]
pub struct Throughput {
    pub rate: f64,
    pub capacity: f64,
}

impl<'de> Deserialize<'de> for Throughput {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (rate, capacity) = <(f64, f64)>::deserialize(deserializer)?;
        Ok(Self { rate, capacity })
    }
}

/// A view size: plain count, or the `{ "size": n }` form.
#[derive(Clone, Copy, PartialEq, Debug, Deserialize)]
#[serde(untagged)]
pub enum ViewSize {
    Count(f64),
    Sized { size: f64 },
}

impl ViewSize {
    pub fn value(self) -> f64 {
        match self {
            ViewSize::Count(n) | ViewSize::Sized { size: n } => n,
        }
    }
}

/// Torrent engine status.
#[derive(Clone, PartialEq, Debug, Deserialize)]
pub struct EngineInfo {
    #[serde(default)]
    pub engine_id: String,
    #[serde(default)]
    pub uptime: f64,
    /// Client and library version
    #[serde(default)]
    pub versions: (String, String),
    #[serde(default)]
    pub views: BTreeMap<String, ViewSize>,
    /// Absent when the backend reports no rate for that direction
    #[serde(default)]
    pub download: Option<Throughput>,
    #[serde(default)]
    pub upload: Option<Throughput>,
    #[serde(default)]
    pub fqdn: Option<String>,
    /// Backend clock, unix seconds
    #[serde(default)]
    pub now: Option<f64>,
}

#[derive(Clone, Copy, PartialEq, Debug, Default)]
pub struct Volume {
    pub used: f64,
    pub total: f64,
}

/// Disk usage summed over the monitored paths, plus the per-path split
/// when the backend sends it.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct DiskUsage {
    pub used: f64,
    pub total: f64,
    pub volumes: Vec<Volume>,
}

/// Cumulative byte counters.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct IoCounters {
    pub read: u64,
    pub write: u64,
}

#[derive(Clone, Copy, PartialEq, Debug, Default)]
pub struct RamUsage {
    pub total: f64,
    pub free: f64,
    pub percent: f64,
}

#[derive(Clone, Copy, PartialEq, Debug, Default)]
pub struct SwapUsage {
    pub used: f64,
    pub percent: f64,
}

/// A parsed snapshot field.
#[derive(Clone, PartialEq, Debug)]
pub enum Metric {
    Engine(EngineInfo),
    Uptime(f64),
    Fqdn(String),
    DiskUsage(DiskUsage),
    DiskIo(IoCounters),
    NetIo(IoCounters),
    CpuUsage(f64),
    RamUsage(RamUsage),
    SwapUsage(SwapUsage),
}

impl Metric {
    /// Interpret `value` as the payload of `kind`.
    ///
    /// Tuple payloads may carry more items than are read here.
    pub fn parse(kind: MetricKind, value: &Value) -> Result<Metric, FieldError> {
        let field = kind.key();
        match kind {
            MetricKind::Engine => EngineInfo::deserialize(value)
                .map(Metric::Engine)
                .map_err(|_| FieldError::shape(field, "an engine status object")),
            MetricKind::Uptime => value
                .as_f64()
                .map(Metric::Uptime)
                .ok_or_else(|| FieldError::shape(field, "a number of seconds")),
            MetricKind::Fqdn => value
                .as_str()
                .map(|s| Metric::Fqdn(s.to_string()))
                .ok_or_else(|| FieldError::shape(field, "a host name string")),
            MetricKind::CpuUsage => value
                .as_f64()
                .map(Metric::CpuUsage)
                .ok_or_else(|| FieldError::shape(field, "a percentage")),
            MetricKind::DiskUsage => parse_disk_usage(value).map(Metric::DiskUsage),
            MetricKind::DiskIo => {
                let items = array(value, 4, field, "[_, _, read_bytes, write_bytes]")?;
                Ok(Metric::DiskIo(IoCounters {
                    read: counter(&items[2], field)?,
                    write: counter(&items[3], field)?,
                }))
            }
            MetricKind::NetIo => {
                let items = array(value, 2, field, "[bytes_sent, bytes_recv]")?;
                Ok(Metric::NetIo(IoCounters {
                    write: counter(&items[0], field)?,
                    read: counter(&items[1], field)?,
                }))
            }
            MetricKind::RamUsage => {
                let items = array(value, 3, field, "[total, free, percent]")?;
                Ok(Metric::RamUsage(RamUsage {
                    total: number(&items[0], field)?,
                    free: number(&items[1], field)?,
                    percent: number(&items[2], field)?,
                }))
            }
            MetricKind::SwapUsage => {
                let items = array(value, 4, field, "[_, used, _, percent]")?;
                Ok(Metric::SwapUsage(SwapUsage {
                    used: number(&items[1], field)?,
                    percent: number(&items[3], field)?,
                }))
            }
        }
    }
}

fn array<'a>(
    value: &'a Value,
    min_len: usize,
    field: &'static str,
    expected: &'static str,
) -> Result<&'a [Value], FieldError> {
    match value.as_array() {
        Some(items) if items.len() >= min_len => Ok(items),
        _ => Err(FieldError::shape(field, expected)),
    }
}

fn number(value: &Value, field: &'static str) -> Result<f64, FieldError> {
    value
        .as_f64()
        .ok_or_else(|| FieldError::shape(field, "numeric items"))
}

fn counter(value: &Value, field: &'static str) -> Result<u64, FieldError> {
    value
        .as_u64()
        .or_else(|| value.as_f64().filter(|n| *n >= 0.0).map(|n| n as u64))
        .ok_or_else(|| FieldError::shape(field, "non-negative byte counters"))
}

fn volume(value: &Value) -> Result<Volume, FieldError> {
    let field = MetricKind::DiskUsage.key();
    let items = array(value, 2, field, "volumes as [used, total] pairs")?;
    Ok(Volume {
        used: number(&items[0], field)?,
        total: number(&items[1], field)?,
    })
}

/// Accepts `[used, total]` and `[used, total, [[used, total], ...]]`.
fn parse_disk_usage(value: &Value) -> Result<DiskUsage, FieldError> {
    let field = MetricKind::DiskUsage.key();
    let items = array(value, 2, field, "[used, total] or [used, total, volumes]")?;

    let volumes = match items.get(2) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(list)) => list.iter().map(volume).collect::<Result<Vec<_>, _>>()?,
        Some(_) => return Err(FieldError::shape(field, "a list of volumes")),
    };

    let (used, total) = match (items[0].as_f64(), items[1].as_f64()) {
        (Some(used), Some(total)) => (used, total),
        _ if !volumes.is_empty() => (
            volumes.iter().map(|v| v.used).sum(),
            volumes.iter().map(|v| v.total).sum(),
        ),
        _ => return Err(FieldError::shape(field, "numeric used and total")),
    };

    Ok(DiskUsage {
        used,
        total,
        volumes,
    })
}
