//! Display formatting for raw metric values.
//!
//! All functions here are pure: they turn seconds, byte counts and
//! percentages into the strings shown on the dashboard.

/// Unit family used by [`format_bytes`].
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum UnitMode {
    /// Powers of 1024 (KiB, MiB, ...)
    #[default]
    Binary,
    /// Powers of 1000 (KB, MB, ...)
    Decimal,
}

impl UnitMode {
    fn base(self) -> f64 {
        match self {
            UnitMode::Binary => 2.0,
            UnitMode::Decimal => 10.0,
        }
    }

    fn exp(self) -> i32 {
        match self {
            UnitMode::Binary => 10,
            UnitMode::Decimal => 3,
        }
    }

    fn units(self) -> [&'static str; 6] {
        match self {
            UnitMode::Binary => ["B", "KiB", "MiB", "GiB", "TiB", "PiB"],
            UnitMode::Decimal => ["B", "KB", "MB", "GB", "TB", "PB"],
        }
    }
}

/// Bytes per MiB, the scale used for throughput charts.
pub const MIB: f64 = 1_048_576.0;

/// Format a number of seconds as `"<days>d HH:MM:SS"`.
pub fn format_duration(seconds: f64) -> String {
    let n = seconds.max(0.0);
    let days = (n / 86_400.0).floor() as u64;
    let hours = (n / 3_600.0).floor() as u64 % 24;
    let minutes = (n / 60.0).floor() as u64 % 60;
    let secs = n.floor() as u64 % 60;
    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, secs)
}

/// Format a byte count with two decimals and a magnitude suffix.
///
/// The largest unit whose threshold (`base^(i*exp) - 1`) the value meets
/// is chosen, so `0` and anything below one KiB end up as plain bytes.
pub fn format_bytes(value: f64, mode: UnitMode) -> String {
    let units = mode.units();
    for i in (1..units.len()).rev() {
        let scale = mode.base().powi(i as i32 * mode.exp());
        if value >= scale - 1.0 {
            return format!("{:.2} {}", value / scale, units[i]);
        }
    }
    format!("{:.2} {}", value, units[0])
}

/// Format a percentage with one decimal.
pub fn format_percent(value: f64) -> String {
    format!("{:.1}%", value)
}

/// `100 * part / whole`, or `None` when `whole` is not positive.
pub fn percent_of(part: f64, whole: f64) -> Option<f64> {
    if whole > 0.0 {
        Some(100.0 * part / whole)
    } else {
        None
    }
}

/// Format `part` as a percentage of `whole`, `"n/a"` for a zero capacity.
pub fn format_ratio(part: f64, whole: f64) -> String {
    percent_of(part, whole)
        .map(format_percent)
        .unwrap_or_else(|| "n/a".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes_zero() {
        assert_eq!(format_bytes(0.0, UnitMode::Binary), "0.00 B");
        assert_eq!(format_bytes(0.0, UnitMode::Decimal), "0.00 B");
    }

    #[test]
    fn test_format_bytes_unit_boundaries() {
        assert_eq!(format_bytes(1024.0, UnitMode::Binary), "1.00 KiB");
        assert_eq!(format_bytes(1000.0, UnitMode::Decimal), "1.00 KB");
        assert_eq!(format_bytes(512.0, UnitMode::Binary), "512.00 B");
        assert_eq!(format_bytes(1_572_864.0, UnitMode::Binary), "1.50 MiB");
        assert_eq!(format_bytes(2.5e9, UnitMode::Decimal), "2.50 GB");
    }

    #[test]
    fn test_format_bytes_threshold_is_one_below_power() {
        // 1023 meets the `1024 - 1` threshold
        assert_eq!(format_bytes(1023.0, UnitMode::Binary), "1.00 KiB");
        assert_eq!(format_bytes(1022.0, UnitMode::Binary), "1022.00 B");
    }

    #[test]
    fn test_format_bytes_negative_uses_smallest_unit() {
        assert_eq!(format_bytes(-5.0, UnitMode::Binary), "-5.00 B");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(90_061.0), "1d 01:01:01");
        assert_eq!(format_duration(0.0), "0d 00:00:00");
        assert_eq!(format_duration(59.9), "0d 00:00:59");
        assert_eq!(format_duration(3_600.0 * 49.0), "2d 01:00:00");
    }

    #[test]
    fn test_format_percent() {
        assert_eq!(format_percent(33.333), "33.3%");
        assert_eq!(format_percent(100.0), "100.0%");
    }

    #[test]
    fn test_ratio_guards_zero_capacity() {
        assert_eq!(percent_of(5.0, 0.0), None);
        assert_eq!(format_ratio(5.0, 0.0), "n/a");
        assert_eq!(format_ratio(25.0, 100.0), "25.0%");
    }
}
