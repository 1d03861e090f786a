// qdrant-backup/src/utils/format.rs
use chrono::{DateTime, Local, Utc};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const SIZE_UNITS: [&str; 9] = ["B", "KB", "MB", "GB", "TB", "PB", "EB", "ZB", "YB"];

/// Renders a byte count in binary units, rounded to two decimals.
///
/// `0` is rendered as `"0B"`; everything else as `"<value> <unit>"` with trailing
/// zeros dropped (`1024` -> `"1 KB"`, `1536` -> `"1.5 KB"`).
pub fn format_size(size_bytes: u64) -> String {
    if size_bytes == 0 {
        return "0B".to_string();
    }

    let mut unit = 0;
    let mut divisor: u128 = 1;
    while unit + 1 < SIZE_UNITS.len() && (size_bytes as u128) >= divisor * 1024 {
        divisor *= 1024;
        unit += 1;
    }

    let value = size_bytes as f64 / divisor as f64;
    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, SIZE_UNITS[unit])
}

/// Renders a storage timestamp in local time.
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp
        .with_timezone(&Local)
        .format(TIMESTAMP_FORMAT)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDateTime, TimeZone};

    fn matches_size_pattern(s: &str) -> bool {
        let Some((number, unit)) = s.split_once(' ') else {
            return false;
        };
        if !SIZE_UNITS.contains(&unit) {
            return false;
        }
        let (whole, frac) = match number.split_once('.') {
            Some((w, f)) => (w, Some(f)),
            None => (number, None),
        };
        let digits = |p: &str| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit());
        digits(whole) && frac.is_none_or(|f| digits(f) && f.len() <= 2)
    }

    #[test]
    fn test_format_size_known_values() {
        assert_eq!(format_size(0), "0B");
        assert_eq!(format_size(1), "1 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1024), "1 KB");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(1024 * 1024), "1 MB");
        assert_eq!(format_size(5 * 1024 * 1024 * 1024), "5 GB");
        assert_eq!(format_size(1_288_490_189), "1.2 GB");
    }

    #[test]
    fn test_format_size_matches_pattern() {
        let samples = [
            1u64,
            999,
            1025,
            123_456,
            7_654_321,
            98_765_432_101,
            1 << 50,
            (1 << 60) + 12_345,
            u64::MAX,
        ];
        for n in samples {
            let rendered = format_size(n);
            assert!(matches_size_pattern(&rendered), "{n} -> {rendered}");
        }
    }

    #[test]
    fn test_format_timestamp_reparses() -> anyhow::Result<()> {
        for secs in [0i64, 1_709_600_000, 1_893_456_000] {
            let ts = Utc
                .timestamp_opt(secs, 0)
                .single()
                .ok_or_else(|| anyhow::anyhow!("invalid timestamp {secs}"))?;
            let rendered = format_timestamp(&ts);
            let parsed = NaiveDateTime::parse_from_str(&rendered, TIMESTAMP_FORMAT)?;
            assert_eq!(parsed.format(TIMESTAMP_FORMAT).to_string(), rendered);
        }
        Ok(())
    }
}
