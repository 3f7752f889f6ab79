use std::time::Duration;

/// Converts a wrk latency value to milliseconds.
///
/// Unknown units are passed through untouched, which treats them as
/// milliseconds.
pub fn latency_to_ms(value: f64, unit: &str) -> f64 {
    match unit {
        "us" | "μs" => value / 1000.0,
        "ms" => value,
        "s" => value * 1000.0,
        _ => value,
    }
}

/// Converts a wrk `Transfer/sec` value to bytes using binary multiples.
pub fn transfer_to_bytes(value: f64, unit: &str) -> Option<f64> {
    let multiplier = match unit {
        "B" => 1.0,
        "KB" => 1024.0,
        "MB" => 1024.0 * 1024.0,
        "GB" => 1024.0 * 1024.0 * 1024.0,
        _ => return None,
    };
    Some(value * multiplier)
}

/// Parses a wrk duration argument such as `30s`, `2m` or `1h`.
/// A bare number is read as seconds, the same way wrk does.
pub fn parse_wrk_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    let (num, multiplier) = if let Some(stripped) = s.strip_suffix('h') {
        (stripped, 3600)
    } else if let Some(stripped) = s.strip_suffix('m') {
        (stripped, 60)
    } else if let Some(stripped) = s.strip_suffix('s') {
        (stripped, 1)
    } else {
        (s, 1)
    };
    num.parse::<u64>()
        .ok()
        .map(|v| Duration::from_secs(v * multiplier))
}

pub fn bytes_to_mb(bytes: f64) -> f64 {
    bytes / 1024.0 / 1024.0
}
