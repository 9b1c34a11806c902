use chrono::{DateTime, Utc};

/// Render a byte count the way humans read it (decimal units, one decimal).
pub fn bytes_readable(bytes: u64) -> String {
    const UNITS: &[&str] = &["kB", "MB", "GB", "TB", "PB"];

    if bytes < 1000 {
        return format!("{bytes} B");
    }

    let mut value = bytes as f64;
    let mut unit = "";
    for candidate in UNITS {
        value /= 1000.0;
        unit = candidate;
        if value < 1000.0 {
            break;
        }
    }

    format!("{value:.1} {unit}")
}

/// Render how far `at` lies from `now`, e.g. "5 minutes ago" or "in 6 days".
pub fn relative_time(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let delta = now.signed_duration_since(at);
    let past = delta.num_seconds() >= 0;
    let secs = delta.num_seconds().unsigned_abs();

    let (count, word) = if secs < 60 {
        (secs, "second")
    } else if secs < 3600 {
        (secs / 60, "minute")
    } else if secs < 86_400 {
        (secs / 3600, "hour")
    } else {
        (secs / 86_400, "day")
    };

    let plural = if count == 1 { "" } else { "s" };
    if past {
        format!("{count} {word}{plural} ago")
    } else {
        format!("in {count} {word}{plural}")
    }
}
