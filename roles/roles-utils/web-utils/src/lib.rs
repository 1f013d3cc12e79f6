use std::time::{SystemTime, UNIX_EPOCH};

pub mod hashrate;

pub use hashrate::{format_hashrate, parse_hashrate, round_half_away, Magnitude};

/// Current Unix timestamp in seconds.
pub fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Format elapsed time in human-readable format
/// Used for the last share card on the user page
pub fn format_elapsed_time(now: u64, timestamp: u64) -> String {
    let elapsed = now.saturating_sub(timestamp);
    if elapsed < 60 {
        format!("{}s ago", elapsed)
    } else if elapsed < 3600 {
        format!("{}m ago", elapsed / 60)
    } else if elapsed < 86400 {
        format!("{}h ago", elapsed / 3600)
    } else {
        format!("{}d ago", elapsed / 86400)
    }
}

/// Pool runtime as `"{days}d {hours}h {minutes}m"`
pub fn format_uptime(runtime_secs: u64) -> String {
    let days = runtime_secs / 86400;
    let hours = (runtime_secs % 86400) / 3600;
    let minutes = (runtime_secs % 3600) / 60;
    format!("{}d {}h {}m", days, hours, minutes)
}

/// UTC wall-clock time of day (`HH:MM:SS`), used as chart labels.
pub fn format_time_of_day(unix_secs: u64) -> String {
    let secs_of_day = unix_secs % 86400;
    format!(
        "{:02}:{:02}:{:02}",
        secs_of_day / 3600,
        (secs_of_day % 3600) / 60,
        secs_of_day % 60
    )
}

/// Share difficulties are shown with two decimals, like the hashrate cards.
pub fn format_share(difficulty: f64) -> String {
    format!("{:.2}", round_half_away(difficulty))
}

/// Escape text for interpolation into HTML element content or attributes.
/// Worker names come straight from miners, so everything user-supplied goes through here.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_elapsed_seconds() {
        assert_eq!(format_elapsed_time(100, 50), "50s ago");
    }

    #[test]
    fn test_format_elapsed_minutes() {
        assert_eq!(format_elapsed_time(3700, 0), "61m ago");
    }

    #[test]
    fn test_format_elapsed_future_timestamp() {
        assert_eq!(format_elapsed_time(10, 50), "0s ago");
    }

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(0), "0d 0h 0m");
        assert_eq!(format_uptime(2_373_426), "27d 11h 17m");
    }

    #[test]
    fn test_format_time_of_day() {
        assert_eq!(format_time_of_day(0), "00:00:00");
        assert_eq!(format_time_of_day(1_752_001_916), "19:11:56");
    }

    #[test]
    fn test_format_share() {
        assert_eq!(format_share(83821924668426.0), "83821924668426.00");
        assert_eq!(format_share(1.005), "1.00");
        assert_eq!(format_share(42.125), "42.13");
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<rig "1">&'x'"#),
            "&lt;rig &quot;1&quot;&gt;&amp;&#39;x&#39;"
        );
        assert_eq!(escape_html("bc1qxyz.rig1"), "bc1qxyz.rig1");
    }
}
