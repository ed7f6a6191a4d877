//! Time utilities for the match clock

use std::sync::OnceLock;
use std::time::{Duration, Instant};

/// Real-time length of one match-clock second
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(DEFAULT_TICK_INTERVAL_MS);

/// Server start time for uptime tracking
static SERVER_START: OnceLock<Instant> = OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Format a countdown as `m:ss`
pub fn format_match_clock(seconds: u32) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_match_clock() {
        assert_eq!(format_match_clock(0), "0:00");
        assert_eq!(format_match_clock(59), "0:59");
        assert_eq!(format_match_clock(300), "5:00");
        assert_eq!(format_match_clock(3725), "62:05");
    }

    #[test]
    fn test_uptime_after_init() {
        init_server_time();
        assert!(uptime_secs() < 60);
    }
}
