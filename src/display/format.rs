use std::time::Duration;

/// Formats a latency at the coarsest unit that keeps a whole number:
/// microseconds under 1ms, milliseconds under 1s, else seconds.
/// Values truncate rather than round.
pub fn format_latency(latency: Duration) -> String {
    if latency < Duration::from_millis(1) {
        format!("{}µs", latency.as_micros())
    } else if latency < Duration::from_secs(1) {
        format!("{}ms", latency.as_millis())
    } else {
        format!("{}s", latency.as_secs())
    }
}

/// Formats a success percentage with two decimals, or "-" before any
/// request has completed.
pub fn format_success_rate(successes: u64, failures: u64) -> String {
    let total = successes + failures;
    if total == 0 {
        return "-".to_string();
    }
    format!("{:.2}%", 100.0 * successes as f64 / total as f64)
}
