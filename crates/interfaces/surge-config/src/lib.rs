//! Central configuration defaults for the traffic harness.
//!
//! Every knob here has a CLI flag with an env-var fallback; the defaults are
//! chosen so an unconfigured run targets a local instance of the service.

use std::time::Duration;

/// Default target base URL.
pub const DEFAULT_BASE_URL: &str = "http://localhost:19090";

/// Default bearer credential for webhook deliveries.
pub const DEFAULT_AUTH_TOKEN: &str = "loadtest-token-01";

/// Default shared secret for webhook signatures.
pub const DEFAULT_WEBHOOK_SECRET: &str = "loadtest-secret-01";

/// Default per-request timeout for all target calls.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Ingest scenario: ramp origin, stage targets and stage windows.
pub const DEFAULT_INGEST_START_RPS: u64 = 10;
pub const DEFAULT_INGEST_RPS: [u64; 3] = [50, 100, 200];
pub const DEFAULT_INGEST_STAGES: [&str; 3] = ["2m", "3m", "3m"];

/// Worker pool bounds for arrival-rate scenarios.
pub const DEFAULT_PRE_VUS: u64 = 20;
pub const DEFAULT_MAX_VUS: u64 = 200;

/// Read scenario: VU ramp origin, stage targets and stage windows.
pub const DEFAULT_READ_START_VUS: u64 = 5;
pub const DEFAULT_READ_VUS: [u64; 2] = [40, 100];
pub const DEFAULT_READ_STAGES: [&str; 3] = ["2m", "3m", "2m"];

/// Mixed scenario defaults.
pub const DEFAULT_MIXED_INGEST_RPS: u64 = 40;
pub const DEFAULT_MIXED_DURATION: &str = "8m";
pub const DEFAULT_MIXED_READ_VUS: u64 = 80;

/// Parse a stage/window duration: `30s`, `2m`, `1h`, or bare seconds.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("empty duration".to_string());
    }
    let (digits, unit) = match s.char_indices().find(|(_, c)| !c.is_ascii_digit()) {
        Some((idx, _)) => s.split_at(idx),
        None => (s, "s"),
    };
    let value: u64 = digits
        .parse()
        .map_err(|_| format!("invalid duration `{input}`"))?;
    let secs = match unit {
        "s" => value,
        "m" => value * 60,
        "h" => value * 3600,
        other => return Err(format!("unknown duration unit `{other}` in `{input}`")),
    };
    if secs == 0 {
        return Err(format!("duration `{input}` must be non-zero"));
    }
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_suffixed_durations() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
    }

    #[test]
    fn bare_number_means_seconds() {
        assert_eq!(parse_duration("45").unwrap(), Duration::from_secs(45));
    }

    #[test]
    fn rejects_zero_garbage_and_unknown_units() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("").is_err());
        assert!(parse_duration("fast").is_err());
        assert!(parse_duration("5d").is_err());
    }
}
