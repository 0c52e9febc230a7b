//! Formatted output helpers for CLI commands.
//!
//! Provides consistent column formatting for container tables and
//! human-readable age strings.

use chrono::{DateTime, Utc};

use berth_common::types::PortMapping;

/// Formats published ports as `host->container` pairs, or `-` when none.
#[must_use]
pub fn format_ports(ports: &[PortMapping]) -> String {
    if ports.is_empty() {
        return "-".into();
    }
    ports
        .iter()
        .map(|p| format!("{}->{}", p.host, p.container))
        .collect::<Vec<_>>()
        .join(",")
}

/// Formats how long ago `created` was, relative to `now`.
#[must_use]
pub fn format_age(created: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(created) = created else {
        return "-".into();
    };
    let secs = (now - created).num_seconds().max(0);
    match secs {
        0..60 => format!("{secs}s"),
        60..3_600 => format!("{}m", secs / 60),
        3_600..86_400 => format!("{}h", secs / 3_600),
        _ => format!("{}d", secs / 86_400),
    }
}

/// Shortens `s` to `max` characters, marking the cut with `…`.
#[must_use]
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_owned();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_ports_lists_pairs() {
        let ports = [
            PortMapping { host: 8080, container: 80 },
            PortMapping { host: 8443, container: 443 },
        ];
        assert_eq!(format_ports(&ports), "8080->80,8443->443");
    }

    #[test]
    fn format_ports_dash_when_empty() {
        assert_eq!(format_ports(&[]), "-");
    }

    #[test]
    fn format_age_picks_largest_unit() {
        let now = Utc::now();
        assert_eq!(format_age(Some(now - chrono::Duration::seconds(42)), now), "42s");
        assert_eq!(format_age(Some(now - chrono::Duration::minutes(5)), now), "5m");
        assert_eq!(format_age(Some(now - chrono::Duration::hours(3)), now), "3h");
        assert_eq!(format_age(Some(now - chrono::Duration::days(9)), now), "9d");
        assert_eq!(format_age(None, now), "-");
    }

    #[test]
    fn truncate_keeps_short_strings() {
        assert_eq!(truncate("nginx", 10), "nginx");
        assert_eq!(truncate("registry.example.com/app", 10), "registry.…");
    }
}
