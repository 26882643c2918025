use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, Utc};

/// Server-side marker for a timestamp that is not yet known.
pub const UNKNOWN_SENTINEL: &str = "-";

/// Label shown for a folder whose modification time has not been collected yet.
pub const COLLECTING_LABEL: &str = "collecting";

/// Label shown for the last-shutdown header when no shutdown has been recorded.
pub const NO_INFO_LABEL: &str = "no info";

const SECONDS_BUCKET_LIMIT: i64 = 150;
const MINUTES_BUCKET_LIMIT: i64 = 3600;
const HOURS_BUCKET_LIMIT: i64 = 86400;

/// Turns server timestamps into relative "n ago" labels.
///
/// The server reports naive local timestamps (`%Y-%m-%d %H:%M:%S`) in a fixed
/// UTC offset; offset-qualified ISO strings are parsed as-is.
#[derive(Debug, Clone, Copy)]
pub struct TimeFormatter {
    offset: FixedOffset,
}

impl TimeFormatter {
    pub fn new(utc_offset_minutes: i32) -> Self {
        let seconds = utc_offset_minutes.clamp(-17 * 60, 17 * 60) * 60;
        let offset = FixedOffset::east_opt(seconds).unwrap_or_else(|| Utc.fix());
        Self { offset }
    }

    /// Parse a server timestamp. Returns `None` for the unknown sentinel and
    /// for anything unparseable.
    pub fn parse(&self, raw: &str) -> Option<DateTime<Utc>> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == UNKNOWN_SENTINEL {
            return None;
        }

        // Strings carrying an explicit offset or Z designator parse as-is.
        let candidate = trimmed.replacen(' ', "T", 1);
        if let Ok(parsed) = DateTime::parse_from_rfc3339(&candidate) {
            return Some(parsed.with_timezone(&Utc));
        }

        let naive = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S")
            .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S"))
            .ok()?;
        naive
            .and_local_timezone(self.offset)
            .single()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Format a server timestamp as a relative label.
    ///
    /// Unparseable input (including the sentinel) is returned unchanged so the
    /// caller never loses the raw value. Small negative diffs from clock skew
    /// clamp to the zero bucket.
    pub fn relative(&self, raw: &str, now: DateTime<Utc>) -> String {
        let Some(parsed) = self.parse(raw) else {
            return raw.to_string();
        };

        let diff = now.signed_duration_since(parsed).num_seconds().max(0);
        if diff < SECONDS_BUCKET_LIMIT {
            format!("{}s ago", diff)
        } else if diff < MINUTES_BUCKET_LIMIT {
            format!("{} min ago", diff / 60)
        } else if diff < HOURS_BUCKET_LIMIT {
            format!("{} h ago", diff / 3600)
        } else {
            format!("{} d ago", diff / 86400)
        }
    }

    /// Sort key for ordering entries by recency. Unparseable or unknown
    /// timestamps sort as oldest.
    pub fn sort_key(&self, raw: &str) -> i64 {
        self.parse(raw).map(|dt| dt.timestamp()).unwrap_or(i64::MIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn formatter() -> TimeFormatter {
        TimeFormatter::new(9 * 60)
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn local_ts(secs_before_now: i64) -> String {
        // Render "now - secs" in the fixed +09:00 offset, naive format.
        let offset = FixedOffset::east_opt(9 * 3600).unwrap();
        (now() - chrono::Duration::seconds(secs_before_now))
            .with_timezone(&offset)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
    }

    #[test]
    fn seconds_bucket_below_threshold() {
        assert_eq!(formatter().relative(&local_ts(0), now()), "0s ago");
        assert_eq!(formatter().relative(&local_ts(149), now()), "149s ago");
    }

    #[test]
    fn minutes_bucket_starts_at_150() {
        assert_eq!(formatter().relative(&local_ts(150), now()), "2 min ago");
        assert_eq!(formatter().relative(&local_ts(3599), now()), "59 min ago");
    }

    #[test]
    fn hours_bucket_starts_at_3600() {
        assert_eq!(formatter().relative(&local_ts(3600), now()), "1 h ago");
        assert_eq!(formatter().relative(&local_ts(86399), now()), "23 h ago");
    }

    #[test]
    fn days_bucket_starts_at_86400() {
        assert_eq!(formatter().relative(&local_ts(86400), now()), "1 d ago");
        assert_eq!(formatter().relative(&local_ts(3 * 86400 + 7), now()), "3 d ago");
    }

    #[test]
    fn unparseable_input_is_returned_unchanged() {
        assert_eq!(formatter().relative("not a time", now()), "not a time");
        assert_eq!(formatter().relative("-", now()), "-");
        assert_eq!(formatter().relative("", now()), "");
    }

    #[test]
    fn negative_diff_clamps_to_zero_bucket() {
        assert_eq!(formatter().relative(&local_ts(-30), now()), "0s ago");
    }

    #[test]
    fn offset_qualified_strings_parse_as_is() {
        // Same instant expressed in UTC directly; the fixed offset must not
        // be applied a second time.
        let raw = "2025-06-01T11:59:00Z";
        assert_eq!(formatter().relative(raw, now()), "60s ago");

        let raw = "2025-06-01 20:59:00+09:00";
        assert_eq!(formatter().relative(raw, now()), "60s ago");
    }

    #[test]
    fn sort_key_orders_sentinel_last() {
        let f = formatter();
        assert_eq!(f.sort_key("-"), i64::MIN);
        assert_eq!(f.sort_key("garbage"), i64::MIN);
        assert!(f.sort_key(&local_ts(10)) > f.sort_key(&local_ts(20)));
    }
}
