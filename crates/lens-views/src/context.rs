//! Per-session presentation settings

use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, Utc};
use serde::{Deserialize, Serialize};

/// Number and time formatting shared by the models of one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresentationContext {
    /// Digit grouping separator for counts; `None` disables grouping
    pub thousands_separator: Option<char>,
    /// Offset of the session's local time from UTC
    pub utc_offset_seconds: i32,
    /// Caption shown for empty group values
    pub empty_label: String,
}

impl Default for PresentationContext {
    fn default() -> Self {
        Self {
            thousands_separator: Some(','),
            utc_offset_seconds: 0,
            empty_label: "(empty)".to_string(),
        }
    }
}

impl PresentationContext {
    pub fn format_count(&self, count: u64) -> String {
        let digits = count.to_string();
        let Some(separator) = self.thousands_separator else {
            return digits;
        };

        let mut formatted = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, digit) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                formatted.push(separator);
            }
            formatted.push(digit);
        }
        formatted
    }

    pub fn title_with_count(&self, title: &str, count: u64) -> String {
        format!("{} ({})", title, self.format_count(count))
    }

    /// Session offset; out-of-range offsets fall back to UTC
    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_seconds).unwrap_or_else(|| Utc.fix())
    }

    /// Wall-clock time of a millisecond timestamp in the session's offset
    pub fn local_time(&self, millis: i64) -> Option<NaiveDateTime> {
        DateTime::<Utc>::from_timestamp_millis(millis).map(|dt| dt.with_timezone(&self.offset()).naive_local())
    }

    /// Millisecond timestamp of a wall-clock time in the session's offset
    pub fn to_millis(&self, local: NaiveDateTime) -> i64 {
        local.and_utc().timestamp_millis() - i64::from(self.offset().local_minus_utc()) * 1000
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_format_count() {
        let context = PresentationContext::default();
        assert_eq!(context.format_count(0), "0");
        assert_eq!(context.format_count(999), "999");
        assert_eq!(context.format_count(1_000), "1,000");
        assert_eq!(context.format_count(1_234_567), "1,234,567");

        let plain = PresentationContext {
            thousands_separator: None,
            ..PresentationContext::default()
        };
        assert_eq!(plain.format_count(1_234_567), "1234567");
    }

    #[test]
    fn test_title_with_count() {
        let context = PresentationContext {
            thousands_separator: Some('.'),
            ..PresentationContext::default()
        };
        assert_eq!(context.title_with_count("Events", 12_500), "Events (12.500)");
    }

    #[test]
    fn test_local_time_round_trip() {
        let context = PresentationContext {
            utc_offset_seconds: 2 * 3600,
            ..PresentationContext::default()
        };
        let local = context.local_time(0).unwrap();
        assert_eq!(
            local,
            NaiveDate::from_ymd_opt(1970, 1, 1).unwrap().and_hms_opt(2, 0, 0).unwrap()
        );
        assert_eq!(context.to_millis(local), 0);
    }
}
