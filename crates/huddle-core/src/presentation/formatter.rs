use crate::config::PresentationConfig;
use chrono::{DateTime, Datelike, TimeZone, Utc};
use std::fmt::Display;

/// Date separators and time labels for the message list.
///
/// Calendar comparisons are made in the time zone of the `now` argument, so
/// callers pass `Local::now()` in production and a fixed instant in tests.
#[derive(Debug, Clone, Default)]
pub struct Formatter {
    config: PresentationConfig,
}

impl Formatter {
    pub fn new(config: PresentationConfig) -> Self {
        Self { config }
    }

    /// Whether a separator goes above `current`.
    ///
    /// - no previous message: always
    /// - different calendar dates: always
    /// - same date: only when that date is today and the messages are at
    ///   least `separator_gap_minutes` apart. Older same-day messages never
    ///   get a gap separator.
    pub fn should_show_date_separator<Tz: TimeZone>(
        &self,
        current: &DateTime<Utc>,
        previous: Option<&DateTime<Utc>>,
        now: &DateTime<Tz>,
    ) -> bool {
        let Some(previous) = previous else {
            return true;
        };

        let tz = now.timezone();
        let current_date = current.with_timezone(&tz).date_naive();
        let previous_date = previous.with_timezone(&tz).date_naive();
        if current_date != previous_date {
            return true;
        }

        if current_date != now.date_naive() {
            return false;
        }

        let gap = if current >= previous {
            *current - *previous
        } else {
            *previous - *current
        };
        gap >= self.config.separator_gap()
    }

    /// Renders the label shown on a separator or a revealed timestamp.
    ///
    /// `9:05 AM` today, `Tue 9:05 AM` within the current week,
    /// `Mar 4, 9:05 AM` earlier this year and `Mar 4, 2024, 9:05 AM` before.
    pub fn format_date_label<Tz>(&self, timestamp: &DateTime<Utc>, now: &DateTime<Tz>) -> String
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        let local = timestamp.with_timezone(&now.timezone());

        let pattern = if local.date_naive() == now.date_naive() {
            "%-I:%M %p"
        } else if local.iso_week() == now.iso_week() {
            "%a %-I:%M %p"
        } else if local.year() == now.year() {
            "%b %-d, %-I:%M %p"
        } else {
            "%b %-d, %Y, %-I:%M %p"
        };
        local.format(pattern).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn cest() -> FixedOffset {
        FixedOffset::east_opt(2 * 3600).unwrap()
    }

    /// Friday 2026-10-16 15:00 +02:00
    fn now() -> DateTime<FixedOffset> {
        cest().with_ymd_and_hms(2026, 10, 16, 15, 0, 0).unwrap()
    }

    fn local(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        cest()
            .with_ymd_and_hms(y, mo, d, h, mi, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_first_message_gets_separator() {
        let formatter = Formatter::default();
        assert!(formatter.should_show_date_separator(&local(2026, 10, 16, 9, 0), None, &now()));
    }

    #[test]
    fn test_calendar_boundary_gets_separator() {
        let formatter = Formatter::default();
        let before_midnight = local(2026, 10, 14, 23, 55);
        let after_midnight = local(2026, 10, 15, 0, 5);

        assert!(formatter.should_show_date_separator(
            &after_midnight,
            Some(&before_midnight),
            &now()
        ));
    }

    #[test]
    fn test_boundary_is_evaluated_in_viewer_time_zone() {
        let formatter = Formatter::default();
        // same UTC date (Oct 13), different local dates
        let a = Utc.with_ymd_and_hms(2026, 10, 13, 21, 50, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2026, 10, 13, 22, 10, 0).unwrap();

        assert!(formatter.should_show_date_separator(&b, Some(&a), &now()));
        assert!(!formatter.should_show_date_separator(&b, Some(&a), &now().with_timezone(&Utc)));
    }

    #[test]
    fn test_today_gap_threshold() {
        let formatter = Formatter::default();
        let first = local(2026, 10, 16, 9, 0);

        assert!(!formatter.should_show_date_separator(
            &local(2026, 10, 16, 9, 10),
            Some(&first),
            &now()
        ));
        assert!(formatter.should_show_date_separator(
            &local(2026, 10, 16, 9, 25),
            Some(&first),
            &now()
        ));
        assert!(formatter.should_show_date_separator(
            &local(2026, 10, 16, 9, 30),
            Some(&first),
            &now()
        ));
    }

    #[test]
    fn test_older_same_day_messages_never_get_gap_separator() {
        let formatter = Formatter::default();
        let first = local(2026, 10, 13, 9, 0);

        assert!(!formatter.should_show_date_separator(
            &local(2026, 10, 13, 9, 10),
            Some(&first),
            &now()
        ));
        assert!(!formatter.should_show_date_separator(
            &local(2026, 10, 13, 17, 0),
            Some(&first),
            &now()
        ));
    }

    #[test]
    fn test_configured_gap() {
        let formatter = Formatter::new(PresentationConfig {
            separator_gap_minutes: 5,
        });
        let first = local(2026, 10, 16, 9, 0);
        assert!(formatter.should_show_date_separator(
            &local(2026, 10, 16, 9, 6),
            Some(&first),
            &now()
        ));
    }

    #[test]
    fn test_labels() {
        let formatter = Formatter::default();

        assert_eq!(
            formatter.format_date_label(&local(2026, 10, 16, 9, 5), &now()),
            "9:05 AM"
        );
        assert_eq!(
            formatter.format_date_label(&local(2026, 10, 13, 18, 30), &now()),
            "Tue 6:30 PM"
        );
        assert_eq!(
            formatter.format_date_label(&local(2026, 10, 10, 8, 0), &now()),
            "Oct 10, 8:00 AM"
        );
        assert_eq!(
            formatter.format_date_label(&local(2025, 3, 4, 9, 5), &now()),
            "Mar 4, 2025, 9:05 AM"
        );
    }
}
