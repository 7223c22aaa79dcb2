//! Calendar windows for ledger reports.
//!
//! A window covers the calendar day or month containing a reference instant,
//! as seen in a given time zone. Bounds are half-open: `[start, end)`.

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::ReportError;

/// Length of a report window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportWindow {
    Day,
    Month,
}

impl ReportWindow {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportWindow::Day => "day",
            ReportWindow::Month => "month",
        }
    }

    /// Bounds of the window containing `now` in time zone `tz`.
    pub fn bounds_in<Tz: TimeZone>(
        &self,
        now: DateTime<Utc>,
        tz: &Tz,
    ) -> Result<(DateTime<Utc>, DateTime<Utc>), ReportError> {
        let today = now.with_timezone(tz).date_naive();
        let (first, next) = match self {
            ReportWindow::Day => (today, today.succ_opt()),
            ReportWindow::Month => {
                let first = NaiveDate::from_ymd_opt(today.year(), today.month(), 1);
                let next = if today.month() == 12 {
                    NaiveDate::from_ymd_opt(today.year() + 1, 1, 1)
                } else {
                    NaiveDate::from_ymd_opt(today.year(), today.month() + 1, 1)
                };
                match first {
                    Some(first) => (first, next),
                    None => return Err(out_of_range(now)),
                }
            }
        };
        let next = next.ok_or_else(|| out_of_range(now))?;

        Ok((start_of_day(tz, first)?, start_of_day(tz, next)?))
    }
}

impl std::fmt::Display for ReportWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReportWindow {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "day" | "diario" => Ok(ReportWindow::Day),
            "month" | "mensual" => Ok(ReportWindow::Month),
            other => Err(ReportError::InvalidInput(format!(
                "unknown report window '{other}'"
            ))),
        }
    }
}

/// First instant of `date` in `tz`. Zones that skip midnight start the day
/// at the first representable hour.
fn start_of_day<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> Result<DateTime<Utc>, ReportError> {
    (0..3)
        .filter_map(|hour| date.and_hms_opt(hour, 0, 0))
        .find_map(|naive| tz.from_local_datetime(&naive).earliest())
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| ReportError::InvalidInput(format!("no local midnight on {date}")))
}

fn out_of_range(now: DateTime<Utc>) -> ReportError {
    ReportError::InvalidInput(format!("report window around {now} is out of range"))
}

#[cfg(test)]
mod tests {
    use chrono::FixedOffset;

    use super::*;

    fn utc(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn day_window_is_half_open_midnight_to_midnight() {
        let (start, end) = ReportWindow::Day.bounds_in(utc(2026, 3, 15, 13), &Utc).unwrap();
        assert_eq!(start, utc(2026, 3, 15, 0));
        assert_eq!(end, utc(2026, 3, 16, 0));
    }

    #[test]
    fn month_window_rolls_over_the_year() {
        let (start, end) = ReportWindow::Month
            .bounds_in(utc(2025, 12, 31, 23), &Utc)
            .unwrap();
        assert_eq!(start, utc(2025, 12, 1, 0));
        assert_eq!(end, utc(2026, 1, 1, 0));
    }

    #[test]
    fn bounds_follow_the_time_zone() {
        // 02:00 UTC is still the previous day at UTC-5.
        let tz = FixedOffset::west_opt(5 * 3600).unwrap();
        let (start, end) = ReportWindow::Day.bounds_in(utc(2026, 3, 15, 2), &tz).unwrap();
        assert_eq!(start, utc(2026, 3, 14, 5));
        assert_eq!(end, utc(2026, 3, 15, 5));
    }

    #[test]
    fn parses_both_spellings() {
        assert_eq!("day".parse::<ReportWindow>().unwrap(), ReportWindow::Day);
        assert_eq!("mensual".parse::<ReportWindow>().unwrap(), ReportWindow::Month);
        assert!(matches!(
            "weekly".parse::<ReportWindow>(),
            Err(ReportError::InvalidInput(_))
        ));
    }
}
