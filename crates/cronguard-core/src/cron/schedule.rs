//! Parsed cron schedule and next-fire computation.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Timelike};

use super::CronParseError;
use super::field::{CronField, FieldKind};

/// How far ahead `next_after` searches before giving up.
/// Leap-day schedules pinned to a weekday can be decades apart.
const MAX_YEARS_AHEAD: i32 = 30;

/// A parsed six-field cron expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSchedule {
    expression: String,
    seconds: CronField,
    minutes: CronField,
    hours: CronField,
    days_of_month: CronField,
    months: CronField,
    days_of_week: CronField,
}

impl CronSchedule {
    /// Parse `second minute hour day-of-month month day-of-week`.
    /// A five-field expression is accepted and fires at second 0.
    pub fn parse(expression: &str) -> Result<Self, CronParseError> {
        let parts: Vec<&str> = expression.split_whitespace().collect();
        let parts: [&str; 6] = match parts.as_slice() {
            &[s, m, h, dom, mon, dow] => [s, m, h, dom, mon, dow],
            &[m, h, dom, mon, dow] => ["0", m, h, dom, mon, dow],
            _ => return Err(CronParseError::InvalidFieldCount(parts.len())),
        };

        Ok(Self {
            expression: expression.trim().to_string(),
            seconds: CronField::parse(FieldKind::Second, parts[0])?,
            minutes: CronField::parse(FieldKind::Minute, parts[1])?,
            hours: CronField::parse(FieldKind::Hour, parts[2])?,
            days_of_month: CronField::parse(FieldKind::DayOfMonth, parts[3])?,
            months: CronField::parse(FieldKind::Month, parts[4])?,
            days_of_week: CronField::parse(FieldKind::DayOfWeek, parts[5])?,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Does this wall-clock time (in whatever zone it was taken) match?
    pub fn matches<Tz: TimeZone>(&self, dt: &DateTime<Tz>) -> bool {
        let local = dt.naive_local();
        self.matches_day(local.date())
            && self.hours.matches(local.hour())
            && self.minutes.matches(local.minute())
            && self.seconds.matches(local.second())
    }

    /// First matching instant strictly after `after`, in `after`'s time zone.
    ///
    /// Local times that do not exist (DST gap) are skipped; a repeated local time
    /// (DST overlap) fires once, at its earliest occurrence.
    pub fn next_after<Tz: TimeZone>(&self, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        let tz = after.timezone();
        let start = after.naive_local().with_nanosecond(0)? + chrono::Duration::seconds(1);
        let limit_year = start.year() + MAX_YEARS_AHEAD;

        let mut candidate = start;
        loop {
            let naive = self.next_local_match(candidate, limit_year)?;
            match tz.from_local_datetime(&naive).earliest() {
                Some(dt) if dt > *after => return Some(dt),
                _ => candidate = naive + chrono::Duration::seconds(1),
            }
        }
    }

    fn matches_day(&self, date: NaiveDate) -> bool {
        self.months.matches(date.month())
            && self.days_of_month.matches(date.day())
            && self
                .days_of_week
                .matches(date.weekday().num_days_from_sunday())
    }

    /// Earliest naive local time >= `from` matching every field.
    fn next_local_match(&self, from: NaiveDateTime, limit_year: i32) -> Option<NaiveDateTime> {
        let mut t = from;
        while t.year() <= limit_year {
            let date = t.date();
            if !self.months.matches(date.month()) {
                t = first_of_next_month(date)?.and_hms_opt(0, 0, 0)?;
                continue;
            }
            if !self.matches_day(date) {
                t = date.succ_opt()?.and_hms_opt(0, 0, 0)?;
                continue;
            }
            if !self.hours.matches(t.hour()) {
                t = date.and_hms_opt(t.hour(), 0, 0)? + chrono::Duration::hours(1);
                continue;
            }
            if !self.minutes.matches(t.minute()) {
                t = date.and_hms_opt(t.hour(), t.minute(), 0)? + chrono::Duration::minutes(1);
                continue;
            }
            if !self.seconds.matches(t.second()) {
                t += chrono::Duration::seconds(1);
                continue;
            }
            return Some(t);
        }
        None
    }
}

fn first_of_next_month(date: NaiveDate) -> Option<NaiveDate> {
    if date.month() == 12 {
        NaiveDate::from_ymd_opt(date.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(date.year(), date.month() + 1, 1)
    }
}

impl FromStr for CronSchedule {
    type Err = CronParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CronSchedule::parse(s)
    }
}

impl fmt::Display for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use chrono_tz::Tz;
    use rstest::rstest;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn every_two_seconds() {
        let schedule = CronSchedule::parse("*/2 * * * * *").unwrap();
        let next = schedule.next_after(&utc(2024, 1, 15, 14, 30, 1)).unwrap();
        assert_eq!(next, utc(2024, 1, 15, 14, 30, 2));

        // 発火時刻ちょうどからは次の枠
        let after_that = schedule.next_after(&next).unwrap();
        assert_eq!(after_that, utc(2024, 1, 15, 14, 30, 4));
    }

    #[test]
    fn fractional_seconds_do_not_refire_the_same_second() {
        let schedule = CronSchedule::parse("* * * * * *").unwrap();
        let after = utc(2024, 1, 15, 14, 30, 1) + chrono::Duration::milliseconds(999);
        assert_eq!(schedule.next_after(&after).unwrap(), utc(2024, 1, 15, 14, 30, 2));
    }

    #[rstest]
    #[case::top_of_hour("0 0 * * * *", utc(2024, 1, 15, 14, 30, 0), utc(2024, 1, 15, 15, 0, 0))]
    #[case::daily_3am("0 0 3 * * *", utc(2024, 1, 15, 14, 30, 0), utc(2024, 1, 16, 3, 0, 0))]
    #[case::year_rollover("0 0 0 1 1 *", utc(2024, 12, 31, 23, 59, 59), utc(2025, 1, 1, 0, 0, 0))]
    #[case::weekdays_only("0 0 9 * * MON-FRI", utc(2024, 1, 12, 10, 0, 0), utc(2024, 1, 15, 9, 0, 0))]
    #[case::leap_day("0 0 12 29 2 *", utc(2023, 3, 1, 0, 0, 0), utc(2024, 2, 29, 12, 0, 0))]
    #[case::five_fields("30 4 * * *", utc(2024, 1, 15, 4, 30, 0), utc(2024, 1, 16, 4, 30, 0))]
    fn computes_next_fire_time(
        #[case] expr: &str,
        #[case] after: DateTime<Utc>,
        #[case] expected: DateTime<Utc>,
    ) {
        let schedule = CronSchedule::parse(expr).unwrap();
        assert_eq!(schedule.next_after(&after), Some(expected));
        assert!(schedule.matches(&expected));
    }

    #[test]
    fn impossible_date_has_no_next_fire() {
        let schedule = CronSchedule::parse("0 0 0 31 2 *").unwrap();
        assert_eq!(schedule.next_after(&utc(2024, 1, 1, 0, 0, 0)), None);
    }

    #[test]
    fn evaluates_in_the_given_time_zone() {
        let tokyo: Tz = "Asia/Tokyo".parse().unwrap();
        let schedule = CronSchedule::parse("0 0 9 * * *").unwrap();

        let after = utc(2024, 1, 15, 0, 30, 0).with_timezone(&tokyo); // 09:30 JST
        let next = schedule.next_after(&after).unwrap();

        assert_eq!(next.with_timezone(&Utc), utc(2024, 1, 16, 0, 0, 0));
    }

    #[test]
    fn skips_local_times_that_do_not_exist() {
        // 2024-03-10 02:30 does not exist in New York (clocks jump 02:00 -> 03:00)
        let new_york: Tz = "America/New_York".parse().unwrap();
        let schedule = CronSchedule::parse("0 30 2 * * *").unwrap();

        let after = new_york.with_ymd_and_hms(2024, 3, 9, 0, 0, 0).unwrap();
        let first = schedule.next_after(&after).unwrap();
        let second = schedule.next_after(&first).unwrap();

        assert_eq!(first.day(), 9);
        assert_eq!(second.day(), 11);
    }

    #[rstest]
    #[case::too_few("* *")]
    #[case::too_many("* * * * * * *")]
    #[case::bad_second("60 * * * * *")]
    #[case::bad_hour("0 0 25 * * *")]
    fn rejects_invalid_expressions(#[case] expr: &str) {
        assert!(CronSchedule::parse(expr).is_err());
    }
}
