//! Five-field POSIX cron expressions: `minute hour day month day_of_week`.
//!
//! Supported per field: `*`, single values, comma lists, ranges (`a-b`), and
//! step values (`*/n`, `a-b/n`). Day-of-week uses 0–6 with 0 = Sunday (7 is
//! accepted as an alias for Sunday). When both day-of-month and day-of-week
//! are restricted, a date matches if either does — the POSIX rule.

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};

use crate::error::{Result, SchedulerError};

#[derive(Debug, Clone)]
pub struct CronExpr {
    minutes: Vec<u32>,
    hours: Vec<u32>,
    days: Vec<u32>,
    months: Vec<u32>,
    weekdays: Vec<u32>,
    day_restricted: bool,
    weekday_restricted: bool,
}

impl CronExpr {
    /// Parse a five-field expression.
    pub fn parse(expr: &str) -> Result<Self> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(SchedulerError::InvalidSchedule(format!(
                "expected 5 cron fields, got {}: '{expr}'",
                fields.len()
            )));
        }

        let minutes = parse_field(fields[0], 0, 59)?;
        let hours = parse_field(fields[1], 0, 23)?;
        let days = parse_field(fields[2], 1, 31)?;
        let months = parse_field(fields[3], 1, 12)?;
        // Accept 7 as Sunday, then fold onto 0.
        let mut weekdays = parse_field(fields[4], 0, 7)?;
        if weekdays.contains(&7) {
            weekdays.retain(|&d| d != 7);
            if !weekdays.contains(&0) {
                weekdays.insert(0, 0);
            }
        }

        Ok(Self {
            minutes,
            hours,
            days,
            months,
            weekdays,
            day_restricted: fields[2] != "*",
            weekday_restricted: fields[4] != "*",
        })
    }

    /// True when `at` (truncated to the minute) matches the expression.
    pub fn matches(&self, at: DateTime<Utc>) -> bool {
        if !self.minutes.contains(&at.minute())
            || !self.hours.contains(&at.hour())
            || !self.months.contains(&at.month())
        {
            return false;
        }

        let day_ok = self.days.contains(&at.day());
        let weekday_ok = self.weekdays.contains(&at.weekday().num_days_from_sunday());

        match (self.day_restricted, self.weekday_restricted) {
            (true, true) => day_ok || weekday_ok,
            (true, false) => day_ok,
            (false, true) => weekday_ok,
            (false, false) => true,
        }
    }

    /// The first matching instant strictly after `from`, scanning minute by
    /// minute. Gives up after four years (a schedule like Feb 30 never fires).
    pub fn next_after(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let mut candidate = (from + Duration::minutes(1))
            .with_second(0)?
            .with_nanosecond(0)?;
        let limit = from + Duration::days(4 * 366);
        while candidate <= limit {
            if self.matches(candidate) {
                return Some(candidate);
            }
            candidate += Duration::minutes(1);
        }
        None
    }
}

/// Parse one cron field into a sorted list of allowed values.
fn parse_field(field: &str, min: u32, max: u32) -> Result<Vec<u32>> {
    let mut values = Vec::new();

    for part in field.split(',') {
        let (range_part, step) = match part.split_once('/') {
            Some((r, s)) => {
                let step: u32 = s.parse().map_err(|_| bad_field(field))?;
                if step == 0 {
                    return Err(bad_field(field));
                }
                (r, step)
            }
            None => (part, 1),
        };

        let (lo, hi) = if range_part == "*" {
            (min, max)
        } else if let Some((a, b)) = range_part.split_once('-') {
            let lo: u32 = a.parse().map_err(|_| bad_field(field))?;
            let hi: u32 = b.parse().map_err(|_| bad_field(field))?;
            (lo, hi)
        } else {
            let v: u32 = range_part.parse().map_err(|_| bad_field(field))?;
            (v, v)
        };

        if lo < min || hi > max || lo > hi {
            return Err(bad_field(field));
        }

        let mut v = lo;
        while v <= hi {
            if !values.contains(&v) {
                values.push(v);
            }
            v += step;
        }
    }

    values.sort_unstable();
    Ok(values)
}

fn bad_field(field: &str) -> SchedulerError {
    SchedulerError::InvalidSchedule(format!("invalid cron field: '{field}'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn every_minute_matches_everything() {
        let c = CronExpr::parse("* * * * *").unwrap();
        assert!(c.matches(at(2026, 3, 14, 9, 26)));
    }

    #[test]
    fn next_after_advances_one_minute_for_wildcard() {
        let c = CronExpr::parse("* * * * *").unwrap();
        let next = c.next_after(at(2026, 3, 14, 9, 26)).unwrap();
        assert_eq!(next, at(2026, 3, 14, 9, 27));
    }

    #[test]
    fn fixed_daily_time() {
        let c = CronExpr::parse("30 6 * * *").unwrap();
        let next = c.next_after(at(2026, 3, 14, 9, 0)).unwrap();
        assert_eq!(next, at(2026, 3, 15, 6, 30));
        let next = c.next_after(at(2026, 3, 14, 5, 0)).unwrap();
        assert_eq!(next, at(2026, 3, 14, 6, 30));
    }

    #[test]
    fn step_values() {
        let c = CronExpr::parse("*/15 * * * *").unwrap();
        let next = c.next_after(at(2026, 1, 1, 10, 1)).unwrap();
        assert_eq!(next, at(2026, 1, 1, 10, 15));
        let next = c.next_after(at(2026, 1, 1, 10, 45)).unwrap();
        assert_eq!(next, at(2026, 1, 1, 11, 0));
    }

    #[test]
    fn ranges_and_lists() {
        let c = CronExpr::parse("0 9-17 * * 1,2,3,4,5").unwrap();
        // 2026-03-14 is a Saturday — next weekday 09:00 is Monday the 16th.
        let next = c.next_after(at(2026, 3, 14, 12, 0)).unwrap();
        assert_eq!(next, at(2026, 3, 16, 9, 0));
    }

    #[test]
    fn sunday_alias_seven() {
        let a = CronExpr::parse("0 0 * * 0").unwrap();
        let b = CronExpr::parse("0 0 * * 7").unwrap();
        // 2026-03-15 is a Sunday.
        assert!(a.matches(at(2026, 3, 15, 0, 0)));
        assert!(b.matches(at(2026, 3, 15, 0, 0)));
    }

    #[test]
    fn dom_and_dow_are_ored_when_both_restricted() {
        // The 13th OR a Friday.
        let c = CronExpr::parse("0 0 13 * 5").unwrap();
        // 2026-03-13 is a Friday the 13th — matches both.
        assert!(c.matches(at(2026, 3, 13, 0, 0)));
        // 2026-03-20 is a Friday (not the 13th) — matches via weekday.
        assert!(c.matches(at(2026, 3, 20, 0, 0)));
        // 2026-04-13 is a Monday — matches via day-of-month.
        assert!(c.matches(at(2026, 4, 13, 0, 0)));
        // 2026-03-14 is a Saturday, not the 13th.
        assert!(!c.matches(at(2026, 3, 14, 0, 0)));
    }

    #[test]
    fn rejects_malformed_expressions() {
        assert!(CronExpr::parse("* * * *").is_err());
        assert!(CronExpr::parse("61 * * * *").is_err());
        assert!(CronExpr::parse("* * 0 * *").is_err());
        assert!(CronExpr::parse("*/0 * * * *").is_err());
        assert!(CronExpr::parse("a * * * *").is_err());
    }
}
