//! Cron expression helpers. Grounded on
//! `original_source/trigger/drivers/schedulers/cron_generator.py`'s
//! `CronGenerator`, reimplemented on top of the `cron` crate.
//!
//! Callers write plain 5-field cron (`min hour dom month dow`), matching
//! spec.md §6; the `cron` crate requires a leading seconds field, so a
//! `"0 "` is prepended before parsing.

use chrono::{DateTime, Utc};
use cron::Schedule;
use std::str::FromStr;

fn to_seven_field(expression: &str) -> String {
    let field_count = expression.split_whitespace().count();
    if field_count == 5 {
        format!("0 {expression}")
    } else {
        expression.to_string()
    }
}

/// Whether `expression` parses as a valid cron schedule.
#[must_use]
pub fn is_valid(expression: &str) -> bool {
    Schedule::from_str(&to_seven_field(expression)).is_ok()
}

/// The first occurrence strictly after `base_time`.
#[must_use]
pub fn next_occurrence(expression: &str, base_time: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let schedule = Schedule::from_str(&to_seven_field(expression)).ok()?;
    schedule.after(&base_time).next()
}

/// Up to `n` occurrences strictly after `base_time`.
#[must_use]
pub fn next_n_occurrences(expression: &str, base_time: DateTime<Utc>, n: usize) -> Vec<DateTime<Utc>> {
    let Ok(schedule) = Schedule::from_str(&to_seven_field(expression)) else {
        return Vec::new();
    };
    schedule.after(&base_time).take(n).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn five_field_daily_midnight_next_occurrence() {
        let base = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        let next = next_occurrence("0 0 * * *", base).expect("valid cron");
        assert_eq!(next.date_naive(), Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap().date_naive());
    }

    #[test]
    fn rejects_garbage_expression() {
        assert!(!is_valid("not a cron expression"));
    }
}
