//! Standard 5-field cron grammar on top of the `cron` crate.
//!
//! Accepted: `minute hour day-of-month month day-of-week`, with weekday
//! numbers 0-7 (0 and 7 are Sunday) or names, plus the descriptors
//! `@yearly @annually @monthly @weekly @daily @midnight @hourly`.
//! Expressions with a seconds field are rejected.

use std::str::FromStr;

use cron::Schedule;

/// Parse a 5-field expression or descriptor into a [`Schedule`].
pub fn parse(expression: &str) -> Result<Schedule, String> {
    let normalized = normalize(expression)?;
    Schedule::from_str(&normalized).map_err(|e| e.to_string())
}

/// Check an expression without keeping the schedule.
pub fn validate(expression: &str) -> Result<(), String> {
    parse(expression).map(|_| ())
}

/// Rewrite into the `cron` crate's 6-field form (seconds first, named weekdays).
fn normalize(expression: &str) -> Result<String, String> {
    let expression = expression.trim();
    if expression.is_empty() {
        return Err("empty expression".to_string());
    }

    if let Some(descriptor) = expression.strip_prefix('@') {
        let expanded = match descriptor.to_ascii_lowercase().as_str() {
            "yearly" | "annually" => "0 0 0 1 1 *",
            "monthly" => "0 0 0 1 * *",
            "weekly" => "0 0 0 * * SUN",
            "daily" | "midnight" => "0 0 0 * * *",
            "hourly" => "0 0 * * * *",
            other => return Err(format!("unknown descriptor '@{}'", other)),
        };
        return Ok(expanded.to_string());
    }

    let fields: Vec<&str> = expression.split_whitespace().collect();
    if fields.len() != 5 {
        return Err(format!(
            "expected 5 fields (minute hour day month weekday), got {}",
            fields.len()
        ));
    }

    let weekday = normalize_weekday(fields[4])?;
    Ok(format!(
        "0 {} {} {} {} {}",
        fields[0], fields[1], fields[2], fields[3], weekday
    ))
}

const WEEKDAYS: [&str; 7] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

/// The `cron` crate numbers weekdays 1-7 from Sunday and rejects ranges that
/// end on Sunday, so every non-`*` weekday field is expanded into an explicit
/// list of day names.
fn normalize_weekday(field: &str) -> Result<String, String> {
    if field == "*" {
        return Ok(field.to_string());
    }

    let mut days = [false; 7];
    for part in field.split(',') {
        let (range, step) = match part.split_once('/') {
            Some((range, step)) => match step.parse::<usize>() {
                Ok(step) if step > 0 => (range, step),
                _ => return Err(format!("invalid weekday step: {}", part)),
            },
            None => (part, 1),
        };

        let (first, last) = if range == "*" {
            (0, 6)
        } else if let Some((first, last)) = range.split_once('-') {
            let first = weekday_number(first)?;
            let mut last = weekday_number(last)?;
            // Sunday closes a range as 7.
            if last == 0 && first > 0 {
                last = 7;
            }
            if first > last {
                return Err(format!("invalid weekday range: {}", range));
            }
            (first, last)
        } else {
            let first = weekday_number(range)?;
            if part.contains('/') { (first, 6.max(first)) } else { (first, first) }
        };

        for day in (first..=last).step_by(step) {
            days[day % 7] = true;
        }
    }

    if days.iter().all(|d| *d) {
        return Ok("*".to_string());
    }
    let names: Vec<&str> = WEEKDAYS
        .iter()
        .zip(days)
        .filter(|(_, set)| *set)
        .map(|(name, _)| *name)
        .collect();
    Ok(names.join(","))
}

/// Weekday as 0-7 (0 and 7 are Sunday), from a number or a three-letter name.
fn weekday_number(token: &str) -> Result<usize, String> {
    if !token.is_empty() && token.chars().all(|c| c.is_ascii_digit()) {
        return match token.parse::<usize>() {
            Ok(day) if day <= 7 => Ok(day),
            _ => Err(format!("weekday out of range: {}", token)),
        };
    }
    WEEKDAYS
        .iter()
        .position(|name| name.eq_ignore_ascii_case(token))
        .ok_or_else(|| format!("unknown weekday: {}", token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone, Timelike, Utc, Weekday};

    #[test]
    fn test_every_minute() {
        let schedule = parse("*/1 * * * *").unwrap();
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 30).unwrap();
        let mut upcoming = schedule.after(&start);
        let first = upcoming.next().unwrap();
        let second = upcoming.next().unwrap();
        assert_eq!((first.hour(), first.minute(), first.second()), (10, 1, 0));
        assert_eq!(second.minute(), 2);
    }

    #[test]
    fn test_descriptors() {
        for expr in ["@yearly", "@annually", "@monthly", "@weekly", "@daily", "@midnight", "@hourly"] {
            assert!(parse(expr).is_ok(), "{} should parse", expr);
        }
        assert!(parse("@fortnightly").is_err());
    }

    #[test]
    fn test_daily_fires_at_midnight() {
        let schedule = parse("@daily").unwrap();
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let next = schedule.after(&start).next().unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_weekday_range_uses_standard_numbering() {
        let schedule = parse("0 9 * * 1-5").unwrap();
        // 2024-03-02 is a Saturday
        let start = Utc.with_ymd_and_hms(2024, 3, 2, 12, 0, 0).unwrap();
        let next = schedule.after(&start).next().unwrap();
        assert_eq!(next.weekday(), Weekday::Mon);
        assert_eq!(next.hour(), 9);
    }

    #[test]
    fn test_sunday_as_zero_and_seven() {
        let start = Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap();
        for expr in ["30 6 * * 0", "30 6 * * 7", "30 6 * * sun"] {
            let next = parse(expr).unwrap().after(&start).next().unwrap();
            assert_eq!(next.weekday(), Weekday::Sun, "{}", expr);
        }
    }

    #[test]
    fn test_rejects_six_fields() {
        let err = parse("0 */5 * * * *").unwrap_err();
        assert!(err.contains("expected 5 fields"));
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(parse("invalid cron").is_err());
        assert!(parse("").is_err());
        assert!(parse("61 * * * *").is_err());
        assert!(parse("* * * * 9").is_err());
        assert!(validate("0 0 * *").is_err());
    }

    #[test]
    fn test_weekday_list_and_step() {
        assert_eq!(normalize_weekday("1,3,5").unwrap(), "MON,WED,FRI");
        assert_eq!(normalize_weekday("*/2").unwrap(), "SUN,TUE,THU,SAT");
        assert_eq!(normalize_weekday("mon-fri").unwrap(), "MON,TUE,WED,THU,FRI");
        assert_eq!(normalize_weekday("fri-sun").unwrap(), "SUN,FRI,SAT");
        assert!(normalize_weekday("5-1").is_err());
        assert!(normalize_weekday("*/0").is_err());
    }

    /// Weekdays of the next `count` firings after Monday 2024-03-04.
    fn firing_days(expression: &str, count: usize) -> Vec<Weekday> {
        let start = Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap();
        parse(expression)
            .unwrap()
            .after(&start)
            .take(count)
            .map(|t| t.weekday())
            .collect()
    }

    #[test]
    fn test_ranges_ending_on_seven_include_sunday() {
        let every_day = vec![
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
            Weekday::Sat,
            Weekday::Sun,
        ];
        assert_eq!(firing_days("0 9 * * 0-7", 7), every_day);
        assert_eq!(firing_days("0 9 * * 1-7", 7), every_day);
        assert_eq!(
            firing_days("0 9 * * 5-7", 4),
            vec![Weekday::Fri, Weekday::Sat, Weekday::Sun, Weekday::Fri]
        );
    }
}
