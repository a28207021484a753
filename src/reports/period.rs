//! Report buckets.
//!
//! Every unit has a MySQL expression producing a string key and a Rust
//! function producing the exact same key, so the database groups rows and the
//! server enumerates the full axis (filling the buckets without data) with one
//! shared key format.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};
use derive_more::Display;

use super::date_utils::*;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, juniper::GraphQLEnum)]
pub enum ReportUnit {
    /// Hour of the day, every day of the range folded together
    Hour,
    /// Day of the week, every week of the range folded together
    Weekday,
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

impl ReportUnit {
    /// Whether the unit can be computed from rows aggregated per calendar day.
    pub fn supports_day_cache(&self) -> bool {
        *self != ReportUnit::Hour
    }
}

/// MySQL expression grouping `column` by `unit`, always a string.
pub fn bucket_sql(unit: ReportUnit, column: &str) -> String {
    match unit {
        ReportUnit::Hour => format!("LPAD(HOUR({}), 2, '0')", column),
        ReportUnit::Weekday => format!("CAST(WEEKDAY({}) AS CHAR)", column),
        ReportUnit::Day => format!("DATE_FORMAT({}, '%Y-%m-%d')", column),
        ReportUnit::Week => format!("DATE_FORMAT({}, '%x-W%v')", column),
        ReportUnit::Month => format!("DATE_FORMAT({}, '%Y-%m')", column),
        ReportUnit::Quarter => format!("CONCAT(YEAR({c}), '-Q', QUARTER({c}))", c = column),
        ReportUnit::Year => format!("CAST(YEAR({}) AS CHAR)", column),
    }
}

pub fn bucket_key(unit: ReportUnit, time: NaiveDateTime) -> String {
    match unit {
        ReportUnit::Hour => format!("{:02}", time.hour()),
        _ => date_bucket_key(unit, time.date()),
    }
}

fn date_bucket_key(unit: ReportUnit, date: NaiveDate) -> String {
    match unit {
        ReportUnit::Hour => "00".to_string(),
        ReportUnit::Weekday => weekday_index(date).to_string(),
        ReportUnit::Day => date.format("%Y-%m-%d").to_string(),
        ReportUnit::Week => iso_week_key(date),
        ReportUnit::Month => date.format("%Y-%m").to_string(),
        ReportUnit::Quarter => format!("{}-Q{}", date.year(), quarter_of(date)),
        ReportUnit::Year => date.year().to_string(),
    }
}

/// First day of the bucket holding `date`.
pub fn bucket_start(unit: ReportUnit, date: NaiveDate) -> NaiveDate {
    match unit {
        ReportUnit::Hour | ReportUnit::Weekday | ReportUnit::Day => date,
        ReportUnit::Week => start_of_iso_week(date),
        ReportUnit::Month => start_of_month(date),
        ReportUnit::Quarter => start_of_quarter(date),
        ReportUnit::Year => start_of_year(date),
    }
}

fn next_bucket_start(unit: ReportUnit, start: NaiveDate) -> NaiveDate {
    match unit {
        ReportUnit::Hour | ReportUnit::Weekday | ReportUnit::Day => start + Duration::days(1),
        ReportUnit::Week => start + Duration::days(7),
        ReportUnit::Month => add_months(start, 1),
        ReportUnit::Quarter => add_months(start, 3),
        ReportUnit::Year => add_months(start, 12),
    }
}

/// Every bucket key of the inclusive range `[start, end]`, in order.
pub fn bucket_keys(unit: ReportUnit, start: NaiveDate, end: NaiveDate) -> Vec<String> {
    match unit {
        ReportUnit::Hour => (0..24).map(|h| format!("{:02}", h)).collect(),
        ReportUnit::Weekday => (0..7).map(|d| d.to_string()).collect(),
        _ => {
            let mut keys = Vec::new();
            let mut current = bucket_start(unit, start);
            while current <= end {
                keys.push(date_bucket_key(unit, current));
                current = next_bucket_start(unit, current);
            }
            keys
        }
    }
}

pub fn bucket_label(unit: ReportUnit, key: &str) -> String {
    let label = match unit {
        ReportUnit::Hour => Some(format!("{}:00", key)),
        ReportUnit::Weekday => key.parse::<u32>().ok().map(|x| weekday_name(x).to_string()),
        ReportUnit::Day => NaiveDate::parse_from_str(key, "%Y-%m-%d").ok()
            .map(|d| format!("{} {}", &weekday_name(weekday_index(d))[..2], d.format("%d-%m-%Y"))),
        ReportUnit::Week => split_key(key, "-W").map(|(year, week)| format!("week {} {}", week, year)),
        ReportUnit::Month => split_key(key, "-")
            .map(|(year, month)| format!("{} {}", month_abbrev(month), year)),
        ReportUnit::Quarter => split_key(key, "-Q").map(|(year, q)| format!("K{} {}", q, year)),
        ReportUnit::Year => Some(key.to_string()),
    };
    label.unwrap_or_else(|| key.to_string())
}

fn split_key(key: &str, separator: &str) -> Option<(i32, u32)> {
    let index = key.find(separator)?;
    let year = key[..index].parse().ok()?;
    let rest = key[index + separator.len()..].parse().ok()?;
    Some((year, rest))
}

pub struct StayClass {
    /// Exclusive upper bound in minutes, `None` for the last class
    pub upper_minutes: Option<i32>,
    pub label: &'static str,
}

pub const STAY_CLASSES: [StayClass; 12] = [
    StayClass { upper_minutes: Some(60), label: "<1u" },
    StayClass { upper_minutes: Some(3 * 60), label: "1-3u" },
    StayClass { upper_minutes: Some(6 * 60), label: "3-6u" },
    StayClass { upper_minutes: Some(9 * 60), label: "6-9u" },
    StayClass { upper_minutes: Some(13 * 60), label: "9-13u" },
    StayClass { upper_minutes: Some(18 * 60), label: "13-18u" },
    StayClass { upper_minutes: Some(24 * 60), label: "18-24u" },
    StayClass { upper_minutes: Some(2 * 24 * 60), label: "1-2d" },
    StayClass { upper_minutes: Some(7 * 24 * 60), label: "2-7d" },
    StayClass { upper_minutes: Some(14 * 24 * 60), label: "7-14d" },
    StayClass { upper_minutes: Some(28 * 24 * 60), label: "14-28d" },
    StayClass { upper_minutes: None, label: ">28d" },
];

pub fn stay_class_of(minutes: i32) -> usize {
    STAY_CLASSES.iter()
        .position(|c| c.upper_minutes.map(|upper| minutes < upper).unwrap_or(true))
        .unwrap_or(STAY_CLASSES.len() - 1)
}

/// MySQL `CASE` expression mapping a duration in minutes to its class index.
pub fn stay_class_sql(column: &str) -> String {
    let mut sql = String::from("CASE");
    for (index, class) in STAY_CLASSES.iter().enumerate() {
        match class.upper_minutes {
            Some(upper) => sql.push_str(&format!(" WHEN {} < {} THEN {}", column, upper, index)),
            None => sql.push_str(&format!(" ELSE {}", index)),
        }
    }
    sql.push_str(" END");
    sql
}

pub fn stay_class_keys() -> Vec<String> {
    (0..STAY_CLASSES.len()).map(|x| x.to_string()).collect()
}

pub fn stay_class_label(key: &str) -> String {
    key.parse::<usize>().ok()
        .and_then(|x| STAY_CLASSES.get(x))
        .map(|c| c.label.to_string())
        .unwrap_or_else(|| key.to_string())
}
