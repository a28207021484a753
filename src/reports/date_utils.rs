//! Calendar arithmetic used to bucket report data.
//!
//! Weeks follow ISO 8601: they start on monday and week 1 is the week holding
//! the first thursday of the year, so the first days of january can belong to
//! the last week of the previous ISO year.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};

const WEEKDAY_NAMES: [&str; 7] = ["maandag", "dinsdag", "woensdag", "donderdag", "vrijdag", "zaterdag", "zondag"];

const MONTH_ABBREVS: [&str; 12] = ["jan", "feb", "mrt", "apr", "mei", "jun", "jul", "aug", "sep", "okt", "nov", "dec"];

/// Formats the ISO week of `date` as `YYYY-Www`, using the ISO year.
pub fn iso_week_key(date: NaiveDate) -> String {
    let week = date.iso_week();
    format!("{}-W{:02}", week.year(), week.week())
}

pub fn start_of_iso_week(date: NaiveDate) -> NaiveDate {
    date - Duration::days(weekday_index(date) as i64)
}

/// Monday of the given ISO week, `None` if the year has no such week.
pub fn iso_week_start(year: i32, week: u32) -> Option<NaiveDate> {
    NaiveDate::from_isoywd_opt(year, week, Weekday::Mon)
}

/// Number of ISO weeks in an ISO year (52 or 53).
pub fn weeks_in_iso_year(year: i32) -> u32 {
    // December 28th always falls in the last week of its ISO year
    NaiveDate::from_ymd_opt(year, 12, 28)
        .map(|d| d.iso_week().week())
        .unwrap_or(52)
}

/// Day of the week counting from monday = 0, as MySQL's WEEKDAY().
pub fn weekday_index(date: NaiveDate) -> u32 {
    date.weekday().num_days_from_monday()
}

pub fn quarter_of(date: NaiveDate) -> u32 {
    (date.month() - 1) / 3 + 1
}

pub fn start_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

pub fn start_of_quarter(date: NaiveDate) -> NaiveDate {
    let month = (quarter_of(date) - 1) * 3 + 1;
    NaiveDate::from_ymd_opt(date.year(), month, 1).unwrap_or(date)
}

pub fn start_of_year(date: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap_or(date)
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    match (NaiveDate::from_ymd_opt(year, month, 1), NaiveDate::from_ymd_opt(next_year, next_month, 1)) {
        (Some(first), Some(next)) => next.signed_duration_since(first).num_days() as u32,
        _ => 30,
    }
}

/// Adds `months` to a date, clamping the day to the end of the target month.
pub fn add_months(date: NaiveDate, months: u32) -> NaiveDate {
    let total = date.year() * 12 + date.month0() as i32 + months as i32;
    let year = total.div_euclid(12);
    let month = total.rem_euclid(12) as u32 + 1;
    let day = date.day().min(days_in_month(year, month));
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or(date)
}

/// Number of days in `[start, end]`, both included.
pub fn days_between(start: NaiveDate, end: NaiveDate) -> i64 {
    end.signed_duration_since(start).num_days() + 1
}

/// Dates a MySQL `DATE` column can hold. Day and offset arithmetic on them
/// stays clear of the `NaiveDate` limits.
pub fn is_supported_date(date: NaiveDate) -> bool {
    (1000..=9999).contains(&date.year())
}

pub fn midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::default())
}

/// Half-open window of raw timestamps covering the days `[start, end]` when a
/// day starts `offset_minutes` after midnight.
pub fn day_window(start: NaiveDate, end: NaiveDate, offset_minutes: i32) -> (NaiveDateTime, NaiveDateTime) {
    let offset = Duration::minutes(offset_minutes as i64);
    (
        midnight(start) + offset,
        midnight(end + Duration::days(1)) + offset,
    )
}

pub fn weekday_name(index: u32) -> &'static str {
    WEEKDAY_NAMES.get(index as usize).copied().unwrap_or("?")
}

pub fn month_abbrev(month: u32) -> &'static str {
    MONTH_ABBREVS.get(month.wrapping_sub(1) as usize).copied().unwrap_or("?")
}
