mod common;

use common::{date, datetime};
use stallingen_server::reports::period::*;

#[test]
fn test_bucket_keys_week_across_years() {
    assert_eq!(
        bucket_keys(ReportUnit::Week, date(2020, 12, 30), date(2021, 1, 12)),
        vec!["2020-W53", "2021-W01", "2021-W02"]
    );
}

#[test]
fn test_bucket_keys_calendar_units() {
    assert_eq!(
        bucket_keys(ReportUnit::Quarter, date(2023, 12, 31), date(2024, 4, 1)),
        vec!["2023-Q4", "2024-Q1", "2024-Q2"]
    );
    assert_eq!(
        bucket_keys(ReportUnit::Month, date(2024, 1, 31), date(2024, 3, 1)),
        vec!["2024-01", "2024-02", "2024-03"]
    );
    assert_eq!(
        bucket_keys(ReportUnit::Day, date(2024, 2, 28), date(2024, 3, 1)),
        vec!["2024-02-28", "2024-02-29", "2024-03-01"]
    );
    assert_eq!(
        bucket_keys(ReportUnit::Year, date(2022, 6, 1), date(2024, 1, 1)),
        vec!["2022", "2023", "2024"]
    );
}

#[test]
fn test_bucket_keys_folded_units() {
    let hours = bucket_keys(ReportUnit::Hour, date(2024, 3, 1), date(2024, 3, 1));
    assert_eq!(hours.len(), 24);
    assert_eq!(hours[0], "00");
    assert_eq!(hours[23], "23");

    let days = bucket_keys(ReportUnit::Weekday, date(2024, 3, 1), date(2024, 3, 1));
    assert_eq!(days, vec!["0", "1", "2", "3", "4", "5", "6"]);
}

#[test]
fn test_bucket_key_matches_axis() {
    let time = datetime(2021, 1, 3, 7, 30);
    assert_eq!(bucket_key(ReportUnit::Hour, time), "07");
    assert_eq!(bucket_key(ReportUnit::Weekday, time), "6");
    assert_eq!(bucket_key(ReportUnit::Day, time), "2021-01-03");
    assert_eq!(bucket_key(ReportUnit::Week, time), "2020-W53");
    assert_eq!(bucket_key(ReportUnit::Month, time), "2021-01");
    assert_eq!(bucket_key(ReportUnit::Quarter, time), "2021-Q1");
    assert_eq!(bucket_key(ReportUnit::Year, time), "2021");

    let axis = bucket_keys(ReportUnit::Week, date(2020, 12, 20), date(2021, 1, 10));
    assert!(axis.contains(&bucket_key(ReportUnit::Week, time)));
}

#[test]
fn test_bucket_sql() {
    assert_eq!(bucket_sql(ReportUnit::Week, "checkoutdate"), "DATE_FORMAT(checkoutdate, '%x-W%v')");
    assert_eq!(bucket_sql(ReportUnit::Quarter, "c"), "CONCAT(YEAR(c), '-Q', QUARTER(c))");
    assert_eq!(bucket_sql(ReportUnit::Hour, "c"), "LPAD(HOUR(c), 2, '0')");
    assert!(ReportUnit::Day.supports_day_cache());
    assert!(!ReportUnit::Hour.supports_day_cache());
}

#[test]
fn test_bucket_labels() {
    assert_eq!(bucket_label(ReportUnit::Day, "2024-03-14"), "do 14-03-2024");
    assert_eq!(bucket_label(ReportUnit::Week, "2020-W53"), "week 53 2020");
    assert_eq!(bucket_label(ReportUnit::Month, "2024-03"), "mrt 2024");
    assert_eq!(bucket_label(ReportUnit::Quarter, "2024-Q2"), "K2 2024");
    assert_eq!(bucket_label(ReportUnit::Hour, "07"), "07:00");
    assert_eq!(bucket_label(ReportUnit::Weekday, "2"), "woensdag");
    assert_eq!(bucket_label(ReportUnit::Year, "2024"), "2024");
    assert_eq!(bucket_label(ReportUnit::Day, "garbage"), "garbage");
}

#[test]
fn test_stay_classes() {
    assert_eq!(stay_class_of(0), 0);
    assert_eq!(stay_class_of(59), 0);
    assert_eq!(stay_class_of(60), 1);
    assert_eq!(stay_class_of(1439), 6);
    assert_eq!(stay_class_of(1440), 7);
    assert_eq!(stay_class_of(40319), 10);
    assert_eq!(stay_class_of(40320), 11);
    assert_eq!(stay_class_keys().len(), 12);
    assert_eq!(stay_class_label("0"), "<1u");
    assert_eq!(stay_class_label("11"), ">28d");
    assert_eq!(stay_class_label("12"), "12");
}

#[test]
fn test_stay_class_sql() {
    let sql = stay_class_sql("stallingsduur");
    assert!(sql.starts_with("CASE WHEN stallingsduur < 60 THEN 0 WHEN stallingsduur < 180 THEN 1"));
    assert!(sql.ends_with("WHEN stallingsduur < 40320 THEN 10 ELSE 11 END"));
}
