mod common;

use mysql::Value;

use common::{date, datetime};
use stallingen_server::reports::cache_table::{CacheState, DateRange};
use stallingen_server::reports::period::ReportUnit;
use stallingen_server::reports::query::*;
use stallingen_server::web::errors::ServiceError;

fn params(report_type: ReportType, unit: ReportUnit) -> ReportParams {
    ReportParams {
        report_type,
        unit,
        start: date(2024, 3, 1),
        end: date(2024, 3, 31),
        facilities: vec!["3500_001".to_string(), "3500_002".to_string()],
        grouping: SeriesGrouping::PerFacility,
        day_begins_at: 0,
        source: ReportSource::Auto,
    }
}

fn covered(start: chrono::NaiveDate, end: chrono::NaiveDate) -> CacheState {
    CacheState::Available {
        rows: 100,
        coverage: Some(DateRange { start, end }),
    }
}

fn is_bad_request<T>(res: Result<T, ServiceError>) -> bool {
    match res {
        Err(ServiceError::BadRequest(_)) => true,
        _ => false,
    }
}

#[test]
fn test_validate() {
    let p = params(ReportType::TransactionsCompleted, ReportUnit::Day);
    assert_eq!(p.validate(3700), Ok(()));

    let mut reversed = p.clone();
    reversed.start = date(2024, 4, 1);
    assert!(is_bad_request(reversed.validate(3700)));

    let mut empty = p.clone();
    empty.facilities.clear();
    assert!(is_bad_request(empty.validate(3700)));

    // 31 days requested
    assert!(is_bad_request(p.validate(30)));
    assert_eq!(p.validate(31), Ok(()));

    let mut offset = p.clone();
    offset.day_begins_at = 721;
    assert!(is_bad_request(offset.validate(3700)));
    offset.day_begins_at = -720;
    assert_eq!(offset.validate(3700), Ok(()));
}

#[test]
fn test_unique_facilities_keeps_order() {
    let mut p = params(ReportType::Revenue, ReportUnit::Day);
    p.facilities = vec!["b".to_string(), "a".to_string(), "b".to_string()];
    assert_eq!(p.unique_facilities(), vec!["b", "a"]);
}

#[test]
fn test_report_type_properties() {
    assert!(ReportType::TransactionsCompleted.is_additive());
    assert!(!ReportType::Occupancy.is_additive());
    assert_eq!(ReportType::Revenue.missing_value(), Some(0.0));
    assert_eq!(ReportType::Occupancy.missing_value(), None);
    assert_eq!(ReportType::StayDuration.title(), "Stallingsduur");
}

#[test]
fn test_choose_source() {
    let p = params(ReportType::TransactionsCompleted, ReportUnit::Week);
    let full = covered(date(2024, 1, 1), date(2024, 12, 31));
    let partial = covered(date(2024, 3, 10), date(2024, 12, 31));

    assert_eq!(choose_source(&p, &full), Ok(DataSource::Cache));
    assert_eq!(choose_source(&p, &partial), Ok(DataSource::Raw));
    assert_eq!(choose_source(&p, &CacheState::Missing), Ok(DataSource::Raw));
    assert_eq!(choose_source(&p, &CacheState::Available { rows: 0, coverage: None }), Ok(DataSource::Raw));

    let mut raw = p.clone();
    raw.source = ReportSource::Raw;
    assert_eq!(choose_source(&raw, &full), Ok(DataSource::Raw));

    let mut forced = p.clone();
    forced.source = ReportSource::Cache;
    assert_eq!(choose_source(&forced, &full), Ok(DataSource::Cache));
    assert!(is_bad_request(choose_source(&forced, &partial)));
}

#[test]
fn test_cache_usable_depends_on_unit_and_offset() {
    let full = covered(date(2024, 1, 1), date(2024, 12, 31));

    let hourly = params(ReportType::TransactionsCompleted, ReportUnit::Hour);
    assert!(!cache_usable(&hourly, &full));

    let mut shifted = params(ReportType::Revenue, ReportUnit::Day);
    shifted.day_begins_at = 360;
    assert!(!cache_usable(&shifted, &full));

    let mut occupancy = params(ReportType::Occupancy, ReportUnit::Hour);
    occupancy.day_begins_at = 360;
    assert!(cache_usable(&occupancy, &full));
    occupancy.day_begins_at = 90;
    assert!(!cache_usable(&occupancy, &full));

    let mut stay = params(ReportType::StayDuration, ReportUnit::Hour);
    assert!(cache_usable(&stay, &full));
    stay.day_begins_at = 60;
    assert!(!cache_usable(&stay, &full));
}

#[test]
fn test_occupancy_cache_needs_the_shifted_days() {
    let exact = covered(date(2024, 3, 1), date(2024, 3, 31));

    let mut occupancy = params(ReportType::Occupancy, ReportUnit::Day);
    assert!(cache_usable(&occupancy, &exact));

    // The last day runs until 06:00 on april 1st
    occupancy.day_begins_at = 360;
    assert!(!cache_usable(&occupancy, &exact));
    assert!(cache_usable(&occupancy, &covered(date(2024, 3, 1), date(2024, 4, 1))));

    // The first day starts at 23:00 on february 29th
    occupancy.day_begins_at = -60;
    assert!(!cache_usable(&occupancy, &exact));
    assert!(!cache_usable(&occupancy, &covered(date(2024, 3, 1), date(2024, 4, 1))));
    assert!(cache_usable(&occupancy, &covered(date(2024, 2, 29), date(2024, 3, 31))));

    occupancy.source = ReportSource::Cache;
    assert!(is_bad_request(choose_source(&occupancy, &exact)));
}

#[test]
fn test_validate_rejects_dates_outside_mysql_range() {
    let mut p = params(ReportType::Occupancy, ReportUnit::Day);
    p.start = chrono::NaiveDate::MAX;
    p.end = chrono::NaiveDate::MAX;
    assert!(is_bad_request(p.validate(3700)));

    p.start = date(999, 12, 31);
    p.end = date(1000, 1, 1);
    assert!(is_bad_request(p.validate(3700)));

    p.start = date(9999, 12, 31);
    p.end = date(9999, 12, 31);
    assert_eq!(p.validate(3700), Ok(()));
}

#[test]
fn test_build_query_raw_transactions() {
    let query = build_query(&params(ReportType::TransactionsCompleted, ReportUnit::Month), DataSource::Raw);

    assert_eq!(
        query.sql,
        "SELECT DATE_FORMAT(checkoutdate, '%Y-%m') AS bucket, locationid AS series, COUNT(*) AS value \
         FROM transacties_archief \
         WHERE locationid IN (?, ?) AND checkoutdate >= ? AND checkoutdate < ? \
         GROUP BY bucket, series \
         ORDER BY bucket, series"
    );
    assert_eq!(query.params, vec![
        Value::from("3500_001"),
        Value::from("3500_002"),
        Value::from(datetime(2024, 3, 1, 0, 0)),
        Value::from(datetime(2024, 4, 1, 0, 0)),
    ]);
}

#[test]
fn test_build_query_shifts_day_start() {
    let mut p = params(ReportType::Revenue, ReportUnit::Day);
    p.day_begins_at = 360;
    p.grouping = SeriesGrouping::Total;
    let query = build_query(&p, DataSource::Raw);

    assert!(query.sql.starts_with(
        "SELECT DATE_FORMAT(DATE_SUB(checkoutdate, INTERVAL 360 MINUTE), '%Y-%m-%d') AS bucket, 'totaal' AS series, SUM(price) AS value"
    ));
    assert_eq!(query.params[2], Value::from(datetime(2024, 3, 1, 6, 0)));
    assert_eq!(query.params[3], Value::from(datetime(2024, 4, 1, 6, 0)));
}

#[test]
fn test_build_query_cache_tables() {
    let query = build_query(&params(ReportType::Revenue, ReportUnit::Week), DataSource::Cache);
    assert!(query.sql.contains("SUM(sum_inkomsten) AS value FROM transacties_archief_day_cache"));
    assert_eq!(query.params[2], Value::from(date(2024, 3, 1)));
    assert_eq!(query.params[3], Value::from(date(2024, 4, 1)));

    let query = build_query(&params(ReportType::Occupancy, ReportUnit::Hour), DataSource::Cache);
    assert!(query.sql.contains("100 * SUM(sum_occupation) / NULLIF(SUM(sum_capacity), 0) AS value"));
    assert!(query.sql.contains("FROM bezettingsdata_day_hour_cache WHERE bikepark_id IN (?, ?)"));

    let query = build_query(&params(ReportType::StayDuration, ReportUnit::Day), DataSource::Cache);
    assert!(query.sql.starts_with("SELECT CAST(duration_class AS CHAR) AS bucket"));
}

#[test]
fn test_build_query_stay_duration_raw() {
    let query = build_query(&params(ReportType::StayDuration, ReportUnit::Day), DataSource::Raw);
    assert!(query.sql.starts_with("SELECT CAST(CASE WHEN stallingsduur < 60 THEN 0"));
    assert!(query.sql.contains("COUNT(*) AS value FROM transacties_archief"));
}
