mod common;

use std::collections::HashMap;

use mysql::Value;

use common::date;
use stallingen_server::reports::period::ReportUnit;
use stallingen_server::reports::query::*;
use stallingen_server::reports::service::{assemble, category_keys, value_to_f64, ReportRow};

fn params(report_type: ReportType, unit: ReportUnit, grouping: SeriesGrouping) -> ReportParams {
    ReportParams {
        report_type,
        unit,
        start: date(2024, 3, 4),
        end: date(2024, 3, 6),
        facilities: vec!["3500_001".to_string(), "3500_002".to_string()],
        grouping,
        day_begins_at: 0,
        source: ReportSource::Auto,
    }
}

fn row(bucket: &str, series: &str, value: Option<f64>) -> ReportRow {
    ReportRow {
        bucket: bucket.to_string(),
        series: series.to_string(),
        value,
    }
}

#[test]
fn test_assemble_fills_missing_buckets() {
    let p = params(ReportType::TransactionsCompleted, ReportUnit::Day, SeriesGrouping::PerFacility);
    let mut titles = HashMap::new();
    titles.insert("3500_001".to_string(), "Stationsplein".to_string());

    let data = assemble(&p, DataSource::Raw, vec![
        row("2024-03-05", "3500_001", Some(12.0)),
        row("2024-03-06", "3500_002", Some(3.0)),
    ], &titles);

    assert_eq!(data.title, "Afgeronde transacties");
    assert_eq!(data.source, DataSource::Raw);
    assert_eq!(data.categories, vec!["2024-03-04", "2024-03-05", "2024-03-06"]);
    assert_eq!(data.labels, vec!["ma 04-03-2024", "di 05-03-2024", "wo 06-03-2024"]);
    assert_eq!(data.series.len(), 2);

    assert_eq!(data.series[0].key, "3500_001");
    assert_eq!(data.series[0].name, "Stationsplein");
    assert_eq!(data.series[0].values, vec![Some(0.0), Some(12.0), Some(0.0)]);

    // No title known: the id is used
    assert_eq!(data.series[1].name, "3500_002");
    assert_eq!(data.series[1].values, vec![Some(0.0), Some(0.0), Some(3.0)]);
}

#[test]
fn test_assemble_sums_duplicates_and_drops_unknown() {
    let p = params(ReportType::Revenue, ReportUnit::Day, SeriesGrouping::PerFacility);

    let data = assemble(&p, DataSource::Cache, vec![
        row("2024-03-04", "3500_001", Some(1.5)),
        row("2024-03-04", "3500_001", Some(2.0)),
        row("2024-03-04", "3500_001", None),
        row("2024-03-07", "3500_001", Some(100.0)),
        row("2024-03-04", "9999_999", Some(100.0)),
    ], &HashMap::new());

    assert_eq!(data.series[0].values, vec![Some(3.5), Some(0.0), Some(0.0)]);
    assert_eq!(data.series[1].values, vec![Some(0.0), Some(0.0), Some(0.0)]);
}

#[test]
fn test_assemble_occupancy_keeps_gaps() {
    let p = params(ReportType::Occupancy, ReportUnit::Day, SeriesGrouping::Total);

    let data = assemble(&p, DataSource::Raw, vec![
        row("2024-03-05", "totaal", Some(42.5)),
    ], &HashMap::new());

    assert_eq!(data.series.len(), 1);
    assert_eq!(data.series[0].key, "totaal");
    assert_eq!(data.series[0].name, "Totaal");
    assert_eq!(data.series[0].values, vec![None, Some(42.5), None]);
}

#[test]
fn test_assemble_stay_duration_classes() {
    let p = params(ReportType::StayDuration, ReportUnit::Day, SeriesGrouping::Total);
    assert_eq!(category_keys(&p).len(), 12);

    let data = assemble(&p, DataSource::Raw, vec![
        row("0", "totaal", Some(5.0)),
        row("11", "totaal", Some(1.0)),
    ], &HashMap::new());

    assert_eq!(data.labels[0], "<1u");
    assert_eq!(data.labels[11], ">28d");
    assert_eq!(data.series[0].values[0], Some(5.0));
    assert_eq!(data.series[0].values[5], Some(0.0));
    assert_eq!(data.series[0].values[11], Some(1.0));
}

#[test]
fn test_value_to_f64() {
    assert_eq!(value_to_f64(Value::NULL), None);
    assert_eq!(value_to_f64(Value::Int(-3)), Some(-3.0));
    assert_eq!(value_to_f64(Value::UInt(7)), Some(7.0));
    assert_eq!(value_to_f64(Value::Bytes(b"12.50".to_vec())), Some(12.5));
    assert_eq!(value_to_f64(Value::Bytes(b"abc".to_vec())), None);
}
