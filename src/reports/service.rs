use std::collections::HashMap;

use log::{debug, warn};
use mysql::Value;

use crate::AppData;
use crate::facilities::titles_by_stallings_id;
use crate::web::errors::{ServiceError, ServiceResult};

use super::cache_table::{self, CacheState};
use super::period::{bucket_keys, bucket_label, ReportUnit, stay_class_keys, stay_class_label};
use super::query::*;

/// One aggregated row as returned by a report query.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub bucket: String,
    pub series: String,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, juniper::GraphQLObject)]
pub struct ReportSeries {
    pub key: String,
    pub name: String,
    /// One value per category, `null` when there is nothing to report
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, juniper::GraphQLObject)]
pub struct ReportData {
    pub title: String,
    pub unit: ReportUnit,
    pub source: DataSource,
    /// Bucket keys, the x axis of the report
    pub categories: Vec<String>,
    pub labels: Vec<String>,
    pub series: Vec<ReportSeries>,
}

/// Every category of the report, including the ones without data.
pub fn category_keys(params: &ReportParams) -> Vec<String> {
    match params.report_type {
        ReportType::StayDuration => stay_class_keys(),
        _ => bucket_keys(params.unit, params.start, params.end),
    }
}

fn category_label(params: &ReportParams, key: &str) -> String {
    match params.report_type {
        ReportType::StayDuration => stay_class_label(key),
        _ => bucket_label(params.unit, key),
    }
}

fn series_keys(params: &ReportParams) -> Vec<String> {
    match params.grouping {
        SeriesGrouping::PerFacility => params.unique_facilities(),
        SeriesGrouping::Total => vec![TOTAL_SERIES_KEY.to_string()],
    }
}

/// Lays the query rows out on the full category axis, one series per
/// requested facility (or a single total).
pub fn assemble(params: &ReportParams, source: DataSource, rows: Vec<ReportRow>, titles: &HashMap<String, String>) -> ReportData {
    let categories = category_keys(params);
    let keys = series_keys(params);

    let category_index: HashMap<&str, usize> = categories.iter()
        .enumerate()
        .map(|(i, k)| (k.as_str(), i))
        .collect();
    let series_index: HashMap<&str, usize> = keys.iter()
        .enumerate()
        .map(|(i, k)| (k.as_str(), i))
        .collect();

    let missing = params.report_type.missing_value();
    let mut values = vec![vec![missing; categories.len()]; keys.len()];

    for row in rows {
        let (ci, si) = match (category_index.get(row.bucket.as_str()), series_index.get(row.series.as_str())) {
            (Some(ci), Some(si)) => (*ci, *si),
            _ => {
                warn!("Dropping report row outside of the requested axes: {:?}", row);
                continue;
            }
        };
        let cell = &mut values[si][ci];
        if params.report_type.is_additive() {
            *cell = Some(cell.unwrap_or(0.0) + row.value.unwrap_or(0.0));
        } else {
            *cell = row.value;
        }
    }

    let series = keys.into_iter()
        .zip(values.into_iter())
        .map(|(key, values)| {
            let name = if key == TOTAL_SERIES_KEY {
                "Totaal".to_string()
            } else {
                titles.get(&key).cloned().unwrap_or_else(|| key.clone())
            };
            ReportSeries { key, name, values }
        })
        .collect();

    let labels = categories.iter().map(|k| category_label(params, k)).collect();

    ReportData {
        title: params.report_type.title().to_string(),
        unit: params.unit,
        source,
        categories,
        labels,
        series,
    }
}

/// Numeric report value, whatever the type MySQL sends it as.
pub fn value_to_f64(value: Value) -> Option<f64> {
    match value {
        Value::NULL => None,
        Value::Int(x) => Some(x as f64),
        Value::UInt(x) => Some(x as f64),
        Value::Bytes(bytes) => String::from_utf8_lossy(&bytes).trim().parse::<f64>().ok(),
        other => mysql::from_value_opt::<f64>(other).ok(),
    }
}

pub fn fetch_rows(pool: &mysql::Pool, query: &BuiltQuery) -> ServiceResult<Vec<ReportRow>> {
    debug!("report query: {}", query.sql);
    let result = pool.prep_exec(query.sql.as_str(), query.params.clone())?;

    let mut rows = Vec::new();
    for row in result {
        let (bucket, series, value) = mysql::from_row_opt::<(Option<String>, Option<String>, Value)>(row?)
            .map_err(|_| ServiceError::InternalServerError("Unexpected report row".to_string()))?;
        rows.push(ReportRow {
            bucket: bucket.unwrap_or_default(),
            series: series.unwrap_or_default(),
            value: value_to_f64(value),
        });
    }
    Ok(rows)
}

/// Validates, picks raw or cached data, queries and assembles a report.
pub fn run_report(app: &AppData, params: &ReportParams) -> ServiceResult<ReportData> {
    params.validate(app.report_max_days)?;

    let state = match params.source {
        ReportSource::Raw => CacheState::Missing,
        _ => cache_table::status(&app.report_pool, params.report_type.cache_table())?,
    };
    let source = choose_source(params, &state)?;

    let query = build_query(params, source);
    let rows = fetch_rows(&app.report_pool, &query)?;

    let titles = match params.grouping {
        SeriesGrouping::PerFacility => {
            let conn = app.pool.get()?;
            titles_by_stallings_id(&conn, &params.unique_facilities())?
        },
        SeriesGrouping::Total => HashMap::new(),
    };

    Ok(assemble(params, source, rows, &titles))
}
