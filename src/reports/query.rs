use chrono::NaiveDate;
use derive_more::Display;
use mysql::Value;

use crate::web::errors::{ServiceError, ServiceResult};

use super::cache_table::{CacheState, CacheTable, DateRange};
use super::date_utils::{day_window, days_between};
use super::period::{bucket_sql, ReportUnit, stay_class_sql};

/// Series key used when all facilities are summed together.
pub const TOTAL_SERIES_KEY: &str = "totaal";

const MAX_DAY_OFFSET_MINUTES: i32 = 12 * 60;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, juniper::GraphQLEnum)]
pub enum ReportType {
    /// Number of transactions checked out in the period
    TransactionsCompleted,
    /// Money received for the transactions checked out in the period
    Revenue,
    /// Occupied places as a percentage of the capacity
    Occupancy,
    /// Transactions by how long the bicycle was parked
    StayDuration,
}

impl ReportType {
    pub fn title(&self) -> &'static str {
        match self {
            ReportType::TransactionsCompleted => "Afgeronde transacties",
            ReportType::Revenue => "Inkomsten",
            ReportType::Occupancy => "Bezetting",
            ReportType::StayDuration => "Stallingsduur",
        }
    }

    pub fn cache_table(&self) -> CacheTable {
        match self {
            ReportType::TransactionsCompleted | ReportType::Revenue => CacheTable::Transactions,
            ReportType::Occupancy => CacheTable::Occupancy,
            ReportType::StayDuration => CacheTable::StayDuration,
        }
    }

    /// Values summed over rows, as opposed to ratios.
    pub fn is_additive(&self) -> bool {
        *self != ReportType::Occupancy
    }

    /// Value of a bucket without data.
    pub fn missing_value(&self) -> Option<f64> {
        if self.is_additive() { Some(0.0) } else { None }
    }
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, juniper::GraphQLEnum)]
pub enum SeriesGrouping {
    PerFacility,
    Total,
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, juniper::GraphQLEnum)]
pub enum ReportSource {
    Auto,
    Raw,
    Cache,
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, juniper::GraphQLEnum)]
pub enum DataSource {
    Raw,
    Cache,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportParams {
    pub report_type: ReportType,
    pub unit: ReportUnit,
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Stallings ids of the facilities to report on
    pub facilities: Vec<String>,
    pub grouping: SeriesGrouping,
    /// Minutes after midnight at which a reporting day starts
    pub day_begins_at: i32,
    pub source: ReportSource,
}

impl ReportParams {
    pub fn validate(&self, max_days: i64) -> ServiceResult<()> {
        DateRange::new(self.start, self.end)?;
        if self.facilities.is_empty() {
            return Err(ServiceError::BadRequest("No facilities selected".to_string()))
        }
        if days_between(self.start, self.end) > max_days {
            return Err(ServiceError::BadRequest(format!("Report period longer than {} days", max_days)))
        }
        if self.day_begins_at.abs() > MAX_DAY_OFFSET_MINUTES {
            return Err(ServiceError::BadRequest("Day start offset out of range".to_string()))
        }
        Ok(())
    }

    pub fn range(&self) -> DateRange {
        DateRange { start: self.start, end: self.end }
    }

    /// Facilities in request order, without duplicates.
    pub fn unique_facilities(&self) -> Vec<String> {
        let mut ids: Vec<String> = Vec::with_capacity(self.facilities.len());
        for id in self.facilities.iter() {
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        }
        ids
    }
}

/// Whether the cache table of the report can answer it exactly.
pub fn cache_usable(params: &ReportParams, state: &CacheState) -> bool {
    match params.report_type.cache_table() {
        CacheTable::Transactions => {
            params.day_begins_at == 0 && params.unit.supports_day_cache() && state.covers(&params.range())
        },
        CacheTable::StayDuration => params.day_begins_at == 0 && state.covers(&params.range()),
        CacheTable::Occupancy => {
            // An offset day reaches into the day before or after the range
            let (start, end) = day_window(params.start, params.end, params.day_begins_at);
            params.day_begins_at % 60 == 0 && state.covers_window(start, end)
        },
    }
}

pub fn choose_source(params: &ReportParams, state: &CacheState) -> ServiceResult<DataSource> {
    match params.source {
        ReportSource::Raw => Ok(DataSource::Raw),
        ReportSource::Cache => {
            if cache_usable(params, state) {
                Ok(DataSource::Cache)
            } else {
                Err(ServiceError::BadRequest(format!(
                    "Cache table {} cannot answer this report", params.report_type.cache_table().table_name()
                )))
            }
        },
        ReportSource::Auto => Ok(if cache_usable(params, state) { DataSource::Cache } else { DataSource::Raw }),
    }
}

/// A statement returning `(bucket, series, value)` rows.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltQuery {
    pub sql: String,
    pub params: Vec<Value>,
}

struct Source {
    table: &'static str,
    time_column: &'static str,
    facility_column: &'static str,
    value: String,
    /// Cache tables of a whole day are filtered by date instead of time.
    daily: bool,
}

fn source_for(report_type: ReportType, source: DataSource) -> Source {
    match (report_type, source) {
        (ReportType::TransactionsCompleted, DataSource::Raw) => Source {
            table: "transacties_archief",
            time_column: "checkoutdate",
            facility_column: "locationid",
            value: "COUNT(*)".to_string(),
            daily: false,
        },
        (ReportType::Revenue, DataSource::Raw) => Source {
            table: "transacties_archief",
            time_column: "checkoutdate",
            facility_column: "locationid",
            value: "SUM(price)".to_string(),
            daily: false,
        },
        (ReportType::Occupancy, DataSource::Raw) => Source {
            table: "bezettingsdata",
            time_column: "`timestamp`",
            facility_column: "bikepark_id",
            value: "100 * SUM(occupation) / NULLIF(SUM(capacity), 0)".to_string(),
            daily: false,
        },
        (ReportType::StayDuration, DataSource::Raw) => Source {
            table: "transacties_archief",
            time_column: "checkoutdate",
            facility_column: "locationid",
            value: "COUNT(*)".to_string(),
            daily: false,
        },
        (ReportType::TransactionsCompleted, DataSource::Cache) => Source {
            table: CacheTable::Transactions.table_name(),
            time_column: "checkoutdate",
            facility_column: "locationid",
            value: "SUM(count_transacties)".to_string(),
            daily: true,
        },
        (ReportType::Revenue, DataSource::Cache) => Source {
            table: CacheTable::Transactions.table_name(),
            time_column: "checkoutdate",
            facility_column: "locationid",
            value: "SUM(sum_inkomsten)".to_string(),
            daily: true,
        },
        (ReportType::Occupancy, DataSource::Cache) => Source {
            table: CacheTable::Occupancy.table_name(),
            time_column: "`timestamp`",
            facility_column: "bikepark_id",
            value: "100 * SUM(sum_occupation) / NULLIF(SUM(sum_capacity), 0)".to_string(),
            daily: false,
        },
        (ReportType::StayDuration, DataSource::Cache) => Source {
            table: CacheTable::StayDuration.table_name(),
            time_column: "checkoutdate",
            facility_column: "locationid",
            value: "SUM(count_transacties)".to_string(),
            daily: true,
        },
    }
}

/// Timestamp expression moved back by the day start offset, so that grouping
/// by calendar unit groups by reporting day.
fn shifted(column: &str, offset_minutes: i32) -> String {
    if offset_minutes == 0 {
        column.to_string()
    } else {
        format!("DATE_SUB({}, INTERVAL {} MINUTE)", column, offset_minutes)
    }
}

pub fn build_query(params: &ReportParams, source: DataSource) -> BuiltQuery {
    let src = source_for(params.report_type, source);
    let facilities = params.unique_facilities();

    let bucket = match (params.report_type, source) {
        (ReportType::StayDuration, DataSource::Raw) => format!("CAST({} AS CHAR)", stay_class_sql("stallingsduur")),
        (ReportType::StayDuration, DataSource::Cache) => "CAST(duration_class AS CHAR)".to_string(),
        _ => bucket_sql(params.unit, &shifted(src.time_column, params.day_begins_at)),
    };

    let series = match params.grouping {
        SeriesGrouping::PerFacility => src.facility_column.to_string(),
        SeriesGrouping::Total => format!("'{}'", TOTAL_SERIES_KEY),
    };

    let placeholders = vec!["?"; facilities.len()].join(", ");

    let sql = format!(
        "SELECT {bucket} AS bucket, {series} AS series, {value} AS value \
         FROM {table} \
         WHERE {facility} IN ({placeholders}) AND {time} >= ? AND {time} < ? \
         GROUP BY bucket, series \
         ORDER BY bucket, series",
        bucket = bucket,
        series = series,
        value = src.value,
        table = src.table,
        facility = src.facility_column,
        placeholders = placeholders,
        time = src.time_column,
    );

    let mut values: Vec<Value> = facilities.into_iter().map(Value::from).collect();
    if src.daily {
        // Only used without day offset: plain dates, end exclusive
        let range = params.range();
        let (_, end) = range.window();
        values.push(Value::from(range.start));
        values.push(Value::from(end.date()));
    } else {
        let (start, end) = day_window(params.start, params.end, params.day_begins_at);
        values.push(Value::from(start));
        values.push(Value::from(end));
    }

    BuiltQuery { sql, params: values }
}
