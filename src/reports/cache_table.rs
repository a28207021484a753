//! Pre-aggregated report tables.
//!
//! A cache table holds the rows its fill query computes from the raw data.
//! Its life cycle is driven by explicit admin actions: create, update a date
//! range (delete the range, then insert it again), clear and drop. The days
//! that were actually rebuilt are recorded in `report_cache_status`, reports
//! only read a cache whose recorded coverage holds the requested range.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use derive_more::Display;
use log::{debug, info};
use mysql::Value;

use crate::web::errors::{ServiceError, ServiceResult};

use super::date_utils::{is_supported_date, midnight};
use super::period::stay_class_sql;

const STATUS_TABLE: &str = "report_cache_status";

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, juniper::GraphQLEnum)]
pub enum CacheTable {
    /// Completed transactions per day, facility and section
    Transactions,
    /// Occupancy samples per hour, facility and section
    Occupancy,
    /// Transactions per day, facility, section and stay duration class
    StayDuration,
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, juniper::GraphQLEnum)]
pub enum CacheAction {
    Create,
    Drop,
    Clear,
    Update,
}

impl CacheTable {
    pub const ALL: [CacheTable; 3] = [CacheTable::Transactions, CacheTable::Occupancy, CacheTable::StayDuration];

    pub fn table_name(&self) -> &'static str {
        match self {
            CacheTable::Transactions => "transacties_archief_day_cache",
            CacheTable::Occupancy => "bezettingsdata_day_hour_cache",
            CacheTable::StayDuration => "stallingsduur_cache",
        }
    }

    pub fn date_column(&self) -> &'static str {
        match self {
            CacheTable::Transactions | CacheTable::StayDuration => "checkoutdate",
            CacheTable::Occupancy => "`timestamp`",
        }
    }

    pub fn create_sql(&self) -> String {
        match self {
            CacheTable::Transactions => format!(
                "CREATE TABLE {} (\
                 id INT AUTO_INCREMENT PRIMARY KEY, \
                 checkoutdate DATE NOT NULL, \
                 locationid VARCHAR(35) NOT NULL, \
                 sectionid VARCHAR(35) NULL, \
                 count_transacties INT NOT NULL, \
                 sum_inkomsten DECIMAL(14,2) NOT NULL, \
                 sum_stallingsduur BIGINT NOT NULL, \
                 INDEX idx_checkoutdate_locationid (checkoutdate, locationid))",
                self.table_name()
            ),
            CacheTable::Occupancy => format!(
                "CREATE TABLE {} (\
                 id INT AUTO_INCREMENT PRIMARY KEY, \
                 `timestamp` DATETIME NOT NULL, \
                 bikepark_id VARCHAR(35) NOT NULL, \
                 section_id VARCHAR(35) NULL, \
                 sum_occupation BIGINT NOT NULL, \
                 sum_capacity BIGINT NOT NULL, \
                 sum_checkins BIGINT NOT NULL, \
                 sum_checkouts BIGINT NOT NULL, \
                 samples INT NOT NULL, \
                 INDEX idx_timestamp_bikepark_id (`timestamp`, bikepark_id))",
                self.table_name()
            ),
            CacheTable::StayDuration => format!(
                "CREATE TABLE {} (\
                 id INT AUTO_INCREMENT PRIMARY KEY, \
                 checkoutdate DATE NOT NULL, \
                 locationid VARCHAR(35) NOT NULL, \
                 sectionid VARCHAR(35) NULL, \
                 duration_class INT NOT NULL, \
                 count_transacties INT NOT NULL, \
                 INDEX idx_checkoutdate_locationid (checkoutdate, locationid))",
                self.table_name()
            ),
        }
    }

    pub fn drop_sql(&self) -> String {
        format!("DROP TABLE {}", self.table_name())
    }

    /// Aggregates the raw rows of a date window into the cache table.
    /// Takes the window bounds as its two parameters.
    pub fn fill_sql(&self) -> String {
        match self {
            CacheTable::Transactions => format!(
                "INSERT INTO {} (checkoutdate, locationid, sectionid, count_transacties, sum_inkomsten, sum_stallingsduur) \
                 SELECT DATE(checkoutdate), locationid, sectionid, COUNT(*), COALESCE(SUM(price), 0), COALESCE(SUM(stallingsduur), 0) \
                 FROM transacties_archief \
                 WHERE checkoutdate >= ? AND checkoutdate < ? \
                 GROUP BY DATE(checkoutdate), locationid, sectionid",
                self.table_name()
            ),
            CacheTable::Occupancy => format!(
                "INSERT INTO {} (`timestamp`, bikepark_id, section_id, sum_occupation, sum_capacity, sum_checkins, sum_checkouts, samples) \
                 SELECT DATE_FORMAT(`timestamp`, '%Y-%m-%d %H:00:00'), bikepark_id, section_id, \
                 COALESCE(SUM(occupation), 0), COALESCE(SUM(capacity), 0), COALESCE(SUM(checkins), 0), COALESCE(SUM(checkouts), 0), COUNT(*) \
                 FROM bezettingsdata \
                 WHERE `timestamp` >= ? AND `timestamp` < ? \
                 GROUP BY DATE_FORMAT(`timestamp`, '%Y-%m-%d %H:00:00'), bikepark_id, section_id",
                self.table_name()
            ),
            CacheTable::StayDuration => {
                let class = stay_class_sql("stallingsduur");
                format!(
                    "INSERT INTO {} (checkoutdate, locationid, sectionid, duration_class, count_transacties) \
                     SELECT DATE(checkoutdate), locationid, sectionid, {class}, COUNT(*) \
                     FROM transacties_archief \
                     WHERE checkoutdate >= ? AND checkoutdate < ? \
                     GROUP BY DATE(checkoutdate), locationid, sectionid, {class}",
                    self.table_name(),
                    class = class
                )
            },
        }
    }

    pub fn delete_range_sql(&self) -> String {
        format!("DELETE FROM {t} WHERE {c} >= ? AND {c} < ?", t = self.table_name(), c = self.date_column())
    }

    pub fn delete_all_sql(&self) -> String {
        format!("DELETE FROM {}", self.table_name())
    }

    /// Half-open timestamp window of the days in `range`.
    pub fn window_params(&self, range: &DateRange) -> Vec<Value> {
        let (start, end) = range.window();
        vec![Value::from(start), Value::from(end)]
    }
}

/// Inclusive range of days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> ServiceResult<DateRange> {
        for date in [start, end].iter() {
            if !is_supported_date(*date) {
                return Err(ServiceError::BadRequest(format!("Date {} out of range", date)))
            }
        }
        if start > end {
            return Err(ServiceError::BadRequest(format!("Start date {} after end date {}", start, end)))
        }
        Ok(DateRange { start, end })
    }

    pub fn window(&self) -> (NaiveDateTime, NaiveDateTime) {
        (midnight(self.start), midnight(self.end + Duration::days(1)))
    }

    pub fn contains(&self, other: &DateRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn days(&self) -> i64 {
        self.end.signed_duration_since(self.start).num_days() + 1
    }

    /// Overlapping or directly adjacent ranges.
    pub fn touches(&self, other: &DateRange) -> bool {
        self.start <= other.end + Duration::days(1) && other.start <= self.end + Duration::days(1)
    }

    /// Coverage after rebuilding `built`. Only a contiguous range is tracked,
    /// so a rebuild that does not touch the current coverage replaces it.
    pub fn merge(&self, built: &DateRange) -> DateRange {
        if self.touches(built) {
            DateRange {
                start: self.start.min(built.start),
                end: self.end.max(built.end),
            }
        } else {
            *built
        }
    }

    /// Coverage left after clearing `cut`. When the cut splits the range the
    /// larger part is kept, the later one on ties.
    pub fn subtract(&self, cut: &DateRange) -> Option<DateRange> {
        if cut.end < self.start || cut.start > self.end {
            return Some(*self)
        }
        let left = if cut.start > self.start {
            Some(DateRange { start: self.start, end: cut.start - Duration::days(1) })
        } else {
            None
        };
        let right = if cut.end < self.end {
            Some(DateRange { start: cut.end + Duration::days(1), end: self.end })
        } else {
            None
        };
        match (left, right) {
            (Some(l), Some(r)) => if l.days() > r.days() { Some(l) } else { Some(r) },
            (l, r) => l.or(r),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CacheState {
    Missing,
    Available {
        rows: i64,
        coverage: Option<DateRange>,
    },
}

impl CacheState {
    pub fn exists(&self) -> bool {
        *self != CacheState::Missing
    }

    pub fn covers(&self, range: &DateRange) -> bool {
        match self {
            CacheState::Available { coverage: Some(c), .. } => c.contains(range),
            _ => false,
        }
    }

    /// Whether the half-open timestamp window `[start, end)` lies within the
    /// days the cache was built for.
    pub fn covers_window(&self, start: NaiveDateTime, end: NaiveDateTime) -> bool {
        match self {
            CacheState::Available { coverage: Some(c), .. } => {
                let (built_start, built_end) = c.window();
                built_start <= start && end <= built_end
            },
            _ => false,
        }
    }

    pub fn coverage(&self) -> Option<DateRange> {
        match self {
            CacheState::Available { coverage, .. } => *coverage,
            CacheState::Missing => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CacheStep {
    CreateTable,
    DropTable,
    DeleteAll,
    DeleteRange(DateRange),
    InsertRange(DateRange),
    SetCoverage(Option<DateRange>),
}

impl CacheStep {
    fn is_ddl(&self) -> bool {
        match self {
            CacheStep::CreateTable | CacheStep::DropTable => true,
            _ => false,
        }
    }
}

/// Steps needed to apply `action` on a table in `state`.
pub fn plan(table: CacheTable, state: &CacheState, action: CacheAction, range: Option<DateRange>) -> ServiceResult<Vec<CacheStep>> {
    if action != CacheAction::Create && !state.exists() {
        return Err(ServiceError::BadRequest(format!("Cache table {} does not exist", table.table_name())))
    }

    let steps = match action {
        CacheAction::Create => {
            if state.exists() {
                return Err(ServiceError::AlreadyPresent(table.table_name().to_string()))
            }
            vec![CacheStep::CreateTable, CacheStep::SetCoverage(None)]
        },
        CacheAction::Drop => vec![CacheStep::DropTable, CacheStep::SetCoverage(None)],
        CacheAction::Clear => match range {
            Some(r) => vec![
                CacheStep::DeleteRange(r),
                CacheStep::SetCoverage(state.coverage().and_then(|c| c.subtract(&r))),
            ],
            None => vec![CacheStep::DeleteAll, CacheStep::SetCoverage(None)],
        },
        CacheAction::Update => {
            let r = range.ok_or_else(|| ServiceError::BadRequest("Updating a cache table requires a date range".to_string()))?;
            let coverage = match state.coverage() {
                Some(c) => c.merge(&r),
                None => r,
            };
            // The range is always emptied before being filled again
            vec![
                CacheStep::DeleteRange(r),
                CacheStep::InsertRange(r),
                CacheStep::SetCoverage(Some(coverage)),
            ]
        },
    };
    Ok(steps)
}

fn ensure_status_table(pool: &mysql::Pool) -> ServiceResult<()> {
    pool.prep_exec(format!(
        "CREATE TABLE IF NOT EXISTS {} (\
         table_name VARCHAR(64) PRIMARY KEY, \
         first_day DATE NOT NULL, \
         last_day DATE NOT NULL, \
         updated_at DATETIME NOT NULL)",
        STATUS_TABLE
    ), ())?;
    Ok(())
}

fn table_exists(pool: &mysql::Pool, table: CacheTable) -> ServiceResult<bool> {
    let mut result = pool.prep_exec(
        "SELECT COUNT(*) FROM information_schema.tables WHERE table_schema = DATABASE() AND table_name = ?",
        (table.table_name(),)
    )?;
    let count = match result.next() {
        Some(row) => mysql::from_row_opt::<i64>(row?).unwrap_or(0),
        None => 0,
    };
    Ok(count > 0)
}

pub fn status(pool: &mysql::Pool, table: CacheTable) -> ServiceResult<CacheState> {
    if !table_exists(pool, table)? {
        return Ok(CacheState::Missing)
    }
    ensure_status_table(pool)?;

    let rows = {
        let mut result = pool.prep_exec(format!("SELECT COUNT(*) FROM {}", table.table_name()), ())?;
        match result.next() {
            Some(row) => mysql::from_row_opt::<i64>(row?).unwrap_or(0),
            None => 0,
        }
    };

    let coverage = {
        let mut result = pool.prep_exec(
            format!("SELECT first_day, last_day FROM {} WHERE table_name = ?", STATUS_TABLE),
            (table.table_name(),)
        )?;
        match result.next() {
            Some(row) => mysql::from_row_opt::<(NaiveDate, NaiveDate)>(row?).ok()
                .map(|(start, end)| DateRange { start, end }),
            None => None,
        }
    };

    Ok(CacheState::Available { rows, coverage })
}

fn step_statement(table: CacheTable, step: &CacheStep) -> (String, Vec<Value>) {
    match step {
        CacheStep::CreateTable => (table.create_sql(), vec![]),
        CacheStep::DropTable => (table.drop_sql(), vec![]),
        CacheStep::DeleteAll => (table.delete_all_sql(), vec![]),
        CacheStep::DeleteRange(r) => (table.delete_range_sql(), table.window_params(r)),
        CacheStep::InsertRange(r) => (table.fill_sql(), table.window_params(r)),
        CacheStep::SetCoverage(None) => (
            format!("DELETE FROM {} WHERE table_name = ?", STATUS_TABLE),
            vec![Value::from(table.table_name())],
        ),
        CacheStep::SetCoverage(Some(r)) => (
            format!(
                "REPLACE INTO {} (table_name, first_day, last_day, updated_at) VALUES (?, ?, ?, NOW())",
                STATUS_TABLE
            ),
            vec![Value::from(table.table_name()), Value::from(r.start), Value::from(r.end)],
        ),
    }
}

/// Runs `action` and returns the resulting state.
pub fn execute(pool: &mysql::Pool, table: CacheTable, action: CacheAction, range: Option<DateRange>) -> ServiceResult<CacheState> {
    let state = status(pool, table)?;
    let steps = plan(table, &state, action, range)?;
    ensure_status_table(pool)?;

    info!("Cache table {}: {} ({:?})", table.table_name(), action, range);

    if steps.iter().any(|s| s.is_ddl()) {
        // DDL commits implicitly, no point in a transaction
        for step in steps.iter() {
            let (sql, params) = step_statement(table, step);
            debug!("cache step {:?}", step);
            pool.prep_exec(sql, params)?;
        }
    } else {
        let mut transaction = pool.start_transaction(false, None, None)?;
        for step in steps.iter() {
            let (sql, params) = step_statement(table, step);
            debug!("cache step {:?}", step);
            transaction.prep_exec(sql, params)?;
        }
        transaction.commit()?;
    }

    status(pool, table)
}
