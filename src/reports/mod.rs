pub mod cache_table;
pub mod date_utils;
pub mod period;
pub mod query;
pub mod service;

pub use self::query::{DataSource, ReportParams, ReportSource, ReportType, SeriesGrouping};
pub use self::service::{run_report, ReportData};
