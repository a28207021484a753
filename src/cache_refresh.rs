use std::time::{Duration, Instant};

use actix::prelude::*;
use chrono::{Duration as DateDuration, NaiveDate, Utc};
use log::{error, info, warn};

use crate::AppData;
use crate::reports::cache_table::{self, CacheAction, CacheState, CacheTable, DateRange};

/// Keeps the recent days of every existing cache table up to date.
pub struct CacheRefreshActor {
    pub app_data: AppData,
    pub interval: Duration,
    pub window_days: i64,
}

/// Range rebuilt by a refresh run on `today`: the last `window_days` days,
/// today included.
pub fn refresh_range(today: NaiveDate, window_days: i64) -> DateRange {
    let days = window_days.max(1);
    DateRange {
        start: today - DateDuration::days(days - 1),
        end: today,
    }
}

/// Longest gap after the built coverage that a refresh run fills in.
pub const MAX_CATCH_UP_DAYS: i64 = 366;

/// Range to rebuild so that the recent days join the built coverage of a
/// table. The recent days are stretched back to the end of the coverage, a
/// gap longer than `max_gap_days` (or a coverage past the recent days) gives
/// `None`, since the rebuild would replace the coverage.
pub fn catch_up_range(coverage: Option<DateRange>, recent: DateRange, max_gap_days: i64) -> Option<DateRange> {
    let built = match coverage {
        Some(x) => x,
        None => return Some(recent),
    };
    if built.touches(&recent) {
        return Some(recent)
    }
    if built.start > recent.end {
        return None
    }

    let gap = recent.start.signed_duration_since(built.end).num_days() - 1;
    if gap > max_gap_days {
        None
    } else {
        Some(DateRange {
            start: built.end + DateDuration::days(1),
            end: recent.end,
        })
    }
}

impl CacheRefreshActor {
    fn on_tick(&mut self, _ctx: &mut Context<Self>) {
        let recent = refresh_range(Utc::now().naive_utc().date(), self.window_days);

        for table in CacheTable::ALL.iter() {
            let start = Instant::now();
            let pool = &self.app_data.report_pool;

            let coverage = match cache_table::status(pool, *table) {
                Ok(CacheState::Missing) => continue,
                Ok(state) => state.coverage(),
                Err(e) => {
                    error!("Cannot read status of cache table {}: {}", table.table_name(), e);
                    continue
                },
            };

            let range = match catch_up_range(coverage, recent, MAX_CATCH_UP_DAYS) {
                Some(x) => x,
                None => {
                    warn!("Skipping refresh of cache table {}: built days {:?} too far from {:?}",
                          table.table_name(), coverage, recent);
                    continue
                },
            };

            match cache_table::execute(pool, *table, CacheAction::Update, Some(range)) {
                Ok(_) => info!("Cache table {} refreshed in {}ms", table.table_name(), start.elapsed().as_millis()),
                Err(e) => error!("Error refreshing cache table {}: {}", table.table_name(), e),
            }
        }
    }
}

impl Actor for CacheRefreshActor {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Context<Self>) {
        info!("starting the cache refresh actor");

        IntervalFunc::new(self.interval, Self::on_tick)
            .finish()
            .spawn(ctx);
    }
}
