//! Bicycle parking facilities: opening hours and the queries listing them.
//!
//! Opening hours are stored per weekday as an open and a close time. A day with
//! both times at 00:00 is closed, 00:00 - 23:59 is open the whole day and a
//! close time before the open time means the facility closes after midnight,
//! during the next day.

use std::collections::HashMap;

use chrono::{NaiveDateTime, NaiveTime, Timelike, Utc};
use diesel::{MysqlConnection, prelude::*};

use crate::models::{CapacityEntry, Facility, FACILITY_STATUS_PUBLIC, IdType, ItemType};
use crate::reports::date_utils::{weekday_index, weekday_name};
use crate::schema::fietsenstallingen;
use crate::security::ContactScope;
use crate::web::errors::{ServiceError, ServiceResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, juniper::GraphQLEnum)]
pub enum OpenStatus {
    Open,
    Closed,
    AlwaysOpen,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayHours {
    Unknown,
    Closed,
    AlwaysOpen,
    Open { open: NaiveTime, close: NaiveTime },
}

fn is_midnight(time: NaiveTime) -> bool {
    time.hour() == 0 && time.minute() == 0
}

fn is_end_of_day(time: NaiveTime) -> bool {
    time.hour() == 23 && time.minute() == 59
}

impl DayHours {
    pub fn from_times(open: Option<NaiveTime>, close: Option<NaiveTime>) -> DayHours {
        match (open, close) {
            (Some(open), Some(close)) => {
                if is_midnight(open) && is_midnight(close) {
                    DayHours::Closed
                } else if is_midnight(open) && is_end_of_day(close) {
                    DayHours::AlwaysOpen
                } else {
                    DayHours::Open { open, close }
                }
            },
            _ => DayHours::Unknown,
        }
    }

    /// Whether the opening continues into the next day.
    pub fn wraps_midnight(&self) -> bool {
        match self {
            DayHours::Open { open, close } => close < open,
            _ => false,
        }
    }

    pub fn label(&self) -> String {
        match self {
            DayHours::Unknown => "onbekend".to_string(),
            DayHours::Closed => "gesloten".to_string(),
            DayHours::AlwaysOpen => "24 uur".to_string(),
            DayHours::Open { open, close } => format!("{} - {}", open.format("%H:%M"), close.format("%H:%M")),
        }
    }
}

pub fn format_hours(open: Option<NaiveTime>, close: Option<NaiveTime>) -> String {
    DayHours::from_times(open, close).label()
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpeningHours {
    /// Monday first
    days: [DayHours; 7],
}

impl OpeningHours {
    pub fn from_facility(facility: &Facility) -> OpeningHours {
        let f = facility;
        OpeningHours {
            days: [
                DayHours::from_times(f.open_ma, f.dicht_ma),
                DayHours::from_times(f.open_di, f.dicht_di),
                DayHours::from_times(f.open_wo, f.dicht_wo),
                DayHours::from_times(f.open_do, f.dicht_do),
                DayHours::from_times(f.open_vr, f.dicht_vr),
                DayHours::from_times(f.open_za, f.dicht_za),
                DayHours::from_times(f.open_zo, f.dicht_zo),
            ],
        }
    }

    /// Hours of a weekday, monday = 0.
    pub fn day(&self, weekday: u32) -> DayHours {
        self.days.get(weekday as usize).copied().unwrap_or(DayHours::Unknown)
    }

    pub fn is_always_open(&self) -> bool {
        self.days.iter().all(|x| *x == DayHours::AlwaysOpen)
    }

    pub fn status_at(&self, time: NaiveDateTime) -> OpenStatus {
        let today = weekday_index(time.date());
        let clock = time.time();

        // The tail of yesterday's opening after midnight
        let yesterday = self.day((today + 6) % 7);
        if let DayHours::Open { close, .. } = yesterday {
            if yesterday.wraps_midnight() && clock < close {
                return OpenStatus::Open
            }
        }

        match self.day(today) {
            DayHours::Unknown => OpenStatus::Unknown,
            DayHours::Closed => OpenStatus::Closed,
            DayHours::AlwaysOpen => OpenStatus::AlwaysOpen,
            DayHours::Open { open, close } => {
                let is_open = if close > open {
                    open <= clock && clock < close
                } else if close < open {
                    clock >= open
                } else {
                    false
                };
                if is_open { OpenStatus::Open } else { OpenStatus::Closed }
            },
        }
    }

    /// Per weekday name and formatted hours, monday first.
    pub fn describe(&self) -> Vec<(&'static str, String)> {
        (0..7u32).map(|d| (weekday_name(d), self.day(d).label())).collect()
    }
}

/// Parses an `HH:MM` time.
pub fn parse_time(value: &str) -> ServiceResult<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map_err(|_| ServiceError::BadRequest(format!("Invalid time '{}', expected HH:MM", value)))
}

pub fn total_capacity(entries: &[CapacityEntry]) -> i32 {
    entries.iter().map(|x| x.capaciteit.max(0)).sum()
}

#[derive(juniper::GraphQLInputObject)]
pub struct OpeningHoursInput {
    /// Monday = 0
    pub day: i32,
    /// `HH:MM`, absent for unknown
    pub open: Option<String>,
    pub close: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayTimes {
    pub day: u32,
    pub open: Option<NaiveTime>,
    pub close: Option<NaiveTime>,
}

impl DayTimes {
    pub fn parse(input: &OpeningHoursInput) -> ServiceResult<DayTimes> {
        if input.day < 0 || input.day > 6 {
            return Err(ServiceError::BadRequest(format!("Invalid weekday {}", input.day)))
        }
        let open = input.open.as_ref().map(|x| parse_time(x)).transpose()?;
        let close = input.close.as_ref().map(|x| parse_time(x)).transpose()?;
        Ok(DayTimes { day: input.day as u32, open, close })
    }
}

/// Fields to change on a facility, `None` leaves a column untouched.
#[derive(Default, AsChangeset)]
#[table_name="fietsenstallingen"]
pub struct FacilityChanges {
    pub stallings_id: Option<String>,
    pub site_id: Option<IdType>,
    pub exploitant_id: Option<Option<IdType>>,
    pub title: Option<String>,
    pub location: Option<String>,
    pub postcode: Option<String>,
    pub plaats: Option<String>,
    pub stalling_type: Option<String>,
    pub coordinaten: Option<String>,
    pub tariefcode: Option<i32>,
    pub status: Option<String>,

    pub open_ma: Option<Option<NaiveTime>>,
    pub dicht_ma: Option<Option<NaiveTime>>,
    pub open_di: Option<Option<NaiveTime>>,
    pub dicht_di: Option<Option<NaiveTime>>,
    pub open_wo: Option<Option<NaiveTime>>,
    pub dicht_wo: Option<Option<NaiveTime>>,
    pub open_do: Option<Option<NaiveTime>>,
    pub dicht_do: Option<Option<NaiveTime>>,
    pub open_vr: Option<Option<NaiveTime>>,
    pub dicht_vr: Option<Option<NaiveTime>>,
    pub open_za: Option<Option<NaiveTime>>,
    pub dicht_za: Option<Option<NaiveTime>>,
    pub open_zo: Option<Option<NaiveTime>>,
    pub dicht_zo: Option<Option<NaiveTime>>,

    pub date_modified: Option<NaiveDateTime>,
}

impl FacilityChanges {
    pub fn set_day(&mut self, times: &DayTimes) {
        let (open, close) = match times.day {
            0 => (&mut self.open_ma, &mut self.dicht_ma),
            1 => (&mut self.open_di, &mut self.dicht_di),
            2 => (&mut self.open_wo, &mut self.dicht_wo),
            3 => (&mut self.open_do, &mut self.dicht_do),
            4 => (&mut self.open_vr, &mut self.dicht_vr),
            5 => (&mut self.open_za, &mut self.dicht_za),
            _ => (&mut self.open_zo, &mut self.dicht_zo),
        };
        *open = Some(times.open);
        *close = Some(times.close);
    }
}

pub fn set_facility_day(facility: &mut Facility, times: &DayTimes) {
    let (open, close) = match times.day {
        0 => (&mut facility.open_ma, &mut facility.dicht_ma),
        1 => (&mut facility.open_di, &mut facility.dicht_di),
        2 => (&mut facility.open_wo, &mut facility.dicht_wo),
        3 => (&mut facility.open_do, &mut facility.dicht_do),
        4 => (&mut facility.open_vr, &mut facility.dicht_vr),
        5 => (&mut facility.open_za, &mut facility.dicht_za),
        _ => (&mut facility.open_zo, &mut facility.dicht_zo),
    };
    *open = times.open;
    *close = times.close;
}

pub fn load_public_facilities(conn: &MysqlConnection, zip_id: Option<&str>) -> ServiceResult<Vec<Facility>> {
    use crate::schema::contacts::dsl as contact_dsl;
    use crate::schema::fietsenstallingen::dsl::*;

    let mut query = fietsenstallingen.filter(status.eq(FACILITY_STATUS_PUBLIC)).into_boxed();

    if let Some(zip) = zip_id {
        let sites = contact_dsl::contacts
            .filter(contact_dsl::zip_id.eq(zip))
            .filter(contact_dsl::item_type.eq(ItemType::Organizations.to_db()))
            .select(contact_dsl::id)
            .load::<IdType>(conn)?;
        query = query.filter(site_id.eq_any(sites));
    }

    Ok(query.order(title.asc()).load::<Facility>(conn)?)
}

pub fn load_visible_facilities(conn: &MysqlConnection, scope: ContactScope) -> ServiceResult<Vec<Facility>> {
    use crate::schema::fietsenstallingen::dsl::*;

    let facilities = match scope {
        ContactScope::All => fietsenstallingen.order(title.asc()).load::<Facility>(conn)?,
        ContactScope::Contact(contact) => fietsenstallingen
            .filter(site_id.eq(contact).or(exploitant_id.eq(contact)))
            .order(title.asc())
            .load::<Facility>(conn)?,
        ContactScope::Nothing => vec![],
    };
    Ok(facilities)
}

pub fn find_facility(conn: &MysqlConnection, facility_id: &str) -> ServiceResult<Facility> {
    use crate::schema::fietsenstallingen::dsl::*;

    fietsenstallingen.find(facility_id)
        .first::<Facility>(conn)
        .optional()?
        .ok_or_else(|| ServiceError::NotFound("Fietsenstalling".to_string()))
}

pub fn load_by_stallings_ids(conn: &MysqlConnection, ids: &[String]) -> ServiceResult<Vec<Facility>> {
    use crate::schema::fietsenstallingen::dsl::*;

    Ok(fietsenstallingen.filter(stallings_id.eq_any(ids)).load::<Facility>(conn)?)
}

/// Titles of the facilities with the given stallings ids, keyed by stallings id.
pub fn titles_by_stallings_id(conn: &MysqlConnection, ids: &[String]) -> ServiceResult<HashMap<String, String>> {
    let titles = load_by_stallings_ids(conn, ids)?
        .into_iter()
        .filter_map(|f| match (f.stallings_id, f.title) {
            (Some(id), Some(t)) => Some((id, t)),
            _ => None,
        })
        .collect();
    Ok(titles)
}

pub fn load_capacity(conn: &MysqlConnection, facility_id: &str) -> ServiceResult<Vec<CapacityEntry>> {
    use crate::schema::fietsenstalling_capaciteit::dsl::*;

    Ok(fietsenstalling_capaciteit
        .filter(fietsenstalling_id.eq(facility_id))
        .order(bike_type_id.asc())
        .load::<CapacityEntry>(conn)?)
}

/// Sets the places for one bike type, zero removes the entry.
pub fn set_capacity(conn: &MysqlConnection, facility_id: &str, bike_type: IdType, places: i32) -> ServiceResult<()> {
    use crate::schema::fietsenstalling_capaciteit::dsl::*;

    if places < 0 {
        return Err(ServiceError::BadRequest("Capacity cannot be negative".to_string()))
    }

    if places == 0 {
        diesel::delete(fietsenstalling_capaciteit.find((facility_id, bike_type)))
            .execute(conn)?;
    } else {
        let entry = CapacityEntry {
            fietsenstalling_id: facility_id.to_string(),
            bike_type_id: bike_type,
            capaciteit: places,
        };
        diesel::replace_into(fietsenstalling_capaciteit)
            .values(&entry)
            .execute(conn)?;
    }
    Ok(())
}

pub fn insert_facility(conn: &MysqlConnection, facility: &Facility) -> ServiceResult<Facility> {
    use crate::schema::fietsenstallingen::dsl::*;

    diesel::insert_into(fietsenstallingen)
        .values(facility)
        .execute(conn)?;

    find_facility(conn, &facility.id)
}

pub fn update_facility(conn: &MysqlConnection, facility_id: &str, mut changes: FacilityChanges) -> ServiceResult<Facility> {
    use crate::schema::fietsenstallingen::dsl::*;

    find_facility(conn, facility_id)?;

    changes.date_modified = Some(Utc::now().naive_utc());
    diesel::update(fietsenstallingen.find(facility_id))
        .set(&changes)
        .execute(conn)?;
    find_facility(conn, facility_id)
}

pub fn delete_facility(conn: &MysqlConnection, facility_id: &str) -> ServiceResult<()> {
    use crate::schema::fietsenstalling_capaciteit::dsl as capacity_dsl;
    use crate::schema::fietsenstallingen::dsl::*;

    conn.transaction::<_, ServiceError, _>(|| {
        diesel::delete(capacity_dsl::fietsenstalling_capaciteit.filter(capacity_dsl::fietsenstalling_id.eq(facility_id)))
            .execute(conn)?;
        let deleted = diesel::delete(fietsenstallingen.find(facility_id))
            .execute(conn)?;
        if deleted == 0 {
            return Err(ServiceError::NotFound("Fietsenstalling".to_string()))
        }
        Ok(())
    })
}
