#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use stallingen_server::models::{Facility, IdType, User};

pub mod graphql;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd(y, m, d)
}

pub fn datetime(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
    date(y, m, d).and_hms(h, min, 0)
}

pub fn time(h: u32, min: u32) -> NaiveTime {
    NaiveTime::from_hms(h, min, 0)
}

pub fn user(role_id: IdType, own_contact_id: Option<IdType>) -> User {
    User {
        user_id: "00000000-0000-0000-0000-000000000001".to_string(),
        user_name: "tester".to_string(),
        display_name: None,
        encrypted_password: String::new(),
        role_id,
        group_id: String::new(),
        own_contact_id,
        status: true,
        last_login: None,
        last_password_change: datetime(2024, 1, 1, 0, 0),
    }
}

/// A facility without opening hours.
pub fn facility(site_id: Option<IdType>, exploitant_id: Option<IdType>) -> Facility {
    Facility {
        id: "F1".to_string(),
        stallings_id: Some("3500_001".to_string()),
        site_id,
        exploitant_id,
        title: Some("Stationsplein".to_string()),
        location: None,
        postcode: None,
        plaats: Some("Utrecht".to_string()),
        stalling_type: Some("bewaakt".to_string()),
        coordinaten: None,
        tariefcode: None,
        status: "1".to_string(),
        open_ma: None,
        dicht_ma: None,
        open_di: None,
        dicht_di: None,
        open_wo: None,
        dicht_wo: None,
        open_do: None,
        dicht_do: None,
        open_vr: None,
        dicht_vr: None,
        open_za: None,
        dicht_za: None,
        open_zo: None,
        dicht_zo: None,
        date_modified: None,
    }
}
