use chrono::{NaiveDateTime, NaiveTime};
use derive_more::Display;
use diesel::{MysqlConnection, r2d2::ConnectionManager};

use super::schema::*;

// type alias to use in multiple places
pub type Pool = r2d2::Pool<ConnectionManager<MysqlConnection>>;

pub type IdType = i32;

/// Facility status that makes it show up in the public listing.
pub const FACILITY_STATUS_PUBLIC: &str = "1";

#[derive(Debug, Display, Clone, Copy, juniper::GraphQLEnum, PartialEq, Eq)]
pub enum ItemType {
    /// A municipality (gemeente)
    Organizations,
    /// A facility operator (exploitant)
    Exploitant,
    Dataprovider,
    Admin,
}

impl ItemType {
    pub fn from_db(name: &str) -> Option<ItemType> {
        match name {
            "organizations" => Some(ItemType::Organizations),
            "exploitant" => Some(ItemType::Exploitant),
            "dataprovider" => Some(ItemType::Dataprovider),
            "admin" => Some(ItemType::Admin),
            _ => None,
        }
    }

    pub fn to_db(&self) -> &'static str {
        match self {
            ItemType::Organizations => "organizations",
            ItemType::Exploitant => "exploitant",
            ItemType::Dataprovider => "dataprovider",
            ItemType::Admin => "admin",
        }
    }
}

#[derive(Debug, Display, Clone, Copy, juniper::GraphQLEnum, PartialEq, Eq)]
pub enum FacilityType {
    Bewaakt,
    Geautomatiseerd,
    Fietskluizen,
    Buurtstalling,
    Fietstrommel,
    Toezicht,
    Onbewaakt,
}

impl FacilityType {
    pub fn from_db(name: &str) -> Option<FacilityType> {
        match name {
            "bewaakt" => Some(FacilityType::Bewaakt),
            "geautomatiseerd" => Some(FacilityType::Geautomatiseerd),
            "fietskluizen" => Some(FacilityType::Fietskluizen),
            "buurtstalling" => Some(FacilityType::Buurtstalling),
            "fietstrommel" => Some(FacilityType::Fietstrommel),
            "toezicht" => Some(FacilityType::Toezicht),
            "onbewaakt" => Some(FacilityType::Onbewaakt),
            _ => None,
        }
    }

    pub fn to_db(&self) -> &'static str {
        match self {
            FacilityType::Bewaakt => "bewaakt",
            FacilityType::Geautomatiseerd => "geautomatiseerd",
            FacilityType::Fietskluizen => "fietskluizen",
            FacilityType::Buurtstalling => "buurtstalling",
            FacilityType::Fietstrommel => "fietstrommel",
            FacilityType::Toezicht => "toezicht",
            FacilityType::Onbewaakt => "onbewaakt",
        }
    }
}

#[derive(Debug, Display, Clone, Copy, juniper::GraphQLEnum, PartialEq, Eq)]
pub enum ArticleType {
    Page,
    Faq,
}

impl ArticleType {
    pub fn from_db(name: &str) -> Option<ArticleType> {
        match name {
            "page" => Some(ArticleType::Page),
            "faq" => Some(ArticleType::Faq),
            _ => None,
        }
    }

    pub fn to_db(&self) -> &'static str {
        match self {
            ArticleType::Page => "page",
            ArticleType::Faq => "faq",
        }
    }
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[table_name = "security_users"]
pub struct User {
    pub user_id: String,
    pub user_name: String,
    pub display_name: Option<String>,
    pub encrypted_password: String,
    pub role_id: IdType,
    pub group_id: String,
    pub own_contact_id: Option<IdType>,
    pub status: bool,
    pub last_login: Option<NaiveDateTime>,
    pub last_password_change: NaiveDateTime,
}

#[derive(Debug, Queryable, Insertable)]
#[table_name = "user_contacts"]
pub struct UserContact {
    pub user_id: String,
    pub contact_id: IdType,
}

#[derive(Debug, Clone, Queryable)]
pub struct Contact {
    pub id: IdType,
    pub item_type: String,
    pub company_name: Option<String>,
    pub zip_id: Option<String>,
    pub helpdesk: Option<String>,
    pub status: bool,
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[table_name = "fietsenstallingen"]
pub struct Facility {
    pub id: String,
    pub stallings_id: Option<String>,
    pub site_id: Option<IdType>,
    pub exploitant_id: Option<IdType>,
    pub title: Option<String>,
    pub location: Option<String>,
    pub postcode: Option<String>,
    pub plaats: Option<String>,
    pub stalling_type: Option<String>,
    pub coordinaten: Option<String>,
    pub tariefcode: Option<i32>,
    pub status: String,

    pub open_ma: Option<NaiveTime>,
    pub dicht_ma: Option<NaiveTime>,
    pub open_di: Option<NaiveTime>,
    pub dicht_di: Option<NaiveTime>,
    pub open_wo: Option<NaiveTime>,
    pub dicht_wo: Option<NaiveTime>,
    pub open_do: Option<NaiveTime>,
    pub dicht_do: Option<NaiveTime>,
    pub open_vr: Option<NaiveTime>,
    pub dicht_vr: Option<NaiveTime>,
    pub open_za: Option<NaiveTime>,
    pub dicht_za: Option<NaiveTime>,
    pub open_zo: Option<NaiveTime>,
    pub dicht_zo: Option<NaiveTime>,

    pub date_modified: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Queryable)]
pub struct BikeType {
    pub id: IdType,
    pub name: String,
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[table_name = "fietsenstalling_capaciteit"]
pub struct CapacityEntry {
    pub fietsenstalling_id: String,
    pub bike_type_id: IdType,
    pub capaciteit: i32,
}

#[derive(Debug, Clone, Queryable)]
pub struct Article {
    pub id: String,
    pub site_id: Option<IdType>,
    pub title: String,
    pub summary: Option<String>,
    pub body: Option<String>,
    pub navigation: Option<String>,
    pub article_type: String,
    pub sort_order: i32,
    pub status: bool,
    pub date_created: NaiveDateTime,
    pub date_modified: NaiveDateTime,
}

pub fn new_uuid() -> String {
    uuid::Uuid::new_v4().to_hyphenated().to_string().to_uppercase()
}
