use std::cell::RefCell;
use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Local, NaiveDate, NaiveDateTime, Utc};
use diesel::{mysql::MysqlConnection, prelude::*};
use diesel::r2d2::ConnectionManager;
use juniper::RootNode;
use r2d2::PooledConnection;

use crate::AppData;
use crate::facilities::{self, DayTimes, FacilityChanges, OpeningHours, OpeningHoursInput, OpenStatus};
use crate::models::{Article, ArticleType, BikeType, Contact, Facility, FACILITY_STATUS_PUBLIC, FacilityType,
                    IdType, ItemType, new_uuid, User};
use crate::reports::{self, ReportData, ReportParams, ReportSource, ReportType, SeriesGrouping};
use crate::reports::cache_table::{self, CacheAction, CacheState, CacheTable, DateRange};
use crate::reports::period::ReportUnit;
use crate::schema::*;
use crate::security::{ContactScope, LegacyRole, NewUserData, Operation, PermissionCheckable, SecurityProfile,
                      SecurityTopic, SessionUser, TopicRights, UserRole, UserUpdateData};

use super::errors::{ServiceError, ServiceResult};

no_arg_sql_function!(last_insert_id, diesel::sql_types::Bigint);

pub struct Context {
    pub app: Arc<AppData>,
    pub identity: RefCell<Option<String>>,
    session: RefCell<Option<SessionUser>>,
}

impl Context {
    pub fn new(
        app_data: Arc<AppData>,
        original_identity: Option<String>,
        original_session: Option<SessionUser>,
    ) -> Context {
        Context {
            app: app_data,
            identity: RefCell::new(original_identity),
            session: RefCell::new(original_session),
        }
    }

    pub fn get_connection(&self) -> ServiceResult<PooledConnection<ConnectionManager<MysqlConnection>>> {
        Ok(self.app.pool.get()?)
    }

    pub fn get_session(&self) -> Option<SessionUser> {
        self.session.borrow().clone()
    }

    pub fn get_session_required(&self) -> ServiceResult<SessionUser> {
        self.get_session().ok_or(ServiceError::LoginRequired)
    }

    pub fn save_session(&self, session: Option<SessionUser>) {
        if let Some(session) = session {
            let id_str = self.app.auth_cache.save_identity(&session);
            self.identity.replace(Some(id_str));
            self.session.replace(Some(session));
        } else {
            self.identity.replace(None);
            self.session.replace(None);
        }
    }
}

impl juniper::Context for Context {}

#[derive(Debug, juniper::GraphQLObject)]
pub struct SessionProfile {
    pub user_id: String,
    pub role: UserRole,
    pub legacy_role: Option<LegacyRole>,
    pub own_contact_id: Option<IdType>,
    pub active_contact_id: Option<IdType>,
    pub linked_contacts: Vec<IdType>,
    pub rights: Vec<TopicRights>,
}

impl From<&SessionUser> for SessionProfile {
    fn from(session: &SessionUser) -> Self {
        SessionProfile {
            user_id: session.user.user_id.clone(),
            role: session.profile.role,
            legacy_role: session.legacy_role,
            own_contact_id: session.own_contact_id,
            active_contact_id: session.active_contact_id,
            linked_contacts: session.linked_contacts.clone(),
            rights: session.profile.topic_rights(),
        }
    }
}

#[derive(Debug, juniper::GraphQLObject)]
pub struct FacilityCapacity {
    pub bike_type_id: IdType,
    pub capacity: i32,
}

#[derive(Debug, juniper::GraphQLObject)]
pub struct DayOpening {
    /// Monday = 0
    pub day: i32,
    pub name: String,
    pub hours: String,
}

#[derive(Debug, juniper::GraphQLObject)]
pub struct CacheStatusInfo {
    pub table: CacheTable,
    pub name: String,
    pub exists: bool,
    pub rows: Option<i32>,
    pub first_day: Option<NaiveDate>,
    pub last_day: Option<NaiveDate>,
}

impl CacheStatusInfo {
    fn new(table: CacheTable, state: &CacheState) -> Self {
        let (rows, coverage) = match state {
            CacheState::Missing => (None, None),
            CacheState::Available { rows, coverage } => (Some(*rows as i32), *coverage),
        };
        CacheStatusInfo {
            table,
            name: table.table_name().to_string(),
            exists: state.exists(),
            rows,
            first_day: coverage.map(|x| x.start),
            last_day: coverage.map(|x| x.end),
        }
    }
}

fn load_capacity_info(ctx: &Context, facility_id: &str) -> ServiceResult<Vec<FacilityCapacity>> {
    let conn = ctx.get_connection()?;
    Ok(facilities::load_capacity(&conn, facility_id)?
        .into_iter()
        .map(|x| FacilityCapacity { bike_type_id: x.bike_type_id, capacity: x.capaciteit })
        .collect())
}

fn find_contact(conn: &MysqlConnection, id: IdType) -> ServiceResult<Contact> {
    use crate::schema::contacts::dsl;

    dsl::contacts.find(id)
        .first::<Contact>(conn)
        .optional()?
        .ok_or_else(|| ServiceError::NotFound("Contact".to_string()))
}

fn contact_topic(contact: &Contact) -> SecurityTopic {
    ItemType::from_db(&contact.item_type)
        .map(SecurityTopic::for_contact_type)
        .unwrap_or(SecurityTopic::System)
}

/// Whether a contact shows up in the session's listings.
fn contact_listed(session: &SessionUser, id: IdType) -> bool {
    match session.scope() {
        ContactScope::All => true,
        ContactScope::Contact(c) => id == c || (!session.is_platform_wide() && session.may_access_contact(id)),
        ContactScope::Nothing => false,
    }
}

fn may_read_content(ctx: &Context) -> bool {
    ctx.get_session()
        .map(|x| x.profile.allows(SecurityTopic::Content, Operation::Read))
        .unwrap_or(false)
}

#[juniper::object(
    description = "A back office user account",
    Context = Context,
)]
impl User {
    pub fn id(&self) -> &str {
        self.user_id.as_str()
    }

    pub fn user_name(&self) -> &str {
        self.user_name.as_str()
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    pub fn role(&self) -> Option<LegacyRole> {
        LegacyRole::from_id(self.role_id)
    }

    pub fn own_contact_id(&self) -> Option<IdType> {
        self.own_contact_id
    }

    pub fn status(&self) -> bool {
        self.status
    }

    pub fn last_login(&self) -> Option<NaiveDateTime> {
        self.last_login
    }

    /// Contacts the user may act on besides their own organization
    pub fn linked_contacts(&self, ctx: &Context) -> ServiceResult<Vec<IdType>> {
        ctx.app.auth_cache.linked_contacts(&ctx.app, &self.user_id)
    }
}

#[juniper::object(
    description = "A municipality, operator, data provider or the platform itself",
    Context = Context,
)]
impl Contact {
    pub fn id(&self) -> IdType {
        self.id
    }

    pub fn item_type(&self) -> Option<ItemType> {
        ItemType::from_db(&self.item_type)
    }

    pub fn company_name(&self) -> Option<&str> {
        self.company_name.as_deref()
    }

    pub fn zip_id(&self) -> Option<&str> {
        self.zip_id.as_deref()
    }

    pub fn helpdesk(&self) -> Option<&str> {
        self.helpdesk.as_deref()
    }

    pub fn status(&self) -> bool {
        self.status
    }

    /// Facilities owned or operated by this contact
    pub fn facilities(&self, ctx: &Context) -> ServiceResult<Vec<Facility>> {
        let session = ctx.get_session_required()?;
        session.ensure_right(SecurityTopic::Fietsenstallingen, Operation::Read)?;
        let conn = ctx.get_connection()?;
        Ok(facilities::load_visible_facilities(&conn, ContactScope::Contact(self.id))?
            .into_iter()
            .filter(|x| session.facility_visible(x))
            .collect())
    }
}

#[juniper::object(
    description = "A bicycle parking facility",
    Context = Context,
)]
impl Facility {
    pub fn id(&self) -> &str {
        self.id.as_str()
    }

    pub fn stallings_id(&self) -> Option<&str> {
        self.stallings_id.as_deref()
    }

    pub fn site_id(&self) -> Option<IdType> {
        self.site_id
    }

    pub fn exploitant_id(&self) -> Option<IdType> {
        self.exploitant_id
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn postcode(&self) -> Option<&str> {
        self.postcode.as_deref()
    }

    pub fn plaats(&self) -> Option<&str> {
        self.plaats.as_deref()
    }

    pub fn stalling_type(&self) -> Option<FacilityType> {
        self.stalling_type.as_deref().and_then(FacilityType::from_db)
    }

    pub fn coordinaten(&self) -> Option<&str> {
        self.coordinaten.as_deref()
    }

    pub fn tariefcode(&self) -> Option<i32> {
        self.tariefcode
    }

    pub fn is_public(&self) -> bool {
        self.status == FACILITY_STATUS_PUBLIC
    }

    pub fn opening_hours(&self) -> Vec<DayOpening> {
        OpeningHours::from_facility(self)
            .describe()
            .into_iter()
            .enumerate()
            .map(|(day, (name, hours))| DayOpening { day: day as i32, name: name.to_string(), hours })
            .collect()
    }

    /// Whether the facility is open right now, in local time
    pub fn open_status(&self) -> OpenStatus {
        OpeningHours::from_facility(self).status_at(Local::now().naive_local())
    }

    pub fn capacity(&self, ctx: &Context) -> ServiceResult<Vec<FacilityCapacity>> {
        load_capacity_info(ctx, &self.id)
    }

    pub fn total_capacity(&self, ctx: &Context) -> ServiceResult<i32> {
        let conn = ctx.get_connection()?;
        Ok(facilities::total_capacity(&facilities::load_capacity(&conn, &self.id)?))
    }

    pub fn date_modified(&self) -> Option<NaiveDateTime> {
        self.date_modified
    }
}

#[juniper::object(
    description = "A vehicle type facilities can have places for",
    Context = Context,
)]
impl BikeType {
    pub fn id(&self) -> IdType {
        self.id
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }
}

#[juniper::object(
    description = "A content page or FAQ entry",
    Context = Context,
)]
impl Article {
    pub fn id(&self) -> &str {
        self.id.as_str()
    }

    pub fn site_id(&self) -> Option<IdType> {
        self.site_id
    }

    pub fn title(&self) -> &str {
        self.title.as_str()
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    pub fn navigation(&self) -> Option<&str> {
        self.navigation.as_deref()
    }

    pub fn article_type(&self) -> Option<ArticleType> {
        ArticleType::from_db(&self.article_type)
    }

    pub fn sort_order(&self) -> i32 {
        self.sort_order
    }

    pub fn status(&self) -> bool {
        self.status
    }

    pub fn date_created(&self) -> NaiveDateTime {
        self.date_created
    }

    pub fn date_modified(&self) -> NaiveDateTime {
        self.date_modified
    }
}

#[derive(juniper::GraphQLInputObject)]
pub struct ReportInput {
    pub report_type: ReportType,
    pub unit: ReportUnit,
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Stallings ids
    pub facilities: Vec<String>,
    pub grouping: Option<SeriesGrouping>,
    /// Minutes after midnight at which the reporting day starts
    pub day_begins_at: Option<i32>,
    pub source: Option<ReportSource>,
}

impl From<ReportInput> for ReportParams {
    fn from(x: ReportInput) -> ReportParams {
        ReportParams {
            report_type: x.report_type,
            unit: x.unit,
            start: x.start,
            end: x.end,
            facilities: x.facilities,
            grouping: x.grouping.unwrap_or(SeriesGrouping::PerFacility),
            day_begins_at: x.day_begins_at.unwrap_or(0),
            source: x.source.unwrap_or(ReportSource::Auto),
        }
    }
}

pub struct QueryRoot;

#[juniper::object(
    Context = Context
)]
impl QueryRoot {
    fn api_version() -> &str {
        "1.0"
    }

    fn me(ctx: &Context) -> Option<User> {
        ctx.get_session().map(|x| x.user)
    }

    fn my_profile(ctx: &Context) -> ServiceResult<SessionProfile> {
        Ok(SessionProfile::from(&ctx.get_session_required()?))
    }

    fn role_rights(ctx: &Context, role: UserRole) -> ServiceResult<Vec<TopicRights>> {
        ctx.get_session_required()?;
        Ok(SecurityProfile::new(role).topic_rights())
    }

    /// Facilities shown on the public site, optionally of one municipality
    fn public_facilities(ctx: &Context, zip_id: Option<String>) -> ServiceResult<Vec<Facility>> {
        let conn = ctx.get_connection()?;
        facilities::load_public_facilities(&conn, zip_id.as_deref())
    }

    fn facilities(ctx: &Context) -> ServiceResult<Vec<Facility>> {
        let session = ctx.get_session_required()?;
        session.ensure_right(SecurityTopic::Fietsenstallingen, Operation::Read)?;

        let conn = ctx.get_connection()?;
        facilities::load_visible_facilities(&conn, session.scope())
    }

    fn facility(ctx: &Context, id: String) -> ServiceResult<Facility> {
        let session = ctx.get_session_required()?;
        session.ensure_right(SecurityTopic::Fietsenstallingen, Operation::Read)?;

        let conn = ctx.get_connection()?;
        let facility = facilities::find_facility(&conn, &id)?;
        session.ensure_facility_visible(&facility)?;
        Ok(facility)
    }

    fn bike_types(ctx: &Context) -> ServiceResult<Vec<BikeType>> {
        use crate::schema::fietstypen::dsl::*;

        let conn = ctx.get_connection()?;
        Ok(fietstypen.order(id.asc()).load::<BikeType>(&conn)?)
    }

    fn contacts(ctx: &Context, item_type: ItemType) -> ServiceResult<Vec<Contact>> {
        use crate::schema::contacts::dsl;

        let session = ctx.get_session_required()?;
        session.ensure_right(SecurityTopic::for_contact_type(item_type), Operation::Read)?;

        let conn = ctx.get_connection()?;
        let contacts = dsl::contacts
            .filter(dsl::item_type.eq(item_type.to_db()))
            .order(dsl::company_name.asc())
            .load::<Contact>(&conn)?;

        Ok(contacts.into_iter()
            .filter(|x| contact_listed(&session, x.id))
            .collect())
    }

    fn contact(ctx: &Context, id: IdType) -> ServiceResult<Contact> {
        let session = ctx.get_session_required()?;
        session.ensure_contact_access(id)?;

        let conn = ctx.get_connection()?;
        let contact = find_contact(&conn, id)?;
        session.ensure_right(contact_topic(&contact), Operation::Read)?;
        Ok(contact)
    }

    fn users(ctx: &Context) -> ServiceResult<Vec<User>> {
        use crate::schema::security_users::dsl::*;

        let session = ctx.get_session_required()?;
        session.ensure_right(SecurityTopic::Users, Operation::Read)?;

        let conn = ctx.get_connection()?;
        Ok(security_users.order(user_name.asc())
            .load::<User>(&conn)?
            .into_iter()
            .filter(|x| session.user_visible(x))
            .collect())
    }

    fn user(ctx: &Context, id: String) -> ServiceResult<User> {
        let session = ctx.get_session_required()?;

        if id == session.id() {
            return Ok(session.user);
        }

        // Only if the user didn't query themselves
        session.ensure_right(SecurityTopic::Users, Operation::Read)?;

        match ctx.app.auth_cache.find_user_by_id(&ctx.app, &id)? {
            Some(user) => {
                session.ensure_user_visible(&user)?;
                Ok(user)
            },
            None => Err(ServiceError::NotFound("User".to_string()))
        }
    }

    /// Visitors only get active articles
    fn articles(ctx: &Context, site_id: Option<IdType>, article_type: Option<ArticleType>) -> ServiceResult<Vec<Article>> {
        use crate::schema::articles::dsl;

        let conn = ctx.get_connection()?;
        let mut query = dsl::articles.into_boxed();
        if let Some(site) = site_id {
            query = query.filter(dsl::site_id.eq(site));
        }
        if let Some(kind) = article_type {
            query = query.filter(dsl::article_type.eq(kind.to_db()));
        }
        if !may_read_content(ctx) {
            query = query.filter(dsl::status.eq(true));
        }

        Ok(query.order((dsl::sort_order.asc(), dsl::title.asc())).load::<Article>(&conn)?)
    }

    fn article(ctx: &Context, id: String) -> ServiceResult<Article> {
        use crate::schema::articles::dsl;

        let conn = ctx.get_connection()?;
        let article = dsl::articles.find(id)
            .first::<Article>(&conn)
            .optional()?
            .ok_or_else(|| ServiceError::NotFound("Article".to_string()))?;

        if !article.status && !may_read_content(ctx) {
            return Err(ServiceError::NotFound("Article".to_string()))
        }
        Ok(article)
    }

    fn report(ctx: &Context, params: ReportInput) -> ServiceResult<ReportData> {
        let session = ctx.get_session_required()?;
        session.ensure_right(SecurityTopic::Rapportages, Operation::Read)?;

        let params = ReportParams::from(params);
        let requested = params.unique_facilities();

        let conn = ctx.get_connection()?;
        let found = facilities::load_by_stallings_ids(&conn, &requested)?;
        std::mem::drop(conn);

        let visible: HashSet<&str> = found.iter()
            .filter(|x| session.facility_visible(x))
            .filter_map(|x| x.stallings_id.as_deref())
            .collect();
        if requested.iter().any(|x| !visible.contains(x.as_str())) {
            return Err(ServiceError::NotFound("Fietsenstalling".to_string()))
        }

        reports::run_report(&ctx.app, &params)
    }

    fn cache_status(ctx: &Context, table: Option<CacheTable>) -> ServiceResult<Vec<CacheStatusInfo>> {
        let session = ctx.get_session_required()?;
        session.ensure_right(SecurityTopic::System, Operation::Read)?;

        let tables = match table {
            Some(x) => vec![x],
            None => CacheTable::ALL.to_vec(),
        };

        let mut infos = Vec::with_capacity(tables.len());
        for table in tables {
            let state = cache_table::status(&ctx.app.report_pool, table)?;
            infos.push(CacheStatusInfo::new(table, &state));
        }
        Ok(infos)
    }
}

pub struct MutationRoot;

#[derive(juniper::GraphQLInputObject)]
pub struct AuthInput {
    user_name: String,
    password: String,
}

#[derive(juniper::GraphQLInputObject)]
pub struct UserInput {
    user_name: String,
    display_name: Option<String>,
    password: String,
    role: LegacyRole,
    own_contact_id: Option<IdType>,
}

#[derive(juniper::GraphQLInputObject)]
pub struct UserUpdateInput {
    user_name: Option<String>,
    display_name: Option<String>,
    password: Option<String>,
    role: Option<LegacyRole>,
    own_contact_id: Option<IdType>,
    status: Option<bool>,
}

#[derive(juniper::GraphQLInputObject)]
pub struct ContactInput {
    item_type: ItemType,
    company_name: Option<String>,
    zip_id: Option<String>,
    helpdesk: Option<String>,
    status: Option<bool>,
}

#[derive(juniper::GraphQLInputObject, AsChangeset)]
#[table_name="contacts"]
pub struct ContactUpdateInput {
    company_name: Option<String>,
    zip_id: Option<String>,
    helpdesk: Option<String>,
    status: Option<bool>,
}

impl ContactUpdateInput {
    fn is_empty(&self) -> bool {
        self.company_name.is_none() && self.zip_id.is_none() && self.helpdesk.is_none() && self.status.is_none()
    }
}

#[derive(Insertable)]
#[table_name="contacts"]
struct ContactInputDb {
    item_type: String,
    company_name: Option<String>,
    zip_id: Option<String>,
    helpdesk: Option<String>,
    status: bool,
}

#[derive(juniper::GraphQLInputObject)]
pub struct FacilityInput {
    stallings_id: Option<String>,
    /// Municipality owning the facility
    site_id: IdType,
    exploitant_id: Option<IdType>,
    title: String,
    location: Option<String>,
    postcode: Option<String>,
    plaats: Option<String>,
    stalling_type: Option<FacilityType>,
    coordinaten: Option<String>,
    tariefcode: Option<i32>,
    is_public: Option<bool>,
    opening_hours: Option<Vec<OpeningHoursInput>>,
}

#[derive(juniper::GraphQLInputObject)]
pub struct FacilityUpdateInput {
    stallings_id: Option<String>,
    /// Moves the facility to another site
    site_id: Option<IdType>,
    exploitant_id: Option<IdType>,
    /// Removes the exploitant
    clear_exploitant: Option<bool>,
    title: Option<String>,
    location: Option<String>,
    postcode: Option<String>,
    plaats: Option<String>,
    stalling_type: Option<FacilityType>,
    coordinaten: Option<String>,
    tariefcode: Option<i32>,
    is_public: Option<bool>,
    opening_hours: Option<Vec<OpeningHoursInput>>,
}

#[derive(juniper::GraphQLInputObject)]
pub struct ArticleInput {
    site_id: Option<IdType>,
    title: String,
    summary: Option<String>,
    body: Option<String>,
    navigation: Option<String>,
    article_type: ArticleType,
    sort_order: Option<i32>,
    status: Option<bool>,
}

#[derive(juniper::GraphQLInputObject)]
pub struct ArticleUpdateInput {
    title: Option<String>,
    summary: Option<String>,
    body: Option<String>,
    navigation: Option<String>,
    article_type: Option<ArticleType>,
    sort_order: Option<i32>,
    status: Option<bool>,
}

#[derive(Insertable, AsChangeset)]
#[table_name="articles"]
struct ArticleInputDb {
    id: Option<String>,
    site_id: Option<IdType>,
    title: Option<String>,
    summary: Option<String>,
    body: Option<String>,
    navigation: Option<String>,
    article_type: Option<String>,
    sort_order: Option<i32>,
    status: Option<bool>,
    date_created: Option<NaiveDateTime>,
    date_modified: Option<NaiveDateTime>,
}

fn facility_status(is_public: bool) -> String {
    if is_public { FACILITY_STATUS_PUBLIC.to_string() } else { "0".to_string() }
}

fn parse_opening_hours(input: Option<Vec<OpeningHoursInput>>) -> ServiceResult<Vec<DayTimes>> {
    input.unwrap_or_default()
        .iter()
        .map(DayTimes::parse)
        .collect()
}

fn find_article(conn: &MysqlConnection, id: &str) -> ServiceResult<Article> {
    use crate::schema::articles::dsl;

    dsl::articles.find(id)
        .first::<Article>(conn)
        .optional()?
        .ok_or_else(|| ServiceError::NotFound("Article".to_string()))
}

fn ensure_article_site(session: &SessionUser, site_id: Option<IdType>) -> ServiceResult<()> {
    match site_id {
        Some(site) => session.ensure_contact_access(site),
        // Articles without site belong to the platform
        None if session.is_platform_wide() => Ok(()),
        None => Err(ServiceError::Unauthorized),
    }
}

fn cache_operation(action: CacheAction) -> Operation {
    match action {
        CacheAction::Create => Operation::Create,
        CacheAction::Update => Operation::Update,
        CacheAction::Clear | CacheAction::Drop => Operation::Delete,
    }
}

#[juniper::object(
    Context = Context
)]
impl MutationRoot {
    fn login(ctx: &Context, auth: AuthInput) -> ServiceResult<User> {
        let user = ctx.app.auth_cache.verify_user(&ctx.app, &auth.user_name, &auth.password)?;
        let session = ctx.app.auth_cache.load_session(&ctx.app, user.clone(), None)?;

        ctx.save_session(Some(session));
        Ok(user)
    }

    fn logout(ctx: &Context) -> bool {// Logout cannot fail
        ctx.save_session(None);
        true
    }

    /// Acts on behalf of another contact from now on
    fn switch_contact(ctx: &Context, contact_id: IdType) -> ServiceResult<SessionProfile> {
        let session = ctx.get_session_required()?;
        session.ensure_contact_access(contact_id)?;

        let conn = ctx.get_connection()?;
        find_contact(&conn, contact_id)?;
        std::mem::drop(conn);

        let session = ctx.app.auth_cache.load_session(&ctx.app, session.user, Some(contact_id))?;
        let profile = SessionProfile::from(&session);
        ctx.save_session(Some(session));
        Ok(profile)
    }

    fn add_user(ctx: &Context, data: UserInput) -> ServiceResult<User> {
        let session = ctx.get_session_required()?;
        session.ensure_right(SecurityTopic::Users, Operation::Create)?;
        session.ensure_can_assign(data.role)?;

        let own_contact_id = match data.own_contact_id {
            Some(contact) => {
                session.ensure_contact_access(contact)?;
                Some(contact)
            },
            None if session.is_platform_wide() => None,
            None => session.active_contact_id,
        };

        ctx.app.auth_cache.add_user(&ctx.app, NewUserData {
            user_name: data.user_name,
            display_name: data.display_name,
            password: data.password,
            role: data.role,
            own_contact_id,
        })
    }

    fn update_user(ctx: &Context, id: String, data: UserUpdateInput) -> ServiceResult<User> {
        let session = ctx.get_session_required()?;
        let is_self = id == session.id();

        if !is_self || data.user_name.is_some() || data.role.is_some() || data.own_contact_id.is_some() || data.status.is_some() {
            session.ensure_right(SecurityTopic::Users, Operation::Update)?;
        }
        if !is_self {
            let target = ctx.app.auth_cache.find_user_by_id(&ctx.app, &id)?
                .ok_or_else(|| ServiceError::NotFound("User".to_string()))?;
            session.ensure_user_visible(&target)?;
        }
        if let Some(role) = data.role {
            session.ensure_can_assign(role)?;
        }
        if let Some(contact) = data.own_contact_id {
            session.ensure_contact_access(contact)?;
        }

        let own_password_changed = is_self && data.password.is_some();

        let res = ctx.app.auth_cache.update_user(&ctx.app, &id, UserUpdateData {
            user_name: data.user_name,
            display_name: data.display_name,
            password: data.password,
            role: data.role,
            own_contact_id: data.own_contact_id,
            status: data.status,
        })?;

        if own_password_changed {
            let refreshed = ctx.app.auth_cache.load_session(&ctx.app, res.clone(), session.active_contact_id)?;
            ctx.save_session(Some(refreshed));
        }

        Ok(res)
    }

    fn delete_user(ctx: &Context, id: String) -> ServiceResult<bool> {
        let session = ctx.get_session_required()?;
        session.ensure_right(SecurityTopic::Users, Operation::Delete)?;
        if session.id() == id {
            return Err(ServiceError::BadRequest("Cannot delete the logged in user".to_string()))
        }

        let target = ctx.app.auth_cache.find_user_by_id(&ctx.app, &id)?
            .ok_or_else(|| ServiceError::NotFound("User".to_string()))?;
        session.ensure_user_visible(&target)?;

        ctx.app.auth_cache.delete_user(&ctx.app, &id)?;
        Ok(true)
    }

    fn give_user_access(ctx: &Context, user_id: String, contact_ids: Vec<IdType>) -> ServiceResult<bool> {
        let session = ctx.get_session_required()?;
        session.ensure_right(SecurityTopic::Users, Operation::Update)?;
        let target = ctx.app.auth_cache.find_user_by_id(&ctx.app, &user_id)?
            .ok_or_else(|| ServiceError::NotFound("User".to_string()))?;
        session.ensure_user_visible(&target)?;
        for contact_id in contact_ids {
            session.ensure_contact_access(contact_id)?;
            ctx.app.auth_cache.give_access(&ctx.app, &user_id, contact_id)?;
        }
        Ok(true)
    }

    fn revoke_user_access(ctx: &Context, user_id: String, contact_ids: Vec<IdType>) -> ServiceResult<bool> {
        let session = ctx.get_session_required()?;
        session.ensure_right(SecurityTopic::Users, Operation::Update)?;
        let target = ctx.app.auth_cache.find_user_by_id(&ctx.app, &user_id)?
            .ok_or_else(|| ServiceError::NotFound("User".to_string()))?;
        session.ensure_user_visible(&target)?;
        for contact_id in contact_ids {
            session.ensure_contact_access(contact_id)?;
            ctx.app.auth_cache.revoke_access(&ctx.app, &user_id, contact_id)?;
        }
        Ok(true)
    }

    fn add_contact(ctx: &Context, data: ContactInput) -> ServiceResult<Contact> {
        use crate::schema::contacts::dsl;

        let session = ctx.get_session_required()?;
        session.ensure_right(SecurityTopic::for_contact_type(data.item_type), Operation::Create)?;

        let conn = ctx.get_connection()?;
        let value = ContactInputDb {
            item_type: data.item_type.to_db().to_string(),
            company_name: data.company_name,
            zip_id: data.zip_id,
            helpdesk: data.helpdesk,
            status: data.status.unwrap_or(true),
        };

        let id = conn.transaction::<_, ServiceError, _>(|| {
            diesel::insert_into(dsl::contacts)
                .values(&value)
                .execute(&conn)?;
            Ok(diesel::select(last_insert_id).first::<i64>(&conn)?)
        })?;

        find_contact(&conn, id as IdType)
    }

    fn update_contact(ctx: &Context, id: IdType, data: ContactUpdateInput) -> ServiceResult<Contact> {
        use crate::schema::contacts::dsl;

        let session = ctx.get_session_required()?;
        session.ensure_contact_access(id)?;

        let conn = ctx.get_connection()?;
        let contact = find_contact(&conn, id)?;
        session.ensure_right(contact_topic(&contact), Operation::Update)?;

        if !data.is_empty() {
            diesel::update(dsl::contacts.find(id))
                .set(&data)
                .execute(&conn)?;
        }
        find_contact(&conn, id)
    }

    fn delete_contact(ctx: &Context, id: IdType) -> ServiceResult<bool> {
        use crate::schema::contacts::dsl;
        use crate::schema::fietsenstallingen::dsl as facility_dsl;
        use crate::schema::user_contacts::dsl as access_dsl;

        let session = ctx.get_session_required()?;
        session.ensure_contact_access(id)?;

        let conn = ctx.get_connection()?;
        let contact = find_contact(&conn, id)?;
        session.ensure_right(contact_topic(&contact), Operation::Delete)?;

        let facility_count: i64 = facility_dsl::fietsenstallingen.count()
            .filter(facility_dsl::site_id.eq(id).or(facility_dsl::exploitant_id.eq(id)))
            .get_result(&conn)?;
        if facility_count > 0 {
            return Err(ServiceError::BadRequest("Contact still has facilities".to_string()))
        }

        conn.transaction::<_, ServiceError, _>(|| {
            diesel::delete(access_dsl::user_contacts.filter(access_dsl::contact_id.eq(id)))
                .execute(&conn)?;
            diesel::delete(dsl::contacts.find(id))
                .execute(&conn)?;
            Ok(())
        })?;
        Ok(true)
    }

    fn add_facility(ctx: &Context, data: FacilityInput) -> ServiceResult<Facility> {
        let session = ctx.get_session_required()?;
        session.ensure_right(SecurityTopic::Fietsenstallingen, Operation::Create)?;
        session.ensure_contact_access(data.site_id)?;

        let mut facility = Facility {
            id: new_uuid(),
            stallings_id: data.stallings_id,
            site_id: Some(data.site_id),
            exploitant_id: data.exploitant_id,
            title: Some(data.title),
            location: data.location,
            postcode: data.postcode,
            plaats: data.plaats,
            stalling_type: data.stalling_type.map(|x| x.to_db().to_string()),
            coordinaten: data.coordinaten,
            tariefcode: data.tariefcode,
            status: facility_status(data.is_public.unwrap_or(false)),
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
            date_modified: Some(Utc::now().naive_utc()),
        };
        for times in parse_opening_hours(data.opening_hours)? {
            facilities::set_facility_day(&mut facility, &times);
        }

        let conn = ctx.get_connection()?;
        facilities::insert_facility(&conn, &facility)
    }

    fn update_facility(ctx: &Context, id: String, data: FacilityUpdateInput) -> ServiceResult<Facility> {
        let session = ctx.get_session_required()?;
        session.ensure_right(SecurityTopic::Fietsenstallingen, Operation::Update)?;

        let conn = ctx.get_connection()?;
        let facility = facilities::find_facility(&conn, &id)?;
        session.ensure_facility_visible(&facility)?;
        if let Some(site_id) = data.site_id {
            session.ensure_contact_access(site_id)?;
        }

        let exploitant_id = match (data.exploitant_id, data.clear_exploitant.unwrap_or(false)) {
            (Some(_), true) => return Err(ServiceError::BadRequest("Cannot set and clear the exploitant".to_string())),
            (_, true) => Some(None),
            (x, false) => x.map(Some),
        };

        let mut changes = FacilityChanges {
            stallings_id: data.stallings_id,
            site_id: data.site_id,
            exploitant_id,
            title: data.title,
            location: data.location,
            postcode: data.postcode,
            plaats: data.plaats,
            stalling_type: data.stalling_type.map(|x| x.to_db().to_string()),
            coordinaten: data.coordinaten,
            tariefcode: data.tariefcode,
            status: data.is_public.map(facility_status),
            ..FacilityChanges::default()
        };
        for times in parse_opening_hours(data.opening_hours)? {
            changes.set_day(&times);
        }

        facilities::update_facility(&conn, &id, changes)
    }

    fn delete_facility(ctx: &Context, id: String) -> ServiceResult<bool> {
        let session = ctx.get_session_required()?;
        session.ensure_right(SecurityTopic::Fietsenstallingen, Operation::Delete)?;

        let conn = ctx.get_connection()?;
        let facility = facilities::find_facility(&conn, &id)?;
        session.ensure_facility_visible(&facility)?;

        facilities::delete_facility(&conn, &id)?;
        Ok(true)
    }

    #[graphql(arguments(capacity(description = "Places for the bike type, 0 removes it")))]
    fn set_facility_capacity(ctx: &Context, facility_id: String, bike_type_id: IdType, capacity: i32) -> ServiceResult<Vec<FacilityCapacity>> {
        let session = ctx.get_session_required()?;
        session.ensure_right(SecurityTopic::Fietsenstallingen, Operation::Update)?;

        let conn = ctx.get_connection()?;
        let facility = facilities::find_facility(&conn, &facility_id)?;
        session.ensure_facility_visible(&facility)?;

        facilities::set_capacity(&conn, &facility_id, bike_type_id, capacity)?;
        std::mem::drop(conn);
        load_capacity_info(ctx, &facility_id)
    }

    fn add_article(ctx: &Context, data: ArticleInput) -> ServiceResult<Article> {
        use crate::schema::articles::dsl;

        let session = ctx.get_session_required()?;
        session.ensure_right(SecurityTopic::Content, Operation::Create)?;
        ensure_article_site(&session, data.site_id)?;

        let now = Utc::now().naive_utc();
        let id = new_uuid();
        let value = ArticleInputDb {
            id: Some(id.clone()),
            site_id: data.site_id,
            title: Some(data.title),
            summary: data.summary,
            body: data.body,
            navigation: data.navigation,
            article_type: Some(data.article_type.to_db().to_string()),
            sort_order: Some(data.sort_order.unwrap_or(0)),
            status: Some(data.status.unwrap_or(true)),
            date_created: Some(now),
            date_modified: Some(now),
        };

        let conn = ctx.get_connection()?;
        diesel::insert_into(dsl::articles)
            .values(&value)
            .execute(&conn)?;
        find_article(&conn, &id)
    }

    fn update_article(ctx: &Context, id: String, data: ArticleUpdateInput) -> ServiceResult<Article> {
        use crate::schema::articles::dsl;

        let session = ctx.get_session_required()?;
        session.ensure_right(SecurityTopic::Content, Operation::Update)?;

        let conn = ctx.get_connection()?;
        let article = find_article(&conn, &id)?;
        ensure_article_site(&session, article.site_id)?;

        let changes = ArticleInputDb {
            id: None,
            site_id: None,
            title: data.title,
            summary: data.summary,
            body: data.body,
            navigation: data.navigation,
            article_type: data.article_type.map(|x| x.to_db().to_string()),
            sort_order: data.sort_order,
            status: data.status,
            date_created: None,
            date_modified: Some(Utc::now().naive_utc()),
        };
        diesel::update(dsl::articles.find(&id))
            .set(&changes)
            .execute(&conn)?;
        find_article(&conn, &id)
    }

    fn delete_article(ctx: &Context, id: String) -> ServiceResult<bool> {
        use crate::schema::articles::dsl;

        let session = ctx.get_session_required()?;
        session.ensure_right(SecurityTopic::Content, Operation::Delete)?;

        let conn = ctx.get_connection()?;
        let article = find_article(&conn, &id)?;
        ensure_article_site(&session, article.site_id)?;

        diesel::delete(dsl::articles.find(&id))
            .execute(&conn)?;
        Ok(true)
    }

    /// Creates, drops, clears or rebuilds a report cache table.
    /// Clear and update work on the days from `start` to `end` when given.
    fn cache_table(ctx: &Context, table: CacheTable, action: CacheAction, start: Option<NaiveDate>, end: Option<NaiveDate>) -> ServiceResult<CacheStatusInfo> {
        let session = ctx.get_session_required()?;
        session.ensure_right(SecurityTopic::System, cache_operation(action))?;

        let range = match (start, end) {
            (Some(start), Some(end)) => Some(DateRange::new(start, end)?),
            (None, None) => None,
            _ => return Err(ServiceError::BadRequest("Both start and end are required for a range".to_string())),
        };

        let state = cache_table::execute(&ctx.app.report_pool, table, action, range)?;
        Ok(CacheStatusInfo::new(table, &state))
    }
}

pub type Schema = RootNode<'static, QueryRoot, MutationRoot>;

pub fn create_schema() -> Schema {
    Schema::new(QueryRoot {}, MutationRoot {})
}
