use argonautica::{Hasher, Verifier};
use chrono::{prelude::*, Utc};
use diesel::{prelude::*, result::DatabaseErrorKind, result::Error as DBError};
use log::{error, warn};
use serde::{Deserialize, Serialize};

use crate::AppData;
use crate::models::{Facility, IdType, new_uuid, User, UserContact};
use crate::schema::security_users;
use crate::web::errors::{ServiceError, ServiceResult};

pub use self::roles::*;

pub mod roles;

pub fn hash_password(secret_key: &str, password: &str) -> Result<String, ServiceError> {
    Hasher::default()
        .with_password(password)
        .with_secret_key(secret_key)
        .hash()
        .map_err(|err| {
            error!("Password hashing failed: {}", err);
            ServiceError::InternalServerError(format!("Hashing error: {}", err))
        })
}

pub fn verify_hash(secret_key: &str, hash: &str, password: &str) -> bool {
    Verifier::default()
        .with_hash(hash)
        .with_password(password)
        .with_secret_key(secret_key)
        .verify()
        .map_err(|err| {
            warn!("Password verification failed: {}", err);
        })
        .unwrap_or(false)
}

#[derive(Insertable, AsChangeset)]
#[table_name="security_users"]
pub struct UserInputDb {
    pub user_id: Option<String>,
    pub user_name: Option<String>,
    pub display_name: Option<String>,
    pub encrypted_password: Option<String>,
    pub role_id: Option<IdType>,
    pub group_id: Option<String>,
    pub own_contact_id: Option<IdType>,
    pub status: Option<bool>,
    pub last_password_change: Option<NaiveDateTime>,
}

impl UserInputDb {
    fn is_empty(&self) -> bool {
        self.user_name.is_none() && self.display_name.is_none() && self.encrypted_password.is_none()
            && self.role_id.is_none() && self.group_id.is_none() && self.own_contact_id.is_none()
            && self.status.is_none() && self.last_password_change.is_none()
    }
}

pub struct NewUserData {
    pub user_name: String,
    pub display_name: Option<String>,
    pub password: String,
    pub role: LegacyRole,
    pub own_contact_id: Option<IdType>,
}

#[derive(Default)]
pub struct UserUpdateData {
    pub user_name: Option<String>,
    pub display_name: Option<String>,
    pub password: Option<String>,
    pub role: Option<LegacyRole>,
    pub own_contact_id: Option<IdType>,
    pub status: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
struct IdentityCookie {
    id: String,
    timestamp: NaiveDateTime,
    #[serde(default)]
    contact: Option<IdType>,
}

/// Which contacts' data a session may see in listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactScope {
    All,
    Contact(IdType),
    Nothing,
}

/// The logged in user with the profile derived for the contact they act on.
#[derive(Debug, Clone)]
pub struct SessionUser {
    pub user: User,
    pub legacy_role: Option<LegacyRole>,
    pub own_contact_id: Option<IdType>,
    pub active_contact_id: Option<IdType>,
    pub linked_contacts: Vec<IdType>,
    pub profile: SecurityProfile,
    fietsberaad_contact_id: IdType,
}

impl SessionUser {
    /// Builds the session, falling back to the user's own organization when the
    /// requested contact is not reachable.
    pub fn new(user: User, linked_contacts: Vec<IdType>, requested_contact: Option<IdType>, fietsberaad_contact_id: IdType) -> SessionUser {
        let legacy_role = LegacyRole::from_id(user.role_id);

        let own_contact_id = match (user.own_contact_id, legacy_role) {
            (Some(x), _) => Some(x),
            (None, Some(role)) if role.is_platform_wide() => Some(fietsberaad_contact_id),
            _ => None,
        };

        let active_contact_id = match requested_contact {
            Some(target) if may_access_contact(legacy_role, own_contact_id, &linked_contacts, target) => Some(target),
            _ => own_contact_id,
        };

        let own_organization = active_contact_id.is_some() && active_contact_id == own_contact_id;
        let profile = if user.status {
            SecurityProfile::derive(legacy_role, own_organization)
        } else {
            SecurityProfile::new(UserRole::None)
        };

        SessionUser {
            user,
            legacy_role,
            own_contact_id,
            active_contact_id,
            linked_contacts,
            profile,
            fietsberaad_contact_id,
        }
    }

    pub fn id(&self) -> &str {
        self.user.user_id.as_str()
    }

    pub fn is_platform_wide(&self) -> bool {
        self.legacy_role.map(|x| x.is_platform_wide()).unwrap_or(false)
    }

    pub fn may_access_contact(&self, target: IdType) -> bool {
        may_access_contact(self.legacy_role, self.own_contact_id, &self.linked_contacts, target)
    }

    pub fn scope(&self) -> ContactScope {
        match self.active_contact_id {
            Some(c) if self.is_platform_wide() && c == self.fietsberaad_contact_id => ContactScope::All,
            Some(c) => ContactScope::Contact(c),
            None => ContactScope::Nothing,
        }
    }

    pub fn facility_visible(&self, facility: &Facility) -> bool {
        match self.scope() {
            ContactScope::All => true,
            ContactScope::Contact(c) => facility.site_id == Some(c) || facility.exploitant_id == Some(c),
            ContactScope::Nothing => false,
        }
    }

    pub fn user_visible(&self, target: &User) -> bool {
        if target.user_id == self.user.user_id {
            return true
        }
        match self.scope() {
            ContactScope::All => true,
            ContactScope::Contact(c) => target.own_contact_id == Some(c),
            ContactScope::Nothing => false,
        }
    }
}

#[derive(Clone)]
pub struct AuthCache {
    password_secret_key: String,
    fietsberaad_contact_id: IdType,
}

impl AuthCache {
    pub fn new(password_secret_key: String, fietsberaad_contact_id: IdType) -> Self {
        AuthCache {
            password_secret_key,
            fietsberaad_contact_id,
        }
    }

    pub fn add_user(&self, ctx: &AppData, data: NewUserData) -> ServiceResult<User> {
        use crate::schema::security_users::dsl;

        let now = Utc::now().naive_utc();
        let password_hash = hash_password(self.password_secret_key.as_str(), data.password.as_str())?;
        let id = new_uuid();

        let value = UserInputDb {
            user_id: Some(id.clone()),
            user_name: Some(data.user_name),
            display_name: data.display_name,
            encrypted_password: Some(password_hash),
            role_id: Some(data.role.id()),
            group_id: Some(data.role.group().to_db().to_string()),
            own_contact_id: data.own_contact_id,
            status: Some(true),
            last_password_change: Some(now),
        };

        let conn = ctx.pool.get()?;

        diesel::insert_into(dsl::security_users)
            .values(value)
            .execute(&conn)?;

        Ok(dsl::security_users.find(id).first::<User>(&conn)?)
    }

    pub fn find_user_by_name(&self, ctx: &AppData, user_name: &str) -> ServiceResult<Option<User>> {
        use crate::schema::security_users::dsl;

        let conn = ctx.pool.get()?;
        Ok(dsl::security_users.filter(dsl::user_name.eq(user_name)).first::<User>(&conn).optional()?)
    }

    pub fn find_user_by_id(&self, ctx: &AppData, id: &str) -> ServiceResult<Option<User>> {
        use crate::schema::security_users::dsl;

        let conn = ctx.pool.get()?;
        Ok(dsl::security_users.find(id).first::<User>(&conn).optional()?)
    }

    pub fn verify_user(&self, ctx: &AppData, user_name: &str, password: &str) -> ServiceResult<User> {
        use crate::schema::security_users::dsl;

        let user = match self.find_user_by_name(ctx, user_name)? {
            None => return Err(ServiceError::NotFound("username".to_string())),
            Some(u) => u
        };

        if !user.status {
            return Err(ServiceError::Unauthorized)
        }

        if !verify_hash(self.password_secret_key.as_str(), user.encrypted_password.as_str(), password) {
            return Err(ServiceError::WrongPassword)
        }

        let conn = ctx.pool.get()?;
        diesel::update(dsl::security_users.find(&user.user_id))
            .set(dsl::last_login.eq(Utc::now().naive_utc()))
            .execute(&conn)?;

        Ok(user)
    }

    pub fn update_user(&self, ctx: &AppData, id: &str, data: UserUpdateData) -> ServiceResult<User> {
        use crate::schema::security_users::dsl;

        let (new_passw_hash, new_change_time) = match data.password {
            Some(x) => (
                Some(hash_password(self.password_secret_key.as_str(), x.as_str())?),
                Some(Utc::now().naive_utc())
            ),
            None => (None, None),
        };

        let changes = UserInputDb {
            user_id: None,
            user_name: data.user_name,
            display_name: data.display_name,
            encrypted_password: new_passw_hash,
            role_id: data.role.map(|x| x.id()),
            group_id: data.role.map(|x| x.group().to_db().to_string()),
            own_contact_id: data.own_contact_id,
            status: data.status,
            last_password_change: new_change_time,
        };

        let conn = ctx.pool.get()?;

        // MySQL reports unchanged rows as not affected, check existence first
        dsl::security_users.find(id)
            .first::<User>(&conn)
            .optional()?
            .ok_or_else(|| ServiceError::NotFound("User".to_string()))?;

        if !changes.is_empty() {
            diesel::update(dsl::security_users.find(id))
                .set(&changes)
                .execute(&conn)?;
        }

        Ok(dsl::security_users.find(id).first::<User>(&conn)?)
    }

    pub fn delete_user(&self, ctx: &AppData, id: &str) -> ServiceResult<()> {
        use crate::schema::security_users::dsl;
        use crate::schema::user_contacts::dsl as access_dsl;
        let conn = ctx.pool.get()?;

        conn.transaction::<_, ServiceError, _>(|| {
            diesel::delete(access_dsl::user_contacts.filter(access_dsl::user_id.eq(id)))
                .execute(&conn)?;

            let del_count = diesel::delete(dsl::security_users.find(id))
                .execute(&conn)?;

            if del_count != 1 {
                Err(ServiceError::NotFound("User".to_string()))
            } else {
                Ok(())
            }
        })
    }

    pub fn give_access(&self, ctx: &AppData, user_id: &str, contact_id: IdType) -> ServiceResult<()> {
        use crate::schema::user_contacts::dsl;
        let conn = ctx.pool.get()?;

        let inserted = diesel::insert_into(dsl::user_contacts)
            .values(UserContact { user_id: user_id.to_string(), contact_id })
            .execute(&conn);

        match inserted {
            Err(DBError::DatabaseError(kind, info)) => match kind {
                DatabaseErrorKind::ForeignKeyViolation => Err(ServiceError::NotFound("user or contact".to_string())),
                DatabaseErrorKind::UniqueViolation => Err(ServiceError::AlreadyPresent("Access".to_string())),
                x => Err(DBError::DatabaseError(x, info).into()),
            },
            Err(x) => Err(x.into()),
            Ok(_) => Ok(()),
        }
    }

    pub fn revoke_access(&self, ctx: &AppData, user_id: &str, contact_id: IdType) -> ServiceResult<()> {
        use crate::schema::user_contacts::dsl;
        let conn = ctx.pool.get()?;

        let deleted_count = diesel::delete(dsl::user_contacts)
            .filter(dsl::user_id.eq(user_id))
            .filter(dsl::contact_id.eq(contact_id))
            .execute(&conn)?;

        if deleted_count == 0 {
            Err(ServiceError::NotFound("user or contact".to_string()))
        } else {
            Ok(())
        }
    }

    pub fn linked_contacts(&self, ctx: &AppData, user_id: &str) -> ServiceResult<Vec<IdType>> {
        use crate::schema::user_contacts::dsl;
        let conn = ctx.pool.get()?;

        Ok(dsl::user_contacts
            .filter(dsl::user_id.eq(user_id))
            .select(dsl::contact_id)
            .order_by(dsl::contact_id.asc())
            .load::<IdType>(&conn)?)
    }

    pub fn load_session(&self, ctx: &AppData, user: User, requested_contact: Option<IdType>) -> ServiceResult<SessionUser> {
        let linked = self.linked_contacts(ctx, &user.user_id)?;
        Ok(SessionUser::new(user, linked, requested_contact, self.fietsberaad_contact_id))
    }

    pub fn save_identity(&self, session: &SessionUser) -> String {
        let cookie = IdentityCookie {
            id: session.user.user_id.clone(),
            timestamp: session.user.last_password_change,
            contact: session.active_contact_id,
        };
        // Serializing a plain struct of strings and numbers cannot fail
        serde_json::to_string(&cookie).unwrap_or_default()
    }

    pub fn parse_identity(&self, ctx: &AppData, identity: &str) -> ServiceResult<Option<SessionUser>> {
        let cookie: Option<IdentityCookie> = serde_json::from_str(identity).ok();
        let cookie = match cookie {
            Some(x) => x,
            None => return Ok(None),
        };

        let user = match self.find_user_by_id(ctx, &cookie.id)? {
            None => return Ok(None),
            Some(u) => u,
        };
        if user.last_password_change > cookie.timestamp || !user.status {
            return Ok(None)
        }
        Ok(Some(self.load_session(ctx, user, cookie.contact)?))
    }
}

pub trait PermissionCheckable {
    fn ensure_right(&self, topic: SecurityTopic, op: Operation) -> ServiceResult<()>;

    fn ensure_contact_access(&self, contact_id: IdType) -> ServiceResult<()>;

    fn ensure_facility_visible(&self, facility: &Facility) -> ServiceResult<()>;

    fn ensure_user_visible(&self, user: &User) -> ServiceResult<()>;

    fn ensure_can_assign(&self, role: LegacyRole) -> ServiceResult<()>;
}

impl PermissionCheckable for SessionUser {
    fn ensure_right(&self, topic: SecurityTopic, op: Operation) -> ServiceResult<()> {
        if self.profile.allows(topic, op) {
            Ok(())
        } else {
            Err(ServiceError::Unauthorized)
        }
    }

    fn ensure_contact_access(&self, contact_id: IdType) -> ServiceResult<()> {
        if self.may_access_contact(contact_id) {
            Ok(())
        } else {
            Err(ServiceError::NotFound("Contact".to_string()))
        }
    }

    fn ensure_facility_visible(&self, facility: &Facility) -> ServiceResult<()> {
        if self.facility_visible(facility) {
            Ok(())
        } else {
            Err(ServiceError::NotFound("Fietsenstalling".to_string()))
        }
    }

    fn ensure_user_visible(&self, user: &User) -> ServiceResult<()> {
        if self.user_visible(user) {
            Ok(())
        } else {
            Err(ServiceError::NotFound("User".to_string()))
        }
    }

    fn ensure_can_assign(&self, role: LegacyRole) -> ServiceResult<()> {
        if may_assign_role(self.legacy_role, role) {
            Ok(())
        } else {
            Err(ServiceError::Unauthorized)
        }
    }
}
