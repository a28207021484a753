#[macro_use]
extern crate diesel;
#[macro_use]
extern crate juniper;

use std::sync::Arc;

use diesel::MysqlConnection;
use diesel::prelude::*;
use diesel::r2d2::ConnectionManager;
use log::info;

use crate::config::Config;
use crate::models::IdType;
use crate::security::{LegacyRole, NewUserData, UserUpdateData};
use crate::web::errors::{ServiceError, ServiceResult};
use crate::web::graphql_schema::{create_schema, Schema};

pub mod cache_refresh;
pub mod config;
pub mod facilities;
pub mod models;
pub mod reports;
pub mod schema;
pub mod security;
pub mod web;

const ROOT_USER_NAME: &str = "root";

#[derive(Clone)]
pub struct AppData {
    pub pool: models::Pool,
    /// Plain connection pool for the report and cache table queries
    pub report_pool: mysql::Pool,
    pub graphql_schema: Arc<Schema>,
    pub auth_cache: security::AuthCache,
    pub report_max_days: i64,
    pub fietsberaad_contact_id: IdType,
}

impl AppData {
    pub fn new(config: &Config) -> ServiceResult<Self> {
        let pool = {
            let manager = ConnectionManager::<MysqlConnection>::new(config.database_url.as_str());
            r2d2::Pool::builder()
                .build(manager)?
        };
        let report_pool = mysql::Pool::new_manual(0, 10, config.database_url.as_str())?;

        Ok(AppData {
            pool, report_pool,
            graphql_schema: Arc::new(create_schema()),
            auth_cache: security::AuthCache::new(config.password_secret_key.clone(), config.fietsberaad_contact_id),
            report_max_days: config.report_max_days,
            fietsberaad_contact_id: config.fietsberaad_contact_id,
        })
    }

    /// Makes sure the root account exists, resetting its password when asked to.
    pub fn setup_root_password(&self, password: String, replace: bool) -> ServiceResult<()> {
        use crate::schema::security_users::dsl;
        use crate::models::User;

        if password.is_empty() {
            return Err(ServiceError::BadRequest("Empty root password".to_string()))
        }

        let conn = self.pool.get()?;

        let user = dsl::security_users
            .filter(dsl::user_name.eq(ROOT_USER_NAME))
            .first::<User>(&conn)
            .optional()?;

        std::mem::drop(conn);

        match user {
            None => {
                info!("Creating the {} user", ROOT_USER_NAME);
                self.auth_cache.add_user(self, NewUserData {
                    user_name: ROOT_USER_NAME.to_string(),
                    display_name: None,
                    password,
                    role: LegacyRole::Root,
                    own_contact_id: Some(self.fietsberaad_contact_id),
                })?;
            },
            Some(ref user) if replace => {
                info!("Resetting the {} password", ROOT_USER_NAME);
                self.auth_cache.update_user(self, &user.user_id, UserUpdateData {
                    password: Some(password),
                    role: Some(LegacyRole::Root),
                    status: Some(true),
                    ..UserUpdateData::default()
                })?;
            },
            _ => {},
        }

        Ok(())
    }
}
