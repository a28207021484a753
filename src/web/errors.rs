use derive_more::Display;
use diesel::result::{DatabaseErrorKind, Error as DBError};
use juniper::FieldError;
use actix_web::{ResponseError, web::HttpResponse, http::StatusCode};
use log::error;

#[derive(Debug, Display, PartialEq)]
pub enum ServiceError {
    #[display(fmt = "Internal Server Error: {}", _0)]
    InternalServerError(String),

    #[display(fmt = "Bad Request: {}", _0)]
    BadRequest(String),

    #[display(fmt = "{} Not Found", _0)]
    NotFound(String),

    #[display(fmt = "Unauthorized")]
    Unauthorized,

    #[display(fmt = "Wrong Password")]
    WrongPassword,

    #[display(fmt = "Login Required")]
    LoginRequired,

    #[display(fmt = "{} Already Present", _0)]
    AlreadyPresent(String),
}

impl juniper::IntoFieldError for ServiceError {
    fn into_field_error(self) -> FieldError {
        match self {
            ServiceError::InternalServerError(mex) => {
                error!("Internal server error: {}", mex);
                FieldError::new(
                    "Internal server error",
                    graphql_value!({
                        "type": "INTERNAL_SERVER_ERROR"
                    })
                )
            },
            ServiceError::BadRequest(message) => FieldError::new(
                message,
                graphql_value!({
                    "type": "BAD_REQUEST"
                })
            ),
            ServiceError::NotFound(type_name) => FieldError::new(
                format!("{} not found!", type_name),
                graphql_value!({
                    "type": "NOT_FOUND"
                })
            ),
            ServiceError::Unauthorized => FieldError::new(
                "Higher authorization required",
                graphql_value!({
                    "type": "UNAUTHORIZED"
                })
            ),
            ServiceError::WrongPassword => FieldError::new(
                "Wrong password",
                graphql_value!({
                    "type": "WRONG_PASSWORD"
                })
            ),
            ServiceError::LoginRequired => FieldError::new(
                "Login required",
                graphql_value!({
                    "type": "LOGIN_REQUIRED"
                })
            ),
            ServiceError::AlreadyPresent(type_name) => FieldError::new(
                format!("{} already taken", type_name),
                graphql_value!({
                    "type": "ALREADY_PRESENT"
                })
            ),
        }
    }
}

impl From<DBError> for ServiceError {
    fn from(error: DBError) -> ServiceError {
        match error {
            DBError::NotFound => ServiceError::NotFound("Record".to_string()),
            DBError::DatabaseError(kind, info) => {
                let message = info.details().unwrap_or_else(|| info.message()).to_string();
                if let DatabaseErrorKind::UniqueViolation = kind {
                    ServiceError::AlreadyPresent(message)
                } else {
                    ServiceError::InternalServerError(format!("DB error, {:?} {:?}", kind, info))
                }
            }
            err => ServiceError::InternalServerError(format!("DB error, {}", err)),
        }
    }
}

impl From<r2d2::Error> for ServiceError {
    fn from(error: r2d2::Error) -> ServiceError {
        ServiceError::InternalServerError(format!("Pool error: {}", error))
    }
}

impl From<mysql::Error> for ServiceError {
    fn from(error: mysql::Error) -> ServiceError {
        match error {
            // ER_DUP_ENTRY, ER_TABLE_EXISTS_ERROR
            mysql::Error::MySqlError(ref e) if e.code == 1062 || e.code == 1050 => {
                ServiceError::AlreadyPresent(e.message.clone())
            },
            err => ServiceError::InternalServerError(format!("Report DB error, {}", err)),
        }
    }
}

impl ResponseError for ServiceError {
    fn error_response(&self) -> HttpResponse {
        match self {
            ServiceError::InternalServerError(x) => HttpResponse::InternalServerError().body(x.clone()),
            ServiceError::BadRequest(x) => HttpResponse::BadRequest().body(x.clone()),
            ServiceError::NotFound(x) => HttpResponse::NotFound().body(format!("{} Not Found", x)),
            ServiceError::Unauthorized => HttpResponse::new(StatusCode::FORBIDDEN),
            ServiceError::WrongPassword => HttpResponse::Unauthorized().body("Wrong Password"),
            ServiceError::LoginRequired => HttpResponse::Unauthorized().body("Login required"),
            ServiceError::AlreadyPresent(x) => HttpResponse::BadRequest().body(format!("{} Already Present", x)),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
