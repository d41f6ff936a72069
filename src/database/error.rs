use std::{
    collections::BTreeMap,
    fmt::{self, Display},
};

use potion::{Error, HtmlError};
use serde::Serialize;
use warp::reject::Rejection;

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const CHECK_VIOLATION: &str = "23514";

#[derive(Debug)]
pub struct QueryError {
    info: String,
}

impl QueryError {
    pub fn new(info: String) -> Self {
        Self { info }
    }
}

impl From<sqlx::Error> for QueryError {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::Configuration(e) => Self::new(format!("{e}")),
            sqlx::Error::Database(e) => Self::new(format!("{e}")),
            sqlx::Error::Io(e) => Self::new(format!("{e}")),
            sqlx::Error::Tls(e) => Self::new(format!("{e}")),
            sqlx::Error::Protocol(e) => Self::new(format!("{e}")),
            sqlx::Error::RowNotFound => Self::new(format!("RowNotFound")),
            sqlx::Error::TypeNotFound { type_name } => {
                Self::new(format!("Type not found: {type_name}"))
            }
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => {
                Self::new(format!("Column index out of bounds {index} ({len})"))
            }
            sqlx::Error::ColumnNotFound(e) => Self::new(format!("{e}")),
            sqlx::Error::ColumnDecode { index, source } => {
                Self::new(format!("Column decode {index} ({source})"))
            }
            sqlx::Error::Decode(e) => Self::new(format!("{e}")),
            sqlx::Error::AnyDriverError(e) => Self::new(format!("{e}")),
            sqlx::Error::PoolTimedOut => Self::new(format!("Pool timed out")),
            sqlx::Error::PoolClosed => Self::new(format!("Pool closed")),
            sqlx::Error::WorkerCrashed => Self::new(format!("Worker crashed")),
            sqlx::Error::Migrate(e) => Self::new(format!("{e}")),
            _ => Self::new(format!("Unknown error")),
        }
    }
}

impl Into<Error> for QueryError {
    fn into(self) -> Error {
        log::error!("Query failed: {}", self.info);
        Error {
            code: 500,
            info: Some(self.info),
            redirect: None,
        }
    }
}

#[derive(Debug)]
pub struct TypeError {
    info: String,
}

impl TypeError {
    pub fn new(info: &str) -> Self {
        Self {
            info: info.to_string(),
        }
    }
}

impl Into<potion::Error> for TypeError {
    fn into(self) -> potion::Error {
        HtmlError::InvalidRequest.new(&self.info)
    }
}

impl Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.info)
    }
}

impl std::error::Error for TypeError {}
impl Into<Rejection> for TypeError {
    fn into(self) -> Rejection {
        HtmlError::InvalidRequest.new(&self.info).into()
    }
}

/// A validation message scoped to one field of the submitted payload,
/// e.g. `ingredients[2].id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Failure taxonomy of the catalog. Every variant ends up as a caller-visible
/// `potion::Error`; nothing is swallowed.
#[derive(Debug)]
pub enum CatalogError {
    Validation(Vec<FieldError>),
    NotFound(String),
    Conflict(String),
    PreconditionFailed(String),
    Integrity(String),
    Store(QueryError),
}

impl CatalogError {
    pub fn invalid(field: &str, message: &str) -> Self {
        Self::Validation(vec![FieldError::new(field, message)])
    }

    pub fn code(&self) -> u16 {
        match self {
            CatalogError::Validation(_) => 400,
            CatalogError::NotFound(_) => 404,
            CatalogError::Conflict(_) => 409,
            CatalogError::PreconditionFailed(_) => 412,
            CatalogError::Integrity(_) => 409,
            CatalogError::Store(_) => 500,
        }
    }
}

impl From<sqlx::Error> for CatalogError {
    fn from(value: sqlx::Error) -> Self {
        if let sqlx::Error::Database(e) = &value {
            let constraint = e.constraint().unwrap_or("unknown").to_owned();
            match e.code().as_deref() {
                Some(UNIQUE_VIOLATION) => {
                    return Self::Integrity(format!("Duplicate entry violates {constraint}"))
                }
                Some(FOREIGN_KEY_VIOLATION) => {
                    return Self::Integrity(format!(
                        "Referential integrity violated ({constraint})"
                    ))
                }
                Some(CHECK_VIOLATION) => {
                    return Self::invalid(&constraint, "Value rejected by store constraint")
                }
                _ => {}
            }
        }

        Self::Store(QueryError::from(value))
    }
}

/// Classifies a failed query and converts it for the caller.
pub fn store_fault(value: sqlx::Error) -> Error {
    CatalogError::from(value).into()
}

fn render_field_errors(errors: Vec<FieldError>) -> String {
    let mut fields: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for error in errors {
        fields.entry(error.field).or_default().push(error.message);
    }
    serde_json::to_string(&fields).unwrap_or_else(|_| String::from("Invalid input"))
}

impl From<CatalogError> for Error {
    fn from(value: CatalogError) -> Self {
        match value {
            CatalogError::Validation(errors) => Error {
                code: 400,
                info: Some(render_field_errors(errors)),
                redirect: None,
            },
            CatalogError::NotFound(info) => Error {
                code: 404,
                info: Some(info),
                redirect: None,
            },
            CatalogError::Conflict(info) | CatalogError::Integrity(info) => Error {
                code: 409,
                info: Some(info),
                redirect: None,
            },
            CatalogError::PreconditionFailed(info) => Error {
                code: 412,
                info: Some(info),
                redirect: None,
            },
            CatalogError::Store(e) => e.into(),
        }
    }
}

impl Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogError::Validation(errors) => {
                let fields = errors
                    .iter()
                    .map(|e| format!("{}: {}", e.field, e.message))
                    .collect::<Vec<String>>()
                    .join("; ");
                write!(f, "Validation failed ({fields})")
            }
            CatalogError::NotFound(info) => write!(f, "Not found ({info})"),
            CatalogError::Conflict(info) => write!(f, "Conflict ({info})"),
            CatalogError::PreconditionFailed(info) => write!(f, "Precondition failed ({info})"),
            CatalogError::Integrity(info) => write!(f, "Integrity violation ({info})"),
            CatalogError::Store(e) => write!(f, "Store failure ({})", e.info),
        }
    }
}

impl std::error::Error for CatalogError {}
