//! Conversions from external infrastructure errors into domain errors.

use r2d2::Error as PoolError;
use reqwest::Error as HttpError;
use rusqlite::Error as SqlError;
use tutorlane_common::CommonError;
use tutorlane_domain::TutorlaneError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub TutorlaneError);

impl From<InfraError> for TutorlaneError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<TutorlaneError> for InfraError {
    fn from(value: TutorlaneError) -> Self {
        InfraError(value)
    }
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → TutorlaneError */
/* -------------------------------------------------------------------------- */

impl From<SqlError> for InfraError {
    fn from(err: SqlError) -> Self {
        use rusqlite::ffi::ErrorCode;

        let domain_err = match err {
            SqlError::SqliteFailure(code, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match code.code {
                    ErrorCode::DatabaseBusy => {
                        TutorlaneError::Database("database is busy".into())
                    }
                    ErrorCode::DatabaseLocked => {
                        TutorlaneError::Database("database is locked".into())
                    }
                    ErrorCode::ConstraintViolation => TutorlaneError::Database(format!(
                        "constraint violation: {message}"
                    )),
                    _ => TutorlaneError::Database(format!(
                        "sqlite failure {:?} (code {}): {}",
                        code.code, code.extended_code, message
                    )),
                }
            }
            SqlError::QueryReturnedNoRows => {
                TutorlaneError::NotFound("no rows returned by query".into())
            }
            SqlError::FromSqlConversionFailure(_, _, cause) => {
                TutorlaneError::Database(format!("failed to convert sqlite value: {cause}"))
            }
            SqlError::InvalidColumnType(_, _, ty) => {
                TutorlaneError::Database(format!("invalid column type: {ty}"))
            }
            other => TutorlaneError::Database(other.to_string()),
        };

        InfraError(domain_err)
    }
}

/* -------------------------------------------------------------------------- */
/* r2d2::Error → TutorlaneError */
/* -------------------------------------------------------------------------- */

impl From<PoolError> for InfraError {
    fn from(err: PoolError) -> Self {
        InfraError(TutorlaneError::Database(format!("connection pool error: {err}")))
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → TutorlaneError */
/* -------------------------------------------------------------------------- */

impl From<HttpError> for InfraError {
    fn from(err: HttpError) -> Self {
        let domain_err = if err.is_timeout() {
            TutorlaneError::Network(format!("request timed out: {err}"))
        } else if err.is_connect() {
            TutorlaneError::Network(format!("connection failed: {err}"))
        } else {
            TutorlaneError::Network(err.to_string())
        };
        InfraError(domain_err)
    }
}

/* -------------------------------------------------------------------------- */
/* CommonError → TutorlaneError */
/* -------------------------------------------------------------------------- */

impl From<CommonError> for InfraError {
    fn from(err: CommonError) -> Self {
        InfraError(TutorlaneError::Security(err.to_string()))
    }
}
