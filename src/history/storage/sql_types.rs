//! `ToSql` / `FromSql` for the domain newtypes and enums.

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use uuid::Uuid;

use crate::history::core::errors::{HistoryError, HistoryResult};
use crate::history::core::ids::{ConversationId, MessageId, OwnerId};
use crate::history::core::message::{Feedback, Role};

macro_rules! uuid_text_column {
    ($name:ident) => {
        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_uuid().to_string()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                let text = value.as_str()?;
                Uuid::parse_str(text)
                    .map(Self)
                    .map_err(|err| FromSqlError::Other(Box::new(err)))
            }
        }
    };
}

uuid_text_column!(ConversationId);
uuid_text_column!(MessageId);

impl ToSql for OwnerId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for OwnerId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        Self::new(value.as_str()?).map_err(|err| FromSqlError::Other(Box::new(err)))
    }
}

impl ToSql for Role {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Role {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|raw: String| FromSqlError::Other(format!("unknown role {raw:?}").into()))
    }
}

impl ToSql for Feedback {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(i64::from(self.code())))
    }
}

impl FromSql for Feedback {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let code = value.as_i64()?;
        u8::try_from(code)
            .ok()
            .and_then(|code| Self::try_from(code).ok())
            .ok_or(FromSqlError::OutOfRange(code))
    }
}

/// Convert a stored unix-millis column into a UTC timestamp.
///
/// # Errors
/// `IntegralValueOutOfRange` naming `column` when `millis` is not a
/// representable instant.
pub fn millis_to_datetime(column: usize, millis: i64) -> rusqlite::Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(column, millis))
}

/// Convert a write clock reading into the timestamp stored alongside it.
///
/// # Errors
/// Returns a validation error when `millis` is not a representable instant.
pub fn clock_to_datetime(millis: i64) -> HistoryResult<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single().ok_or_else(|| {
        HistoryError::Validation(format!("clock reading {millis} ms is out of range"))
    })
}
