//! Small helpers shared by the service modules: text-backed enum columns,
//! constraint classification and the local calendar date.

use chrono::NaiveDate;
use rusqlite::ErrorCode;

/// Store a strum-backed enum as its `AsRef<str>` text and parse it back
/// with `FromStr`.
macro_rules! sql_text_enum {
    ($($ty:ty),+ $(,)?) => {$(
        impl rusqlite::types::ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
                Ok(rusqlite::types::ToSqlOutput::from(AsRef::<str>::as_ref(self)))
            }
        }

        impl rusqlite::types::FromSql for $ty {
            fn column_result(
                value: rusqlite::types::ValueRef<'_>,
            ) -> rusqlite::types::FromSqlResult<Self> {
                let text = value.as_str()?;
                text.parse().map_err(|_| {
                    rusqlite::types::FromSqlError::Other(
                        format!("unknown {} value: {text}", stringify!($ty)).into(),
                    )
                })
            }
        }
    )+};
}

pub(crate) use sql_text_enum;

/// Parse a caller-supplied enum value, attributing failures to `field`.
pub fn parse_field<T: std::str::FromStr>(field: &str, raw: &str) -> crate::Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| crate::HostelError::validation(field, format!("unknown value '{raw}'")))
}

/// True when `err` is a UNIQUE or PRIMARY KEY violation.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => {
            e.code == ErrorCode::ConstraintViolation
                && matches!(
                    e.extended_code,
                    rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                        | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                )
        }
        _ => false,
    }
}

/// Map a UNIQUE violation to a validation error on `field`, pass anything
/// else through.
pub(crate) fn unique_as_validation(
    err: rusqlite::Error,
    field: &str,
    message: &str,
) -> crate::HostelError {
    if is_unique_violation(&err) {
        crate::HostelError::validation(field, message)
    } else {
        err.into()
    }
}

/// The hostel's calendar date.
pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}
