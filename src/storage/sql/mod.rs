//! Unified SQL storage implementations.
//!
//! This module provides shared implementations for SQL-based storage
//! backends (PostgreSQL, SQLite). The implementations are parameterized by
//! database type using the `SqlDatabase` trait, which also hides the
//! backends' different at-rest encodings: PostgreSQL rows decode natively,
//! SQLite rows carry TEXT that is parsed at the boundary.

mod record_store;
mod rollup_store;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::interfaces::record_store::Result;

pub use record_store::SqlRecordStore;
pub use rollup_store::SqlRollupStore;

/// A SQL backend: query rendering plus row decoding for the types the two
/// backends store differently.
pub trait SqlDatabase {
    type Pool;
    type Row;

    fn build_select(stmt: sea_query::SelectStatement) -> String;
    fn build_insert(stmt: sea_query::InsertStatement) -> String;
    fn build_delete(stmt: sea_query::DeleteStatement) -> String;

    fn uuid(row: &Self::Row, column: &str) -> Result<Uuid>;
    fn date(row: &Self::Row, column: &str) -> Result<NaiveDate>;
    fn timestamp(row: &Self::Row, column: &str) -> Result<DateTime<Utc>>;
    fn opt_timestamp(row: &Self::Row, column: &str) -> Result<Option<DateTime<Utc>>>;
    fn decimal(row: &Self::Row, column: &str) -> Result<Decimal>;
    fn opt_decimal(row: &Self::Row, column: &str) -> Result<Option<Decimal>>;
}

#[cfg(feature = "postgres")]
pub mod postgres {
    //! PostgreSQL database backend.

    use super::*;
    use sea_query::PostgresQueryBuilder;
    use sqlx::postgres::PgRow;
    use sqlx::{PgPool, Row};

    /// PostgreSQL database marker type.
    pub struct Postgres;

    impl SqlDatabase for Postgres {
        type Pool = PgPool;
        type Row = PgRow;

        fn build_select(stmt: sea_query::SelectStatement) -> String {
            stmt.to_string(PostgresQueryBuilder)
        }

        fn build_insert(stmt: sea_query::InsertStatement) -> String {
            stmt.to_string(PostgresQueryBuilder)
        }

        fn build_delete(stmt: sea_query::DeleteStatement) -> String {
            stmt.to_string(PostgresQueryBuilder)
        }

        fn uuid(row: &PgRow, column: &str) -> Result<Uuid> {
            Ok(row.try_get(column)?)
        }

        fn date(row: &PgRow, column: &str) -> Result<NaiveDate> {
            Ok(row.try_get(column)?)
        }

        fn timestamp(row: &PgRow, column: &str) -> Result<DateTime<Utc>> {
            Ok(row.try_get(column)?)
        }

        fn opt_timestamp(row: &PgRow, column: &str) -> Result<Option<DateTime<Utc>>> {
            Ok(row.try_get(column)?)
        }

        fn decimal(row: &PgRow, column: &str) -> Result<Decimal> {
            Ok(row.try_get(column)?)
        }

        fn opt_decimal(row: &PgRow, column: &str) -> Result<Option<Decimal>> {
            Ok(row.try_get(column)?)
        }
    }

    /// PostgreSQL record store.
    pub type PostgresRecordStore = super::SqlRecordStore<Postgres>;

    /// PostgreSQL rollup store.
    pub type PostgresRollupStore = super::SqlRollupStore<Postgres>;
}

#[cfg(feature = "sqlite")]
pub mod sqlite {
    //! SQLite database backend.

    use super::*;
    use crate::interfaces::StorageError;
    use sea_query::SqliteQueryBuilder;
    use sqlx::sqlite::SqliteRow;
    use sqlx::{Row, SqlitePool};

    /// SQLite database marker type.
    pub struct Sqlite;

    fn parse_decimal(column: &str, raw: &str) -> Result<Decimal> {
        raw.parse()
            .map_err(|_| StorageError::InvalidDecimal {
                column: column.to_string(),
                value: raw.to_string(),
            })
    }

    fn parse_timestamp(column: &str, raw: &str) -> Result<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| StorageError::InvalidDate {
                column: column.to_string(),
                value: raw.to_string(),
            })
    }

    impl SqlDatabase for Sqlite {
        type Pool = SqlitePool;
        type Row = SqliteRow;

        fn build_select(stmt: sea_query::SelectStatement) -> String {
            stmt.to_string(SqliteQueryBuilder)
        }

        fn build_insert(stmt: sea_query::InsertStatement) -> String {
            stmt.to_string(SqliteQueryBuilder)
        }

        fn build_delete(stmt: sea_query::DeleteStatement) -> String {
            stmt.to_string(SqliteQueryBuilder)
        }

        fn uuid(row: &SqliteRow, column: &str) -> Result<Uuid> {
            let raw: String = row.try_get(column)?;
            Ok(Uuid::parse_str(&raw)?)
        }

        fn date(row: &SqliteRow, column: &str) -> Result<NaiveDate> {
            let raw: String = row.try_get(column)?;
            NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|_| StorageError::InvalidDate {
                column: column.to_string(),
                value: raw,
            })
        }

        fn timestamp(row: &SqliteRow, column: &str) -> Result<DateTime<Utc>> {
            let raw: String = row.try_get(column)?;
            parse_timestamp(column, &raw)
        }

        fn opt_timestamp(row: &SqliteRow, column: &str) -> Result<Option<DateTime<Utc>>> {
            let raw: Option<String> = row.try_get(column)?;
            raw.map(|value| parse_timestamp(column, &value)).transpose()
        }

        fn decimal(row: &SqliteRow, column: &str) -> Result<Decimal> {
            let raw: String = row.try_get(column)?;
            parse_decimal(column, &raw)
        }

        fn opt_decimal(row: &SqliteRow, column: &str) -> Result<Option<Decimal>> {
            let raw: Option<String> = row.try_get(column)?;
            raw.map(|value| parse_decimal(column, &value)).transpose()
        }
    }

    /// SQLite record store.
    pub type SqliteRecordStore = super::SqlRecordStore<Sqlite>;

    /// SQLite rollup store.
    pub type SqliteRollupStore = super::SqlRollupStore<Sqlite>;
}
