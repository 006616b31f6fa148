//! Repository layer over the SQLite tree store and ledger.
//!
//! Methods are organized across submodules by entity:
//! - `tree.rs` - tree nodes and volume credits
//! - `orders.rs` - order intake log
//! - `payouts.rs` - Payout Ledger records
//! - `wallets.rs` - wallets and verification state
//! - `ranks.rs` - rank achievements and consumed slots
//!
//! Functions taking a `&mut SqliteConnection` run inside the caller's
//! transaction; `&self` methods are standalone reads on the pool.

mod orders;
mod payouts;
mod ranks;
mod tree;
mod wallets;

use crate::domain::Decimal;
use sqlx::sqlite::{Sqlite, SqlitePool, SqliteRow};
use sqlx::{Row, Transaction};
use std::str::FromStr;

/// Repository for database operations.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Start a transaction; one unit of work per user.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>, sqlx::Error> {
        self.pool.begin().await
    }
}

fn decode_err<E>(err: E) -> sqlx::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    sqlx::Error::Decode(Box::new(err))
}

/// Decode a TEXT column through `FromStr`, failing on malformed values.
fn parse_col<T>(row: &SqliteRow, col: &str) -> Result<T, sqlx::Error>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.try_get(col)?;
    raw.parse::<T>().map_err(decode_err)
}

fn decimal_col(row: &SqliteRow, col: &str) -> Result<Decimal, sqlx::Error> {
    parse_col::<Decimal>(row, col)
}

fn count_col(row: &SqliteRow, col: &str) -> Result<u32, sqlx::Error> {
    let raw: i64 = row.try_get(col)?;
    u32::try_from(raw).map_err(decode_err)
}
