//! Wallet persistence with versioned writes.

use super::{decimal_col, Repository};
use crate::domain::{UserId, Wallet};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;

fn wallet_from_row(row: &SqliteRow) -> Result<Wallet, sqlx::Error> {
    Ok(Wallet {
        user_id: UserId::new(row.try_get::<String, _>("user_id")?),
        balance: decimal_col(row, "balance")?,
        total_earnings: decimal_col(row, "total_earnings")?,
        total_withdrawn: decimal_col(row, "total_withdrawn")?,
        pan_verified: row.try_get("pan_verified")?,
        pv: decimal_col(row, "pv")?,
        pan_number: row.try_get("pan_number")?,
        account_number: row.try_get("account_number")?,
        ifsc: row.try_get("ifsc")?,
        bank_name: row.try_get("bank_name")?,
        version: row.try_get("version")?,
    })
}

impl Repository {
    /// Create an empty wallet for `user` unless one exists.
    pub async fn ensure_wallet(
        conn: &mut SqliteConnection,
        user: &UserId,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT INTO wallets (user_id) VALUES (?) ON CONFLICT(user_id) DO NOTHING")
            .bind(user.as_str())
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    pub async fn fetch_wallet(
        conn: &mut SqliteConnection,
        user: &UserId,
    ) -> Result<Option<Wallet>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT user_id, balance, total_earnings, total_withdrawn, pan_verified, pv,
                   pan_number, account_number, ifsc, bank_name, version
            FROM wallets WHERE user_id = ?
            "#,
        )
        .bind(user.as_str())
        .fetch_optional(&mut *conn)
        .await?;
        row.as_ref().map(wallet_from_row).transpose()
    }

    pub async fn get_wallet(&self, user: &UserId) -> Result<Option<Wallet>, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_wallet(&mut conn, user).await
    }

    /// Versioned write of every wallet field. Returns false on a lost race.
    pub async fn update_wallet(
        conn: &mut SqliteConnection,
        wallet: &Wallet,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE wallets SET
                balance = ?, total_earnings = ?, total_withdrawn = ?, pan_verified = ?, pv = ?,
                pan_number = ?, account_number = ?, ifsc = ?, bank_name = ?,
                version = version + 1
            WHERE user_id = ? AND version = ?
            "#,
        )
        .bind(wallet.balance.to_canonical_string())
        .bind(wallet.total_earnings.to_canonical_string())
        .bind(wallet.total_withdrawn.to_canonical_string())
        .bind(wallet.pan_verified)
        .bind(wallet.pv.to_canonical_string())
        .bind(wallet.pan_number.as_deref())
        .bind(wallet.account_number.as_deref())
        .bind(wallet.ifsc.as_deref())
        .bind(wallet.bank_name.as_deref())
        .bind(wallet.user_id.as_str())
        .bind(wallet.version)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
