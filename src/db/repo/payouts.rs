//! Payout Ledger persistence.

use super::{decimal_col, decode_err, parse_col, Repository};
use crate::domain::{
    BankSnapshot, BonusKind, Decimal, Payout, PayoutStatus, TimeMs, TransactionType, UserId,
};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;

const PAYOUT_COLUMNS: &str = "payout_id, user_id, name, amount, transaction_type, status, \
     source_ref, left_users, right_users, account_number, ifsc, bank_name, pan_number, \
     pan_verified, created_at";

fn users_col(row: &SqliteRow, col: &str) -> Result<Vec<UserId>, sqlx::Error> {
    let raw: String = row.try_get(col)?;
    serde_json::from_str(&raw).map_err(decode_err)
}

fn payout_from_row(row: &SqliteRow) -> Result<Payout, sqlx::Error> {
    Ok(Payout {
        payout_id: row.try_get("payout_id")?,
        user_id: UserId::new(row.try_get::<String, _>("user_id")?),
        name: parse_col(row, "name")?,
        amount: decimal_col(row, "amount")?,
        transaction_type: parse_col(row, "transaction_type")?,
        status: parse_col(row, "status")?,
        source_ref: row.try_get("source_ref")?,
        left_users: users_col(row, "left_users")?,
        right_users: users_col(row, "right_users")?,
        bank: BankSnapshot {
            account_number: row.try_get("account_number")?,
            ifsc: row.try_get("ifsc")?,
            bank_name: row.try_get("bank_name")?,
            pan_number: row.try_get("pan_number")?,
            pan_verified: row.try_get("pan_verified")?,
        },
        created_at: TimeMs::new(row.try_get("created_at")?),
    })
}

impl Repository {
    /// Append a ledger record.
    ///
    /// Returns false when `payout_id`, or `(source_ref, name)` for sourced
    /// bonuses, already exists. Nothing is written in that case.
    pub async fn insert_payout(
        conn: &mut SqliteConnection,
        payout: &Payout,
    ) -> Result<bool, sqlx::Error> {
        let left_users = serde_json::to_string(&payout.left_users).map_err(decode_err)?;
        let right_users = serde_json::to_string(&payout.right_users).map_err(decode_err)?;

        let result = sqlx::query(
            r#"
            INSERT INTO payouts (
                payout_id, user_id, name, amount, transaction_type, status, source_ref,
                left_users, right_users, account_number, ifsc, bank_name, pan_number,
                pan_verified, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(&payout.payout_id)
        .bind(payout.user_id.as_str())
        .bind(payout.name.as_str())
        .bind(payout.amount.to_canonical_string())
        .bind(payout.transaction_type.as_str())
        .bind(payout.status.as_str())
        .bind(payout.source_ref.as_deref())
        .bind(left_users)
        .bind(right_users)
        .bind(payout.bank.account_number.as_deref())
        .bind(payout.bank.ifsc.as_deref())
        .bind(payout.bank.bank_name.as_deref())
        .bind(payout.bank.pan_number.as_deref())
        .bind(payout.bank.pan_verified)
        .bind(payout.created_at.as_ms())
        .bind(payout.created_at.as_ms())
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn fetch_payout(
        conn: &mut SqliteConnection,
        payout_id: &str,
    ) -> Result<Option<Payout>, sqlx::Error> {
        let sql = format!("SELECT {} FROM payouts WHERE payout_id = ?", PAYOUT_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(payout_id)
            .fetch_optional(&mut *conn)
            .await?;
        row.as_ref().map(payout_from_row).transpose()
    }

    /// All records for a user, oldest first.
    pub async fn list_payouts(&self, user: &UserId) -> Result<Vec<Payout>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM payouts WHERE user_id = ? ORDER BY created_at ASC, payout_id ASC",
            PAYOUT_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(user.as_str())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(payout_from_row).collect()
    }

    /// `(amount, created_at)` of non-failed records named `name` created in
    /// `[from, to)`.
    pub async fn bonus_in_window(
        conn: &mut SqliteConnection,
        user: &UserId,
        name: BonusKind,
        from: TimeMs,
        to: TimeMs,
    ) -> Result<Vec<(Decimal, TimeMs)>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT amount, created_at FROM payouts
            WHERE user_id = ? AND name = ? AND status != 'Failed'
              AND created_at >= ? AND created_at < ?
            ORDER BY created_at ASC
            "#,
        )
        .bind(user.as_str())
        .bind(name.as_str())
        .bind(from.as_ms())
        .bind(to.as_ms())
        .fetch_all(&mut *conn)
        .await?;
        rows.iter()
            .map(|row| {
                Ok((
                    decimal_col(row, "amount")?,
                    TimeMs::new(row.try_get("created_at")?),
                ))
            })
            .collect()
    }

    /// Lifetime total of credit records that have not failed.
    pub async fn lifetime_credit_total(
        conn: &mut SqliteConnection,
        user: &UserId,
    ) -> Result<Decimal, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT amount FROM payouts WHERE user_id = ? AND transaction_type = ? AND status != 'Failed'",
        )
        .bind(user.as_str())
        .bind(TransactionType::Credit.as_str())
        .fetch_all(&mut *conn)
        .await?;
        let amounts = rows
            .iter()
            .map(|row| decimal_col(row, "amount"))
            .collect::<Result<Vec<Decimal>, sqlx::Error>>()?;
        Decimal::try_sum(amounts).map_err(|e| sqlx::Error::Decode(Box::new(e)))
    }

    /// Move every `OnHold` record of `user` to `Pending`, restamping the
    /// bank snapshot. Returns the records as they were before release.
    pub async fn release_held_payouts(
        conn: &mut SqliteConnection,
        user: &UserId,
        bank: &BankSnapshot,
        now: TimeMs,
    ) -> Result<Vec<Payout>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM payouts WHERE user_id = ? AND status = ? ORDER BY created_at ASC",
            PAYOUT_COLUMNS
        );
        let held = sqlx::query(&sql)
            .bind(user.as_str())
            .bind(PayoutStatus::OnHold.as_str())
            .fetch_all(&mut *conn)
            .await?
            .iter()
            .map(payout_from_row)
            .collect::<Result<Vec<_>, sqlx::Error>>()?;

        if held.is_empty() {
            return Ok(held);
        }

        sqlx::query(
            r#"
            UPDATE payouts SET
                status = ?, account_number = ?, ifsc = ?, bank_name = ?, pan_number = ?,
                pan_verified = ?, updated_at = ?
            WHERE user_id = ? AND status = ?
            "#,
        )
        .bind(PayoutStatus::Pending.as_str())
        .bind(bank.account_number.as_deref())
        .bind(bank.ifsc.as_deref())
        .bind(bank.bank_name.as_deref())
        .bind(bank.pan_number.as_deref())
        .bind(bank.pan_verified)
        .bind(now.as_ms())
        .bind(user.as_str())
        .bind(PayoutStatus::OnHold.as_str())
        .execute(&mut *conn)
        .await?;

        Ok(held)
    }

    /// Compare-and-set a record's status. Returns false if it was not `from`.
    pub async fn transition_payout(
        conn: &mut SqliteConnection,
        payout_id: &str,
        from: PayoutStatus,
        to: PayoutStatus,
        now: TimeMs,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE payouts SET status = ?, updated_at = ? WHERE payout_id = ? AND status = ?",
        )
        .bind(to.as_str())
        .bind(now.as_ms())
        .bind(payout_id)
        .bind(from.as_str())
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
