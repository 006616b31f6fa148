//! Order intake log.

use super::{decimal_col, parse_col, Repository};
use crate::domain::{Decimal, Order, OrderItem, TimeMs, UserId};
use sqlx::sqlite::SqliteConnection;
use sqlx::Row;

impl Repository {
    /// Record an order and its line items idempotently, with `business_volume`
    /// as the order's total.
    ///
    /// Returns false if `order_id` was already recorded; nothing is written
    /// in that case.
    pub async fn insert_order(
        conn: &mut SqliteConnection,
        order: &Order,
        business_volume: Decimal,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO orders (order_id, user_id, placed_by, amount, business_volume, payment_ref, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(order_id) DO NOTHING
            "#,
        )
        .bind(&order.order_id)
        .bind(order.user_id.as_str())
        .bind(order.placed_by.as_str())
        .bind(order.amount.to_canonical_string())
        .bind(business_volume.to_canonical_string())
        .bind(order.payment_ref.as_deref())
        .bind(order.status.as_str())
        .bind(order.created_at.as_ms())
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        for (line_no, item) in order.items.iter().enumerate() {
            sqlx::query(
                "INSERT INTO order_items (order_id, line_no, business_volume) VALUES (?, ?, ?)",
            )
            .bind(&order.order_id)
            .bind(line_no as i64)
            .bind(item.business_volume.to_canonical_string())
            .execute(&mut *conn)
            .await?;
        }

        Ok(true)
    }

    pub async fn get_order(&self, order_id: &str) -> Result<Option<Order>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT order_id, user_id, placed_by, amount, payment_ref, status, created_at
            FROM orders WHERE order_id = ?
            "#,
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let items = sqlx::query(
            "SELECT business_volume FROM order_items WHERE order_id = ? ORDER BY line_no ASC",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(|item| {
            Ok(OrderItem {
                business_volume: decimal_col(item, "business_volume")?,
            })
        })
        .collect::<Result<Vec<_>, sqlx::Error>>()?;

        Ok(Some(Order {
            order_id: row.try_get("order_id")?,
            user_id: UserId::new(row.try_get::<String, _>("user_id")?),
            placed_by: UserId::new(row.try_get::<String, _>("placed_by")?),
            amount: decimal_col(&row, "amount")?,
            items,
            payment_ref: row.try_get("payment_ref")?,
            status: parse_col(&row, "status")?,
            created_at: TimeMs::new(row.try_get("created_at")?),
        }))
    }
}
