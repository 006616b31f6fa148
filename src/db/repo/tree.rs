//! Tree node and volume-credit persistence.

use super::{count_col, decimal_col, decode_err, parse_col, Repository};
use crate::domain::{TeamSide, TimeMs, TreeNode, UserId};
use crate::engine::VolumeCredit;
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;

const NODE_COLUMNS: &str = "user_id, sponsor_id, parent_id, left_id, right_id, left_volume, \
     right_volume, carry_forward_left, carry_forward_right, leaders_left, leaders_right, \
     carry_forward_leaders_left, carry_forward_leaders_right, matched_units, has_ordered, \
     status, activated_date, created_at, version";

fn node_from_row(row: &SqliteRow) -> Result<TreeNode, sqlx::Error> {
    let opt_id = |col: &str| -> Result<Option<UserId>, sqlx::Error> {
        Ok(row.try_get::<Option<String>, _>(col)?.map(UserId::new))
    };
    let matched_units: i64 = row.try_get("matched_units")?;

    Ok(TreeNode {
        user_id: UserId::new(row.try_get::<String, _>("user_id")?),
        sponsor: opt_id("sponsor_id")?,
        parent: opt_id("parent_id")?,
        left: opt_id("left_id")?,
        right: opt_id("right_id")?,
        left_volume: decimal_col(row, "left_volume")?,
        right_volume: decimal_col(row, "right_volume")?,
        carry_forward_left: decimal_col(row, "carry_forward_left")?,
        carry_forward_right: decimal_col(row, "carry_forward_right")?,
        leaders_left: count_col(row, "leaders_left")?,
        leaders_right: count_col(row, "leaders_right")?,
        carry_forward_leaders_left: count_col(row, "carry_forward_leaders_left")?,
        carry_forward_leaders_right: count_col(row, "carry_forward_leaders_right")?,
        matched_units: u64::try_from(matched_units).map_err(decode_err)?,
        has_ordered: row.try_get("has_ordered")?,
        status: parse_col(row, "status")?,
        activated_date: row.try_get("activated_date")?,
        created_at: TimeMs::new(row.try_get("created_at")?),
        version: row.try_get("version")?,
    })
}

impl Repository {
    pub async fn fetch_node(
        conn: &mut SqliteConnection,
        user: &UserId,
    ) -> Result<Option<TreeNode>, sqlx::Error> {
        let sql = format!("SELECT {} FROM tree_nodes WHERE user_id = ?", NODE_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(user.as_str())
            .fetch_optional(&mut *conn)
            .await?;
        row.as_ref().map(node_from_row).transpose()
    }

    /// Read a single node outside any transaction.
    pub async fn get_node(&self, user: &UserId) -> Result<Option<TreeNode>, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_node(&mut conn, user).await
    }

    /// Insert a new node. Returns false if the user already has one.
    pub async fn insert_node(
        conn: &mut SqliteConnection,
        node: &TreeNode,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO tree_nodes (
                user_id, sponsor_id, parent_id, left_id, right_id, left_volume, right_volume,
                carry_forward_left, carry_forward_right, leaders_left, leaders_right,
                carry_forward_leaders_left, carry_forward_leaders_right, matched_units,
                has_ordered, status, activated_date, created_at, version
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0)
            ON CONFLICT(user_id) DO NOTHING
            "#,
        )
        .bind(node.user_id.as_str())
        .bind(node.sponsor.as_ref().map(|u| u.as_str()))
        .bind(node.parent.as_ref().map(|u| u.as_str()))
        .bind(node.left.as_ref().map(|u| u.as_str()))
        .bind(node.right.as_ref().map(|u| u.as_str()))
        .bind(node.left_volume.to_canonical_string())
        .bind(node.right_volume.to_canonical_string())
        .bind(node.carry_forward_left.to_canonical_string())
        .bind(node.carry_forward_right.to_canonical_string())
        .bind(i64::from(node.leaders_left))
        .bind(i64::from(node.leaders_right))
        .bind(i64::from(node.carry_forward_leaders_left))
        .bind(i64::from(node.carry_forward_leaders_right))
        .bind(node.matched_units as i64)
        .bind(node.has_ordered)
        .bind(node.status.as_str())
        .bind(node.activated_date.as_deref())
        .bind(node.created_at.as_ms())
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Write every mutable field of `node` if its stored version still equals
    /// `node.version`. Returns false when another writer got there first.
    pub async fn update_node(
        conn: &mut SqliteConnection,
        node: &TreeNode,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE tree_nodes SET
                left_id = ?, right_id = ?,
                left_volume = ?, right_volume = ?,
                carry_forward_left = ?, carry_forward_right = ?,
                leaders_left = ?, leaders_right = ?,
                carry_forward_leaders_left = ?, carry_forward_leaders_right = ?,
                matched_units = ?, has_ordered = ?, status = ?, activated_date = ?,
                version = version + 1
            WHERE user_id = ? AND version = ?
            "#,
        )
        .bind(node.left.as_ref().map(|u| u.as_str()))
        .bind(node.right.as_ref().map(|u| u.as_str()))
        .bind(node.left_volume.to_canonical_string())
        .bind(node.right_volume.to_canonical_string())
        .bind(node.carry_forward_left.to_canonical_string())
        .bind(node.carry_forward_right.to_canonical_string())
        .bind(i64::from(node.leaders_left))
        .bind(i64::from(node.leaders_right))
        .bind(i64::from(node.carry_forward_leaders_left))
        .bind(i64::from(node.carry_forward_leaders_right))
        .bind(node.matched_units as i64)
        .bind(node.has_ordered)
        .bind(node.status.as_str())
        .bind(node.activated_date.as_deref())
        .bind(node.user_id.as_str())
        .bind(node.version)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// `root` and every node below it.
    pub async fn fetch_subtree(
        conn: &mut SqliteConnection,
        root: &UserId,
    ) -> Result<Vec<TreeNode>, sqlx::Error> {
        let sql = format!(
            r#"
            WITH RECURSIVE sub(user_id) AS (
                SELECT ?
                UNION
                SELECT t.user_id FROM tree_nodes t JOIN sub ON t.parent_id = sub.user_id
            )
            SELECT {} FROM tree_nodes WHERE user_id IN (SELECT user_id FROM sub)
            "#,
            NODE_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(root.as_str())
            .fetch_all(&mut *conn)
            .await?;
        rows.iter().map(node_from_row).collect()
    }

    /// `user` and every node on its parent chain up to the root.
    pub async fn fetch_lineage(
        conn: &mut SqliteConnection,
        user: &UserId,
    ) -> Result<Vec<TreeNode>, sqlx::Error> {
        let sql = format!(
            r#"
            WITH RECURSIVE chain(user_id) AS (
                SELECT ?
                UNION
                SELECT t.parent_id FROM tree_nodes t JOIN chain ON t.user_id = chain.user_id
                WHERE t.parent_id IS NOT NULL
            )
            SELECT {} FROM tree_nodes WHERE user_id IN (SELECT user_id FROM chain)
            "#,
            NODE_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(user.as_str())
            .fetch_all(&mut *conn)
            .await?;
        rows.iter().map(node_from_row).collect()
    }

    /// Ids of every active node, in stable order.
    pub async fn active_user_ids(&self) -> Result<Vec<UserId>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT user_id FROM tree_nodes WHERE status = 'active' ORDER BY created_at, user_id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| Ok(UserId::new(row.try_get::<String, _>("user_id")?)))
            .collect()
    }

    /// Log one credit applied to an ancestor on behalf of `contributor`.
    pub async fn insert_volume_credit(
        conn: &mut SqliteConnection,
        credit: &VolumeCredit,
        contributor: &UserId,
        order_id: Option<&str>,
        now: TimeMs,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO volume_credits (ancestor_id, side, contributor_id, order_id, amount, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(credit.ancestor.as_str())
        .bind(credit.side.as_str())
        .bind(contributor.as_str())
        .bind(order_id)
        .bind(credit.amount.to_canonical_string())
        .bind(now.as_ms())
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Distinct contributors of unsettled credits on one side, in order of
    /// their first pending credit.
    pub async fn pending_contributors(
        conn: &mut SqliteConnection,
        ancestor: &UserId,
        side: TeamSide,
    ) -> Result<Vec<UserId>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT contributor_id, MIN(id) AS first_id
            FROM volume_credits
            WHERE ancestor_id = ? AND side = ? AND settled = 0
            GROUP BY contributor_id
            ORDER BY first_id ASC
            "#,
        )
        .bind(ancestor.as_str())
        .bind(side.as_str())
        .fetch_all(&mut *conn)
        .await?;
        rows.iter()
            .map(|row| Ok(UserId::new(row.try_get::<String, _>("contributor_id")?)))
            .collect()
    }

    pub async fn settle_credits(
        conn: &mut SqliteConnection,
        ancestor: &UserId,
        side: TeamSide,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE volume_credits SET settled = 1 WHERE ancestor_id = ? AND side = ? AND settled = 0",
        )
        .bind(ancestor.as_str())
        .bind(side.as_str())
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected())
    }
}
