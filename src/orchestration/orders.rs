//! Order intake and business-volume propagation.

use super::ledger::credited;
use super::registrar::store_node;
use super::{with_retry, Orchestrator, ServiceError};
use crate::db::Repository;
use crate::domain::{BonusKind, Decimal, NodeStatus, Order, Payout, TimeMs, UserId};
use crate::engine::{cycle, volume, EngineError, Tree, VolumeCredit};
use crate::notify::Notification;
use serde::Serialize;
use sqlx::sqlite::SqliteConnection;
use tracing::info;

/// Outcome of one attempt; `first_order` is set when this order was the
/// buyer's first.
struct Recorded {
    receipt: OrderReceipt,
    first_order: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordStatus {
    Recorded,
    AlreadyRecorded,
}

/// What `record_order` did with an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderReceipt {
    pub order_id: String,
    pub status: RecordStatus,
    pub credits: Vec<VolumeCredit>,
    /// Set when this order activated the buyer.
    pub activated_date: Option<String>,
    pub payouts: Vec<Payout>,
}

impl OrderReceipt {
    fn duplicate(order_id: &str) -> Self {
        Self {
            order_id: order_id.to_string(),
            status: RecordStatus::AlreadyRecorded,
            credits: Vec::new(),
            activated_date: None,
            payouts: Vec::new(),
        }
    }
}

/// Propagate `amount` from `user` up its lineage and persist every touched
/// ancestor plus the credit log. Returns the arena and the credits applied.
async fn propagate(
    conn: &mut SqliteConnection,
    user: &UserId,
    amount: Decimal,
    order_id: Option<&str>,
    now: TimeMs,
) -> Result<(Tree, Vec<VolumeCredit>), ServiceError> {
    let lineage = Repository::fetch_lineage(conn, user).await?;
    let mut tree = Tree::from_nodes(lineage);
    let credits = volume::apply_order_volume(&mut tree, user, amount)?;

    for credit in &credits {
        store_node(conn, tree.node(&credit.ancestor)?).await?;
        Repository::insert_volume_credit(conn, credit, user, order_id, now).await?;
    }
    Ok((tree, credits))
}

impl Orchestrator {
    /// Record an order once and apply its effects in one transaction.
    ///
    /// A repeated `order_id` changes nothing and reports `AlreadyRecorded`.
    pub async fn record_order(&self, order: &Order) -> Result<OrderReceipt, ServiceError> {
        if order.amount.is_negative() {
            return Err(EngineError::InvalidAmount(format!(
                "order amount must be non-negative, got {}",
                order.amount
            ))
            .into());
        }

        let bv = order.business_volume()?;
        if bv.is_negative() {
            return Err(EngineError::InvalidAmount(format!(
                "business volume must be non-negative, got {}",
                bv
            ))
            .into());
        }

        let Recorded {
            receipt,
            first_order,
        } = with_retry(|| self.record_order_once(order, bv)).await?;

        if receipt.status == RecordStatus::Recorded {
            info!(
                order_id = %order.order_id,
                user_id = %order.user_id,
                bv = %bv,
                ancestors = receipt.credits.len(),
                activated = receipt.activated_date.is_some(),
                "Order recorded"
            );
            let mut notifications = Vec::new();
            if let Some(activated_date) = &receipt.activated_date {
                notifications.push(Notification::Activated {
                    user_id: order.user_id.clone(),
                    activated_date: activated_date.clone(),
                });
            }
            notifications.extend(receipt.payouts.iter().map(credited));
            self.notify_all(notifications).await;

            if first_order {
                self.refresh_ancestor_ranks(&order.user_id).await;
            }
        }
        Ok(receipt)
    }

    async fn record_order_once(&self, order: &Order, bv: Decimal) -> Result<Recorded, ServiceError> {
        let mut tx = self.repo.begin().await?;
        let now = TimeMs::now();

        if Repository::fetch_node(&mut tx, &order.user_id).await?.is_none() {
            return Err(EngineError::NodeNotFound(order.user_id.clone()).into());
        }
        if !Repository::insert_order(&mut tx, order, bv).await? {
            return Ok(Recorded {
                receipt: OrderReceipt::duplicate(&order.order_id),
                first_order: false,
            });
        }

        let (mut tree, credits) =
            propagate(&mut tx, &order.user_id, bv, Some(&order.order_id), now).await?;

        let buyer = tree.node_mut(&order.user_id)?;
        let mut activated_date = None;
        if buyer.status == NodeStatus::Inactive && !buyer.has_ordered {
            buyer.status = NodeStatus::Active;
            if buyer.activated_date.is_none() {
                let order_day = order.created_at.utc_date().ok_or_else(|| {
                    ServiceError::InvalidInput(format!(
                        "order {} has an out-of-range timestamp",
                        order.order_id
                    ))
                })?;
                buyer.activated_date = Some(cycle::format_activation_date(order_day));
            }
            activated_date = buyer.activated_date.clone();
        }
        let first_order = !buyer.has_ordered;
        buyer.has_ordered = true;
        let sponsor = buyer.sponsor.clone();
        store_node(&mut tx, buyer).await?;

        let mut payouts = Vec::new();

        let referral = self.rates.referral_pct.percent_of(bv)?;
        if let Some(sponsor) = sponsor.filter(|_| referral.is_positive()) {
            let payout = sourced(BonusKind::Referral, &order.order_id, sponsor, referral);
            payouts.extend(self.issue_credit(&mut tx, payout, now).await?);
        }

        let direct = self.rates.direct_sales_pct.percent_of(order.amount)?;
        if order.is_assisted()
            && direct.is_positive()
            && Repository::fetch_node(&mut tx, &order.placed_by).await?.is_some()
        {
            let payout = sourced(
                BonusKind::DirectSales,
                &order.order_id,
                order.placed_by.clone(),
                direct,
            );
            payouts.extend(self.issue_credit(&mut tx, payout, now).await?);
        }

        tx.commit().await?;
        Ok(Recorded {
            receipt: OrderReceipt {
                order_id: order.order_id.clone(),
                status: RecordStatus::Recorded,
                credits,
                activated_date,
                payouts,
            },
            first_order,
        })
    }

    /// Add `amount` of business volume from `user` to every ancestor.
    ///
    /// Performs no deduplication; each call counts once more.
    pub async fn apply_order_volume(
        &self,
        user: &UserId,
        amount: Decimal,
    ) -> Result<Vec<VolumeCredit>, ServiceError> {
        let credits = with_retry(|| async {
            let mut tx = self.repo.begin().await?;
            if Repository::fetch_node(&mut tx, user).await?.is_none() {
                return Err(EngineError::NodeNotFound(user.clone()).into());
            }
            let (_, credits) = propagate(&mut tx, user, amount, None, TimeMs::now()).await?;
            tx.commit().await?;
            Ok(credits)
        })
        .await?;

        info!(user_id = %user, amount = %amount, ancestors = credits.len(), "Volume applied");
        Ok(credits)
    }
}

fn sourced(name: BonusKind, order_id: &str, user: UserId, amount: Decimal) -> Payout {
    let mut payout = Payout::credit(Payout::sourced_id(name, order_id, &user), user, name, amount);
    payout.source_ref = Some(order_id.to_string());
    payout
}
