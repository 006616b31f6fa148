//! Payout Ledger operations: credit issue with the hold rule, hold release,
//! withdrawals and reconciliation.

use super::{with_retry, Orchestrator, ServiceError};
use crate::db::Repository;
use crate::domain::{
    BonusKind, Decimal, Payout, PayoutStatus, TimeMs, TransactionType, UserId, Wallet,
};
use crate::engine::EngineError;
use crate::notify::Notification;
use sqlx::sqlite::SqliteConnection;
use tracing::info;

/// Fields of a verification update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationUpdate {
    pub pan_verified: Option<bool>,
    pub pv: Option<Decimal>,
    pub pan_number: Option<String>,
    pub account_number: Option<String>,
    pub ifsc: Option<String>,
    pub bank_name: Option<String>,
}

impl VerificationUpdate {
    fn apply_to(&self, wallet: &mut Wallet) {
        if let Some(pan_verified) = self.pan_verified {
            wallet.pan_verified = pan_verified;
        }
        if let Some(pv) = self.pv {
            wallet.pv = pv;
        }
        let fields = [
            (&self.pan_number, &mut wallet.pan_number),
            (&self.account_number, &mut wallet.account_number),
            (&self.ifsc, &mut wallet.ifsc),
            (&self.bank_name, &mut wallet.bank_name),
        ];
        for (update, field) in fields {
            if let Some(value) = update {
                *field = Some(value.clone());
            }
        }
    }
}

pub(super) async fn load_wallet(
    conn: &mut SqliteConnection,
    user: &UserId,
) -> Result<Wallet, ServiceError> {
    Repository::fetch_wallet(conn, user)
        .await?
        .ok_or_else(|| ServiceError::missing_wallet(user))
}

pub(super) async fn store_wallet(
    conn: &mut SqliteConnection,
    wallet: &Wallet,
) -> Result<(), ServiceError> {
    if Repository::update_wallet(conn, wallet).await? {
        Ok(())
    } else {
        Err(ServiceError::stale(format!("wallet {}", wallet.user_id)))
    }
}

pub(super) fn credited(payout: &Payout) -> Notification {
    Notification::BonusCredited {
        user_id: payout.user_id.clone(),
        payout_id: payout.payout_id.clone(),
        name: payout.name,
        amount: payout.amount.to_canonical_string(),
        status: payout.status,
    }
}

impl Orchestrator {
    /// Write a single credit inside the caller's transaction. Returns
    /// `None` when the ledger already holds it.
    pub(super) async fn issue_credit(
        &self,
        conn: &mut SqliteConnection,
        payout: Payout,
        now: TimeMs,
    ) -> Result<Option<Payout>, ServiceError> {
        let user = payout.user_id.clone();
        Ok(self.issue_credits(conn, &user, vec![payout], now).await?.pop())
    }

    /// Write credits for `user` inside the caller's transaction, in order.
    ///
    /// Each credit is `OnHold` or `Pending` depending on the wallet's
    /// verification state and the lifetime total including it and every
    /// earlier credit of the batch. All records carry the bank snapshot.
    /// The wallet is read once and written once. Credits the ledger already
    /// holds (same payout id or `(source_ref, name)`) are skipped and left
    /// out of the result.
    pub(super) async fn issue_credits(
        &self,
        conn: &mut SqliteConnection,
        user: &UserId,
        payouts: Vec<Payout>,
        now: TimeMs,
    ) -> Result<Vec<Payout>, ServiceError> {
        for payout in &payouts {
            if payout.user_id != *user {
                return Err(EngineError::Integrity(format!(
                    "credit {} belongs to {}, not {}",
                    payout.payout_id, payout.user_id, user
                ))
                .into());
            }
            if !payout.amount.is_positive() {
                return Err(EngineError::InvalidAmount(format!(
                    "credit {} must be positive, got {}",
                    payout.payout_id, payout.amount
                ))
                .into());
            }
        }
        if payouts.is_empty() {
            return Ok(Vec::new());
        }

        let mut wallet = load_wallet(conn, user).await?;
        let mut cumulative = Repository::lifetime_credit_total(conn, user).await?;
        let bank = wallet.snapshot();
        let mut issued = Vec::with_capacity(payouts.len());
        let mut held = 0usize;
        let mut credited_any = false;

        for mut payout in payouts {
            let with_this = cumulative.try_add(payout.amount)?;
            let on_hold = self
                .hold_policy
                .requires_hold(wallet.pan_verified, with_this, wallet.pv);
            payout.status = if on_hold {
                PayoutStatus::OnHold
            } else {
                PayoutStatus::Pending
            };
            payout.bank = bank.clone();
            payout.created_at = now;

            if !Repository::insert_payout(conn, &payout).await? {
                continue;
            }
            cumulative = with_this;
            if on_hold {
                held += 1;
            } else {
                wallet.credit(payout.amount)?;
                credited_any = true;
            }
            issued.push(payout);
        }

        if held > 0 {
            info!(
                user_id = %user,
                held,
                cumulative = %cumulative,
                pv = %wallet.pv,
                "Payouts created on hold"
            );
        }
        if credited_any {
            store_wallet(conn, &wallet).await?;
        }
        Ok(issued)
    }

    /// Release every `OnHold` record of `user` to `Pending` when the hold
    /// condition no longer applies. Returns the released records.
    pub async fn release_on_hold_payouts(&self, user: &UserId) -> Result<Vec<Payout>, ServiceError> {
        let released = with_retry(|| self.release_once(user)).await?;
        if !released.is_empty() {
            info!(user_id = %user, released = released.len(), "Released held payouts");
        }
        Ok(released)
    }

    async fn release_once(&self, user: &UserId) -> Result<Vec<Payout>, ServiceError> {
        let mut tx = self.repo.begin().await?;
        let mut wallet = load_wallet(&mut tx, user).await?;

        let cumulative = Repository::lifetime_credit_total(&mut tx, user).await?;
        if self
            .hold_policy
            .requires_hold(wallet.pan_verified, cumulative, wallet.pv)
        {
            return Ok(Vec::new());
        }

        let now = TimeMs::now();
        let mut released =
            Repository::release_held_payouts(&mut tx, user, &wallet.snapshot(), now).await?;
        if released.is_empty() {
            return Ok(released);
        }

        for payout in &mut released {
            if payout.is_credit() {
                wallet.credit(payout.amount)?;
            }
            payout.status = PayoutStatus::Pending;
            payout.bank = wallet.snapshot();
        }
        store_wallet(&mut tx, &wallet).await?;
        tx.commit().await?;
        Ok(released)
    }

    /// Update PAN/bank/pv state, then re-run hold release.
    pub async fn update_verification(
        &self,
        user: &UserId,
        update: VerificationUpdate,
    ) -> Result<(Wallet, Vec<Payout>), ServiceError> {
        if let Some(pv) = update.pv {
            if pv.is_negative() {
                return Err(EngineError::InvalidAmount(format!("pv must be non-negative, got {}", pv)).into());
            }
        }

        with_retry(|| async {
            let mut tx = self.repo.begin().await?;
            let mut wallet = load_wallet(&mut tx, user).await?;
            update.apply_to(&mut wallet);
            store_wallet(&mut tx, &wallet).await?;
            tx.commit().await?;
            Ok(())
        })
        .await?;

        let released = self.release_on_hold_payouts(user).await?;
        let wallet = self.get_wallet(user).await?;
        Ok((wallet, released))
    }

    /// Debit `amount` from the wallet as a `Pending` withdrawal record.
    pub async fn withdraw(&self, user: &UserId, amount: Decimal) -> Result<Payout, ServiceError> {
        if !amount.is_positive() {
            return Err(EngineError::InvalidAmount(format!(
                "withdrawal must be positive, got {}",
                amount
            ))
            .into());
        }

        let payout = with_retry(|| async {
            let mut tx = self.repo.begin().await?;
            let mut wallet = load_wallet(&mut tx, user).await?;
            if amount > wallet.balance {
                return Err(EngineError::InsufficientBalance {
                    requested: amount,
                    available: wallet.balance,
                }
                .into());
            }

            let payout = Payout {
                transaction_type: TransactionType::Debit,
                bank: wallet.snapshot(),
                created_at: TimeMs::now(),
                ..Payout::credit(
                    format!("wd:{}", uuid::Uuid::new_v4()),
                    user.clone(),
                    BonusKind::Withdrawal,
                    amount,
                )
            };
            if !Repository::insert_payout(&mut tx, &payout).await? {
                return Err(EngineError::DuplicatePayout(payout.payout_id).into());
            }

            wallet.total_withdrawn = wallet.total_withdrawn.try_add(amount)?;
            wallet.balance -= amount;
            store_wallet(&mut tx, &wallet).await?;
            tx.commit().await?;
            Ok(payout)
        })
        .await?;

        info!(user_id = %user, payout_id = %payout.payout_id, amount = %amount, "Withdrawal recorded");
        Ok(payout)
    }

    /// Settle a `Pending` record as `Completed` or `Failed`.
    ///
    /// A failed withdrawal is refunded; a failed credit is taken back out
    /// of the wallet.
    pub async fn reconcile_payout(
        &self,
        payout_id: &str,
        to: PayoutStatus,
    ) -> Result<Payout, ServiceError> {
        let payout = with_retry(|| async {
            let mut tx = self.repo.begin().await?;
            let mut payout = Repository::fetch_payout(&mut tx, payout_id)
                .await?
                .ok_or_else(|| ServiceError::PayoutNotFound(payout_id.to_string()))?;

            if !payout.status.can_reconcile_to(to) {
                return Err(ServiceError::InvalidTransition {
                    payout_id: payout_id.to_string(),
                    from: payout.status,
                    to,
                });
            }
            let now = TimeMs::now();
            if !Repository::transition_payout(&mut tx, payout_id, payout.status, to, now).await? {
                return Err(ServiceError::stale(format!("payout {}", payout_id)));
            }

            if to == PayoutStatus::Failed {
                let mut wallet = load_wallet(&mut tx, &payout.user_id).await?;
                match payout.transaction_type {
                    TransactionType::Debit => {
                        wallet.balance = wallet.balance.try_add(payout.amount)?;
                        wallet.total_withdrawn -= payout.amount;
                    }
                    TransactionType::Credit => {
                        wallet.balance -= payout.amount;
                        wallet.total_earnings -= payout.amount;
                    }
                }
                store_wallet(&mut tx, &wallet).await?;
            }

            tx.commit().await?;
            payout.status = to;
            Ok(payout)
        })
        .await?;

        info!(payout_id = %payout_id, status = %to, "Payout reconciled");
        Ok(payout)
    }

    pub async fn list_payouts(&self, user: &UserId) -> Result<Vec<Payout>, ServiceError> {
        self.require_node(user).await?;
        Ok(self.repo.list_payouts(user).await?)
    }

    pub async fn get_wallet(&self, user: &UserId) -> Result<Wallet, ServiceError> {
        self.repo
            .get_wallet(user)
            .await?
            .ok_or_else(|| EngineError::NodeNotFound(user.clone()).into())
    }
}
