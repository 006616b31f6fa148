//! Payout Ledger records.

use crate::domain::{Decimal, ParseEnumError, TimeMs, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Bonus or transaction name stored on a ledger record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BonusKind {
    #[serde(rename = "Matching Bonus")]
    Matching,
    #[serde(rename = "Referral Bonus")]
    Referral,
    #[serde(rename = "Direct Sales Bonus")]
    DirectSales,
    #[serde(rename = "Infinity Bonus")]
    Infinity,
    #[serde(rename = "Withdrawal")]
    Withdrawal,
}

impl BonusKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BonusKind::Matching => "Matching Bonus",
            BonusKind::Referral => "Referral Bonus",
            BonusKind::DirectSales => "Direct Sales Bonus",
            BonusKind::Infinity => "Infinity Bonus",
            BonusKind::Withdrawal => "Withdrawal",
        }
    }
}

impl fmt::Display for BonusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BonusKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Matching Bonus" => Ok(BonusKind::Matching),
            "Referral Bonus" => Ok(BonusKind::Referral),
            "Direct Sales Bonus" => Ok(BonusKind::DirectSales),
            "Infinity Bonus" => Ok(BonusKind::Infinity),
            "Withdrawal" => Ok(BonusKind::Withdrawal),
            _ => Err(ParseEnumError::new("bonus name", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionType {
    Credit,
    Debit,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Credit => "Credit",
            TransactionType::Debit => "Debit",
        }
    }
}

impl FromStr for TransactionType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Credit" => Ok(TransactionType::Credit),
            "Debit" => Ok(TransactionType::Debit),
            _ => Err(ParseEnumError::new("transaction type", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PayoutStatus {
    Pending,
    Completed,
    Failed,
    OnHold,
}

impl PayoutStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutStatus::Pending => "Pending",
            PayoutStatus::Completed => "Completed",
            PayoutStatus::Failed => "Failed",
            PayoutStatus::OnHold => "OnHold",
        }
    }

    /// Transitions reconciliation may apply. `OnHold -> Pending` belongs to
    /// hold release only.
    pub fn can_reconcile_to(&self, next: PayoutStatus) -> bool {
        matches!(
            (self, next),
            (PayoutStatus::Pending, PayoutStatus::Completed)
                | (PayoutStatus::Pending, PayoutStatus::Failed)
        )
    }
}

impl fmt::Display for PayoutStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PayoutStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(PayoutStatus::Pending),
            "Completed" => Ok(PayoutStatus::Completed),
            "Failed" => Ok(PayoutStatus::Failed),
            "OnHold" => Ok(PayoutStatus::OnHold),
            _ => Err(ParseEnumError::new("payout status", s)),
        }
    }
}

/// Bank and PAN fields copied onto a payout when it is created or released.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankSnapshot {
    pub account_number: Option<String>,
    pub ifsc: Option<String>,
    pub bank_name: Option<String>,
    pub pan_number: Option<String>,
    pub pan_verified: bool,
}

/// An append-only ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payout {
    pub payout_id: String,
    pub user_id: UserId,
    pub name: BonusKind,
    pub amount: Decimal,
    pub transaction_type: TransactionType,
    pub status: PayoutStatus,
    /// Originating order id or payout id for bonuses deduplicated per source.
    pub source_ref: Option<String>,
    pub left_users: Vec<UserId>,
    pub right_users: Vec<UserId>,
    pub bank: BankSnapshot,
    pub created_at: TimeMs,
}

impl Payout {
    pub fn credit(payout_id: String, user_id: UserId, name: BonusKind, amount: Decimal) -> Self {
        Self {
            payout_id,
            user_id,
            name,
            amount,
            transaction_type: TransactionType::Credit,
            status: PayoutStatus::Pending,
            source_ref: None,
            left_users: Vec::new(),
            right_users: Vec::new(),
            bank: BankSnapshot::default(),
            created_at: TimeMs::new(0),
        }
    }

    pub fn is_credit(&self) -> bool {
        self.transaction_type == TransactionType::Credit
    }

    /// Id of the `n`th lifetime matching unit paid to `user`.
    pub fn matching_id(user: &UserId, n: u64) -> String {
        format!("match:{}:{}", user, n)
    }

    /// Deterministic id for a bonus paid once per source (order or payout).
    ///
    /// Truncated SHA-256 over length-prefixed fields, so the same
    /// `(name, source_ref, user)` always derives the same id.
    pub fn sourced_id(name: BonusKind, source_ref: &str, user: &UserId) -> String {
        use sha2::{Digest, Sha256};

        fn hash_var(hasher: &mut Sha256, data: &str) {
            hasher.update((data.len() as u32).to_le_bytes());
            hasher.update(data.as_bytes());
        }

        let mut hasher = Sha256::new();
        hash_var(&mut hasher, name.as_str());
        hash_var(&mut hasher, source_ref);
        hash_var(&mut hasher, user.as_str());
        let hash = hasher.finalize();
        format!("bonus:{}", hex::encode(&hash[..16]))
    }
}
