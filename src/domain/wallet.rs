//! Per-user wallet with verification state.

use crate::domain::{AmountOverflow, BankSnapshot, Decimal, UserId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    pub user_id: UserId,
    pub balance: Decimal,
    pub total_earnings: Decimal,
    pub total_withdrawn: Decimal,
    pub pan_verified: bool,
    /// Verification metric consulted by the payout hold rule.
    pub pv: Decimal,
    pub pan_number: Option<String>,
    pub account_number: Option<String>,
    pub ifsc: Option<String>,
    pub bank_name: Option<String>,
    pub version: i64,
}

impl Wallet {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            balance: Decimal::zero(),
            total_earnings: Decimal::zero(),
            total_withdrawn: Decimal::zero(),
            pan_verified: false,
            pv: Decimal::zero(),
            pan_number: None,
            account_number: None,
            ifsc: None,
            bank_name: None,
            version: 0,
        }
    }

    /// Bank/PAN fields as they stand now, for stamping onto ledger records.
    pub fn snapshot(&self) -> BankSnapshot {
        BankSnapshot {
            account_number: self.account_number.clone(),
            ifsc: self.ifsc.clone(),
            bank_name: self.bank_name.clone(),
            pan_number: self.pan_number.clone(),
            pan_verified: self.pan_verified,
        }
    }

    /// Add a credit to balance and lifetime earnings; neither changes when
    /// either total would leave the representable range.
    pub fn credit(&mut self, amount: Decimal) -> Result<(), AmountOverflow> {
        let balance = self.balance.try_add(amount)?;
        let total_earnings = self.total_earnings.try_add(amount)?;
        self.balance = balance;
        self.total_earnings = total_earnings;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_credit_moves_balance_and_earnings() {
        let mut wallet = Wallet::new(UserId::new("U1"));
        wallet.credit(Decimal::from_str("500").unwrap()).unwrap();
        wallet.credit(Decimal::from_str("250.5").unwrap()).unwrap();
        assert_eq!(wallet.balance, Decimal::from_str("750.5").unwrap());
        assert_eq!(wallet.total_earnings, wallet.balance);
        assert!(wallet.total_withdrawn.is_zero());
    }

    #[test]
    fn test_credit_out_of_range_leaves_wallet_unchanged() {
        let big = Decimal::from_str("40000000000000000000000000000").unwrap();
        let mut wallet = Wallet::new(UserId::new("U1"));
        wallet.credit(big).unwrap();
        assert!(wallet.credit(big).is_err());
        assert_eq!(wallet.balance, big);
        assert_eq!(wallet.total_earnings, big);
    }

    #[test]
    fn test_snapshot_copies_bank_fields() {
        let mut wallet = Wallet::new(UserId::new("U1"));
        wallet.ifsc = Some("HDFC0001".to_string());
        wallet.pan_verified = true;
        let snap = wallet.snapshot();
        assert_eq!(snap.ifsc.as_deref(), Some("HDFC0001"));
        assert!(snap.pan_verified);
    }
}
