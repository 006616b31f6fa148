//! Purchase orders and their business-volume contribution.

use crate::domain::{AmountOverflow, Decimal, ParseEnumError, TimeMs, UserId};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// One purchased line; only its business volume matters to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub business_volume: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Placed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Placed => "placed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for OrderStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "placed" => Ok(OrderStatus::Placed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            _ => Err(ParseEnumError::new("order status", s)),
        }
    }
}

/// A purchase. Immutable after creation except for `status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub order_id: String,
    /// Beneficiary of the purchase.
    pub user_id: UserId,
    /// Who placed it; differs from `user_id` for assisted activations.
    pub placed_by: UserId,
    pub amount: Decimal,
    pub items: Vec<OrderItem>,
    pub payment_ref: Option<String>,
    pub status: OrderStatus,
    pub created_at: TimeMs,
}

impl Order {
    /// Total business volume across all line items.
    pub fn business_volume(&self) -> Result<Decimal, AmountOverflow> {
        Decimal::try_sum(self.items.iter().map(|item| item.business_volume))
    }

    pub fn is_assisted(&self) -> bool {
        self.placed_by != self.user_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(items: &[&str]) -> Order {
        Order {
            order_id: "ORD-1".to_string(),
            user_id: UserId::new("U1"),
            placed_by: UserId::new("U1"),
            amount: Decimal::from_str("2999").unwrap(),
            items: items
                .iter()
                .map(|bv| OrderItem {
                    business_volume: Decimal::from_str(bv).unwrap(),
                })
                .collect(),
            payment_ref: None,
            status: OrderStatus::Placed,
            created_at: TimeMs::new(0),
        }
    }

    #[test]
    fn test_business_volume_sums_items() {
        assert_eq!(
            order(&["100", "50.5", "0"]).business_volume().unwrap(),
            Decimal::from_str("150.5").unwrap()
        );
        assert!(order(&[]).business_volume().unwrap().is_zero());
    }

    #[test]
    fn test_business_volume_out_of_range_is_an_error() {
        let big = "40000000000000000000000000000";
        assert!(order(&[big, big]).business_volume().is_err());
    }

    #[test]
    fn test_assisted_order() {
        let mut o = order(&["10"]);
        assert!(!o.is_assisted());
        o.placed_by = UserId::new("ADMIN");
        assert!(o.is_assisted());
    }
}
