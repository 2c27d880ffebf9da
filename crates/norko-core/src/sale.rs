//! # Sale Drafts
//!
//! A sale as recorded at the register, before the server has seen it.
//!
//! The draft serializes to exactly the body `POST /api/sales` expects, so the
//! queued payload can be replayed verbatim once connectivity returns.
//!
//! ```text
//! SaleDraft ──validate──► into_payload() ──► PendingOperation{create_sale}
//!                                                   │
//!                                                   ▼ (online)
//!                                            POST /api/sales
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::CoreResult;
use crate::validation::validate_sale_draft;

/// How the customer pays.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum PaymentType {
    /// Paid in full at the register.
    #[default]
    Cash,
    /// Charged to a customer account, optionally with a down payment.
    Credit,
}

/// A single line of a sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleItemDraft {
    pub product_id: i64,
    /// Fractional for goods sold by weight.
    pub quantity: f64,
    pub unit_price: f64,
    pub total_price: f64,
}

impl SaleItemDraft {
    /// Line with `total_price` derived from quantity and unit price.
    pub fn new(product_id: i64, quantity: f64, unit_price: f64) -> Self {
        SaleItemDraft {
            product_id,
            quantity,
            unit_price,
            total_price: round_cents(unit_price * quantity),
        }
    }
}

/// A sale awaiting submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleDraft {
    /// Required for credit sales, ignored by the server for cash sales.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<i64>,

    pub items: Vec<SaleItemDraft>,

    #[serde(default)]
    pub payment_type: PaymentType,

    #[serde(default)]
    pub paid_amount: f64,

    pub total_amount: f64,

    #[serde(default)]
    pub notes: String,

    /// When the sale happened at the register, if different from submission.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(as = "Option<String>")]
    pub sale_date: Option<DateTime<Utc>>,
}

impl SaleDraft {
    /// Cash sale with the total computed from its lines.
    pub fn cash(items: Vec<SaleItemDraft>) -> Self {
        let total_amount = round_cents(items.iter().map(|i| i.total_price).sum());
        SaleDraft {
            customer_id: None,
            items,
            payment_type: PaymentType::Cash,
            paid_amount: total_amount,
            total_amount,
            notes: String::new(),
            sale_date: None,
        }
    }

    /// Credit sale charged to `customer_id`.
    pub fn credit(customer_id: i64, items: Vec<SaleItemDraft>, paid_amount: f64) -> Self {
        let mut draft = Self::cash(items);
        draft.customer_id = Some(customer_id);
        draft.payment_type = PaymentType::Credit;
        draft.paid_amount = paid_amount;
        draft
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    pub fn with_sale_date(mut self, at: DateTime<Utc>) -> Self {
        self.sale_date = Some(at);
        self
    }

    /// Validates the draft and encodes it as a `create_sale` payload.
    pub fn into_payload(self) -> CoreResult<serde_json::Value> {
        validate_sale_draft(&self)?;
        Ok(serde_json::to_value(self)?)
    }
}

/// Rounds a currency amount to two decimals.
pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CoreError, ValidationError};

    #[test]
    fn test_cash_sale_payload_shape() {
        let draft = SaleDraft::cash(vec![
            SaleItemDraft::new(7, 2.0, 1.25),
            SaleItemDraft::new(9, 1.0, 10.0),
        ])
        .with_notes("table 4");

        assert_eq!(draft.total_amount, 12.5);
        let payload = draft.into_payload().unwrap();

        assert_eq!(payload["payment_type"], "cash");
        assert_eq!(payload["total_amount"], 12.5);
        assert_eq!(payload["items"][0]["product_id"], 7);
        assert_eq!(payload["items"][0]["total_price"], 2.5);
        assert_eq!(payload["notes"], "table 4");
        assert!(payload.get("customer_id").is_none());
        assert!(payload.get("sale_date").is_none());
    }

    #[test]
    fn test_credit_sale_keeps_customer() {
        let payload = SaleDraft::credit(42, vec![SaleItemDraft::new(1, 3.0, 2.0)], 1.5)
            .into_payload()
            .unwrap();
        assert_eq!(payload["payment_type"], "credit");
        assert_eq!(payload["customer_id"], 42);
        assert_eq!(payload["paid_amount"], 1.5);
    }

    #[test]
    fn test_invalid_draft_is_not_encoded() {
        let err = SaleDraft::cash(vec![]).into_payload().unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::Required { ref field }) if field == "items"
        ));
    }

    #[test]
    fn test_weighed_item_quantity() {
        let payload = SaleDraft::cash(vec![SaleItemDraft::new(3, 0.75, 4.0)])
            .into_payload()
            .unwrap();
        assert_eq!(payload["items"][0]["quantity"], 0.75);
        assert_eq!(payload["total_amount"], 3.0);
    }

    #[test]
    fn test_round_cents() {
        assert_eq!(round_cents(0.1 + 0.2), 0.3);
        assert_eq!(round_cents(3.0 * 1.1), 3.3);
    }
}
