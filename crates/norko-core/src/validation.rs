//! # Validation Module
//!
//! Business rules a sale must satisfy before it is queued.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Register UI                                                  │
//! │  └── Immediate user feedback                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  └── Rejects drafts the server would refuse with 400                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Store server                                                 │
//! │  └── Stock availability, customer existence                            │
//! │                                                                         │
//! │  A draft that fails here is never queued, so it can never burn         │
//! │  retries against the server.                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::sale::{PaymentType, SaleDraft, SaleItemDraft};
use crate::MAX_SALE_NOTES_LEN;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Tolerance when comparing currency amounts.
const AMOUNT_EPSILON: f64 = 0.005;

// =============================================================================
// Sale Validators
// =============================================================================

/// Validates a whole sale draft.
///
/// ## Rules
/// - At least one line
/// - Every line valid (see [`validate_sale_item`])
/// - `total_amount` equals the sum of line totals
/// - `paid_amount` not negative
/// - Credit sales name a customer
/// - Notes at most 500 characters
///
/// ## Example
/// ```rust
/// use norko_core::{SaleDraft, SaleItemDraft};
/// use norko_core::validation::validate_sale_draft;
///
/// let draft = SaleDraft::cash(vec![SaleItemDraft::new(1, 2.0, 3.5)]);
/// assert!(validate_sale_draft(&draft).is_ok());
/// assert!(validate_sale_draft(&SaleDraft::cash(vec![])).is_err());
/// ```
pub fn validate_sale_draft(draft: &SaleDraft) -> ValidationResult<()> {
    if draft.items.is_empty() {
        return Err(ValidationError::Required {
            field: "items".to_string(),
        });
    }

    for (index, item) in draft.items.iter().enumerate() {
        validate_sale_item(index, item)?;
    }

    if draft.total_amount < 0.0 || !draft.total_amount.is_finite() {
        return Err(ValidationError::MustNotBeNegative {
            field: "total_amount".to_string(),
        });
    }

    let lines_total: f64 = draft.items.iter().map(|i| i.total_price).sum();
    if (lines_total - draft.total_amount).abs() > AMOUNT_EPSILON {
        return Err(ValidationError::Inconsistent {
            field: "total_amount".to_string(),
            reason: format!(
                "{:.2} does not match line total {:.2}",
                draft.total_amount, lines_total
            ),
        });
    }

    if draft.paid_amount < 0.0 || !draft.paid_amount.is_finite() {
        return Err(ValidationError::MustNotBeNegative {
            field: "paid_amount".to_string(),
        });
    }

    if draft.payment_type == PaymentType::Credit && draft.customer_id.is_none() {
        return Err(ValidationError::Required {
            field: "customer_id".to_string(),
        });
    }

    if draft.notes.chars().count() > MAX_SALE_NOTES_LEN {
        return Err(ValidationError::TooLong {
            field: "notes".to_string(),
            max: MAX_SALE_NOTES_LEN,
        });
    }

    Ok(())
}

/// Validates one line; `index` only feeds the error's field path.
pub fn validate_sale_item(index: usize, item: &SaleItemDraft) -> ValidationResult<()> {
    let field = |name: &str| format!("items[{}].{}", index, name);

    if item.product_id <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field("product_id"),
        });
    }

    if !(item.quantity > 0.0 && item.quantity.is_finite()) {
        return Err(ValidationError::MustBePositive {
            field: field("quantity"),
        });
    }

    if item.unit_price < 0.0 || !item.unit_price.is_finite() {
        return Err(ValidationError::MustNotBeNegative {
            field: field("unit_price"),
        });
    }

    let expected = item.unit_price * item.quantity;
    if (expected - item.total_price).abs() > AMOUNT_EPSILON {
        return Err(ValidationError::Inconsistent {
            field: field("total_price"),
            reason: format!("expected {:.2}, got {:.2}", expected, item.total_price),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line() -> SaleItemDraft {
        SaleItemDraft::new(1, 2.0, 4.0)
    }

    #[test]
    fn test_valid_cash_sale() {
        let draft = SaleDraft::cash(vec![line(), SaleItemDraft::new(2, 1.0, 0.99)]);
        assert!(validate_sale_draft(&draft).is_ok());
    }

    #[test]
    fn test_credit_requires_customer() {
        let mut draft = SaleDraft::credit(5, vec![line()], 0.0);
        assert!(validate_sale_draft(&draft).is_ok());

        draft.customer_id = None;
        assert_eq!(
            validate_sale_draft(&draft),
            Err(ValidationError::Required {
                field: "customer_id".to_string()
            })
        );
    }

    #[test]
    fn test_line_errors_name_the_line() {
        let mut bad = line();
        bad.quantity = 0.0;
        let draft = SaleDraft::cash(vec![line(), bad]);
        assert_eq!(
            validate_sale_draft(&draft),
            Err(ValidationError::MustBePositive {
                field: "items[1].quantity".to_string()
            })
        );
    }

    #[test]
    fn test_fractional_quantity_must_be_positive_and_finite() {
        assert!(validate_sale_item(0, &SaleItemDraft::new(1, 1.5, 2.0)).is_ok());

        for quantity in [-0.5, f64::NAN, f64::INFINITY] {
            let mut item = line();
            item.quantity = quantity;
            assert_eq!(
                validate_sale_item(0, &item),
                Err(ValidationError::MustBePositive {
                    field: "items[0].quantity".to_string()
                })
            );
        }
    }

    #[test]
    fn test_totals_must_agree() {
        let mut draft = SaleDraft::cash(vec![line()]);
        draft.total_amount = 9.0;
        assert!(matches!(
            validate_sale_draft(&draft),
            Err(ValidationError::Inconsistent { ref field, .. }) if field == "total_amount"
        ));

        let mut item = line();
        item.total_price = 1.0;
        assert!(matches!(
            validate_sale_item(0, &item),
            Err(ValidationError::Inconsistent { .. })
        ));
    }

    #[test]
    fn test_notes_length() {
        let draft = SaleDraft::cash(vec![line()]).with_notes("x".repeat(501));
        assert!(matches!(
            validate_sale_draft(&draft),
            Err(ValidationError::TooLong { max: 500, .. })
        ));
    }
}
