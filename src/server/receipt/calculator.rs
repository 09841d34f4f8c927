//! Receipt totals: line totals, grand total and change.

use crate::server::model::receipt::{LineItem, Payment, Receipt};
use crate::server::receipt::money::Money;
use derive_more::{Display, Error};
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Computation {
    /// line totals, in item order
    pub item_totals: Vec<Money>,
    pub total: Money,
    pub change: Money,
}

#[derive(Debug, Display, Error, PartialEq, Eq)]
pub(crate) enum CalculationError {
    #[display("at least one item is required")]
    NoItems,
    #[display("payment of {tendered} does not cover the total of {total}")]
    InsufficientPayment { total: Money, tendered: Money },
    #[display("amount exceeds the supported range")]
    Overflow,
    #[display("computed total is negative")]
    NegativeTotal,
}

/// Computes the totals of a receipt, failing when the payment does not cover them.
pub(crate) fn compute(items: &[LineItem], payment: &Payment) -> Result<Computation, CalculationError> {
    if items.is_empty() {
        return Err(CalculationError::NoItems);
    }
    let item_totals = items
        .iter()
        .map(|item| item.unit_price.multiply(item.quantity))
        .collect::<Option<Vec<_>>>()
        .ok_or(CalculationError::Overflow)?;
    let total = Money::sum(item_totals.iter().copied()).ok_or(CalculationError::Overflow)?;
    if total.is_negative() {
        return Err(CalculationError::NegativeTotal);
    }
    let change = payment
        .amount_tendered
        .subtract(total)
        .ok_or(CalculationError::Overflow)?;
    if change.compare(Money::ZERO) == Ordering::Less {
        return Err(CalculationError::InsufficientPayment {
            total,
            tendered: payment.amount_tendered,
        });
    }
    Ok(Computation {
        item_totals,
        total,
        change,
    })
}

#[derive(Debug, Display, Error, PartialEq, Eq)]
pub(crate) enum Inconsistency {
    #[display("item {index} stores line total {stored}, expected {expected}")]
    LineTotal { index: usize, stored: Money, expected: Money },
    #[display("stored total {stored}, expected {expected}")]
    Total { stored: Money, expected: Money },
    #[display("stored change {stored}, expected {expected}")]
    Change { stored: Money, expected: Money },
    #[display("stored amounts overflow")]
    Overflow,
}

/// Recomputes the derived amounts of a persisted receipt and reports the first mismatch.
pub(crate) fn verify(receipt: &Receipt) -> Result<(), Inconsistency> {
    for (index, item) in receipt.items.iter().enumerate() {
        let expected = item
            .unit_price
            .multiply(item.quantity)
            .ok_or(Inconsistency::Overflow)?;
        if expected != item.line_total {
            return Err(Inconsistency::LineTotal {
                index,
                stored: item.line_total,
                expected,
            });
        }
    }
    let expected = Money::sum(receipt.items.iter().map(|item| item.line_total))
        .ok_or(Inconsistency::Overflow)?;
    if expected != receipt.total {
        return Err(Inconsistency::Total {
            stored: receipt.total,
            expected,
        });
    }
    let expected = receipt
        .payment
        .amount_tendered
        .subtract(receipt.total)
        .ok_or(Inconsistency::Overflow)?;
    if expected != receipt.change {
        return Err(Inconsistency::Change {
            stored: receipt.change,
            expected,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::model::receipt::{PaymentMethod, ReceiptItem};
    use chrono::{DateTime, Utc};

    fn item(name: &str, price: &str, quantity: u32) -> LineItem {
        LineItem {
            name: name.to_string(),
            unit_price: price.parse().unwrap(),
            quantity,
        }
    }

    fn cash(amount: &str) -> Payment {
        Payment {
            method: PaymentMethod::Cash,
            amount_tendered: amount.parse().unwrap(),
        }
    }

    #[test]
    fn computes_totals_and_change() {
        let items = [item("Mavic 3T", "298870.50", 3)];
        let result = compute(&items, &cash("896611.50")).unwrap();
        assert_eq!(result.item_totals, vec![Money::from_cents(89_661_150)]);
        assert_eq!(result.total, Money::from_cents(89_661_150));
        assert_eq!(result.change, Money::ZERO);
    }

    #[test]
    fn sums_without_float_drift() {
        // 0.1 + 0.2 + 0.7 is not 1.0 in binary floating point
        let items = [item("a", "0.10", 1), item("b", "0.20", 1), item("c", "0.70", 1)];
        let result = compute(&items, &cash("5")).unwrap();
        assert_eq!(result.total, Money::from_cents(100));
        assert_eq!(result.change, Money::from_cents(400));

        let items = [item("d", "19.99", 7), item("e", "0.01", 13), item("f", "0", 4)];
        let result = compute(&items, &cash("140.06")).unwrap();
        assert_eq!(
            result.item_totals,
            vec![Money::from_cents(13_993), Money::from_cents(13), Money::ZERO]
        );
        assert_eq!(result.total, Money::from_cents(14_006));
        assert_eq!(result.change, Money::ZERO);
    }

    #[test]
    fn rejects_insufficient_payment() {
        let items = [item("Tea", "10.00", 2)];
        assert_eq!(
            compute(&items, &cash("19.99")),
            Err(CalculationError::InsufficientPayment {
                total: Money::from_cents(2000),
                tendered: Money::from_cents(1999),
            })
        );
    }

    #[test]
    fn rejects_empty_and_overflowing_input() {
        assert_eq!(compute(&[], &cash("1")), Err(CalculationError::NoItems));
        let items = [LineItem {
            name: "huge".to_string(),
            unit_price: Money::from_cents(i64::MAX / 2),
            quantity: 3,
        }];
        assert_eq!(compute(&items, &cash("1")), Err(CalculationError::Overflow));
    }

    #[test]
    fn verify_detects_tampered_change() {
        let mut receipt = Receipt {
            id: 1,
            owner: 1,
            created_at: DateTime::<Utc>::from_timestamp(0, 0).unwrap(),
            items: vec![ReceiptItem {
                name: "Tea".to_string(),
                unit_price: Money::from_cents(150),
                quantity: 2,
                line_total: Money::from_cents(300),
            }],
            payment: cash("5.00"),
            total: Money::from_cents(300),
            change: Money::from_cents(200),
        };
        assert_eq!(verify(&receipt), Ok(()));

        receipt.change = Money::from_cents(250);
        assert_eq!(
            verify(&receipt),
            Err(Inconsistency::Change {
                stored: Money::from_cents(250),
                expected: Money::from_cents(200),
            })
        );
    }
}
