use crate::server::controller::error::CustomError;
use crate::server::model::user::UserId;
use crate::server::receipt::calculator::Computation;
use crate::server::receipt::money::{Money, MAX_INPUT_CENTS};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use validator::Validate;

pub(crate) type ReceiptId = i64;

/// Most line items a single receipt may carry. Also keeps one item insert well
/// below the bind parameter limit of a postgres statement.
pub(crate) const MAX_ITEMS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum PaymentMethod {
    Cash,
    Cashless,
}

impl PaymentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Cashless => "cashless",
        }
    }

    /// label printed on the fixed-width receipt
    pub fn text_label(self) -> &'static str {
        match self {
            PaymentMethod::Cash => "CASH",
            PaymentMethod::Cashless => "CASHLESS",
        }
    }

    /// label shown on the HTML receipt
    pub fn display_label(self) -> &'static str {
        match self {
            PaymentMethod::Cash => "Cash",
            PaymentMethod::Cashless => "Card",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cash" => Ok(Self::Cash),
            "cashless" => Ok(Self::Cashless),
            s => Err(format!("Invalid payment method: {s}")),
        }
    }
}

/// A purchased position as submitted by the client, before any totals exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LineItem {
    pub name: String,
    pub unit_price: Money,
    pub quantity: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Payment {
    pub method: PaymentMethod,
    pub amount_tendered: Money,
}

/// A persisted position, carrying the line total computed at creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ReceiptItem {
    pub name: String,
    pub unit_price: Money,
    pub quantity: u32,
    pub line_total: Money,
}

/// Validated input of a receipt creation.
#[derive(Debug, Clone)]
pub(crate) struct ReceiptDraft {
    pub items: Vec<LineItem>,
    pub payment: Payment,
}

/// Receipt ready to be persisted: totals are computed, the id is not yet assigned.
#[derive(Debug, Clone)]
pub(crate) struct NewReceipt {
    pub owner: UserId,
    pub created_at: DateTime<Utc>,
    pub items: Vec<ReceiptItem>,
    pub payment: Payment,
    pub total: Money,
    pub change: Money,
}

impl NewReceipt {
    pub fn new(
        owner: UserId,
        created_at: DateTime<Utc>,
        draft: ReceiptDraft,
        computation: Computation,
    ) -> Self {
        let items = draft
            .items
            .into_iter()
            .zip(computation.item_totals)
            .map(|(item, line_total)| ReceiptItem {
                name: item.name,
                unit_price: item.unit_price,
                quantity: item.quantity,
                line_total,
            })
            .collect();
        Self {
            owner,
            created_at,
            items,
            payment: draft.payment,
            total: computation.total,
            change: computation.change,
        }
    }

    pub fn into_receipt(self, id: ReceiptId) -> Receipt {
        Receipt {
            id,
            owner: self.owner,
            created_at: self.created_at,
            items: self.items,
            payment: self.payment,
            total: self.total,
            change: self.change,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Receipt {
    pub id: ReceiptId,
    pub owner: UserId,
    pub created_at: DateTime<Utc>,
    pub items: Vec<ReceiptItem>,
    pub payment: Payment,
    pub total: Money,
    pub change: Money,
}

/// Optional constraints of an owner-scoped receipt listing. Bounds are inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ReceiptFilter {
    pub payment_method: Option<PaymentMethod>,
    pub created_at_from: Option<DateTime<Utc>>,
    pub created_at_to: Option<DateTime<Utc>>,
    pub amount_from: Option<Money>,
    pub amount_to: Option<Money>,
}

impl ReceiptFilter {
    pub fn matches(&self, receipt: &Receipt) -> bool {
        self.payment_method.map_or(true, |m| receipt.payment.method == m)
            && self.created_at_from.map_or(true, |from| receipt.created_at >= from)
            && self.created_at_to.map_or(true, |to| receipt.created_at <= to)
            && self
                .amount_from
                .map_or(true, |from| receipt.payment.amount_tendered >= from)
            && self
                .amount_to
                .map_or(true, |to| receipt.payment.amount_tendered <= to)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Page {
    pub page: u32,
    pub per_page: u32,
}

impl Page {
    pub fn offset(&self) -> u64 {
        u64::from(self.page) * u64::from(self.per_page)
    }
}

// ---- wire types ----

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LineItemRequest {
    #[validate(length(min = 1, max = 255, message = "name must be 1 to 255 characters"))]
    pub name: String,
    #[serde(alias = "price")]
    pub unit_price: Money,
    #[validate(range(min = 1, max = 1000000, message = "quantity must be between 1 and 1000000"))]
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PaymentRequest {
    #[serde(alias = "method", alias = "type")]
    pub payment_method: PaymentMethod,
    #[serde(alias = "amount")]
    pub amount_tendered: Money,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PostReceiptRequest {
    #[serde(alias = "products")]
    pub items: Vec<LineItemRequest>,
    pub payment: PaymentRequest,
}

fn check_amount(field: &str, amount: Money) -> Result<Money, CustomError> {
    if amount.is_negative() {
        return Err(CustomError::invalid(format!("{field} must not be negative")));
    }
    if amount.cents() > MAX_INPUT_CENTS {
        return Err(CustomError::invalid(format!(
            "{field} must have at most 10 digits"
        )));
    }
    Ok(amount)
}

impl TryFrom<PostReceiptRequest> for ReceiptDraft {
    type Error = CustomError;

    fn try_from(req: PostReceiptRequest) -> Result<Self, Self::Error> {
        if req.items.is_empty() {
            return Err(CustomError::invalid("items: at least one item is required"));
        }
        if req.items.len() > MAX_ITEMS {
            return Err(CustomError::invalid(format!(
                "items: at most {MAX_ITEMS} items are allowed, got {}",
                req.items.len()
            )));
        }
        let items = req
            .items
            .into_iter()
            .enumerate()
            .map(|(i, item)| -> Result<LineItem, CustomError> {
                item.validate()
                    .map_err(|e| CustomError::invalid(format!("items[{i}]: {e}")))?;
                Ok(LineItem {
                    unit_price: check_amount(&format!("items[{i}].unitPrice"), item.unit_price)?,
                    name: item.name,
                    quantity: item.quantity,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ReceiptDraft {
            items,
            payment: Payment {
                method: req.payment.payment_method,
                amount_tendered: check_amount(
                    "payment.amountTendered",
                    req.payment.amount_tendered,
                )?,
            },
        })
    }
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LineItemResponse {
    pub name: String,
    pub unit_price: Money,
    pub quantity: u32,
    pub line_total: Money,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub(crate) struct PaymentResponse {
    pub method: PaymentMethod,
    pub amount: Money,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ReceiptLinks {
    pub html: String,
    pub txt: String,
    pub qr_code: String,
}

impl ReceiptLinks {
    pub fn new(base_url: &str, id: ReceiptId) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            html: format!("{base}/{id}/html"),
            txt: format!("{base}/{id}/txt"),
            qr_code: format!("{base}/{id}/qr-code"),
        }
    }
}

/// Structured view of a receipt.
#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ReceiptResponse {
    pub id: ReceiptId,
    pub items: Vec<LineItemResponse>,
    pub payment: PaymentResponse,
    pub total: Money,
    pub change: Money,
    pub created_at: DateTime<Utc>,
    pub links: ReceiptLinks,
}

#[derive(Debug, Serialize)]
pub(crate) struct GetReceiptsResponse {
    pub entries: Vec<ReceiptResponse>,
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ListReceiptsQuery {
    #[serde(alias = "payment_type")]
    pub payment_method: Option<PaymentMethod>,
    #[serde(alias = "createdAtFrom")]
    pub created_at_from: Option<DateTime<Utc>>,
    #[serde(alias = "createdAtTo")]
    pub created_at_to: Option<DateTime<Utc>>,
    #[serde(alias = "paymentAmountFrom")]
    pub amount_from: Option<Money>,
    #[serde(alias = "paymentAmountTo")]
    pub amount_to: Option<Money>,
    #[serde(default)]
    pub page: u32,
    #[serde(default = "default_per_page")]
    #[validate(range(min = 1, max = 100, message = "per_page must be between 1 and 100"))]
    pub per_page: u32,
}

fn default_per_page() -> u32 {
    10
}

impl ListReceiptsQuery {
    pub fn into_parts(self) -> Result<(ReceiptFilter, Page), CustomError> {
        self.validate()?;
        Ok((
            ReceiptFilter {
                payment_method: self.payment_method,
                created_at_from: self.created_at_from,
                created_at_to: self.created_at_to,
                amount_from: self.amount_from,
                amount_to: self.amount_to,
            },
            Page {
                page: self.page,
                per_page: self.per_page,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(json: serde_json::Value) -> PostReceiptRequest {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn draft_from_request() {
        let draft = ReceiptDraft::try_from(request(serde_json::json!({
            "items": [{"name": "Mavic 3T", "unitPrice": 298870.50, "quantity": 3}],
            "payment": {"paymentMethod": "cash", "amountTendered": "896611.50"},
        })))
        .unwrap();
        assert_eq!(
            draft.items,
            vec![LineItem {
                name: "Mavic 3T".to_string(),
                unit_price: Money::from_cents(29_887_050),
                quantity: 3,
            }]
        );
        assert_eq!(draft.payment.method, PaymentMethod::Cash);
        assert_eq!(draft.payment.amount_tendered, Money::from_cents(89_661_150));
    }

    #[test]
    fn draft_accepts_legacy_field_names() {
        let draft = ReceiptDraft::try_from(request(serde_json::json!({
            "products": [{"name": "Tea", "price": 1.5, "quantity": 2}],
            "payment": {"type": "cashless", "amount": 3},
        })))
        .unwrap();
        assert_eq!(draft.items[0].unit_price, Money::from_cents(150));
        assert_eq!(draft.payment.method, PaymentMethod::Cashless);
    }

    #[test]
    fn draft_rejects_invalid_input() {
        let cases = [
            serde_json::json!({"items": [], "payment": {"method": "cash", "amount": 1}}),
            serde_json::json!({
                "items": [{"name": "Tea", "price": 1, "quantity": 0}],
                "payment": {"method": "cash", "amount": 1},
            }),
            serde_json::json!({
                "items": [{"name": "", "price": 1, "quantity": 1}],
                "payment": {"method": "cash", "amount": 1},
            }),
            serde_json::json!({
                "items": [{"name": "Tea", "price": -1, "quantity": 1}],
                "payment": {"method": "cash", "amount": 1},
            }),
            serde_json::json!({
                "items": [{"name": "Tea", "price": "100000000.00", "quantity": 1}],
                "payment": {"method": "cash", "amount": 1},
            }),
        ];
        for case in cases {
            let result = ReceiptDraft::try_from(request(case));
            assert!(
                matches!(result, Err(CustomError::InvalidInput { .. })),
                "{result:?}"
            );
        }
    }

    #[test]
    fn draft_caps_the_item_count() {
        let items = |count: usize| {
            serde_json::json!({
                "items": vec![serde_json::json!({"name": "Tea", "price": 1, "quantity": 1}); count],
                "payment": {"method": "cash", "amount": 5000},
            })
        };
        let draft = ReceiptDraft::try_from(request(items(MAX_ITEMS))).unwrap();
        assert_eq!(draft.items.len(), MAX_ITEMS);

        match ReceiptDraft::try_from(request(items(MAX_ITEMS + 1))) {
            Err(CustomError::InvalidInput { reason }) => {
                assert_eq!(reason, "items: at most 1000 items are allowed, got 1001")
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn unknown_payment_method_does_not_parse() {
        let result = serde_json::from_value::<PostReceiptRequest>(serde_json::json!({
            "items": [{"name": "Tea", "price": 1, "quantity": 1}],
            "payment": {"method": "crypto", "amount": 1},
        }));
        assert!(result.is_err());
        assert!("crypto".parse::<PaymentMethod>().is_err());
        assert_eq!("cashless".parse::<PaymentMethod>(), Ok(PaymentMethod::Cashless));
    }

    #[test]
    fn links_are_built_from_base_url() {
        let links = ReceiptLinks::new("http://localhost:8080/", 42);
        assert_eq!(links.html, "http://localhost:8080/42/html");
        assert_eq!(links.txt, "http://localhost:8080/42/txt");
        assert_eq!(links.qr_code, "http://localhost:8080/42/qr-code");
    }

    #[test]
    fn list_query_bounds_per_page() {
        let query: ListReceiptsQuery = serde_json::from_value(serde_json::json!({
            "per_page": 101
        }))
        .unwrap();
        assert!(query.into_parts().is_err());

        let query: ListReceiptsQuery = serde_json::from_value(serde_json::json!({})).unwrap();
        let (filter, page) = query.into_parts().unwrap();
        assert_eq!(filter, ReceiptFilter::default());
        assert_eq!(page, Page { page: 0, per_page: 10 });
    }
}
