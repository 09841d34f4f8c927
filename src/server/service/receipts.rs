use crate::server::controller::error::CustomError;
use crate::server::database::{ReceiptStore, UserStore};
use crate::server::model::receipt::{NewReceipt, Page, Receipt, ReceiptDraft, ReceiptFilter, ReceiptId};
use crate::server::model::user::UserId;
use crate::server::receipt::calculator;
use crate::server::util::time;
use log::{info, warn};

/// Computes the totals of `draft` and persists it for `owner`.
///
/// Nothing is stored when the computation fails, e.g. on an insufficient payment.
pub(crate) async fn create_receipt<S: ReceiptStore>(
    store: &S,
    owner: UserId,
    draft: ReceiptDraft,
) -> Result<Receipt, CustomError> {
    let computation = calculator::compute(&draft.items, &draft.payment)?;
    let new_receipt = NewReceipt::new(owner, time::helper::get_utc_now(), draft, computation);
    let receipt = store.insert_receipt(new_receipt).await?;
    info!(
        "receipt created, id={} owner={} total={}",
        receipt.id, receipt.owner, receipt.total
    );
    Ok(receipt)
}

/// Loads a receipt, scoped to `owner` when given. Foreign receipts are reported as missing.
pub(crate) async fn find_receipt<S: ReceiptStore>(
    store: &S,
    id: ReceiptId,
    owner: Option<UserId>,
) -> Result<Receipt, CustomError> {
    let receipt = store
        .find_receipt(id, owner)
        .await?
        .ok_or_else(|| CustomError::receipt_not_found(id))?;
    if let Err(e) = calculator::verify(&receipt) {
        warn!("stored receipt {} is inconsistent, {}", id, e);
    }
    Ok(receipt)
}

pub(crate) async fn list_receipts<S: ReceiptStore>(
    store: &S,
    owner: UserId,
    filter: &ReceiptFilter,
    page: Page,
) -> Result<(Vec<Receipt>, u64), CustomError> {
    Ok(store.list_receipts(owner, filter, page).await?)
}

/// Loads a receipt for a public view together with the business name printed on it.
pub(crate) async fn find_printable<S: ReceiptStore + UserStore>(
    store: &S,
    id: ReceiptId,
) -> Result<(Receipt, String), CustomError> {
    let receipt = find_receipt(store, id, None).await?;
    let business_name = match store.find_user_by_id(receipt.owner).await? {
        Some(user) => user.business_name,
        None => {
            warn!("owner {} of receipt {} does not exist", receipt.owner, id);
            String::new()
        }
    };
    Ok((receipt, business_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::database::memory::MemoryStore;
    use crate::server::model::receipt::{LineItem, Payment, PaymentMethod};
    use crate::server::model::user::NewUser;
    use crate::server::receipt::money::Money;

    fn draft(tendered: i64) -> ReceiptDraft {
        ReceiptDraft {
            items: vec![LineItem {
                name: "Mavic 3T".to_string(),
                unit_price: Money::from_cents(29_887_050),
                quantity: 3,
            }],
            payment: Payment {
                method: PaymentMethod::Cash,
                amount_tendered: Money::from_cents(tendered),
            },
        }
    }

    #[tokio::test]
    async fn creates_and_reads_back() {
        time::helper::set_utc_now(1_731_380_400);
        let store = MemoryStore::default();
        let receipt = create_receipt(&store, 7, draft(89_661_150)).await.unwrap();
        assert_eq!(receipt.total, Money::from_cents(89_661_150));
        assert_eq!(receipt.change, Money::ZERO);
        assert_eq!(receipt.created_at.timestamp(), 1_731_380_400);

        let found = find_receipt(&store, receipt.id, Some(7)).await.unwrap();
        assert_eq!(found, receipt);
        assert!(matches!(
            find_receipt(&store, receipt.id, Some(8)).await,
            Err(CustomError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn insufficient_payment_is_not_persisted() {
        let store = MemoryStore::default();
        let result = create_receipt(&store, 7, draft(89_661_149)).await;
        assert!(matches!(
            result,
            Err(CustomError::InsufficientPayment { .. })
        ));
        let (entries, total) =
            list_receipts(&store, 7, &ReceiptFilter::default(), Page { page: 0, per_page: 10 })
                .await
                .unwrap();
        assert!(entries.is_empty());
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn printable_carries_business_name() {
        let store = MemoryStore::default();
        let user = store
            .insert_user(NewUser {
                username: "markus".to_string(),
                email: "markus@example.com".to_string(),
                password_hash: "hash".to_string(),
                business_name: "FOP Markus".to_string(),
                created_at: time::helper::get_utc_now(),
            })
            .await
            .unwrap();
        let receipt = create_receipt(&store, user.id, draft(90_000_000)).await.unwrap();
        let (found, business_name) = find_printable(&store, receipt.id).await.unwrap();
        assert_eq!(found.id, receipt.id);
        assert_eq!(business_name, "FOP Markus");
        assert!(find_printable(&store, 99999).await.is_err());
    }
}
