use crate::server::database::{ReceiptStore, StoreError, UserStore};
use crate::server::model::receipt::{NewReceipt, Page, Receipt, ReceiptFilter, ReceiptId};
use crate::server::model::user::{NewUser, User, UserId};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct Tables {
    users: BTreeMap<UserId, User>,
    receipts: BTreeMap<ReceiptId, Receipt>,
    next_user_id: UserId,
    next_receipt_id: ReceiptId,
}

/// Process-local store, used by tests and for running without a database.
#[derive(Default)]
pub(crate) struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    fn tables(&self) -> MutexGuard<'_, Tables> {
        // every mutation completes before the guard drops, so a poisoned lock still
        // holds consistent data
        self.tables.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl ReceiptStore for MemoryStore {
    async fn insert_receipt(&self, receipt: NewReceipt) -> Result<Receipt, StoreError> {
        let mut tables = self.tables();
        tables.next_receipt_id += 1;
        let receipt = receipt.into_receipt(tables.next_receipt_id);
        tables.receipts.insert(receipt.id, receipt.clone());
        Ok(receipt)
    }

    async fn find_receipt(
        &self,
        id: ReceiptId,
        owner: Option<UserId>,
    ) -> Result<Option<Receipt>, StoreError> {
        Ok(self
            .tables()
            .receipts
            .get(&id)
            .filter(|r| owner.map_or(true, |owner| r.owner == owner))
            .cloned())
    }

    async fn list_receipts(
        &self,
        owner: UserId,
        filter: &ReceiptFilter,
        page: Page,
    ) -> Result<(Vec<Receipt>, u64), StoreError> {
        let tables = self.tables();
        let matching: Vec<&Receipt> = tables
            .receipts
            .values()
            .filter(|r| r.owner == owner && filter.matches(r))
            .collect();
        let total = matching.len() as u64;
        let entries = matching
            .into_iter()
            .skip(usize::try_from(page.offset()).unwrap_or(usize::MAX))
            .take(page.per_page as usize)
            .cloned()
            .collect();
        Ok((entries, total))
    }
}

impl UserStore for MemoryStore {
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut tables = self.tables();
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict {
                reason: "user with this email already exists".to_string(),
            });
        }
        tables.next_user_id += 1;
        let user = user.into_user(tables.next_user_id);
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .tables()
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn find_user_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.tables().users.get(&id).cloned())
    }

    async fn update_refresh_token(
        &self,
        id: UserId,
        token: Option<&str>,
    ) -> Result<(), StoreError> {
        if let Some(user) = self.tables().users.get_mut(&id) {
            user.refresh_token = token.map(str::to_string);
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::model::receipt::{Payment, PaymentMethod, ReceiptItem};
    use crate::server::receipt::money::Money;
    use chrono::{DateTime, Utc};

    fn new_user(email: &str) -> NewUser {
        NewUser {
            username: "markus".to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            business_name: "FOP Markus".to_string(),
            created_at: DateTime::<Utc>::from_timestamp(0, 0).unwrap(),
        }
    }

    fn new_receipt(owner: UserId, method: PaymentMethod, tendered: i64) -> NewReceipt {
        NewReceipt {
            owner,
            created_at: DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap(),
            items: vec![ReceiptItem {
                name: "Tea".to_string(),
                unit_price: Money::from_cents(100),
                quantity: 1,
                line_total: Money::from_cents(100),
            }],
            payment: Payment {
                method,
                amount_tendered: Money::from_cents(tendered),
            },
            total: Money::from_cents(100),
            change: Money::from_cents(tendered - 100),
        }
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let store = MemoryStore::default();
        let user = store.insert_user(new_user("a@b.com")).await.unwrap();
        assert_eq!(user.id, 1);
        assert!(matches!(
            store.insert_user(new_user("a@b.com")).await,
            Err(StoreError::Conflict { .. })
        ));
        assert_eq!(
            store.find_user_by_email("a@b.com").await.unwrap().map(|u| u.id),
            Some(1)
        );
    }

    #[tokio::test]
    async fn refresh_token_is_stored_and_cleared() {
        let store = MemoryStore::default();
        let user = store.insert_user(new_user("a@b.com")).await.unwrap();
        store.update_refresh_token(user.id, Some("token")).await.unwrap();
        let stored = store.find_user_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(stored.refresh_token.as_deref(), Some("token"));
        store.update_refresh_token(user.id, None).await.unwrap();
        let stored = store.find_user_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(stored.refresh_token, None);
    }

    #[tokio::test]
    async fn receipts_are_scoped_to_owner() {
        let store = MemoryStore::default();
        let receipt = store
            .insert_receipt(new_receipt(1, PaymentMethod::Cash, 100))
            .await
            .unwrap();
        assert!(store.find_receipt(receipt.id, Some(1)).await.unwrap().is_some());
        assert!(store.find_receipt(receipt.id, Some(2)).await.unwrap().is_none());
        assert!(store.find_receipt(receipt.id, None).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn list_filters_and_pages() {
        let store = MemoryStore::default();
        for i in 0..15 {
            let method = if i % 3 == 0 {
                PaymentMethod::Cashless
            } else {
                PaymentMethod::Cash
            };
            store
                .insert_receipt(new_receipt(1, method, 100 + i))
                .await
                .unwrap();
        }
        store
            .insert_receipt(new_receipt(2, PaymentMethod::Cash, 100))
            .await
            .unwrap();

        let page = Page { page: 1, per_page: 5 };
        let (entries, total) = store
            .list_receipts(1, &ReceiptFilter::default(), page)
            .await
            .unwrap();
        assert_eq!(total, 15);
        assert_eq!(
            entries.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![6, 7, 8, 9, 10]
        );

        let filter = ReceiptFilter {
            payment_method: Some(PaymentMethod::Cashless),
            amount_from: Some(Money::from_cents(103)),
            ..Default::default()
        };
        let (entries, total) = store
            .list_receipts(1, &filter, Page { page: 0, per_page: 10 })
            .await
            .unwrap();
        assert_eq!(total, 4);
        assert_eq!(
            entries.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![4, 7, 10, 13]
        );

        let (entries, total) = store
            .list_receipts(1, &ReceiptFilter::default(), Page { page: 3, per_page: 5 })
            .await
            .unwrap();
        assert!(entries.is_empty());
        assert_eq!(total, 15);
    }
}
