//! receipt and user persistence

pub(crate) mod memory;
pub(crate) mod pool;
pub(crate) mod postgres;

use crate::server::database::memory::MemoryStore;
use crate::server::database::postgres::PgStore;
use crate::server::model::config::{ServerConfig, StoreBackend};
use crate::server::model::receipt::{NewReceipt, Page, Receipt, ReceiptFilter, ReceiptId};
use crate::server::model::user::{NewUser, User, UserId};
use derive_more::{Display, Error, From};
use log::info;

#[derive(Debug, Display, Error, From)]
pub(crate) enum StoreError {
    #[display("no connection available")]
    #[from(ignore)]
    Busy,
    #[display("operation timed out")]
    #[from(ignore)]
    Timeout,
    #[display("{reason}")]
    #[from(ignore)]
    Conflict { reason: String },
    #[display("stored data is corrupt: {reason}")]
    #[from(ignore)]
    Corrupt { reason: String },
    #[display("database error: {_0}")]
    Db(tokio_postgres::Error),
}

pub(crate) trait ReceiptStore {
    /// Persists a receipt together with all of its items, or nothing at all.
    async fn insert_receipt(&self, receipt: NewReceipt) -> Result<Receipt, StoreError>;

    /// Looks a receipt up by id, restricted to `owner` when given.
    async fn find_receipt(
        &self,
        id: ReceiptId,
        owner: Option<UserId>,
    ) -> Result<Option<Receipt>, StoreError>;

    /// One page of an owner's receipts matching `filter`, ordered by id, and the
    /// number of all matching receipts.
    async fn list_receipts(
        &self,
        owner: UserId,
        filter: &ReceiptFilter,
        page: Page,
    ) -> Result<(Vec<Receipt>, u64), StoreError>;
}

pub(crate) trait UserStore {
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_user_by_id(&self, id: UserId) -> Result<Option<User>, StoreError>;

    async fn update_refresh_token(
        &self,
        id: UserId,
        token: Option<&str>,
    ) -> Result<(), StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

/// The configured store backend.
pub(crate) enum Store {
    Postgres(PgStore),
    Memory(MemoryStore),
}

impl Store {
    pub async fn connect(config: &ServerConfig) -> Result<Self, anyhow::Error> {
        match config.store_backend {
            StoreBackend::Postgres => Ok(Store::Postgres(PgStore::connect(config).await?)),
            StoreBackend::Memory => {
                info!("using in-memory store, data is lost on shutdown");
                Ok(Store::Memory(MemoryStore::default()))
            }
        }
    }
}

impl ReceiptStore for Store {
    async fn insert_receipt(&self, receipt: NewReceipt) -> Result<Receipt, StoreError> {
        match self {
            Store::Postgres(s) => s.insert_receipt(receipt).await,
            Store::Memory(s) => s.insert_receipt(receipt).await,
        }
    }

    async fn find_receipt(
        &self,
        id: ReceiptId,
        owner: Option<UserId>,
    ) -> Result<Option<Receipt>, StoreError> {
        match self {
            Store::Postgres(s) => s.find_receipt(id, owner).await,
            Store::Memory(s) => s.find_receipt(id, owner).await,
        }
    }

    async fn list_receipts(
        &self,
        owner: UserId,
        filter: &ReceiptFilter,
        page: Page,
    ) -> Result<(Vec<Receipt>, u64), StoreError> {
        match self {
            Store::Postgres(s) => s.list_receipts(owner, filter, page).await,
            Store::Memory(s) => s.list_receipts(owner, filter, page).await,
        }
    }
}

impl UserStore for Store {
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        match self {
            Store::Postgres(s) => s.insert_user(user).await,
            Store::Memory(s) => s.insert_user(user).await,
        }
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        match self {
            Store::Postgres(s) => s.find_user_by_email(email).await,
            Store::Memory(s) => s.find_user_by_email(email).await,
        }
    }

    async fn find_user_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        match self {
            Store::Postgres(s) => s.find_user_by_id(id).await,
            Store::Memory(s) => s.find_user_by_id(id).await,
        }
    }

    async fn update_refresh_token(
        &self,
        id: UserId,
        token: Option<&str>,
    ) -> Result<(), StoreError> {
        match self {
            Store::Postgres(s) => s.update_refresh_token(id, token).await,
            Store::Memory(s) => s.update_refresh_token(id, token).await,
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        match self {
            Store::Postgres(s) => s.ping().await,
            Store::Memory(s) => s.ping().await,
        }
    }
}
