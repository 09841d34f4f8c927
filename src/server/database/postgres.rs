use crate::server::database::pool::Pool;
use crate::server::database::{ReceiptStore, StoreError, UserStore};
use crate::server::model::config::ServerConfig;
use crate::server::model::receipt::{
    NewReceipt, Page, Payment, PaymentMethod, Receipt, ReceiptFilter, ReceiptId, ReceiptItem,
};
use crate::server::model::user::{NewUser, User, UserId};
use crate::server::receipt::money::Money;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio::time;
use tokio_postgres::error::SqlState;
use tokio_postgres::types::ToSql;
use tokio_postgres::Row;

const RECEIPT_COLUMNS: &str =
    "id, owner_id, payment_method, amount_tendered, total, change, created_at";
const USER_COLUMNS: &str =
    "id, username, email, password_hash, business_name, refresh_token, created_at";

/// PostgreSQL backed store, reading through one pool and writing through another.
pub(crate) struct PgStore {
    read_pool: Pool,
    write_pool: Pool,
    timeout: Duration,
}

impl PgStore {
    pub async fn connect(config: &ServerConfig) -> Result<Self, anyhow::Error> {
        let read_pool = Pool::connect(
            "read",
            &config.db_read_conn_str,
            config.db_pool_size,
            config.db_timeout,
        )
        .await?;
        let write_pool = Pool::connect(
            "write",
            &config.db_write_conn_str,
            config.db_pool_size,
            config.db_timeout,
        )
        .await?;
        Ok(Self {
            read_pool,
            write_pool,
            timeout: config.db_timeout,
        })
    }

    async fn timed<T, F>(&self, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match time::timeout(self.timeout, fut).await {
            Ok(res) => res,
            Err(_) => Err(StoreError::Timeout),
        }
    }

    async fn load_items(
        &self,
        ids: &[ReceiptId],
    ) -> Result<HashMap<ReceiptId, Vec<ReceiptItem>>, StoreError> {
        let conn = self.read_pool.acquire().await?;
        let rows = conn
            .query(
                r#"
                SELECT receipt_id, name, unit_price, quantity, line_total
                FROM receipt_item
                WHERE receipt_id = ANY($1)
                ORDER BY receipt_id, line_no
            "#,
                &[&ids],
            )
            .await?;
        let mut items: HashMap<ReceiptId, Vec<ReceiptItem>> = HashMap::new();
        for row in rows {
            let receipt_id: ReceiptId = row.try_get("receipt_id")?;
            items.entry(receipt_id).or_default().push(item_from_row(&row)?);
        }
        Ok(items)
    }
}

fn corrupt(reason: String) -> StoreError {
    StoreError::Corrupt { reason }
}

fn item_from_row(row: &Row) -> Result<ReceiptItem, StoreError> {
    let quantity: i64 = row.try_get("quantity")?;
    Ok(ReceiptItem {
        name: row.try_get("name")?,
        unit_price: Money::from_cents(row.try_get("unit_price")?),
        quantity: u32::try_from(quantity)
            .map_err(|_| corrupt(format!("quantity {quantity} out of range")))?,
        line_total: Money::from_cents(row.try_get("line_total")?),
    })
}

fn receipt_from_row(row: &Row, items: Vec<ReceiptItem>) -> Result<Receipt, StoreError> {
    let method: &str = row.try_get("payment_method")?;
    Ok(Receipt {
        id: row.try_get("id")?,
        owner: row.try_get("owner_id")?,
        created_at: row.try_get("created_at")?,
        items,
        payment: Payment {
            method: method.parse().map_err(corrupt)?,
            amount_tendered: Money::from_cents(row.try_get("amount_tendered")?),
        },
        total: Money::from_cents(row.try_get("total")?),
        change: Money::from_cents(row.try_get("change")?),
    })
}

fn user_from_row(row: &Row) -> Result<User, StoreError> {
    Ok(User {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        business_name: row.try_get("business_name")?,
        refresh_token: row.try_get("refresh_token")?,
        created_at: row.try_get("created_at")?,
    })
}

/// Placeholders of a multi-row insert sharing `$1`, e.g. `($1, $2, $3), ($1, $4, $5)`
/// for two rows of two columns each.
fn item_placeholders(rows: usize, columns: usize) -> String {
    (0..rows)
        .map(|row| {
            let cols = (0..columns)
                .map(|col| format!(", ${}", 2 + row * columns + col))
                .collect::<String>();
            format!("($1{cols})")
        })
        .collect::<Vec<_>>()
        .join(", ")
}

impl ReceiptStore for PgStore {
    async fn insert_receipt(&self, receipt: NewReceipt) -> Result<Receipt, StoreError> {
        self.timed(async {
            let mut conn = self.write_pool.acquire().await?;
            let txn = conn.transaction().await?;
            let row = txn
                .query_one(
                    r#"
                    INSERT INTO receipt(owner_id, payment_method, amount_tendered, total, change, created_at)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    RETURNING id
                "#,
                    &[
                        &receipt.owner,
                        &receipt.payment.method.as_str(),
                        &receipt.payment.amount_tendered.cents(),
                        &receipt.total.cents(),
                        &receipt.change.cents(),
                        &receipt.created_at,
                    ],
                )
                .await?;
            let id: ReceiptId = row.try_get("id")?;

            {
                // receipt_id, then one row per item: line_no, name, unit_price, quantity, line_total
                let columns: Vec<(i32, i64, i64, i64)> = receipt
                    .items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| {
                        (
                            i as i32,
                            item.unit_price.cents(),
                            i64::from(item.quantity),
                            item.line_total.cents(),
                        )
                    })
                    .collect();
                let mut params: Vec<&(dyn ToSql + Sync)> = vec![&id];
                for ((line_no, unit_price, quantity, line_total), item) in
                    columns.iter().zip(&receipt.items)
                {
                    params.push(line_no);
                    params.push(&item.name);
                    params.push(unit_price);
                    params.push(quantity);
                    params.push(line_total);
                }
                let statement = format!(
                    "INSERT INTO receipt_item(receipt_id, line_no, name, unit_price, quantity, line_total) VALUES {}",
                    item_placeholders(receipt.items.len(), 5)
                );
                txn.execute(statement.as_str(), &params).await?;
            }
            txn.commit().await?;
            Ok(receipt.into_receipt(id))
        })
        .await
    }

    async fn find_receipt(
        &self,
        id: ReceiptId,
        owner: Option<UserId>,
    ) -> Result<Option<Receipt>, StoreError> {
        self.timed(async {
            let row = {
                let conn = self.read_pool.acquire().await?;
                conn.query_opt(
                    format!(
                        "SELECT {RECEIPT_COLUMNS} FROM receipt WHERE id = $1 AND ($2::BIGINT IS NULL OR owner_id = $2)"
                    )
                    .as_str(),
                    &[&id, &owner],
                )
                .await?
            };
            let Some(row) = row else {
                return Ok(None);
            };
            let mut items = self.load_items(&[id]).await?;
            receipt_from_row(&row, items.remove(&id).unwrap_or_default()).map(Some)
        })
        .await
    }

    async fn list_receipts(
        &self,
        owner: UserId,
        filter: &ReceiptFilter,
        page: Page,
    ) -> Result<(Vec<Receipt>, u64), StoreError> {
        self.timed(async {
            let method = filter.payment_method.map(PaymentMethod::as_str);
            let amount_from = filter.amount_from.map(Money::cents);
            let amount_to = filter.amount_to.map(Money::cents);

            let mut params: Vec<&(dyn ToSql + Sync)> = vec![&owner];
            let mut clauses = vec!["owner_id = $1".to_string()];
            if let Some(method) = &method {
                params.push(method);
                clauses.push(format!("payment_method = ${}", params.len()));
            }
            if let Some(from) = &filter.created_at_from {
                params.push(from);
                clauses.push(format!("created_at >= ${}", params.len()));
            }
            if let Some(to) = &filter.created_at_to {
                params.push(to);
                clauses.push(format!("created_at <= ${}", params.len()));
            }
            if let Some(from) = &amount_from {
                params.push(from);
                clauses.push(format!("amount_tendered >= ${}", params.len()));
            }
            if let Some(to) = &amount_to {
                params.push(to);
                clauses.push(format!("amount_tendered <= ${}", params.len()));
            }
            let condition = clauses.join(" AND ");

            let limit = i64::from(page.per_page);
            let offset = i64::try_from(page.offset()).unwrap_or(i64::MAX);
            let (count, rows) = {
                let conn = self.read_pool.acquire().await?;
                let count: i64 = conn
                    .query_one(
                        format!("SELECT COUNT(*) FROM receipt WHERE {condition}").as_str(),
                        &params,
                    )
                    .await?
                    .try_get(0)?;
                let mut paged = params.clone();
                paged.push(&limit);
                paged.push(&offset);
                let rows = conn
                    .query(
                        format!(
                            "SELECT {RECEIPT_COLUMNS} FROM receipt WHERE {condition} ORDER BY id LIMIT ${} OFFSET ${}",
                            params.len() + 1,
                            params.len() + 2
                        )
                        .as_str(),
                        &paged,
                    )
                    .await?;
                (count, rows)
            };

            let ids = rows
                .iter()
                .map(|row| row.try_get("id"))
                .collect::<Result<Vec<ReceiptId>, _>>()?;
            let mut items = self.load_items(&ids).await?;
            let receipts = rows
                .iter()
                .zip(&ids)
                .map(|(row, id)| receipt_from_row(row, items.remove(id).unwrap_or_default()))
                .collect::<Result<Vec<_>, _>>()?;
            Ok((receipts, u64::try_from(count).unwrap_or_default()))
        })
        .await
    }
}

impl UserStore for PgStore {
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        self.timed(async {
            let conn = self.write_pool.acquire().await?;
            let res = conn
                .query_one(
                    r#"
                    INSERT INTO app_user(username, email, password_hash, business_name, created_at)
                    VALUES ($1, $2, $3, $4, $5)
                    RETURNING id
                "#,
                    &[
                        &user.username,
                        &user.email,
                        &user.password_hash,
                        &user.business_name,
                        &user.created_at,
                    ],
                )
                .await;
            match res {
                Ok(row) => Ok(user.into_user(row.try_get("id")?)),
                Err(e) if e.code() == Some(&SqlState::UNIQUE_VIOLATION) => {
                    Err(StoreError::Conflict {
                        reason: "user with this email already exists".to_string(),
                    })
                }
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.timed(async {
            let conn = self.read_pool.acquire().await?;
            conn.query_opt(
                format!("SELECT {USER_COLUMNS} FROM app_user WHERE email = $1").as_str(),
                &[&email],
            )
            .await?
            .map(|row| user_from_row(&row))
            .transpose()
        })
        .await
    }

    async fn find_user_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        self.timed(async {
            let conn = self.read_pool.acquire().await?;
            conn.query_opt(
                format!("SELECT {USER_COLUMNS} FROM app_user WHERE id = $1").as_str(),
                &[&id],
            )
            .await?
            .map(|row| user_from_row(&row))
            .transpose()
        })
        .await
    }

    async fn update_refresh_token(
        &self,
        id: UserId,
        token: Option<&str>,
    ) -> Result<(), StoreError> {
        self.timed(async {
            let conn = self.write_pool.acquire().await?;
            conn.execute(
                "UPDATE app_user SET refresh_token = $2 WHERE id = $1",
                &[&id, &token],
            )
            .await?;
            Ok(())
        })
        .await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.timed(async {
            let conn = self.read_pool.acquire().await?;
            conn.execute("SELECT 1", &[]).await?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_for_multi_row_insert() {
        assert_eq!(item_placeholders(2, 2), "($1, $2, $3), ($1, $4, $5)");
        assert_eq!(item_placeholders(1, 5), "($1, $2, $3, $4, $5, $6)");
        assert_eq!(item_placeholders(0, 5), "");
    }
}
