use crate::server::database::StoreError;
use anyhow::Context;
use log::{error, info, warn};
use std::collections::VecDeque;
use std::future::Future;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tokio::time;
use tokio_postgres::{Client, NoTls};

/// A client the pool knows how to open and to health-check.
pub(crate) trait DbClient: Sized + Send + 'static {
    fn connect(
        conn_str: &str,
    ) -> impl Future<Output = Result<Self, tokio_postgres::Error>> + Send;

    fn is_closed(&self) -> bool;
}

impl DbClient for Client {
    async fn connect(conn_str: &str) -> Result<Self, tokio_postgres::Error> {
        let (client, conn) = tokio_postgres::connect(conn_str, NoTls).await?;
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                error!("connection returned error and aborted, {}", e);
            }
        });
        Ok(client)
    }

    fn is_closed(&self) -> bool {
        Client::is_closed(self)
    }
}

struct Shared<M: DbClient> {
    /// pool name, used in logs
    name: String,
    conn_str: String,
    /// idle clients, accessed in a FIFO manner
    idle: Mutex<VecDeque<M>>,
    /// one permit per client that may be alive at once
    permits: Arc<Semaphore>,
    timeout: Duration,
}

impl<M: DbClient> Shared<M> {
    fn pop_idle(&self) -> Option<M> {
        let mut idle = self.idle.lock().unwrap_or_else(|p| p.into_inner());
        idle.pop_front()
    }

    fn push_idle(&self, client: M) {
        let mut idle = self.idle.lock().unwrap_or_else(|p| p.into_inner());
        idle.push_back(client);
    }
}

/// Fixed-size connection pool. Cloning shares the same clients.
pub(crate) struct Pool<M: DbClient = Client>(Arc<Shared<M>>);

impl<M: DbClient> Clone for Pool<M> {
    fn clone(&self) -> Self {
        Pool(self.0.clone())
    }
}

impl<M: DbClient> Pool<M> {
    /// Creates a pool without opening any client; clients are opened on demand.
    pub fn lazy(name: &str, conn_str: &str, size: usize, timeout: Duration) -> Self {
        Pool(Arc::new(Shared {
            name: name.to_string(),
            conn_str: conn_str.to_string(),
            idle: Mutex::new(VecDeque::with_capacity(size)),
            permits: Arc::new(Semaphore::new(size)),
            timeout,
        }))
    }

    /// Creates a pool and opens `size` clients up front.
    pub async fn connect(
        name: &str,
        conn_str: &str,
        size: usize,
        timeout: Duration,
    ) -> Result<Self, anyhow::Error> {
        let pool = Self::lazy(name, conn_str, size, timeout);
        let mut set = JoinSet::new();
        for _ in 0..size {
            let conn_str = conn_str.to_string();
            set.spawn(async move { M::connect(&conn_str).await });
        }
        while let Some(res) = set.join_next().await {
            let client = res
                .context("connect task panicked")?
                .with_context(|| format!("failed to create connection for pool {name}"))?;
            pool.0.push_idle(client);
        }
        info!("pool {} created with {} connections", name, size);
        Ok(pool)
    }

    /// Acquires a client, waiting at most the configured timeout for a free slot.
    pub async fn acquire(&self) -> Result<Connection<M>, StoreError> {
        let shared = &self.0;
        let permit = match time::timeout(shared.timeout, shared.permits.clone().acquire_owned())
            .await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(StoreError::Busy),
            Err(_) => {
                warn!(
                    "timed out to acquire a connection from pool {} after {} ms",
                    shared.name,
                    shared.timeout.as_millis()
                );
                return Err(StoreError::Busy);
            }
        };

        let client = match shared.pop_idle() {
            Some(client) if !client.is_closed() => client,
            stale => {
                if stale.is_some() {
                    info!("pool {} replacing a closed connection", shared.name);
                }
                match time::timeout(shared.timeout, M::connect(&shared.conn_str)).await {
                    Ok(res) => res?,
                    Err(_) => return Err(StoreError::Timeout),
                }
            }
        };

        Ok(Connection {
            client: Some(client),
            pool: shared.clone(),
            _permit: permit,
        })
    }

    #[cfg(test)]
    fn idle_count(&self) -> usize {
        self.0.idle.lock().unwrap().len()
    }
}

/// A pooled client, handed back to the pool on drop.
pub(crate) struct Connection<M: DbClient = Client> {
    client: Option<M>,
    pool: Arc<Shared<M>>,
    _permit: OwnedSemaphorePermit,
}

impl<M: DbClient> Deref for Connection<M> {
    type Target = M;

    fn deref(&self) -> &M {
        self.client.as_ref().expect("client is present until drop")
    }
}

impl<M: DbClient> DerefMut for Connection<M> {
    fn deref_mut(&mut self) -> &mut M {
        self.client.as_mut().expect("client is present until drop")
    }
}

impl<M: DbClient> Drop for Connection<M> {
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            if !client.is_closed() {
                self.pool.push_idle(client);
            }
        }
    }
}
