//! Lazily connected Postgres clients.

use std::{future::Future, sync::Arc};

use tokio::sync::{RwLock, RwLockReadGuard};
use tokio_postgres::{types::ToSql, Row, ToStatement};
use tracerr::Traced;

use crate::infra::database::{self, postgres};

use super::connection::{self, Connection};

/// Client acquiring its underlying [`Connection`] on first use only.
pub trait Lazy {
    /// Underlying [`Connection`] of this client.
    type Conn: Connection;

    /// Returns the underlying [`Connection`], acquiring it if necessary.
    fn connection(
        &self,
    ) -> impl Future<
        Output = Result<RwLockReadGuard<'_, Self::Conn>, Traced<database::Error>>,
    >;
}

impl<T: Lazy> Connection for T {
    async fn query<S>(
        &self,
        stmt: &S,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<Row>, Traced<database::Error>>
    where
        S: ToStatement + ?Sized,
    {
        self.connection()
            .await
            .map_err(tracerr::wrap!())?
            .query(stmt, params)
            .await
            .map_err(tracerr::wrap!())
    }

    async fn query_opt<S>(
        &self,
        stmt: &S,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Option<Row>, Traced<database::Error>>
    where
        S: ToStatement + ?Sized,
    {
        self.connection()
            .await
            .map_err(tracerr::wrap!())?
            .query_opt(stmt, params)
            .await
            .map_err(tracerr::wrap!())
    }

    async fn exec<S>(
        &self,
        stmt: &S,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<u64, Traced<database::Error>>
    where
        S: ToStatement + ?Sized,
    {
        self.connection()
            .await
            .map_err(tracerr::wrap!())?
            .exec(stmt, params)
            .await
            .map_err(tracerr::wrap!())
    }
}

/// Fills the provided `slot` with the [`Connection`] produced by `init`, unless
/// it's filled already.
async fn acquire<C, F>(
    slot: &RwLock<Option<C>>,
    init: impl FnOnce() -> F,
) -> Result<RwLockReadGuard<'_, C>, Traced<database::Error>>
where
    F: Future<Output = Result<C, Traced<database::Error>>>,
{
    let read = slot.read().await;
    let filled = if read.is_some() {
        read
    } else {
        drop(read);
        let mut write = slot.write().await;
        // Another task might have filled it while we were waiting.
        if write.is_none() {
            *write = Some(init().await.map_err(tracerr::wrap!())?);
        }
        write.downgrade()
    };
    Ok(RwLockReadGuard::map(filled, |c| c.as_ref().expect("filled above")))
}

/// Takes a fresh [`connection::Pooled`] out of the provided
/// [`connection::Pool`].
async fn checkout(
    pool: &connection::Pool,
) -> Result<connection::Pooled, Traced<database::Error>> {
    pool.get()
        .await
        .map_err(tracerr::from_and_wrap!(=> postgres::Error))
        .map_err(tracerr::map_from)
}

/// Non-transactional Postgres client.
///
/// Clones share the same underlying [`connection::Pooled`] connection.
#[derive(Clone, Debug)]
pub struct NonTx {
    /// [`connection::Pool`] connections are taken from.
    pub(crate) pool: connection::Pool,

    /// Acquired [`connection::Pooled`] connection, if any.
    slot: Arc<RwLock<Option<connection::Pooled>>>,
}

impl NonTx {
    /// Creates a new [`NonTx`] client over the provided [`connection::Pool`].
    #[must_use]
    pub fn from_pool(pool: connection::Pool) -> Self {
        Self {
            pool,
            slot: Arc::new(RwLock::new(None)),
        }
    }

    /// Releases the acquired [`connection::Pooled`] connection, if any.
    async fn release(&self) -> Option<connection::Pooled> {
        self.slot.write().await.take()
    }
}

impl Lazy for NonTx {
    type Conn = connection::Pooled;

    async fn connection(
        &self,
    ) -> Result<RwLockReadGuard<'_, Self::Conn>, Traced<database::Error>> {
        acquire(&self.slot, || checkout(&self.pool)).await
    }
}

/// Transactional Postgres client.
///
/// The transaction is opened on first use and is rolled back if the last
/// clone is dropped without a [`Tx::commit()`].
#[derive(Clone, Debug)]
pub struct Tx {
    /// [`NonTx`] client this [`Tx`] was started from.
    origin: NonTx,

    /// Opened [`connection::Transaction`], if any.
    slot: Arc<RwLock<Option<connection::Transaction>>>,
}

impl Tx {
    /// Starts a new [`Tx`] from the provided [`NonTx`] client, reusing its
    /// connection if one is acquired already.
    #[must_use]
    pub fn from_non_tx(origin: NonTx) -> Self {
        Self {
            origin,
            slot: Arc::new(RwLock::new(None)),
        }
    }

    /// Opens a new [`connection::Transaction`].
    async fn begin(
        &self,
    ) -> Result<connection::Transaction, Traced<database::Error>> {
        let client = match self.origin.release().await {
            Some(c) => c,
            None => checkout(&self.origin.pool)
                .await
                .map_err(tracerr::wrap!())?,
        };
        connection::Transaction::begin(client)
            .await
            .map_err(tracerr::wrap!())
    }

    /// Commits this [`Tx`], if anything was done in it.
    ///
    /// # Errors
    ///
    /// If Postgres fails to commit the transaction.
    pub async fn commit(&self) -> Result<(), Traced<database::Error>> {
        let Some(tx) = self.slot.write().await.take() else {
            return Ok(());
        };
        tx.commit().await.map_err(tracerr::wrap!())
    }
}

impl Lazy for Tx {
    type Conn = connection::Transaction;

    async fn connection(
        &self,
    ) -> Result<RwLockReadGuard<'_, Self::Conn>, Traced<database::Error>> {
        acquire(&self.slot, || self.begin()).await
    }
}
