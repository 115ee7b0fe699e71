//! [`Database`] backed by Postgres.
//!
//! [`Group`]s are stored as JSONB documents next to the columns they're looked
//! up by, while concurrent writers are serialized by upserting dedicated lock
//! rows inside their transactions.
//!
//! [`Group`]: crate::domain::Group

pub mod client;
pub mod connection;
mod impls;

use deadpool_postgres::Runtime;
use derive_more::{Deref, Display, Error as StdError, From};
use tokio_postgres::{error::SqlState, NoTls};
use tracerr::Traced;

use crate::infra::database;
#[cfg(doc)]
use crate::infra::Database;

pub use refinery::embed_migrations;

pub use self::{
    client::{NonTx, Tx},
    connection::Connection,
};

pub use deadpool_postgres::Config;

/// Postgres [`Database`] client, either [`NonTx`] or [`Tx`].
#[derive(Clone, Copy, Debug, Deref)]
pub struct Postgres<T = NonTx>(T);

impl Postgres {
    /// Creates a new [`Postgres`] client pooling connections according to the
    /// provided [`Config`].
    ///
    /// No connection is established until the first statement is run.
    ///
    /// # Errors
    ///
    /// If the [`Config`] is invalid.
    pub fn new(conf: &Config) -> Result<Self, Traced<database::Error>> {
        let pool = conf
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(tracerr::from_and_wrap!(=> Error))
            .map_err(tracerr::map_from)?;
        Ok(Self(NonTx::from_pool(pool)))
    }
}

/// Postgres database [`Error`].
#[derive(Debug, Display, StdError, From)]
pub enum Error {
    /// [`Connection`] error.
    #[display("`Connection` error: {_0}")]
    Connection(connection::Error),

    /// Error of creating a new [`connection::Pool`] client.
    #[display("Failed to create a new `connection::Pool`: {_0}")]
    PoolCreationError(connection::PoolCreationError),

    /// [`connection::Pool`] error.
    #[display("`connection::Pool` error: {_0}")]
    PoolError(connection::PoolError),
}

impl Error {
    /// Checks whether this [`Error`] violates the provided unique
    /// `constraint`.
    #[must_use]
    pub fn is_unique_violation(&self, constraint: &str) -> bool {
        match self {
            Self::Connection(e) => {
                e.code() == Some(&SqlState::UNIQUE_VIOLATION)
                    && e.as_db_error().and_then(|e| e.constraint())
                        == Some(constraint)
            }
            Self::PoolError(..) | Self::PoolCreationError(..) => false,
        }
    }

    /// Checks whether the failed operation may succeed if attempted again.
    ///
    /// Serialization failures, deadlocks and lost connections are transient,
    /// while constraint violations and malformed statements are not.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Connection(e) => {
                e.is_closed()
                    || e.code().is_some_and(|c| {
                        *c == SqlState::T_R_SERIALIZATION_FAILURE
                            || *c == SqlState::T_R_DEADLOCK_DETECTED
                    })
            }
            Self::PoolError(_) => true,
            Self::PoolCreationError(_) => false,
        }
    }
}
