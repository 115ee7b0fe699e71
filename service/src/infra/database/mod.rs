//! [`Database`]-related implementations.

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

use derive_more::{Display, Error as StdError, From};

pub use self::memory::Memory;
#[cfg(feature = "postgres")]
pub use self::postgres::Postgres;

/// Database operation.
pub use common::Handler as Database;

/// [`Database`] error.
#[derive(Debug, Display, From, StdError)]
pub enum Error {
    #[cfg(feature = "postgres")]
    /// [`Postgres`] error.
    #[display("`Postgres` error: {_0}")]
    #[from]
    Postgres(postgres::Error),

    /// Stored value was changed concurrently since it was read.
    #[display("Stored value was changed concurrently")]
    StaleVersion,

    /// Stored value violates a uniqueness constraint.
    #[display("`{_0}` constraint violated")]
    UniqueViolation(#[error(not(source))] Constraint),
}

/// Name of a uniqueness constraint.
pub type Constraint = &'static str;

/// Constraint of a [`Group`] ID uniqueness.
///
/// [`Group`]: crate::domain::Group
pub const GROUPS_PKEY: Constraint = "groups_pkey";

/// Constraint of an [`AccessCode`] uniqueness among running [`Group`]s.
///
/// [`AccessCode`]: crate::domain::group::AccessCode
/// [`Group`]: crate::domain::Group
pub const GROUPS_ACCESS_CODE_KEY: Constraint = "groups_access_code_key";

/// Constraint of a [`Distribution`] uniqueness per round.
///
/// [`Distribution`]: crate::domain::Distribution
pub const DISTRIBUTIONS_ROUND_KEY: Constraint = "distributions_round_key";
