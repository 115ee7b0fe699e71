//! [`Account`] definitions.
//!
//! Accounts are owned by an external ledger: the engine only references them
//! by [`Id`] and credits them through the account port.

use common::{unit, DateTimeOf, Money};
use derive_more::{AsRef, Display, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::user;

/// Monetary account of a [`user::User`].
#[derive(Clone, Debug)]
pub struct Account {
    /// ID of this [`Account`].
    pub id: Id,

    /// ID of the [`user::User`] owning this [`Account`].
    pub owner_id: user::Id,

    /// Current balance of this [`Account`].
    pub balance: Money,
}

/// ID of an [`Account`].
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Display,
    Eq,
    From,
    FromStr,
    Hash,
    Into,
    PartialEq,
    Serialize,
)]
#[cfg_attr(feature = "postgres", derive(ToSql, FromSql), postgres(transparent))]
pub struct Id(Uuid);

impl Id {
    /// Creates a new random [`Id`].
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Record of money moved into an [`Account`].
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Transfer {
    /// ID of this [`Transfer`].
    pub id: TransferId,

    /// ID of the credited [`Account`].
    pub account_id: Id,

    /// Transferred amount.
    pub amount: Money,

    /// [`Memo`] of this [`Transfer`].
    pub memo: Memo,

    /// [`TransferKey`] deduplicating this [`Transfer`].
    pub key: TransferKey,

    /// [`DateTimeOf`] when this [`Transfer`] was made.
    pub created_at: TransferDateTime,
}

/// ID of a [`Transfer`].
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Display,
    Eq,
    From,
    FromStr,
    Hash,
    Into,
    PartialEq,
    Serialize,
)]
#[cfg_attr(feature = "postgres", derive(ToSql, FromSql), postgres(transparent))]
pub struct TransferId(Uuid);

impl TransferId {
    /// Creates a new random [`TransferId`].
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Idempotency key of a [`Transfer`]: crediting twice with the same key
/// returns the first [`Transfer`].
#[derive(
    AsRef, Clone, Debug, Deserialize, Display, Eq, Hash, PartialEq, Serialize,
)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct TransferKey(String);

impl TransferKey {
    /// Creates a new [`TransferKey`] out of the provided `key`.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }
}

/// Human-readable description of a [`Transfer`].
#[derive(
    AsRef, Clone, Debug, Deserialize, Display, Eq, PartialEq, Serialize,
)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Memo(String);

impl Memo {
    /// Creates a new [`Memo`] out of the provided `text`.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }
}

/// [`DateTimeOf`] when a [`Transfer`] was made.
pub type TransferDateTime = DateTimeOf<(Transfer, unit::Creation)>;
