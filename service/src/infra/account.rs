//! [`Accounts`] port definitions.
//!
//! [`Account`]s are owned by an external ledger. The engine only reads their
//! balance and credits them with [`Distribution`] payouts.
//!
//! [`Distribution`]: crate::domain::Distribution

use common::Money;
use derive_more::{Display, Error as StdError, From};

use crate::{
    domain::{
        account::{self, Memo, TransferKey},
        user,
    },
    infra::database,
};
#[cfg(doc)]
use crate::domain::{account::Transfer, Account};

/// Operation of the [`Account`]s ledger.
///
/// Implementations handle:
/// - `Select<By<Option<account::Id>, user::Id>>`: resolving the [`Account`]
///   owned by a user;
/// - `Select<By<Money, account::Id>>`: reading the balance of an [`Account`];
/// - `Perform<Credit>`: crediting an [`Account`], returning the [`Transfer`].
pub use common::Handler as Accounts;

/// Credit of money into an [`Account`].
///
/// Crediting twice with the same [`TransferKey`] returns the first
/// [`Transfer`] without moving money again.
#[derive(Clone, Debug)]
pub struct Credit {
    /// ID of the [`Account`] to credit.
    pub account_id: account::Id,

    /// Amount to credit.
    pub amount: Money,

    /// Human-readable description of the credit.
    pub memo: Memo,

    /// Idempotency key of the credit.
    pub key: TransferKey,
}

/// [`Accounts`] error.
#[derive(Debug, Display, From, StdError)]
pub enum Error {
    /// [`Account`] doesn't exist.
    #[display("`Account(id: {_0})` does not exist")]
    AccountNotFound(#[error(not(source))] account::Id),

    /// [`user::User`] owns no [`Account`] to be credited.
    #[display("`User(id: {_0})` has no account")]
    NoAccount(#[error(not(source))] user::Id),

    /// [`Account`] holds another currency.
    #[display("`Account` holds `{expected}`, but `{actual}` is credited")]
    CurrencyMismatch {
        /// Currency of the [`Account`].
        expected: common::Currency,

        /// Currency of the credited amount.
        actual: common::Currency,
    },

    /// [`Account`] doesn't hold enough money for the operation.
    #[display("`Account(id: {_0})` has insufficient funds")]
    InsufficientFunds(#[error(not(source))] account::Id),

    /// Ledger storage error.
    #[display("Ledger storage failed: {_0}")]
    #[from]
    Database(database::Error),
}
