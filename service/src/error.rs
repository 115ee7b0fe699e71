//! Categorization of [`Service`] errors.
//!
//! [`Service`]: crate::Service

use derive_more::Display;
use tracerr::Traced;

use crate::{
    domain::group,
    infra::{account, database},
};

/// Category of an error, letting a transport map it to a user-facing code
/// deterministically.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
pub enum Kind {
    /// Malformed or out-of-range input.
    Validation,

    /// Input conflicts with the existing state (duplicates, for example).
    Conflict,

    /// Operation is not allowed in the current state.
    State,

    /// Some limit is reached.
    Capacity,

    /// Caller is not allowed to perform the operation.
    Authorization,

    /// Referenced entity doesn't exist.
    NotFound,

    /// Account doesn't hold enough money.
    InsufficientFunds,

    /// Payout couldn't be transferred, the operation should be retried.
    TransferFailure,

    /// Infrastructure failure.
    Internal,
}

/// Error that can be [`Categorize`]d into a [`Kind`].
pub trait Categorize {
    /// Returns the [`Kind`] of this error.
    fn kind(&self) -> Kind;

    /// Indicates whether the failed operation may succeed if retried as is.
    fn is_retryable(&self) -> bool {
        matches!(self.kind(), Kind::TransferFailure | Kind::Internal)
    }
}

impl<E: Categorize> Categorize for Traced<E> {
    fn kind(&self) -> Kind {
        self.as_ref().kind()
    }

    fn is_retryable(&self) -> bool {
        self.as_ref().is_retryable()
    }
}

impl Categorize for database::Error {
    fn kind(&self) -> Kind {
        match self {
            Self::StaleVersion | Self::UniqueViolation(_) => Kind::Conflict,
            #[cfg(feature = "postgres")]
            Self::Postgres(_) => Kind::Internal,
        }
    }

    fn is_retryable(&self) -> bool {
        match self {
            Self::StaleVersion => true,
            Self::UniqueViolation(_) => false,
            #[cfg(feature = "postgres")]
            Self::Postgres(e) => e.is_transient(),
        }
    }
}

impl Categorize for group::Error {
    fn kind(&self) -> Kind {
        use group::Error as E;

        match self {
            E::CurrencyMismatch { .. }
            | E::InvalidAmount(_)
            | E::Overpayment(_) => Kind::Validation,
            E::AlreadyMember(_) | E::DuplicatePayment { .. } => Kind::Conflict,
            E::CreatorCannotLeave
            | E::CannotLeaveAfterReceiving
            | E::DisputeTransition { .. }
            | E::InvalidTransition { .. }
            | E::PenaltyRequired(_)
            | E::RoundNotOpen(_)
            | E::RoundNotComplete(_)
            | E::RoundsAlreadySettled
            | E::UnexpectedStatus(_) => Kind::State,
            E::GroupFull | E::NotEnoughParticipants { .. } => Kind::Capacity,
            E::NotParticipant(_) => Kind::Authorization,
            E::DisputeNotExists(_) => Kind::NotFound,
        }
    }
}

impl Categorize for account::Error {
    fn kind(&self) -> Kind {
        match self {
            Self::InsufficientFunds(_) => Kind::InsufficientFunds,
            Self::AccountNotFound(_)
            | Self::CurrencyMismatch { .. }
            | Self::Database(_)
            | Self::NoAccount(_) => Kind::TransferFailure,
        }
    }
}
