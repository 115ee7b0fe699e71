//! [`Payment`] definitions.

use common::{define_kind, DateTime, Money};
use derive_more::{AsRef, Display};
use serde::{Deserialize, Serialize};

use crate::domain::{group::round, user};
#[cfg(doc)]
use crate::domain::group::{Participant, Round};

/// Contribution of a [`Participant`] to a [`Round`].
///
/// Instalments of a partial contribution are merged into a single
/// [`Payment`], so there is at most one per payer and [`Round`].
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Payment {
    /// [`round::Number`] this [`Payment`] is made for.
    pub round: round::Number,

    /// ID of the paying [`user::User`].
    pub payer_id: user::Id,

    /// Amount paid so far.
    pub amount: Money,

    /// [`DateTime`] of the last instalment.
    pub paid_at: DateTime,

    /// [`Method`] of the last instalment.
    pub method: Method,

    /// [`Status`] of this [`Payment`].
    pub status: Status,

    /// Reference of this [`Payment`] in an external ledger, if any.
    pub transaction_ref: Option<TransactionRef>,
}

define_kind! {
    #[doc = "Status of a [`Payment`]."]
    enum Status {
        #[doc = "Fully paid on time."]
        Paid = 1,

        #[doc = "Paid in part, the rest is still outstanding."]
        Partial = 2,

        #[doc = "Fully paid after the grace period."]
        Overdue = 3,
    }
}

impl Status {
    /// Indicates whether the contribution is fully paid.
    #[must_use]
    pub const fn is_settled(self) -> bool {
        matches!(self, Self::Paid | Self::Overdue)
    }
}

define_kind! {
    #[doc = "Method a [`Payment`] was made with."]
    enum Method {
        #[doc = "Cash handed over in person."]
        Cash = 1,

        #[doc = "Bank transfer."]
        BankTransfer = 2,

        #[doc = "Mobile money transfer."]
        MobileMoney = 3,

        #[doc = "Card payment."]
        Card = 4,

        #[doc = "Platform wallet."]
        Wallet = 5,
    }
}

/// Reference of a [`Payment`] in an external ledger.
#[derive(AsRef, Clone, Debug, Deserialize, Display, Eq, PartialEq, Serialize)]
#[as_ref(str, String)]
pub struct TransactionRef(String);

impl TransactionRef {
    /// Creates a new [`TransactionRef`] if the given `reference` is valid.
    #[must_use]
    pub fn new(reference: impl Into<String>) -> Option<Self> {
        let reference = reference.into();
        (!reference.trim().is_empty() && reference.len() <= 128)
            .then_some(Self(reference))
    }
}
