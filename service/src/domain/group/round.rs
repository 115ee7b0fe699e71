//! [`Round`] definitions.

use common::{define_kind, DateTime, Money};
use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};

use crate::domain::{
    group::{payment, Payment, Position},
    user,
};
#[cfg(doc)]
use crate::domain::group::{Group, Participant};

/// Single contribution-and-payout cycle of a [`Group`].
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Round {
    /// [`Number`] of this [`Round`].
    pub number: Number,

    /// [`Position`] of the [`Participant`] receiving the payout.
    pub recipient_position: Position,

    /// ID of the [`user::User`] holding the [`Round::recipient_position`],
    /// if the seat is taken.
    pub recipient_id: Option<user::Id>,

    /// [`DateTime`] this [`Round`] starts at.
    pub starts_at: DateTime,

    /// [`DateTime`] contributions for this [`Round`] are due at.
    pub due_at: DateTime,

    /// [`Status`] of this [`Round`].
    pub status: Status,

    /// [`Participant`]s expected to pay, captured when this [`Round`] became
    /// active.
    pub expected_payers: Vec<user::Id>,

    /// [`Payment`]s made for this [`Round`].
    pub payments: Vec<Payment>,

    /// Sum of all the [`Payment`]s made for this [`Round`].
    pub total_collected: Money,

    /// [`DateTime`] when this [`Round`] was completed.
    pub completed_at: Option<DateTime>,
}

impl Round {
    /// Returns the [`Payment`] of the provided [`user::User`], if any.
    #[must_use]
    pub fn payment_of(&self, payer_id: user::Id) -> Option<&Payment> {
        self.payments.iter().find(|p| p.payer_id == payer_id)
    }

    /// Indicates whether every expected payer fully paid the contribution.
    ///
    /// A [`Round`] nobody is expected to pay for is never fully paid.
    #[must_use]
    pub fn is_fully_paid(&self) -> bool {
        !self.expected_payers.is_empty()
            && self.expected_payers.iter().all(|&payer| {
                self.payment_of(payer)
                    .is_some_and(|p| p.status.is_settled())
            })
    }

    /// Classifies contributions to this [`Round`] at the moment of the call.
    #[must_use]
    pub fn summary(&self) -> Summary {
        let mut summary = Summary::default();
        for &payer in &self.expected_payers {
            let counter = match self.payment_of(payer).map(|p| p.status) {
                Some(payment::Status::Paid) => &mut summary.on_time,
                Some(payment::Status::Overdue) => &mut summary.late,
                Some(payment::Status::Partial) => &mut summary.partial,
                None => &mut summary.missing,
            };
            *counter += 1;
        }
        summary
    }
}

/// Ordinal number of a [`Round`], starting from `1`.
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Display,
    Eq,
    From,
    Hash,
    Into,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
pub struct Number(u8);

impl Number {
    /// [`Number`] of the first [`Round`].
    pub const FIRST: Self = Self(1);

    /// Returns the [`Number`] following this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl From<Number> for Position {
    fn from(number: Number) -> Self {
        u8::from(number).into()
    }
}

define_kind! {
    #[doc = "Status of a [`Round`]."]
    enum Status {
        #[doc = "First [`Round`] of a [`Group`] that hasn't started yet."]
        Pending = 1,

        #[doc = "Later [`Round`] waiting for its turn."]
        Scheduled = 2,

        #[doc = "Accepting contributions."]
        Active = 3,

        #[doc = "Fully paid and paid out."]
        Completed = 4,
    }
}

/// Classification of contributions to a [`Round`].
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize,
)]
pub struct Summary {
    /// Number of contributions paid on time.
    pub on_time: u8,

    /// Number of contributions paid after the grace period.
    pub late: u8,

    /// Number of contributions paid in part.
    pub partial: u8,

    /// Number of contributions not paid at all.
    pub missing: u8,
}

/// Immutable record of a settled [`Round`].
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct HistoryEntry {
    /// [`Number`] of the settled [`Round`].
    pub round: Number,

    /// ID of the [`user::User`] who received the payout.
    pub recipient_id: user::Id,

    /// [`Position`] of the recipient.
    pub recipient_position: Position,

    /// Total amount collected and paid out.
    pub amount: Money,

    /// Contributions [`Summary`] at settlement.
    pub summary: Summary,

    /// [`DateTime`] of the settlement.
    pub completed_at: DateTime,
}
