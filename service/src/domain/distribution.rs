//! [`Distribution`] definitions.
//!
//! A [`Distribution`] is an outbox entry: it is stored in the same transaction
//! that settles a [`Round`], and is applied to the recipient's [`Account`]
//! afterwards, as many times as needed until it succeeds.
//!
//! [`Account`]: crate::domain::Account
//! [`Round`]: crate::domain::group::Round

use std::fmt;

use common::{define_kind, unit, DateTime, DateTimeOf, Money};
use derive_more::{Display, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    account,
    group::{self, round, Settlement},
    user,
};

/// Pending or applied payout of a settled [`Round`].
///
/// [`Round`]: crate::domain::group::Round
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Distribution {
    /// ID of this [`Distribution`].
    pub id: Id,

    /// ID of the [`Group`] the payout belongs to.
    ///
    /// [`Group`]: crate::domain::Group
    pub group_id: group::Id,

    /// [`round::Number`] of the settled round.
    pub round: round::Number,

    /// ID of the [`user::User`] receiving the payout.
    pub recipient_id: user::Id,

    /// Amount to pay out.
    pub amount: Money,

    /// [`Status`] of this [`Distribution`].
    pub status: Status,

    /// Number of failed attempts to apply this [`Distribution`].
    pub attempts: u32,

    /// Description of the last failure, if any.
    pub last_error: Option<String>,

    /// [`account::TransferId`] of the applied credit.
    pub transfer_id: Option<account::TransferId>,

    /// [`DateTime`] when this [`Distribution`] was created.
    pub created_at: CreationDateTime,

    /// [`DateTime`] when this [`Distribution`] was applied.
    pub applied_at: Option<DateTime>,
}

impl Distribution {
    /// Creates a new pending [`Distribution`] of the provided [`Settlement`].
    #[must_use]
    pub fn new(
        group_id: group::Id,
        settlement: &Settlement,
        now: DateTime,
    ) -> Self {
        Self {
            id: Id::new(),
            group_id,
            round: settlement.round,
            recipient_id: settlement.recipient_id,
            amount: settlement.amount,
            status: Status::Pending,
            attempts: 0,
            last_error: None,
            transfer_id: None,
            created_at: now.coerce(),
            applied_at: None,
        }
    }

    /// Indicates whether this [`Distribution`] still has to be applied.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == Status::Pending
    }

    /// Returns the [`account::TransferKey`] deduplicating credits of this
    /// [`Distribution`].
    #[must_use]
    pub fn transfer_key(&self) -> account::TransferKey {
        account::TransferKey::new(format!(
            "sol:{}:{}",
            self.group_id, self.round,
        ))
    }

    /// Returns the [`account::Memo`] of the credit.
    #[must_use]
    pub fn memo(&self) -> account::Memo {
        account::Memo::new(format!(
            "Sol payout of round {} in group {}",
            self.round, self.group_id,
        ))
    }

    /// Marks this [`Distribution`] as applied by the provided
    /// [`account::Transfer`].
    pub fn applied(&mut self, transfer: &account::Transfer, now: DateTime) {
        self.status = Status::Applied;
        self.transfer_id = Some(transfer.id);
        self.last_error = None;
        self.applied_at = Some(now);
    }

    /// Records a failed attempt to apply this [`Distribution`].
    pub fn failed(&mut self, error: &impl fmt::Display) {
        self.attempts = self.attempts.saturating_add(1);
        self.last_error = Some(error.to_string());
    }
}

/// ID of a [`Distribution`].
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

define_kind! {
    #[doc = "Status of a [`Distribution`]."]
    enum Status {
        #[doc = "Waiting to be credited."]
        Pending = 1,

        #[doc = "Credited to the recipient."]
        Applied = 2,
    }
}

/// [`DateTime`] when a [`Distribution`] was created.
pub type CreationDateTime = DateTimeOf<(Distribution, unit::Creation)>;
