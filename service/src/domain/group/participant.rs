//! [`Participant`] definitions.

use common::{define_kind, unit, DateTime, DateTimeOf, Money};
use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};

use crate::domain::user;
#[cfg(doc)]
use crate::domain::Group;

/// Membership of a [`user::User`] in a [`Group`].
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Participant {
    /// ID of the participating [`user::User`].
    pub user_id: user::Id,

    /// [`Position`] of this [`Participant`] in the payout rotation.
    pub position: Position,

    /// [`Role`] of this [`Participant`].
    pub role: Role,

    /// [`DateTime`] when this [`Participant`] joined.
    pub joined_at: JoinDateTime,

    /// Indicator whether this [`Participant`] already received the payout.
    pub has_received: bool,

    /// [`DateTime`] when this [`Participant`] received the payout.
    pub received_at: Option<DateTime>,

    /// Amount this [`Participant`] received.
    pub received_amount: Option<Money>,

    /// Number of late payments made by this [`Participant`].
    pub warning_count: u16,
}

impl Participant {
    /// Creates a new [`Participant`] for the creator of a [`Group`].
    #[must_use]
    pub fn creator(user_id: user::Id, now: DateTime) -> Self {
        Self::new(user_id, Position::FIRST, Role::Creator, now)
    }

    /// Creates a new regular [`Participant`] at the provided [`Position`].
    #[must_use]
    pub fn member(user_id: user::Id, position: Position, now: DateTime) -> Self {
        Self::new(user_id, position, Role::Member, now)
    }

    fn new(
        user_id: user::Id,
        position: Position,
        role: Role,
        now: DateTime,
    ) -> Self {
        Self {
            user_id,
            position,
            role,
            joined_at: now.coerce(),
            has_received: false,
            received_at: None,
            received_amount: None,
            warning_count: 0,
        }
    }
}

/// Place of a [`Participant`] in the payout rotation, starting from `1`.
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
pub struct Position(u8);

impl Position {
    /// [`Position`] receiving the first payout.
    pub const FIRST: Self = Self(1);

    /// Returns the [`Position`] following this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

define_kind! {
    #[doc = "Role of a [`Participant`] in a [`Group`]."]
    enum Role {
        #[doc = "[`user::User`] who created the [`Group`]."]
        Creator = 1,

        #[doc = "[`user::User`] who joined the [`Group`]."]
        Member = 2,
    }
}

/// [`DateTime`] when a [`Participant`] joined a [`Group`].
pub type JoinDateTime = DateTimeOf<(Participant, unit::Creation)>;
