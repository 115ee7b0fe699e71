//! [`Notifier`] port definitions.
//!
//! Notifications are fire-and-forget: they are sent only after the state
//! change they describe is committed, and failing to send one never rolls that
//! change back.

use std::convert::Infallible;

use common::{operations::Perform, Money};
use tracing as log;

use crate::domain::{
    group::{self, round, Position},
    user,
};

/// Sender of notification [`Event`]s, handling `Perform<Event>`.
pub use common::Handler as Notifier;

/// Event notified to [`user::User`]s.
#[derive(Clone, Debug)]
pub enum Event {
    /// [`Group`] was created.
    ///
    /// [`Group`]: crate::domain::Group
    GroupCreated {
        /// ID of the created [`Group`].
        ///
        /// [`Group`]: crate::domain::Group
        group_id: group::Id,

        /// ID of the creator.
        creator_id: user::Id,
    },

    /// [`user::User`] joined a [`Group`].
    ///
    /// [`Group`]: crate::domain::Group
    ParticipantJoined {
        /// ID of the joined [`Group`].
        ///
        /// [`Group`]: crate::domain::Group
        group_id: group::Id,

        /// ID of the joined [`user::User`].
        user_id: user::Id,

        /// [`Position`] assigned to the joined [`user::User`].
        position: Position,
    },

    /// Rotation of a [`Group`] started.
    ///
    /// [`Group`]: crate::domain::Group
    GroupStarted {
        /// ID of the started [`Group`].
        ///
        /// [`Group`]: crate::domain::Group
        group_id: group::Id,

        /// IDs of all the participants.
        participants: Vec<user::Id>,
    },

    /// New [`Round`] opened for payments.
    ///
    /// [`Round`]: crate::domain::group::Round
    TurnReminder {
        /// ID of the [`Group`].
        ///
        /// [`Group`]: crate::domain::Group
        group_id: group::Id,

        /// [`round::Number`] of the opened round.
        round: round::Number,

        /// ID of the [`user::User`] receiving the round payout.
        beneficiary: user::Id,

        /// IDs of the [`user::User`]s expected to pay.
        payers: Vec<user::Id>,
    },

    /// Contribution was received.
    PaymentReceived {
        /// ID of the [`Group`].
        ///
        /// [`Group`]: crate::domain::Group
        group_id: group::Id,

        /// [`round::Number`] the contribution was paid for.
        round: round::Number,

        /// ID of the paying [`user::User`].
        payer_id: user::Id,

        /// Paid amount.
        amount: Money,
    },

    /// Contribution was paid after the grace period.
    LatePayment {
        /// ID of the [`Group`].
        ///
        /// [`Group`]: crate::domain::Group
        group_id: group::Id,

        /// [`round::Number`] the contribution was paid for.
        round: round::Number,

        /// ID of the paying [`user::User`].
        payer_id: user::Id,

        /// Number of warnings the payer has collected.
        warning_count: u16,
    },

    /// Every participant of a [`Group`] received the payout.
    ///
    /// [`Group`]: crate::domain::Group
    GroupCompleted {
        /// ID of the completed [`Group`].
        ///
        /// [`Group`]: crate::domain::Group
        group_id: group::Id,
    },
}

/// [`Notifier`] writing [`Event`]s into the log.
#[derive(Clone, Copy, Debug, Default)]
pub struct Log;

impl Notifier<Perform<Event>> for Log {
    type Ok = ();
    type Err = Infallible;

    async fn execute(
        &self,
        Perform(event): Perform<Event>,
    ) -> Result<Self::Ok, Self::Err> {
        log::info!("notification: {event:?}");
        Ok(())
    }
}
