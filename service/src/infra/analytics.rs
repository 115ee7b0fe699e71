//! [`Analytics`] port definitions.
//!
//! Analytics [`Event`]s are collected on a best-effort basis: failures are
//! logged and swallowed.

use std::convert::Infallible;

use common::{operations::Perform, DateTime};
use derive_more::Display;
use tracing as log;

use crate::domain::{group, user};

/// Sink of behavioral [`Event`]s, handling `Perform<Event>`.
pub use common::Handler as Analytics;

/// Behavioral event.
#[derive(Clone, Copy, Debug)]
pub struct Event {
    /// [`Kind`] of this [`Event`].
    pub kind: Kind,

    /// ID of the [`Group`] this [`Event`] happened in.
    ///
    /// [`Group`]: crate::domain::Group
    pub group_id: group::Id,

    /// ID of the [`user::User`] caused this [`Event`], if any.
    pub actor_id: Option<user::Id>,

    /// [`DateTime`] this [`Event`] happened at.
    pub at: DateTime,
}

impl Event {
    /// Creates a new [`Event`] happened now.
    #[must_use]
    pub fn new(
        kind: Kind,
        group_id: group::Id,
        actor_id: Option<user::Id>,
    ) -> Self {
        Self {
            kind,
            group_id,
            actor_id,
            at: DateTime::now(),
        }
    }
}

/// Kind of an analytics [`Event`].
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum Kind {
    /// Group was created.
    #[display("group_created")]
    GroupCreated,

    /// Participant joined a group.
    #[display("group_joined")]
    GroupJoined,

    /// Participant left a group.
    #[display("group_left")]
    GroupLeft,

    /// Group changed its status.
    #[display("group_status_changed")]
    GroupStatusChanged,

    /// Contribution was recorded.
    #[display("payment_recorded")]
    PaymentRecorded,

    /// Round was settled.
    #[display("round_completed")]
    RoundCompleted,

    /// Payout was credited.
    #[display("payout_applied")]
    PayoutApplied,

    /// Dispute was opened or moved.
    #[display("dispute_updated")]
    DisputeUpdated,
}

/// [`Analytics`] writing [`Event`]s into the log.
#[derive(Clone, Copy, Debug, Default)]
pub struct Log;

impl Analytics<Perform<Event>> for Log {
    type Ok = ();
    type Err = Infallible;

    async fn execute(
        &self,
        Perform(event): Perform<Event>,
    ) -> Result<Self::Ok, Self::Err> {
        log::debug!(
            kind = %event.kind,
            group_id = %event.group_id,
            actor_id = ?event.actor_id,
            "analytics event",
        );
        Ok(())
    }
}
