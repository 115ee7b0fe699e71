//! [`Command`] definition.

pub mod apply_distribution;
pub mod change_group_status;
pub mod create_group;
pub mod generate_access_code;
pub mod join_group;
pub mod leave_group;
pub mod open_dispute;
pub mod record_payment;
pub mod resolve_dispute;
pub mod review_dispute;

use crate::{domain::Group, infra::notification};

/// [`Command`] of the [`Service`].
///
/// [`Service`]: crate::Service
pub use common::Handler as Command;

pub use self::{
    apply_distribution::ApplyDistribution,
    change_group_status::ChangeGroupStatus, create_group::CreateGroup,
    generate_access_code::GenerateAccessCode, join_group::JoinGroup,
    leave_group::LeaveGroup, open_dispute::OpenDispute,
    record_payment::RecordPayment, resolve_dispute::ResolveDispute,
    review_dispute::ReviewDispute,
};

/// Builds notification [`Event`]s of the provided [`Group`] having just
/// started its rotation.
///
/// [`Event`]: notification::Event
pub(crate) fn started_events(group: &Group) -> Vec<notification::Event> {
    let mut events = vec![notification::Event::GroupStarted {
        group_id: group.id,
        participants: group.participants.iter().map(|p| p.user_id).collect(),
    }];
    events.extend(turn_reminder(group));
    events
}

/// Builds a [`notification::Event::TurnReminder`] of the current [`Round`]
/// of the provided [`Group`], if it has a recipient.
///
/// [`Round`]: crate::domain::group::Round
pub(crate) fn turn_reminder(group: &Group) -> Option<notification::Event> {
    let round = group.current()?;
    Some(notification::Event::TurnReminder {
        group_id: group.id,
        round: round.number,
        beneficiary: round.recipient_id?,
        payers: round.expected_payers.clone(),
    })
}
