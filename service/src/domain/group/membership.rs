//! Joining and leaving a [`Group`].

use common::DateTime;

use crate::domain::{
    group::{schedule, Error, Group, Participant, Position, Reason, Status},
    user,
};

/// Outcome of [`Group::enroll()`].
#[derive(Clone, Debug)]
pub struct Enrollment {
    /// Newly enrolled [`Participant`].
    pub participant: Participant,

    /// Indicator whether the enrollment filled the [`Group`] and started its
    /// rotation.
    pub started: bool,
}

/// Outcome of [`Group::withdraw()`].
#[derive(Clone, Debug)]
pub struct Withdrawal {
    /// Removed [`Participant`].
    pub participant: Participant,

    /// Indicator whether the [`Group`] was cancelled for falling below its
    /// minimum headcount.
    pub cancelled: bool,
}

impl Group {
    /// Enrolls the provided [`user::User`] at the lowest free [`Position`].
    ///
    /// Filling the last seat starts the rotation if
    /// [`Rules::auto_start_when_full`] is set.
    ///
    /// # Errors
    ///
    /// - With [`Error::UnexpectedStatus`] if this [`Group`] isn't recruiting.
    /// - With [`Error::AlreadyMember`] if the [`user::User`] already
    ///   participates.
    /// - With [`Error::GroupFull`] if no seats are left.
    ///
    /// [`Rules::auto_start_when_full`]: crate::domain::group::Rules
    pub fn enroll(
        &mut self,
        user_id: user::Id,
        now: DateTime,
    ) -> Result<Enrollment, Error> {
        if self.status != Status::Recruiting {
            return Err(Error::UnexpectedStatus(self.status));
        }
        if self.is_participant(user_id) {
            return Err(Error::AlreadyMember(user_id));
        }
        if self.is_full() {
            return Err(Error::GroupFull);
        }

        let mut position = Position::FIRST;
        while self.participant_at(position).is_some() {
            position = position.next();
        }

        let participant = Participant::member(user_id, position, now);
        self.participants.push(participant.clone());
        self.participants.sort_by_key(|p| p.position);
        self.attach_recipients();
        self.last_activity_at = now;

        let started = self.is_full() && self.rules.auto_start_when_full;
        if started {
            self.activate(now)?;
        }

        Ok(Enrollment {
            participant,
            started,
        })
    }

    /// Removes the provided [`user::User`] from this [`Group`].
    ///
    /// Before the rotation starts, leaving is unconditional: remaining
    /// [`Position`]s are compacted in join order and recipients are
    /// re-attached to a regenerated schedule, which keeps a placeholder
    /// [`Round`] per seat until activation sizes it to the headcount.
    /// Falling below [`Rules::minimum_participants`] cancels a recruiting
    /// [`Group`], and so does the creator leaving it.
    ///
    /// # Errors
    ///
    /// - With [`Error::NotParticipant`] if the [`user::User`] doesn't
    ///   participate.
    /// - With [`Error::CannotLeaveAfterReceiving`] if the [`Participant`]
    ///   already received the payout.
    /// - With [`Error::CreatorCannotLeave`] if the creator leaves a started
    ///   [`Group`].
    /// - With [`Error::PenaltyRequired`] carrying the exit penalty quote for
    ///   anyone else leaving a started [`Group`].
    /// - With [`Error::UnexpectedStatus`] if this [`Group`] is over.
    ///
    /// [`Round`]: crate::domain::group::Round
    /// [`Rules::minimum_participants`]: crate::domain::group::Rules
    pub fn withdraw(
        &mut self,
        user_id: user::Id,
        reason: Option<Reason>,
        now: DateTime,
    ) -> Result<Withdrawal, Error> {
        let Some(index) =
            self.participants.iter().position(|p| p.user_id == user_id)
        else {
            return Err(Error::NotParticipant(user_id));
        };

        match self.status {
            Status::Draft | Status::Recruiting => {}
            Status::Active | Status::Paused => {
                return Err(if self.participants[index].has_received {
                    Error::CannotLeaveAfterReceiving
                } else if self.is_creator(user_id) {
                    Error::CreatorCannotLeave
                } else {
                    Error::PenaltyRequired(self.exit_penalty())
                });
            }
            Status::Completed | Status::Cancelled => {
                return Err(Error::UnexpectedStatus(self.status));
            }
        }

        let minimum = usize::from(self.rules.minimum_participants);
        let was_viable = self.participants.len() >= minimum;

        let participant = self.participants.remove(index);
        let mut position = Position::FIRST;
        for p in &mut self.participants {
            p.position = position;
            position = position.next();
        }

        self.rounds = schedule::generate(
            self.max_participants,
            self.start_date,
            self.frequency,
            self.contribution.currency,
        );
        self.attach_recipients();
        self.last_activity_at = now;

        let abandoned = participant.user_id == self.creator_id;
        let below_minimum = self.status == Status::Recruiting
            && was_viable
            && self.participants.len() < minimum;
        let cancelled = abandoned || below_minimum;
        if cancelled {
            let reason = reason.or_else(|| {
                Reason::new(if abandoned {
                    "creator left"
                } else {
                    "fell below minimum participants"
                })
            });
            self.transition(Status::Cancelled, reason, now)?;
        }

        Ok(Withdrawal {
            participant,
            cancelled,
        })
    }
}

#[cfg(test)]
mod spec {
    use common::{Currency, DateTime, Money};
    use rust_decimal::Decimal;

    use crate::domain::{
        group::{spec::group, Error, Group, Reason, Status},
        user,
    };

    fn full(now: DateTime) -> (Group, [user::Id; 3]) {
        let members = [user::Id::new(), user::Id::new(), user::Id::new()];
        let mut g = group(members[0], 3, now);
        _ = g.enroll(members[1], now).unwrap();
        _ = g.enroll(members[2], now).unwrap();
        (g, members)
    }

    #[test]
    fn assigns_lowest_free_positions() {
        let now = DateTime::now();
        let mut g = group(user::Id::new(), 5, now);

        let a = g.enroll(user::Id::new(), now).unwrap();
        let b = g.enroll(user::Id::new(), now).unwrap();

        assert_eq!(u8::from(a.participant.position), 2);
        assert_eq!(u8::from(b.participant.position), 3);
        assert!(!b.started);
        assert_eq!(g.rounds[2].recipient_id, Some(b.participant.user_id));
    }

    #[test]
    fn starts_when_filled() {
        let now = DateTime::now();
        let creator = user::Id::new();
        let mut g = group(creator, 3, now);

        assert!(!g.enroll(user::Id::new(), now).unwrap().started);
        let last = g.enroll(user::Id::new(), now).unwrap();

        assert!(last.started);
        assert_eq!(g.status, Status::Active);
        assert_eq!(g.next_recipient_position.map(u8::from), Some(1));
        assert_eq!(g.rounds[0].recipient_id, Some(creator));
    }

    #[test]
    fn stays_recruiting_without_auto_start() {
        let now = DateTime::now();
        let mut g = group(user::Id::new(), 3, now);
        g.rules.auto_start_when_full = false;

        _ = g.enroll(user::Id::new(), now).unwrap();
        let last = g.enroll(user::Id::new(), now).unwrap();

        assert!(!last.started);
        assert_eq!(g.status, Status::Recruiting);
        assert!(matches!(
            g.enroll(user::Id::new(), now),
            Err(Error::GroupFull),
        ));
    }

    #[test]
    fn rejects_repeated_join() {
        let now = DateTime::now();
        let creator = user::Id::new();
        let mut g = group(creator, 5, now);

        assert!(matches!(
            g.enroll(creator, now),
            Err(Error::AlreadyMember(id)) if id == creator,
        ));
        assert_eq!(g.participants.len(), 1);
    }

    #[test]
    fn rejects_join_of_started_group() {
        let now = DateTime::now();
        let (mut g, _) = full(now);

        assert!(matches!(
            g.enroll(user::Id::new(), now),
            Err(Error::UnexpectedStatus(Status::Active)),
        ));
        assert_eq!(g.participants.len(), 3);
    }

    #[test]
    fn compacts_positions_on_leave() {
        let now = DateTime::now();
        let creator = user::Id::new();
        let mut g = group(creator, 5, now);
        let [a, b, c] = [user::Id::new(), user::Id::new(), user::Id::new()];
        for id in [a, b, c] {
            _ = g.enroll(id, now).unwrap();
        }

        let left = g.withdraw(a, None, now).unwrap();

        assert_eq!(u8::from(left.participant.position), 2);
        assert!(!left.cancelled);
        let order = g
            .participants
            .iter()
            .map(|p| (p.user_id, u8::from(p.position)))
            .collect::<Vec<_>>();
        assert_eq!(order, [(creator, 1), (b, 2), (c, 3)]);
        assert_eq!(g.rounds.len(), 5);
        assert_eq!(g.rounds[1].recipient_id, Some(b));
        assert_eq!(g.rounds[3].recipient_id, None);
    }

    #[test]
    fn cancels_when_falling_below_minimum() {
        let now = DateTime::now();
        let creator = user::Id::new();
        let mut g = group(creator, 5, now);
        let [a, b] = [user::Id::new(), user::Id::new()];
        _ = g.enroll(a, now).unwrap();

        // Below minimum since creation, so leaving doesn't cancel.
        assert!(!g.withdraw(a, None, now).unwrap().cancelled);
        assert_eq!(g.status, Status::Recruiting);

        _ = g.enroll(a, now).unwrap();
        _ = g.enroll(b, now).unwrap();
        let left = g.withdraw(b, None, now).unwrap();

        assert!(left.cancelled);
        assert_eq!(g.status, Status::Cancelled);
        assert_eq!(
            g.status_changes.last().map(|c| (c.from, c.to)),
            Some((Status::Recruiting, Status::Cancelled)),
        );
    }

    #[test]
    fn cancels_when_creator_leaves() {
        let now = DateTime::now();
        let creator = user::Id::new();
        let mut alone = group(creator, 3, now);

        let left = alone.withdraw(creator, None, now).unwrap();

        assert!(left.cancelled);
        assert_eq!(alone.status, Status::Cancelled);
        assert!(alone.participants.is_empty());
        assert!(matches!(
            alone.enroll(user::Id::new(), now),
            Err(Error::UnexpectedStatus(Status::Cancelled)),
        ));

        let mut g = group(creator, 5, now);
        let member = user::Id::new();
        _ = g.enroll(member, now).unwrap();

        assert!(g.withdraw(creator, None, now).unwrap().cancelled);
        assert_eq!(g.status, Status::Cancelled);
        assert_eq!(
            g.status_changes.last().and_then(|c| c.reason.clone()),
            Reason::new("creator left"),
        );
    }

    #[test]
    fn quotes_penalty_when_leaving_started_group() {
        let now = DateTime::now();
        let (mut g, [creator, _, third]) = full(now);

        assert!(matches!(
            g.withdraw(third, None, now),
            Err(Error::PenaltyRequired(quote))
                if quote == Money::new(Decimal::from(100), Currency::Htg),
        ));
        assert!(matches!(
            g.withdraw(creator, None, now),
            Err(Error::CreatorCannotLeave),
        ));
        assert!(matches!(
            g.withdraw(user::Id::new(), None, now),
            Err(Error::NotParticipant(_)),
        ));
        assert_eq!(g.participants.len(), 3);
    }

    #[test]
    fn forbids_leaving_after_receiving() {
        let now = DateTime::now();
        let (mut g, [_, second, _]) = full(now);
        g.participants[1].has_received = true;

        assert!(matches!(
            g.withdraw(second, None, now),
            Err(Error::CannotLeaveAfterReceiving),
        ));
    }
}
