//! [`Group`] definitions.
//!
//! A [`Group`] is the only aggregate of the engine: it strictly owns its
//! [`Participant`]s, [`Round`]s (with their [`Payment`]s), round history and
//! [`Dispute`]s, which are never addressed independently of it.

pub mod access_code;
pub mod dispute;
mod ledger;
mod membership;
pub mod participant;
pub mod payment;
pub mod round;
pub mod schedule;

use std::time::Duration;

use common::{define_kind, unit, DateTime, DateTimeOf, Money, Percent};
use derive_more::{AsRef, Display, Error as StdError, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::user;

pub use self::{
    access_code::AccessCode,
    dispute::Dispute,
    ledger::{Recorded, Settlement},
    membership::{Enrollment, Withdrawal},
    participant::{Participant, Position},
    payment::Payment,
    round::Round,
};

/// Rotating savings group (sol, tontine).
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Group {
    /// ID of this [`Group`].
    pub id: Id,

    /// ID of the [`user::User`] who created this [`Group`].
    pub creator_id: user::Id,

    /// [`Name`] of this [`Group`].
    pub name: Name,

    /// Fixed contribution every [`Participant`] pays per [`Round`].
    pub contribution: Money,

    /// [`Frequency`] of [`Round`]s.
    pub frequency: Frequency,

    /// Maximum number of [`Participant`]s.
    pub max_participants: u8,

    /// Number of the current [`Round`].
    ///
    /// Equals `total_rounds + 1` once every [`Round`] is settled.
    pub current_round: round::Number,

    /// Total number of [`Round`]s.
    pub total_rounds: u8,

    /// [`Position`] of the [`Participant`] to receive the next payout.
    pub next_recipient_position: Option<Position>,

    /// [`Status`] of this [`Group`].
    pub status: Status,

    /// [`AccessCode`] to join this [`Group`] with.
    pub access_code: AccessCode,

    /// Indicator whether this [`Group`] is hidden from public listings.
    pub is_private: bool,

    /// [`Rules`] of this [`Group`].
    pub rules: Rules,

    /// [`Participant`]s of this [`Group`] ordered by their [`Position`].
    pub participants: Vec<Participant>,

    /// [`Round`]s of this [`Group`] ordered by their [`round::Number`].
    pub rounds: Vec<Round>,

    /// Immutable audit trail of settled [`Round`]s.
    pub history: Vec<round::HistoryEntry>,

    /// [`Dispute`]s raised in this [`Group`].
    pub disputes: Vec<Dispute>,

    /// Append-only log of [`Status`] changes.
    pub status_changes: Vec<StatusChange>,

    /// [`DateTime`] the first [`Round`] starts at.
    pub start_date: DateTime,

    /// [`DateTime`] the last [`Round`] is due at.
    pub end_date: DateTime,

    /// [`DateTime`] of the last mutation of this [`Group`].
    pub last_activity_at: DateTime,

    /// [`DateTime`] when this [`Group`] was created.
    pub created_at: CreationDateTime,

    /// [`Version`] of this [`Group`] for optimistic concurrency control.
    pub version: Version,
}

/// Parameters of a new [`Group`].
#[derive(Clone, Debug)]
pub struct Draft {
    /// ID of the creating [`user::User`].
    pub creator_id: user::Id,

    /// [`Name`] of the new [`Group`].
    pub name: Name,

    /// Contribution per [`Round`].
    pub contribution: Money,

    /// [`Frequency`] of [`Round`]s.
    pub frequency: Frequency,

    /// Maximum number of [`Participant`]s.
    pub max_participants: u8,

    /// Indicator whether the [`Group`] is private.
    pub is_private: bool,

    /// [`Rules`] of the new [`Group`].
    pub rules: Rules,

    /// [`DateTime`] the first [`Round`] starts at.
    pub start_date: DateTime,
}

impl Group {
    /// Creates a new [`Group`] out of the provided [`Draft`], enrolling its
    /// creator at the first [`Position`].
    #[must_use]
    pub fn new(
        draft: Draft,
        access_code: AccessCode,
        status: Status,
        now: DateTime,
    ) -> Self {
        let Draft {
            creator_id,
            name,
            contribution,
            frequency,
            max_participants,
            is_private,
            rules,
            start_date,
        } = draft;

        let rounds = schedule::generate(
            max_participants,
            start_date,
            frequency,
            contribution.currency,
        );
        let end_date = schedule::end_date(&rounds).unwrap_or(start_date);

        let mut group = Self {
            id: Id::new(),
            creator_id,
            name,
            contribution,
            frequency,
            max_participants,
            current_round: round::Number::FIRST,
            total_rounds: max_participants,
            next_recipient_position: None,
            status,
            access_code,
            is_private,
            rules,
            participants: vec![Participant::creator(creator_id, now)],
            rounds,
            history: vec![],
            disputes: vec![],
            status_changes: vec![],
            start_date,
            end_date,
            last_activity_at: now,
            created_at: now.coerce(),
            version: Version::INITIAL,
        };
        group.attach_recipients();
        group
    }

    /// Returns the [`Participant`] of the provided [`user::User`], if any.
    #[must_use]
    pub fn participant(&self, user_id: user::Id) -> Option<&Participant> {
        self.participants.iter().find(|p| p.user_id == user_id)
    }

    /// Returns the [`Participant`] at the provided [`Position`], if any.
    #[must_use]
    pub fn participant_at(&self, position: Position) -> Option<&Participant> {
        self.participants.iter().find(|p| p.position == position)
    }

    /// Indicates whether the provided [`user::User`] participates in this
    /// [`Group`].
    #[must_use]
    pub fn is_participant(&self, user_id: user::Id) -> bool {
        self.participant(user_id).is_some()
    }

    /// Indicates whether the provided [`user::User`] is the creator of this
    /// [`Group`].
    #[must_use]
    pub fn is_creator(&self, user_id: user::Id) -> bool {
        self.creator_id == user_id
    }

    /// Indicates whether the provided [`user::Identity`] may manage this
    /// [`Group`] (start, pause, moderate disputes and so on).
    #[must_use]
    pub fn is_manageable_by(&self, identity: &user::Identity) -> bool {
        identity.is_operator() || self.is_creator(identity.id)
    }

    /// Indicates whether this [`Group`] reached its maximum headcount.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.participants.len() >= usize::from(self.max_participants)
    }

    /// Returns the current [`Round`], if the rotation is still in progress.
    #[must_use]
    pub fn current(&self) -> Option<&Round> {
        self.round(self.current_round)
    }

    /// Returns the [`Round`] with the provided [`round::Number`], if any.
    #[must_use]
    pub fn round(&self, number: round::Number) -> Option<&Round> {
        self.rounds.iter().find(|r| r.number == number)
    }

    /// Returns the [`Payment`]s of the provided [`user::User`] across all
    /// [`Round`]s, ordered by [`round::Number`].
    pub fn payments_of(
        &self,
        user_id: user::Id,
    ) -> impl Iterator<Item = &Payment> + '_ {
        self.rounds
            .iter()
            .flat_map(|r| r.payments.iter())
            .filter(move |p| p.payer_id == user_id)
    }

    /// Returns the exit penalty quoted to a [`Participant`] leaving this
    /// [`Group`] after it started.
    #[must_use]
    pub fn exit_penalty(&self) -> Money {
        match self.rules.penalty {
            Penalty::Rate(rate) => self.contribution.percent(rate),
            Penalty::Fixed(amount) => {
                Money::new(amount, self.contribution.currency)
            }
        }
    }

    /// Moves this [`Group`] into the provided [`Status`], recording the
    /// change.
    ///
    /// # Errors
    ///
    /// With [`Error::InvalidTransition`] if the state machine doesn't allow
    /// the change.
    pub fn transition(
        &mut self,
        to: Status,
        reason: Option<Reason>,
        now: DateTime,
    ) -> Result<(), Error> {
        let from = self.status;
        if !from.can_become(to) {
            return Err(Error::InvalidTransition { from, to });
        }

        self.status = to;
        self.status_changes.push(StatusChange {
            from,
            to,
            reason,
            at: now,
        });
        self.last_activity_at = now;
        Ok(())
    }

    /// Publishes this drafted [`Group`], so it starts recruiting.
    ///
    /// # Errors
    ///
    /// With [`Error::InvalidTransition`] if this [`Group`] isn't a draft.
    pub fn publish(&mut self, now: DateTime) -> Result<(), Error> {
        self.transition(Status::Recruiting, None, now)
    }

    /// Starts the rotation of this [`Group`] manually.
    ///
    /// # Errors
    ///
    /// - With [`Error::UnexpectedStatus`] if this [`Group`] isn't recruiting.
    /// - With [`Error::NotEnoughParticipants`] if less than
    ///   [`Rules::minimum_participants`] are enrolled.
    pub fn start(&mut self, now: DateTime) -> Result<(), Error> {
        if self.status != Status::Recruiting {
            return Err(Error::UnexpectedStatus(self.status));
        }
        let enrolled = self.participants.len();
        if enrolled < usize::from(self.rules.minimum_participants) {
            return Err(Error::NotEnoughParticipants {
                required: self.rules.minimum_participants,
                actual: enrolled,
            });
        }
        self.activate(now)
    }

    /// Pauses the rotation of this [`Group`].
    ///
    /// # Errors
    ///
    /// With [`Error::InvalidTransition`] if this [`Group`] isn't active.
    pub fn pause(&mut self, reason: Reason, now: DateTime) -> Result<(), Error> {
        self.transition(Status::Paused, Some(reason), now)
    }

    /// Resumes the paused rotation of this [`Group`].
    ///
    /// # Errors
    ///
    /// With [`Error::InvalidTransition`] if this [`Group`] isn't paused.
    pub fn resume(
        &mut self,
        reason: Reason,
        now: DateTime,
    ) -> Result<(), Error> {
        self.transition(Status::Active, Some(reason), now)
    }

    /// Cancels this [`Group`].
    ///
    /// # Errors
    ///
    /// - With [`Error::RoundsAlreadySettled`] if any [`Round`] was already
    ///   paid out.
    /// - With [`Error::InvalidTransition`] if this [`Group`] can't be
    ///   cancelled in its current [`Status`].
    pub fn cancel(
        &mut self,
        reason: Reason,
        now: DateTime,
    ) -> Result<(), Error> {
        if !self.history.is_empty() {
            return Err(Error::RoundsAlreadySettled);
        }
        self.transition(Status::Cancelled, Some(reason), now)
    }

    /// Activates the rotation: the schedule is anchored at the later of
    /// [`Group::start_date`] and today, rounds are sized to the enrolled
    /// headcount and the first [`Round`] opens for payments.
    fn activate(&mut self, now: DateTime) -> Result<(), Error> {
        self.transition(Status::Active, None, now)?;

        let headcount = u8::try_from(self.participants.len())
            .map_err(|_| Error::GroupFull)?;
        let anchor = self.start_date.max(now.start_of_day());

        self.total_rounds = headcount;
        self.start_date = anchor;
        self.rounds = schedule::generate(
            headcount,
            anchor,
            self.frequency,
            self.contribution.currency,
        );
        self.end_date = schedule::end_date(&self.rounds).unwrap_or(anchor);
        self.attach_recipients();

        self.current_round = round::Number::FIRST;
        self.next_recipient_position =
            schedule::next_recipient(&self.participants);
        self.open_current_round();
        Ok(())
    }

    /// Attaches every [`Round`] to the [`Participant`] holding the
    /// [`Position`] matching its [`round::Number`].
    fn attach_recipients(&mut self) {
        for round in &mut self.rounds {
            round.recipient_id = self
                .participants
                .iter()
                .find(|p| p.position == round.recipient_position)
                .map(|p| p.user_id);
        }
    }
}

/// ID of a [`Group`].
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Display,
    Eq,
    From,
    FromStr,
    Hash,
    Into,
    Ord,
    PartialEq,
    PartialOrd,
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

/// Name of a [`Group`].
#[derive(AsRef, Clone, Debug, Deserialize, Display, Eq, PartialEq, Serialize)]
#[as_ref(str, String)]
#[serde(try_from = "String", into = "String")]
pub struct Name(String);

impl Name {
    /// Creates a new [`Name`] if the given `name` is valid.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Option<Self> {
        let name = name.into();
        Self::check(&name).then_some(Self(name))
    }

    /// Checks whether the given `name` is a valid [`Name`].
    fn check(name: impl AsRef<str>) -> bool {
        let name = name.as_ref();
        name.trim() == name && !name.is_empty() && name.chars().count() <= 100
    }
}

impl TryFrom<String> for Name {
    type Error = &'static str;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        Self::new(name).ok_or("invalid `Name`")
    }
}

impl From<Name> for String {
    fn from(name: Name) -> Self {
        name.0
    }
}

/// Free-form reason of a [`StatusChange`].
#[derive(AsRef, Clone, Debug, Deserialize, Display, Eq, PartialEq, Serialize)]
#[as_ref(str, String)]
#[serde(try_from = "String", into = "String")]
pub struct Reason(String);

impl Reason {
    /// Creates a new [`Reason`] if the given `reason` is valid.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Option<Self> {
        let reason = reason.into();
        let len = reason.trim().chars().count();
        (len > 0 && len <= 256).then_some(Self(reason))
    }
}

impl TryFrom<String> for Reason {
    type Error = &'static str;

    fn try_from(reason: String) -> Result<Self, Self::Error> {
        Self::new(reason).ok_or("invalid `Reason`")
    }
}

impl From<Reason> for String {
    fn from(reason: Reason) -> Self {
        reason.0
    }
}

/// Revision of a [`Group`], incremented on every stored change.
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
pub struct Version(u64);

impl Version {
    /// [`Version`] of a never stored [`Group`].
    pub const INITIAL: Self = Self(0);

    /// Returns the [`Version`] following this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

define_kind! {
    #[doc = "Frequency of [`Round`]s in a [`Group`]."]
    enum Frequency {
        #[doc = "Every 7 days."]
        Weekly = 1,

        #[doc = "Every 14 days."]
        Biweekly = 2,

        #[doc = "Every 30 days."]
        Monthly = 3,

        #[doc = "Every 90 days."]
        Quarterly = 4,
    }
}

impl Frequency {
    /// Returns the fixed length of a single [`Round`].
    ///
    /// Months and quarters are fixed 30 and 90 days, so schedules never depend
    /// on the calendar.
    #[must_use]
    pub const fn period(self) -> Duration {
        const DAY: u64 = 24 * 60 * 60;
        Duration::from_secs(
            DAY * match self {
                Self::Weekly => 7,
                Self::Biweekly => 14,
                Self::Monthly => 30,
                Self::Quarterly => 90,
            },
        )
    }
}

define_kind! {
    #[doc = "Status of a [`Group`]."]
    enum Status {
        #[doc = "Created, but not visible for joining yet."]
        Draft = 1,

        #[doc = "Accepting new participants."]
        Recruiting = 2,

        #[doc = "Rotation is in progress."]
        Active = 3,

        #[doc = "Rotation is temporarily stopped."]
        Paused = 4,

        #[doc = "Every participant received the payout."]
        Completed = 5,

        #[doc = "Abandoned before completion."]
        Cancelled = 6,
    }
}

impl Status {
    /// [`Status`]es counted against the creator's quota of concurrently
    /// running [`Group`]s.
    pub const RUNNING: &'static [Self] = &[Self::Recruiting, Self::Active];

    /// Indicates whether no further transition is possible from this
    /// [`Status`].
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Indicates whether the state machine allows moving from this
    /// [`Status`] into the provided one.
    #[must_use]
    pub const fn can_become(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Draft, Self::Recruiting)
                | (Self::Recruiting | Self::Paused, Self::Active)
                | (Self::Active, Self::Paused | Self::Completed)
                | (
                    Self::Draft | Self::Recruiting | Self::Active,
                    Self::Cancelled
                )
        )
    }
}

/// Recorded change of a [`Group`]'s [`Status`].
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct StatusChange {
    /// [`Status`] before the change.
    pub from: Status,

    /// [`Status`] after the change.
    pub to: Status,

    /// [`Reason`] of the change, if any was given.
    pub reason: Option<Reason>,

    /// [`DateTime`] of the change.
    pub at: DateTime,
}

/// Rules of a [`Group`].
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Rules {
    /// Number of days after a [`Round`]'s due date a payment is still
    /// considered on time.
    pub grace_period_days: u8,

    /// [`Penalty`] quoted to a [`Participant`] leaving a started [`Group`].
    pub penalty: Penalty,

    /// Indicator whether the rotation starts automatically once the
    /// [`Group`] is full.
    pub auto_start_when_full: bool,

    /// Minimum number of [`Participant`]s to run the rotation with.
    pub minimum_participants: u8,

    /// Indicator whether a contribution may be paid in instalments.
    pub allow_partial_payments: bool,
}

impl Rules {
    /// Returns the grace period as a [`Duration`].
    #[must_use]
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(u64::from(self.grace_period_days) * 24 * 60 * 60)
    }
}

/// Penalty of leaving a started [`Group`].
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Penalty {
    /// [`Percent`] of the contribution.
    Rate(Percent),

    /// Fixed amount in the contribution currency.
    Fixed(Decimal),
}

/// Violation of a [`Group`] invariant.
#[derive(Clone, Debug, Display, StdError)]
pub enum Error {
    /// [`user::User`] is already a [`Participant`].
    #[display("`User(id: {_0})` already participates")]
    AlreadyMember(#[error(not(source))] user::Id),

    /// Creator can't leave a started [`Group`].
    #[display("Creator can't leave a started group")]
    CreatorCannotLeave,

    /// [`Participant`] who received the payout can't leave.
    #[display("Participant who already received the payout can't leave")]
    CannotLeaveAfterReceiving,

    /// Amount is in a currency different from the contribution one.
    #[display("Expected amount in `{expected}`, got `{actual}`")]
    CurrencyMismatch {
        /// Currency of the contribution.
        expected: common::Currency,

        /// Currency of the provided amount.
        actual: common::Currency,
    },

    /// [`Dispute`] doesn't exist in this [`Group`].
    #[display("`Dispute(id: {_0})` does not exist")]
    DisputeNotExists(#[error(not(source))] dispute::Id),

    /// [`Dispute`] can't move into the requested [`dispute::Status`].
    #[display("`Dispute` can't move from `{from}` to `{to}`")]
    DisputeTransition {
        /// Current [`dispute::Status`].
        from: dispute::Status,

        /// Requested [`dispute::Status`].
        to: dispute::Status,
    },

    /// [`Payment`] for this [`Round`] was already made.
    #[display("`User(id: {payer_id})` already paid for round {round}")]
    DuplicatePayment {
        /// ID of the paying [`user::User`].
        payer_id: user::Id,

        /// [`round::Number`] the payment was made for.
        round: round::Number,
    },

    /// [`Group`] has no free [`Position`]s.
    #[display("Group is full")]
    GroupFull,

    /// Amount is not positive or doesn't match the contribution.
    #[display("Invalid amount `{_0}`")]
    InvalidAmount(#[error(not(source))] Money),

    /// [`Status`] transition isn't allowed by the state machine.
    #[display("Group can't move from `{from}` to `{to}`")]
    InvalidTransition {
        /// Current [`Status`].
        from: Status,

        /// Requested [`Status`].
        to: Status,
    },

    /// Not enough [`Participant`]s are enrolled.
    #[display("At least {required} participants required, {actual} enrolled")]
    NotEnoughParticipants {
        /// Minimum number of [`Participant`]s.
        required: u8,

        /// Number of enrolled [`Participant`]s.
        actual: usize,
    },

    /// [`user::User`] is not a [`Participant`].
    #[display("`User(id: {_0})` does not participate")]
    NotParticipant(#[error(not(source))] user::Id),

    /// Payment exceeds the outstanding contribution.
    #[display("Payment exceeds the outstanding contribution of `{_0}`")]
    Overpayment(#[error(not(source))] Money),

    /// Leaving a started [`Group`] requires paying the quoted penalty.
    #[display("Leaving requires paying the `{_0}` penalty")]
    PenaltyRequired(#[error(not(source))] Money),

    /// [`Round`] doesn't accept payments.
    #[display("Round {_0} is not open for payments")]
    RoundNotOpen(#[error(not(source))] round::Number),

    /// [`Round`] isn't fully paid yet.
    #[display("Round {_0} is not fully paid")]
    RoundNotComplete(#[error(not(source))] round::Number),

    /// Some [`Round`]s were already paid out.
    #[display("Some rounds were already paid out")]
    RoundsAlreadySettled,

    /// Operation is not allowed in the current [`Status`].
    #[display("Operation is not allowed for a `{_0}` group")]
    UnexpectedStatus(#[error(not(source))] Status),
}

/// [`DateTime`] when a [`Group`] was created.
pub type CreationDateTime = DateTimeOf<(Group, unit::Creation)>;

#[cfg(test)]
pub(crate) mod spec {
    use std::time::Duration;

    use common::{Currency, DateTime, Money, Percent};
    use rust_decimal::Decimal;

    use crate::domain::user;

    use super::{
        AccessCode, Draft, Error, Frequency, Group, Name, Penalty, Reason,
        Rules, Status,
    };

    pub(crate) fn day() -> Duration {
        Duration::from_secs(24 * 60 * 60)
    }

    pub(crate) fn rules() -> Rules {
        Rules {
            grace_period_days: 2,
            penalty: Penalty::Rate(Percent::new(Decimal::TEN).unwrap()),
            auto_start_when_full: true,
            minimum_participants: 3,
            allow_partial_payments: false,
        }
    }

    pub(crate) fn group(creator: user::Id, max: u8, now: DateTime) -> Group {
        Group::new(
            Draft {
                creator_id: creator,
                name: Name::new("Sol Lakay").unwrap(),
                contribution: Money::new(Decimal::from(1000), Currency::Htg),
                frequency: Frequency::Monthly,
                max_participants: max,
                is_private: false,
                rules: rules(),
                start_date: now.start_of_day() + day(),
            },
            AccessCode::new("ABC123").unwrap(),
            Status::Recruiting,
            now,
        )
    }

    #[test]
    fn creates_with_creator_at_first_position() {
        let creator = user::Id::new();
        let g = group(creator, 5, DateTime::now());

        assert_eq!(g.participants.len(), 1);
        assert_eq!(g.participants[0].user_id, creator);
        assert_eq!(u8::from(g.participants[0].position), 1);
        assert_eq!(g.total_rounds, 5);
        assert_eq!(g.rounds.len(), 5);
        assert_eq!(g.rounds[0].recipient_id, Some(creator));
        assert_eq!(g.rounds[1].recipient_id, None);
        assert_eq!(u8::from(g.current_round), 1);
    }

    #[test]
    fn follows_state_machine() {
        use Status as S;

        assert!(S::Draft.can_become(S::Recruiting));
        assert!(S::Recruiting.can_become(S::Active));
        assert!(S::Active.can_become(S::Paused));
        assert!(S::Paused.can_become(S::Active));
        assert!(S::Active.can_become(S::Completed));
        assert!(S::Recruiting.can_become(S::Cancelled));
        assert!(S::Active.can_become(S::Cancelled));
        assert!(S::Draft.can_become(S::Cancelled));

        assert!(!S::Draft.can_become(S::Active));
        assert!(!S::Paused.can_become(S::Cancelled));
        assert!(!S::Recruiting.can_become(S::Completed));
        assert!(!S::Paused.can_become(S::Completed));
        for terminal in [S::Completed, S::Cancelled] {
            for &to in S::ALL {
                assert!(!terminal.can_become(to), "{terminal} -> {to}");
            }
        }
    }

    #[test]
    fn records_status_changes() {
        let now = DateTime::now();
        let mut g = group(user::Id::new(), 3, now);
        g.participants
            .push(super::Participant::member(user::Id::new(), 2_u8.into(), now));
        g.participants
            .push(super::Participant::member(user::Id::new(), 3_u8.into(), now));

        g.start(now).unwrap();
        g.pause(Reason::new("holidays").unwrap(), now).unwrap();
        assert!(matches!(
            g.pause(Reason::new("again").unwrap(), now),
            Err(Error::InvalidTransition { .. }),
        ));
        g.resume(Reason::new("back").unwrap(), now).unwrap();

        let log = g
            .status_changes
            .iter()
            .map(|c| (c.from, c.to))
            .collect::<Vec<_>>();
        assert_eq!(
            log,
            [
                (Status::Recruiting, Status::Active),
                (Status::Active, Status::Paused),
                (Status::Paused, Status::Active),
            ],
        );
        assert_eq!(
            g.status_changes[1].reason.as_ref().map(AsRef::<str>::as_ref),
            Some("holidays"),
        );
    }

    #[test]
    fn refuses_manual_start_below_minimum() {
        let now = DateTime::now();
        let mut g = group(user::Id::new(), 5, now);

        assert!(matches!(
            g.start(now),
            Err(Error::NotEnoughParticipants {
                required: 3,
                actual: 1,
            }),
        ));
        assert_eq!(g.status, Status::Recruiting);
    }

    #[test]
    fn truncates_rounds_on_manual_start() {
        let now = DateTime::now();
        let mut g = group(user::Id::new(), 5, now);
        g.participants
            .push(super::Participant::member(user::Id::new(), 2_u8.into(), now));
        g.participants
            .push(super::Participant::member(user::Id::new(), 3_u8.into(), now));

        g.start(now).unwrap();

        assert_eq!(g.status, Status::Active);
        assert_eq!(g.total_rounds, 3);
        assert_eq!(g.rounds.len(), 3);
        assert_eq!(g.next_recipient_position.map(u8::from), Some(1));
        assert!(g.rounds.iter().all(|r| r.recipient_id.is_some()));
        assert_eq!(g.current().unwrap().expected_payers.len(), 3);
    }

    #[test]
    fn quotes_exit_penalty() {
        let mut g = group(user::Id::new(), 3, DateTime::now());
        assert_eq!(
            g.exit_penalty(),
            Money::new(Decimal::from(100), Currency::Htg),
        );

        g.rules.penalty = Penalty::Fixed(Decimal::from(250));
        assert_eq!(
            g.exit_penalty(),
            Money::new(Decimal::from(250), Currency::Htg),
        );
    }

    #[test]
    fn computes_fixed_periods() {
        assert_eq!(Frequency::Weekly.period(), day() * 7);
        assert_eq!(Frequency::Biweekly.period(), day() * 14);
        assert_eq!(Frequency::Monthly.period(), day() * 30);
        assert_eq!(Frequency::Quarterly.period(), day() * 90);
    }
}
