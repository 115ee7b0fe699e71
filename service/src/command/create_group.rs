//! [`Command`] for creating a new [`Group`].

use std::time::Duration;

use common::{
    operations::{
        By, Commit, Insert, Lock, Perform, Select, Transact, Transacted,
    },
    DateTime, Money, Percent,
};
use derive_more::{Display, Error, From};
use rust_decimal::Decimal;
use smart_default::SmartDefault;
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{
        group::{self, AccessCode},
        user, Group, User,
    },
    error::{Categorize, Kind},
    infra::{
        analytics, database, notification, Analytics, Database, Notifier,
    },
    read::group::RunningCount,
    Service,
};

use super::{generate_access_code, Command, GenerateAccessCode};

/// Membership policy of [`Group`]s.
#[derive(Clone, Copy, Debug, SmartDefault)]
pub struct Config {
    /// Lowest allowed [`Group::max_participants`] and
    /// [`group::Rules::minimum_participants`].
    #[default(3)]
    pub min_participants: u8,

    /// Highest allowed [`Group::max_participants`].
    #[default(20)]
    pub max_participants: u8,

    /// Number of recruiting or active [`Group`]s a single [`User`] may have
    /// created.
    #[default(5)]
    pub max_active_groups_per_creator: usize,

    /// [`Percent`] of the contribution quoted to a participant leaving a
    /// started [`Group`], unless [`group::Rules`] are specified explicitly.
    #[default(Percent::TEN)]
    pub exit_penalty_rate: Percent,

    /// Lowest allowed contribution amount.
    #[default(Decimal::ONE)]
    pub minimum_contribution: Decimal,

    /// Grace period (in days) after a round's due date, unless
    /// [`group::Rules`] are specified explicitly.
    #[default(2)]
    pub grace_period_days: u8,
}

impl Config {
    /// Returns the [`group::Rules`] applied when none are specified.
    #[must_use]
    pub fn default_rules(&self) -> group::Rules {
        group::Rules {
            grace_period_days: self.grace_period_days,
            penalty: group::Penalty::Rate(self.exit_penalty_rate),
            auto_start_when_full: true,
            minimum_participants: self.min_participants,
            allow_partial_payments: false,
        }
    }
}

/// [`Command`] for creating a new [`Group`].
#[derive(Clone, Debug)]
pub struct CreateGroup {
    /// [`user::Identity`] of the creator.
    pub initiator: user::Identity,

    /// Name of the new [`Group`].
    pub name: group::Name,

    /// Contribution per round.
    pub contribution: Money,

    /// Frequency of rounds.
    pub frequency: group::Frequency,

    /// Maximum number of participants.
    pub max_participants: u8,

    /// Indicator whether the new [`Group`] is private.
    pub is_private: bool,

    /// [`DateTime`] the first round starts at.
    pub start_date: DateTime,

    /// [`group::Rules`] of the new [`Group`], if they differ from the
    /// [`Config::default_rules()`].
    pub rules: Option<group::Rules>,

    /// Indicator whether the new [`Group`] should be kept as a draft, not
    /// open for joining yet.
    pub draft: bool,
}

impl<Db, Acc, Ntf, Anl> Command<CreateGroup> for Service<Db, Acc, Ntf, Anl>
where
    Self: Command<
        GenerateAccessCode,
        Ok = AccessCode,
        Err = Traced<generate_access_code::ExecutionError>,
    >,
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Lock<By<User, user::Id>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<RunningCount, user::Id>>,
            Ok = RunningCount,
            Err = Traced<database::Error>,
        > + Database<Insert<Group>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
    Ntf: Notifier<Perform<notification::Event>, Ok = (), Err: Display>,
    Anl: Analytics<Perform<analytics::Event>, Ok = (), Err: Display>,
{
    type Ok = Group;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: CreateGroup) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CreateGroup {
            initiator,
            name,
            contribution,
            frequency,
            max_participants,
            is_private,
            start_date,
            rules,
            draft,
        } = cmd;
        let config = self.config().membership;
        let rules = rules.unwrap_or_else(|| config.default_rules());
        let now = DateTime::now();

        if contribution.amount < config.minimum_contribution {
            return Err(tracerr::new!(E::ContributionTooLow(contribution)));
        }
        if !(config.min_participants..=config.max_participants)
            .contains(&max_participants)
        {
            return Err(tracerr::new!(E::ParticipantsOutOfRange(
                max_participants
            )));
        }
        if !(config.min_participants..=max_participants)
            .contains(&rules.minimum_participants)
        {
            return Err(tracerr::new!(E::MinimumOutOfRange(
                rules.minimum_participants
            )));
        }
        let tomorrow = now.start_of_day() + Duration::from_secs(24 * 60 * 60);
        if start_date < tomorrow {
            return Err(tracerr::new!(E::StartDateTooEarly(start_date)));
        }

        let access_code = self
            .execute(GenerateAccessCode)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        // Avoid concurrent creations exceeding the quota.
        tx.execute(Lock(By::<User, _>::new(initiator.id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        if !draft {
            let running = tx
                .execute(Select(By::<RunningCount, _>::new(initiator.id)))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?;
            let running = usize::from(running);
            if running >= config.max_active_groups_per_creator {
                return Err(tracerr::new!(E::QuotaExceeded(running)));
            }
        }

        let group = Group::new(
            group::Draft {
                creator_id: initiator.id,
                name,
                contribution,
                frequency,
                max_participants,
                is_private,
                rules,
                start_date,
            },
            access_code,
            if draft {
                group::Status::Draft
            } else {
                group::Status::Recruiting
            },
            now,
        );

        tx.execute(Insert(group.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        log::info!(
            "`Group(id: {})` created by `User(id: {})` with `{}` code",
            group.id,
            group.creator_id,
            group.access_code,
        );
        self.notify([notification::Event::GroupCreated {
            group_id: group.id,
            creator_id: group.creator_id,
        }])
        .await;
        self.track(analytics::Event::new(
            analytics::Kind::GroupCreated,
            group.id,
            Some(initiator.id),
        ))
        .await;

        Ok(group)
    }
}

/// Error of [`CreateGroup`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// Free [`AccessCode`] couldn't be generated.
    #[display("Failed to generate `AccessCode`: {_0}")]
    #[from]
    AccessCode(generate_access_code::ExecutionError),

    /// Contribution is lower than allowed.
    #[display("Contribution `{_0}` is too low")]
    ContributionTooLow(#[error(not(source))] Money),

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// Minimum number of participants is out of the allowed range.
    #[display("Minimum of {_0} participants is out of the allowed range")]
    MinimumOutOfRange(#[error(not(source))] u8),

    /// Maximum number of participants is out of the allowed range.
    #[display("Maximum of {_0} participants is out of the allowed range")]
    ParticipantsOutOfRange(#[error(not(source))] u8),

    /// [`User`] already runs too many [`Group`]s.
    #[display("`User` already runs {_0} groups")]
    QuotaExceeded(#[error(not(source))] usize),

    /// First round can't start earlier than tomorrow.
    #[display("Start date `{}` is earlier than tomorrow", _0.to_rfc3339())]
    StartDateTooEarly(#[error(not(source))] DateTime),
}

impl Categorize for ExecutionError {
    fn kind(&self) -> Kind {
        match self {
            Self::AccessCode(e) => e.kind(),
            Self::Db(e) => e.kind(),
            Self::ContributionTooLow(_)
            | Self::MinimumOutOfRange(_)
            | Self::ParticipantsOutOfRange(_)
            | Self::StartDateTooEarly(_) => Kind::Validation,
            Self::QuotaExceeded(_) => Kind::Capacity,
        }
    }

    fn is_retryable(&self) -> bool {
        match self {
            Self::AccessCode(e) => e.is_retryable(),
            Self::Db(e) => e.is_retryable(),
            Self::ContributionTooLow(_)
            | Self::MinimumOutOfRange(_)
            | Self::ParticipantsOutOfRange(_)
            | Self::QuotaExceeded(_)
            | Self::StartDateTooEarly(_) => false,
        }
    }
}
