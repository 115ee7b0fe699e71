//! [`Command`] for moving a [`Group`] through its lifecycle.

use common::{
    operations::{
        By, Commit, Lock, Perform, Select, Transact, Transacted, Update,
    },
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{group, user, Group, User},
    error::{Categorize, Kind},
    infra::{
        analytics, database, notification, Analytics, Database, Notifier,
    },
    read::group::RunningCount,
    Service,
};

use super::{started_events, Command};

/// [`Command`] for moving a [`Group`] through its lifecycle.
///
/// Only the creator of the [`Group`] or a platform operator may execute it.
#[derive(Clone, Debug)]
pub struct ChangeGroupStatus {
    /// [`user::Identity`] of the [`User`] changing the status.
    pub initiator: user::Identity,

    /// ID of the [`Group`] to change the status of.
    pub group_id: group::Id,

    /// [`Action`] to perform.
    pub action: Action,
}

/// Lifecycle action on a [`Group`].
#[derive(Clone, Debug)]
pub enum Action {
    /// Opens a drafted [`Group`] for joining.
    Publish,

    /// Starts the rotation of a recruiting [`Group`] ahead of it being full.
    Start,

    /// Pauses the rotation.
    Pause(group::Reason),

    /// Resumes the paused rotation.
    Resume(group::Reason),

    /// Abandons the [`Group`].
    Cancel(group::Reason),
}

impl<Db, Acc, Ntf, Anl> Command<ChangeGroupStatus> for Service<Db, Acc, Ntf, Anl>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Lock<By<Group, group::Id>>,
            Err = Traced<database::Error>,
        > + Database<Lock<By<User, user::Id>>, Err = Traced<database::Error>>
        + Database<
            Select<By<Option<Group>, group::Id>>,
            Ok = Option<Group>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<RunningCount, user::Id>>,
            Ok = RunningCount,
            Err = Traced<database::Error>,
        > + Database<
            Update<Group>,
            Ok = group::Version,
            Err = Traced<database::Error>,
        > + Database<Commit, Err = Traced<database::Error>>,
    Ntf: Notifier<Perform<notification::Event>, Ok = (), Err: Display>,
    Anl: Analytics<Perform<analytics::Event>, Ok = (), Err: Display>,
{
    type Ok = Group;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: ChangeGroupStatus,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let ChangeGroupStatus {
            initiator,
            group_id,
            action,
        } = cmd;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        // Avoid concurrent status changes.
        tx.execute(Lock(By::<Group, _>::new(group_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let mut group = tx
            .execute(Select(By::<Option<Group>, _>::new(group_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::GroupNotExists(group_id))
            .map_err(tracerr::wrap!())?;
        if !group.is_manageable_by(&initiator) {
            return Err(tracerr::new!(E::NotAuthorized(initiator.id)));
        }

        let now = DateTime::now();
        let from = group.status;
        match action {
            Action::Publish => {
                // Avoid concurrent publications exceeding the quota.
                tx.execute(Lock(By::<User, _>::new(group.creator_id)))
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))
                    .map(drop)?;

                let running = tx
                    .execute(Select(By::<RunningCount, _>::new(
                        group.creator_id,
                    )))
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))?;
                let running = usize::from(running);
                if running
                    >= self.config().membership.max_active_groups_per_creator
                {
                    return Err(tracerr::new!(E::QuotaExceeded(running)));
                }

                group.publish(now)
            }
            Action::Start => group.start(now),
            Action::Pause(reason) => group.pause(reason, now),
            Action::Resume(reason) => group.resume(reason, now),
            Action::Cancel(reason) => group.cancel(reason, now),
        }
        .map_err(tracerr::from_and_wrap!(=> E))?;

        group.version = tx
            .execute(Update(group.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        log::info!(
            "`Group(id: {})` moved from `{from}` to `{}` by `User(id: {})`",
            group.id,
            group.status,
            initiator.id,
        );
        if group.status == group::Status::Active
            && from == group::Status::Recruiting
        {
            self.notify(started_events(&group)).await;
        }
        self.track(analytics::Event::new(
            analytics::Kind::GroupStatusChanged,
            group.id,
            Some(initiator.id),
        ))
        .await;

        Ok(group)
    }
}

/// Error of [`ChangeGroupStatus`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Group`] refused the change.
    #[display("Failed to change status: {_0}")]
    #[from]
    Group(group::Error),

    /// [`Group`] with the provided ID does not exist.
    #[display("`Group(id: {_0})` does not exist")]
    GroupNotExists(#[error(not(source))] group::Id),

    /// [`User`] is neither the creator nor an operator.
    #[display("`User(id: {_0})` can't manage the group")]
    NotAuthorized(#[error(not(source))] user::Id),

    /// Creator already runs too many [`Group`]s to publish one more.
    #[display("Creator already runs {_0} groups")]
    QuotaExceeded(#[error(not(source))] usize),
}

impl Categorize for ExecutionError {
    fn kind(&self) -> Kind {
        match self {
            Self::Db(e) => e.kind(),
            Self::Group(e) => e.kind(),
            Self::GroupNotExists(_) => Kind::NotFound,
            Self::NotAuthorized(_) => Kind::Authorization,
            Self::QuotaExceeded(_) => Kind::Capacity,
        }
    }

    fn is_retryable(&self) -> bool {
        match self {
            Self::Db(e) => e.is_retryable(),
            Self::Group(e) => e.is_retryable(),
            Self::GroupNotExists(_)
            | Self::NotAuthorized(_)
            | Self::QuotaExceeded(_) => false,
        }
    }
}
