//! [`Command`] for joining a [`Group`] by its [`AccessCode`].

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
    domain::{
        group::{self, AccessCode},
        user, Group,
    },
    error::{Categorize, Kind},
    infra::{
        analytics, database, notification, Analytics, Database, Notifier,
    },
    Service,
};

use super::{started_events, Command};

/// [`Command`] for joining a [`Group`] by its [`AccessCode`].
///
/// The joining [`user::User`] takes the lowest free position. Filling the
/// last seat of a [`Group`] starting automatically activates it.
#[derive(Clone, Debug)]
pub struct JoinGroup {
    /// [`user::Identity`] of the joining [`user::User`].
    pub initiator: user::Identity,

    /// [`AccessCode`] of the [`Group`] to join.
    pub access_code: AccessCode,
}

impl<Db, Acc, Ntf, Anl> Command<JoinGroup> for Service<Db, Acc, Ntf, Anl>
where
    Db: Database<Transact, Err = Traced<database::Error>>
        + Database<
            Select<By<Option<Group>, AccessCode>>,
            Ok = Option<Group>,
            Err = Traced<database::Error>,
        >,
    Transacted<Db>: Database<
            Lock<By<Group, group::Id>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Group>, group::Id>>,
            Ok = Option<Group>,
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

    async fn execute(&self, cmd: JoinGroup) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let JoinGroup {
            initiator,
            access_code,
        } = cmd;

        let group_id = self
            .database()
            .execute(Select(By::<Option<Group>, _>::new(access_code.clone())))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .filter(|g| g.status != group::Status::Draft)
            .ok_or_else(|| E::CodeNotExists(access_code.clone()))
            .map_err(tracerr::wrap!())?
            .id;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        // Avoid concurrent seat assignments.
        tx.execute(Lock(By::<Group, _>::new(group_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let mut group = tx
            .execute(Select(By::<Option<Group>, _>::new(group_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .filter(|g| {
                g.access_code == access_code
                    && g.status != group::Status::Draft
                    && !g.status.is_terminal()
            })
            .ok_or_else(|| E::CodeNotExists(access_code.clone()))
            .map_err(tracerr::wrap!())?;

        let now = DateTime::now();
        let enrollment = group
            .enroll(initiator.id, now)
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
            "`User(id: {})` joined `Group(id: {})` at position {}",
            initiator.id,
            group.id,
            enrollment.participant.position,
        );
        let mut events = vec![notification::Event::ParticipantJoined {
            group_id: group.id,
            user_id: initiator.id,
            position: enrollment.participant.position,
        }];
        if enrollment.started {
            log::info!("`Group(id: {})` started", group.id);
            events.extend(started_events(&group));
        }
        self.notify(events).await;
        self.track(analytics::Event::new(
            analytics::Kind::GroupJoined,
            group.id,
            Some(initiator.id),
        ))
        .await;

        Ok(group)
    }
}

/// Error of [`JoinGroup`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// No running [`Group`] holds the [`AccessCode`].
    #[display("No `Group` with `{_0}` access code")]
    CodeNotExists(#[error(not(source))] AccessCode),

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Group`] refused the [`user::User`].
    #[display("Failed to join: {_0}")]
    #[from]
    Group(group::Error),
}

impl Categorize for ExecutionError {
    fn kind(&self) -> Kind {
        match self {
            Self::CodeNotExists(_) => Kind::NotFound,
            Self::Db(e) => e.kind(),
            Self::Group(e) => e.kind(),
        }
    }

    fn is_retryable(&self) -> bool {
        match self {
            Self::CodeNotExists(_) => false,
            Self::Db(e) => e.is_retryable(),
            Self::Group(e) => e.is_retryable(),
        }
    }
}
