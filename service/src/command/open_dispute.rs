//! [`Command`] for opening a [`Dispute`] in a [`Group`].

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
        group::{self, dispute, Dispute},
        user, Group,
    },
    error::{Categorize, Kind},
    infra::{analytics, database, Analytics, Database},
    Service,
};

use super::Command;

/// [`Command`] for opening a [`Dispute`] in a [`Group`].
///
/// Only participants of the [`Group`] may open [`Dispute`]s, and only
/// against other participants.
#[derive(Clone, Debug)]
pub struct OpenDispute {
    /// [`user::Identity`] of the reporting [`user::User`].
    pub initiator: user::Identity,

    /// ID of the [`Group`] to open the [`Dispute`] in.
    pub group_id: group::Id,

    /// ID of the [`user::User`] the [`Dispute`] is raised against, if any.
    pub against: Option<user::Id>,

    /// [`dispute::Kind`] of the [`Dispute`].
    pub kind: dispute::Kind,

    /// [`dispute::Description`] of the [`Dispute`].
    pub description: dispute::Description,
}

impl<Db, Acc, Ntf, Anl> Command<OpenDispute> for Service<Db, Acc, Ntf, Anl>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
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
    Anl: Analytics<Perform<analytics::Event>, Ok = (), Err: Display>,
{
    type Ok = Dispute;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: OpenDispute) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let OpenDispute {
            initiator,
            group_id,
            against,
            kind,
            description,
        } = cmd;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        // Avoid lost updates of the `Group` document.
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

        let dispute = group
            .open_dispute(
                initiator.id,
                against,
                kind,
                description,
                DateTime::now(),
            )
            .map_err(tracerr::from_and_wrap!(=> E))?
            .clone();

        group.version = tx
            .execute(Update(group.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        log::info!(
            "`Dispute(id: {})` of `{}` kind opened in `Group(id: {})` by \
             `User(id: {})`",
            dispute.id,
            dispute.kind,
            group.id,
            initiator.id,
        );
        self.track(analytics::Event::new(
            analytics::Kind::DisputeUpdated,
            group.id,
            Some(initiator.id),
        ))
        .await;

        Ok(dispute)
    }
}

/// Error of [`OpenDispute`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Group`] refused the [`Dispute`].
    #[display("Failed to open dispute: {_0}")]
    #[from]
    Group(group::Error),

    /// [`Group`] with the provided ID does not exist.
    #[display("`Group(id: {_0})` does not exist")]
    GroupNotExists(#[error(not(source))] group::Id),
}

impl Categorize for ExecutionError {
    fn kind(&self) -> Kind {
        match self {
            Self::Db(e) => e.kind(),
            Self::Group(e) => e.kind(),
            Self::GroupNotExists(_) => Kind::NotFound,
        }
    }

    fn is_retryable(&self) -> bool {
        match self {
            Self::Db(e) => e.is_retryable(),
            Self::Group(e) => e.is_retryable(),
            Self::GroupNotExists(_) => false,
        }
    }
}
