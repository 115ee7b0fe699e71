//! [`Command`] for taking a [`Dispute`] for investigation.

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

/// [`Command`] for taking an open [`Dispute`] for investigation.
///
/// Only the creator of the [`Group`] or a platform operator may execute it.
#[derive(Clone, Debug)]
pub struct ReviewDispute {
    /// [`user::Identity`] of the reviewing [`user::User`].
    pub initiator: user::Identity,

    /// ID of the [`Group`] the [`Dispute`] belongs to.
    pub group_id: group::Id,

    /// ID of the [`Dispute`] to review.
    pub dispute_id: dispute::Id,
}

impl<Db, Acc, Ntf, Anl> Command<ReviewDispute> for Service<Db, Acc, Ntf, Anl>
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

    async fn execute(&self, cmd: ReviewDispute) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let ReviewDispute {
            initiator,
            group_id,
            dispute_id,
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
        if !group.is_manageable_by(&initiator) {
            return Err(tracerr::new!(E::NotAuthorized(initiator.id)));
        }

        let dispute = group
            .move_dispute(
                dispute_id,
                dispute::Status::Investigating,
                None,
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
            "`Dispute(id: {})` of `Group(id: {})` taken for investigation",
            dispute.id,
            group.id,
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

/// Error of [`ReviewDispute`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Dispute`] can't be reviewed.
    #[display("Failed to review dispute: {_0}")]
    #[from]
    Group(group::Error),

    /// [`Group`] with the provided ID does not exist.
    #[display("`Group(id: {_0})` does not exist")]
    GroupNotExists(#[error(not(source))] group::Id),

    /// [`user::User`] is neither the creator nor an operator.
    #[display("`User(id: {_0})` can't moderate disputes")]
    NotAuthorized(#[error(not(source))] user::Id),
}

impl Categorize for ExecutionError {
    fn kind(&self) -> Kind {
        match self {
            Self::Db(e) => e.kind(),
            Self::Group(e) => e.kind(),
            Self::GroupNotExists(_) => Kind::NotFound,
            Self::NotAuthorized(_) => Kind::Authorization,
        }
    }

    fn is_retryable(&self) -> bool {
        match self {
            Self::Db(e) => e.is_retryable(),
            Self::Group(e) => e.is_retryable(),
            Self::GroupNotExists(_) | Self::NotAuthorized(_) => false,
        }
    }
}
