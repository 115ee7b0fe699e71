//! [`Command`] for settling a [`Dispute`].

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

/// [`Command`] for settling an open or investigated [`Dispute`], either with
/// a resolution or by dismissing it.
///
/// Only the creator of the [`Group`] or a platform operator may execute it.
#[derive(Clone, Debug)]
pub struct ResolveDispute {
    /// [`user::Identity`] of the resolving [`user::User`].
    pub initiator: user::Identity,

    /// ID of the [`Group`] the [`Dispute`] belongs to.
    pub group_id: group::Id,

    /// ID of the [`Dispute`] to resolve.
    pub dispute_id: dispute::Id,

    /// Resolution [`dispute::Note`], if any.
    pub note: Option<dispute::Note>,

    /// Indicator whether the [`Dispute`] should be closed as dismissed
    /// rather than resolved.
    pub dismiss: bool,
}

impl<Db, Acc, Ntf, Anl> Command<ResolveDispute> for Service<Db, Acc, Ntf, Anl>
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

    async fn execute(
        &self,
        cmd: ResolveDispute,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let ResolveDispute {
            initiator,
            group_id,
            dispute_id,
            note,
            dismiss,
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

        let to = if dismiss {
            dispute::Status::Closed
        } else {
            dispute::Status::Resolved
        };
        let dispute = group
            .move_dispute(dispute_id, to, note, DateTime::now())
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
            "`Dispute(id: {})` of `Group(id: {})` moved to `{}`",
            dispute.id,
            group.id,
            dispute.status,
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

/// Error of [`ResolveDispute`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Dispute`] can't be resolved.
    #[display("Failed to resolve dispute: {_0}")]
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

#[cfg(test)]
mod spec {
    use crate::{
        command::{OpenDispute, ReviewDispute},
        domain::{
            group::{self, dispute},
            user,
        },
        error::{Categorize as _, Kind},
        testing::{self, active_group},
        Command as _,
    };

    use super::ResolveDispute;

    fn open(
        group_id: group::Id,
        reporter: user::Id,
        against: Option<user::Id>,
    ) -> OpenDispute {
        OpenDispute {
            initiator: user::Identity::user(reporter),
            group_id,
            against,
            kind: dispute::Kind::NonPayment,
            description: dispute::Description::new("Never paid round 1")
                .unwrap(),
        }
    }

    #[tokio::test]
    async fn walks_dispute_to_resolution() {
        let svc = testing::service();
        let (g, users) = active_group(&svc, 3).await;

        let d = svc
            .execute(open(g.id, users[1], Some(users[2])))
            .await
            .unwrap();
        assert_eq!(d.status, dispute::Status::Open);
        assert_eq!(d.against_id, Some(users[2]));

        let d = svc
            .execute(ReviewDispute {
                initiator: user::Identity::user(users[0]),
                group_id: g.id,
                dispute_id: d.id,
            })
            .await
            .unwrap();
        assert_eq!(d.status, dispute::Status::Investigating);
        assert!(d.investigated_at.is_some());

        let d = svc
            .execute(ResolveDispute {
                initiator: user::Identity::user(users[0]),
                group_id: g.id,
                dispute_id: d.id,
                note: dispute::Note::new("Paid in cash later"),
                dismiss: false,
            })
            .await
            .unwrap();
        assert_eq!(d.status, dispute::Status::Resolved);
        assert!(d.resolved_at.is_some());
        assert_eq!(d.resolution, dispute::Note::new("Paid in cash later"));
    }

    #[tokio::test]
    async fn dismisses_open_dispute() {
        let svc = testing::service();
        let (g, users) = active_group(&svc, 3).await;
        let d = svc.execute(open(g.id, users[1], None)).await.unwrap();

        let d = svc
            .execute(ResolveDispute {
                initiator: user::Identity::user(users[0]),
                group_id: g.id,
                dispute_id: d.id,
                note: None,
                dismiss: true,
            })
            .await
            .unwrap();

        assert_eq!(d.status, dispute::Status::Closed);
    }

    #[tokio::test]
    async fn refuses_reopening_settled_dispute() {
        let svc = testing::service();
        let (g, users) = active_group(&svc, 3).await;
        let d = svc.execute(open(g.id, users[1], None)).await.unwrap();
        let resolve = ResolveDispute {
            initiator: user::Identity::user(users[0]),
            group_id: g.id,
            dispute_id: d.id,
            note: None,
            dismiss: false,
        };
        _ = svc.execute(resolve.clone()).await.unwrap();

        let err = svc.execute(resolve).await.unwrap_err();

        assert_eq!(err.kind(), Kind::State);
    }

    #[tokio::test]
    async fn restricts_moderation_to_managers() {
        let svc = testing::service();
        let (g, users) = active_group(&svc, 3).await;
        let d = svc.execute(open(g.id, users[1], None)).await.unwrap();

        let err = svc
            .execute(ReviewDispute {
                initiator: user::Identity::user(users[2]),
                group_id: g.id,
                dispute_id: d.id,
            })
            .await
            .unwrap_err();

        assert_eq!(err.kind(), Kind::Authorization);
    }

    #[tokio::test]
    async fn rejects_disputes_from_outsiders() {
        let svc = testing::service();
        let (g, users) = active_group(&svc, 3).await;

        let outsider = svc
            .execute(open(g.id, user::Id::new(), None))
            .await
            .unwrap_err();
        let against_outsider = svc
            .execute(open(g.id, users[1], Some(user::Id::new())))
            .await
            .unwrap_err();

        assert_eq!(outsider.kind(), Kind::Authorization);
        assert_eq!(against_outsider.kind(), Kind::Authorization);
    }

    #[tokio::test]
    async fn fails_on_unknown_dispute() {
        let svc = testing::service();
        let (g, users) = active_group(&svc, 3).await;

        let err = svc
            .execute(ResolveDispute {
                initiator: user::Identity::user(users[0]),
                group_id: g.id,
                dispute_id: dispute::Id::new(),
                note: None,
                dismiss: true,
            })
            .await
            .unwrap_err();

        assert_eq!(err.kind(), Kind::NotFound);
    }
}
