//! [`Command`] for leaving a [`Group`].

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
    domain::{group, user, Group},
    error::{Categorize, Kind},
    infra::{analytics, database, Analytics, Database},
    Service,
};

use super::Command;

/// [`Command`] for leaving a [`Group`].
///
/// Leaving a started [`Group`] is refused with the quoted exit penalty.
#[derive(Clone, Debug)]
pub struct LeaveGroup {
    /// [`user::Identity`] of the leaving [`user::User`].
    pub initiator: user::Identity,

    /// ID of the [`Group`] to leave.
    pub group_id: group::Id,

    /// [`group::Reason`] of leaving, if any.
    pub reason: Option<group::Reason>,
}

impl<Db, Acc, Ntf, Anl> Command<LeaveGroup> for Service<Db, Acc, Ntf, Anl>
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
    type Ok = Group;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: LeaveGroup) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let LeaveGroup {
            initiator,
            group_id,
            reason,
        } = cmd;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        // Avoid concurrent seat reassignments.
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

        let withdrawal = group
            .withdraw(initiator.id, reason, DateTime::now())
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
            "`User(id: {})` left `Group(id: {})`",
            withdrawal.participant.user_id,
            group.id,
        );
        if withdrawal.cancelled {
            log::info!(
                "`Group(id: {})` cancelled after `User(id: {})` left",
                group.id,
                withdrawal.participant.user_id,
            );
        }
        self.track(analytics::Event::new(
            analytics::Kind::GroupLeft,
            group.id,
            Some(initiator.id),
        ))
        .await;

        Ok(group)
    }
}

/// Error of [`LeaveGroup`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Group`] refused to let the [`user::User`] go.
    #[display("Failed to leave: {_0}")]
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

#[cfg(test)]
mod spec {
    use common::{Currency, Money};
    use rust_decimal::Decimal;

    use crate::{
        command::JoinGroup,
        domain::{group, user},
        error::{Categorize as _, Kind},
        testing::{self, active_group, create_group, payment},
        Command as _,
    };

    use super::{ExecutionError as E, LeaveGroup};

    fn leave(group_id: group::Id, user: user::Id) -> LeaveGroup {
        LeaveGroup {
            initiator: user::Identity::user(user),
            group_id,
            reason: None,
        }
    }

    #[tokio::test]
    async fn quotes_penalty_for_leaving_active_group() {
        let svc = testing::service();
        let (g, users) = active_group(&svc, 3).await;

        let err = svc.execute(leave(g.id, users[1])).await.unwrap_err();

        assert_eq!(err.kind(), Kind::State);
        assert!(matches!(
            err.as_ref(),
            E::Group(group::Error::PenaltyRequired(p))
                if *p == Money::new(Decimal::from(100), Currency::Htg),
        ));
    }

    #[tokio::test]
    async fn forbids_leaving_after_receiving_payout() {
        let svc = testing::service();
        let (g, users) = active_group(&svc, 3).await;
        for &user in &users {
            _ = svc.execute(payment(g.id, user)).await.unwrap();
        }

        let err = svc.execute(leave(g.id, users[0])).await.unwrap_err();

        assert_eq!(err.kind(), Kind::State);
        assert!(matches!(
            err.as_ref(),
            E::Group(group::Error::CannotLeaveAfterReceiving),
        ));
    }

    #[tokio::test]
    async fn cancels_recruiting_group_below_minimum() {
        let svc = testing::service();
        let creator = user::Id::new();
        let mut g = svc.execute(create_group(creator, 5)).await.unwrap();
        let members = [user::Id::new(), user::Id::new()];
        for &id in &members {
            g = svc
                .execute(JoinGroup {
                    initiator: user::Identity::user(id),
                    access_code: g.access_code.clone(),
                })
                .await
                .unwrap();
        }
        assert_eq!(g.status, group::Status::Recruiting);

        let g = svc.execute(leave(g.id, members[0])).await.unwrap();

        assert_eq!(g.status, group::Status::Cancelled);
        assert_eq!(g.participants.len(), 2);
        assert!(!g.is_participant(members[0]));
    }

    #[tokio::test]
    async fn frees_seat_of_recruiting_group() {
        let svc = testing::service();
        let creator = user::Id::new();
        let mut g = svc.execute(create_group(creator, 5)).await.unwrap();
        let members = [user::Id::new(), user::Id::new(), user::Id::new()];
        for &id in &members {
            g = svc
                .execute(JoinGroup {
                    initiator: user::Identity::user(id),
                    access_code: g.access_code.clone(),
                })
                .await
                .unwrap();
        }

        let g = svc.execute(leave(g.id, members[0])).await.unwrap();

        assert_eq!(g.status, group::Status::Recruiting);
        assert_eq!(g.participants.len(), 3);
        assert_eq!(g.rounds[1].recipient_id, Some(members[1]));
        assert_eq!(g.rounds[3].recipient_id, None);
    }

    #[tokio::test]
    async fn cancels_group_abandoned_by_creator() {
        let svc = testing::service();
        let creator = user::Id::new();
        let g = svc.execute(create_group(creator, 3)).await.unwrap();

        let g = svc.execute(leave(g.id, creator)).await.unwrap();
        assert_eq!(g.status, group::Status::Cancelled);
        assert!(g.participants.is_empty());

        let err = svc
            .execute(JoinGroup {
                initiator: user::Identity::user(user::Id::new()),
                access_code: g.access_code,
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), Kind::NotFound);
    }

    #[tokio::test]
    async fn fails_on_unknown_group() {
        let svc = testing::service();

        let err = svc
            .execute(leave(group::Id::new(), user::Id::new()))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), Kind::NotFound);
    }
}
