//! [`Command`] for recording a contribution to a [`Group`].

use common::{
    operations::{
        By, Commit, Insert, Lock, Perform, Select, Transact, Transacted,
        Update,
    },
    DateTime, Money,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{
        group::{self, payment, round, Payment},
        user, Distribution, Group,
    },
    error::{Categorize, Kind},
    infra::{
        analytics, database, notification, Analytics, Database, Notifier,
    },
    Service,
};

use super::{apply_distribution, turn_reminder, ApplyDistribution, Command};

/// [`Command`] for recording a contribution of a [`user::User`] to the
/// current [`round::Round`] of a [`Group`].
///
/// Completing the [`round::Round`] settles it and pays its pooled amount out
/// to the recipient.
#[derive(Clone, Debug)]
pub struct RecordPayment {
    /// [`user::Identity`] of the paying [`user::User`].
    pub initiator: user::Identity,

    /// ID of the [`Group`] to contribute to.
    pub group_id: group::Id,

    /// Paid amount.
    pub amount: Money,

    /// [`payment::Method`] of the contribution.
    pub method: payment::Method,

    /// [`round::Number`] the contribution is made for, if specified.
    ///
    /// Must point to the current [`round::Round`].
    pub round: Option<round::Number>,

    /// Reference of the contribution in an external ledger, if any.
    pub transaction_ref: Option<payment::TransactionRef>,
}

/// Output of [`RecordPayment`] [`Command`].
#[derive(Clone, Debug)]
pub struct Output {
    /// [`Group`] after the contribution.
    pub group: Group,

    /// Recorded [`Payment`].
    pub payment: Payment,

    /// Applied [`Distribution`], if the contribution completed the round.
    pub distribution: Option<Distribution>,
}

impl<Db, Acc, Ntf, Anl> Command<RecordPayment> for Service<Db, Acc, Ntf, Anl>
where
    Self: Command<
        ApplyDistribution,
        Ok = Distribution,
        Err = Traced<apply_distribution::ExecutionError>,
    >,
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
        > + Database<Insert<Distribution>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
    Ntf: Notifier<Perform<notification::Event>, Ok = (), Err: Display>,
    Anl: Analytics<Perform<analytics::Event>, Ok = (), Err: Display>,
{
    type Ok = Output;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: RecordPayment) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let RecordPayment {
            initiator,
            group_id,
            amount,
            method,
            round,
            transaction_ref,
        } = cmd;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        // Avoid concurrent payments racing to complete the round.
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

        let now = DateTime::now();
        let recorded = group
            .record_payment(
                initiator.id,
                amount,
                method,
                round,
                transaction_ref,
                now,
            )
            .map_err(tracerr::from_and_wrap!(=> E))?;

        let distribution = if recorded.completes_round {
            let settlement = group
                .settle_round(now)
                .map_err(tracerr::from_and_wrap!(=> E))?;
            let distribution = Distribution::new(group.id, &settlement, now);
            tx.execute(Insert(distribution.clone()))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))
                .map(drop)?;
            Some(distribution)
        } else {
            None
        };

        group.version = tx
            .execute(Update(group.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let payment = recorded.payment;
        log::info!(
            "`User(id: {})` paid `{}` for round {} of `Group(id: {})`",
            payment.payer_id,
            amount,
            payment.round,
            group.id,
        );

        let mut events = vec![notification::Event::PaymentReceived {
            group_id: group.id,
            round: payment.round,
            payer_id: payment.payer_id,
            amount,
        }];
        if recorded.is_late {
            let warning_count = group
                .participant(payment.payer_id)
                .map_or(0, |p| p.warning_count);
            log::info!(
                "`User(id: {})` paid late, {warning_count} warnings",
                payment.payer_id,
            );
            events.push(notification::Event::LatePayment {
                group_id: group.id,
                round: payment.round,
                payer_id: payment.payer_id,
                warning_count,
            });
        }
        if let Some(d) = &distribution {
            log::info!(
                "round {} of `Group(id: {})` settled for `User(id: {})`",
                d.round,
                group.id,
                d.recipient_id,
            );
            if group.status == group::Status::Completed {
                log::info!("`Group(id: {})` completed", group.id);
                events.push(notification::Event::GroupCompleted {
                    group_id: group.id,
                });
            } else {
                events.extend(turn_reminder(&group));
            }
        }
        self.notify(events).await;
        self.track(analytics::Event::new(
            analytics::Kind::PaymentRecorded,
            group.id,
            Some(initiator.id),
        ))
        .await;

        let distribution = match distribution {
            Some(d) => {
                self.track(analytics::Event::new(
                    analytics::Kind::RoundCompleted,
                    group.id,
                    None,
                ))
                .await;

                let applied = self
                    .execute(ApplyDistribution { distribution_id: d.id })
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))?;
                Some(applied)
            }
            None => None,
        };

        Ok(Output {
            group,
            payment,
            distribution,
        })
    }
}

/// Error of [`RecordPayment`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// Payout of the completed round failed.
    ///
    /// The contribution itself is recorded, and the payout stays pending.
    #[display("Payout failed: {_0}")]
    #[from]
    Distribution(apply_distribution::ExecutionError),

    /// [`Group`] refused the contribution.
    #[display("Failed to record payment: {_0}")]
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
            Self::Distribution(e) => e.kind(),
            Self::Group(e) => e.kind(),
            Self::GroupNotExists(_) => Kind::NotFound,
        }
    }

    fn is_retryable(&self) -> bool {
        match self {
            Self::Db(e) => e.is_retryable(),
            Self::Distribution(e) => e.is_retryable(),
            Self::Group(e) => e.is_retryable(),
            Self::GroupNotExists(_) => false,
        }
    }
}

#[cfg(test)]
mod spec {
    use common::{Currency, Money};
    use futures::future;
    use rust_decimal::Decimal;

    use crate::{
        command::ApplyDistribution,
        domain::{
            distribution,
            group::{self, round, Position},
        },
        error::{Categorize as _, Kind},
        infra::notification,
        query,
        testing::{self, active_group, payment},
        Command as _,
    };

    use super::{ExecutionError as E, RecordPayment};

    fn htg(amount: i64) -> Money {
        Money::new(Decimal::from(amount), Currency::Htg)
    }

    #[tokio::test]
    async fn pays_first_round_out_to_first_position() {
        let svc = testing::service();
        let (g, users) = active_group(&svc, 3).await;
        assert_eq!(g.next_recipient_position, Some(Position::FIRST));

        let mut outputs = vec![];
        for &user in &users {
            outputs.push(svc.execute(payment(g.id, user)).await.unwrap());
        }

        assert!(outputs[..2].iter().all(|o| o.distribution.is_none()));
        let last = outputs.pop().unwrap();
        let d = last.distribution.unwrap();
        assert_eq!(d.status, distribution::Status::Applied);
        assert_eq!(d.recipient_id, users[0]);
        assert_eq!(d.amount, htg(3000));
        assert_eq!(last.group.current_round, round::Number::from(2));
        assert_eq!(
            last.group.next_recipient_position,
            Some(Position::from(2_u8)),
        );
        assert!(last.group.participants[0].has_received);
        assert_eq!(svc.ledger().balance_of(users[0]), Some(htg(3000)));
        assert_eq!(svc.ledger().balance_of(users[1]), Some(htg(0)));
    }

    #[tokio::test]
    async fn completes_group_once_everyone_received() {
        let svc = testing::service();
        let (g, users) = active_group(&svc, 3).await;

        let mut last = None;
        for _ in 0..3 {
            for &user in &users {
                last = Some(svc.execute(payment(g.id, user)).await.unwrap());
            }
        }

        let g = last.unwrap().group;
        assert_eq!(g.status, group::Status::Completed);
        assert_eq!(g.history.len(), 3);
        assert_eq!(svc.ledger().transfers(), 3);
        for user in users {
            assert_eq!(svc.ledger().balance_of(user), Some(htg(3000)));
        }
        assert!(svc.outbox().events().iter().any(|e| matches!(
            e,
            notification::Event::GroupCompleted { group_id } if *group_id == g.id,
        )));
    }

    #[tokio::test]
    async fn rejects_duplicate_payment() {
        let svc = testing::service();
        let (g, users) = active_group(&svc, 3).await;
        _ = svc.execute(payment(g.id, users[1])).await.unwrap();

        let err = svc.execute(payment(g.id, users[1])).await.unwrap_err();

        assert_eq!(err.kind(), Kind::Conflict);
        assert!(matches!(
            err.as_ref(),
            E::Group(group::Error::DuplicatePayment { .. }),
        ));
    }

    #[tokio::test]
    async fn rejects_partial_amount_when_not_allowed() {
        let svc = testing::service();
        let (g, users) = active_group(&svc, 3).await;

        let err = svc
            .execute(RecordPayment {
                amount: htg(500),
                ..payment(g.id, users[2])
            })
            .await
            .unwrap_err();

        assert_eq!(err.kind(), Kind::Validation);
        let g = svc
            .execute(query::group::ById::by(g.id))
            .await
            .unwrap()
            .unwrap();
        let round = g.current().unwrap();
        assert!(round.payments.is_empty());
        assert!(!round.is_fully_paid());
    }

    #[tokio::test]
    async fn rejects_strangers_and_missing_groups() {
        let svc = testing::service();
        let (g, _) = active_group(&svc, 3).await;

        let stranger = svc
            .execute(payment(g.id, crate::domain::user::Id::new()))
            .await
            .unwrap_err();
        let missing = svc
            .execute(payment(group::Id::new(), crate::domain::user::Id::new()))
            .await
            .unwrap_err();

        assert_eq!(stranger.kind(), Kind::Authorization);
        assert_eq!(missing.kind(), Kind::NotFound);
    }

    #[tokio::test]
    async fn distributes_once_under_concurrent_completion() {
        let svc = testing::service();
        let (g, users) = active_group(&svc, 3).await;
        _ = svc.execute(payment(g.id, users[0])).await.unwrap();

        let outputs = future::join_all([
            svc.execute(payment(g.id, users[1])),
            svc.execute(payment(g.id, users[2])),
        ])
        .await;

        let settled = outputs
            .into_iter()
            .map(Result::unwrap)
            .filter(|o| o.distribution.is_some())
            .count();
        assert_eq!(settled, 1);
        assert_eq!(svc.ledger().transfers(), 1);
        assert_eq!(svc.ledger().balance_of(users[0]), Some(htg(3000)));
    }

    #[tokio::test]
    async fn keeps_payment_when_payout_fails() {
        let svc = testing::service();
        let (g, users) = active_group(&svc, 3).await;
        svc.ledger().fail_next(1);

        _ = svc.execute(payment(g.id, users[0])).await.unwrap();
        _ = svc.execute(payment(g.id, users[1])).await.unwrap();
        let err = svc.execute(payment(g.id, users[2])).await.unwrap_err();

        assert_eq!(err.kind(), Kind::TransferFailure);
        assert!(err.is_retryable());

        let g = svc
            .execute(query::group::ById::by(g.id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(g.current_round, round::Number::from(2));
        assert_eq!(g.history.len(), 1);

        let pending = svc
            .execute(query::distribution::ForRound::by((
                g.id,
                round::Number::FIRST,
            )))
            .await
            .unwrap()
            .unwrap();
        assert!(pending.is_pending());
        assert_eq!(pending.attempts, 1);
        assert_eq!(svc.ledger().balance_of(users[0]), Some(htg(0)));

        let applied = svc
            .execute(ApplyDistribution {
                distribution_id: pending.id,
            })
            .await
            .unwrap();
        assert_eq!(applied.status, distribution::Status::Applied);
        assert_eq!(svc.ledger().balance_of(users[0]), Some(htg(3000)));

        let again = svc
            .execute(ApplyDistribution {
                distribution_id: pending.id,
            })
            .await
            .unwrap();
        assert_eq!(again.transfer_id, applied.transfer_id);
        assert_eq!(svc.ledger().transfers(), 1);
        assert_eq!(svc.ledger().balance_of(users[0]), Some(htg(3000)));
    }

    #[tokio::test]
    async fn reminds_next_beneficiary_after_settlement() {
        let svc = testing::service();
        let (g, users) = active_group(&svc, 3).await;

        for &user in &users {
            _ = svc.execute(payment(g.id, user)).await.unwrap();
        }

        let reminders = svc
            .outbox()
            .events()
            .into_iter()
            .filter_map(|e| match e {
                notification::Event::TurnReminder {
                    round, beneficiary, ..
                } => Some((round, beneficiary)),
                _ => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(
            reminders,
            [
                (round::Number::FIRST, users[0]),
                (round::Number::from(2), users[1]),
            ],
        );
    }
}
