//! [`PaymentSummary`] definition.

use common::{
    operations::{By, Select},
    DateTime, Money,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{
        group::{self, round},
        user, Group,
    },
    error::{Categorize, Kind},
    infra::{database, Database},
    Query, Service,
};

/// [`Query`] summarizing contributions to a [`round::Round`] of a [`Group`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PaymentSummary {
    /// ID of the [`Group`] to summarize.
    pub group_id: group::Id,

    /// [`round::Number`] to summarize, the current one if not specified.
    pub round: Option<round::Number>,
}

/// Output of the [`PaymentSummary`] [`Query`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Output {
    /// Summarized [`round::Number`].
    pub round: round::Number,

    /// [`round::Status`] of the summarized round.
    pub status: round::Status,

    /// ID of the [`user::User`] receiving the payout, if the seat is taken.
    pub recipient_id: Option<user::Id>,

    /// [`DateTime`] contributions are due at.
    pub due_at: DateTime,

    /// Contributions classified by their status.
    pub summary: round::Summary,

    /// Amount collected so far.
    pub total_collected: Money,

    /// Amount the round pays out once fully paid.
    pub expected_total: Money,

    /// IDs of the [`user::User`]s who still owe their contribution.
    pub outstanding: Vec<user::Id>,
}

impl<Db, Acc, Ntf, Anl> Query<PaymentSummary> for Service<Db, Acc, Ntf, Anl>
where
    Db: Database<
        Select<By<Option<Group>, group::Id>>,
        Ok = Option<Group>,
        Err = Traced<database::Error>,
    >,
{
    type Ok = Output;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        PaymentSummary { group_id, round }: PaymentSummary,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let group = self
            .database()
            .execute(Select(By::<Option<Group>, _>::new(group_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::GroupNotExists(group_id))
            .map_err(tracerr::wrap!())?;

        let number = round.unwrap_or(group.current_round);
        let round = group
            .round(number)
            .ok_or(E::RoundNotExists(number))
            .map_err(tracerr::wrap!())?;

        let payers = u32::try_from(round.expected_payers.len())
            .unwrap_or(u32::MAX);
        let expected_total = group
            .contribution
            .checked_mul(payers)
            .unwrap_or(group.contribution);
        let outstanding = round
            .expected_payers
            .iter()
            .copied()
            .filter(|&payer| {
                !round.payment_of(payer).is_some_and(|p| p.status.is_settled())
            })
            .collect();

        Ok(Output {
            round: round.number,
            status: round.status,
            recipient_id: round.recipient_id,
            due_at: round.due_at,
            summary: round.summary(),
            total_collected: round.total_collected,
            expected_total,
            outstanding,
        })
    }
}

/// Error of [`PaymentSummary`] [`Query`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Group`] with the provided ID does not exist.
    #[display("`Group(id: {_0})` does not exist")]
    GroupNotExists(#[error(not(source))] group::Id),

    /// [`Group`] has no round with the provided [`round::Number`].
    #[display("Round {_0} does not exist")]
    RoundNotExists(#[error(not(source))] round::Number),
}

impl Categorize for ExecutionError {
    fn kind(&self) -> Kind {
        match self {
            Self::Db(e) => e.kind(),
            Self::GroupNotExists(_) | Self::RoundNotExists(_) => {
                Kind::NotFound
            }
        }
    }
}

#[cfg(test)]
mod spec {
    use common::{Currency, Money};
    use rust_decimal::Decimal;

    use crate::{
        domain::group::{self, round},
        error::{Categorize as _, Kind},
        testing::{self, active_group, payment},
        Query as _,
    };

    use super::PaymentSummary;

    #[tokio::test]
    async fn summarizes_current_round() {
        let svc = testing::service();
        let (g, users) = active_group(&svc, 3).await;
        _ = svc.execute(payment(g.id, users[1])).await.unwrap();

        let out = svc
            .execute(PaymentSummary {
                group_id: g.id,
                round: None,
            })
            .await
            .unwrap();

        assert_eq!(out.round, round::Number::FIRST);
        assert_eq!(out.status, round::Status::Active);
        assert_eq!(out.recipient_id, Some(users[0]));
        assert_eq!(out.summary.on_time, 1);
        assert_eq!(out.summary.missing, 2);
        assert_eq!(
            out.total_collected,
            Money::new(Decimal::from(1000), Currency::Htg),
        );
        assert_eq!(
            out.expected_total,
            Money::new(Decimal::from(3000), Currency::Htg),
        );
        assert_eq!(out.outstanding, [users[0], users[2]]);
    }

    #[tokio::test]
    async fn summarizes_settled_round() {
        let svc = testing::service();
        let (g, users) = active_group(&svc, 3).await;
        for &user in &users {
            _ = svc.execute(payment(g.id, user)).await.unwrap();
        }

        let out = svc
            .execute(PaymentSummary {
                group_id: g.id,
                round: Some(round::Number::FIRST),
            })
            .await
            .unwrap();

        assert_eq!(out.status, round::Status::Completed);
        assert_eq!(out.summary.on_time, 3);
        assert!(out.outstanding.is_empty());
        assert_eq!(out.total_collected, out.expected_total);
    }

    #[tokio::test]
    async fn fails_on_unknown_round_or_group() {
        let svc = testing::service();
        let (g, _) = active_group(&svc, 3).await;

        let round = svc
            .execute(PaymentSummary {
                group_id: g.id,
                round: Some(round::Number::from(9)),
            })
            .await
            .unwrap_err();
        let group = svc
            .execute(PaymentSummary {
                group_id: group::Id::new(),
                round: None,
            })
            .await
            .unwrap_err();

        assert_eq!(round.kind(), Kind::NotFound);
        assert_eq!(group.kind(), Kind::NotFound);
    }
}
