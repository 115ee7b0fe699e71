//! [`Command`] for paying a settled round out to its recipient.

use common::{
    operations::{
        By, Commit, Lock, Perform, Select, Transact, Transacted, Update,
    },
    DateTime, Money,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{
        account::{self, Transfer},
        distribution, user, Distribution,
    },
    error::{Categorize, Kind},
    infra::{
        self, account::Credit, analytics, database, Accounts, Analytics,
        Database,
    },
    Service,
};

use super::Command;

/// [`Command`] for crediting a pending [`Distribution`] to the [`Account`]
/// of its recipient.
///
/// Applying an already applied [`Distribution`] returns it unchanged. A
/// failed attempt is recorded on the [`Distribution`], which stays pending
/// for being retried.
///
/// [`Account`]: crate::domain::Account
#[derive(Clone, Copy, Debug)]
pub struct ApplyDistribution {
    /// ID of the [`Distribution`] to apply.
    pub distribution_id: distribution::Id,
}

impl<Db, Acc, Ntf, Anl> Command<ApplyDistribution>
    for Service<Db, Acc, Ntf, Anl>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Lock<By<Distribution, distribution::Id>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Distribution>, distribution::Id>>,
            Ok = Option<Distribution>,
            Err = Traced<database::Error>,
        > + Database<Update<Distribution>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
    Acc: Accounts<
            Select<By<Option<account::Id>, user::Id>>,
            Ok = Option<account::Id>,
            Err = Traced<infra::account::Error>,
        > + Accounts<
            Select<By<Money, account::Id>>,
            Ok = Money,
            Err = Traced<infra::account::Error>,
        > + Accounts<
            Perform<Credit>,
            Ok = Transfer,
            Err = Traced<infra::account::Error>,
        >,
    Anl: Analytics<Perform<analytics::Event>, Ok = (), Err: Display>,
{
    type Ok = Distribution;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: ApplyDistribution,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let ApplyDistribution { distribution_id } = cmd;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        // Avoid concurrent attempts crediting the same payout.
        tx.execute(Lock(By::<Distribution, _>::new(distribution_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let mut distribution = tx
            .execute(Select(By::<Option<Distribution>, _>::new(
                distribution_id,
            )))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::DistributionNotExists(distribution_id))
            .map_err(tracerr::wrap!())?;
        if !distribution.is_pending() {
            return Ok(distribution);
        }

        let credited = self.credit(&distribution).await;

        match &credited {
            Ok(transfer) => distribution.applied(transfer, DateTime::now()),
            Err(e) => distribution.failed(e.as_ref()),
        }

        tx.execute(Update(distribution.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        if let Err(e) = &credited {
            log::warn!(
                "failed to apply `Distribution(id: {})` on attempt {}: {}",
                distribution.id,
                distribution.attempts,
                e.as_ref(),
            );
        }
        let transfer =
            credited.map_err(tracerr::map_from_and_wrap!(=> E))?;

        log::info!(
            "`Distribution(id: {})` of `{}` applied to `User(id: {})` by \
             `Transfer(id: {})`",
            distribution.id,
            distribution.amount,
            distribution.recipient_id,
            transfer.id,
        );
        self.track(analytics::Event::new(
            analytics::Kind::PayoutApplied,
            distribution.group_id,
            Some(distribution.recipient_id),
        ))
        .await;

        Ok(distribution)
    }
}

impl<Db, Acc, Ntf, Anl> Service<Db, Acc, Ntf, Anl>
where
    Acc: Accounts<
            Select<By<Option<account::Id>, user::Id>>,
            Ok = Option<account::Id>,
            Err = Traced<infra::account::Error>,
        > + Accounts<
            Select<By<Money, account::Id>>,
            Ok = Money,
            Err = Traced<infra::account::Error>,
        > + Accounts<
            Perform<Credit>,
            Ok = Transfer,
            Err = Traced<infra::account::Error>,
        >,
{
    /// Credits the provided [`Distribution`] to the [`Account`] of its
    /// recipient.
    ///
    /// [`Account`]: crate::domain::Account
    async fn credit(
        &self,
        distribution: &Distribution,
    ) -> Result<Transfer, Traced<infra::account::Error>> {
        use infra::account::Error as E;

        let recipient_id = distribution.recipient_id;
        let account_id = self
            .accounts()
            .execute(Select(By::<Option<account::Id>, _>::new(recipient_id)))
            .await
            .map_err(tracerr::wrap!())?
            .ok_or(E::NoAccount(recipient_id))
            .map_err(tracerr::wrap!())?;

        let balance = self
            .accounts()
            .execute(Select(By::<Money, _>::new(account_id)))
            .await
            .map_err(tracerr::wrap!())?;
        if balance.currency != distribution.amount.currency {
            return Err(tracerr::new!(E::CurrencyMismatch {
                expected: balance.currency,
                actual: distribution.amount.currency,
            }));
        }

        self.accounts()
            .execute(Perform(Credit {
                account_id,
                amount: distribution.amount,
                memo: distribution.memo(),
                key: distribution.transfer_key(),
            }))
            .await
            .map_err(tracerr::wrap!())
    }
}

/// Error of [`ApplyDistribution`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Distribution`] with the provided ID does not exist.
    #[display("`Distribution(id: {_0})` does not exist")]
    DistributionNotExists(#[error(not(source))] distribution::Id),

    /// [`Accounts`] ledger refused the credit.
    #[display("Transfer failed: {_0}")]
    #[from]
    Transfer(infra::account::Error),
}

impl Categorize for ExecutionError {
    fn kind(&self) -> Kind {
        match self {
            Self::Db(e) => e.kind(),
            Self::DistributionNotExists(_) => Kind::NotFound,
            Self::Transfer(e) => e.kind(),
        }
    }

    fn is_retryable(&self) -> bool {
        match self {
            Self::Db(e) => e.is_retryable(),
            Self::DistributionNotExists(_) => false,
            Self::Transfer(e) => e.is_retryable(),
        }
    }
}
