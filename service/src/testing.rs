//! Test doubles and fixtures for exercising [`Service`] end to end.

use std::{
    collections::HashMap,
    convert::Infallible,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use common::{
    operations::{By, Perform, Select},
    Currency, DateTime, Money,
};
use rust_decimal::Decimal;
use tracerr::Traced;

use crate::{
    command::{CreateGroup, JoinGroup, RecordPayment},
    domain::{
        account::{self, Transfer, TransferId, TransferKey},
        group::{self, payment},
        user, Group,
    },
    infra::{
        account::{Credit, Error},
        analytics, notification, Accounts, Memory, Notifier,
    },
    Command as _, Config, Service,
};

/// [`Service`] wired with test doubles.
pub(crate) type TestService = Service<Memory, Ledger, Outbox, analytics::Log>;

/// Creates a new [`TestService`] with the default [`Config`].
pub(crate) fn service() -> TestService {
    service_with(Config::default())
}

/// Creates a new [`TestService`] with the provided [`Config`].
pub(crate) fn service_with(config: Config) -> TestService {
    Service {
        config,
        database: Memory::new(),
        accounts: Ledger::default(),
        notifier: Outbox::default(),
        analytics: analytics::Log,
    }
}

impl TestService {
    /// Returns the [`Ledger`] of this [`TestService`].
    pub(crate) fn ledger(&self) -> &Ledger {
        &self.accounts
    }

    /// Returns the [`Outbox`] of this [`TestService`].
    pub(crate) fn outbox(&self) -> &Outbox {
        &self.notifier
    }
}

/// Returns the contribution used by fixtures.
pub(crate) fn contribution() -> Money {
    Money::new(Decimal::from(1000), Currency::Htg)
}

/// Returns the earliest allowed start date.
pub(crate) fn tomorrow() -> DateTime {
    DateTime::now().start_of_day() + Duration::from_secs(24 * 60 * 60)
}

/// Returns a [`CreateGroup`] [`Command`] of a monthly group.
///
/// [`Command`]: crate::Command
pub(crate) fn create_group(
    creator: user::Id,
    max_participants: u8,
) -> CreateGroup {
    CreateGroup {
        initiator: user::Identity::user(creator),
        name: group::Name::new("Sol Lakay").unwrap(),
        contribution: contribution(),
        frequency: group::Frequency::Monthly,
        max_participants,
        is_private: false,
        start_date: tomorrow(),
        rules: None,
        draft: false,
    }
}

/// Returns a [`RecordPayment`] [`Command`] of a full contribution in cash.
///
/// [`Command`]: crate::Command
pub(crate) fn payment(group_id: group::Id, payer: user::Id) -> RecordPayment {
    RecordPayment {
        initiator: user::Identity::user(payer),
        group_id,
        amount: contribution(),
        method: payment::Method::Cash,
        round: None,
        transaction_ref: None,
    }
}

/// Creates a [`Group`] of `size` participants, which starts automatically,
/// opening an [`account::Account`] for every participant.
///
/// Returns the active [`Group`] and its participants ordered by position.
pub(crate) async fn active_group(
    svc: &TestService,
    size: u8,
) -> (Group, Vec<user::Id>) {
    let users = (0..size).map(|_| user::Id::new()).collect::<Vec<_>>();
    for &id in &users {
        _ = svc.ledger().open(id, Currency::Htg);
    }

    let mut group = svc.execute(create_group(users[0], size)).await.unwrap();
    for &id in &users[1..] {
        group = svc
            .execute(JoinGroup {
                initiator: user::Identity::user(id),
                access_code: group.access_code.clone(),
            })
            .await
            .unwrap();
    }
    assert_eq!(group.status, group::Status::Active);

    (group, users)
}

/// In-memory [`Accounts`] ledger.
#[derive(Clone, Debug, Default)]
pub(crate) struct Ledger(Arc<Mutex<LedgerState>>);

/// State of a [`Ledger`].
#[derive(Debug, Default)]
pub(crate) struct LedgerState {
    /// Balances of the opened accounts.
    balances: HashMap<account::Id, Money>,

    /// Accounts by their owners.
    owners: HashMap<user::Id, account::Id>,

    /// Made transfers by their keys.
    transfers: HashMap<TransferKey, Transfer>,

    /// Number of credits to fail before succeeding again.
    failures: usize,
}

impl Ledger {
    fn state(&self) -> MutexGuard<'_, LedgerState> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Opens an empty account of the provided `owner`.
    pub(crate) fn open(
        &self,
        owner: user::Id,
        currency: Currency,
    ) -> account::Id {
        let id = account::Id::new();
        let mut state = self.state();
        _ = state.balances.insert(id, Money::zero(currency));
        _ = state.owners.insert(owner, id);
        id
    }

    /// Makes the next `n` credits fail.
    pub(crate) fn fail_next(&self, n: usize) {
        self.state().failures = n;
    }

    /// Returns the balance of the account of the provided `owner`.
    pub(crate) fn balance_of(&self, owner: user::Id) -> Option<Money> {
        let state = self.state();
        state
            .owners
            .get(&owner)
            .and_then(|id| state.balances.get(id))
            .copied()
    }

    /// Returns the number of made transfers.
    pub(crate) fn transfers(&self) -> usize {
        self.state().transfers.len()
    }
}

impl Accounts<Select<By<Option<account::Id>, user::Id>>> for Ledger {
    type Ok = Option<account::Id>;
    type Err = Traced<Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<account::Id>, user::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        Ok(self.state().owners.get(&by.into_inner()).copied())
    }
}

impl Accounts<Select<By<Money, account::Id>>> for Ledger {
    type Ok = Money;
    type Err = Traced<Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Money, account::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        self.state()
            .balances
            .get(&id)
            .copied()
            .ok_or_else(|| tracerr::new!(Error::AccountNotFound(id)))
    }
}

impl Accounts<Perform<Credit>> for Ledger {
    type Ok = Transfer;
    type Err = Traced<Error>;

    async fn execute(
        &self,
        Perform(credit): Perform<Credit>,
    ) -> Result<Self::Ok, Self::Err> {
        let mut state = self.state();
        if state.failures > 0 {
            state.failures -= 1;
            return Err(tracerr::new!(Error::AccountNotFound(
                credit.account_id
            )));
        }
        if let Some(transfer) = state.transfers.get(&credit.key) {
            return Ok(transfer.clone());
        }

        let balance = state
            .balances
            .get_mut(&credit.account_id)
            .ok_or_else(|| {
                tracerr::new!(Error::AccountNotFound(credit.account_id))
            })?;
        let current = *balance;
        *balance = current.checked_add(credit.amount).ok_or_else(|| {
            tracerr::new!(Error::CurrencyMismatch {
                expected: current.currency,
                actual: credit.amount.currency,
            })
        })?;

        let transfer = Transfer {
            id: TransferId::new(),
            account_id: credit.account_id,
            amount: credit.amount,
            memo: credit.memo,
            key: credit.key.clone(),
            created_at: DateTime::now().coerce(),
        };
        _ = state.transfers.insert(credit.key, transfer.clone());
        Ok(transfer)
    }
}

/// [`Notifier`] recording sent [`notification::Event`]s.
#[derive(Clone, Debug, Default)]
pub(crate) struct Outbox(Arc<Mutex<Vec<notification::Event>>>);

impl Outbox {
    /// Returns all the sent [`notification::Event`]s.
    pub(crate) fn events(&self) -> Vec<notification::Event> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Notifier<Perform<notification::Event>> for Outbox {
    type Ok = ();
    type Err = Infallible;

    async fn execute(
        &self,
        Perform(event): Perform<notification::Event>,
    ) -> Result<Self::Ok, Self::Err> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
        Ok(())
    }
}
