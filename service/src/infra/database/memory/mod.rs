//! In-memory [`Database`] implementation.
//!
//! Mirrors the guarantees of the [`Postgres`] one: transactions stage their
//! writes and apply them atomically on [`Commit`], locks are held until the
//! end of the transaction, and versions and uniqueness constraints are checked
//! both when a write is staged and when it's committed.
//!
//! [`Commit`]: common::operations::Commit
//! [`Postgres`]: crate::infra::Postgres

mod impls;

use std::{
    collections::HashMap,
    future::Future,
    hash::Hash,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use derive_more::{Debug, From};
use tokio::sync::{self, OwnedMutexGuard};
use tracerr::Traced;

use crate::{
    domain::{distribution, group, user, Distribution, Group},
    infra::database,
};
#[cfg(doc)]
use crate::infra::Database;

/// In-memory [`Database`] client.
#[derive(Clone, Debug, Default)]
pub struct Memory<T = NonTx>(T);

impl Memory {
    /// Creates a new empty [`Memory`] database.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Stored records of a [`Memory`] database.
#[derive(Clone, Debug, Default)]
pub struct Tables {
    /// Stored [`Group`]s.
    groups: HashMap<group::Id, Group>,

    /// Stored [`Distribution`]s.
    distributions: HashMap<distribution::Id, Distribution>,
}

/// Shared state of a [`Memory`] database.
#[derive(Debug, Default)]
struct Storage {
    /// Committed records.
    tables: Mutex<Tables>,

    /// Locks taken or awaited by transactions.
    locks: Mutex<Locks>,
}

/// Locks of a [`Storage`] by their keys.
type Locks = HashMap<LockKey, Arc<sync::Mutex<()>>>;

impl Storage {
    /// Returns the committed [`Tables`].
    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the taken or awaited locks.
    fn locks(&self) -> MutexGuard<'_, Locks> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Forgets the locks nobody holds or waits for.
    ///
    /// Holders and waiters keep their own reference, so only the map refers
    /// to an idle lock.
    fn evict_idle_locks(&self) {
        self.locks().retain(|_, lock| Arc::strong_count(lock) > 1);
    }
}

/// Key of a lock held until the end of a [`Tx`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum LockKey {
    /// Lock of a single [`Group`].
    Group(group::Id),

    /// Lock of [`Group`]s creation by a single [`user::User`].
    Creator(user::Id),

    /// Lock of a single [`Distribution`].
    Distribution(distribution::Id),
}

/// Key of a record stored in [`Tables`].
#[derive(Clone, Copy, Debug, Eq, From, Hash, PartialEq)]
pub enum RecordKey {
    /// Key of a [`Group`].
    Group(group::Id),

    /// Key of a [`Distribution`].
    Distribution(distribution::Id),
}

/// Kind of a write of a [`Record`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Write {
    /// New [`Record`] is inserted.
    Insert,

    /// Existing [`Record`] is overwritten.
    Update {
        /// Revision the overwritten [`Record`] must have, if it's versioned.
        base: Option<u64>,
    },
}

/// Record stored in [`Tables`].
pub trait Record: Clone {
    /// Type of the primary key.
    type Key: Copy + Eq + Hash + Into<RecordKey>;

    /// Constraint violated by inserting a duplicate primary key.
    const PRIMARY_KEY: database::Constraint;

    /// Returns the primary key of this [`Record`].
    fn key(&self) -> Self::Key;

    /// Returns the revision of this [`Record`], if it's versioned.
    fn revision(&self) -> Option<u64>;

    /// Returns the table of this [`Record`]s.
    fn table(tables: &Tables) -> &HashMap<Self::Key, Self>;

    /// Returns the mutable table of this [`Record`]s.
    fn table_mut(tables: &mut Tables) -> &mut HashMap<Self::Key, Self>;

    /// Checks this [`Record`] doesn't violate uniqueness constraints against
    /// the `others` stored ones.
    ///
    /// # Errors
    ///
    /// With [`database::Error::UniqueViolation`] if it does.
    fn check_unique<'a>(
        &self,
        others: impl Iterator<Item = &'a Self>,
    ) -> Result<(), database::Error>
    where
        Self: 'a;

    /// Checks this [`Record`] may be written over the `stored` one.
    ///
    /// # Errors
    ///
    /// - With [`database::Error::UniqueViolation`] if the primary key or
    ///   another unique constraint is violated.
    /// - With [`database::Error::StaleVersion`] if the `stored` one has an
    ///   unexpected revision or doesn't exist.
    fn check<'a>(
        &self,
        write: Write,
        stored: Option<&Self>,
        others: impl Iterator<Item = &'a Self>,
    ) -> Result<(), database::Error>
    where
        Self: 'a,
    {
        match (write, stored) {
            (Write::Insert, None) => {}
            (Write::Insert, Some(_)) => {
                return Err(database::Error::UniqueViolation(Self::PRIMARY_KEY));
            }
            (Write::Update { base }, Some(s)) if s.revision() == base => {}
            (Write::Update { .. }, _) => {
                return Err(database::Error::StaleVersion);
            }
        }
        self.check_unique(others)
    }
}

/// Generic in-memory connection.
pub trait Connection {
    /// Returns clones of all the visible `T` records matching the provided
    /// `filter`.
    fn select<T: Record>(&self, filter: impl FnMut(&T) -> bool) -> Vec<T>;

    /// Writes the provided `record`.
    ///
    /// # Errors
    ///
    /// If the `record` violates a version or uniqueness constraint.
    fn write<T: Record>(
        &self,
        write: Write,
        record: T,
    ) -> Result<(), Traced<database::Error>>;

    /// Acquires the lock of the provided [`LockKey`].
    fn lock(&self, key: LockKey) -> impl Future<Output = ()>;
}

/// Non-transactional in-memory client, applying writes immediately.
#[derive(Clone, Debug, Default)]
pub struct NonTx {
    /// Shared [`Storage`].
    storage: Arc<Storage>,
}

impl Connection for NonTx {
    fn select<T: Record>(&self, mut filter: impl FnMut(&T) -> bool) -> Vec<T> {
        T::table(&self.storage.tables())
            .values()
            .filter(|r| filter(r))
            .cloned()
            .collect()
    }

    fn write<T: Record>(
        &self,
        write: Write,
        record: T,
    ) -> Result<(), Traced<database::Error>> {
        let mut tables = self.storage.tables();
        let key = record.key();
        let table = T::table_mut(&mut tables);
        record
            .check(
                write,
                table.get(&key),
                table.values().filter(|r| r.key() != key),
            )
            .map_err(tracerr::wrap!())?;
        _ = table.insert(key, record);
        Ok(())
    }

    async fn lock(&self, _: LockKey) {
        // Writes are applied immediately, so there is nothing to hold.
    }
}

/// Transactional in-memory client.
#[derive(Clone, Debug)]
pub struct Tx {
    /// Shared [`Storage`].
    storage: Arc<Storage>,

    /// State of this transaction.
    inner: Arc<Mutex<Inner>>,
}

/// State of a [`Tx`].
#[derive(Debug, Default)]
struct Inner {
    /// Records written in this transaction.
    staged: Tables,

    /// Kinds of the writes of the staged records, as they were first staged.
    writes: Vec<(RecordKey, Write)>,

    /// Locks held by this transaction.
    #[debug(skip)]
    guards: HashMap<LockKey, OwnedMutexGuard<()>>,
}

impl Tx {
    /// Starts a new [`Tx`] over the provided [`NonTx`] client's storage.
    #[must_use]
    pub fn from_non_tx(client: &NonTx) -> Self {
        Self {
            storage: Arc::clone(&client.storage),
            inner: Arc::default(),
        }
    }

    /// Returns the state of this [`Tx`].
    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Atomically applies all the staged writes and releases the held locks.
    ///
    /// Nothing is applied if any write conflicts with the committed state.
    ///
    /// # Errors
    ///
    /// If a version or uniqueness constraint is violated.
    pub fn commit(&self) -> Result<(), Traced<database::Error>> {
        let Inner {
            staged,
            writes,
            guards,
        } = std::mem::take(&mut *self.inner());

        let mut tables = self.storage.tables();
        let mut next = tables.clone();
        for (key, write) in writes {
            let applied = match key {
                RecordKey::Group(id) => {
                    apply::<Group>(&staged, &mut next, id, write)
                }
                RecordKey::Distribution(id) => {
                    apply::<Distribution>(&staged, &mut next, id, write)
                }
            };
            applied.map_err(tracerr::wrap!())?;
        }
        *tables = next;
        drop(tables);

        drop(guards);
        self.storage.evict_idle_locks();
        Ok(())
    }
}

/// Applies the staged `T` record with the provided `key` to the `next`
/// [`Tables`], checking it against them.
fn apply<T: Record>(
    staged: &Tables,
    next: &mut Tables,
    key: T::Key,
    write: Write,
) -> Result<(), Traced<database::Error>> {
    let Some(record) = T::table(staged).get(&key).cloned() else {
        return Ok(());
    };
    let table = T::table_mut(next);
    record
        .check(
            write,
            table.get(&key),
            table.values().filter(|r| r.key() != key),
        )
        .map_err(tracerr::wrap!())?;
    _ = table.insert(key, record);
    Ok(())
}

impl Connection for Tx {
    fn select<T: Record>(&self, mut filter: impl FnMut(&T) -> bool) -> Vec<T> {
        let inner = self.inner();
        let tables = self.storage.tables();
        let staged = T::table(&inner.staged);
        T::table(&tables)
            .iter()
            .filter(|(key, _)| !staged.contains_key(*key))
            .map(|(_, r)| r)
            .chain(staged.values())
            .filter(|r| filter(r))
            .cloned()
            .collect()
    }

    fn write<T: Record>(
        &self,
        write: Write,
        record: T,
    ) -> Result<(), Traced<database::Error>> {
        let mut inner = self.inner();
        let tables = self.storage.tables();
        let key = record.key();

        let committed = T::table(&tables);
        let staged = T::table(&inner.staged);
        let stored = staged.get(&key).or_else(|| committed.get(&key));
        let others = committed
            .iter()
            .filter(|(k, _)| **k != key && !staged.contains_key(*k))
            .map(|(_, r)| r)
            .chain(staged.values().filter(|r| r.key() != key));
        record.check(write, stored, others).map_err(tracerr::wrap!())?;
        drop(tables);

        let record_key = key.into();
        if !inner.writes.iter().any(|(k, _)| *k == record_key) {
            inner.writes.push((record_key, write));
        }
        _ = T::table_mut(&mut inner.staged).insert(key, record);
        Ok(())
    }

    async fn lock(&self, key: LockKey) {
        if self.inner().guards.contains_key(&key) {
            return;
        }

        let mutex = {
            let mut locks = self.storage.locks();
            // Locks of rolled back transactions are released on drop only.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(key).or_default())
        };
        let guard = mutex.lock_owned().await;
        _ = self.inner().guards.insert(key, guard);
    }
}

impl Record for Group {
    type Key = group::Id;

    const PRIMARY_KEY: database::Constraint = database::GROUPS_PKEY;

    fn key(&self) -> Self::Key {
        self.id
    }

    fn revision(&self) -> Option<u64> {
        Some(self.version.into())
    }

    fn table(tables: &Tables) -> &HashMap<Self::Key, Self> {
        &tables.groups
    }

    fn table_mut(tables: &mut Tables) -> &mut HashMap<Self::Key, Self> {
        &mut tables.groups
    }

    fn check_unique<'a>(
        &self,
        mut others: impl Iterator<Item = &'a Self>,
    ) -> Result<(), database::Error>
    where
        Self: 'a,
    {
        let taken = !self.status.is_terminal()
            && others.any(|g| {
                !g.status.is_terminal() && g.access_code == self.access_code
            });
        if taken {
            return Err(database::Error::UniqueViolation(
                database::GROUPS_ACCESS_CODE_KEY,
            ));
        }
        Ok(())
    }
}

impl Record for Distribution {
    type Key = distribution::Id;

    const PRIMARY_KEY: database::Constraint = "distributions_pkey";

    fn key(&self) -> Self::Key {
        self.id
    }

    fn revision(&self) -> Option<u64> {
        None
    }

    fn table(tables: &Tables) -> &HashMap<Self::Key, Self> {
        &tables.distributions
    }

    fn table_mut(tables: &mut Tables) -> &mut HashMap<Self::Key, Self> {
        &mut tables.distributions
    }

    fn check_unique<'a>(
        &self,
        mut others: impl Iterator<Item = &'a Self>,
    ) -> Result<(), database::Error>
    where
        Self: 'a,
    {
        if others.any(|d| d.group_id == self.group_id && d.round == self.round)
        {
            return Err(database::Error::UniqueViolation(
                database::DISTRIBUTIONS_ROUND_KEY,
            ));
        }
        Ok(())
    }
}
