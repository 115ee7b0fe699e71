//! [`Database`] implementations.

use std::cmp::Reverse;

use common::operations::{
    By, Commit, Insert, Lock, Select, Transact, Update,
};
use tracerr::Traced;

use crate::{
    domain::{
        distribution,
        group::{self, round, AccessCode},
        user, Distribution, Group, User,
    },
    infra::{database, Database},
    read::group::{IsCodeTaken, RunningCount},
};

use super::{Connection, LockKey, Memory, NonTx, Tx, Write};

impl Database<Transact> for Memory<NonTx> {
    type Ok = Memory<Tx>;
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Transact) -> Result<Self::Ok, Self::Err> {
        Ok(Memory(Tx::from_non_tx(&self.0)))
    }
}

impl Database<Transact> for Memory<Tx> {
    type Ok = Self;
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Transact) -> Result<Self::Ok, Self::Err> {
        Ok(self.clone())
    }
}

impl Database<Commit> for Memory<Tx> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Commit) -> Result<Self::Ok, Self::Err> {
        self.0.commit().map_err(tracerr::wrap!())
    }
}

impl<C: Connection> Database<Lock<By<Group, group::Id>>> for Memory<C> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(by): Lock<By<Group, group::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        self.0.lock(LockKey::Group(by.into_inner())).await;
        Ok(())
    }
}

impl<C: Connection> Database<Lock<By<User, user::Id>>> for Memory<C> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(by): Lock<By<User, user::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        self.0.lock(LockKey::Creator(by.into_inner())).await;
        Ok(())
    }
}

impl<C: Connection> Database<Lock<By<Distribution, distribution::Id>>>
    for Memory<C>
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(by): Lock<By<Distribution, distribution::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        self.0.lock(LockKey::Distribution(by.into_inner())).await;
        Ok(())
    }
}

impl<C: Connection> Database<Select<By<Option<Group>, group::Id>>>
    for Memory<C>
{
    type Ok = Option<Group>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Group>, group::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self.0.select(|g: &Group| g.id == id).pop())
    }
}

impl<C: Connection> Database<Select<By<Option<Group>, AccessCode>>>
    for Memory<C>
{
    type Ok = Option<Group>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Group>, AccessCode>>,
    ) -> Result<Self::Ok, Self::Err> {
        let code = by.into_inner();
        Ok(self
            .0
            .select(|g: &Group| {
                !g.status.is_terminal() && g.access_code == code
            })
            .pop())
    }
}

impl<C: Connection> Database<Select<By<IsCodeTaken, AccessCode>>>
    for Memory<C>
{
    type Ok = IsCodeTaken;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<IsCodeTaken, AccessCode>>,
    ) -> Result<Self::Ok, Self::Err> {
        let code = by.into_inner();
        let found = self.0.select(|g: &Group| {
            !g.status.is_terminal() && g.access_code == code
        });
        Ok(IsCodeTaken(!found.is_empty()))
    }
}

impl<C: Connection> Database<Select<By<RunningCount, user::Id>>>
    for Memory<C>
{
    type Ok = RunningCount;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<RunningCount, user::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let creator_id = by.into_inner();
        Ok(self
            .0
            .select(|g: &Group| {
                g.creator_id == creator_id
                    && group::Status::RUNNING.contains(&g.status)
            })
            .len()
            .into())
    }
}

impl<C: Connection> Database<Select<By<Vec<Group>, user::Id>>> for Memory<C> {
    type Ok = Vec<Group>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Group>, user::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let user_id = by.into_inner();
        let mut groups = self.0.select(|g: &Group| {
            g.creator_id == user_id || g.is_participant(user_id)
        });
        groups.sort_by_key(|g| Reverse(g.created_at));
        Ok(groups)
    }
}

impl<C: Connection> Database<Insert<Group>> for Memory<C> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(group): Insert<Group>,
    ) -> Result<Self::Ok, Self::Err> {
        self.0
            .write(Write::Insert, group)
            .map_err(tracerr::wrap!())
    }
}

impl<C: Connection> Database<Update<Group>> for Memory<C> {
    type Ok = group::Version;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(mut group): Update<Group>,
    ) -> Result<Self::Ok, Self::Err> {
        let base = group.version;
        group.version = base.next();
        let version = group.version;
        self.0
            .write(
                Write::Update {
                    base: Some(base.into()),
                },
                group,
            )
            .map_err(tracerr::wrap!())?;
        Ok(version)
    }
}

impl<C: Connection> Database<Select<By<Option<Distribution>, distribution::Id>>>
    for Memory<C>
{
    type Ok = Option<Distribution>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Distribution>, distribution::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self.0.select(|d: &Distribution| d.id == id).pop())
    }
}

impl<C: Connection>
    Database<Select<By<Option<Distribution>, (group::Id, round::Number)>>>
    for Memory<C>
{
    type Ok = Option<Distribution>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Distribution>, (group::Id, round::Number)>>,
    ) -> Result<Self::Ok, Self::Err> {
        let (group_id, round) = by.into_inner();
        Ok(self
            .0
            .select(|d: &Distribution| {
                d.group_id == group_id && d.round == round
            })
            .pop())
    }
}

impl<C: Connection>
    Database<Select<By<Vec<Distribution>, distribution::CreationDateTime>>>
    for Memory<C>
{
    type Ok = Vec<Distribution>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<
            By<Vec<Distribution>, distribution::CreationDateTime>,
        >,
    ) -> Result<Self::Ok, Self::Err> {
        let deadline = by.into_inner();
        let mut pending = self.0.select(|d: &Distribution| {
            d.is_pending() && d.created_at <= deadline
        });
        pending.sort_by_key(|d| d.created_at);
        Ok(pending)
    }
}

impl<C: Connection> Database<Insert<Distribution>> for Memory<C> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(distribution): Insert<Distribution>,
    ) -> Result<Self::Ok, Self::Err> {
        self.0
            .write(Write::Insert, distribution)
            .map_err(tracerr::wrap!())
    }
}

impl<C: Connection> Database<Update<Distribution>> for Memory<C> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(distribution): Update<Distribution>,
    ) -> Result<Self::Ok, Self::Err> {
        self.0
            .write(Write::Update { base: None }, distribution)
            .map_err(tracerr::wrap!())
    }
}

#[cfg(test)]
mod spec {
    use common::{
        operations::{By, Commit, Insert, Lock, Select, Transact, Update},
        DateTime,
    };

    use crate::{
        domain::{group, user, Group},
        infra::{
            database::{self, Memory},
            Database as _,
        },
        read::group::IsCodeTaken,
    };

    fn group() -> Group {
        group::spec::group(user::Id::new(), 5, DateTime::now())
    }

    #[tokio::test]
    async fn hides_staged_writes_until_commit() {
        let db = Memory::new();
        let g = group();

        let tx = db.execute(Transact).await.unwrap();
        tx.execute(Insert(g.clone())).await.unwrap();

        let staged = tx
            .execute(Select(By::<Option<Group>, _>::new(g.id)))
            .await
            .unwrap();
        assert!(staged.is_some());
        let committed = db
            .execute(Select(By::<Option<Group>, _>::new(g.id)))
            .await
            .unwrap();
        assert!(committed.is_none());

        tx.execute(Commit).await.unwrap();

        let committed = db
            .execute(Select(By::<Option<Group>, _>::new(g.id)))
            .await
            .unwrap();
        assert!(committed.is_some());
    }

    #[tokio::test]
    async fn rejects_stale_versions() {
        let db = Memory::new();
        let g = group();
        db.execute(Insert(g.clone())).await.unwrap();

        let version = db.execute(Update(g.clone())).await.unwrap();
        assert_eq!(version, g.version.next());

        let err = db.execute(Update(g)).await.unwrap_err();
        assert!(matches!(err.as_ref(), database::Error::StaleVersion));
    }

    #[tokio::test]
    async fn keeps_access_codes_unique_among_running_groups() {
        let db = Memory::new();
        let first = group();
        let second = group();
        assert_eq!(first.access_code, second.access_code);

        db.execute(Insert(first.clone())).await.unwrap();
        let taken = db
            .execute(Select(By::<IsCodeTaken, _>::new(
                first.access_code.clone(),
            )))
            .await
            .unwrap();
        assert_eq!(taken, true);

        let err = db.execute(Insert(second.clone())).await.unwrap_err();
        assert!(matches!(
            err.as_ref(),
            database::Error::UniqueViolation(database::GROUPS_ACCESS_CODE_KEY),
        ));

        let mut first = first;
        first.status = group::Status::Cancelled;
        _ = db.execute(Update(first)).await.unwrap();
        db.execute(Insert(second)).await.unwrap();
    }

    #[tokio::test]
    async fn rejects_conflicting_commits_atomically() {
        let db = Memory::new();
        let g = group();
        db.execute(Insert(g.clone())).await.unwrap();

        let tx = db.execute(Transact).await.unwrap();
        tx.execute(Lock(By::<Group, _>::new(g.id))).await.unwrap();
        let other = group::spec::group(user::Id::new(), 5, DateTime::now());
        let mut other = other;
        other.access_code = "XYZ789".parse().unwrap();
        tx.execute(Insert(other.clone())).await.unwrap();
        _ = tx.execute(Update(g.clone())).await.unwrap();

        // Concurrent change outside of the transaction.
        _ = db.execute(Update(g)).await.unwrap();

        let err = tx.execute(Commit).await.unwrap_err();
        assert!(matches!(err.as_ref(), database::Error::StaleVersion));
        let inserted = db
            .execute(Select(By::<Option<Group>, _>::new(other.id)))
            .await
            .unwrap();
        assert!(inserted.is_none());
    }

    #[tokio::test]
    async fn forgets_released_locks() {
        let db = Memory::new();
        let [first, second] = [group::Id::new(), group::Id::new()];

        let tx = db.execute(Transact).await.unwrap();
        tx.execute(Lock(By::<Group, _>::new(first))).await.unwrap();
        assert_eq!(db.0.storage.locks().len(), 1);
        tx.execute(Commit).await.unwrap();
        assert!(db.0.storage.locks().is_empty());

        let abandoned = db.execute(Transact).await.unwrap();
        abandoned
            .execute(Lock(By::<Group, _>::new(first)))
            .await
            .unwrap();
        drop(abandoned);

        let tx = db.execute(Transact).await.unwrap();
        tx.execute(Lock(By::<Group, _>::new(second))).await.unwrap();
        let held = db.0.storage.locks().keys().copied().collect::<Vec<_>>();
        assert_eq!(held, [super::LockKey::Group(second)]);
        tx.execute(Commit).await.unwrap();
        assert!(db.0.storage.locks().is_empty());
    }
}
