//! [`Group`]-related [`Database`] implementations.

use common::operations::{By, Insert, Lock, Select, Update};
use itertools::Itertools as _;
use postgres_types::Json;
use tokio_postgres::Row;
use tracerr::Traced;

use crate::{
    domain::{
        group::{self, AccessCode},
        user, Group, User,
    },
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
    read::group::{IsCodeTaken, RunningCount},
};

use super::narrow_unique_violation;

/// Statuses of [`Group`]s holding their [`AccessCode`].
///
/// Must be kept in sync with the `groups_access_code_key` index.
const TERMINAL_STATUSES: [group::Status; 2] =
    [group::Status::Completed, group::Status::Cancelled];

/// Converts the provided [`group::Version`] into its SQL representation.
fn version_to_sql(version: group::Version) -> i64 {
    i64::try_from(u64::from(version)).unwrap_or(i64::MAX)
}

/// Restores a [`Group`] from its stored document.
fn from_row(row: &Row) -> Group {
    let Json(group) = row.get::<_, Json<Group>>("document");
    group
}

impl<C> Database<Select<By<Option<Group>, group::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Group>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Group>, group::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: group::Id = by.into_inner();

        const SQL: &str = "\
            SELECT document \
            FROM groups \
            WHERE id = $1::UUID";
        Ok(self
            .query_opt(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())?
            .as_ref()
            .map(from_row))
    }
}

impl<C> Database<Select<By<Option<Group>, AccessCode>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Group>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Group>, AccessCode>>,
    ) -> Result<Self::Ok, Self::Err> {
        let code = by.into_inner();

        const SQL: &str = "\
            SELECT document \
            FROM groups \
            WHERE access_code = $1::VARCHAR \
              AND status <> ALL($2::INT2[]) \
            LIMIT 1";
        Ok(self
            .query_opt(SQL, &[&code, &TERMINAL_STATUSES.as_slice()])
            .await
            .map_err(tracerr::wrap!())?
            .as_ref()
            .map(from_row))
    }
}

impl<C> Database<Select<By<IsCodeTaken, AccessCode>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = IsCodeTaken;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<IsCodeTaken, AccessCode>>,
    ) -> Result<Self::Ok, Self::Err> {
        let code = by.into_inner();

        const SQL: &str = "\
            SELECT EXISTS (\
                SELECT 1 \
                FROM groups \
                WHERE access_code = $1::VARCHAR \
                  AND status <> ALL($2::INT2[])\
            ) AS taken";
        let row = self
            .query_opt(SQL, &[&code, &TERMINAL_STATUSES.as_slice()])
            .await
            .map_err(tracerr::wrap!())?;
        Ok(IsCodeTaken(row.is_some_and(|r| r.get("taken"))))
    }
}

impl<C> Database<Select<By<RunningCount, user::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = RunningCount;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<RunningCount, user::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let creator_id: user::Id = by.into_inner();

        const SQL: &str = "\
            SELECT COUNT(*) AS total \
            FROM groups \
            WHERE creator_id = $1::UUID \
              AND status = ANY($2::INT2[])";
        let total = self
            .query_opt(SQL, &[&creator_id, &group::Status::RUNNING])
            .await
            .map_err(tracerr::wrap!())?
            .map_or(0, |r| r.get::<_, i64>("total"));
        Ok(usize::try_from(total).unwrap_or_default().into())
    }
}

impl<C> Database<Select<By<Vec<Group>, user::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Vec<Group>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Group>, user::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let user_id: user::Id = by.into_inner();

        const SQL: &str = "\
            SELECT document \
            FROM groups \
            WHERE creator_id = $1::UUID \
               OR $1::UUID = ANY(member_ids) \
            ORDER BY created_at DESC";
        Ok(self
            .query(SQL, &[&user_id])
            .await
            .map_err(tracerr::wrap!())?
            .iter()
            .map(from_row)
            .collect())
    }
}

impl<C> Database<Insert<Group>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(group): Insert<Group>,
    ) -> Result<Self::Ok, Self::Err> {
        let member_ids =
            group.participants.iter().map(|p| p.user_id).collect_vec();
        let version = version_to_sql(group.version);

        const SQL: &str = "\
            INSERT INTO groups (\
                id, creator_id, access_code, status, member_ids, \
                version, document, created_at \
            ) VALUES (\
                $1::UUID, $2::UUID, $3::VARCHAR, $4::INT2, $5::UUID[], \
                $6::INT8, $7::JSONB, $8::TIMESTAMPTZ \
            )";
        self.exec(
            SQL,
            &[
                &group.id,
                &group.creator_id,
                &group.access_code,
                &group.status,
                &member_ids,
                &version,
                &Json(&group),
                &group.created_at,
            ],
        )
        .await
        .map_err(|e| {
            narrow_unique_violation(
                e,
                &[database::GROUPS_PKEY, database::GROUPS_ACCESS_CODE_KEY],
            )
        })
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C> Database<Update<Group>> for Postgres<C>
where
    C: Connection,
{
    type Ok = group::Version;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(mut group): Update<Group>,
    ) -> Result<Self::Ok, Self::Err> {
        let base = group.version;
        group.version = base.next();

        let member_ids =
            group.participants.iter().map(|p| p.user_id).collect_vec();

        const SQL: &str = "\
            UPDATE groups \
            SET access_code = $2::VARCHAR, \
                status = $3::INT2, \
                member_ids = $4::UUID[], \
                version = $5::INT8, \
                document = $6::JSONB \
            WHERE id = $1::UUID \
              AND version = $7::INT8";
        let updated = self
            .exec(
                SQL,
                &[
                    &group.id,
                    &group.access_code,
                    &group.status,
                    &member_ids,
                    &version_to_sql(group.version),
                    &Json(&group),
                    &version_to_sql(base),
                ],
            )
            .await
            .map_err(|e| {
                narrow_unique_violation(e, &[database::GROUPS_ACCESS_CODE_KEY])
            })
            .map_err(tracerr::wrap!())?;
        if updated == 0 {
            return Err(tracerr::new!(database::Error::StaleVersion));
        }

        Ok(group.version)
    }
}

impl<C> Database<Lock<By<Group, group::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(by): Lock<By<Group, group::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: group::Id = by.into_inner();

        const SQL: &str = "\
            INSERT INTO groups_lock \
            VALUES ($1::UUID) \
            ON CONFLICT (id) DO UPDATE \
            SET id = EXCLUDED.id";
        self.exec(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}

impl<C> Database<Lock<By<User, user::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(by): Lock<By<User, user::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: user::Id = by.into_inner();

        const SQL: &str = "\
            INSERT INTO users_lock \
            VALUES ($1::UUID) \
            ON CONFLICT (id) DO UPDATE \
            SET id = EXCLUDED.id";
        self.exec(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}
