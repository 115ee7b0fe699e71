//! [`Distribution`]-related [`Database`] implementations.

use common::{
    operations::{By, Insert, Lock, Select, Update},
    Money,
};
use rust_decimal::Decimal;
use tokio_postgres::Row;
use tracerr::Traced;

use crate::{
    domain::{
        distribution,
        group::{self, round},
        Distribution,
    },
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
};

use super::narrow_unique_violation;

/// Columns of the `distributions` table, in the [`from_row()`] order.
const COLUMNS: &str = "\
    id, group_id, round, recipient_id, amount, currency, status, \
    attempts, last_error, transfer_id, created_at, applied_at";

/// Restores a [`Distribution`] from the provided [`Row`].
fn from_row(row: &Row) -> Distribution {
    Distribution {
        id: row.get("id"),
        group_id: row.get("group_id"),
        round: u8::try_from(row.get::<_, i16>("round"))
            .unwrap_or_default()
            .into(),
        recipient_id: row.get("recipient_id"),
        amount: Money::new(
            row.get::<_, Decimal>("amount"),
            row.get("currency"),
        ),
        status: row.get("status"),
        attempts: u32::try_from(row.get::<_, i32>("attempts"))
            .unwrap_or_default(),
        last_error: row.get("last_error"),
        transfer_id: row.get("transfer_id"),
        created_at: row.get("created_at"),
        applied_at: row.get("applied_at"),
    }
}

impl<C> Database<Select<By<Option<Distribution>, distribution::Id>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Distribution>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Distribution>, distribution::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: distribution::Id = by.into_inner();

        let sql = format!(
            "SELECT {COLUMNS} \
             FROM distributions \
             WHERE id = $1::UUID",
        );
        Ok(self
            .query_opt(sql.as_str(), &[&id])
            .await
            .map_err(tracerr::wrap!())?
            .as_ref()
            .map(from_row))
    }
}

impl<C>
    Database<Select<By<Option<Distribution>, (group::Id, round::Number)>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Distribution>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Distribution>, (group::Id, round::Number)>>,
    ) -> Result<Self::Ok, Self::Err> {
        let (group_id, round) = by.into_inner();
        let round = i16::from(u8::from(round));

        let sql = format!(
            "SELECT {COLUMNS} \
             FROM distributions \
             WHERE group_id = $1::UUID \
               AND round = $2::INT2",
        );
        Ok(self
            .query_opt(sql.as_str(), &[&group_id, &round])
            .await
            .map_err(tracerr::wrap!())?
            .as_ref()
            .map(from_row))
    }
}

impl<C>
    Database<Select<By<Vec<Distribution>, distribution::CreationDateTime>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Vec<Distribution>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<
            By<Vec<Distribution>, distribution::CreationDateTime>,
        >,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let deadline: distribution::CreationDateTime = by.into_inner();

        let sql = format!(
            "SELECT {COLUMNS} \
             FROM distributions \
             WHERE status = $1::INT2 \
               AND created_at <= $2::TIMESTAMPTZ \
             ORDER BY created_at ASC",
        );
        Ok(self
            .query(
                sql.as_str(),
                &[&distribution::Status::Pending, &deadline],
            )
            .await
            .map_err(tracerr::wrap!())?
            .iter()
            .map(from_row)
            .collect())
    }
}

impl<C> Database<Insert<Distribution>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(d): Insert<Distribution>,
    ) -> Result<Self::Ok, Self::Err> {
        let round = i16::from(u8::from(d.round));
        let attempts = i32::try_from(d.attempts).unwrap_or(i32::MAX);

        const SQL: &str = "\
            INSERT INTO distributions (\
                id, group_id, round, recipient_id, amount, currency, status, \
                attempts, last_error, transfer_id, created_at, applied_at \
            ) VALUES (\
                $1::UUID, $2::UUID, $3::INT2, $4::UUID, \
                $5::NUMERIC, $6::INT2, $7::INT2, \
                $8::INT4, $9::TEXT, $10::UUID, \
                $11::TIMESTAMPTZ, $12::TIMESTAMPTZ \
            )";
        self.exec(
            SQL,
            &[
                &d.id,
                &d.group_id,
                &round,
                &d.recipient_id,
                &d.amount.amount,
                &d.amount.currency,
                &d.status,
                &attempts,
                &d.last_error,
                &d.transfer_id,
                &d.created_at,
                &d.applied_at,
            ],
        )
        .await
        .map_err(|e| {
            narrow_unique_violation(e, &[database::DISTRIBUTIONS_ROUND_KEY])
        })
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C> Database<Update<Distribution>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(d): Update<Distribution>,
    ) -> Result<Self::Ok, Self::Err> {
        let attempts = i32::try_from(d.attempts).unwrap_or(i32::MAX);

        const SQL: &str = "\
            UPDATE distributions \
            SET status = $2::INT2, \
                attempts = $3::INT4, \
                last_error = $4::TEXT, \
                transfer_id = $5::UUID, \
                applied_at = $6::TIMESTAMPTZ \
            WHERE id = $1::UUID";
        let updated = self
            .exec(
                SQL,
                &[
                    &d.id,
                    &d.status,
                    &attempts,
                    &d.last_error,
                    &d.transfer_id,
                    &d.applied_at,
                ],
            )
            .await
            .map_err(tracerr::wrap!())?;
        if updated == 0 {
            return Err(tracerr::new!(database::Error::StaleVersion));
        }
        Ok(())
    }
}

impl<C> Database<Lock<By<Distribution, distribution::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(by): Lock<By<Distribution, distribution::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: distribution::Id = by.into_inner();

        const SQL: &str = "\
            INSERT INTO distributions_lock \
            VALUES ($1::UUID) \
            ON CONFLICT (id) DO UPDATE \
            SET id = EXCLUDED.id";
        self.exec(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}
