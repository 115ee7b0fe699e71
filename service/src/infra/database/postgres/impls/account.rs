//! [`Accounts`] implementations backed by the [`Postgres`] ledger tables.

use common::{
    operations::{By, Perform, Select},
    Money,
};
use rust_decimal::Decimal;
use tokio_postgres::Row;
use tracerr::Traced;

use crate::{
    domain::{
        account::{self, Transfer, TransferId},
        user,
    },
    infra::{
        account::{Accounts, Credit, Error},
        database::{postgres::Connection, Postgres},
    },
};

/// Restores a [`Transfer`] from the provided [`Row`].
fn transfer_from_row(row: &Row) -> Transfer {
    Transfer {
        id: row.get("id"),
        account_id: row.get("account_id"),
        amount: Money::new(
            row.get::<_, Decimal>("amount"),
            row.get("currency"),
        ),
        memo: row.get("memo"),
        key: row.get("key"),
        created_at: row.get("created_at"),
    }
}

impl<C> Accounts<Select<By<Option<account::Id>, user::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<account::Id>;
    type Err = Traced<Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<account::Id>, user::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let owner_id: user::Id = by.into_inner();

        const SQL: &str = "\
            SELECT id \
            FROM accounts \
            WHERE owner_id = $1::UUID \
            LIMIT 1";
        Ok(self
            .query_opt(SQL, &[&owner_id])
            .await
            .map_err(tracerr::map_from_and_wrap!())?
            .map(|r| r.get("id")))
    }
}

impl<C> Accounts<Select<By<Money, account::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Money;
    type Err = Traced<Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Money, account::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: account::Id = by.into_inner();

        const SQL: &str = "\
            SELECT balance, currency \
            FROM accounts \
            WHERE id = $1::UUID";
        let row = self
            .query_opt(SQL, &[&id])
            .await
            .map_err(tracerr::map_from_and_wrap!())?
            .ok_or_else(|| tracerr::new!(Error::AccountNotFound(id)))?;
        Ok(Money::new(row.get("balance"), row.get("currency")))
    }
}

impl<C> Accounts<Perform<Credit>> for Postgres<C>
where
    C: Connection,
    Self: Accounts<
        Select<By<Money, account::Id>>,
        Ok = Money,
        Err = Traced<Error>,
    >,
{
    type Ok = Transfer;
    type Err = Traced<Error>;

    async fn execute(
        &self,
        Perform(credit): Perform<Credit>,
    ) -> Result<Self::Ok, Self::Err> {
        let Credit {
            account_id,
            amount,
            memo,
            key,
        } = credit;

        let balance = self
            .execute(Select(By::<Money, _>::new(account_id)))
            .await
            .map_err(tracerr::wrap!())?;
        if balance.currency != amount.currency {
            return Err(tracerr::new!(Error::CurrencyMismatch {
                expected: balance.currency,
                actual: amount.currency,
            }));
        }

        // Both the transfer record and the balance change are written by a
        // single statement, and only once per key.
        const SQL: &str = "\
            WITH existing AS (\
                SELECT id, account_id, amount, currency, memo, key, \
                       created_at \
                FROM account_transfers \
                WHERE key = $6::VARCHAR\
            ), inserted AS (\
                INSERT INTO account_transfers (\
                    id, account_id, amount, currency, memo, key, created_at\
                ) \
                SELECT $1::UUID, $2::UUID, $3::NUMERIC, $4::INT2, \
                       $5::TEXT, $6::VARCHAR, NOW() \
                WHERE NOT EXISTS (SELECT 1 FROM existing) \
                ON CONFLICT (key) DO NOTHING \
                RETURNING id, account_id, amount, currency, memo, key, \
                          created_at\
            ), credited AS (\
                UPDATE accounts \
                SET balance = balance + $3::NUMERIC \
                WHERE id = $2::UUID \
                  AND EXISTS (SELECT 1 FROM inserted) \
                RETURNING id\
            ) \
            SELECT * FROM inserted \
            UNION ALL \
            SELECT * FROM existing";
        let row = self
            .query_opt(
                SQL,
                &[
                    &TransferId::new(),
                    &account_id,
                    &amount.amount,
                    &amount.currency,
                    &memo,
                    &key,
                ],
            )
            .await
            .map_err(tracerr::map_from_and_wrap!())?;
        if let Some(row) = row {
            return Ok(transfer_from_row(&row));
        }

        // Concurrent credit with the same key won the insertion.
        const SELECT_SQL: &str = "\
            SELECT id, account_id, amount, currency, memo, key, created_at \
            FROM account_transfers \
            WHERE key = $1::VARCHAR";
        self.query_opt(SELECT_SQL, &[&key])
            .await
            .map_err(tracerr::map_from_and_wrap!())?
            .map(|r| transfer_from_row(&r))
            .ok_or_else(|| tracerr::new!(Error::AccountNotFound(account_id)))
    }
}
