//! Service contains the business logic of rotating savings groups.
//!
//! List of available Cargo features:
#![doc = document_features::document_features!()]
#![deny(
    nonstandard_style,
    rust_2018_idioms,
    rustdoc::all,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code
)]
#![forbid(non_ascii_idents)]
#![warn(
    clippy::allow_attributes,
    clippy::allow_attributes_without_reason,
    clippy::pedantic,
    clippy::wildcard_enum_match_arm,
    deprecated_in_future,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    unreachable_pub,
    unused_crate_dependencies,
    unused_import_braces,
    unused_labels,
    unused_lifetimes,
    unused_qualifications,
    unused_results
)]

pub mod command;
pub mod domain;
pub mod error;
pub mod infra;
pub mod query;
pub mod read;
pub mod task;
#[cfg(test)]
mod testing;

use common::operations::{By, Perform, Start};
use derive_more::{Debug, Display, Error};
use tracing as log;

use crate::infra::{analytics, notification, Analytics, Notifier};
#[cfg(doc)]
use crate::infra::{Accounts, Database};

pub use self::{command::Command, query::Query, task::Task};

/// [`Service`] configuration.
#[derive(Clone, Copy, Debug, Default)]
pub struct Config {
    /// Membership policy applied when creating and joining [`Group`]s.
    ///
    /// [`Group`]: domain::Group
    pub membership: command::create_group::Config,

    /// [`command::GenerateAccessCode`] configuration.
    pub access_code: command::generate_access_code::Config,

    /// [`task::RetryPendingDistributions`] configuration.
    pub retry_pending_distributions: task::retry_pending_distributions::Config,
}

/// Domain service.
#[derive(Clone, Debug)]
pub struct Service<Db, Acc, Ntf, Anl> {
    /// Configuration of this [`Service`].
    config: Config,

    /// [`Database`] of this [`Service`].
    database: Db,

    /// [`Accounts`] ledger payouts are credited to.
    accounts: Acc,

    /// [`Notifier`] of this [`Service`].
    notifier: Ntf,

    /// [`Analytics`] sink of this [`Service`].
    analytics: Anl,
}

impl<Db, Acc, Ntf, Anl> Service<Db, Acc, Ntf, Anl> {
    /// Creates a new [`Service`] with the provided parameters.
    pub fn new(
        config: Config,
        database: Db,
        accounts: Acc,
        notifier: Ntf,
        analytics: Anl,
    ) -> (Self, task::Background)
    where
        Self: Task<
                Start<
                    By<
                        task::RetryPendingDistributions<Self>,
                        task::retry_pending_distributions::Config,
                    >,
                >,
                Ok = (),
                Err: Error,
            > + Clone
            + 'static,
    {
        let this = Service {
            config,
            database,
            accounts,
            notifier,
            analytics,
        };

        let mut bg = task::Background::default();
        let svc = this.clone();
        bg.spawn("RetryPendingDistributions", async move {
            svc.execute(Start(By::new(
                svc.config().retry_pending_distributions,
            )))
            .await
        });

        (this, bg)
    }

    /// Returns [`Config`] of this [`Service`].
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns [`Database`] of this [`Service`].
    #[must_use]
    pub fn database(&self) -> &Db {
        &self.database
    }

    /// Returns [`Accounts`] of this [`Service`].
    #[must_use]
    pub fn accounts(&self) -> &Acc {
        &self.accounts
    }

    /// Sends the provided notification [`Event`]s, logging failures.
    ///
    /// [`Event`]: notification::Event
    pub(crate) async fn notify(
        &self,
        events: impl IntoIterator<Item = notification::Event>,
    ) where
        Ntf: Notifier<Perform<notification::Event>, Ok = (), Err: Display>,
    {
        for event in events {
            if let Err(e) = self.notifier.execute(Perform(event)).await {
                log::warn!("failed to send notification: {e}");
            }
        }
    }

    /// Tracks the provided analytics [`Event`], swallowing failures.
    ///
    /// [`Event`]: analytics::Event
    pub(crate) async fn track(&self, event: analytics::Event)
    where
        Anl: Analytics<Perform<analytics::Event>, Ok = (), Err: Display>,
    {
        if let Err(e) = self.analytics.execute(Perform(event)).await {
            log::warn!("failed to track `{}` event: {e}", event.kind);
        }
    }
}
