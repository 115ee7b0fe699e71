//! [`RetryPendingDistributions`] [`Task`].

use std::{convert::Infallible, error::Error, time};

use common::operations::{By, Perform, Select, Start};
use smart_default::SmartDefault;
use tokio::time::interval;
use tracerr::Traced;
use tracing as log;

use crate::{
    command::{apply_distribution, ApplyDistribution},
    domain::{distribution, Distribution},
    infra::{database, Database},
    Command, Service,
};

use super::Task;

/// Configuration for [`RetryPendingDistributions`] [`Task`].
#[derive(Clone, Copy, Debug, SmartDefault)]
pub struct Config {
    /// Interval between retries.
    #[default(time::Duration::from_secs(60))]
    pub interval: time::Duration,

    /// Age after which a pending [`Distribution`] is considered abandoned
    /// by the [`Command`] that created it.
    #[default(time::Duration::from_secs(30))]
    pub delay: time::Duration,
}

/// [`Task`] for re-applying [`Distribution`]s whose payout failed or was
/// interrupted.
#[derive(Clone, Copy, Debug)]
pub struct RetryPendingDistributions<S> {
    /// [`Config`] of this [`Task`].
    config: Config,

    /// [`Service`] instance.
    service: S,
}

impl<Db, Acc, Ntf, Anl>
    Task<Start<By<RetryPendingDistributions<Self>, Config>>>
    for Service<Db, Acc, Ntf, Anl>
where
    RetryPendingDistributions<Self>:
        Task<Perform<()>, Ok = usize, Err: Error> + 'static,
    Self: Clone,
{
    type Ok = ();
    type Err = Infallible;

    async fn execute(
        &self,
        Start(by): Start<By<RetryPendingDistributions<Self>, Config>>,
    ) -> Result<Self::Ok, Self::Err> {
        let config = by.into_inner();
        let task = RetryPendingDistributions {
            config,
            service: self.clone(),
        };

        let mut interval = interval(task.config.interval);
        loop {
            let _ = interval.tick().await;
            match task.execute(Perform(())).await {
                Ok(0) => {}
                Ok(n) => {
                    log::info!("`task::RetryPendingDistributions` applied {n}");
                }
                Err(e) => {
                    log::error!(
                        "`task::RetryPendingDistributions` failed: {e}",
                    );
                }
            }
        }
    }
}

impl<Db, Acc, Ntf, Anl> Task<Perform<()>>
    for RetryPendingDistributions<Service<Db, Acc, Ntf, Anl>>
where
    Db: Database<
        Select<By<Vec<Distribution>, distribution::CreationDateTime>>,
        Ok = Vec<Distribution>,
        Err = Traced<database::Error>,
    >,
    Service<Db, Acc, Ntf, Anl>: Command<
        ApplyDistribution,
        Ok = Distribution,
        Err = Traced<apply_distribution::ExecutionError>,
    >,
{
    type Ok = usize;
    type Err = ExecutionError;

    async fn execute(&self, _: Perform<()>) -> Result<Self::Ok, Self::Err> {
        let deadline =
            distribution::CreationDateTime::now() - self.config.delay;
        let pending = self
            .service
            .database()
            .execute(Select(By::<Vec<Distribution>, _>::new(deadline)))
            .await
            .map_err(tracerr::wrap!())?;

        let mut applied = 0;
        for d in pending {
            match self
                .service
                .execute(ApplyDistribution { distribution_id: d.id })
                .await
            {
                Ok(_) => applied += 1,
                Err(e) => log::warn!(
                    "`Distribution(id: {})` is still pending: {e}",
                    d.id,
                ),
            }
        }
        Ok(applied)
    }
}

/// Error of [`RetryPendingDistributions`] execution.
pub type ExecutionError = Traced<database::Error>;
