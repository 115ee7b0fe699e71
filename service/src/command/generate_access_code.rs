//! [`Command`] for generating a free [`AccessCode`].

use common::operations::{By, Select};
use derive_more::{Display, Error, From};
use smart_default::SmartDefault;
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::group::AccessCode,
    error::{Categorize, Kind},
    infra::{database, Database},
    read::group::IsCodeTaken,
    Service,
};

use super::Command;

/// Configuration of [`GenerateAccessCode`] [`Command`].
#[derive(Clone, Copy, Debug, SmartDefault)]
pub struct Config {
    /// Length of generated [`AccessCode`]s, clamped to
    /// [`AccessCode::MIN_LENGTH`]`..=`[`AccessCode::MAX_LENGTH`].
    #[default(AccessCode::MIN_LENGTH)]
    pub length: u8,

    /// Number of collisions tolerated before giving up.
    #[default(16)]
    pub max_attempts: u16,
}

/// [`Command`] for generating an [`AccessCode`] not held by any running
/// [`Group`].
///
/// The returned [`AccessCode`] is not reserved: its uniqueness is enforced
/// again when the [`Group`] holding it is stored.
///
/// [`Group`]: crate::domain::Group
#[derive(Clone, Copy, Debug)]
pub struct GenerateAccessCode;

impl<Db, Acc, Ntf, Anl> Command<GenerateAccessCode>
    for Service<Db, Acc, Ntf, Anl>
where
    Db: Database<
        Select<By<IsCodeTaken, AccessCode>>,
        Ok = IsCodeTaken,
        Err = Traced<database::Error>,
    >,
{
    type Ok = AccessCode;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        _: GenerateAccessCode,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let Config {
            length,
            max_attempts,
        } = self.config().access_code;

        for attempt in 1..=max_attempts {
            let code = AccessCode::generate(length);
            let taken = self
                .database()
                .execute(Select(By::<IsCodeTaken, _>::new(code.clone())))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?;
            if !*taken {
                return Ok(code);
            }
            log::debug!("`AccessCode` collision on attempt {attempt}");
        }

        Err(tracerr::new!(E::CodeSpaceExhausted(max_attempts)))
    }
}

/// Error of [`GenerateAccessCode`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// Every generated [`AccessCode`] was already taken.
    #[display("No free `AccessCode` found in {_0} attempts")]
    CodeSpaceExhausted(#[error(not(source))] u16),

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),
}

impl Categorize for ExecutionError {
    fn kind(&self) -> Kind {
        match self {
            Self::CodeSpaceExhausted(_) => Kind::Capacity,
            Self::Db(e) => e.kind(),
        }
    }

    fn is_retryable(&self) -> bool {
        match self {
            Self::CodeSpaceExhausted(_) => false,
            Self::Db(e) => e.is_retryable(),
        }
    }
}

#[cfg(test)]
mod spec {
    use crate::{
        error::{Categorize as _, Kind},
        testing, Command as _, Config,
    };

    use super::GenerateAccessCode;

    #[tokio::test]
    async fn generates_code_of_configured_length() {
        let mut config = Config::default();
        config.access_code.length = 8;
        let svc = testing::service_with(config);

        let code = svc.execute(GenerateAccessCode).await.unwrap();

        assert_eq!(code.to_string().len(), 8);
    }

    #[tokio::test]
    async fn gives_up_without_attempts() {
        let mut config = Config::default();
        config.access_code.max_attempts = 0;
        let svc = testing::service_with(config);

        let err = svc.execute(GenerateAccessCode).await.unwrap_err();

        assert_eq!(err.kind(), Kind::Capacity);
        assert!(!err.is_retryable());
    }
}
