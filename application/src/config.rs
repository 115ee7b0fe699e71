//! [`Config`]-related definitions.

use std::time;

use common::Percent;
use config::{builder::DefaultState, ConfigBuilder, ConfigError};
use rust_decimal::Decimal;
use serde::Deserialize;
use smart_default::SmartDefault;

/// Application configuration.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Config {
    /// Service configuration.
    pub service: Service,

    /// Postgres configuration.
    pub postgres: Postgres,

    /// Log configuration.
    pub log: Log,
}

impl Config {
    /// Creates a new [`Config`] by:
    /// - loading it from the provided `path` (if any);
    /// - merging it with the environment variables (if any);
    /// - using default values for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(path: impl AsRef<str>) -> Result<Self, ConfigError> {
        ConfigBuilder::<DefaultState>::default()
            .add_source(config::File::with_name(path.as_ref()).required(false))
            .add_source(config::Environment::with_prefix("CONF").separator("."))
            .build()?
            .try_deserialize()
    }
}

/// Service configuration.
#[derive(Clone, Copy, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Service {
    /// Membership policy of groups.
    pub membership: Membership,

    /// Access codes generation configuration.
    pub access_code: AccessCode,

    /// Service tasks configuration.
    pub tasks: Tasks,
}

impl From<Service> for service::Config {
    fn from(value: Service) -> Self {
        let Service {
            membership:
                Membership {
                    min_participants,
                    max_participants,
                    max_active_groups_per_creator,
                    exit_penalty_rate,
                    minimum_contribution,
                    grace_period_days,
                },
            access_code:
                AccessCode {
                    length,
                    max_attempts,
                },
            tasks:
                Tasks {
                    retry_pending_distributions,
                },
        } = value;
        Self {
            membership: service::command::create_group::Config {
                min_participants,
                max_participants,
                max_active_groups_per_creator,
                exit_penalty_rate,
                minimum_contribution,
                grace_period_days,
            },
            access_code: service::command::generate_access_code::Config {
                length,
                max_attempts,
            },
            retry_pending_distributions:
                service::task::retry_pending_distributions::Config {
                    interval: retry_pending_distributions.interval,
                    delay: retry_pending_distributions.delay,
                },
        }
    }
}

/// Membership policy of groups.
#[derive(Clone, Copy, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Membership {
    /// Lowest allowed number of participants.
    #[default(3)]
    pub min_participants: u8,

    /// Highest allowed number of participants.
    #[default(20)]
    pub max_participants: u8,

    /// Number of recruiting or active groups a single user may have created.
    #[default(5)]
    pub max_active_groups_per_creator: usize,

    /// Exit penalty quoted to a participant leaving a started group.
    #[default(Percent::TEN)]
    pub exit_penalty_rate: Percent,

    /// Lowest allowed contribution amount.
    #[default(Decimal::ONE)]
    pub minimum_contribution: Decimal,

    /// Days a contribution may be late before it's considered overdue.
    #[default(2)]
    pub grace_period_days: u8,
}

/// Access codes generation configuration.
#[derive(Clone, Copy, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct AccessCode {
    /// Length of generated codes.
    #[default(6)]
    pub length: u8,

    /// Number of collisions tolerated before giving up.
    #[default(16)]
    pub max_attempts: u16,
}

/// Service tasks configuration.
#[derive(Clone, Copy, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Tasks {
    /// `RetryPendingDistributions` task configuration.
    pub retry_pending_distributions: Task,
}

/// Service task configuration.
#[derive(Clone, Copy, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Task {
    /// Task execution interval.
    #[default(time::Duration::from_secs(60))]
    #[serde(with = "humantime_serde")]
    pub interval: time::Duration,

    /// Age after which pending payouts are picked up by the task.
    #[default(time::Duration::from_secs(30))]
    #[serde(with = "humantime_serde")]
    pub delay: time::Duration,
}

/// Postgres configuration.
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Postgres {
    /// Host to connect to.
    #[default("127.0.0.1".to_owned())]
    pub host: String,

    /// Port to connect to.
    #[default(5432)]
    pub port: u16,

    /// User to connect as.
    #[default("postgres".to_owned())]
    pub user: String,

    /// Password to connect with.
    #[default("postgres".to_owned())]
    pub password: String,

    /// Database name to connect to.
    #[default("postgres".to_owned())]
    pub dbname: String,
}

impl From<Postgres> for service::infra::postgres::Config {
    fn from(value: Postgres) -> Self {
        let Postgres {
            host,
            port,
            user,
            password,
            dbname,
        } = value;

        Self {
            host: Some(host),
            port: Some(port),
            user: Some(user),
            password: Some(password),
            dbname: Some(dbname),
            ..Self::default()
        }
    }
}

/// Log configuration.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Log {
    /// Log level.
    pub level: LogLevel,
}

/// Log level.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogLevel {
    /// Designates very low priority, often extremely verbose, information.
    Trace,

    /// Designates lower priority information.
    Debug,

    /// Designates useful information.
    #[default]
    Info,

    /// Designates hazardous situations.
    Warn,

    /// Designates very serious errors.
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(value: LogLevel) -> Self {
        match value {
            LogLevel::Trace => Self::TRACE,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}
