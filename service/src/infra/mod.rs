//! Infrastructure layer.

pub mod account;
pub mod analytics;
pub mod database;
pub mod notification;

pub use self::{
    account::Accounts, analytics::Analytics, database::Database,
    notification::Notifier,
};
#[cfg(feature = "postgres")]
pub use self::database::{postgres, Postgres};
pub use self::database::{memory, Memory};
