//! Background [`Task`]s definitions.

mod background;
pub mod retry_pending_distributions;

pub use common::Handler as Task;

pub use self::{
    background::Background,
    retry_pending_distributions::RetryPendingDistributions,
};
