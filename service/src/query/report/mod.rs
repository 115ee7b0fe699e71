//! Reporting [`Query`] definitions.
//!
//! [`Query`]: crate::Query

pub mod payment_summary;

pub use self::payment_summary::PaymentSummary;
