//! Domain definitions.

pub mod account;
pub mod distribution;
pub mod group;
pub mod user;

pub use self::{
    account::Account, distribution::Distribution, group::Group, user::User,
};
