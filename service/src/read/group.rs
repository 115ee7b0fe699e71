//! [`Group`]-related read definitions.

use derive_more::{Deref, From, Into};

#[cfg(doc)]
use crate::domain::{group::AccessCode, user::User, Group};

/// Indicator whether an [`AccessCode`] is held by a running [`Group`].
#[derive(Clone, Copy, Debug, Deref, Eq, Hash, PartialEq)]
pub struct IsCodeTaken(pub bool);

impl PartialEq<bool> for IsCodeTaken {
    fn eq(&self, other: &bool) -> bool {
        self.0 == *other
    }
}

/// Number of [`Group`]s created by a [`User`] that are recruiting or active.
#[derive(Clone, Copy, Debug, Eq, From, Hash, Into, Ord, PartialEq, PartialOrd)]
pub struct RunningCount(usize);
