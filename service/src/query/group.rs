//! [`Query`] collection related to a single [`Group`].

use common::operations::By;

use crate::domain::{
    group::{self, AccessCode},
    Group,
};
#[cfg(doc)]
use crate::Query;

use super::DatabaseQuery;

/// Queries a [`Group`] by its [`group::Id`].
pub type ById = DatabaseQuery<By<Option<Group>, group::Id>>;

/// Queries a running [`Group`] by its [`AccessCode`].
pub type ByAccessCode = DatabaseQuery<By<Option<Group>, AccessCode>>;
