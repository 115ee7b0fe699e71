//! [`Query`] collection related to a single [`Distribution`].

use common::operations::By;

use crate::domain::{
    distribution,
    group::{self, round},
    Distribution,
};
#[cfg(doc)]
use crate::Query;

use super::DatabaseQuery;

/// Queries a [`Distribution`] by its [`distribution::Id`].
pub type ById = DatabaseQuery<By<Option<Distribution>, distribution::Id>>;

/// Queries a [`Distribution`] of the settled round of a [`Group`].
///
/// [`Group`]: crate::domain::Group
pub type ForRound =
    DatabaseQuery<By<Option<Distribution>, (group::Id, round::Number)>>;
