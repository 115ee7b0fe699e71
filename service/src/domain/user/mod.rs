//! [`User`] definitions.
//!
//! Users are owned by the identity collaborator: the engine only references
//! them by [`Id`] and trusts the [`Identity`] it receives with every
//! operation.

use common::define_kind;
use derive_more::{Display, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

#[cfg(doc)]
use crate::domain::Group;

/// Marker of a platform user, referenced by [`Id`] only.
#[derive(Clone, Copy, Debug)]
pub struct User;

/// ID of a [`User`].
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Display,
    Eq,
    From,
    FromStr,
    Hash,
    Into,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[cfg_attr(feature = "postgres", derive(ToSql, FromSql), postgres(transparent))]
pub struct Id(Uuid);

impl Id {
    /// Creates a new random [`Id`].
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Stored shapes a [`User`] reference may come in.
///
/// Documents written by older producers embed either a bare identifier or a
/// populated user object, so both are unwrapped into an [`Id`] when loaded.
#[derive(Deserialize)]
#[serde(untagged)]
enum Reference {
    /// Bare identifier.
    Bare(Uuid),

    /// Populated object carrying the identifier in its `id` (or `_id`) field.
    Populated {
        /// Identifier of the referenced [`User`].
        #[serde(alias = "_id")]
        id: Uuid,
    },
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Reference::deserialize(deserializer)? {
            Reference::Bare(id) | Reference::Populated { id } => Self(id),
        })
    }
}

define_kind! {
    #[doc = "Platform-wide role of a [`User`]."]
    enum Role {
        #[doc = "Regular platform user."]
        User = 1,

        #[doc = "Platform operator, allowed to moderate any [`Group`]."]
        Operator = 2,
    }
}

/// Authenticated caller of an operation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Identity {
    /// ID of the calling [`User`].
    pub id: Id,

    /// [`Role`] of the calling [`User`].
    pub role: Role,
}

impl Identity {
    /// Creates a new [`Identity`] of a regular [`User`].
    #[must_use]
    pub const fn user(id: Id) -> Self {
        Self {
            id,
            role: Role::User,
        }
    }

    /// Indicates whether this [`Identity`] belongs to an operator.
    #[must_use]
    pub fn is_operator(&self) -> bool {
        self.role == Role::Operator
    }
}

#[cfg(test)]
mod spec {
    use uuid::Uuid;

    use super::Id;

    #[test]
    fn unwraps_any_reference_shape() {
        let uuid = Uuid::new_v4();
        let expected = Id::from(uuid);

        let bare: Id = serde_json::from_str(&format!(r#""{uuid}""#)).unwrap();
        let populated: Id = serde_json::from_str(&format!(
            r#"{{"id":"{uuid}","name":"Marie"}}"#,
        ))
        .unwrap();
        let legacy: Id = serde_json::from_str(&format!(
            r#"{{"_id":"{uuid}","email":"m@example.com"}}"#,
        ))
        .unwrap();

        assert_eq!(bare, expected);
        assert_eq!(populated, expected);
        assert_eq!(legacy, expected);
    }

    #[test]
    fn serializes_as_bare_identifier() {
        let uuid = Uuid::new_v4();

        assert_eq!(
            serde_json::to_string(&Id::from(uuid)).unwrap(),
            format!(r#""{uuid}""#),
        );
    }

    #[test]
    fn rejects_unknown_shape() {
        assert!(serde_json::from_str::<Id>(r#"{"name":"nobody"}"#).is_err());
        assert!(serde_json::from_str::<Id>("42").is_err());
    }
}
