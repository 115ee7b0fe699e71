//! [`AccessCode`] definitions.

use std::{str::FromStr, sync::LazyLock};

use derive_more::{AsRef, Display};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg(doc)]
use crate::domain::Group;

/// Short code to join a [`Group`] with.
///
/// Unique among all the [`Group`]s that are not completed or cancelled.
#[derive(
    AsRef, Clone, Debug, Deserialize, Display, Eq, Hash, PartialEq, Serialize,
)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
#[serde(try_from = "String", into = "String")]
pub struct AccessCode(String);

impl AccessCode {
    /// Minimum length of an [`AccessCode`].
    pub const MIN_LENGTH: u8 = 6;

    /// Maximum length of an [`AccessCode`].
    pub const MAX_LENGTH: u8 = 8;

    /// Alphabet [`AccessCode`]s are drawn from.
    const ALPHABET: &'static [u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

    /// Creates a new [`AccessCode`] if the given `code` is valid.
    #[must_use]
    pub fn new(code: impl Into<String>) -> Option<Self> {
        let code = code.into();
        Self::check(&code).then_some(Self(code))
    }

    /// Draws a new random [`AccessCode`] of the provided `length`, clamped
    /// into the allowed range.
    #[must_use]
    pub fn generate(length: u8) -> Self {
        let length = length.clamp(Self::MIN_LENGTH, Self::MAX_LENGTH);
        let radix = Self::ALPHABET.len() as u128;

        let mut seed = Uuid::new_v4().as_u128();
        let code = (0..length)
            .map(|_| {
                #[expect(
                    clippy::cast_possible_truncation,
                    reason = "remainder is less than alphabet length"
                )]
                let idx = (seed % radix) as usize;
                seed /= radix;
                char::from(Self::ALPHABET[idx])
            })
            .collect();
        Self(code)
    }

    /// Checks whether the given `code` is a valid [`AccessCode`].
    fn check(code: impl AsRef<str>) -> bool {
        /// Regular expression checking [`AccessCode`] format: 6 to 8 uppercase
        /// ASCII letters or digits.
        static REGEX: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"^[A-Z0-9]{6,8}$").expect("valid regex")
        });

        REGEX.is_match(code.as_ref())
    }
}

impl FromStr for AccessCode {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `AccessCode`")
    }
}

impl TryFrom<String> for AccessCode {
    type Error = &'static str;

    fn try_from(code: String) -> Result<Self, Self::Error> {
        Self::new(code).ok_or("invalid `AccessCode`")
    }
}

impl From<AccessCode> for String {
    fn from(code: AccessCode) -> Self {
        code.0
    }
}
