//! Macros for defining kind enums.

/// Macro for defining a kind enum backed by a [`u8`].
///
/// The produced enum is displayed, parsed and serialized in
/// `SCREAMING_SNAKE_CASE`, is stored as `INT2` in Postgres and exposes all
/// its variants via `ALL`.
///
/// # Example
///
/// ```rust
/// # use common::define_kind;
///
/// define_kind! {
///     #[doc = "Payout frequency."]
///     enum Frequency {
///         #[doc = "Every week."]
///         Weekly = 1,
///
///         #[doc = "Every month."]
///         Monthly = 2,
///     }
/// }
///
/// assert_eq!(Frequency::from_u8(2), Some(Frequency::Monthly));
/// assert_eq!(Frequency::Weekly.to_string(), "WEEKLY");
/// ```
#[expect(clippy::module_name_repetitions, reason = "more readable")]
#[macro_export]
macro_rules! define_kind {
    (
        #[doc = $doc:literal]
        enum $name:ident {
            $(
                #[doc = $variant_doc:literal]
                $variant:ident = $value:expr
            ),* $(,)?
        }
    ) => {
        #[derive(
            Clone,
            Copy,
            Debug,
            $crate::private::strum::Display,
            $crate::private::strum::EnumString,
            Eq,
            Hash,
            PartialEq,
        )]
        #[derive(
            $crate::private::serde::Deserialize,
            $crate::private::serde::Serialize,
        )]
        #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
        #[doc = $doc]
        #[repr(u8)]
        #[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
        pub enum $name {
            $(
                 #[doc = $variant_doc]
                 $variant = $value,
            )*
        }

        impl $name {
            /// All the variants of this kind, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),*];

            /// Converts this into its [`u8`] representation.
            #[must_use]
            pub const fn u8(self) -> u8 {
                self as u8
            }

            /// Converts the provided [`u8`] representation back into a kind,
            /// if it's a known one.
            #[must_use]
            pub fn from_u8(value: u8) -> Option<Self> {
                Self::ALL.iter().copied().find(|k| k.u8() == value)
            }
        }

        #[cfg(feature = "postgres")]
        impl<'a> $crate::private::postgres_types::FromSql<'a> for $name {
            $crate::private::postgres_types::accepts!(INT2);

            fn from_sql(
                ty: &$crate::private::postgres_types::Type,
                raw: &'a [u8],
            ) -> Result<
                $name,
                Box<dyn ::std::error::Error
                    + ::core::marker::Sync
                    + ::core::marker::Send>,
            > {
                let raw = u8::try_from(
                    <i16 as $crate::private::postgres_types::FromSql<'a>>
                        ::from_sql(ty, raw)?,
                )?;
                Self::from_u8(raw).ok_or_else(|| {
                    ::std::format!(
                        "invalid `{}` value: {raw}",
                        ::core::stringify!($name),
                    )
                    .into()
                })
            }
        }

        #[cfg(feature = "postgres")]
        impl $crate::private::postgres_types::ToSql for $name {
            $crate::private::postgres_types::accepts!(INT2);
            $crate::private::postgres_types::to_sql_checked!();

            fn to_sql(
                &self,
                ty: &$crate::private::postgres_types::Type,
                w: &mut $crate::private::postgres_types::private::BytesMut,
            ) -> Result<
                $crate::private::postgres_types::IsNull,
                ::std::boxed::Box<
                    dyn ::std::error::Error
                        + ::core::marker::Sync
                        + ::core::marker::Send
                >,
            > {
                $crate::private::postgres_types::ToSql::to_sql(
                    &i16::from(self.u8()),
                    ty,
                    w,
                )
            }
        }
    };
}

#[cfg(test)]
mod spec {
    crate::define_kind! {
        #[doc = "Shade of a test color."]
        enum Shade {
            #[doc = "Light shade."]
            Light = 1,

            #[doc = "Dark shade."]
            DarkGray = 2,
        }
    }

    #[test]
    fn displays_and_parses_screaming_snake_case() {
        assert_eq!(Shade::DarkGray.to_string(), "DARK_GRAY");
        assert_eq!("LIGHT".parse::<Shade>().ok(), Some(Shade::Light));
        assert!("light".parse::<Shade>().is_err());
    }

    #[test]
    fn serializes_as_screaming_snake_case() {
        let json = serde_json::to_string(&Shade::DarkGray).unwrap();
        assert_eq!(json, r#""DARK_GRAY""#);

        let back: Shade = serde_json::from_str(r#""LIGHT""#).unwrap();
        assert_eq!(back, Shade::Light);
    }

    #[test]
    fn converts_from_u8() {
        assert_eq!(Shade::from_u8(2), Some(Shade::DarkGray));
        assert_eq!(Shade::from_u8(3), None);
        assert_eq!(Shade::ALL, [Shade::Light, Shade::DarkGray]);
    }

    #[cfg(feature = "postgres")]
    #[test]
    fn reads_int2_column() {
        use postgres_types::{FromSql as _, Type};

        let raw = 2_i16.to_be_bytes();
        assert_eq!(
            Shade::from_sql(&Type::INT2, &raw).unwrap(),
            Shade::DarkGray,
        );

        let unknown = 7_i16.to_be_bytes();
        assert!(Shade::from_sql(&Type::INT2, &unknown).is_err());
    }
}
