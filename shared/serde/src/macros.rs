/// Implements [`Serde`](crate::Serde) for a fieldless enum, written as its
/// `u16` discriminant. Also derives `TryFrom<u16>` and `From<Enum> for u16`.
///
/// ```
/// tether_serde::serde_enum! {
///     pub enum Team {
///         Red = 0,
///         Blue = 1,
///     }
/// }
/// ```
#[macro_export]
macro_rules! serde_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident = $value:expr
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u16)]
        $vis enum $name {
            $(
                $(#[$variant_meta])*
                $variant = $value,
            )*
        }

        impl ::core::convert::TryFrom<u16> for $name {
            type Error = $crate::SerdeErr;

            fn try_from(value: u16) -> Result<Self, Self::Error> {
                $(
                    if value == $value {
                        return Ok($name::$variant);
                    }
                )*
                Err($crate::SerdeErr::InvalidEnumValue {
                    type_name: stringify!($name),
                    value,
                })
            }
        }

        impl From<$name> for u16 {
            fn from(value: $name) -> u16 {
                value as u16
            }
        }

        impl $crate::Serde for $name {
            fn ser(&self, writer: &mut $crate::ByteWriter) {
                writer.write(&u16::from(*self));
            }

            fn de(reader: &mut $crate::ByteReader) -> Result<Self, $crate::SerdeErr> {
                let raw: u16 = <u16 as $crate::Serde>::de(reader)?;
                <$name as ::core::convert::TryFrom<u16>>::try_from(raw)
            }

            fn byte_length(&self) -> usize {
                2
            }
        }
    };
}
