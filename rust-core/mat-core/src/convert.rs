//! # Value Conversion
//!
//! String-to-value conversion rules for bound fields.
//!
//! ## Design Principles
//!
//! - **S**: Each `Scalar` impl handles one target type
//! - **O**: Custom field types plug in through `Scalar`, `FromSource` or `DecodeSource`
//! - **D**: Descriptors depend on `FromSource`, not on concrete parsers

use crate::error::ConversionError;
use crate::source::Source;
use std::fmt;

/// Scalar categories a bound field can require
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    /// String - no conversion
    String,
    /// Signed integer
    Int,
    /// Unsigned integer
    Uint,
    /// Floating point number
    Float,
    /// Boolean - "true"/"false", "1"/"0", "yes"/"no"
    Bool,
    /// Type-specific conversion supplied by the field type
    Custom,
}

impl ScalarKind {
    /// Get the type name for error messages
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Int => "int",
            Self::Uint => "uint",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// Conversion rule recorded in a field binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rule {
    /// Scalar type each value converts to
    pub kind: ScalarKind,
    /// Whether the field takes every value for the key
    pub multi: bool,
}

impl Rule {
    /// Single-valued rule
    #[must_use]
    pub const fn scalar(kind: ScalarKind) -> Self {
        Self { kind, multi: false }
    }

    /// Multi-valued rule
    #[must_use]
    pub const fn multi(kind: ScalarKind) -> Self {
        Self { kind, multi: true }
    }
}

/// A type parsed from exactly one raw string
pub trait Scalar: Sized {
    /// Category used in binding rules and error messages
    const KIND: ScalarKind;

    /// Parse one raw value
    ///
    /// # Errors
    ///
    /// Returns `ConversionError` when `raw` is not a valid value.
    fn parse_scalar(raw: &str) -> Result<Self, ConversionError>;
}

/// A field type that can be filled from a `Source`
///
/// `Ok(None)` means the key was absent and the field keeps its zero value.
pub trait FromSource: Sized {
    /// Rule recorded in the binding descriptor
    const RULE: Rule;

    /// Read and convert the value(s) stored under `key`
    ///
    /// # Errors
    ///
    /// Returns `ConversionError` when a present value does not parse.
    fn from_source(source: &dyn Source, key: &str) -> Result<Option<Self>, ConversionError>;
}

/// A field type that decodes itself from the raw source view
///
/// Fields bound with `#[bind(<source> = "key", delegate)]` skip scalar
/// conversion and hand the source to this hook instead.
pub trait DecodeSource {
    /// Populate `self` from `source` under `key`
    ///
    /// # Errors
    ///
    /// Returns `ConversionError` when the source holds unusable data.
    fn decode_source(&mut self, source: &dyn Source, key: &str) -> Result<(), ConversionError>;
}

/// Read a single scalar value; empty and absent both leave the field alone
///
/// # Errors
///
/// Returns `ConversionError` when the value does not parse.
pub fn scalar_from_source<S: Scalar>(
    source: &dyn Source,
    key: &str,
) -> Result<Option<S>, ConversionError> {
    match source.get(key) {
        "" => Ok(None),
        raw => S::parse_scalar(raw).map(Some),
    }
}

/// Read every value under `key`, in source order
///
/// Empty values are skipped, as for scalars; a key holding only empty
/// values leaves the field alone.
///
/// # Errors
///
/// Returns `ConversionError` for the first value that does not parse.
pub fn seq_from_source<S: Scalar>(
    source: &dyn Source,
    key: &str,
) -> Result<Option<Vec<S>>, ConversionError> {
    let raw: Vec<&str> = source
        .values(key)
        .into_iter()
        .filter(|v| !v.is_empty())
        .collect();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.into_iter()
        .map(S::parse_scalar)
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

fn parse_bool(raw: &str) -> Result<bool, ConversionError> {
    match raw.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConversionError::new(raw, ScalarKind::Bool.type_name())),
    }
}

impl Scalar for String {
    const KIND: ScalarKind = ScalarKind::String;

    fn parse_scalar(raw: &str) -> Result<Self, ConversionError> {
        Ok(raw.to_string())
    }
}

impl Scalar for bool {
    const KIND: ScalarKind = ScalarKind::Bool;

    fn parse_scalar(raw: &str) -> Result<Self, ConversionError> {
        parse_bool(raw)
    }
}

macro_rules! impl_parsed_scalar {
    ($kind:expr => $($ty:ty),+ $(,)?) => {
        $(
            impl Scalar for $ty {
                const KIND: ScalarKind = $kind;

                fn parse_scalar(raw: &str) -> Result<Self, ConversionError> {
                    raw.parse::<$ty>()
                        .map_err(|_| ConversionError::new(raw, stringify!($ty)))
                }
            }
        )+
    };
}

impl_parsed_scalar!(ScalarKind::Int => i8, i16, i32, i64, i128, isize);
impl_parsed_scalar!(ScalarKind::Uint => u8, u16, u32, u64, u128, usize);
impl_parsed_scalar!(ScalarKind::Float => f32, f64);

/// Implement `FromSource` for scalar types, their `Vec`s and their `Option`s
///
/// Custom types implementing `Scalar` can opt in the same way:
/// `mat_core::impl_from_source!(MyId);`
#[macro_export]
macro_rules! impl_from_source {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::convert::FromSource for $ty {
                const RULE: $crate::convert::Rule = $crate::convert::Rule::scalar(
                    <$ty as $crate::convert::Scalar>::KIND,
                );

                fn from_source(
                    source: &dyn $crate::source::Source,
                    key: &str,
                ) -> ::std::result::Result<::std::option::Option<Self>, $crate::error::ConversionError> {
                    $crate::convert::scalar_from_source::<$ty>(source, key)
                }
            }

            impl $crate::convert::FromSource for ::std::vec::Vec<$ty> {
                const RULE: $crate::convert::Rule = $crate::convert::Rule::multi(
                    <$ty as $crate::convert::Scalar>::KIND,
                );

                fn from_source(
                    source: &dyn $crate::source::Source,
                    key: &str,
                ) -> ::std::result::Result<::std::option::Option<Self>, $crate::error::ConversionError> {
                    $crate::convert::seq_from_source::<$ty>(source, key)
                }
            }

            impl $crate::convert::FromSource for ::std::option::Option<$ty> {
                const RULE: $crate::convert::Rule = $crate::convert::Rule::scalar(
                    <$ty as $crate::convert::Scalar>::KIND,
                );

                fn from_source(
                    source: &dyn $crate::source::Source,
                    key: &str,
                ) -> ::std::result::Result<::std::option::Option<Self>, $crate::error::ConversionError> {
                    $crate::convert::scalar_from_source::<$ty>(source, key).map(|v| v.map(Some))
                }
            }
        )+
    };
}

impl_from_source!(
    String, bool, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64,
);
