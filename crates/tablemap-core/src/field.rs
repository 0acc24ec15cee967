//! Field kinds and the conversion between Rust field types and [`Value`].

use crate::Result;
use crate::error::MappingError;
use crate::value::Value;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Primitive storage kind of a mapped field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarKind {
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    Decimal,
    Bool,
    Text,
    Char,
    DateTime,
    Guid,
    /// Integer-backed enum (see [`SqlEnum`])
    Enum,
}

impl ScalarKind {
    /// Human readable name used in mapping errors.
    pub const fn name(self) -> &'static str {
        match self {
            ScalarKind::Byte => "byte",
            ScalarKind::Short => "short",
            ScalarKind::Int => "int",
            ScalarKind::Long => "long",
            ScalarKind::Float => "float",
            ScalarKind::Double => "double",
            ScalarKind::Decimal => "decimal",
            ScalarKind::Bool => "bool",
            ScalarKind::Text => "text",
            ScalarKind::Char => "char",
            ScalarKind::DateTime => "datetime",
            ScalarKind::Guid => "guid",
            ScalarKind::Enum => "enum",
        }
    }
}

/// Declared kind of a mapped field: a scalar, or a nullable scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    Scalar(ScalarKind),
    Nullable(ScalarKind),
}

impl FieldKind {
    /// The underlying scalar kind.
    pub const fn scalar(self) -> ScalarKind {
        match self {
            FieldKind::Scalar(k) | FieldKind::Nullable(k) => k,
        }
    }

    pub const fn is_nullable(self) -> bool {
        matches!(self, FieldKind::Nullable(_))
    }
}

/// A Rust type that can be stored in an entity field.
///
/// `to_value` and `from_value` are the halves of the field-accessor table
/// generated by `#[derive(Entity)]`. `from_value` receives a value already
/// coerced to `KIND` by [`crate::convert::from_wire_value`], so it only
/// accepts the matching [`Value`] variant.
pub trait FieldValue: Sized {
    const KIND: FieldKind;

    fn to_value(&self) -> Value;

    fn from_value(value: Value) -> Result<Self>;
}

/// A fieldless enum stored as its integer discriminant.
///
/// Usually derived with `#[derive(SqlEnum)]`, which also provides the
/// [`FieldValue`] implementation.
pub trait SqlEnum: Sized {
    const TYPE_NAME: &'static str;

    fn to_discriminant(&self) -> i32;

    fn from_discriminant(value: i32) -> Option<Self>;
}

/// Decimal number kept in its textual form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Decimal(pub String);

impl std::fmt::Display for Decimal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn mismatch<T>(value: &Value) -> crate::Error {
    MappingError::new(std::any::type_name::<T>(), value.to_wire_string()).into()
}

macro_rules! impl_field_value {
    ($ty:ty, $kind:ident, $variant:ident) => {
        impl_field_value!($ty, $kind, $variant, |v: &$ty| *v);
    };
    ($ty:ty, $kind:ident, $variant:ident, $read:expr) => {
        impl FieldValue for $ty {
            const KIND: FieldKind = FieldKind::Scalar(ScalarKind::$kind);

            fn to_value(&self) -> Value {
                Value::$variant(($read)(self))
            }

            fn from_value(value: Value) -> Result<Self> {
                match value {
                    Value::$variant(v) => Ok(v),
                    other => Err(mismatch::<$ty>(&other)),
                }
            }
        }
    };
}

impl_field_value!(u8, Byte, Byte);
impl_field_value!(i16, Short, SmallInt);
impl_field_value!(i32, Int, Int);
impl_field_value!(i64, Long, BigInt);
impl_field_value!(f32, Float, Float);
impl_field_value!(f64, Double, Double);
impl_field_value!(bool, Bool, Bool);
impl_field_value!(String, Text, Text, |v: &String| v.clone());
impl_field_value!(char, Char, Char);
impl_field_value!(NaiveDateTime, DateTime, DateTime);
impl_field_value!(Uuid, Guid, Guid);

impl FieldValue for Decimal {
    const KIND: FieldKind = FieldKind::Scalar(ScalarKind::Decimal);

    fn to_value(&self) -> Value {
        Value::Decimal(self.0.clone())
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Decimal(s) => Ok(Decimal(s)),
            other => Err(mismatch::<Decimal>(&other)),
        }
    }
}

impl<T: FieldValue> FieldValue for Option<T> {
    const KIND: FieldKind = FieldKind::Nullable(T::KIND.scalar());

    fn to_value(&self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::Null,
        }
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

/// `from_value` helper for [`SqlEnum`] types, used by the derive.
pub fn enum_from_value<T: SqlEnum>(value: Value) -> Result<T> {
    match value {
        Value::Int(i) => T::from_discriminant(i)
            .ok_or_else(|| MappingError::new(T::TYPE_NAME, i.to_string()).into()),
        other => Err(MappingError::new(T::TYPE_NAME, other.to_wire_string()).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Status {
        Active = 1,
        Closed = 2,
    }

    impl SqlEnum for Status {
        const TYPE_NAME: &'static str = "Status";

        fn to_discriminant(&self) -> i32 {
            *self as i32
        }

        fn from_discriminant(value: i32) -> Option<Self> {
            match value {
                1 => Some(Status::Active),
                2 => Some(Status::Closed),
                _ => None,
            }
        }
    }

    #[test]
    fn test_option_kind_is_nullable() {
        assert_eq!(
            <Option<i32> as FieldValue>::KIND,
            FieldKind::Nullable(ScalarKind::Int)
        );
        assert_eq!(<String as FieldValue>::KIND, FieldKind::Scalar(ScalarKind::Text));
    }

    #[test]
    fn test_from_value_rejects_wrong_variant() {
        let err = i32::from_value(Value::Text("x".into())).unwrap_err();
        assert!(matches!(err, crate::Error::Mapping(_)));
    }

    #[test]
    fn test_option_from_null() {
        assert_eq!(Option::<i64>::from_value(Value::Null).unwrap(), None);
        assert_eq!(
            Option::<i64>::from_value(Value::BigInt(4)).unwrap(),
            Some(4)
        );
    }

    #[test]
    fn test_enum_from_value() {
        assert_eq!(enum_from_value::<Status>(Value::Int(2)).unwrap(), Status::Closed);
        assert_eq!(Status::Active.to_discriminant(), 1);

        let err = enum_from_value::<Status>(Value::Int(9)).unwrap_err();
        match err {
            crate::Error::Mapping(m) => {
                assert_eq!(m.expected, "Status");
                assert_eq!(m.raw_value, "9");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
