// Field value model: declared types, typed values, and the traits that
// connect Rust field types to them.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::date;

/// Declared value type of a bound field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValueType {
    Text,
    Integer,
    Long,
    Boolean,
    Date,
    Enumeration(EnumType),
    Double,
    Float,
    Byte,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Integer => write!(f, "integer"),
            Self::Long => write!(f, "long"),
            Self::Boolean => write!(f, "boolean"),
            Self::Date => write!(f, "date"),
            Self::Enumeration(e) => write!(f, "enum {}", e.name),
            Self::Double => write!(f, "double"),
            Self::Float => write!(f, "float"),
            Self::Byte => write!(f, "byte"),
        }
    }
}

/// Enumeration types that own their mapping from canonical text to members.
pub trait CellEnum: Sized + 'static {
    /// Name used in error messages.
    const TYPE_NAME: &'static str;

    /// Resolve a member from its canonical text form.
    fn from_canonical(raw: &str) -> Option<Self>;

    /// Canonical text form of this member; `from_canonical` must accept it.
    fn canonical(&self) -> &'static str;
}

/// Type-erased handle to a [`CellEnum`] implementation.
#[derive(Clone, Copy)]
pub struct EnumType {
    pub name: &'static str,
    canonicalize: fn(&str) -> Option<&'static str>,
}

impl EnumType {
    pub fn of<E: CellEnum>() -> Self {
        Self {
            name: E::TYPE_NAME,
            canonicalize: |raw| E::from_canonical(raw).map(|member| member.canonical()),
        }
    }

    /// Ask the enumeration to parse `raw`; returns the member's canonical form.
    pub fn from_canonical(&self, raw: &str) -> Option<&'static str> {
        (self.canonicalize)(raw)
    }
}

impl fmt::Debug for EnumType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EnumType").field(&self.name).finish()
    }
}

impl PartialEq for EnumType {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

/// A typed field value moving between cells and records.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Integer(i32),
    Long(i64),
    Boolean(bool),
    Date(NaiveDateTime),
    /// Canonical form of an enumeration member
    Enum(&'static str),
    Double(f64),
    Float(f32),
    Byte(i8),
}

impl FieldValue {
    /// String written into an exported cell.
    pub fn export_string(&self, date_pattern: &str) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Integer(n) => n.to_string(),
            Self::Long(n) => n.to_string(),
            Self::Boolean(b) => b.to_string(),
            Self::Date(dt) => date::format_date(dt, date_pattern),
            Self::Enum(name) => (*name).to_string(),
            Self::Double(n) => n.to_string(),
            Self::Float(n) => n.to_string(),
            Self::Byte(n) => n.to_string(),
        }
    }
}

/// Rust types that can be bound to a column.
pub trait FieldKind: Sized + 'static {
    fn value_type() -> ValueType;

    /// Current value; `None` exports as a blank cell.
    fn to_value(&self) -> Option<FieldValue>;

    /// Accept a coerced value, `None` if the variant does not fit.
    fn from_value(value: FieldValue) -> Option<Self>;
}

macro_rules! field_kind {
    ($ty:ty, $variant:ident, $value_type:ident) => {
        impl FieldKind for $ty {
            fn value_type() -> ValueType {
                ValueType::$value_type
            }

            fn to_value(&self) -> Option<FieldValue> {
                Some(FieldValue::$variant(self.clone()))
            }

            fn from_value(value: FieldValue) -> Option<Self> {
                match value {
                    FieldValue::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }
    };
}

field_kind!(String, Text, Text);
field_kind!(i32, Integer, Integer);
field_kind!(i64, Long, Long);
field_kind!(bool, Boolean, Boolean);
field_kind!(NaiveDateTime, Date, Date);
field_kind!(f64, Double, Double);
field_kind!(f32, Float, Float);
field_kind!(i8, Byte, Byte);

impl FieldKind for NaiveDate {
    fn value_type() -> ValueType {
        ValueType::Date
    }

    fn to_value(&self) -> Option<FieldValue> {
        Some(FieldValue::Date(self.and_time(NaiveTime::MIN)))
    }

    fn from_value(value: FieldValue) -> Option<Self> {
        match value {
            FieldValue::Date(dt) => Some(dt.date()),
            _ => None,
        }
    }
}

impl<T: FieldKind> FieldKind for Option<T> {
    fn value_type() -> ValueType {
        T::value_type()
    }

    fn to_value(&self) -> Option<FieldValue> {
        self.as_ref().and_then(T::to_value)
    }

    fn from_value(value: FieldValue) -> Option<Self> {
        T::from_value(value).map(Some)
    }
}
