use std::{
    any::Any,
    collections::{BTreeMap, HashMap},
    fmt,
    sync::Arc,
};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use num_bigint::BigInt;
use num_traits::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{Number, Value};

/// A host-side value, either bound into a script or decoded from its result.
#[derive(Debug, Clone, Default)]
pub enum HostValue {
    /// Absent value; the script sees `()`.
    #[default]
    Null,
    /// Boolean.
    Bool(bool),
    /// 64-bit integer.
    Int(i64),
    /// Double-precision float.
    Float(f64),
    /// Arbitrary-precision decimal.
    Decimal(Decimal),
    /// Arbitrary-precision integer.
    BigInt(BigInt),
    /// Text.
    String(String),
    /// Calendar date without a time component.
    Date(NaiveDate),
    /// Wall-clock time without a date component.
    Time(NaiveTime),
    /// Combined date and time.
    DateTime(NaiveDateTime),
    /// Ordered sequence.
    List(Vec<HostValue>),
    /// String-keyed mapping.
    Map(BTreeMap<String, HostValue>),
    /// A value that must reach the script exactly as given, see [`Ref`].
    Ref(Box<HostValue>),
    /// A host object passed through the script untouched.
    Opaque(HostObject),
    /// A script function, identified by name.
    Callable(String),
}

impl HostValue {
    /// Whether this is [`HostValue::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Boolean payload, if any.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer payload, if the value is an in-range integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::BigInt(i) => i.to_i64(),
            _ => None,
        }
    }

    /// Numeric payload as a float.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => i.to_f64(),
            Self::Float(f) => Some(*f),
            Self::Decimal(d) => d.to_f64(),
            Self::BigInt(i) => i.to_f64(),
            _ => None,
        }
    }

    /// Text payload, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// List payload, if any.
    pub fn as_list(&self) -> Option<&[HostValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Map payload, if any.
    pub fn as_map(&self) -> Option<&BTreeMap<String, HostValue>> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Look up a key when the value is a map.
    pub fn get(&self, key: &str) -> Option<&HostValue> {
        self.as_map().and_then(|map| map.get(key))
    }

    /// Convert into JSON.
    ///
    /// Dates and times render as ISO-8601 text. Decimals, and big integers that
    /// do not fit an `i64`, render as their exact text. Opaque host objects
    /// become `null`.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null | Self::Opaque(_) => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(i) => Value::Number((*i).into()),
            Self::Float(f) => Number::from_f64(*f).map_or(Value::Null, Value::Number),
            Self::Decimal(d) => Value::String(d.to_string()),
            Self::BigInt(i) => i
                .to_i64()
                .map(Number::from)
                .map_or_else(|| Value::String(i.to_string()), Value::Number),
            Self::String(s) | Self::Callable(s) => Value::String(s.clone()),
            Self::Date(d) => Value::String(format!("{d:?}")),
            Self::Time(t) => Value::String(format!("{t:?}")),
            Self::DateTime(dt) => Value::String(format!("{dt:?}")),
            Self::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Map(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Self::Ref(inner) => inner.to_json(),
        }
    }
}

impl PartialEq for HostValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Decimal(a), Self::Decimal(b)) => a == b,
            (Self::BigInt(a), Self::BigInt(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Date(a), Self::Date(b)) => a == b,
            (Self::Time(a), Self::Time(b)) => a == b,
            (Self::DateTime(a), Self::DateTime(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            (Self::Ref(a), Self::Ref(b)) => a == b,
            (Self::Opaque(a), Self::Opaque(b)) => a.ptr_eq(b),
            (Self::Callable(a), Self::Callable(b)) => a == b,
            _ => false,
        }
    }
}

/// Opt-out wrapper: the wrapped value skips precision lowering when encoded.
///
/// A [`Decimal`] or [`BigInt`] wrapped in `Ref` reaches the script as a
/// high-precision value regardless of its magnitude.
#[derive(Debug, Clone, PartialEq)]
pub struct Ref<T>(T);

impl<T> Ref<T> {
    /// Wrap a value.
    pub fn of(value: T) -> Self {
        Self(value)
    }

    /// The wrapped value.
    pub fn value(&self) -> &T {
        &self.0
    }
}

impl<T: Into<HostValue>> From<Ref<T>> for HostValue {
    fn from(value: Ref<T>) -> Self {
        Self::Ref(Box::new(value.0.into()))
    }
}

/// A host object the script can hold and hand back, but not inspect.
#[derive(Clone)]
pub struct HostObject(Arc<dyn Any + Send + Sync>);

impl HostObject {
    /// Wrap an arbitrary host value.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    /// Borrow the original value if it has type `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for HostObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostObject({:p})", Arc::as_ptr(&self.0))
    }
}

macro_rules! from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for HostValue {
            fn from(value: $t) -> Self {
                Self::Int(i64::from(value))
            }
        })*
    };
}

from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<u64> for HostValue {
    fn from(value: u64) -> Self {
        i64::try_from(value).map_or_else(|_| Self::BigInt(value.into()), Self::Int)
    }
}

impl From<f32> for HostValue {
    fn from(value: f32) -> Self {
        Self::Float(f64::from(value))
    }
}

impl From<f64> for HostValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for HostValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for HostValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for HostValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Decimal> for HostValue {
    fn from(value: Decimal) -> Self {
        Self::Decimal(value)
    }
}

impl From<BigInt> for HostValue {
    fn from(value: BigInt) -> Self {
        Self::BigInt(value)
    }
}

impl From<NaiveDate> for HostValue {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

impl From<NaiveTime> for HostValue {
    fn from(value: NaiveTime) -> Self {
        Self::Time(value)
    }
}

impl From<NaiveDateTime> for HostValue {
    fn from(value: NaiveDateTime) -> Self {
        Self::DateTime(value)
    }
}

impl From<HostObject> for HostValue {
    fn from(value: HostObject) -> Self {
        Self::Opaque(value)
    }
}

impl<T: Into<HostValue>> From<Option<T>> for HostValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl<T: Into<HostValue>> From<Vec<T>> for HostValue {
    fn from(value: Vec<T>) -> Self {
        Self::List(value.into_iter().map(Into::into).collect())
    }
}

impl<V: Into<HostValue>> From<BTreeMap<String, V>> for HostValue {
    fn from(value: BTreeMap<String, V>) -> Self {
        Self::Map(value.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<V: Into<HostValue>> From<HashMap<String, V>> for HostValue {
    fn from(value: HashMap<String, V>) -> Self {
        Self::Map(value.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl From<Value> for HostValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Self::BigInt(u.into())
                } else {
                    Self::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::List(items.into_iter().map(Into::into).collect()),
            Value::Object(map) => Self::Map(map.into_iter().map(|(k, v)| (k, v.into())).collect()),
        }
    }
}
