//! Flatten serializable host structs into [`HostValue`] trees.
//!
//! Fields serialize straight into host values, so numbers keep their width
//! and nested structs become maps. Chrono and decimal types serialize as text
//! by default; annotate such fields with [`typed`] to keep them as
//! [`HostValue::Date`], [`HostValue::Time`], [`HostValue::DateTime`] or
//! [`HostValue::Decimal`]:
//!
//! ```
//! use chrono::NaiveDate;
//! use rhai_bridge::{HostValue, flatten_bean};
//! use serde::Serialize;
//!
//! #[derive(Serialize)]
//! struct Person {
//!     name: String,
//!     #[serde(with = "rhai_bridge::bean::typed")]
//!     born: NaiveDate,
//! }
//!
//! let born = NaiveDate::from_ymd_opt(1990, 5, 17).unwrap();
//! let fields = flatten_bean(&Person { name: "Ada".into(), born }).unwrap().unwrap();
//! assert_eq!(fields["born"], HostValue::Date(born));
//! ```

use std::{collections::BTreeMap, fmt, str::FromStr};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use num_bigint::BigInt;
use rust_decimal::Decimal;
use serde::{Serialize, Serializer, ser};

use crate::{
    error::{ScriptError, ScriptResult},
    value::HostValue,
};

// Newtype-struct names recognised by the flattener. Other serializers see a
// transparent newtype around the value's text.
const DATE: &str = "$rhai_bridge::bean::Date";
const TIME: &str = "$rhai_bridge::bean::Time";
const DATE_TIME: &str = "$rhai_bridge::bean::DateTime";
const DECIMAL: &str = "$rhai_bridge::bean::Decimal";

const ROOT: &str = "<root>";

/// Flatten a serializable host struct into a name → value mapping.
///
/// Nested structs, sequences and maps flatten recursively; scalars stay as
/// they are. Returns `None` for a unit or `None` bean. A root that is not a
/// struct or map, or a field that fails to serialize, is an
/// [`ScriptError::InaccessibleBeanField`] naming the field path.
pub fn flatten_bean<T>(bean: &T) -> ScriptResult<Option<BTreeMap<String, HostValue>>>
where
    T: Serialize + ?Sized,
{
    let value = bean.serialize(BeanSerializer).map_err(BeanError::into_script)?;
    match value {
        HostValue::Null => Ok(None),
        HostValue::Map(fields) => Ok(Some(fields)),
        other => Err(ScriptError::InaccessibleBeanField {
            field: ROOT.to_string(),
            reason: format!("expected a struct or map, got {other:?}"),
        }),
    }
}

/// `#[serde(with = "rhai_bridge::bean::typed")]` support for fields that
/// should reach scripts as typed leaves instead of text.
///
/// Works for `NaiveDate`, `NaiveTime`, `NaiveDateTime`, `Decimal` and
/// `Option`s of them. Deserialization is the type's own.
pub mod typed {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::TypedLeaf;

    /// Serialize a typed leaf.
    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: TypedLeaf + ?Sized,
        S: Serializer,
    {
        value.serialize_leaf(serializer)
    }

    /// Deserialize with the type's own implementation.
    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        T::deserialize(deserializer)
    }
}

/// A value [`typed`] can serialize as a tagged leaf.
pub trait TypedLeaf {
    /// Serialize as a newtype struct the flattener recognises.
    fn serialize_leaf<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error>;
}

impl TypedLeaf for NaiveDate {
    fn serialize_leaf<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_newtype_struct(DATE, &format!("{self:?}"))
    }
}

impl TypedLeaf for NaiveTime {
    fn serialize_leaf<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_newtype_struct(TIME, &format!("{self:?}"))
    }
}

impl TypedLeaf for NaiveDateTime {
    fn serialize_leaf<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_newtype_struct(DATE_TIME, &format!("{self:?}"))
    }
}

impl TypedLeaf for Decimal {
    fn serialize_leaf<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_newtype_struct(DECIMAL, &self.to_string())
    }
}

impl<T: TypedLeaf> TypedLeaf for Option<T> {
    fn serialize_leaf<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Some(value) => serializer.serialize_some(&Leaf(value)),
            None => serializer.serialize_none(),
        }
    }
}

struct Leaf<'a, T>(&'a T);

impl<T: TypedLeaf> Serialize for Leaf<'_, T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize_leaf(serializer)
    }
}

/// Why a bean could not be flattened, and where.
#[derive(Debug)]
struct BeanError {
    path: Vec<String>,
    reason: String,
}

impl BeanError {
    fn new(reason: impl Into<String>) -> Self {
        Self {
            path: Vec::new(),
            reason: reason.into(),
        }
    }

    fn at(mut self, field: impl Into<String>) -> Self {
        self.path.insert(0, field.into());
        self
    }

    fn into_script(self) -> ScriptError {
        let field = if self.path.is_empty() {
            ROOT.to_string()
        } else {
            self.path.join(".")
        };
        ScriptError::InaccessibleBeanField {
            field,
            reason: self.reason,
        }
    }
}

impl fmt::Display for BeanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

impl std::error::Error for BeanError {}

impl ser::Error for BeanError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Self::new(msg.to_string())
    }
}

type BeanResult<T> = Result<T, BeanError>;

fn typed_leaf(name: &str, text: HostValue) -> BeanResult<HostValue> {
    let HostValue::String(text) = text else {
        return Err(BeanError::new(format!("{name} leaf must serialize as text")));
    };
    let parsed = match name {
        DATE => NaiveDate::from_str(&text).map(HostValue::Date).map_err(|e| e.to_string()),
        TIME => NaiveTime::from_str(&text).map(HostValue::Time).map_err(|e| e.to_string()),
        DATE_TIME => NaiveDateTime::from_str(&text)
            .map(HostValue::DateTime)
            .map_err(|e| e.to_string()),
        _ => Decimal::from_str(&text).map(HostValue::Decimal).map_err(|e| e.to_string()),
    };
    parsed.map_err(|err| BeanError::new(format!("invalid leaf '{text}': {err}")))
}

fn map_key(key: HostValue) -> BeanResult<String> {
    match key {
        HostValue::String(s) => Ok(s),
        HostValue::Int(i) => Ok(i.to_string()),
        HostValue::BigInt(i) => Ok(i.to_string()),
        HostValue::Bool(b) => Ok(b.to_string()),
        other => Err(BeanError::new(format!("unsupported map key {other:?}"))),
    }
}

fn variant(name: &'static str, value: HostValue) -> HostValue {
    HostValue::Map(BTreeMap::from([(name.to_string(), value)]))
}

struct BeanSerializer;

impl Serializer for BeanSerializer {
    type Ok = HostValue;
    type Error = BeanError;
    type SerializeSeq = SeqBuilder;
    type SerializeTuple = SeqBuilder;
    type SerializeTupleStruct = SeqBuilder;
    type SerializeTupleVariant = SeqBuilder;
    type SerializeMap = MapBuilder;
    type SerializeStruct = MapBuilder;
    type SerializeStructVariant = MapBuilder;

    fn serialize_bool(self, v: bool) -> BeanResult<HostValue> {
        Ok(HostValue::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> BeanResult<HostValue> {
        Ok(v.into())
    }

    fn serialize_i16(self, v: i16) -> BeanResult<HostValue> {
        Ok(v.into())
    }

    fn serialize_i32(self, v: i32) -> BeanResult<HostValue> {
        Ok(v.into())
    }

    fn serialize_i64(self, v: i64) -> BeanResult<HostValue> {
        Ok(v.into())
    }

    fn serialize_i128(self, v: i128) -> BeanResult<HostValue> {
        Ok(i64::try_from(v).map_or_else(|_| HostValue::BigInt(BigInt::from(v)), HostValue::Int))
    }

    fn serialize_u8(self, v: u8) -> BeanResult<HostValue> {
        Ok(v.into())
    }

    fn serialize_u16(self, v: u16) -> BeanResult<HostValue> {
        Ok(v.into())
    }

    fn serialize_u32(self, v: u32) -> BeanResult<HostValue> {
        Ok(v.into())
    }

    fn serialize_u64(self, v: u64) -> BeanResult<HostValue> {
        Ok(v.into())
    }

    fn serialize_u128(self, v: u128) -> BeanResult<HostValue> {
        Ok(i64::try_from(v).map_or_else(|_| HostValue::BigInt(BigInt::from(v)), HostValue::Int))
    }

    fn serialize_f32(self, v: f32) -> BeanResult<HostValue> {
        Ok(v.into())
    }

    fn serialize_f64(self, v: f64) -> BeanResult<HostValue> {
        Ok(v.into())
    }

    fn serialize_char(self, v: char) -> BeanResult<HostValue> {
        Ok(HostValue::String(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> BeanResult<HostValue> {
        Ok(v.into())
    }

    fn serialize_bytes(self, v: &[u8]) -> BeanResult<HostValue> {
        Ok(HostValue::List(v.iter().copied().map(HostValue::from).collect()))
    }

    fn serialize_none(self) -> BeanResult<HostValue> {
        Ok(HostValue::Null)
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> BeanResult<HostValue> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> BeanResult<HostValue> {
        Ok(HostValue::Null)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> BeanResult<HostValue> {
        Ok(HostValue::Null)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
    ) -> BeanResult<HostValue> {
        Ok(variant.into())
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        name: &'static str,
        value: &T,
    ) -> BeanResult<HostValue> {
        let inner = value.serialize(BeanSerializer)?;
        match name {
            DATE | TIME | DATE_TIME | DECIMAL => typed_leaf(name, inner),
            _ => Ok(inner),
        }
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _index: u32,
        variant_name: &'static str,
        value: &T,
    ) -> BeanResult<HostValue> {
        let inner = value
            .serialize(BeanSerializer)
            .map_err(|err| err.at(variant_name))?;
        Ok(variant(variant_name, inner))
    }

    fn serialize_seq(self, len: Option<usize>) -> BeanResult<SeqBuilder> {
        Ok(SeqBuilder::new(len, None))
    }

    fn serialize_tuple(self, len: usize) -> BeanResult<SeqBuilder> {
        Ok(SeqBuilder::new(Some(len), None))
    }

    fn serialize_tuple_struct(self, _name: &'static str, len: usize) -> BeanResult<SeqBuilder> {
        Ok(SeqBuilder::new(Some(len), None))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        len: usize,
    ) -> BeanResult<SeqBuilder> {
        Ok(SeqBuilder::new(Some(len), Some(variant)))
    }

    fn serialize_map(self, _len: Option<usize>) -> BeanResult<MapBuilder> {
        Ok(MapBuilder::new(None))
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> BeanResult<MapBuilder> {
        Ok(MapBuilder::new(None))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        _len: usize,
    ) -> BeanResult<MapBuilder> {
        Ok(MapBuilder::new(Some(variant)))
    }
}

struct SeqBuilder {
    items: Vec<HostValue>,
    variant: Option<&'static str>,
}

impl SeqBuilder {
    fn new(len: Option<usize>, variant: Option<&'static str>) -> Self {
        Self {
            items: Vec::with_capacity(len.unwrap_or(0)),
            variant,
        }
    }

    fn push<T: Serialize + ?Sized>(&mut self, value: &T) -> BeanResult<()> {
        let index = self.items.len();
        let item = value
            .serialize(BeanSerializer)
            .map_err(|err| err.at(index.to_string()))?;
        self.items.push(item);
        Ok(())
    }

    fn finish(self) -> HostValue {
        let list = HostValue::List(self.items);
        match self.variant {
            Some(name) => variant(name, list),
            None => list,
        }
    }
}

impl ser::SerializeSeq for SeqBuilder {
    type Ok = HostValue;
    type Error = BeanError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> BeanResult<()> {
        self.push(value)
    }

    fn end(self) -> BeanResult<HostValue> {
        Ok(self.finish())
    }
}

impl ser::SerializeTuple for SeqBuilder {
    type Ok = HostValue;
    type Error = BeanError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> BeanResult<()> {
        self.push(value)
    }

    fn end(self) -> BeanResult<HostValue> {
        Ok(self.finish())
    }
}

impl ser::SerializeTupleStruct for SeqBuilder {
    type Ok = HostValue;
    type Error = BeanError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> BeanResult<()> {
        self.push(value)
    }

    fn end(self) -> BeanResult<HostValue> {
        Ok(self.finish())
    }
}

impl ser::SerializeTupleVariant for SeqBuilder {
    type Ok = HostValue;
    type Error = BeanError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> BeanResult<()> {
        self.push(value)
    }

    fn end(self) -> BeanResult<HostValue> {
        Ok(self.finish())
    }
}

struct MapBuilder {
    fields: BTreeMap<String, HostValue>,
    next_key: Option<String>,
    variant: Option<&'static str>,
}

impl MapBuilder {
    fn new(variant: Option<&'static str>) -> Self {
        Self {
            fields: BTreeMap::new(),
            next_key: None,
            variant,
        }
    }

    fn insert<T: Serialize + ?Sized>(&mut self, key: String, value: &T) -> BeanResult<()> {
        let value = value
            .serialize(BeanSerializer)
            .map_err(|err| err.at(key.clone()))?;
        self.fields.insert(key, value);
        Ok(())
    }

    fn finish(self) -> HostValue {
        let map = HostValue::Map(self.fields);
        match self.variant {
            Some(name) => variant(name, map),
            None => map,
        }
    }
}

impl ser::SerializeMap for MapBuilder {
    type Ok = HostValue;
    type Error = BeanError;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> BeanResult<()> {
        self.next_key = Some(map_key(key.serialize(BeanSerializer)?)?);
        Ok(())
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> BeanResult<()> {
        let key = self
            .next_key
            .take()
            .ok_or_else(|| BeanError::new("map value without a key"))?;
        self.insert(key, value)
    }

    fn end(self) -> BeanResult<HostValue> {
        Ok(self.finish())
    }
}

impl ser::SerializeStruct for MapBuilder {
    type Ok = HostValue;
    type Error = BeanError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> BeanResult<()> {
        self.insert(key.to_string(), value)
    }

    fn end(self) -> BeanResult<HostValue> {
        Ok(self.finish())
    }
}

impl ser::SerializeStructVariant for MapBuilder {
    type Ok = HostValue;
    type Error = BeanError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> BeanResult<()> {
        self.insert(key.to_string(), value)
    }

    fn end(self) -> BeanResult<HostValue> {
        Ok(self.finish())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;
    use serde::ser::Error as _;

    use super::*;

    #[derive(Serialize)]
    struct Address {
        city: String,
    }

    #[derive(Serialize)]
    struct Person {
        name: String,
        age: u32,
        tags: Vec<String>,
        address: Address,
        scores: HashMap<String, f64>,
    }

    struct Sealed;

    impl Serialize for Sealed {
        fn serialize<S: Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(S::Error::custom("field is private"))
        }
    }

    #[derive(Serialize)]
    struct WithSealed {
        inner: Inner,
    }

    #[derive(Serialize)]
    struct Inner {
        secret: Sealed,
    }

    #[derive(Serialize)]
    struct Account {
        #[serde(with = "typed")]
        opened: NaiveDate,
        #[serde(with = "typed")]
        cutoff: NaiveTime,
        #[serde(with = "typed")]
        audited: Option<NaiveDateTime>,
        #[serde(with = "typed")]
        closed: Option<NaiveDate>,
        #[serde(with = "typed")]
        balance: Decimal,
        plain: NaiveDate,
    }

    #[derive(Serialize)]
    enum Shape {
        Dot,
        Circle(f64),
        Rect { w: i64, h: i64 },
    }

    #[test]
    fn nested_beans_flatten_recursively() {
        let person = Person {
            name: "Ada".into(),
            age: 36,
            tags: vec!["math".into()],
            address: Address {
                city: "London".into(),
            },
            scores: HashMap::from([("x".to_string(), 1.5)]),
        };
        let map = flatten_bean(&person).unwrap().unwrap();
        assert_eq!(map["name"], HostValue::from("Ada"));
        assert_eq!(map["age"], HostValue::Int(36));
        assert_eq!(map["tags"], HostValue::List(vec![HostValue::from("math")]));
        assert_eq!(map["address"].get("city"), Some(&HostValue::from("London")));
        assert_eq!(map["scores"].get("x"), Some(&HostValue::Float(1.5)));
    }

    #[test]
    fn typed_leaves_stay_typed() {
        let opened = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let cutoff = NaiveTime::from_hms_opt(17, 30, 0).unwrap();
        let audited = opened.and_hms_opt(9, 0, 5).unwrap();
        let balance = Decimal::new(12345678901234567, 4);
        let account = Account {
            opened,
            cutoff,
            audited: Some(audited),
            closed: None,
            balance,
            plain: opened,
        };
        let map = flatten_bean(&account).unwrap().unwrap();
        assert_eq!(map["opened"], HostValue::Date(opened));
        assert_eq!(map["cutoff"], HostValue::Time(cutoff));
        assert_eq!(map["audited"], HostValue::DateTime(audited));
        assert_eq!(map["closed"], HostValue::Null);
        assert_eq!(map["balance"], HostValue::Decimal(balance));
        assert_eq!(map["plain"], HostValue::from("2024-01-02"));
    }

    #[test]
    fn typed_leaves_are_text_elsewhere() {
        let opened = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let account = Account {
            opened,
            cutoff: NaiveTime::from_hms_opt(17, 30, 0).unwrap(),
            audited: None,
            closed: None,
            balance: Decimal::new(15, 1),
            plain: opened,
        };
        let json = serde_json::to_value(&account).unwrap();
        assert_eq!(json["opened"], "2024-01-02");
        assert_eq!(json["balance"], "1.5");
    }

    #[test]
    fn enums_flatten_by_variant_name() {
        let shapes = BTreeMap::from([
            ("a", Shape::Dot),
            ("b", Shape::Circle(1.5)),
            ("c", Shape::Rect { w: 2, h: 3 }),
        ]);
        let map = flatten_bean(&shapes).unwrap().unwrap();
        assert_eq!(map["a"], HostValue::from("Dot"));
        assert_eq!(map["b"].get("Circle"), Some(&HostValue::Float(1.5)));
        assert_eq!(
            map["c"].get("Rect").and_then(|rect| rect.get("h")),
            Some(&HostValue::Int(3))
        );
    }

    #[test]
    fn wide_integers_are_exact() {
        let map = flatten_bean(&BTreeMap::from([("n", u128::MAX)])).unwrap().unwrap();
        assert_eq!(map["n"], HostValue::BigInt(BigInt::from(u128::MAX)));
    }

    #[test]
    fn absent_bean_is_none() {
        assert_eq!(flatten_bean(&Option::<Address>::None).unwrap(), None);
    }

    #[test]
    fn unreadable_field_names_its_path() {
        let err = flatten_bean(&WithSealed {
            inner: Inner { secret: Sealed },
        })
        .unwrap_err();
        assert!(
            matches!(&err, ScriptError::InaccessibleBeanField { field, reason }
                if field == "inner.secret" && reason.contains("private")),
            "{err}"
        );
    }

    #[test]
    fn scalar_root_is_an_error() {
        assert!(matches!(
            flatten_bean(&5),
            Err(ScriptError::InaccessibleBeanField { field, .. }) if field == "<root>"
        ));
    }
}
