//! Structured value to query string conversion.
//!
//! Any `Serialize` record or key/value container becomes an ordered list of
//! `key=value` pairs. Field order is declaration order, with
//! `#[serde(flatten)]` members expanded in place, so the output for a given
//! value is always byte-identical.
//!
//! | serde attribute                         | effect                          |
//! |-----------------------------------------|---------------------------------|
//! | `#[serde(rename = "k")]`                | emitted key is `k`              |
//! | `#[serde(skip)]`                        | field never emitted             |
//! | `#[serde(skip_serializing_if = "...")]` | field dropped when predicate holds |
//! | `#[serde(flatten)]`                     | sub-record fields inlined at its position |
//!
//! Sequence fields repeat their key, `None` fields emit an empty value and
//! nested records that are not flattened emit `outer[inner]` keys.

use crate::error::HttpError;
use serde::Serialize;
use serde::ser::{self, Impossible};
use std::fmt;
use url::form_urlencoded;

/// Ordered query parameter multimap.
///
/// Keys may repeat; iteration and [`encode`](QueryValues::encode) follow
/// insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryValues {
    pairs: Vec<(String, String)>,
}

impl QueryValues {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value for `key`, keeping existing ones.
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.pairs.push((key.into(), value.into()));
    }

    /// Replace all values of `key` with a single value.
    ///
    /// The value takes the position of the first existing occurrence, or is
    /// appended when the key is new.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.pairs.iter().position(|(k, _)| *k == key) {
            Some(first) => {
                self.pairs[first].1 = value;
                let mut index = 0;
                self.pairs.retain(|(k, _)| {
                    let keep = index <= first || *k != key;
                    index += 1;
                    keep
                });
            }
            None => self.pairs.push((key, value)),
        }
    }

    /// First value recorded for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// All values recorded for `key`, in insertion order.
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.pairs
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn remove(&mut self, key: &str) {
        self.pairs.retain(|(k, _)| k != key);
    }

    pub fn iter(&self) -> Iter<'_> {
        Iter {
            inner: self.pairs.iter(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Percent-encode as `application/x-www-form-urlencoded`.
    #[must_use]
    pub fn encode(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.iter())
            .finish()
    }

    /// Append these pairs after any query already present in `url`.
    pub(crate) fn append_to(&self, url: &mut url::Url) {
        if self.is_empty() {
            return;
        }
        url.query_pairs_mut().extend_pairs(self.iter());
    }
}

/// Borrowing iterator over [`QueryValues`] pairs.
#[derive(Debug, Clone)]
pub struct Iter<'a> {
    inner: std::slice::Iter<'a, (String, String)>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a str, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<'a> IntoIterator for &'a QueryValues {
    type Item = (&'a str, &'a str);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for QueryValues {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            pairs: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl Serialize for QueryValues {
    fn serialize<S: ser::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use ser::SerializeMap;

        let mut map = serializer.serialize_map(Some(self.pairs.len()))?;
        for (k, v) in &self.pairs {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Serialize a record or container into ordered query pairs.
///
/// # Errors
///
/// Returns [`HttpError::UnsupportedType`] when `value` is a scalar, an enum
/// or a sequence of something other than key/value pairs, and
/// [`HttpError::QueryEncoding`] when a field value cannot be rendered.
pub fn to_query_values<T: Serialize + ?Sized>(value: &T) -> Result<QueryValues, HttpError> {
    let mut out = QueryValues::new();
    value.serialize(TopLevel { out: &mut out })?;
    Ok(out)
}

/// Serialize a record or container straight into an encoded query string.
///
/// # Errors
///
/// Same as [`to_query_values`].
pub fn to_query_string<T: Serialize + ?Sized>(value: &T) -> Result<String, HttpError> {
    Ok(to_query_values(value)?.encode())
}

#[derive(Debug)]
enum QueryError {
    Unsupported(String),
    Custom(String),
}

impl QueryError {
    fn unsupported(what: &str) -> Self {
        QueryError::Unsupported(what.to_owned())
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::Unsupported(what) => write!(f, "unsupported type: {what}"),
            QueryError::Custom(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for QueryError {}

impl ser::Error for QueryError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        QueryError::Custom(msg.to_string())
    }
}

impl From<QueryError> for HttpError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::Unsupported(what) => HttpError::UnsupportedType(what),
            QueryError::Custom(msg) => HttpError::QueryEncoding(msg),
        }
    }
}

fn nested_key(prefix: Option<&str>, name: &str) -> String {
    match prefix {
        Some(prefix) => format!("{prefix}[{name}]"),
        None => name.to_owned(),
    }
}

macro_rules! reject {
    ($($method:ident($ty:ty) => $what:expr;)*) => {
        $(
            fn $method(self, _v: $ty) -> Result<Self::Ok, Self::Error> {
                Err(QueryError::unsupported($what))
            }
        )*
    };
}

macro_rules! add_display {
    ($($method:ident($ty:ty);)*) => {
        $(
            fn $method(self, v: $ty) -> Result<Self::Ok, Self::Error> {
                self.out.add(self.key, v.to_string());
                Ok(())
            }
        )*
    };
}

macro_rules! key_display {
    ($($method:ident($ty:ty);)*) => {
        $(
            fn $method(self, v: $ty) -> Result<Self::Ok, Self::Error> {
                Ok(v.to_string())
            }
        )*
    };
}

/// Entry point: accepts records, maps and sequences of pairs.
struct TopLevel<'a> {
    out: &'a mut QueryValues,
}

impl<'a> ser::Serializer for TopLevel<'a> {
    type Ok = ();
    type Error = QueryError;
    type SerializeSeq = PairSeq<'a>;
    type SerializeTuple = PairSeq<'a>;
    type SerializeTupleStruct = Impossible<(), QueryError>;
    type SerializeTupleVariant = Impossible<(), QueryError>;
    type SerializeMap = MapFields<'a>;
    type SerializeStruct = StructFields<'a>;
    type SerializeStructVariant = Impossible<(), QueryError>;

    reject! {
        serialize_bool(bool) => "bool";
        serialize_i8(i8) => "i8";
        serialize_i16(i16) => "i16";
        serialize_i32(i32) => "i32";
        serialize_i64(i64) => "i64";
        serialize_u8(u8) => "u8";
        serialize_u16(u16) => "u16";
        serialize_u32(u32) => "u32";
        serialize_u64(u64) => "u64";
        serialize_f32(f32) => "f32";
        serialize_f64(f64) => "f64";
        serialize_char(char) => "char";
        serialize_str(&str) => "string";
        serialize_bytes(&[u8]) => "bytes";
    }

    fn serialize_none(self) -> Result<(), QueryError> {
        Ok(())
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<(), QueryError> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<(), QueryError> {
        Ok(())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<(), QueryError> {
        Ok(())
    }

    fn serialize_unit_variant(
        self,
        name: &'static str,
        _index: u32,
        _variant: &'static str,
    ) -> Result<(), QueryError> {
        Err(QueryError::unsupported(name))
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<(), QueryError> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        name: &'static str,
        _index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<(), QueryError> {
        Err(QueryError::unsupported(name))
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<PairSeq<'a>, QueryError> {
        Ok(PairSeq { out: self.out })
    }

    fn serialize_tuple(self, _len: usize) -> Result<PairSeq<'a>, QueryError> {
        Ok(PairSeq { out: self.out })
    }

    fn serialize_tuple_struct(
        self,
        name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct, QueryError> {
        Err(QueryError::unsupported(name))
    }

    fn serialize_tuple_variant(
        self,
        name: &'static str,
        _index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant, QueryError> {
        Err(QueryError::unsupported(name))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<MapFields<'a>, QueryError> {
        Ok(MapFields {
            out: self.out,
            prefix: None,
            key: None,
        })
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<StructFields<'a>, QueryError> {
        Ok(StructFields {
            out: self.out,
            prefix: None,
        })
    }

    fn serialize_struct_variant(
        self,
        name: &'static str,
        _index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant, QueryError> {
        Err(QueryError::unsupported(name))
    }
}

/// Record fields, emitted in the order serde visits them.
struct StructFields<'a> {
    out: &'a mut QueryValues,
    prefix: Option<String>,
}

impl ser::SerializeStruct for StructFields<'_> {
    type Ok = ();
    type Error = QueryError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        name: &'static str,
        value: &T,
    ) -> Result<(), QueryError> {
        value.serialize(ValueSerializer {
            out: &mut *self.out,
            key: nested_key(self.prefix.as_deref(), name),
        })
    }

    fn end(self) -> Result<(), QueryError> {
        Ok(())
    }
}

/// Map entries. Also receives the fields of records using `#[serde(flatten)]`,
/// which serde routes through `serialize_map` in declaration order.
struct MapFields<'a> {
    out: &'a mut QueryValues,
    prefix: Option<String>,
    key: Option<String>,
}

impl ser::SerializeMap for MapFields<'_> {
    type Ok = ();
    type Error = QueryError;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Result<(), QueryError> {
        self.key = Some(key.serialize(KeySerializer)?);
        Ok(())
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), QueryError> {
        let key = self
            .key
            .take()
            .ok_or_else(|| QueryError::Custom("map value without key".to_owned()))?;
        value.serialize(ValueSerializer {
            out: &mut *self.out,
            key: nested_key(self.prefix.as_deref(), &key),
        })
    }

    fn end(self) -> Result<(), QueryError> {
        Ok(())
    }
}

/// Top-level sequence; every element must be a `(key, value)` pair.
struct PairSeq<'a> {
    out: &'a mut QueryValues,
}

impl ser::SerializeSeq for PairSeq<'_> {
    type Ok = ();
    type Error = QueryError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), QueryError> {
        value.serialize(PairSerializer {
            out: &mut *self.out,
        })
    }

    fn end(self) -> Result<(), QueryError> {
        Ok(())
    }
}

impl ser::SerializeTuple for PairSeq<'_> {
    type Ok = ();
    type Error = QueryError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), QueryError> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<(), QueryError> {
        Ok(())
    }
}

const NOT_A_PAIR: &str = "sequence element that is not a (key, value) pair";

struct PairSerializer<'a> {
    out: &'a mut QueryValues,
}

impl<'a> ser::Serializer for PairSerializer<'a> {
    type Ok = ();
    type Error = QueryError;
    type SerializeSeq = Impossible<(), QueryError>;
    type SerializeTuple = PairTuple<'a>;
    type SerializeTupleStruct = Impossible<(), QueryError>;
    type SerializeTupleVariant = Impossible<(), QueryError>;
    type SerializeMap = Impossible<(), QueryError>;
    type SerializeStruct = Impossible<(), QueryError>;
    type SerializeStructVariant = Impossible<(), QueryError>;

    reject! {
        serialize_bool(bool) => NOT_A_PAIR;
        serialize_i8(i8) => NOT_A_PAIR;
        serialize_i16(i16) => NOT_A_PAIR;
        serialize_i32(i32) => NOT_A_PAIR;
        serialize_i64(i64) => NOT_A_PAIR;
        serialize_u8(u8) => NOT_A_PAIR;
        serialize_u16(u16) => NOT_A_PAIR;
        serialize_u32(u32) => NOT_A_PAIR;
        serialize_u64(u64) => NOT_A_PAIR;
        serialize_f32(f32) => NOT_A_PAIR;
        serialize_f64(f64) => NOT_A_PAIR;
        serialize_char(char) => NOT_A_PAIR;
        serialize_str(&str) => NOT_A_PAIR;
        serialize_bytes(&[u8]) => NOT_A_PAIR;
    }

    fn serialize_none(self) -> Result<(), QueryError> {
        Err(QueryError::unsupported(NOT_A_PAIR))
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<(), QueryError> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<(), QueryError> {
        Err(QueryError::unsupported(NOT_A_PAIR))
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<(), QueryError> {
        Err(QueryError::unsupported(NOT_A_PAIR))
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
    ) -> Result<(), QueryError> {
        Err(QueryError::unsupported(NOT_A_PAIR))
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<(), QueryError> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<(), QueryError> {
        Err(QueryError::unsupported(NOT_A_PAIR))
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq, QueryError> {
        Err(QueryError::unsupported(NOT_A_PAIR))
    }

    fn serialize_tuple(self, len: usize) -> Result<PairTuple<'a>, QueryError> {
        if len == 2 {
            Ok(PairTuple {
                out: self.out,
                key: None,
            })
        } else {
            Err(QueryError::unsupported(NOT_A_PAIR))
        }
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct, QueryError> {
        Err(QueryError::unsupported(NOT_A_PAIR))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant, QueryError> {
        Err(QueryError::unsupported(NOT_A_PAIR))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap, QueryError> {
        Err(QueryError::unsupported(NOT_A_PAIR))
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStruct, QueryError> {
        Err(QueryError::unsupported(NOT_A_PAIR))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant, QueryError> {
        Err(QueryError::unsupported(NOT_A_PAIR))
    }
}

struct PairTuple<'a> {
    out: &'a mut QueryValues,
    key: Option<String>,
}

impl ser::SerializeTuple for PairTuple<'_> {
    type Ok = ();
    type Error = QueryError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), QueryError> {
        match self.key.take() {
            None => {
                self.key = Some(value.serialize(KeySerializer)?);
                Ok(())
            }
            Some(key) => value.serialize(ValueSerializer {
                out: &mut *self.out,
                key,
            }),
        }
    }

    fn end(self) -> Result<(), QueryError> {
        Ok(())
    }
}

/// Renders a map key or pair key as a string.
struct KeySerializer;

impl ser::Serializer for KeySerializer {
    type Ok = String;
    type Error = QueryError;
    type SerializeSeq = Impossible<String, QueryError>;
    type SerializeTuple = Impossible<String, QueryError>;
    type SerializeTupleStruct = Impossible<String, QueryError>;
    type SerializeTupleVariant = Impossible<String, QueryError>;
    type SerializeMap = Impossible<String, QueryError>;
    type SerializeStruct = Impossible<String, QueryError>;
    type SerializeStructVariant = Impossible<String, QueryError>;

    key_display! {
        serialize_bool(bool);
        serialize_i8(i8);
        serialize_i16(i16);
        serialize_i32(i32);
        serialize_i64(i64);
        serialize_u8(u8);
        serialize_u16(u16);
        serialize_u32(u32);
        serialize_u64(u64);
        serialize_f32(f32);
        serialize_f64(f64);
        serialize_char(char);
    }

    fn serialize_str(self, v: &str) -> Result<String, QueryError> {
        Ok(v.to_owned())
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<String, QueryError> {
        Ok(String::from_utf8_lossy(v).into_owned())
    }

    fn serialize_none(self) -> Result<String, QueryError> {
        Err(QueryError::unsupported("empty key"))
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<String, QueryError> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<String, QueryError> {
        Err(QueryError::unsupported("unit key"))
    }

    fn serialize_unit_struct(self, name: &'static str) -> Result<String, QueryError> {
        Err(QueryError::unsupported(name))
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
    ) -> Result<String, QueryError> {
        Ok(variant.to_owned())
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<String, QueryError> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        name: &'static str,
        _index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<String, QueryError> {
        Err(QueryError::unsupported(name))
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq, QueryError> {
        Err(QueryError::unsupported("sequence key"))
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple, QueryError> {
        Err(QueryError::unsupported("tuple key"))
    }

    fn serialize_tuple_struct(
        self,
        name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct, QueryError> {
        Err(QueryError::unsupported(name))
    }

    fn serialize_tuple_variant(
        self,
        name: &'static str,
        _index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant, QueryError> {
        Err(QueryError::unsupported(name))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap, QueryError> {
        Err(QueryError::unsupported("map key"))
    }

    fn serialize_struct(
        self,
        name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStruct, QueryError> {
        Err(QueryError::unsupported(name))
    }

    fn serialize_struct_variant(
        self,
        name: &'static str,
        _index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant, QueryError> {
        Err(QueryError::unsupported(name))
    }
}

/// Emits one field value under `key`.
struct ValueSerializer<'a> {
    out: &'a mut QueryValues,
    key: String,
}

impl<'a> ser::Serializer for ValueSerializer<'a> {
    type Ok = ();
    type Error = QueryError;
    type SerializeSeq = RepeatedValues<'a>;
    type SerializeTuple = RepeatedValues<'a>;
    type SerializeTupleStruct = RepeatedValues<'a>;
    type SerializeTupleVariant = Impossible<(), QueryError>;
    type SerializeMap = MapFields<'a>;
    type SerializeStruct = StructFields<'a>;
    type SerializeStructVariant = Impossible<(), QueryError>;

    add_display! {
        serialize_bool(bool);
        serialize_i8(i8);
        serialize_i16(i16);
        serialize_i32(i32);
        serialize_i64(i64);
        serialize_u8(u8);
        serialize_u16(u16);
        serialize_u32(u32);
        serialize_u64(u64);
        serialize_f32(f32);
        serialize_f64(f64);
        serialize_char(char);
    }

    fn serialize_str(self, v: &str) -> Result<(), QueryError> {
        self.out.add(self.key, v);
        Ok(())
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<(), QueryError> {
        self.out.add(self.key, String::from_utf8_lossy(v));
        Ok(())
    }

    fn serialize_none(self) -> Result<(), QueryError> {
        self.out.add(self.key, String::new());
        Ok(())
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<(), QueryError> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<(), QueryError> {
        self.out.add(self.key, String::new());
        Ok(())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<(), QueryError> {
        self.out.add(self.key, String::new());
        Ok(())
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
    ) -> Result<(), QueryError> {
        self.out.add(self.key, variant);
        Ok(())
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<(), QueryError> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        name: &'static str,
        _index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<(), QueryError> {
        Err(QueryError::unsupported(name))
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<RepeatedValues<'a>, QueryError> {
        Ok(RepeatedValues {
            out: self.out,
            key: self.key,
        })
    }

    fn serialize_tuple(self, _len: usize) -> Result<RepeatedValues<'a>, QueryError> {
        Ok(RepeatedValues {
            out: self.out,
            key: self.key,
        })
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<RepeatedValues<'a>, QueryError> {
        Ok(RepeatedValues {
            out: self.out,
            key: self.key,
        })
    }

    fn serialize_tuple_variant(
        self,
        name: &'static str,
        _index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant, QueryError> {
        Err(QueryError::unsupported(name))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<MapFields<'a>, QueryError> {
        Ok(MapFields {
            out: self.out,
            prefix: Some(self.key),
            key: None,
        })
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<StructFields<'a>, QueryError> {
        Ok(StructFields {
            out: self.out,
            prefix: Some(self.key),
        })
    }

    fn serialize_struct_variant(
        self,
        name: &'static str,
        _index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant, QueryError> {
        Err(QueryError::unsupported(name))
    }
}

/// Sequence field: each element repeats the same key.
struct RepeatedValues<'a> {
    out: &'a mut QueryValues,
    key: String,
}

impl RepeatedValues<'_> {
    fn push<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), QueryError> {
        value.serialize(ValueSerializer {
            out: &mut *self.out,
            key: self.key.clone(),
        })
    }
}

impl ser::SerializeSeq for RepeatedValues<'_> {
    type Ok = ();
    type Error = QueryError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), QueryError> {
        self.push(value)
    }

    fn end(self) -> Result<(), QueryError> {
        Ok(())
    }
}

impl ser::SerializeTuple for RepeatedValues<'_> {
    type Ok = ();
    type Error = QueryError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), QueryError> {
        self.push(value)
    }

    fn end(self) -> Result<(), QueryError> {
        Ok(())
    }
}

impl ser::SerializeTupleStruct for RepeatedValues<'_> {
    type Ok = ();
    type Error = QueryError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), QueryError> {
        self.push(value)
    }

    fn end(self) -> Result<(), QueryError> {
        Ok(())
    }
}
