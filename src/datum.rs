//! Record model for the flow.
//!
//! A [`Datum`] is an open mapping from field name to [`Value`]. There is no
//! fixed schema; all records within one batch are assumed to share the same
//! fields. Records travel through the graph as [`Record`]s, i.e. reference
//! counted data, so that pass-through nodes can share them with siblings
//! without copying.

use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;
use serde::{Deserialize, Serialize, Serializer};
use std::cell::Cell;
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

/// Largest integer that an f64 represents exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

static NULL: Value = Value::Null;

/// A field value: a scalar or a nested array/object.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    Object(Datum),
}

impl Value {
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the numeric value, if this is a number.
    #[inline]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Datum> {
        match self {
            Value::Object(d) => Some(d),
            _ => None,
        }
    }

    /// JavaScript-style truthiness: null, false, 0, NaN and "" are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) => true,
        }
    }

    /// Name of the value's type, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }
}

/// Orders values the way the sort comparators expect: nulls first, then
/// booleans, numbers and strings. Arrays and objects compare equal.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            // Integral numbers are written without a fractional part
            Value::Number(n) if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER => {
                serializer.serialize_i64(*n as i64)
            }
            Value::Number(n) => serializer.serialize_f64(*n),
            Value::String(s) => serializer.serialize_str(s),
            Value::Array(a) => a.serialize(serializer),
            Value::Object(d) => d.serialize(serializer),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER => {
                write!(f, "{}", *n as i64)
            }
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{}", s),
            Value::Array(a) => {
                for (i, v) in a.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", v)?;
                }
                Ok(())
            }
            Value::Object(d) => match serde_json::to_string(d) {
                Ok(s) => write!(f, "{}", s),
                Err(_) => write!(f, "[object]"),
            },
        }
    }
}

macro_rules! impl_from_number {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                #[inline]
                fn from(n: $t) -> Self {
                    Value::Number(n as f64)
                }
            }
        )*
    };
}

impl_from_number!(f64, f32, i32, i64, u32, u64, usize);

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(a: Vec<Value>) -> Self {
        Value::Array(a)
    }
}

impl From<Datum> for Value {
    fn from(d: Datum) -> Self {
        Value::Object(d)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// One record: an insertion-ordered field -> value mapping.
///
/// Equality ignores field order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Datum(IndexMap<String, Value, FxBuildHasher>);

/// A datum in flight. Shared between siblings until a node needs to modify it.
pub type Record = Rc<Datum>;

impl Datum {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Datum(IndexMap::with_capacity_and_hasher(capacity, FxBuildHasher))
    }

    #[inline]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    #[inline]
    pub fn get_mut(&mut self, field: &str) -> Option<&mut Value> {
        self.0.get_mut(field)
    }

    /// Inserts or overwrites a field, keeping the position of an existing one.
    #[inline]
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(field.into(), value.into())
    }

    /// Removes a field, preserving the order of the remaining ones.
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.shift_remove(field)
    }

    #[inline]
    pub fn contains_key(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Field at a given column position.
    #[inline]
    pub fn get_index(&self, index: usize) -> Option<(&str, &Value)> {
        self.0.get_index(index).map(|(k, v)| (k.as_str(), v))
    }

    /// Column position and value of a field.
    #[inline]
    pub fn get_full(&self, field: &str) -> Option<(usize, &Value)> {
        self.0.get_full(field).map(|(i, _, v)| (i, v))
    }

    /// Wraps the datum for propagation.
    #[inline]
    pub fn into_record(self) -> Record {
        Rc::new(self)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Datum {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut datum = Datum::new();
        for (k, v) in iter {
            datum.insert(k, v);
        }
        datum
    }
}

impl<K: Into<String>, V: Into<Value>, const N: usize> From<[(K, V); N]> for Datum {
    fn from(fields: [(K, V); N]) -> Self {
        fields.into_iter().collect()
    }
}

/// Field accessor resolved once at node construction.
///
/// Supports dotted paths into nested objects (`a.b`). A backslash escapes a
/// literal dot (`a\.b`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    name: String,
    path: Vec<String>,
}

impl Field {
    pub fn new(spec: &str) -> Self {
        let mut path = Vec::new();
        let mut current = String::new();
        let mut chars = spec.chars();
        while let Some(c) = chars.next() {
            match c {
                '\\' => {
                    if let Some(next) = chars.next() {
                        current.push(next);
                    }
                }
                '.' => path.push(std::mem::take(&mut current)),
                _ => current.push(c),
            }
        }
        path.push(current);

        Self {
            name: spec.to_string(),
            path,
        }
    }

    /// The field specification as given.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True if the accessor reads a top-level field.
    #[inline]
    pub fn is_simple(&self) -> bool {
        self.path.len() == 1
    }

    /// Top-level key for simple fields.
    #[inline]
    pub fn key(&self) -> &str {
        &self.path[0]
    }

    pub fn get<'a>(&self, datum: &'a Datum) -> Option<&'a Value> {
        let (first, rest) = self.path.split_first()?;
        let mut value = datum.get(first)?;
        for segment in rest {
            value = value.as_object()?.get(segment)?;
        }
        Some(value)
    }

    /// Like [`Field::get`] but missing fields read as null.
    #[inline]
    pub fn value<'a>(&self, datum: &'a Datum) -> &'a Value {
        self.get(datum).unwrap_or(&NULL)
    }

    #[inline]
    pub fn number(&self, datum: &Datum) -> Option<f64> {
        self.get(datum).and_then(Value::as_f64)
    }
}

/// A field accessor that remembers the column position of its field.
///
/// Records within a batch share their layout, so after the first lookup the
/// value is found by position. The key at that position is verified on each
/// access and a hashed lookup is used when it does not match.
#[derive(Debug, Clone)]
pub struct CachedField {
    field: Field,
    slot: Cell<Option<usize>>,
}

impl CachedField {
    pub fn new(spec: &str) -> Self {
        Self {
            field: Field::new(spec),
            slot: Cell::new(None),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        self.field.name()
    }

    #[inline]
    pub fn get<'a>(&self, datum: &'a Datum) -> Option<&'a Value> {
        if !self.field.is_simple() {
            return self.field.get(datum);
        }

        let key = self.field.key();
        if let Some(slot) = self.slot.get() {
            if let Some((k, v)) = datum.get_index(slot) {
                if k == key {
                    return Some(v);
                }
            }
        }

        let (slot, value) = datum.get_full(key)?;
        self.slot.set(Some(slot));
        Some(value)
    }

    #[inline]
    pub fn number(&self, datum: &Datum) -> Option<f64> {
        self.get(datum).and_then(Value::as_f64)
    }

    /// Forgets the column position, e.g. when a new file begins.
    pub fn invalidate(&self) {
        self.slot.set(None);
    }
}

/// Sort direction of a comparator key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// Multi-key record comparator.
#[derive(Debug, Clone)]
pub struct Comparator {
    keys: Vec<(Field, SortOrder)>,
}

impl Comparator {
    /// Keys without an explicit order sort ascending.
    pub fn new(fields: &[String], orders: &[SortOrder]) -> Self {
        let keys = fields
            .iter()
            .enumerate()
            .map(|(i, f)| (Field::new(f), orders.get(i).copied().unwrap_or_default()))
            .collect();
        Self { keys }
    }

    pub fn compare(&self, a: &Datum, b: &Datum) -> Ordering {
        for (field, order) in &self.keys {
            let ord = compare_values(field.value(a), field.value(b));
            let ord = match order {
                SortOrder::Ascending => ord,
                SortOrder::Descending => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datum_equality_ignores_order() {
        let a = Datum::from([("start", 1), ("end", 2)]);
        let b = Datum::from([("end", 2), ("start", 1)]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_datum_insert_keeps_position() {
        let mut d = Datum::from([("a", 1), ("b", 2)]);
        d.insert("a", 10);
        assert_eq!(d.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(d.get("a"), Some(&Value::Number(10.0)));
    }

    #[test]
    fn test_json_roundtrip_preserves_integers() {
        let d: Datum = serde_json::from_str(r#"{"chrom":"chr1","start":100,"score":0.5,"x":null}"#)
            .unwrap();
        assert_eq!(d.get("start"), Some(&Value::Number(100.0)));
        assert_eq!(d.get("x"), Some(&Value::Null));

        let json = serde_json::to_string(&d).unwrap();
        assert_eq!(json, r#"{"chrom":"chr1","start":100,"score":0.5,"x":null}"#);
    }

    #[test]
    fn test_nested_field_access() {
        let inner = Datum::from([("b", 42)]);
        let mut d = Datum::new();
        d.insert("a", inner);
        d.insert("a.b", "literal");

        assert_eq!(Field::new("a.b").number(&d), Some(42.0));
        assert_eq!(Field::new("a\\.b").value(&d).as_str(), Some("literal"));
        assert!(Field::new("a.c").get(&d).is_none());
        assert!(Field::new("missing").value(&d).is_null());
    }

    #[test]
    fn test_cached_field_falls_back_on_layout_change() {
        let field = CachedField::new("start");
        let a = Datum::from([("start", 1), ("end", 2)]);
        let b = Datum::from([("end", 4), ("start", 3)]);

        assert_eq!(field.number(&a), Some(1.0));
        assert_eq!(field.number(&a), Some(1.0));
        assert_eq!(field.number(&b), Some(3.0));
        assert_eq!(field.number(&a), Some(1.0));
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::from(0).is_truthy());
        assert!(!Value::from(f64::NAN).is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(Value::from("x").is_truthy());
        assert!(Value::from(-1).is_truthy());
    }

    #[test]
    fn test_display_formats_integers_without_fraction() {
        assert_eq!(Value::from(3.0).to_string(), "3");
        assert_eq!(Value::from(0.25).to_string(), "0.25");
        assert_eq!(
            Value::from(vec![Value::from("a"), Value::from(1)]).to_string(),
            "a,1"
        );
    }

    #[test]
    fn test_comparator_multiple_keys() {
        let cmp = Comparator::new(
            &["group".to_string(), "value".to_string()],
            &[SortOrder::Ascending, SortOrder::Descending],
        );
        let a = Datum::from([("group", Value::from("a")), ("value", Value::from(1))]);
        let b = Datum::from([("group", Value::from("a")), ("value", Value::from(5))]);
        let c = Datum::from([("group", Value::from("b")), ("value", Value::from(9))]);

        let mut data = vec![c.clone(), a.clone(), b.clone()];
        data.sort_by(|x, y| cmp.compare(x, y));
        assert_eq!(data, vec![b, a, c]);
    }

    #[test]
    fn test_compare_values() {
        assert_eq!(
            compare_values(&Value::Null, &Value::from(1)),
            Ordering::Less
        );
        assert_eq!(
            compare_values(&Value::from(2), &Value::from(10)),
            Ordering::Less
        );
        assert_eq!(
            compare_values(&Value::from("b"), &Value::from("a")),
            Ordering::Greater
        );
    }
}
