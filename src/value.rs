//! Attribute values.
//!
//! A model attribute holds a [`Value`]: scalars, dates, lists, maps, or a
//! shared cell. Change detection compares values with [`Value::deep_eq`],
//! which is structural rather than by identity.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use chrono::{DateTime, Utc};
use serde::de::Deserializer;
use serde::ser::{Error as _, Serializer};
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Mutable, shareable value cell. The only way to build a cyclic value.
pub type SharedValue = Rc<RefCell<Value>>;

/// Named attributes of a model.
///
/// Keys are kept sorted, so per-attribute notifications fire in key order.
pub type Attributes = BTreeMap<String, Value>;

/// Possible values an attribute can hold.
///
/// # Examples
///
/// ```
/// use modelkit::Value;
///
/// assert!(Value::Float(f64::NAN).deep_eq(&Value::Float(f64::NAN)));
/// assert!(!Value::Float(0.0).deep_eq(&Value::Float(-0.0)));
/// assert!(Value::Int(2).deep_eq(&Value::Float(2.0)));
/// ```
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Date(DateTime<Utc>),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Shared(SharedValue),
}

/// Builds an [`Attributes`] map from `key => value` pairs.
///
/// ```
/// use modelkit::{attrs, Value};
///
/// let a = attrs! { "title" => "a", "pages" => 12 };
/// assert_eq!(a.get("pages"), Some(&Value::Int(12)));
/// ```
#[macro_export]
macro_rules! attrs {
    () => {
        $crate::Attributes::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::Attributes::new();
        $(map.insert(::std::string::String::from($key), $crate::Value::from($value));)+
        map
    }};
}

impl Value {
    /// Wraps a value in a fresh shared cell.
    #[must_use]
    pub fn shared(value: Value) -> Self {
        Self::Shared(Rc::new(RefCell::new(value)))
    }

    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    pub const fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(v) => Some(v),
            _ => None,
        }
    }

    pub const fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Map(v) => Some(v),
            _ => None,
        }
    }

    /// Returns a human-readable type name.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Date(_) => "date",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Shared(_) => "shared",
        }
    }

    /// Structural equality used for change detection.
    ///
    /// `NaN` equals `NaN`, `0.0` and `-0.0` differ, integers equal floats of
    /// the same value, and lists and maps compare element-wise. Shared cells
    /// already being compared further up are assumed equal, so cyclic values
    /// terminate.
    #[must_use]
    pub fn deep_eq(&self, other: &Value) -> bool {
        let mut stack = Vec::new();
        eq(self, other, &mut stack)
    }

    /// Ordering used by key-extraction comparators.
    ///
    /// Values of different kinds order by kind (null, bool, number, string,
    /// date, list, map); numbers use IEEE total ordering.
    #[must_use]
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Self::Shared(a), _) => match a.try_borrow() {
                Ok(a) if !matches!(*a, Self::Shared(_)) => a.sort_cmp(other),
                _ => Ordering::Equal,
            },
            (_, Self::Shared(b)) => match b.try_borrow() {
                Ok(b) if !matches!(*b, Self::Shared(_)) => self.sort_cmp(&b),
                _ => Ordering::Equal,
            },
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::String(a), Self::String(b)) => a.cmp(b),
            (Self::Date(a), Self::Date(b)) => a.cmp(b),
            (Self::List(a), Self::List(b)) => a.len().cmp(&b.len()),
            (Self::Map(a), Self::Map(b)) => a.len().cmp(&b.len()),
            (a, b) => match (a.as_float(), b.as_float()) {
                (Some(x), Some(y)) => x.total_cmp(&y),
                _ => a.kind_rank().cmp(&b.kind_rank()),
            },
        }
    }

    const fn kind_rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Bool(_) => 1,
            Self::Int(_) | Self::Float(_) => 2,
            Self::String(_) => 3,
            Self::Date(_) => 4,
            Self::List(_) => 5,
            Self::Map(_) | Self::Shared(_) => 6,
        }
    }

    /// Converts to plain JSON.
    ///
    /// Non-finite floats become `null`, dates become RFC 3339 strings.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::CyclicValue`] if a shared cell contains itself.
    pub fn to_json(&self) -> ModelResult<serde_json::Value> {
        let mut stack = Vec::new();
        to_json(self, &mut stack)
    }
}

#[allow(clippy::float_cmp)]
fn float_eq(a: f64, b: f64) -> bool {
    if a.is_nan() {
        return b.is_nan();
    }
    if a == 0.0 && b == 0.0 {
        return a.is_sign_negative() == b.is_sign_negative();
    }
    a == b
}

fn eq(a: &Value, b: &Value, stack: &mut Vec<*const RefCell<Value>>) -> bool {
    match (a, b) {
        (Value::Shared(x), Value::Shared(y)) if Rc::ptr_eq(x, y) => true,
        (Value::Shared(x), _) => {
            let ptr = Rc::as_ptr(x);
            if stack.contains(&ptr) {
                return true;
            }
            stack.push(ptr);
            let result = x.try_borrow().map_or(false, |inner| eq(&inner, b, stack));
            stack.pop();
            result
        }
        (_, Value::Shared(y)) => {
            let ptr = Rc::as_ptr(y);
            if stack.contains(&ptr) {
                return true;
            }
            stack.push(ptr);
            let result = y.try_borrow().map_or(false, |inner| eq(a, &inner, stack));
            stack.pop();
            result
        }
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Date(x), Value::Date(y)) => x == y,
        (Value::List(x), Value::List(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| eq(l, r, stack))
        }
        (Value::Map(x), Value::Map(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .all(|(k, l)| y.get(k).is_some_and(|r| eq(l, r, stack)))
        }
        (Value::Float(_) | Value::Int(_), Value::Float(_) | Value::Int(_)) => {
            match (a.as_float(), b.as_float()) {
                (Some(x), Some(y)) => float_eq(x, y),
                _ => false,
            }
        }
        _ => false,
    }
}

fn to_json(
    value: &Value,
    stack: &mut Vec<*const RefCell<Value>>,
) -> ModelResult<serde_json::Value> {
    use serde_json::Value as Json;

    Ok(match value {
        Value::Null => Json::Null,
        Value::Bool(v) => Json::Bool(*v),
        Value::Int(v) => Json::from(*v),
        Value::Float(v) => serde_json::Number::from_f64(*v).map_or(Json::Null, Json::Number),
        Value::String(v) => Json::String(v.clone()),
        Value::Date(v) => Json::String(v.to_rfc3339()),
        Value::List(items) => Json::Array(
            items
                .iter()
                .map(|item| to_json(item, stack))
                .collect::<ModelResult<_>>()?,
        ),
        Value::Map(entries) => {
            let mut out = serde_json::Map::new();
            for (k, v) in entries {
                out.insert(k.clone(), to_json(v, stack)?);
            }
            Json::Object(out)
        }
        Value::Shared(cell) => {
            let ptr = Rc::as_ptr(cell);
            if stack.contains(&ptr) {
                return Err(ModelError::CyclicValue);
            }
            let inner = cell.try_borrow().map_err(|_| ModelError::CyclicValue)?;
            stack.push(ptr);
            let out = to_json(&inner, stack);
            stack.pop();
            out?
        }
    })
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.deep_eq(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "Null"),
            Self::Bool(v) => f.debug_tuple("Bool").field(v).finish(),
            Self::Int(v) => f.debug_tuple("Int").field(v).finish(),
            Self::Float(v) => f.debug_tuple("Float").field(v).finish(),
            Self::String(v) => f.debug_tuple("String").field(v).finish(),
            Self::Date(v) => f.debug_tuple("Date").field(v).finish(),
            Self::List(v) => f.debug_tuple("List").field(v).finish(),
            Self::Map(v) => f.debug_tuple("Map").field(v).finish(),
            // Shared cells may be cyclic; print the cell address only.
            Self::Shared(v) => f.debug_tuple("Shared").field(&Rc::as_ptr(v)).finish(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "{v}"),
            Self::Date(v) => write!(f, "{}", v.to_rfc3339()),
            Self::List(_) | Self::Map(_) | Self::Shared(_) => match self.to_json() {
                Ok(json) => write!(f, "{json}"),
                Err(_) => write!(f, "[cyclic]"),
            },
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json()
            .map_err(S::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Self::from)
    }
}

// Convenient From implementations
impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Float(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Date(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Self::List(v)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(v: BTreeMap<String, Value>) -> Self {
        Self::Map(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        use serde_json::Value as Json;

        match v {
            Json::Null => Self::Null,
            Json::Bool(b) => Self::Bool(b),
            Json::Number(n) => n
                .as_i64()
                .map_or_else(|| Self::Float(n.as_f64().unwrap_or(f64::NAN)), Self::Int),
            Json::String(s) => Self::String(s),
            Json::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            Json::Object(entries) => {
                Self::Map(entries.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}
