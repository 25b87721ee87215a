//! The native object model decoders produce and the serializer consumes.
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{Number, Value};

use crate::error::{Error, Result};
use crate::ty::{EnumDesc, ObjectDesc};

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Native {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    Str(String),
    Enum(EnumValue),
    Seq(Vec<Native>),
    /// Untyped mapping; insertion ordered like the JSON it came from.
    Dict(IndexMap<String, Native>),
    Object(Instance),
}

/// A member of an enum description, by position.
#[derive(Debug, Clone)]
pub struct EnumValue {
    desc: Arc<EnumDesc>,
    index: usize,
}

/// An object built from an [`ObjectDesc`].
///
/// Attributes are kept in assignment order. Decoding sets every declared
/// field, but callers may also set attributes the description never declared;
/// the serializer emits those too.
#[derive(Clone)]
pub struct Instance {
    desc: Arc<ObjectDesc>,
    attrs: IndexMap<String, Native>,
}

// ————————————————————————————————————————————————————————————————————————————
// NATIVE
// ————————————————————————————————————————————————————————————————————————————

impl Native {
    /// Structural copy of a JSON value; nothing is interpreted.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Native::Null,
            Value::Bool(b) => Native::Bool(*b),
            Value::Number(n) => Native::Number(n.clone()),
            Value::String(s) => Native::Str(s.clone()),
            Value::Array(xs) => Native::Seq(xs.iter().map(Native::from_json).collect()),
            Value::Object(map) => Native::Dict(
                map.iter().map(|(k, v)| (k.clone(), Native::from_json(v))).collect(),
            ),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Native::Null)
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Native::Null => "null",
            Native::Bool(_) => "bool",
            Native::Number(_) => "number",
            Native::Str(_) => "string",
            Native::Enum(_) => "enum",
            Native::Seq(_) => "sequence",
            Native::Dict(_) => "mapping",
            Native::Object(_) => "object",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Native::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Native::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Native::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Native::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<&EnumValue> {
        match self {
            Native::Enum(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&[Native]> {
        match self {
            Native::Seq(xs) => Some(xs),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&IndexMap<String, Native>> {
        match self {
            Native::Dict(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_instance(&self) -> Option<&Instance> {
        match self {
            Native::Object(instance) => Some(instance),
            _ => None,
        }
    }
}

impl From<Value> for Native {
    fn from(value: Value) -> Self {
        Native::from_json(&value)
    }
}

impl From<bool> for Native {
    fn from(b: bool) -> Self { Native::Bool(b) }
}

impl From<i64> for Native {
    fn from(n: i64) -> Self { Native::Number(n.into()) }
}

impl From<u64> for Native {
    fn from(n: u64) -> Self { Native::Number(n.into()) }
}

impl From<i32> for Native {
    fn from(n: i32) -> Self { Native::Number(n.into()) }
}

/// Non-finite floats have no JSON form and become null.
impl From<f64> for Native {
    fn from(f: f64) -> Self {
        Number::from_f64(f).map_or(Native::Null, Native::Number)
    }
}

impl From<String> for Native {
    fn from(s: String) -> Self { Native::Str(s) }
}

impl From<&str> for Native {
    fn from(s: &str) -> Self { Native::Str(s.to_string()) }
}

impl From<EnumValue> for Native {
    fn from(e: EnumValue) -> Self { Native::Enum(e) }
}

impl From<Instance> for Native {
    fn from(instance: Instance) -> Self { Native::Object(instance) }
}

impl<T: Into<Native>> From<Vec<T>> for Native {
    fn from(xs: Vec<T>) -> Self {
        Native::Seq(xs.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Native>> From<Option<T>> for Native {
    fn from(x: Option<T>) -> Self {
        x.map_or(Native::Null, Into::into)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// ENUM VALUES
// ————————————————————————————————————————————————————————————————————————————

impl EnumValue {
    pub fn new(desc: Arc<EnumDesc>, member: &str) -> Option<Self> {
        let index = desc.index_of(member)?;
        Some(Self { desc, index })
    }

    pub fn name(&self) -> &str {
        &self.desc.members[self.index]
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn desc(&self) -> &Arc<EnumDesc> {
        &self.desc
    }
}

impl PartialEq for EnumValue {
    fn eq(&self, other: &Self) -> bool {
        self.desc.name == other.desc.name && self.index == other.index
    }
}

impl fmt::Display for EnumValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.desc.name, self.name())
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INSTANCES
// ————————————————————————————————————————————————————————————————————————————

impl Instance {
    /// A default-constructed instance: no attributes set yet.
    pub fn blank(desc: Arc<ObjectDesc>) -> Self {
        Self { desc, attrs: IndexMap::new() }
    }

    pub fn desc(&self) -> &Arc<ObjectDesc> {
        &self.desc
    }

    pub fn type_name(&self) -> &str {
        &self.desc.name
    }

    pub fn get(&self, name: &str) -> Option<&Native> {
        self.attrs.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Native>) {
        self.attrs.insert(name.into(), value.into());
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Native>) -> Self {
        self.set(name, value);
        self
    }

    pub fn attrs(&self) -> &IndexMap<String, Native> {
        &self.attrs
    }

    /// Move an attribute out as a typed value; an unset attribute reads as null.
    pub fn take<T: FromNative>(&mut self, name: &str) -> Result<T> {
        let value = self.attrs.shift_remove(name).unwrap_or_default();
        T::from_native(value)
    }
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        self.desc.name == other.desc.name && self.attrs == other.attrs
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct(&self.desc.name);
        for (name, value) in &self.attrs {
            out.field(name, value);
        }
        out.finish()
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TYPED EXTRACTION
// ————————————————————————————————————————————————————————————————————————————

/// Conversion out of the native model into concrete Rust values.
pub trait FromNative: Sized {
    fn from_native(native: Native) -> Result<Self>;
}

impl FromNative for Native {
    fn from_native(native: Native) -> Result<Self> {
        Ok(native)
    }
}

impl FromNative for bool {
    fn from_native(native: Native) -> Result<Self> {
        native.as_bool().ok_or_else(|| Error::mismatch("bool", &native))
    }
}

impl FromNative for i64 {
    fn from_native(native: Native) -> Result<Self> {
        native.as_i64().ok_or_else(|| Error::mismatch("integer", &native))
    }
}

impl FromNative for u64 {
    fn from_native(native: Native) -> Result<Self> {
        let unsigned = match &native {
            Native::Number(n) => n.as_u64(),
            _ => None,
        };
        unsigned.ok_or_else(|| Error::mismatch("unsigned integer", &native))
    }
}

impl FromNative for f64 {
    fn from_native(native: Native) -> Result<Self> {
        native.as_f64().ok_or_else(|| Error::mismatch("number", &native))
    }
}

impl FromNative for String {
    fn from_native(native: Native) -> Result<Self> {
        match native {
            Native::Str(s) => Ok(s),
            other => Err(Error::mismatch("string", &other)),
        }
    }
}

impl FromNative for EnumValue {
    fn from_native(native: Native) -> Result<Self> {
        match native {
            Native::Enum(e) => Ok(e),
            other => Err(Error::mismatch("enum", &other)),
        }
    }
}

impl FromNative for Instance {
    fn from_native(native: Native) -> Result<Self> {
        match native {
            Native::Object(instance) => Ok(instance),
            other => Err(Error::mismatch("object", &other)),
        }
    }
}

impl<T: FromNative> FromNative for Option<T> {
    fn from_native(native: Native) -> Result<Self> {
        match native {
            Native::Null => Ok(None),
            other => T::from_native(other).map(Some),
        }
    }
}

impl<T: FromNative> FromNative for Vec<T> {
    fn from_native(native: Native) -> Result<Self> {
        match native {
            Native::Seq(xs) => xs.into_iter().map(T::from_native).collect(),
            other => Err(Error::mismatch("sequence", &other)),
        }
    }
}
