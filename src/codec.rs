//! Composable decoders. Derivation assembles these into a tree per type.
//!
//! Every decoder sees two JSON values: the one it is decoding and the object
//! that encloses it. Only the polymorphic switches look at the second one, but
//! every codec forwards it so switches work at any depth.
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use once_cell::sync::{Lazy, OnceCell};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::native::{EnumValue, Instance, Native};
use crate::ty::{EnumDesc, ObjectDesc};

pub trait Decode: Send + Sync {
    fn decode(&self, value: &Value, parent: &Value) -> Result<Native>;
}

pub type Decoder = Arc<dyn Decode>;

impl<F> Decode for F
where
    F: Fn(&Value, &Value) -> Result<Native> + Send + Sync,
{
    fn decode(&self, value: &Value, parent: &Value) -> Result<Native> {
        self(value, parent)
    }
}

pub fn decoder<D: Decode + 'static>(decode: D) -> Decoder {
    Arc::new(decode)
}

// ————————————————————————————————————————————————————————————————————————————
// LEAVES
// ————————————————————————————————————————————————————————————————————————————

/// Scalars and untyped mappings: the JSON shape is the native shape.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl Decode for Passthrough {
    fn decode(&self, value: &Value, _parent: &Value) -> Result<Native> {
        Ok(Native::from_json(value))
    }
}

static PASSTHROUGH: Lazy<Decoder> = Lazy::new(|| decoder(Passthrough));
static NOTHING: Lazy<Decoder> = Lazy::new(|| decoder(Nothing));

pub fn passthrough() -> Decoder {
    PASSTHROUGH.clone()
}

/// Decoder for intentionally unmapped fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct Nothing;

impl Decode for Nothing {
    fn decode(&self, _value: &Value, _parent: &Value) -> Result<Native> {
        Ok(Native::Null)
    }
}

pub fn nothing() -> Decoder {
    NOTHING.clone()
}

#[derive(Debug, Clone)]
pub struct EnumCodec {
    desc: Arc<EnumDesc>,
}

impl EnumCodec {
    pub fn new(desc: Arc<EnumDesc>) -> Self {
        Self { desc }
    }
}

impl Decode for EnumCodec {
    fn decode(&self, value: &Value, _parent: &Value) -> Result<Native> {
        let name = match value {
            Value::Null => return Ok(Native::Null),
            Value::String(name) => name,
            other => return Err(self.unknown(other.to_string())),
        };
        EnumValue::new(self.desc.clone(), name)
            .map(Native::Enum)
            .ok_or_else(|| self.unknown(name.clone()))
    }
}

impl EnumCodec {
    fn unknown(&self, value: String) -> Error {
        Error::UnknownEnumMember { ty: self.desc.name.clone(), value }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// CONTAINERS
// ————————————————————————————————————————————————————————————————————————————

pub struct ListCodec {
    item: Decoder,
}

impl ListCodec {
    pub fn new(item: Decoder) -> Self {
        Self { item }
    }
}

impl Decode for ListCodec {
    fn decode(&self, value: &Value, parent: &Value) -> Result<Native> {
        match value {
            Value::Null => Ok(Native::Null),
            Value::Array(xs) => xs
                .iter()
                .map(|x| self.item.decode(x, parent))
                .collect::<Result<Vec<_>>>()
                .map(Native::Seq),
            // not a validating parser
            other => Ok(Native::from_json(other)),
        }
    }
}

pub struct ObjectCodec {
    desc: Arc<ObjectDesc>,
    fields: IndexMap<String, Decoder>,
}

impl ObjectCodec {
    pub fn new(desc: Arc<ObjectDesc>, fields: IndexMap<String, Decoder>) -> Self {
        Self { desc, fields }
    }
}

impl Decode for ObjectCodec {
    fn decode(&self, value: &Value, _parent: &Value) -> Result<Native> {
        if value.is_null() {
            return Ok(Native::Null);
        }
        let mut instance = Instance::blank(self.desc.clone());
        for (name, field) in &self.fields {
            let raw = value.get(name).unwrap_or(&Value::Null);
            instance.set(name.as_str(), field.decode(raw, value)?);
        }
        Ok(Native::Object(instance))
    }
}

impl fmt::Debug for ObjectCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectCodec")
            .field("type", &self.desc.name)
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .finish()
    }
}

// ————————————————————————————————————————————————————————————————————————————
// DEFERRED
// ————————————————————————————————————————————————————————————————————————————

/// A placeholder that is handed out before the decoder it stands for exists.
///
/// Register one (or put it in an override table) for a self-referential type,
/// derive the type, then [`fill`](Deferred::fill) the placeholder with the
/// result. Clones share the same slot.
#[derive(Clone)]
pub struct Deferred {
    ty: String,
    slot: Arc<OnceCell<Decoder>>,
}

impl Deferred {
    pub fn new(ty: impl Into<String>) -> Self {
        Self { ty: ty.into(), slot: Arc::new(OnceCell::new()) }
    }

    /// Fill the slot. A slot can only be filled once.
    pub fn fill(&self, decoder: Decoder) -> Result<()> {
        self.slot
            .set(decoder)
            .map_err(|_| Error::DuplicateRegistration { ty: self.ty.clone() })
    }

    pub fn is_filled(&self) -> bool {
        self.slot.get().is_some()
    }
}

impl Decode for Deferred {
    fn decode(&self, value: &Value, parent: &Value) -> Result<Native> {
        match self.slot.get() {
            Some(inner) => inner.decode(value, parent),
            None => Err(Error::Unresolved { ty: self.ty.clone() }),
        }
    }
}

impl fmt::Debug for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred").field("ty", &self.ty).field("filled", &self.is_filled()).finish()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::ty::Ty;

    fn color() -> Arc<EnumDesc> {
        Arc::new(EnumDesc::new("Color", ["RED", "GREEN"]))
    }

    #[test]
    fn passthrough_is_lenient() {
        let odd = json!({"not": "an int"});
        assert_eq!(passthrough().decode(&odd, &Value::Null).unwrap(), Native::from(odd));
        assert_eq!(passthrough().decode(&json!(7), &Value::Null).unwrap().as_i64(), Some(7));
    }

    #[test]
    fn enum_codec_maps_names() {
        let codec = EnumCodec::new(color());
        let green = codec.decode(&json!("GREEN"), &Value::Null).unwrap();
        assert_eq!(green.as_enum().map(EnumValue::name), Some("GREEN"));
        assert!(codec.decode(&Value::Null, &Value::Null).unwrap().is_null());
        match codec.decode(&json!("BLUE"), &Value::Null) {
            Err(Error::UnknownEnumMember { ty, value }) => {
                assert_eq!(ty, "Color");
                assert_eq!(value, "BLUE");
            }
            other => panic!("expected lookup failure, got {other:?}"),
        }
        assert!(codec.decode(&json!(1), &Value::Null).is_err());
    }

    #[test]
    fn list_codec_keeps_null_apart_from_empty() {
        let codec = ListCodec::new(decoder(EnumCodec::new(color())));
        assert!(codec.decode(&Value::Null, &Value::Null).unwrap().is_null());
        assert_eq!(codec.decode(&json!([]), &Value::Null).unwrap(), Native::Seq(vec![]));
        let xs = codec.decode(&json!(["RED", null, "GREEN"]), &Value::Null).unwrap();
        let names: Vec<Option<&str>> = xs
            .as_seq()
            .unwrap()
            .iter()
            .map(|x| x.as_enum().map(EnumValue::name))
            .collect();
        assert_eq!(names, [Some("RED"), None, Some("GREEN")]);
    }

    #[test]
    fn one_bad_element_fails_the_list() {
        let codec = ListCodec::new(decoder(EnumCodec::new(color())));
        assert!(codec.decode(&json!(["RED", "PINK"]), &Value::Null).is_err());
    }

    #[test]
    fn list_elements_see_the_enclosing_parent() {
        let element = decoder(|value: &Value, parent: &Value| {
            Ok::<_, Error>(Native::from(format!("{}:{}", parent["kind"].as_str().unwrap_or("?"), value)))
        });
        let codec = ListCodec::new(element);
        let parent = json!({"kind": "dog", "pets": [1, 2]});
        let out = codec.decode(&parent["pets"], &parent).unwrap();
        assert_eq!(out, Native::from(vec!["dog:1", "dog:2"]));
    }

    #[test]
    fn object_codec_sets_every_field() {
        let desc = Arc::new(ObjectDesc::new("Point").field("x", Ty::int()).field("y", Ty::int()));
        let fields = IndexMap::from([
            ("x".to_string(), passthrough()),
            ("y".to_string(), passthrough()),
        ]);
        let codec = ObjectCodec::new(desc, fields);
        let point = codec.decode(&json!({"x": 1, "extra": true}), &Value::Null).unwrap();
        let point = point.as_instance().unwrap();
        assert_eq!(point.get("x").and_then(Native::as_i64), Some(1));
        assert_eq!(point.get("y"), Some(&Native::Null));
        assert_eq!(point.get("extra"), None);
        assert!(codec.decode(&Value::Null, &Value::Null).unwrap().is_null());
    }

    #[test]
    fn object_codec_hands_itself_to_fields_as_parent() {
        let desc = Arc::new(ObjectDesc::new("Tagged").field("body", Ty::Dict));
        let body = decoder(|_: &Value, parent: &Value| Ok::<_, Error>(Native::from_json(&parent["tag"])));
        let codec = ObjectCodec::new(desc, IndexMap::from([("body".to_string(), body)]));
        let out = codec.decode(&json!({"tag": "t1", "body": {}}), &Value::Null).unwrap();
        assert_eq!(out.as_instance().unwrap().get("body").and_then(Native::as_str), Some("t1"));
    }

    #[test]
    fn deferred_fails_until_filled() {
        let slot = Deferred::new("Later");
        let as_decoder = decoder(slot.clone());
        assert!(matches!(as_decoder.decode(&json!(1), &Value::Null), Err(Error::Unresolved { .. })));
        slot.fill(passthrough()).unwrap();
        assert_eq!(as_decoder.decode(&json!(1), &Value::Null).unwrap().as_i64(), Some(1));
        assert!(slot.fill(nothing()).is_err());
    }
}
