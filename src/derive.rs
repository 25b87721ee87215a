//! Derivation: turn a type description into a decoder tree, once.
//!
//! Resolution per encountered type, first match wins:
//! 1. shape (`none`, primitives, `dict`, enums, lists)
//! 2. `(owner, field)` override
//! 3. field-type override
//! 4. registry
//! 5. recursive derivation of the object's own fields
//!
//! A `(owner, field)` override names one field explicitly, so for that field
//! it is checked ahead of the shape.
//!
//! There is no cycle guard. A self-referential type must be broken by an
//! override or registry entry (see [`Deferred`](crate::codec::Deferred)).
use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::codec::{self, Decode, Decoder, EnumCodec, ListCodec, ObjectCodec};
use crate::error::{Error, Result};
use crate::introspect;
use crate::native::{FromNative, Native};
use crate::registry;
use crate::ty::{Described, ObjectDesc, Ty, TypeKey};

// ————————————————————————————————————————————————————————————————————————————
// OVERRIDES
// ————————————————————————————————————————————————————————————————————————————

/// Caller-supplied decoders that win over derived ones.
#[derive(Clone, Default)]
pub struct Overrides {
    fields: HashMap<(TypeKey, String), Decoder>,
    types: HashMap<TypeKey, Decoder>,
}

impl Overrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `decoder` for `field` whenever it is decoded as part of `owner`.
    pub fn field(mut self, owner: &Ty, field: impl Into<String>, decoder: Decoder) -> Self {
        self.insert_field(owner, field, decoder);
        self
    }

    /// Use `decoder` wherever a field (or list element) has type `ty`.
    ///
    /// Only object and opaque types consult this table. Builtins, enums and
    /// lists resolve by shape first, so an entry for one of them is never used.
    pub fn abstract_type(mut self, ty: &Ty, decoder: Decoder) -> Self {
        self.insert_abstract_type(ty, decoder);
        self
    }

    pub fn insert_field(&mut self, owner: &Ty, field: impl Into<String>, decoder: Decoder) {
        self.fields.insert((owner.key(), field.into()), decoder);
    }

    pub fn insert_abstract_type(&mut self, ty: &Ty, decoder: Decoder) {
        self.types.insert(ty.key(), decoder);
    }

    fn for_field(&self, owner: &ObjectDesc, field: &str) -> Option<&Decoder> {
        // Cheap reject before allocating the composite key.
        if self.fields.is_empty() {
            return None;
        }
        self.fields.get(&(owner.key(), field.to_string()))
    }

    fn for_type(&self, key: &TypeKey) -> Option<&Decoder> {
        self.types.get(key)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// DERIVATION
// ————————————————————————————————————————————————————————————————————————————

/// Build the decoder for `ty`.
///
/// The root type itself skips steps 2–4 so a placeholder registered for it can
/// be filled with the result; an opaque root still consults the registry.
pub fn derive(ty: &Ty, overrides: &Overrides) -> Result<Decoder> {
    let ty = ty.force();
    if let Some(decoder) = by_shape(&ty, overrides)? {
        return Ok(decoder);
    }
    match &ty {
        Ty::Object(desc) => derive_object(desc, overrides),
        _ => registry::registered(&ty.key()).ok_or_else(|| unsupported(&ty)),
    }
}

/// [`derive`] for a Rust type that describes itself.
pub fn derive_for<T: Described>(overrides: &Overrides) -> Result<Decoder> {
    derive(&T::describe(), overrides)
}

fn by_shape(ty: &Ty, overrides: &Overrides) -> Result<Option<Decoder>> {
    let decoder = match ty {
        Ty::Unmapped => codec::nothing(),
        Ty::Prim(_) | Ty::Dict => codec::passthrough(),
        Ty::Enum(desc) => codec::decoder(EnumCodec::new(desc.clone())),
        Ty::List(item) => codec::decoder(ListCodec::new(resolve(item, overrides)?)),
        Ty::Object(_) | Ty::Opaque(_) | Ty::Lazy(_) => return Ok(None),
    };
    Ok(Some(decoder))
}

/// Steps 1 and 3–5, for field types and list element types.
fn resolve(ty: &Ty, overrides: &Overrides) -> Result<Decoder> {
    let ty = ty.force();
    if let Some(decoder) = by_shape(&ty, overrides)? {
        return Ok(decoder);
    }
    let key = ty.key();
    if let Some(decoder) = overrides.for_type(&key) {
        return Ok(decoder.clone());
    }
    if let Some(decoder) = registry::registered(&key) {
        return Ok(decoder);
    }
    match &ty {
        Ty::Object(desc) => derive_object(desc, overrides),
        _ => Err(unsupported(&ty)),
    }
}

fn derive_object(desc: &Arc<ObjectDesc>, overrides: &Overrides) -> Result<Decoder> {
    let mut fields = IndexMap::new();
    for (name, field_ty) in introspect::fields(desc) {
        let decoder = resolve_field(desc, &name, &field_ty, overrides)?;
        fields.insert(name, decoder);
    }
    tracing::debug!(ty = %desc.name, fields = fields.len(), "derived object codec");
    Ok(codec::decoder(ObjectCodec::new(desc.clone(), fields)))
}

fn resolve_field(desc: &ObjectDesc, name: &str, ty: &Ty, overrides: &Overrides) -> Result<Decoder> {
    match overrides.for_field(desc, name) {
        Some(decoder) => Ok(decoder.clone()),
        None => resolve(ty, overrides),
    }
}

fn unsupported(ty: &Ty) -> Error {
    Error::Unsupported {
        ty: ty.to_string(),
        reason: "no registered decoder and no introspectable shape".to_string(),
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TEXT ENTRY POINT
// ————————————————————————————————————————————————————————————————————————————

/// A derived decoder wrapped for JSON text input.
#[derive(Clone)]
pub struct JsonDecoder {
    // `None` for the "no type" sentinel.
    inner: Option<Decoder>,
}

/// Derive once, decode JSON text many times.
pub fn make_decoder(ty: &Ty, overrides: &Overrides) -> Result<JsonDecoder> {
    if matches!(ty.force(), Ty::Unmapped) {
        return Ok(JsonDecoder { inner: None });
    }
    let inner = derive(ty, overrides)?;
    Ok(JsonDecoder { inner: Some(inner) })
}

impl JsonDecoder {
    /// Decode `text`. Text that is not JSON comes back unchanged as a string.
    pub fn decode(&self, text: &str) -> Result<Native> {
        let Some(inner) = &self.inner else {
            return Ok(Native::Null);
        };
        match serde_json::from_str::<Value>(text) {
            Ok(value) => inner.decode(&value, &Value::Null),
            Err(error) => {
                tracing::debug!(%error, "input is not JSON, returning it unchanged");
                Ok(Native::Str(text.to_string()))
            }
        }
    }

    pub fn decode_value(&self, value: &Value) -> Result<Native> {
        match &self.inner {
            Some(inner) => inner.decode(value, &Value::Null),
            None => Ok(Native::Null),
        }
    }

    /// Decode and convert into a concrete Rust value.
    pub fn decode_as<T: FromNative>(&self, text: &str) -> Result<T> {
        T::from_native(self.decode(text)?)
    }
}
