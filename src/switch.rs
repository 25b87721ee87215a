//! Polymorphic dispatch: pick a decoder from a discriminator value at decode time.
//!
//! Both switches are lenient. A missing, non-string or unknown discriminator
//! decodes to null instead of failing.
use indexmap::IndexMap;
use serde_json::Value;

use crate::codec::{Decode, Decoder};
use crate::error::Result;
use crate::native::Native;

/// Discriminator lives next to the field, in the enclosing object.
///
/// `{"kind": "dog", "pet": {...}}` with the switch installed on `pet` and
/// keyed on `kind`.
pub struct BySiblingField {
    table: Table,
}

/// Discriminator lives inside the value being decoded.
///
/// `{"shape": {"type": "circle", "r": 1}}` with the switch installed for the
/// abstract type of `shape` and keyed on `type`.
pub struct ByDiscriminatorField {
    table: Table,
}

struct Table {
    field: String,
    cases: IndexMap<String, Decoder>,
}

impl Table {
    fn new(field: impl Into<String>, cases: IndexMap<String, Decoder>) -> Self {
        Self { field: field.into(), cases }
    }

    fn select(&self, holder: &Value) -> Option<&Decoder> {
        let tag = holder.get(&self.field).and_then(Value::as_str);
        let found = tag.and_then(|tag| self.cases.get(tag));
        if found.is_none() {
            tracing::trace!(field = %self.field, ?tag, "no case for discriminator");
        }
        found
    }

    fn dispatch(&self, holder: &Value, value: &Value, parent: &Value) -> Result<Native> {
        match self.select(holder) {
            Some(decoder) => decoder.decode(value, parent),
            None => Ok(Native::Null),
        }
    }
}

impl BySiblingField {
    pub fn new(field: impl Into<String>, cases: IndexMap<String, Decoder>) -> Self {
        Self { table: Table::new(field, cases) }
    }

    pub fn case(mut self, tag: impl Into<String>, decoder: Decoder) -> Self {
        self.table.cases.insert(tag.into(), decoder);
        self
    }
}

impl Decode for BySiblingField {
    fn decode(&self, value: &Value, parent: &Value) -> Result<Native> {
        self.table.dispatch(parent, value, parent)
    }
}

impl ByDiscriminatorField {
    pub fn new(field: impl Into<String>, cases: IndexMap<String, Decoder>) -> Self {
        Self { table: Table::new(field, cases) }
    }

    pub fn case(mut self, tag: impl Into<String>, decoder: Decoder) -> Self {
        self.table.cases.insert(tag.into(), decoder);
        self
    }
}

impl Decode for ByDiscriminatorField {
    fn decode(&self, value: &Value, parent: &Value) -> Result<Native> {
        self.table.dispatch(value, value, parent)
    }
}
