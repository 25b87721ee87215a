//! Type descriptions loaded from a JSON schema file.
//!
//! ```json
//! {
//!   "enums":   { "Color": ["RED", "GREEN"] },
//!   "objects": { "Pet": { "extends": ["Animal"], "fields": { "tags": { "list": "str" } } } },
//!   "opaque":  ["Blob"],
//!   "switches": [
//!     { "by": "sibling_field", "owner": "Home", "field": "pet",
//!       "discriminator": "kind", "cases": { "dog": "Dog" } },
//!     { "by": "discriminator_field", "type": "Shape",
//!       "discriminator": "type", "cases": { "circle": "Circle" } }
//!   ]
//! }
//! ```
//!
//! Builtin type names: `int`, `float`, `bool`, `str`, `dict`, `none`.
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use once_cell::sync::OnceCell;
use serde::Deserialize;

use crate::codec::{decoder, Decoder, Deferred};
use crate::derive::{derive, make_decoder, JsonDecoder, Overrides};
use crate::error::{Error, Result};
use crate::introspect;
use crate::switch::{ByDiscriminatorField, BySiblingField};
use crate::ty::{EnumDesc, ObjectDesc, Ty};

// ————————————————————————————————————————————————————————————————————————————
// FILE FORMAT
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaFile {
    #[serde(default)]
    pub enums: IndexMap<String, Vec<String>>,
    #[serde(default)]
    pub objects: IndexMap<String, ObjectDef>,
    #[serde(default)]
    pub opaque: Vec<String>,
    #[serde(default)]
    pub switches: Vec<SwitchDef>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ObjectDef {
    #[serde(default)]
    pub extends: Vec<String>,
    #[serde(default)]
    pub fields: IndexMap<String, TyExpr>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum TyExpr {
    Name(String),
    List { list: Box<TyExpr> },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "by", rename_all = "snake_case")]
pub enum SwitchDef {
    SiblingField {
        owner: String,
        field: String,
        discriminator: String,
        cases: IndexMap<String, TyExpr>,
    },
    DiscriminatorField {
        #[serde(rename = "type")]
        ty: String,
        discriminator: String,
        cases: IndexMap<String, TyExpr>,
    },
}

const BUILTINS: [&str; 6] = ["int", "float", "bool", "str", "dict", "none"];

// ————————————————————————————————————————————————————————————————————————————
// SCHEMA
// ————————————————————————————————————————————————————————————————————————————

/// A validated schema file with its descriptions built.
///
/// Object references inside field types are lazy and point back into the
/// schema, so self-referential objects are fine. Types handed out stay
/// usable while the `Schema` is alive; afterwards object references resolve
/// to `none`.
#[derive(Clone)]
pub struct Schema {
    inner: Arc<Inner>,
}

struct Inner {
    enums: IndexMap<String, Arc<EnumDesc>>,
    objects: IndexMap<String, Arc<ObjectDesc>>,
    opaque: HashSet<String>,
    switches: Vec<SwitchDef>,
    overrides: OnceCell<Overrides>,
}

impl Schema {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        let file = crate::path_de::from_slice_with_path::<SchemaFile>(&bytes)?;
        Self::build(file)
    }

    pub fn parse(src: &str) -> Result<Self> {
        let file = crate::path_de::from_str_with_path::<SchemaFile>(src)?;
        Self::build(file)
    }

    pub fn build(file: SchemaFile) -> Result<Self> {
        validate(&file)?;
        let inner = Arc::new_cyclic(|weak| {
            let enums: IndexMap<String, Arc<EnumDesc>> = file
                .enums
                .iter()
                .map(|(name, members)| (name.clone(), Arc::new(EnumDesc::new(name.clone(), members.clone()))))
                .collect();
            let opaque: HashSet<String> = file.opaque.iter().cloned().collect();
            let mut built = IndexMap::new();
            for name in file.objects.keys() {
                build_object(name, &file, &enums, &opaque, weak, &mut built);
            }
            // keep file order
            let objects = file
                .objects
                .keys()
                .filter_map(|name| built.get(name).map(|desc: &Arc<ObjectDesc>| (name.clone(), desc.clone())))
                .collect();
            Inner { enums, objects, opaque, switches: file.switches.clone(), overrides: OnceCell::new() }
        });
        tracing::debug!(
            enums = inner.enums.len(),
            objects = inner.objects.len(),
            switches = inner.switches.len(),
            "schema loaded"
        );
        Ok(Self { inner })
    }

    /// The description for a builtin or declared type name.
    pub fn ty(&self, name: &str) -> Result<Ty> {
        let inner = &self.inner;
        if let Some(ty) = builtin(name) {
            return Ok(ty);
        }
        if let Some(desc) = inner.enums.get(name) {
            return Ok(Ty::Enum(desc.clone()));
        }
        if let Some(desc) = inner.objects.get(name) {
            return Ok(Ty::Object(desc.clone()));
        }
        if inner.opaque.contains(name) {
            return Ok(Ty::opaque(name));
        }
        Err(Error::schema("$", format!("unknown type `{name}`")))
    }

    fn expr(&self, expr: &TyExpr) -> Result<Ty> {
        match expr {
            TyExpr::Name(name) => self.ty(name),
            TyExpr::List { list } => Ok(Ty::list(self.expr(list)?)),
        }
    }

    /// Merged field table of an object type.
    pub fn fields(&self, name: &str) -> Result<IndexMap<String, Ty>> {
        match self.inner.objects.get(name) {
            Some(desc) => Ok(introspect::fields(desc)),
            None => Err(Error::schema("$", format!("`{name}` is not an object type"))),
        }
    }

    /// Override tables for this schema.
    ///
    /// Every object type gets a deferred decoder as a type override, which is
    /// what lets recursive objects derive. Sibling-field switches become field
    /// overrides, discriminator-field switches become type overrides.
    ///
    /// The tables are built once per schema and shared by every later call.
    /// A recursive object's deferred slot ends up holding a decoder that
    /// points back at the slot, so that graph lives until the process exits.
    pub fn overrides(&self) -> Result<Overrides> {
        self.inner.overrides.get_or_try_init(|| self.build_overrides()).cloned()
    }

    fn build_overrides(&self) -> Result<Overrides> {
        let mut overrides = Overrides::new();
        let mut slots: Vec<(Ty, Deferred)> = Vec::new();

        for (name, desc) in &self.inner.objects {
            let slot = Deferred::new(name.clone());
            let ty = Ty::Object(desc.clone());
            overrides.insert_abstract_type(&ty, decoder(slot.clone()));
            slots.push((ty, slot));
        }

        for switch in &self.inner.switches {
            match switch {
                SwitchDef::SiblingField { owner, field, discriminator, cases } => {
                    let cases = self.cases(cases, &mut slots)?;
                    let switch = BySiblingField::new(discriminator.clone(), cases);
                    overrides.insert_field(&self.ty(owner)?, field.clone(), decoder(switch));
                }
                SwitchDef::DiscriminatorField { ty, discriminator, cases } => {
                    let cases = self.cases(cases, &mut slots)?;
                    let switch = ByDiscriminatorField::new(discriminator.clone(), cases);
                    overrides.insert_abstract_type(&self.ty(ty)?, decoder(switch));
                }
            }
        }

        // Every table entry is in place; now derive what the slots stand for.
        for (ty, slot) in &slots {
            slot.fill(derive(ty, &overrides)?)?;
        }
        Ok(overrides)
    }

    // Object cases reuse the object's slot; other case types get one of their own.
    fn cases(
        &self,
        cases: &IndexMap<String, TyExpr>,
        slots: &mut Vec<(Ty, Deferred)>,
    ) -> Result<IndexMap<String, Decoder>> {
        let mut out = IndexMap::new();
        for (tag, expr) in cases {
            let ty = self.expr(expr)?;
            let existing = match &ty {
                Ty::Object(_) => slot_for(slots, &ty),
                _ => None,
            };
            let slot = match existing {
                Some(slot) => slot,
                None => {
                    let slot = Deferred::new(ty.to_string());
                    slots.push((ty, slot.clone()));
                    slot
                }
            };
            out.insert(tag.clone(), decoder(slot));
        }
        Ok(out)
    }

    /// Derive a text decoder for `root` with this schema's overrides.
    pub fn make_decoder(&self, root: &str) -> Result<JsonDecoder> {
        let ty = self.ty(root)?;
        make_decoder(&ty, &self.overrides()?)
    }
}

fn slot_for(slots: &[(Ty, Deferred)], ty: &Ty) -> Option<Deferred> {
    let key = ty.key();
    slots.iter().find(|(t, _)| t.key() == key).map(|(_, slot)| slot.clone())
}

fn builtin(name: &str) -> Option<Ty> {
    Some(match name {
        "int" => Ty::int(),
        "float" => Ty::float(),
        "bool" => Ty::bool(),
        "str" => Ty::str(),
        "dict" => Ty::Dict,
        "none" => Ty::Unmapped,
        _ => return None,
    })
}

// ————————————————————————————————————————————————————————————————————————————
// BUILD
// ————————————————————————————————————————————————————————————————————————————

// Parents are built first so they can be shared; `validate` ruled out cycles.
fn build_object(
    name: &str,
    file: &SchemaFile,
    enums: &IndexMap<String, Arc<EnumDesc>>,
    opaque: &HashSet<String>,
    weak: &Weak<Inner>,
    built: &mut IndexMap<String, Arc<ObjectDesc>>,
) -> Option<Arc<ObjectDesc>> {
    if let Some(desc) = built.get(name) {
        return Some(desc.clone());
    }
    let def = file.objects.get(name)?;
    let mut desc = ObjectDesc::new(name);
    for parent in &def.extends {
        if let Some(parent) = build_object(parent, file, enums, opaque, weak, built) {
            desc = desc.extends(parent);
        }
    }
    for (field, expr) in &def.fields {
        desc = desc.field(field.clone(), expr_ty(expr, enums, opaque, weak));
    }
    let desc = Arc::new(desc);
    built.insert(name.to_string(), desc.clone());
    Some(desc)
}

fn expr_ty(expr: &TyExpr, enums: &IndexMap<String, Arc<EnumDesc>>, opaque: &HashSet<String>, weak: &Weak<Inner>) -> Ty {
    let name = match expr {
        TyExpr::List { list } => return Ty::list(expr_ty(list, enums, opaque, weak)),
        TyExpr::Name(name) => name,
    };
    if let Some(ty) = builtin(name) {
        return ty;
    }
    if let Some(desc) = enums.get(name) {
        return Ty::Enum(desc.clone());
    }
    if opaque.contains(name) {
        return Ty::opaque(name);
    }
    let weak = weak.clone();
    let name = name.clone();
    Ty::lazy(move || {
        weak.upgrade()
            .and_then(|inner| inner.objects.get(&name).cloned())
            .map_or(Ty::Unmapped, Ty::Object)
    })
}

// ————————————————————————————————————————————————————————————————————————————
// VALIDATION
// ————————————————————————————————————————————————————————————————————————————

fn validate(file: &SchemaFile) -> Result<()> {
    let mut seen = HashSet::new();
    let declared = file
        .enums
        .keys()
        .map(|n| ("enums", n))
        .chain(file.objects.keys().map(|n| ("objects", n)))
        .chain(file.opaque.iter().map(|n| ("opaque", n)));
    for (section, name) in declared {
        if BUILTINS.contains(&name.as_str()) {
            return Err(Error::schema(format!("{section}.{name}"), "shadows a builtin type name"));
        }
        if !seen.insert(name.as_str()) {
            return Err(Error::schema(format!("{section}.{name}"), "declared more than once"));
        }
    }

    for (name, members) in &file.enums {
        let mut unique = HashSet::new();
        if let Some(dup) = members.iter().find(|m| !unique.insert(m.as_str())) {
            return Err(Error::schema(format!("enums.{name}"), format!("member `{dup}` repeated")));
        }
    }

    let known = |name: &str| BUILTINS.contains(&name) || seen.contains(name);
    for (name, def) in &file.objects {
        for parent in &def.extends {
            if !file.objects.contains_key(parent) {
                return Err(Error::schema(format!("objects.{name}.extends"), format!("`{parent}` is not an object type")));
            }
        }
        for (field, expr) in &def.fields {
            check_expr(expr, &known, &format!("objects.{name}.fields.{field}"))?;
        }
    }
    check_ancestry(file)?;

    for (i, switch) in file.switches.iter().enumerate() {
        let path = format!("switches[{i}]");
        let cases = match switch {
            SwitchDef::SiblingField { owner, field, cases, .. } => {
                if !file.objects.contains_key(owner) {
                    return Err(Error::schema(format!("{path}.owner"), format!("`{owner}` is not an object type")));
                }
                if !declares(file, owner, field) {
                    return Err(Error::schema(format!("{path}.field"), format!("`{owner}` has no field `{field}`")));
                }
                cases
            }
            SwitchDef::DiscriminatorField { ty, cases, .. } => {
                if !known(ty) {
                    return Err(Error::schema(format!("{path}.type"), format!("unknown type `{ty}`")));
                }
                // Shaped types never reach the type override table.
                if !file.objects.contains_key(ty) && !file.opaque.contains(ty) {
                    return Err(Error::schema(
                        format!("{path}.type"),
                        format!("`{ty}` is not an object or opaque type"),
                    ));
                }
                cases
            }
        };
        for (tag, expr) in cases {
            check_expr(expr, &known, &format!("{path}.cases.{tag}"))?;
        }
    }
    Ok(())
}

fn check_expr(expr: &TyExpr, known: &impl Fn(&str) -> bool, path: &str) -> Result<()> {
    match expr {
        TyExpr::List { list } => check_expr(list, known, path),
        TyExpr::Name(name) if known(name) => Ok(()),
        TyExpr::Name(name) => Err(Error::schema(path, format!("unknown type `{name}`"))),
    }
}

fn declares(file: &SchemaFile, owner: &str, field: &str) -> bool {
    file.objects.get(owner).is_some_and(|def| {
        def.fields.contains_key(field) || def.extends.iter().any(|parent| declares(file, parent, field))
    })
}

fn check_ancestry(file: &SchemaFile) -> Result<()> {
    fn visit<'a>(
        file: &'a SchemaFile,
        name: &'a str,
        visiting: &mut Vec<&'a str>,
        done: &mut HashSet<&'a str>,
    ) -> Result<()> {
        if done.contains(name) {
            return Ok(());
        }
        if visiting.contains(&name) {
            return Err(Error::schema(format!("objects.{name}.extends"), "inheritance cycle"));
        }
        visiting.push(name);
        if let Some(def) = file.objects.get(name) {
            for parent in &def.extends {
                visit(file, parent, visiting, done)?;
            }
        }
        visiting.pop();
        done.insert(name);
        Ok(())
    }

    let mut done = HashSet::new();
    for name in file.objects.keys() {
        visit(file, name, &mut Vec::new(), &mut done)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::Native;

    const PETS: &str = r#"{
        "enums": { "Size": ["SMALL", "LARGE"] },
        "objects": {
            "Animal": { "fields": { "name": "str" } },
            "Dog":    { "extends": ["Animal"], "fields": { "bark": "bool", "size": "Size" } },
            "Cat":    { "extends": ["Animal"], "fields": { "lives": "int" } },
            "Home":   { "fields": { "kind": "str", "pet": "Animal", "rooms": { "list": "Room" } } },
            "Room":   { "fields": { "label": "str", "inner": { "list": "Room" } } }
        },
        "switches": [
            { "by": "sibling_field", "owner": "Home", "field": "pet", "discriminator": "kind",
              "cases": { "dog": "Dog", "cat": "Cat" } }
        ]
    }"#;

    #[test]
    fn fields_are_merged_with_ancestors() {
        let schema = Schema::parse(PETS).unwrap();
        let fields = schema.fields("Dog").unwrap();
        let names: Vec<&str> = fields.keys().map(String::as_str).collect();
        assert_eq!(names, ["bark", "size", "name"]);
        assert_eq!(fields["size"].to_string(), "Size");
    }

    #[test]
    fn decodes_switches_and_recursive_objects() {
        let schema = Schema::parse(PETS).unwrap();
        let decode = schema.make_decoder("Home").unwrap();
        let home = decode
            .decode(r#"{
                "kind": "dog",
                "pet": {"name": "Rex", "bark": true, "size": "LARGE"},
                "rooms": [{"label": "hall", "inner": [{"label": "closet", "inner": []}]}]
            }"#)
            .unwrap();
        let home = home.as_instance().unwrap();
        let pet = home.get("pet").and_then(Native::as_instance).unwrap();
        assert_eq!(pet.type_name(), "Dog");
        assert_eq!(pet.get("size").and_then(Native::as_enum).map(|e| e.name()), Some("LARGE"));

        let hall = &home.get("rooms").and_then(Native::as_seq).unwrap()[0];
        let closet = &hall.as_instance().unwrap().get("inner").and_then(Native::as_seq).unwrap()[0];
        assert_eq!(closet.as_instance().unwrap().get("label").and_then(Native::as_str), Some("closet"));

        let unknown = decode.decode(r#"{"kind": "fish", "pet": {"name": "Nemo"}}"#).unwrap();
        assert_eq!(unknown.as_instance().unwrap().get("pet"), Some(&Native::Null));
    }

    #[test]
    fn discriminator_switch_becomes_a_type_override() {
        let schema = Schema::parse(r#"{
            "objects": {
                "Shape":  { "fields": { "type": "str" } },
                "Circle": { "extends": ["Shape"], "fields": { "r": "float" } },
                "Canvas": { "fields": { "shapes": { "list": "Shape" } } }
            },
            "switches": [
                { "by": "discriminator_field", "type": "Shape", "discriminator": "type",
                  "cases": { "circle": "Circle" } }
            ]
        }"#)
        .unwrap();
        let canvas = schema
            .make_decoder("Canvas")
            .unwrap()
            .decode(r#"{"shapes": [{"type": "circle", "r": 2.0}, {"type": "blob"}]}"#)
            .unwrap();
        let shapes = canvas.as_instance().unwrap().get("shapes").and_then(Native::as_seq).unwrap();
        assert_eq!(shapes[0].as_instance().map(|s| s.type_name()), Some("Circle"));
        assert!(shapes[1].is_null());
    }

    #[test]
    fn rejects_discriminator_switch_on_shaped_types() {
        for ty in ["dict", "int", "Kind"] {
            let src = format!(
                r#"{{
                    "enums": {{ "Kind": ["A"] }},
                    "objects": {{
                        "Circle": {{ "fields": {{ "r": "float" }} }},
                        "Canvas": {{ "fields": {{ "shape": "{ty}" }} }}
                    }},
                    "switches": [
                        {{ "by": "discriminator_field", "type": "{ty}", "discriminator": "type",
                           "cases": {{ "circle": "Circle" }} }}
                    ]
                }}"#
            );
            match Schema::parse(&src).err() {
                Some(Error::Schema { path, message }) => {
                    assert_eq!(path, "switches[0].type");
                    assert!(message.contains(ty), "{message}");
                }
                other => panic!("`{ty}` should be rejected, got {other:?}"),
            }
        }
    }

    #[test]
    fn discriminator_switch_on_opaque_type_decodes() {
        let schema = Schema::parse(r#"{
            "objects": {
                "Circle": { "fields": { "r": "float" } },
                "Canvas": { "fields": { "shape": "Shape" } }
            },
            "opaque": ["Shape"],
            "switches": [
                { "by": "discriminator_field", "type": "Shape", "discriminator": "type",
                  "cases": { "circle": "Circle" } }
            ]
        }"#)
        .unwrap();
        let canvas = schema.make_decoder("Canvas").unwrap().decode(r#"{"shape": {"type": "circle", "r": 2.0}}"#).unwrap();
        let shape = canvas.as_instance().unwrap().get("shape").and_then(Native::as_instance).unwrap();
        assert_eq!(shape.type_name(), "Circle");
    }

    #[test]
    fn overrides_are_built_once_per_schema() {
        let schema = Schema::parse(PETS).unwrap();
        let first = schema.make_decoder("Home").unwrap();
        let second = schema.clone().make_decoder("Room").unwrap();
        assert!(schema.inner.overrides.get().is_some());
        assert!(first.decode(r#"{"kind": "cat", "pet": {"lives": 9}}"#).is_ok());
        assert!(second.decode(r#"{"label": "attic", "inner": []}"#).is_ok());
    }

    #[test]
    fn rejects_unknown_names_with_a_path() {
        let err = Schema::parse(r#"{"objects": {"A": {"fields": {"b": "Nope"}}}}"#).err().unwrap();
        match err {
            Error::Schema { path, message } => {
                assert_eq!(path, "objects.A.fields.b");
                assert!(message.contains("Nope"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_inheritance_cycles_and_builtin_shadowing() {
        let cycle = r#"{"objects": {"A": {"extends": ["B"]}, "B": {"extends": ["A"]}}}"#;
        assert!(matches!(Schema::parse(cycle), Err(Error::Schema { .. })));
        assert!(matches!(Schema::parse(r#"{"enums": {"int": ["X"]}}"#), Err(Error::Schema { .. })));
    }

    #[test]
    fn malformed_schema_reports_json_path() {
        let err = Schema::parse(r#"{"objects": {"A": {"fields": {"b": 3}}}}"#).err().unwrap();
        assert!(matches!(err, Error::Schema { ref path, .. } if path.starts_with("objects.A")));
    }
}
