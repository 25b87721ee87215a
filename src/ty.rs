//! Type descriptions: the structural metadata derivation walks.
//!
//! Descriptions are plain data. Objects and enums sit behind `Arc` so a
//! description can be shared by every field, override table and instance that
//! refers to it. Self-referential graphs go through [`Ty::Lazy`].
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Prim {
    Int,
    Float,
    Bool,
    Str,
}

#[derive(Clone)]
pub enum Ty {
    /// The "no type" sentinel: decodes to null whatever the input.
    Unmapped,
    Prim(Prim),
    /// Untyped mapping, passed through as-is.
    Dict,
    Enum(Arc<EnumDesc>),
    List(Box<Ty>),
    Object(Arc<ObjectDesc>),
    /// Named type with no introspectable shape; needs a registry or override entry.
    Opaque(Arc<str>),
    Lazy(Arc<dyn Fn() -> Ty + Send + Sync>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumDesc {
    pub name: String,
    pub members: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ObjectDesc {
    pub name: String,
    pub parents: Vec<Arc<ObjectDesc>>,
    pub fields: Vec<FieldDesc>,
}

#[derive(Debug, Clone)]
pub struct FieldDesc {
    pub name: String,
    pub ty: Ty,
}

/// Stable identity of a [`Ty`], used to key the registry and override tables.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKey {
    Unmapped,
    Prim(Prim),
    Dict,
    Enum(String),
    List(Box<TypeKey>),
    Object(String),
    Opaque(String),
}

// ————————————————————————————————————————————————————————————————————————————
// CONSTRUCTORS
// ————————————————————————————————————————————————————————————————————————————

impl Ty {
    pub fn int() -> Self { Ty::Prim(Prim::Int) }
    pub fn float() -> Self { Ty::Prim(Prim::Float) }
    pub fn bool() -> Self { Ty::Prim(Prim::Bool) }
    pub fn str() -> Self { Ty::Prim(Prim::Str) }

    pub fn list(item: Ty) -> Self {
        Ty::List(Box::new(item))
    }

    pub fn opaque(name: impl AsRef<str>) -> Self {
        Ty::Opaque(Arc::from(name.as_ref()))
    }

    pub fn lazy<F>(thunk: F) -> Self
    where
        F: Fn() -> Ty + Send + Sync + 'static,
    {
        Ty::Lazy(Arc::new(thunk))
    }

    /// Follow `Lazy` thunks until a concrete description is reached.
    pub fn force(&self) -> Ty {
        let mut ty = self.clone();
        while let Ty::Lazy(thunk) = &ty {
            ty = thunk();
        }
        ty
    }

    pub fn key(&self) -> TypeKey {
        match self {
            Ty::Unmapped => TypeKey::Unmapped,
            Ty::Prim(p) => TypeKey::Prim(*p),
            Ty::Dict => TypeKey::Dict,
            Ty::Enum(e) => TypeKey::Enum(e.name.clone()),
            Ty::List(item) => TypeKey::List(Box::new(item.key())),
            Ty::Object(o) => TypeKey::Object(o.name.clone()),
            Ty::Opaque(name) => TypeKey::Opaque(name.to_string()),
            Ty::Lazy(thunk) => thunk().key(),
        }
    }
}

impl From<Arc<ObjectDesc>> for Ty {
    fn from(desc: Arc<ObjectDesc>) -> Self { Ty::Object(desc) }
}

impl From<ObjectDesc> for Ty {
    fn from(desc: ObjectDesc) -> Self { Ty::Object(Arc::new(desc)) }
}

impl From<Arc<EnumDesc>> for Ty {
    fn from(desc: Arc<EnumDesc>) -> Self { Ty::Enum(desc) }
}

impl From<EnumDesc> for Ty {
    fn from(desc: EnumDesc) -> Self { Ty::Enum(Arc::new(desc)) }
}

impl EnumDesc {
    pub fn new<I, S>(name: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { name: name.into(), members: members.into_iter().map(Into::into).collect() }
    }

    pub fn index_of(&self, member: &str) -> Option<usize> {
        self.members.iter().position(|m| m == member)
    }
}

impl ObjectDesc {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), parents: Vec::new(), fields: Vec::new() }
    }

    pub fn extends(mut self, parent: Arc<ObjectDesc>) -> Self {
        self.parents.push(parent);
        self
    }

    pub fn field(mut self, name: impl Into<String>, ty: impl Into<Ty>) -> Self {
        self.fields.push(FieldDesc { name: name.into(), ty: ty.into() });
        self
    }

    pub fn key(&self) -> TypeKey {
        TypeKey::Object(self.name.clone())
    }
}

// ————————————————————————————————————————————————————————————————————————————
// DISPLAY
// ————————————————————————————————————————————————————————————————————————————

impl fmt::Display for Prim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Prim::Int => "int",
            Prim::Float => "float",
            Prim::Bool => "bool",
            Prim::Str => "str",
        })
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeKey::Unmapped => f.write_str("none"),
            TypeKey::Prim(p) => write!(f, "{p}"),
            TypeKey::Dict => f.write_str("dict"),
            TypeKey::Enum(name) | TypeKey::Object(name) | TypeKey::Opaque(name) => f.write_str(name),
            TypeKey::List(item) => write!(f, "list<{item}>"),
        }
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

// `Lazy` holds a closure, so Debug stays shallow to avoid walking cycles.
impl fmt::Debug for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Unmapped => f.write_str("Unmapped"),
            Ty::Prim(p) => write!(f, "Prim({p})"),
            Ty::Dict => f.write_str("Dict"),
            Ty::Enum(e) => write!(f, "Enum({})", e.name),
            Ty::List(item) => f.debug_tuple("List").field(item).finish(),
            Ty::Object(o) => write!(f, "Object({})", o.name),
            Ty::Opaque(name) => write!(f, "Opaque({name})"),
            Ty::Lazy(_) => f.write_str("Lazy(..)"),
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// RUST TYPES
// ————————————————————————————————————————————————————————————————————————————

/// Rust types that know their own description.
///
/// Implemented here for scalars, `String`, `Vec<T>`, `Option<T>` and JSON maps.
/// Hand-written structs implement it by returning a shared [`ObjectDesc`].
pub trait Described {
    fn describe() -> Ty;
}

macro_rules! described_prim {
    ($prim:expr => $($t:ty),*) => {
        $(impl Described for $t {
            fn describe() -> Ty { Ty::Prim($prim) }
        })*
    };
}

described_prim!(Prim::Int => i8, i16, i32, i64, u8, u16, u32, u64, isize, usize);
described_prim!(Prim::Float => f32, f64);
described_prim!(Prim::Bool => bool);
described_prim!(Prim::Str => String);

impl<T: Described> Described for Vec<T> {
    fn describe() -> Ty { Ty::list(T::describe()) }
}

// Every field is nullable already.
impl<T: Described> Described for Option<T> {
    fn describe() -> Ty { T::describe() }
}

impl Described for serde_json::Map<String, serde_json::Value> {
    fn describe() -> Ty { Ty::Dict }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_keys_carry_their_element() {
        let ty = Vec::<Vec<String>>::describe();
        assert_eq!(ty.key(), TypeKey::List(Box::new(TypeKey::List(Box::new(TypeKey::Prim(Prim::Str))))));
        assert_eq!(ty.to_string(), "list<list<str>>");
    }

    #[test]
    fn lazy_is_forced_for_keys() {
        let node = Arc::new(ObjectDesc::new("Node"));
        let ty = {
            let node = node.clone();
            Ty::lazy(move || Ty::Object(node.clone()))
        };
        assert_eq!(ty.key(), TypeKey::Object("Node".into()));
        assert!(matches!(ty.force(), Ty::Object(o) if o.name == "Node"));
    }

    #[test]
    fn option_is_transparent() {
        assert_eq!(Option::<i64>::describe().key(), TypeKey::Prim(Prim::Int));
    }
}
