//! Derive JSON decoders from type descriptions, and encode native values back.
//!
//! ```
//! use dtojson::{make_decoder, to_json_text, EnumDesc, ObjectDesc, Overrides, Ty};
//!
//! let color = Ty::from(EnumDesc::new("Color", ["RED", "GREEN"]));
//! let paint = Ty::from(ObjectDesc::new("Paint").field("a", Ty::int()).field("b", color));
//!
//! let decode = make_decoder(&paint, &Overrides::new()).unwrap();
//! let native = decode.decode(r#"{"a": 3, "b": "GREEN"}"#).unwrap();
//! assert_eq!(to_json_text(&native).unwrap(), r#"{"a":3,"b":"GREEN"}"#);
//! ```
pub mod codec;
pub mod derive;
pub mod encode;
pub mod error;
pub mod introspect;
pub mod native;
pub mod path_de;
pub mod registry;
pub mod schema;
pub mod switch;
pub mod ty;

pub use codec::{decoder, Decode, Decoder, Deferred};
pub use derive::{derive, derive_for, make_decoder, JsonDecoder, Overrides};
pub use encode::{to_json_text, to_json_value};
pub use error::{Error, Result};
pub use native::{EnumValue, FromNative, Instance, Native};
pub use registry::register;
pub use schema::Schema;
pub use switch::{ByDiscriminatorField, BySiblingField};
pub use ty::{Described, EnumDesc, ObjectDesc, Prim, Ty, TypeKey};
