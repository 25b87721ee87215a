//! Native values back to JSON. A structural walk; nothing is derived or cached.
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::native::{Instance, Native};

pub fn to_json_value(native: &Native) -> Value {
    match native {
        Native::Seq(xs) => Value::Array(xs.iter().map(to_json_value).collect()),
        Native::Null => Value::Null,
        Native::Bool(b) => Value::Bool(*b),
        Native::Number(n) => Value::Number(n.clone()),
        Native::Str(s) => Value::String(s.clone()),
        Native::Enum(e) => Value::String(e.name().to_string()),
        // null entries are kept, not dropped
        Native::Dict(map) => Value::Object(
            map.iter().map(|(k, v)| (k.clone(), to_json_value(v))).collect(),
        ),
        Native::Object(instance) => instance_to_json(instance),
    }
}

/// Every attribute the instance carries, in the order it was first set.
/// Declared fields that were never set are left out.
fn instance_to_json(instance: &Instance) -> Value {
    let out: Map<String, Value> = instance
        .attrs()
        .iter()
        .map(|(name, value)| (name.clone(), to_json_value(value)))
        .collect();
    Value::Object(out)
}

/// JSON text for `native`. An enum at the top level yields its bare member
/// name, not a quoted JSON string.
pub fn to_json_text(native: &Native) -> Result<String> {
    match native {
        Native::Enum(e) => Ok(e.name().to_string()),
        other => Ok(serde_json::to_string(&to_json_value(other))?),
    }
}

pub fn to_json_text_pretty(native: &Native) -> Result<String> {
    match native {
        Native::Enum(e) => Ok(e.name().to_string()),
        other => Ok(serde_json::to_string_pretty(&to_json_value(other))?),
    }
}

impl Serialize for Native {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        to_json_value(self).serialize(serializer)
    }
}
