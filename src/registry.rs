//! Process-wide table of pre-built decoders, consulted during derivation.
//!
//! Populate it while setting up, before deriving; treat it as read-only after.
//! The lock makes late registration memory-safe, but a decoder derived before
//! a registration will not see it.
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use once_cell::sync::Lazy;

use crate::codec::Decoder;
use crate::error::{Error, Result};
use crate::ty::{Ty, TypeKey};

static REGISTRY: Lazy<RwLock<HashMap<TypeKey, Decoder>>> = Lazy::new(Default::default);

/// Install `decoder` for `ty`. Without `force`, an existing entry is an error.
pub fn register(ty: &Ty, decoder: Decoder, force: bool) -> Result<()> {
    let key = ty.key();
    let mut table = REGISTRY.write().unwrap_or_else(PoisonError::into_inner);
    if table.contains_key(&key) {
        if !force {
            return Err(Error::DuplicateRegistration { ty: key.to_string() });
        }
        tracing::warn!(ty = %key, "replacing registered decoder");
    }
    table.insert(key, decoder);
    Ok(())
}

pub fn registered(key: &TypeKey) -> Option<Decoder> {
    REGISTRY.read().unwrap_or_else(PoisonError::into_inner).get(key).cloned()
}

pub fn unregister(key: &TypeKey) -> Option<Decoder> {
    REGISTRY.write().unwrap_or_else(PoisonError::into_inner).remove(key)
}
