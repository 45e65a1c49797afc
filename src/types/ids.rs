//! Entity identifiers.
//!
//! Campaign, ad group and keyword ids are 64-bit integers that routinely
//! exceed the 2^53 range a double can represent exactly. They are carried as
//! `u64` and never pass through `f64`.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::errors::{AdvertisingError, AdvertisingResult};

/// Payload fields that hold entity ids and are normalized to integers before
/// a write request is sent.
pub const ID_FIELDS: &[&str] = &["keywordId", "adGroupId", "campaignId"];

/// An exact 64-bit entity id.
///
/// Deserializes from either a JSON integer or a string of digits and always
/// serializes as a JSON integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u64);

impl EntityId {
    /// Creates a new entity id.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw integer value.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for EntityId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<EntityId> for u64 {
    fn from(id: EntityId) -> Self {
        id.0
    }
}

impl From<EntityId> for Value {
    fn from(id: EntityId) -> Self {
        Value::from(id.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EntityId {
    type Err = AdvertisingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|e| AdvertisingError::validation(format!("Invalid entity id {s:?}: {e}")))
    }
}

impl Serialize for EntityId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.0)
    }
}

struct EntityIdVisitor;

impl<'de> Visitor<'de> for EntityIdVisitor {
    type Value = EntityId;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a non-negative integer or a string of digits")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(EntityId(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        u64::try_from(v)
            .map(EntityId)
            .map_err(|_| E::invalid_value(de::Unexpected::Signed(v), &self))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        Err(E::invalid_value(de::Unexpected::Float(v), &self))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        v.trim()
            .parse::<u64>()
            .map(EntityId)
            .map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(EntityIdVisitor)
    }
}

/// Rewrites string-typed id fields of a write payload into JSON integers.
///
/// Accepts a single object or an array of objects. Fields that already hold
/// integers are left alone; any other value in an id field is rejected.
pub fn normalize_id_fields(payload: &mut Value) -> AdvertisingResult<()> {
    match payload {
        Value::Array(items) => items.iter_mut().try_for_each(normalize_object),
        Value::Object(_) => normalize_object(payload),
        _ => Ok(()),
    }
}

fn normalize_object(value: &mut Value) -> AdvertisingResult<()> {
    let Value::Object(map) = value else {
        return Ok(());
    };

    for field in ID_FIELDS {
        let Some(slot) = map.get_mut(*field) else {
            continue;
        };
        let id = match &*slot {
            Value::Number(n) if n.is_u64() => continue,
            Value::String(s) => s.parse::<EntityId>()?,
            other => {
                return Err(AdvertisingError::validation(format!(
                    "Field {field} must be an integer id, got {other}"
                )))
            }
        };
        *slot = id.into();
    }

    Ok(())
}
