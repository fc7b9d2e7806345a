//! Metadata packets published alongside stream data.
//!
//! A packet is a flat, ordered map of names to [`ControlValue`]s, e.g. the
//! tuner state (`freq`, `modem`, `mono`) that a streaming layer forwards to
//! clients as JSON.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::value::ControlValue;

/// Ordered name → value map serialized as a flat JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataPacket {
    entries: BTreeMap<String, ControlValue>,
}

impl MetadataPacket {
    /// Creates an empty packet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `name` to `value`, returning the previous value.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: impl Into<ControlValue>,
    ) -> Option<ControlValue> {
        self.entries.insert(name.into(), value.into())
    }

    /// Builder-style [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ControlValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Value stored under `name`.
    pub fn get(&self, name: &str) -> Option<&ControlValue> {
        self.entries.get(name)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the packet has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ControlValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Serializes the packet to a JSON object string.
    ///
    /// # Errors
    ///
    /// Returns the serializer error; non-finite doubles are rejected.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parses a packet from a JSON object string.
    ///
    /// # Errors
    ///
    /// Returns the deserializer error for malformed input.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl<K: Into<String>, V: Into<ControlValue>> FromIterator<(K, V)> for MetadataPacket {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
