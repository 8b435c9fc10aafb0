use crate::err::{DeserializationError, DeserializationResult};
use crate::utils::ByteCursor;

use ahash::RandomState;
use encoding::EncodingRef;
use hashbrown::HashMap;
use log::trace;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyType {
    Int,
    Float,
    String,
}

impl PropertyType {
    pub fn from_u32(value: u32) -> Option<PropertyType> {
        match value {
            0 => Some(PropertyType::Int),
            1 => Some(PropertyType::Float),
            2 => Some(PropertyType::String),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PropertyType::Int => "int",
            PropertyType::Float => "float",
            PropertyType::String => "string",
        }
    }
}

/// A generic, typed property attached to event categories and events.
#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    Int(i32),
    Float(f32),
    String(String),
}

impl Property {
    pub fn property_type(&self) -> PropertyType {
        match self {
            Property::Int(_) => PropertyType::Int,
            Property::Float(_) => PropertyType::Float,
            Property::String(_) => PropertyType::String,
        }
    }

    /// Reads the payload of a property whose discriminant has already been consumed.
    pub(crate) fn from_cursor(
        property_type: PropertyType,
        cursor: &mut ByteCursor<'_>,
        ansi_codec: EncodingRef,
    ) -> DeserializationResult<Property> {
        let value = match property_type {
            PropertyType::Int => Property::Int(cursor.i32_named("property int value")?),
            PropertyType::Float => Property::Float(cursor.f32_named("property float value")?),
            PropertyType::String => Property::String(
                cursor.len_prefixed_string(ansi_codec, "property string value")?,
            ),
        };
        Ok(value)
    }
}

/// Properties keyed by name.
///
/// Iteration follows the order in which names were first seen, so that output built from a map
/// is stable between runs. Inserting an existing name replaces its value in place.
#[derive(Clone, Default)]
pub struct PropertyMap {
    entries: Vec<(String, Property)>,
    index: HashMap<String, usize, RandomState>,
}

impl PropertyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        PropertyMap {
            entries: Vec::with_capacity(capacity),
            index: HashMap::with_capacity_and_hasher(capacity, RandomState::new()),
        }
    }

    /// Returns the previous value when `name` was already present.
    pub fn insert(&mut self, name: String, value: Property) -> Option<Property> {
        if let Some(&i) = self.index.get(&name) {
            return Some(std::mem::replace(&mut self.entries[i].1, value));
        }

        self.index.insert(name.clone(), self.entries.len());
        self.entries.push((name, value));
        None
    }

    pub fn get(&self, name: &str) -> Option<&Property> {
        self.index.get(name).map(|&i| &self.entries[i].1)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Property)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Decodes a `u32` count followed by that many `name, type, value` entries.
    ///
    /// A repeated name overwrites the earlier value. An unknown type discriminant aborts the
    /// whole list.
    pub(crate) fn from_cursor(
        cursor: &mut ByteCursor<'_>,
        ansi_codec: EncodingRef,
    ) -> DeserializationResult<PropertyMap> {
        let count = cursor.u32_named("property count")?;
        trace!(
            "Offset `0x{offset:08x} ({offset})` reading {count} properties",
            offset = cursor.position()
        );

        // An entry is at least a name length, a type and a 4 byte value.
        let fits = cursor.remaining() / 12;
        let mut properties = PropertyMap::with_capacity((count as usize).min(fits).min(64));

        for _ in 0..count {
            let name = cursor.len_prefixed_string(ansi_codec, "property name")?;
            let discriminant_offset = cursor.position();
            let raw_type = cursor.u32_named("property type")?;

            let property_type = PropertyType::from_u32(raw_type).ok_or_else(|| {
                DeserializationError::InvalidPropertyType {
                    value: raw_type,
                    name: name.clone(),
                    offset: discriminant_offset,
                }
            })?;

            let value = Property::from_cursor(property_type, cursor, ansi_codec)?;
            properties.insert(name, value);
        }

        Ok(properties)
    }
}

impl PartialEq for PropertyMap {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(name, value)| other.get(name) == Some(value))
    }
}

impl fmt::Debug for PropertyMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}
