//! Client fields that may be missing, explicitly `null`, or set.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// An optional client field that remembers how it arrived.
///
/// Entity fields use `#[serde(default, skip_serializing_if =
/// "Field::is_absent")]`, so a missing key stays missing and an explicit
/// `null` is written back as `null`.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Field<T> {
    /// The key was not present.
    #[default]
    Absent,
    /// The key was present with a `null` value.
    Null,
    /// The key carried a value.
    Set(T),
}

impl<T> Field<T> {
    /// Returns true if the key was not present.
    pub fn is_absent(&self) -> bool {
        matches!(self, Field::Absent)
    }

    /// Returns the value, if set.
    pub fn value(&self) -> Option<&T> {
        match self {
            Field::Set(v) => Some(v),
            Field::Absent | Field::Null => None,
        }
    }

    /// Returns the value for in-place mutation, if set.
    pub fn value_mut(&mut self) -> Option<&mut T> {
        match self {
            Field::Set(v) => Some(v),
            Field::Absent | Field::Null => None,
        }
    }

    /// Sets the value.
    pub fn set(&mut self, value: T) {
        *self = Field::Set(value);
    }
}

impl<T: Clone + Default> Field<T> {
    /// Returns the value, or the type's default when missing or `null`.
    pub fn or_default(&self) -> T {
        self.value().cloned().unwrap_or_default()
    }
}

impl Field<String> {
    /// Returns the text, or `""` when missing or `null`.
    pub fn as_str(&self) -> &str {
        self.value().map_or("", String::as_str)
    }
}

impl<T> From<T> for Field<T> {
    fn from(value: T) -> Self {
        Field::Set(value)
    }
}

impl From<&str> for Field<String> {
    fn from(value: &str) -> Self {
        Field::Set(value.to_string())
    }
}

impl<T: Serialize> Serialize for Field<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Field::Set(v) => v.serialize(serializer),
            Field::Absent | Field::Null => serializer.serialize_none(),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Field<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Option::<T>::deserialize(deserializer)?.map_or(Field::Null, Field::Set))
    }
}
