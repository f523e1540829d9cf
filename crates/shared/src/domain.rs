use std::fmt;

use serde::{de, Deserialize, Deserializer, Serialize};

/// Stable row identity assigned by the remote service.
///
/// Services disagree on whether keys are strings or integers, so both are
/// accepted on the wire and normalised to a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct DutyKey(pub String);

impl DutyKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DutyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DutyKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl<'de> Deserialize<'de> for DutyKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct KeyVisitor;

        impl de::Visitor<'_> for KeyVisitor {
            type Value = DutyKey;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a string or integer duty key")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<DutyKey, E> {
                Ok(DutyKey(v.to_string()))
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<DutyKey, E> {
                Ok(DutyKey(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<DutyKey, E> {
                Ok(DutyKey(v.to_string()))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<DutyKey, E> {
                Ok(DutyKey(v.to_string()))
            }
        }

        deserializer.deserialize_any(KeyVisitor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Duty {
    pub key: DutyKey,
    pub id: String,
    pub name: String,
}

impl Duty {
    pub fn new(key: impl Into<String>, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key: DutyKey(key.into()),
            id: id.into(),
            name: name.into(),
        }
    }

    pub fn field(&self, field: DutyField) -> &str {
        match field {
            DutyField::Id => &self.id,
            DutyField::Name => &self.name,
        }
    }

    /// Returns a copy with the fields present in `update` replaced.
    /// `key` is never touched.
    pub fn apply(&self, update: DutyUpdate) -> Duty {
        Duty {
            key: self.key.clone(),
            id: update.id.unwrap_or_else(|| self.id.clone()),
            name: update.name.unwrap_or_else(|| self.name.clone()),
        }
    }
}

/// Create payload: a duty before the service has assigned its key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DutyDraft {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DutyUpdate {
    pub id: Option<String>,
    pub name: Option<String>,
}

impl DutyUpdate {
    pub fn for_field(field: DutyField, value: impl Into<String>) -> Self {
        let value = value.into();
        match field {
            DutyField::Id => Self {
                id: Some(value),
                name: None,
            },
            DutyField::Name => Self {
                id: None,
                name: Some(value),
            },
        }
    }
}

/// User-editable columns of the duty table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DutyField {
    Id,
    Name,
}

impl DutyField {
    pub const EDITABLE: [DutyField; 2] = [DutyField::Id, DutyField::Name];

    pub fn title(self) -> &'static str {
        match self {
            DutyField::Id => "id",
            DutyField::Name => "name",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "id" => Some(DutyField::Id),
            "name" => Some(DutyField::Name),
            _ => None,
        }
    }
}

impl fmt::Display for DutyField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}
