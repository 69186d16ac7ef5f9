use std::{
    collections::BTreeSet,
    fmt,
    time::{SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Deserializer, Serialize, de};
use utoipa::ToSchema;

/// Milliseconds since the Unix epoch, the unit every persisted timestamp uses.
pub type TimestampMs = i64;

/// Current wall-clock time in milliseconds.
pub fn now_ms() -> TimestampMs {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as TimestampMs)
        .unwrap_or_default()
}

/// Canonical application identifier.
///
/// Clients send ids either as JSON numbers or strings; both collapse to the same trimmed
/// string so storage never has to match on two representations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, ToSchema)]
#[serde(transparent)]
#[schema(value_type = String)]
pub struct AppId(String);

impl AppId {
    /// Normalise a raw id, returning `None` when nothing usable remains.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_owned()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for AppId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct AppIdVisitor;

        impl de::Visitor<'_> for AppIdVisitor {
            type Value = AppId;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a non-empty string or an integer application id")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<AppId, E> {
                AppId::parse(value).ok_or_else(|| E::invalid_value(de::Unexpected::Str(value), &self))
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<AppId, E> {
                Ok(AppId(value.to_string()))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<AppId, E> {
                Ok(AppId(value.to_string()))
            }

            fn visit_f64<E: de::Error>(self, value: f64) -> Result<AppId, E> {
                if value.fract() == 0.0 && value.is_finite() {
                    Ok(AppId(format!("{value:.0}")))
                } else {
                    Err(E::invalid_value(de::Unexpected::Float(value), &self))
                }
            }
        }

        deserializer.deserialize_any(AppIdVisitor)
    }
}

/// Presence state for a single network address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressEntity {
    pub ip: String,
    pub first_seen: TimestampMs,
    pub last_seen: TimestampMs,
    /// Every username ever reported from this address.
    pub usernames: BTreeSet<String>,
    /// Opaque identity shared by every address of the same client.
    pub serial: Option<String>,
}

/// Fields applied when a visit is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressUpsert {
    pub ip: String,
    pub seen_at: TimestampMs,
    pub username: Option<String>,
    pub serial: Option<String>,
}

/// Library entry for an accepted application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameEntity {
    pub app_id: AppId,
    pub fields: GameFields,
}

/// Mutable attributes of a game, preserved while the game sits in the rejected list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GameFields {
    /// Either 0 or 1.
    pub mode: u8,
    pub created_at: TimestampMs,
}

/// Entry in the rejected list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedEntity {
    pub app_id: AppId,
    pub value: RejectedValue,
}

/// Payload of a rejected entry: the fields of the game it replaced, or a bare marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum RejectedValue {
    /// The application was never in the library.
    Flag(bool),
    Preserved(GameFields),
}

impl RejectedValue {
    /// Fields to restore into the library when the rejection is lifted.
    pub fn preserved(&self) -> Option<GameFields> {
        match self {
            RejectedValue::Flag(_) => None,
            RejectedValue::Preserved(fields) => Some(*fields),
        }
    }
}

/// Display name resolved for an application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameEntity {
    pub app_id: AppId,
    pub name: String,
}

/// Best-effort storage consumption figures, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageUsage {
    pub used: u64,
    pub max: u64,
}
