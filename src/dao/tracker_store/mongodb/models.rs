use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::dao::{
    models::{
        AddressEntity, AppId, GameEntity, GameFields, NameEntity, RejectedEntity, RejectedValue,
        TimestampMs,
    },
    storage::StorageError,
};

pub const ADDRESS_COLLECTION: &str = "seen_users";
pub const BANNED_ADDRESS_COLLECTION: &str = "banned_ips";
pub const BANNED_SERIAL_COLLECTION: &str = "banned_serials";
pub const GAME_COLLECTION: &str = "games";
pub const REJECTED_COLLECTION: &str = "rejected";
pub const NAME_COLLECTION: &str = "names";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MongoAddressDocument {
    pub ip: String,
    pub first_seen: TimestampMs,
    pub last_seen: TimestampMs,
    #[serde(default)]
    pub usernames: Vec<String>,
    #[serde(default)]
    pub serial: Option<String>,
}

impl From<MongoAddressDocument> for AddressEntity {
    fn from(value: MongoAddressDocument) -> Self {
        Self {
            ip: value.ip,
            first_seen: value.first_seen,
            last_seen: value.last_seen,
            usernames: value.usernames.into_iter().collect::<BTreeSet<_>>(),
            serial: value.serial.filter(|serial| !serial.is_empty()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoBannedAddressDocument {
    pub ip: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoBannedSerialDocument {
    pub serial: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MongoGameDocument {
    pub app_id: String,
    pub mode: i32,
    pub created_at: TimestampMs,
}

impl From<&GameEntity> for MongoGameDocument {
    fn from(value: &GameEntity) -> Self {
        Self {
            app_id: value.app_id.to_string(),
            mode: i32::from(value.fields.mode),
            created_at: value.fields.created_at,
        }
    }
}

impl TryFrom<MongoGameDocument> for GameEntity {
    type Error = StorageError;

    fn try_from(value: MongoGameDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            app_id: parse_app_id(GAME_COLLECTION, &value.app_id)?,
            fields: GameFields {
                mode: parse_mode(GAME_COLLECTION, value.mode)?,
                created_at: value.created_at,
            },
        })
    }
}

/// Rejected entries either carry the former game fields or the `value: true` marker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MongoRejectedDocument {
    pub app_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<TimestampMs>,
}

impl From<&RejectedEntity> for MongoRejectedDocument {
    fn from(value: &RejectedEntity) -> Self {
        match value.value {
            RejectedValue::Flag(flag) => Self {
                app_id: value.app_id.to_string(),
                value: Some(flag),
                mode: None,
                created_at: None,
            },
            RejectedValue::Preserved(fields) => Self {
                app_id: value.app_id.to_string(),
                value: None,
                mode: Some(i32::from(fields.mode)),
                created_at: Some(fields.created_at),
            },
        }
    }
}

impl TryFrom<MongoRejectedDocument> for RejectedEntity {
    type Error = StorageError;

    fn try_from(value: MongoRejectedDocument) -> Result<Self, Self::Error> {
        let app_id = parse_app_id(REJECTED_COLLECTION, &value.app_id)?;
        let value = match value.mode {
            Some(mode) => RejectedValue::Preserved(GameFields {
                mode: parse_mode(REJECTED_COLLECTION, mode)?,
                created_at: value.created_at.unwrap_or_default(),
            }),
            None => RejectedValue::Flag(value.value.unwrap_or(true)),
        };
        Ok(Self { app_id, value })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MongoNameDocument {
    pub app_id: String,
    pub name: String,
}

impl TryFrom<MongoNameDocument> for NameEntity {
    type Error = StorageError;

    fn try_from(value: MongoNameDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            app_id: parse_app_id(NAME_COLLECTION, &value.app_id)?,
            name: value.name,
        })
    }
}

fn parse_app_id(collection: &'static str, raw: &str) -> Result<AppId, StorageError> {
    AppId::parse(raw).ok_or_else(|| StorageError::malformed(collection, "empty appId"))
}

fn parse_mode(collection: &'static str, raw: i32) -> Result<u8, StorageError> {
    match raw {
        0 | 1 => Ok(raw as u8),
        other => Err(StorageError::malformed(
            collection,
            format!("unsupported game mode {other}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_document_without_mode_is_a_flag() {
        let document = MongoRejectedDocument {
            app_id: "440".into(),
            value: None,
            mode: None,
            created_at: None,
        };
        let entity = RejectedEntity::try_from(document).unwrap();
        assert_eq!(entity.value, RejectedValue::Flag(true));
    }

    #[test]
    fn game_document_with_unknown_mode_is_malformed() {
        let document = MongoGameDocument {
            app_id: "440".into(),
            mode: 7,
            created_at: 0,
        };
        assert!(matches!(
            GameEntity::try_from(document),
            Err(StorageError::Malformed { .. })
        ));
    }
}
