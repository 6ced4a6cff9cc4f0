use mongodb::bson::{Binary, DateTime, spec::BinarySubtype};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::error::{MongoDaoError, MongoResult};
use crate::dao::models::{AskedEntity, BannedEntity, InvitedEntity, PlayingEntity};

/// Ordered roster entries.
pub const PLAYING_COLLECTION: &str = "playing";
/// Pending invitations.
pub const INVITED_COLLECTION: &str = "invited";
/// Liability nominees.
pub const ASKED_COLLECTION: &str = "asked";
/// Member bans.
pub const BANNED_COLLECTION: &str = "banned";

/// Roster entry keyed by its position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoPlayingDocument {
    #[serde(rename = "_id")]
    position: i64,
    user_id: Option<i64>,
    first_name: Option<String>,
    last_name: Option<String>,
    username: Option<String>,
    liable: bool,
    approved: bool,
    #[serde(default)]
    flags: Vec<String>,
}

/// Pending invitation keyed by username.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoInvitedDocument {
    #[serde(rename = "_id")]
    username: String,
    token: Binary,
    expires_at: DateTime,
}

/// Liability nominee keyed by user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoAskedDocument {
    #[serde(rename = "_id")]
    user_id: i64,
}

/// Ban keyed by user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoBannedDocument {
    #[serde(rename = "_id")]
    user_id: i64,
    until: DateTime,
}

impl From<PlayingEntity> for MongoPlayingDocument {
    fn from(value: PlayingEntity) -> Self {
        Self {
            position: i64::from(value.position),
            user_id: value.user_id,
            first_name: value.first_name,
            last_name: value.last_name,
            username: value.username,
            liable: value.liable,
            approved: value.approved,
            flags: value.flags,
        }
    }
}

impl TryFrom<MongoPlayingDocument> for PlayingEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoPlayingDocument) -> MongoResult<Self> {
        let position = u32::try_from(value.position).map_err(|_| MongoDaoError::Decode {
            collection: PLAYING_COLLECTION,
            message: format!("position {} out of range", value.position),
        })?;

        Ok(Self {
            position,
            user_id: value.user_id,
            first_name: value.first_name,
            last_name: value.last_name,
            username: value.username,
            liable: value.liable,
            approved: value.approved,
            flags: value.flags,
        })
    }
}

impl From<InvitedEntity> for MongoInvitedDocument {
    fn from(value: InvitedEntity) -> Self {
        Self {
            username: value.username,
            token: uuid_as_binary(value.token),
            expires_at: to_bson_datetime(value.expires_at),
        }
    }
}

impl TryFrom<MongoInvitedDocument> for InvitedEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoInvitedDocument) -> MongoResult<Self> {
        let decode = |message: String| MongoDaoError::Decode {
            collection: INVITED_COLLECTION,
            message,
        };
        let token = Uuid::from_slice(&value.token.bytes)
            .map_err(|err| decode(format!("token of @{}: {err}", value.username)))?;
        let expires_at = from_bson_datetime(value.expires_at)
            .map_err(|err| decode(format!("expiry of @{}: {err}", value.username)))?;

        Ok(Self {
            username: value.username,
            token,
            expires_at,
        })
    }
}

impl From<AskedEntity> for MongoAskedDocument {
    fn from(value: AskedEntity) -> Self {
        Self {
            user_id: value.user_id,
        }
    }
}

impl From<MongoAskedDocument> for AskedEntity {
    fn from(value: MongoAskedDocument) -> Self {
        Self {
            user_id: value.user_id,
        }
    }
}

impl From<BannedEntity> for MongoBannedDocument {
    fn from(value: BannedEntity) -> Self {
        Self {
            user_id: value.user_id,
            until: to_bson_datetime(value.until),
        }
    }
}

impl TryFrom<MongoBannedDocument> for BannedEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoBannedDocument) -> MongoResult<Self> {
        let until = from_bson_datetime(value.until).map_err(|err| MongoDaoError::Decode {
            collection: BANNED_COLLECTION,
            message: format!("end of ban of user {}: {err}", value.user_id),
        })?;
        Ok(Self {
            user_id: value.user_id,
            until,
        })
    }
}

fn to_bson_datetime(instant: OffsetDateTime) -> DateTime {
    let millis = instant.unix_timestamp_nanos() / 1_000_000;
    DateTime::from_millis(millis as i64)
}

fn from_bson_datetime(value: DateTime) -> Result<OffsetDateTime, time::error::ComponentRange> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(value.timestamp_millis()) * 1_000_000)
}

fn uuid_as_binary(id: Uuid) -> Binary {
    Binary {
        subtype: BinarySubtype::Uuid,
        bytes: id.into_bytes().to_vec(),
    }
}
