//! Identities, roster entries and how commands refer to them.

use std::{collections::BTreeSet, fmt};

use serde::{Deserialize, Serialize};

use crate::state::roster::RosterError;

const USERNAME_MIN_LEN: usize = 5;
const USERNAME_MAX_LEN: usize = 32;
const NAME_MAX_LEN: usize = 64;

/// Opaque identifier of a chat user, as handed to us by the command surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A real participant as known to the chat platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    /// Stable platform identifier.
    pub id: UserId,
    /// First name shown on the roster.
    pub first_name: String,
    /// Optional family name.
    pub last_name: Option<String>,
    /// Optional handle, stored lowercase without the leading `@`.
    pub username: Option<String>,
}

impl Identity {
    /// Build an identity, normalising and validating the supplied fields.
    pub fn new(
        id: i64,
        first_name: impl Into<String>,
        last_name: Option<String>,
        username: Option<String>,
    ) -> Result<Self, RosterError> {
        if id <= 0 {
            return Err(RosterError::InvalidIdentity(format!(
                "user id must be positive (got {id})"
            )));
        }

        let first_name = first_name.into().trim().to_owned();
        if first_name.is_empty() || first_name.chars().count() > NAME_MAX_LEN {
            return Err(RosterError::InvalidIdentity(
                "first name must contain between 1 and 64 characters".into(),
            ));
        }

        let last_name = last_name
            .map(|name| name.trim().to_owned())
            .filter(|name| !name.is_empty());

        let username = username.map(|raw| normalize_username(&raw)).transpose()?;

        Ok(Self {
            id: UserId(id),
            first_name,
            last_name,
            username,
        })
    }

    /// Name used in listings.
    pub fn full_name(&self) -> String {
        match &self.last_name {
            Some(last) => format!("{} {}", self.first_name, last),
            None => self.first_name.clone(),
        }
    }
}

/// Normalise a chat handle: strip a leading `@`, lowercase, and check the allowed alphabet.
pub fn normalize_username(raw: &str) -> Result<String, RosterError> {
    let trimmed = raw.trim();
    let handle = trimmed.strip_prefix('@').unwrap_or(trimmed);
    let len = handle.chars().count();

    if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len) {
        return Err(RosterError::InvalidIdentity(format!(
            "username `{raw}` must contain between {USERNAME_MIN_LEN} and {USERNAME_MAX_LEN} characters"
        )));
    }

    if !handle
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(RosterError::InvalidIdentity(format!(
            "username `{raw}` may only contain letters, digits and underscores"
        )));
    }

    Ok(handle.to_ascii_lowercase())
}

/// Who occupies a roster entry: a real member or a slot reserved for an invited username.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlayerKey {
    /// A registered participant.
    Member(Identity),
    /// Slot held for an invited user who has not accepted yet.
    Reserved {
        /// Normalised username the slot is held for.
        username: String,
    },
}

impl PartialEq for PlayerKey {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (PlayerKey::Member(a), PlayerKey::Member(b)) => a.id == b.id,
            (PlayerKey::Reserved { username: a }, PlayerKey::Reserved { username: b }) => a == b,
            _ => false,
        }
    }
}

impl Eq for PlayerKey {}

impl PlayerKey {
    /// Identifier of the member, `None` for reserved slots.
    pub fn user_id(&self) -> Option<UserId> {
        match self {
            PlayerKey::Member(identity) => Some(identity.id),
            PlayerKey::Reserved { .. } => None,
        }
    }

    /// Username attached to the entry, if any.
    pub fn username(&self) -> Option<&str> {
        match self {
            PlayerKey::Member(identity) => identity.username.as_deref(),
            PlayerKey::Reserved { username } => Some(username),
        }
    }

    /// Whether the entry is a reserved slot.
    pub fn is_reserved(&self) -> bool {
        matches!(self, PlayerKey::Reserved { .. })
    }

    /// Label used in logs and listings.
    pub fn display_name(&self) -> String {
        match self {
            PlayerKey::Member(identity) => identity.full_name(),
            PlayerKey::Reserved { username } => format!("@{username} (invited)"),
        }
    }
}

/// Lookup handle accepted by roster operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PlayerRef {
    /// Match a member by platform id.
    Id(UserId),
    /// Match a reserved slot by username.
    Reserved(String),
}

impl PlayerRef {
    /// Whether `key` is the entry this reference designates.
    pub fn matches(&self, key: &PlayerKey) -> bool {
        match (self, key) {
            (PlayerRef::Id(id), PlayerKey::Member(identity)) => identity.id == *id,
            (PlayerRef::Reserved(name), PlayerKey::Reserved { username }) => name == username,
            _ => false,
        }
    }
}

impl From<UserId> for PlayerRef {
    fn from(value: UserId) -> Self {
        PlayerRef::Id(value)
    }
}

impl fmt::Display for PlayerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerRef::Id(id) => write!(f, "user {id}"),
            PlayerRef::Reserved(username) => write!(f, "@{username}"),
        }
    }
}

/// One roster entry. Equality follows the key, never the mutable attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    /// Identity of the entry.
    pub key: PlayerKey,
    /// Holds the match liability.
    pub liable: bool,
    /// Confirmed attendance.
    pub approved: bool,
    /// Free-form markers such as `match-ball` or `bibs`.
    pub flags: BTreeSet<String>,
}

impl PartialEq for Player {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Player {}

impl Player {
    /// Fresh entry for a real member.
    pub fn member(identity: Identity) -> Self {
        Self {
            key: PlayerKey::Member(identity),
            liable: false,
            approved: false,
            flags: BTreeSet::new(),
        }
    }

    /// Fresh entry holding a slot for an invited username.
    pub fn reserved(username: String) -> Self {
        Self {
            key: PlayerKey::Reserved { username },
            liable: false,
            approved: false,
            flags: BTreeSet::new(),
        }
    }

    /// Member identity, `None` for reserved slots.
    pub fn identity(&self) -> Option<&Identity> {
        match &self.key {
            PlayerKey::Member(identity) => Some(identity),
            PlayerKey::Reserved { .. } => None,
        }
    }

    /// Shortcut for `self.key.user_id()`.
    pub fn user_id(&self) -> Option<UserId> {
        self.key.user_id()
    }

    /// Label used in logs and listings.
    pub fn display_name(&self) -> String {
        self.key.display_name()
    }
}

/// Derived position of an entry inside the roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotKind {
    /// Index below capacity.
    Playing,
    /// Index at or past capacity.
    Waiting,
}

impl SlotKind {
    /// Classify `index` against `capacity`.
    pub fn at(index: usize, capacity: usize) -> Self {
        if index < capacity {
            SlotKind::Playing
        } else {
            SlotKind::Waiting
        }
    }
}

impl fmt::Display for SlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotKind::Playing => f.write_str("playing"),
            SlotKind::Waiting => f.write_str("waiting"),
        }
    }
}
