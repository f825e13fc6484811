use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

id_newtype!(RoomId);
id_newtype!(MessageId);
id_newtype!(UserId);

/// Room type tag as carried on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomType {
    #[serde(rename = "d")]
    Direct,
    #[default]
    #[serde(rename = "c")]
    Channel,
    #[serde(rename = "p")]
    Private,
    #[serde(rename = "l")]
    Livechat,
}

impl RoomType {
    /// Single-letter tag used by the remote service and the cache columns.
    pub fn as_tag(self) -> &'static str {
        match self {
            RoomType::Direct => "d",
            RoomType::Channel => "c",
            RoomType::Private => "p",
            RoomType::Livechat => "l",
        }
    }

    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "d" => RoomType::Direct,
            "p" => RoomType::Private,
            "l" => RoomType::Livechat,
            _ => RoomType::Channel,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomRole {
    Owner,
    Moderator,
    Member,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleEntry {
    pub user: String,
    pub value: RoomRole,
}

/// The cached representation of a room's metadata and membership flags.
///
/// `rid` never changes after creation; every other field is mutable under
/// cache writes. Consumers hold snapshot copies, never live references.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomRecord {
    pub rid: RoomId,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "t", default)]
    pub kind: RoomType,
    #[serde(rename = "ro", default)]
    pub read_only: bool,
    #[serde(rename = "f", default)]
    pub favorite: bool,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub blocked: bool,
    #[serde(default)]
    pub blocker: bool,
    #[serde(default)]
    pub alert: bool,
    #[serde(default)]
    pub unread: u32,
    #[serde(rename = "userMentions", default)]
    pub user_mentions: u32,
    #[serde(rename = "ls", default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
    #[serde(default)]
    pub roles: Vec<RoleEntry>,
    #[serde(default)]
    pub muted: Vec<String>,
}

impl RoomRecord {
    /// Minimal record seeded from a remote info probe before the cache holds
    /// a local subscription for the room.
    pub fn preview_seed(rid: RoomId, kind: RoomType, name: impl Into<String>) -> Self {
        Self {
            rid,
            kind,
            name: name.into(),
            ..Self::default()
        }
    }

    /// Whether reopening the room should resume from the last-seen marker.
    pub fn has_unread_activity(&self) -> bool {
        self.alert || self.unread > 0 || self.user_mentions > 0
    }
}

/// The authenticated user as seen by one room view. Immutable for the
/// lifetime of the view instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContext {
    pub id: UserId,
    pub username: String,
    pub token: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Pending,
    #[default]
    Sent,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSender {
    #[serde(rename = "_id")]
    pub id: UserId,
    pub username: String,
}

/// A message owned by the message-list store. The room core reads these
/// (pagination anchors, reaction targets) but never mutates them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    #[serde(rename = "_id")]
    pub id: MessageId,
    pub rid: RoomId,
    #[serde(default)]
    pub msg: String,
    /// Server timestamp; the monotonic ordering key for pagination.
    pub ts: DateTime<Utc>,
    #[serde(rename = "u", default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<MessageSender>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub reactions: BTreeMap<String, BTreeSet<UserId>>,
    #[serde(default)]
    pub status: MessageStatus,
    #[serde(rename = "_updatedAt", default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}
