use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{MessageRecord, RoomId, RoomRecord, RoomType};

/// Outcome of a room-info probe. `success: false` means the room was not
/// accessible to the caller; callers must not treat that as fatal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomInfoResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<RoomRecord>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct JoinRoomResponse {
    pub success: bool,
}

/// Cursor query for one page of older history. `latest` is the timestamp of
/// the oldest loaded message; results are strictly older than it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRequest {
    pub rid: RoomId,
    #[serde(rename = "t")]
    pub kind: RoomType,
    pub latest: DateTime<Utc>,
    pub count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    #[serde(default)]
    pub messages: Vec<MessageRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub msg: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SetFavoriteRequest {
    pub favorite: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetReactionRequest {
    pub shortcode: String,
}
