//! REST binding of [`RemoteGateway`].
//!
//! Endpoint shapes and credential headers belong to this adapter; the
//! controller only ever sees the trait. Timeout policy also lives here, via
//! the underlying client configuration.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use shared::{
    domain::{MessageId, MessageRecord, RoomId, RoomRecord, UserContext},
    error::{ApiError, ApiException},
    protocol::{
        HistoryRequest, HistoryResponse, JoinRoomResponse, RoomInfoResponse, SendMessageRequest,
        SetFavoriteRequest, SetReactionRequest,
    },
};
use thiserror::Error;
use url::Url;

use crate::RemoteGateway;

#[derive(Debug, Error)]
pub enum HttpGatewayError {
    #[error("invalid server url '{url}': {source}")]
    InvalidServerUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("server answered for room {answered} but room {requested} was requested")]
    RoomMismatch { requested: RoomId, answered: RoomId },
}

#[derive(Debug)]
pub struct HttpRemoteGateway {
    http: Client,
    base_url: String,
    user: UserContext,
}

impl HttpRemoteGateway {
    pub fn new(base_url: &str, user: UserContext) -> Result<Self, HttpGatewayError> {
        Url::parse(base_url).map_err(|source| HttpGatewayError::InvalidServerUrl {
            url: base_url.to_string(),
            source,
        })?;
        Ok(Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            user,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/v1/{path}", self.base_url)
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("X-Auth-Token", &self.user.token)
            .header("X-User-Id", self.user.id.as_str())
    }
}

#[derive(Serialize)]
struct HistoryQuery<'a> {
    latest: String,
    count: u32,
    t: &'a str,
}

#[derive(Serialize)]
struct MissedQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    since: Option<String>,
}

/// Lift a non-success status into the shared API error taxonomy when the
/// body carries one, or a plain status error otherwise.
async fn check_status(response: Response) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    match response.json::<ApiError>().await {
        Ok(payload) => Err(ApiException::from(payload).into()),
        Err(_) => Err(anyhow!("remote service answered {status}")),
    }
}

#[async_trait]
impl RemoteGateway for HttpRemoteGateway {
    async fn get_room_info(&self, rid: &RoomId) -> Result<RoomInfoResponse> {
        let response = self
            .authed(self.http.get(self.endpoint(&format!("rooms/{rid}/info"))))
            .send()
            .await?;

        // Inaccessible rooms are a soft outcome, not an error.
        if matches!(
            response.status(),
            StatusCode::FORBIDDEN | StatusCode::NOT_FOUND
        ) {
            return Ok(RoomInfoResponse {
                success: false,
                room: None,
            });
        }

        let info: RoomInfoResponse = check_status(response).await?.json().await?;
        if let Some(room) = &info.room {
            if room.rid != *rid {
                return Err(HttpGatewayError::RoomMismatch {
                    requested: rid.clone(),
                    answered: room.rid.clone(),
                }
                .into());
            }
        }
        Ok(info)
    }

    async fn join_room(&self, rid: &RoomId) -> Result<JoinRoomResponse> {
        let response = self
            .authed(self.http.post(self.endpoint(&format!("rooms/{rid}/join"))))
            .send()
            .await?;
        Ok(check_status(response).await?.json().await?)
    }

    async fn toggle_favorite(&self, rid: &RoomId, favorite: bool) -> Result<()> {
        let response = self
            .authed(
                self.http
                    .post(self.endpoint(&format!("rooms/{rid}/favorite")))
                    .json(&SetFavoriteRequest { favorite }),
            )
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn load_missed_messages(&self, room: &RoomRecord) -> Result<()> {
        let response = self
            .authed(
                self.http
                    .post(self.endpoint(&format!("rooms/{}/missed", room.rid)))
                    .query(&MissedQuery {
                        since: room.last_seen.map(|ls| ls.to_rfc3339()),
                    }),
            )
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn read_messages(&self, rid: &RoomId) -> Result<()> {
        let response = self
            .authed(self.http.post(self.endpoint(&format!("rooms/{rid}/read"))))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn load_history(&self, request: HistoryRequest) -> Result<Vec<MessageRecord>> {
        let response = self
            .authed(
                self.http
                    .get(self.endpoint(&format!("rooms/{}/history", request.rid)))
                    .query(&HistoryQuery {
                        latest: request.latest.to_rfc3339(),
                        count: request.count,
                        t: request.kind.as_tag(),
                    }),
            )
            .send()
            .await?;
        let page: HistoryResponse = check_status(response).await?.json().await?;
        Ok(page.messages)
    }

    async fn send_message(&self, rid: &RoomId, msg: &str) -> Result<()> {
        let response = self
            .authed(
                self.http
                    .post(self.endpoint(&format!("rooms/{rid}/messages")))
                    .json(&SendMessageRequest {
                        msg: msg.to_string(),
                    }),
            )
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn set_reaction(&self, shortcode: &str, message_id: &MessageId) -> Result<()> {
        let response = self
            .authed(
                self.http
                    .post(self.endpoint(&format!("messages/{message_id}/reactions")))
                    .json(&SetReactionRequest {
                        shortcode: shortcode.to_string(),
                    }),
            )
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/http_gateway_tests.rs"]
mod tests;
