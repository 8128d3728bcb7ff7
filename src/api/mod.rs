mod http;

use async_trait::async_trait;

use crate::protocol::{ActionResponse, CreateRoomRequest, GameSnapshot, RoomAction, RoomInfo};
use crate::types::Pitch;

pub use http::HttpGameApi;

/// Result type for game server calls
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors that can occur while talking to the game server
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Server returned status {0}")]
    Status(u16),

    #[error("Room not found")]
    RoomNotFound,

    /// `{ ok: false, message }` from the server, shown to the player as-is
    #[error("{0}")]
    Rejected(String),

    /// Client-side check failed; no request was sent
    #[error("{0}")]
    Validation(String),

    #[error("Response parsing failed: {0}")]
    Decode(String),
}

impl ActionResponse {
    /// Turn a `{ ok: false }` envelope into an error
    pub fn into_result(self) -> ApiResult<ActionResponse> {
        if self.ok {
            Ok(self)
        } else {
            Err(ApiError::Rejected(
                self.message
                    .unwrap_or_else(|| "Request was rejected".to_string()),
            ))
        }
    }
}

/// The game server's HTTP surface, as consumed by this client
#[async_trait]
pub trait GameApi: Send + Sync {
    /// `GET /api/room/:code`
    async fn room(&self, code: &str) -> ApiResult<RoomInfo>;

    /// `GET /api/room/:code/game`
    async fn game(&self, code: &str) -> ApiResult<GameSnapshot>;

    /// `GET /api/room/:code/pitches`
    async fn pitches(&self, code: &str) -> ApiResult<Vec<Pitch>>;

    /// `POST /api/rooms`
    async fn create_room(&self, request: CreateRoomRequest) -> ApiResult<ActionResponse>;

    /// `POST /api/room/:code/<action>`; `ok: false` comes back as `Rejected`
    async fn act(&self, code: &str, action: RoomAction) -> ApiResult<ActionResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_result() {
        let ok = ActionResponse {
            ok: true,
            code: Some("ABCD".to_string()),
            ..Default::default()
        };
        assert_eq!(ok.into_result().unwrap().code.as_deref(), Some("ABCD"));

        let rejected = ActionResponse {
            ok: false,
            message: Some("Name already taken".to_string()),
            ..Default::default()
        };
        match rejected.into_result() {
            Err(ApiError::Rejected(msg)) => assert_eq!(msg, "Name already taken"),
            other => panic!("Expected Rejected, got {:?}", other),
        }
    }

    #[test]
    fn test_rejected_without_message() {
        let rejected = ActionResponse::default();
        let err = rejected.into_result().unwrap_err();
        assert_eq!(err.to_string(), "Request was rejected");
    }
}
