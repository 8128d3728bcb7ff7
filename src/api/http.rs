use super::*;
use crate::config::{normalize_base_url, ClientConfig};
use crate::protocol::PitchList;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// reqwest-backed implementation of [`GameApi`]
#[derive(Debug, Clone)]
pub struct HttpGameApi {
    base_url: String,
    client: reqwest::Client,
}

impl HttpGameApi {
    /// Create a client for the given base URL; the URL is normalized first
    pub fn new(base_url: &str, timeout: Duration) -> ApiResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Request(e.to_string()))?;

        Ok(Self {
            base_url: normalize_base_url(base_url),
            client,
        })
    }

    pub fn from_config(config: &ClientConfig) -> ApiResult<Self> {
        Self::new(&config.api_url, config.http_timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn room_url(&self, code: &str, suffix: &str) -> String {
        if suffix.is_empty() {
            format!("{}/api/room/{}", self.base_url, code)
        } else {
            format!("{}/api/room/{}/{}", self.base_url, code, suffix)
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> ApiResult<T> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => return Err(ApiError::RoomNotFound),
            status if !status.is_success() => return Err(ApiError::Status(status.as_u16())),
            _ => {}
        }

        response
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// POST a JSON body and read the `{ ok, message }` envelope.
    ///
    /// A 404 is always `RoomNotFound`, envelope or not. Other error statuses
    /// usually carry an envelope, so the body is decoded before they are
    /// considered.
    async fn post_action<B: serde::Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
    ) -> ApiResult<ActionResponse> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ApiError::RoomNotFound);
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;

        match serde_json::from_slice::<ActionResponse>(&bytes) {
            Ok(envelope) => envelope.into_result(),
            Err(_) if !status.is_success() => Err(ApiError::Status(status.as_u16())),
            Err(e) => Err(ApiError::Decode(e.to_string())),
        }
    }
}

#[async_trait]
impl GameApi for HttpGameApi {
    async fn room(&self, code: &str) -> ApiResult<RoomInfo> {
        self.get_json(&self.room_url(code, "")).await
    }

    async fn game(&self, code: &str) -> ApiResult<GameSnapshot> {
        self.get_json(&self.room_url(code, "game")).await
    }

    async fn pitches(&self, code: &str) -> ApiResult<Vec<Pitch>> {
        let list: PitchList = self.get_json(&self.room_url(code, "pitches")).await?;
        Ok(list.pitches)
    }

    async fn create_room(&self, request: CreateRoomRequest) -> ApiResult<ActionResponse> {
        let url = format!("{}/api/rooms", self.base_url);
        tracing::debug!("Creating room for {}", request.name);
        self.post_action(&url, &request).await
    }

    async fn act(&self, code: &str, action: RoomAction) -> ApiResult<ActionResponse> {
        let url = self.room_url(code, action.endpoint());
        tracing::debug!("POST {}", url);
        self.post_action(&url, &action).await
    }
}
