//! Video room creation on Daily.co.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::DailyConfig;
use crate::domain::scheduling::meeting_window;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum MeetingError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("meeting provider returned HTTP {0}")]
    HttpStatus(u16),
}

#[async_trait]
pub trait MeetingProvider: Send + Sync {
    /// Create a room for a lesson and return its join URL.
    async fn create_room(
        &self,
        lesson_key: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<String, MeetingError>;
}

#[derive(Serialize)]
struct RoomProperties {
    nbf: i64,
    exp: i64,
    enable_chat: bool,
    enable_screenshare: bool,
}

#[derive(Serialize)]
struct CreateRoom {
    name: String,
    privacy: &'static str,
    properties: RoomProperties,
}

#[derive(Deserialize)]
struct Room {
    url: String,
}

pub fn room_name(lesson_key: Uuid) -> String {
    format!("ders-{}", lesson_key.simple())
}

fn room_request(lesson_key: Uuid, start: DateTime<Utc>, end: DateTime<Utc>) -> CreateRoom {
    let (nbf, exp) = meeting_window(start, end);
    CreateRoom {
        name: room_name(lesson_key),
        privacy: "public",
        properties: RoomProperties {
            nbf: nbf.timestamp(),
            exp: exp.timestamp(),
            enable_chat: true,
            enable_screenshare: true,
        },
    }
}

pub struct DailyClient {
    client: reqwest::Client,
    config: DailyConfig,
}

impl DailyClient {
    pub fn new(config: DailyConfig) -> Result<Self, MeetingError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl MeetingProvider for DailyClient {
    async fn create_room(
        &self,
        lesson_key: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<String, MeetingError> {
        let response = self
            .client
            .post(format!("{}/rooms", self.config.api_url))
            .bearer_auth(&self.config.api_key)
            .json(&room_request(lesson_key, start, end))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(MeetingError::HttpStatus(response.status().as_u16()));
        }

        let room: Room = response.json().await?;
        tracing::info!(lesson_key = %lesson_key, url = %room.url, "Meeting room created");
        Ok(room.url)
    }
}
