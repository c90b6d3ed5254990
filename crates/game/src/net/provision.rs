//! Room id to endpoint lookup, done before the channel opens.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use super::protocol::{ENGINE_IO_VERSION, SOCKET_IO_PATH};
use crate::config::PlayerProfile;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("connection lookup request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid lookup url: {0}")]
    Url(#[from] url::ParseError),
    #[error("room {room_id} is not ready (status `{status}`)")]
    NotReady { room_id: String, status: String },
    #[error("room {0} has no exposed port")]
    NoExposedPort(String),
}

#[async_trait]
pub trait Provisioner {
    async fn resolve(&self, room_id: &str) -> Result<ConnectionInfo, ProvisionError>;
}

/// Always answers with the same endpoint. Used for local servers.
#[derive(Debug, Clone)]
pub struct StaticProvisioner {
    info: ConnectionInfo,
}

impl StaticProvisioner {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            info: ConnectionInfo {
                host: host.into(),
                port,
            },
        }
    }
}

#[async_trait]
impl Provisioner for StaticProvisioner {
    async fn resolve(&self, _room_id: &str) -> Result<ConnectionInfo, ProvisionError> {
        Ok(self.info.clone())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExposedPort {
    host: String,
    port: u16,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConnectionInfoResponse {
    room_id: String,
    status: String,
    #[serde(default)]
    exposed_port: Option<ExposedPort>,
}

impl ConnectionInfoResponse {
    fn into_info(self) -> Result<ConnectionInfo, ProvisionError> {
        if self.status != "active" {
            return Err(ProvisionError::NotReady {
                room_id: self.room_id,
                status: self.status,
            });
        }
        let port = self
            .exposed_port
            .ok_or(ProvisionError::NoExposedPort(self.room_id))?;
        Ok(ConnectionInfo {
            host: port.host,
            port: port.port,
        })
    }
}

/// Asks the room service where a room is hosted, polling while the room is
/// still starting.
#[derive(Debug, Clone)]
pub struct HttpProvisioner {
    client: reqwest::Client,
    base_url: Url,
    app_id: String,
    max_attempts: u32,
    retry_delay: Duration,
    request_timeout: Duration,
}

impl HttpProvisioner {
    pub fn new(base_url: Url, app_id: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            app_id: app_id.into(),
            max_attempts: 10,
            retry_delay: Duration::from_millis(500),
            request_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_retries(mut self, max_attempts: u32, retry_delay: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.retry_delay = retry_delay;
        self
    }

    /// Bounds each lookup request, connect to last body byte.
    pub fn with_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn lookup_url(&self, room_id: &str) -> Result<Url, ProvisionError> {
        let path = format!("rooms/v2/{}/connectioninfo/{}", self.app_id, room_id);
        Ok(self.base_url.join(&path)?)
    }
}

#[async_trait]
impl Provisioner for HttpProvisioner {
    async fn resolve(&self, room_id: &str) -> Result<ConnectionInfo, ProvisionError> {
        let url = self.lookup_url(room_id)?;
        let mut attempt = 1;

        loop {
            log::debug!("Resolving room {} (attempt {})", room_id, attempt);
            let response: ConnectionInfoResponse = self
                .client
                .get(url.clone())
                .timeout(self.request_timeout)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;

            match response.into_info() {
                Err(ProvisionError::NotReady { status, .. })
                    if status == "starting" && attempt < self.max_attempts =>
                {
                    attempt += 1;
                    tokio::time::sleep(self.retry_delay).await;
                }
                other => return other,
            }
        }
    }
}

/// Channel URL for a resolved endpoint. Room, nickname and skin ride along
/// as query parameters.
pub fn channel_url(
    info: &ConnectionInfo,
    room_id: &str,
    profile: &PlayerProfile,
    secure: bool,
) -> Result<Url, url::ParseError> {
    let scheme = if secure { "wss" } else { "ws" };
    let mut url = Url::parse(&format!("{}://{}:{}", scheme, info.host, info.port))?;
    url.set_path(SOCKET_IO_PATH);
    url.query_pairs_mut()
        .append_pair("EIO", ENGINE_IO_VERSION)
        .append_pair("transport", "websocket")
        .append_pair("roomId", room_id)
        .append_pair("nickname", &profile.nickname)
        .append_pair("santa", profile.skin.label());
    Ok(url)
}
