use crate::errors::AgentClientError;
use futures_util::{SinkExt, StreamExt};
use krakenhashes_models::{AgentDevice, ControlMessage};
use krakenhashes_transport::{decode_frame, encode_frame};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{info, instrument, warn};

#[derive(Serialize)]
pub struct RegistrationRequest {
    pub voucher_code: String,
    pub hostname: String,
    pub hardware: Vec<AgentDevice>,
    pub version: String,
}

#[derive(Deserialize)]
pub struct RegistrationResponse {
    pub agent_id: i64,
    pub api_key: String,
}

/// Coordinator-facing HTTP client used once at startup to exchange a
/// claim voucher for a long-lived API key, and to open the control
/// channel WebSocket afterward.
pub struct CoordinatorClient {
    http: Client,
    base_url: String,
}

impl CoordinatorClient {
    pub fn new(base_url: String) -> Self {
        Self {
            http: Client::builder()
                .user_agent(concat!("krakenhashes-agent/", env!("CARGO_PKG_VERSION")))
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("failed to build the coordinator HTTP client"),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    #[instrument(skip(self, request))]
    pub async fn register(&self, request: &RegistrationRequest) -> Result<RegistrationResponse, AgentClientError> {
        let url = format!("{}/api/v1/agent/register", self.base_url);
        let response = self.http.post(&url).json(request).send().await?;

        match response.status() {
            StatusCode::OK | StatusCode::CREATED => Ok(response.json::<RegistrationResponse>().await?),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(AgentClientError::Unauthorized),
            status => Err(AgentClientError::Rejected(format!("registration failed with status {status}"))),
        }
    }

    /// Opens the bidirectional control channel and returns a thin
    /// wrapper that frames `ControlMessage`s in both directions.
    #[instrument(skip(self, api_key))]
    pub async fn connect_control_channel(&self, api_key: &str) -> Result<ControlChannel, AgentClientError> {
        let ws_url = self.base_url.replacen("http", "ws", 1) + "/api/v1/agent/ws";
        let mut request = ws_url
            .into_client_request()
            .map_err(|e| AgentClientError::Rejected(e.to_string()))?;
        request.headers_mut().insert(
            tokio_tungstenite::tungstenite::http::header::AUTHORIZATION,
            format!("Bearer {api_key}").parse().expect("bearer header is always valid ASCII"),
        );

        let (stream, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| AgentClientError::Rejected(e.to_string()))?;
        info!("control channel established");
        Ok(ControlChannel { stream })
    }
}

/// Frames `ControlMessage`s over a WebSocket connection using the
/// JSON envelope contract shared with the coordinator.
pub struct ControlChannel {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl ControlChannel {
    pub async fn send(&mut self, message: &ControlMessage) -> Result<(), AgentClientError> {
        let frame = encode_frame(message)?;
        self.stream.send(WsMessage::Binary(frame)).await.map_err(|e| AgentClientError::Rejected(e.to_string()))?;
        Ok(())
    }

    pub async fn recv(&mut self) -> Result<ControlMessage, AgentClientError> {
        loop {
            match self.stream.next().await {
                Some(Ok(WsMessage::Binary(bytes))) => return Ok(decode_frame(&bytes)?),
                Some(Ok(WsMessage::Text(text))) => return Ok(decode_frame(text.as_bytes())?),
                Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_))) => continue,
                Some(Ok(WsMessage::Close(_))) | None => return Err(AgentClientError::ChannelClosed),
                Some(Ok(WsMessage::Frame(_))) => continue,
                Some(Err(e)) => {
                    warn!("control channel error: {e}");
                    return Err(AgentClientError::Rejected(e.to_string()));
                }
            }
        }
    }
}
