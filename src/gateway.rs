use std::collections::HashMap;

use async_trait::async_trait;
use rand::{RngCore, rngs::OsRng};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::debug;

use crate::config::Config;
use crate::credentials::AppState;
use crate::messenger::{Delivery, Messenger, MessengerError, ThreadInfo, ThreadSummary, UserInfo};
use crate::realtime;

/// HTTP client for the local messaging gateway. Lookups and sends are plain
/// JSON posts; events arrive over the realtime socket.
#[derive(Clone)]
pub struct GatewayClient {
    base_url: String,
    realtime_url: String,
    token: String,
    http: Client,
}

impl GatewayClient {
    async fn post<T: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        payload: serde_json::Map<String, serde_json::Value>,
    ) -> Result<T, MessengerError> {
        let url = format!("{}/{method}", self.base_url);
        debug!(%method, "gateway call");
        let request = self.http.post(url).bearer_auth(&self.token).json(&payload);
        read_envelope(request.send().await?).await
    }
}

#[async_trait]
impl Messenger for GatewayClient {
    async fn login(config: &Config, credentials: &AppState) -> Result<Self, MessengerError> {
        let http = Client::new();
        let base_url = config.api_base_url.trim_end_matches('/').to_string();
        let device_name = hostname::get().ok().and_then(|name| name.into_string().ok());

        let mut payload = serde_json::Map::new();
        payload.insert("appState".to_string(), credentials.as_value().clone());
        payload.insert("clientVersion".to_string(), json!(env!("CARGO_PKG_VERSION")));
        if let Some(device_name) = device_name {
            payload.insert("deviceName".to_string(), json!(device_name));
        }

        let response = http
            .post(format!("{base_url}/login"))
            .json(&payload)
            .send()
            .await?;
        let result: LoginResult = read_envelope(response).await?;
        debug!(user_id = ?result.user_id, "logged in");

        Ok(Self {
            base_url,
            realtime_url: config.realtime_url.clone(),
            token: result.token,
            http,
        })
    }

    async fn send_message(&self, text: &str, thread_id: &str) -> Result<(), MessengerError> {
        let client_message_id = OsRng.next_u64();
        let mut payload = serde_json::Map::new();
        payload.insert("threadID".to_string(), json!(thread_id));
        payload.insert("body".to_string(), json!(text));
        payload.insert("clientMessageId".to_string(), json!(client_message_id.to_string()));
        let result: SendMessageResult = self.post("sendMessage", payload).await?;
        debug!(message_id = ?result.message_id, %thread_id, "message sent");
        Ok(())
    }

    async fn get_thread_info(&self, thread_id: &str) -> Result<ThreadInfo, MessengerError> {
        let mut payload = serde_json::Map::new();
        payload.insert("threadID".to_string(), json!(thread_id));
        self.post("getThreadInfo", payload).await
    }

    async fn get_user_info(&self, user_id: &str) -> Result<HashMap<String, UserInfo>, MessengerError> {
        let mut payload = serde_json::Map::new();
        payload.insert("userIDs".to_string(), json!([user_id]));
        self.post("getUserInfo", payload).await
    }

    async fn get_thread_list(&self, limit: usize) -> Result<Vec<ThreadSummary>, MessengerError> {
        let mut payload = serde_json::Map::new();
        payload.insert("limit".to_string(), json!(limit));
        self.post("getThreadList", payload).await
    }

    async fn subscribe(&self) -> Result<mpsc::Receiver<Delivery>, MessengerError> {
        realtime::subscribe(&self.realtime_url, &self.token).await
    }
}

async fn read_envelope<T: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
) -> Result<T, MessengerError> {
    let status = response.status();
    if !status.is_success() {
        return Err(MessengerError::Status(status.as_u16()));
    }
    let body = response.text().await?;
    decode_envelope(&body)
}

fn decode_envelope<T: for<'de> Deserialize<'de>>(body: &str) -> Result<T, MessengerError> {
    let api_response: ApiResponse<T> = serde_json::from_str(body)?;
    match api_response {
        ApiResponse::Ok { result, .. } => Ok(result),
        ApiResponse::Err {
            error,
            description,
            ..
        } => Err(MessengerError::Api {
            error,
            description: description.unwrap_or_else(|| "Unknown error".to_string()),
        }),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResult {
    token: String,
    user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SendMessageResult {
    #[serde(rename = "messageID", default)]
    message_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged, rename_all = "camelCase")]
enum ApiResponse<T> {
    Ok { ok: bool, result: T },
    Err {
        ok: bool,
        error: String,
        error_code: Option<i32>,
        description: Option<String>,
    },
}
