//! WeCom customer-service ("kf") API client.
//!
//! Access tokens are fetched with the app's corp id and API secret and cached
//! per corp until shortly before they expire.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::domain::bot::{KfMessage, KfMessageBatch};
use crate::ports::{BotCredentials, CustomerServiceClient, CustomerServiceError};

pub const DEFAULT_API_BASE_URL: &str = "https://qyapi.weixin.qq.com";

/// Page size requested from the sync API (its maximum).
const SYNC_PAGE_LIMIT: u32 = 1000;

/// Tokens are refreshed this long before the advertised expiry.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(300);

/// Error code the API returns when a cached token was revoked early.
const ERRCODE_TOKEN_EXPIRED: i64 = 42001;

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    refresh_at: Instant,
}

#[derive(Debug, Clone)]
pub struct WecomKfClient {
    http_client: Client,
    base_url: String,
    tokens: Arc<Mutex<HashMap<String, CachedToken>>>,
}

/// Envelope fields every API response carries.
#[derive(Debug, Default, Deserialize)]
struct ApiStatus {
    #[serde(default)]
    errcode: i64,
    #[serde(default)]
    errmsg: String,
}

impl ApiStatus {
    fn into_result(self) -> Result<(), CustomerServiceError> {
        if self.errcode == 0 {
            Ok(())
        } else {
            Err(CustomerServiceError::Api {
                code: self.errcode,
                message: self.errmsg,
            })
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(flatten)]
    status: ApiStatus,
    #[serde(default)]
    access_token: String,
    #[serde(default)]
    expires_in: u64,
}

#[derive(Debug, Serialize)]
struct SyncRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    cursor: Option<&'a str>,
    token: &'a str,
    limit: u32,
    open_kfid: &'a str,
}

#[derive(Debug, Deserialize)]
struct SyncResponse {
    #[serde(flatten)]
    status: ApiStatus,
    #[serde(default)]
    next_cursor: String,
    #[serde(default)]
    has_more: u8,
    #[serde(default)]
    msg_list: Vec<KfMessage>,
}

#[derive(Debug, Serialize)]
struct SendTextRequest<'a> {
    touser: &'a str,
    open_kfid: &'a str,
    msgtype: &'static str,
    text: SendTextBody<'a>,
}

#[derive(Debug, Serialize)]
struct SendTextBody<'a> {
    content: &'a str,
}

impl WecomKfClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn token_cache_key(credentials: &BotCredentials) -> String {
        format!("{}:{}", credentials.receiver_id, credentials.kb_id)
    }

    async fn access_token(&self, credentials: &BotCredentials) -> Result<String, CustomerServiceError> {
        let cache_key = Self::token_cache_key(credentials);
        let mut tokens = self.tokens.lock().await;
        if let Some(cached) = tokens.get(&cache_key) {
            if Instant::now() < cached.refresh_at {
                return Ok(cached.value.clone());
            }
        }

        let secret = credentials
            .api_secret
            .as_ref()
            .ok_or_else(|| CustomerServiceError::MissingSecret(credentials.kb_id.clone()))?;

        let response = self
            .http_client
            .get(format!("{}/cgi-bin/gettoken", self.base_url))
            .query(&[
                ("corpid", credentials.receiver_id.as_str()),
                ("corpsecret", secret.expose_secret().as_str()),
            ])
            .send()
            .await
            .map_err(|e| CustomerServiceError::Unavailable(e.to_string()))?;
        let token: TokenResponse = Self::decode(response).await?;
        token.status.into_result()?;

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_REFRESH_MARGIN);
        tokens.insert(
            cache_key,
            CachedToken {
                value: token.access_token.clone(),
                refresh_at: Instant::now() + lifetime,
            },
        );
        tracing::debug!(kb_id = %credentials.kb_id, "Refreshed customer service access token");

        Ok(token.access_token)
    }

    async fn forget_token(&self, credentials: &BotCredentials) {
        self.tokens
            .lock()
            .await
            .remove(&Self::token_cache_key(credentials));
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, CustomerServiceError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(%status, body = %body, "Customer service API request failed");
            return Err(CustomerServiceError::Unavailable(format!("status {}", status)));
        }
        response
            .json()
            .await
            .map_err(|e| CustomerServiceError::Unavailable(format!("invalid response: {}", e)))
    }

    async fn post<B, T>(
        &self,
        credentials: &BotCredentials,
        path: &str,
        body: &B,
    ) -> Result<T, CustomerServiceError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned + HasStatus,
    {
        // One retry when the cached token was invalidated server-side.
        for attempt in 0..2 {
            let token = self.access_token(credentials).await?;
            let response = self
                .http_client
                .post(format!("{}{}", self.base_url, path))
                .query(&[("access_token", token.as_str())])
                .json(body)
                .send()
                .await
                .map_err(|e| CustomerServiceError::Unavailable(e.to_string()))?;
            let parsed: T = Self::decode(response).await?;

            if parsed.errcode() == ERRCODE_TOKEN_EXPIRED && attempt == 0 {
                self.forget_token(credentials).await;
                continue;
            }
            return Ok(parsed);
        }
        Err(CustomerServiceError::Unavailable(
            "access token rejected twice".to_string(),
        ))
    }
}

trait HasStatus {
    fn errcode(&self) -> i64;
}

impl HasStatus for SyncResponse {
    fn errcode(&self) -> i64 {
        self.status.errcode
    }
}

impl HasStatus for ApiStatus {
    fn errcode(&self) -> i64 {
        self.errcode
    }
}

impl From<SyncResponse> for KfMessageBatch {
    fn from(response: SyncResponse) -> Self {
        Self {
            messages: response.msg_list,
            next_cursor: Some(response.next_cursor).filter(|c| !c.is_empty()),
            has_more: response.has_more != 0,
        }
    }
}

#[async_trait]
impl CustomerServiceClient for WecomKfClient {
    async fn sync_messages(
        &self,
        credentials: &BotCredentials,
        token: &str,
        open_kfid: &str,
        cursor: Option<&str>,
    ) -> Result<KfMessageBatch, CustomerServiceError> {
        let request = SyncRequest {
            cursor,
            token,
            limit: SYNC_PAGE_LIMIT,
            open_kfid,
        };
        let mut response: SyncResponse = self
            .post(credentials, "/cgi-bin/kf/sync_msg", &request)
            .await?;
        std::mem::take(&mut response.status).into_result()?;

        Ok(response.into())
    }

    async fn send_text(
        &self,
        credentials: &BotCredentials,
        open_kfid: &str,
        external_userid: &str,
        content: &str,
    ) -> Result<(), CustomerServiceError> {
        let request = SendTextRequest {
            touser: external_userid,
            open_kfid,
            msgtype: "text",
            text: SendTextBody { content },
        };
        let status: ApiStatus = self
            .post(credentials, "/cgi-bin/kf/send_msg", &request)
            .await?;
        status.into_result()
    }
}
