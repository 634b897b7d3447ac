use crate::core::transport::best_effort_body;
use crate::domain::model::{integer_from_json, AuthToken};
use crate::domain::ports::Clock;
use crate::utils::error::{CarrierError, Result};
use reqwest::Client;
use std::sync::Arc;
use tokio::sync::Mutex;

pub const TOKEN_PATH: &str = "/v2/oauth/token";

/// 提前 60 秒視為過期，避免送出即將失效的 token
pub const TOKEN_SAFETY_MARGIN_SECS: i64 = 60;

const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

/// 物流商回傳的有效期上限（一天），超過的值一律截斷
pub const MAX_TOKEN_LIFETIME_SECS: i64 = 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

/// OAuth client-credentials token 快取。
///
/// 同一組帳密只保留一個 token。更新時持有鎖，
/// 同時到達的呼叫者會等待同一次交換而不是各自重新取得。
pub struct TokenCache {
    client: Client,
    token_url: String,
    credentials: Credentials,
    clock: Arc<dyn Clock>,
    current: Mutex<Option<AuthToken>>,
}

impl TokenCache {
    pub fn new(client: Client, base_url: &str, credentials: Credentials, clock: Arc<dyn Clock>) -> Self {
        Self {
            client,
            token_url: format!("{}{}", base_url.trim_end_matches('/'), TOKEN_PATH),
            credentials,
            clock,
            current: Mutex::new(None),
        }
    }

    pub async fn token(&self) -> Result<String> {
        let mut current = self.current.lock().await;

        let now = self.clock.now();
        if let Some(token) = current.as_ref().filter(|t| t.is_valid_at(now)) {
            return Ok(token.access_token.clone());
        }

        let fresh = self.exchange().await?;
        let access_token = fresh.access_token.clone();
        *current = Some(fresh);
        Ok(access_token)
    }

    /// 丟棄目前的 token，下一次呼叫會重新交換
    pub async fn invalidate(&self) {
        self.current.lock().await.take();
    }

    async fn exchange(&self) -> Result<AuthToken> {
        tracing::debug!("🔑 Requesting carrier OAuth token from {}", self.token_url);

        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
        ];

        let response = self
            .client
            .post(&self.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Carrier OAuth request failed: {}", e);
                CarrierError::AuthError {
                    message: format!("token request failed: {}", e),
                    status_code: e.status().map(|s| s.as_u16()),
                    response_body: serde_json::json!({}),
                }
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            tracing::error!("Carrier OAuth response could not be read: {}", e);
            CarrierError::AuthError {
                message: format!("failed to read token response: {}", e),
                status_code: Some(status.as_u16()),
                response_body: serde_json::json!({}),
            }
        })?;
        let payload = best_effort_body(&text);

        if !status.is_success() {
            tracing::error!(
                "Carrier OAuth request rejected: status={}, body={}",
                status,
                payload
            );
            return Err(CarrierError::AuthError {
                message: format!("token endpoint returned {}", status),
                status_code: Some(status.as_u16()),
                response_body: payload,
            });
        }

        let access_token = payload
            .get("access_token")
            .and_then(|v| v.as_str())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .ok_or_else(|| CarrierError::AuthError {
                message: "response has no access_token".to_string(),
                status_code: Some(status.as_u16()),
                response_body: payload.clone(),
            })?;

        let expires_in = payload
            .get("expires_in")
            .and_then(integer_from_json)
            .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
        let lifetime = expires_in
            .saturating_sub(TOKEN_SAFETY_MARGIN_SECS)
            .clamp(0, MAX_TOKEN_LIFETIME_SECS);
        let expires_at = self.clock.now() + chrono::Duration::seconds(lifetime);

        tracing::info!("🔑 Obtained carrier token, valid for {}s", lifetime);

        Ok(AuthToken {
            access_token,
            expires_at,
        })
    }
}
