use crate::core::auth::TokenCache;
use crate::utils::error::{CarrierError, Result};
use reqwest::{Client, Method};
use serde_json::Value;

/// 盡量把回應內容轉為 JSON：無法解析時保留原始文字，空內容則為 `{}`
pub(crate) fn best_effort_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Object(serde_json::Map::new());
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

/// 帶 Bearer token 的物流商 HTTP 傳輸層，不做重試
pub struct CarrierTransport {
    client: Client,
    base_url: String,
    tokens: TokenCache,
}

impl CarrierTransport {
    pub fn new(client: Client, base_url: &str, tokens: TokenCache) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        let token = self.tokens.token().await?;

        let mut request = self
            .client
            .request(method.clone(), &url)
            .bearer_auth(token);

        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        tracing::debug!("📡 Carrier API {} {}", method, path);

        let response = request.send().await.map_err(|e| {
            tracing::warn!("Carrier API {} {} failed: {}", method, path, e);
            CarrierError::ApiError {
                message: if e.is_timeout() {
                    format!("request to {} timed out", path)
                } else {
                    format!("request to {} failed: {}", path, e)
                },
                status_code: e.status().map(|s| s.as_u16()),
                response_body: Value::Object(serde_json::Map::new()),
            }
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| CarrierError::ApiError {
            message: format!("failed to read response from {}: {}", path, e),
            status_code: Some(status.as_u16()),
            response_body: Value::Object(serde_json::Map::new()),
        })?;
        let payload = best_effort_body(&text);

        tracing::debug!("📡 Carrier API {} {} status: {}", method, path, status);

        if status == reqwest::StatusCode::UNAUTHORIZED {
            // token 被物流商撤銷，下一次呼叫重新交換
            self.tokens.invalidate().await;
        }

        if !status.is_success() {
            tracing::warn!(
                "Carrier API {} {} failed: status={}, body={}",
                method,
                path,
                status,
                payload
            );
            return Err(CarrierError::ApiError {
                message: format!("{} {} returned {}", method, path, status),
                status_code: Some(status.as_u16()),
                response_body: payload,
            });
        }

        if payload.is_string() {
            return Err(CarrierError::ApiError {
                message: format!("{} {} returned a non-JSON body", method, path),
                status_code: Some(status.as_u16()),
                response_body: payload,
            });
        }

        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::clock::ManualClock;
    use crate::core::auth::{Credentials, TOKEN_PATH};
    use httpmock::prelude::*;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn transport_for(server: &MockServer, client: Client) -> CarrierTransport {
        let tokens = TokenCache::new(
            client.clone(),
            &server.base_url(),
            Credentials {
                client_id: "account".to_string(),
                client_secret: "secure".to_string(),
            },
            Arc::new(ManualClock::default()),
        );
        CarrierTransport::new(client, &server.base_url(), tokens)
    }

    fn mock_token(server: &MockServer) {
        server.mock(|when, then| {
            when.method(POST).path(TOKEN_PATH);
            then.status(200)
                .json_body(json!({"access_token": "tok", "expires_in": 3600}));
        });
    }

    #[test]
    fn test_best_effort_body() {
        assert_eq!(best_effort_body(""), json!({}));
        assert_eq!(best_effort_body("{\"a\":1}"), json!({"a": 1}));
        assert_eq!(best_effort_body("Bad Gateway"), json!("Bad Gateway"));
    }

    #[tokio::test]
    async fn test_request_attaches_bearer_token() {
        let server = MockServer::start();
        mock_token(&server);
        let api_mock = server.mock(|when, then| {
            when.method(POST)
                .path("/v2/calculator/tariff")
                .header("Authorization", "Bearer tok")
                .json_body(json!({"tariff_code": 136}));
            then.status(200).json_body(json!({"delivery_sum": 250}));
        });

        let transport = transport_for(&server, Client::new());
        let body = json!({"tariff_code": 136});
        let result = transport
            .request(Method::POST, "/v2/calculator/tariff", &[], Some(&body))
            .await
            .unwrap();

        api_mock.assert();
        assert_eq!(result["delivery_sum"], 250);
    }

    #[tokio::test]
    async fn test_non_2xx_carries_status_and_body() {
        let server = MockServer::start();
        mock_token(&server);
        server.mock(|when, then| {
            when.method(GET).path("/v2/location/cities");
            then.status(400)
                .json_body(json!({"errors": [{"code": "v2_bad_request"}]}));
        });

        let transport = transport_for(&server, Client::new());
        let err = transport
            .request(
                Method::GET,
                "/v2/location/cities",
                &[("country_code", "RU".to_string())],
                None,
            )
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), Some(400));
        assert_eq!(
            err.response_body().unwrap()["errors"][0]["code"],
            "v2_bad_request"
        );
    }

    #[tokio::test]
    async fn test_empty_success_body_is_empty_object() {
        let server = MockServer::start();
        mock_token(&server);
        server.mock(|when, then| {
            when.method(POST).path("/v2/orders");
            then.status(202);
        });

        let transport = transport_for(&server, Client::new());
        let result = transport
            .request(Method::POST, "/v2/orders", &[], Some(&json!({})))
            .await
            .unwrap();

        assert_eq!(result, json!({}));
    }

    #[tokio::test]
    async fn test_timeout_is_api_error_without_status() {
        let server = MockServer::start();
        mock_token(&server);
        server.mock(|when, then| {
            when.method(POST).path("/v2/calculator/tarifflist");
            then.status(200)
                .delay(Duration::from_millis(500))
                .json_body(json!([]));
        });

        let client = Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .unwrap();
        let transport = transport_for(&server, client);
        let err = transport
            .request(Method::POST, "/v2/calculator/tarifflist", &[], Some(&json!({})))
            .await
            .unwrap_err();

        assert!(matches!(err, CarrierError::ApiError { status_code: None, .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_auth_failure_propagates_before_request() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path(TOKEN_PATH);
            then.status(500);
        });
        let api_mock = server.mock(|when, then| {
            when.method(GET).path("/v2/location/cities");
            then.status(200).json_body(json!([]));
        });

        let transport = transport_for(&server, Client::new());
        let err = transport
            .request(Method::GET, "/v2/location/cities", &[], None)
            .await
            .unwrap_err();

        assert!(matches!(err, CarrierError::AuthError { .. }));
        api_mock.assert_hits(0);
    }

    #[tokio::test]
    async fn test_unauthorized_response_drops_cached_token() {
        let server = MockServer::start();
        let token_mock = server.mock(|when, then| {
            when.method(POST).path(TOKEN_PATH);
            then.status(200)
                .json_body(json!({"access_token": "tok", "expires_in": 3600}));
        });
        server.mock(|when, then| {
            when.method(GET).path("/v2/location/cities");
            then.status(401)
                .json_body(json!({"errors": [{"code": "v2_token_expired"}]}));
        });

        let transport = transport_for(&server, Client::new());
        for _ in 0..2 {
            let err = transport
                .request(Method::GET, "/v2/location/cities", &[], None)
                .await
                .unwrap_err();
            assert_eq!(err.status_code(), Some(401));
        }

        token_mock.assert_hits(2);
    }
}
