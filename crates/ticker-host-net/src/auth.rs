//! OAuth token exchange over HTTP

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use ticker_host_api::{AuthService, HostError, HostResult, TokenGrant};
use ticker_util::SessionId;
use tracing::{debug, info};

use crate::http::{error_from_response, network_error};

/// Exchanges a session id for a bearer token via `GET <token_url>?sessionId=<id>`
pub struct HttpAuthService {
    client: Client,
    token_url: String,
}

impl HttpAuthService {
    pub fn new(client: Client, token_url: impl Into<String>) -> Self {
        Self {
            client,
            token_url: token_url.into(),
        }
    }
}

#[async_trait]
impl AuthService for HttpAuthService {
    async fn exchange_token(&self, session_id: &SessionId) -> HostResult<TokenGrant> {
        debug!(url = %self.token_url, "Retrieving access token");

        let response = self
            .client
            .get(&self.token_url)
            .query(&[("sessionId", session_id.as_str())])
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(network_error)?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let grant: TokenGrant = response
            .json()
            .await
            .map_err(|e| HostError::Decode(format!("Invalid token response: {}", e)))?;

        info!(expires_in = ?grant.expires_in, "Access token retrieved");
        Ok(grant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_client;
    use crate::test_server::serve_once;
    use std::time::Duration;

    #[tokio::test]
    async fn exchanges_session_for_token() {
        let (base, request) =
            serve_once(200, r#"{"access_token":"ya29.abc","expires_in":3599}"#).await;
        let service = HttpAuthService::new(
            build_client(Duration::from_secs(5)).unwrap(),
            format!("{}/token", base),
        );

        let grant = service
            .exchange_token(&SessionId::new("sess-42"))
            .await
            .unwrap();
        assert_eq!(grant.access_token.as_str(), "ya29.abc");
        assert_eq!(grant.expires_in, Some(3599));

        let raw = request.await.unwrap();
        assert!(raw.starts_with("GET /token?sessionId=sess-42 "));
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let (base, _request) = serve_once(404, r#"{"error":"Session not found"}"#).await;
        let service = HttpAuthService::new(
            build_client(Duration::from_secs(5)).unwrap(),
            format!("{}/token", base),
        );

        match service.exchange_token(&SessionId::new("nope")).await {
            Err(HostError::NotFound(message)) => assert_eq!(message, "Session not found"),
            other => panic!("Expected NotFound, got {:?}", other),
        }
    }
}
