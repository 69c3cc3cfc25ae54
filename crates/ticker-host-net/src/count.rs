//! Participant-count sources

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use ticker_host_api::{CountService, HostError, HostResult};
use ticker_util::{AccessToken, MeetingId};
use tracing::debug;

use crate::http::{error_from_response, network_error};

#[derive(Debug, Serialize)]
struct CountRequest<'a> {
    #[serde(rename = "conferenceId")]
    conference_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct CountResponse {
    #[serde(rename = "participantCount", default)]
    participant_count: Option<u32>,
}

/// Reads the participant count via `POST <participants_url>` with a bearer token
pub struct HttpCountService {
    client: Client,
    participants_url: String,
}

impl HttpCountService {
    pub fn new(client: Client, participants_url: impl Into<String>) -> Self {
        Self {
            client,
            participants_url: participants_url.into(),
        }
    }
}

#[async_trait]
impl CountService for HttpCountService {
    async fn participant_count(
        &self,
        token: &AccessToken,
        meeting_id: &MeetingId,
    ) -> HostResult<u32> {
        debug!(meeting_id = %meeting_id, "Polling participant count");

        let response = self
            .client
            .post(&self.participants_url)
            .bearer_auth(token.as_str())
            .json(&CountRequest {
                conference_id: meeting_id.as_str(),
            })
            .send()
            .await
            .map_err(network_error)?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let body: CountResponse = response
            .json()
            .await
            .map_err(|e| HostError::Decode(format!("Invalid participant response: {}", e)))?;

        // A missing count reads as zero
        Ok(body.participant_count.unwrap_or(0))
    }
}

/// Deterministic stand-in for the count endpoint.
///
/// Cycles through `min..=max`, one step per request.
pub struct SimulatedCountService {
    min: u32,
    span: u32,
    cursor: AtomicU32,
}

impl SimulatedCountService {
    pub fn new(min: u32, max: u32) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        Self {
            min,
            span: max - min + 1,
            cursor: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl CountService for SimulatedCountService {
    async fn participant_count(
        &self,
        _token: &AccessToken,
        meeting_id: &MeetingId,
    ) -> HostResult<u32> {
        let step = self.cursor.fetch_add(1, Ordering::Relaxed);
        let count = self.min + step % self.span;
        debug!(meeting_id = %meeting_id, count, "Simulated participant count");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_client;
    use crate::test_server::serve_once;
    use std::time::Duration;

    fn service(base: &str) -> HttpCountService {
        HttpCountService::new(
            build_client(Duration::from_secs(5)).unwrap(),
            format!("{}/participants", base),
        )
    }

    #[tokio::test]
    async fn posts_conference_id_with_bearer() {
        let (base, request) = serve_once(
            200,
            r#"{"conferenceId":"abc","participantCount":6,"timestamp":"2025-01-01T00:00:00Z"}"#,
        )
        .await;

        let count = service(&base)
            .participant_count(&AccessToken::new("tok"), &MeetingId::new("abc"))
            .await
            .unwrap();
        assert_eq!(count, 6);

        let raw = request.await.unwrap();
        let lower = raw.to_lowercase();
        assert!(raw.starts_with("POST /participants "));
        assert!(lower.contains("authorization: bearer tok"));
        assert!(raw.contains(r#"{"conferenceId":"abc"}"#));
    }

    #[tokio::test]
    async fn missing_count_reads_as_zero() {
        let (base, _request) = serve_once(200, r#"{"conferenceId":"abc"}"#).await;

        let count = service(&base)
            .participant_count(&AccessToken::new("tok"), &MeetingId::new("abc"))
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn error_statuses_are_classified() {
        for (status, variant) in [
            (401u16, "Unauthorized"),
            (403, "Forbidden"),
            (404, "NotFound"),
            (500, "Http"),
        ] {
            let (base, _request) =
                serve_once(status, r#"{"error":"nope","details":"because"}"#).await;
            let err = service(&base)
                .participant_count(&AccessToken::new("tok"), &MeetingId::new("abc"))
                .await
                .unwrap_err();

            let debug = format!("{:?}", err);
            assert!(debug.starts_with(variant), "status {} gave {}", status, debug);
            assert!(err.to_string().contains("nope (because)"));
        }
    }

    #[tokio::test]
    async fn simulated_cycles_through_range() {
        let service = SimulatedCountService::new(2, 4);
        let token = AccessToken::new("t");
        let meeting = MeetingId::new("m");

        let mut seen = Vec::new();
        for _ in 0..5 {
            seen.push(service.participant_count(&token, &meeting).await.unwrap());
        }
        assert_eq!(seen, vec![2, 3, 4, 2, 3]);
    }

    #[tokio::test]
    async fn simulated_single_value_range() {
        let service = SimulatedCountService::new(5, 5);
        let count = service
            .participant_count(&AccessToken::new("t"), &MeetingId::new("m"))
            .await
            .unwrap();
        assert_eq!(count, 5);
    }
}
