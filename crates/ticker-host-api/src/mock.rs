//! Mock services for testing

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use ticker_util::{AccessToken, CloudProjectNumber, MeetingId, SessionId};

use crate::{
    AuthService, CountService, HostError, HostResult, MeetingHost, MeetingInfo, TokenGrant,
};

/// Mock OAuth token endpoint
pub struct MockAuthService {
    /// Configure token exchange to fail
    pub fail_exchange: Arc<Mutex<bool>>,

    /// Token handed out on success
    pub token: Arc<Mutex<String>>,

    calls: AtomicU64,
}

impl MockAuthService {
    pub fn new() -> Self {
        Self {
            fail_exchange: Arc::new(Mutex::new(false)),
            token: Arc::new(Mutex::new("mock-token".into())),
            calls: AtomicU64::new(0),
        }
    }

    pub fn set_fail(&self, fail: bool) {
        *self.fail_exchange.lock().unwrap() = fail;
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockAuthService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthService for MockAuthService {
    async fn exchange_token(&self, _session_id: &SessionId) -> HostResult<TokenGrant> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if *self.fail_exchange.lock().unwrap() {
            return Err(HostError::NotFound("Session not found".into()));
        }

        Ok(TokenGrant {
            access_token: AccessToken::new(self.token.lock().unwrap().clone()),
            expires_in: Some(3600),
        })
    }
}

/// Mock participant-count endpoint.
///
/// Scripted results are consumed first; after that `default_count` is returned.
pub struct MockCountService {
    script: Arc<Mutex<VecDeque<HostResult<u32>>>>,

    /// Count returned once the script is exhausted
    pub default_count: Arc<Mutex<u32>>,

    /// Meetings requested, in order
    pub requested: Arc<Mutex<Vec<MeetingId>>>,
}

impl MockCountService {
    pub fn new(default_count: u32) -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            default_count: Arc::new(Mutex::new(default_count)),
            requested: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue a result for the next request
    pub fn push_result(&self, result: HostResult<u32>) {
        self.script.lock().unwrap().push_back(result);
    }

    /// Queue `n` failures with the given HTTP status
    pub fn push_failures(&self, status: u16, n: usize) {
        let mut script = self.script.lock().unwrap();
        for _ in 0..n {
            script.push_back(Err(HostError::from_status(status, "mock failure")));
        }
    }

    pub fn set_default_count(&self, count: u32) {
        *self.default_count.lock().unwrap() = count;
    }

    pub fn request_count(&self) -> usize {
        self.requested.lock().unwrap().len()
    }
}

impl Default for MockCountService {
    fn default() -> Self {
        Self::new(1)
    }
}

#[async_trait]
impl CountService for MockCountService {
    async fn participant_count(
        &self,
        _token: &AccessToken,
        meeting_id: &MeetingId,
    ) -> HostResult<u32> {
        self.requested.lock().unwrap().push(meeting_id.clone());

        if let Some(result) = self.script.lock().unwrap().pop_front() {
            return result;
        }

        Ok(*self.default_count.lock().unwrap())
    }
}

/// Mock conferencing host
pub struct MockMeetingHost {
    /// Whether `wait_ready` succeeds immediately
    pub ready: Arc<Mutex<bool>>,

    /// Whether the host is reachable in degraded mode
    pub available: Arc<Mutex<bool>>,

    pub launch_parameter: Arc<Mutex<Option<String>>>,

    /// Result of `meeting_info`
    pub meeting: Arc<Mutex<HostResult<MeetingInfo>>>,
}

impl MockMeetingHost {
    /// A ready host in `meeting_id`, with a valid launch parameter
    pub fn new(meeting_id: &str) -> Self {
        Self {
            ready: Arc::new(Mutex::new(true)),
            available: Arc::new(Mutex::new(true)),
            // ["a","b","c","12345"]
            launch_parameter: Arc::new(Mutex::new(Some(
                "WyJhIiwiYiIsImMiLCIxMjM0NSJd".to_string(),
            ))),
            meeting: Arc::new(Mutex::new(Ok(MeetingInfo {
                meeting_id: MeetingId::new(meeting_id),
            }))),
        }
    }

    pub fn set_meeting(&self, meeting_id: &str) {
        *self.meeting.lock().unwrap() = Ok(MeetingInfo {
            meeting_id: MeetingId::new(meeting_id),
        });
    }

    pub fn set_meeting_error(&self, error: HostError) {
        *self.meeting.lock().unwrap() = Err(error);
    }

    pub fn set_ready(&self, ready: bool) {
        *self.ready.lock().unwrap() = ready;
    }

    pub fn set_available(&self, available: bool) {
        *self.available.lock().unwrap() = available;
    }
}

#[async_trait]
impl MeetingHost for MockMeetingHost {
    async fn wait_ready(&self, timeout: Duration) -> bool {
        if *self.ready.lock().unwrap() {
            return true;
        }
        tokio::time::sleep(timeout).await;
        false
    }

    fn is_available(&self) -> bool {
        *self.available.lock().unwrap()
    }

    fn launch_parameter(&self) -> Option<String> {
        self.launch_parameter.lock().unwrap().clone()
    }

    async fn meeting_info(&self, _project: &CloudProjectNumber) -> HostResult<MeetingInfo> {
        self.meeting.lock().unwrap().clone()
    }
}
