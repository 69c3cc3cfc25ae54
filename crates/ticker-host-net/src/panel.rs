//! Panel bridge: the meeting host as seen from the service
//!
//! The add-on panel runs inside the conferencing host. When it loads it
//! announces its `meet_sdk` launch parameter and the meeting it is in; the
//! bridge holds the latest announcement and answers handshake queries from it.

use async_trait::async_trait;
use std::time::Duration;
use ticker_host_api::{HostError, HostResult, MeetingHost, MeetingInfo};
use ticker_util::{CloudProjectNumber, MeetingId};
use tokio::sync::watch;
use tracing::{debug, info};

/// What the panel reports when it becomes ready
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelAnnouncement {
    pub meet_sdk: Option<String>,
    pub meeting_id: MeetingId,
}

pub struct PanelBridge {
    tx: watch::Sender<Option<PanelAnnouncement>>,
    /// Launch parameter from configuration, used when the panel sends none
    fallback_meet_sdk: Option<String>,
}

impl PanelBridge {
    pub fn new(fallback_meet_sdk: Option<String>) -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            tx,
            fallback_meet_sdk,
        }
    }

    /// Record a panel announcement, waking any pending `wait_ready`
    pub fn announce(&self, announcement: PanelAnnouncement) {
        info!(meeting_id = %announcement.meeting_id, "Panel announced meeting");
        self.tx.send_replace(Some(announcement));
    }

    /// Latest announcement, if any
    pub fn current(&self) -> Option<PanelAnnouncement> {
        self.tx.borrow().clone()
    }
}

#[async_trait]
impl MeetingHost for PanelBridge {
    async fn wait_ready(&self, timeout: Duration) -> bool {
        let mut rx = self.tx.subscribe();
        match tokio::time::timeout(timeout, rx.wait_for(|a| a.is_some())).await {
            Ok(Ok(_)) => true,
            Ok(Err(_)) | Err(_) => {
                debug!(timeout_ms = timeout.as_millis() as u64, "Panel not ready");
                false
            }
        }
    }

    fn is_available(&self) -> bool {
        self.tx.borrow().is_some()
    }

    fn launch_parameter(&self) -> Option<String> {
        self.tx
            .borrow()
            .as_ref()
            .and_then(|a| a.meet_sdk.clone())
            .or_else(|| self.fallback_meet_sdk.clone())
    }

    async fn meeting_info(&self, project: &CloudProjectNumber) -> HostResult<MeetingInfo> {
        debug!(project = %project, "Creating add-on session");

        self.current()
            .map(|a| MeetingInfo {
                meeting_id: a.meeting_id,
            })
            .ok_or_else(|| {
                HostError::Unavailable("Could not get meeting information from Meet SDK".into())
            })
    }
}
