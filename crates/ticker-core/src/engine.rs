//! Core ticker engine

use chrono::{DateTime, Local};
use std::sync::Arc;
use ticker_api::{
    API_VERSION, AuthMessage, AuthPhase, ErrorKind, StatusMessage, TickerStateSnapshot,
};
use ticker_config::Policy;
use ticker_host_api::HostError;
use ticker_store::{AuditEventType, PersistedSnapshot, Store};
use ticker_util::{AccessToken, MeetingId, MonotonicInstant, Result, SessionId, TickerError};
use tracing::{debug, info, warn};

use crate::{
    AccumulationState, CoreEvent, HandshakeResult, HandshakeTicket, LinkChange, MeetingContext,
    Persistence, PollHealth, PollOutcome, PollRequest, PollStart, PollTicket, Poller, Session,
    SessionManager, Ticker, TokenApplied, backoff_from_policy, render,
};

const STATUS_IDLE: &str = "Ready - click authorize to begin";
const STATUS_LINKED: &str = "Connected to meeting - starting tracking...";
const STATUS_TOKEN_FAILED: &str = "Failed to get access token";
const STATUS_HALTED: &str = "Polling stopped due to errors - using last known count";

/// The ticker engine.
///
/// Single owned aggregate of session, meeting, accumulation, ticker and
/// poller state. All mutation happens through `&mut self` on the service
/// loop; external work is requested through [`CoreEvent`]s and its results
/// are fed back in.
pub struct TickerEngine {
    policy: Policy,
    persistence: Persistence,
    session: SessionManager,
    accumulation: AccumulationState,
    ticker: Ticker,
    poller: Poller,
    handshake_generation: u64,
    handshake_pending: bool,
    status: Option<StatusMessage>,
    error_message: Option<String>,
    fatal_error: Option<ErrorKind>,
}

impl TickerEngine {
    /// Create a new engine with fresh state
    pub fn new(policy: Policy, store: Arc<dyn Store>) -> Self {
        info!(
            poll_interval_secs = policy.polling.interval.as_secs(),
            max_retries = policy.polling.max_retries,
            "Ticker engine initialized"
        );

        let persistence = Persistence::new(store);
        persistence.audit(AuditEventType::ServiceStarted);

        let poller = Poller::new(
            backoff_from_policy(&policy.polling),
            policy.polling.max_retries,
        );

        Self {
            policy,
            persistence,
            session: SessionManager::new(),
            accumulation: AccumulationState::new(),
            ticker: Ticker::new(),
            poller,
            handshake_generation: 0,
            handshake_pending: false,
            status: Some(StatusMessage::info(STATUS_IDLE)),
            error_message: None,
            fatal_error: None,
        }
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Load persisted state. Requests a handshake when a token was held.
    pub fn restore(&mut self) -> Vec<CoreEvent> {
        let Some(snapshot) = self.persistence.load() else {
            return Vec::new();
        };

        self.session = SessionManager::restored(
            Session {
                session_id: snapshot.session_id.clone(),
                access_token: snapshot.access_token.clone(),
                authenticated: snapshot.is_authenticated,
            },
            MeetingContext {
                meeting_id: snapshot.meeting_id.clone(),
            },
        );
        self.accumulation = AccumulationState::restored(
            snapshot.total_person_seconds(),
            snapshot.start_time(),
            snapshot.current_participant_count,
            snapshot.last_tick(),
        );

        info!(
            phase = %self.phase(),
            meeting_id = ?snapshot.meeting_id,
            total_person_seconds = self.accumulation.total_person_seconds(),
            was_tracking = snapshot.is_tracking,
            "Restored persisted state"
        );

        if self.session.can_link() {
            self.begin_handshake()
        } else {
            Vec::new()
        }
    }

    // Authorization

    /// Start authorization; yields the URL to open
    pub fn begin_authorization(&mut self) -> Result<Vec<CoreEvent>> {
        let from = self.phase();
        self.session.begin_authorization()?;
        self.set_status(StatusMessage::info("Starting authentication..."));

        let mut events = Vec::new();
        self.push_phase_change(from, &mut events);
        events.push(CoreEvent::AuthorizationRequested {
            auth_url: self.policy.service.auth_url(),
        });
        Ok(events)
    }

    /// Authorization window closed without completing
    pub fn auth_cancelled(&mut self) -> Result<Vec<CoreEvent>> {
        let from = self.phase();
        self.session.cancel_authorization()?;
        self.set_status(StatusMessage::warning("Authentication cancelled"));

        let mut events = Vec::new();
        self.push_phase_change(from, &mut events);
        Ok(events)
    }

    /// Message from the authorization window
    pub fn auth_message(&mut self, message: AuthMessage) -> Vec<CoreEvent> {
        let from = self.phase();
        let mut events = Vec::new();

        match message {
            AuthMessage::AuthSuccess { session_id } => {
                let session_id = self.session.receive_callback(session_id);
                self.set_status(StatusMessage::success(
                    "Authentication successful! Getting access token...",
                ));
                self.push_phase_change(from, &mut events);
                events.push(CoreEvent::TokenExchangeRequested { session_id });
            }
        }

        self.save();
        events
    }

    /// Result of exchanging `session_id` for a bearer token
    pub fn token_exchanged(
        &mut self,
        session_id: &SessionId,
        result: std::result::Result<AccessToken, HostError>,
        now_mono: MonotonicInstant,
    ) -> Vec<CoreEvent> {
        let from = self.phase();
        let mut events = Vec::new();

        match result {
            Ok(token) => {
                let Some(applied) = self.session.token_granted(session_id, token) else {
                    return events;
                };

                info!(session_id = %session_id, "Access token obtained");
                self.persistence.audit(AuditEventType::AuthorizationSucceeded);
                self.clear_error();
                self.set_status(StatusMessage::success("Ready to start tracking!"));

                match applied {
                    TokenApplied::Authenticated => {
                        self.push_phase_change(from, &mut events);
                        events.extend(self.begin_handshake());
                    }
                    TokenApplied::Refreshed => {
                        // New token, same meeting: keep ticking, recreate the poller
                        if let Some(meeting_id) = self.session.meeting_id().cloned() {
                            if self.ticker.is_running() {
                                self.poller.start(meeting_id, now_mono);
                            }
                        }
                    }
                }
            }
            Err(e) => {
                if !self.session.token_failed(session_id) {
                    return events;
                }

                warn!(session_id = %session_id, error = %e, "Token exchange failed");
                self.persistence.audit(AuditEventType::AuthorizationFailed {
                    reason: e.to_string(),
                });

                if self.phase() == AuthPhase::Error {
                    self.fail(
                        ErrorKind::TokenExchangeFailed,
                        STATUS_TOKEN_FAILED.to_string(),
                        &mut events,
                    );
                } else {
                    self.set_status(StatusMessage::error(STATUS_TOKEN_FAILED));
                }
                self.push_phase_change(from, &mut events);
            }
        }

        self.save();
        events
    }

    // Meeting handshake

    fn begin_handshake(&mut self) -> Vec<CoreEvent> {
        self.handshake_generation += 1;
        self.handshake_pending = true;
        self.set_status(StatusMessage::info("Waiting for Meet SDK..."));

        debug!(generation = self.handshake_generation, "Handshake requested");
        vec![CoreEvent::HandshakeRequested {
            ticket: HandshakeTicket {
                generation: self.handshake_generation,
            },
        }]
    }

    /// Run the handshake again, e.g. because the panel announced a meeting
    pub fn request_handshake(&mut self) -> Result<Vec<CoreEvent>> {
        if !self.session.is_authenticated() {
            return Err(TickerError::NotAuthenticated);
        }
        if !self.session.can_link() {
            return Err(TickerError::invalid_transition(self.phase(), "link meeting"));
        }
        Ok(self.begin_handshake())
    }

    /// Result of the handshake issued under `ticket`
    pub fn handshake_completed(
        &mut self,
        ticket: HandshakeTicket,
        result: HandshakeResult<MeetingId>,
        now_mono: MonotonicInstant,
    ) -> Vec<CoreEvent> {
        if !self.handshake_pending || ticket.generation != self.handshake_generation {
            debug!(
                generation = ticket.generation,
                current = self.handshake_generation,
                "Discarding stale handshake result"
            );
            return Vec::new();
        }
        self.handshake_pending = false;

        let from = self.phase();
        let mut events = Vec::new();

        match result {
            Ok(meeting_id) => match self.session.link(meeting_id.clone()) {
                Ok(change) => self.on_linked(change, meeting_id, now_mono, &mut events),
                Err(e) => debug!(error = %e, "Handshake result no longer applies"),
            },
            Err(e) => self.fail(
                e.kind(),
                format!("Failed to connect to Meet: {}", e),
                &mut events,
            ),
        }

        self.push_phase_change(from, &mut events);
        self.save();
        events
    }

    fn on_linked(
        &mut self,
        change: LinkChange,
        meeting_id: MeetingId,
        now_mono: MonotonicInstant,
        events: &mut Vec<CoreEvent>,
    ) {
        self.clear_error();

        if let LinkChange::Changed { previous } = &change {
            let discarded = self.accumulation.total_person_seconds();
            info!(
                previous = %previous,
                current = %meeting_id,
                discarded_person_seconds = discarded,
                "Meeting changed, resetting accumulation"
            );
            self.persistence.audit(AuditEventType::MeetingChanged {
                previous: previous.clone(),
                current: meeting_id.clone(),
                discarded_person_seconds: discarded,
            });

            self.accumulation.reset();
            // Fresh epoch for the new meeting
            self.ticker.stop();
            events.push(CoreEvent::AccumulationReset {
                discarded_person_seconds: discarded,
            });
        }

        if change != LinkChange::Same {
            events.push(CoreEvent::MeetingChanged {
                previous: change.previous().cloned(),
                current: meeting_id.clone(),
            });
        }

        self.persistence.audit(AuditEventType::MeetingLinked {
            meeting_id: meeting_id.clone(),
        });

        self.accumulation.floor_count();
        if self.ticker.start() {
            self.persistence.audit(AuditEventType::TrackingStarted {
                meeting_id: meeting_id.clone(),
            });
            events.push(CoreEvent::TrackingStarted {
                meeting_id: meeting_id.clone(),
            });
        }
        self.poller.start(meeting_id, now_mono);
        self.set_status(StatusMessage::success(STATUS_LINKED));
    }

    // Ticking and polling

    /// One tick period elapsed. Returns whether anything was accumulated.
    pub fn tick(&mut self, now: DateTime<Local>) -> bool {
        if !self.ticker.is_running() {
            return false;
        }
        self.accumulation.tick(now);
        self.save();
        true
    }

    /// When the next poll is due, if polling is scheduled
    pub fn next_poll_due(&self) -> Option<MonotonicInstant> {
        if self.ticker.is_running() {
            self.poller.next_due()
        } else {
            None
        }
    }

    /// Issue the due poll, if any.
    ///
    /// Without credentials no request is made; the count is raised to at
    /// least one and poll health is left alone.
    pub fn begin_poll(&mut self, now_mono: MonotonicInstant) -> Option<PollRequest> {
        if !self.ticker.is_running() || !self.poller.is_due(now_mono) {
            return None;
        }

        match self.poller.begin(self.session.token(), now_mono) {
            PollStart::Request(request) => Some(request),
            PollStart::CredentialsMissing => {
                self.accumulation.floor_count();
                self.set_status(StatusMessage::info("Waiting for credentials..."));
                None
            }
        }
    }

    /// Result of the poll issued under `ticket`
    pub fn apply_poll_result(
        &mut self,
        ticket: &PollTicket,
        result: std::result::Result<u32, HostError>,
        now: DateTime<Local>,
        now_mono: MonotonicInstant,
    ) -> Vec<CoreEvent> {
        let classified = match result {
            Ok(count) => Ok(count),
            Err(e) => {
                debug!(error = %e, "Participant request failed");
                Err(e.poll_error_kind())
            }
        };

        let mut events = Vec::new();
        match self.poller.complete(ticket, classified, now_mono) {
            PollOutcome::Stale => {}
            PollOutcome::Succeeded { count } => {
                if self.accumulation.observe_count(count, now) {
                    info!(count, "Participant count changed");
                    events.push(CoreEvent::ParticipantCountChanged { count });
                }
                self.set_status(StatusMessage::info(format!(
                    "Last updated: {}",
                    ticker_util::format_clock_time(&now)
                )));
                self.save();
            }
            PollOutcome::Failed {
                kind,
                attempt,
                halted,
            } => {
                if halted {
                    self.persistence.audit(AuditEventType::PollingHalted {
                        meeting_id: self.session.meeting_id().cloned(),
                        consecutive_errors: attempt,
                        last_error: Some(kind),
                    });
                    self.set_status(StatusMessage::error(STATUS_HALTED));
                    events.push(CoreEvent::PollingHalted {
                        consecutive_errors: attempt,
                    });
                } else {
                    self.set_status(poll_failure_status(kind, attempt));
                }
            }
        }
        events
    }

    // Explicit user actions

    /// Leave the error state, or recreate a halted poller while linked
    pub fn retry(&mut self, now_mono: MonotonicInstant) -> Result<Vec<CoreEvent>> {
        let from = self.phase();
        let mut events = Vec::new();

        match from {
            AuthPhase::Error => {
                self.clear_error();
                match self.session.retry()? {
                    AuthPhase::Authenticated => {
                        self.push_phase_change(from, &mut events);
                        events.extend(self.begin_handshake());
                    }
                    _ => {
                        self.set_status(StatusMessage::info(STATUS_IDLE));
                        self.push_phase_change(from, &mut events);
                    }
                }
            }
            AuthPhase::MeetingLinked => {
                if let Some(meeting_id) = self.session.meeting_id().cloned() {
                    info!(meeting_id = %meeting_id, "Retry: recreating participant poller");
                    self.poller.start(meeting_id, now_mono);
                    self.set_status(StatusMessage::success(STATUS_LINKED));
                }
            }
            phase => return Err(TickerError::invalid_transition(phase, "retry")),
        }

        self.save();
        Ok(events)
    }

    /// Clear the session and stop tracking; totals and meeting are kept
    pub fn logout(&mut self) -> Vec<CoreEvent> {
        let from = self.phase();
        let mut events = Vec::new();

        self.stop_timers(&mut events);
        self.handshake_pending = false;
        self.session.logout();
        self.clear_error();
        self.persistence.audit(AuditEventType::LoggedOut);
        self.set_status(StatusMessage::info(STATUS_IDLE));
        info!("Logged out");

        self.push_phase_change(from, &mut events);
        self.save();
        events
    }

    /// Resume ticking and polling for the linked meeting
    pub fn start_tracking(&mut self, now_mono: MonotonicInstant) -> Result<Vec<CoreEvent>> {
        let meeting_id = match (self.phase(), self.session.meeting_id()) {
            (AuthPhase::MeetingLinked, Some(id)) => id.clone(),
            _ => return Err(TickerError::NoMeetingLinked),
        };

        let mut events = Vec::new();
        if self.ticker.start() {
            self.poller.start(meeting_id.clone(), now_mono);
            self.persistence.audit(AuditEventType::TrackingStarted {
                meeting_id: meeting_id.clone(),
            });
            self.set_status(StatusMessage::success(STATUS_LINKED));
            events.push(CoreEvent::TrackingStarted { meeting_id });
            self.save();
        }
        Ok(events)
    }

    /// Stop ticking and polling. Safe when not tracking.
    pub fn stop_tracking(&mut self) -> Vec<CoreEvent> {
        let mut events = Vec::new();
        if self.stop_timers(&mut events) {
            self.set_status(StatusMessage::info("Tracking stopped"));
            self.save();
        }
        events
    }

    /// Final save before the service exits
    pub fn shutdown(&mut self) {
        self.save();
        self.persistence.audit(AuditEventType::ServiceStopped);
        info!(
            total_person_seconds = self.accumulation.total_person_seconds(),
            "Ticker engine shut down"
        );
    }

    // Internals

    fn stop_timers(&mut self, events: &mut Vec<CoreEvent>) -> bool {
        self.poller.stop();
        if !self.ticker.stop() {
            return false;
        }

        let total = self.accumulation.total_person_seconds();
        info!(total_person_seconds = total, "Tracking stopped");
        self.persistence.audit(AuditEventType::TrackingStopped {
            meeting_id: self.session.meeting_id().cloned(),
            total_person_seconds: total,
        });
        events.push(CoreEvent::TrackingStopped {
            total_person_seconds: total,
        });
        true
    }

    fn fail(&mut self, kind: ErrorKind, message: String, events: &mut Vec<CoreEvent>) {
        warn!(?kind, message = %message, "Entering error state");
        self.stop_timers(events);
        self.session.fail();
        self.fatal_error = Some(kind);
        self.set_status(StatusMessage::error(message.clone()));
        self.error_message = Some(message);
    }

    fn clear_error(&mut self) {
        self.error_message = None;
        self.fatal_error = None;
    }

    fn set_status(&mut self, status: StatusMessage) {
        debug!(level = ?status.level, text = %status.text, "Status");
        self.status = Some(status);
    }

    fn push_phase_change(&self, from: AuthPhase, events: &mut Vec<CoreEvent>) {
        let to = self.phase();
        if from != to {
            events.push(CoreEvent::PhaseChanged { from, to });
        }
    }

    fn save(&self) {
        self.persistence.save(&self.to_snapshot());
    }

    /// Durable projection of session, meeting and accumulation state
    pub fn to_snapshot(&self) -> PersistedSnapshot {
        let session = self.session.session();
        let mut snapshot = PersistedSnapshot {
            session_id: session.session_id.clone(),
            access_token: session.access_token.clone(),
            is_authenticated: session.authenticated,
            is_tracking: self.ticker.is_running(),
            start_time_ms: None,
            total_person_seconds: self.accumulation.total_person_seconds() as f64,
            current_participant_count: self.accumulation.current_participant_count(),
            meeting_id: self.session.meeting_id().cloned(),
            last_tick_ms: None,
        };
        snapshot.set_start_time(self.accumulation.start_time());
        snapshot.set_last_tick(self.accumulation.last_tick());
        snapshot
    }

    /// Full state for clients
    pub fn state_snapshot(&self, now: DateTime<Local>) -> TickerStateSnapshot {
        TickerStateSnapshot {
            api_version: API_VERSION,
            phase: self.phase(),
            tracking: self.is_tracking(),
            meeting_id: self.meeting_id().cloned(),
            total_person_seconds: self.accumulation.total_person_seconds(),
            participant_count: self.accumulation.current_participant_count(),
            start_time: self.accumulation.start_time(),
            last_participant_update: self.accumulation.last_participant_update(),
            consecutive_errors: self.poller.health().consecutive_errors,
            polling_halted: self.poller.is_halted(),
            last_error: self.fatal_error.or(self.poller.health().last_error),
            view: render(self, now),
        }
    }

    // Accessors

    pub fn phase(&self) -> AuthPhase {
        self.session.phase()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    pub fn is_tracking(&self) -> bool {
        self.ticker.is_running()
    }

    /// Changes whenever the tick timer must be recreated
    pub fn ticker_epoch(&self) -> u64 {
        self.ticker.epoch()
    }

    /// A handshake was issued and its result has not arrived yet
    pub fn is_handshake_pending(&self) -> bool {
        self.handshake_pending
    }

    pub fn accumulation(&self) -> &AccumulationState {
        &self.accumulation
    }

    pub fn poll_health(&self) -> &PollHealth {
        self.poller.health()
    }

    pub fn is_polling_halted(&self) -> bool {
        self.poller.is_halted()
    }

    pub fn meeting_id(&self) -> Option<&MeetingId> {
        self.session.meeting_id()
    }

    pub fn status(&self) -> Option<&StatusMessage> {
        self.status.as_ref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn store_healthy(&self) -> bool {
        self.persistence.is_healthy()
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        self.persistence.store()
    }
}

fn poll_failure_status(kind: ErrorKind, attempt: u32) -> StatusMessage {
    match kind {
        ErrorKind::AuthExpired => {
            StatusMessage::error("Authentication expired - please re-authenticate")
        }
        ErrorKind::PermissionDenied => StatusMessage::error("Access denied - check permissions"),
        ErrorKind::MeetingNotFound => StatusMessage::error("Meeting not found"),
        _ => StatusMessage::warning(format!("API error (attempt {})", attempt)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HandshakeError;
    use chrono::TimeZone;
    use std::time::Duration;
    use ticker_api::{CostUnit, PresentationMode, StatusLevel};
    use ticker_store::SqliteStore;

    fn at(secs: i64) -> DateTime<Local> {
        Local.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn make_test_store() -> Arc<dyn Store> {
        Arc::new(SqliteStore::in_memory().unwrap())
    }

    fn make_test_engine() -> TickerEngine {
        TickerEngine::new(Policy::default(), make_test_store())
    }

    fn handshake_ticket(events: &[CoreEvent]) -> HandshakeTicket {
        events
            .iter()
            .find_map(|e| match e {
                CoreEvent::HandshakeRequested { ticket } => Some(*ticket),
                _ => None,
            })
            .expect("handshake requested")
    }

    fn authenticate(engine: &mut TickerEngine, mono: MonotonicInstant) -> Vec<CoreEvent> {
        engine.begin_authorization().unwrap();
        engine.auth_message(AuthMessage::AuthSuccess {
            session_id: SessionId::new("s1"),
        });
        engine.token_exchanged(&SessionId::new("s1"), Ok(AccessToken::new("tok")), mono)
    }

    fn link(engine: &mut TickerEngine, meeting: &str, mono: MonotonicInstant) -> Vec<CoreEvent> {
        if !engine.is_authenticated() {
            authenticate(engine, mono);
        }
        let ticket = handshake_ticket(&engine.request_handshake().unwrap());
        engine.handshake_completed(ticket, Ok(MeetingId::new(meeting)), mono)
    }

    /// Run the next scheduled poll with `result`
    fn poll(
        engine: &mut TickerEngine,
        result: std::result::Result<u32, HostError>,
        now: DateTime<Local>,
    ) -> Vec<CoreEvent> {
        let due = engine.next_poll_due().expect("poll scheduled");
        let request = engine.begin_poll(due).expect("poll issued");
        engine.apply_poll_result(&request.ticket, result, now, due)
    }

    #[test]
    fn test_authorization_flow() {
        let mut engine = make_test_engine();
        let mono = MonotonicInstant::now();
        assert_eq!(engine.phase(), AuthPhase::Unauthenticated);
        assert_eq!(engine.status().unwrap().text, STATUS_IDLE);

        let events = engine.begin_authorization().unwrap();
        assert!(events.contains(&CoreEvent::AuthorizationRequested {
            auth_url: "http://localhost:3000/auth".into()
        }));
        assert_eq!(engine.phase(), AuthPhase::Authenticating);

        let events = engine.auth_message(AuthMessage::AuthSuccess {
            session_id: SessionId::new("s1"),
        });
        assert_eq!(
            events,
            vec![CoreEvent::TokenExchangeRequested {
                session_id: SessionId::new("s1")
            }]
        );

        let events =
            engine.token_exchanged(&SessionId::new("s1"), Ok(AccessToken::new("tok")), mono);
        assert_eq!(engine.phase(), AuthPhase::Authenticated);
        let ticket = handshake_ticket(&events);

        let events = engine.handshake_completed(ticket, Ok(MeetingId::new("abc")), mono);
        assert_eq!(engine.phase(), AuthPhase::MeetingLinked);
        assert!(engine.is_tracking());
        assert!(events.contains(&CoreEvent::MeetingChanged {
            previous: None,
            current: MeetingId::new("abc")
        }));
        assert_eq!(engine.status().unwrap().text, STATUS_LINKED);

        // Count floors at one until the first poll answers
        assert_eq!(engine.accumulation().current_participant_count(), 1);
        assert_eq!(engine.next_poll_due(), Some(mono));
    }

    #[test]
    fn test_two_participants_for_ninety_seconds() {
        let mut engine = make_test_engine();
        link(&mut engine, "abc", MonotonicInstant::now());
        poll(&mut engine, Ok(2), at(0));

        for i in 1..=90 {
            assert!(engine.tick(at(i)));
        }

        assert_eq!(engine.accumulation().total_person_seconds(), 180);
        let view = render(&engine, at(90));
        assert_eq!(view.cost_value, "3");
        assert_eq!(view.cost_unit, CostUnit::PersonMinutes);
    }

    #[test]
    fn test_zero_participants_stay_at_zero() {
        let mut engine = make_test_engine();
        link(&mut engine, "abc", MonotonicInstant::now());
        poll(&mut engine, Ok(0), at(0));

        for i in 1..=20 {
            engine.tick(at(i));
        }

        let view = render(&engine, at(20));
        assert_eq!(view.cost_value, "0");
        assert_eq!(view.cost_unit, CostUnit::PersonSeconds);
        assert_eq!(view.participants, "0 participants");
    }

    #[test]
    fn test_meeting_change_resets() {
        let mut engine = make_test_engine();
        let mono = MonotonicInstant::now();
        link(&mut engine, "abc", mono);
        poll(&mut engine, Ok(3), at(0));
        for i in 1..=10 {
            engine.tick(at(i));
        }
        assert_eq!(engine.accumulation().total_person_seconds(), 30);
        let epoch = engine.ticker_epoch();

        let events = link(&mut engine, "xyz", mono);
        assert!(events.contains(&CoreEvent::AccumulationReset {
            discarded_person_seconds: 30
        }));
        assert!(events.contains(&CoreEvent::MeetingChanged {
            previous: Some(MeetingId::new("abc")),
            current: MeetingId::new("xyz")
        }));
        assert_eq!(engine.accumulation().total_person_seconds(), 0);
        assert!(engine.accumulation().start_time().is_none());
        assert!(engine.is_tracking());
        assert!(engine.ticker_epoch() > epoch);

        engine.tick(at(100));
        assert_eq!(engine.accumulation().start_time(), Some(at(100)));

        let audits = engine.store().get_recent_audits(20).unwrap();
        assert!(audits.iter().any(|a| matches!(
            &a.event,
            AuditEventType::MeetingChanged { discarded_person_seconds: 30, .. }
        )));
    }

    #[test]
    fn test_same_meeting_never_resets() {
        let mut engine = make_test_engine();
        let mono = MonotonicInstant::now();
        link(&mut engine, "abc", mono);
        poll(&mut engine, Ok(2), at(0));
        engine.tick(at(1));
        let epoch = engine.ticker_epoch();

        let events = link(&mut engine, "abc", mono);
        assert!(events.is_empty());
        assert_eq!(engine.accumulation().total_person_seconds(), 2);
        assert_eq!(engine.ticker_epoch(), epoch);
    }

    #[test]
    fn test_poll_failures_halt_and_freeze_count() {
        let mut engine = make_test_engine();
        link(&mut engine, "abc", MonotonicInstant::now());
        poll(&mut engine, Ok(4), at(0));

        poll(&mut engine, Err(HostError::from_status(500, "boom")), at(5));
        assert_eq!(
            engine.status().unwrap(),
            &StatusMessage::warning("API error (attempt 1)")
        );
        poll(&mut engine, Err(HostError::from_status(500, "boom")), at(10));
        assert!(!engine.is_polling_halted());
        assert_eq!(engine.accumulation().current_participant_count(), 4);

        let events = poll(&mut engine, Err(HostError::from_status(500, "boom")), at(15));
        assert_eq!(
            events,
            vec![CoreEvent::PollingHalted {
                consecutive_errors: 3
            }]
        );
        assert!(engine.is_polling_halted());
        assert!(engine.next_poll_due().is_none());
        assert_eq!(engine.status().unwrap().text, STATUS_HALTED);

        // Ticking continues on the frozen count
        let before = engine.accumulation().total_person_seconds();
        engine.tick(at(16));
        assert_eq!(engine.accumulation().total_person_seconds(), before + 4);

        // Retry recreates the poller
        engine.retry(MonotonicInstant::now()).unwrap();
        assert!(!engine.is_polling_halted());
        assert_eq!(engine.poll_health().consecutive_errors, 0);
        assert!(engine.next_poll_due().is_some());
    }

    #[test]
    fn test_success_resets_error_counter() {
        let mut engine = make_test_engine();
        link(&mut engine, "abc", MonotonicInstant::now());

        poll(&mut engine, Err(HostError::Network("down".into())), at(0));
        poll(&mut engine, Err(HostError::Network("down".into())), at(5));
        assert_eq!(engine.poll_health().consecutive_errors, 2);

        poll(&mut engine, Ok(5), at(10));
        assert_eq!(engine.poll_health().consecutive_errors, 0);
        assert_eq!(engine.status().unwrap().level, StatusLevel::Info);
        assert!(engine.status().unwrap().text.starts_with("Last updated: "));
    }

    #[test]
    fn test_poll_status_per_error_class() {
        let cases = [
            (401u16, "Authentication expired - please re-authenticate"),
            (403, "Access denied - check permissions"),
            (404, "Meeting not found"),
        ];

        for (status, text) in cases {
            let mut engine = make_test_engine();
            link(&mut engine, "abc", MonotonicInstant::now());
            poll(&mut engine, Err(HostError::from_status(status, "x")), at(0));
            assert_eq!(engine.status().unwrap(), &StatusMessage::error(text));
        }
    }

    #[test]
    fn test_stale_poll_result_discarded() {
        let mut engine = make_test_engine();
        let mono = MonotonicInstant::now();
        link(&mut engine, "abc", mono);
        let request = engine.begin_poll(mono).unwrap();

        link(&mut engine, "xyz", mono);
        let events = engine.apply_poll_result(&request.ticket, Ok(9), at(0), mono);
        assert!(events.is_empty());
        assert_eq!(engine.accumulation().current_participant_count(), 1);
    }

    #[test]
    fn test_token_failure_and_retry() {
        let mut engine = make_test_engine();
        engine.begin_authorization().unwrap();
        engine.auth_message(AuthMessage::AuthSuccess {
            session_id: SessionId::new("s1"),
        });

        engine.token_exchanged(
            &SessionId::new("s1"),
            Err(HostError::NotFound("Session not found".into())),
            MonotonicInstant::now(),
        );
        assert_eq!(engine.phase(), AuthPhase::Error);
        assert_eq!(engine.error_message(), Some(STATUS_TOKEN_FAILED));

        let events = engine.retry(MonotonicInstant::now()).unwrap();
        assert_eq!(engine.phase(), AuthPhase::Unauthenticated);
        assert!(engine.error_message().is_none());
        assert!(events.contains(&CoreEvent::PhaseChanged {
            from: AuthPhase::Error,
            to: AuthPhase::Unauthenticated
        }));
    }

    #[test]
    fn test_handshake_failure_and_retry() {
        let mut engine = make_test_engine();
        let mono = MonotonicInstant::now();
        let ticket = handshake_ticket(&authenticate(&mut engine, mono));

        engine.handshake_completed(
            ticket,
            Err(HandshakeError::Timeout { waited_ms: 10_000 }),
            mono,
        );
        assert_eq!(engine.phase(), AuthPhase::Error);
        assert!(!engine.is_tracking());
        let view = render(&engine, at(0));
        assert_eq!(view.mode, PresentationMode::Error);
        assert_eq!(
            view.error_message.as_deref(),
            Some("Failed to connect to Meet: Meet add-ons SDK not ready after 10000 ms")
        );

        // Token still held, so retry goes straight to a new handshake
        let events = engine.retry(mono).unwrap();
        assert_eq!(engine.phase(), AuthPhase::Authenticated);
        let ticket = handshake_ticket(&events);
        engine.handshake_completed(ticket, Ok(MeetingId::new("abc")), mono);
        assert_eq!(engine.phase(), AuthPhase::MeetingLinked);
    }

    #[test]
    fn test_stale_handshake_discarded() {
        let mut engine = make_test_engine();
        let mono = MonotonicInstant::now();
        let first = handshake_ticket(&authenticate(&mut engine, mono));
        let second = handshake_ticket(&engine.request_handshake().unwrap());

        assert!(
            engine
                .handshake_completed(first, Ok(MeetingId::new("old")), mono)
                .is_empty()
        );
        assert_eq!(engine.phase(), AuthPhase::Authenticated);

        engine.handshake_completed(second, Ok(MeetingId::new("new")), mono);
        assert_eq!(engine.meeting_id(), Some(&MeetingId::new("new")));
    }

    #[test]
    fn test_handshake_requires_authentication() {
        let mut engine = make_test_engine();
        assert!(matches!(
            engine.request_handshake(),
            Err(TickerError::NotAuthenticated)
        ));
    }

    #[test]
    fn test_reauthentication_while_linked_keeps_ticking() {
        let mut engine = make_test_engine();
        let mono = MonotonicInstant::now();
        link(&mut engine, "abc", mono);
        poll(&mut engine, Ok(2), at(0));
        engine.tick(at(1));
        let epoch = engine.ticker_epoch();

        engine.begin_authorization().unwrap();
        assert_eq!(engine.phase(), AuthPhase::MeetingLinked);
        engine.auth_message(AuthMessage::AuthSuccess {
            session_id: SessionId::new("s2"),
        });
        let later = mono + Duration::from_secs(2);
        let events =
            engine.token_exchanged(&SessionId::new("s2"), Ok(AccessToken::new("tok2")), later);

        assert!(events.is_empty());
        assert_eq!(engine.phase(), AuthPhase::MeetingLinked);
        assert!(engine.is_tracking());
        assert_eq!(engine.ticker_epoch(), epoch);
        assert_eq!(engine.next_poll_due(), Some(later));

        let request = engine.begin_poll(later).unwrap();
        assert_eq!(request.token.as_str(), "tok2");
    }

    #[test]
    fn test_cancel_authorization() {
        let mut engine = make_test_engine();
        engine.begin_authorization().unwrap();
        engine.auth_cancelled().unwrap();

        assert_eq!(engine.phase(), AuthPhase::Unauthenticated);
        assert_eq!(
            engine.status().unwrap(),
            &StatusMessage::warning("Authentication cancelled")
        );
    }

    #[test]
    fn test_stop_and_start_tracking() {
        let mut engine = make_test_engine();
        let mono = MonotonicInstant::now();

        assert!(matches!(
            engine.start_tracking(mono),
            Err(TickerError::NoMeetingLinked)
        ));
        assert!(engine.stop_tracking().is_empty());

        link(&mut engine, "abc", mono);
        poll(&mut engine, Ok(2), at(0));
        engine.tick(at(1));

        let events = engine.stop_tracking();
        assert_eq!(
            events,
            vec![CoreEvent::TrackingStopped {
                total_person_seconds: 2
            }]
        );
        assert!(!engine.tick(at(2)));
        assert!(engine.next_poll_due().is_none());
        assert_eq!(render(&engine, at(50)).meeting_status, "Stopped");
        assert_eq!(engine.status().unwrap().text, "Tracking stopped");

        let events = engine.start_tracking(mono).unwrap();
        assert_eq!(
            events,
            vec![CoreEvent::TrackingStarted {
                meeting_id: MeetingId::new("abc")
            }]
        );
        assert!(engine.tick(at(3)));
        assert_eq!(engine.accumulation().total_person_seconds(), 4);
    }

    #[test]
    fn test_logout_keeps_totals() {
        let mut engine = make_test_engine();
        link(&mut engine, "abc", MonotonicInstant::now());
        poll(&mut engine, Ok(3), at(0));
        engine.tick(at(1));

        engine.logout();
        assert_eq!(engine.phase(), AuthPhase::Unauthenticated);
        assert!(!engine.is_tracking());
        assert!(!engine.is_authenticated());
        assert_eq!(engine.accumulation().total_person_seconds(), 3);
        assert_eq!(engine.meeting_id(), Some(&MeetingId::new("abc")));

        let snapshot = engine.to_snapshot();
        assert!(snapshot.access_token.is_none());
        assert!(!snapshot.is_tracking);
    }

    #[test]
    fn test_restore_resumes_session() {
        let store = make_test_store();
        let mono = MonotonicInstant::now();

        {
            let mut engine = TickerEngine::new(Policy::default(), store.clone());
            link(&mut engine, "abc", mono);
            poll(&mut engine, Ok(2), at(0));
            for i in 1..=5 {
                engine.tick(at(i));
            }
            engine.shutdown();
        }

        let mut engine = TickerEngine::new(Policy::default(), store);
        let events = engine.restore();

        assert_eq!(engine.phase(), AuthPhase::Authenticated);
        assert_eq!(engine.accumulation().total_person_seconds(), 10);
        assert_eq!(engine.accumulation().start_time(), Some(at(1)));
        assert_eq!(engine.accumulation().current_participant_count(), 2);
        assert_eq!(engine.meeting_id(), Some(&MeetingId::new("abc")));
        assert!(!engine.is_tracking());

        // Relinking the same meeting continues the total
        let ticket = handshake_ticket(&events);
        engine.handshake_completed(ticket, Ok(MeetingId::new("abc")), mono);
        engine.tick(at(6));
        assert_eq!(engine.accumulation().total_person_seconds(), 12);
    }

    #[test]
    fn test_restore_keeps_sub_second_start_time() {
        let store = make_test_store();
        let started = Local.timestamp_nanos(1_700_000_000_123_456_789);

        let saved = {
            let mut engine = TickerEngine::new(Policy::default(), store.clone());
            link(&mut engine, "abc", MonotonicInstant::now());
            engine.tick(started);
            engine.tick(started + chrono::Duration::seconds(1));
            engine.shutdown();
            engine.accumulation().clone()
        };

        let mut engine = TickerEngine::new(Policy::default(), store);
        engine.restore();

        assert_eq!(engine.accumulation().start_time(), saved.start_time());
        assert_eq!(engine.accumulation().last_tick(), saved.last_tick());
        assert_eq!(
            engine.accumulation().start_time(),
            Local.timestamp_millis_opt(1_700_000_000_123).single()
        );
    }

    #[test]
    fn test_restore_without_snapshot() {
        let mut engine = make_test_engine();
        assert!(engine.restore().is_empty());
        assert_eq!(engine.phase(), AuthPhase::Unauthenticated);
    }

    #[test]
    fn test_state_snapshot() {
        let mut engine = make_test_engine();
        link(&mut engine, "abc", MonotonicInstant::now());
        poll(&mut engine, Err(HostError::from_status(404, "gone")), at(0));

        let state = engine.state_snapshot(at(0));
        assert_eq!(state.api_version, API_VERSION);
        assert_eq!(state.phase, AuthPhase::MeetingLinked);
        assert!(state.tracking);
        assert_eq!(state.consecutive_errors, 1);
        assert_eq!(state.last_error, Some(ErrorKind::MeetingNotFound));
        assert_eq!(state.view.mode, PresentationMode::Ticker);
    }
}
