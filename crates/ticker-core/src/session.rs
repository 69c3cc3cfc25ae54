//! Session and meeting identity state machine

use ticker_api::AuthPhase;
use ticker_util::{AccessToken, MeetingId, Result, SessionId, TickerError};
use tracing::{debug, info, warn};

/// OAuth session. Lives from a successful token exchange until logout.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub session_id: Option<SessionId>,
    pub access_token: Option<AccessToken>,
    pub authenticated: bool,
}

impl Session {
    /// A usable bearer token, if authenticated
    pub fn token(&self) -> Option<&AccessToken> {
        if self.authenticated {
            self.access_token.as_ref()
        } else {
            None
        }
    }
}

/// The meeting the ticker is attributed to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MeetingContext {
    pub meeting_id: Option<MeetingId>,
}

/// How a handshake result relates to the current meeting
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkChange {
    /// No meeting was known before
    First,
    /// Same meeting as before; never resets
    Same,
    /// A different meeting; accumulation must be reset
    Changed { previous: MeetingId },
}

impl LinkChange {
    pub fn previous(&self) -> Option<&MeetingId> {
        match self {
            LinkChange::Changed { previous } => Some(previous),
            _ => None,
        }
    }
}

/// What a token-exchange result did to the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenApplied {
    /// First token; a handshake should follow
    Authenticated,
    /// Token replaced while linked; the meeting stays linked
    Refreshed,
}

/// Owns the phase, the session and the meeting context.
///
/// Transitions:
/// - Unauthenticated/Error -> Authenticating on begin_authorization
/// - Authenticating -> Authenticated on token success, -> Error on failure
/// - Authenticated/MeetingLinked -> MeetingLinked on handshake
/// - any -> Error on handshake failure
/// - Error -> Authenticated or Unauthenticated on retry
/// - any -> Unauthenticated on logout
#[derive(Debug, Default)]
pub struct SessionManager {
    phase: AuthPhase,
    session: Session,
    meeting: MeetingContext,
    /// Session id whose token exchange is outstanding
    pending_exchange: Option<SessionId>,
    /// Authorization started while already authenticated
    reauthorizing: bool,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted values; authenticated only if a token is held
    pub fn restored(session: Session, meeting: MeetingContext) -> Self {
        let mut session = session;
        if session.access_token.is_none() {
            session.authenticated = false;
        }
        let phase = if session.authenticated {
            AuthPhase::Authenticated
        } else {
            AuthPhase::Unauthenticated
        };

        Self {
            phase,
            session,
            meeting,
            pending_exchange: None,
            reauthorizing: false,
        }
    }

    fn set_phase(&mut self, to: AuthPhase) {
        if self.phase != to {
            info!(from = %self.phase, to = %to, "Phase changed");
            self.phase = to;
        }
    }

    /// User asked to authorize
    pub fn begin_authorization(&mut self) -> Result<()> {
        match self.phase {
            AuthPhase::Unauthenticated | AuthPhase::Error => {
                self.set_phase(AuthPhase::Authenticating);
            }
            AuthPhase::Authenticating => {
                debug!("Authorization already in progress");
            }
            AuthPhase::Authenticated | AuthPhase::MeetingLinked => {
                info!(phase = %self.phase, "Re-authorization started");
                self.reauthorizing = true;
            }
        }
        Ok(())
    }

    /// The authorization window was closed without completing
    pub fn cancel_authorization(&mut self) -> Result<()> {
        match self.phase {
            AuthPhase::Authenticating => {
                let to = if self.session.token().is_some() {
                    AuthPhase::Authenticated
                } else {
                    AuthPhase::Unauthenticated
                };
                self.set_phase(to);
                Ok(())
            }
            AuthPhase::Authenticated | AuthPhase::MeetingLinked if self.reauthorizing => {
                self.reauthorizing = false;
                Ok(())
            }
            phase => Err(TickerError::invalid_transition(phase, "cancel authorization")),
        }
    }

    /// Authorization callback delivered a session id.
    ///
    /// Accepted in any phase; the caller exchanges it for a token.
    pub fn receive_callback(&mut self, session_id: SessionId) -> SessionId {
        info!(session_id = %session_id, "Authorization callback received");
        self.session.session_id = Some(session_id.clone());
        self.pending_exchange = Some(session_id.clone());
        if matches!(self.phase, AuthPhase::Unauthenticated | AuthPhase::Error) {
            self.set_phase(AuthPhase::Authenticating);
        }
        session_id
    }

    fn take_pending(&mut self, session_id: &SessionId) -> bool {
        if self.pending_exchange.as_ref() == Some(session_id) {
            self.pending_exchange = None;
            true
        } else {
            debug!(session_id = %session_id, "Ignoring token result for superseded session");
            false
        }
    }

    /// Token exchange succeeded. `None` when the result is for a superseded session.
    pub fn token_granted(
        &mut self,
        session_id: &SessionId,
        token: AccessToken,
    ) -> Option<TokenApplied> {
        if !self.take_pending(session_id) {
            return None;
        }
        self.session.access_token = Some(token);
        self.session.authenticated = true;
        self.reauthorizing = false;

        if self.phase == AuthPhase::MeetingLinked {
            Some(TokenApplied::Refreshed)
        } else {
            self.set_phase(AuthPhase::Authenticated);
            Some(TokenApplied::Authenticated)
        }
    }

    /// Token exchange failed. Returns whether the failure applies.
    ///
    /// While linked the previous token is kept and the phase is unchanged.
    pub fn token_failed(&mut self, session_id: &SessionId) -> bool {
        if !self.take_pending(session_id) {
            return false;
        }
        self.reauthorizing = false;
        if self.phase == AuthPhase::MeetingLinked {
            warn!("Token refresh failed, keeping previous token");
        } else {
            self.set_phase(AuthPhase::Error);
        }
        true
    }

    /// Whether a handshake may run now
    pub fn can_link(&self) -> bool {
        matches!(
            self.phase,
            AuthPhase::Authenticated | AuthPhase::MeetingLinked
        ) && self.session.token().is_some()
    }

    /// Handshake yielded `meeting_id`
    pub fn link(&mut self, meeting_id: MeetingId) -> Result<LinkChange> {
        if !self.can_link() {
            return Err(TickerError::invalid_transition(self.phase, "link meeting"));
        }

        let change = match self.meeting.meeting_id.take() {
            None => LinkChange::First,
            Some(previous) if previous == meeting_id => LinkChange::Same,
            Some(previous) => LinkChange::Changed { previous },
        };
        self.meeting.meeting_id = Some(meeting_id);
        self.set_phase(AuthPhase::MeetingLinked);
        Ok(change)
    }

    /// Route to the error presentation
    pub fn fail(&mut self) {
        self.set_phase(AuthPhase::Error);
    }

    /// Leave the error phase. Returns the phase entered.
    pub fn retry(&mut self) -> Result<AuthPhase> {
        if self.phase != AuthPhase::Error {
            return Err(TickerError::invalid_transition(self.phase, "retry"));
        }
        let to = if self.session.token().is_some() {
            AuthPhase::Authenticated
        } else {
            AuthPhase::Unauthenticated
        };
        self.set_phase(to);
        Ok(to)
    }

    /// Clear the session. The meeting context is kept.
    pub fn logout(&mut self) {
        self.session = Session::default();
        self.pending_exchange = None;
        self.reauthorizing = false;
        self.set_phase(AuthPhase::Unauthenticated);
    }

    pub fn phase(&self) -> AuthPhase {
        self.phase
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn token(&self) -> Option<&AccessToken> {
        self.session.token()
    }

    pub fn meeting_id(&self) -> Option<&MeetingId> {
        self.meeting.meeting_id.as_ref()
    }

    pub fn meeting(&self) -> &MeetingContext {
        &self.meeting
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.token().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authenticated() -> SessionManager {
        let mut manager = SessionManager::new();
        manager.begin_authorization().unwrap();
        let sid = manager.receive_callback(SessionId::new("s1"));
        assert_eq!(
            manager.token_granted(&sid, AccessToken::new("t1")),
            Some(TokenApplied::Authenticated)
        );
        manager
    }

    #[test]
    fn happy_path_to_linked() {
        let mut manager = authenticated();
        assert_eq!(manager.phase(), AuthPhase::Authenticated);

        let change = manager.link(MeetingId::new("abc")).unwrap();
        assert_eq!(change, LinkChange::First);
        assert_eq!(manager.phase(), AuthPhase::MeetingLinked);
        assert_eq!(manager.meeting_id(), Some(&MeetingId::new("abc")));
    }

    #[test]
    fn relinking_detects_change() {
        let mut manager = authenticated();
        manager.link(MeetingId::new("abc")).unwrap();

        assert_eq!(
            manager.link(MeetingId::new("abc")).unwrap(),
            LinkChange::Same
        );
        assert_eq!(
            manager.link(MeetingId::new("xyz")).unwrap(),
            LinkChange::Changed {
                previous: MeetingId::new("abc")
            }
        );
    }

    #[test]
    fn link_requires_authentication() {
        let mut manager = SessionManager::new();
        let err = manager.link(MeetingId::new("abc")).unwrap_err();
        assert!(matches!(err, TickerError::InvalidTransition { .. }));
        assert_eq!(manager.phase(), AuthPhase::Unauthenticated);
    }

    #[test]
    fn token_failure_routes_to_error() {
        let mut manager = SessionManager::new();
        manager.begin_authorization().unwrap();
        let sid = manager.receive_callback(SessionId::new("s1"));

        assert!(manager.token_failed(&sid));
        assert_eq!(manager.phase(), AuthPhase::Error);

        // Nothing held, so retry goes back to the start
        assert_eq!(manager.retry().unwrap(), AuthPhase::Unauthenticated);
    }

    #[test]
    fn retry_with_token_returns_to_authenticated() {
        let mut manager = authenticated();
        manager.fail();
        assert_eq!(manager.retry().unwrap(), AuthPhase::Authenticated);
        assert!(manager.retry().is_err());
    }

    #[test]
    fn superseded_token_results_are_ignored() {
        let mut manager = SessionManager::new();
        manager.begin_authorization().unwrap();
        let old = manager.receive_callback(SessionId::new("old"));
        let new = manager.receive_callback(SessionId::new("new"));

        assert_eq!(manager.token_granted(&old, AccessToken::new("x")), None);
        assert!(!manager.token_failed(&old));
        assert_eq!(manager.phase(), AuthPhase::Authenticating);

        assert!(manager.token_granted(&new, AccessToken::new("y")).is_some());
        assert_eq!(manager.token().map(|t| t.as_str()), Some("y"));
    }

    #[test]
    fn cancel_returns_to_unauthenticated() {
        let mut manager = SessionManager::new();
        manager.begin_authorization().unwrap();
        manager.cancel_authorization().unwrap();
        assert_eq!(manager.phase(), AuthPhase::Unauthenticated);

        assert!(manager.cancel_authorization().is_err());
    }

    #[test]
    fn reauthorization_while_linked_keeps_meeting() {
        let mut manager = authenticated();
        manager.link(MeetingId::new("abc")).unwrap();

        manager.begin_authorization().unwrap();
        assert_eq!(manager.phase(), AuthPhase::MeetingLinked);

        let sid = manager.receive_callback(SessionId::new("s2"));
        assert_eq!(
            manager.token_granted(&sid, AccessToken::new("t2")),
            Some(TokenApplied::Refreshed)
        );
        assert_eq!(manager.phase(), AuthPhase::MeetingLinked);
        assert_eq!(manager.token().map(|t| t.as_str()), Some("t2"));
    }

    #[test]
    fn failed_refresh_while_linked_keeps_old_token() {
        let mut manager = authenticated();
        manager.link(MeetingId::new("abc")).unwrap();

        let sid = manager.receive_callback(SessionId::new("s2"));
        assert!(manager.token_failed(&sid));
        assert_eq!(manager.phase(), AuthPhase::MeetingLinked);
        assert_eq!(manager.token().map(|t| t.as_str()), Some("t1"));
    }

    #[test]
    fn logout_keeps_meeting_context() {
        let mut manager = authenticated();
        manager.link(MeetingId::new("abc")).unwrap();
        manager.logout();

        assert_eq!(manager.phase(), AuthPhase::Unauthenticated);
        assert_eq!(manager.session(), &Session::default());
        assert_eq!(manager.meeting_id(), Some(&MeetingId::new("abc")));
    }

    #[test]
    fn restore_requires_token() {
        let manager = SessionManager::restored(
            Session {
                session_id: Some(SessionId::new("s")),
                access_token: None,
                authenticated: true,
            },
            MeetingContext::default(),
        );
        assert_eq!(manager.phase(), AuthPhase::Unauthenticated);
        assert!(!manager.is_authenticated());

        let manager = SessionManager::restored(
            Session {
                session_id: Some(SessionId::new("s")),
                access_token: Some(AccessToken::new("t")),
                authenticated: true,
            },
            MeetingContext {
                meeting_id: Some(MeetingId::new("abc")),
            },
        );
        assert_eq!(manager.phase(), AuthPhase::Authenticated);
    }
}
