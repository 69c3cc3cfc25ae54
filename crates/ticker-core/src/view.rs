//! Pure projection of engine state into what a client draws

use chrono::{DateTime, Local};
use ticker_api::{AuthPhase, PresentationMode, TickerView};
use ticker_util::{format_count, format_elapsed, participant_label};

use crate::TickerEngine;

/// Which screen a phase is shown on
pub fn presentation_mode(phase: AuthPhase) -> PresentationMode {
    match phase {
        AuthPhase::Error => PresentationMode::Error,
        AuthPhase::MeetingLinked => PresentationMode::Ticker,
        AuthPhase::Unauthenticated | AuthPhase::Authenticating | AuthPhase::Authenticated => {
            PresentationMode::Auth
        }
    }
}

/// Render the current engine state. No side effects.
pub fn render(engine: &TickerEngine, now: DateTime<Local>) -> TickerView {
    let phase = engine.phase();
    let mode = presentation_mode(phase);
    let tracking = engine.is_tracking();
    let accumulation = engine.accumulation();
    let cost = accumulation.cost_display();

    TickerView {
        mode,
        phase,
        status: engine.status().cloned(),
        error_message: match mode {
            PresentationMode::Error => Some(
                engine
                    .error_message()
                    .unwrap_or("An unexpected error occurred")
                    .to_string(),
            ),
            _ => None,
        },
        cost_value: format_count(cost.value),
        cost_unit: cost.unit,
        participants: participant_label(accumulation.current_participant_count()),
        elapsed: format_elapsed(accumulation.elapsed(now, !tracking)),
        meeting_status: if tracking { "Active" } else { "Stopped" }.to_string(),
        meeting_id: engine.meeting_id().cloned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Arc;
    use ticker_api::{AuthMessage, CostUnit};
    use ticker_config::Policy;
    use ticker_store::SqliteStore;
    use ticker_util::{AccessToken, MeetingId, MonotonicInstant, SessionId};

    use crate::CoreEvent;

    fn at(secs: i64) -> DateTime<Local> {
        Local.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn linked_engine() -> TickerEngine {
        linked_engine_on(Arc::new(SqliteStore::in_memory().unwrap()))
    }

    fn linked_engine_on(store: Arc<SqliteStore>) -> TickerEngine {
        let mut engine = TickerEngine::new(Policy::default(), store);
        let mono = MonotonicInstant::now();

        engine.begin_authorization().unwrap();
        engine.auth_message(AuthMessage::AuthSuccess {
            session_id: SessionId::new("s"),
        });
        let events = engine.token_exchanged(&SessionId::new("s"), Ok(AccessToken::new("t")), mono);
        let ticket = events
            .iter()
            .find_map(|e| match e {
                CoreEvent::HandshakeRequested { ticket } => Some(*ticket),
                _ => None,
            })
            .unwrap();
        engine.handshake_completed(ticket, Ok(MeetingId::new("abc")), mono);
        engine
    }

    #[test]
    fn modes_follow_phase() {
        assert_eq!(
            presentation_mode(AuthPhase::Unauthenticated),
            PresentationMode::Auth
        );
        assert_eq!(
            presentation_mode(AuthPhase::Authenticated),
            PresentationMode::Auth
        );
        assert_eq!(
            presentation_mode(AuthPhase::MeetingLinked),
            PresentationMode::Ticker
        );
        assert_eq!(presentation_mode(AuthPhase::Error), PresentationMode::Error);
    }

    #[test]
    fn fresh_engine_shows_auth_screen() {
        let engine =
            TickerEngine::new(Policy::default(), Arc::new(SqliteStore::in_memory().unwrap()));
        let view = render(&engine, at(0));

        assert_eq!(view.mode, PresentationMode::Auth);
        assert_eq!(view.cost_value, "0");
        assert_eq!(view.elapsed, "0s");
        assert_eq!(view.meeting_status, "Stopped");
        assert!(view.error_message.is_none());
        assert!(view.meeting_id.is_none());
    }

    #[test]
    fn ticking_view() {
        let mut engine = linked_engine();
        for i in 0..=125 {
            engine.tick(at(i));
        }

        let view = render(&engine, at(125));
        assert_eq!(view.mode, PresentationMode::Ticker);
        assert_eq!(view.meeting_status, "Active");
        assert_eq!(view.participants, "1 participant");
        assert_eq!(view.elapsed, "2m 5s");
        // 126 person-seconds
        assert_eq!(view.cost_value, "2");
        assert_eq!(view.cost_unit, CostUnit::PersonMinutes);
        assert_eq!(view.meeting_id, Some(MeetingId::new("abc")));
    }

    #[test]
    fn stopped_view_freezes_elapsed() {
        let mut engine = linked_engine();
        engine.tick(at(0));
        engine.tick(at(10));
        engine.stop_tracking();

        let view = render(&engine, at(500));
        assert_eq!(view.elapsed, "10s");
        assert_eq!(view.meeting_status, "Stopped");
    }

    #[test]
    fn restored_stopped_view_stays_frozen() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        {
            let mut engine = linked_engine_on(store.clone());
            engine.tick(at(0));
            engine.tick(at(10));
            engine.stop_tracking();
            assert_eq!(render(&engine, at(5000)).elapsed, "10s");
            engine.shutdown();
        }

        let mut engine = TickerEngine::new(Policy::default(), store);
        engine.restore();
        assert!(!engine.is_tracking());
        assert_eq!(render(&engine, at(5000)).elapsed, "10s");
    }

    #[test]
    fn render_is_pure() {
        let mut engine = linked_engine();
        engine.tick(at(0));

        let first = render(&engine, at(3));
        let second = render(&engine, at(3));
        assert_eq!(first, second);
        assert_eq!(engine.accumulation().total_person_seconds(), 1);
    }
}
