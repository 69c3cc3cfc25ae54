//! Plain-text rendering of the service's view

use ticker_api::{HealthStatus, PresentationMode, StatusLevel, TickerView};

/// Render one screen. The view already carries every display string.
pub fn render_view(view: &TickerView) -> String {
    let mut lines = Vec::new();

    match view.mode {
        PresentationMode::Auth => {
            lines.push(format!("Not tracking ({})", view.phase));
            lines.push("  Run `ticker-ctl authorize` to sign in.".to_string());
        }
        PresentationMode::Error => {
            let message = view
                .error_message
                .as_deref()
                .unwrap_or("An unexpected error occurred");
            lines.push(format!("Error: {}", message));
            lines.push("  Run `ticker-ctl retry` to try again.".to_string());
        }
        PresentationMode::Ticker => {
            let meeting = view
                .meeting_id
                .as_ref()
                .map(|id| id.as_str())
                .unwrap_or("unknown");
            lines.push(format!("Meeting {} [{}]", meeting, view.meeting_status));
            lines.push(format!("  Cost:          {} {}", view.cost_value, view.cost_unit));
            lines.push(format!("  Participants:  {}", view.participants));
            lines.push(format!("  Elapsed:       {}", view.elapsed));
        }
    }

    if let Some(status) = &view.status {
        lines.push(format!("  {} {}", status_marker(status.level), status.text));
    }

    lines.join("\n")
}

pub fn render_health(health: &HealthStatus) -> String {
    [
        format!("live:            {}", health.live),
        format!("ready:           {}", health.ready),
        format!("store ok:        {}", health.store_ok),
        format!("phase:           {}", health.phase),
        format!("tracking:        {}", health.tracking),
        format!("polling halted:  {}", health.polling_halted),
    ]
    .join("\n")
}

fn status_marker(level: StatusLevel) -> &'static str {
    match level {
        StatusLevel::Info => "-",
        StatusLevel::Success => "+",
        StatusLevel::Warning => "!",
        StatusLevel::Error => "x",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ticker_api::{AuthPhase, CostUnit, StatusMessage};
    use ticker_util::MeetingId;

    fn ticker_view() -> TickerView {
        TickerView {
            mode: PresentationMode::Ticker,
            phase: AuthPhase::MeetingLinked,
            status: Some(StatusMessage::info("Last updated: 10:15:00")),
            error_message: None,
            cost_value: "1,234".into(),
            cost_unit: CostUnit::PersonMinutes,
            participants: "4 participants".into(),
            elapsed: "1h 2m 3s".into(),
            meeting_status: "Active".into(),
            meeting_id: Some(MeetingId::new("abc")),
        }
    }

    #[test]
    fn ticker_screen() {
        let text = render_view(&ticker_view());
        assert!(text.starts_with("Meeting abc [Active]"));
        assert!(text.contains("1,234 person-minutes"));
        assert!(text.contains("4 participants"));
        assert!(text.contains("1h 2m 3s"));
        assert!(text.ends_with("- Last updated: 10:15:00"));
    }

    #[test]
    fn error_screen_uses_fallback_message() {
        let view = TickerView {
            mode: PresentationMode::Error,
            phase: AuthPhase::Error,
            status: None,
            ..ticker_view()
        };
        assert!(render_view(&view).starts_with("Error: An unexpected error occurred"));
    }

    #[test]
    fn auth_screen_names_phase() {
        let view = TickerView {
            mode: PresentationMode::Auth,
            phase: AuthPhase::Authenticating,
            status: Some(StatusMessage::success("Authentication successful!")),
            ..ticker_view()
        };
        let text = render_view(&view);
        assert!(text.starts_with("Not tracking (authenticating)"));
        assert!(text.contains("+ Authentication successful!"));
    }
}
