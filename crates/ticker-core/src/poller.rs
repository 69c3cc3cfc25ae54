//! Participant poller state
//!
//! The poller owns scheduling and health only. Requests run elsewhere; each
//! one carries a [`PollTicket`] so late results from an older poller
//! incarnation (or an older meeting) can be recognized and dropped.

use std::time::Duration;
use ticker_api::ErrorKind;
use ticker_util::{AccessToken, MeetingId, MonotonicInstant};
use tracing::{debug, info, warn};

use crate::BackoffPolicy;

/// Consecutive-failure bookkeeping
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollHealth {
    pub consecutive_errors: u32,
    pub last_error: Option<ErrorKind>,
}

/// Identity of one issued poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollTicket {
    pub generation: u64,
    pub meeting_id: MeetingId,
}

/// Everything needed to run one count request
#[derive(Debug, Clone)]
pub struct PollRequest {
    pub ticket: PollTicket,
    pub token: AccessToken,
}

/// What [`Poller::begin`] decided
#[derive(Debug)]
pub enum PollStart {
    Request(PollRequest),
    /// No token or no meeting; nothing was sent
    CredentialsMissing,
}

/// What a completed poll did to the poller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Succeeded { count: u32 },
    Failed {
        kind: ErrorKind,
        attempt: u32,
        halted: bool,
    },
    /// Result from an older generation or meeting, ignored
    Stale,
}

#[derive(Debug)]
pub struct Poller {
    backoff: Box<dyn BackoffPolicy>,
    max_retries: u32,
    generation: u64,
    meeting_id: Option<MeetingId>,
    active: bool,
    halted: bool,
    in_flight: bool,
    next_due: Option<MonotonicInstant>,
    health: PollHealth,
}

impl Poller {
    pub fn new(backoff: Box<dyn BackoffPolicy>, max_retries: u32) -> Self {
        Self {
            backoff,
            max_retries: max_retries.max(1),
            generation: 0,
            meeting_id: None,
            active: false,
            halted: false,
            in_flight: false,
            next_due: None,
            health: PollHealth::default(),
        }
    }

    /// (Re)create the poller for `meeting_id`. The first poll is due immediately.
    pub fn start(&mut self, meeting_id: MeetingId, now: MonotonicInstant) {
        self.generation += 1;
        info!(
            meeting_id = %meeting_id,
            generation = self.generation,
            "Participant poller started"
        );
        self.meeting_id = Some(meeting_id);
        self.active = true;
        self.halted = false;
        self.in_flight = false;
        self.next_due = Some(now);
        self.health = PollHealth::default();
    }

    /// Cancel the schedule. Results of requests still in flight become stale.
    pub fn stop(&mut self) {
        if self.active {
            debug!(generation = self.generation, "Participant poller stopped");
        }
        self.generation += 1;
        self.active = false;
        self.in_flight = false;
        self.next_due = None;
    }

    /// When the next poll should be issued, if one is scheduled
    pub fn next_due(&self) -> Option<MonotonicInstant> {
        if self.active && !self.halted && !self.in_flight {
            self.next_due
        } else {
            None
        }
    }

    pub fn is_due(&self, now: MonotonicInstant) -> bool {
        self.next_due().is_some_and(|due| due <= now)
    }

    /// Issue the due poll.
    ///
    /// Without credentials nothing is sent and health is left untouched; the
    /// next attempt is scheduled one regular period later.
    pub fn begin(&mut self, token: Option<&AccessToken>, now: MonotonicInstant) -> PollStart {
        match (token, self.meeting_id.as_ref()) {
            (Some(token), Some(meeting_id)) => {
                self.in_flight = true;
                self.next_due = None;
                PollStart::Request(PollRequest {
                    ticket: PollTicket {
                        generation: self.generation,
                        meeting_id: meeting_id.clone(),
                    },
                    token: token.clone(),
                })
            }
            _ => {
                debug!("Poll skipped: credentials missing");
                self.schedule(now);
                PollStart::CredentialsMissing
            }
        }
    }

    /// Apply the result of a request issued under `ticket`
    pub fn complete(
        &mut self,
        ticket: &PollTicket,
        result: Result<u32, ErrorKind>,
        now: MonotonicInstant,
    ) -> PollOutcome {
        if !self.is_current(ticket) {
            debug!(
                generation = ticket.generation,
                current = self.generation,
                meeting_id = %ticket.meeting_id,
                "Discarding stale poll result"
            );
            return PollOutcome::Stale;
        }
        self.in_flight = false;

        match result {
            Ok(count) => {
                self.health = PollHealth::default();
                self.schedule(now);
                PollOutcome::Succeeded { count }
            }
            Err(kind) => {
                self.health.consecutive_errors += 1;
                self.health.last_error = Some(kind);
                let attempt = self.health.consecutive_errors;

                if attempt >= self.max_retries {
                    warn!(
                        consecutive_errors = attempt,
                        ?kind,
                        "Polling halted, keeping last known count"
                    );
                    self.halted = true;
                    self.next_due = None;
                } else {
                    warn!(attempt, ?kind, "Participant poll failed");
                    self.schedule(now);
                }

                PollOutcome::Failed {
                    kind,
                    attempt,
                    halted: self.halted,
                }
            }
        }
    }

    fn is_current(&self, ticket: &PollTicket) -> bool {
        self.active
            && ticket.generation == self.generation
            && self.meeting_id.as_ref() == Some(&ticket.meeting_id)
    }

    fn schedule(&mut self, now: MonotonicInstant) {
        let delay: Duration = self.backoff.next_delay(self.health.consecutive_errors);
        self.next_due = Some(now + delay);
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn health(&self) -> &PollHealth {
        &self.health
    }
}
