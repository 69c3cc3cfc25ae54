//! tickerd - The meeting cost ticker service
//!
//! This is the main entry point for the tickerd service.
//! It wires together all the components:
//! - Configuration loading
//! - Store initialization
//! - Core engine
//! - Token exchange and participant-count services
//! - Panel bridge (meeting host fed over IPC)
//! - IPC server

use anyhow::{Context, Result};
use clap::Parser;
use std::future::pending;
use std::path::PathBuf;
use std::sync::Arc;
use ticker_api::{
    Command, ErrorCode, ErrorInfo, Event, EventPayload, HealthStatus, Response, ResponsePayload,
};
use ticker_config::{CountSourceMode, Policy, load_config_or_default};
use ticker_core::{
    CoreEvent, HandshakeResult, HandshakeTicket, PollTicket, TICK_PERIOD, TickerEngine,
    link_meeting, render,
};
use ticker_host_api::{AuthService, CountService, HostResult, TokenGrant};
use ticker_host_net::{
    HttpAuthService, HttpCountService, PanelAnnouncement, PanelBridge, SimulatedCountService,
    build_client,
};
use ticker_ipc::{IpcServer, ServerMessage};
use ticker_store::{AuditEvent, AuditEventType, SqliteStore, Store};
use ticker_util::{
    ClientId, MeetingId, MonotonicInstant, SessionId, TickerError, default_config_path,
    is_mock_time_active,
};
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// tickerd - Live person-time cost of a video meeting
#[derive(Parser, Debug)]
#[command(name = "tickerd")]
#[command(about = "Live person-time cost of a video meeting", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/meet-ticker/ticker.toml)
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Socket path override (or set TICKER_SOCKET env var)
    #[arg(short, long, env = "TICKER_SOCKET")]
    socket: Option<PathBuf>,

    /// Data directory override (or set TICKER_DATA_DIR env var)
    #[arg(short, long, env = "TICKER_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

/// Outcome of work run off the main loop, fed back in for the engine to apply
enum WorkResult {
    Token {
        session_id: SessionId,
        result: HostResult<TokenGrant>,
    },
    Handshake {
        ticket: HandshakeTicket,
        result: HandshakeResult<MeetingId>,
    },
    Poll {
        ticket: PollTicket,
        result: HostResult<u32>,
    },
}

/// Main service state. Owned by the loop; the engine has exactly one writer.
struct Service {
    engine: TickerEngine,
    auth: Arc<dyn AuthService>,
    counts: Arc<dyn CountService>,
    panel: Arc<PanelBridge>,
    ipc: Arc<IpcServer>,
    work_tx: mpsc::UnboundedSender<WorkResult>,
    work_rx: Option<mpsc::UnboundedReceiver<WorkResult>>,
}

impl Service {
    async fn new(args: &Args) -> Result<Self> {
        // Load configuration
        let policy = load_config_or_default(&args.config)
            .with_context(|| format!("Failed to load config from {:?}", args.config))?;

        info!(
            config_path = %args.config.display(),
            poll_interval = ?policy.polling.interval,
            count_source = ?policy.count_source.mode,
            "Configuration loaded"
        );

        // Determine paths
        let socket_path = args
            .socket
            .clone()
            .unwrap_or_else(|| policy.service.socket_path.clone());

        let data_dir = args
            .data_dir
            .clone()
            .unwrap_or_else(|| policy.service.data_dir.clone());

        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

        // Initialize store
        let db_path = data_dir.join("ticker.db");
        let store: Arc<dyn Store> = Arc::new(
            SqliteStore::open(&db_path)
                .with_context(|| format!("Failed to open database {:?}", db_path))?,
        );

        info!(db_path = %db_path.display(), "Store initialized");

        // Network services
        let client = build_client(policy.service.request_timeout)
            .context("Failed to build HTTP client")?;
        let auth: Arc<dyn AuthService> =
            Arc::new(HttpAuthService::new(client.clone(), policy.service.token_url()));
        let counts = count_service(&policy, client);
        let panel = Arc::new(PanelBridge::new(policy.service.meet_sdk.clone()));

        let engine = TickerEngine::new(policy, store);

        // Initialize IPC server
        let mut ipc = IpcServer::new(&socket_path);
        ipc.start().await?;

        info!(socket_path = %socket_path.display(), "IPC server started");

        let (work_tx, work_rx) = mpsc::unbounded_channel();

        Ok(Self {
            engine,
            auth,
            counts,
            panel,
            ipc: Arc::new(ipc),
            work_tx,
            work_rx: Some(work_rx),
        })
    }

    async fn run(mut self) -> Result<()> {
        let mut ipc_messages = self
            .ipc
            .take_message_receiver()
            .await
            .context("IPC message receiver already taken")?;
        let mut work_results = self
            .work_rx
            .take()
            .context("Work receiver already taken")?;

        // Spawn IPC accept task
        let ipc_accept = self.ipc.clone();
        tokio::spawn(async move {
            if let Err(e) = ipc_accept.run().await {
                error!(error = %e, "IPC server error");
            }
        });

        // Set up signal handlers
        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to create SIGTERM handler")?;
        let mut sigint =
            signal(SignalKind::interrupt()).context("Failed to create SIGINT handler")?;
        let mut sighup = signal(SignalKind::hangup()).context("Failed to create SIGHUP handler")?;

        // Resume whatever the previous run left behind
        let events = self.engine.restore();
        self.handle_core_events(events);
        self.broadcast_view();

        let mut tick_timer: Option<Interval> = None;
        let mut tick_epoch: Option<u64> = None;

        info!("Service running");

        loop {
            self.sync_tick_timer(&mut tick_timer, &mut tick_epoch);
            let poll_due = self.engine.next_poll_due();

            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully");
                    break;
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully");
                    break;
                }
                _ = sighup.recv() => {
                    info!("Received SIGHUP, shutting down gracefully");
                    break;
                }

                // Once per second while tracking
                _ = next_tick(&mut tick_timer) => {
                    if self.engine.tick(ticker_util::now()) {
                        self.broadcast_view();
                    }
                }

                // Next participant-count poll
                _ = sleep_until_due(poll_due) => {
                    self.start_poll();
                }

                Some(result) = work_results.recv() => {
                    self.handle_work_result(result);
                }

                Some(msg) = ipc_messages.recv() => {
                    self.handle_ipc_message(msg).await;
                }
            }
        }

        // Graceful shutdown
        info!("Shutting down tickerd");

        self.engine.shutdown();
        self.ipc.broadcast_event(Event::new(EventPayload::Shutdown));
        self.ipc.shutdown();

        info!("Shutdown complete");
        Ok(())
    }

    /// Recreate the tick timer whenever the engine restarts its ticker; drop it when stopped
    fn sync_tick_timer(&self, timer: &mut Option<Interval>, epoch: &mut Option<u64>) {
        if !self.engine.is_tracking() {
            *timer = None;
            *epoch = None;
            return;
        }

        let current = self.engine.ticker_epoch();
        if *epoch != Some(current) {
            let mut interval = tokio::time::interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
            // Ticks missed while the loop stalls are not backfilled, the same approximation as a stale count
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            *timer = Some(interval);
            *epoch = Some(current);
            debug!(epoch = current, "Tick timer started");
        }
    }

    fn start_poll(&mut self) {
        let Some(request) = self.engine.begin_poll(MonotonicInstant::now()) else {
            // Nothing sent (no credentials); the status may have changed
            self.broadcast_view();
            return;
        };

        let counts = self.counts.clone();
        let tx = self.work_tx.clone();
        tokio::spawn(async move {
            let result = counts
                .participant_count(&request.token, &request.ticket.meeting_id)
                .await;
            let _ = tx.send(WorkResult::Poll {
                ticket: request.ticket,
                result,
            });
        });
    }

    fn handle_work_result(&mut self, result: WorkResult) {
        let now_mono = MonotonicInstant::now();

        let events = match result {
            WorkResult::Token { session_id, result } => {
                let result = result.map(|grant| {
                    if let Some(expires_in) = grant.expires_in {
                        debug!(expires_in_secs = expires_in, "Token lifetime reported");
                    }
                    grant.access_token
                });
                self.engine.token_exchanged(&session_id, result, now_mono)
            }
            WorkResult::Handshake { ticket, result } => {
                self.engine.handshake_completed(ticket, result, now_mono)
            }
            WorkResult::Poll { ticket, result } => {
                self.engine
                    .apply_poll_result(&ticket, result, ticker_util::now(), now_mono)
            }
        };

        self.handle_core_events(events);
        self.broadcast_view();
    }

    fn handle_core_events(&self, events: Vec<CoreEvent>) {
        for event in events {
            self.handle_core_event(event);
        }
    }

    fn handle_core_event(&self, event: CoreEvent) {
        match event {
            CoreEvent::TokenExchangeRequested { session_id } => {
                let auth = self.auth.clone();
                let tx = self.work_tx.clone();
                tokio::spawn(async move {
                    let result = auth.exchange_token(&session_id).await;
                    let _ = tx.send(WorkResult::Token { session_id, result });
                });
            }

            CoreEvent::HandshakeRequested { ticket } => {
                let panel = self.panel.clone();
                let timeout = self.engine.policy().handshake.timeout;
                let tx = self.work_tx.clone();
                tokio::spawn(async move {
                    let result = link_meeting(panel.as_ref(), timeout).await;
                    let _ = tx.send(WorkResult::Handshake { ticket, result });
                });
            }

            CoreEvent::AuthorizationRequested { auth_url } => {
                info!(auth_url = %auth_url, "Authorization requested");
                self.ipc
                    .broadcast_event(Event::new(EventPayload::AuthorizationRequested { auth_url }));
            }

            CoreEvent::MeetingChanged { previous, current } => {
                self.ipc
                    .broadcast_event(Event::new(EventPayload::MeetingChanged { previous, current }));
            }

            CoreEvent::ParticipantCountChanged { count } => {
                self.ipc
                    .broadcast_event(Event::new(EventPayload::ParticipantCountChanged { count }));
            }

            CoreEvent::PollingHalted { consecutive_errors } => {
                warn!(consecutive_errors, "Polling halted");
                self.ipc
                    .broadcast_event(Event::new(EventPayload::PollingHalted { consecutive_errors }));
            }

            CoreEvent::PhaseChanged { from, to } => {
                debug!(from = %from, to = %to, "Phase changed");
            }

            CoreEvent::AccumulationReset {
                discarded_person_seconds,
            } => {
                debug!(discarded_person_seconds, "Accumulation reset");
            }

            CoreEvent::TrackingStarted { meeting_id } => {
                debug!(meeting_id = %meeting_id, "Tracking started");
            }

            CoreEvent::TrackingStopped {
                total_person_seconds,
            } => {
                debug!(total_person_seconds, "Tracking stopped");
            }
        }
    }

    fn broadcast_view(&self) {
        let view = render(&self.engine, ticker_util::now());
        self.ipc
            .broadcast_event(Event::new(EventPayload::ViewUpdated(Box::new(view))));
    }

    async fn handle_ipc_message(&mut self, msg: ServerMessage) {
        match msg {
            ServerMessage::Request { client_id, request } => {
                let changes_view = !matches!(
                    request.command,
                    Command::GetState
                        | Command::GetHealth
                        | Command::Ping
                        | Command::UnsubscribeEvents
                );

                let response = self.handle_command(&client_id, request.request_id, request.command);

                if let Err(e) = self.ipc.send_response(&client_id, response).await {
                    warn!(client_id = %client_id, error = %e, "Failed to send response");
                }

                // Also gives a fresh subscriber its first view
                if changes_view {
                    self.broadcast_view();
                }
            }

            ServerMessage::ClientConnected { client_id, info } => {
                info!(
                    client_id = %client_id,
                    uid = ?info.uid,
                    "Client connected"
                );

                self.audit(AuditEventType::ClientConnected {
                    client_id: client_id.to_string(),
                    uid: info.uid,
                });
            }

            ServerMessage::ClientDisconnected { client_id } => {
                debug!(client_id = %client_id, "Client disconnected");

                self.audit(AuditEventType::ClientDisconnected {
                    client_id: client_id.to_string(),
                });
            }
        }
    }

    fn handle_command(&mut self, client_id: &ClientId, request_id: u64, command: Command) -> Response {
        match self.execute(client_id, command) {
            Ok(payload) => Response::success(request_id, payload),
            Err(e) => {
                debug!(client_id = %client_id, error = %e, "Command rejected");
                Response::error(request_id, error_info(&e))
            }
        }
    }

    fn execute(
        &mut self,
        client_id: &ClientId,
        command: Command,
    ) -> ticker_util::Result<ResponsePayload> {
        let now_mono = MonotonicInstant::now();

        let payload = match command {
            Command::GetState => self.state_payload(),

            Command::BeginAuthorization => {
                let events = self.engine.begin_authorization()?;
                self.handle_core_events(events);
                ResponsePayload::AuthorizationStarted {
                    auth_url: self.engine.policy().service.auth_url(),
                }
            }

            Command::AuthMessage { message } => {
                let events = self.engine.auth_message(message);
                self.handle_core_events(events);
                self.state_payload()
            }

            Command::AuthCancelled => {
                let events = self.engine.auth_cancelled()?;
                self.handle_core_events(events);
                self.state_payload()
            }

            Command::PanelReady {
                meet_sdk,
                meeting_id,
            } => {
                info!(meeting_id = %meeting_id, "Panel ready");
                self.panel.announce(PanelAnnouncement {
                    meet_sdk,
                    meeting_id,
                });

                // A pending handshake picks the announcement up on its own
                if self.engine.is_authenticated() && !self.engine.is_handshake_pending() {
                    let events = self.engine.request_handshake()?;
                    self.handle_core_events(events);
                }
                self.state_payload()
            }

            Command::Retry => {
                let events = self.engine.retry(now_mono)?;
                self.handle_core_events(events);
                self.state_payload()
            }

            Command::Logout => {
                let events = self.engine.logout();
                self.handle_core_events(events);
                self.state_payload()
            }

            Command::StartTracking => {
                let events = self.engine.start_tracking(now_mono)?;
                self.handle_core_events(events);
                self.state_payload()
            }

            Command::StopTracking => {
                let events = self.engine.stop_tracking();
                self.handle_core_events(events);
                self.state_payload()
            }

            Command::SubscribeEvents => ResponsePayload::Subscribed {
                client_id: client_id.clone(),
            },

            Command::UnsubscribeEvents => ResponsePayload::Unsubscribed,

            Command::GetHealth => ResponsePayload::Health(self.health()),

            Command::Ping => ResponsePayload::Pong,
        };

        Ok(payload)
    }

    fn state_payload(&self) -> ResponsePayload {
        ResponsePayload::State(Box::new(self.engine.state_snapshot(ticker_util::now())))
    }

    fn health(&self) -> HealthStatus {
        let store_ok = self.engine.store_healthy();
        HealthStatus {
            live: true,
            ready: store_ok && self.counts.is_healthy(),
            store_ok,
            phase: self.engine.phase(),
            tracking: self.engine.is_tracking(),
            polling_halted: self.engine.is_polling_halted(),
        }
    }

    fn audit(&self, event: AuditEventType) {
        if let Err(e) = self.engine.store().append_audit(AuditEvent::new(event)) {
            warn!(error = %e, "Failed to write audit event");
        }
    }
}

/// Participant-count source chosen by configuration
fn count_service(policy: &Policy, client: reqwest::Client) -> Arc<dyn CountService> {
    match policy.count_source.mode {
        CountSourceMode::Http => {
            let url = policy.service.participants_url();
            info!(url = %url, "Using HTTP participant counts");
            Arc::new(HttpCountService::new(client, url))
        }
        CountSourceMode::Simulated => {
            let (min, max) = (
                policy.count_source.simulated_min,
                policy.count_source.simulated_max,
            );
            warn!(min, max, "Using simulated participant counts");
            Arc::new(SimulatedCountService::new(min, max))
        }
    }
}

fn error_info(err: &TickerError) -> ErrorInfo {
    let code = match err {
        TickerError::InvalidTransition { .. } => ErrorCode::InvalidTransition,
        TickerError::NotAuthenticated => ErrorCode::NotAuthenticated,
        TickerError::NoMeetingLinked => ErrorCode::NoMeetingLinked,
        TickerError::HostError(_) => ErrorCode::HostError,
        TickerError::ConfigError(_)
        | TickerError::StoreError(_)
        | TickerError::IpcError(_)
        | TickerError::Internal(_) => ErrorCode::InternalError,
    };
    ErrorInfo::new(code, err.to_string())
}

async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => pending().await,
    }
}

async fn sleep_until_due(due: Option<MonotonicInstant>) {
    match due {
        Some(due) => tokio::time::sleep_until(Instant::from_std(due.as_std())).await,
        None => pending().await,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "tickerd starting");
    if is_mock_time_active() {
        warn!("Mock time is active; start times and stamps are not real");
    }

    let service = Service::new(&args).await?;
    service.run().await
}
