//! ticker-ctl - Command-line client for tickerd
//!
//! Drives the service over its socket and prints the view it renders.

mod render;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use ticker_api::{AuthMessage, Command, EventPayload, ResponsePayload, ResponseResult};
use ticker_ipc::{IpcClient, IpcError};
use ticker_util::{MeetingId, SessionId, default_socket_path};
use tokio::time::sleep;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::render::{render_health, render_view};

/// ticker-ctl - Watch and control the meeting cost ticker
#[derive(Parser, Debug)]
#[command(name = "ticker-ctl")]
#[command(about = "Watch and control the meeting cost ticker", long_about = None)]
struct Args {
    /// Socket path for tickerd connection (or set TICKER_SOCKET env var)
    #[arg(short, long, env = "TICKER_SOCKET")]
    socket: Option<PathBuf>,

    /// Print raw JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Log level
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: CtlCommand,
}

#[derive(Subcommand, Debug)]
enum CtlCommand {
    /// Show the current screen
    Status,
    /// Follow the screen as it changes; reconnects if the service restarts
    Watch,
    /// Start sign-in and print the URL to open
    Authorize,
    /// Deliver the session id from a completed sign-in
    AuthCallback { session_id: String },
    /// Abandon a sign-in in progress
    CancelAuth,
    /// Announce the add-on panel's meeting
    PanelReady {
        #[arg(long)]
        meeting_id: String,
        /// Base64 `meet_sdk` launch parameter
        #[arg(long)]
        meet_sdk: Option<String>,
    },
    /// Leave the error screen, or restart halted polling
    Retry,
    /// Sign out and stop tracking
    Logout,
    /// Resume tracking the linked meeting
    Start,
    /// Stop tracking
    Stop,
    /// Show service health
    Health,
}

impl CtlCommand {
    fn to_command(&self) -> Option<Command> {
        let command = match self {
            CtlCommand::Watch => return None,
            CtlCommand::Status => Command::GetState,
            CtlCommand::Authorize => Command::BeginAuthorization,
            CtlCommand::AuthCallback { session_id } => Command::AuthMessage {
                message: AuthMessage::AuthSuccess {
                    session_id: SessionId::new(session_id.clone()),
                },
            },
            CtlCommand::CancelAuth => Command::AuthCancelled,
            CtlCommand::PanelReady {
                meeting_id,
                meet_sdk,
            } => Command::PanelReady {
                meet_sdk: meet_sdk.clone(),
                meeting_id: MeetingId::new(meeting_id.clone()),
            },
            CtlCommand::Retry => Command::Retry,
            CtlCommand::Logout => Command::Logout,
            CtlCommand::Start => Command::StartTracking,
            CtlCommand::Stop => Command::StopTracking,
            CtlCommand::Health => Command::GetHealth,
        };
        Some(command)
    }
}

async fn run_once(socket_path: &Path, command: Command, json: bool) -> Result<()> {
    let mut client = IpcClient::connect(socket_path)
        .await
        .with_context(|| format!("Failed to connect to tickerd at {}", socket_path.display()))?;

    let response = client.send(command).await?;
    let payload = match response.result {
        ResponseResult::Ok(payload) => payload,
        ResponseResult::Err(e) => bail!("{:?}: {}", e.code, e.message),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    match payload {
        ResponsePayload::State(snapshot) => println!("{}", render_view(&snapshot.view)),
        ResponsePayload::AuthorizationStarted { auth_url } => {
            println!("Open this URL to sign in:\n  {}", auth_url)
        }
        ResponsePayload::Health(health) => println!("{}", render_health(&health)),
        ResponsePayload::Subscribed { .. } | ResponsePayload::Unsubscribed => {}
        ResponsePayload::Pong => println!("pong"),
    }
    Ok(())
}

/// Follow the view; returns only on service shutdown or a non-connection error
async fn watch(socket_path: &Path, json: bool) -> Result<()> {
    loop {
        match watch_connection(socket_path, json).await {
            Ok(()) => return Ok(()),
            Err(IpcError::Io(e)) => {
                debug!(error = %e, "Connection failed");
            }
            Err(IpcError::ConnectionClosed) => {
                info!("Connection to tickerd closed");
            }
            Err(e) => return Err(e.into()),
        }

        warn!("tickerd unavailable, reconnecting");
        sleep(Duration::from_secs(2)).await;
    }
}

async fn watch_connection(socket_path: &Path, json: bool) -> Result<(), IpcError> {
    let client = IpcClient::connect(socket_path).await?;
    let mut events = client.subscribe().await?;

    loop {
        let event = events.next().await?;
        match event.payload {
            EventPayload::ViewUpdated(view) => {
                if json {
                    println!("{}", serde_json::to_string(&view)?);
                } else {
                    println!("{}\n", render_view(&view));
                }
            }
            EventPayload::AuthorizationRequested { auth_url } => {
                println!("Open this URL to sign in:\n  {}\n", auth_url);
            }
            EventPayload::Shutdown => {
                println!("tickerd shut down");
                return Ok(());
            }
            other => debug!(event = ?other, "Event"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    // Determine socket path with fallback to default
    let socket_path = args.socket.unwrap_or_else(default_socket_path);

    match args.command.to_command() {
        Some(command) => run_once(&socket_path, command, args.json).await,
        None => watch(&socket_path, args.json).await,
    }
}
