//! IPC client implementation

use std::path::Path;
use ticker_api::{Command, Event, Request, Response, ResponseResult};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tracing::debug;

use crate::{IpcError, IpcResult};

/// IPC Client for connecting to tickerd
pub struct IpcClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    next_request_id: u64,
}

impl IpcClient {
    /// Connect to tickerd
    pub async fn connect(socket_path: impl AsRef<Path>) -> IpcResult<Self> {
        let stream = UnixStream::connect(socket_path).await?;
        let (read_half, write_half) = stream.into_split();

        Ok(Self {
            reader: BufReader::new(read_half),
            writer: write_half,
            next_request_id: 1,
        })
    }

    /// Send a command and wait for its response.
    ///
    /// Events arriving in between (when subscribed) are skipped.
    pub async fn send(&mut self, command: Command) -> IpcResult<Response> {
        let request_id = self.next_request_id;
        self.next_request_id += 1;

        let request = Request::new(request_id, command);
        let mut json = serde_json::to_string(&request)?;
        json.push('\n');

        self.writer.write_all(json.as_bytes()).await?;

        loop {
            let line = read_message(&mut self.reader).await?;
            let value: serde_json::Value = serde_json::from_str(&line)?;

            if value.get("request_id").is_none() {
                debug!("Skipping event while waiting for response");
                continue;
            }

            let response: Response = serde_json::from_value(value)?;
            if response.request_id == request_id {
                return Ok(response);
            }
            debug!(
                expected = request_id,
                got = response.request_id,
                "Skipping response for another request"
            );
        }
    }

    /// Send a command; turn an error response into `IpcError::ServerError`
    pub async fn call(&mut self, command: Command) -> IpcResult<ResponseResult> {
        let response = self.send(command).await?;
        match response.result {
            ResponseResult::Err(e) => Err(IpcError::ServerError(e.message)),
            ok => Ok(ok),
        }
    }

    /// Subscribe to events and consume this client to return an event stream
    pub async fn subscribe(mut self) -> IpcResult<EventStream> {
        self.call(Command::SubscribeEvents).await?;

        Ok(EventStream {
            reader: self.reader,
            _writer: self.writer,
        })
    }
}

/// Stream of events from tickerd
pub struct EventStream {
    reader: BufReader<OwnedReadHalf>,
    // Kept so the server does not see the connection half-closed
    _writer: OwnedWriteHalf,
}

impl EventStream {
    /// Wait for the next event
    pub async fn next(&mut self) -> IpcResult<Event> {
        let line = read_message(&mut self.reader).await?;
        let event: Event = serde_json::from_str(&line)?;
        Ok(event)
    }
}

async fn read_message(reader: &mut BufReader<OwnedReadHalf>) -> IpcResult<String> {
    let mut line = String::new();
    loop {
        line.clear();
        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            return Err(IpcError::ConnectionClosed);
        }
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            return Ok(trimmed.to_string());
        }
    }
}
