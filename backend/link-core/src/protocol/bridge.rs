//! Session protocol reached through a bridge process.
//!
//! The bridge is any executable that speaks newline-delimited JSON: requests
//! go to its stdin, events come back on its stdout. One bridge process is
//! spawned per socket and killed when the socket is closed or dropped.

use crate::error::connection::ConnectionError;
use crate::protocol::{OpenOptions, SessionProtocol, SocketControl, SocketEvent, SocketHandle};
use crate::session_store::CredentialDelta;

use models::{AuthMethod, CloseCause};

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, trace, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child as TokioChild, ChildStdin, ChildStdout, Command as TokioCommand};
use tokio::spawn as TokioSpawn;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::time::timeout as TokioTimeout;
use uuid::Uuid;

const EVENT_CHANNEL_CAPACITY: usize = 64;
const PAIRING_CODE_TIMEOUT: Duration = Duration::from_secs(30);

type PendingPairing = Arc<StdMutex<HashMap<String, oneshot::Sender<Result<String, String>>>>>;

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum BridgeRequest<'a> {
    Open {
        attempt_id: String,
        method: AuthMethod,
        credentials: Option<&'a Value>,
        connect_timeout_ms: u64,
    },
    RequestPairingCode {
        request_id: &'a str,
        phone: &'a str,
    },
    Close,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum BridgeMessage {
    CredsUpdate {
        delta: Value,
    },
    Qr {
        payload: String,
    },
    PairingReady,
    Connecting,
    Open,
    Close {
        #[serde(default)]
        reason: Option<String>,
        #[serde(default)]
        status_code: Option<u16>,
    },
    PairingCode {
        request_id: String,
        code: String,
    },
    PairingCodeError {
        request_id: String,
        message: String,
    },
}

/// Spawns the configured bridge command for every socket.
#[derive(Debug, Clone)]
pub struct BridgeProtocol {
    program: String,
    args: Vec<String>,
}

impl BridgeProtocol {
    /// Split a command line on whitespace into program and arguments.
    #[track_caller]
    pub fn from_command_line(command_line: &str) -> Result<Self, ConnectionError> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| ConnectionError::protocol("Bridge command is empty"))?;

        Ok(Self {
            program,
            args: parts.collect(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub(crate) fn build_command(&self) -> TokioCommand {
        let mut cmd = TokioCommand::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl SessionProtocol for BridgeProtocol {
    async fn open(&self, options: OpenOptions) -> Result<SocketHandle, ConnectionError> {
        let mut child = self.build_command().spawn().map_err(|e| {
            ConnectionError::protocol(format!("Failed to spawn bridge '{}': {e}", self.program))
        })?;

        debug!(
            "Spawned bridge {} (PID: {:?}) for attempt {}",
            self.program,
            child.id(),
            options.attempt_id
        );

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ConnectionError::protocol("Bridge process has no stdout"))?;
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| ConnectionError::protocol("Bridge process has no stdin"))?;

        if let Some(stderr) = child.stderr.take() {
            TokioSpawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    trace!("Bridge stderr: {line}");
                }
            });
        }

        let open = BridgeRequest::Open {
            attempt_id: options.attempt_id.to_string(),
            method: options.method,
            credentials: options.credentials.as_ref(),
            connect_timeout_ms: u64::try_from(options.connect_timeout.as_millis())
                .unwrap_or(u64::MAX),
        };
        write_request(&mut stdin, &open).await?;

        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let pending: PendingPairing = Arc::new(StdMutex::new(HashMap::new()));

        TokioSpawn(read_bridge_output(stdout, event_tx, Arc::clone(&pending)));

        let control = BridgeControl {
            stdin: Mutex::new(Some(stdin)),
            child: Mutex::new(Some(child)),
            pending,
        };

        Ok(SocketHandle {
            events: event_rx,
            control: Arc::new(control),
        })
    }
}

pub(crate) struct BridgeControl {
    stdin: Mutex<Option<ChildStdin>>,
    child: Mutex<Option<TokioChild>>,
    pending: PendingPairing,
}

impl BridgeControl {
    fn forget(&self, request_id: &str) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(request_id);
        }
    }

    /// A control whose bridge has already gone away.
    #[cfg(test)]
    pub(crate) fn detached() -> Self {
        Self {
            stdin: Mutex::new(None),
            child: Mutex::new(None),
            pending: Arc::new(StdMutex::new(HashMap::new())),
        }
    }

    #[cfg(test)]
    pub(crate) fn pending_requests(&self) -> usize {
        self.pending.lock().map(|pending| pending.len()).unwrap_or_default()
    }
}

#[async_trait]
impl SocketControl for BridgeControl {
    async fn request_pairing_code(&self, normalized_phone: &str) -> Result<String, ConnectionError> {
        let request_id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();

        if let Ok(mut pending) = self.pending.lock() {
            pending.insert(request_id.clone(), tx);
        }

        let sent = {
            let mut stdin_guard = self.stdin.lock().await;
            match stdin_guard.as_mut() {
                Some(stdin) => {
                    let request = BridgeRequest::RequestPairingCode {
                        request_id: &request_id,
                        phone: normalized_phone,
                    };
                    write_request(stdin, &request).await
                }
                None => Err(ConnectionError::pairing_code("Bridge socket is already closed")),
            }
        };
        if let Err(e) = sent {
            self.forget(&request_id);
            return Err(e);
        }

        match TokioTimeout(PAIRING_CODE_TIMEOUT, rx).await {
            Ok(Ok(Ok(code))) => Ok(code),
            Ok(Ok(Err(message))) => Err(ConnectionError::pairing_code(message)),
            Ok(Err(_)) => Err(ConnectionError::pairing_code(
                "Bridge exited before answering the pairing request",
            )),
            Err(_) => {
                self.forget(&request_id);
                Err(ConnectionError::pairing_code(format!(
                    "No pairing code within {PAIRING_CODE_TIMEOUT:?}"
                )))
            }
        }
    }

    async fn close(&self) {
        if let Some(mut stdin) = self.stdin.lock().await.take() {
            if let Err(e) = write_request(&mut stdin, &BridgeRequest::Close).await {
                debug!("Bridge did not accept close request: {e}");
            }
        }

        if let Some(mut child) = self.child.lock().await.take() {
            if let Err(e) = child.kill().await {
                debug!("Bridge already gone on close: {e}");
            } else {
                info!("Bridge process stopped");
            }
        }
    }
}

async fn write_request(
    stdin: &mut ChildStdin,
    request: &BridgeRequest<'_>,
) -> Result<(), ConnectionError> {
    let mut line = serde_json::to_vec(request)?;
    line.push(b'\n');
    stdin.write_all(&line).await?;
    stdin.flush().await?;
    Ok(())
}

async fn read_bridge_output(
    stdout: ChildStdout,
    events: mpsc::Sender<SocketEvent>,
    pending: PendingPairing,
) {
    let mut lines = BufReader::new(stdout).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                debug!("Bridge stdout closed");
                break;
            }
            Err(e) => {
                warn!("Failed to read bridge output: {e}");
                break;
            }
        };

        let message = match serde_json::from_str::<BridgeMessage>(&line) {
            Ok(message) => message,
            Err(_) => {
                trace!("Bridge output: {line}");
                continue;
            }
        };

        let event = match message {
            BridgeMessage::CredsUpdate { delta } => {
                SocketEvent::CredentialsUpdated(CredentialDelta(delta))
            }
            BridgeMessage::Qr { payload } => SocketEvent::Qr(payload),
            BridgeMessage::PairingReady => SocketEvent::PairingReady,
            BridgeMessage::Connecting => SocketEvent::Connecting,
            BridgeMessage::Open => SocketEvent::Open,
            BridgeMessage::Close {
                reason,
                status_code,
            } => SocketEvent::Close(CloseCause::from_wire(reason.as_deref(), status_code)),
            BridgeMessage::PairingCode { request_id, code } => {
                resolve_pairing(&pending, &request_id, Ok(code));
                continue;
            }
            BridgeMessage::PairingCodeError {
                request_id,
                message,
            } => {
                resolve_pairing(&pending, &request_id, Err(message));
                continue;
            }
        };

        if events.send(event).await.is_err() {
            debug!("Socket event receiver dropped; stopping bridge reader");
            break;
        }
    }

    // Fail any request still waiting for an answer.
    if let Ok(mut pending) = pending.lock() {
        pending.clear();
    }
}

fn resolve_pairing(pending: &PendingPairing, request_id: &str, result: Result<String, String>) {
    let sender = pending
        .lock()
        .ok()
        .and_then(|mut pending| pending.remove(request_id));

    match sender {
        Some(sender) => {
            let _ = sender.send(result);
        }
        None => warn!("Bridge answered unknown pairing request {request_id}"),
    }
}
