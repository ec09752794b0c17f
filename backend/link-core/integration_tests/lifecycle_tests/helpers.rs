//! Test helpers for lifecycle integration tests.
//!
//! - `ScriptedProtocol`: an in-memory session protocol replaying one script per open
//! - `RecordingPresenter`: keeps every line a real terminal would have shown
//! - `harness`: wires a manager over a temporary credential directory

use link_core::auth::{AuthMethodSelector, Prompter, SelectorMode};
use link_core::config::{AuthPreferences, ConnectionConfig};
use link_core::connection::{ConnectionManager, LifecycleContext, LiveSocket, MessageDispatcher, Presenter};
use link_core::error::{AuthError, ConnectionError};
use link_core::protocol::{OpenOptions, SessionProtocol, SocketControl, SocketEvent, SocketHandle};
use link_core::runtime::RuntimeState;
use link_core::session_store::{CredentialDelta, SessionStore};

use models::{AuthMethod, ConnectionStatus};

use std::collections::VecDeque;
use std::future::pending;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::sync::{Notify, mpsc};
use tokio::time::{Instant, sleep};

/// One step of what the fake remote does after an open.
#[derive(Debug, Clone)]
pub enum Step {
    Emit(SocketEvent),
    Wait(Duration),
    /// Keep the socket alive until it is closed from our side.
    Hold,
}

pub fn identity_delta() -> SocketEvent {
    SocketEvent::CredentialsUpdated(CredentialDelta(json!({"me": {"id": "15550001111@s.example"}})))
}

#[derive(Debug, Clone)]
pub struct OpenRecord {
    pub method: AuthMethod,
    pub credentials: Option<Value>,
    pub at: Instant,
}

pub struct ScriptedControl {
    closed: AtomicBool,
    closed_notify: Notify,
    pairing: Result<String, String>,
}

impl ScriptedControl {
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SocketControl for ScriptedControl {
    async fn request_pairing_code(&self, _normalized_phone: &str) -> Result<String, ConnectionError> {
        self.pairing.clone().map_err(ConnectionError::pairing_code)
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.closed_notify.notify_waiters();
    }
}

pub struct ScriptedProtocol {
    scripts: Mutex<VecDeque<Vec<Step>>>,
    opens: Mutex<Vec<OpenRecord>>,
    controls: Mutex<Vec<Arc<ScriptedControl>>>,
    pairing: Result<String, String>,
}

impl ScriptedProtocol {
    pub fn new(scripts: Vec<Vec<Step>>) -> Arc<Self> {
        Self::with_pairing(scripts, Ok("ABCD-1234".to_string()))
    }

    pub fn with_pairing(scripts: Vec<Vec<Step>>, pairing: Result<String, String>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
            opens: Mutex::new(Vec::new()),
            controls: Mutex::new(Vec::new()),
            pairing,
        })
    }

    pub fn opens(&self) -> Vec<OpenRecord> {
        self.opens.lock().unwrap().clone()
    }

    pub fn control(&self, index: usize) -> Arc<ScriptedControl> {
        Arc::clone(&self.controls.lock().unwrap()[index])
    }
}

#[async_trait]
impl SessionProtocol for ScriptedProtocol {
    async fn open(&self, options: OpenOptions) -> Result<SocketHandle, ConnectionError> {
        self.opens.lock().unwrap().push(OpenRecord {
            method: options.method,
            credentials: options.credentials,
            at: Instant::now(),
        });

        // An exhausted script list behaves like a remote that drops at once.
        let script = self.scripts.lock().unwrap().pop_front().unwrap_or_default();
        let control = Arc::new(ScriptedControl {
            closed: AtomicBool::new(false),
            closed_notify: Notify::new(),
            pairing: self.pairing.clone(),
        });
        self.controls.lock().unwrap().push(Arc::clone(&control));

        let (tx, rx) = mpsc::channel(16);
        let remote = Arc::clone(&control);
        tokio::spawn(async move {
            for step in script {
                match step {
                    Step::Emit(event) => {
                        if tx.send(event).await.is_err() {
                            return;
                        }
                    }
                    Step::Wait(delay) => sleep(delay).await,
                    Step::Hold => {
                        let closed = remote.closed_notify.notified();
                        if !remote.is_closed() {
                            closed.await;
                        }
                        return;
                    }
                }
            }
        });

        Ok(SocketHandle {
            events: rx,
            control,
        })
    }
}

#[derive(Default)]
pub struct RecordingPresenter {
    pub qr: Mutex<Vec<(String, u32)>>,
    pub pairing_codes: Mutex<Vec<String>>,
    pub statuses: Mutex<Vec<String>>,
}

impl RecordingPresenter {
    pub fn saw_status(&self, needle: &str) -> bool {
        self.statuses
            .lock()
            .unwrap()
            .iter()
            .any(|line| line.contains(needle))
    }
}

impl Presenter for RecordingPresenter {
    fn show_qr(&self, payload: &str, refresh_index: u32) {
        self.qr.lock().unwrap().push((payload.to_string(), refresh_index));
    }

    fn show_pairing_code(&self, code: &str) {
        self.pairing_codes.lock().unwrap().push(code.to_string());
    }

    fn status(&self, line: &str) {
        self.statuses.lock().unwrap().push(line.to_string());
    }
}

#[derive(Default)]
pub struct CountingDispatcher {
    pub attached: Mutex<usize>,
}

#[async_trait]
impl MessageDispatcher for CountingDispatcher {
    async fn attach(&self, _socket: LiveSocket) {
        *self.attached.lock().unwrap() += 1;
    }
}

/// Never answers: models an operator who walked away from the menu.
pub struct SilentPrompter;

#[async_trait]
impl Prompter for SilentPrompter {
    async fn ask(&mut self, _question: &str) -> Result<Option<String>, AuthError> {
        pending().await
    }

    async fn say(&mut self, _line: &str) -> Result<(), AuthError> {
        Ok(())
    }
}

pub struct Harness {
    pub dir: TempDir,
    pub store: SessionStore,
    pub state: RuntimeState,
    pub protocol: Arc<ScriptedProtocol>,
    pub presenter: Arc<RecordingPresenter>,
    pub dispatcher: Arc<CountingDispatcher>,
    pub connection: ConnectionConfig,
}

impl Harness {
    pub fn new(protocol: Arc<ScriptedProtocol>) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let store = SessionStore::new(dir.path().join("auth"));
        Self {
            dir,
            store,
            state: RuntimeState::new(),
            protocol,
            presenter: Arc::new(RecordingPresenter::default()),
            dispatcher: Arc::new(CountingDispatcher::default()),
            connection: ConnectionConfig::default(),
        }
    }

    pub async fn persist_session(&self) {
        self.store
            .apply_update(&CredentialDelta(json!({"me": {"id": "15550001111@s.example"}})))
            .await
            .expect("Failed to seed session");
    }

    pub fn context(&self) -> LifecycleContext {
        LifecycleContext {
            store: self.store.clone(),
            state: self.state.clone(),
            protocol: self.protocol.clone(),
            presenter: self.presenter.clone(),
            dispatcher: self.dispatcher.clone(),
            connection: self.connection.clone(),
        }
    }

    pub fn manager(&self, mode: SelectorMode) -> ConnectionManager {
        ConnectionManager::new(
            self.context(),
            AuthMethodSelector::new(self.store.clone(), mode),
        )
    }

    pub fn headless_manager(&self) -> ConnectionManager {
        self.manager(SelectorMode::NonInteractive(AuthPreferences::default()))
    }
}

/// Poll until `check` holds, advancing (paused) time in small steps.
pub async fn wait_until<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..10_000 {
        if check().await {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("Timed out waiting for {what}");
}

pub async fn wait_for_status(state: &RuntimeState, status: ConnectionStatus) {
    wait_until(&format!("status {status}"), move || {
        let state = state.clone();
        async move { state.status().await == status }
    })
    .await;
}
