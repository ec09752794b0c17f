//! Connection lifecycle: one attempt at a time, classified closes, bounded
//! retries.

pub mod classify;
pub mod dispatch;
pub mod machine;
pub mod manager;
pub mod presenter;
pub mod reconnect;
pub mod session;

pub use classify::classify;
pub use dispatch::{LiveSocket, MessageDispatcher};
pub use machine::{AttemptEffect, AttemptEnd, AttemptInput, AttemptMachine, AttemptPhase, TimeoutKind};
pub use manager::{ConnectionManager, LifecycleExit};
pub use presenter::Presenter;
pub use reconnect::ReconnectPolicy;
pub use session::{ConnectionSession, SessionOutcome};

use crate::config::ConnectionConfig;
use crate::protocol::SessionProtocol;
use crate::runtime::RuntimeState;
use crate::session_store::SessionStore;

use std::sync::Arc;

/// Collaborators shared by the manager and every session it runs.
#[derive(Clone)]
pub struct LifecycleContext {
    pub store: SessionStore,
    pub state: RuntimeState,
    pub protocol: Arc<dyn SessionProtocol>,
    pub presenter: Arc<dyn Presenter>,
    pub dispatcher: Arc<dyn MessageDispatcher>,
    pub connection: ConnectionConfig,
}
