use crate::protocol::SocketControl;

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

/// A socket that reached `Open`.
#[derive(Clone)]
pub struct LiveSocket {
    pub attempt_id: Uuid,
    pub control: Arc<dyn SocketControl>,
}

/// Receives the live socket once the connection is up. Message routing is
/// the dispatcher's business, not the lifecycle's.
#[async_trait]
pub trait MessageDispatcher: Send + Sync {
    async fn attach(&self, socket: LiveSocket);
}
