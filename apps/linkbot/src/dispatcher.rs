use link_core::connection::{LiveSocket, MessageDispatcher};

use async_trait::async_trait;
use log::info;

/// Stand-in dispatcher: records that a socket went live. Command routing
/// attaches here.
#[derive(Debug, Default)]
pub struct LoggingDispatcher;

#[async_trait]
impl MessageDispatcher for LoggingDispatcher {
    async fn attach(&self, socket: LiveSocket) {
        info!("Socket {} is live; message dispatch attached", socket.attempt_id);
    }
}
