//! Execution Handler Port (Driven Port)
//!
//! The downstream consumer of decoded fills (order tracking, notification
//! dispatch). The listener assumes it returns in bounded time.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::execution::ExecutionEvent;

/// Error returned by an execution handler.
///
/// The listener logs it and moves on to the next frame.
#[derive(Debug, Clone, thiserror::Error)]
pub enum HandlerError {
    /// The receiving side of a channel handler was dropped.
    #[error("execution channel closed")]
    ChannelClosed,

    /// The handler rejected or failed to process the event.
    #[error("execution handler failed: {message}")]
    Failed {
        /// Failure description.
        message: String,
    },
}

/// Consumer of decoded execution events.
#[async_trait]
pub trait ExecutionHandler: Send + Sync {
    /// Called once per decoded execution frame.
    async fn on_execution(&self, event: ExecutionEvent) -> Result<(), HandlerError>;
}

#[async_trait]
impl ExecutionHandler for mpsc::Sender<ExecutionEvent> {
    async fn on_execution(&self, event: ExecutionEvent) -> Result<(), HandlerError> {
        self.send(event).await.map_err(|_| HandlerError::ChannelClosed)
    }
}
