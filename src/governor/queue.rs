use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::discord::{ApiRequest, ApiResponse};
use crate::error::ApiError;
use crate::governor::executor::RetryingExecutor;

struct QueuedRequest {
    request: ApiRequest,
    reply: oneshot::Sender<Result<ApiResponse, ApiError>>,
}

/// FIFO of outbound requests drained by exactly one worker task.
///
/// The worker sleeps `delay` before every dispatch, so callers never talk to
/// Discord faster than one request per `delay` no matter how many of them
/// enqueue at once. Dropping the queue lets the worker finish whatever is
/// already queued and then exit.
pub struct RequestQueue {
    sender: mpsc::UnboundedSender<QueuedRequest>,
}

impl RequestQueue {
    /// Spawns the worker on the current tokio runtime.
    pub fn spawn(executor: Arc<RetryingExecutor>, delay: Duration) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        tokio::spawn(drain(receiver, executor, delay));
        Self { sender }
    }

    pub async fn enqueue(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let (reply, outcome) = oneshot::channel();
        self.sender
            .send(QueuedRequest { request, reply })
            .map_err(|_| ApiError::QueueClosed)?;
        outcome.await.map_err(|_| ApiError::QueueClosed)?
    }
}

async fn drain(
    mut receiver: mpsc::UnboundedReceiver<QueuedRequest>,
    executor: Arc<RetryingExecutor>,
    delay: Duration,
) {
    while let Some(QueuedRequest { request, reply }) = receiver.recv().await {
        tokio::time::sleep(delay).await;
        debug!("Discord API queue: dispatching {}", request.endpoint);
        let outcome = executor.execute(&request).await;
        // The caller may have given up waiting; the request still counted.
        let _ = reply.send(outcome);
    }
    info!("Discord API queue: worker stopped");
}
