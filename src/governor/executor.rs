use std::sync::Arc;
use tracing::warn;

use crate::discord::{ApiRequest, ApiResponse, ApiTransport};
use crate::error::ApiError;
use crate::governor::backoff::Backoff;

/// Issues a single request, retrying transient failures with backoff.
pub struct RetryingExecutor {
    transport: Arc<dyn ApiTransport>,
    backoff: Backoff,
    max_retries: u32,
}

impl RetryingExecutor {
    pub fn new(transport: Arc<dyn ApiTransport>, backoff: Backoff, max_retries: u32) -> Self {
        Self {
            transport,
            backoff,
            max_retries,
        }
    }

    /// At most `max_retries + 1` attempts are made. The last error is returned
    /// as-is once the budget is spent or a permanent error shows up.
    pub async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        let mut attempt = 0;
        loop {
            match self.transport.get(request).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    let delay = self.backoff.delay(attempt);
                    warn!(
                        "Discord API {} on {}, retrying attempt {}/{} in {:?}",
                        e.status().unwrap_or_default(),
                        request.endpoint,
                        attempt + 1,
                        self.max_retries,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
