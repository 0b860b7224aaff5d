//! Async timeout helpers.

use std::future::Future;
use std::time::Duration;

use crate::error::{DhipError, Result};

/// Default bound for establishing the TCP connection
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default bound for each request, including any login challenge round trips
pub const RESPONSE_TIMEOUT: Duration = Duration::from_secs(10);

/// Delay before a garage door reports itself fully open
pub const GARAGE_OPEN_DELAY: Duration = Duration::from_secs(1);

/// Run `future` for at most `duration`, mapping expiry to `DhipError::Timeout`
pub async fn with_timeout_error<F, T>(future: F, duration: Duration) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(duration, future)
        .await
        .map_err(|_| DhipError::Timeout)?
}
