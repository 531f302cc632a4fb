//! HTTP client for the eGain indoor sensor API.
//!
//! [`EgainClient`] performs one rate-limited, time-bounded GET per call
//! and decodes the body into a [`Reading`](egain_core::reading::Reading).
//! The poller depends on the [`ReadingSource`] trait rather than the
//! concrete client so that tests can drive it with fakes.

pub mod api;
pub mod error;
pub mod ratelimit;

use async_trait::async_trait;
use egain_core::reading::Reading;
use tokio_util::sync::CancellationToken;

pub use api::EgainClient;
pub use error::FetchError;
pub use ratelimit::RateLimiter;

/// Something that can produce a fresh reading for a sensor id.
#[async_trait]
pub trait ReadingSource: Send + Sync {
    /// Fetch one reading. Implementations must return
    /// [`FetchError::Cancelled`] promptly once `cancel` fires.
    async fn fetch(
        &self,
        sensor_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Reading, FetchError>;
}
