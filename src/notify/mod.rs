pub mod sms;

use async_trait::async_trait;

use crate::errors::TransportError;

/// Outbound message transport. Phone numbers reaching this boundary are
/// already normalized E.164.
#[async_trait]
pub trait AlertTransport: Send + Sync {
    async fn send(&self, phone: &str, message: &str) -> Result<(), TransportError>;
    fn is_configured(&self) -> bool;
}
