//! ICMP echo latency and loss.
//!
//! Two interchangeable providers sit behind [`PingProvider`]: one drives the
//! system `ping` executable and scrapes its summary, the other sends echo
//! requests itself from an unprivileged ICMP socket. The provider is chosen
//! on the command line.

use crate::cli::PingProviderKind;
use crate::error::Result;
use crate::metrics::PingResponse;
use async_trait::async_trait;

pub mod native;
pub mod system;

pub use native::NativePing;
pub use system::SystemPing;

/// What to ping and how much.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingRequest {
    pub times: u64,
    pub size_in_bytes: usize,
    pub host: String,
}

#[async_trait]
pub trait PingProvider: Send + Sync {
    /// Name used in log lines.
    fn name(&self) -> &'static str;

    /// Send `times` echo requests about one second apart.
    ///
    /// Zero replies is not an error here: it comes back as 100 % loss with
    /// no latency, and the caller decides whether that is fatal.
    async fn ping(&self, request: &PingRequest) -> Result<PingResponse>;
}

pub struct PingProviderFactory;

impl PingProviderFactory {
    /// Create the provider selected by `kind`.
    pub fn create(kind: &PingProviderKind) -> Box<dyn PingProvider> {
        match kind {
            PingProviderKind::System => Box::new(SystemPing::new()),
            PingProviderKind::Native => Box::new(NativePing::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_creates_selected_provider() {
        assert_eq!(PingProviderFactory::create(&PingProviderKind::System).name(), "system");
        assert_eq!(PingProviderFactory::create(&PingProviderKind::Native).name(), "native");
    }
}
