//! Ephemeral port allocation.

use std::io;
use std::net::{Ipv4Addr, TcpListener};

use thiserror::Error;

/// Failure to obtain a free port from the operating system.
#[derive(Debug, Error)]
#[error("failed to acquire a random free port: {source}")]
pub struct PortError {
    #[from]
    source: io::Error,
}

/// Source of free ports.
pub trait PortAllocator: Send + Sync {
    /// Returns a port that was free at the time of the call.
    ///
    /// # Errors
    ///
    /// Returns [`PortError`] when the operating system refuses the request.
    fn allocate(&self) -> Result<u16, PortError>;
}

/// Allocates ports by binding port 0 and releasing the socket immediately.
#[derive(Debug, Default, Clone, Copy)]
pub struct EphemeralPortAllocator;

impl PortAllocator for EphemeralPortAllocator {
    fn allocate(&self) -> Result<u16, PortError> {
        let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, 0))
            .map_err(|source| PortError { source })?;
        let port = listener
            .local_addr()
            .map_err(|source| PortError { source })?
            .port();
        drop(listener);
        Ok(port)
    }
}
