use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use embedmongo_engine::{EngineError, HttpClient, NetworkEnvironment, ProxyRoute};

use crate::port::{PortAllocator, PortError};
use crate::supervisor::{ShutdownError, ShutdownSignal};

/// Hands out one fixed port, or fails when none is configured.
#[derive(Debug, Default)]
pub struct FixedPorts {
    port: Option<u16>,
    calls: AtomicUsize,
}

impl FixedPorts {
    pub fn new(port: u16) -> Self {
        Self {
            port: Some(port),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl PortAllocator for FixedPorts {
    fn allocate(&self) -> Result<u16, PortError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.port
            .ok_or_else(|| PortError::from(io::Error::other("no ports left")))
    }
}

#[derive(Debug, Default, Clone)]
pub struct RecordingNetwork {
    routes: Arc<Mutex<Vec<ProxyRoute>>>,
}

impl RecordingNetwork {
    pub fn routes(&self) -> Vec<ProxyRoute> {
        self.routes.lock().expect("network lock").clone()
    }
}

impl NetworkEnvironment for RecordingNetwork {
    fn install_proxy(&self, route: ProxyRoute) {
        self.routes.lock().expect("network lock").push(route);
    }

    fn http_client(&self) -> Result<HttpClient, EngineError> {
        Ok(HttpClient::new())
    }
}

/// Returns from the wait at once and counts how often it was entered.
#[derive(Debug, Default)]
pub struct ImmediateSignal {
    waits: AtomicUsize,
}

impl ImmediateSignal {
    pub fn waits(&self) -> usize {
        self.waits.load(Ordering::SeqCst)
    }
}

impl ShutdownSignal for ImmediateSignal {
    fn wait(&self) -> Result<(), ShutdownError> {
        self.waits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
