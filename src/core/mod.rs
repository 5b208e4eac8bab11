//! Core session and alarm logic (transport-agnostic)
//!
//! CRITICAL: This module MUST NOT depend on the HTTP client directly; the
//! network is reached only through [`CloudTransport`].

pub mod commands;
pub mod interpreter;
pub mod manager;
pub mod poller;
pub mod session;

// Test utilities for a scripted cloud (tests only)
#[cfg(test)]
pub mod mock_transport;

pub use commands::arm_payload;
pub use interpreter::{is_affirmative, reduce_alarm_state};
pub use manager::{CloudSessionManager, ManagerConfig};
pub use poller::{StateChange, StatePoller};
pub use session::{
    CloudTransport, RemoteResponse, SessionState, SessionStore, TransportFactory,
};
