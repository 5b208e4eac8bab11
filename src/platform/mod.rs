//! Concrete network transport
//!
//! All HTTP-client code is isolated here; `core` sees only the
//! `CloudTransport` trait.

pub mod http;

pub use http::{session_cookie_expiry, HttpTransport, HttpTransportFactory};
