//! Capability connectors: the concrete implementations registered into
//! `CapabilityRegistry` at startup.

pub mod http;
pub mod mock;

pub use http::HttpConnector;
pub use mock::MockConnector;
