//! Client boundary for the remote multi-tenant platform.
//!
//! The engine only talks to [`RemoteOperations`]; [`RemoteConnector`] builds
//! one per account. [`HttpRemoteClient`] is the production implementation
//! over the platform's JSON REST API.

pub mod client;
pub mod error;
pub mod http;

pub use client::{HealthStatus, RemoteConnector, RemoteOperations, RemoteResource};
pub use error::RemoteError;
pub use http::{HttpConnector, HttpRemoteClient};
