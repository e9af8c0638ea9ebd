//! Scriptbox daemon: gRPC front end for `scriptbox-core`.

pub mod rpc;
pub mod service;

pub use service::{RequestError, SandboxService};
