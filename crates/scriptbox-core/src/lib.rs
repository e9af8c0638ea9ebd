//! Scriptbox core library.
//!
//! Runs untrusted Starlark scripts on behalf of chat automation: a fixed
//! capability table, a per-invocation network bridge that tags outbound
//! HTTP with the caller's identity, and a supervisor that enforces a
//! wall-clock deadline.
//!
//! ```ignore
//! let runner = ScriptRunner::with_defaults()?;
//! let result = runner.run_script(request).await;
//! ```

pub mod assembler;
pub mod bridge;
pub mod capability;
pub mod config;
pub mod error;
pub mod identity;
pub mod invocation;
pub mod lowering;
pub mod metrics;
pub mod obs;
pub mod request;
pub mod supervisor;
pub mod telemetry;

pub use bridge::{BridgeError, BridgeResponse, NetworkBridge, PostBody};
pub use config::{LanguageOptions, SandboxConfig, DEFAULT_DEADLINE_MS, MAX_RESPONSE_BYTES};
pub use error::{Result, ScriptboxError};
pub use invocation::ScriptRunner;
pub use request::{
    Channel, ErrorCode, Identity, InvocationRequest, InvocationResult, TriggerMessage,
};
pub use supervisor::{CancelFlag, Outcome};

/// Crate version, reported by the daemon at startup.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
