//! Process-wide sandbox configuration.
//!
//! Both types are built once at startup and handed to every invocation.
//! Nothing mutates them afterwards.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use starlark::syntax::Dialect;

/// Largest response body the network bridge reads, in bytes.
pub const MAX_RESPONSE_BYTES: usize = 1_000_000;

/// Wall-clock budget for one script.
pub const DEFAULT_DEADLINE_MS: u64 = 3_000;

/// User agent sent on every bridge request.
pub const USER_AGENT: &str = "Mozilla/5.0 (compatible; Architus/1.0; +https://archit.us)";

/// Limits and identification for sandboxed execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SandboxConfig {
    /// Maximum wall-clock time for one invocation (milliseconds).
    pub deadline_ms: u64,
    /// Maximum number of response body bytes handed back to a script.
    pub max_response_bytes: usize,
    /// `User-Agent` header value for outbound requests.
    pub user_agent: String,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            deadline_ms: DEFAULT_DEADLINE_MS,
            max_response_bytes: MAX_RESPONSE_BYTES,
            user_agent: USER_AGENT.to_string(),
        }
    }
}

impl SandboxConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }
}

/// Language features enabled in the interpreter.
///
/// Recursion and reassignment of module-level names are always available in
/// the Starlark runtime we embed, so they have no switch here. `while` loops
/// and set displays are always on too, by way of [`crate::lowering`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct LanguageOptions {
    /// `def` statements, including nested ones.
    pub allow_def: bool,
    pub allow_lambda: bool,
    /// `for`/`if` outside of functions.
    pub allow_top_level_statements: bool,
    /// `load()`; scripts have nothing to load, so this stays off.
    pub allow_load: bool,
}

impl Default for LanguageOptions {
    fn default() -> Self {
        Self {
            allow_def: true,
            allow_lambda: true,
            allow_top_level_statements: true,
            allow_load: false,
        }
    }
}

impl LanguageOptions {
    /// Translate into the interpreter's dialect.
    pub fn dialect(&self) -> Dialect {
        let mut dialect = Dialect::Extended;
        dialect.enable_def = self.allow_def;
        dialect.enable_lambda = self.allow_lambda;
        dialect.enable_top_level_stmt = self.allow_top_level_statements;
        dialect.enable_load = self.allow_load;
        dialect
    }
}
