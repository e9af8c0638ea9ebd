//! Capability table: the complete set of names a script can reach.
//!
//! Absence is the sandbox. The interpreter gets the standard Starlark
//! builtins, `struct`, `json` and `print`, the host functions below, the two
//! bridge primitives and a handful of read-only values taken from the
//! request. A fresh table is built for every invocation.

use std::future::Future;

use rand::Rng;
use starlark::any::ProvidesStaticType;
use starlark::environment::{Globals, GlobalsBuilder, LibraryExtension, Module};
use starlark::starlark_module;
use tokio::runtime::Handle;

use crate::bridge::host::bridge_functions;
use crate::bridge::NetworkBridge;
use crate::request::InvocationRequest;

/// Functions and modules registered as interpreter globals.
pub const GLOBAL_FUNCTIONS: &[&str] = &[
    "random",
    "randint",
    "sin",
    "struct",
    "get_internal",
    "post_internal",
    "print",
    "json",
];

/// Request-derived values set on the script module before it runs.
pub const INJECTED_VALUES: &[&str] = &[
    "message_content_full",
    "message_clean_full",
    "caps",
    "args",
    "auth_list",
    "channel_name",
];

#[starlark_module]
fn host_functions(builder: &mut GlobalsBuilder) {
    /// Uniform float in `[0, 1)`.
    fn random() -> anyhow::Result<f64> {
        Ok(rand::thread_rng().gen::<f64>())
    }

    /// `low + floor(r * (high - low))`. Callers must keep `high > low`;
    /// anything else is a degenerate draw with no defined distribution.
    fn randint(low: i64, high: i64) -> anyhow::Result<i64> {
        Ok(draw_int(rand::thread_rng().gen::<f64>(), low, high))
    }

    fn sin(rad: f64) -> anyhow::Result<f64> {
        Ok(rad.sin())
    }
}

/// Map a uniform `r` in `[0, 1)` onto `[low, high)`.
pub(crate) fn draw_int(r: f64, low: i64, high: i64) -> i64 {
    let span = high as f64 - low as f64;
    let drawn = i128::from(low) + (r * span).floor() as i128;
    // Spans past 2^53 round, which can land on `high` itself.
    if high > low {
        drawn.clamp(i128::from(low), i128::from(high) - 1) as i64
    } else {
        drawn as i64
    }
}

/// Per-invocation state reachable from host functions through
/// `Evaluator::extra`, and from nowhere else.
#[derive(ProvidesStaticType)]
pub struct InvocationContext {
    bridge: NetworkBridge,
    runtime: Handle,
}

impl InvocationContext {
    pub fn new(bridge: NetworkBridge, runtime: Handle) -> Self {
        Self { bridge, runtime }
    }

    pub fn bridge(&self) -> &NetworkBridge {
        &self.bridge
    }

    /// Drive an async bridge call to completion from the script thread.
    pub(crate) fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }
}

/// Globals plus injected values for exactly one invocation.
pub struct CapabilityTable {
    globals: Globals,
    message_content_full: String,
    message_clean_full: String,
    caps: Vec<String>,
    args: Vec<String>,
    auth_list: Vec<String>,
    channel_name: String,
}

impl CapabilityTable {
    /// Build the table for `request`.
    pub fn build(request: &InvocationRequest) -> Self {
        let globals = GlobalsBuilder::extended_by(&[
            LibraryExtension::StructType,
            LibraryExtension::Json,
            LibraryExtension::Print,
        ])
        .with(host_functions)
        .with(bridge_functions)
        .build();

        let author = &request.message_author;
        Self {
            globals,
            message_content_full: request.trigger_message.content.clone(),
            message_clean_full: request.trigger_message.clean.clone(),
            caps: request.captures.clone(),
            args: request.arguments.clone(),
            auth_list: vec![
                author.name.clone(),
                author.nick.clone(),
                author.display_name.clone(),
            ],
            channel_name: request.channel.name.clone(),
        }
    }

    pub fn globals(&self) -> &Globals {
        &self.globals
    }

    /// Bind the injected values into `module` ahead of evaluation.
    pub fn install(&self, module: &Module) {
        let heap = module.heap();
        module.set(
            "message_content_full",
            heap.alloc(self.message_content_full.as_str()),
        );
        module.set(
            "message_clean_full",
            heap.alloc(self.message_clean_full.as_str()),
        );
        module.set("caps", heap.alloc(self.caps.clone()));
        module.set("args", heap.alloc(self.args.clone()));
        module.set("auth_list", heap.alloc(self.auth_list.clone()));
        module.set("channel_name", heap.alloc(self.channel_name.as_str()));
    }
}
