//! Structured lifecycle events for script invocations.
//!
//! Every invocation runs inside a `scriptbox.invocation` span carrying a
//! fresh invocation id plus the guild and channel it came from. Events are
//! emitted at `info!` (timeouts at `warn!`) with an `event` field naming them.
//! Script output and message content are never logged, only their sizes.

use tracing::{info, warn};
use uuid::Uuid;

use crate::request::{ErrorCode, InvocationRequest};

/// Span for one invocation. Attach with `Instrument::instrument`.
pub fn invocation_span(request: &InvocationRequest) -> tracing::Span {
    let invocation_id = Uuid::new_v4();
    tracing::info_span!(
        "scriptbox.invocation",
        invocation_id = %invocation_id,
        guild_id = request.guild_id,
        channel_id = request.channel.id,
    )
}

pub fn emit_invocation_started(request: &InvocationRequest) {
    info!(
        event = "invocation.started",
        script_len = request.script.len(),
        author_id = request.message_author.id,
        script_author_id = request.script_author.id,
        count = request.count,
    );
}

pub fn emit_invocation_finished(code: ErrorCode, duration_ms: u64, output_len: usize) {
    info!(
        event = "invocation.finished",
        code = %code,
        errno = code.as_u32(),
        duration_ms = duration_ms,
        output_len = output_len,
    );
}

/// Deadline hit; the interpreter thread has been told to stop.
pub fn emit_invocation_timed_out(deadline_ms: u64) {
    warn!(event = "invocation.timed_out", deadline_ms = deadline_ms);
}

pub fn emit_bridge_request(method: &str, url: &str, status: u16, body_len: usize) {
    info!(
        event = "bridge.request",
        method = %method,
        url = %url,
        status = status,
        body_len = body_len,
    );
}
