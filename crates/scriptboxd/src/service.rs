//! `sandbox.Sandbox` implementation backed by [`ScriptRunner`].

use scriptbox_core::metrics::METRICS;
use scriptbox_core::{
    Channel, ErrorCode, Identity, InvocationRequest, InvocationResult, ScriptRunner,
    TriggerMessage,
};
use tonic::{Request, Response, Status};

use crate::rpc;
use crate::rpc::sandbox_server::Sandbox;

/// Wire request that cannot be turned into an invocation.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("request is missing required field `{0}`")]
    MissingField(&'static str),
}

impl From<rpc::Author> for Identity {
    fn from(author: rpc::Author) -> Self {
        Identity {
            id: author.id,
            name: author.name,
            nick: author.nick,
            display_name: author.disp_name,
            avatar_url: author.avatar_url,
            color: author.color,
            discriminator: author.discriminator,
            roles: author.roles,
            permissions: author.permissions,
        }
    }
}

impl TryFrom<rpc::StarlarkScript> for InvocationRequest {
    type Error = RequestError;

    fn try_from(wire: rpc::StarlarkScript) -> Result<Self, Self::Error> {
        let trigger = wire
            .trigger_message
            .ok_or(RequestError::MissingField("trigger_message"))?;
        let message_author = wire
            .message_author
            .ok_or(RequestError::MissingField("message_author"))?;
        let script_author = wire
            .script_author
            .ok_or(RequestError::MissingField("script_author"))?;
        let channel = wire.channel.ok_or(RequestError::MissingField("channel"))?;

        Ok(InvocationRequest {
            script: wire.script,
            trigger_message: TriggerMessage {
                id: trigger.id,
                content: trigger.content,
                clean: trigger.clean,
            },
            message_author: message_author.into(),
            script_author: script_author.into(),
            channel: Channel {
                id: channel.id,
                name: channel.name,
            },
            guild_id: wire.guild_id,
            count: wire.count,
            captures: wire.captures,
            arguments: wire.arguments,
        })
    }
}

impl From<InvocationResult> for rpc::ScriptOutput {
    fn from(result: InvocationResult) -> Self {
        rpc::ScriptOutput {
            output: result.output,
            error: result.error,
            errno: result.code.as_u32(),
        }
    }
}

/// gRPC front for one shared [`ScriptRunner`].
#[derive(Debug, Clone)]
pub struct SandboxService {
    runner: ScriptRunner,
}

impl SandboxService {
    pub fn new(runner: ScriptRunner) -> Self {
        Self { runner }
    }

    /// Validate and run one wire request. Script problems never become a
    /// transport error; they come back as a non-zero errno.
    pub async fn handle(&self, wire: rpc::StarlarkScript) -> rpc::ScriptOutput {
        match InvocationRequest::try_from(wire) {
            Ok(request) => self.runner.run_script(request).await.into(),
            Err(e) => {
                tracing::warn!(event = "invocation.rejected", error = %e);
                METRICS.record_outcome(ErrorCode::InvalidRequest);
                InvocationResult::invalid_request(e).into()
            }
        }
    }
}

#[tonic::async_trait]
impl Sandbox for SandboxService {
    async fn run_starlark_script(
        &self,
        request: Request<rpc::StarlarkScript>,
    ) -> Result<Response<rpc::ScriptOutput>, Status> {
        Ok(Response::new(self.handle(request.into_inner()).await))
    }
}
