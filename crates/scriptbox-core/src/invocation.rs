//! Invocation façade: one request in, one result out.

use std::sync::Arc;
use std::time::Instant;

use tracing::Instrument;

use crate::assembler;
use crate::bridge::NetworkBridge;
use crate::config::{LanguageOptions, SandboxConfig};
use crate::error::{Result, ScriptboxError};
use crate::metrics::METRICS;
use crate::obs;
use crate::request::{InvocationRequest, InvocationResult};
use crate::supervisor::{CancelFlag, ExecutionSupervisor, Outcome};

impl From<Outcome> for InvocationResult {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Success { output } => InvocationResult::success(output),
            Outcome::RuntimeError { output, error } => {
                InvocationResult::runtime_error(output, error)
            }
            Outcome::Timeout { output } => InvocationResult::timeout(output),
        }
    }
}

/// Runs scripts. Holds only immutable configuration and the shared HTTP
/// connection pool, so one runner serves any number of concurrent calls.
#[derive(Debug, Clone)]
pub struct ScriptRunner {
    config: SandboxConfig,
    supervisor: ExecutionSupervisor,
    client: reqwest::Client,
}

impl ScriptRunner {
    pub fn new(config: SandboxConfig, options: LanguageOptions) -> Result<Self> {
        if config.deadline_ms == 0 {
            return Err(ScriptboxError::InvalidConfig(
                "deadline_ms must be positive".to_string(),
            ));
        }
        if config.max_response_bytes == 0 {
            return Err(ScriptboxError::InvalidConfig(
                "max_response_bytes must be positive".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .build()?;
        let supervisor = ExecutionSupervisor::new(config.deadline(), options);
        Ok(Self {
            config,
            supervisor,
            client,
        })
    }

    /// Runner with the default limits and language options.
    pub fn with_defaults() -> Result<Self> {
        Self::new(SandboxConfig::default(), LanguageOptions::default())
    }

    /// Assemble, execute and classify one script. Never fails: every
    /// problem is reported through the result's code.
    pub async fn run_script(&self, request: InvocationRequest) -> InvocationResult {
        let span = obs::invocation_span(&request);
        self.execute(request).instrument(span).await
    }

    async fn execute(&self, request: InvocationRequest) -> InvocationResult {
        METRICS.inc_invocations();
        obs::emit_invocation_started(&request);
        let started = Instant::now();

        let request = Arc::new(request);
        let source = assembler::assemble(&request);
        let cancel = CancelFlag::new();
        let bridge = NetworkBridge::new(
            self.client.clone(),
            Arc::clone(&request),
            &self.config,
            cancel.clone(),
        );

        let result = match self.supervisor.run(source, request, bridge, cancel).await {
            Ok(outcome) => InvocationResult::from(outcome),
            Err(e) => {
                tracing::error!(error = %e, "script could not be started");
                InvocationResult::runtime_error(String::new(), e.to_string())
            }
        };

        METRICS.record_outcome(result.code);
        obs::emit_invocation_finished(
            result.code,
            started.elapsed().as_millis() as u64,
            result.output.len(),
        );
        result
    }
}
