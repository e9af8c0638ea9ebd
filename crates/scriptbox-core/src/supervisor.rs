//! Execution supervisor: runs one assembled script under a deadline.
//!
//! The interpreter is synchronous, so each script gets its own OS thread.
//! The async side waits on a oneshot for the thread's verdict and races it
//! against `tokio::time::timeout`; whichever resolves first decides the
//! outcome. On timeout the thread is abandoned, not killed: the shared
//! [`CancelFlag`] is raised so its prints and bridge calls fail from then on.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use anyhow::anyhow;
use starlark::environment::Module;
use starlark::eval::Evaluator;
use starlark::syntax::AstModule;
use starlark::PrintHandler;
use tokio::runtime::Handle;
use tokio::sync::oneshot;

use crate::bridge::NetworkBridge;
use crate::capability::{CapabilityTable, InvocationContext};
use crate::config::LanguageOptions;
use crate::error::Result;
use crate::obs;
use crate::request::InvocationRequest;

/// Name the interpreter reports in error locations.
const SCRIPT_FILE_NAME: &str = "script.star";

/// Raised once the deadline fires. Shared by the supervisor, the output sink
/// and the network bridge of a single invocation.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Collects `print` lines in emission order.
#[derive(Debug)]
pub struct OutputSink {
    lines: Mutex<Vec<String>>,
    cancel: CancelFlag,
}

impl OutputSink {
    pub fn new(cancel: CancelFlag) -> Self {
        Self {
            lines: Mutex::new(Vec::new()),
            cancel,
        }
    }

    /// All lines so far, joined with `\n`.
    pub fn joined(&self) -> String {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .join("\n")
    }
}

impl PrintHandler for OutputSink {
    fn println(&self, text: &str) -> anyhow::Result<()> {
        let mut lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        // Checked under the lock: once the supervisor has cancelled and
        // snapshotted, nothing more can be appended.
        if self.cancel.is_cancelled() {
            return Err(anyhow!("script deadline exceeded"));
        }
        lines.push(text.to_owned());
        Ok(())
    }
}

/// Terminal state of one execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success { output: String },
    RuntimeError { output: String, error: String },
    Timeout { output: String },
}

impl Outcome {
    pub fn output(&self) -> &str {
        match self {
            Outcome::Success { output }
            | Outcome::RuntimeError { output, .. }
            | Outcome::Timeout { output } => output,
        }
    }
}

/// Everything the script thread owns.
struct Job {
    source: String,
    request: Arc<InvocationRequest>,
    bridge: NetworkBridge,
    options: LanguageOptions,
    runtime: Handle,
}

impl Job {
    fn evaluate(self, sink: &OutputSink) -> std::result::Result<(), String> {
        let table = CapabilityTable::build(&self.request);
        let ast = AstModule::parse(SCRIPT_FILE_NAME, self.source, &self.options.dialect())
            .map_err(|e| e.to_string())?;

        let module = Module::new();
        table.install(&module);
        let context = InvocationContext::new(self.bridge, self.runtime);

        let mut eval = Evaluator::new(&module);
        eval.set_print_handler(sink);
        eval.extra = Some(&context);
        eval.eval_module(ast, table.globals())
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

/// Runs scripts on dedicated threads with a wall-clock deadline.
#[derive(Debug, Clone)]
pub struct ExecutionSupervisor {
    deadline: Duration,
    options: LanguageOptions,
}

impl ExecutionSupervisor {
    pub fn new(deadline: Duration, options: LanguageOptions) -> Self {
        Self { deadline, options }
    }

    /// Execute `source` and wait for it to finish or for the deadline.
    ///
    /// `cancel` must be the flag `bridge` was built with. Must be called
    /// from within a tokio runtime; bridge calls are driven on it.
    pub async fn run(
        &self,
        source: String,
        request: Arc<InvocationRequest>,
        bridge: NetworkBridge,
        cancel: CancelFlag,
    ) -> Result<Outcome> {
        let sink = Arc::new(OutputSink::new(cancel.clone()));
        let job = Job {
            source,
            request,
            bridge,
            options: self.options,
            runtime: Handle::current(),
        };

        let (tx, rx) = oneshot::channel();
        let thread_sink = Arc::clone(&sink);
        thread::Builder::new()
            .name("scriptbox-eval".to_string())
            .spawn(move || {
                let verdict = job.evaluate(&thread_sink);
                // The receiver is gone when the deadline already fired.
                let _ = tx.send(verdict);
            })?;

        let outcome = match tokio::time::timeout(self.deadline, rx).await {
            Ok(Ok(Ok(()))) => Outcome::Success {
                output: sink.joined(),
            },
            Ok(Ok(Err(error))) => Outcome::RuntimeError {
                output: sink.joined(),
                error,
            },
            Ok(Err(_closed)) => Outcome::RuntimeError {
                output: sink.joined(),
                error: "script execution aborted unexpectedly".to_string(),
            },
            Err(_elapsed) => {
                cancel.cancel();
                obs::emit_invocation_timed_out(self.deadline.as_millis() as u64);
                Outcome::Timeout {
                    output: sink.joined(),
                }
            }
        };
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SandboxConfig;

    fn supervisor(deadline_ms: u64) -> ExecutionSupervisor {
        ExecutionSupervisor::new(
            Duration::from_millis(deadline_ms),
            LanguageOptions::default(),
        )
    }

    async fn run(supervisor: &ExecutionSupervisor, source: &str) -> Outcome {
        let request = Arc::new(InvocationRequest::default());
        let cancel = CancelFlag::new();
        let bridge = NetworkBridge::new(
            reqwest::Client::new(),
            Arc::clone(&request),
            &SandboxConfig::default(),
            cancel.clone(),
        );
        supervisor
            .run(source.to_string(), request, bridge, cancel)
            .await
            .unwrap()
    }

    #[test]
    fn test_sink_refuses_after_cancel() {
        let cancel = CancelFlag::new();
        let sink = OutputSink::new(cancel.clone());
        sink.println("one").unwrap();
        cancel.cancel();
        assert!(sink.println("two").is_err());
        assert_eq!(sink.joined(), "one");
    }

    #[test]
    fn test_cancel_flag_is_shared_between_clones() {
        let a = CancelFlag::new();
        let b = a.clone();
        assert!(!b.is_cancelled());
        a.cancel();
        assert!(b.is_cancelled());
    }

    #[tokio::test]
    async fn test_prints_are_joined_in_order() {
        let outcome = run(&supervisor(2_000), "print('a')\nprint('b')").await;
        assert_eq!(
            outcome,
            Outcome::Success {
                output: "a\nb".into()
            }
        );
    }

    #[tokio::test]
    async fn test_syntax_error_is_runtime_error() {
        let outcome = run(&supervisor(2_000), "def (:").await;
        match outcome {
            Outcome::RuntimeError { output, error } => {
                assert!(output.is_empty());
                assert!(!error.is_empty());
            }
            other => panic!("expected runtime error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_output_kept_on_error() {
        let outcome = run(&supervisor(2_000), "print('before')\nfail('boom')").await;
        match outcome {
            Outcome::RuntimeError { output, error } => {
                assert_eq!(output, "before");
                assert!(error.contains("boom"));
            }
            other => panic!("expected runtime error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_load_is_disabled() {
        let outcome = run(&supervisor(2_000), "load('x.star', 'y')").await;
        assert!(matches!(outcome, Outcome::RuntimeError { .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_endless_loop_times_out_with_partial_output() {
        let source = "print('started')\nfor i in range(2147483647):\n    for j in range(2147483647):\n        pass\n";
        let outcome = run(&supervisor(200), source).await;
        assert_eq!(
            outcome,
            Outcome::Timeout {
                output: "started".into()
            }
        );
    }
}
