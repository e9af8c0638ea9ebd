//! Deadline enforcement.

use std::time::{Duration, Instant};

use scriptbox_core::{ErrorCode, InvocationRequest, LanguageOptions, SandboxConfig, ScriptRunner};

const ENDLESS: &str = "for i in range(2147483647):\n    for j in range(2147483647):\n        pass\n";

fn runner(deadline_ms: u64) -> ScriptRunner {
    let config = SandboxConfig {
        deadline_ms,
        ..Default::default()
    };
    ScriptRunner::new(config, LanguageOptions::default()).unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_endless_loop_times_out_near_deadline() {
    let runner = runner(300);
    let started = Instant::now();
    let result = runner
        .run_script(InvocationRequest {
            script: format!("print('before')\n{ENDLESS}"),
            ..Default::default()
        })
        .await;
    let elapsed = started.elapsed();

    assert_eq!(result.code, ErrorCode::Timeout);
    assert_eq!(result.code.as_u32(), 5);
    assert_eq!(result.output, "before");
    assert!(!result.error.is_empty());
    assert!(elapsed >= Duration::from_millis(300));
    assert!(elapsed < Duration::from_secs(3), "took {elapsed:?}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_while_true_times_out() {
    let result = runner(300)
        .run_script(InvocationRequest {
            script: "print('spinning')\nwhile True:\n    pass\n".to_string(),
            ..Default::default()
        })
        .await;
    assert_eq!(result.code, ErrorCode::Timeout, "error: {}", result.error);
    assert_eq!(result.output, "spinning");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_runner_keeps_serving_after_timeout() {
    let runner = runner(200);
    let timed_out = runner
        .run_script(InvocationRequest {
            script: ENDLESS.to_string(),
            ..Default::default()
        })
        .await;
    assert_eq!(timed_out.code, ErrorCode::Timeout);

    let next = runner
        .run_script(InvocationRequest {
            script: "print('still here')".to_string(),
            ..Default::default()
        })
        .await;
    assert_eq!(next.code, ErrorCode::Success);
    assert_eq!(next.output, "still here");
}
