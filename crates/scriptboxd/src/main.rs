//! scriptboxd - sandboxed Starlark execution over gRPC.
//!
//! Serves `sandbox.Sandbox/RunStarlarkScript` on `--listen` (default
//! `0.0.0.0:1337`). Every request runs in a fresh interpreter with a 3 s
//! deadline; see `scriptbox-core` for the capability table.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use scriptbox_core::metrics::METRICS;
use scriptbox_core::telemetry::{init_tracing, LogFormat};
use scriptbox_core::{LanguageOptions, SandboxConfig, ScriptRunner};
use tonic::transport::Server;
use tracing::{info, Level};

use scriptboxd::rpc::sandbox_server::SandboxServer;
use scriptboxd::SandboxService;

const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(20);
const KEEPALIVE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(name = "scriptboxd")]
#[command(author = "Architus Developers")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Sandboxed Starlark script execution service", long_about = None)]
struct Cli {
    /// Address to serve gRPC on
    #[arg(long, env = "SCRIPTBOX_LISTEN", default_value = "0.0.0.0:1337")]
    listen: SocketAddr,

    /// Emit JSON-formatted log lines
    #[arg(long, env = "SCRIPTBOX_LOG_JSON")]
    json: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let format = if cli.json {
        LogFormat::Json
    } else {
        LogFormat::Text
    };
    init_tracing(format, level);

    match std::env::var("HTTP_PROXY") {
        Ok(proxy) if !proxy.is_empty() => info!(proxy = %proxy, "outbound requests use proxy"),
        _ => info!("outbound requests go direct"),
    }

    let runner = ScriptRunner::new(SandboxConfig::default(), LanguageOptions::default())
        .context("failed to build script runner")?;
    let service = SandboxService::new(runner);

    info!(
        version = scriptbox_core::VERSION,
        listen = %cli.listen,
        "scriptboxd listening"
    );
    Server::builder()
        .http2_keepalive_interval(Some(KEEPALIVE_INTERVAL))
        .http2_keepalive_timeout(Some(KEEPALIVE_TIMEOUT))
        .add_service(SandboxServer::new(service))
        .serve_with_shutdown(cli.listen, shutdown_signal())
        .await
        .with_context(|| format!("grpc server on {} failed", cli.listen))?;

    METRICS.flush();
    info!("scriptboxd stopped");
    Ok(())
}
