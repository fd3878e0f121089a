// SPDX-License-Identifier: CC-BY-NC-ND-4.0

//! firmwared - entry point
//!
//! Startup order matters: configuration, then the durable record (a failure
//! here is fatal — the process refuses to run without any readable
//! document), then reconciliation of any leftover operation marker, and
//! only then the request surface.

use anyhow::{Context, Result};
use firmwared::agent::Agent;
use firmwared::config::AgentConfig;
use firmwared::executor::Executor;
use firmwared::inspector::Inspector;
use firmwared::notifier::make_sink;
use firmwared::reconciler::reconcile;
use firmwared::store::Store;
use firmwared::tool::{ExternalTool, ShellTool};
use firmwared::{api, Command};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;

const DEFAULT_CONFIG_PATH: &str = "/etc/firmwared/config.json";

#[tokio::main]
async fn main() -> Result<()> {
    let mut config_path =
        std::env::var("FIRMWARED_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

    let args: Vec<String> = std::env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                println!("firmwared - device firmware lifecycle manager");
                println!();
                println!("Usage: firmwared [--config PATH]");
                println!();
                println!("Options:");
                println!("  -c, --config PATH Configuration file (default {DEFAULT_CONFIG_PATH})");
                println!("  -h, --help        Print this help message");
                println!("  -v, --version     Print version");
                return Ok(());
            }
            "--version" | "-v" => {
                println!("{}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--config" | "-c" => {
                i += 1;
                config_path = args
                    .get(i)
                    .cloned()
                    .context("--config requires a path argument")?;
            }
            other => {
                anyhow::bail!("unknown argument: {other}");
            }
        }
        i += 1;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("firmwared=info".parse()?),
        )
        .init();

    info!("Starting firmwared");

    let config = Arc::new(AgentConfig::load(Path::new(&config_path))?);
    info!(
        "Loaded config: port={}, package={}, artifact={}",
        config.port,
        config.package,
        config.artifact_path.display()
    );

    let store = Store::new(config.as_ref());
    let mut record = store.load().context("cannot load any configuration")?;
    info!("Loaded firmware record: version={:?}", record.version);

    let sink = make_sink(config.as_ref())?;
    reconcile(&store, &mut record, sink.as_ref())
        .await
        .context("startup reconciliation failed")?;

    let tool: Arc<dyn ExternalTool> =
        Arc::new(ShellTool::new(Duration::from_secs(config.tool_timeout_secs)));
    let inspector = Inspector::new(tool.clone(), config.clone());
    let executor = Executor::new(store.clone(), tool, config.clone());
    let agent = Agent::new(record, store, inspector, executor);

    let (tx, rx) = mpsc::channel::<Command>(16);
    tokio::spawn(agent.run(rx));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("cannot bind {addr}"))?;
    info!("Listening on {addr}");

    axum::serve(listener, api::router(tx))
        .await
        .context("server error")?;

    Ok(())
}
