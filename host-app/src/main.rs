//! Worker-process host for the studio bridge.
//!
//! `serve` runs the worker: the built-in service graph behind an IPC server
//! on a Unix domain socket. `call` and `listen` are one-shot window-side
//! clients for exercising a running worker from the command line.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::info;

#[derive(Parser)]
#[command(name = "studio-host", about = "Worker-process host for the studio bridge")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the worker process and serve window connections.
    Serve {
        /// Socket path windows connect to.
        #[arg(long, default_value = "/tmp/studio-bridge.sock")]
        socket: PathBuf,
    },

    /// Call one method on a running worker and print the result.
    Call {
        /// Socket path of the running worker.
        #[arg(long, default_value = "/tmp/studio-bridge.sock")]
        socket: PathBuf,

        /// Target service or resource identifier.
        resource: String,

        /// Method to invoke.
        method: String,

        /// Call arguments as a JSON array.
        args: Option<String>,
    },

    /// Subscribe to a resource's events and print them as JSON lines.
    Listen {
        /// Socket path of the running worker.
        #[arg(long, default_value = "/tmp/studio-bridge.sock")]
        socket: PathBuf,

        /// Resource whose events to print.
        resource: String,
    },
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Command::Serve { socket } => serve(socket).await,
        Command::Call {
            socket,
            resource,
            method,
            args,
        } => call(socket, resource, method, args).await,
        Command::Listen { socket, resource } => listen(socket, resource).await,
    }
}

#[cfg(unix)]
async fn serve(socket: PathBuf) -> anyhow::Result<()> {
    use std::sync::Arc;

    use studio_services::{builtin_registry, Dispatcher, EventHub};
    use studio_transport::IpcServer;

    info!("Starting studio worker");

    let events = Arc::new(EventHub::new());
    let registry = builtin_registry(&events);
    let dispatcher = Arc::new(Dispatcher::new(registry));
    let server = IpcServer::new(dispatcher, events);

    tokio::select! {
        result = server.listen_unix(&socket) => {
            result.with_context(|| format!("serving on {}", socket.display()))?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown requested");
        }
    }

    server.shutdown();
    info!("Worker stopped");
    Ok(())
}

#[cfg(unix)]
async fn call(
    socket: PathBuf,
    resource: String,
    method: String,
    args: Option<String>,
) -> anyhow::Result<()> {
    use studio_transport::IpcClient;

    let args: Vec<Value> = match args {
        Some(raw) => serde_json::from_str(&raw).context("arguments must be a JSON array")?,
        None => Vec::new(),
    };

    let client = IpcClient::connect_unix(&socket)
        .await
        .with_context(|| format!("connecting to {}", socket.display()))?;

    let result = client
        .call(resource, method, args)
        .await
        .context("call failed")?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

#[cfg(unix)]
async fn listen(socket: PathBuf, resource: String) -> anyhow::Result<()> {
    use studio_transport::IpcClient;

    let client = IpcClient::connect_unix(&socket)
        .await
        .with_context(|| format!("connecting to {}", socket.display()))?;
    client
        .subscribe(&resource)
        .await
        .with_context(|| format!("subscribing to {resource}"))?;

    let mut events = client.events();
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => println!("{}", serde_json::to_string(&event)?),
                Err(_) => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    Ok(())
}

#[cfg(not(unix))]
async fn serve(_socket: PathBuf) -> anyhow::Result<()> {
    anyhow::bail!("the bridge socket requires a Unix platform")
}

#[cfg(not(unix))]
async fn call(
    _socket: PathBuf,
    _resource: String,
    _method: String,
    _args: Option<String>,
) -> anyhow::Result<()> {
    anyhow::bail!("the bridge socket requires a Unix platform")
}

#[cfg(not(unix))]
async fn listen(_socket: PathBuf, _resource: String) -> anyhow::Result<()> {
    anyhow::bail!("the bridge socket requires a Unix platform")
}
