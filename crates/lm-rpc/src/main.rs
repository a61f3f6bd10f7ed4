//! Learning Machine RPC Server - JSON-RPC backend for the labelling frontend.
//!
//! This binary provides a JSON-RPC 2.0 server that wraps the learning-machine
//! library: it serves faces with model predictions, trains on annotations and
//! keeps the session's exclusion list on disk.

mod handlers;
mod server;
mod wrapper;

use anyhow::Result;
use clap::Parser;
use learning_machine::config::AppConfig;
use learning_machine::{DatasetKey, MachineContext, ModelKey};
use server::AppState;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "lm-rpc")]
#[command(about = "JSON-RPC server for the Learning Machine")]
struct Args {
    /// Port to listen on (0 = auto-assign)
    #[arg(short, long, default_value = "0")]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Data root holding weights, datasets and session state
    /// (defaults to the platform data directory)
    #[arg(long)]
    data_root: Option<PathBuf>,

    /// Model variant (linear, mlp)
    #[arg(long, default_value = "linear")]
    model: String,

    /// Dataset (fer2013, fer2013-train)
    #[arg(long, default_value = "fer2013")]
    dataset: String,

    /// Write a freshly initialised checkpoint if none is cached
    #[arg(long)]
    init_weights: bool,

    /// Seed for face draws and initial weights
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    info!("Starting {} RPC Server", AppConfig::APP_NAME);

    let model = ModelKey::from_str(&args.model)?;
    let dataset = DatasetKey::from_str(&args.dataset)?;

    let data_root = match args.data_root {
        Some(path) => path,
        None => match dirs::data_dir() {
            Some(dir) => dir.join("learning-machine"),
            None => std::env::current_dir()?.join("lm-data"),
        },
    };

    info!("Data root: {}", data_root.display());
    info!("Model: {}, dataset: {}", model, dataset);

    let mut builder = MachineContext::builder(&data_root)
        .model(model)
        .dataset(dataset)
        .auto_create_dirs(true);
    if let Some(seed) = args.seed {
        builder = builder.seed(seed);
    }
    let state = AppState::new(builder.build()?);

    if args.init_weights {
        let seed = args.seed.unwrap_or(0);
        let path = state
            .with_context(move |context| context.machine().write_initial_weights(seed))
            .await?;
        info!("Initial weights available at {}", path.display());
    }

    // Start the server
    let addr = server::start_server(state.clone(), &args.host, args.port).await?;

    // Print port for the frontend launcher to read (intentional stdout for IPC)
    println!("RPC_PORT={}", addr.port());

    info!("RPC server running on {}", addr);

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, persisting session");
    state.with_context(|context| context.persist()).await?;

    Ok(())
}
