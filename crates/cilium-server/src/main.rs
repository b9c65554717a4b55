use cilium_actuator::NodeEnv;
use cilium_core::{
    install_signal_handler, store_in_db, DaemonConfig, Dispatcher, EventProcessor, NodeContext,
    RunnableRegistry,
};
use cilium_policy::FoldMode;
use cilium_server::Adapter;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "cilium-adapter", about = "PowerStrip adapter applying Cilium policies")]
struct Cli {
    /// Daemon config file (TOML).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Port to listen on.
    #[arg(long)]
    port: Option<u16>,

    /// Store backend: memory, file:<path> or an http:// adapter URL.
    #[arg(long)]
    store: Option<String>,

    /// How configs of one user are folded: overwrite or additive.
    #[arg(long)]
    fold_mode: Option<FoldMode>,

    /// Do not listen for Docker events.
    #[arg(long, default_value_t = false)]
    no_events: bool,

    /// Only listen for Docker events, without serving hooks.
    #[arg(long, default_value_t = false)]
    events_only: bool,

    /// Profile files or directories to load before serving.
    #[arg(long = "profile")]
    profiles: Vec<PathBuf>,
}

fn daemon_config(cli: &Cli) -> Result<DaemonConfig, String> {
    let mut config = match &cli.config {
        Some(path) => DaemonConfig::load(path)
            .map_err(|e| format!("failed to read {}: {e}", path.display()))?,
        None => DaemonConfig::default(),
    };
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(store) = &cli.store {
        config.store.clone_from(store);
    }
    if let Some(mode) = cli.fold_mode {
        config.fold_mode = mode;
    }
    if cli.no_events {
        config.events = false;
    }
    if cli.events_only {
        config.events_only = true;
    }
    Ok(config)
}

fn run(cli: &Cli) -> Result<(), String> {
    let config = daemon_config(cli)?;
    let db = cilium_store::select_store(&config.store).map_err(|e| e.to_string())?;
    for path in &cli.profiles {
        let loaded = store_in_db(db.as_ref(), path)
            .map_err(|e| format!("failed to load {}: {e}", path.display()))?;
        info!("loaded {} files from {}", loaded.len(), path.display());
    }

    let env = NodeEnv::from_env();
    info!("node {} ({}), docker at {}", env.hostname, env.host_ip, env.docker_host);
    let ctx = NodeContext::new(db, env)
        .map_err(|e| e.to_string())?
        .with_fold_mode(config.fold_mode);

    if config.events || config.events_only {
        let processor = EventProcessor::new(ctx.clone());
        let listener = processor.start_listener();
        if config.events_only {
            info!("cilium-adapter listening for events only");
            let _ = listener.join();
            return Ok(());
        }
        if config.reconcile {
            let _ = processor.start_reconcile_loop(Duration::from_secs(config.reconcile_interval_secs));
        }
    }

    let dispatcher = Dispatcher::new(ctx, RunnableRegistry::standard()).map_err(|e| e.to_string())?;
    let addr = format!("0.0.0.0:{}", config.port);
    info!("starting cilium-adapter on {addr}, store {}", config.store);
    cilium_server::run_server(&Arc::new(Adapter::new(dispatcher)), &addr);
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    install_signal_handler();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
