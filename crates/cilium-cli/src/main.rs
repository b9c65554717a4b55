mod commands;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use cilium_core::install_signal_handler;
use cilium_policy::FoldMode;
use commands::EXIT_FAILURE;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "cilium",
    version,
    about = "Load and inspect the policies of the Cilium PowerStrip adapter"
)]
struct Cli {
    /// Store backend: memory, file:<path> or the http:// URL of an adapter.
    #[arg(long, default_value = "http://127.0.0.1:8080", global = true)]
    store: String,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Load profile, DNS and HAProxy files (or directories of them) into the store.
    Load {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Drop users, policies and service records before loading.
        #[arg(long, default_value_t = false)]
        flush: bool,
    },
    /// Drop everything in the store.
    Reset,
    /// Drop users, policies and service records, keeping endpoints and IPs.
    Flush,
    /// Print the configs resolved for a set of labels.
    Resolve {
        /// Label as key=value; repeat for more.
        #[arg(
            long = "label",
            value_name = "KEY=VALUE",
            required = true,
            value_parser = commands::resolve::parse_label
        )]
        labels: Vec<(String, String)>,
        /// Only apply Kubernetes policies of this kind.
        #[arg(long)]
        kind: Option<String>,
        /// Intent fold mode.
        #[arg(long, default_value_t = FoldMode::Overwrite)]
        fold_mode: FoldMode,
        /// Print the covering policies of every user instead.
        #[arg(long, default_value_t = false)]
        user_policies: bool,
    },
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
    /// Generate man pages in the specified directory.
    ManPages {
        /// Output directory for man pages.
        #[arg(default_value = "man")]
        dir: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("CILIUM_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .init();

    install_signal_handler();

    let result = match cli.command {
        Commands::Load { paths, flush } => commands::load::run(&cli.store, &paths, flush),
        Commands::Reset => commands::reset::run(&cli.store),
        Commands::Flush => commands::flush::run(&cli.store),
        Commands::Resolve {
            labels,
            kind,
            fold_mode,
            user_policies,
        } => commands::resolve::run(
            &cli.store,
            &labels.into_iter().collect(),
            kind.as_deref(),
            fold_mode,
            user_policies,
        ),
        Commands::Completions { shell } => commands::completions::run::<Cli>(shell),
        Commands::ManPages { dir } => commands::man_pages::run::<Cli>(&dir),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}
