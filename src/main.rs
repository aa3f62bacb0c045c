use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, EnvFilter};

use meshtop::config::Config;
use meshtop::display::term::{spawn_input_watcher, CrosstermScreen};
use meshtop::tap::SocketTapStream;
use meshtop::top::Session;

/// Live traffic table for tapped HTTP request streams.
#[derive(Parser)]
#[command(name = "meshtop", about)]
struct Cli {
    /// Tap server address (host:port). Overrides the config file.
    addr: Option<String>,

    /// Path to the YAML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Logging verbosity level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Print version information and exit.
    Version,
}

/// Build-time version info, injected via RUSTFLAGS or build.rs.
mod version {
    /// Release version string (set at build time).
    pub const RELEASE: &str = env!("CARGO_PKG_VERSION");

    /// Git commit hash (set at build time via env, or "unknown").
    pub fn git_commit() -> &'static str {
        option_env!("GIT_COMMIT").unwrap_or("unknown")
    }

    /// Full version string with platform info.
    pub fn full() -> String {
        format!(
            "{} (commit: {}, {}/{})",
            RELEASE,
            git_commit(),
            std::env::consts::OS,
            std::env::consts::ARCH,
        )
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Handle version subcommand before anything else.
    if let Some(Command::Version) = &cli.command {
        println!("meshtop {}", version::full());
        return Ok(());
    }

    // Initialize tracing. Logs go to stderr; stdout belongs to the table.
    let filter = EnvFilter::try_new(&cli.log_level)
        .with_context(|| format!("invalid log level: {}", cli.log_level))?;

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();

    let cfg = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::default(),
    };

    let addr = cli
        .addr
        .or_else(|| (!cfg.tap.addr.is_empty()).then(|| cfg.tap.addr.clone()))
        .context("tap server address is required (pass it as an argument or set tap.addr)")?;

    tracing::info!(
        version = version::RELEASE,
        commit = version::git_commit(),
        %addr,
        "starting meshtop",
    );

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;

    rt.block_on(run(cfg, addr))
}

async fn run(cfg: Config, addr: String) -> Result<()> {
    let cancel = CancellationToken::new();

    // Signals cancel the session like a quit key would.
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let ctrl_c = tokio::signal::ctrl_c();
            let mut sigterm =
                match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    Ok(sigterm) => sigterm,
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to register SIGTERM handler");
                        return;
                    }
                };

            tokio::select! {
                _ = ctrl_c => tracing::info!("received SIGINT, shutting down"),
                _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
            }

            cancel.cancel();
        });
    }

    // Connect before touching the terminal so connection errors print
    // normally.
    let stream = SocketTapStream::connect(&addr, cfg.tap.connect_timeout).await?;
    let screen = CrosstermScreen::new();

    let input = spawn_input_watcher(cancel.clone());

    let result = Session::new(cfg.top, cancel.clone()).run(stream, screen).await;

    // Unblock the input watcher if the session ended on its own.
    cancel.cancel();
    let _ = input.await;

    tracing::info!("meshtop stopped");

    result
}
