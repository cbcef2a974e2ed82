use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use speaking_practice::app::{self, AppContext};
use speaking_practice::audio::{MicrophoneSource, Signal, SyntheticSource, WavSource};
use speaking_practice::console::{self, ConsolePresenter};
use speaking_practice::{http, AppState, Config, SceneCatalog};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::info;

#[derive(Parser)]
#[command(name = "speaking-practice")]
#[command(about = "Role-play speaking practice client", long_about = None)]
struct Cli {
    /// Config file, without extension
    #[arg(short, long, default_value = "config/speaking-practice")]
    config: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to the backend and practice (default)
    Client {
        /// Backend base URL, overrides server.base_url
        #[arg(short, long)]
        server: Option<String>,

        /// Use a synthetic tone instead of the microphone
        #[arg(long)]
        synthetic: bool,

        /// Loop a WAV file as the microphone
        #[arg(long, conflicts_with = "synthetic")]
        wav: Option<PathBuf>,
    },
    /// Run the practice backend
    Serve {
        #[arg(long)]
        host: Option<String>,

        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "speaking_practice=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let mut cfg = Config::load(&cli.config)?;

    info!("Speaking Practice v{}", env!("CARGO_PKG_VERSION"));

    match cli.command.unwrap_or(Commands::Client {
        server: None,
        synthetic: false,
        wav: None,
    }) {
        Commands::Client {
            server,
            synthetic,
            wav,
        } => {
            if let Some(server) = server {
                cfg.server.base_url = server;
            }
            run_client(cfg, microphone(synthetic, wav)?).await
        }
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                cfg.backend.bind = host;
            }
            if let Some(port) = port {
                cfg.backend.port = port;
            }
            run_backend(cfg).await
        }
    }
}

fn microphone(synthetic: bool, wav: Option<PathBuf>) -> Result<Arc<dyn MicrophoneSource>> {
    if let Some(path) = wav {
        return Ok(Arc::new(WavSource::new(path)));
    }
    if synthetic {
        return Ok(Arc::new(SyntheticSource::new(Signal::Tone {
            frequency_hz: 440.0,
            amplitude: 0.5,
        })));
    }
    default_microphone()
}

#[cfg(feature = "cpal")]
fn default_microphone() -> Result<Arc<dyn MicrophoneSource>> {
    Ok(Arc::new(speaking_practice::audio::CpalSource::new()))
}

#[cfg(not(feature = "cpal"))]
fn default_microphone() -> Result<Arc<dyn MicrophoneSource>> {
    anyhow::bail!("Built without microphone support; pass --synthetic or --wav <file>")
}

async fn run_client(cfg: Config, source: Arc<dyn MicrophoneSource>) -> Result<()> {
    info!("Backend: {}", cfg.server.base_url);
    info!("Microphone: {}", source.name());

    let ctx = AppContext::bootstrap(cfg, source).await;
    info!("{} scenes available", ctx.catalog.scenes().len());

    let (intent_tx, intent_rx) = mpsc::channel(32);
    tokio::spawn(console::read_commands(ctx.catalog.clone(), intent_tx));

    let mut presenter = ConsolePresenter::new();
    app::run(&ctx, intent_rx, &mut presenter).await
}

async fn run_backend(cfg: Config) -> Result<()> {
    let addr = format!("{}:{}", cfg.backend.bind, cfg.backend.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    let state = AppState::new(SceneCatalog::builtin(), &cfg.audio);
    http::serve(listener, state, &cfg.server.socket_path).await
}
