use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use porter_core::config::{load_config, MainConfig};
use porter_core::{Booker, Policy};
use porter_memory::Store;
use porter_provider::{OpenAiProvider, ReplyProvider, StubProvider};
use porter_scheduling::{CalendarGateway, MailGateway, ZoomGateway};
use porter_server::{AppState, CredentialStatus};

#[derive(Parser)]
#[command(name = "porter", version, about = "Portfolio backend with a chat concierge")]
struct Cli {
    #[arg(long, default_value = "porter.yaml", help = "Path to the config file")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Start the HTTP server")]
    Start {
        #[arg(long, help = "Override the configured port")]
        port: Option<u16>,
    },
    #[command(about = "Validate the config file and credentials")]
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)
        .with_context(|| format!("loading config {}", cli.config.display()))?;

    match cli.command {
        Commands::Start { port } => start(config, port).await,
        Commands::Validate => validate(config),
    }
}

fn validate(config: MainConfig) -> Result<()> {
    // load_config already validated structure; check credential files too.
    config.google_credential()?;
    println!("config ok");
    println!("  provider: {}", on_off(config.provider.enabled));
    println!("  zoom:     {}", on_off(config.zoom.enabled));
    println!("  google:   {}", on_off(config.google.enabled));
    Ok(())
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "enabled"
    } else {
        "disabled"
    }
}

async fn start(config: MainConfig, port: Option<u16>) -> Result<()> {
    let reference = config.reference_zone()?;
    let client_zone = config.client_default_zone()?;
    let store = Store::open(&config.store.path)
        .with_context(|| format!("opening store {}", config.store.path))?;

    let provider: Arc<dyn ReplyProvider> = if config.provider.enabled {
        Arc::new(
            OpenAiProvider::new(
                config.provider.api_key.clone(),
                config.provider.base_url.clone(),
            )
            .with_model(config.provider.model.clone()),
        )
    } else {
        tracing::warn!("reply provider disabled, using canned replies only");
        Arc::new(StubProvider)
    };

    let mut booker = Booker::new(reference);
    if let Some(email) = &config.operator_email {
        booker = booker.with_operator_email(email.clone());
    }
    if let Some(credentials) = config.zoom_credentials() {
        booker = booker.with_zoom(ZoomGateway::new(credentials));
    }
    if let Some(credential) = config.google_credential()? {
        let token = Arc::new(porter_auth::GoogleTokenCache::new());
        booker = booker
            .with_calendar(CalendarGateway::new(credential.clone(), token.clone()))
            .with_mail(MailGateway::new(
                credential,
                token,
                config.google.sender.clone(),
            ));
    }
    let booker = Arc::new(booker);

    let credentials = CredentialStatus {
        provider: config.provider.enabled,
        zoom: config.zoom.enabled,
        google: config.google.enabled,
    };
    let policy = Arc::new(Policy::new(
        store.clone(),
        provider,
        booker.clone(),
        client_zone,
    ));
    let state = AppState::new(policy, booker, store, client_zone, credentials);

    let port = port.unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{}:{port}", config.server.host)
        .parse()
        .with_context(|| format!("invalid listen address {}:{port}", config.server.host))?;
    porter_server::serve(addr, state).await
}
