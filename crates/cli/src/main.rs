use std::{path::PathBuf, sync::Arc};

use {
    anyhow::{Context, Result},
    clap::{Parser, Subcommand},
    tracing::{info, warn},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
    vtod_channels::{NotifierFactory, NotifierSettings},
    vtod_config::{ConfigStore, DEFAULT_DATA_DIR, EnsureOutcome},
    vtod_discord::DiscordFactory,
    vtod_proxy::{BridgePlugin, EventBus, EventManager, PLUGIN, ProxyEvent},
};

#[derive(Parser)]
#[command(name = "vtod", about = "Velocity-to-Discord: proxy lifecycle notifications", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Plugin data directory holding config.yml.
    #[arg(long, global = true, env = "VTOD_DATA_DIR", default_value = DEFAULT_DATA_DIR)]
    data_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Announce proxy start, wait for Ctrl-C, announce shutdown.
    Run,
    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Post one message to the configured channel.
    Send {
        #[arg(short, long)]
        message: String,
        /// Embed accent colour as RRGGBB hex.
        #[arg(long, value_parser = parse_color, default_value = "2ecc71")]
        color: u32,
        /// Author icon; sends an embed instead of plain text when set.
        #[arg(long)]
        image_url: Option<String>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective config (token redacted).
    Show,
    /// Write the default config if missing or outdated.
    Init,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    let store = ConfigStore::new(cli.data_dir.clone());

    match cli.command {
        Commands::Run => run(store).await,
        Commands::Config { action } => match action {
            ConfigAction::Show => show_config(&store),
            ConfigAction::Init => init_config(&store),
        },
        Commands::Send {
            message,
            color,
            image_url,
        } => send(&store, &message, color, image_url.as_deref()).await,
    }
}

/// Stand in for the proxy host: fire initialize, wait, fire shutdown.
async fn run(store: ConfigStore) -> Result<()> {
    info!(
        plugin = PLUGIN.id,
        name = PLUGIN.name,
        version = PLUGIN.version,
        data_dir = %store.data_dir().display(),
        "vtod starting"
    );

    let bus = EventBus::new();
    let plugin = BridgePlugin::builder(store, Arc::new(DiscordFactory)).build();
    bus.register(&PLUGIN, plugin.clone());

    bus.fire(ProxyEvent::Initialize).await;
    if !plugin.is_running().await {
        warn!("bridge did not start, waiting for shutdown anyway");
    }

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    info!("shutdown requested");

    bus.fire(ProxyEvent::Shutdown).await;
    Ok(())
}

fn init_config(store: &ConfigStore) -> Result<()> {
    let path = store.config_path();
    match store.ensure()? {
        EnsureOutcome::Existing => println!("{} is up to date", path.display()),
        EnsureOutcome::Created => println!("wrote default config to {}", path.display()),
        EnsureOutcome::Replaced {
            stale_version,
            backup,
        } => println!(
            "replaced outdated config (version {}) at {}; previous file kept at {}",
            stale_version.map_or_else(|| "unknown".to_string(), |v| v.to_string()),
            path.display(),
            backup.display()
        ),
    }
    Ok(())
}

fn show_config(store: &ConfigStore) -> Result<()> {
    store.ensure()?;
    let config = store.load()?;
    println!("path:           {}", store.config_path().display());
    println!("token:          {}", if config.has_token() { "<set>" } else { "<empty>" });
    println!(
        "channel_id:     {}",
        config
            .channel_id
            .map_or_else(|| "<none>".to_string(), |id| id.to_string())
    );
    println!("online_status:  {}", config.presence());
    println!("start_message:  {}", config.start_message());
    println!("stop_message:   {}", config.stop_message());
    Ok(())
}

async fn send(
    store: &ConfigStore,
    message: &str,
    color: u32,
    image_url: Option<&str>,
) -> Result<()> {
    let config = store
        .load()
        .context("no usable config, run `vtod config init` first")?;
    let settings = NotifierSettings::from_config(&config);
    let notifier = DiscordFactory
        .connect(&settings)
        .await
        .context("failed to open discord session")?;

    match image_url {
        Some(url) => notifier.send_embed(message, color, url).await,
        None => notifier.send_text(message).await,
    }
    notifier.shutdown().await;
    Ok(())
}

fn parse_color(raw: &str) -> Result<u32, String> {
    let hex = raw.trim().trim_start_matches('#').trim_start_matches("0x");
    u32::from_str_radix(hex, 16)
        .ok()
        .filter(|c| *c <= 0xFF_FFFF)
        .ok_or_else(|| format!("invalid color {raw:?}, expected RRGGBB hex"))
}
