use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use immosync::config::AppConfig;
use immosync::hooks::HookSet;
use immosync::mapping::InterfaceDefinition;
use immosync::services::sync::Importer;
use immosync::services::telemetry::TelemetryClient;
use immosync::store::postgres::PgStore;
use immosync::store::RecordStore;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Debug, Parser)]
#[command(name = "immosync", about = "OpenImmo feed import and catalog sync")]
struct Cli {
    /// Interface definition TOML (overrides INTERFACE_CONFIG)
    #[arg(long)]
    interface: Option<PathBuf>,

    /// Operator name recorded in the sync history
    #[arg(long, env = "IMPORT_OPERATOR", default_value = "console")]
    operator: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List syncable files with their prior sync status
    List,
    /// Import a feed file (XML or zip archive)
    Sync {
        file: PathBuf,
        /// Leave the interface's last-sync timestamp untouched
        #[arg(long)]
        skip_timestamp: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "immosync=info".into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env()?;

    let pool =
        immosync::db::create_pool(&config.database_url, config.database_max_connections).await?;
    let store = PgStore::new(pool);
    store.migrate().await?;

    let interface_path = cli
        .interface
        .as_deref()
        .unwrap_or(config.interface_config.as_path());
    let definition = InterfaceDefinition::load(interface_path)?;

    let store: Arc<dyn RecordStore> = Arc::new(store);
    let mut importer = Importer::new(store, definition, HookSet::new(), cli.operator)?;
    if let Some(endpoint) = &config.telemetry_endpoint {
        importer = importer.with_telemetry(TelemetryClient::new(endpoint, env!("CARGO_PKG_VERSION")));
    }

    match cli.command {
        Command::List => {
            let overview = importer.overview().await?;
            if overview.files.is_empty() {
                println!("No syncable files found.");
            }
            for file in overview.files {
                let status = file
                    .status
                    .map(|s| format!("{}", s.code()))
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{}\t{} bytes\t{}\tstatus {}\tby {}",
                    file.path.display(),
                    file.size,
                    file.modified.format("%Y-%m-%d %H:%M:%S"),
                    status,
                    file.synced_by.as_deref().unwrap_or("-"),
                );
            }
        }
        Command::Sync {
            file,
            skip_timestamp,
        } => {
            importer.update_sync_time = !skip_timestamp;
            let report = importer.sync_file(&file).await?;
            tracing::info!(
                status = report.status.code(),
                listings = report.listings,
                created = report.created,
                updated = report.updated,
                deleted = report.deleted,
                skipped = report.skipped,
                "{}",
                report.message
            );
            println!("{}", report.message);
        }
    }

    Ok(())
}
