use alerter::TelegramAlerter;
use anyhow::Context;
use api_client::{CbrRateClient, GoogleSheetsClient, RateCache};
use clap::{Parser, Subcommand};
use configuration::{JobKind, Settings};
use database::{DbRepository, OrderStore};
use engine::{reset_notifications, JobRunner, Notifier, OrderReconciler, Scheduler};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use web_server::AppState;

/// Mirrors an order spreadsheet into Postgres, converts prices at the
/// central-bank rate and alerts on missed delivery dates.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file. Defaults to `config.toml` in the working directory, if present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every job on its schedule and serve the reporting API.
    Serve {
        /// Listen address, overriding `[server]` from the configuration.
        #[arg(long)]
        addr: Option<SocketAddr>,
    },
    /// Run a single job once and exit.
    Run {
        #[arg(value_enum)]
        job: JobKind,
    },
    /// Apply pending database migrations and exit.
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let settings = configuration::load_config(cli.config.as_deref()).context("Failed to load configuration")?;
    // Dropping the guard flushes and stops the file writer, so hold it until exit.
    let _log_guard = configuration::init_tracing(&settings.logging)?;

    let pool = database::connect(&settings.database).await?;
    database::run_migrations(&pool).await?;
    if let Commands::Migrate = cli.command {
        tracing::info!("Migrations applied.");
        return Ok(());
    }
    let store: Arc<dyn OrderStore> = Arc::new(DbRepository::new(pool));

    match cli.command {
        Commands::Serve { addr } => {
            let runner = Arc::new(build_runner(&settings, store.clone())?);
            serve(settings, runner, store, addr).await
        }
        Commands::Run { job } => run_once(&settings, store, job).await,
        Commands::Migrate => Ok(()),
    }
}

fn build_runner(settings: &Settings, store: Arc<dyn OrderStore>) -> anyhow::Result<JobRunner> {
    let source = GoogleSheetsClient::new(&settings.sheets, &settings.http).context("Failed to set up the Sheets client")?;
    let rates = CbrRateClient::new(&settings.rate, &settings.http)?;
    let sink = TelegramAlerter::new(&settings.telegram, &settings.http)?;
    Ok(JobRunner::new(
        store,
        Arc::new(source),
        Arc::new(rates),
        Arc::new(sink),
        settings.sheets.sheet_name.clone(),
        &settings.rate,
    ))
}

/// Runs one job, building only the external clients that job talks to.
async fn run_once(settings: &Settings, store: Arc<dyn OrderStore>, job: JobKind) -> anyhow::Result<()> {
    match job {
        JobKind::RefreshRate => {
            let rates = CbrRateClient::new(&settings.rate, &settings.http)?;
            let snapshot = engine::refresh_rate(&RateCache::new(), &rates, &settings.rate).await?;
            tracing::info!(job = job.name(), rate = %snapshot.rate, "Job finished.");
        }
        JobKind::Sync => {
            // The rate cache lives in this process only, so fill it first.
            let cache = RateCache::new();
            let rates = CbrRateClient::new(&settings.rate, &settings.http)?;
            engine::refresh_rate(&cache, &rates, &settings.rate).await?;
            let source = GoogleSheetsClient::new(&settings.sheets, &settings.http)
                .context("Failed to set up the Sheets client")?;
            let result = OrderReconciler::new(Arc::new(source), cache, store)
                .synchronize(&settings.sheets.sheet_name)
                .await?;
            tracing::info!(job = job.name(), ?result, "Job finished.");
        }
        JobKind::Notify => {
            let sink = TelegramAlerter::new(&settings.telegram, &settings.http)?;
            let result = Notifier::new(store, Arc::new(sink)).notify_expired().await?;
            tracing::info!(job = job.name(), ?result, "Job finished.");
        }
        JobKind::Reset => {
            let reset = reset_notifications(store.as_ref()).await?;
            tracing::info!(job = job.name(), reset, "Job finished.");
        }
    }
    Ok(())
}

async fn serve(
    settings: Settings,
    runner: Arc<JobRunner>,
    store: Arc<dyn OrderStore>,
    addr: Option<SocketAddr>,
) -> anyhow::Result<()> {
    let addr = match addr {
        Some(addr) => addr,
        None => format!("{}:{}", settings.server.host, settings.server.port)
            .parse()
            .context("Invalid [server] host/port")?,
    };

    let handles = Scheduler::new(runner, settings.schedule.clone()).start().await?;
    let state = Arc::new(AppState::new(store, &settings.rate));

    let result = tokio::select! {
        result = web_server::run_server(addr, state) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown requested.");
            Ok(())
        }
    };

    for handle in handles {
        handle.abort();
    }
    result
}
