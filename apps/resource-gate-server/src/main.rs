mod config;
mod logging;
mod shutdown;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use resource_gate::infra::auth::resolver_from_config;
use resource_gate::infra::grants::StaticPublicGrants;
use resource_gate::infra::storage::InMemoryStorage;
use resource_gate::{ResourceService, router};

use crate::config::AppConfig;

/// Resource Gate Server - authorization and scoped access for table-backed REST resources
#[derive(Parser)]
#[command(name = "resource-gate-server")]
#[command(version)]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port override for the HTTP listener (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Print effective configuration (YAML) and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server
    Run,
    /// Validate configuration, including the table catalog, and exit
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config
        && !path.is_file()
    {
        bail!("config file does not exist: {}", path.display());
    }

    // defaults -> YAML (if provided) -> env (RESOURCE_GATE__*) -> CLI overrides
    let mut config = AppConfig::load(cli.config.as_deref())?;
    config.apply_cli_overrides(cli.port);

    if cli.print_config {
        println!("{}", config.to_yaml()?);
        return Ok(());
    }

    logging::init(&config.logging, cli.verbose)?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_server(&config).await,
        Commands::Check => check_config(&config),
    }
}

fn check_config(config: &AppConfig) -> Result<()> {
    tracing::info!("Checking configuration...");
    let service = build_service(config)?;
    let names = service.catalog().model_names();
    println!(
        "Configuration is valid ({} resources: {})",
        names.len(),
        names.join(", ")
    );
    Ok(())
}

/// Wires the resource service over an in-memory store seeded from config.
fn build_service(config: &AppConfig) -> Result<Arc<ResourceService>> {
    let gate = &config.resource_gate;
    let catalog = Arc::new(gate.build_catalog()?);

    let storage = InMemoryStorage::for_catalog(&catalog);
    for (resource, rows) in &config.seed {
        if !catalog.contains(resource) {
            bail!("seed data for undeclared resource '{resource}'");
        }
        storage.seed(resource, rows.iter().cloned());
        tracing::debug!(resource = %resource, rows = rows.len(), "Seeded resource");
    }

    let service = ResourceService::new(
        gate,
        catalog,
        Arc::new(storage),
        resolver_from_config(gate),
        Arc::new(StaticPublicGrants::from_config(gate)),
    )?;
    Ok(Arc::new(service))
}

async fn run_server(config: &AppConfig) -> Result<()> {
    let service = build_service(config)?;

    let addr = format!("{}:{}", config.server.bind_addr, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "Resource gate server listening");

    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown::signal())
        .await
        .context("HTTP server failed")?;

    tracing::info!("Resource gate server stopped");
    Ok(())
}
