use anyhow::Context;
use clap::Parser;
use dock_bootstrap::cli::{Args, Commands, ConfigDiscovery, ConfigSource};
use dock_bootstrap::container::{ContainerClient, Inventory};
use dock_bootstrap::provision::{ProvisionReport, Provisioner, StackConfig};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // RUST_LOG wins over the verbosity flag
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(args).await {
        error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    match args.command() {
        Commands::InitConfig => {
            let path = ConfigDiscovery::create_default_user_config()
                .context("Failed to write default configuration")?;
            println!("{}", path.display());
            Ok(())
        }
        Commands::ShowConfig => {
            let (config, source) = load_config(&args)?;
            ConfigDiscovery::show_discovery_info(&source);
            println!();
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
        Commands::Inventory { json } => {
            let (config, _) = load_config(&args)?;
            let client = connect(&config).await?;
            inventory(&client, json).await
        }
        Commands::Provision { json } => {
            let (config, _) = load_config(&args)?;
            let client = connect(&config).await?;
            provision(client, config, json).await
        }
        Commands::Run => {
            let (config, _) = load_config(&args)?;
            let client = connect(&config).await?;
            inventory(&client, false).await?;
            provision(client, config, false).await
        }
    }
}

fn load_config(args: &Args) -> anyhow::Result<(StackConfig, ConfigSource)> {
    let (mut config, source) = ConfigDiscovery::load(args.config.as_deref())
        .context("Failed to load configuration")?;

    ConfigDiscovery::apply_env(&mut config.engine);
    if let Some(host) = &args.host {
        config.engine.host = Some(host.clone());
    }

    config
        .validate()
        .with_context(|| format!("Invalid configuration from {}", source))?;
    info!("Using configuration from {}", source);

    Ok((config, source))
}

async fn connect(config: &StackConfig) -> anyhow::Result<ContainerClient> {
    ContainerClient::connect(&config.engine)
        .await
        .context("Container engine is not reachable")
}

async fn inventory(client: &ContainerClient, json: bool) -> anyhow::Result<()> {
    let inventory = Inventory::collect(client)
        .await
        .context("Failed to list engine resources")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&inventory)?);
    } else {
        print!("{}", inventory.render());
    }
    Ok(())
}

async fn provision(client: ContainerClient, config: StackConfig, json: bool) -> anyhow::Result<()> {
    let provisioner = Provisioner::new(Arc::new(client), config);
    let report = provisioner
        .run()
        .await
        .with_context(|| format!("Provisioning run {} failed", provisioner.run_id()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &ProvisionReport) {
    println!("Provisioning run {} complete", report.run_id);
    println!("  broker image: {} ({})", report.broker_image.id, created(report.broker_image.created));
    println!("  network:      {} ({})", report.network.id, created(report.network.created));
    println!("  coordinator:  {} ({})", report.coordinator.id, created(report.coordinator.created));
    println!("  broker:       {} ({})", report.broker.id, created(report.broker.created));
    if let Some(removed) = &report.removed_database {
        println!("  removed:      {}", removed);
    }
    println!("  database:     {} ({})", report.database.id, created(report.database.created));
    println!("  ready after {} probe(s)", report.readiness_attempts);
    for result in &report.exec_results {
        println!(
            "  {} -> exit {:?}: {}",
            result.command,
            result.exit_code,
            result.output.trim()
        );
    }
    println!("  engine events seen: {}", report.events_seen);
}

fn created(created: bool) -> &'static str {
    if created { "created" } else { "existing" }
}
