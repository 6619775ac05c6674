/// Silo - declarative object-storage containers
///
/// Creates, updates and deletes Swift-compatible object-storage containers
/// from a YAML declaration and keeps a local state file of what it manages.
mod config;
mod provider;
mod resource;
mod state;
mod swift;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::future::join_all;
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::SiloConfig;
use crate::provider::Provider;
use crate::resource::{plan, Action, ContainerState, PlannedChange};
use crate::state::StateFile;

#[derive(Parser)]
#[command(name = "silo")]
#[command(about = "Manage object-storage containers declaratively", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "silo.yaml")]
    config: PathBuf,

    /// State file path
    #[arg(short, long, default_value = "silo.state.yaml")]
    state: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate example configuration file
    Init,

    /// Show the changes apply would make
    Plan,

    /// Create, update and delete containers to match the configuration
    Apply,

    /// Re-read every managed container into the state file
    Refresh,

    /// Adopt an existing container into the state file
    Import {
        /// Container name
        name: String,

        /// Region of the container (defaults to the provider region)
        #[arg(long)]
        region: Option<String>,
    },

    /// Show managed containers with live usage
    Status,

    /// Delete every managed container
    Destroy,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("silo={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Execute command
    let result = match cli.command {
        Commands::Init => init_config(&cli).await,
        Commands::Plan => show_plan(&cli).await,
        Commands::Apply => apply(&cli).await,
        Commands::Refresh => refresh(&cli).await,
        Commands::Import {
            ref name,
            ref region,
        } => import(&cli, name, region.clone()).await,
        Commands::Status => show_status(&cli).await,
        Commands::Destroy => destroy(&cli).await,
    };

    if let Err(e) = result {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

/// Load configuration, provider and state
async fn load(cli: &Cli) -> Result<(SiloConfig, Provider, StateFile)> {
    let config = SiloConfig::from_file(&cli.config).context("Failed to load configuration")?;
    let provider = Provider::new(config.provider.clone());
    let state = StateFile::load(&cli.state).await?;
    Ok((config, provider, state))
}

/// Re-read every recorded container, dropping the ones that are gone
async fn refresh_all(provider: &Provider, state: &mut StateFile) -> Result<()> {
    let names: Vec<String> = state.names().map(str::to_string).collect();

    for name in names {
        let Some(mut container) = state.get(&name).cloned() else {
            continue;
        };
        let region = container
            .attributes
            .region_or(provider.default_region())
            .to_string();
        let manager = provider.manager(&region).await?;

        manager.read(&mut container).await?;
        if !container.exists() {
            warn!("Container {} no longer exists", name);
        }
        state.record(&container);
    }

    Ok(())
}

/// Record the outcome of an operation and persist it, even when the operation failed
async fn persist(
    cli: &Cli,
    state: &mut StateFile,
    container: &ContainerState,
    result: Result<()>,
) -> Result<()> {
    state.record(container);
    state.save(&cli.state).await?;
    result
}

fn log_plan(changes: &[PlannedChange]) -> usize {
    let mut pending = 0;
    for change in changes {
        let symbol = match change.action {
            Action::Create => "+",
            Action::Update => "~",
            Action::Replace => "-/+",
            Action::Delete => "-",
            Action::NoOp => continue,
        };
        pending += 1;
        if change.fields.is_empty() {
            info!("  {} {} ({})", symbol, change.name, change.action);
        } else {
            info!(
                "  {} {} ({}: {})",
                symbol,
                change.name,
                change.action,
                change.fields.join(", ")
            );
        }
    }
    pending
}

/// Initialize example configuration file
async fn init_config(cli: &Cli) -> Result<()> {
    if cli.config.exists() {
        anyhow::bail!(
            "Configuration file already exists: {}",
            cli.config.display()
        );
    }

    let example_config = SiloConfig::example();
    let yaml = serde_yaml::to_string(&example_config)?;

    tokio::fs::write(&cli.config, yaml)
        .await
        .context("Failed to write configuration file")?;

    info!("Example configuration created: {}", cli.config.display());
    info!("");
    info!("Next steps:");
    info!("  1. Edit the configuration file to match your requirements");
    info!("  2. Provide credentials, either a token and endpoint:");
    info!("     export OS_AUTH_TOKEN=your-token-here");
    info!("     or the keystone password:");
    info!("     export OS_PASSWORD=your-password-here");
    info!("  3. Create the containers:");
    info!("     silo apply");

    Ok(())
}

/// Show planned changes
async fn show_plan(cli: &Cli) -> Result<()> {
    let (config, provider, mut state) = load(cli).await?;
    refresh_all(&provider, &mut state).await?;

    let changes = plan(&config.containers, &state, provider.default_region());
    info!("Planned changes:");
    if log_plan(&changes) == 0 {
        info!("  none, containers match the configuration");
    }

    Ok(())
}

/// Apply the configuration
async fn apply(cli: &Cli) -> Result<()> {
    info!("Applying {}...", cli.config.display());

    let (config, provider, mut state) = load(cli).await?;
    refresh_all(&provider, &mut state).await?;
    state.save(&cli.state).await?;

    let changes = plan(&config.containers, &state, provider.default_region());
    if log_plan(&changes) == 0 {
        info!("✓ Nothing to do, containers match the configuration");
        return Ok(());
    }

    let default_region = provider.default_region().to_string();
    for change in &changes {
        match change.action {
            Action::NoOp => {}
            Action::Create => {
                let spec = config
                    .container(&change.name)
                    .context("Planned container missing from configuration")?;
                let manager = provider.manager(spec.region_or(&default_region)).await?;

                let mut container = ContainerState::default();
                let result = manager.create(spec, &mut container).await;
                persist(cli, &mut state, &container, result).await?;
            }
            Action::Update => {
                let spec = config
                    .container(&change.name)
                    .context("Planned container missing from configuration")?;
                let mut container = state
                    .get(&change.name)
                    .cloned()
                    .context("Planned container missing from state")?;
                let manager = provider.manager(spec.region_or(&default_region)).await?;

                let result = manager.update(spec, &mut container).await;
                persist(cli, &mut state, &container, result).await?;
            }
            Action::Replace => {
                let spec = config
                    .container(&change.name)
                    .context("Planned container missing from configuration")?;
                let mut container = state
                    .get(&change.name)
                    .cloned()
                    .context("Planned container missing from state")?;
                container.attributes.force_destroy = spec.force_destroy;

                let old = provider
                    .manager(container.attributes.region_or(&default_region))
                    .await?;
                let result = old.delete(&mut container).await;
                persist(cli, &mut state, &container, result).await?;

                let new = provider.manager(spec.region_or(&default_region)).await?;
                let mut replacement = ContainerState::default();
                let result = new.create(spec, &mut replacement).await;
                persist(cli, &mut state, &replacement, result).await?;
            }
            Action::Delete => {
                let mut container = state
                    .get(&change.name)
                    .cloned()
                    .context("Planned container missing from state")?;
                let manager = provider
                    .manager(container.attributes.region_or(&default_region))
                    .await?;

                let result = manager.delete(&mut container).await;
                persist(cli, &mut state, &container, result).await?;
            }
        }
    }

    info!("✓ Apply completed successfully");

    Ok(())
}

/// Refresh the state file
async fn refresh(cli: &Cli) -> Result<()> {
    let (_config, provider, mut state) = load(cli).await?;
    refresh_all(&provider, &mut state).await?;
    state.save(&cli.state).await?;

    info!("✓ Refreshed {} containers", state.names().count());

    Ok(())
}

/// Import an existing container
async fn import(cli: &Cli, name: &str, region: Option<String>) -> Result<()> {
    let (_config, provider, mut state) = load(cli).await?;

    if state.get(name).is_some() {
        anyhow::bail!("Container {} is already managed", name);
    }

    let region_name = region
        .clone()
        .unwrap_or_else(|| provider.default_region().to_string());
    let manager = provider.manager(&region_name).await?;

    let mut container = ContainerState::import(name, region);
    manager.read(&mut container).await?;
    if !container.exists() {
        anyhow::bail!("Container {} not found in region {}", name, region_name);
    }

    state.record(&container);
    state.save(&cli.state).await?;

    info!("✓ Imported container {} from region {}", name, region_name);

    Ok(())
}

/// Show managed containers
async fn show_status(cli: &Cli) -> Result<()> {
    let (_config, provider, state) = load(cli).await?;

    if state.is_empty() {
        info!("No containers managed yet");
        return Ok(());
    }

    let lookups = state.names().map(|name| {
        let provider = &provider;
        let container = state.get(name);
        async move {
            let region = container
                .map(|c| c.attributes.region_or(provider.default_region()))
                .unwrap_or(provider.default_region());
            let manager = provider.manager(region).await?;
            manager.inspect(name).await
        }
    });
    let results = join_all(lookups).await;

    info!("Containers:");
    for (name, result) in state.names().zip(results) {
        let Some(container) = state.get(name) else {
            continue;
        };
        let region = container
            .attributes
            .region_or(provider.default_region());
        let versioning = container
            .attributes
            .versioning
            .as_ref()
            .map(|v| format!("{} -> {}", v.kind(), v.location()))
            .unwrap_or_else(|| "none".to_string());

        let updated = state
            .containers
            .get(name)
            .map(|entry| entry.updated_at.to_rfc3339())
            .unwrap_or_default();

        match result {
            Ok(headers) => info!(
                "  - {} (Region: {}, Objects: {}, Bytes: {}, Versioning: {}, Updated: {})",
                name, region, headers.object_count, headers.bytes_used, versioning, updated
            ),
            Err(e) => info!("  - {} (Region: {}, unavailable: {:#})", name, region, e),
        }
    }

    Ok(())
}

/// Delete every managed container
async fn destroy(cli: &Cli) -> Result<()> {
    info!("Destroying managed containers...");

    let (config, provider, mut state) = load(cli).await?;
    let names: Vec<String> = state.names().map(str::to_string).collect();

    for name in names {
        let Some(mut container) = state.get(&name).cloned() else {
            continue;
        };
        if let Some(spec) = config.container(&name) {
            container.attributes.force_destroy = spec.force_destroy;
        }

        let manager = provider
            .manager(container.attributes.region_or(provider.default_region()))
            .await?;
        let result = manager.delete(&mut container).await;
        persist(cli, &mut state, &container, result).await?;
    }

    info!("✓ Containers destroyed successfully");

    Ok(())
}
