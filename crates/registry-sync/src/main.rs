// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Registry Sync CLI
//!
//! Loads a registry snapshot into an in-memory registry, runs the sync engine
//! against it and answers queries as JSON.
//!
//! # Usage
//!
//! ```bash
//! # Generate a configuration file
//! registry-sync gen-config --output registry-sync.json
//!
//! # List provided services
//! registry-sync --snapshot snapshot.txt services
//!
//! # Providers of one service key
//! registry-sync --snapshot snapshot.txt providers --service com.foo.Bar:1.0
//!
//! # Fuzzy search
//! registry-sync --snapshot snapshot.txt search --kind service --filter "com.foo.*"
//! ```

use clap::{Parser, Subcommand};
use registry_sync::config_center;
use registry_sync::{
    EngineConfig, MemoryDiscovery, MemoryRegistry, SearchKind, ServiceKey, SyncEngine,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Registry snapshot sync and query engine
#[derive(Parser, Debug)]
#[command(name = "registry-sync")]
#[command(about = "Registry snapshot sync - mirror and query service registry state")]
#[command(version)]
struct Args {
    /// Configuration file path (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Snapshot file: one registry record per line (overrides seed_snapshot)
    #[arg(short, long, global = true)]
    snapshot: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate example configuration file
    GenConfig {
        /// Output file path
        #[arg(short, long, default_value = "registry-sync.json")]
        output: PathBuf,
    },

    /// Validate a configuration file
    Validate {
        /// Configuration file path
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// List provided service keys
    Services,

    /// List providers (all, or by service, address or application)
    Providers {
        /// Service key (interface[:version][/group])
        #[arg(long, group = "by")]
        service: Option<ServiceKey>,

        /// Provider address (host:port, or host for instance-based providers)
        #[arg(long, group = "by")]
        address: Option<String>,

        /// Application name
        #[arg(long, group = "by")]
        application: Option<String>,
    },

    /// List consumers of a service
    Consumers {
        /// Service key (interface[:version][/group])
        #[arg(long)]
        service: ServiceKey,
    },

    /// Search services by name, application or IP (supports * and ?)
    Search {
        /// What to match: service, application or ip
        #[arg(short, long, default_value = "service")]
        kind: SearchKind,

        /// Exact value or glob pattern
        #[arg(short, long)]
        filter: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };

    // Initialize logging (stderr, stdout carries JSON)
    let level = args.log_level.as_deref().unwrap_or(&config.log_level);
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Commands::GenConfig { output } => cmd_gen_config(&output),
        Commands::Validate { file } => cmd_validate(&file),
        command => {
            let snapshot = args.snapshot.or_else(|| config.seed_snapshot.clone());
            let engine = start_engine(config, snapshot.as_deref())?;
            let result = run_query(&engine, command);
            engine.shutdown();
            result
        }
    }
}

fn cmd_gen_config(output: &Path) -> Result<(), Box<dyn std::error::Error>> {
    EngineConfig::default().to_file(output)?;
    println!("Configuration written to {}", output.display());
    Ok(())
}

fn cmd_validate(file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = EngineConfig::from_file(file)?;
    println!("Configuration is valid");
    println!("  Categories: {:?}", config.subscribed_categories());
    println!("  Config center: {:?}", config.config_center);
    println!(
        "  Instance discovery: {}",
        if config.instance_discovery.enabled {
            "enabled"
        } else {
            "disabled"
        }
    );
    Ok(())
}

fn start_engine(
    config: EngineConfig,
    snapshot: Option<&Path>,
) -> Result<SyncEngine, Box<dyn std::error::Error>> {
    let registry = match snapshot {
        Some(path) => {
            info!("Loading snapshot {}", path.display());
            MemoryRegistry::from_snapshot_file(path)?
        }
        None => {
            warn!("No snapshot given, registry is empty");
            MemoryRegistry::new()
        }
    };
    let center = config_center::open(&config.config_center)?;

    let engine = if config.instance_discovery.enabled {
        SyncEngine::start_with_instances(
            config,
            Arc::new(registry),
            center,
            Arc::new(MemoryDiscovery::new()),
        )?
    } else {
        SyncEngine::start(config, Arc::new(registry), center)?
    };
    Ok(engine)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run_query(engine: &SyncEngine, command: Commands) -> Result<(), Box<dyn std::error::Error>> {
    let query = engine.query();
    match command {
        Commands::Services => print_json(&query.services()),
        Commands::Providers {
            service,
            address,
            application,
        } => {
            let providers = match (service, address, application) {
                (Some(key), _, _) => query.providers_by_service(&key),
                (_, Some(address), _) => query.providers_by_address(&address),
                (_, _, Some(application)) => query.providers_by_application(&application),
                (None, None, None) => query.all_providers(),
            };
            print_json(&providers)
        }
        Commands::Consumers { service } => print_json(&query.consumers_by_service(&service)),
        Commands::Search { kind, filter } => print_json(&query.search(kind, &filter)?),
        Commands::GenConfig { .. } | Commands::Validate { .. } => Ok(()),
    }
}
