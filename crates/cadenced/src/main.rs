//! cadenced — the Cadence daemon.
//!
//! Single binary assembling the exporter state engine:
//! - Entity store (in-memory, or shared via redis)
//! - Task controller + keepalive refresh loop
//! - Interval scheduler
//! - Garbage collection handlers
//!
//! Pull handlers talk to the CI platform and are supplied by the polling
//! layer; the store-only garbage collection pass is wired here, the
//! upstream-reconciling passes are registered once an upstream client is
//! plugged in. Task types without a handler are skipped by the scheduler.
//!
//! # Usage
//!
//! ```text
//! cadenced --config /etc/cadence/config.toml
//! ```

mod config;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};

use cadence_core::{Project, TaskType, UpstreamClient};
use cadence_gc::GcConfig;
use cadence_scheduler::{Scheduler, TaskController, TaskRegistry};
use cadence_store::{LocalStore, RedisStore, Store};

use config::Config;

#[derive(Parser)]
#[command(name = "cadenced", about = "Cadence CI exporter state engine daemon")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "/etc/cadence/config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,cadenced=debug,cadence=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_file(&cli.config)?;
    run(config).await
}

async fn run(config: Config) -> anyhow::Result<()> {
    info!("cadence daemon starting");

    // Shared store when a redis URL is configured, otherwise single
    // process in-memory. A connect failure is fatal; no silent fallback.
    let store: Arc<dyn Store> = match &config.redis_url {
        Some(url) => {
            let store = RedisStore::connect(url).await?;
            info!("shared store connected");
            Arc::new(store)
        }
        None => {
            info!("using single-process in-memory store");
            Arc::new(LocalStore::new())
        }
    };

    // Seed explicitly configured projects so scheduled tasks see them
    // before the first wildcard discovery run.
    for project_config in &config.projects {
        let mut project = Project::new(project_config.name.clone());
        project.settings = project_config.resolved_settings(&config.defaults);
        store.set_project(&project).await?;
    }
    info!(projects = config.projects.len(), "configured projects seeded");

    let process_id = generate_process_id();
    info!(%process_id, "process identity assigned");

    let controller = Arc::new(TaskController::new(store.clone(), process_id));

    let gc_config = Arc::new(GcConfig {
        project_names: config.project_names(),
        wildcards: config.wildcards.clone(),
    });
    let registry = Arc::new(build_registry(store.clone(), gc_config, None));
    info!(handlers = registry.len(), "task registry built");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // The keepalive record only matters when leases are shared.
    let keepalive_handle = config.redis_url.is_some().then(|| {
        let controller = controller.clone();
        let ttl = Duration::from_secs(config.keepalive.ttl_secs);
        let refresh = Duration::from_secs(config.keepalive.refresh_secs);
        let shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            if let Err(e) = controller.keepalive_loop(ttl, refresh, shutdown).await {
                error!(error = %e, "keepalive loop failed");
            }
        })
    });

    let scheduler = Scheduler::new(controller, registry, config.scheduler_config());
    let scheduler_handle = {
        let shutdown = shutdown_rx.clone();
        tokio::spawn(async move { scheduler.run(shutdown).await })
    };

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    let _ = scheduler_handle.await;
    if let Some(handle) = keepalive_handle {
        let _ = handle.await;
    }

    info!("cadence daemon stopped");
    Ok(())
}

/// Register the garbage collection handlers. The three upstream-reconciling
/// passes need an upstream client and stay unregistered without one.
fn build_registry(
    store: Arc<dyn Store>,
    gc_config: Arc<GcConfig>,
    upstream: Option<Arc<dyn UpstreamClient>>,
) -> TaskRegistry {
    let mut registry = TaskRegistry::new();

    {
        let store = store.clone();
        registry.register(
            TaskType::GarbageCollectMetrics,
            Arc::new(move || {
                let store = store.clone();
                Box::pin(async move {
                    let report = cadence_gc::collect_metrics(store.as_ref()).await?;
                    info!(
                        deleted = report.total_deleted(),
                        "metrics garbage collection finished"
                    );
                    Ok(())
                })
            }),
        );
    }

    let Some(upstream) = upstream else {
        return registry;
    };

    {
        let store = store.clone();
        let upstream = upstream.clone();
        registry.register(
            TaskType::GarbageCollectProjects,
            Arc::new(move || {
                let store = store.clone();
                let upstream = upstream.clone();
                let gc_config = gc_config.clone();
                Box::pin(async move {
                    let report = cadence_gc::collect_projects(
                        store.as_ref(),
                        upstream.as_ref(),
                        &gc_config,
                    )
                    .await?;
                    info!(
                        deleted = report.total_deleted(),
                        "projects garbage collection finished"
                    );
                    Ok(())
                })
            }),
        );
    }

    {
        let store = store.clone();
        let upstream = upstream.clone();
        registry.register(
            TaskType::GarbageCollectEnvironments,
            Arc::new(move || {
                let store = store.clone();
                let upstream = upstream.clone();
                Box::pin(async move {
                    let report =
                        cadence_gc::collect_environments(store.as_ref(), upstream.as_ref()).await?;
                    info!(
                        deleted = report.total_deleted(),
                        resynced = report.resynced,
                        "environments garbage collection finished"
                    );
                    Ok(())
                })
            }),
        );
    }

    registry.register(
        TaskType::GarbageCollectRefs,
        Arc::new(move || {
            let store = store.clone();
            let upstream = upstream.clone();
            Box::pin(async move {
                let report = cadence_gc::collect_refs(store.as_ref(), upstream.as_ref()).await?;
                info!(
                    deleted = report.total_deleted(),
                    resynced = report.resynced,
                    "refs garbage collection finished"
                );
                Ok(())
            })
        }),
    );

    registry
}

/// Process identity used as lease owner id and keepalive key suffix.
/// Unique enough across restarts that a crashed predecessor's leases are
/// taken over rather than mistaken for our own.
fn generate_process_id() -> String {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    std::process::id().hash(&mut hasher);
    if let Ok(hostname) = std::env::var("HOSTNAME") {
        hostname.hash(&mut hasher);
    }
    epoch_secs().hash(&mut hasher);
    format!("cadence-{:08x}", hasher.finish() as u32)
}

fn epoch_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
