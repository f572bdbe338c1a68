use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cronguard_core::impls::{InMemoryStore, RedisStore};
use cronguard_core::ports::KeyValueStore;
use cronguard_core::{SchedulerBuilder, SchedulerConfig, StatusQuery, TaskDefinition, TaskError};

/// Cron scheduler whose runs are coordinated through a shared Redis.
#[derive(Debug, Parser)]
#[command(name = "cronguard", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the scheduler with the demo task until Ctrl-C.
    Run {
        /// TOML config file; defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Overrides `store.redis_url` from the config.
        #[arg(long)]
        redis_url: Option<String>,
        /// Use a process-local store instead of Redis (single node only).
        #[arg(long)]
        in_memory: bool,
    },
    /// Print the recorded status of a task as JSON.
    Status {
        task: String,
        #[arg(long, default_value = "redis://127.0.0.1:6379/")]
        redis_url: String,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            config,
            redis_url,
            in_memory,
        } => {
            let mut config = match config {
                Some(path) => SchedulerConfig::from_file(&path)
                    .with_context(|| format!("loading {}", path.display()))?,
                None => SchedulerConfig::default(),
            };
            if let Some(url) = redis_url {
                config.store.redis_url = url;
            }
            let runtime = runtime(&config.thread_name_prefix)?;
            runtime.block_on(run(config, in_memory))
        }
        Command::Status { task, redis_url } => {
            let runtime = runtime("cronguard-")?;
            runtime.block_on(status(&task, &redis_url))
        }
    }
}

fn runtime(prefix: &str) -> anyhow::Result<tokio::runtime::Runtime> {
    let prefix = prefix.to_string();
    let next_id = AtomicUsize::new(1);
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name_fn(move || format!("{prefix}{}", next_id.fetch_add(1, Ordering::Relaxed)))
        .build()
        .context("building tokio runtime")
}

async fn run(config: SchedulerConfig, in_memory: bool) -> anyhow::Result<()> {
    let store: Arc<dyn KeyValueStore> = if in_memory {
        tracing::warn!("using in-memory store, runs are not coordinated with other processes");
        Arc::new(InMemoryStore::new())
    } else {
        let store = RedisStore::connect(&config.store.redis_url)
            .await
            .with_context(|| format!("connecting to {}", config.store.redis_url))?;
        Arc::new(store)
    };

    let grace = config.shutdown_grace();
    let scheduler = SchedulerBuilder::new(store)
        .config(config)
        .register(heartbeat())?
        .expect_tasks(&["heartbeat"])
        .build()?;

    let dispatcher = scheduler.start();
    tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;
    tracing::info!("shutdown requested");

    if !dispatcher.shutdown(grace).await {
        tracing::warn!("exited with invocations still running");
    }
    Ok(())
}

/// Fires every two seconds; the long TTL keeps a slow run exclusive.
fn heartbeat() -> TaskDefinition {
    TaskDefinition::new("heartbeat", "*/2 * * * * *", || async {
        tracing::info!(pid = std::process::id(), "heartbeat");
        Ok::<(), TaskError>(())
    })
    .with_lock_ttl(120)
}

async fn status(task: &str, redis_url: &str) -> anyhow::Result<()> {
    let store = RedisStore::connect(redis_url)
        .await
        .with_context(|| format!("connecting to {redis_url}"))?;
    let status = StatusQuery::new(Arc::new(store)).task_status(task).await?;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}
