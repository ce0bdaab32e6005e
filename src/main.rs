mod cli;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use cognition_agent::{AgentDriver, ScriptedExecutor};
use cognition_policy::{RateLimitConfig, RateLimiter, ScopeConfig, ScopeHarness};
use cognition_server::AppState;
use cognition_storage::StorageConfig as BackendConfig;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = cognition_config::load(cli.config.as_deref())?;

    match cli.command {
        Some(Commands::ShowConfig) => {
            println!("{}", serde_yaml::to_string(&config)?);
            Ok(())
        }
        Some(Commands::Serve { bind: Some(bind) }) => {
            config.server.bind = bind;
            serve(config).await
        }
        Some(Commands::Serve { bind: None }) | None => serve(config).await,
    }
}

async fn serve(config: cognition_config::Config) -> anyhow::Result<()> {
    let backend_config = match config.storage.kind.as_str() {
        "memory" => BackendConfig::Memory,
        "sqlite" => BackendConfig::Sqlite { path: config.storage.path.clone() },
        "postgres" | "postgresql" => BackendConfig::Postgres {
            connection_string: config
                .storage
                .connection_string
                .clone()
                .or_else(|| std::env::var("COGNITION_DATABASE_URL").ok())
                .ok_or_else(|| anyhow::anyhow!("postgres storage requires a connection string"))?,
            min_connections: config.storage.min_connections,
            max_connections: config.storage.max_connections,
        },
        other => anyhow::bail!("unknown storage backend kind: {other}"),
    };
    let storage = cognition_storage::build(&backend_config).await?;

    let rate_limiter = Arc::new(RateLimiter::new(RateLimitConfig {
        requests_per_minute: config.rate_limit.requests_per_minute,
        burst_size: config.rate_limit.burst_size,
    }));
    rate_limiter.start_sweeper_with(
        Duration::from_secs(config.rate_limit.sweep_interval_secs),
        Duration::from_secs(config.rate_limit.idle_timeout_secs),
    );

    let scope_harness = ScopeHarness::new(ScopeConfig {
        scope_keys: config.scope.scope_keys.clone(),
        scoping_enabled: config.scope.scoping_enabled,
    });

    // The real LLM+tool runtime is out of scope for this server; operators
    // wire a production `AgentExecutor` in by replacing this construction.
    let executor = Arc::new(ScriptedExecutor::always_text("Hello from Cognition."));
    let agent_driver = AgentDriver::new(executor);

    let state: cognition_server::SharedState = Arc::new(AppState::new(
        storage,
        rate_limiter,
        scope_harness,
        agent_driver,
        config.turns.max_sessions,
        config.turns.event_buffer_capacity,
        Duration::from_secs(config.turns.heartbeat_interval_secs),
        config.turns.retry_ms,
        config.turns.strict_serial,
    ));

    let router = cognition_server::build_router(state);
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(bind = %config.server.bind, "cognition-server listening");
    axum::serve(listener, router.into_make_service()).await?;
    Ok(())
}

fn init_logging(verbosity: u8) {
    let default_level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::registry().with(fmt::layer()).with(filter).try_init();
}
