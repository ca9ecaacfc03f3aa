// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use airport_kernel::classify::classify;
use airport_kernel::store::RouteStore;
use airport_kernel::types::AirportCode;
use airport_node::airport;
use airport_node::config::AirportConfig;
use airport_node::dispatch::{Airport, AirportLoops};
use airport_node::ledger::http::HttpLedger;
use airport_node::ledger::memory::MemoryLedger;
use airport_node::ledger::SharedLedger;
use airport_node::registry::RouteRegistry;
use airport_node::server::{build_admin_router, build_dispatcher_router};
use airport_node::telemetry;
use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinError;

#[derive(Parser)]
#[command(name = "airport")]
#[command(about = "Ledger-coordinated replicated SQL node", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register with the dispatcher and serve routes until interrupted
    Run {
        /// JSON config file; missing means defaults
        #[arg(long, short, default_value = "config.json")]
        config: PathBuf,
    },
    /// Run an in-memory development dispatcher
    Dispatcher {
        #[arg(long, default_value = "127.0.0.1:7545")]
        bind: SocketAddr,

        /// Require this bearer token on every request
        #[arg(long)]
        token: Option<String>,
    },
    /// Execute a flight plan offline and print its digest
    Digest {
        #[arg(long, short)]
        query: String,

        /// Existing `<hex destination>.db` store; a scratch store otherwise
        #[arg(long)]
        db: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config } => run(&config).await,
        Commands::Dispatcher { bind, token } => dispatcher(bind, token).await,
        Commands::Digest { query, db } => digest(&query, db.as_deref()),
    }
}

async fn run(config_path: &Path) -> anyhow::Result<()> {
    let cfg = AirportConfig::load(config_path)?;
    telemetry::init_metrics()?;

    tracing::info!(
        scope = "general",
        "Initializing airport: ledger {}, databases in {:?}",
        cfg.ledger_url,
        cfg.database_dir
    );

    let gateway: SharedLedger = Arc::new(HttpLedger::new(cfg.ledger_url.clone(), cfg.auth_token.clone()));
    let code = airport::construct(gateway.as_ref(), cfg.announced_ip())
        .await
        .context("constructAirport failed")?;

    let registry = Arc::new(RouteRegistry::new());
    let node = Airport::new(code, gateway.clone(), registry.clone(), cfg.database_dir.clone(), cfg.retry.clone());
    let AirportLoops {
        mut launched,
        mut terminated,
    } = node.start().await.context("Subscribing to route events failed")?;

    if let Some(addr) = cfg.admin_bind_addr {
        let app = build_admin_router(registry.clone());
        let listener = TcpListener::bind(addr).await?;
        tracing::info!(scope = "general", "Admin listening on {}", addr);
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(scope = "general", "Admin server failed: {}", e);
            }
        });
    }

    let outcome = tokio::select! {
        _ = shutdown_signal() => {
            tracing::info!(scope = "general", "Shutdown signal received");
            Ok(())
        }
        res = &mut launched => loop_exit("route launch", res),
        res = &mut terminated => loop_exit("route termination", res),
    };

    node.shutdown().await;
    airport::close(gateway.as_ref(), code).await.context("closeAirport failed")?;
    airport::destroy(gateway.as_ref(), code).await.context("destroyAirport failed")?;
    tracing::info!(scope = "general", "Bye!");
    outcome
}

/// The loops outlive ledger outages; reaching this means one crashed.
fn loop_exit(name: &str, res: Result<(), JoinError>) -> anyhow::Result<()> {
    match res {
        Ok(()) => Err(anyhow!("{} listener stopped before shutdown", name)),
        Err(e) => Err(anyhow!("{} listener crashed: {}", name, e)),
    }
}

async fn dispatcher(bind: SocketAddr, token: Option<String>) -> anyhow::Result<()> {
    let ledger = Arc::new(MemoryLedger::new());
    let app = build_dispatcher_router(ledger, token);

    let listener = TcpListener::bind(bind).await?;
    tracing::info!("Dispatcher listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

fn digest(query: &str, db: Option<&Path>) -> anyhow::Result<()> {
    let store = match db {
        Some(path) => {
            let destination: AirportCode = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .ok_or_else(|| anyhow!("{:?} is not a <hex destination>.db path", path))?
                .parse()?;
            let dir = path.parent().unwrap_or_else(|| Path::new("."));
            RouteStore::open(dir, destination)?
        }
        None => RouteStore::open_in_memory(AirportCode::default())?,
    };

    let plan = classify(query)?;
    let report = store.execute(&plan);

    println!("statements: {} ({} failed, {} captured)", plan.len(), report.failed, report.captured);
    println!("write:      {}", plan.is_write);
    println!("digest:     {}", report.digest);
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Cannot listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Cannot listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
