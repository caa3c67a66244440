use motor_energy_ledger::{
    api::{self, AppState},
    clock::{Clock, SystemClock},
    config::Config,
    db,
    engine::{AccumulationEngine, EngineSettings},
    ingest::Ingestor,
    repositories::{
        LedgerStore, MemoryLedgerStore, MemoryReadingStore, PgLedgerStore, PgReadingStore,
        ReadingStore, RetryPolicy, RetryingLedgerStore,
    },
    scheduler::DayBoundaryScheduler,
    service::SensorService,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    let cfg_path =
        std::env::var("APP_CONFIG").unwrap_or_else(|_| "config/config.example.yaml".into());
    let cfg = Config::load(&cfg_path)?;
    info!(path = %cfg_path, backend = %cfg.ledger.backend, "loaded config");

    let (ledger, readings): (Arc<dyn LedgerStore>, Arc<dyn ReadingStore>) =
        match cfg.ledger.backend.as_str() {
            "postgres" => {
                let pool = db::connect(&cfg.database.url, cfg.database.max_connections).await?;
                db::ensure_schema(&pool).await?;
                info!("connected to database");
                (
                    Arc::new(PgLedgerStore::new(pool.clone())),
                    Arc::new(PgReadingStore::new(pool)),
                )
            }
            _ => {
                info!("using in-memory ledger; totals will not survive a restart");
                (
                    Arc::new(MemoryLedgerStore::new()),
                    Arc::new(MemoryReadingStore::new()),
                )
            }
        };
    let ledger: Arc<dyn LedgerStore> = Arc::new(RetryingLedgerStore::new(
        ledger,
        RetryPolicy::from(&cfg.ledger.retry),
    ));

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let engine = Arc::new(AccumulationEngine::new(
        ledger.clone(),
        clock.clone(),
        EngineSettings::from(&cfg),
    ));
    info!(
        date = %clock.today(),
        history_capacity = cfg.engine.history_capacity,
        max_gap_hours = cfg.engine.max_gap_hours,
        "accumulation engine ready"
    );

    let (ingestor, consumer_task) = Ingestor::spawn(engine.clone(), cfg.engine.ingress_buffer);
    let scheduler = DayBoundaryScheduler::new(engine.clone(), clock.clone()).spawn();

    #[cfg(feature = "redpanda")]
    let redpanda_task = match &cfg.redpanda {
        Some(rp) => {
            let consumer = motor_energy_ledger::redpanda::create_consumer(rp)?;
            info!(brokers = %rp.brokers, topic = %rp.topic, group_id = %rp.group_id, "connected to Redpanda");
            let (stop_tx, stop_rx) = tokio::sync::watch::channel(false);
            let handle = tokio::spawn(motor_energy_ledger::redpanda::run(
                consumer,
                ingestor.clone(),
                stop_rx,
            ));
            Some((stop_tx, handle))
        }
        None => None,
    };
    #[cfg(not(feature = "redpanda"))]
    if cfg.redpanda.is_some() {
        tracing::warn!("redpanda ingress configured but this build lacks the `redpanda` feature");
    }

    let sensors = SensorService::new(readings, ledger, engine, ingestor, clock);
    let app = api::create_router(AppState { sensors });

    let bind_addr = cfg.api.bind_address();
    info!("starting API server on {}", bind_addr);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.stop().await;

    #[cfg(feature = "redpanda")]
    if let Some((stop_tx, handle)) = redpanda_task {
        let _ = stop_tx.send(true);
        if let Err(e) = handle.await {
            tracing::warn!("redpanda ingress ended abnormally: {}", e);
        }
    }

    // the router (and its ingestor clone) is gone; drain what is queued
    if let Err(e) = consumer_task.await {
        tracing::warn!("reading consumer ended abnormally: {}", e);
    }

    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down gracefully"),
        _ = terminate => info!("received SIGTERM, shutting down gracefully"),
    }
}
