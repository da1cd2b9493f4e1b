//! CodeDuel - Worker Fleet Entry Point
//!
//! Boots the matchmaking, judge and battle-timeout workers plus the
//! stale-pending sweep in one process. The HTTP layer lives elsewhere and
//! talks to the same queues and store.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bollard::Docker;
use redis::Client as RedisClient;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use codeduel::{
    battle::{BattleOrchestrator, TimeoutJobHandler},
    catalog::ExerciseCatalog,
    config::CONFIG,
    constants::{DEFAULT_TIMEOUT_CONCURRENCY, queues},
    db,
    judge::{DockerSandbox, JudgeJobHandler, JudgeRunner},
    matchmaking::MatchmakingEngine,
    queue::{QueueClient, RateLimit, Worker},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| CONFIG.rust_log.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting CodeDuel workers...");

    // Initialize database connection pool
    tracing::info!("Connecting to database...");
    let db_pool = db::create_pool(&CONFIG.database).await?;

    tracing::info!("Running database migrations...");
    db::run_migrations(&db_pool).await?;

    // Initialize Redis connection
    tracing::info!("Connecting to Redis...");
    let redis_client = RedisClient::open(CONFIG.redis.url.as_str())?;
    let redis_conn = redis::aio::ConnectionManager::new(redis_client).await?;
    let queue = QueueClient::new(redis_conn);

    // Initialize Docker client
    tracing::info!("Connecting to Docker...");
    let docker = Docker::connect_with_socket_defaults()?;
    let docker_info = docker.version().await?;
    tracing::info!(
        "Connected to Docker version: {}",
        docker_info.version.unwrap_or_default()
    );

    let catalog = ExerciseCatalog::new(&CONFIG.catalog.exercises_path);

    let orchestrator = BattleOrchestrator::new(
        db_pool.clone(),
        queue.clone(),
        catalog.clone(),
        CONFIG.battle.clone(),
    );

    let sandbox = Arc::new(DockerSandbox::new(docker, CONFIG.judge.clone()));
    let judge_runner = JudgeRunner::new(sandbox, catalog.clone());

    let shutdown = Arc::new(AtomicBool::new(false));
    let mut workers = Vec::new();

    // Matchmaking worker (rate-limited to bound database contention)
    {
        let engine = Arc::new(MatchmakingEngine::new(
            db_pool.clone(),
            queue.clone(),
            catalog.clone(),
            CONFIG.battle.clone(),
        ));
        let worker = Worker::new(
            queue.clone(),
            queues::MATCH,
            CONFIG.matchmaking.concurrency,
            Some(RateLimit {
                max: CONFIG.matchmaking.rate_limit_max,
                window: CONFIG.matchmaking.rate_limit_window(),
            }),
            shutdown.clone(),
        );
        workers.push(tokio::spawn(async move {
            if let Err(e) = worker.run(engine).await {
                tracing::error!("match worker exited with error: {}", e);
            }
        }));
    }

    // Judge worker
    {
        let handler = Arc::new(JudgeJobHandler::new(
            db_pool.clone(),
            judge_runner,
            orchestrator.clone(),
        ));
        let worker = Worker::new(
            queue.clone(),
            queues::JUDGE,
            CONFIG.judge.concurrency,
            None,
            shutdown.clone(),
        );
        workers.push(tokio::spawn(async move {
            if let Err(e) = worker.run(handler).await {
                tracing::error!("judge worker exited with error: {}", e);
            }
        }));
    }

    // Battle timeout worker
    {
        let handler = Arc::new(TimeoutJobHandler::new(orchestrator.clone()));
        let worker = Worker::new(
            queue.clone(),
            queues::BATTLE_TIMEOUT,
            DEFAULT_TIMEOUT_CONCURRENCY,
            None,
            shutdown.clone(),
        );
        workers.push(tokio::spawn(async move {
            if let Err(e) = worker.run(handler).await {
                tracing::error!("timeout worker exited with error: {}", e);
            }
        }));
    }

    // Stale-pending battle sweep
    workers.push(orchestrator.spawn_sweeper(shutdown.clone()));

    tracing::info!("All workers running");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received, draining workers...");
    shutdown.store(true, Ordering::SeqCst);

    for worker in workers {
        let _ = worker.await;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
