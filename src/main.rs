//! Local server entrypoint.
//!
//! Loads `.env`, initializes tracing, builds the configured session and
//! profile stores once, and serves until Ctrl-C.

use std::env;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt};

use session_tracker::config::{Config, ProfileBackendKind, SessionBackendKind};
use session_tracker::profile::AnyProfileStore;
use session_tracker::profile::dynamodb::DynamoDbProfileStore;
use session_tracker::profile::memory::InMemoryProfileStore;
use session_tracker::session::AnyStore;
use session_tracker::session::dynamodb::DynamoDbStore;
use session_tracker::session::memory::InMemoryStore;
use session_tracker::session::redis::RedisStore;
use session_tracker::{AppState, create_app};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if env::var("LOG_FORMAT").is_ok_and(|v| v == "json") {
        fmt().json().with_env_filter(filter).init();
    } else {
        fmt().with_env_filter(filter).init();
    }
}

async fn dynamodb_client(config: &Config) -> aws_sdk_dynamodb::Client {
    let sdk_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    if config.dynamodb_endpoint.is_empty() {
        aws_sdk_dynamodb::Client::new(&sdk_config)
    } else {
        let dynamo_config = aws_sdk_dynamodb::config::Builder::from(&sdk_config)
            .endpoint_url(&config.dynamodb_endpoint)
            .build();
        aws_sdk_dynamodb::Client::from_conf(dynamo_config)
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    tracing::info!("Shutting down");
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = Config::from_env().expect("Failed to load configuration");

    let needs_dynamo = config.session_backend == SessionBackendKind::DynamoDb
        || config.profile_backend == ProfileBackendKind::DynamoDb;
    let dynamo = if needs_dynamo {
        Some(dynamodb_client(&config).await)
    } else {
        None
    };

    let sessions = match (config.session_backend, &dynamo) {
        (SessionBackendKind::DynamoDb, Some(client)) => {
            tracing::info!(table = %config.dynamodb_table, "Using DynamoDB session store");
            AnyStore::DynamoDb(DynamoDbStore::new(client.clone(), config.dynamodb_table.clone()))
        }
        (SessionBackendKind::Redis, _) => {
            let store = RedisStore::open(&config.redis_url).expect("Invalid REDIS_URL");
            // Unreachable at boot is not fatal; operations retry the connect.
            match store.connect().await {
                Ok(()) => tracing::info!("Using Redis session store"),
                Err(e) => tracing::error!(error = %e, "Redis unreachable at startup"),
            }
            AnyStore::Redis(store)
        }
        _ => {
            tracing::info!("Using in-memory session store");
            AnyStore::Memory(InMemoryStore::new())
        }
    };

    let profiles = match (config.profile_backend, &dynamo) {
        (ProfileBackendKind::DynamoDb, Some(client)) => {
            tracing::info!(table = %config.profile_table, "Using DynamoDB profile store");
            AnyProfileStore::DynamoDb(DynamoDbProfileStore::new(
                client.clone(),
                config.profile_table.clone(),
            ))
        }
        _ => {
            tracing::info!("Using in-memory profile store");
            AnyProfileStore::Memory(InMemoryProfileStore::new())
        }
    };

    let addr = format!("0.0.0.0:{}", config.port);
    let state = Arc::new(AppState::new(config, sessions, profiles));
    let app = create_app(state);

    tracing::info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");
}
