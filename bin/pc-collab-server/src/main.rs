//! PetCircle Collaboration Server
//!
//! Serves the collaboration APIs:
//! - Public invitation / removal-request link resolution
//! - Authenticated create, accept, and reject
//! - Notification feed
//! - Health and OpenAPI docs
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `PC_CONFIG_PATH` | - | Optional TOML config file |
//! | `PC_API_HOST` | `0.0.0.0` | Bind address |
//! | `PC_API_PORT` | `8080` | HTTP API port |
//! | `PC_MONGO_URL` | `mongodb://localhost:27017` | MongoDB connection URL |
//! | `PC_MONGO_DB` | `petcircle` | MongoDB database name |
//! | `PC_JWT_SECRET` | - | HS256 session secret (required outside dev mode) |
//! | `PC_JWT_ISSUER` | `petcircle` | Session issuer claim |
//! | `PC_INVITATION_TTL_HOURS` | `168` | Invitation lifetime |
//! | `PC_REMOVAL_TTL_HOURS` | `168` | Removal request lifetime |
//! | `PC_PURGE_ENABLED` | `false` | Delete long-expired pending links |
//! | `PC_DEV_MODE` | `false` | In-memory stores with seeded sample data |
//! | `RUST_LOG` | `info` | Log level |

use std::sync::Arc;

use anyhow::Result;
use axum::{response::Json, routing::get, Router};
use tokio::{net::TcpListener, signal};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use pc_collab::api::{build_router, CollabApiDoc};
use pc_collab::domain::Principal;
use pc_collab::repository::{
    ensure_indexes, InMemoryNotificationStore, InMemoryPetDirectory, InMemoryWorkflowStore,
    MongoNotificationStore, MongoPetDirectory, MongoWorkflowStore,
};
use pc_collab::service::{
    CollaborationEngine, ExpiryPurger, JwtSessionResolver, NotificationDispatcher, WorkflowSettings,
};
use pc_config::CollabConfig;

const DEV_JWT_SECRET: &str = "petcircle-dev-secret";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into())
        )
        .init();

    info!("Starting PetCircle Collaboration Server");

    let config = CollabConfig::load()?;
    let settings = WorkflowSettings::try_from(&config.workflow)?;

    let secret = match (&config.auth.jwt_secret, config.dev_mode) {
        (Some(secret), _) => secret.clone(),
        (None, true) => {
            warn!("No PC_JWT_SECRET set, using the dev-mode session secret");
            DEV_JWT_SECRET.to_string()
        }
        (None, false) => anyhow::bail!("PC_JWT_SECRET is required outside dev mode"),
    };
    let sessions = Arc::new(JwtSessionResolver::new(&secret, config.auth.issuer.clone())?);

    let engine = if config.dev_mode {
        warn!("Dev mode: using in-memory stores, data is lost on restart");
        let pets = Arc::new(seed_dev_directory());
        let owner = Principal::new("dev-owner", "owner@petcircle.dev", "Dev Owner");
        let friend = Principal::new("dev-friend", "friend@petcircle.dev", "Dev Friend");
        info!(
            owner = %sessions.issue(&owner, chrono::Duration::days(1))?,
            friend = %sessions.issue(&friend, chrono::Duration::days(1))?,
            "Dev session tokens (pet id: dev-pet)"
        );

        CollaborationEngine::new(
            Arc::new(InMemoryWorkflowStore::new()),
            pets.clone(),
            pets.clone(),
            pets,
            NotificationDispatcher::new(Arc::new(InMemoryNotificationStore::new())),
            settings,
        )
    } else {
        // Connect to MongoDB
        info!("Connecting to MongoDB: {}/{}", config.mongo.url, config.mongo.database);
        let mongo_client = mongodb::Client::with_uri_str(&config.mongo.url).await?;
        let db = mongo_client.database(&config.mongo.database);

        ensure_indexes(&db).await?;

        let pets = Arc::new(MongoPetDirectory::new(&db));
        CollaborationEngine::new(
            Arc::new(MongoWorkflowStore::new(&db)),
            pets.clone(),
            pets.clone(),
            pets,
            NotificationDispatcher::new(Arc::new(MongoNotificationStore::new(&db))),
            settings,
        )
    };
    let engine = Arc::new(engine);

    let purge_task = if config.workflow.purge.enabled {
        let purger = ExpiryPurger::from_config(engine.clone(), &config.workflow.purge)?;
        Some(tokio::spawn(async move { purger.start().await }))
    } else {
        None
    };

    let app = Router::new()
        .merge(build_router(engine, sessions))
        .route("/health", get(health_handler))
        .merge(SwaggerUi::new("/swagger-ui").url("/q/openapi", CollabApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any));

    let api_addr = format!("{}:{}", config.server.host, config.server.port);
    info!("API server listening on http://{}", api_addr);

    let api_listener = TcpListener::bind(&api_addr).await?;
    axum::serve(api_listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(task) = purge_task {
        task.abort();
    }

    info!("PetCircle Collaboration Server shutdown complete");
    Ok(())
}

fn seed_dev_directory() -> InMemoryPetDirectory {
    let pets = InMemoryPetDirectory::new();
    pets.add_user("dev-owner", "owner@petcircle.dev", "Dev Owner");
    pets.add_user("dev-friend", "friend@petcircle.dev", "Dev Friend");
    pets.add_pet("dev-pet", "Pixel", "dev-owner");
    pets
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "UP",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received...");
}
