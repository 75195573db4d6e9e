use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::StatusCode,
    routing::{delete, get, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use parley_api::session::{AppState, AppStateInner};
use parley_api::{conversations, groups, messages, reactions, session, users};
use parley_core::conversations::ConversationRegistry;
use parley_core::identity::IdentityStore;
use parley_core::messages::MessageLedger;
use parley_core::photos::PhotoStore;

mod storage;
use storage::DiskPhotoStore;

/// Multipart framing adds overhead on top of the stored photo, so the
/// transport limit sits above the core's 10 MiB photo ceiling and
/// oversized photos still get the core's 413.
const BODY_LIMIT: usize = 12 * 1024 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parley=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let db_path = std::env::var("PARLEY_DB_PATH").unwrap_or_else(|_| "parley.db".into());
    let photo_dir = std::env::var("PARLEY_PHOTO_DIR").unwrap_or_else(|_| "photos".into());
    let host = std::env::var("PARLEY_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("PARLEY_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;

    // Storage
    let db = Arc::new(parley_db::Database::open(&PathBuf::from(&db_path))?);
    let photos: Arc<dyn PhotoStore> = Arc::new(DiskPhotoStore::new(PathBuf::from(&photo_dir))?);

    // Shared state
    let state: AppState = Arc::new(AppStateInner {
        identity: IdentityStore::new(db.clone(), photos.clone()),
        registry: ConversationRegistry::new(db.clone(), photos),
        ledger: MessageLedger::new(db),
    });

    // Routes
    let app = Router::new()
        .route("/liveness", get(liveness))
        .route("/session", post(session::login))
        .route("/users/me/name", put(users::set_my_name))
        .route("/users/me/photo", put(users::set_my_photo))
        .route(
            "/conversations",
            get(conversations::list_mine).post(conversations::create),
        )
        .route("/conversations/{id}", get(conversations::get_one))
        .route("/messages", post(messages::send))
        .route("/messages/{id}", delete(messages::delete_message))
        .route("/messages/{id}/forward", post(messages::forward))
        .route(
            "/messages/{id}/comment",
            post(reactions::comment).delete(reactions::uncomment),
        )
        .route("/groups/{id}/leave", post(groups::leave))
        .route("/groups/{id}/name", put(groups::set_name))
        .route("/groups/{id}/photo", put(groups::set_photo))
        .route("/groups/{id}/members", post(groups::add_member))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    info!("parley listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn liveness() -> StatusCode {
    StatusCode::OK
}
