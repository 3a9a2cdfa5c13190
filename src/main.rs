use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use undercover::{
    api, broadcast::ChannelSink, questions::QuestionBank, state::AppState, store::JsonStore, ws,
    ServerState,
};

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "undercover=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting undercover server...");

    let questions = Arc::new(match std::env::var("UNDERCOVER_QUESTIONS") {
        Ok(path) => match QuestionBank::load_json(&path) {
            Ok(bank) => {
                tracing::info!(path = %path, total = bank.total(), "loaded question bank");
                bank
            }
            Err(e) => {
                tracing::warn!(
                    path = %path,
                    error = %e,
                    "failed to load question bank, falling back to built-in questions"
                );
                QuestionBank::with_defaults()
            }
        },
        Err(_) => QuestionBank::with_defaults(),
    });

    let data_dir = std::env::var("UNDERCOVER_DATA_DIR").unwrap_or_else(|_| "data".to_string());
    if let Err(e) = tokio::fs::create_dir_all(&data_dir).await {
        tracing::warn!(data_dir = %data_dir, error = %e, "could not create data directory");
    }
    let store = Arc::new(JsonStore::new(&data_dir));
    let sink = Arc::new(ChannelSink::new(256));

    let engine = Arc::new(AppState::new(questions.clone(), store, sink.clone()));
    let state = ServerState {
        engine,
        sink,
        questions,
    };

    let app = Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/api/create-room", post(api::create_room))
        .route("/api/question-types", get(api::question_types))
        .fallback_service(ServeDir::new("static"))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000u16);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
