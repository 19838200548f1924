//! # FlashVocab
//!
//! Backend of a flashcard vocabulary trainer.
//!
//! # General Infrastructure
//! - Single axum process serving the JSON API and the prebuilt frontend
//! - No accounts: each browser is an anonymous device identified by a cookie
//! - Each device owns one SQLite file, created on first contact
//! - One external dependency, a chat completion API used to group words
//!
//!
//!
//! # Endpoints
//!
//! | Method & Path | Purpose |
//! |---|---|
//! | GET /lists | all lists of the device |
//! | GET /lists/{id} | one list |
//! | POST /lists | create a list |
//! | PUT /lists/{id} | rename / touch a list |
//! | DELETE /lists/{id} | delete a list and its cards |
//! | GET /lists/{id}/cards | cards of a list |
//! | PUT /lists/{id}/reset-accuracy | zero accuracy counters of a list |
//! | GET /cards/{id} | one card |
//! | POST /cards | create a card |
//! | PUT /cards/{id} | update a card |
//! | DELETE /cards/{id} | delete a card |
//! | POST /group-words | group words with the completion model |
//! | GET / , GET /{path} | frontend shell and assets |
//!
//!
//!
//! # Notes
//!
//! ## Concurrency
//! Requests from the same device can interleave. Nothing is locked above what
//! SQLite does on its own, so two simultaneous unnamed list creations may both
//! end up as `List 3`.
//!
//! ## Environment
//! See [`config::Config`]. `RUST_LOG` controls logging.
use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    http::{HeaderValue, Method, header::CONTENT_TYPE},
    middleware,
    routing::{get, post, put},
};

use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::{
    cors::CorsLayer,
    services::{ServeDir, ServeFile},
};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

pub mod cards;
pub mod config;
pub mod database;
pub mod device;
pub mod error;
pub mod grouping;
pub mod lists;
pub mod routes;
pub mod state;
pub mod utils;

use device::device_layer;
use routes::{
    card_handler, create_card_handler, create_list_handler, delete_card_handler,
    delete_list_handler, group_words_handler, list_cards_handler, list_handler, lists_handler,
    reset_accuracy_handler, update_card_handler, update_list_handler,
};
use state::AppState;

pub fn app(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/lists", get(lists_handler).post(create_list_handler))
        .route(
            "/lists/{id}",
            get(list_handler)
                .put(update_list_handler)
                .delete(delete_list_handler),
        )
        .route("/lists/{id}/cards", get(list_cards_handler))
        .route("/lists/{id}/reset-accuracy", put(reset_accuracy_handler))
        .route("/cards", post(create_card_handler))
        .route(
            "/cards/{id}",
            get(card_handler)
                .put(update_card_handler)
                .delete(delete_card_handler),
        )
        .route_layer(middleware::from_fn(device_layer));

    let static_dir = &state.config.static_dir;
    let frontend =
        ServeDir::new(static_dir).fallback(ServeFile::new(static_dir.join("index.html")));

    let mut app = Router::new()
        .merge(api)
        .route("/group-words", post(group_words_handler))
        .fallback_service(frontend);

    match HeaderValue::from_str(&state.config.allowed_origin) {
        Ok(origin) => {
            let cors = CorsLayer::new()
                .allow_origin(origin)
                .allow_credentials(true)
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers([CONTENT_TYPE])
                .max_age(Duration::from_secs(60 * 60));

            app = app.layer(cors);
        }
        Err(e) => error!("Invalid allowed origin, CORS disabled: {e}"),
    }

    app.with_state(state)
}

pub async fn start_server() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = AppState::new();

    info!("Starting server...");

    let address = format!("0.0.0.0:{}", state.config.port);
    let app = app(state);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address)
        .await
        .expect("Failed to bind listener");
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    info!("Server shutting down...");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        ctrl_c().await.expect("Failed to install Ctrl+C handler");

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal(SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
