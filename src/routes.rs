// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{attempt, session},
    state::AppState,
    utils::jwt::auth_middleware,
};

/// Assembles the main application router.
///
/// * Merges the session and attempt sub-routers, both behind bearer auth.
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (runner, attempt store, config).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        HeaderValue::from_static("http://localhost:3000"),
        HeaderValue::from_static("http://127.0.0.1:3000"),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let session_routes = Router::new()
        .route(
            "/",
            post(session::start_session)
                .get(session::get_session)
                .delete(session::abandon_session),
        )
        .route("/responses/{question_id}", put(session::update_response))
        .route("/next", post(session::next_question))
        .route("/previous", post(session::previous_question))
        .route("/goto/{index}", post(session::go_to_question))
        .route("/run-code", post(session::run_all_code))
        .route("/submit", post(session::submit_session));

    let attempt_routes = Router::new()
        .route("/", get(attempt::list_attempts))
        .route("/{id}", get(attempt::get_attempt))
        .route("/progress/{root_id}", get(attempt::get_progress));

    let api = Router::new()
        .nest("/session", session_routes)
        .nest("/attempts", attempt_routes)
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest("/api", api)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
