// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method},
    middleware,
    routing::{get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{auth, exam, paper, record},
    state::AppState,
    utils::jwt::auth_middleware,
};

/// Assembles the main application router.
///
/// * Login is public; everything else sits behind the bearer-token middleware.
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (store, config, per-attempt locks).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        HeaderValue::from_static("http://localhost:3000"),
        HeaderValue::from_static("http://127.0.0.1:3000"),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let auth_routes = Router::new().route("/login", post(auth::login));

    let paper_routes = Router::new()
        .route("/", get(paper::list_papers))
        .route("/{paper_id}/ranking", get(paper::get_ranking));

    let exam_routes = Router::new()
        .route("/{paper_id}", get(exam::get_exam))
        .route("/{paper_id}/session", put(exam::update_session))
        .route("/{paper_id}/answers", post(exam::record_answer));

    let record_routes = Router::new()
        .route("/", post(record::submit_record))
        .route("/mine", get(record::list_my_records));

    let protected = Router::new()
        .nest("/api/papers", paper_routes)
        .nest("/api/exams", exam_routes)
        .nest("/api/records", record_routes)
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest("/api/auth", auth_routes)
        .merge(protected)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
