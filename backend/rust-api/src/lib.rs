use axum::{
    extract::Request,
    http::{header, HeaderValue, Method},
    middleware::{self, Next},
    response::Response,
    routing::{get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod policy;
pub mod services;
pub mod store;
pub mod utils;

pub use config::Config;
pub use services::AppState;

/// CSP middleware adds Content-Security-Policy header to all responses
async fn csp_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    response.headers_mut().insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static(
            "default-src 'self'; \
             script-src 'self' 'unsafe-inline'; \
             style-src 'self' 'unsafe-inline'; \
             img-src 'self' data: https:; \
             connect-src 'self'",
        ),
    );
    response
}

pub fn create_router(app_state: std::sync::Arc<services::AppState>) -> Router {
    // CORS for the teacher dashboard hitting the grading endpoints
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_origin(tower_http::cors::Any); // TODO: restrict to specific origins in production

    Router::new()
        // Public endpoints (no auth required)
        .route("/health", get(handlers::health_check))
        // Metrics endpoint with Basic Auth protection
        .route(
            "/metrics",
            get(handlers::metrics_handler)
                .layer(middleware::from_fn(handlers::metrics_auth_middleware)),
        )
        // Student-facing attempt lifecycle (require JWT)
        .nest(
            "/api/v1/attempts",
            attempts_routes().layer(middleware::from_fn_with_state(
                app_state.clone(),
                middlewares::auth::auth_middleware,
            )),
        )
        // Teacher-facing grading workflow (require JWT)
        .nest(
            "/api/v1/grading",
            grading_routes()
                .layer(cors)
                .layer(middleware::from_fn_with_state(
                    app_state.clone(),
                    middlewares::auth::auth_middleware,
                )),
        )
        .with_state(app_state)
        .layer(middleware::from_fn(csp_middleware)) // Apply CSP to all responses
        .layer(middleware::from_fn(
            middlewares::metrics::metrics_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}

fn attempts_routes() -> Router<std::sync::Arc<services::AppState>> {
    Router::new()
        .route("/", post(handlers::attempts::create_attempt))
        .route("/{id}", get(handlers::attempts::get_attempt))
        .route(
            "/{id}/sections/{section_type}/start",
            post(handlers::attempts::start_section),
        )
        .route(
            "/{id}/sections/{section_type}/answers",
            put(handlers::attempts::save_answers),
        )
        .route(
            "/{id}/sections/{section_type}/end",
            post(handlers::attempts::end_section),
        )
        .route("/{id}/submit", post(handlers::attempts::submit_attempt))
        .route("/{id}/rescore", post(handlers::attempts::rescore_attempt))
}

fn grading_routes() -> Router<std::sync::Arc<services::AppState>> {
    Router::new()
        .route("/queue", get(handlers::grading::grading_queue))
        .route(
            "/attempts/{id}/sections/{section_type}",
            post(handlers::grading::grade_section),
        )
}
