use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post, put};
use marquee_core::AppError;
use tower_http::trace::TraceLayer;
use tower_sessions::SessionManagerLayer;
use tower_sessions_sqlx_store::PostgresStore;

use crate::state::AppState;
use crate::{auth, handlers, middleware};

mod cors;

use cors::build_cors_layer;

pub fn build_router(
    app_state: AppState,
    frontend_url: &str,
    session_layer: SessionManagerLayer<PostgresStore>,
) -> Result<Router, AppError> {
    let session_routes = Router::new()
        .route("/auth/me", get(auth::me_handler))
        .route(
            "/auth/capabilities/{capability}",
            get(auth::capability_check_handler),
        )
        .route_layer(from_fn_with_state(
            app_state.clone(),
            middleware::require_session,
        ));

    // Cookie-bearing browser routes; bearer-only routes below carry no
    // ambient credential and skip the origin check.
    let browser_routes = Router::new()
        .route("/auth/session", post(auth::create_session_handler))
        .route("/auth/logout", post(auth::logout_handler))
        .merge(session_routes)
        .route_layer(from_fn_with_state(
            app_state.clone(),
            middleware::require_same_origin_for_mutations,
        ));

    let trust_boundary_routes = Router::new()
        .route("/auth/promote", post(auth::promote_handler))
        .route("/auth/sync", post(auth::sync_handler))
        .route(
            "/api/users/{subject}",
            get(handlers::users::get_user_handler),
        )
        .route(
            "/api/users/{subject}/role",
            put(handlers::users::change_role_handler),
        )
        .route(
            "/api/users/{subject}/capabilities/{capability}",
            put(handlers::users::override_capability_handler),
        );

    Ok(Router::new()
        .route("/health", get(handlers::health::health_handler))
        .merge(browser_routes)
        .merge(trust_boundary_routes)
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(frontend_url)?)
        .layer(session_layer)
        .with_state(app_state))
}
