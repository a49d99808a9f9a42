use crate::handlers::{agents, clients, control, files, hashlists, jobs, settings};
use crate::middleware::{agent_auth_guard, health_guard};
use crate::state::AppState;
use axum::{
    http::{header, Method},
    middleware,
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    // Agent-facing control surface: every route here requires a valid
    // agent API key, and is refused outright while the coordinator isn't
    // operational yet.
    let agent_stratum = Router::new()
        .route("/ws", get(control::agent_control_socket))
        .layer(middleware::from_fn_with_state(state.clone(), agent_auth_guard))
        .route("/register", post(agents::register_agent))
        .layer(middleware::from_fn_with_state(state.clone(), health_guard));

    let hashlist_routes = Router::new()
        .route("/", get(hashlists::list_hashlists).post(hashlists::create_hashlist))
        .route("/:id", get(hashlists::get_hashlist));

    let job_routes = Router::new()
        .route("/presets", get(jobs::list_preset_jobs).post(jobs::create_preset_job))
        .route("/presets/:id", get(jobs::get_preset_job))
        .route("/workflows", post(jobs::create_workflow))
        .route("/workflows/:id", get(jobs::get_workflow))
        .route("/executions", post(jobs::submit_execution))
        .route("/executions/:id", get(jobs::get_execution));

    let client_routes = Router::new()
        .route("/", get(clients::list_clients).post(clients::create_client))
        .route("/:id", get(clients::get_client));

    let admin_routes = Router::new()
        .route("/agents", get(agents::list_agents))
        .route("/vouchers", post(agents::create_voucher))
        .route("/files", post(files::upload_file));

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .nest(
            "/api/v1",
            Router::new()
                .nest("/agent", agent_stratum)
                .nest("/hashlists", hashlist_routes)
                .nest("/jobs", job_routes)
                .nest("/clients", client_routes)
                .nest("/admin", admin_routes)
                .route("/files", get(files::list_files))
                .route("/files/download/*relative_path", get(files::download_file))
                .route("/settings", get(settings::get_settings).put(settings::update_settings))
        )
        .layer(cors)
        .with_state(state)
}
