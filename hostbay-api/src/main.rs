use axum::{routing::get, routing::post, Router};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};

// Swagger
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod api_docs;
mod auth;
mod billing;
mod orders;
mod services_endpoint;
mod simple_logger;
mod state;
mod webhooks;

use state::AppState;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    dotenv::dotenv().ok();

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres");

    // Migrations live at the workspace root; embedded at compile time, safe
    // to run on every startup (sqlx keeps its own lock + ledger table).
    sqlx::migrate!("../sqlx-migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    let state = AppState::new(pool);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .merge(
            SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", api_docs::ApiDoc::openapi()),
        )
        .route("/", get(root))
        .route("/orders", post(orders::create_order))
        .route("/services", get(services_endpoint::list_services))
        .route(
            "/services/:id",
            get(services_endpoint::get_service).delete(services_endpoint::delete_service),
        )
        .route(
            "/services/:id/actions",
            post(services_endpoint::control_service),
        )
        .route("/invoices", get(billing::list_invoices))
        .route("/balance", get(billing::get_balance))
        .route("/webhooks/payment", post(webhooks::payment_webhook))
        .layer(cors)
        .with_state(state);

    let addr: SocketAddr = std::env::var("API_BIND_ADDR")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 8003)));
    println!("Hostbay API listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

async fn root() -> &'static str {
    "Hostbay API"
}
