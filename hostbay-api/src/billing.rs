use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use sqlx::Postgres;

use hostbay_common::Invoice;

use crate::auth::user_id_from_headers;
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/invoices",
    responses(
        (status = 200, description = "Caller's invoices", body = Vec<Invoice>)
    )
)]
pub async fn list_invoices(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> axum::response::Response {
    let Some(user_id) = user_id_from_headers(&headers) else {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "unauthenticated"})))
            .into_response();
    };

    let rows = sqlx::query_as::<Postgres, Invoice>(
        "SELECT id, user_id, service_id, amount_cents, currency, payment_method, status,
                checkout_session_id, created_at, paid_at
         FROM invoices
         WHERE user_id = $1
         ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(&state.db)
    .await
    .unwrap_or_default();

    Json(rows).into_response()
}

#[utoipa::path(
    get,
    path = "/balance",
    responses(
        (status = 200, description = "Caller's wallet balance")
    )
)]
pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> axum::response::Response {
    let Some(user_id) = user_id_from_headers(&headers) else {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "unauthenticated"})))
            .into_response();
    };

    let balance: Option<i64> = sqlx::query_scalar("SELECT balance_cents FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&state.db)
        .await
        .unwrap_or(None);

    match balance {
        Some(cents) => Json(json!({ "balance_cents": cents })).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({"error": "not_found"}))).into_response(),
    }
}
