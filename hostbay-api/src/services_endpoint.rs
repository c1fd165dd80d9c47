//! Customer-facing service reads and instance control. Control actions are a
//! thin pass-through to the provider adapter: no business rule beyond
//! ownership.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::Postgres;
use uuid::Uuid;

use hostbay_common::VpsService;
use hostbay_providers::manager::ProviderManager;
use hostbay_providers::ControlAction;

use crate::auth::user_id_from_headers;
use crate::simple_logger;
use crate::state::AppState;

const SERVICE_COLUMNS: &str = "id, user_id, provider_code, plan, billing_cycle, region, hostname,
     provider_instance_id, status, ip_address, admin_username, period_start, period_end,
     error_code, error_message, created_at, activated_at, terminated_at";

#[utoipa::path(
    get,
    path = "/services",
    responses(
        (status = 200, description = "Caller's services", body = Vec<VpsService>)
    )
)]
pub async fn list_services(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> axum::response::Response {
    let Some(user_id) = user_id_from_headers(&headers) else {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "unauthenticated"})))
            .into_response();
    };

    let rows = sqlx::query_as::<Postgres, VpsService>(&format!(
        "SELECT {} FROM vps_services WHERE user_id = $1 ORDER BY created_at DESC",
        SERVICE_COLUMNS
    ))
    .bind(user_id)
    .fetch_all(&state.db)
    .await
    .unwrap_or_default();

    Json(rows).into_response()
}

#[utoipa::path(
    get,
    path = "/services/{id}",
    params(("id" = Uuid, Path, description = "Service id")),
    responses(
        (status = 200, description = "Service details", body = VpsService),
        (status = 404, description = "Not found")
    )
)]
pub async fn get_service(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> axum::response::Response {
    let Some(user_id) = user_id_from_headers(&headers) else {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "unauthenticated"})))
            .into_response();
    };

    match fetch_owned(&state, id, user_id).await {
        Some(service) => Json(service).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({"error": "not_found"}))).into_response(),
    }
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct ControlBody {
    /// reboot | stop | start | delete | change_password
    pub action: String,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ControlResponse {
    pub success: bool,
    pub action: String,
}

// COMMAND : CONTROL INSTANCE
#[utoipa::path(
    post,
    path = "/services/{id}/actions",
    params(("id" = Uuid, Path, description = "Service id")),
    request_body = ControlBody,
    responses(
        (status = 200, description = "Action attempted", body = ControlResponse),
        (status = 400, description = "Unknown action"),
        (status = 404, description = "Not found"),
        (status = 409, description = "Service has no provider instance")
    )
)]
pub async fn control_service(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(body): Json<ControlBody>,
) -> axum::response::Response {
    let Some(user_id) = user_id_from_headers(&headers) else {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "unauthenticated"})))
            .into_response();
    };
    let Some(action) = ControlAction::parse(&body.action) else {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "invalid_action"})))
            .into_response();
    };

    run_control(&state, id, user_id, action).await
}

// COMMAND : TERMINATE SERVICE
#[utoipa::path(
    delete,
    path = "/services/{id}",
    params(("id" = Uuid, Path, description = "Service id")),
    responses(
        (status = 200, description = "Deletion attempted", body = ControlResponse),
        (status = 404, description = "Not found")
    )
)]
pub async fn delete_service(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> axum::response::Response {
    let Some(user_id) = user_id_from_headers(&headers) else {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "unauthenticated"})))
            .into_response();
    };

    run_control(&state, id, user_id, ControlAction::Delete).await
}

async fn run_control(
    state: &AppState,
    id: Uuid,
    user_id: Uuid,
    action: ControlAction,
) -> axum::response::Response {
    let start = std::time::Instant::now();

    let Some(service) = fetch_owned(state, id, user_id).await else {
        return (StatusCode::NOT_FOUND, Json(json!({"error": "not_found"}))).into_response();
    };
    let Some(instance_id) = service
        .provider_instance_id
        .as_deref()
        .filter(|s| !s.is_empty())
    else {
        return (
            StatusCode::CONFLICT,
            Json(json!({"error": "no_provider_instance", "message": "service has no instance yet"})),
        )
            .into_response();
    };

    let log_id = simple_logger::log_action_with_metadata(
        &state.db,
        "INSTANCE_CONTROL",
        "in_progress",
        Some(id),
        None,
        Some(json!({
            "action": action.as_str(),
            "provider_code": service.provider_code,
            "provider_instance_id": instance_id,
        })),
    )
    .await
    .ok();

    // Best-effort all the way down: a failed control call is a `success:
    // false` payload, never a 5xx.
    let success = match ProviderManager::get(&service.provider_code) {
        Ok(provider) => provider.control_instance(instance_id, action).await,
        Err(e) => {
            eprintln!(
                "⚠️ [services] provider {} unavailable for {}: {}",
                service.provider_code,
                action.as_str(),
                e
            );
            false
        }
    };

    if success && action == ControlAction::Delete {
        let _ = sqlx::query(
            "UPDATE vps_services
             SET status = 'terminated', terminated_at = COALESCE(terminated_at, NOW())
             WHERE id = $1 AND status != 'terminated'",
        )
        .bind(id)
        .execute(&state.db)
        .await;
    }

    if let Some(lid) = log_id {
        let duration = start.elapsed().as_millis() as i32;
        let status = if success { "success" } else { "failed" };
        simple_logger::log_action_complete(&state.db, lid, status, duration, None)
            .await
            .ok();
    }

    Json(ControlResponse {
        success,
        action: action.as_str().to_string(),
    })
    .into_response()
}

async fn fetch_owned(state: &AppState, id: Uuid, user_id: Uuid) -> Option<VpsService> {
    sqlx::query_as::<Postgres, VpsService>(&format!(
        "SELECT {} FROM vps_services WHERE id = $1 AND user_id = $2",
        SERVICE_COLUMNS
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(&state.db)
    .await
    .ok()
    .flatten()
}
