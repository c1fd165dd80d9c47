//! Hosted-checkout webhook. The payment processor is an external
//! collaborator; all we verify here is the shared secret, then we advance the
//! invoice and service with idempotent conditional updates.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{Months, Utc};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use hostbay_common::BillingCycle;

use crate::simple_logger;
use crate::state::AppState;

#[derive(Deserialize, utoipa::ToSchema)]
pub struct PaymentEvent {
    pub checkout_session_id: String,
    /// "payment.succeeded" | "payment.failed"
    pub event: String,
}

fn signature_ok(headers: &HeaderMap) -> Option<bool> {
    let expected = std::env::var("PAYMENT_WEBHOOK_SECRET")
        .ok()
        .filter(|s| !s.trim().is_empty())?;
    let got = headers
        .get("x-webhook-signature")
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");
    Some(got.trim() == expected.trim())
}

#[utoipa::path(
    post,
    path = "/webhooks/payment",
    request_body = PaymentEvent,
    responses(
        (status = 200, description = "Event processed (or already processed)"),
        (status = 401, description = "Bad signature"),
        (status = 503, description = "Webhook secret not configured")
    )
)]
pub async fn payment_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(event): Json<PaymentEvent>,
) -> axum::response::Response {
    match signature_ok(&headers) {
        None => {
            eprintln!("❌ [webhooks] PAYMENT_WEBHOOK_SECRET not configured");
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({"error": "webhook_not_configured"})),
            )
                .into_response();
        }
        Some(false) => {
            return (StatusCode::UNAUTHORIZED, Json(json!({"error": "bad_signature"})))
                .into_response()
        }
        Some(true) => {}
    }

    match event.event.as_str() {
        "payment.succeeded" => payment_succeeded(&state, &event.checkout_session_id).await,
        "payment.failed" => payment_failed(&state, &event.checkout_session_id).await,
        other => {
            println!("ℹ️ [webhooks] ignoring event {:?}", other);
            Json(json!({"status": "ignored"})).into_response()
        }
    }
}

async fn payment_succeeded(state: &AppState, session_id: &str) -> axum::response::Response {
    // Conditional update makes redelivery a no-op.
    let row: Option<(Uuid, Option<Uuid>)> = sqlx::query_as(
        "UPDATE invoices SET status = 'paid', paid_at = NOW()
         WHERE checkout_session_id = $1 AND status = 'pending'
         RETURNING user_id, service_id",
    )
    .bind(session_id)
    .fetch_optional(&state.db)
    .await
    .unwrap_or(None);

    let Some((_user_id, Some(service_id))) = row else {
        return Json(json!({"status": "ignored"})).into_response();
    };

    let cycle: Option<String> =
        sqlx::query_scalar("SELECT billing_cycle FROM vps_services WHERE id = $1")
            .bind(service_id)
            .fetch_optional(&state.db)
            .await
            .unwrap_or(None);
    let months = cycle
        .as_deref()
        .and_then(BillingCycle::parse)
        .unwrap_or(BillingCycle::Monthly)
        .months();
    let period_start = Utc::now();
    let period_end = period_start
        .checked_add_months(Months::new(months))
        .unwrap_or(period_start);

    // Hand the service to the orchestrator's creation job: provisioning with
    // no provider instance id is exactly what it claims.
    let res = sqlx::query(
        "UPDATE vps_services
         SET status = 'provisioning', period_start = $2, period_end = $3
         WHERE id = $1 AND status = 'pending_payment'",
    )
    .bind(service_id)
    .bind(period_start)
    .bind(period_end)
    .execute(&state.db)
    .await;

    match res {
        Ok(r) if r.rows_affected() > 0 => {
            println!(
                "💳 [webhooks] payment confirmed for service {}, queued for provisioning",
                service_id
            );
            let _ = simple_logger::log_action(
                &state.db,
                "PAYMENT_CONFIRMED",
                "success",
                Some(service_id),
                None,
            )
            .await;
            Json(json!({"status": "processed"})).into_response()
        }
        Ok(_) => Json(json!({"status": "ignored"})).into_response(),
        Err(e) => {
            eprintln!("❌ [webhooks] failed to queue service {}: {:?}", service_id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "database_error"})),
            )
                .into_response()
        }
    }
}

async fn payment_failed(state: &AppState, session_id: &str) -> axum::response::Response {
    let row: Option<(Uuid, Option<Uuid>)> = sqlx::query_as(
        "UPDATE invoices SET status = 'failed'
         WHERE checkout_session_id = $1 AND status = 'pending'
         RETURNING user_id, service_id",
    )
    .bind(session_id)
    .fetch_optional(&state.db)
    .await
    .unwrap_or(None);

    let Some((_user_id, Some(service_id))) = row else {
        return Json(json!({"status": "ignored"})).into_response();
    };

    let _ = sqlx::query(
        "UPDATE vps_services
         SET status = 'failed', error_code = 'PAYMENT_FAILED',
             error_message = 'checkout reported failure'
         WHERE id = $1 AND status = 'pending_payment'",
    )
    .bind(service_id)
    .execute(&state.db)
    .await;

    let _ = simple_logger::log_action(
        &state.db,
        "PAYMENT_FAILED",
        "failed",
        Some(service_id),
        Some("checkout reported failure"),
    )
    .await;

    Json(json!({"status": "processed"})).into_response()
}
