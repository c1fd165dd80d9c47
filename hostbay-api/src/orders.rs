//! Order handler: the one purchase entrypoint. Wallet orders debit and
//! provision synchronously; card orders defer provisioning until the checkout
//! webhook confirms payment.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{Months, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use hostbay_common::{BillingCycle, PaymentMethod, PlanId};
use hostbay_providers::ident::sanitize_hostname;
use hostbay_providers::manager::ProviderManager;
use hostbay_providers::poll::PollConfig;
use hostbay_providers::{OrderRequest, ProviderError};

use crate::auth::user_id_from_headers;
use crate::simple_logger;
use crate::state::AppState;

/// Regions the storefront sells. Adapters own the vendor-specific codes.
pub const SUPPORTED_REGIONS: [&str; 4] = ["london", "amsterdam", "frankfurt", "newyork"];

pub fn is_supported_region(region: &str) -> bool {
    SUPPORTED_REGIONS.contains(&region)
}

pub fn checkout_url(session_id: &str) -> String {
    let base = std::env::var("CHECKOUT_BASE_URL")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "https://pay.hostbay.example".to_string());
    format!("{}/pay/{}", base.trim_end_matches('/'), session_id)
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct OrderBody {
    /// "basic" | "prime" | "pro"
    pub plan: String,
    pub region: String,
    pub hostname: String,
    /// "monthly" (default) | "quarterly" | "annual"
    #[serde(default)]
    pub billing_cycle: Option<String>,
    /// "wallet" | "card"
    pub payment_method: String,
    /// Defaults to the VPS_PROVIDER environment selection.
    #[serde(default)]
    pub provider_code: Option<String>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct OrderResponse {
    pub service_id: Uuid,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkout_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

fn reject(status: StatusCode, error: &str, message: &str) -> axum::response::Response {
    (
        status,
        Json(json!({ "error": error, "message": message })),
    )
        .into_response()
}

// COMMAND : CREATE ORDER
#[utoipa::path(
    post,
    path = "/orders",
    request_body = OrderBody,
    responses(
        (status = 201, description = "Order placed and instance requested", body = OrderResponse),
        (status = 200, description = "Checkout session created (card path)", body = OrderResponse),
        (status = 400, description = "Validation error"),
        (status = 402, description = "Insufficient wallet balance"),
        (status = 502, description = "Provider rejected the order")
    )
)]
pub async fn create_order(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<OrderBody>,
) -> axum::response::Response {
    let start = std::time::Instant::now();

    let Some(user_id) = user_id_from_headers(&headers) else {
        return reject(StatusCode::UNAUTHORIZED, "unauthenticated", "missing X-User-Id");
    };

    // Validate the whole order before touching balance or provider. Mapping
    // problems are caller bugs and must never reach an adapter.
    let Some(plan) = PlanId::parse(&body.plan) else {
        return reject(StatusCode::BAD_REQUEST, "invalid_plan", "unknown plan id");
    };
    let cycle = match &body.billing_cycle {
        None => BillingCycle::Monthly,
        Some(raw) => match BillingCycle::parse(raw) {
            Some(c) => c,
            None => {
                return reject(
                    StatusCode::BAD_REQUEST,
                    "invalid_billing_cycle",
                    "unknown billing cycle",
                )
            }
        },
    };
    let Some(method) = PaymentMethod::parse(&body.payment_method) else {
        return reject(
            StatusCode::BAD_REQUEST,
            "invalid_payment_method",
            "payment_method must be wallet or card",
        );
    };
    let region = body.region.trim().to_ascii_lowercase();
    if !is_supported_region(&region) {
        return reject(StatusCode::BAD_REQUEST, "invalid_region", "unsupported region");
    }
    if body.hostname.trim().is_empty() {
        return reject(StatusCode::BAD_REQUEST, "invalid_hostname", "hostname is required");
    }

    let provider_code = body
        .provider_code
        .as_deref()
        .map(|s| s.trim().to_ascii_lowercase())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(ProviderManager::default_provider_code);
    if !ProviderManager::is_known_code(&provider_code) {
        return reject(StatusCode::BAD_REQUEST, "invalid_provider", "unknown provider code");
    }

    let hostname = sanitize_hostname(&body.hostname);
    let price_cents = plan.price_cents(cycle);
    let service_id = Uuid::new_v4();

    let log_id = simple_logger::log_action_with_metadata(
        &state.db,
        "REQUEST_ORDER",
        "in_progress",
        Some(service_id),
        None,
        Some(json!({
            "user_id": user_id.to_string(),
            "plan": plan.as_str(),
            "region": region,
            "provider_code": provider_code,
            "payment_method": method.as_str(),
            "amount_cents": price_cents,
        })),
    )
    .await
    .ok();

    let response = match method {
        PaymentMethod::Wallet => {
            wallet_order(
                &state, user_id, service_id, plan, cycle, &region, &hostname, &provider_code,
                price_cents,
            )
            .await
        }
        PaymentMethod::Card => {
            card_order(
                &state, user_id, service_id, plan, cycle, &region, &hostname, &provider_code,
                price_cents,
            )
            .await
        }
    };

    if let Some(lid) = log_id {
        let duration = start.elapsed().as_millis() as i32;
        let outcome = if response.status().is_success() {
            "success"
        } else {
            "failed"
        };
        simple_logger::log_action_complete(&state.db, lid, outcome, duration, None)
            .await
            .ok();
    }

    response
}

#[allow(clippy::too_many_arguments)]
async fn wallet_order(
    state: &AppState,
    user_id: Uuid,
    service_id: Uuid,
    plan: PlanId,
    cycle: BillingCycle,
    region: &str,
    hostname: &str,
    provider_code: &str,
    price_cents: i64,
) -> axum::response::Response {
    // Resolve the adapter before any money moves: missing credentials are a
    // deployment problem and must not debit anyone.
    let provider = match ProviderManager::get(provider_code) {
        Ok(p) => p,
        Err(e @ ProviderError::Configuration { .. }) => {
            eprintln!("❌ [orders] provider {} unavailable: {}", provider_code, e);
            return reject(
                StatusCode::SERVICE_UNAVAILABLE,
                "provider_unavailable",
                "provider is not configured",
            );
        }
        Err(e) => {
            eprintln!("❌ [orders] provider {} rejected: {}", provider_code, e);
            return reject(StatusCode::BAD_REQUEST, "invalid_provider", "unknown provider");
        }
    };

    // Atomic conditional debit: zero rows means insufficient funds, and in
    // that case nothing has been charged and no provider call is made.
    let debit = sqlx::query(
        "UPDATE users SET balance_cents = balance_cents - $2
         WHERE id = $1 AND balance_cents >= $2",
    )
    .bind(user_id)
    .bind(price_cents)
    .execute(&state.db)
    .await;

    match debit {
        Ok(r) if r.rows_affected() > 0 => {}
        Ok(_) => {
            return reject(
                StatusCode::PAYMENT_REQUIRED,
                "insufficient_balance",
                "wallet balance is below the plan price",
            )
        }
        Err(e) => {
            eprintln!("❌ [orders] debit failed for user {}: {:?}", user_id, e);
            return reject(
                StatusCode::INTERNAL_SERVER_ERROR,
                "database_error",
                "could not debit wallet",
            );
        }
    }

    let period_start = Utc::now();
    let period_end = period_start
        .checked_add_months(Months::new(cycle.months()))
        .unwrap_or(period_start);

    let inserted = sqlx::query(
        "INSERT INTO vps_services
         (id, user_id, provider_code, plan, billing_cycle, region, hostname, status,
          period_start, period_end, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, 'provisioning', $8, $9, NOW())",
    )
    .bind(service_id)
    .bind(user_id)
    .bind(provider_code)
    .bind(plan.as_str())
    .bind(cycle.as_str())
    .bind(region)
    .bind(hostname)
    .bind(period_start)
    .bind(period_end)
    .execute(&state.db)
    .await;

    if let Err(e) = inserted {
        eprintln!("❌ [orders] service insert failed: {:?}", e);
        refund(state, user_id, price_cents).await;
        return reject(
            StatusCode::INTERNAL_SERVER_ERROR,
            "database_error",
            "could not persist service",
        );
    }

    let invoice_id = Uuid::new_v4();
    let _ = sqlx::query(
        "INSERT INTO invoices
         (id, user_id, service_id, amount_cents, payment_method, status, created_at, paid_at)
         VALUES ($1, $2, $3, $4, 'wallet', 'paid', NOW(), NOW())",
    )
    .bind(invoice_id)
    .bind(user_id)
    .bind(service_id)
    .bind(price_cents)
    .execute(&state.db)
    .await;

    println!(
        "🚀 [orders] wallet order {}: {} {} in {} via {}",
        service_id,
        plan.as_str(),
        cycle.as_str(),
        region,
        provider_code
    );

    let order = OrderRequest {
        plan,
        hostname_label: hostname.to_string(),
        region: region.to_string(),
    };

    match provider.create_instance(&order).await {
        Ok(created) => {
            let updated = sqlx::query(
                "UPDATE vps_services
                 SET provider_instance_id = $2, admin_username = 'root'
                 WHERE id = $1",
            )
            .bind(service_id)
            .bind(&created.instance_id)
            .execute(&state.db)
            .await;
            if let Err(e) = updated {
                // The instance exists upstream but we lost the link: surface
                // everything support needs to reap it by hand.
                eprintln!(
                    "❌ [orders] ORPHANED INSTANCE: provider={} instance_id={} service={} user={}: {:?}",
                    provider_code, created.instance_id, service_id, user_id, e
                );
            }

            let poll_cfg = PollConfig::from_env();
            let _ = sqlx::query(
                "INSERT INTO provision_polls
                 (service_id, provider_code, provider_instance_id, max_attempts, next_poll_at)
                 VALUES ($1, $2, $3, $4, NOW())",
            )
            .bind(service_id)
            .bind(provider_code)
            .bind(&created.instance_id)
            .bind(poll_cfg.max_attempts as i32)
            .execute(&state.db)
            .await;

            (
                StatusCode::CREATED,
                Json(OrderResponse {
                    service_id,
                    status: "provisioning".to_string(),
                    instance_id: Some(created.instance_id),
                    checkout_url: None,
                    message: None,
                }),
            )
                .into_response()
        }
        Err(e) => {
            // Hard failure in every environment: refund the debit and fail
            // the order. Development runs pick the mock provider explicitly
            // instead of falling back to a fake instance id here.
            eprintln!("❌ [orders] provisioning failed for {}: {}", service_id, e);
            refund(state, user_id, price_cents).await;
            let _ = sqlx::query(
                "UPDATE invoices SET status = 'refunded' WHERE id = $1",
            )
            .bind(invoice_id)
            .execute(&state.db)
            .await;
            let _ = sqlx::query(
                "UPDATE vps_services
                 SET status = 'failed', error_code = 'PROVISION_FAILED', error_message = $2
                 WHERE id = $1",
            )
            .bind(service_id)
            .bind(e.to_string())
            .execute(&state.db)
            .await;

            reject(
                StatusCode::BAD_GATEWAY,
                "provision_failed",
                "provider rejected the order; wallet has been refunded",
            )
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn card_order(
    state: &AppState,
    user_id: Uuid,
    service_id: Uuid,
    plan: PlanId,
    cycle: BillingCycle,
    region: &str,
    hostname: &str,
    provider_code: &str,
    price_cents: i64,
) -> axum::response::Response {
    // No provider call here: the instance is created only after the checkout
    // webhook confirms payment.
    let inserted = sqlx::query(
        "INSERT INTO vps_services
         (id, user_id, provider_code, plan, billing_cycle, region, hostname, status, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending_payment', NOW())",
    )
    .bind(service_id)
    .bind(user_id)
    .bind(provider_code)
    .bind(plan.as_str())
    .bind(cycle.as_str())
    .bind(region)
    .bind(hostname)
    .execute(&state.db)
    .await;

    if let Err(e) = inserted {
        eprintln!("❌ [orders] service insert failed: {:?}", e);
        return reject(
            StatusCode::INTERNAL_SERVER_ERROR,
            "database_error",
            "could not persist service",
        );
    }

    let session_id = format!("cs_{}", Uuid::new_v4().simple());
    let inserted = sqlx::query(
        "INSERT INTO invoices
         (user_id, service_id, amount_cents, payment_method, status, checkout_session_id, created_at)
         VALUES ($1, $2, $3, 'card', 'pending', $4, NOW())",
    )
    .bind(user_id)
    .bind(service_id)
    .bind(price_cents)
    .bind(&session_id)
    .execute(&state.db)
    .await;

    if let Err(e) = inserted {
        eprintln!("❌ [orders] invoice insert failed: {:?}", e);
        return reject(
            StatusCode::INTERNAL_SERVER_ERROR,
            "database_error",
            "could not create checkout session",
        );
    }

    println!(
        "🧾 [orders] card order {}: awaiting checkout session {}",
        service_id, session_id
    );

    (
        StatusCode::OK,
        Json(OrderResponse {
            service_id,
            status: "pending_payment".to_string(),
            instance_id: None,
            checkout_url: Some(checkout_url(&session_id)),
            message: Some("complete payment to start provisioning".to_string()),
        }),
    )
        .into_response()
}

async fn refund(state: &AppState, user_id: Uuid, amount_cents: i64) {
    let res = sqlx::query("UPDATE users SET balance_cents = balance_cents + $2 WHERE id = $1")
        .bind(user_id)
        .bind(amount_cents)
        .execute(&state.db)
        .await;
    if let Err(e) = res {
        eprintln!(
            "❌ [orders] REFUND FAILED for user {} amount {}: {:?}",
            user_id, amount_cents, e
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supported_regions_cover_the_storefront() {
        assert!(is_supported_region("london"));
        assert!(is_supported_region("newyork"));
        assert!(!is_supported_region("tokyo"));
        assert!(!is_supported_region(""));
    }

    #[test]
    fn checkout_url_appends_session() {
        std::env::remove_var("CHECKOUT_BASE_URL");
        let url = checkout_url("cs_abc123");
        assert_eq!(url, "https://pay.hostbay.example/pay/cs_abc123");
    }
}
