//! Idempotent service/cursor transitions. Every update is gated on the
//! current status, so redelivered or concurrently-claimed work is a no-op.

use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::logger;

/// Transition PROVISIONING -> ACTIVE once the instance has an address.
pub async fn provisioning_to_active(
    db: &Pool<Postgres>,
    service_id: Uuid,
    ip_address: &str,
    admin_username: &str,
) -> Result<bool, sqlx::Error> {
    let res = sqlx::query(
        "UPDATE vps_services
         SET status = 'active',
             ip_address = $2,
             admin_username = COALESCE(NULLIF($3, ''), admin_username),
             activated_at = COALESCE(activated_at, NOW())
         WHERE id = $1 AND status = 'provisioning'",
    )
    .bind(service_id)
    .bind(ip_address)
    .bind(admin_username)
    .execute(db)
    .await?;

    if res.rows_affected() > 0 {
        println!("✅ [state_machine] service {} is active at {}", service_id, ip_address);
        let _ = logger::log_event_with_metadata(
            db,
            "SERVICE_ACTIVE",
            "success",
            service_id,
            None,
            Some(serde_json::json!({ "ip_address": ip_address })),
        )
        .await;
        Ok(true)
    } else {
        Ok(false)
    }
}

/// Transition PROVISIONING -> FAILED with an error code.
pub async fn provisioning_to_failed(
    db: &Pool<Postgres>,
    service_id: Uuid,
    error_code: &str,
    error_message: &str,
) -> Result<bool, sqlx::Error> {
    let res = sqlx::query(
        "UPDATE vps_services
         SET status = 'failed', error_code = $2, error_message = $3
         WHERE id = $1 AND status = 'provisioning'",
    )
    .bind(service_id)
    .bind(error_code)
    .bind(error_message)
    .execute(db)
    .await?;

    if res.rows_affected() > 0 {
        eprintln!(
            "❌ [state_machine] service {} failed: {} ({})",
            service_id, error_code, error_message
        );
        let _ = logger::log_event(
            db,
            "SERVICE_FAILED",
            "failed",
            service_id,
            Some(error_message),
        )
        .await;
        Ok(true)
    } else {
        Ok(false)
    }
}

/// Close a poll cursor (succeeded | failed | timed_out).
pub async fn close_poll(
    db: &Pool<Postgres>,
    poll_id: Uuid,
    status: &str,
    last_error: Option<&str>,
) -> Result<bool, sqlx::Error> {
    let res = sqlx::query(
        "UPDATE provision_polls
         SET status = $2, last_error = COALESCE($3, last_error), updated_at = NOW()
         WHERE id = $1 AND status = 'pending'",
    )
    .bind(poll_id)
    .bind(status)
    .bind(last_error)
    .execute(db)
    .await?;

    Ok(res.rows_affected() > 0)
}

/// Record a transient poll error without closing the cursor.
pub async fn note_poll_error(db: &Pool<Postgres>, poll_id: Uuid, error: &str) {
    let _ = sqlx::query(
        "UPDATE provision_polls SET last_error = $2, updated_at = NOW() WHERE id = $1",
    )
    .bind(poll_id)
    .bind(error)
    .execute(db)
    .await;
}
