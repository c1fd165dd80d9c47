//! job-poll: advances durable provisioning-poll cursors.
//!
//! Each claim is exactly one get_instance step; the cursor's attempt count
//! and next_poll_at live in Postgres, so a restart mid-provisioning resumes
//! where the previous process stopped instead of abandoning the instance.

use anyhow::Result;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use hostbay_providers::manager::ProviderManager;
use hostbay_providers::poll::{classify, PollConfig, PollStep};

use crate::state_machine;

pub async fn run(pool: Pool<Postgres>) {
    let cfg = PollConfig::from_env();
    let mut interval = tokio::time::interval(cfg.interval);
    println!(
        "🔁 job-poll started (interval={}s)",
        cfg.interval.as_secs()
    );

    loop {
        interval.tick().await;

        match claim_and_poll(&pool, &cfg).await {
            Ok(count) if count > 0 => {
                println!("🔁 [job-poll] Stepped {} cursor(s)", count)
            }
            Ok(_) => {
                // Silent - nothing due
            }
            Err(e) => eprintln!("❌ [job-poll] Error: {:?}", e),
        }
    }
}

async fn claim_and_poll(pool: &Pool<Postgres>, cfg: &PollConfig) -> Result<usize> {
    let interval_secs = cfg.interval.as_secs() as i32;

    // Bump attempts and reschedule inside the claim itself, so a crashed
    // worker costs one skipped slot rather than a stuck cursor.
    let claimed: Vec<(Uuid, Uuid, String, String, i32, i32)> = sqlx::query_as(
        r#"
        WITH cte AS (
            SELECT id, service_id, provider_code, provider_instance_id,
                   attempts, max_attempts
            FROM provision_polls
            WHERE status = 'pending'
              AND next_poll_at <= NOW()
            ORDER BY next_poll_at ASC
            LIMIT 25
            FOR UPDATE SKIP LOCKED
        )
        UPDATE provision_polls p
        SET attempts = cte.attempts + 1,
            next_poll_at = NOW() + ($1::int * INTERVAL '1 second'),
            updated_at = NOW()
        FROM cte
        WHERE p.id = cte.id
        RETURNING cte.id, cte.service_id, cte.provider_code, cte.provider_instance_id,
                  cte.attempts + 1 AS attempt, cte.max_attempts
        "#,
    )
    .bind(interval_secs)
    .fetch_all(pool)
    .await?;

    if claimed.is_empty() {
        return Ok(0);
    }

    let claimed_len = claimed.len();
    for (poll_id, service_id, provider_code, instance_id, attempt, max_attempts) in claimed {
        let db = pool.clone();
        tokio::spawn(async move {
            step_one(
                db,
                poll_id,
                service_id,
                provider_code,
                instance_id,
                attempt,
                max_attempts,
            )
            .await;
        });
    }

    Ok(claimed_len)
}

async fn step_one(
    db: Pool<Postgres>,
    poll_id: Uuid,
    service_id: Uuid,
    provider_code: String,
    instance_id: String,
    attempt: i32,
    max_attempts: i32,
) {
    let provider = match ProviderManager::get(&provider_code) {
        Ok(p) => p,
        Err(e) => {
            eprintln!(
                "⚠️ [job-poll] provider {} unavailable for cursor {}: {}",
                provider_code, poll_id, e
            );
            state_machine::note_poll_error(&db, poll_id, &e.to_string()).await;
            if attempt >= max_attempts {
                timeout_cursor(&db, poll_id, service_id, attempt).await;
            }
            return;
        }
    };

    match provider.get_instance(&instance_id).await {
        Ok(details) => match classify(details) {
            PollStep::Ready(d) => {
                let _ = state_machine::provisioning_to_active(
                    &db,
                    service_id,
                    &d.ipv4,
                    &d.admin_username,
                )
                .await;
                let _ = state_machine::close_poll(&db, poll_id, "succeeded", None).await;
            }
            PollStep::Fatal(status) => {
                let msg = format!("provider reported {} during provisioning", status.as_str());
                let _ = state_machine::provisioning_to_failed(
                    &db,
                    service_id,
                    "PROVISION_FAILED",
                    &msg,
                )
                .await;
                let _ = state_machine::close_poll(&db, poll_id, "failed", Some(&msg)).await;
            }
            PollStep::Retry => {
                if attempt >= max_attempts {
                    timeout_cursor(&db, poll_id, service_id, attempt).await;
                }
            }
        },
        Err(e) => {
            // Transient transport failure: burns an attempt, cursor stays open.
            eprintln!(
                "⚠️ [job-poll] poll {}/{} for instance {} failed: {}",
                attempt, max_attempts, instance_id, e
            );
            state_machine::note_poll_error(&db, poll_id, &e.to_string()).await;
            if attempt >= max_attempts {
                timeout_cursor(&db, poll_id, service_id, attempt).await;
            }
        }
    }
}

/// Attempts exhausted. The instance may still converge upstream, so the
/// service stays 'provisioning' for support to re-trigger; only the cursor
/// closes.
async fn timeout_cursor(db: &Pool<Postgres>, poll_id: Uuid, service_id: Uuid, attempts: i32) {
    let closed = state_machine::close_poll(
        db,
        poll_id,
        "timed_out",
        Some(&format!("no active state after {} attempts", attempts)),
    )
    .await
    .unwrap_or(false);
    if closed {
        eprintln!(
            "⚠️ [job-poll] cursor {} for service {} timed out after {} attempts",
            poll_id, service_id, attempts
        );
        let _ = crate::logger::log_event(
            db,
            "PROVISION_POLL_TIMEOUT",
            "failed",
            service_id,
            Some("polling exhausted; service left in provisioning"),
        )
        .await;
    }
}
