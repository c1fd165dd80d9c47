//! job-creation: provisions paid-but-uncreated services.
//!
//! Card orders reach `provisioning` with no provider_instance_id when the
//! checkout webhook lands; the HTTP request that confirmed payment is long
//! gone, so a durable job owns the create call instead.
//!
//! `create_instance` is NOT idempotent, so claims are exclusive (FOR UPDATE
//! SKIP LOCKED), leased via last_create_attempt_at, and attempt-bounded.

use anyhow::Result;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use hostbay_common::PlanId;
use hostbay_providers::manager::ProviderManager;
use hostbay_providers::poll::PollConfig;
use hostbay_providers::OrderRequest;

use crate::logger;
use crate::state_machine;

const MAX_CREATE_ATTEMPTS: i32 = 3;

pub async fn run(pool: Pool<Postgres>) {
    let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(10));
    println!("🔁 job-creation started (provision paid services)");

    loop {
        interval.tick().await;

        match claim_and_create(&pool).await {
            Ok(count) if count > 0 => {
                println!("🔁 [job-creation] Dispatched {} service(s)", count)
            }
            Ok(_) => {
                // Silent - nothing due (this is normal)
            }
            Err(e) => eprintln!("❌ [job-creation] Error: {:?}", e),
        }
    }
}

async fn claim_and_create(pool: &Pool<Postgres>) -> Result<usize> {
    // Grace period on created_at keeps us clear of the synchronous wallet
    // path, which sets provider_instance_id within its own request.
    let claimed: Vec<(Uuid, String, String, String, String, i32)> = sqlx::query_as(
        r#"
        WITH cte AS (
            SELECT id, provider_code, plan, region, hostname,
                   COALESCE(create_attempts, 0) AS create_attempts
            FROM vps_services
            WHERE status = 'provisioning'
              AND provider_instance_id IS NULL
              AND created_at < NOW() - INTERVAL '60 seconds'
              AND (last_create_attempt_at IS NULL
                   OR last_create_attempt_at < NOW() - INTERVAL '90 seconds')
              AND COALESCE(create_attempts, 0) < $1
            ORDER BY created_at ASC
            LIMIT 10
            FOR UPDATE SKIP LOCKED
        )
        UPDATE vps_services s
        SET last_create_attempt_at = NOW(),
            create_attempts = cte.create_attempts + 1
        FROM cte
        WHERE s.id = cte.id
        RETURNING cte.id, cte.provider_code, cte.plan, cte.region, cte.hostname,
                  cte.create_attempts + 1 AS attempt
        "#,
    )
    .bind(MAX_CREATE_ATTEMPTS)
    .fetch_all(pool)
    .await?;

    if claimed.is_empty() {
        return Ok(0);
    }

    let claimed_len = claimed.len();
    for (service_id, provider_code, plan, region, hostname, attempt) in claimed {
        let db = pool.clone();
        tokio::spawn(async move {
            create_one(db, service_id, provider_code, plan, region, hostname, attempt).await;
        });
    }

    Ok(claimed_len)
}

async fn create_one(
    db: Pool<Postgres>,
    service_id: Uuid,
    provider_code: String,
    plan: String,
    region: String,
    hostname: String,
    attempt: i32,
) {
    let start = std::time::Instant::now();
    println!(
        "🔵 [job-creation] creating instance for service {} via {} (attempt {}/{})",
        service_id, provider_code, attempt, MAX_CREATE_ATTEMPTS
    );

    let log_id = logger::log_event_with_metadata(
        &db,
        "PROVISION_CREATE",
        "in_progress",
        service_id,
        None,
        Some(serde_json::json!({
            "provider_code": provider_code,
            "plan": plan,
            "region": region,
            "attempt": attempt,
        })),
    )
    .await
    .ok();

    let Some(plan_id) = PlanId::parse(&plan) else {
        // Should have been validated at order time; a bad row would otherwise
        // spin here forever.
        let _ = state_machine::provisioning_to_failed(
            &db,
            service_id,
            "INVALID_PLAN",
            &format!("unparseable plan {:?}", plan),
        )
        .await;
        return;
    };

    let result = match ProviderManager::get(&provider_code) {
        Ok(provider) => {
            provider
                .create_instance(&OrderRequest {
                    plan: plan_id,
                    hostname_label: hostname,
                    region,
                })
                .await
        }
        Err(e) => Err(e),
    };

    let outcome = match result {
        Ok(created) => {
            let updated = sqlx::query(
                "UPDATE vps_services
                 SET provider_instance_id = $2, admin_username = 'root'
                 WHERE id = $1",
            )
            .bind(service_id)
            .bind(&created.instance_id)
            .execute(&db)
            .await;
            if let Err(e) = updated {
                eprintln!(
                    "❌ [job-creation] ORPHANED INSTANCE: provider={} instance_id={} service={}: {:?}",
                    provider_code, created.instance_id, service_id, e
                );
            }

            let poll_cfg = PollConfig::from_env();
            let _ = sqlx::query(
                "INSERT INTO provision_polls
                 (service_id, provider_code, provider_instance_id, max_attempts, next_poll_at)
                 VALUES ($1, $2, $3, $4, NOW())",
            )
            .bind(service_id)
            .bind(&provider_code)
            .bind(&created.instance_id)
            .bind(poll_cfg.max_attempts as i32)
            .execute(&db)
            .await;

            println!(
                "✅ [job-creation] service {} -> instance {} ({})",
                service_id, created.instance_id, provider_code
            );
            ("success", None)
        }
        Err(e) => {
            eprintln!(
                "❌ [job-creation] create failed for service {} (attempt {}/{}): {}",
                service_id, attempt, MAX_CREATE_ATTEMPTS, e
            );
            if attempt >= MAX_CREATE_ATTEMPTS {
                let _ = state_machine::provisioning_to_failed(
                    &db,
                    service_id,
                    "PROVISION_FAILED",
                    &e.to_string(),
                )
                .await;
            }
            ("failed", Some(e.to_string()))
        }
    };

    if let Some(lid) = log_id {
        let duration = start.elapsed().as_millis() as i32;
        let _ = logger::log_event_complete(&db, lid, outcome.0, duration, outcome.1.as_deref())
            .await;
    }
}
