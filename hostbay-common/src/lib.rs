use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Enums ---

/// Internal plan vocabulary. Adapters map these to vendor product ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanId {
    Basic,
    Prime,
    Pro,
}

impl PlanId {
    pub const ALL: [PlanId; 3] = [PlanId::Basic, PlanId::Prime, PlanId::Pro];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanId::Basic => "basic",
            PlanId::Prime => "prime",
            PlanId::Pro => "pro",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basic" => Some(PlanId::Basic),
            "prime" => Some(PlanId::Prime),
            "pro" => Some(PlanId::Pro),
            _ => None,
        }
    }

    /// Monthly list price in cents. Longer cycles multiply by months (no discount tier yet).
    pub fn monthly_price_cents(&self) -> i64 {
        match self {
            PlanId::Basic => 599,
            PlanId::Prime => 1299,
            PlanId::Pro => 2499,
        }
    }

    pub fn price_cents(&self, cycle: BillingCycle) -> i64 {
        self.monthly_price_cents() * cycle.months() as i64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingCycle {
    Monthly,
    Quarterly,
    Annual,
}

impl BillingCycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingCycle::Monthly => "monthly",
            BillingCycle::Quarterly => "quarterly",
            BillingCycle::Annual => "annual",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "monthly" => Some(BillingCycle::Monthly),
            "quarterly" => Some(BillingCycle::Quarterly),
            "annual" | "yearly" => Some(BillingCycle::Annual),
            _ => None,
        }
    }

    pub fn months(&self) -> u32 {
        match self {
            BillingCycle::Monthly => 1,
            BillingCycle::Quarterly => 3,
            BillingCycle::Annual => 12,
        }
    }
}

/// Lifecycle of a persisted service record (text column in Postgres).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    PendingPayment, // Card order awaiting the checkout webhook
    Provisioning,   // Request sent (or due to be sent) to the provider
    Active,         // Instance up with an assigned address
    Suspended,      // Suspended at the provider
    Failed,         // Provisioning or payment failed
    Terminated,     // Deleted
}

impl ServiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceStatus::PendingPayment => "pending_payment",
            ServiceStatus::Provisioning => "provisioning",
            ServiceStatus::Active => "active",
            ServiceStatus::Suspended => "suspended",
            ServiceStatus::Failed => "failed",
            ServiceStatus::Terminated => "terminated",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending_payment" => Some(ServiceStatus::PendingPayment),
            "provisioning" => Some(ServiceStatus::Provisioning),
            "active" => Some(ServiceStatus::Active),
            "suspended" => Some(ServiceStatus::Suspended),
            "failed" => Some(ServiceStatus::Failed),
            "terminated" => Some(ServiceStatus::Terminated),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Wallet,
    Card,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Wallet => "wallet",
            PaymentMethod::Card => "card",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wallet" => Some(PaymentMethod::Wallet),
            "card" => Some(PaymentMethod::Card),
            _ => None,
        }
    }
}

// --- Entities (SQLx mapped) ---

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub balance_cents: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow, utoipa::ToSchema)]
pub struct VpsService {
    pub id: Uuid,
    pub user_id: Uuid,
    pub provider_code: String,
    pub plan: String,
    pub billing_cycle: String,
    pub region: String,
    pub hostname: String,
    pub provider_instance_id: Option<String>,
    pub status: String,
    pub ip_address: Option<String>,
    pub admin_username: Option<String>,
    pub period_start: Option<DateTime<Utc>>,
    pub period_end: Option<DateTime<Utc>>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub activated_at: Option<DateTime<Utc>>,
    pub terminated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow, utoipa::ToSchema)]
pub struct Invoice {
    pub id: Uuid,
    pub user_id: Uuid,
    pub service_id: Option<Uuid>,
    pub amount_cents: i64,
    pub currency: String,
    pub payment_method: String,
    pub status: String, // pending | paid | refunded | failed
    pub checkout_session_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

/// Durable provisioning-poll cursor (one row per created provider instance).
#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct ProvisionPoll {
    pub id: Uuid,
    pub service_id: Uuid,
    pub provider_code: String,
    pub provider_instance_id: String,
    pub attempts: i32,
    pub max_attempts: i32,
    pub next_poll_at: DateTime<Utc>,
    pub status: String, // pending | succeeded | failed | timed_out
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_parse_round_trips() {
        for plan in PlanId::ALL {
            assert_eq!(PlanId::parse(plan.as_str()), Some(plan));
        }
        assert_eq!(PlanId::parse("PRIME"), Some(PlanId::Prime));
        assert_eq!(PlanId::parse("enterprise"), None);
    }

    #[test]
    fn cycle_price_multiplies_by_months() {
        assert_eq!(PlanId::Basic.price_cents(BillingCycle::Monthly), 599);
        assert_eq!(PlanId::Basic.price_cents(BillingCycle::Quarterly), 599 * 3);
        assert_eq!(PlanId::Pro.price_cents(BillingCycle::Annual), 2499 * 12);
    }

    #[test]
    fn service_status_round_trips() {
        for s in [
            ServiceStatus::PendingPayment,
            ServiceStatus::Provisioning,
            ServiceStatus::Active,
            ServiceStatus::Suspended,
            ServiceStatus::Failed,
            ServiceStatus::Terminated,
        ] {
            assert_eq!(ServiceStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(ServiceStatus::parse("Ready"), None);
    }
}
