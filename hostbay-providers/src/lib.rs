use async_trait::async_trait;
use hostbay_common::PlanId;

pub mod aeza;
pub mod cloudzy;
pub mod contabo;
pub mod ident;
pub mod manager;
pub mod mock;
pub mod poll;
pub mod zomro;

/// Status reported for a provider-side instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceStatus {
    Provisioning,
    Active,
    Suspended,
    Failed,
    /// Instance id belongs to a provider we no longer resell through.
    /// Synthesized from the id shape, never fetched over the network.
    Legacy,
    /// Mock/placeholder id (`mock-`, `pending-`, `order-` prefixes).
    Mock,
    Unknown,
}

impl InstanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceStatus::Provisioning => "provisioning",
            InstanceStatus::Active => "active",
            InstanceStatus::Suspended => "suspended",
            InstanceStatus::Failed => "failed",
            InstanceStatus::Legacy => "legacy",
            InstanceStatus::Mock => "mock",
            InstanceStatus::Unknown => "unknown",
        }
    }
}

/// An order as submitted to an adapter. Immutable once built.
#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub plan: PlanId,
    pub hostname_label: String,
    pub region: String,
}

/// Result of a successful `create_instance` call.
#[derive(Debug, Clone)]
pub struct CreatedInstance {
    pub instance_id: String,
    pub status: InstanceStatus,
    /// Only some vendors return the root password at order time.
    pub admin_password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct InstanceDetails {
    pub instance_id: String,
    pub status: InstanceStatus,
    /// Empty until the provider allocates an address.
    pub ipv4: String,
    pub admin_username: String,
    pub admin_password: Option<String>,
}

impl InstanceDetails {
    /// Synthetic details for ids that must not hit the network (legacy/mock shapes).
    pub fn synthetic(instance_id: &str, status: InstanceStatus) -> Self {
        Self {
            instance_id: instance_id.to_string(),
            status,
            ipv4: String::new(),
            admin_username: String::new(),
            admin_password: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    Reboot,
    Stop,
    Start,
    Delete,
    ChangePassword,
}

impl ControlAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlAction::Reboot => "reboot",
            ControlAction::Stop => "stop",
            ControlAction::Start => "start",
            ControlAction::Delete => "delete",
            ControlAction::ChangePassword => "change_password",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reboot" | "restart" => Some(ControlAction::Reboot),
            "stop" => Some(ControlAction::Stop),
            "start" => Some(ControlAction::Start),
            "delete" => Some(ControlAction::Delete),
            "change_password" | "changepassword" => Some(ControlAction::ChangePassword),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Required credentials are absent from the environment. Fatal: the call
    /// must not be attempted.
    #[error("{provider}: missing credentials ({detail})")]
    Configuration {
        provider: &'static str,
        detail: String,
    },

    /// Non-2xx status or a body we could not parse.
    #[error("{provider}: request failed: {detail}")]
    Request {
        provider: &'static str,
        detail: String,
    },

    /// No product/region mapping for the given internal value. Caller bug;
    /// should have been validated before reaching the adapter.
    #[error("{provider}: no {what} mapping for {value:?}")]
    Mapping {
        provider: &'static str,
        what: &'static str,
        value: String,
    },
}

impl ProviderError {
    pub fn config(provider: &'static str, detail: impl Into<String>) -> Self {
        ProviderError::Configuration {
            provider,
            detail: detail.into(),
        }
    }

    pub fn request(provider: &'static str, detail: impl ToString) -> Self {
        ProviderError::Request {
            provider,
            detail: detail.to_string(),
        }
    }

    pub fn mapping(provider: &'static str, what: &'static str, value: impl Into<String>) -> Self {
        ProviderError::Mapping {
            provider,
            what,
            value: value.into(),
        }
    }
}

/// One VPS hosting vendor. All callers go through this trait; no route or job
/// imports a vendor module directly.
#[async_trait]
pub trait VpsProvider: Send + Sync {
    fn code(&self) -> &'static str;

    /// Order a new instance. Provisions billable infrastructure upstream:
    /// NOT idempotent, must not be blind-retried.
    async fn create_instance(&self, order: &OrderRequest)
        -> Result<CreatedInstance, ProviderError>;

    /// Fetch current instance details. `Ok(None)` when the vendor reports the
    /// id unknown. Ids shaped like another provider's (or like a placeholder)
    /// are answered synthetically without a network call.
    async fn get_instance(
        &self,
        instance_id: &str,
    ) -> Result<Option<InstanceDetails>, ProviderError>;

    /// Best-effort control call. `true` means the request was accepted or
    /// attempted, not that the action completed. Failures are logged and
    /// returned as `false`, never thrown.
    async fn control_instance(&self, instance_id: &str, action: ControlAction) -> bool;
}
