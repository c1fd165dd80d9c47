//! In-memory mock provider for tests and local development. Selected
//! explicitly (`VPS_PROVIDER=mock` or `USE_ZOMRO_MOCK=1`); there is no silent
//! fallback to it on real-provider failures.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use async_trait::async_trait;

use crate::{
    ControlAction, CreatedInstance, InstanceDetails, InstanceStatus, OrderRequest, ProviderError,
    VpsProvider,
};

struct MockInstance {
    polls: u32,
    ipv4: String,
    deleted: bool,
}

pub struct MockProvider {
    instances: Mutex<HashMap<String, MockInstance>>,
    /// Number of status polls before an instance reports active.
    activate_after: u32,
    next_ip_octet: Mutex<u8>,
}

impl MockProvider {
    pub fn new(activate_after: u32) -> Self {
        Self {
            instances: Mutex::new(HashMap::new()),
            activate_after,
            next_ip_octet: Mutex::new(10),
        }
    }

    /// Process-wide instance so the API and the orchestrator jobs observe the
    /// same mock inventory within one process.
    pub fn shared() -> Arc<MockProvider> {
        static SHARED: OnceLock<Arc<MockProvider>> = OnceLock::new();
        SHARED.get_or_init(|| Arc::new(MockProvider::new(2))).clone()
    }
}

#[async_trait]
impl VpsProvider for MockProvider {
    fn code(&self) -> &'static str {
        "mock"
    }

    async fn create_instance(
        &self,
        order: &OrderRequest,
    ) -> Result<CreatedInstance, ProviderError> {
        let instance_id = format!("mock-{}", uuid::Uuid::new_v4());
        let ipv4 = {
            let mut octet = self.next_ip_octet.lock().unwrap();
            *octet = octet.wrapping_add(1);
            format!("192.0.2.{}", *octet) // TEST-NET-1
        };
        self.instances.lock().unwrap().insert(
            instance_id.clone(),
            MockInstance {
                polls: 0,
                ipv4,
                deleted: false,
            },
        );
        println!("✅ [mock] created instance {} ({:?})", instance_id, order.plan);
        Ok(CreatedInstance {
            instance_id,
            status: InstanceStatus::Provisioning,
            admin_password: Some(format!("mock-{}", uuid::Uuid::new_v4().simple())),
        })
    }

    async fn get_instance(
        &self,
        instance_id: &str,
    ) -> Result<Option<InstanceDetails>, ProviderError> {
        let mut instances = self.instances.lock().unwrap();
        let Some(inst) = instances.get_mut(instance_id) else {
            return Ok(None);
        };
        if inst.deleted {
            return Ok(None);
        }

        inst.polls += 1;
        let (status, ipv4) = if inst.polls >= self.activate_after {
            (InstanceStatus::Active, inst.ipv4.clone())
        } else {
            (InstanceStatus::Provisioning, String::new())
        };

        Ok(Some(InstanceDetails {
            instance_id: instance_id.to_string(),
            status,
            ipv4,
            admin_username: "root".to_string(),
            admin_password: None,
        }))
    }

    async fn control_instance(&self, instance_id: &str, action: ControlAction) -> bool {
        let mut instances = self.instances.lock().unwrap();
        let Some(inst) = instances.get_mut(instance_id) else {
            eprintln!(
                "⚠️ [mock] {} on unknown instance {}",
                action.as_str(),
                instance_id
            );
            return false;
        };
        if inst.deleted {
            return false;
        }
        if action == ControlAction::Delete {
            inst.deleted = true;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostbay_common::PlanId;

    fn order() -> OrderRequest {
        OrderRequest {
            plan: PlanId::Basic,
            hostname_label: "mock host 01!".into(),
            region: "london".into(),
        }
    }

    #[tokio::test]
    async fn activates_after_configured_polls() {
        let p = MockProvider::new(3);
        let created = p.create_instance(&order()).await.unwrap();
        assert!(created.instance_id.starts_with("mock-"));

        for _ in 0..2 {
            let d = p.get_instance(&created.instance_id).await.unwrap().unwrap();
            assert_eq!(d.status, InstanceStatus::Provisioning);
            assert!(d.ipv4.is_empty());
        }
        let d = p.get_instance(&created.instance_id).await.unwrap().unwrap();
        assert_eq!(d.status, InstanceStatus::Active);
        assert!(d.ipv4.starts_with("192.0.2."));
    }

    #[tokio::test]
    async fn unknown_and_deleted_instances_read_as_none() {
        let p = MockProvider::new(1);
        assert!(p.get_instance("mock-nope").await.unwrap().is_none());

        let created = p.create_instance(&order()).await.unwrap();
        assert!(
            p.control_instance(&created.instance_id, ControlAction::Delete)
                .await
        );
        assert!(p.get_instance(&created.instance_id).await.unwrap().is_none());
        assert!(
            !p.control_instance(&created.instance_id, ControlAction::Reboot)
                .await
        );
    }
}
