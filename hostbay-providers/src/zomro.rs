//! Zomro adapter. Billmanager-style endpoint: every operation is a single
//! form-encoded POST selected by a `func` parameter, credentials sent per
//! call, values nested under `{"$": ...}` in the JSON output. Numeric ids.

use std::time::Duration;

use async_trait::async_trait;
use hostbay_common::PlanId;
use reqwest::Client;

use crate::ident::{sanitize_hostname, synthetic_status, IdShape};
use crate::{
    ControlAction, CreatedInstance, InstanceDetails, InstanceStatus, OrderRequest, ProviderError,
    VpsProvider,
};

const API_URL: &str = "https://api.zomro.com/billmgr";

pub struct ZomroProvider {
    client: Client,
    user: String,
    password: String,
}

impl ZomroProvider {
    pub fn new(user: String, password: String) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(20))
            .build()
            .unwrap();
        Self {
            client,
            user: user.trim().to_string(),
            password,
        }
    }

    pub fn from_env() -> Result<Self, ProviderError> {
        let user = std::env::var("ZOMRO_USER")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ProviderError::config("zomro", "ZOMRO_USER not set"))?;
        let password = std::env::var("ZOMRO_PASSWORD")
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ProviderError::config("zomro", "ZOMRO_PASSWORD not set"))?;
        Ok(Self::new(user, password))
    }

    async fn call(
        &self,
        func: &str,
        extra: &[(&str, String)],
    ) -> Result<serde_json::Value, ProviderError> {
        let mut form: Vec<(&str, String)> = vec![
            ("func", func.to_string()),
            ("authinfo", format!("{}:{}", self.user, self.password)),
            ("out", "json".to_string()),
        ];
        form.extend(extra.iter().cloned());

        let resp = self
            .client
            .post(API_URL)
            .form(&form)
            .send()
            .await
            .map_err(|e| ProviderError::request("zomro", e))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ProviderError::request(
                "zomro",
                format!("func={} returned status={} body={}", func, status, text),
            ));
        }

        resp.json()
            .await
            .map_err(|e| ProviderError::request("zomro", e))
    }

    /// Billmanager wraps scalar values as {"$": "..."}.
    fn unwrap_value(node: &serde_json::Value) -> Option<&str> {
        node["$"].as_str().or_else(|| node.as_str())
    }

    fn pricelist_id(plan: PlanId) -> u32 {
        match plan {
            PlanId::Basic => 4121,
            PlanId::Prime => 4123,
            PlanId::Pro => 4125,
        }
    }

    fn datacenter_code(region: &str) -> Result<&'static str, ProviderError> {
        match region {
            "london" => Ok("uk1"),
            "amsterdam" => Ok("nl1"),
            "frankfurt" => Ok("de1"),
            "newyork" => Ok("us1"),
            other => Err(ProviderError::mapping("zomro", "region", other)),
        }
    }

    fn map_status(raw: &str) -> InstanceStatus {
        // Billmanager reports numeric state codes; tolerate word forms too.
        match raw {
            "2" | "active" => InstanceStatus::Active,
            "1" | "ordered" | "processing" => InstanceStatus::Provisioning,
            "3" | "suspended" => InstanceStatus::Suspended,
            "5" | "error" | "failed" => InstanceStatus::Failed,
            _ => InstanceStatus::Unknown,
        }
    }
}

#[async_trait]
impl VpsProvider for ZomroProvider {
    fn code(&self) -> &'static str {
        "zomro"
    }

    async fn create_instance(
        &self,
        order: &OrderRequest,
    ) -> Result<CreatedInstance, ProviderError> {
        let datacenter = Self::datacenter_code(&order.region)?;
        let payload = self
            .call(
                "vds.order.param",
                &[
                    ("pricelist", Self::pricelist_id(order.plan).to_string()),
                    ("domain", sanitize_hostname(&order.hostname_label)),
                    ("datacenter", datacenter.to_string()),
                    ("ostempl", "Ubuntu-22.04".to_string()),
                    ("autoprolong", "off".to_string()),
                    ("sok", "ok".to_string()),
                ],
            )
            .await?;

        if !payload["doc"]["error"].is_null() {
            let msg = Self::unwrap_value(&payload["doc"]["error"]["msg"]).unwrap_or("unknown");
            eprintln!("❌ [zomro] order rejected: {}", msg);
            return Err(ProviderError::request(
                "zomro",
                format!("order rejected: {}", msg),
            ));
        }

        let instance_id = Self::unwrap_value(&payload["doc"]["id"])
            .map(|s| s.to_string())
            .ok_or_else(|| ProviderError::request("zomro", "no service id in order response"))?;

        println!("✅ [zomro] ordered vds {} ({:?})", instance_id, order.plan);
        Ok(CreatedInstance {
            instance_id,
            status: InstanceStatus::Provisioning,
            admin_password: None,
        })
    }

    async fn get_instance(
        &self,
        instance_id: &str,
    ) -> Result<Option<InstanceDetails>, ProviderError> {
        if let Some(status) = synthetic_status(instance_id, IdShape::Numeric) {
            return Ok(Some(InstanceDetails::synthetic(instance_id, status)));
        }

        let payload = self
            .call("vds.edit", &[("elid", instance_id.to_string())])
            .await?;

        // Billmanager reports unknown/foreign services as a doc-level error.
        if !payload["doc"]["error"].is_null() {
            let msg = Self::unwrap_value(&payload["doc"]["error"]["msg"]).unwrap_or("unknown");
            eprintln!("⚠️ [zomro] vds {} not readable: {}", instance_id, msg);
            return Ok(None);
        }

        let doc = &payload["doc"];
        let raw_status = Self::unwrap_value(&doc["status"]).unwrap_or("unknown");

        Ok(Some(InstanceDetails {
            instance_id: instance_id.to_string(),
            status: Self::map_status(raw_status),
            ipv4: Self::unwrap_value(&doc["ip"]).unwrap_or("").to_string(),
            admin_username: Self::unwrap_value(&doc["username"])
                .unwrap_or("root")
                .to_string(),
            admin_password: None,
        }))
    }

    async fn control_instance(&self, instance_id: &str, action: ControlAction) -> bool {
        let func = match action {
            ControlAction::Reboot => "vds.restart",
            ControlAction::Stop => "vds.stop",
            ControlAction::Start => "vds.start",
            ControlAction::Delete => "vds.delete",
            ControlAction::ChangePassword => "vds.changepassword",
        };

        match self
            .call(func, &[("elid", instance_id.to_string())])
            .await
        {
            Ok(payload) => {
                if payload["doc"]["error"].is_null() {
                    true
                } else {
                    let msg =
                        Self::unwrap_value(&payload["doc"]["error"]["msg"]).unwrap_or("unknown");
                    eprintln!(
                        "⚠️ [zomro] {} on {} rejected: {}",
                        action.as_str(),
                        instance_id,
                        msg
                    );
                    false
                }
            }
            Err(e) => {
                eprintln!(
                    "⚠️ [zomro] {} on {} failed: {}",
                    action.as_str(),
                    instance_id,
                    e
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn every_plan_has_a_pricelist() {
        for plan in PlanId::ALL {
            assert!(ZomroProvider::pricelist_id(plan) > 0);
        }
    }

    #[test]
    fn datacenters_map_and_reject_unknowns() {
        assert_eq!(ZomroProvider::datacenter_code("london").unwrap(), "uk1");
        assert!(ZomroProvider::datacenter_code("osaka").is_err());
    }

    #[test]
    fn unwraps_billmanager_dollar_values() {
        let wrapped = json!({"$": "203.0.113.5"});
        assert_eq!(ZomroProvider::unwrap_value(&wrapped), Some("203.0.113.5"));
        let plain = json!("plain");
        assert_eq!(ZomroProvider::unwrap_value(&plain), Some("plain"));
        assert_eq!(ZomroProvider::unwrap_value(&json!(null)), None);
    }

    #[test]
    fn numeric_state_codes_map() {
        assert_eq!(ZomroProvider::map_status("2"), InstanceStatus::Active);
        assert_eq!(ZomroProvider::map_status("1"), InstanceStatus::Provisioning);
        assert_eq!(ZomroProvider::map_status("3"), InstanceStatus::Suspended);
        assert_eq!(ZomroProvider::map_status("5"), InstanceStatus::Failed);
        assert_eq!(ZomroProvider::map_status("9"), InstanceStatus::Unknown);
    }
}
