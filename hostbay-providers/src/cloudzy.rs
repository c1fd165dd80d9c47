//! Cloudzy adapter. JSON REST API under `/v1`, authenticated with an
//! `x-api-key` header. Cloudzy mints UUID instance ids, so numeric ids left
//! over from earlier vendors are answered as `legacy` without a network call.

use std::time::Duration;

use async_trait::async_trait;
use hostbay_common::PlanId;
use reqwest::Client;
use serde_json::json;

use crate::ident::{sanitize_hostname, synthetic_status, IdShape};
use crate::{
    ControlAction, CreatedInstance, InstanceDetails, InstanceStatus, OrderRequest, ProviderError,
    VpsProvider,
};

const API_BASE: &str = "https://api.cloudzy.com/v1";

pub struct CloudzyProvider {
    client: Client,
    api_token: String,
}

impl CloudzyProvider {
    pub fn new(api_token: String) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(20))
            .build()
            .unwrap();
        Self {
            client,
            api_token: api_token.trim().to_string(),
        }
    }

    pub fn from_env() -> Result<Self, ProviderError> {
        let token = std::env::var("CLOUDZY_API_TOKEN")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ProviderError::config("cloudzy", "CLOUDZY_API_TOKEN not set"))?;
        Ok(Self::new(token))
    }

    fn headers(&self) -> reqwest::header::HeaderMap {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "x-api-key",
            reqwest::header::HeaderValue::from_str(&self.api_token).unwrap(),
        );
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        headers
    }

    fn product_id(plan: PlanId) -> &'static str {
        match plan {
            PlanId::Basic => "vps-nvme-1c-1g",
            PlanId::Prime => "vps-nvme-2c-4g",
            PlanId::Pro => "vps-nvme-4c-8g",
        }
    }

    fn region_id(region: &str) -> Result<&'static str, ProviderError> {
        match region {
            "london" => Ok("gb-london-1"),
            "amsterdam" => Ok("nl-amsterdam-1"),
            "frankfurt" => Ok("de-frankfurt-1"),
            "newyork" => Ok("us-newyork-1"),
            other => Err(ProviderError::mapping("cloudzy", "region", other)),
        }
    }

    fn map_status(raw: &str) -> InstanceStatus {
        match raw {
            "active" | "running" => InstanceStatus::Active,
            "provisioning" | "installing" | "pending" => InstanceStatus::Provisioning,
            "suspended" => InstanceStatus::Suspended,
            "error" | "failed" => InstanceStatus::Failed,
            _ => InstanceStatus::Unknown,
        }
    }
}

#[async_trait]
impl VpsProvider for CloudzyProvider {
    fn code(&self) -> &'static str {
        "cloudzy"
    }

    async fn create_instance(
        &self,
        order: &OrderRequest,
    ) -> Result<CreatedInstance, ProviderError> {
        let url = format!("{}/instances", API_BASE);
        let body = json!({
            "product_id": Self::product_id(order.plan),
            "region_id": Self::region_id(&order.region)?,
            "hostname": sanitize_hostname(&order.hostname_label),
            "os_id": "ubuntu-22.04",
        });

        let resp = self
            .client
            .post(&url)
            .headers(self.headers())
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::request("cloudzy", e))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            eprintln!(
                "❌ [cloudzy] POST {} failed: status={} body={}",
                url, status, text
            );
            return Err(ProviderError::request(
                "cloudzy",
                format!("create returned status={} body={}", status, text),
            ));
        }

        let payload: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| ProviderError::request("cloudzy", e))?;
        let instance = &payload["instance"];
        let instance_id = instance["id"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| ProviderError::request("cloudzy", "no instance id in response"))?;

        println!(
            "✅ [cloudzy] created instance {} ({:?})",
            instance_id, order.plan
        );
        Ok(CreatedInstance {
            instance_id,
            status: InstanceStatus::Provisioning,
            admin_password: instance["password"].as_str().map(|s| s.to_string()),
        })
    }

    async fn get_instance(
        &self,
        instance_id: &str,
    ) -> Result<Option<InstanceDetails>, ProviderError> {
        if let Some(status) = synthetic_status(instance_id, IdShape::Uuid) {
            return Ok(Some(InstanceDetails::synthetic(instance_id, status)));
        }

        let url = format!("{}/instances/{}", API_BASE, instance_id);
        let resp = self
            .client
            .get(&url)
            .headers(self.headers())
            .send()
            .await
            .map_err(|e| ProviderError::request("cloudzy", e))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ProviderError::request(
                "cloudzy",
                format!("get instance returned status={} body={}", status, text),
            ));
        }

        let payload: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| ProviderError::request("cloudzy", e))?;
        let instance = &payload["instance"];

        Ok(Some(InstanceDetails {
            instance_id: instance_id.to_string(),
            status: Self::map_status(instance["status"].as_str().unwrap_or("unknown")),
            ipv4: instance["main_ip"].as_str().unwrap_or("").to_string(),
            admin_username: instance["username"].as_str().unwrap_or("root").to_string(),
            admin_password: instance["password"].as_str().map(|s| s.to_string()),
        }))
    }

    async fn control_instance(&self, instance_id: &str, action: ControlAction) -> bool {
        let result = async {
            let resp = match action {
                ControlAction::Delete => {
                    let url = format!("{}/instances/{}", API_BASE, instance_id);
                    self.client.delete(&url).headers(self.headers()).send().await
                }
                ControlAction::ChangePassword => {
                    let url = format!("{}/instances/{}/change-pass", API_BASE, instance_id);
                    self.client.post(&url).headers(self.headers()).send().await
                }
                ControlAction::Reboot | ControlAction::Stop | ControlAction::Start => {
                    let op = match action {
                        ControlAction::Reboot => "reset",
                        ControlAction::Stop => "poweroff",
                        _ => "poweron",
                    };
                    let url = format!("{}/instances/{}/{}", API_BASE, instance_id, op);
                    self.client.post(&url).headers(self.headers()).send().await
                }
            };
            resp.map(|r| r.status().is_success())
        }
        .await;

        match result {
            Ok(ok) => {
                if !ok {
                    eprintln!(
                        "⚠️ [cloudzy] {} on {} rejected by provider",
                        action.as_str(),
                        instance_id
                    );
                }
                ok
            }
            Err(e) => {
                eprintln!(
                    "⚠️ [cloudzy] {} on {} failed: {}",
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
    use crate::VpsProvider;

    #[test]
    fn every_plan_has_a_product() {
        for plan in PlanId::ALL {
            assert!(!CloudzyProvider::product_id(plan).is_empty());
        }
    }

    #[test]
    fn london_maps_to_gb_region() {
        assert_eq!(CloudzyProvider::region_id("london").unwrap(), "gb-london-1");
        assert!(CloudzyProvider::region_id("tokyo").is_err());
    }

    #[tokio::test]
    async fn pure_digit_id_short_circuits_as_legacy() {
        // Stale id from the numeric-id provider era: must not hit the network.
        // An unroutable token guarantees the test fails loudly if it ever does.
        let p = CloudzyProvider::new("test-token-never-sent".into());
        let got = p.get_instance("203024710").await.unwrap().unwrap();
        assert_eq!(got.status, InstanceStatus::Legacy);
        assert_eq!(got.ipv4, "");
    }

    #[tokio::test]
    async fn mock_prefixed_id_short_circuits_as_mock() {
        let p = CloudzyProvider::new("test-token-never-sent".into());
        let got = p.get_instance("mock-7f9c0d").await.unwrap().unwrap();
        assert_eq!(got.status, InstanceStatus::Mock);
    }
}
