//! Aeza adapter. JSON REST API authenticated with an `X-API-Key` header;
//! instance ids are numeric.

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

const API_BASE: &str = "https://core.aeza.net/api";

pub struct AezaProvider {
    client: Client,
    api_token: String,
}

impl AezaProvider {
    pub fn new(api_token: String) -> Self {
        // Default reqwest client has no overall timeout; a stalled vendor API
        // would otherwise hang an order or a poll step forever.
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
        let token = std::env::var("AEZA_API_TOKEN")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ProviderError::config("aeza", "AEZA_API_TOKEN not set"))?;
        Ok(Self::new(token))
    }

    fn headers(&self) -> reqwest::header::HeaderMap {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "X-API-Key",
            reqwest::header::HeaderValue::from_str(&self.api_token).unwrap(),
        );
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        headers
    }

    /// Aeza product ids, one per internal plan.
    fn product_id(plan: PlanId) -> u64 {
        match plan {
            PlanId::Basic => 2310,
            PlanId::Prime => 2311,
            PlanId::Pro => 2312,
        }
    }

    /// Internal region -> Aeza location code.
    fn location_code(region: &str) -> Result<&'static str, ProviderError> {
        match region {
            "london" => Ok("uk"),
            "amsterdam" => Ok("nl"),
            "frankfurt" => Ok("de"),
            "newyork" => Ok("us"),
            other => Err(ProviderError::mapping("aeza", "region", other)),
        }
    }

    fn map_status(raw: &str) -> InstanceStatus {
        match raw {
            "active" => InstanceStatus::Active,
            "ordered" | "processing" | "installing" => InstanceStatus::Provisioning,
            "suspended" => InstanceStatus::Suspended,
            "error" | "failed" => InstanceStatus::Failed,
            _ => InstanceStatus::Unknown,
        }
    }
}

#[async_trait]
impl VpsProvider for AezaProvider {
    fn code(&self) -> &'static str {
        "aeza"
    }

    async fn create_instance(
        &self,
        order: &OrderRequest,
    ) -> Result<CreatedInstance, ProviderError> {
        let url = format!("{}/services/orders", API_BASE);
        let body = json!({
            "productId": Self::product_id(order.plan),
            "term": "month",
            "autoProlong": false,
            "name": sanitize_hostname(&order.hostname_label),
            "parameters": {
                "os": "ubuntu_22_04",
                "location": Self::location_code(&order.region)?,
            }
        });

        let resp = self
            .client
            .post(&url)
            .headers(self.headers())
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::request("aeza", e))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            eprintln!("❌ [aeza] POST {} failed: status={} body={}", url, status, text);
            return Err(ProviderError::request(
                "aeza",
                format!("order returned status={} body={}", status, text),
            ));
        }

        let payload: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| ProviderError::request("aeza", e))?;
        let instance_id = payload["data"]["id"]
            .as_u64()
            .map(|n| n.to_string())
            .or_else(|| payload["data"]["id"].as_str().map(|s| s.to_string()))
            .ok_or_else(|| ProviderError::request("aeza", "no order id in response"))?;
        let password = payload["data"]["parameters"]["password"]
            .as_str()
            .map(|s| s.to_string());

        println!("✅ [aeza] ordered instance {} ({:?})", instance_id, order.plan);
        Ok(CreatedInstance {
            instance_id,
            status: InstanceStatus::Provisioning,
            admin_password: password,
        })
    }

    async fn get_instance(
        &self,
        instance_id: &str,
    ) -> Result<Option<InstanceDetails>, ProviderError> {
        if let Some(status) = synthetic_status(instance_id, IdShape::Numeric) {
            return Ok(Some(InstanceDetails::synthetic(instance_id, status)));
        }

        let url = format!("{}/services/{}", API_BASE, instance_id);
        let resp = self
            .client
            .get(&url)
            .headers(self.headers())
            .send()
            .await
            .map_err(|e| ProviderError::request("aeza", e))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ProviderError::request(
                "aeza",
                format!("get service returned status={} body={}", status, text),
            ));
        }

        let payload: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| ProviderError::request("aeza", e))?;
        let item = &payload["data"];
        let raw_status = item["status"].as_str().unwrap_or("unknown");

        Ok(Some(InstanceDetails {
            instance_id: instance_id.to_string(),
            status: Self::map_status(raw_status),
            ipv4: item["ip"].as_str().unwrap_or("").to_string(),
            admin_username: item["username"].as_str().unwrap_or("root").to_string(),
            admin_password: item["password"].as_str().map(|s| s.to_string()),
        }))
    }

    async fn control_instance(&self, instance_id: &str, action: ControlAction) -> bool {
        let result = async {
            let resp = match action {
                ControlAction::Delete => {
                    let url = format!("{}/services/{}", API_BASE, instance_id);
                    self.client.delete(&url).headers(self.headers()).send().await
                }
                ControlAction::ChangePassword => {
                    let url = format!("{}/services/{}/password/reset", API_BASE, instance_id);
                    self.client.post(&url).headers(self.headers()).send().await
                }
                ControlAction::Reboot | ControlAction::Stop | ControlAction::Start => {
                    let url = format!("{}/services/{}/ctl", API_BASE, instance_id);
                    let op = match action {
                        ControlAction::Reboot => "reboot",
                        ControlAction::Stop => "shutdown",
                        _ => "resume",
                    };
                    self.client
                        .post(&url)
                        .headers(self.headers())
                        .json(&json!({ "action": op }))
                        .send()
                        .await
                }
            };
            resp.map(|r| r.status().is_success())
        }
        .await;

        match result {
            Ok(true) => true,
            Ok(false) => {
                eprintln!(
                    "⚠️ [aeza] {} on {} rejected by provider",
                    action.as_str(),
                    instance_id
                );
                false
            }
            Err(e) => {
                eprintln!(
                    "⚠️ [aeza] {} on {} failed: {}",
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

    #[test]
    fn every_plan_has_a_product() {
        for plan in PlanId::ALL {
            assert!(AezaProvider::product_id(plan) > 0);
        }
    }

    #[test]
    fn known_regions_map_and_unknown_is_rejected() {
        assert_eq!(AezaProvider::location_code("london").unwrap(), "uk");
        assert!(matches!(
            AezaProvider::location_code("mars"),
            Err(ProviderError::Mapping { what: "region", .. })
        ));
    }

    #[test]
    fn provider_statuses_map_into_lifecycle() {
        assert_eq!(AezaProvider::map_status("active"), InstanceStatus::Active);
        assert_eq!(
            AezaProvider::map_status("processing"),
            InstanceStatus::Provisioning
        );
        assert_eq!(AezaProvider::map_status("error"), InstanceStatus::Failed);
        assert_eq!(AezaProvider::map_status("weird"), InstanceStatus::Unknown);
    }
}
