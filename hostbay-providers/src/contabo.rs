//! Contabo adapter. OAuth2 password+client grant; every API call carries a
//! Bearer token plus a fresh `x-request-id`. Instance ids are numeric.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use hostbay_common::PlanId;
use reqwest::Client;
use serde_json::json;
use tokio::sync::Mutex;

use crate::ident::{sanitize_hostname, synthetic_status, IdShape};
use crate::{
    ControlAction, CreatedInstance, InstanceDetails, InstanceStatus, OrderRequest, ProviderError,
    VpsProvider,
};

const AUTH_URL: &str = "https://auth.contabo.com/auth/realms/contabo/protocol/openid-connect/token";
const API_BASE: &str = "https://api.contabo.com/v1";

/// Access-token cache with a wall-clock expiry.
///
/// Refresh contract: a cached token is served until `expires_at - margin`;
/// past that, the caller-supplied refresh runs while the slot lock is held,
/// so concurrent requests never race to refresh the same account token.
pub struct TokenCache {
    slot: Mutex<Option<CachedToken>>,
    margin: Duration,
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::with_margin(Duration::from_secs(30))
    }

    pub fn with_margin(margin: Duration) -> Self {
        Self {
            slot: Mutex::new(None),
            margin,
        }
    }

    pub async fn get_or_refresh<F, Fut>(&self, refresh: F) -> Result<String, ProviderError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(String, Duration), ProviderError>>,
    {
        let mut slot = self.slot.lock().await;
        if let Some(cached) = slot.as_ref() {
            if Instant::now() + self.margin < cached.expires_at {
                return Ok(cached.token.clone());
            }
        }
        let (token, ttl) = refresh().await?;
        *slot = Some(CachedToken {
            token: token.clone(),
            expires_at: Instant::now() + ttl,
        });
        Ok(token)
    }
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ContaboProvider {
    client: Client,
    client_id: String,
    client_secret: String,
    api_user: String,
    api_password: String,
    tokens: Arc<TokenCache>,
}

impl ContaboProvider {
    pub fn new(
        client_id: String,
        client_secret: String,
        api_user: String,
        api_password: String,
        tokens: Arc<TokenCache>,
    ) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(20))
            .build()
            .unwrap();
        Self {
            client,
            client_id: client_id.trim().to_string(),
            client_secret: client_secret.trim().to_string(),
            api_user: api_user.trim().to_string(),
            api_password,
            tokens,
        }
    }

    pub fn from_env() -> Result<Self, ProviderError> {
        let require = |key: &str| {
            std::env::var(key)
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .ok_or_else(|| ProviderError::config("contabo", format!("{} not set", key)))
        };
        Ok(Self::new(
            require("CONTABO_CLIENT_ID")?,
            require("CONTABO_CLIENT_SECRET")?,
            require("CONTABO_API_USER")?,
            require("CONTABO_API_PASSWORD")?,
            Arc::new(TokenCache::new()),
        ))
    }

    async fn fetch_token(&self) -> Result<(String, Duration), ProviderError> {
        let resp = self
            .client
            .post(AUTH_URL)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("username", self.api_user.as_str()),
                ("password", self.api_password.as_str()),
                ("grant_type", "password"),
            ])
            .send()
            .await
            .map_err(|e| ProviderError::request("contabo", e))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ProviderError::request(
                "contabo",
                format!("token endpoint returned status={} body={}", status, text),
            ));
        }

        let payload: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| ProviderError::request("contabo", e))?;
        let token = payload["access_token"]
            .as_str()
            .ok_or_else(|| ProviderError::request("contabo", "no access_token in response"))?
            .to_string();
        let ttl = payload["expires_in"].as_u64().unwrap_or(300);
        Ok((token, Duration::from_secs(ttl)))
    }

    async fn bearer(&self) -> Result<String, ProviderError> {
        self.tokens.get_or_refresh(|| self.fetch_token()).await
    }

    fn product_id(plan: PlanId) -> &'static str {
        match plan {
            PlanId::Basic => "V45",
            PlanId::Prime => "V47",
            PlanId::Pro => "V48",
        }
    }

    /// Contabo sells by coarse region; European orders land in the EU DCs.
    fn region_code(region: &str) -> Result<&'static str, ProviderError> {
        match region {
            "london" | "amsterdam" | "frankfurt" => Ok("EU"),
            "newyork" => Ok("US-east"),
            other => Err(ProviderError::mapping("contabo", "region", other)),
        }
    }

    fn map_status(raw: &str) -> InstanceStatus {
        match raw {
            "running" => InstanceStatus::Active,
            "provisioning" | "installing" | "pending" => InstanceStatus::Provisioning,
            "stopped" | "suspended" => InstanceStatus::Suspended,
            "error" | "failed" | "product_not_available" => InstanceStatus::Failed,
            _ => InstanceStatus::Unknown,
        }
    }
}

#[async_trait]
impl VpsProvider for ContaboProvider {
    fn code(&self) -> &'static str {
        "contabo"
    }

    async fn create_instance(
        &self,
        order: &OrderRequest,
    ) -> Result<CreatedInstance, ProviderError> {
        let region = Self::region_code(&order.region)?;
        let token = self.bearer().await?;
        let url = format!("{}/compute/instances", API_BASE);
        let body = json!({
            "imageId": "ubuntu-22.04",
            "productId": Self::product_id(order.plan),
            "region": region,
            "displayName": sanitize_hostname(&order.hostname_label),
            "period": 1,
        });

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&token)
            .header("x-request-id", uuid::Uuid::new_v4().to_string())
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::request("contabo", e))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            eprintln!(
                "❌ [contabo] POST {} failed: status={} body={}",
                url, status, text
            );
            return Err(ProviderError::request(
                "contabo",
                format!("create returned status={} body={}", status, text),
            ));
        }

        let payload: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| ProviderError::request("contabo", e))?;
        let instance_id = payload["data"][0]["instanceId"]
            .as_i64()
            .map(|n| n.to_string())
            .ok_or_else(|| ProviderError::request("contabo", "no instanceId in response"))?;

        println!(
            "✅ [contabo] created instance {} ({:?} in {})",
            instance_id, order.plan, region
        );
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

        let token = self.bearer().await?;
        let url = format!("{}/compute/instances/{}", API_BASE, instance_id);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&token)
            .header("x-request-id", uuid::Uuid::new_v4().to_string())
            .send()
            .await
            .map_err(|e| ProviderError::request("contabo", e))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ProviderError::request(
                "contabo",
                format!("get instance returned status={} body={}", status, text),
            ));
        }

        let payload: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| ProviderError::request("contabo", e))?;
        let data = &payload["data"][0];

        Ok(Some(InstanceDetails {
            instance_id: instance_id.to_string(),
            status: Self::map_status(data["status"].as_str().unwrap_or("unknown")),
            ipv4: data["ipConfig"]["v4"]["ip"]
                .as_str()
                .unwrap_or("")
                .to_string(),
            admin_username: data["defaultUser"].as_str().unwrap_or("root").to_string(),
            admin_password: None,
        }))
    }

    async fn control_instance(&self, instance_id: &str, action: ControlAction) -> bool {
        let result = async {
            let token = self.bearer().await?;
            let request_id = uuid::Uuid::new_v4().to_string();
            let resp = match action {
                ControlAction::Delete => {
                    let url = format!("{}/compute/instances/{}", API_BASE, instance_id);
                    self.client
                        .delete(&url)
                        .bearer_auth(&token)
                        .header("x-request-id", request_id)
                        .send()
                        .await
                }
                ControlAction::ChangePassword => {
                    let url = format!(
                        "{}/compute/instances/{}/actions/resetPassword",
                        API_BASE, instance_id
                    );
                    self.client
                        .post(&url)
                        .bearer_auth(&token)
                        .header("x-request-id", request_id)
                        .send()
                        .await
                }
                ControlAction::Reboot | ControlAction::Stop | ControlAction::Start => {
                    let op = match action {
                        ControlAction::Reboot => "restart",
                        ControlAction::Stop => "stop",
                        _ => "start",
                    };
                    let url = format!(
                        "{}/compute/instances/{}/actions/{}",
                        API_BASE, instance_id, op
                    );
                    self.client
                        .post(&url)
                        .bearer_auth(&token)
                        .header("x-request-id", request_id)
                        .send()
                        .await
                }
            };
            resp.map(|r| r.status().is_success())
                .map_err(|e| ProviderError::request("contabo", e))
        }
        .await;

        match result {
            Ok(ok) => {
                if !ok {
                    eprintln!(
                        "⚠️ [contabo] {} on {} rejected by provider",
                        action.as_str(),
                        instance_id
                    );
                }
                ok
            }
            Err(e) => {
                eprintln!(
                    "⚠️ [contabo] {} on {} failed: {}",
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
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn every_plan_has_a_product() {
        for plan in PlanId::ALL {
            assert!(!ContaboProvider::product_id(plan).is_empty());
        }
    }

    #[test]
    fn european_regions_collapse_to_eu() {
        assert_eq!(ContaboProvider::region_code("london").unwrap(), "EU");
        assert_eq!(ContaboProvider::region_code("frankfurt").unwrap(), "EU");
        assert_eq!(ContaboProvider::region_code("newyork").unwrap(), "US-east");
        assert!(ContaboProvider::region_code("sydney").is_err());
    }

    #[tokio::test]
    async fn token_cache_reuses_until_expiry() {
        let cache = TokenCache::with_margin(Duration::ZERO);
        let fetches = AtomicU32::new(0);

        for _ in 0..3 {
            let token = cache
                .get_or_refresh(|| async {
                    fetches.fetch_add(1, Ordering::SeqCst);
                    Ok(("tok-a".to_string(), Duration::from_secs(600)))
                })
                .await
                .unwrap();
            assert_eq!(token, "tok-a");
        }
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn token_cache_refreshes_expired_tokens() {
        let cache = TokenCache::with_margin(Duration::ZERO);
        let fetches = AtomicU32::new(0);

        // Zero TTL: expired the moment it lands in the cache.
        for expected in ["tok-1", "tok-2"] {
            let n = fetches.load(Ordering::SeqCst);
            let token = cache
                .get_or_refresh(|| async {
                    fetches.fetch_add(1, Ordering::SeqCst);
                    Ok((format!("tok-{}", n + 1), Duration::ZERO))
                })
                .await
                .unwrap();
            assert_eq!(token, expected);
        }
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn token_cache_propagates_refresh_errors() {
        let cache = TokenCache::new();
        let res = cache
            .get_or_refresh(|| async { Err(ProviderError::request("contabo", "boom")) })
            .await;
        assert!(res.is_err());
    }
}
