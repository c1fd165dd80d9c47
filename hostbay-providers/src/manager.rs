//! Provider selection. All callers resolve a provider code through here;
//! nothing outside this module constructs a vendor adapter.

use std::sync::Arc;

use crate::aeza::AezaProvider;
use crate::cloudzy::CloudzyProvider;
use crate::contabo::ContaboProvider;
use crate::mock::MockProvider;
use crate::zomro::ZomroProvider;
use crate::{ProviderError, VpsProvider};

pub struct ProviderManager;

impl ProviderManager {
    /// Default provider code for orders that do not name one.
    pub fn default_provider_code() -> String {
        std::env::var("VPS_PROVIDER")
            .ok()
            .map(|s| s.trim().to_ascii_lowercase())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "aeza".to_string())
    }

    /// Resolve a provider code to an adapter. Credential problems surface
    /// here as `Configuration` errors, before any vendor call is attempted.
    pub fn get(code: &str) -> Result<Arc<dyn VpsProvider>, ProviderError> {
        match code.trim().to_ascii_lowercase().as_str() {
            "aeza" => Ok(Arc::new(AezaProvider::from_env()?)),
            "cloudzy" => Ok(Arc::new(CloudzyProvider::from_env()?)),
            "contabo" => Ok(Arc::new(ContaboProvider::from_env()?)),
            "zomro" => {
                if env_flag("USE_ZOMRO_MOCK") {
                    println!("🔧 [providers] USE_ZOMRO_MOCK set, routing zomro to mock");
                    Ok(MockProvider::shared())
                } else {
                    Ok(Arc::new(ZomroProvider::from_env()?))
                }
            }
            "mock" => Ok(MockProvider::shared()),
            other => Err(ProviderError::mapping("manager", "provider", other)),
        }
    }

    pub fn is_known_code(code: &str) -> bool {
        matches!(
            code.trim().to_ascii_lowercase().as_str(),
            "aeza" | "cloudzy" | "contabo" | "zomro" | "mock"
        )
    }
}

fn env_flag(key: &str) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_code_is_a_mapping_error() {
        assert!(matches!(
            ProviderManager::get("digitalocean"),
            Err(ProviderError::Mapping { .. })
        ));
    }

    #[test]
    fn mock_resolves_without_credentials() {
        let p = ProviderManager::get("mock").unwrap();
        assert_eq!(p.code(), "mock");
    }

    #[test]
    fn known_codes() {
        for code in ["aeza", "cloudzy", "contabo", "zomro", "mock"] {
            assert!(ProviderManager::is_known_code(code));
        }
        assert!(!ProviderManager::is_known_code("vultr"));
    }
}
