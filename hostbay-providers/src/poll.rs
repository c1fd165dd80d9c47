//! Provisioning poller: fixed-interval convergence on `active` + assigned IPv4.

use std::time::Duration;

use tokio::time::sleep;

use crate::{InstanceDetails, InstanceStatus, VpsProvider};

#[derive(Debug, Clone)]
pub struct PollConfig {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        // 60 x 15s ~= 15 minutes, matching typical vendor provisioning windows.
        Self {
            interval: Duration::from_secs(15),
            max_attempts: 60,
        }
    }
}

impl PollConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(secs) = read_env_u64("PROVISION_POLL_INTERVAL_SECS") {
            cfg.interval = Duration::from_secs(secs);
        }
        if let Some(n) = read_env_u64("PROVISION_POLL_MAX_ATTEMPTS") {
            cfg.max_attempts = n as u32;
        }
        cfg
    }
}

fn read_env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok()?.trim().parse().ok()
}

/// Outcome of a single poll attempt.
#[derive(Debug)]
pub enum PollStep {
    /// Active with an assigned address: provisioning is done.
    Ready(InstanceDetails),
    /// Explicit failure status from the provider: stop polling immediately.
    Fatal(InstanceStatus),
    /// Still converging (or transiently unknown): try again later.
    Retry,
}

/// Per-attempt decision, shared by the in-process loop below and the durable
/// poll job in the orchestrator.
pub fn classify(details: Option<InstanceDetails>) -> PollStep {
    match details {
        Some(d) if d.status == InstanceStatus::Active && !d.ipv4.is_empty() => PollStep::Ready(d),
        Some(d) if d.status == InstanceStatus::Failed => PollStep::Fatal(d.status),
        // Unknown-to-provider is treated as transient: freshly ordered
        // instances can 404 for a few seconds before they appear.
        _ => PollStep::Retry,
    }
}

/// Poll until the instance is active with an IPv4, the provider reports an
/// explicit failure (`None`, immediately), or `max_attempts` is exhausted
/// (`None`). Fixed interval, no backoff: this runs as a one-off best-effort
/// task, not a high-volume service.
pub async fn wait_for_active(
    provider: &dyn VpsProvider,
    instance_id: &str,
    cfg: &PollConfig,
) -> Option<InstanceDetails> {
    for attempt in 1..=cfg.max_attempts {
        match provider.get_instance(instance_id).await {
            Ok(details) => match classify(details) {
                PollStep::Ready(d) => {
                    println!(
                        "✅ [{}] instance {} active with ip {} (attempt {}/{})",
                        provider.code(),
                        instance_id,
                        d.ipv4,
                        attempt,
                        cfg.max_attempts
                    );
                    return Some(d);
                }
                PollStep::Fatal(status) => {
                    eprintln!(
                        "❌ [{}] instance {} reported {} during provisioning, giving up",
                        provider.code(),
                        instance_id,
                        status.as_str()
                    );
                    return None;
                }
                PollStep::Retry => {}
            },
            // Transport hiccups count as a spent attempt; the ceiling still bounds us.
            Err(e) => eprintln!(
                "⚠️ [{}] poll attempt {}/{} for {} failed: {}",
                provider.code(),
                attempt,
                cfg.max_attempts,
                instance_id,
                e
            ),
        }

        if attempt < cfg.max_attempts {
            sleep(cfg.interval).await;
        }
    }

    eprintln!(
        "⚠️ [{}] instance {} not active after {} attempts",
        provider.code(),
        instance_id,
        cfg.max_attempts
    );
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ControlAction, CreatedInstance, OrderRequest, ProviderError};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Replays a fixed sequence of `get_instance` results, then repeats the last.
    struct ScriptedProvider {
        script: Mutex<VecDeque<Option<InstanceDetails>>>,
        calls: AtomicU32,
    }

    impl ScriptedProvider {
        fn new(script: Vec<Option<InstanceDetails>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl VpsProvider for ScriptedProvider {
        fn code(&self) -> &'static str {
            "scripted"
        }

        async fn create_instance(
            &self,
            _order: &OrderRequest,
        ) -> Result<CreatedInstance, ProviderError> {
            unreachable!("poller tests never create")
        }

        async fn get_instance(
            &self,
            instance_id: &str,
        ) -> Result<Option<InstanceDetails>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock().unwrap();
            let next = if script.len() > 1 {
                script.pop_front().unwrap()
            } else {
                script.front().cloned().flatten()
            };
            let _ = instance_id;
            Ok(next)
        }

        async fn control_instance(&self, _instance_id: &str, _action: ControlAction) -> bool {
            false
        }
    }

    fn details(status: InstanceStatus, ipv4: &str) -> InstanceDetails {
        InstanceDetails {
            instance_id: "1001".into(),
            status,
            ipv4: ipv4.into(),
            admin_username: "root".into(),
            admin_password: None,
        }
    }

    fn instant() -> PollConfig {
        PollConfig {
            interval: Duration::ZERO,
            max_attempts: 5,
        }
    }

    #[tokio::test]
    async fn returns_on_first_active_with_ip() {
        let p = ScriptedProvider::new(vec![Some(details(InstanceStatus::Active, "203.0.113.7"))]);
        let got = wait_for_active(&p, "1001", &instant()).await;
        assert_eq!(got.unwrap().ipv4, "203.0.113.7");
        assert_eq!(p.calls(), 1);
    }

    #[tokio::test]
    async fn active_without_ip_keeps_polling() {
        let p = ScriptedProvider::new(vec![
            Some(details(InstanceStatus::Active, "")),
            Some(details(InstanceStatus::Active, "")),
            Some(details(InstanceStatus::Active, "198.51.100.4")),
        ]);
        let got = wait_for_active(&p, "1001", &instant()).await;
        assert_eq!(got.unwrap().ipv4, "198.51.100.4");
        assert_eq!(p.calls(), 3);
    }

    #[tokio::test]
    async fn exhausts_exactly_max_attempts_then_none() {
        let p = ScriptedProvider::new(vec![Some(details(InstanceStatus::Provisioning, ""))]);
        let got = wait_for_active(&p, "1001", &instant()).await;
        assert!(got.is_none());
        assert_eq!(p.calls(), 5);
    }

    #[tokio::test]
    async fn failed_status_stops_immediately() {
        let p = ScriptedProvider::new(vec![
            Some(details(InstanceStatus::Provisioning, "")),
            Some(details(InstanceStatus::Failed, "")),
            Some(details(InstanceStatus::Active, "198.51.100.4")),
        ]);
        let got = wait_for_active(&p, "1001", &instant()).await;
        assert!(got.is_none());
        assert_eq!(p.calls(), 2, "no attempts after an explicit failure");
    }

    #[tokio::test]
    async fn unknown_instance_is_transient() {
        let p = ScriptedProvider::new(vec![
            None,
            None,
            Some(details(InstanceStatus::Active, "192.0.2.20")),
        ]);
        let got = wait_for_active(&p, "1001", &instant()).await;
        assert_eq!(got.unwrap().ipv4, "192.0.2.20");
        assert_eq!(p.calls(), 3);
    }

    #[test]
    fn classify_never_fatals_on_provisioning() {
        assert!(matches!(
            classify(Some(details(InstanceStatus::Provisioning, ""))),
            PollStep::Retry
        ));
        assert!(matches!(
            classify(Some(details(InstanceStatus::Suspended, "203.0.113.9"))),
            PollStep::Retry
        ));
        assert!(matches!(classify(None), PollStep::Retry));
    }
}
