// End-to-end order flow against the mock provider: create, then poll to
// convergence with the same loop the production path uses.

use std::time::Duration;

use hostbay_common::PlanId;
use hostbay_providers::poll::{wait_for_active, PollConfig};
use hostbay_providers::{mock::MockProvider, ControlAction, InstanceStatus, OrderRequest};
use hostbay_providers::VpsProvider;

fn fast_poll() -> PollConfig {
    PollConfig {
        interval: Duration::from_millis(1),
        max_attempts: 10,
    }
}

#[tokio::test]
async fn create_then_poll_until_active() {
    let provider = MockProvider::new(3);
    let order = OrderRequest {
        plan: PlanId::Basic,
        hostname_label: "flow test 01".into(),
        region: "london".into(),
    };

    let created = provider.create_instance(&order).await.unwrap();
    assert_eq!(created.status, InstanceStatus::Provisioning);

    let details = wait_for_active(&provider, &created.instance_id, &fast_poll())
        .await
        .expect("mock instance should converge");
    assert_eq!(details.status, InstanceStatus::Active);
    assert!(!details.ipv4.is_empty());
}

#[tokio::test]
async fn poll_times_out_when_instance_never_appears() {
    let provider = MockProvider::new(2);
    // Never created: every poll sees None, which is transient, so the loop
    // must run to the attempt ceiling and then give up.
    let got = wait_for_active(&provider, "mock-never-created", &fast_poll()).await;
    assert!(got.is_none());
}

#[tokio::test]
async fn control_after_delete_reports_failure() {
    let provider = MockProvider::new(1);
    let created = provider
        .create_instance(&OrderRequest {
            plan: PlanId::Pro,
            hostname_label: "short-lived".into(),
            region: "frankfurt".into(),
        })
        .await
        .unwrap();

    assert!(
        provider
            .control_instance(&created.instance_id, ControlAction::Delete)
            .await
    );
    assert!(
        !provider
            .control_instance(&created.instance_id, ControlAction::Start)
            .await
    );
}
