use std::sync::Arc;

use chrono::Duration;

use gatehouse_step_up::domain::policy::RoutePolicyTable;
use gatehouse_step_up::domain::types::never_expires_at;
use gatehouse_step_up::engine::StepUpEngine;
use gatehouse_step_up::error::StepUpError;
use gatehouse_step_up::infra::memory::MemoryStepUpRepository;

use crate::helpers::{
    ROUTE, RecordingEmailSender, send_input, test_clock, test_now, test_policy, test_user_id,
};

#[tokio::test]
async fn should_walk_full_step_up_flow() {
    let repo = MemoryStepUpRepository::new();
    let email = RecordingEmailSender::new();
    let clock = test_clock();
    let engine = StepUpEngine::new(
        repo.clone(),
        email.clone(),
        Arc::clone(&clock),
        RoutePolicyTable::builtin(),
    );
    let user = test_user_id();

    let denied = engine.assert_route_access_for_user(user, ROUTE).await;
    assert!(
        matches!(denied, Err(StepUpError::VerificationRequired)),
        "expected VerificationRequired, got {denied:?}"
    );

    let sent = engine
        .send_route_email_otp_for_user(send_input(ROUTE))
        .await
        .unwrap();
    assert_eq!(sent.remaining_sends_24h, 4);

    let status = engine
        .get_route_access_status_for_user(user, ROUTE)
        .await
        .unwrap();
    assert!(status.challenge_active);
    assert!(!status.verified);

    clock.advance(Duration::minutes(1));
    let verified = engine
        .verify_route_email_otp_for_user(user, ROUTE, &email.last_code())
        .await
        .unwrap();
    assert!(verified.verified);
    assert_eq!(
        verified.verification_expires_at,
        test_now() + Duration::minutes(1) + Duration::hours(24)
    );

    engine.assert_route_access_for_user(user, ROUTE).await.unwrap();

    let state = repo.snapshot().await;
    assert_eq!(state.grants.len(), 1);
    let challenge = state
        .challenges
        .iter()
        .find(|c| c.id == sent.challenge_id)
        .unwrap();
    assert!(challenge.consumed_at.is_some());
}

#[tokio::test]
async fn should_issue_sentinel_expiry_for_never_expiring_route() {
    let repo = MemoryStepUpRepository::new();
    let email = RecordingEmailSender::new();
    let clock = test_clock();
    let policies = RoutePolicyTable::default().with_route(
        ROUTE,
        gatehouse_step_up::domain::policy::RoutePolicy {
            grant_never_expires: true,
            ..test_policy()
        },
    );
    let engine = StepUpEngine::new(repo, email.clone(), Arc::clone(&clock), policies);
    let user = test_user_id();

    engine
        .send_route_email_otp_for_user(send_input(ROUTE))
        .await
        .unwrap();
    let verified = engine
        .verify_route_email_otp_for_user(user, ROUTE, &email.last_code())
        .await
        .unwrap();
    assert_eq!(verified.verification_expires_at, never_expires_at());

    clock.advance(Duration::days(3650));
    engine.assert_route_access_for_user(user, ROUTE).await.unwrap();
}
