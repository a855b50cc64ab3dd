use chrono::Duration;

use gatehouse_step_up::error::StepUpError;
use gatehouse_step_up::infra::memory::MemoryStepUpRepository;

use crate::helpers::{
    ROUTE, RecordingEmailSender, send_input, send_usecase, status_usecase, test_clock, test_now,
    test_user_id, verify_input, verify_usecase,
};

#[tokio::test]
async fn should_report_fresh_state_for_new_user() {
    let repo = MemoryStepUpRepository::new();
    let clock = test_clock();

    let status = status_usecase(&repo, &clock)
        .execute(test_user_id(), ROUTE)
        .await
        .unwrap();

    assert_eq!(status.route_key, ROUTE);
    assert!(!status.verified);
    assert!(status.verification_expires_at.is_none());
    assert!(!status.challenge_active);
    assert!(status.challenge_expires_at.is_none());
    assert_eq!(status.remaining_sends_24h, 5);
    assert!(status.resend_available_at.is_none());
}

#[tokio::test]
async fn should_report_active_challenge_and_cooldown() {
    let repo = MemoryStepUpRepository::new();
    let clock = test_clock();

    send_usecase(&repo, RecordingEmailSender::new(), &clock)
        .execute(send_input(ROUTE))
        .await
        .unwrap();
    clock.advance(Duration::seconds(10));

    let uc = status_usecase(&repo, &clock);
    let status = uc.execute(test_user_id(), ROUTE).await.unwrap();
    assert!(status.challenge_active);
    assert_eq!(
        status.challenge_expires_at,
        Some(test_now() + Duration::hours(4))
    );
    assert_eq!(status.remaining_sends_24h, 4);
    assert_eq!(
        status.resend_available_at,
        Some(test_now() + Duration::seconds(60))
    );

    // Cooldown hint disappears once it has elapsed.
    clock.advance(Duration::seconds(60));
    let status = uc.execute(test_user_id(), ROUTE).await.unwrap();
    assert!(status.resend_available_at.is_none());
}

#[tokio::test]
async fn should_report_verified_after_successful_verification() {
    let repo = MemoryStepUpRepository::new();
    let email = RecordingEmailSender::new();
    let clock = test_clock();

    send_usecase(&repo, email.clone(), &clock)
        .execute(send_input(ROUTE))
        .await
        .unwrap();
    verify_usecase(&repo, &clock)
        .execute(verify_input(&email.last_code()))
        .await
        .unwrap();

    let status = status_usecase(&repo, &clock)
        .execute(test_user_id(), ROUTE)
        .await
        .unwrap();
    assert!(status.verified);
    assert_eq!(
        status.verification_expires_at,
        Some(test_now() + Duration::hours(24))
    );
    assert!(!status.challenge_active, "consumed challenge is not active");

    clock.advance(Duration::hours(24) + Duration::seconds(1));
    let status = status_usecase(&repo, &clock)
        .execute(test_user_id(), ROUTE)
        .await
        .unwrap();
    assert!(!status.verified, "grant lapses after its ttl");
}

#[tokio::test]
async fn should_reject_status_for_unknown_route() {
    let repo = MemoryStepUpRepository::new();
    let clock = test_clock();

    let result = status_usecase(&repo, &clock)
        .execute(test_user_id(), "settings")
        .await;
    assert!(
        matches!(result, Err(StepUpError::BadRequest(_))),
        "expected BadRequest, got {result:?}"
    );
}
