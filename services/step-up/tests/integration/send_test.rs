use chrono::Duration;

use gatehouse_step_up::domain::clock::Clock;
use gatehouse_step_up::domain::code::hash_code;
use gatehouse_step_up::error::StepUpError;
use gatehouse_step_up::infra::memory::MemoryStepUpRepository;

use crate::helpers::{
    FailingEmailSender, ROUTE, RecordingEmailSender, TEST_EMAIL, send_input, send_usecase,
    test_clock, test_now, test_user_id,
};

#[tokio::test]
async fn should_issue_challenge_and_deliver_code() {
    let repo = MemoryStepUpRepository::new();
    let email = RecordingEmailSender::new();
    let sent = email.sent_handle();
    let clock = test_clock();

    let out = send_usecase(&repo, email, &clock)
        .execute(send_input(ROUTE))
        .await
        .unwrap();

    assert_eq!(out.route_key, ROUTE);
    assert_eq!(out.challenge_expires_at, test_now() + Duration::hours(4));
    assert_eq!(out.resend_available_at, test_now() + Duration::seconds(60));
    assert_eq!(out.remaining_sends_24h, 4);

    let sent = sent.lock().unwrap();
    assert_eq!(sent.len(), 1, "expected exactly one email");
    assert_eq!(sent[0].email, TEST_EMAIL);
    assert_eq!(sent[0].challenge_id, out.challenge_id);
    assert_eq!(sent[0].code.len(), 6);

    let state = repo.snapshot().await;
    assert_eq!(state.challenges.len(), 1);
    let stored = &state.challenges[0];
    assert_eq!(stored.owner_user_id, test_user_id());
    assert_eq!(stored.attempt_count, 0);
    assert_eq!(stored.max_attempts, 5);
    assert_eq!(stored.ip_address.as_deref(), Some("203.0.113.7"));
    assert_eq!(stored.user_agent.as_deref(), Some("integration-test"));
    assert_ne!(stored.code_hash, sent[0].code, "plaintext code must not be stored");
    assert_eq!(stored.code_hash, hash_code(&stored.code_salt, &sent[0].code));
}

#[tokio::test]
async fn should_reject_resend_within_cooldown() {
    let repo = MemoryStepUpRepository::new();
    let clock = test_clock();
    let uc = send_usecase(&repo, RecordingEmailSender::new(), &clock);

    uc.execute(send_input(ROUTE)).await.unwrap();
    clock.advance(Duration::seconds(30));

    let result = uc.execute(send_input(ROUTE)).await;
    match result {
        Err(StepUpError::ResendCooldown {
            resend_available_at,
        }) => assert_eq!(resend_available_at, test_now() + Duration::seconds(60)),
        other => panic!("expected ResendCooldown, got {other:?}"),
    }
    assert_eq!(repo.snapshot().await.challenges.len(), 1);
}

#[tokio::test]
async fn should_supersede_previous_challenge_after_cooldown() {
    let repo = MemoryStepUpRepository::new();
    let clock = test_clock();
    let uc = send_usecase(&repo, RecordingEmailSender::new(), &clock);

    let first = uc.execute(send_input(ROUTE)).await.unwrap();
    clock.advance(Duration::seconds(61));
    let second = uc.execute(send_input(ROUTE)).await.unwrap();
    assert_eq!(second.remaining_sends_24h, 3);

    let state = repo.snapshot().await;
    let now = clock.now();
    let active: Vec<_> = state
        .challenges
        .iter()
        .filter(|c| c.is_active(now))
        .collect();
    assert_eq!(active.len(), 1, "only one challenge may be active");
    assert_eq!(active[0].id, second.challenge_id);

    let old = state
        .challenges
        .iter()
        .find(|c| c.id == first.challenge_id)
        .unwrap();
    assert_eq!(old.invalidated_at, Some(now));
}

#[tokio::test]
async fn should_enforce_daily_limit() {
    let repo = MemoryStepUpRepository::new();
    let clock = test_clock();
    let uc = send_usecase(&repo, RecordingEmailSender::new(), &clock);

    for expected_remaining in (0..5).rev() {
        let out = uc.execute(send_input(ROUTE)).await.unwrap();
        assert_eq!(out.remaining_sends_24h, expected_remaining);
        clock.advance(Duration::seconds(61));
    }

    let result = uc.execute(send_input(ROUTE)).await;
    match result {
        Err(StepUpError::DailyLimitExceeded {
            resend_available_at,
        }) => assert_eq!(resend_available_at, Some(test_now() + Duration::hours(24))),
        other => panic!("expected DailyLimitExceeded, got {other:?}"),
    }
    assert_eq!(repo.snapshot().await.challenges.len(), 5);
}

#[tokio::test]
async fn should_allow_send_once_oldest_leaves_window() {
    let repo = MemoryStepUpRepository::new();
    let clock = test_clock();
    let uc = send_usecase(&repo, RecordingEmailSender::new(), &clock);

    for _ in 0..5 {
        uc.execute(send_input(ROUTE)).await.unwrap();
        clock.advance(Duration::seconds(61));
    }

    clock.set(test_now() + Duration::hours(24) + Duration::seconds(1));
    let out = uc.execute(send_input(ROUTE)).await.unwrap();
    assert_eq!(out.remaining_sends_24h, 0);
}

#[tokio::test]
async fn should_count_sends_per_route() {
    let repo = MemoryStepUpRepository::new();
    let clock = test_clock();
    let uc = send_usecase(&repo, RecordingEmailSender::new(), &clock);

    uc.execute(send_input(ROUTE)).await.unwrap();

    let mut other_user = send_input(ROUTE);
    other_user.owner_user_id = uuid::Uuid::now_v7();
    let out = uc.execute(other_user).await.unwrap();
    assert_eq!(out.remaining_sends_24h, 4, "cooldown and quota are per user");
}

#[tokio::test]
async fn should_propagate_provider_error_and_keep_challenge() {
    let repo = MemoryStepUpRepository::new();
    let clock = test_clock();

    let result = send_usecase(&repo, FailingEmailSender, &clock)
        .execute(send_input(ROUTE))
        .await;
    assert!(
        matches!(result, Err(StepUpError::EmailProviderNotConfigured)),
        "expected EmailProviderNotConfigured, got {result:?}"
    );

    let state = repo.snapshot().await;
    assert_eq!(state.challenges.len(), 1, "challenge persists despite failure");

    // The failed send still starts the cooldown.
    let retry = send_usecase(&repo, RecordingEmailSender::new(), &clock)
        .execute(send_input(ROUTE))
        .await;
    assert!(
        matches!(retry, Err(StepUpError::ResendCooldown { .. })),
        "expected ResendCooldown, got {retry:?}"
    );
}

#[tokio::test]
async fn should_reject_unknown_route() {
    let repo = MemoryStepUpRepository::new();
    let email = RecordingEmailSender::new();
    let sent = email.sent_handle();
    let clock = test_clock();

    let result = send_usecase(&repo, email, &clock)
        .execute(send_input("settings"))
        .await;
    assert!(
        matches!(result, Err(StepUpError::BadRequest(_))),
        "expected BadRequest, got {result:?}"
    );
    assert!(sent.lock().unwrap().is_empty());
    assert!(repo.snapshot().await.challenges.is_empty());
}

#[tokio::test]
async fn should_serialize_concurrent_sends() {
    let repo = MemoryStepUpRepository::new();
    let clock = test_clock();
    let uc = send_usecase(&repo, RecordingEmailSender::new(), &clock);

    let (a, b) = tokio::join!(uc.execute(send_input(ROUTE)), uc.execute(send_input(ROUTE)));

    let oks = [a.is_ok(), b.is_ok()].into_iter().filter(|ok| *ok).count();
    assert_eq!(oks, 1, "exactly one concurrent send may succeed");
    assert!(
        matches!(a, Err(StepUpError::ResendCooldown { .. }))
            || matches!(b, Err(StepUpError::ResendCooldown { .. }))
    );
    assert_eq!(repo.snapshot().await.challenges.len(), 1);
}
