use chrono::Duration;

use gatehouse_step_up::error::StepUpError;
use gatehouse_step_up::infra::memory::MemoryStepUpRepository;

use crate::helpers::{
    ROUTE, RecordingEmailSender, send_input, send_usecase, test_clock, test_now, test_user_id,
    verify_input, verify_usecase, wrong_code,
};

#[tokio::test]
async fn should_verify_correct_code_and_issue_grant() {
    let repo = MemoryStepUpRepository::new();
    let email = RecordingEmailSender::new();
    let clock = test_clock();

    let sent = send_usecase(&repo, email.clone(), &clock)
        .execute(send_input(ROUTE))
        .await
        .unwrap();
    clock.advance(Duration::minutes(2));

    let out = verify_usecase(&repo, &clock)
        .execute(verify_input(&email.last_code()))
        .await
        .unwrap();

    let verified_at = test_now() + Duration::minutes(2);
    assert!(out.verified);
    assert_eq!(out.route_key, ROUTE);
    assert_eq!(out.verification_expires_at, verified_at + Duration::hours(24));

    let state = repo.snapshot().await;
    let challenge = &state.challenges[0];
    assert_eq!(challenge.id, sent.challenge_id);
    assert_eq!(challenge.consumed_at, Some(verified_at));
    assert_eq!(challenge.attempt_count, 0);

    assert_eq!(state.grants.len(), 1);
    let grant = &state.grants[0];
    assert_eq!(grant.owner_user_id, test_user_id());
    assert_eq!(grant.verified_at, verified_at);
    assert!(grant.revoked_at.is_none());
}

#[tokio::test]
async fn should_consume_code_only_once() {
    let repo = MemoryStepUpRepository::new();
    let email = RecordingEmailSender::new();
    let clock = test_clock();

    send_usecase(&repo, email.clone(), &clock)
        .execute(send_input(ROUTE))
        .await
        .unwrap();
    let uc = verify_usecase(&repo, &clock);
    let code = email.last_code();

    uc.execute(verify_input(&code)).await.unwrap();
    let replay = uc.execute(verify_input(&code)).await;
    assert!(
        matches!(replay, Err(StepUpError::InvalidOrExpired)),
        "expected InvalidOrExpired, got {replay:?}"
    );
    assert_eq!(repo.snapshot().await.grants.len(), 1);
}

#[tokio::test]
async fn should_count_wrong_attempts_and_lock_after_limit() {
    let repo = MemoryStepUpRepository::new();
    let email = RecordingEmailSender::new();
    let clock = test_clock();

    send_usecase(&repo, email.clone(), &clock)
        .execute(send_input(ROUTE))
        .await
        .unwrap();
    let uc = verify_usecase(&repo, &clock);
    let code = email.last_code();

    for attempt in 1..=5 {
        let result = uc.execute(verify_input(&wrong_code(&code))).await;
        assert!(
            matches!(result, Err(StepUpError::InvalidOrExpired)),
            "attempt {attempt}: expected InvalidOrExpired, got {result:?}"
        );
        assert_eq!(repo.snapshot().await.challenges[0].attempt_count, attempt);
    }

    // The right code no longer helps once the budget is spent.
    let result = uc.execute(verify_input(&code)).await;
    assert!(
        matches!(result, Err(StepUpError::AttemptsExceeded)),
        "expected AttemptsExceeded, got {result:?}"
    );

    let state = repo.snapshot().await;
    assert!(state.challenges[0].invalidated_at.is_some());
    assert!(state.challenges[0].consumed_at.is_none());
    assert!(state.grants.is_empty());

    let after = uc.execute(verify_input(&code)).await;
    assert!(
        matches!(after, Err(StepUpError::InvalidOrExpired)),
        "expected InvalidOrExpired, got {after:?}"
    );
}

#[tokio::test]
async fn should_reject_expired_code() {
    let repo = MemoryStepUpRepository::new();
    let email = RecordingEmailSender::new();
    let clock = test_clock();

    send_usecase(&repo, email.clone(), &clock)
        .execute(send_input(ROUTE))
        .await
        .unwrap();
    clock.advance(Duration::hours(4) + Duration::seconds(1));

    let result = verify_usecase(&repo, &clock)
        .execute(verify_input(&email.last_code()))
        .await;
    assert!(
        matches!(result, Err(StepUpError::InvalidOrExpired)),
        "expected InvalidOrExpired, got {result:?}"
    );
    assert!(repo.snapshot().await.grants.is_empty());
}

#[tokio::test]
async fn should_reject_malformed_code_without_counting() {
    let repo = MemoryStepUpRepository::new();
    let email = RecordingEmailSender::new();
    let clock = test_clock();

    send_usecase(&repo, email, &clock)
        .execute(send_input(ROUTE))
        .await
        .unwrap();
    let uc = verify_usecase(&repo, &clock);

    for code in ["", "12345", "1234567", "12a456", " 12345"] {
        let result = uc.execute(verify_input(code)).await;
        assert!(
            matches!(result, Err(StepUpError::InvalidOrExpired)),
            "{code:?}: expected InvalidOrExpired, got {result:?}"
        );
    }
    assert_eq!(repo.snapshot().await.challenges[0].attempt_count, 0);
}

#[tokio::test]
async fn should_reject_code_without_challenge() {
    let repo = MemoryStepUpRepository::new();
    let clock = test_clock();

    let result = verify_usecase(&repo, &clock)
        .execute(verify_input("123456"))
        .await;
    assert!(
        matches!(result, Err(StepUpError::InvalidOrExpired)),
        "expected InvalidOrExpired, got {result:?}"
    );
}

#[tokio::test]
async fn should_reject_superseded_code_after_resend() {
    let repo = MemoryStepUpRepository::new();
    let email = RecordingEmailSender::new();
    let clock = test_clock();
    let send = send_usecase(&repo, email.clone(), &clock);

    send.execute(send_input(ROUTE)).await.unwrap();
    let old_code = email.last_code();
    clock.advance(Duration::seconds(61));
    send.execute(send_input(ROUTE)).await.unwrap();
    let new_code = email.last_code();

    let uc = verify_usecase(&repo, &clock);
    if old_code != new_code {
        let result = uc.execute(verify_input(&old_code)).await;
        assert!(
            matches!(result, Err(StepUpError::InvalidOrExpired)),
            "expected InvalidOrExpired, got {result:?}"
        );
    }
    uc.execute(verify_input(&new_code)).await.unwrap();
}

#[tokio::test]
async fn should_refresh_existing_grant_on_reverification() {
    let repo = MemoryStepUpRepository::new();
    let email = RecordingEmailSender::new();
    let clock = test_clock();
    let send = send_usecase(&repo, email.clone(), &clock);
    let verify = verify_usecase(&repo, &clock);

    send.execute(send_input(ROUTE)).await.unwrap();
    verify.execute(verify_input(&email.last_code())).await.unwrap();

    clock.advance(Duration::hours(30));
    send.execute(send_input(ROUTE)).await.unwrap();
    let out = verify.execute(verify_input(&email.last_code())).await.unwrap();

    let state = repo.snapshot().await;
    assert_eq!(state.grants.len(), 1, "grant is refreshed, not duplicated");
    assert_eq!(
        out.verification_expires_at,
        test_now() + Duration::hours(30) + Duration::hours(24)
    );
}
