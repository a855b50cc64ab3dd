use chrono::Duration;

use gatehouse_step_up::error::StepUpError;
use gatehouse_step_up::infra::memory::MemoryStepUpRepository;

use crate::helpers::{
    ROUTE, assert_usecase, never_expiring_policies, test_clock, test_grant, test_now,
    test_policies, test_user_id,
};

#[tokio::test]
async fn should_deny_without_grant() {
    let repo = MemoryStepUpRepository::new();
    let clock = test_clock();

    let result = assert_usecase(&repo, &clock, test_policies())
        .execute(test_user_id(), ROUTE)
        .await;
    assert!(
        matches!(result, Err(StepUpError::VerificationRequired)),
        "expected VerificationRequired, got {result:?}"
    );
}

#[tokio::test]
async fn should_allow_with_unexpired_grant() {
    let repo = MemoryStepUpRepository::new();
    repo.set_grants(vec![test_grant(test_now() + Duration::hours(1), None)])
        .await;
    let clock = test_clock();

    assert_usecase(&repo, &clock, test_policies())
        .execute(test_user_id(), ROUTE)
        .await
        .unwrap();
}

#[tokio::test]
async fn should_deny_with_expired_grant() {
    let repo = MemoryStepUpRepository::new();
    repo.set_grants(vec![test_grant(test_now() - Duration::seconds(1), None)])
        .await;
    let clock = test_clock();

    let result = assert_usecase(&repo, &clock, test_policies())
        .execute(test_user_id(), ROUTE)
        .await;
    assert!(
        matches!(result, Err(StepUpError::VerificationRequired)),
        "expected VerificationRequired, got {result:?}"
    );
}

#[tokio::test]
async fn should_ignore_expiry_when_route_grants_never_expire() {
    let repo = MemoryStepUpRepository::new();
    repo.set_grants(vec![test_grant(test_now() - Duration::days(30), None)])
        .await;
    let clock = test_clock();

    assert_usecase(&repo, &clock, never_expiring_policies())
        .execute(test_user_id(), ROUTE)
        .await
        .unwrap();
}

#[tokio::test]
async fn should_deny_with_revoked_grant() {
    let repo = MemoryStepUpRepository::new();
    repo.set_grants(vec![test_grant(
        test_now() + Duration::hours(1),
        Some(test_now() - Duration::minutes(5)),
    )])
    .await;
    let clock = test_clock();

    for policies in [test_policies(), never_expiring_policies()] {
        let result = assert_usecase(&repo, &clock, policies)
            .execute(test_user_id(), ROUTE)
            .await;
        assert!(
            matches!(result, Err(StepUpError::VerificationRequired)),
            "expected VerificationRequired, got {result:?}"
        );
    }
}

#[tokio::test]
async fn should_deny_grant_of_other_user() {
    let repo = MemoryStepUpRepository::new();
    let mut grant = test_grant(test_now() + Duration::hours(1), None);
    grant.owner_user_id = uuid::Uuid::now_v7();
    repo.set_grants(vec![grant]).await;
    let clock = test_clock();

    let result = assert_usecase(&repo, &clock, test_policies())
        .execute(test_user_id(), ROUTE)
        .await;
    assert!(
        matches!(result, Err(StepUpError::VerificationRequired)),
        "expected VerificationRequired, got {result:?}"
    );
}
