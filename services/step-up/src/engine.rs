//! The wired step-up verification surface.
//!
//! Everything is injected: build one engine at startup from a repository, an
//! email sender, a clock and the route policy table, then share it.

use std::sync::Arc;

use uuid::Uuid;

use crate::domain::clock::Clock;
use crate::domain::policy::RoutePolicyTable;
use crate::domain::repository::{EmailSender, StepUpRepository};
use crate::error::StepUpError;
use crate::usecase::assert::AssertRouteAccessUseCase;
use crate::usecase::send::{
    SendRouteEmailOtpInput, SendRouteEmailOtpOutput, SendRouteEmailOtpUseCase,
};
use crate::usecase::status::{GetRouteAccessStatusUseCase, RouteAccessStatus};
use crate::usecase::verify::{
    VerifyRouteEmailOtpInput, VerifyRouteEmailOtpOutput, VerifyRouteEmailOtpUseCase,
};

#[derive(Clone)]
pub struct StepUpEngine<R, E, C> {
    repo: R,
    email: E,
    clock: C,
    policies: Arc<RoutePolicyTable>,
}

impl<R, E, C> StepUpEngine<R, E, C>
where
    R: StepUpRepository + Clone,
    E: EmailSender + Clone,
    C: Clock + Clone,
{
    pub fn new(repo: R, email: E, clock: C, policies: RoutePolicyTable) -> Self {
        Self {
            repo,
            email,
            clock,
            policies: Arc::new(policies),
        }
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    pub fn policies(&self) -> &RoutePolicyTable {
        &self.policies
    }

    pub async fn get_route_access_status_for_user(
        &self,
        owner_user_id: Uuid,
        route_key: &str,
    ) -> Result<RouteAccessStatus, StepUpError> {
        GetRouteAccessStatusUseCase {
            store: self.repo.clone(),
            clock: self.clock.clone(),
            policies: Arc::clone(&self.policies),
        }
        .execute(owner_user_id, route_key)
        .await
    }

    pub async fn send_route_email_otp_for_user(
        &self,
        input: SendRouteEmailOtpInput,
    ) -> Result<SendRouteEmailOtpOutput, StepUpError> {
        SendRouteEmailOtpUseCase {
            repo: self.repo.clone(),
            email: self.email.clone(),
            clock: self.clock.clone(),
            policies: Arc::clone(&self.policies),
        }
        .execute(input)
        .await
    }

    pub async fn verify_route_email_otp_for_user(
        &self,
        owner_user_id: Uuid,
        route_key: &str,
        code: &str,
    ) -> Result<VerifyRouteEmailOtpOutput, StepUpError> {
        VerifyRouteEmailOtpUseCase {
            repo: self.repo.clone(),
            clock: self.clock.clone(),
            policies: Arc::clone(&self.policies),
        }
        .execute(VerifyRouteEmailOtpInput {
            owner_user_id,
            route_key: route_key.to_owned(),
            code: code.to_owned(),
        })
        .await
    }

    pub async fn assert_route_access_for_user(
        &self,
        owner_user_id: Uuid,
        route_key: &str,
    ) -> Result<(), StepUpError> {
        AssertRouteAccessUseCase {
            store: self.repo.clone(),
            clock: self.clock.clone(),
            policies: Arc::clone(&self.policies),
        }
        .execute(owner_user_id, route_key)
        .await
    }
}
