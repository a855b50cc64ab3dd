//! sea-orm entities for the step-up verification tables.

pub mod route_access_grants;
pub mod route_otp_challenges;
