use sea_orm::Database;
use tracing::{info, warn};

use gatehouse_core::tracing::init_tracing;
use gatehouse_step_up::config::StepUpConfig;
use gatehouse_step_up::domain::clock::SystemClock;
use gatehouse_step_up::engine::StepUpEngine;
use gatehouse_step_up::infra::db::DbStepUpRepository;
use gatehouse_step_up::infra::email::HttpEmailSender;
use gatehouse_step_up::router::build_router;
use gatehouse_step_up::state::AppState;

#[tokio::main]
async fn main() {
    init_tracing();

    let config = StepUpConfig::from_env();

    let db = Database::connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    let email = HttpEmailSender::new(config.email_provider);
    if !email.is_configured() {
        warn!("email provider not configured; route OTP sends will fail");
    }

    let engine = StepUpEngine::new(
        DbStepUpRepository::new(db),
        email,
        SystemClock,
        config.policies,
    );

    let router = build_router(AppState::new(engine));
    let addr = format!("0.0.0.0:{}", config.step_up_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind");

    info!("step-up service listening on {addr}");
    axum::serve(listener, router).await.expect("server error");
}
