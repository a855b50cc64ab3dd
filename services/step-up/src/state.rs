use std::sync::Arc;

use crate::domain::clock::SystemClock;
use crate::engine::StepUpEngine;
use crate::infra::db::DbStepUpRepository;
use crate::infra::email::HttpEmailSender;

pub type Engine = StepUpEngine<DbStepUpRepository, HttpEmailSender, SystemClock>;

/// Shared application state passed to every handler via axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
}

impl AppState {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }

    pub fn repo(&self) -> &DbStepUpRepository {
        self.engine.repo()
    }
}
