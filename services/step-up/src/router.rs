use axum::{
    Router,
    routing::{get, post},
};
use tower::ServiceBuilder;

use gatehouse_core::health::healthz;
use gatehouse_core::middleware::{propagate_request_id_layer, request_id_layer, trace_layer};

use crate::handlers::{
    health::readyz,
    route_access::{
        assert_route_access, get_route_access_status, send_route_email_otp,
        verify_route_email_otp,
    },
};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // Route access
        .route("/route-access/{route_key}", get(get_route_access_status))
        .route(
            "/route-access/{route_key}/email-otp",
            post(send_route_email_otp),
        )
        .route(
            "/route-access/{route_key}/email-otp/verify",
            post(verify_route_email_otp),
        )
        .route("/route-access/{route_key}/assert", get(assert_route_access))
        .layer(
            ServiceBuilder::new()
                .layer(request_id_layer())
                .layer(trace_layer())
                .layer(propagate_request_id_layer()),
        )
        .with_state(state)
}
