use std::sync::Arc;

use anyhow::anyhow;
use serde::Serialize;

use crate::domain::repository::EmailSender;
use crate::domain::types::RouteOtpEmail;
use crate::error::StepUpError;

/// Transactional email API credentials.
#[derive(Debug, Clone)]
pub struct EmailProviderConfig {
    /// Endpoint accepting a JSON message (e.g. "https://api.mailer.example/v1/send").
    pub api_url: String,
    pub api_token: String,
    /// Sender address.
    pub from: String,
}

/// Delivers codes through an HTTP email API.
///
/// Without a provider every send fails with `EmailProviderNotConfigured`.
#[derive(Clone)]
pub struct HttpEmailSender {
    client: reqwest::Client,
    provider: Option<Arc<EmailProviderConfig>>,
}

impl HttpEmailSender {
    pub fn new(provider: Option<EmailProviderConfig>) -> Self {
        Self {
            client: reqwest::Client::new(),
            provider: provider.map(Arc::new),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.provider.is_some()
    }
}

#[derive(Debug, Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'static str,
    text: String,
}

const SUBJECT: &str = "Your verification code";

fn render_text(message: &RouteOtpEmail) -> String {
    format!(
        "Your verification code is {code}.\n\n\
         Enter it to continue to \"{route}\". If you did not request this code, \
         you can ignore this email.",
        code = message.code,
        route = message.route_key,
    )
}

impl EmailSender for HttpEmailSender {
    async fn send_route_otp(&self, message: &RouteOtpEmail) -> Result<(), StepUpError> {
        let provider = self
            .provider
            .as_ref()
            .ok_or(StepUpError::EmailProviderNotConfigured)?;

        let body = SendEmailRequest {
            from: &provider.from,
            to: &message.email,
            subject: SUBJECT,
            text: render_text(message),
        };

        let response = self
            .client
            .post(&provider.api_url)
            .bearer_auth(&provider.api_token)
            // One challenge = one email, even if the provider call is retried upstream.
            .header("idempotency-key", format!("route_otp:{}", message.challenge_id))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                StepUpError::EmailDeliveryFailed(anyhow!(e).context("email provider request"))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(StepUpError::EmailDeliveryFailed(anyhow!(
                "email provider responded with {status}"
            )));
        }
        Ok(())
    }
}
