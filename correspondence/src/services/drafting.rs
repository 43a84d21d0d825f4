//! Letter drafting
//!
//! Suggests a letter body from a topic through an external text
//! generation endpoint. Drafting is advisory: callers treat any failure
//! as "no suggestion".

use crate::config::DRAFT_TIMEOUT_SECS;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use reqwest::Url;
use std::time::Duration;

/// Source of suggested letter bodies
#[async_trait]
pub trait LetterDrafter: Send + Sync {
    /// Draft a body about `topic` from `sender` to `recipients`
    async fn draft(&self, topic: &str, sender: &str, recipients: &str) -> Result<String>;
}

/// Instruction sent to the text generation endpoint
pub fn build_prompt(topic: &str, sender: &str, recipients: &str) -> String {
    format!(
        "You are an expert secretary in a formal office.\n\
         Write a formal business letter in Persian (Farsi).\n\
         \n\
         Sender: {sender}\n\
         Receiver: {recipients}\n\
         Topic: {topic}\n\
         \n\
         The tone should be polite, formal and strictly professional, using \
         standard administrative terminology.\n\
         Do not include placeholders like [Date] or [Signature], just the body and closing.\n\
         Return ONLY the text of the letter."
    )
}

/// Drafter backed by an HTTP GET endpoint that takes the prompt as the
/// last path segment
#[derive(Clone)]
pub struct HttpDrafter {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpDrafter {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| {
            AppError::validation(format!("invalid drafting URL {}: {}", base_url, e))
        })?;

        let client = reqwest::Client::builder()
            .user_agent(concat!("correspondence/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(DRAFT_TIMEOUT_SECS))
            .build()?;

        Ok(Self { client, base_url })
    }

    /// Full request URL for `prompt`, percent-encoded
    pub fn request_url(&self, prompt: &str) -> Result<Url> {
        let mut url = self.base_url.clone();

        url.path_segments_mut()
            .map_err(|_| {
                AppError::validation(format!(
                    "drafting URL {} cannot take a path",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .push(prompt);
        url.query_pairs_mut().append_pair("model", "openai");

        Ok(url)
    }
}

#[async_trait]
impl LetterDrafter for HttpDrafter {
    async fn draft(&self, topic: &str, sender: &str, recipients: &str) -> Result<String> {
        let url = self.request_url(&build_prompt(topic, sender, recipients))?;

        tracing::debug!("Requesting draft from {}", self.base_url);

        let text = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::Generic("drafting service returned no text".to_string()));
        }

        Ok(text.to_string())
    }
}
