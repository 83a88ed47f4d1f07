//! Stage-2 adapter: the image generator page.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use promptsmith_core_types::SiteId;
use tracing::{debug, info};

use crate::document::Document;
use crate::errors::AdapterError;
use crate::polling::{poll_until_stable, PollOutcome};
use crate::profile::GeneratorProfile;
use crate::steps;
use crate::SiteAdapter;

/// Submits a generation prompt and waits for a sufficiently large image to appear.
pub struct ImageGeneratorAdapter {
    document: Arc<dyn Document>,
    profile: GeneratorProfile,
}

impl ImageGeneratorAdapter {
    pub fn new(document: Arc<dyn Document>, profile: GeneratorProfile) -> Self {
        Self { document, profile }
    }

    pub fn profile(&self) -> &GeneratorProfile {
        &self.profile
    }

    /// Source of the first image larger than the configured minimum in both dimensions.
    async fn first_large_image(&self) -> Result<Option<String>, AdapterError> {
        let image = &self.profile.image;
        for node in self.document.query_all(&image.image_selector).await? {
            let info = self.document.describe(&node).await?;
            if info.width <= image.min_width || info.height <= image.min_height {
                continue;
            }
            if let Some(src) = info.src.filter(|src| !src.is_empty()) {
                return Ok(Some(src));
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl SiteAdapter for ImageGeneratorAdapter {
    fn site(&self) -> SiteId {
        SiteId::Generator
    }

    async fn fill_and_submit(&self, payload: &str) -> Result<String, AdapterError> {
        let started = Instant::now();
        let site = self.site();
        info!(
            %site,
            payload_chars = payload.chars().count(),
            "Submitting generation prompt"
        );

        let document = self.document.as_ref();
        let input = steps::locate_input(document, &self.profile.input, site).await?;
        steps::fill_input(document, &input, payload, &self.profile.input).await?;
        let method = steps::submit(document, &input, &self.profile.submit, site).await?;
        debug!(?method, "generation prompt submitted");

        let poll = &self.profile.image.poll;
        match poll_until_stable(poll, || self.first_large_image(), |_: &String| true).await? {
            PollOutcome::Settled(src) => {
                info!(
                    %site,
                    latency_ms = started.elapsed().as_millis() as u64,
                    image = %src,
                    "Generated image detected"
                );
                Ok(src)
            }
            PollOutcome::Exhausted { last_seen } => Err(AdapterError::Timeout {
                message: format!("no generated image after {} polls", poll.max_attempts),
                last_seen,
            }),
        }
    }
}
