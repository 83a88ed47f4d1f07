//! Stage-1 adapter: the chat assistant page.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use promptsmith_core_types::SiteId;
use tracing::{debug, info, warn};

use crate::document::Document;
use crate::errors::AdapterError;
use crate::polling::{poll_until_stable, PollOutcome};
use crate::profile::AssistantProfile;
use crate::steps;
use crate::SiteAdapter;

/// Types the rewrite request into the assistant chat and waits until the latest answer stops
/// changing.
pub struct ChatAssistantAdapter {
    document: Arc<dyn Document>,
    profile: AssistantProfile,
}

impl ChatAssistantAdapter {
    pub fn new(document: Arc<dyn Document>, profile: AssistantProfile) -> Self {
        Self { document, profile }
    }

    pub fn profile(&self) -> &AssistantProfile {
        &self.profile
    }

    /// Trimmed text of the last response container, if one exists and is non-empty.
    async fn latest_answer(&self) -> Result<Option<String>, AdapterError> {
        let containers = self
            .document
            .query_all(&self.profile.response.container_selector)
            .await?;
        let Some(last) = containers.last() else {
            return Ok(None);
        };
        let text = self.document.describe(last).await?.text.trim().to_string();
        Ok((!text.is_empty()).then_some(text))
    }
}

#[async_trait]
impl SiteAdapter for ChatAssistantAdapter {
    fn site(&self) -> SiteId {
        SiteId::Assistant
    }

    async fn fill_and_submit(&self, payload: &str) -> Result<String, AdapterError> {
        let started = Instant::now();
        let site = self.site();
        info!(
            %site,
            payload_chars = payload.chars().count(),
            "Submitting rewrite request"
        );

        let document = self.document.as_ref();
        let input = steps::locate_input(document, &self.profile.input, site).await?;
        steps::fill_input(document, &input, payload, &self.profile.input).await?;
        let method = steps::submit(document, &input, &self.profile.submit, site).await?;
        debug!(?method, "rewrite request submitted");

        let completion = &self.profile.response;
        let min_chars = completion.min_chars;
        let outcome = poll_until_stable(
            &completion.poll,
            || self.latest_answer(),
            |text: &String| text.chars().count() > min_chars,
        )
        .await?;

        match outcome {
            PollOutcome::Settled(answer) => {
                info!(
                    %site,
                    latency_ms = started.elapsed().as_millis() as u64,
                    answer_chars = answer.chars().count(),
                    "Assistant answer settled"
                );
                Ok(answer)
            }
            PollOutcome::Exhausted { last_seen } => match last_seen {
                Some(partial) if completion.accept_partial_on_timeout => {
                    warn!(
                        %site,
                        answer_chars = partial.chars().count(),
                        "Assistant answer never settled; keeping the last partial answer"
                    );
                    Ok(partial)
                }
                last_seen => Err(AdapterError::Timeout {
                    message: format!(
                        "no stable {site} response after {} polls",
                        completion.poll.max_attempts
                    ),
                    last_seen,
                }),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::NodeInfo;
    use crate::polling::PollPolicy;
    use crate::profile::{ButtonMatcher, InputSpec, SubmitStrategy, TextCompletion};
    use crate::testing::FakeDocument;
    use std::time::Duration;

    fn profile(accept_partial: bool) -> AssistantProfile {
        AssistantProfile {
            url: "https://chat.example/".into(),
            input: InputSpec {
                selectors: vec!["textarea".into()],
                settle_delay_ms: 500,
            },
            submit: SubmitStrategy {
                buttons: vec![ButtonMatcher::selector(".send")],
                enter_fallback: true,
            },
            response: TextCompletion {
                container_selector: ".answer".into(),
                min_chars: 5,
                poll: PollPolicy {
                    initial_delay_ms: 3_000,
                    interval_ms: 2_000,
                    max_attempts: 4,
                    stable_polls: 1,
                },
                accept_partial_on_timeout: accept_partial,
            },
        }
    }

    #[tokio::test(start_paused = true)]
    async fn returns_answer_once_it_stops_changing() {
        let doc = Arc::new(
            FakeDocument::new()
                .with_node("textarea", "input", NodeInfo::default())
                .with_node(".send", "send", FakeDocument::button("", true, true))
                .with_node(".answer", "old", FakeDocument::text("an earlier answer"))
                .with_script(
                    ".answer",
                    "new",
                    vec![
                        FakeDocument::text("a red"),
                        FakeDocument::text("a red fox, watercolor"),
                        FakeDocument::text("  a red fox, watercolor  "),
                    ],
                ),
        );
        let adapter = ChatAssistantAdapter::new(doc.clone(), profile(false));

        let started = tokio::time::Instant::now();
        let answer = adapter.fill_and_submit("prefix\ndraw a fox").await.unwrap();

        assert_eq!(answer, "a red fox, watercolor");
        assert_eq!(doc.value_of("input").as_deref(), Some("prefix\ndraw a fox"));
        assert_eq!(doc.clicks(), vec!["send".to_string()]);
        assert_eq!(
            started.elapsed(),
            Duration::from_millis(500 + 3_000 + 3 * 2_000)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn changing_answer_times_out_with_last_seen() {
        let doc = Arc::new(
            FakeDocument::new()
                .with_node("textarea", "input", NodeInfo::default())
                .with_script(
                    ".answer",
                    "streaming",
                    vec![
                        FakeDocument::text("one two"),
                        FakeDocument::text("one two three"),
                        FakeDocument::text("one two three four"),
                        FakeDocument::text("one two three four five"),
                    ],
                ),
        );
        let adapter = ChatAssistantAdapter::new(doc.clone(), profile(false));

        let err = adapter.fill_and_submit("payload").await.unwrap_err();
        match err {
            AdapterError::Timeout { message, last_seen } => {
                assert!(message.contains("4 polls"));
                assert_eq!(last_seen.as_deref(), Some("one two three four five"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(doc.enters(), vec!["input".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn partial_answer_accepted_when_configured() {
        let doc = Arc::new(
            FakeDocument::new()
                .with_node("textarea", "input", NodeInfo::default())
                .with_script(
                    ".answer",
                    "streaming",
                    vec![
                        FakeDocument::text("alpha"),
                        FakeDocument::text("alpha beta"),
                        FakeDocument::text("alpha beta gamma"),
                        FakeDocument::text("alpha beta gamma delta"),
                    ],
                ),
        );
        let adapter = ChatAssistantAdapter::new(doc, profile(true));

        let answer = adapter.fill_and_submit("payload").await.unwrap();
        assert_eq!(answer, "alpha beta gamma delta");
    }

    #[tokio::test(start_paused = true)]
    async fn missing_input_fails_before_polling() {
        let doc = Arc::new(FakeDocument::new());
        let adapter = ChatAssistantAdapter::new(doc, profile(false));

        let started = tokio::time::Instant::now();
        let err = adapter.fill_and_submit("payload").await.unwrap_err();
        assert!(matches!(err, AdapterError::ElementNotFound(_)));
        assert_eq!(started.elapsed(), Duration::ZERO);
    }
}
