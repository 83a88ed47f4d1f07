//! Steps shared by both adapters: locate, fill, submit.

use std::time::Duration;

use promptsmith_core_types::SiteId;
use tokio::time::sleep;
use tracing::debug;

use crate::document::{Document, NodeHandle};
use crate::errors::AdapterError;
use crate::profile::{InputSpec, SubmitStrategy};

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum SubmitMethod {
    Clicked { selector: String },
    EnterKey,
}

pub(crate) async fn locate_input(
    document: &dyn Document,
    spec: &InputSpec,
    site: SiteId,
) -> Result<NodeHandle, AdapterError> {
    for selector in &spec.selectors {
        if let Some(node) = document.query(selector).await? {
            debug!(%site, selector = %selector, "input located");
            return Ok(node);
        }
    }
    Err(AdapterError::ElementNotFound(format!(
        "no {site} input matched any of [{}]",
        spec.selectors.join(", ")
    )))
}

pub(crate) async fn fill_input(
    document: &dyn Document,
    node: &NodeHandle,
    payload: &str,
    spec: &InputSpec,
) -> Result<(), AdapterError> {
    document.set_native_value(node, payload).await?;
    if spec.settle_delay_ms > 0 {
        sleep(Duration::from_millis(spec.settle_delay_ms)).await;
    }
    Ok(())
}

pub(crate) async fn submit(
    document: &dyn Document,
    input: &NodeHandle,
    strategy: &SubmitStrategy,
    site: SiteId,
) -> Result<SubmitMethod, AdapterError> {
    for matcher in &strategy.buttons {
        for candidate in document.query_all(matcher.css()).await? {
            let info = document.describe(&candidate).await?;
            if info.visible && info.enabled && matcher.matches_text(&info.text) {
                document.click(&candidate).await?;
                return Ok(SubmitMethod::Clicked {
                    selector: matcher.css().to_string(),
                });
            }
        }
    }

    if strategy.enter_fallback {
        debug!(%site, "no submit control qualified; pressing Enter");
        document.press_enter(input).await?;
        return Ok(SubmitMethod::EnterKey);
    }

    Err(AdapterError::Application(format!(
        "cannot find a {site} submit control"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::NodeInfo;
    use crate::profile::ButtonMatcher;
    use crate::testing::FakeDocument;

    fn input_spec(selectors: &[&str]) -> InputSpec {
        InputSpec {
            selectors: selectors.iter().map(|s| s.to_string()).collect(),
            settle_delay_ms: 0,
        }
    }

    #[tokio::test]
    async fn first_matching_selector_wins() {
        let doc = FakeDocument::new()
            .with_node("#second", "n2", NodeInfo::default())
            .with_node("#third", "n3", NodeInfo::default());
        let node = locate_input(&doc, &input_spec(&["#first", "#second", "#third"]), SiteId::Assistant)
            .await
            .unwrap();
        assert_eq!(node, NodeHandle("n2".into()));
    }

    #[tokio::test]
    async fn missing_input_is_element_not_found() {
        let doc = FakeDocument::new();
        let err = locate_input(&doc, &input_spec(&["#a", "#b"]), SiteId::Generator)
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::ElementNotFound(ref m) if m.contains("#a, #b")));
    }

    #[tokio::test]
    async fn hidden_and_disabled_buttons_are_skipped() {
        let doc = FakeDocument::new()
            .with_node("#input", "in", NodeInfo::default())
            .with_node(".send", "hidden", FakeDocument::button("", false, true))
            .with_node(".send", "disabled", FakeDocument::button("", true, false))
            .with_node(".send", "ok", FakeDocument::button("", true, true));
        let strategy = SubmitStrategy {
            buttons: vec![ButtonMatcher::selector(".send")],
            enter_fallback: true,
        };
        let method = submit(&doc, &NodeHandle("in".into()), &strategy, SiteId::Assistant)
            .await
            .unwrap();
        assert_eq!(
            method,
            SubmitMethod::Clicked {
                selector: ".send".into()
            }
        );
        assert_eq!(doc.clicks(), vec!["ok".to_string()]);
    }

    #[tokio::test]
    async fn enter_fallback_when_no_button_qualifies() {
        let doc = FakeDocument::new().with_node(".send", "hidden", FakeDocument::button("", false, true));
        let strategy = SubmitStrategy {
            buttons: vec![ButtonMatcher::selector(".send")],
            enter_fallback: true,
        };
        let method = submit(&doc, &NodeHandle("in".into()), &strategy, SiteId::Assistant)
            .await
            .unwrap();
        assert_eq!(method, SubmitMethod::EnterKey);
        assert_eq!(doc.enters(), vec!["in".to_string()]);
    }

    #[tokio::test]
    async fn text_matcher_without_fallback_fails() {
        let doc = FakeDocument::new().with_node("button", "b1", FakeDocument::button("Cancel", true, true));
        let strategy = SubmitStrategy {
            buttons: vec![ButtonMatcher::Text {
                within: "button".into(),
                text: vec!["Generate".into()],
            }],
            enter_fallback: false,
        };
        let err = submit(&doc, &NodeHandle("in".into()), &strategy, SiteId::Generator)
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::Application(_)));
        assert!(doc.clicks().is_empty());
    }
}
