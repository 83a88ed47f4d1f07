//! Per-site selector and timing profiles.
//!
//! The defaults target the pages as they looked when the selectors were captured. They are
//! expected to drift; every field can be overridden from the `sites` section of the config.

use serde::{Deserialize, Serialize};

use crate::polling::PollPolicy;

/// Where the payload goes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputSpec {
    /// Candidate selectors, tried in order; the first match wins.
    pub selectors: Vec<String>,
    /// Pause after filling so the page can react before submission (milliseconds).
    pub settle_delay_ms: u64,
}

impl Default for InputSpec {
    fn default() -> Self {
        Self {
            selectors: Vec::new(),
            settle_delay_ms: 500,
        }
    }
}

/// One way of finding a submit control.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ButtonMatcher {
    /// Elements matching a CSS selector.
    Selector { selector: String },
    /// Elements matching `within` whose rendered text contains any of `text`.
    Text {
        #[serde(default = "default_button_selector")]
        within: String,
        text: Vec<String>,
    },
}

fn default_button_selector() -> String {
    "button".to_string()
}

impl ButtonMatcher {
    pub fn selector(selector: impl Into<String>) -> Self {
        Self::Selector {
            selector: selector.into(),
        }
    }

    pub fn css(&self) -> &str {
        match self {
            Self::Selector { selector } => selector,
            Self::Text { within, .. } => within,
        }
    }

    pub fn matches_text(&self, rendered: &str) -> bool {
        match self {
            Self::Selector { .. } => true,
            Self::Text { text, .. } => text.iter().any(|needle| rendered.contains(needle.as_str())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmitStrategy {
    /// Candidate controls, tried in order; only visible and enabled elements qualify.
    pub buttons: Vec<ButtonMatcher>,
    /// Press Enter in the input when no control qualifies; otherwise the attempt fails.
    pub enter_fallback: bool,
}

impl Default for SubmitStrategy {
    fn default() -> Self {
        Self {
            buttons: Vec::new(),
            enter_fallback: true,
        }
    }
}

/// Completion rule for text answers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextCompletion {
    /// The last element matching this selector holds the answer.
    pub container_selector: String,
    /// Answers must be strictly longer than this many characters.
    pub min_chars: usize,
    pub poll: PollPolicy,
    /// Return whatever was last seen instead of failing when the budget runs out.
    pub accept_partial_on_timeout: bool,
}

impl Default for TextCompletion {
    fn default() -> Self {
        Self {
            container_selector: r#"div[class*="content"]"#.to_string(),
            min_chars: 5,
            poll: PollPolicy {
                initial_delay_ms: 3_000,
                interval_ms: 2_000,
                max_attempts: 15,
                stable_polls: 1,
            },
            accept_partial_on_timeout: false,
        }
    }
}

/// Completion rule for generated images.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageCompletion {
    pub image_selector: String,
    /// Images must be strictly larger than this in both dimensions (pixels).
    pub min_width: u32,
    pub min_height: u32,
    pub poll: PollPolicy,
}

impl Default for ImageCompletion {
    fn default() -> Self {
        Self {
            image_selector: r#"img[src*="http"]"#.to_string(),
            min_width: 200,
            min_height: 200,
            poll: PollPolicy {
                initial_delay_ms: 0,
                interval_ms: 2_000,
                max_attempts: 60,
                stable_polls: 0,
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantProfile {
    pub url: String,
    pub input: InputSpec,
    pub submit: SubmitStrategy,
    pub response: TextCompletion,
}

impl Default for AssistantProfile {
    fn default() -> Self {
        Self {
            url: "https://www.doubao.com/chat/".to_string(),
            input: InputSpec {
                selectors: vec![
                    r#"textarea[data-testid="chat_input_input"]"#.to_string(),
                    r#"textarea[placeholder*="输入"]"#.to_string(),
                    ".semi-input-textarea".to_string(),
                    r#"div[contenteditable="true"]"#.to_string(),
                    "#chat-input".to_string(),
                ],
                settle_delay_ms: 500,
            },
            submit: SubmitStrategy {
                buttons: vec![
                    ButtonMatcher::selector(r#"button[data-testid="send-button"]"#),
                    ButtonMatcher::selector(r#"button[aria-label="发送"]"#),
                    ButtonMatcher::selector(".semi-button-primary"),
                ],
                enter_fallback: true,
            },
            response: TextCompletion::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorProfile {
    pub url: String,
    pub input: InputSpec,
    pub submit: SubmitStrategy,
    pub image: ImageCompletion,
}

impl Default for GeneratorProfile {
    fn default() -> Self {
        Self {
            url: "https://www.liblib.art/".to_string(),
            input: InputSpec {
                selectors: vec![
                    r#"textarea[placeholder*="提示词"]"#.to_string(),
                    r#"textarea[placeholder*="Prompt"]"#.to_string(),
                    "#prompt-input".to_string(),
                ],
                settle_delay_ms: 500,
            },
            submit: SubmitStrategy {
                buttons: vec![ButtonMatcher::Text {
                    within: default_button_selector(),
                    text: vec!["生成".to_string(), "Generate".to_string()],
                }],
                enter_fallback: false,
            },
            image: ImageCompletion::default(),
        }
    }
}
