//! Site adapters - page automation for the two external sites
//!
//! Each adapter implements one capability, [`SiteAdapter::fill_and_submit`]:
//! - locate the prompt input through an ordered selector fallback list
//! - write the payload through the native value setter and fire input/change events
//! - submit through the first visible, enabled candidate button or an Enter keypress
//! - poll the page until the result is stable (text) or present (image)
//!
//! Selectors and timings live in [`profile`] and can be replaced from configuration; the
//! adapters only ever talk to the page through the [`Document`] trait.

pub mod assistant;
pub mod context;
pub mod document;
pub mod errors;
pub mod generator;
pub mod polling;
pub mod profile;
mod steps;

#[cfg(test)]
pub(crate) mod testing;

use async_trait::async_trait;
use promptsmith_core_types::SiteId;

pub use assistant::ChatAssistantAdapter;
pub use context::AdapterContext;
pub use document::{Document, DocumentError, NodeHandle, NodeInfo};
pub use errors::AdapterError;
pub use generator::ImageGeneratorAdapter;
pub use polling::{poll_until_stable, PollOutcome, PollPolicy};
pub use profile::{
    AssistantProfile, ButtonMatcher, GeneratorProfile, ImageCompletion, InputSpec,
    SubmitStrategy, TextCompletion,
};

/// Uniform fill-submit-poll contract implemented once per external site.
#[async_trait]
pub trait SiteAdapter: Send + Sync {
    fn site(&self) -> SiteId;

    async fn fill_and_submit(&self, payload: &str) -> Result<String, AdapterError>;
}
