//! Chromium DevTools backend.
//!
//! Launches (or attaches to) a Chrome/Chromium instance through chromiumoxide and exposes each
//! opened tab as a [`site_adapters::Document`], so the site adapters can drive real pages.

pub mod config;
pub mod document;
pub mod error;
pub mod scripts;
pub mod session;

pub use config::{detect_chrome_executable, CdpConfig, CHROME_ENV};
pub use document::CdpDocument;
pub use error::SessionError;
pub use session::BrowserSession;
