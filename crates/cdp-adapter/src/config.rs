//! Browser launch configuration and Chrome discovery.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chromiumoxide::browser::BrowserConfig;
use serde::{Deserialize, Serialize};
use which::which;

use crate::error::SessionError;

/// Environment variable naming an explicit Chrome/Chromium binary.
pub const CHROME_ENV: &str = "PROMPTSMITH_CHROME";
/// When set to a non-empty value, the well-known OS install paths are not searched.
pub const SKIP_OS_PATHS_ENV: &str = "PROMPTSMITH_SKIP_OS_PATHS";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CdpConfig {
    /// Explicit browser binary; discovered when absent.
    pub executable: Option<PathBuf>,
    /// Profile directory. Keep it stable so site logins survive restarts.
    pub user_data_dir: Option<PathBuf>,
    pub headless: bool,
    /// Attach to an already running browser instead of launching one.
    pub websocket_url: Option<String>,
    pub request_timeout_ms: u64,
    pub launch_timeout_ms: u64,
    pub no_sandbox: bool,
    pub extra_args: Vec<String>,
}

impl Default for CdpConfig {
    fn default() -> Self {
        Self {
            executable: None,
            user_data_dir: None,
            headless: false,
            websocket_url: None,
            request_timeout_ms: 30_000,
            launch_timeout_ms: 20_000,
            no_sandbox: false,
            extra_args: Vec::new(),
        }
    }
}

impl CdpConfig {
    pub fn resolved_executable(&self) -> Option<PathBuf> {
        self.executable.clone().or_else(detect_chrome_executable)
    }

    /// Builds the chromiumoxide launch config. Creates the profile directory when needed.
    pub fn browser_config(&self) -> Result<BrowserConfig, SessionError> {
        let mut builder = BrowserConfig::builder()
            .request_timeout(Duration::from_millis(self.request_timeout_ms))
            .launch_timeout(Duration::from_millis(self.launch_timeout_ms));

        if !self.headless {
            builder = builder.with_head();
        }
        if self.no_sandbox {
            builder = builder.no_sandbox();
        }

        let mut args: Vec<String> = [
            "--disable-background-timer-throttling",
            "--disable-backgrounding-occluded-windows",
            "--disable-renderer-backgrounding",
            "--disable-popup-blocking",
            "--no-first-run",
            "--no-default-browser-check",
            "--password-store=basic",
            "--remote-allow-origins=*",
        ]
        .iter()
        .map(|arg| arg.to_string())
        .collect();
        if self.headless {
            args.push("--headless=new".to_string());
        }
        args.extend(self.extra_args.iter().cloned());
        builder = builder.args(args);

        if let Some(executable) = self.resolved_executable() {
            if !executable.exists() {
                return Err(SessionError::Config(format!(
                    "chrome executable not found at {} (set {CHROME_ENV} to the full path of chrome/chromium)",
                    executable.display()
                )));
            }
            builder = builder.chrome_executable(executable);
        }

        if let Some(dir) = &self.user_data_dir {
            builder = builder.user_data_dir(ensure_profile_dir(dir)?);
        }

        builder.build().map_err(SessionError::Config)
    }
}

fn ensure_profile_dir(dir: &Path) -> Result<PathBuf, SessionError> {
    let absolute = if dir.is_absolute() {
        dir.to_path_buf()
    } else {
        env::current_dir()
            .map_err(|err| SessionError::Config(format!("failed to resolve cwd for user-data-dir: {err}")))?
            .join(dir)
    };
    fs::create_dir_all(&absolute)
        .map_err(|err| SessionError::Config(format!("failed to ensure user-data-dir: {err}")))?;
    Ok(absolute)
}

/// Locates a Chrome/Chromium binary: the `PROMPTSMITH_CHROME` override first, then `PATH`, then
/// the usual install locations for the host OS.
pub fn detect_chrome_executable() -> Option<PathBuf> {
    if let Ok(raw) = env::var(CHROME_ENV) {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            let candidate = PathBuf::from(trimmed);
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }

    for name in chrome_executable_names() {
        if let Ok(path) = which(name) {
            return Some(path);
        }
    }

    let skip_defaults = env::var(SKIP_OS_PATHS_ENV)
        .map(|value| !value.trim().is_empty())
        .unwrap_or(false);
    if skip_defaults {
        return None;
    }

    os_specific_chrome_paths()
        .into_iter()
        .find(|candidate| candidate.exists())
}

fn chrome_executable_names() -> &'static [&'static str] {
    #[cfg(target_os = "windows")]
    {
        &["chrome.exe", "chromium.exe", "msedge.exe"]
    }

    #[cfg(not(target_os = "windows"))]
    {
        &[
            "google-chrome-stable",
            "google-chrome",
            "chromium",
            "chromium-browser",
        ]
    }
}

fn os_specific_chrome_paths() -> Vec<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        ["PROGRAMFILES", "PROGRAMFILES(X86)", "LOCALAPPDATA"]
            .iter()
            .filter_map(|var| env::var_os(var).map(PathBuf::from))
            .flat_map(|root| {
                [
                    root.join("Google/Chrome/Application/chrome.exe"),
                    root.join("Chromium/Application/chrome.exe"),
                    root.join("Microsoft/Edge/Application/msedge.exe"),
                ]
            })
            .collect()
    }

    #[cfg(target_os = "macos")]
    {
        vec![
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"),
            PathBuf::from("/Applications/Chromium.app/Contents/MacOS/Chromium"),
        ]
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        vec![
            PathBuf::from("/usr/bin/google-chrome-stable"),
            PathBuf::from("/usr/bin/google-chrome"),
            PathBuf::from("/usr/bin/chromium-browser"),
            PathBuf::from("/usr/bin/chromium"),
        ]
    }
}
