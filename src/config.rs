//! Configuration management with serde serialization/deserialization
//!
//! This module holds the service configuration, the browser launch flags and the
//! translation of both into a chromiumoxide `BrowserConfig`.

use crate::{OptionsBag, RenderError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration structure for the render service
///
/// Every field has a default, so a config file only needs the keys it changes.
///
/// # Examples
///
/// ```rust
/// use html_render_service::{Config, Provider};
///
/// let config = Config {
///     port: 8080,
///     provider: Provider::Gotenberg,
///     ..Default::default()
/// };
/// assert_eq!(config.socket_address(), "0.0.0.0:8080");
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Address the HTTP listener binds to (default: 0.0.0.0)
    pub bind_address: String,

    /// Port the HTTP listener binds to (default: 3000)
    pub port: u16,

    /// Path to Chrome/Chromium executable (default: auto-detect)
    pub chrome_path: Option<String>,

    /// Browser viewport used for page layout and image captures
    pub viewport: Viewport,

    /// Bounds on the asynchronous waits of the render pipeline
    pub timeouts: Timeouts,

    /// Which backend renders documents (default: the local headless browser)
    pub provider: Provider,

    /// Remote conversion gateway settings, used when `provider` is `gotenberg`
    pub gateway: GatewaySettings,

    /// Options applied to every PDF request unless the caller overrides the key
    pub default_pdf_options: OptionsBag,

    /// Options applied to every image request unless the caller overrides the key
    pub default_image_options: OptionsBag,

    /// Maximum accepted JSON body size in bytes (default: 50MB)
    pub body_limit_bytes: usize,

    /// Install the Prometheus recorder and serve `/metrics` (default: false)
    pub metrics_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 3000,
            chrome_path: None,
            viewport: Viewport::default(),
            timeouts: Timeouts::default(),
            provider: Provider::default(),
            gateway: GatewaySettings::default(),
            default_pdf_options: OptionsBag::new(),
            default_image_options: OptionsBag::new(),
            body_limit_bytes: 50 * 1024 * 1024,
            metrics_enabled: false,
        }
    }
}

impl Config {
    pub fn socket_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

/// Browser viewport configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Viewport {
    /// Viewport width in pixels (default: 1280)
    pub width: u32,

    /// Viewport height in pixels (default: 720)
    pub height: u32,

    /// Device pixel ratio (default: 1.0)
    pub device_scale_factor: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            device_scale_factor: 1.0,
        }
    }
}

/// Time bounds for each wait in the render pipeline
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Timeouts {
    /// Bound on HTML injection until DOM content loaded (default: 60s)
    #[serde(with = "secs")]
    pub content_load: Duration,

    /// Bound on URL navigation including the network-idle wait (default: 30s)
    #[serde(with = "secs")]
    pub navigation: Duration,

    /// Bound on `document.fonts.ready` (default: 30s)
    #[serde(with = "secs")]
    pub font_ready: Duration,

    /// Bound on any single DevTools protocol command (default: 30s)
    #[serde(with = "secs")]
    pub cdp_request: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            content_load: Duration::from_secs(60),
            navigation: Duration::from_secs(30),
            font_ready: Duration::from_secs(30),
            cdp_request: Duration::from_secs(30),
        }
    }
}

/// Rendering backend selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub enum Provider {
    /// Drive a local headless browser per request (default)
    #[default]
    #[serde(rename = "html-to-pdf")]
    HtmlToPdf,
    /// Forward requests to a Gotenberg-compatible conversion gateway
    #[serde(rename = "gotenberg")]
    Gotenberg,
}

impl std::str::FromStr for Provider {
    type Err = RenderError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "html-to-pdf" => Ok(Provider::HtmlToPdf),
            "gotenberg" => Ok(Provider::Gotenberg),
            other => Err(RenderError::ConfigurationError(format!(
                "unknown provider `{other}` (expected `html-to-pdf` or `gotenberg`)"
            ))),
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Provider::HtmlToPdf => "html-to-pdf",
            Provider::Gotenberg => "gotenberg",
        })
    }
}

/// Remote conversion gateway settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewaySettings {
    /// Base URL of the gateway, e.g. `http://gotenberg:3000` (default: unset)
    pub url: Option<String>,

    /// Total timeout of one gateway call (default: 120s)
    #[serde(with = "secs")]
    pub timeout: Duration,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            url: None,
            timeout: Duration::from_secs(120),
        }
    }
}

/// Flags every browser process is launched with, before any caller flags.
pub const BASELINE_LAUNCH_ARGS: [&str; 13] = [
    "--no-sandbox",
    "--disable-setuid-sandbox",
    "--disable-dev-shm-usage",
    "--disable-accelerated-2d-canvas",
    "--disable-gpu",
    "--single-process",
    "--no-first-run",
    "--no-zygote",
    "--disable-background-timer-throttling",
    "--disable-backgrounding-occluded-windows",
    "--disable-renderer-backgrounding",
    "--disable-web-security",
    "--mute-audio",
];

/// Build the launch argument list for one browser process
///
/// Caller flags are appended after the baseline as-is: no deduplication and no
/// validation, conflicting flags are left to the browser.
///
/// # Examples
///
/// ```rust
/// use html_render_service::{build_launch_args, BASELINE_LAUNCH_ARGS};
///
/// let args = build_launch_args(&["--lang=de".to_string()]);
/// assert_eq!(args.len(), BASELINE_LAUNCH_ARGS.len() + 1);
/// assert_eq!(args.last().map(String::as_str), Some("--lang=de"));
/// ```
pub fn build_launch_args(caller_args: &[String]) -> Vec<String> {
    BASELINE_LAUNCH_ARGS
        .iter()
        .map(|arg| arg.to_string())
        .chain(caller_args.iter().cloned())
        .collect()
}

/// Assemble the chromiumoxide launch configuration for one session
///
/// `profile_dir` is the session's private user-data directory; it keeps concurrent
/// sessions from fighting over Chrome's profile singleton.
pub fn create_browser_config(
    config: &Config,
    launch_args: Vec<String>,
    profile_dir: &Path,
) -> Result<chromiumoxide::browser::BrowserConfig, RenderError> {
    use chromiumoxide::browser::BrowserConfig;
    use chromiumoxide::handler::viewport::Viewport as ChromeViewport;

    let viewport = ChromeViewport {
        width: config.viewport.width,
        height: config.viewport.height,
        device_scale_factor: Some(config.viewport.device_scale_factor),
        emulating_mobile: false,
        is_landscape: config.viewport.width > config.viewport.height,
        has_touch: false,
    };

    let mut builder = BrowserConfig::builder()
        .window_size(config.viewport.width, config.viewport.height)
        .viewport(viewport)
        .request_timeout(config.timeouts.cdp_request)
        .user_data_dir(profile_dir)
        .args(launch_args);

    if let Some(chrome_path) = &config.chrome_path {
        builder = builder.chrome_executable(chrome_path);
    }

    builder.build().map_err(RenderError::LaunchError)
}

/// Reject configurations the service cannot run with.
pub fn validate_config(config: &Config) -> Result<(), RenderError> {
    let timeouts = [
        ("content_load", config.timeouts.content_load),
        ("navigation", config.timeouts.navigation),
        ("font_ready", config.timeouts.font_ready),
        ("cdp_request", config.timeouts.cdp_request),
        ("gateway.timeout", config.gateway.timeout),
    ];
    for (name, value) in timeouts {
        if value.is_zero() {
            return Err(RenderError::ConfigurationError(format!(
                "timeout `{name}` must be greater than 0"
            )));
        }
    }

    if config.viewport.width == 0 || config.viewport.height == 0 {
        return Err(RenderError::ConfigurationError(
            "viewport dimensions must be greater than 0".to_string(),
        ));
    }

    if config.body_limit_bytes == 0 {
        return Err(RenderError::ConfigurationError(
            "body limit must be greater than 0".to_string(),
        ));
    }

    if let Some(gateway_url) = &config.gateway.url {
        url::Url::parse(gateway_url).map_err(|e| {
            RenderError::ConfigurationError(format!("invalid gateway url `{gateway_url}`: {e}"))
        })?;
    }

    Ok(())
}

/// Load a JSON config file; missing keys keep their defaults.
pub async fn load_config_file(path: &Path) -> Result<Config, RenderError> {
    let content = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&content)?)
}

mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
