//! Headless browser access for the render pipeline
//!
//! The pipeline talks to the browser through three small traits so that the
//! session lifecycle can be exercised without a Chrome binary. `ChromeLauncher`
//! is the production implementation on top of chromiumoxide: one fresh Chrome
//! process per request, with its own profile directory and CDP handler task.

use crate::{create_browser_config, print_options, Config, OptionsBag, RenderError};
use async_trait::async_trait;
use chromiumoxide::browser::Browser;
use chromiumoxide::cdp::browser_protocol::emulation::SetEmulatedMediaParams;
use chromiumoxide::cdp::browser_protocol::page::{
    EventLifecycleEvent, NavigateParams, SetLifecycleEventsEnabledParams,
};
use chromiumoxide::Page;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Lifecycle event Chrome emits once at most two connections stayed open for 500ms.
const NETWORK_ALMOST_IDLE: &str = "networkAlmostIdle";
const DOM_CONTENT_LOADED: &str = "DOMContentLoaded";
const PROCESS_EXIT_GRACE: Duration = Duration::from_secs(5);

/// Starts one browser process with a given launch argument list.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self, launch_args: Vec<String>)
        -> Result<Box<dyn BrowserProcess>, RenderError>;
}

/// A running browser process owned by exactly one render session.
#[async_trait]
pub trait BrowserProcess: Send {
    fn id(&self) -> &str;

    async fn new_page(&mut self) -> Result<Box<dyn RenderPage>, RenderError>;

    /// Tear the process down. Never fails outward; problems are logged.
    async fn close(&mut self);
}

/// The page operations the render pipeline needs.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RenderPage: Send + Sync {
    /// Navigate to `url` and wait until the network is almost idle.
    async fn navigate(&self, url: &str) -> Result<(), RenderError>;

    /// Replace the document with `html` and wait for DOM content loaded.
    async fn set_content(&self, html: &str) -> Result<(), RenderError>;

    async fn emulate_media(&self, media: &str) -> Result<(), RenderError>;

    /// Evaluate `expression`, awaiting it if it yields a promise.
    async fn evaluate(&self, expression: &str) -> Result<(), RenderError>;

    async fn print_pdf(&self, options: &OptionsBag) -> Result<Vec<u8>, RenderError>;

    async fn capture_screenshot(&self, options: &OptionsBag) -> Result<Vec<u8>, RenderError>;
}

/// Launches a dedicated Chrome process per render session
pub struct ChromeLauncher {
    config: Config,
}

impl ChromeLauncher {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

#[async_trait]
impl BrowserLauncher for ChromeLauncher {
    async fn launch(
        &self,
        launch_args: Vec<String>,
    ) -> Result<Box<dyn BrowserProcess>, RenderError> {
        let id = uuid::Uuid::new_v4().to_string();
        let profile_dir = profile_dir_for(&id);

        tokio::fs::create_dir_all(&profile_dir).await.map_err(|e| {
            RenderError::LaunchError(format!("failed to create profile dir: {e}"))
        })?;

        let launched = match create_browser_config(&self.config, launch_args, &profile_dir) {
            Ok(browser_config) => Browser::launch(browser_config)
                .await
                .map_err(|e| RenderError::LaunchError(e.to_string())),
            Err(e) => Err(e),
        };

        let (browser, mut handler) = match launched {
            Ok(pair) => pair,
            Err(e) => {
                remove_profile_dir(&profile_dir).await;
                return Err(e);
            }
        };

        // The handler is a Stream that must be polled for any CDP command to complete
        let handler_id = id.clone();
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("CDP handler for browser {} reported: {}", handler_id, e);
                }
            }
            debug!("CDP handler for browser {} ended", handler_id);
        });

        info!("Launched browser {}", id);
        Ok(Box::new(ChromeProcess {
            id,
            browser,
            handler_task,
            profile_dir,
        }))
    }
}

pub struct ChromeProcess {
    id: String,
    browser: Browser,
    handler_task: tokio::task::JoinHandle<()>,
    profile_dir: PathBuf,
}

#[async_trait]
impl BrowserProcess for ChromeProcess {
    fn id(&self) -> &str {
        &self.id
    }

    async fn new_page(&mut self) -> Result<Box<dyn RenderPage>, RenderError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| RenderError::PageCreationError(e.to_string()))?;

        Ok(Box::new(ChromePage { page }))
    }

    async fn close(&mut self) {
        let exited = match self.browser.close().await {
            Ok(_) => match tokio::time::timeout(PROCESS_EXIT_GRACE, self.browser.wait()).await {
                Ok(Ok(_)) => {
                    debug!("Browser {} exited", self.id);
                    true
                }
                Ok(Err(e)) => {
                    warn!("Waiting for browser {} failed: {}", self.id, e);
                    false
                }
                Err(_) => {
                    warn!("Browser {} did not exit within {:?}", self.id, PROCESS_EXIT_GRACE);
                    false
                }
            },
            Err(e) => {
                error!("Failed to close browser {}: {}", self.id, e);
                false
            }
        };

        if !exited {
            if let Some(Err(e)) = self.browser.kill().await {
                error!("Failed to kill browser {}: {}", self.id, e);
            }
        }

        self.handler_task.abort();
        remove_profile_dir(&self.profile_dir).await;
        info!("Browser {} torn down", self.id);
    }
}

/// Private Chrome profile directory of the browser with the given id.
pub fn profile_dir_for(browser_id: &str) -> PathBuf {
    std::env::temp_dir().join(format!("html-render-service-{browser_id}"))
}

async fn remove_profile_dir(dir: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(dir).await {
        debug!("Could not remove profile dir {}: {}", dir.display(), e);
    }
}

pub struct ChromePage {
    page: Page,
}

impl ChromePage {
    async fn enable_lifecycle_events(
        &self,
        map_err: fn(String) -> RenderError,
    ) -> Result<(), RenderError> {
        self.page
            .execute(SetLifecycleEventsEnabledParams::new(true))
            .await
            .map_err(|e| map_err(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl RenderPage for ChromePage {
    async fn navigate(&self, url: &str) -> Result<(), RenderError> {
        self.enable_lifecycle_events(RenderError::NavigationError).await?;
        let mut events = self
            .page
            .event_listener::<EventLifecycleEvent>()
            .await
            .map_err(|e| RenderError::NavigationError(e.to_string()))?;

        let navigation = self
            .page
            .execute(NavigateParams::new(url))
            .await
            .map_err(|e| RenderError::NavigationError(e.to_string()))?;

        // DNS failures, refused connections and the like; HTTP error statuses still render
        if let Some(error_text) = &navigation.result.error_text {
            return Err(RenderError::NavigationError(format!("{url}: {error_text}")));
        }
        let loader_id = navigation.result.loader_id.clone();

        while let Some(event) = events.next().await {
            let same_document = loader_id.as_ref().map_or(true, |id| *id == event.loader_id);
            if same_document && event.name == NETWORK_ALMOST_IDLE {
                return Ok(());
            }
        }

        Err(RenderError::NavigationError(format!(
            "{url}: page went away before the network became idle"
        )))
    }

    async fn set_content(&self, html: &str) -> Result<(), RenderError> {
        self.enable_lifecycle_events(RenderError::RenderError).await?;
        let mut events = self
            .page
            .event_listener::<EventLifecycleEvent>()
            .await
            .map_err(|e| RenderError::RenderError(e.to_string()))?;

        // document.open() resets the frame lifecycle, so DOMContentLoaded fires again
        let script = format!(
            "document.open(); document.write({}); document.close(); true",
            serde_json::to_string(html)?
        );
        self.page
            .evaluate(script.as_str())
            .await
            .map_err(|e| RenderError::RenderError(format!("failed to inject content: {e}")))?;

        while let Some(event) = events.next().await {
            if event.name == DOM_CONTENT_LOADED {
                return Ok(());
            }
        }

        Err(RenderError::RenderError(
            "page went away before DOM content loaded".to_string(),
        ))
    }

    async fn emulate_media(&self, media: &str) -> Result<(), RenderError> {
        self.page
            .execute(SetEmulatedMediaParams::builder().media(media).build())
            .await
            .map_err(|e| RenderError::RenderError(format!("failed to emulate {media} media: {e}")))?;
        Ok(())
    }

    async fn evaluate(&self, expression: &str) -> Result<(), RenderError> {
        self.page
            .evaluate(expression)
            .await
            .map_err(|e| RenderError::RenderError(format!("evaluation failed: {e}")))?;
        Ok(())
    }

    async fn print_pdf(&self, options: &OptionsBag) -> Result<Vec<u8>, RenderError> {
        let params = print_options::pdf_params(options)?;
        self.page
            .pdf(params)
            .await
            .map_err(|e| RenderError::RenderError(format!("print to PDF failed: {e}")))
    }

    async fn capture_screenshot(&self, options: &OptionsBag) -> Result<Vec<u8>, RenderError> {
        let params = print_options::screenshot_params(options)?;
        self.page
            .screenshot(params)
            .await
            .map_err(|e| RenderError::RenderError(format!("screenshot failed: {e}")))
    }
}
