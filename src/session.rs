//! Lifecycle of the single browser owned by one render request
//!
//! A `RenderSession` is created by launching a browser and is consumed by
//! `close`. If the owning future is dropped before that (client disconnect,
//! task abort), `Drop` schedules the teardown instead, so a launched browser is
//! always torn down exactly once.

use crate::{
    pipeline, ArtifactKind, BrowserLauncher, BrowserProcess, ContentSource, OptionsBag,
    RenderError, RenderPage, Timeouts,
};
use tracing::{debug, error, warn};

/// Where a session is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Launched,
    PageOpen,
    ContentLoaded,
    Ready,
    ArtifactProduced,
    Closed,
    Failed,
}

pub struct RenderSession {
    browser: Option<Box<dyn BrowserProcess>>,
    page: Option<Box<dyn RenderPage>>,
    state: SessionState,
}

impl RenderSession {
    /// Launch a browser for this session.
    ///
    /// A failed launch leaves nothing to tear down; the launcher cleans up after itself.
    pub async fn launch(
        launcher: &dyn BrowserLauncher,
        launch_args: Vec<String>,
    ) -> Result<Self, RenderError> {
        let browser = launcher.launch(launch_args).await?;
        debug!("Session launched browser {}", browser.id());

        Ok(Self {
            browser: Some(browser),
            page: None,
            state: SessionState::Launched,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn browser_id(&self) -> Option<&str> {
        self.browser.as_ref().map(|browser| browser.id())
    }

    /// Drive the session from `Launched` to `ArtifactProduced`.
    pub async fn render(
        &mut self,
        source: &ContentSource,
        kind: ArtifactKind,
        options: &OptionsBag,
        timeouts: &Timeouts,
    ) -> Result<Vec<u8>, RenderError> {
        let result = self.advance(source, kind, options, timeouts).await;
        if result.is_err() {
            self.state = SessionState::Failed;
        }
        result
    }

    async fn advance(
        &mut self,
        source: &ContentSource,
        kind: ArtifactKind,
        options: &OptionsBag,
        timeouts: &Timeouts,
    ) -> Result<Vec<u8>, RenderError> {
        if self.state != SessionState::Launched {
            return Err(RenderError::RenderError(format!(
                "session cannot render from state {:?}",
                self.state
            )));
        }

        let browser = self
            .browser
            .as_mut()
            .ok_or_else(|| RenderError::RenderError("browser already released".into()))?;
        let page: &dyn RenderPage = &**self.page.insert(browser.new_page().await?);
        self.state = SessionState::PageOpen;

        pipeline::load_content(page, source, timeouts).await?;
        self.state = SessionState::ContentLoaded;

        pipeline::await_ready(page, timeouts).await?;
        self.state = SessionState::Ready;

        let bytes = pipeline::produce_artifact(page, kind, options).await?;
        self.state = SessionState::ArtifactProduced;

        Ok(bytes)
    }

    /// Tear the browser down. Consumes the session, so it runs at most once.
    pub async fn close(mut self) {
        self.page.take();
        if let Some(mut browser) = self.browser.take() {
            debug!("Closing browser {} from state {:?}", browser.id(), self.state);
            browser.close().await;
        }
        self.state = SessionState::Closed;
    }
}

impl Drop for RenderSession {
    fn drop(&mut self) {
        let Some(mut browser) = self.browser.take() else {
            return;
        };
        self.page.take();

        warn!(
            "Render session for browser {} dropped in state {:?}, closing in background",
            browser.id(),
            self.state
        );
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    browser.close().await;
                });
            }
            Err(_) => error!(
                "No async runtime to close browser {}; the process is killed on drop",
                browser.id()
            ),
        }
    }
}

/// Run one complete browser render: launch, render, teardown.
pub async fn run_session(
    launcher: &dyn BrowserLauncher,
    launch_args: Vec<String>,
    source: &ContentSource,
    kind: ArtifactKind,
    options: &OptionsBag,
    timeouts: &Timeouts,
) -> Result<Vec<u8>, RenderError> {
    let mut session = RenderSession::launch(launcher, launch_args).await?;
    let result = session.render(source, kind, options, timeouts).await;
    if let Err(e) = &result {
        debug!("Session failed in state {:?}: {}", session.state(), e);
    }
    session.close().await;
    result
}
