//! In-process stand-ins for the browser, used by unit and router tests

use crate::{BrowserLauncher, BrowserProcess, OptionsBag, RenderError, RenderPage};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const FAKE_PDF: &[u8] = b"%PDF-1.7\n%fake\n";
pub const FAKE_PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

/// Where the fake browser should break, if anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Failure {
    #[default]
    None,
    Launch,
    PageCreation,
    Navigation,
    Evaluation,
    Export,
    /// Content loading never completes.
    Stall,
}

#[derive(Debug, Default)]
pub struct Counters {
    pub launched: AtomicUsize,
    pub closed: AtomicUsize,
    pub pages: AtomicUsize,
    pub last_launch_args: std::sync::Mutex<Vec<String>>,
}

impl Counters {
    pub fn launched(&self) -> usize {
        self.launched.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    /// Processes launched but not yet torn down.
    pub fn alive(&self) -> usize {
        self.launched() - self.closed()
    }
}

#[derive(Clone, Default)]
pub struct FakeLauncher {
    pub counters: Arc<Counters>,
    pub failure: Failure,
}

impl FakeLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(failure: Failure) -> Self {
        Self {
            failure,
            ..Default::default()
        }
    }
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    async fn launch(
        &self,
        launch_args: Vec<String>,
    ) -> Result<Box<dyn BrowserProcess>, RenderError> {
        if self.failure == Failure::Launch {
            return Err(RenderError::LaunchError("chrome binary not found".into()));
        }
        let number = self.counters.launched.fetch_add(1, Ordering::SeqCst);
        *self.counters.last_launch_args.lock().unwrap() = launch_args;
        Ok(Box::new(FakeProcess {
            id: format!("fake-{number}"),
            counters: self.counters.clone(),
            failure: self.failure,
        }))
    }
}

struct FakeProcess {
    id: String,
    counters: Arc<Counters>,
    failure: Failure,
}

#[async_trait]
impl BrowserProcess for FakeProcess {
    fn id(&self) -> &str {
        &self.id
    }

    async fn new_page(&mut self) -> Result<Box<dyn RenderPage>, RenderError> {
        if self.failure == Failure::PageCreation {
            return Err(RenderError::PageCreationError("target crashed".into()));
        }
        self.counters.pages.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakePage {
            failure: self.failure,
        }))
    }

    async fn close(&mut self) {
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
    }
}

struct FakePage {
    failure: Failure,
}

impl FakePage {
    async fn load(&self) -> Result<(), RenderError> {
        match self.failure {
            Failure::Stall => futures::future::pending().await,
            Failure::Navigation => Err(RenderError::NavigationError(
                "net::ERR_NAME_NOT_RESOLVED".into(),
            )),
            _ => Ok(()),
        }
    }

    fn export(&self, bytes: &[u8]) -> Result<Vec<u8>, RenderError> {
        if self.failure == Failure::Export {
            return Err(RenderError::RenderError("Printing failed".into()));
        }
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl RenderPage for FakePage {
    async fn navigate(&self, _url: &str) -> Result<(), RenderError> {
        self.load().await
    }

    async fn set_content(&self, _html: &str) -> Result<(), RenderError> {
        self.load().await
    }

    async fn emulate_media(&self, _media: &str) -> Result<(), RenderError> {
        Ok(())
    }

    async fn evaluate(&self, _expression: &str) -> Result<(), RenderError> {
        if self.failure == Failure::Evaluation {
            return Err(RenderError::RenderError("TypeError: document.fonts is undefined".into()));
        }
        Ok(())
    }

    async fn print_pdf(&self, _options: &OptionsBag) -> Result<Vec<u8>, RenderError> {
        self.export(FAKE_PDF)
    }

    async fn capture_screenshot(&self, _options: &OptionsBag) -> Result<Vec<u8>, RenderError> {
        self.export(FAKE_PNG)
    }
}
