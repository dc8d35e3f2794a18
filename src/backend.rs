//! Render backends: a local headless browser or a remote gateway
//!
//! The dispatcher holds one `Arc<dyn RenderBackend>` chosen from
//! `Config.provider` at startup. Both backends validate the request first, so an
//! invalid request never launches a browser or reaches the network.

use crate::{
    build_launch_args, gateway, run_session, utils, Artifact, ArtifactKind, BrowserLauncher,
    ChromeLauncher, Config, GatewayClient, Metrics, Provider, RenderError, RenderOptions,
    RenderRequest,
};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

#[async_trait]
pub trait RenderBackend: Send + Sync {
    async fn render(&self, request: &RenderRequest, kind: ArtifactKind) -> Result<Artifact, RenderError>;

    fn name(&self) -> &'static str;
}

/// Build the backend selected by `config.provider`.
pub fn build_backend(config: &Config, metrics: Arc<Metrics>) -> Arc<dyn RenderBackend> {
    match config.provider {
        Provider::HtmlToPdf => {
            let launcher = Arc::new(ChromeLauncher::new(config.clone()));
            Arc::new(BrowserBackend::new(launcher, config.clone(), metrics))
        }
        Provider::Gotenberg => Arc::new(GatewayBackend::new(config, metrics)),
    }
}

fn defaults_for(config: &Config, kind: ArtifactKind) -> &crate::OptionsBag {
    match kind {
        ArtifactKind::Pdf => &config.default_pdf_options,
        ArtifactKind::Png => &config.default_image_options,
    }
}

/// One fresh browser per request
pub struct BrowserBackend {
    launcher: Arc<dyn BrowserLauncher>,
    config: Config,
    metrics: Arc<Metrics>,
}

impl BrowserBackend {
    pub fn new(launcher: Arc<dyn BrowserLauncher>, config: Config, metrics: Arc<Metrics>) -> Self {
        Self {
            launcher,
            config,
            metrics,
        }
    }
}

#[async_trait]
impl RenderBackend for BrowserBackend {
    async fn render(&self, request: &RenderRequest, kind: ArtifactKind) -> Result<Artifact, RenderError> {
        let source = request.content_source()?;
        if request.use_wkhtmltopdf.is_some() {
            debug!("Ignoring use_wkhtmltopdf, rendering with the browser");
        }

        let options = RenderOptions::merged(defaults_for(&self.config, kind), &request.options);
        let launch_args = build_launch_args(&request.launch_args);
        debug!(
            "Rendering {} from {} with {} launch args",
            kind.label(),
            utils::describe_source(&source),
            launch_args.len()
        );

        let _active = self.metrics.session_started();
        let start = Instant::now();
        let result = run_session(
            self.launcher.as_ref(),
            launch_args,
            &source,
            kind,
            options.as_bag(),
            &self.config.timeouts,
        )
        .await;
        let elapsed = start.elapsed();
        self.metrics.record_render(kind, elapsed, result.as_ref().map(|_| ()));

        let bytes = result?;
        info!(
            "Rendered {} ({}) in {}",
            kind.label(),
            utils::format_bytes(bytes.len()),
            utils::format_duration(elapsed)
        );
        Ok(Artifact::new(kind, bytes))
    }

    fn name(&self) -> &'static str {
        "html-to-pdf"
    }
}

/// Delegates conversion to a Gotenberg-compatible service
pub struct GatewayBackend {
    client: Result<GatewayClient, RenderError>,
    defaults: Config,
    metrics: Arc<Metrics>,
}

impl GatewayBackend {
    /// A missing or unusable endpoint is reported on every render rather than at startup.
    pub fn new(config: &Config, metrics: Arc<Metrics>) -> Self {
        let client = GatewayClient::new(&config.gateway);
        if let Err(e) = &client {
            warn!("Gateway backend selected but not usable: {}", e);
        }
        Self {
            client,
            defaults: config.clone(),
            metrics,
        }
    }
}

#[async_trait]
impl RenderBackend for GatewayBackend {
    async fn render(&self, request: &RenderRequest, kind: ArtifactKind) -> Result<Artifact, RenderError> {
        let source = request.content_source()?;
        let client = self.client.as_ref().map_err(|e| e.clone())?;

        if !request.launch_args.is_empty() {
            debug!("Gateway renders ignore {} launch args", request.launch_args.len());
        }

        let options = RenderOptions::merged(defaults_for(&self.defaults, kind), &request.options);
        let gateway_request = gateway::translate(options.as_bag(), &source, kind);
        debug!(
            "Forwarding {} render of {} to {}",
            kind.label(),
            utils::describe_source(&source),
            gateway_request.route
        );

        let start = Instant::now();
        let result = client.send(gateway_request).await;
        self.metrics
            .record_render(kind, start.elapsed(), result.as_ref().map(|_| ()));

        Ok(Artifact::new(kind, result?))
    }

    fn name(&self) -> &'static str {
        "gotenberg"
    }
}
