use crate::{
    build_backend, install_prometheus, serve, utils, validate_config, AppState, ArtifactKind,
    Config, Metrics, Provider, RenderClient,
};
use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "html-render-service")]
#[command(about = "Render HTML documents and web pages to PDF or PNG")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, help = "Configuration file path")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Chrome executable path")]
    pub chrome_path: Option<String>,

    #[arg(long, global = true, help = "Service port")]
    pub port: Option<u16>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP render service
    Serve {
        #[arg(long, help = "Bind address")]
        bind: Option<String>,

        #[arg(long, help = "Rendering provider (html-to-pdf, gotenberg)")]
        provider: Option<String>,

        #[arg(long, help = "Gotenberg base URL")]
        gateway_url: Option<String>,

        #[arg(long, help = "Expose Prometheus metrics on /metrics")]
        metrics: bool,
    },

    /// Render one document through a running service
    Render {
        #[arg(long, conflicts_with = "url", help = "HTML file to render")]
        html_file: Option<PathBuf>,

        #[arg(long, help = "URL to render")]
        url: Option<String>,

        #[arg(short, long, help = "Output file path")]
        output: Option<PathBuf>,

        #[arg(long, help = "Produce a PNG instead of a PDF")]
        image: bool,

        #[arg(long, help = "Service endpoint (defaults to the local service)")]
        endpoint: Option<String>,

        #[arg(long = "option", value_parser = parse_option, help = "Render option as key=value; JSON values allowed")]
        options: Vec<(String, Value)>,

        #[arg(long = "launch-arg", allow_hyphen_values = true, help = "Extra browser launch argument")]
        launch_args: Vec<String>,
    },

    /// Validate configuration
    Validate {
        #[arg(help = "Configuration file to validate (defaults to --config)")]
        file: Option<PathBuf>,
    },
}

/// Parse `key=value`; the value is taken as JSON when it parses, as a string otherwise.
pub fn parse_option(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{raw}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing option name in `{raw}`"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

pub struct CliRunner {
    pub config: Config,
}

impl CliRunner {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub async fn run(self, command: Commands) -> anyhow::Result<()> {
        match command {
            Commands::Serve {
                bind,
                provider,
                gateway_url,
                metrics,
            } => {
                let mut config = self.config;
                if let Some(bind) = bind {
                    config.bind_address = bind;
                }
                if let Some(provider) = provider {
                    config.provider = provider.parse()?;
                }
                if let Some(gateway_url) = gateway_url {
                    config.gateway.url = Some(gateway_url);
                }
                config.metrics_enabled |= metrics;
                validate_config(&config)?;
                run_server(config).await
            }
            Commands::Render {
                html_file,
                url,
                output,
                image,
                endpoint,
                options,
                launch_args,
            } => {
                let kind = if image { ArtifactKind::Png } else { ArtifactKind::Pdf };
                let endpoint = endpoint.unwrap_or_else(|| local_endpoint(&self.config, kind));

                let mut client = RenderClient::new(endpoint).kind(kind).launch_args(launch_args);
                client = match (html_file, url) {
                    (Some(path), _) => {
                        let html = tokio::fs::read_to_string(&path)
                            .await
                            .with_context(|| format!("reading {}", path.display()))?;
                        client.html(html)
                    }
                    (None, Some(url)) => client.url(url),
                    (None, None) => bail!("pass --html-file or --url"),
                };
                for (key, value) in options {
                    client = client.option(key, value);
                }

                let output =
                    output.unwrap_or_else(|| PathBuf::from(utils::default_output_name(kind)));
                let written = client.save(&output).await?;
                info!("Wrote {} to {}", utils::format_bytes(written), output.display());
                Ok(())
            }
            Commands::Validate { file } => {
                let config = match file {
                    Some(path) => crate::load_config_file(&path)
                        .await
                        .with_context(|| format!("loading {}", path.display()))?,
                    None => self.config,
                };
                validate_config(&config)?;
                println!("Configuration is valid");
                println!("  listen:   {}", config.socket_address());
                println!("  provider: {}", config.provider);
                if config.provider == Provider::Gotenberg {
                    println!(
                        "  gateway:  {}",
                        config.gateway.url.as_deref().unwrap_or("<not configured>")
                    );
                }
                println!("  metrics:  {}", config.metrics_enabled);
                Ok(())
            }
        }
    }
}

fn local_endpoint(config: &Config, kind: ArtifactKind) -> String {
    let path = match kind {
        ArtifactKind::Pdf => "html-to-pdf",
        ArtifactKind::Png => "html-to-image",
    };
    format!("http://127.0.0.1:{}/{}", config.port, path)
}

async fn run_server(config: Config) -> anyhow::Result<()> {
    // The recorder must exist before any instrument is registered
    let prometheus = if config.metrics_enabled {
        Some(install_prometheus()?)
    } else {
        None
    };
    let metrics = Arc::new(Metrics::new());
    let backend = build_backend(&config, metrics);

    let mut state = AppState::new(backend);
    if let Some(handle) = prometheus {
        state = state.with_prometheus(handle);
    }

    serve(&config, state, shutdown_signal()).await?;
    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for SIGINT: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to create SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

pub fn setup_logging(verbose: bool) -> anyhow::Result<()> {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install log subscriber: {e}"))?;

    Ok(())
}
