use anyhow::Context;
use clap::Parser;
use html_render_service::{load_config_file, setup_logging, validate_config, Cli, CliRunner, Commands, Config};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    setup_logging(args.verbose)?;

    info!("Starting html-render-service v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args).await?;
    let runner = CliRunner::new(config);

    if let Err(e) = runner.run(args.command).await {
        error!("Application error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

async fn load_config(args: &Cli) -> anyhow::Result<Config> {
    let mut config = match &args.config {
        Some(path) => load_config_file(path)
            .await
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => Config::default(),
    };

    // Override with CLI arguments
    if let Some(port) = args.port {
        config.port = port;
    }

    if let Some(chrome_path) = &args.chrome_path {
        config.chrome_path = Some(chrome_path.clone());
    }

    // `validate` reports problems itself; everything else refuses to start
    if !matches!(args.command, Commands::Validate { .. }) {
        validate_config(&config)?;
    }

    info!("Configuration loaded successfully");
    info!("Provider: {}", config.provider);
    info!("Timeouts: {:?}", config.timeouts);

    Ok(config)
}
