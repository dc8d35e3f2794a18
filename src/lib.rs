//! # HTML Render Service
//!
//! An HTTP service that turns HTML documents or web pages into PDF files and PNG
//! images. Every request gets its own short-lived headless Chrome process, driven
//! over the DevTools protocol, which is torn down once the artifact has been
//! produced, on failure and on client disconnect alike. Alternatively the
//! service forwards requests to a Gotenberg-compatible conversion gateway.
//!
//! ## Endpoints
//!
//! | Method | Path | Body | Success |
//! |--------|------|------|---------|
//! | `POST` | `/html-to-pdf` | `{html?, url?, options?, launch_args?}` | `200 application/pdf` |
//! | `POST` | `/html-to-image` | `{html?, url?, options?, launch_args?}` | `200 image/png` |
//! | `GET` | `/health` | | `200 ok` |
//! | `GET` | `/metrics` | | Prometheus text (when enabled) |
//!
//! Exactly one of `html` and `url` must be given; anything else is a `400`.
//! Render failures answer `500` with a fixed message, details go to the log.
//!
//! ## Render Pipeline
//!
//! | Stage | Browser backend | Bound |
//! |-------|-----------------|-------|
//! | Launch | fresh Chrome with the baseline flags plus `launch_args` | |
//! | Load | `document.write` for HTML, navigation for URLs | 60 s / 30 s |
//! | Ready | print media emulation, `document.fonts.ready` | 30 s |
//! | Export | `Page.printToPDF` or `Page.captureScreenshot` | |
//! | Teardown | close, wait for exit, remove profile dir | always |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use html_render_service::{ArtifactKind, RenderClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pdf = RenderClient::new("http://localhost:3000/html-to-pdf")
//!         .html("<h1>Invoice #42</h1>")
//!         .option("format", "A4")
//!         .option("printBackground", true)
//!         .render()
//!         .await?;
//!     println!("Rendered {} bytes", pdf.len());
//!
//!     RenderClient::new("http://localhost:3000/html-to-image")
//!         .url("https://example.com")
//!         .kind(ArtifactKind::Png)
//!         .save("example.png")
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! ## CLI Usage
//!
//! ```bash
//! html-render-service serve --port 3000 --metrics
//! html-render-service render --url https://example.com --option format=Letter -o page.pdf
//! html-render-service validate config.json
//! ```

/// Configuration, launch arguments and browser settings
pub mod config;

/// Error types and error handling utilities
pub mod error;

/// Request, artifact and option types
pub mod request;

/// Named paper formats
pub mod paper;

/// Browser process and page abstractions with the Chrome implementation
pub mod browser;

/// Translation of options into DevTools print and screenshot parameters
pub mod print_options;

/// Content loading, readiness and export steps
pub mod pipeline;

/// Per-request browser session lifecycle
pub mod session;

/// Remote gateway translation and client
pub mod gateway;

/// Browser and gateway render backends
pub mod backend;

/// HTTP routes and server
pub mod server;

/// Client for a running render service
pub mod client;

/// Command-line interface implementation
pub mod cli;

/// Render metrics and the Prometheus exporter
pub mod metrics;

/// Utility functions and helpers
pub mod utils;

#[cfg(test)]
mod testing;


pub use backend::*;
pub use browser::*;
pub use cli::*;
pub use client::*;
pub use config::*;
pub use error::*;
pub use gateway::{Attachment, GatewayClient, GatewayRequest};
pub use self::metrics::{install_prometheus, ActiveSession, Metrics};
pub use request::*;
pub use server::*;
pub use session::*;
pub use utils::*;
