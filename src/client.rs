//! Client for a running render service

use crate::{ArtifactKind, OptionsBag, RenderError, RenderRequest};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_CLIENT_TIMEOUT: Duration = Duration::from_secs(120);

const PDF_MAGIC: &[u8] = b"%PDF";

/// Builds one render request and sends it to `endpoint`.
///
/// The artifact kind is inferred from the endpoint path (`/html-to-image`
/// yields an image, anything else a PDF) unless set with [`RenderClient::kind`].
#[derive(Debug, Clone)]
pub struct RenderClient {
    endpoint: String,
    kind: ArtifactKind,
    timeout: Duration,
    request: RenderRequest,
}

impl RenderClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        let kind = if endpoint.trim_end_matches('/').ends_with("/html-to-image") {
            ArtifactKind::Png
        } else {
            ArtifactKind::Pdf
        };
        Self {
            endpoint,
            kind,
            timeout: DEFAULT_CLIENT_TIMEOUT,
            request: RenderRequest::default(),
        }
    }

    pub fn kind(mut self, kind: ArtifactKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn html(mut self, html: impl Into<String>) -> Self {
        self.request.html = Some(html.into());
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.request.url = Some(url.into());
        self
    }

    pub fn option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.request.options.insert(key.into(), value.into());
        self
    }

    /// Replace the whole options bag.
    pub fn options(mut self, options: OptionsBag) -> Self {
        self.request.options = options;
        self
    }

    pub fn launch_arg(mut self, arg: impl Into<String>) -> Self {
        self.request.launch_args.push(arg.into());
        self
    }

    pub fn launch_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.request.launch_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// The body that `render` will post.
    pub fn request(&self) -> &RenderRequest {
        &self.request
    }

    pub async fn render(&self) -> Result<Vec<u8>, RenderError> {
        let http = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(unreachable_service)?;
        debug!("Posting render request to {}", self.endpoint);

        let response = http
            .post(&self.endpoint)
            .json(&self.request)
            .send()
            .await
            .map_err(unreachable_service)?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(unreachable_service)?.to_vec();

        let valid = match self.kind {
            ArtifactKind::Pdf => bytes.starts_with(PDF_MAGIC),
            ArtifactKind::Png => status.is_success(),
        };
        if !valid {
            return Err(RenderError::InvalidArtifact(
                String::from_utf8_lossy(&bytes).into_owned(),
            ));
        }
        Ok(bytes)
    }

    /// Render and write the artifact to `path`, returning its size.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<usize, RenderError> {
        let bytes = self.render().await?;
        tokio::fs::write(path.as_ref(), &bytes).await?;
        Ok(bytes.len())
    }
}

fn unreachable_service(err: reqwest::Error) -> RenderError {
    RenderError::ServiceUnreachable(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use serde_json::json;

    #[test]
    fn builder_collects_the_request_body() {
        let client = RenderClient::new("http://localhost:3000/html-to-pdf")
            .html("<h1>Report</h1>")
            .option("format", "A4")
            .option("margin", json!({"top": "1cm"}))
            .launch_arg("--lang=fr")
            .launch_arg("--font-render-hinting=none");

        let body = serde_json::to_value(client.request()).unwrap();
        assert_eq!(body["html"], "<h1>Report</h1>");
        assert_eq!(body["options"]["format"], "A4");
        assert_eq!(body["options"]["margin"]["top"], "1cm");
        assert_eq!(body["launch_args"], json!(["--lang=fr", "--font-render-hinting=none"]));
        assert!(body.get("use_wkhtmltopdf").is_none());
    }

    #[test]
    fn options_and_launch_args_can_be_replaced_wholesale() {
        let options = json!({"printBackground": true}).as_object().cloned().unwrap();
        let client = RenderClient::new("http://localhost:3000/html-to-pdf")
            .option("format", "Letter")
            .options(options.clone())
            .launch_arg("--ignored")
            .launch_args(["--a", "--b"]);

        assert_eq!(client.request().options, options);
        assert_eq!(client.request().launch_args, vec!["--a", "--b"]);
    }

    #[test]
    fn kind_follows_the_endpoint() {
        assert_eq!(RenderClient::new("http://h/html-to-image").kind, ArtifactKind::Png);
        assert_eq!(RenderClient::new("http://h/html-to-image/").kind, ArtifactKind::Png);
        assert_eq!(RenderClient::new("http://h/html-to-pdf").kind, ArtifactKind::Pdf);
    }

    async fn spawn_service(status: StatusCode, body: &'static [u8]) -> String {
        let app = axum::Router::new().fallback(move || async move { (status, body) });
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{address}/html-to-pdf")
    }

    #[tokio::test]
    async fn non_pdf_body_is_an_invalid_artifact() {
        let endpoint = spawn_service(StatusCode::INTERNAL_SERVER_ERROR, b"Failed to generate PDF").await;
        let err = RenderClient::new(endpoint).html("<p>x</p>").render().await.unwrap_err();
        assert!(matches!(err, RenderError::InvalidArtifact(body) if body == "Failed to generate PDF"));
    }

    #[tokio::test]
    async fn connection_failure_is_not_a_gateway_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        drop(listener);

        let err = RenderClient::new(format!("http://{address}/html-to-pdf"))
            .html("<p>x</p>")
            .timeout(Duration::from_secs(5))
            .render()
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::ServiceUnreachable(_)), "{err:?}");
    }

    #[tokio::test]
    async fn pdf_is_saved_to_disk() {
        let endpoint = spawn_service(StatusCode::OK, b"%PDF-1.7 body").await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.pdf");

        let written = RenderClient::new(endpoint)
            .html("<p>x</p>")
            .save(&path)
            .await
            .unwrap();

        assert_eq!(written, 13);
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.7 body");
    }
}
