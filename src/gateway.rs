//! Remote rendering through a Gotenberg-compatible gateway
//!
//! `translate` maps an options bag onto the gateway's multipart form fields; it
//! is pure and does no I/O. `GatewayClient` performs the actual call.

use crate::{paper, ArtifactKind, ContentSource, GatewaySettings, OptionsBag, RenderError};
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

const MARGIN_SIDES: [(&str, &str); 4] = [
    ("top", "marginTop"),
    ("bottom", "marginBottom"),
    ("left", "marginLeft"),
    ("right", "marginRight"),
];

const PASSTHROUGH_FIELDS: [&str; 3] = ["waitForExpression", "preferCssPageSize", "waitDelay"];

/// One gateway call, ready to be sent
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayRequest {
    pub route: String,
    pub fields: Vec<(String, String)>,
    pub attachment: Attachment,
}

/// How the content reaches the gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attachment {
    /// Uploaded as the `index.html` file part.
    IndexHtml(String),
    /// Sent as the `url` form field.
    Url(String),
}

impl GatewayRequest {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn into_form(self) -> Result<Form, RenderError> {
        let mut form = Form::new();
        for (name, value) in self.fields {
            form = form.text(name, value);
        }
        Ok(match self.attachment {
            Attachment::IndexHtml(html) => {
                let part = Part::text(html)
                    .file_name("index.html")
                    .mime_str("text/html")?;
                form.part("files", part)
            }
            Attachment::Url(url) => form.text("url", url),
        })
    }
}

/// Map a render onto the gateway protocol.
///
/// Page layout fields (paper, margins, orientation, backgrounds) only apply to
/// PDF conversion; screenshots get the emulation and wait fields plus `format=png`.
pub fn translate(options: &OptionsBag, source: &ContentSource, kind: ArtifactKind) -> GatewayRequest {
    let (attachment, mode) = match source {
        ContentSource::Html(html) => (Attachment::IndexHtml(html.clone()), "html"),
        ContentSource::Url(url) => (Attachment::Url(url.clone()), "url"),
    };

    let route = match kind {
        ArtifactKind::Pdf => format!("/forms/chromium/convert/{mode}"),
        ArtifactKind::Png => format!("/forms/chromium/screenshot/{mode}"),
    };

    let mut fields = Vec::new();
    let mut push = |name: &str, value: String| fields.push((name.to_string(), value));

    if kind == ArtifactKind::Pdf {
        if options.get("printBackground").is_some_and(truthy) {
            push("printBackground", "true".to_string());
        }
        if options.get("orientation").and_then(Value::as_str) == Some("landscape") {
            push("landscape", "true".to_string());
        }
        if let Some(margin) = options.get("margin").and_then(Value::as_object) {
            for (side, field) in MARGIN_SIDES {
                let value = margin
                    .get(side)
                    .map(field_text)
                    .unwrap_or_else(|| "0".to_string());
                push(field, value);
            }
        }
        let (width, height) = paper::size_for(options.get("format").and_then(Value::as_str));
        push("paperWidth", width.to_string());
        push("paperHeight", height.to_string());
    }

    if let Some(idle) = options.get("networkIdleEvent") {
        let skip = !truthy(idle);
        push("skipNetworkIdleEvent", skip.to_string());
    }

    for name in PASSTHROUGH_FIELDS {
        if let Some(value) = options.get(name) {
            push(name, field_text(value));
        }
    }

    let media = match options.get("emulatedMediaType").and_then(Value::as_str) {
        Some("screen") => "screen",
        _ => "print",
    };
    push("emulatedMediaType", media.to_string());

    if kind == ArtifactKind::Png {
        push("format", "png".to_string());
    }

    GatewayRequest {
        route,
        fields,
        attachment,
    }
}

/// JavaScript-style truthiness for option values.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn field_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// HTTP client for the gateway, one per backend
#[derive(Clone)]
pub struct GatewayClient {
    base_url: Url,
    http: reqwest::Client,
}

impl GatewayClient {
    /// Build a client for the configured gateway.
    ///
    /// Fails with `RemoteGatewayUnavailable` when no endpoint is configured.
    pub fn new(settings: &GatewaySettings) -> Result<Self, RenderError> {
        let raw = settings
            .url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| {
                RenderError::RemoteGatewayUnavailable("no gateway url configured".to_string())
            })?;

        // Without a trailing slash `join` would drop the last path segment of the base
        let normalized = format!("{}/", raw.trim_end_matches('/'));
        let base_url = Url::parse(&normalized).map_err(|e| {
            RenderError::ConfigurationError(format!("invalid gateway url `{raw}`: {e}"))
        })?;

        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| RenderError::RemoteGatewayUnavailable(e.to_string()))?;

        Ok(Self { base_url, http })
    }

    pub fn endpoint(&self, route: &str) -> Result<Url, RenderError> {
        self.base_url
            .join(route.trim_start_matches('/'))
            .map_err(|e| RenderError::ConfigurationError(format!("invalid gateway route `{route}`: {e}")))
    }

    /// Send the request and return the converted document.
    pub async fn send(&self, request: GatewayRequest) -> Result<Vec<u8>, RenderError> {
        let endpoint = self.endpoint(&request.route)?;
        debug!("Posting {} form fields to {}", request.fields.len(), endpoint);

        let response = self
            .http
            .post(endpoint.clone())
            .multipart(request.into_form()?)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Gateway {} answered {}: {}", endpoint, status, body);
            return Err(RenderError::RemoteGatewayError(format!("status {status} body {body}")));
        }

        Ok(response.bytes().await?.to_vec())
    }
}
