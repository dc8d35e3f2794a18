//! Request and artifact types shared by every backend

use crate::RenderError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Free-form rendering options, interpreted only by the renderer.
pub type OptionsBag = serde_json::Map<String, serde_json::Value>;

/// Body of `POST /html-to-pdf` and `POST /html-to-image`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RenderRequest {
    pub html: Option<String>,
    pub url: Option<String>,
    #[serde(deserialize_with = "options_or_empty")]
    pub options: OptionsBag,
    #[serde(deserialize_with = "launch_args_or_empty")]
    pub launch_args: Vec<String>,
    /// Accepted for compatibility with older clients; has no effect.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_wkhtmltopdf: Option<bool>,
}

/// The validated input of a render: inline markup or a page to navigate to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentSource {
    Html(String),
    Url(String),
}

impl RenderRequest {
    pub fn from_html(html: impl Into<String>) -> Self {
        Self {
            html: Some(html.into()),
            ..Default::default()
        }
    }

    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Default::default()
        }
    }

    /// Resolve the html/url pair into exactly one content source.
    ///
    /// Empty strings count as absent. Supplying both is rejected rather than
    /// silently preferring one of them.
    pub fn content_source(&self) -> Result<ContentSource, RenderError> {
        let html = self.html.as_deref().filter(|s| !s.is_empty());
        let url = self.url.as_deref().filter(|s| !s.trim().is_empty());

        match (html, url) {
            (Some(html), None) => Ok(ContentSource::Html(html.to_string())),
            (None, Some(url)) => Ok(ContentSource::Url(url.trim().to_string())),
            (None, None) => Err(RenderError::InvalidRequest(
                MISSING_CONTENT_MESSAGE.to_string(),
            )),
            (Some(_), Some(_)) => Err(RenderError::InvalidRequest(
                AMBIGUOUS_CONTENT_MESSAGE.to_string(),
            )),
        }
    }
}

/// An options object, with `null` and `[]` standing in for "no options".
///
/// Clients serializing an empty dictionary as a list send `"options": []`.
fn options_or_empty<'de, D>(deserializer: D) -> Result<OptionsBag, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(OptionsBag::new()),
        Value::Array(items) if items.is_empty() => Ok(OptionsBag::new()),
        other => Err(serde::de::Error::invalid_type(
            unexpected(&other),
            &"an options object",
        )),
    }
}

fn launch_args_or_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

fn unexpected(value: &Value) -> serde::de::Unexpected<'_> {
    use serde::de::Unexpected;
    match value {
        Value::Null => Unexpected::Unit,
        Value::Bool(b) => Unexpected::Bool(*b),
        Value::Number(_) => Unexpected::Other("number"),
        Value::String(s) => Unexpected::Str(s),
        Value::Array(_) => Unexpected::Seq,
        Value::Object(_) => Unexpected::Map,
    }
}

pub const MISSING_CONTENT_MESSAGE: &str = "No HTML content or URL provided";
pub const AMBIGUOUS_CONTENT_MESSAGE: &str = "Provide either HTML content or a URL, not both";

/// The two artifact flavours the service produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Pdf,
    Png,
}

impl ArtifactKind {
    pub fn content_type(&self) -> &'static str {
        match self {
            ArtifactKind::Pdf => "application/pdf",
            ArtifactKind::Png => "image/png",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ArtifactKind::Pdf => "pdf",
            ArtifactKind::Png => "image",
        }
    }

    /// Message sent to the caller when rendering fails.
    pub fn failure_message(&self) -> &'static str {
        match self {
            ArtifactKind::Pdf => "Failed to generate PDF",
            ArtifactKind::Png => "Failed to generate image",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub bytes: Vec<u8>,
}

impl Artifact {
    pub fn new(kind: ArtifactKind, bytes: Vec<u8>) -> Self {
        Self { kind, bytes }
    }

    pub fn content_type(&self) -> &'static str {
        self.kind.content_type()
    }
}

/// Per-request options: configured defaults overlaid with the caller's keys
///
/// Built once and never mutated afterwards. Collisions are resolved per top-level
/// key, the caller's value replacing the default wholesale.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderOptions {
    values: OptionsBag,
}

impl RenderOptions {
    pub fn merged(defaults: &OptionsBag, overrides: &OptionsBag) -> Self {
        let mut values = defaults.clone();
        for (key, value) in overrides {
            values.insert(key.clone(), value.clone());
        }
        Self { values }
    }

    pub fn as_bag(&self) -> &OptionsBag {
        &self.values
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.values.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_html_and_url_is_invalid() {
        let err = RenderRequest::default().content_source().unwrap_err();
        assert!(matches!(err, RenderError::InvalidRequest(msg) if msg == MISSING_CONTENT_MESSAGE));

        let blank = RenderRequest {
            html: Some(String::new()),
            url: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(blank.content_source().is_err());
    }

    #[test]
    fn both_html_and_url_is_rejected() {
        let request = RenderRequest {
            html: Some("<p>hi</p>".to_string()),
            url: Some("https://example.com".to_string()),
            ..Default::default()
        };
        let err = request.content_source().unwrap_err();
        assert!(matches!(err, RenderError::InvalidRequest(msg) if msg == AMBIGUOUS_CONTENT_MESSAGE));
    }

    #[test]
    fn single_source_is_resolved() {
        assert_eq!(
            RenderRequest::from_html("<p>hi</p>").content_source().unwrap(),
            ContentSource::Html("<p>hi</p>".to_string())
        );
        assert_eq!(
            RenderRequest::from_url(" https://example.com ").content_source().unwrap(),
            ContentSource::Url("https://example.com".to_string())
        );
    }

    #[test]
    fn request_body_uses_snake_case_wire_names() {
        let request: RenderRequest = serde_json::from_value(json!({
            "html": "<p>x</p>",
            "options": {"format": "A4"},
            "launch_args": ["--lang=de"],
            "use_wkhtmltopdf": true
        }))
        .unwrap();

        assert_eq!(request.launch_args, vec!["--lang=de".to_string()]);
        assert_eq!(request.options["format"], json!("A4"));
        assert_eq!(request.use_wkhtmltopdf, Some(true));
        assert!(request.url.is_none());
    }

    #[test]
    fn empty_list_and_null_options_mean_no_options() {
        let listed: RenderRequest =
            serde_json::from_str(r#"{"html":"<p>x</p>","options":[],"launch_args":[]}"#).unwrap();
        assert!(listed.options.is_empty());
        assert!(listed.launch_args.is_empty());

        let nulls: RenderRequest =
            serde_json::from_str(r#"{"url":"https://example.com","options":null,"launch_args":null}"#)
                .unwrap();
        assert!(nulls.options.is_empty());
        assert!(nulls.launch_args.is_empty());
    }

    #[test]
    fn non_empty_lists_and_scalars_are_not_options() {
        assert!(serde_json::from_str::<RenderRequest>(r#"{"options":["format"]}"#).is_err());
        assert!(serde_json::from_str::<RenderRequest>(r#"{"options":"A4"}"#).is_err());
    }

    #[test]
    fn caller_options_override_defaults_per_key() {
        let defaults = json!({"format": "A4", "printBackground": true, "margin": {"top": "1cm"}});
        let overrides = json!({"format": "Letter", "margin": {"left": "2cm"}});

        let options = RenderOptions::merged(
            defaults.as_object().unwrap(),
            overrides.as_object().unwrap(),
        );

        assert_eq!(options.get("format"), Some(&json!("Letter")));
        assert_eq!(options.get("printBackground"), Some(&json!(true)));
        assert_eq!(options.get("margin"), Some(&json!({"left": "2cm"})));
    }

    #[test]
    fn artifact_kinds_declare_content_types() {
        assert_eq!(ArtifactKind::Pdf.content_type(), "application/pdf");
        assert_eq!(ArtifactKind::Png.content_type(), "image/png");
        assert_eq!(ArtifactKind::Png.failure_message(), "Failed to generate image");
    }
}
