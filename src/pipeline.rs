//! Page-level steps of a browser render
//!
//! Each step drives an open page one stage further: content loading, readiness,
//! then export. The steps never own the browser; `RenderSession` does.

use crate::{ArtifactKind, ContentSource, OptionsBag, RenderError, RenderPage, Timeouts};
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

/// Media type applied before every capture, so print stylesheets take effect.
pub const CAPTURE_MEDIA: &str = "print";

/// Resolves once every font face in the document has loaded.
pub const FONTS_READY_EXPRESSION: &str = "document.fonts.ready.then(() => true)";

/// Load the request's content into the page.
///
/// URLs are navigated with a network-idle wait; inline HTML only waits for DOM
/// content loaded, bounded by `timeouts.content_load`.
pub async fn load_content(
    page: &dyn RenderPage,
    source: &ContentSource,
    timeouts: &Timeouts,
) -> Result<(), RenderError> {
    match source {
        ContentSource::Url(url) => {
            debug!("Navigating to {}", url);
            bounded(timeouts.navigation, page.navigate(url), || {
                RenderError::NavigationError(format!(
                    "{url}: network did not become idle within {:?}",
                    timeouts.navigation
                ))
            })
            .await
        }
        ContentSource::Html(html) => {
            debug!("Injecting {} bytes of HTML", html.len());
            bounded(timeouts.content_load, page.set_content(html), || {
                RenderError::ContentLoadTimeout(timeouts.content_load)
            })
            .await
        }
    }
}

/// Bring a loaded page to a capturable state: print media, fonts loaded.
pub async fn await_ready(page: &dyn RenderPage, timeouts: &Timeouts) -> Result<(), RenderError> {
    page.emulate_media(CAPTURE_MEDIA).await?;

    bounded(
        timeouts.font_ready,
        page.evaluate(FONTS_READY_EXPRESSION),
        || RenderError::RenderError(format!("fonts not ready within {:?}", timeouts.font_ready)),
    )
    .await
}

/// Export the page; `options` reach the renderer untouched.
pub async fn produce_artifact(
    page: &dyn RenderPage,
    kind: ArtifactKind,
    options: &OptionsBag,
) -> Result<Vec<u8>, RenderError> {
    match kind {
        ArtifactKind::Pdf => page.print_pdf(options).await,
        ArtifactKind::Png => page.capture_screenshot(options).await,
    }
}

async fn bounded<F>(
    limit: Duration,
    step: F,
    on_timeout: impl FnOnce() -> RenderError,
) -> Result<(), RenderError>
where
    F: Future<Output = Result<(), RenderError>>,
{
    match timeout(limit, step).await {
        Ok(result) => result,
        Err(_) => Err(on_timeout()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::MockRenderPage;
    use mockall::predicate::eq;
    use mockall::Sequence;
    use serde_json::json;

    fn short_timeouts() -> Timeouts {
        Timeouts {
            content_load: Duration::from_millis(50),
            navigation: Duration::from_millis(50),
            font_ready: Duration::from_millis(50),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn html_is_injected_without_navigation() {
        let mut page = MockRenderPage::new();
        page.expect_set_content()
            .with(eq("<p>Hi</p>"))
            .times(1)
            .returning(|_| Ok(()));
        page.expect_navigate().never();

        let source = ContentSource::Html("<p>Hi</p>".to_string());
        load_content(&page, &source, &Timeouts::default()).await.unwrap();
    }

    #[tokio::test]
    async fn url_is_navigated() {
        let mut page = MockRenderPage::new();
        page.expect_navigate()
            .with(eq("https://example.com"))
            .times(1)
            .returning(|_| Ok(()));
        page.expect_set_content().never();

        let source = ContentSource::Url("https://example.com".to_string());
        load_content(&page, &source, &Timeouts::default()).await.unwrap();
    }

    #[tokio::test]
    async fn navigation_failures_surface_unchanged() {
        let mut page = MockRenderPage::new();
        page.expect_navigate()
            .returning(|_| Err(RenderError::NavigationError("net::ERR_NAME_NOT_RESOLVED".into())));

        let source = ContentSource::Url("https://nowhere.invalid".to_string());
        let err = load_content(&page, &source, &Timeouts::default()).await.unwrap_err();
        assert!(matches!(err, RenderError::NavigationError(msg) if msg.contains("NAME_NOT_RESOLVED")));
    }

    /// A page whose content never finishes loading.
    struct StalledPage;

    #[async_trait::async_trait]
    impl RenderPage for StalledPage {
        async fn navigate(&self, _url: &str) -> Result<(), RenderError> {
            futures::future::pending().await
        }
        async fn set_content(&self, _html: &str) -> Result<(), RenderError> {
            futures::future::pending().await
        }
        async fn emulate_media(&self, _media: &str) -> Result<(), RenderError> {
            Ok(())
        }
        async fn evaluate(&self, _expression: &str) -> Result<(), RenderError> {
            futures::future::pending().await
        }
        async fn print_pdf(&self, _options: &OptionsBag) -> Result<Vec<u8>, RenderError> {
            Ok(Vec::new())
        }
        async fn capture_screenshot(&self, _options: &OptionsBag) -> Result<Vec<u8>, RenderError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn stalled_html_injection_times_out() {
        let timeouts = short_timeouts();
        let source = ContentSource::Html("<p>never</p>".to_string());

        let err = load_content(&StalledPage, &source, &timeouts).await.unwrap_err();
        assert!(matches!(err, RenderError::ContentLoadTimeout(d) if d == timeouts.content_load));
    }

    #[tokio::test]
    async fn stalled_navigation_and_fonts_are_bounded() {
        let timeouts = short_timeouts();

        let source = ContentSource::Url("https://example.com".to_string());
        let err = load_content(&StalledPage, &source, &timeouts).await.unwrap_err();
        assert!(matches!(err, RenderError::NavigationError(_)));

        let err = await_ready(&StalledPage, &timeouts).await.unwrap_err();
        assert!(matches!(err, RenderError::RenderError(msg) if msg.contains("fonts")));
    }

    #[tokio::test]
    async fn readiness_emulates_print_before_waiting_for_fonts() {
        let mut page = MockRenderPage::new();
        let mut seq = Sequence::new();
        page.expect_emulate_media()
            .with(eq("print"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        page.expect_evaluate()
            .with(eq(FONTS_READY_EXPRESSION))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        await_ready(&page, &Timeouts::default()).await.unwrap();
    }

    #[tokio::test]
    async fn evaluation_failure_is_a_render_error() {
        let mut page = MockRenderPage::new();
        page.expect_emulate_media().returning(|_| Ok(()));
        page.expect_evaluate()
            .returning(|_| Err(RenderError::RenderError("ReferenceError: document".into())));

        let err = await_ready(&page, &Timeouts::default()).await.unwrap_err();
        assert!(matches!(err, RenderError::RenderError(_)));
    }

    #[tokio::test]
    async fn options_are_passed_through_to_the_exporter() {
        let options = json!({"format": "A4", "whatever": [1, 2]})
            .as_object()
            .cloned()
            .unwrap();
        let expected = options.clone();

        let mut page = MockRenderPage::new();
        page.expect_print_pdf()
            .withf(move |opts| *opts == expected)
            .times(1)
            .returning(|_| Ok(b"%PDF-1.4".to_vec()));
        page.expect_capture_screenshot().never();

        let bytes = produce_artifact(&page, ArtifactKind::Pdf, &options).await.unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn image_kind_uses_screen_capture() {
        let mut page = MockRenderPage::new();
        page.expect_capture_screenshot()
            .times(1)
            .returning(|_| Ok(vec![0x89, b'P', b'N', b'G']));
        page.expect_print_pdf().never();

        let bytes = produce_artifact(&page, ArtifactKind::Png, &OptionsBag::new())
            .await
            .unwrap();
        assert_eq!(&bytes[1..4], b"PNG");
    }
}
