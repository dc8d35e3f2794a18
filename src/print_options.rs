//! Interpretation of the options bag by the Chrome driver
//!
//! Option names follow the familiar headless-browser automation vocabulary
//! (`format`, `margin`, `printBackground`, `fullPage`, `clip`, ...). Unknown keys
//! are ignored; known keys with values of the wrong shape are rejected.

use crate::{paper, OptionsBag, RenderError};
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, PrintToPdfParams, Viewport as ClipRegion,
};
use chromiumoxide::page::ScreenshotParams;
use serde_json::Value;

const CSS_PIXELS_PER_INCH: f64 = 96.0;

/// Translate a PDF options bag into DevTools `Page.printToPDF` parameters.
pub fn pdf_params(options: &OptionsBag) -> Result<PrintToPdfParams, RenderError> {
    let mut builder = PrintToPdfParams::builder();

    if let Some(landscape) = bool_option(options, "landscape")? {
        builder = builder.landscape(landscape);
    }
    if let Some(header_footer) = bool_option(options, "displayHeaderFooter")? {
        builder = builder.display_header_footer(header_footer);
    }
    if let Some(background) = bool_option(options, "printBackground")? {
        builder = builder.print_background(background);
    }
    if let Some(scale) = number_option(options, "scale")? {
        builder = builder.scale(scale);
    }
    if let Some(ranges) = string_option(options, "pageRanges")? {
        builder = builder.page_ranges(ranges);
    }
    if let Some(header) = string_option(options, "headerTemplate")? {
        builder = builder.header_template(header);
    }
    if let Some(footer) = string_option(options, "footerTemplate")? {
        builder = builder.footer_template(footer);
    }
    let prefer_css = match bool_option(options, "preferCSSPageSize")? {
        Some(value) => Some(value),
        None => bool_option(options, "preferCssPageSize")?,
    };
    if let Some(prefer_css) = prefer_css {
        builder = builder.prefer_css_page_size(prefer_css);
    }

    if let Some((width, height)) = paper_dimensions(options)? {
        builder = builder.paper_width(width).paper_height(height);
    }

    // Sides the caller leaves out get no margin
    let margin = match options.get("margin") {
        Some(margin) => Some(
            margin
                .as_object()
                .ok_or_else(|| invalid("margin", "an object"))?,
        ),
        None => None,
    };
    let side = |name: &str| -> Result<f64, RenderError> {
        match margin.and_then(|m| m.get(name)) {
            Some(value) => css_length_inches(value, &format!("margin.{name}")),
            None => Ok(0.0),
        }
    };
    builder = builder
        .margin_top(side("top")?)
        .margin_bottom(side("bottom")?)
        .margin_left(side("left")?)
        .margin_right(side("right")?);

    Ok(builder.build())
}

/// Translate an image options bag into chromiumoxide screenshot parameters.
pub fn screenshot_params(options: &OptionsBag) -> Result<ScreenshotParams, RenderError> {
    let format = match string_option(options, "type")?.as_deref() {
        None | Some("png") => CaptureScreenshotFormat::Png,
        Some("jpeg") | Some("jpg") => CaptureScreenshotFormat::Jpeg,
        Some("webp") => CaptureScreenshotFormat::Webp,
        Some(other) => {
            return Err(RenderError::RenderError(format!(
                "unsupported image type `{other}`"
            )))
        }
    };

    let mut builder = ScreenshotParams::builder().format(format);

    if let Some(quality) = number_option(options, "quality")? {
        builder = builder.quality(quality.round() as i64);
    }
    if let Some(full_page) = bool_option(options, "fullPage")? {
        builder = builder.full_page(full_page);
    }
    if let Some(omit_background) = bool_option(options, "omitBackground")? {
        builder = builder.omit_background(omit_background);
    }
    if let Some(clip) = options.get("clip") {
        let clip = clip.as_object().ok_or_else(|| invalid("clip", "an object"))?;
        let field = |name: &str| -> Result<f64, RenderError> {
            number_option(clip, name)?.ok_or_else(|| invalid(&format!("clip.{name}"), "a number"))
        };
        builder = builder.clip(ClipRegion {
            x: field("x")?,
            y: field("y")?,
            width: field("width")?,
            height: field("height")?,
            scale: number_option(clip, "scale")?.unwrap_or(1.0),
        });
    }

    Ok(builder.build())
}

/// Paper size from explicit `width`/`height` or a named `format`.
///
/// Explicit dimensions win over the format; a missing one defaults to US Letter's.
fn paper_dimensions(options: &OptionsBag) -> Result<Option<(f64, f64)>, RenderError> {
    let width = options
        .get("width")
        .map(|v| css_length_inches(v, "width"))
        .transpose()?;
    let height = options
        .get("height")
        .map(|v| css_length_inches(v, "height"))
        .transpose()?;

    if width.is_some() || height.is_some() {
        return Ok(Some((width.unwrap_or(8.5), height.unwrap_or(11.0))));
    }

    match string_option(options, "format")? {
        Some(format) => paper::lookup(&format)
            .map(Some)
            .ok_or_else(|| RenderError::RenderError(format!("unknown paper format `{format}`"))),
        None => Ok(None),
    }
}

/// Convert a CSS length (`12px`, `1in`, `2.5cm`, `10mm`, or a bare pixel count) to inches.
pub fn css_length_inches(value: &Value, key: &str) -> Result<f64, RenderError> {
    if let Some(pixels) = value.as_f64() {
        return Ok(pixels / CSS_PIXELS_PER_INCH);
    }

    let text = value
        .as_str()
        .ok_or_else(|| invalid(key, "a CSS length"))?
        .trim()
        .to_ascii_lowercase();

    let (number, per_inch) = if let Some(n) = text.strip_suffix("px") {
        (n, CSS_PIXELS_PER_INCH)
    } else if let Some(n) = text.strip_suffix("in") {
        (n, 1.0)
    } else if let Some(n) = text.strip_suffix("cm") {
        (n, 2.54)
    } else if let Some(n) = text.strip_suffix("mm") {
        (n, 25.4)
    } else {
        (text.as_str(), CSS_PIXELS_PER_INCH)
    };

    number
        .trim()
        .parse::<f64>()
        .map(|n| n / per_inch)
        .map_err(|_| invalid(key, "a CSS length"))
}

fn bool_option(options: &OptionsBag, key: &str) -> Result<Option<bool>, RenderError> {
    options
        .get(key)
        .map(|v| v.as_bool().ok_or_else(|| invalid(key, "a boolean")))
        .transpose()
}

fn number_option(options: &OptionsBag, key: &str) -> Result<Option<f64>, RenderError> {
    options
        .get(key)
        .map(|v| v.as_f64().ok_or_else(|| invalid(key, "a number")))
        .transpose()
}

fn string_option(options: &OptionsBag, key: &str) -> Result<Option<String>, RenderError> {
    options
        .get(key)
        .map(|v| {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| invalid(key, "a string"))
        })
        .transpose()
}

fn invalid(key: &str, expected: &str) -> RenderError {
    RenderError::RenderError(format!("option `{key}` must be {expected}"))
}
