//! Named paper formats and their dimensions in inches

/// Width and height in inches.
pub type PaperSize = (f64, f64);

pub const A4: PaperSize = (8.27, 11.7);

const PAPER_SIZES: [(&str, PaperSize); 11] = [
    ("letter", (8.5, 11.0)),
    ("legal", (8.5, 14.0)),
    ("tabloid", (11.0, 17.0)),
    ("ledger", (17.0, 11.0)),
    ("a0", (33.1, 46.8)),
    ("a1", (23.4, 33.1)),
    ("a2", (16.54, 23.4)),
    ("a3", (11.7, 16.54)),
    ("a4", A4),
    ("a5", (5.83, 8.27)),
    ("a6", (4.13, 5.83)),
];

/// Look up a named format, case-insensitively.
pub fn lookup(format: &str) -> Option<PaperSize> {
    let wanted = format.trim().to_ascii_lowercase();
    PAPER_SIZES
        .iter()
        .find(|(name, _)| *name == wanted)
        .map(|(_, size)| *size)
}

/// Dimensions for `format`, falling back to A4 when unknown or absent.
pub fn size_for(format: Option<&str>) -> PaperSize {
    format.and_then(lookup).unwrap_or(A4)
}
