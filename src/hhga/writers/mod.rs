mod text;
mod vcf;
mod vw;

pub use text::to_text;
pub use vcf::{Prediction, PredictionWriter};
pub use vw::to_vw;

use super::locus::Locus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Vowpal Wabbit sparse record.
    Vw,
    /// Human-readable matrix.
    Text,
}

/// Serializes a locus as one output record (no trailing newline).
pub fn render(locus: &Locus, format: OutputFormat) -> String {
    match format {
        OutputFormat::Vw => to_vw(locus),
        OutputFormat::Text => to_text(locus),
    }
}
