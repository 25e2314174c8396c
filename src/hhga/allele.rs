//! The atomic unit of every feature row: one column's reference and observed
//! fragment with a probability weight.

use std::cmp::Ordering;
use std::fmt;

/// Gap filler: an indel stack column this sequence has no event in, or a
/// deleted base.
pub const GAP: &str = "U";
/// No coverage.
pub const MISSING: &str = "M";
/// Soft-clip marker; the weight holds the clip length.
pub const SOFT_CLIP: &str = "S";
/// Reference match, only present after flattening.
pub const REF_MATCH: &str = "R";

#[derive(Debug, Clone)]
pub struct Allele {
    pub ref_frag: String,
    pub obs_frag: String,
    /// Genomic position before projection, dense column index afterwards.
    pub position: i64,
    pub weight: f64,
}

impl Allele {
    pub fn new(
        ref_frag: impl Into<String>,
        obs_frag: impl Into<String>,
        position: i64,
        weight: f64,
    ) -> Self {
        Allele {
            ref_frag: ref_frag.into(),
            obs_frag: obs_frag.into(),
            position,
            weight,
        }
    }

    pub fn missing(position: i64) -> Self {
        Allele::new("", MISSING, position, 1.0)
    }

    pub fn gap(position: i64) -> Self {
        Allele::new("", GAP, position, 1.0)
    }

    pub fn is_missing(&self) -> bool {
        self.obs_frag == MISSING
    }

    pub fn is_gap(&self) -> bool {
        self.obs_frag == GAP
    }

    pub fn is_soft_clip(&self) -> bool {
        self.obs_frag == SOFT_CLIP
    }

    /// Canonical `position:ref/obs` form used for equality and ordering.
    pub fn repr(&self) -> String {
        format!("{}:{}/{}", self.position, self.ref_frag, self.obs_frag)
    }

    /// Single character used by the text matrix.
    pub fn display_char(&self) -> String {
        match self.obs_frag.as_str() {
            MISSING => " ".to_string(),
            GAP => "-".to_string(),
            REF_MATCH => ".".to_string(),
            other => other.to_string(),
        }
    }
}

impl PartialEq for Allele {
    fn eq(&self, other: &Self) -> bool {
        self.repr() == other.repr()
    }
}

impl Eq for Allele {}

impl PartialOrd for Allele {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Allele {
    fn cmp(&self, other: &Self) -> Ordering {
        self.repr().cmp(&other.repr())
    }
}

impl fmt::Display for Allele {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repr(), self.weight)
    }
}

pub type AlleleSequence = Vec<Allele>;

/// Number of columns without coverage.
pub fn missing_count(seq: &[Allele]) -> usize {
    seq.iter().filter(|a| a.is_missing()).count()
}

/// Renders a sequence as one character per column.
pub fn sequence_to_string(seq: &[Allele]) -> String {
    seq.iter().map(|a| a.display_char()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repr_defines_equality_and_order() {
        let a = Allele::new("A", "T", 12, 30.0);
        let b = Allele::new("A", "T", 12, 7.0);
        let c = Allele::new("A", "G", 12, 30.0);
        assert_eq!(a.repr(), "12:A/T");
        assert_eq!(a, b);
        assert!(c < a);
    }

    #[test]
    fn tokens_render_as_text() {
        let seq = vec![
            Allele::missing(0),
            Allele::gap(1),
            Allele::new("A", REF_MATCH, 2, 1.0),
            Allele::new("A", "C", 3, 1.0),
        ];
        assert_eq!(sequence_to_string(&seq), " -.C");
        assert_eq!(missing_count(&seq), 1);
    }
}
