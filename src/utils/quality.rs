//! Conversions between encoded base qualities, Phred scores and probabilities.
//!
//! All functions are total: inputs outside the meaningful domain are clamped
//! rather than propagated as NaN or infinities.

use std::f64::consts::{LN_10, LOG10_E};

/// Cap returned for probabilities that would otherwise produce a negative,
/// infinite or overflowing Phred score.
pub const PHRED_MAX: f64 = 1000.0;

const QUAL_OFFSET: u8 = 33;

/// Decodes a Phred+33 quality character.
pub fn char_to_quality(c: u8) -> i32 {
    c as i32 - QUAL_OFFSET as i32
}

pub fn quality_to_char(qual: i32) -> u8 {
    (qual.clamp(0, (u8::MAX - QUAL_OFFSET) as i32) as u8) + QUAL_OFFSET
}

/// Converts a Phred score into the error probability it encodes.
pub fn quality_to_probability(qual: f64) -> f64 {
    10f64.powf(qual / -10.0)
}

/// Converts an error probability into a Phred score.
///
/// Returns [`PHRED_MAX`] for `prob == 1` (avoids `-0`) and whenever the
/// score would be negative, non-finite or exceed the cap.
pub fn probability_to_quality(prob: f64) -> f64 {
    if prob == 1.0 {
        return PHRED_MAX;
    }
    let qual = -10.0 * prob.log10();
    if !qual.is_finite() || !(0.0..=PHRED_MAX).contains(&qual) {
        PHRED_MAX
    } else {
        qual
    }
}

pub fn ln_to_log10(prob: f64) -> f64 {
    LOG10_E * prob
}

pub fn log10_to_ln(prob: f64) -> f64 {
    LN_10 * prob
}

pub fn phred_to_ln(qual: f64) -> f64 {
    LN_10 * qual * -0.1
}

pub fn ln_to_phred(prob: f64) -> f64 {
    -10.0 * LOG10_E * prob
}

/// Interprets an allele weight as a probability that the observation is
/// correct.
///
/// Weights are either raw Phred scores or, when features are exponentiated,
/// already `1 - error`.
pub fn weight_to_probability(weight: f64, exponentiated: bool) -> f64 {
    let prob = if exponentiated {
        weight
    } else {
        1.0 - quality_to_probability(weight)
    };
    if prob.is_nan() {
        0.0
    } else {
        prob.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn char_round_trip() {
        assert_eq!(char_to_quality(b'!'), 0);
        assert_eq!(char_to_quality(b'?'), 30);
        assert_eq!(quality_to_char(30), b'?');
        assert_eq!(quality_to_char(-5), b'!');
    }

    #[test]
    fn phred_to_probability() {
        assert_relative_eq!(quality_to_probability(30.0), 0.001, epsilon = 1e-12);
        assert_relative_eq!(quality_to_probability(0.0), 1.0);
        assert_relative_eq!(probability_to_quality(0.01), 20.0, epsilon = 1e-9);
    }

    #[test]
    fn probability_to_quality_is_capped() {
        assert_eq!(probability_to_quality(1.0), PHRED_MAX);
        assert_eq!(probability_to_quality(0.0), PHRED_MAX);
        assert_eq!(probability_to_quality(2.0), PHRED_MAX);
        assert_eq!(probability_to_quality(1e-200), PHRED_MAX);
    }

    #[test]
    fn log_scalings_are_inverse() {
        let ln = phred_to_ln(20.0);
        assert_relative_eq!(ln, 0.01f64.ln(), epsilon = 1e-12);
        assert_relative_eq!(ln_to_phred(ln), 20.0, epsilon = 1e-9);
        assert_relative_eq!(log10_to_ln(ln_to_log10(-3.5)), -3.5, epsilon = 1e-12);
    }

    #[test]
    fn weights_become_probabilities() {
        assert_relative_eq!(weight_to_probability(30.0, false), 0.999, epsilon = 1e-12);
        assert_relative_eq!(weight_to_probability(0.75, true), 0.75);
        assert_eq!(weight_to_probability(1.5, true), 1.0);
        assert_eq!(weight_to_probability(f64::NAN, true), 0.0);
    }
}
