//! Fixed-width windowing of projected allele sequences and the post-padding
//! passes.

use super::allele::{Allele, AlleleSequence, GAP, MISSING, REF_MATCH};

/// `[bal_min, bal_max)` column range of `window_length` columns centred on
/// `center`, clamped to start at column 0.
pub fn balanced_range(center: usize, window_length: usize) -> (i64, i64) {
    let bal_min = center.saturating_sub(window_length / 2) as i64;
    (bal_min, bal_min + window_length as i64)
}

/// Pads a projected sequence to exactly `bal_max - bal_min` alleles:
/// missing fillers before and after its span, gap fillers in skipped
/// interior columns, then clips to the range and renumbers to start at 0.
///
/// A sequence that does not overlap the range comes back empty.
pub fn pad_alleles(seq: &[Allele], bal_min: i64, bal_max: i64) -> AlleleSequence {
    let (first, last) = match (seq.first(), seq.last()) {
        (Some(first), Some(last)) => (first.position, last.position),
        _ => return AlleleSequence::new(),
    };
    if first >= bal_max || last < bal_min {
        return AlleleSequence::new();
    }

    let mut padded = AlleleSequence::with_capacity((bal_max - bal_min) as usize);
    for column in bal_min..first {
        padded.push(Allele::missing(column));
    }
    let mut previous: Option<i64> = None;
    for allele in seq {
        if let Some(previous) = previous {
            for column in previous + 1..allele.position {
                padded.push(Allele::gap(column));
            }
        }
        previous = Some(allele.position);
        padded.push(allele.clone());
    }
    for column in last + 1..bal_max {
        padded.push(Allele::missing(column));
    }

    padded
        .into_iter()
        .filter(|a| a.position >= bal_min && a.position < bal_max)
        .map(|a| Allele {
            position: a.position - bal_min,
            ..a
        })
        .collect()
}

/// Replaces missing columns of a padded sequence with the padded reference
/// allele of the same column.
pub fn assume_reference(seq: &mut [Allele], reference: &[Allele]) {
    for (allele, ref_allele) in seq.iter_mut().zip(reference) {
        if allele.is_missing() {
            *allele = ref_allele.clone();
        }
    }
}

/// Marks reference-matching columns with the `R` placeholder.
pub fn flatten_to_reference(seq: &mut [Allele]) {
    for allele in seq.iter_mut() {
        if allele.obs_frag != GAP
            && allele.obs_frag != MISSING
            && allele.obs_frag == allele.ref_frag
        {
            allele.obs_frag = REF_MATCH.to_string();
        }
    }
}
