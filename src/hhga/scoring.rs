//! Alignment-to-haplotype similarity, genotype class labels and the per-class
//! support likelihoods derived from them.

use super::allele::Allele;
use crate::utils::quality::weight_to_probability;
use itertools::Itertools;
use std::collections::{BTreeMap, BTreeSet};

/// Class of anything that is not a diploid genotype over alleles 0..=2.
pub const UNDETERMINED: u8 = 7;

/// Normalized likelihoods below this are reported as 0.
pub const LIKELIHOOD_FLOOR: f64 = 1e-3;

const CLASSES: [(u8, (usize, usize)); 6] = [
    (1, (0, 0)),
    (2, (0, 1)),
    (3, (0, 2)),
    (4, (1, 1)),
    (5, (1, 2)),
    (6, (2, 2)),
];

/// Genotype class -> normalized support.
pub type LikelihoodTable = BTreeMap<u8, f64>;

/// Comparison of one alignment against every haplotype, keyed by allele index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchScores {
    pub identity: BTreeMap<usize, f64>,
    pub weighted_identity: BTreeMap<usize, f64>,
    /// Summed probability weight of the matched columns.
    pub quality_sum: BTreeMap<usize, f64>,
    pub matched: BTreeMap<usize, usize>,
}

impl MatchScores {
    /// Allele index with the highest quality-weighted identity, first index on
    /// ties. `None` when nothing matches.
    pub fn best_haplotype(&self) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (&index, &score) in &self.weighted_identity {
            if score > 0.0 && best.map_or(true, |(_, s)| score > s) {
                best = Some((index, score));
            }
        }
        best.map(|(index, _)| index)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Comparison {
    matched: usize,
    possible: usize,
    quality_sum: f64,
}

/// Probability that a column of an alignment is observed correctly. Padding
/// fillers are certain by construction.
fn column_probability(allele: &Allele, exponentiated: bool) -> f64 {
    if allele.ref_frag.is_empty() && (allele.is_gap() || allele.is_missing()) {
        1.0
    } else {
        weight_to_probability(allele.weight, exponentiated)
    }
}

fn compare(alignment: &[Allele], haplotype: &[Allele], exponentiated: bool) -> Comparison {
    let possible = haplotype.iter().filter(|h| !h.is_missing()).count();
    let mut comparison = Comparison {
        possible,
        ..Default::default()
    };
    for (a, h) in alignment.iter().zip(haplotype) {
        if a.is_missing() || h.is_missing() || a.obs_frag != h.obs_frag {
            continue;
        }
        comparison.matched += 1;
        comparison.quality_sum += column_probability(a, exponentiated);
    }
    comparison
}

/// Fraction of the haplotype's covered columns the alignment reproduces.
/// Both sequences must be padded to the same width.
pub fn pairwise_identity(alignment: &[Allele], haplotype: &[Allele]) -> f64 {
    let comparison = compare(alignment, haplotype, true);
    if comparison.possible == 0 {
        0.0
    } else {
        comparison.matched as f64 / comparison.possible as f64
    }
}

/// Like [`pairwise_identity`] but every matched column counts with the
/// alignment's probability of being correct there.
pub fn weighted_identity(alignment: &[Allele], haplotype: &[Allele], exponentiated: bool) -> f64 {
    let comparison = compare(alignment, haplotype, exponentiated);
    if comparison.possible == 0 {
        0.0
    } else {
        (comparison.quality_sum / comparison.possible as f64).clamp(0.0, 1.0)
    }
}

/// Scores an alignment against every haplotype.
pub fn score_alignment(
    alignment: &[Allele],
    haplotypes: &BTreeMap<usize, Vec<Allele>>,
    exponentiated: bool,
) -> MatchScores {
    let mut scores = MatchScores::default();
    for (&index, haplotype) in haplotypes {
        let comparison = compare(alignment, haplotype, exponentiated);
        let (identity, weighted) = if comparison.possible == 0 {
            (0.0, 0.0)
        } else {
            let possible = comparison.possible as f64;
            (
                comparison.matched as f64 / possible,
                (comparison.quality_sum / possible).clamp(0.0, 1.0),
            )
        };
        scores.identity.insert(index, identity);
        scores.weighted_identity.insert(index, weighted);
        scores.quality_sum.insert(index, comparison.quality_sum);
        scores.matched.insert(index, comparison.matched);
    }
    scores
}

/// Normalizes a genotype string: phasing dropped, allele indices sorted.
/// `None` when any allele is missing or not a number.
pub fn normalize_genotype(gt: &str) -> Option<Vec<usize>> {
    let mut alleles = gt
        .split(['/', '|'])
        .map(|a| a.trim().parse::<usize>().ok())
        .collect::<Option<Vec<_>>>()?;
    alleles.sort_unstable();
    Some(alleles)
}

pub fn class_for_pair(a: usize, b: usize) -> Option<u8> {
    let pair = (a.min(b), a.max(b));
    CLASSES
        .iter()
        .find(|(_, p)| *p == pair)
        .map(|(class, _)| *class)
}

pub fn pair_for_class(class: u8) -> Option<(usize, usize)> {
    CLASSES
        .iter()
        .find(|(c, _)| *c == class)
        .map(|(_, pair)| *pair)
}

/// Class 1..=6 of a diploid genotype, [`UNDETERMINED`] otherwise.
pub fn label_for_genotype(gt: &str) -> u8 {
    let class = match normalize_genotype(gt).as_deref() {
        Some(&[a, b]) => class_for_pair(a, b),
        _ => None,
    };
    class.unwrap_or_else(|| {
        log::warn!("Unknown genotype '{}'", gt);
        UNDETERMINED
    })
}

/// Genotype string for a class label. Classes that name a second alternate
/// are downgraded to their nearest valid genotype when the site has fewer
/// than two alternates.
pub fn genotype_for_label(label: &str, alt_count: usize) -> String {
    let pair = label
        .trim()
        .parse::<u8>()
        .ok()
        .and_then(pair_for_class)
        .map(|pair| {
            if alt_count > 1 {
                return pair;
            }
            match pair {
                (0, 2) | (1, 2) => (0, 1),
                (2, 2) => (1, 1),
                pair => pair,
            }
        });
    match pair {
        Some((a, b)) => format!("{}/{}", a, b),
        None => "./.".to_string(),
    }
}

/// `allele_index + 1 -> copy count` of a genotype; missing alleles are
/// skipped.
pub fn labels_for_genotype(gt: &str) -> BTreeMap<usize, f64> {
    let mut labels = BTreeMap::new();
    for allele in gt.split(['/', '|']) {
        if let Ok(index) = allele.trim().parse::<usize>() {
            *labels.entry(index + 1).or_insert(0.0) += 1.0;
        }
    }
    labels
}

/// Space-separated `label:count` pairs of [`labels_for_genotype`].
pub fn multiclass_label_for_genotype(gt: &str) -> String {
    labels_for_genotype(gt)
        .iter()
        .map(|(label, count)| format!("{}:{}", label, count))
        .join(" ")
}

/// Diploid genotype from per-label weights: labels are taken by descending
/// weight (ascending label on ties), each contributing its rounded weight in
/// copies, until two copies are reached.
pub fn genotype_for_labels(labels: &BTreeMap<usize, f64>) -> String {
    let by_weight = labels
        .iter()
        .filter(|(label, _)| **label > 0)
        .sorted_by(|a, b| b.1.total_cmp(a.1).then(a.0.cmp(b.0)));
    let mut alleles = Vec::new();
    for (label, weight) in by_weight {
        let copies = weight.round().max(0.0) as usize;
        alleles.extend(std::iter::repeat(label - 1).take(copies.min(2 - alleles.len())));
        if alleles.len() >= 2 {
            break;
        }
    }
    alleles.sort_unstable();
    alleles.iter().join("/")
}

/// Support of one alignment for the genotype `(a, b)`: the mean identity to
/// both haplotypes scaled by the mean probability of the matched columns.
fn contribution(scores: &MatchScores, a: usize, b: usize) -> f64 {
    let identity = |i: usize| scores.identity.get(&i).copied().unwrap_or(0.0);
    let support = (identity(a) + identity(b)) / 2.0;
    let matched =
        scores.matched.get(&a).copied().unwrap_or(0) + scores.matched.get(&b).copied().unwrap_or(0);
    let error = if matched == 0 {
        0.0
    } else {
        let quality = scores.quality_sum.get(&a).copied().unwrap_or(0.0)
            + scores.quality_sum.get(&b).copied().unwrap_or(0.0);
        (1.0 - quality / matched as f64).clamp(0.0, 1.0)
    };
    support * (1.0 - error)
}

/// Per-class support across all alignments, normalized so the best class is
/// 1. Classes naming a haplotype outside `haplotypes` are 0; without any
/// supporting alignment only [`UNDETERMINED`] is 1.
pub fn compute_likelihoods<'a, I>(scores: I, haplotypes: &BTreeSet<usize>) -> LikelihoodTable
where
    I: IntoIterator<Item = &'a MatchScores>,
{
    let classes = CLASSES
        .iter()
        .filter(|(_, (a, b))| haplotypes.contains(a) && haplotypes.contains(b))
        .copied()
        .collect_vec();

    let mut log_support: BTreeMap<u8, f64> = classes.iter().map(|(c, _)| (*c, 0.0)).collect();
    let mut contributors = 0;
    for alignment in scores {
        let contributions = classes
            .iter()
            .map(|(class, (a, b))| (*class, contribution(alignment, *a, *b)))
            .collect_vec();
        if contributions.iter().all(|(_, c)| *c <= 0.0) {
            continue;
        }
        contributors += 1;
        for (class, c) in contributions {
            if let Some(total) = log_support.get_mut(&class) {
                *total += c.ln();
            }
        }
    }

    let mut table: LikelihoodTable = (1..=UNDETERMINED).map(|c| (c, 0.0)).collect();
    let max = log_support
        .values()
        .copied()
        .filter(|v| v.is_finite())
        .reduce(f64::max);
    match max {
        Some(max) if contributors > 0 => {
            for (class, total) in log_support {
                let value = (total - max).exp();
                table.insert(class, if value < LIKELIHOOD_FLOOR { 0.0 } else { value });
            }
        }
        _ => {
            table.insert(UNDETERMINED, 1.0);
        }
    }
    table
}
