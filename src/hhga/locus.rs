//! Feature matrix of one variant: every sequence decoded, projected into a
//! shared column frame, padded to the window and scored.

use super::allele::{missing_count, Allele, AlleleSequence, GAP};
use super::grouping::{group_alignments, GroupClass, GroupInput, GroupKey, Strand};
use super::haplotype::{build_genotypes, build_haplotypes, GenotypeCopy};
use super::padding::{assume_reference, balanced_range, flatten_to_reference, pad_alleles};
use super::projection::Projection;
use super::reads::{decode_read, AlignedRead};
use super::scoring::{
    compute_likelihoods, label_for_genotype, multiclass_label_for_genotype, score_alignment,
    LikelihoodTable, MatchScores,
};
use super::sources::{AlignmentSource, GraphAligner, NodeId, ReferenceSource};
use super::variant::{InfoValues, Variant};
use itertools::Itertools;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

#[derive(Debug, Clone)]
pub struct Params {
    /// Width of every padded sequence, in columns.
    pub window_length: usize,
    /// Alignments kept per `(group, strand)` lane; 0 keeps all.
    pub max_depth: usize,
    /// Alleles seen in fewer alignments than this revert to reference.
    pub min_allele_count: usize,
    pub exponentiate: bool,
    pub show_bases: bool,
    pub assume_ref: bool,
    pub pad_haplotypes: bool,
    /// Fixed label written for every locus.
    pub class_label: Option<String>,
    /// Sample field whose genotype becomes the label.
    pub label_field: Option<String>,
    pub multiclass: bool,
    /// Prefix of the caller annotation keys.
    pub info_prefix: String,
}

impl Default for Params {
    fn default() -> Self {
        Params {
            window_length: 50,
            max_depth: 0,
            min_allele_count: 0,
            exponentiate: false,
            show_bases: false,
            assume_ref: false,
            pad_haplotypes: false,
            class_label: None,
            label_field: None,
            multiclass: false,
            info_prefix: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocusError {
    /// No mapped alignment overlaps the window.
    NoCoverage(String),
    Reference(String),
    Alignments(String),
}

impl fmt::Display for LocusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocusError::NoCoverage(repr) => write!(f, "{}: no alignments in window", repr),
            LocusError::Reference(msg) => write!(f, "Reference error: {}", msg),
            LocusError::Alignments(msg) => write!(f, "Alignment error: {}", msg),
        }
    }
}

impl From<LocusError> for String {
    fn from(err: LocusError) -> String {
        err.to_string()
    }
}

/// Per-alignment record of a locus.
#[derive(Debug, Clone)]
pub struct AlignmentFeatures<'a> {
    pub read: &'a AlignedRead,
    pub alleles: AlleleSequence,
    pub scores: MatchScores,
    pub missing: usize,
    pub group: GroupKey,
}

/// Realignment summary from a graph aligner.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphSupport {
    /// Share of the allele nodes' coverage on each allele.
    pub allele_coverage: BTreeMap<usize, f64>,
    /// Alignment id -> allele index -> base quality on that allele's nodes.
    pub read_support: BTreeMap<usize, BTreeMap<usize, f64>>,
}

#[derive(Debug)]
pub struct Locus<'a> {
    pub variant: &'a Variant,
    /// `chrom_pos_ref_alts`, used to map predictions back onto the variant.
    pub repr: String,
    pub reference: AlleleSequence,
    /// Padded haplotype per allele index.
    pub haplotypes: BTreeMap<usize, AlleleSequence>,
    pub genotypes: Vec<GenotypeCopy>,
    /// Keyed by the index of the read in the fetched slice.
    pub alignments: BTreeMap<usize, AlignmentFeatures<'a>>,
    /// Alignment ids in output order.
    pub ordered: Vec<usize>,
    pub likelihoods: LikelihoodTable,
    pub info_numeric: BTreeMap<String, f64>,
    pub info_text: BTreeMap<String, String>,
    pub label: String,
    pub graph: Option<GraphSupport>,
    pub exponentiated: bool,
}

/// 0-based half-open genomic range of the window around `variant`.
pub fn genomic_window(variant: &Variant, window_length: usize) -> (i64, i64) {
    let center = variant.position - 1;
    let begin = (center - (window_length / 2) as i64).max(0);
    (begin, begin + window_length as i64)
}

/// Alignments overlapping the window of `variant`.
pub fn fetch_alignments(
    source: &mut dyn AlignmentSource,
    variant: &Variant,
    window_length: usize,
) -> Result<Vec<AlignedRead>, LocusError> {
    let (begin, end) = genomic_window(variant, window_length);
    source
        .fetch(&variant.contig, begin, end)
        .map_err(|e| LocusError::Alignments(format!("{}: {}", variant.repr(), e)))
}

impl<'a> Locus<'a> {
    pub fn build(
        variant: &'a Variant,
        reads: &'a [AlignedRead],
        reference: &mut dyn ReferenceSource,
        params: &Params,
        graph: Option<&mut dyn GraphAligner>,
    ) -> Result<Locus<'a>, LocusError> {
        let repr = variant.repr();
        let (begin, end) = genomic_window(variant, params.window_length);
        let center = variant.position - 1;
        if reads.is_empty() {
            return Err(LocusError::NoCoverage(repr));
        }

        let fetch_start = reads.iter().map(|r| r.start).min().unwrap_or(begin).min(begin);
        let fetch_end = reads.iter().map(|r| r.end).max().unwrap_or(end).max(end);
        let ref_seq = reference
            .fetch(&variant.contig, fetch_start, (fetch_end - fetch_start) as usize)
            .map_err(LocusError::Reference)?;
        if center < fetch_start || center - fetch_start >= ref_seq.len() as i64 {
            return Err(LocusError::Reference(format!(
                "{}: variant lies outside the reference sequence",
                repr
            )));
        }

        let mut decoded = Vec::with_capacity(reads.len());
        for (id, read) in reads.iter().enumerate() {
            match decode_read(read, ref_seq.as_bytes(), fetch_start, params.exponentiate) {
                Ok(alleles) => decoded.push((id, alleles)),
                Err(e) => log::warn!("{}: skipping alignment: {}", repr, e),
            }
        }
        if params.min_allele_count > 0 {
            revert_rare_alleles(&mut decoded, params.min_allele_count);
        }
        for (_, alleles) in decoded.iter_mut() {
            alleles.retain(|a| a.position >= begin && a.position < end);
        }
        decoded.retain(|(_, alleles)| !alleles.is_empty());
        log::debug!("{}: {} of {} alignments in window", repr, decoded.len(), reads.len());

        let window_ref = reference_alleles(&ref_seq, fetch_start, begin, end);
        let normalize = params.pad_haplotypes || graph.is_some();
        let haplotypes = build_haplotypes(variant, normalize);
        let genotypes = build_genotypes(variant, &haplotypes);

        let projection = Projection::new(
            decoded
                .iter()
                .map(|(_, alleles)| alleles)
                .chain(std::iter::once(&window_ref))
                .chain(haplotypes.iter()),
        );
        let center_column = projection.column(center, 0).ok_or_else(|| {
            LocusError::Reference(format!("{}: variant position has no column", repr))
        })?;
        let (bal_min, bal_max) = balanced_range(center_column, params.window_length);
        let frame = |seq: &[Allele]| {
            let padded = pad_alleles(&projection.project(seq)?, bal_min, bal_max);
            if padded.is_empty() {
                return None;
            }
            if padded.len() != params.window_length {
                log::warn!(
                    "{}: skipping sequence padded to {} columns instead of {}",
                    repr,
                    padded.len(),
                    params.window_length
                );
                return None;
            }
            Some(padded)
        };

        let padded_ref = frame(&window_ref).ok_or_else(|| {
            LocusError::Reference(format!("{}: reference does not cover the window", repr))
        })?;
        let mut padded_haps = BTreeMap::new();
        for (index, hap) in haplotypes.iter().enumerate() {
            match frame(hap) {
                Some(padded) => {
                    padded_haps.insert(index, padded);
                }
                None => log::debug!("{}: haplotype {} outside window", repr, index),
            }
        }
        let mut padded_genotypes = genotypes
            .into_iter()
            .filter_map(|copy| {
                frame(&copy.alleles).map(|alleles| GenotypeCopy { alleles, ..copy })
            })
            .collect_vec();
        let mut padded_alignments = decoded
            .into_iter()
            .filter_map(|(id, alleles)| frame(&alleles).map(|padded| (id, padded)))
            .collect_vec();
        if padded_alignments.is_empty() {
            return Err(LocusError::NoCoverage(repr));
        }

        if params.assume_ref {
            for hap in padded_haps.values_mut() {
                assume_reference(hap, &padded_ref);
            }
            for copy in padded_genotypes.iter_mut() {
                assume_reference(&mut copy.alleles, &padded_ref);
            }
        }
        if !params.show_bases {
            for (_, alleles) in padded_alignments.iter_mut() {
                flatten_to_reference(alleles);
            }
            for hap in padded_haps.values_mut() {
                flatten_to_reference(hap);
            }
            for copy in padded_genotypes.iter_mut() {
                flatten_to_reference(&mut copy.alleles);
            }
        }

        let scored = padded_alignments
            .into_iter()
            .map(|(id, alleles)| {
                let scores = score_alignment(&alleles, &padded_haps, params.exponentiate);
                (id, alleles, scores)
            })
            .collect_vec();
        let inputs = scored
            .iter()
            .map(|(id, alleles, scores)| {
                let read = &reads[*id];
                GroupInput {
                    id: *id,
                    missing: missing_count(alleles),
                    start: read.start,
                    end: read.end,
                    class: GroupClass::classify(scores, read.is_soft_clipped()),
                    strand: Strand::of(read),
                }
            })
            .collect_vec();
        let grouped = group_alignments(&inputs, params.max_depth);
        let ordered = grouped.iter().map(|(id, _)| *id).collect_vec();
        let groups: HashMap<usize, GroupKey> = grouped.into_iter().collect();

        let mut alignments = BTreeMap::new();
        for (id, alleles, scores) in scored {
            let Some(group) = groups.get(&id) else {
                continue;
            };
            alignments.insert(
                id,
                AlignmentFeatures {
                    read: &reads[id],
                    missing: missing_count(&alleles),
                    alleles,
                    scores,
                    group: *group,
                },
            );
        }

        let haplotype_indices: BTreeSet<usize> = padded_haps.keys().copied().collect();
        let likelihoods = compute_likelihoods(
            ordered.iter().map(|id| &alignments[id].scores),
            &haplotype_indices,
        );

        let (info_numeric, info_text) = caller_annotations(variant, &params.info_prefix);
        let label = training_label(variant, params);

        let graph = match graph {
            Some(aligner) => summarize_graph(aligner, variant, begin, end, &ordered, &alignments),
            None => None,
        };

        Ok(Locus {
            variant,
            repr,
            reference: padded_ref,
            haplotypes: padded_haps,
            genotypes: padded_genotypes,
            alignments,
            ordered,
            likelihoods,
            info_numeric,
            info_text,
            label,
            graph,
            exponentiated: params.exponentiate,
        })
    }

    /// Alignments in output order.
    pub fn ordered_alignments(&self) -> impl Iterator<Item = &AlignmentFeatures<'a>> {
        self.ordered.iter().filter_map(|id| self.alignments.get(id))
    }
}

/// Reference alleles for `[begin, end)`, limited to the fetched bases.
fn reference_alleles(ref_seq: &str, offset: i64, begin: i64, end: i64) -> AlleleSequence {
    ref_seq
        .bytes()
        .enumerate()
        .map(|(i, base)| (offset + i as i64, (base as char).to_string()))
        .filter(|(pos, _)| *pos >= begin && *pos < end)
        .map(|(pos, base)| Allele::new(base.clone(), base, pos, 1.0))
        .collect()
}

/// Reverts alleles observed in fewer than `min_count` alignments to the
/// reference: substitutions and deletions take the reference base back,
/// inserted bases are dropped.
fn revert_rare_alleles(decoded: &mut [(usize, AlleleSequence)], min_count: usize) {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for (_, alleles) in decoded.iter() {
        for repr in alleles.iter().map(|a| a.repr()).unique() {
            *counts.entry(repr).or_insert(0) += 1;
        }
    }
    let is_rare = |allele: &Allele| {
        !allele.ref_frag.is_empty()
            && allele.ref_frag != allele.obs_frag
            && counts.get(&allele.repr()).copied().unwrap_or(0) < min_count
    };
    for (_, alleles) in decoded.iter_mut() {
        alleles.retain(|a| !(a.ref_frag == GAP && is_rare(a)));
        for allele in alleles.iter_mut() {
            if is_rare(allele) {
                allele.obs_frag = allele.ref_frag.clone();
            }
        }
    }
}

/// Caller annotations keyed `{prefix}{field}_{n}` (1-based value index), plus
/// `{prefix}QUAL`.
fn caller_annotations(
    variant: &Variant,
    prefix: &str,
) -> (BTreeMap<String, f64>, BTreeMap<String, String>) {
    let mut numeric = BTreeMap::new();
    let mut text = BTreeMap::new();
    for field in &variant.info {
        match &field.values {
            InfoValues::Numeric(values) => {
                for (i, value) in values.iter().enumerate() {
                    numeric.insert(format!("{}{}_{}", prefix, field.key, i + 1), *value);
                }
            }
            InfoValues::Text(values) => {
                for (i, value) in values.iter().enumerate() {
                    text.insert(format!("{}{}_{}", prefix, field.key, i + 1), value.clone());
                }
            }
        }
    }
    if let Some(quality) = variant.quality {
        numeric.insert(format!("{}QUAL", prefix), quality);
    }
    (numeric, text)
}

fn training_label(variant: &Variant, params: &Params) -> String {
    if params.label_field.is_some() {
        let gt = variant.label_value.as_deref().unwrap_or("./.");
        if params.multiclass {
            multiclass_label_for_genotype(gt)
        } else {
            label_for_genotype(gt).to_string()
        }
    } else {
        params.class_label.clone().unwrap_or_default()
    }
}

fn summarize_graph(
    aligner: &mut dyn GraphAligner,
    variant: &Variant,
    begin: i64,
    end: i64,
    ordered: &[usize],
    alignments: &BTreeMap<usize, AlignmentFeatures>,
) -> Option<GraphSupport> {
    let repr = variant.repr();
    if let Err(e) = aligner.construct(&variant.contig, begin, end, variant) {
        log::warn!("{}: graph construction failed: {}", repr, e);
        return None;
    }
    let allele_nodes = aligner.allele_nodes();
    let on_allele = |nodes: &[NodeId], per_node: &BTreeMap<NodeId, f64>| {
        nodes
            .iter()
            .map(|node| per_node.get(node).copied().unwrap_or(0.0))
            .sum::<f64>()
    };

    let mut support = GraphSupport::default();
    for id in ordered {
        let Some(features) = alignments.get(id) else {
            continue;
        };
        let per_node = match aligner.realign(&features.read.bases, &features.read.quals) {
            Ok(per_node) => per_node,
            Err(e) => {
                log::warn!("{}: realignment of {} failed: {}", repr, features.read.id, e);
                continue;
            }
        };
        let per_allele = allele_nodes
            .iter()
            .map(|(allele, nodes)| (*allele, on_allele(nodes.as_slice(), &per_node)))
            .collect();
        support.read_support.insert(*id, per_allele);
    }

    let coverage = aligner.node_coverage();
    let all_nodes = allele_nodes.values().flatten().copied().unique().collect_vec();
    let total = on_allele(all_nodes.as_slice(), &coverage);
    support.allele_coverage = allele_nodes
        .iter()
        .map(|(allele, nodes)| {
            let share = if total > 0.0 {
                on_allele(nodes.as_slice(), &coverage) / total
            } else {
                0.0
            };
            (*allele, share)
        })
        .collect();
    Some(support)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hhga::allele::MISSING;
    use crate::hhga::sources::{InMemoryAlignments, InMemoryReference};
    use crate::hhga::variant::InfoField;
    use crate::utils::Result;
    use approx::assert_relative_eq;

    const WINDOW: usize = 10;

    fn reference() -> InMemoryReference {
        InMemoryReference {
            contig: "chr1".to_string(),
            sequence: "ACGT".repeat(10),
        }
    }

    fn matching_read(id: &str, start: usize, len: usize) -> AlignedRead {
        let seq = "ACGT".repeat(10);
        AlignedRead::from_strings(
            id,
            start as i64,
            &format!("{}M", len),
            &seq[start..start + len],
            &"?".repeat(len),
        )
        .unwrap()
    }

    fn params() -> Params {
        Params {
            window_length: WINDOW,
            ..Default::default()
        }
    }

    fn assert_fixed_width(locus: &Locus) {
        assert_eq!(locus.reference.len(), WINDOW);
        assert!(locus.haplotypes.values().all(|h| h.len() == WINDOW));
        assert!(locus.genotypes.iter().all(|g| g.alleles.len() == WINDOW));
        assert!(locus.ordered_alignments().all(|a| a.alleles.len() == WINDOW));
    }

    #[test]
    fn identical_reads_match_reference_haplotype() {
        let variant = Variant::new("chr1", 21, "A", &["T"]);
        let reads = (0..10)
            .map(|i| matching_read(&format!("r{}", i), 10, 20))
            .collect_vec();
        let locus = Locus::build(&variant, &reads, &mut reference(), &params(), None).unwrap();

        assert_fixed_width(&locus);
        assert_eq!(locus.ordered.len(), 10);
        let rows = locus
            .ordered_alignments()
            .map(|a| crate::hhga::allele::sequence_to_string(&a.alleles))
            .unique()
            .collect_vec();
        assert_eq!(rows, vec!["..........".to_string()]);
        for aln in locus.ordered_alignments() {
            assert_relative_eq!(aln.scores.identity[&0], 1.0);
            assert_relative_eq!(aln.scores.identity[&1], 0.0);
            assert_eq!(aln.group.class, GroupClass::Haplotype(0));
        }
        assert_relative_eq!(locus.likelihoods[&1], 1.0);
        assert_eq!(locus.likelihoods[&4], 0.0);
        assert_eq!(locus.repr, "chr1_21_A_T");
        assert_eq!(locus.haplotypes[&1][5].obs_frag, "T");
        assert_eq!(locus.haplotypes[&1][0].obs_frag, MISSING);
    }

    #[test]
    fn deletion_reads_carry_gap_column() {
        let variant = Variant::new("chr1", 21, "AC", &["A"]);
        let seq = "ACGT".repeat(10);
        let mut reads = (0..5)
            .map(|i| matching_read(&format!("ref{}", i), 10, 20))
            .collect_vec();
        for i in 0..5 {
            let bases = format!("{}{}", &seq[10..21], &seq[22..30]);
            reads.push(
                AlignedRead::from_strings(
                    &format!("del{}", i),
                    10,
                    "11M1D8M",
                    &bases,
                    &"?".repeat(19),
                )
                .unwrap(),
            );
        }
        let locus = Locus::build(&variant, &reads, &mut reference(), &params(), None).unwrap();

        assert_fixed_width(&locus);
        assert_eq!(locus.haplotypes[&1][6].obs_frag, GAP);
        for aln in locus.ordered_alignments() {
            let is_deletion = aln.read.id.starts_with("del");
            assert_eq!(aln.alleles[6].obs_frag == GAP, is_deletion);
            let best = if is_deletion { 1 } else { 0 };
            assert_relative_eq!(aln.scores.identity[&best], 1.0);
        }
        assert_relative_eq!(locus.likelihoods[&2], 1.0, epsilon = 1e-9);
        assert!(locus.likelihoods[&1] < 1.0);
    }

    #[test]
    fn unsupported_second_alternate_has_no_likelihood() {
        let variant = Variant::new("chr1", 21, "A", &["T", "G"]);
        let reads = (0..12)
            .map(|i| matching_read(&format!("r{}", i), 10, 20))
            .collect_vec();
        let locus = Locus::build(&variant, &reads, &mut reference(), &params(), None).unwrap();
        assert_relative_eq!(locus.likelihoods[&1], 1.0);
        assert_eq!(locus.likelihoods[&3], 0.0);
        assert_eq!(locus.likelihoods[&5], 0.0);
        assert_eq!(locus.likelihoods[&6], 0.0);
        let max = locus.likelihoods.values().copied().fold(0.0, f64::max);
        assert_relative_eq!(max, 1.0);
    }

    #[test]
    fn insertion_widens_frame_but_not_window() {
        let variant = Variant::new("chr1", 21, "A", &["ATT"]);
        let seq = "ACGT".repeat(10);
        let bases = format!("{}TT{}", &seq[10..21], &seq[21..30]);
        let reads = vec![
            AlignedRead::from_strings("ins", 10, "11M2I9M", &bases, &"?".repeat(22)).unwrap(),
            matching_read("ref", 10, 20),
        ];
        let locus = Locus::build(&variant, &reads, &mut reference(), &params(), None).unwrap();
        assert_fixed_width(&locus);
        let ins = locus.ordered_alignments().find(|a| a.read.id == "ins").unwrap();
        let reference_row = locus.ordered_alignments().find(|a| a.read.id == "ref").unwrap();
        let inserted = ins.alleles.iter().position(|a| a.obs_frag == "T").unwrap();
        assert_eq!(inserted, 6);
        assert_eq!(ins.alleles[inserted + 1].obs_frag, "T");
        assert_eq!(reference_row.alleles[inserted].obs_frag, GAP);
        assert_eq!(reference_row.alleles[inserted + 1].obs_frag, GAP);
    }

    #[test]
    fn malformed_alignment_is_skipped() {
        let variant = Variant::new("chr1", 21, "A", &["T"]);
        let mut reads = (0..3)
            .map(|i| matching_read(&format!("r{}", i), 10, 20))
            .collect_vec();
        let mut short_quals = matching_read("short", 12, 15);
        short_quals.quals.pop();
        reads.insert(1, short_quals);
        let seq = "ACGT".repeat(10);
        reads.push(
            AlignedRead::from_strings("long_cigar", 14, "12M", &seq[14..24], &"?".repeat(10))
                .unwrap(),
        );

        let locus = Locus::build(&variant, &reads, &mut reference(), &params(), None).unwrap();
        assert_fixed_width(&locus);
        assert_eq!(locus.ordered, vec![0, 2, 3]);
        assert!(locus.ordered_alignments().all(|a| a.read.id.starts_with('r')));
    }

    #[test]
    fn hard_then_soft_clipped_read_stays_fixed_width() {
        let variant = Variant::new("chr1", 21, "A", &["T"]);
        let seq = "ACGT".repeat(10);
        let bases = format!("TT{}", &seq[16..30]);
        let reads = vec![
            AlignedRead::from_strings("clipped", 16, "5H2S14M", &bases, &"?".repeat(16)).unwrap(),
            matching_read("ref", 10, 20),
        ];
        let locus = Locus::build(&variant, &reads, &mut reference(), &params(), None).unwrap();
        assert_fixed_width(&locus);
        assert_eq!(locus.ordered.len(), 2);
        let clipped = &locus.alignments[&0];
        assert!(clipped
            .alleles
            .iter()
            .enumerate()
            .all(|(i, a)| a.position == i as i64));
        assert_eq!(clipped.group.class, GroupClass::SoftClipped);
    }

    #[test]
    fn fetch_uses_variant_window() {
        let variant = Variant::new("chr1", 21, "A", &["T"]);
        let mut source = InMemoryAlignments {
            contig: "chr1".to_string(),
            reads: vec![matching_read("in", 10, 20), matching_read("out", 0, 5)],
        };
        let reads = fetch_alignments(&mut source, &variant, WINDOW).unwrap();
        assert_eq!(reads.len(), 1);
        assert_eq!(reads[0].id, "in");
    }

    #[test]
    fn no_reads_is_no_coverage() {
        let variant = Variant::new("chr1", 21, "A", &["T"]);
        let err = Locus::build(&variant, &[], &mut reference(), &params(), None).unwrap_err();
        assert_eq!(err, LocusError::NoCoverage("chr1_21_A_T".to_string()));

        let far = vec![matching_read("far", 0, 5)];
        let err = Locus::build(&variant, &far, &mut reference(), &params(), None).unwrap_err();
        assert!(matches!(err, LocusError::NoCoverage(_)));
    }

    #[test]
    fn rare_alleles_revert_to_reference() {
        let variant = Variant::new("chr1", 21, "A", &["T"]);
        let seq = "ACGT".repeat(10);
        let mut bases = seq[10..30].to_string();
        // mismatch at genomic position 18
        bases.replace_range(8..9, "A");
        let mut reads = vec![
            AlignedRead::from_strings("odd", 10, "20M", &bases, &"?".repeat(20)).unwrap(),
        ];
        reads.extend((0..3).map(|i| matching_read(&format!("r{}", i), 10, 20)));

        let locus = Locus::build(&variant, &reads, &mut reference(), &params(), None).unwrap();
        let odd = &locus.alignments[&0];
        assert_eq!(odd.alleles[3].obs_frag, "A");

        let strict = Params {
            min_allele_count: 2,
            ..params()
        };
        let locus = Locus::build(&variant, &reads, &mut reference(), &strict, None).unwrap();
        assert_eq!(locus.alignments[&0].alleles[3].obs_frag, "R");
    }

    #[test]
    fn depth_cap_limits_each_lane() {
        let variant = Variant::new("chr1", 21, "A", &["T"]);
        let reads = (0..10)
            .map(|i| matching_read(&format!("r{}", i), 10, 20))
            .collect_vec();
        let capped = Params {
            max_depth: 3,
            ..params()
        };
        let locus = Locus::build(&variant, &reads, &mut reference(), &capped, None).unwrap();
        assert_eq!(locus.ordered, vec![0, 1, 2]);
        assert_eq!(locus.alignments.len(), 3);
        assert_eq!(
            locus.ordered_alignments().map(|a| a.group.to_string()).collect_vec(),
            vec!["0+0", "0+1", "0+2"]
        );
    }

    #[test]
    fn annotations_and_labels() {
        let mut variant = Variant::new("chr1", 21, "A", &["T"]);
        variant.quality = Some(50.0);
        variant.info = vec![
            InfoField {
                key: "DP".to_string(),
                values: InfoValues::Numeric(vec![12.0]),
            },
            InfoField {
                key: "AF".to_string(),
                values: InfoValues::Numeric(vec![0.5, 0.25]),
            },
            InfoField {
                key: "TYPE".to_string(),
                values: InfoValues::Text(vec!["snp".to_string()]),
            },
        ];
        variant.label_value = Some("1|0".to_string());
        let reads = vec![matching_read("r", 10, 20)];
        let labelled = Params {
            label_field: Some("GT".to_string()),
            info_prefix: "fb".to_string(),
            ..params()
        };
        let locus = Locus::build(&variant, &reads, &mut reference(), &labelled, None).unwrap();
        assert_eq!(locus.label, "2");
        assert_eq!(locus.info_numeric["fbDP_1"], 12.0);
        assert_eq!(locus.info_numeric["fbAF_2"], 0.25);
        assert_eq!(locus.info_numeric["fbQUAL"], 50.0);
        assert_eq!(locus.info_text["fbTYPE_1"], "snp");

        let multiclass = Params {
            multiclass: true,
            ..labelled.clone()
        };
        let locus = Locus::build(&variant, &reads, &mut reference(), &multiclass, None).unwrap();
        assert_eq!(locus.label, "1:1 2:1");

        let fixed = Params {
            class_label: Some("-1".to_string()),
            ..params()
        };
        let locus = Locus::build(&variant, &reads, &mut reference(), &fixed, None).unwrap();
        assert_eq!(locus.label, "-1");
    }

    struct MockGraph {
        constructed: bool,
    }

    impl GraphAligner for MockGraph {
        fn construct(&mut self, contig: &str, start: i64, end: i64, _: &Variant) -> Result<()> {
            assert_eq!((contig, start, end), ("chr1", 15, 25));
            self.constructed = true;
            Ok(())
        }

        fn realign(&mut self, _: &[u8], _: &[u8]) -> Result<BTreeMap<NodeId, f64>> {
            Ok(BTreeMap::from([(1, 30.0), (3, 10.0)]))
        }

        fn node_coverage(&self) -> BTreeMap<NodeId, f64> {
            BTreeMap::from([(1, 3.0), (2, 1.0), (3, 5.0)])
        }

        fn allele_nodes(&self) -> BTreeMap<usize, Vec<NodeId>> {
            BTreeMap::from([(0, vec![1]), (1, vec![2])])
        }
    }

    #[test]
    fn graph_support_is_summarized_over_allele_nodes() {
        let variant = Variant::new("chr1", 21, "A", &["T"]);
        let reads = vec![matching_read("r", 10, 20)];
        let mut graph = MockGraph { constructed: false };
        let locus = Locus::build(
            &variant,
            &reads,
            &mut reference(),
            &params(),
            Some(&mut graph),
        )
        .unwrap();
        assert!(graph.constructed);
        let support = locus.graph.unwrap();
        assert_relative_eq!(support.allele_coverage[&0], 0.75);
        assert_relative_eq!(support.allele_coverage[&1], 0.25);
        assert_eq!(support.read_support[&0], BTreeMap::from([(0, 30.0), (1, 0.0)]));
        // graph mode normalizes haplotypes
        assert_eq!(locus.haplotypes[&0].len(), WINDOW);
    }
}
