//! Deterministic ordering and lane assignment of a locus' alignments.

use super::reads::{AlignedRead, ReadSource};
use super::scoring::MatchScores;
use itertools::Itertools;
use std::collections::HashMap;
use std::fmt;

/// Haplotype an alignment is filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GroupClass {
    /// Allele index of the best-matching haplotype.
    Haplotype(usize),
    NoSupport,
    SoftClipped,
}

impl GroupClass {
    pub fn classify(scores: &MatchScores, soft_clipped: bool) -> GroupClass {
        if soft_clipped {
            return GroupClass::SoftClipped;
        }
        scores
            .best_haplotype()
            .map_or(GroupClass::NoSupport, GroupClass::Haplotype)
    }
}

impl fmt::Display for GroupClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupClass::Haplotype(index) => write!(f, "{}", index),
            GroupClass::NoSupport => write!(f, "n"),
            GroupClass::SoftClipped => write!(f, "s"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Strand {
    Forward,
    Reverse,
    /// Assembled contigs carry no strand of their own.
    Unstranded,
}

impl Strand {
    pub fn of(read: &AlignedRead) -> Strand {
        match (read.source, read.flags.is_reverse) {
            (ReadSource::Contig, _) => Strand::Unstranded,
            (ReadSource::Read, false) => Strand::Forward,
            (ReadSource::Read, true) => Strand::Reverse,
        }
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = match self {
            Strand::Forward => '+',
            Strand::Reverse => '-',
            Strand::Unstranded => 'u',
        };
        write!(f, "{}", token)
    }
}

/// Display and feature group of an alignment, rendered as
/// `{class}{strand}{lane}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupKey {
    pub class: GroupClass,
    pub strand: Strand,
    pub lane: usize,
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.class, self.strand, self.lane)
    }
}

/// What the grouper needs to know about one alignment.
#[derive(Debug, Clone)]
pub struct GroupInput {
    pub id: usize,
    pub missing: usize,
    pub start: i64,
    pub end: i64,
    pub class: GroupClass,
    pub strand: Strand,
}

/// Ids ordered by `(missing columns, start)`, ties kept in input order.
pub fn order_alignments(inputs: &[GroupInput]) -> Vec<usize> {
    inputs
        .iter()
        .sorted_by_key(|input| (input.missing, input.start))
        .map(|input| input.id)
        .collect()
}

/// Orders the alignments and assigns each a group. Within a `(class, strand)`
/// lane alignments are packed in order into the first sub-lane whose last
/// alignment ends at or before their start. A non-zero `max_depth` keeps only
/// the first `max_depth` alignments of each lane.
pub fn group_alignments(inputs: &[GroupInput], max_depth: usize) -> Vec<(usize, GroupKey)> {
    let by_id: HashMap<usize, &GroupInput> = inputs.iter().map(|i| (i.id, i)).collect();
    let mut lane_ends: HashMap<(GroupClass, Strand), Vec<i64>> = HashMap::new();
    let mut lane_counts: HashMap<(GroupClass, Strand), usize> = HashMap::new();

    let mut grouped = Vec::with_capacity(inputs.len());
    for id in order_alignments(inputs) {
        let input = by_id[&id];
        let lane = (input.class, input.strand);
        let count = lane_counts.entry(lane).or_insert(0);
        if max_depth > 0 && *count >= max_depth {
            continue;
        }
        *count += 1;

        let ends = lane_ends.entry(lane).or_default();
        let sub_lane = match ends.iter().position(|&end| end <= input.start) {
            Some(sub_lane) => {
                ends[sub_lane] = input.end;
                sub_lane
            }
            None => {
                ends.push(input.end);
                ends.len() - 1
            }
        };
        grouped.push((
            id,
            GroupKey {
                class: input.class,
                strand: input.strand,
                lane: sub_lane,
            },
        ));
    }
    grouped
}
