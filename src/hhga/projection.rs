//! Shared coordinate frame across sequences with different indel content.
//!
//! Every genomic position gets as many columns as the deepest allele stack
//! any single sequence places there, so inserted bases of one read line up
//! with gap columns in every other sequence.

use super::allele::{Allele, AlleleSequence};
use std::collections::BTreeMap;

#[derive(Debug, Default, Clone)]
pub struct Projection {
    /// Stack depth per genomic position, ascending.
    depths: BTreeMap<i64, usize>,
    /// `(position, sub_index) -> column`.
    columns: BTreeMap<(i64, usize), usize>,
}

impl Projection {
    /// Builds the frame from position-sorted sequences.
    pub fn new<'a, I>(sequences: I) -> Self
    where
        I: IntoIterator<Item = &'a AlleleSequence>,
    {
        let mut depths: BTreeMap<i64, usize> = BTreeMap::new();
        for seq in sequences {
            for (position, count) in stack_counts(seq) {
                let depth = depths.entry(position).or_insert(0);
                *depth = (*depth).max(count);
            }
        }

        let mut columns = BTreeMap::new();
        let mut column = 0;
        for (&position, &depth) in &depths {
            for sub_index in 0..depth {
                columns.insert((position, sub_index), column);
                column += 1;
            }
        }

        Projection { depths, columns }
    }

    pub fn depth(&self, position: i64) -> usize {
        self.depths.get(&position).copied().unwrap_or(0)
    }

    pub fn column(&self, position: i64, sub_index: usize) -> Option<usize> {
        self.columns.get(&(position, sub_index)).copied()
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Re-expresses a position-sorted sequence in column coordinates.
    ///
    /// Returns `None` if the sequence has an allele the frame was not built
    /// from.
    pub fn project(&self, seq: &[Allele]) -> Option<AlleleSequence> {
        let mut projected = Vec::with_capacity(seq.len());
        let mut sub_index = 0;
        let mut last = seq.first()?.position;
        for allele in seq {
            if allele.position != last {
                sub_index = 0;
            }
            last = allele.position;
            let column = self.column(allele.position, sub_index)?;
            sub_index += 1;
            projected.push(Allele {
                position: column as i64,
                ..allele.clone()
            });
        }
        Some(projected)
    }
}

/// Consecutive run lengths of equal positions in a sorted sequence.
fn stack_counts(seq: &[Allele]) -> Vec<(i64, usize)> {
    let mut counts: Vec<(i64, usize)> = Vec::new();
    for allele in seq {
        match counts.last_mut() {
            Some((position, count)) if *position == allele.position => *count += 1,
            _ => counts.push((allele.position, 1)),
        }
    }
    counts
}
