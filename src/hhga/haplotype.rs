//! Builds allele sequences for the variant's alleles and the samples' called
//! chromosome copies.

use super::allele::{Allele, AlleleSequence, GAP, MISSING};
use super::variant::{Edit, Variant};
use std::collections::HashMap;

/// A called chromosome copy of one sample.
#[derive(Debug, Clone)]
pub struct GenotypeCopy {
    /// Index of the sample in the VCF header.
    pub sample: usize,
    pub allele_index: usize,
    pub alleles: AlleleSequence,
}

fn edit_to_alleles(edit: &Edit, alleles: &mut AlleleSequence) {
    let byte_str = |s: &str, i: usize| s[i..i + 1].to_string();
    if edit.ref_frag == edit.obs_frag && edit.obs_frag.len() > 1 {
        for i in 0..edit.ref_frag.len() {
            let base = byte_str(&edit.ref_frag, i);
            alleles.push(Allele::new(
                base.clone(),
                base,
                edit.position + i as i64 - 1,
                1.0,
            ));
        }
    } else if edit.ref_frag.is_empty() {
        // cluster insertions behind the previous base
        for i in 0..edit.obs_frag.len() {
            alleles.push(Allele::new(
                GAP,
                byte_str(&edit.obs_frag, i),
                edit.position - 2,
                1.0,
            ));
        }
    } else if edit.obs_frag.is_empty() {
        for i in 0..edit.ref_frag.len() {
            alleles.push(Allele::new(
                byte_str(&edit.ref_frag, i),
                GAP,
                edit.position + i as i64 - 1,
                1.0,
            ));
        }
    } else {
        alleles.push(Allele::new(
            edit.ref_frag.clone(),
            edit.obs_frag.clone(),
            edit.position - 1,
            1.0,
        ));
    }
}

/// Allele sequences of every distinct allele string, keyed by that string.
pub fn build_allele_map(variant: &Variant) -> HashMap<String, AlleleSequence> {
    variant
        .parsed_alleles()
        .into_iter()
        .map(|(allele, edits)| {
            let mut alleles = AlleleSequence::new();
            for edit in &edits {
                edit_to_alleles(edit, &mut alleles);
            }
            alleles.sort_by_key(|a| a.position);
            (allele, alleles)
        })
        .collect()
}

/// One haplotype per allele of the variant (reference first), in allele
/// index order.
pub fn build_haplotypes(variant: &Variant, normalize: bool) -> Vec<AlleleSequence> {
    let allele_map = build_allele_map(variant);
    let mut haplotypes = variant
        .alleles
        .iter()
        .map(|allele| allele_map.get(allele).cloned().unwrap_or_default())
        .collect::<Vec<_>>();
    if normalize {
        normalize_haplotypes(&mut haplotypes);
    }
    haplotypes
}

/// Evens out left-alignment conventions: pads every haplotype to the longest
/// one with gap fillers stacked on its last position, and masks a shared
/// first base as missing so it cannot act as a fixed anchor column.
pub fn normalize_haplotypes(haplotypes: &mut [AlleleSequence]) {
    let max_len = haplotypes.iter().map(|h| h.len()).max().unwrap_or(0);
    for hap in haplotypes.iter_mut() {
        if let Some(last_pos) = hap.last().map(|a| a.position) {
            while hap.len() < max_len {
                hap.push(Allele::gap(last_pos));
            }
        }
    }

    let first_obs = haplotypes
        .iter()
        .map(|h| h.first().map(|a| a.obs_frag.clone()))
        .collect::<Vec<_>>();
    let all_agree = !first_obs.is_empty()
        && first_obs[0].is_some()
        && first_obs.iter().all(|obs| *obs == first_obs[0]);
    if all_agree {
        for hap in haplotypes.iter_mut() {
            hap[0].obs_frag = MISSING.to_string();
        }
    }
}

/// Genotype sequences for every called allele of every sample; missing calls
/// contribute nothing.
pub fn build_genotypes(variant: &Variant, haplotypes: &[AlleleSequence]) -> Vec<GenotypeCopy> {
    let mut genotypes = Vec::new();
    for (sample, call) in variant.samples.iter().enumerate() {
        for allele_index in call.alleles.iter().flatten() {
            match haplotypes.get(*allele_index) {
                Some(alleles) => genotypes.push(GenotypeCopy {
                    sample,
                    allele_index: *allele_index,
                    alleles: alleles.clone(),
                }),
                None => log::warn!(
                    "{}: sample {} calls unknown allele {}",
                    variant.repr(),
                    call.name,
                    allele_index
                ),
            }
        }
    }
    genotypes
}
