//! Converts one alignment into a position-sorted allele sequence in genomic
//! coordinates.

use super::cigar::{self, CigarOp, CigarOpExt};
use super::read::AlignedRead;
use crate::hhga::allele::{Allele, AlleleSequence, GAP, SOFT_CLIP};
use crate::utils::quality::quality_to_probability;
use crate::utils::Result;

/// Per-base weights: raw Phred scores, or `1 - error` when exponentiating.
pub fn base_weights(quals: &[u8], exponentiate: bool) -> Vec<f64> {
    quals
        .iter()
        .map(|&q| {
            if exponentiate {
                1.0 - quality_to_probability(q as f64)
            } else {
                q as f64
            }
        })
        .collect()
}

/// Window of `len + 2` weights starting one base before the insertion.
///
/// The window is shifted left so it never runs past the end of the read and
/// covers the whole read when the read is shorter than `len + 2`.
pub fn insertion_probs(quals: &[f64], sp: usize, len: usize) -> Vec<f64> {
    let span = len + 2;
    if span > quals.len() {
        return quals.to_vec();
    }
    let start = sp.saturating_sub(1).min(quals.len() - span);
    quals[start..start + span].to_vec()
}

/// Window of `len + 2` weights right-centred on the deletion, bounded to the
/// read. Deletions carry no quality of their own, so the surrounding bases
/// stand in for them.
pub fn deletion_probs(quals: &[f64], sp: usize, len: usize) -> Vec<f64> {
    let span = len + 2;
    if span > quals.len() {
        return quals.to_vec();
    }
    let start = sp.saturating_sub(span / 2).min(quals.len() - span);
    quals[start..start + span].to_vec()
}

/// Weight of inserted base `i`: the minimum of the base and its two flanks.
fn insertion_weight(window: &[f64], i: usize) -> f64 {
    let lo = i.min(window.len());
    let hi = (i + 3).min(window.len());
    window[lo..hi]
        .iter()
        .copied()
        .reduce(f64::min)
        .or_else(|| window.last().copied())
        .unwrap_or(0.0)
}

fn deletion_weight(window: &[f64], i: usize) -> f64 {
    window
        .get(i)
        .or_else(|| window.last())
        .copied()
        .unwrap_or(0.0)
}

fn check_read(read: &AlignedRead, ref_seq: &[u8], ref_offset: i64) -> Result<()> {
    if read.quals.len() != read.bases.len() {
        return Err(format!(
            "{}: {} qualities for {} bases",
            read.id,
            read.quals.len(),
            read.bases.len()
        ));
    }
    let query_len = cigar::query_len(&read.cigar);
    if query_len != read.bases.len() as i64 {
        return Err(format!(
            "{}: CIGAR consumes {} query bases but the read has {}",
            read.id,
            query_len,
            read.bases.len()
        ));
    }
    let ref_start = read.start - ref_offset;
    let ref_end = ref_start + cigar::ref_span(&read.cigar);
    if ref_start < 0 || ref_end > ref_seq.len() as i64 {
        return Err(format!(
            "{}: alignment {}-{} falls outside the fetched reference",
            read.id, read.start, read.end
        ));
    }
    Ok(())
}

/// Decodes an alignment against `ref_seq`, the reference bases starting at
/// genomic position `ref_offset`.
///
/// Matches emit one allele per base, insertions are stacked behind the
/// preceding reference base, deletions emit one gap per deleted base and
/// soft clips emit a single marker two bases outside the aligned span.
pub fn decode_read(
    read: &AlignedRead,
    ref_seq: &[u8],
    ref_offset: i64,
    exponentiate: bool,
) -> Result<AlleleSequence> {
    check_read(read, ref_seq, ref_offset)?;

    let quals = base_weights(&read.quals, exponentiate);
    let ref_start = (read.start - ref_offset) as usize;
    let ref_base = |rp: usize| (ref_seq[ref_start + rp] as char).to_string();
    let read_base = |sp: usize| (read.bases[sp] as char).to_string();

    let mut alleles = AlleleSequence::new();
    let mut rp = 0_usize;
    let mut sp = 0_usize;
    for op in read.cigar.iter() {
        match op {
            CigarOp::Match(len) | CigarOp::Equal(len) | CigarOp::Diff(len) => {
                let len = *len as usize;
                for i in 0..len {
                    alleles.push(Allele::new(
                        ref_base(rp + i),
                        read_base(sp + i),
                        read.start + (rp + i) as i64,
                        quals[sp + i],
                    ));
                }
                rp += len;
                sp += len;
            }
            CigarOp::Ins(len) => {
                let len = *len as usize;
                let window = insertion_probs(&quals, sp, len);
                for i in 0..len {
                    alleles.push(Allele::new(
                        GAP,
                        read_base(sp + i),
                        read.start + rp as i64 - 1,
                        insertion_weight(&window, i),
                    ));
                }
                sp += len;
            }
            CigarOp::Del(len) => {
                let len = *len as usize;
                let window = deletion_probs(&quals, sp, len);
                for i in 0..len {
                    alleles.push(Allele::new(
                        ref_base(rp + i),
                        GAP,
                        read.start + (rp + i) as i64,
                        deletion_weight(&window, i),
                    ));
                }
                rp += len;
            }
            CigarOp::SoftClip(len) => {
                // only hard clips may precede a leading soft clip
                let position = if rp == 0 && sp == 0 {
                    read.start - 2
                } else {
                    read.start + rp as i64 + 1
                };
                alleles.push(Allele::new("", SOFT_CLIP, position, *len as f64));
                sp += *len as usize;
            }
            CigarOp::HardClip(_) => {}
            CigarOp::RefSkip(_) | CigarOp::Pad(_) => {
                log::warn!("{}: ignoring CIGAR element {:?}", read.id, op);
                rp += op.get_ref_len() as usize;
                sp += op.get_query_len() as usize;
            }
        }
    }

    Ok(alleles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn weights(v: &[u8]) -> Vec<f64> {
        base_weights(v, false)
    }

    #[test]
    fn insertion_window_is_bounded_by_read() {
        let quals = weights(&[10, 20, 30, 40, 50, 60]);
        assert_eq!(insertion_probs(&quals, 2, 2), vec![20.0, 30.0, 40.0, 50.0]);
        assert_eq!(insertion_probs(&quals, 0, 1), vec![10.0, 20.0, 30.0]);
        // would run past the end: shifted left
        assert_eq!(insertion_probs(&quals, 5, 2), vec![30.0, 40.0, 50.0, 60.0]);
        // longer than the read: whole read
        assert_eq!(insertion_probs(&quals, 1, 10).len(), 6);
    }

    #[test]
    fn deletion_window_is_right_centred() {
        let quals = weights(&[10, 20, 30, 40, 50, 60]);
        assert_eq!(deletion_probs(&quals, 3, 1), vec![30.0, 40.0, 50.0]);
        assert_eq!(deletion_probs(&quals, 0, 2), vec![10.0, 20.0, 30.0, 40.0]);
        assert_eq!(deletion_probs(&quals, 6, 2), vec![30.0, 40.0, 50.0, 60.0]);
        assert_eq!(deletion_probs(&quals, 2, 9).len(), 6);
    }

    #[test]
    fn matching_read_decodes_to_reference() {
        let read = AlignedRead::from_strings("r1", 10, "5M", "ACGTA", "?????").unwrap();
        let alleles = decode_read(&read, b"ACGTA", 10, false).unwrap();
        assert_eq!(alleles.len(), 5);
        for (i, allele) in alleles.iter().enumerate() {
            assert_eq!(allele.position, 10 + i as i64);
            assert_eq!(allele.ref_frag, allele.obs_frag);
            assert_relative_eq!(allele.weight, 30.0);
        }
    }

    #[test]
    fn insertion_bases_cluster_behind_anchor() {
        // ref ACGTA, read AC[TTT]GTA
        let read = AlignedRead::from_strings("r1", 100, "2M3I3M", "ACTTTGTA", "??5+5???").unwrap();
        let alleles = decode_read(&read, b"ACGTA", 100, false).unwrap();
        let inserted = alleles.iter().filter(|a| a.ref_frag == GAP).collect::<Vec<_>>();
        assert_eq!(inserted.len(), 3);
        assert!(inserted.iter().all(|a| a.position == 101));
        assert_eq!(
            inserted.iter().map(|a| a.obs_frag.as_str()).collect::<String>(),
            "TTT"
        );
        // window is qualities [1..6) = 30,20,10,20,30; min of each triple
        let window = insertion_probs(&base_weights(&read.quals, false), 2, 3);
        assert_eq!(window.len(), 5);
        assert_eq!(
            inserted.iter().map(|a| a.weight).collect::<Vec<_>>(),
            vec![10.0, 10.0, 10.0]
        );
        // sorted by position, anchor base precedes the inserted bases
        assert_eq!(alleles[1].position, 101);
        assert_eq!(alleles[1].obs_frag, "C");
        assert!(alleles.windows(2).all(|w| w[0].position <= w[1].position));
    }

    #[test]
    fn insertion_window_on_short_read_uses_all_qualities() {
        let read = AlignedRead::from_strings("r1", 0, "1M2I", "ATT", "?+5").unwrap();
        let quals = base_weights(&read.quals, false);
        assert_eq!(insertion_probs(&quals, 1, 2).len(), 3);
        let alleles = decode_read(&read, b"A", 0, false).unwrap();
        assert_eq!(alleles.len(), 3);
        assert_eq!(alleles[1].weight, 10.0);
        assert_eq!(alleles[2].weight, 10.0);
    }

    #[test]
    fn deletion_emits_gap_per_base() {
        let read = AlignedRead::from_strings("r1", 0, "2M2D2M", "ACTA", "????").unwrap();
        let alleles = decode_read(&read, b"ACGGTA", 0, false).unwrap();
        let deleted = alleles.iter().filter(|a| a.is_gap()).collect::<Vec<_>>();
        assert_eq!(deleted.len(), 2);
        assert_eq!(deleted[0].position, 2);
        assert_eq!(deleted[0].ref_frag, "G");
        assert_eq!(deleted[1].position, 3);
        assert_eq!(alleles.len(), 6);
    }

    #[test]
    fn soft_clips_emit_markers() {
        let read = AlignedRead::from_strings("r1", 10, "2S3M4S", "GGACGTTTT", "?????????").unwrap();
        let alleles = decode_read(&read, b"ACG", 10, false).unwrap();
        assert!(alleles[0].is_soft_clip());
        assert_eq!(alleles[0].position, 8);
        assert_eq!(alleles[0].weight, 2.0);
        let last = alleles.last().unwrap();
        assert!(last.is_soft_clip());
        assert_eq!(last.position, 14);
        assert_eq!(last.weight, 4.0);
    }

    #[test]
    fn soft_clip_after_hard_clip_is_leading() {
        let read = AlignedRead::from_strings("r1", 16, "5H2S3M1S4H", "TTACGG", "??????").unwrap();
        let alleles = decode_read(&read, b"ACG", 16, false).unwrap();
        assert!(alleles[0].is_soft_clip());
        assert_eq!(alleles[0].position, 14);
        assert_eq!(alleles[0].weight, 2.0);
        assert!(alleles.windows(2).all(|w| w[0].position <= w[1].position));
        let last = alleles.last().unwrap();
        assert!(last.is_soft_clip());
        assert_eq!(last.position, 20);
    }

    #[test]
    fn exponentiated_weights_are_probabilities() {
        let read = AlignedRead::from_strings("r1", 0, "1M", "A", "+").unwrap();
        let alleles = decode_read(&read, b"A", 0, true).unwrap();
        assert_relative_eq!(alleles[0].weight, 0.9, epsilon = 1e-12);
    }

    #[test]
    fn malformed_alignment_is_rejected() {
        let mut read = AlignedRead::from_strings("r1", 0, "4M", "ACGT", "????").unwrap();
        read.quals.pop();
        assert!(decode_read(&read, b"ACGT", 0, false).is_err());

        let read = AlignedRead::from_strings("r2", 0, "5M", "ACGT", "????").unwrap();
        assert!(decode_read(&read, b"ACGTA", 0, false).is_err());

        let read = AlignedRead::from_strings("r3", 2, "4M", "ACGT", "????").unwrap();
        assert!(decode_read(&read, b"ACGT", 0, false).is_err());
    }

    #[test]
    fn ref_skip_is_ignored_but_advances() {
        let read = AlignedRead::from_strings("r1", 0, "1M2N1M", "AT", "??").unwrap();
        let alleles = decode_read(&read, b"ACGT", 0, false).unwrap();
        assert_eq!(alleles.len(), 2);
        assert_eq!(alleles[1].position, 3);
        assert_eq!(alleles[1].ref_frag, "T");
    }
}
