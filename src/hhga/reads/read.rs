//! Module for representing alignment records in the form the decoder consumes.
//!

use super::cigar::{self, CigarOp};
use rust_htslib::bam::{self, ext::BamRecordExtensions};
use std::str;

/// Where an alignment came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadSource {
    /// A conventional sequencing read.
    Read,
    /// An assembled contig (unitig) aligned back to the reference.
    Contig,
}

/// SAM flags the serializers expose as features.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadFlags {
    pub is_reverse: bool,
    pub is_mate_reverse: bool,
    pub is_duplicate: bool,
    pub is_qc_fail: bool,
    pub is_first_mate: bool,
    pub is_second_mate: bool,
    pub is_mate_mapped: bool,
    pub is_paired: bool,
    pub is_primary: bool,
    pub is_proper_pair: bool,
}

/// A mapped alignment record.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedRead {
    /// Query name.
    pub id: String,
    pub source: ReadSource,
    /// 0-based leftmost reference position.
    pub start: i64,
    /// 0-based exclusive reference end (`start` plus consumed reference length).
    pub end: i64,
    pub flags: ReadFlags,
    pub mapq: u8,
    /// Query bases, soft-clipped bases included.
    pub bases: Vec<u8>,
    /// Phred base qualities, one per base.
    pub quals: Vec<u8>,
    pub cigar: Vec<CigarOp>,
}

impl AlignedRead {
    /// Creates an `AlignedRead` from an HTSlib record.
    pub fn from_hts_rec(rec: &bam::Record, source: ReadSource) -> AlignedRead {
        let flags = ReadFlags {
            is_reverse: rec.is_reverse(),
            is_mate_reverse: rec.is_mate_reverse(),
            is_duplicate: rec.is_duplicate(),
            is_qc_fail: rec.is_quality_check_failed(),
            is_first_mate: rec.is_first_in_template(),
            is_second_mate: rec.is_last_in_template(),
            is_mate_mapped: rec.is_paired() && !rec.is_mate_unmapped(),
            is_paired: rec.is_paired(),
            is_primary: !rec.is_secondary() && !rec.is_supplementary(),
            is_proper_pair: rec.is_proper_pair(),
        };

        let bases = rec.seq().as_bytes();
        // htslib reports absent qualities as 0xff
        let quals = if rec.qual().first() == Some(&0xff) {
            vec![0; bases.len()]
        } else {
            rec.qual().to_vec()
        };

        AlignedRead {
            id: String::from_utf8_lossy(rec.qname()).into_owned(),
            source,
            start: rec.pos(),
            end: rec.reference_end(),
            flags,
            mapq: rec.mapq(),
            bases,
            quals,
            cigar: rec.cigar().take().to_vec(),
        }
    }

    /// Builds a read from text fields, with qualities in Phred+33 encoding.
    pub fn from_strings(
        id: &str,
        start: i64,
        cigar_str: &str,
        bases: &str,
        quals: &str,
    ) -> Result<AlignedRead, String> {
        let cigar = cigar::parse_cigar(cigar_str)?;
        let end = start + cigar::ref_span(&cigar);
        Ok(AlignedRead {
            id: id.to_string(),
            source: ReadSource::Read,
            start,
            end,
            flags: ReadFlags {
                is_primary: true,
                ..Default::default()
            },
            mapq: 60,
            bases: bases.as_bytes().to_vec(),
            quals: quals
                .bytes()
                .map(|c| crate::utils::quality::char_to_quality(c).max(0) as u8)
                .collect(),
            cigar,
        })
    }

    pub fn is_soft_clipped(&self) -> bool {
        cigar::has_soft_clip(&self.cigar)
    }

    pub fn bases_str(&self) -> &str {
        str::from_utf8(&self.bases).unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_strings_decodes_qualities_and_span() {
        let read =
            AlignedRead::from_strings("r1", 100, "2S4M1D3M", "AACGTACGT", "?????#???").unwrap();
        assert_eq!(read.end, 108);
        assert_eq!(read.quals, vec![30, 30, 30, 30, 30, 2, 30, 30, 30]);
        assert!(read.is_soft_clipped());
        assert_eq!(read.bases_str(), "AACGTACGT");
    }
}
