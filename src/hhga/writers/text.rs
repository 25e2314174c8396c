//! Human-readable matrix: one character per column, one row per sequence.

use crate::hhga::allele::sequence_to_string;
use crate::hhga::locus::{AlignmentFeatures, Locus};
use crate::hhga::reads::ReadFlags;
use itertools::Itertools;

const LABEL_WIDTH: usize = 12;

/// Ten flag characters, upper case when the flag is set.
fn flag_chars(flags: &ReadFlags) -> String {
    [
        (flags.is_reverse, 'S'),
        (flags.is_mate_reverse, 'O'),
        (flags.is_duplicate, 'D'),
        (flags.is_qc_fail, 'Q'),
        (flags.is_first_mate, 'F'),
        (flags.is_second_mate, 'X'),
        (flags.is_mate_mapped, 'Y'),
        (flags.is_paired, 'P'),
        (flags.is_primary, 'Z'),
        (flags.is_proper_pair, 'I'),
    ]
    .iter()
    .map(|&(set, c)| if set { c } else { c.to_ascii_lowercase() })
    .collect()
}

fn alignment_row(aln: &AlignmentFeatures) -> String {
    let matches = aln
        .scores
        .identity
        .values()
        .map(|score| format!("{:.1}", score))
        .join(" ");
    format!(
        "{}  {} {} {} {} {}",
        flag_chars(&aln.read.flags),
        sequence_to_string(&aln.alleles),
        matches,
        aln.read.mapq,
        aln.read.id,
        aln.group
    )
}

pub fn to_text(locus: &Locus) -> String {
    let mut lines = vec![locus.repr.clone()];
    lines.push(format!(
        "{:<width$}{}",
        "reference",
        sequence_to_string(&locus.reference),
        width = LABEL_WIDTH
    ));
    for hap in locus.haplotypes.values() {
        lines.push(format!(
            "{:<width$}{}",
            "hap",
            sequence_to_string(hap),
            width = LABEL_WIDTH
        ));
    }
    for geno in &locus.genotypes {
        lines.push(format!(
            "{:<width$}{}",
            "geno",
            sequence_to_string(&geno.alleles),
            width = LABEL_WIDTH
        ));
    }
    lines.extend(locus.ordered_alignments().map(alignment_row));

    lines.push(format!(
        "likelihoods {}",
        locus
            .likelihoods
            .iter()
            .map(|(class, value)| format!("{}:{:.3}", class, value))
            .join(" ")
    ));
    let info = locus
        .info_numeric
        .iter()
        .map(|(key, value)| format!("{}:{}", key, value))
        .chain(
            locus
                .info_text
                .iter()
                .map(|(key, value)| format!("{}:{}", key, value)),
        )
        .join(" ");
    lines.push(info);
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hhga::locus::Params;
    use crate::hhga::reads::AlignedRead;
    use crate::hhga::sources::InMemoryReference;
    use crate::hhga::variant::Variant;

    #[test]
    fn flags_render_as_case() {
        let flags = ReadFlags {
            is_reverse: true,
            is_primary: true,
            ..Default::default()
        };
        assert_eq!(flag_chars(&flags), "SodqfxypZi");
    }

    #[test]
    fn text_matrix_rows_share_width() {
        let seq = "ACGT".repeat(10);
        let mut bases = seq[10..30].to_string();
        bases.replace_range(10..11, "T");
        let reads = vec![
            AlignedRead::from_strings("alt", 10, "20M", &bases, &"?".repeat(20)).unwrap(),
            AlignedRead::from_strings("ref", 12, "18M", &seq[12..30], &"?".repeat(18)).unwrap(),
        ];
        let mut variant = Variant::new("chr1", 21, "A", &["T"]);
        variant.quality = Some(20.0);
        let mut reference = InMemoryReference {
            contig: "chr1".to_string(),
            sequence: seq,
        };
        let params = Params {
            window_length: 10,
            ..Default::default()
        };
        let locus = Locus::build(&variant, &reads, &mut reference, &params, None).unwrap();
        let text = to_text(&locus);
        let lines = text.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "chr1_21_A_T");
        assert_eq!(lines[1], "reference   TACGTACGTA");
        assert_eq!(lines[2], format!("{:<12}{}", "hap", "     .    "));
        assert_eq!(lines[3], format!("{:<12}{}", "hap", "     T    "));
        assert_eq!(lines[4], "sodqfxypZi  .....T.... 0.0 1.0 60 alt 1+0");
        assert_eq!(lines[5], "sodqfxypZi  .......... 1.0 0.0 60 ref 0+0");
        assert!(lines[6].starts_with("likelihoods 1:"));
        assert_eq!(lines[7], "QUAL:20");
    }
}
