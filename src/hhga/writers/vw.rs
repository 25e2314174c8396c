//! Sparse record for Vowpal Wabbit: the label, the locus tag and one
//! namespace per sequence, alignment property set and score table.

use crate::hhga::allele::Allele;
use crate::hhga::locus::Locus;
use crate::hhga::reads::ReadFlags;
use crate::utils::quality::quality_to_probability;
use itertools::Itertools;

const MAPQ_CAP: u8 = 60;

fn namespace<I>(name: &str, features: I) -> String
where
    I: IntoIterator<Item = String>,
{
    let mut out = format!("|{}", name);
    for feature in features {
        out.push(' ');
        out.push_str(&feature);
    }
    out
}

/// `{column}{observed}:{weight}` with 1-based columns.
fn allele_features(seq: &[Allele]) -> Vec<String> {
    seq.iter()
        .enumerate()
        .map(|(i, allele)| format!("{}{}:{}", i + 1, allele.obs_frag, allele.weight))
        .collect()
}

fn flag_features(flags: &ReadFlags) -> Vec<String> {
    [
        ("strand", flags.is_reverse),
        ("ostrand", flags.is_mate_reverse),
        ("dup", flags.is_duplicate),
        ("qcfail", flags.is_qc_fail),
        ("fmate", flags.is_first_mate),
        ("xmate", flags.is_second_mate),
        ("ymap", flags.is_mate_mapped),
        ("paired", flags.is_paired),
        ("zprimary", flags.is_primary),
        ("iproper", flags.is_proper_pair),
    ]
    .iter()
    .map(|(name, set)| format!("{}:{}", name, u8::from(*set)))
    .collect()
}

fn mapping_quality(mapq: u8, exponentiated: bool) -> String {
    if exponentiated {
        let prob = 1.0 - quality_to_probability(mapq.min(MAPQ_CAP) as f64);
        format!("mapqual:{}", prob)
    } else {
        format!("mapqual:{}", mapq)
    }
}

pub fn to_vw(locus: &Locus) -> String {
    let mut parts = vec![format!("{} '{}", locus.label, locus.repr)];
    parts.push(namespace("ref", allele_features(&locus.reference)));
    for (index, hap) in &locus.haplotypes {
        parts.push(namespace(&format!("hap{}", index + 1), allele_features(hap)));
    }
    for (i, geno) in locus.genotypes.iter().enumerate() {
        parts.push(namespace(
            &format!("geno{}", i + 1),
            allele_features(&geno.alleles),
        ));
    }

    let alignments = locus.ordered_alignments().collect_vec();
    for (i, aln) in alignments.iter().enumerate() {
        parts.push(namespace(&format!("aln{}", i), allele_features(&aln.alleles)));
    }
    for (i, aln) in alignments.iter().enumerate() {
        let mut features = vec![mapping_quality(aln.read.mapq, locus.exponentiated)];
        features.extend(flag_features(&aln.read.flags));
        parts.push(namespace(&format!("properties{}", i), features));
    }
    for (i, aln) in alignments.iter().enumerate() {
        parts.push(namespace(
            &format!("match{}", i),
            aln.scores
                .identity
                .iter()
                .map(|(h, score)| format!("{}H:{}", h + 1, score)),
        ));
        parts.push(namespace(
            &format!("qmatch{}", i),
            aln.scores
                .weighted_identity
                .iter()
                .map(|(h, score)| format!("{}Q:{}", h + 1, score)),
        ));
        parts.push(namespace(&format!("group{}", i), [aln.group.to_string()]));
    }

    parts.push(namespace(
        "likelihood",
        locus
            .likelihoods
            .iter()
            .map(|(class, value)| format!("{}L:{}", class, value)),
    ));

    if let Some(graph) = &locus.graph {
        parts.push(namespace(
            "graph",
            graph
                .allele_coverage
                .iter()
                .map(|(allele, share)| format!("{}C:{}", allele + 1, share)),
        ));
        for (i, id) in locus.ordered.iter().enumerate() {
            if let Some(support) = graph.read_support.get(id) {
                parts.push(namespace(
                    &format!("gmatch{}", i),
                    support
                        .iter()
                        .map(|(allele, quality)| format!("{}N:{}", allele + 1, quality)),
                ));
            }
        }
    }

    parts.push(namespace(
        "software",
        locus
            .info_numeric
            .iter()
            .map(|(key, value)| format!("{}:{}", key, value)),
    ));
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hhga::locus::Params;
    use crate::hhga::reads::AlignedRead;
    use crate::hhga::sources::InMemoryReference;
    use crate::hhga::variant::Variant;

    fn locus_record(params: &Params) -> String {
        let seq = "ACGT".repeat(10);
        let reads = vec![
            AlignedRead::from_strings("r1", 10, "20M", &seq[10..30], &"?".repeat(20)).unwrap(),
        ];
        let mut variant = Variant::new("chr1", 21, "A", &["T"]);
        variant.quality = Some(42.5);
        let mut reference = InMemoryReference {
            contig: "chr1".to_string(),
            sequence: seq,
        };
        let locus = Locus::build(&variant, &reads, &mut reference, params, None).unwrap();
        to_vw(&locus)
    }

    #[test]
    fn record_layout() {
        let params = Params {
            window_length: 4,
            class_label: Some("1".to_string()),
            info_prefix: "fb".to_string(),
            ..Default::default()
        };
        let record = locus_record(&params);
        assert!(record.starts_with(
            "1 'chr1_21_A_T |ref 1G:1 2T:1 3A:1 4C:1 |hap1 1M:1 2M:1 3R:1 4M:1 |hap2 "
        ));
        assert!(
            record.contains(" |aln0 1R:30 2R:30 3R:30 4R:30 |properties0 mapqual:60 strand:0 ")
        );
        assert!(record.contains(" zprimary:1 iproper:0 |match0 1H:1 2H:0 |qmatch0 "));
        assert!(record.contains(" |group0 0+0 |likelihood 1L:1 "));
        assert!(record.ends_with(" |software fbQUAL:42.5"));
        assert!(!record.contains("|graph"));
    }

    #[test]
    fn exponentiated_mapping_quality() {
        assert_eq!(mapping_quality(70, false), "mapqual:70");
        let expected = format!("mapqual:{}", 1.0 - quality_to_probability(60.0));
        assert_eq!(mapping_quality(70, true), expected);
    }
}
