//! Re-annotates model predictions onto the variants they were made for.

use crate::hhga::scoring::{genotype_for_label, genotype_for_labels, label_for_genotype};
use crate::utils::Result;
use itertools::Itertools;
use rust_htslib::bcf::{self, record::GenotypeAllele, Format};
use std::collections::BTreeMap;
use std::path::Path;

const INFO_LINE: &str =
    r#"##INFO=<ID=prediction,Number=1,Type=Float,Description="hhga prediction for site">"#;
const GT_LINE: &str = r#"##FORMAT=<ID=GT,Number=1,Type=String,Description="Genotype">"#;

/// One line of model output: `prediction 'chrom_pos_ref_alt1,alt2 ...`, or
/// `label:weight ... 'chrom_pos_ref_alts` for multiclass predictions.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub value: f32,
    pub contig: String,
    /// 1-based.
    pub position: i64,
    pub reference: String,
    /// Alternates in tag order, including any equal to the reference.
    pub alternates: Vec<String>,
    /// Per-label weights of a multiclass prediction.
    pub labels: Option<BTreeMap<usize, f64>>,
}

impl Prediction {
    pub fn parse(line: &str) -> Result<Prediction> {
        let mut fields = line.split_whitespace();
        let first = fields
            .next()
            .ok_or_else(|| format!("Expected a prediction and a tag: {}", line))?;

        let (value, labels, tag) = if first.contains(':') {
            let mut labels = BTreeMap::new();
            let mut tag = None;
            for field in std::iter::once(first).chain(fields.by_ref()) {
                if let Some(stripped) = field.strip_prefix('\'') {
                    tag = Some(stripped);
                    break;
                }
                let (label, weight) = field
                    .split_once(':')
                    .and_then(|(label, weight)| {
                        Some((label.parse::<usize>().ok()?, weight.parse::<f64>().ok()?))
                    })
                    .ok_or_else(|| format!("Invalid multiclass prediction '{}'", field))?;
                *labels.entry(label).or_insert(0.0) += weight;
            }
            let tag = tag.ok_or_else(|| format!("Expected a quoted tag: {}", line))?;
            let value = label_for_genotype(&genotype_for_labels(&labels)) as f32;
            (value, Some(labels), tag)
        } else {
            let value = first
                .parse::<f32>()
                .map_err(|e| format!("Invalid prediction '{}': {}", first, e))?;
            let tag = fields
                .next()
                .ok_or_else(|| format!("Expected a prediction and a tag: {}", line))?;
            (value, None, tag.trim_start_matches('\''))
        };

        // contig names may contain underscores, alleles cannot
        let parts = tag.rsplitn(4, '_').collect_vec();
        let [alts, reference, position, contig] = parts[..] else {
            return Err(format!("Malformed locus tag: {}", tag));
        };
        let position = position
            .parse::<i64>()
            .map_err(|e| format!("Invalid position in {}: {}", tag, e))?;
        let alternates = alts
            .split(',')
            .filter(|alt| !alt.is_empty())
            .map(|alt| alt.to_string())
            .collect();

        Ok(Prediction {
            value,
            contig: contig.to_string(),
            position,
            reference: reference.to_string(),
            alternates,
            labels,
        })
    }

    /// Genotype class label the prediction stands for.
    pub fn class_label(&self) -> String {
        (self.value.round() as i64).to_string()
    }

    /// Alternates that differ from the reference, in tag order.
    pub fn distinct_alternates(&self) -> Vec<&str> {
        self.alternates
            .iter()
            .filter(|alt| **alt != self.reference)
            .map(|alt| alt.as_str())
            .collect()
    }

    /// Predicted genotype over the written alleles. Indices refer to the tag's
    /// alternates first and are then mapped onto [`Self::distinct_alternates`];
    /// an alternate equal to the reference maps to 0.
    pub fn genotype(&self) -> String {
        let gt = match &self.labels {
            Some(labels) => genotype_for_labels(labels),
            None => genotype_for_label(&self.class_label(), self.alternates.len()),
        };
        if gt.is_empty() {
            return "./.".to_string();
        }

        let mut kept = 0;
        let mut remap = vec![Some(0)];
        for alt in &self.alternates {
            if *alt == self.reference {
                remap.push(Some(0));
            } else {
                kept += 1;
                remap.push(Some(kept));
            }
        }
        gt.split(['/', '|'])
            .map(|allele| {
                allele
                    .parse::<usize>()
                    .ok()
                    .and_then(|index| remap.get(index).copied().flatten())
                    .map_or(".".to_string(), |index| index.to_string())
            })
            .join("/")
    }
}

fn parse_genotype(gt: &str) -> Vec<GenotypeAllele> {
    gt.split(['/', '|'])
        .map(|allele| match allele.parse::<i32>() {
            Ok(index) => GenotypeAllele::Unphased(index),
            Err(_) => GenotypeAllele::UnphasedMissing,
        })
        .collect()
}

pub struct PredictionWriter {
    writer: bcf::Writer,
    genotypes: bool,
}

impl PredictionWriter {
    /// Opens an uncompressed VCF on `output` (stdout when `None`). A sample
    /// column holding the predicted genotype is written when `sample` is set.
    pub fn new(contigs: &[String], sample: Option<&str>, output: Option<&Path>) -> Result<Self> {
        let mut header = bcf::header::Header::new();
        header.push_record(format!("##source={}", env!("CARGO_PKG_NAME")).as_bytes());
        header.push_record(
            format!("##{}Version={}", env!("CARGO_PKG_NAME"), *crate::cli::FULL_VERSION)
                .as_bytes(),
        );
        header.push_record(INFO_LINE.as_bytes());
        if sample.is_some() {
            header.push_record(GT_LINE.as_bytes());
        }
        for contig in contigs {
            header.push_record(format!("##contig=<ID={}>", contig).as_bytes());
        }
        if let Some(sample) = sample {
            header.push_sample(sample.as_bytes());
        }

        let writer = match output {
            Some(path) => bcf::Writer::from_path(path, &header, true, Format::Vcf)
                .map_err(|e| format!("Invalid VCF output path {}: {}", path.display(), e))?,
            None => bcf::Writer::from_stdout(&header, true, Format::Vcf)
                .map_err(|e| format!("Failed to open VCF on stdout: {}", e))?,
        };
        Ok(PredictionWriter {
            writer,
            genotypes: sample.is_some(),
        })
    }

    pub fn write(&mut self, prediction: &Prediction) -> Result<()> {
        let mut record = self.writer.empty_record();
        let rid = self
            .writer
            .header()
            .name2rid(prediction.contig.as_bytes())
            .map_err(|e| format!("Unknown contig {}: {}", prediction.contig, e))?;
        record.set_rid(Some(rid));
        record.set_pos(prediction.position - 1);
        record.set_qual(0.0);

        let alleles = std::iter::once(prediction.reference.as_str())
            .chain(prediction.distinct_alternates())
            .map(|a| a.as_bytes())
            .collect_vec();
        record
            .set_alleles(&alleles)
            .map_err(|e| format!("Failed to set alleles: {}", e))?;
        record
            .push_info_float(b"prediction", &[prediction.value])
            .map_err(|e| format!("Failed to set prediction: {}", e))?;

        if self.genotypes {
            record
                .push_genotypes(&parse_genotype(&prediction.genotype()))
                .map_err(|e| format!("Failed to set genotype: {}", e))?;
        }

        self.writer
            .write(&record)
            .map_err(|e| format!("Failed to write VCF record: {}", e))
    }
}
