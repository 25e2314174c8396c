//! Owned variant records and the per-allele edit decomposition the haplotype
//! builder consumes.

use crate::utils::Result;
use itertools::Itertools;
use rust_htslib::bcf::{
    self,
    header::{HeaderRecord, HeaderView},
    record::Numeric,
};

/// One edit of an allele against the reference, with a 1-based position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub ref_frag: String,
    pub obs_frag: String,
    pub position: i64,
}

impl Edit {
    pub fn new(ref_frag: &[u8], obs_frag: &[u8], position: i64) -> Self {
        Edit {
            ref_frag: String::from_utf8_lossy(ref_frag).into_owned(),
            obs_frag: String::from_utf8_lossy(obs_frag).into_owned(),
            position,
        }
    }
}

/// Called alleles of one sample; `None` marks a missing call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleCall {
    pub name: String,
    pub alleles: Vec<Option<usize>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InfoValues {
    Numeric(Vec<f64>),
    Text(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct InfoField {
    pub key: String,
    pub values: InfoValues,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoType {
    Integer,
    Float,
    Flag,
    Text,
}

/// INFO field declarations of a VCF header, in header order.
pub type InfoSchema = Vec<(String, InfoType)>;

pub fn info_schema(header: &HeaderView) -> InfoSchema {
    header
        .header_records()
        .into_iter()
        .filter_map(|record| match record {
            HeaderRecord::Info { values, .. } => {
                let id = values.get("ID")?.clone();
                let info_type = match values.get("Type").map(|t| t.as_str()) {
                    Some("Integer") => InfoType::Integer,
                    Some("Float") => InfoType::Float,
                    Some("Flag") => InfoType::Flag,
                    _ => InfoType::Text,
                };
                Some((id, info_type))
            }
            _ => None,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variant {
    pub contig: String,
    /// 1-based position of the first reference base.
    pub position: i64,
    /// Reference allele first, then the alternates.
    pub alleles: Vec<String>,
    pub quality: Option<f64>,
    pub info: Vec<InfoField>,
    pub samples: Vec<SampleCall>,
    /// Value of the sample field used to derive training labels.
    pub label_value: Option<String>,
}

impl Variant {
    pub fn new(contig: &str, position: i64, reference: &str, alternates: &[&str]) -> Self {
        let mut alleles = vec![reference.to_string()];
        alleles.extend(alternates.iter().map(|a| a.to_string()));
        Variant {
            contig: contig.to_string(),
            position,
            alleles,
            quality: None,
            info: Vec::new(),
            samples: Vec::new(),
            label_value: None,
        }
    }

    /// Converts an htslib record. `label_field` names the FORMAT field of the
    /// first sample holding the training label (`GT` is rendered as a
    /// genotype string).
    pub fn from_bcf(
        record: &bcf::Record,
        header: &HeaderView,
        schema: &[(String, InfoType)],
        label_field: Option<&str>,
    ) -> Result<Variant> {
        let rid = record
            .rid()
            .ok_or_else(|| "VCF record without a contig".to_string())?;
        let contig = header
            .rid2name(rid)
            .map(|name| String::from_utf8_lossy(name).into_owned())
            .map_err(|e| e.to_string())?;
        let position = record.pos() + 1;
        let alleles = record
            .alleles()
            .iter()
            .map(|a| String::from_utf8_lossy(a).to_uppercase())
            .collect_vec();
        if alleles.is_empty() {
            return Err(format!("{}:{} has no alleles", contig, position));
        }
        let qual = record.qual();
        let quality = if qual.is_missing() || qual.is_nan() {
            None
        } else {
            Some(qual as f64)
        };

        let info = schema
            .iter()
            .filter_map(|(key, info_type)| read_info_field(record, key, *info_type))
            .collect_vec();

        let samples = read_sample_calls(record, header)?;

        let label_value = match label_field {
            None => None,
            Some("GT") => samples.first().map(|s| genotype_string(&s.alleles)),
            Some(field) => record
                .format(field.as_bytes())
                .string()
                .ok()
                .and_then(|values| {
                    values
                        .first()
                        .map(|v| String::from_utf8_lossy(v).into_owned())
                }),
        };

        Ok(Variant {
            contig,
            position,
            alleles,
            quality,
            info,
            samples,
            label_value,
        })
    }

    pub fn reference(&self) -> &str {
        &self.alleles[0]
    }

    pub fn alternates(&self) -> &[String] {
        &self.alleles[1..]
    }

    /// `chrom_pos_ref_alt1,alt2`, the key used to map predictions back to VCF.
    pub fn repr(&self) -> String {
        format!(
            "{}_{}_{}_{}",
            self.contig,
            self.position,
            self.reference(),
            self.alternates().join(",")
        )
    }

    /// Edit decomposition of every distinct allele, reference first.
    pub fn parsed_alleles(&self) -> Vec<(String, Vec<Edit>)> {
        self.alleles
            .iter()
            .unique()
            .map(|allele| {
                (
                    allele.clone(),
                    decompose(self.reference(), allele, self.position),
                )
            })
            .collect()
    }
}

fn read_info_field(record: &bcf::Record, key: &str, info_type: InfoType) -> Option<InfoField> {
    let mut info = record.info(key.as_bytes());
    let values = match info_type {
        InfoType::Float => InfoValues::Numeric(
            info.float()
                .ok()??
                .iter()
                .filter(|v| !v.is_missing() && !v.is_nan())
                .map(|&v| v as f64)
                .collect(),
        ),
        InfoType::Integer => InfoValues::Numeric(
            info.integer()
                .ok()??
                .iter()
                .filter(|v| !v.is_missing())
                .map(|&v| v as f64)
                .collect(),
        ),
        InfoType::Flag => {
            if !info.flag().ok()? {
                return None;
            }
            InfoValues::Text(vec!["1".to_string()])
        }
        InfoType::Text => InfoValues::Text(
            info.string()
                .ok()??
                .iter()
                .map(|v| String::from_utf8_lossy(v).into_owned())
                .collect(),
        ),
    };
    Some(InfoField {
        key: key.to_string(),
        values,
    })
}

fn read_sample_calls(record: &bcf::Record, header: &HeaderView) -> Result<Vec<SampleCall>> {
    if header.sample_count() == 0 {
        return Ok(Vec::new());
    }
    let genotypes = match record.genotypes() {
        Ok(genotypes) => genotypes,
        Err(e) => {
            log::debug!("Record without genotypes: {}", e);
            return Ok(Vec::new());
        }
    };
    Ok(header
        .samples()
        .iter()
        .enumerate()
        .map(|(i, name)| SampleCall {
            name: String::from_utf8_lossy(name).into_owned(),
            alleles: genotypes
                .get(i)
                .iter()
                .map(|a| a.index().map(|index| index as usize))
                .collect(),
        })
        .collect())
}

/// Renders called alleles as an unphased genotype string, e.g. `0/1` or `./.`.
pub fn genotype_string(alleles: &[Option<usize>]) -> String {
    alleles
        .iter()
        .map(|a| a.map_or(".".to_string(), |index| index.to_string()))
        .join("/")
}

/// Decomposes `alternate` against `reference` into reference-match runs and a
/// single core edit, trimming the common prefix and suffix. Equal-length
/// cores are split per base.
pub fn decompose(reference: &str, alternate: &str, position: i64) -> Vec<Edit> {
    let (r, a) = (reference.as_bytes(), alternate.as_bytes());
    if r == a {
        return vec![Edit::new(r, a, position)];
    }

    let prefix = r.iter().zip(a).take_while(|(x, y)| x == y).count();
    let suffix = r[prefix..]
        .iter()
        .rev()
        .zip(a[prefix..].iter().rev())
        .take_while(|(x, y)| x == y)
        .count();
    let r_core = &r[prefix..r.len() - suffix];
    let a_core = &a[prefix..a.len() - suffix];
    let core_pos = position + prefix as i64;

    let mut edits = Vec::new();
    if prefix > 0 {
        edits.push(Edit::new(&r[..prefix], &r[..prefix], position));
    }
    if r_core.len() == a_core.len() {
        for (i, (rb, ab)) in r_core.iter().zip(a_core).enumerate() {
            edits.push(Edit::new(&[*rb], &[*ab], core_pos + i as i64));
        }
    } else {
        edits.push(Edit::new(r_core, a_core, core_pos));
    }
    if suffix > 0 {
        let tail = &r[r.len() - suffix..];
        edits.push(Edit::new(
            tail,
            tail,
            position + (r.len() - suffix) as i64,
        ));
    }
    edits
}
