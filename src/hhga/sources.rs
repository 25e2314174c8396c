//! External collaborators of the locus builder and their htslib-backed
//! implementations.

use super::reads::{AlignedRead, ReadSource};
use super::variant::Variant;
use crate::utils::{open_genome_reader, Result};
use rust_htslib::bam::{self, Read, Record};
use rust_htslib::faidx;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub trait AlignmentSource {
    /// Mapped alignments overlapping the 0-based half-open range.
    fn fetch(&mut self, contig: &str, start: i64, end: i64) -> Result<Vec<AlignedRead>>;
}

pub trait ReferenceSource {
    /// Up to `len` uppercased reference bases starting at 0-based `start`.
    fn fetch(&mut self, contig: &str, start: i64, len: usize) -> Result<String>;
}

/// Node id of a sequence graph.
pub type NodeId = u64;

/// Realigns reads against a local variation graph built for one variant.
pub trait GraphAligner {
    /// Builds the graph over `[start, end)` holding only `variant`.
    fn construct(&mut self, contig: &str, start: i64, end: i64, variant: &Variant) -> Result<()>;
    /// Realigns a read and returns the base quality it accumulated per node.
    fn realign(&mut self, bases: &[u8], quals: &[u8]) -> Result<BTreeMap<NodeId, f64>>;
    /// Coverage accumulated per node over all realigned reads.
    fn node_coverage(&self) -> BTreeMap<NodeId, f64>;
    /// Nodes that make up each allele, keyed by allele index.
    fn allele_nodes(&self) -> BTreeMap<usize, Vec<NodeId>>;
}

struct BamInput {
    path: PathBuf,
    reader: bam::IndexedReader,
    source: ReadSource,
}

/// Reads and assembled contigs from indexed BAM/CRAM files.
pub struct HtsAlignmentSource {
    inputs: Vec<BamInput>,
}

impl HtsAlignmentSource {
    pub fn new(reads: &[PathBuf], contigs: &[PathBuf], reference: Option<&Path>) -> Result<Self> {
        let mut inputs = Vec::with_capacity(reads.len() + contigs.len());
        let tagged = reads
            .iter()
            .map(|p| (p, ReadSource::Read))
            .chain(contigs.iter().map(|p| (p, ReadSource::Contig)));
        for (path, source) in tagged {
            let mut reader = bam::IndexedReader::from_path(path).map_err(|e| {
                format!("Failed to create bam reader for {}: {}", path.display(), e)
            })?;
            if let Some(reference) = reference {
                reader
                    .set_reference(reference)
                    .map_err(|e| format!("Failed to set reference for {}: {}", path.display(), e))?;
            }
            inputs.push(BamInput {
                path: path.clone(),
                reader,
                source,
            });
        }
        Ok(HtsAlignmentSource { inputs })
    }
}

impl AlignmentSource for HtsAlignmentSource {
    fn fetch(&mut self, contig: &str, start: i64, end: i64) -> Result<Vec<AlignedRead>> {
        let mut reads = Vec::new();
        for input in self.inputs.iter_mut() {
            if let Err(msg) = input.reader.fetch((contig, start, end)) {
                log::warn!("Fetch error in {}: {}", input.path.display(), msg);
                continue;
            }
            let mut record = Record::new();
            while let Some(result) = input.reader.read(&mut record) {
                result.map_err(|e| format!("{}: {}", input.path.display(), e))?;
                if record.is_unmapped() {
                    continue;
                }
                reads.push(AlignedRead::from_hts_rec(&record, input.source));
            }
        }
        Ok(reads)
    }
}

/// Reference sequence from an indexed FASTA file.
pub struct FastaReference {
    reader: faidx::Reader,
}

impl FastaReference {
    pub fn new(path: &Path) -> Result<Self> {
        Ok(FastaReference {
            reader: open_genome_reader(path)?,
        })
    }
}

impl ReferenceSource for FastaReference {
    fn fetch(&mut self, contig: &str, start: i64, len: usize) -> Result<String> {
        if len == 0 {
            return Ok(String::new());
        }
        let start = start.max(0) as usize;
        // faidx ends are inclusive
        self.reader
            .fetch_seq_string(contig, start, start + len - 1)
            .map(|seq| seq.to_uppercase())
            .map_err(|e| {
                format!(
                    "Error fetching sequence for region {}:{}-{}: {}",
                    contig,
                    start,
                    start + len,
                    e
                )
            })
    }
}

/// Alignments held in memory, for tests and library callers that decode
/// records themselves.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAlignments {
    pub contig: String,
    pub reads: Vec<AlignedRead>,
}

impl AlignmentSource for InMemoryAlignments {
    fn fetch(&mut self, contig: &str, start: i64, end: i64) -> Result<Vec<AlignedRead>> {
        if contig != self.contig {
            return Ok(Vec::new());
        }
        Ok(self
            .reads
            .iter()
            .filter(|r| r.start < end && r.end > start)
            .cloned()
            .collect())
    }
}

/// A single contig held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryReference {
    pub contig: String,
    pub sequence: String,
}

impl ReferenceSource for InMemoryReference {
    fn fetch(&mut self, contig: &str, start: i64, len: usize) -> Result<String> {
        if contig != self.contig {
            return Err(format!("Unknown contig {}", contig));
        }
        let start = (start.max(0) as usize).min(self.sequence.len());
        let end = (start + len).min(self.sequence.len());
        Ok(self.sequence[start..end].to_uppercase())
    }
}
