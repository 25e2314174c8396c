use crate::utils::Result;

/// A 0-based, half-open genomic interval. An absent `end` means "to the end
/// of the contig".
#[derive(Debug, PartialEq, Clone)]
pub struct GenomicRegion {
    pub contig: String,
    pub start: u64,
    pub end: Option<u64>,
}

impl GenomicRegion {
    pub fn new(contig: impl Into<String>, start: u64, end: Option<u64>) -> Result<Self> {
        if let Some(end) = end {
            if start >= end {
                return Err(format!("Invalid region: start {} >= end {}", start, end));
            }
        }

        Ok(Self {
            contig: contig.into(),
            start,
            end,
        })
    }

    /// Parses samtools-style regions: `chr`, `chr:pos`, `chr:start-end`,
    /// `chr:start..end` and `chr:start-`. Coordinates are 1-based inclusive.
    pub fn from_string(encoding: &str) -> Result<Self> {
        let error_msg = || format!("Invalid region encoding: {}", encoding);
        let (contig, range) = match encoding.split_once(':') {
            None => return Self::new(encoding, 0, None),
            Some((contig, range)) => (contig, range),
        };
        if contig.is_empty() || range.contains(':') {
            return Err(error_msg());
        }

        let parse = |s: &str| s.replace(',', "").parse::<u64>().map_err(|_| error_msg());
        let (start, end) = match range.split_once("..").or_else(|| range.split_once('-')) {
            None => {
                let pos = parse(range)?;
                (pos, Some(pos))
            }
            Some((start, "")) => (parse(start)?, None),
            Some((start, end)) => (parse(start)?, Some(parse(end)?)),
        };
        if start == 0 {
            return Err(error_msg());
        }

        Self::new(contig, start - 1, end)
    }

    pub fn intersect_position(&self, position: u64) -> bool {
        position >= self.start && self.end.map_or(true, |end| position < end)
    }
}
