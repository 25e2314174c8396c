pub type CigarOp = rust_htslib::bam::record::Cigar;

pub trait CigarOpExt {
    fn get_ref_len(&self) -> i64;
    fn get_query_len(&self) -> i64;
}

impl CigarOpExt for CigarOp {
    fn get_ref_len(&self) -> i64 {
        match self {
            CigarOp::Match(len)
            | CigarOp::RefSkip(len)
            | CigarOp::Del(len)
            | CigarOp::Equal(len)
            | CigarOp::Diff(len) => *len as i64,
            CigarOp::Ins(_) | CigarOp::SoftClip(_) | CigarOp::HardClip(_) | CigarOp::Pad(_) => 0,
        }
    }

    fn get_query_len(&self) -> i64 {
        match self {
            CigarOp::Match(len)
            | CigarOp::Equal(len)
            | CigarOp::Diff(len)
            | CigarOp::Ins(len)
            | CigarOp::SoftClip(len) => *len as i64,
            CigarOp::RefSkip(_) | CigarOp::Del(_) | CigarOp::HardClip(_) | CigarOp::Pad(_) => 0,
        }
    }
}

pub fn ref_span(ops: &[CigarOp]) -> i64 {
    ops.iter().map(|op| op.get_ref_len()).sum()
}

pub fn query_len(ops: &[CigarOp]) -> i64 {
    ops.iter().map(|op| op.get_query_len()).sum()
}

pub fn has_soft_clip(ops: &[CigarOp]) -> bool {
    ops.iter().any(|op| matches!(op, CigarOp::SoftClip(_)))
}

/// Parses a CIGAR string such as `3S10M2I5M`.
pub fn parse_cigar(encoding: &str) -> Result<Vec<CigarOp>, String> {
    let mut ops = Vec::new();
    let mut len: u32 = 0;
    let mut has_len = false;
    for c in encoding.chars() {
        if let Some(digit) = c.to_digit(10) {
            len = len
                .checked_mul(10)
                .and_then(|l| l.checked_add(digit))
                .ok_or_else(|| format!("CIGAR length overflow: {}", encoding))?;
            has_len = true;
            continue;
        }
        if !has_len {
            return Err(format!("CIGAR op '{}' without length: {}", c, encoding));
        }
        let op = match c {
            'M' => CigarOp::Match(len),
            'I' => CigarOp::Ins(len),
            'D' => CigarOp::Del(len),
            'N' => CigarOp::RefSkip(len),
            'S' => CigarOp::SoftClip(len),
            'H' => CigarOp::HardClip(len),
            'P' => CigarOp::Pad(len),
            '=' => CigarOp::Equal(len),
            'X' => CigarOp::Diff(len),
            _ => return Err(format!("Unknown CIGAR op '{}': {}", c, encoding)),
        };
        ops.push(op);
        len = 0;
        has_len = false;
    }
    if has_len {
        return Err(format!("Trailing CIGAR length: {}", encoding));
    }
    Ok(ops)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_len() {
        let ops = vec![
            CigarOp::Match(10),
            CigarOp::Ins(5),
            CigarOp::Del(3),
            CigarOp::SoftClip(2),
        ];
        assert_eq!(query_len(&ops), 17);
        assert_eq!(ref_span(&ops), 13);
        assert!(has_soft_clip(&ops));
    }

    #[test]
    fn test_get_ref_len() {
        assert_eq!(CigarOp::Match(10).get_ref_len(), 10);
        assert_eq!(CigarOp::Ins(5).get_ref_len(), 0);
        assert_eq!(CigarOp::Del(3).get_ref_len(), 3);
        assert_eq!(CigarOp::SoftClip(2).get_ref_len(), 0);
    }

    #[test]
    fn test_parse_cigar() {
        assert_eq!(
            parse_cigar("2S3M1I4M2D1X5H").unwrap(),
            vec![
                CigarOp::SoftClip(2),
                CigarOp::Match(3),
                CigarOp::Ins(1),
                CigarOp::Match(4),
                CigarOp::Del(2),
                CigarOp::Diff(1),
                CigarOp::HardClip(5),
            ]
        );
        assert!(parse_cigar("M").is_err());
        assert!(parse_cigar("10").is_err());
        assert!(parse_cigar("3Q").is_err());
    }
}
