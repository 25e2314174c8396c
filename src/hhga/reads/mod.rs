mod cigar;
mod decode;
mod read;

pub use cigar::{parse_cigar, CigarOp, CigarOpExt};
pub use decode::{base_weights, decode_read, deletion_probs, insertion_probs};
pub use read::{AlignedRead, ReadFlags, ReadSource};
