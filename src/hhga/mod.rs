pub mod allele;
pub mod grouping;
pub mod haplotype;
pub mod locus;
pub mod padding;
pub mod projection;
pub mod reads;
pub mod scoring;
pub mod sources;
pub mod variant;
pub mod writers;

pub use locus::{Locus, LocusError, Params};
