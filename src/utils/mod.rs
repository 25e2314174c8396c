mod bam_utils;
pub mod quality;
mod readers;
mod region;
mod util;

pub use bam_utils::{get_bam_header, is_bam_mapped};
pub use readers::{open_genome_reader, open_output_writer};
pub use region::GenomicRegion;
pub use util::{handle_error_and_exit, Result};
