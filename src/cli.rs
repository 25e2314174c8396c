use crate::hhga::Params;
use crate::utils::{GenomicRegion, Result};
use clap::{ArgAction, ArgGroup, Parser, Subcommand};
use env_logger::fmt::Color;
use log::{Level, LevelFilter};
use once_cell::sync::Lazy;
use std::{
    io::Write,
    path::{Path, PathBuf},
};

pub static FULL_VERSION: Lazy<String> = Lazy::new(|| {
    format!(
        "{}-{}",
        env!("CARGO_PKG_VERSION"),
        env!("VERGEN_GIT_DESCRIBE")
    )
});

#[derive(Parser)]
#[command(name="hhga",
          author="Erik Garrison <erik.garrison@gmail.com>\nNicolás Della Penna <nikete@gmail.com>",
          version=&**FULL_VERSION,
          about="Haplotypes, genotypes and alignments as fixed-width feature matrices",
          long_about = None,
          disable_help_subcommand = true,
          help_template = "{name} {version}\n{author}\n{about-section}\n{usage-heading}\n    {usage}\n\n{all-args}{after-help}",
          )]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[clap(short = 'v')]
    #[clap(long = "verbose")]
    #[clap(action = ArgAction::Count, help = "Specify multiple times to increase verbosity level (e.g., -vv for more verbosity)")]
    pub verbosity: u8,
}

#[derive(Subcommand)]
pub enum Command {
    #[clap(about = "Write one feature record per candidate variant")]
    Featurize(FeaturizeArgs),
    #[clap(about = "Turn model predictions back into VCF records")]
    Annotate(AnnotateArgs),
}

#[derive(Parser, Debug)]
#[command(group(ArgGroup::new("featurize")))]
#[command(group(ArgGroup::new("label").args(["class_label", "gt_class"])))]
#[command(arg_required_else_help(true))]
pub struct FeaturizeArgs {
    #[clap(required = true)]
    #[clap(short = 'f')]
    #[clap(long = "fasta-reference")]
    #[clap(help = "Path to reference genome FASTA")]
    #[clap(value_name = "FASTA")]
    #[arg(value_parser = check_file_exists)]
    pub genome_path: PathBuf,

    #[clap(required = true)]
    #[clap(short = 'b')]
    #[clap(long = "bam")]
    #[clap(help = "Indexed BAM/CRAM file with aligned reads (may be repeated)")]
    #[clap(value_name = "READS")]
    #[arg(value_parser = check_file_exists)]
    pub reads_paths: Vec<PathBuf>,

    #[clap(short = 'u')]
    #[clap(long = "unitigs")]
    #[clap(help = "Indexed BAM/CRAM file with assembled contigs aligned to the reference")]
    #[clap(value_name = "CONTIGS")]
    #[arg(value_parser = check_file_exists)]
    pub contigs_paths: Vec<PathBuf>,

    #[clap(required = true)]
    #[clap(short = 'c')]
    #[clap(long = "vcf")]
    #[clap(help = "VCF/BCF file with candidate variants")]
    #[clap(value_name = "VCF")]
    #[arg(value_parser = check_file_exists)]
    pub vcf_path: PathBuf,

    #[clap(short = 'r')]
    #[clap(long = "region")]
    #[clap(help = "Only featurize variants in this region (requires an indexed VCF)")]
    #[clap(value_name = "REGION")]
    #[arg(value_parser = GenomicRegion::from_string)]
    pub region: Option<GenomicRegion>,

    #[clap(short = 'w')]
    #[clap(long = "window-size")]
    #[clap(help = "Width of the feature window in columns")]
    #[clap(value_name = "WINDOW")]
    #[clap(default_value = "50")]
    #[arg(value_parser = window_in_range)]
    pub window_length: usize,

    #[clap(short = 'o')]
    #[clap(long = "output")]
    #[clap(help = "Output file, gzip-compressed when ending in .gz [default: stdout]")]
    #[clap(value_name = "OUTPUT")]
    #[arg(value_parser = check_prefix_path)]
    pub output_path: Option<String>,

    #[clap(short = 't')]
    #[clap(long = "threads")]
    #[clap(help = "Number of threads")]
    #[clap(value_name = "THREADS")]
    #[clap(default_value = "1")]
    #[arg(value_parser = threads_in_range)]
    pub num_threads: usize,

    #[clap(short = 'x')]
    #[clap(long = "text-viz")]
    #[clap(help = "Write the human-readable matrix instead of sparse records")]
    pub text_viz: bool,

    #[clap(help_heading("Labels"))]
    #[clap(long = "class-label")]
    #[clap(value_name = "LABEL")]
    #[clap(help = "Label written for every record")]
    pub class_label: Option<String>,

    #[clap(help_heading("Labels"))]
    #[clap(short = 'g')]
    #[clap(long = "gt-class")]
    #[clap(value_name = "FIELD")]
    #[clap(help = "Derive the label from this sample field (e.g. GT) of the first sample")]
    pub gt_class: Option<String>,

    #[clap(help_heading("Labels"))]
    #[clap(short = 'm')]
    #[clap(long = "multiclass")]
    #[clap(help = "Write genotype labels as multiclass `allele:weight` lists")]
    pub multiclass: bool,

    #[clap(help_heading("Advanced"))]
    #[clap(short = 'n')]
    #[clap(long = "name-prefix")]
    #[clap(value_name = "PREFIX")]
    #[clap(help = "Prefix of the caller annotation feature names")]
    #[clap(default_value = "")]
    pub info_prefix: String,

    #[clap(help_heading("Advanced"))]
    #[clap(short = 'e')]
    #[clap(long = "exponentiate")]
    #[clap(help = "Weight columns by probability instead of Phred quality")]
    pub exponentiate: bool,

    #[clap(help_heading("Advanced"))]
    #[clap(short = 'd')]
    #[clap(long = "max-depth")]
    #[clap(value_name = "MAX_DEPTH")]
    #[clap(help = "Alignments kept per group and strand, 0 keeps all")]
    #[clap(default_value = "0")]
    pub max_depth: usize,

    #[clap(help_heading("Advanced"))]
    #[clap(short = 'C')]
    #[clap(long = "min-count")]
    #[clap(value_name = "COUNT")]
    #[clap(help = "Alleles seen in fewer alignments revert to reference")]
    #[clap(default_value = "0")]
    pub min_allele_count: usize,

    #[clap(help_heading("Advanced"))]
    #[clap(short = 's')]
    #[clap(long = "show-bases")]
    #[clap(help = "Keep reference-matching bases instead of the R placeholder")]
    pub show_bases: bool,

    #[clap(help_heading("Advanced"))]
    #[clap(short = 'a')]
    #[clap(long = "assume-ref")]
    #[clap(help = "Fill haplotype columns outside the variant with the reference")]
    pub assume_ref: bool,

    #[clap(help_heading("Advanced"))]
    #[clap(short = 'p')]
    #[clap(long = "pad-haplotypes")]
    #[clap(help = "Left-pad haplotypes to a common length")]
    pub pad_haplotypes: bool,
}

impl FeaturizeArgs {
    pub fn params(&self) -> Params {
        Params {
            window_length: self.window_length,
            max_depth: self.max_depth,
            min_allele_count: self.min_allele_count,
            exponentiate: self.exponentiate,
            show_bases: self.show_bases,
            assume_ref: self.assume_ref,
            pad_haplotypes: self.pad_haplotypes,
            class_label: self.class_label.clone(),
            label_field: self.gt_class.clone(),
            multiclass: self.multiclass,
            info_prefix: self.info_prefix.clone(),
        }
    }
}

#[derive(Parser, Debug)]
#[command(group(ArgGroup::new("annotate")))]
pub struct AnnotateArgs {
    #[clap(short = 'g')]
    #[clap(long = "genotypes")]
    #[clap(help = "Predictions are genotype classes; write a GT field")]
    pub genotypes: bool,

    #[clap(long = "sample-name")]
    #[clap(value_name = "SAMPLE_NAME")]
    #[clap(help = "Sample name of the GT column")]
    #[clap(default_value = "sample")]
    #[arg(value_parser = check_sample_name_nonempty)]
    pub sample_name: String,

    #[clap(short = 'o')]
    #[clap(long = "output")]
    #[clap(help = "Output VCF [default: stdout]")]
    #[clap(value_name = "OUTPUT")]
    #[arg(value_parser = check_prefix_path)]
    pub output_path: Option<String>,
}

pub fn init_verbose(args: &Cli) {
    let filter_level: LevelFilter = match args.verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };

    env_logger::Builder::from_default_env()
        .format(|buf, record| {
            let level = record.level();
            let mut style = buf.style();
            match record.level() {
                Level::Error => style.set_color(Color::Red),
                Level::Warn => style.set_color(Color::Yellow),
                Level::Info => style.set_color(Color::Green),
                Level::Debug => style.set_color(Color::Blue),
                Level::Trace => style.set_color(Color::Cyan),
            };

            writeln!(
                buf,
                "{} [{}] - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                style.value(level),
                record.args()
            )
        })
        .filter_level(filter_level)
        .init();
}

fn check_prefix_path(s: &str) -> Result<String> {
    let path = Path::new(s);
    if let Some(parent_dir) = path.parent() {
        if !parent_dir.as_os_str().is_empty() && !parent_dir.exists() {
            return Err(format!("Path does not exist: {}", parent_dir.display()));
        }
    }
    Ok(s.to_string())
}

fn threads_in_range(s: &str) -> Result<usize> {
    let thread: usize = s
        .parse()
        .map_err(|_| format!("`{}` is not a valid thread number", s))?;
    if thread >= 1 {
        Ok(thread)
    } else {
        Err("Number of threads must be at least 1".into())
    }
}

fn window_in_range(s: &str) -> Result<usize> {
    let window: usize = s
        .parse()
        .map_err(|_| format!("`{}` is not a valid window size", s))?;
    if window >= 1 {
        Ok(window)
    } else {
        Err("Window size must be at least 1".into())
    }
}

fn check_file_exists(s: &str) -> Result<PathBuf> {
    let path = Path::new(s);
    if !path.exists() {
        Err(format!("File does not exist: {}", path.display()))
    } else {
        Ok(path.to_path_buf())
    }
}

fn check_sample_name_nonempty(s: &str) -> Result<String> {
    if s.trim().is_empty() {
        Err("Sample name cannot be an empty string".to_string())
    } else {
        Ok(s.to_string())
    }
}
