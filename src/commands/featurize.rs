use crate::cli::FeaturizeArgs;
use crate::hhga::{
    locus::fetch_alignments,
    sources::{FastaReference, HtsAlignmentSource},
    variant::{info_schema, Variant},
    writers::{render, OutputFormat},
    Locus, LocusError, Params,
};
use crate::utils::{get_bam_header, is_bam_mapped, open_output_writer, GenomicRegion, Result};
use crossbeam_channel::{bounded, Sender};
use rayon::{
    iter::{IntoParallelRefIterator, ParallelIterator},
    ThreadPoolBuilder,
};
use rust_htslib::bcf::{self, Read};
use std::{
    cell::RefCell,
    io::Write,
    path::{Path, PathBuf},
    thread,
};

#[derive(Debug, Clone)]
struct ThreadContextParams {
    genome_path: PathBuf,
    reads_paths: Vec<PathBuf>,
    contigs_paths: Vec<PathBuf>,
}

/// Per-worker readers, opened on first use.
struct LocusReaders {
    alignments: HtsAlignmentSource,
    reference: FastaReference,
}

impl LocusReaders {
    fn from_context() -> Result<LocusReaders> {
        let ctx = CTX_PARAMS
            .with(|cell| cell.borrow().clone())
            .ok_or("Thread context parameters not initialized")?;
        Ok(LocusReaders {
            alignments: HtsAlignmentSource::new(
                &ctx.reads_paths,
                &ctx.contigs_paths,
                Some(&ctx.genome_path),
            )?,
            reference: FastaReference::new(&ctx.genome_path)?,
        })
    }
}

thread_local! {
    static CTX_PARAMS: RefCell<Option<ThreadContextParams>> = const { RefCell::new(None) };
    static THREAD_READERS: RefCell<Option<LocusReaders>> = const { RefCell::new(None) };
}

const CHANNEL_BUFFER_SIZE: usize = 16;
const BATCH_SIZE: usize = 256;

pub fn featurize(args: FeaturizeArgs) -> Result<()> {
    for path in &args.reads_paths {
        if !is_bam_mapped(&get_bam_header(path)?) {
            return Err(format!("Input BAM is not mapped: {}", path.display()));
        }
    }

    let params = args.params();
    let format = if args.text_viz {
        OutputFormat::Text
    } else {
        OutputFormat::Vw
    };
    let output = open_output_writer(args.output_path.as_deref().map(Path::new))?;

    let (sender_batch, receiver_batch) = bounded(CHANNEL_BUFFER_SIZE);
    let vcf_path = args.vcf_path.clone();
    let region = args.region.clone();
    let label_field = params.label_field.clone();
    let variant_stream_thread = thread::spawn(move || {
        stream_variants_into_channel(
            &vcf_path,
            region.as_ref(),
            label_field.as_deref(),
            sender_batch,
        )
    });

    let (sender_result, receiver_result) = bounded::<Vec<String>>(CHANNEL_BUFFER_SIZE);
    let writer_thread = thread::spawn(move || -> Result<()> {
        let mut output = output;
        for records in &receiver_result {
            for record in records {
                writeln!(output, "{}", record).map_err(|e| e.to_string())?;
            }
        }
        output.flush().map_err(|e| e.to_string())
    });

    log::debug!(
        "Initializing thread pool with {} threads...",
        args.num_threads
    );
    let pool = initialize_thread_pool(
        args.num_threads,
        ThreadContextParams {
            genome_path: args.genome_path.clone(),
            reads_paths: args.reads_paths.clone(),
            contigs_paths: args.contigs_paths.clone(),
        },
    )?;

    let mut num_variants = 0;
    let mut num_records = 0;
    let mut stream_error = None;
    for batch in &receiver_batch {
        let batch = match batch {
            Ok(batch) => batch,
            Err(e) => {
                stream_error = Some(e);
                break;
            }
        };
        let records: Vec<String> = pool.install(|| {
            batch
                .par_iter()
                .filter_map(|variant| process_variant(variant, &params, format))
                .collect()
        });
        num_variants += batch.len();
        num_records += records.len();
        if sender_result.send(records).is_err() {
            break;
        }
    }

    // Clean-up
    drop(receiver_batch);
    drop(sender_result);
    let write_result = writer_thread
        .join()
        .map_err(|_| "Writer thread panicked".to_string())?;
    match variant_stream_thread.join() {
        Ok(()) => log::trace!("Variant stream thread finished"),
        Err(_) => return Err("Variant stream thread panicked".into()),
    }
    if let Some(e) = stream_error {
        return Err(e);
    }
    write_result?;
    log::info!("Featurized {} of {} variants", num_records, num_variants);
    Ok(())
}

fn stream_variants_into_channel(
    vcf_path: &Path,
    region: Option<&GenomicRegion>,
    label_field: Option<&str>,
    sender: Sender<Result<Vec<Variant>>>,
) {
    let result = match region {
        Some(region) => bcf::IndexedReader::from_path(vcf_path)
            .map_err(|e| format!("Failed to open indexed VCF {}: {}", vcf_path.display(), e))
            .and_then(|mut reader| {
                let rid = reader
                    .header()
                    .name2rid(region.contig.as_bytes())
                    .map_err(|e| format!("Region contig {}: {}", region.contig, e))?;
                reader
                    .fetch(rid, region.start, region.end)
                    .map_err(|e| format!("Failed to fetch {}: {}", region.contig, e))?;
                stream_records(&mut reader, Some(region), label_field, &sender)
            }),
        None => bcf::Reader::from_path(vcf_path)
            .map_err(|e| format!("Failed to open VCF {}: {}", vcf_path.display(), e))
            .and_then(|mut reader| stream_records(&mut reader, None, label_field, &sender)),
    };
    if let Err(e) = result {
        let _ = sender.send(Err(e));
    }
}

/// Sends batches of variants in file order. Stops early once the receiving
/// side hangs up.
fn stream_records<R: Read>(
    reader: &mut R,
    region: Option<&GenomicRegion>,
    label_field: Option<&str>,
    sender: &Sender<Result<Vec<Variant>>>,
) -> Result<()> {
    let header = reader.header().clone();
    let schema = info_schema(&header);
    let mut record = reader.empty_record();
    let mut batch = Vec::with_capacity(BATCH_SIZE);
    while let Some(result) = reader.read(&mut record) {
        result.map_err(|e| format!("Error reading VCF record: {}", e))?;
        if let Some(region) = region {
            if record.pos() < 0 || !region.intersect_position(record.pos() as u64) {
                continue;
            }
        }
        match Variant::from_bcf(&record, &header, &schema, label_field) {
            Ok(variant) => batch.push(variant),
            Err(e) => log::warn!("Skipping VCF record: {}", e),
        }
        if batch.len() == BATCH_SIZE {
            let full = std::mem::replace(&mut batch, Vec::with_capacity(BATCH_SIZE));
            if sender.send(Ok(full)).is_err() {
                return Ok(());
            }
        }
    }
    if !batch.is_empty() {
        let _ = sender.send(Ok(batch));
    }
    Ok(())
}

fn process_variant(variant: &Variant, params: &Params, format: OutputFormat) -> Option<String> {
    THREAD_READERS.with(|cell| {
        let mut slot = cell.borrow_mut();
        if slot.is_none() {
            match LocusReaders::from_context() {
                Ok(readers) => *slot = Some(readers),
                Err(e) => {
                    log::error!("Failed to open readers: {}", e);
                    return None;
                }
            }
        }
        let readers = slot.as_mut()?;

        let result = fetch_alignments(&mut readers.alignments, variant, params.window_length)
            .and_then(|reads| {
                let locus = Locus::build(variant, &reads, &mut readers.reference, params, None)?;
                Ok(render(&locus, format))
            });
        match result {
            Ok(record) => Some(record),
            Err(LocusError::NoCoverage(repr)) => {
                log::debug!("{}: no alignments in window, skipping", repr);
                None
            }
            Err(err) => {
                log::error!("Error featurizing {}: {}", variant.repr(), err);
                None
            }
        }
    })
}

fn initialize_thread_pool(
    num_threads: usize,
    thread_context: ThreadContextParams,
) -> Result<rayon::ThreadPool> {
    ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .thread_name(|i| format!("hhga-{}", i))
        .start_handler(move |_thread_index| {
            CTX_PARAMS.with(|cell| {
                *cell.borrow_mut() = Some(thread_context.clone());
            });
            log::trace!("Initialized thread {:?}", std::thread::current().id());
        })
        .exit_handler(|_thread_index| {
            THREAD_READERS.with(|cell| {
                *cell.borrow_mut() = None;
            });
            CTX_PARAMS.with(|cell| {
                *cell.borrow_mut() = None;
            });
        })
        .build()
        .map_err(|e| format!("Failed to initialize thread pool: {}", e))
}
