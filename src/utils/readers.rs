use super::Result;
use flate2::{write::GzEncoder, Compression};
use rust_htslib::faidx;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

fn is_gzipped(path: &Path) -> bool {
    let path_str = path.to_string_lossy().to_lowercase();
    path_str.ends_with(".gz") || path_str.ends_with(".gzip")
}

/// Opens the feature output: stdout when no path is given, a gzip stream for
/// `.gz` paths and a plain file otherwise.
pub fn open_output_writer(path: Option<&Path>) -> Result<Box<dyn Write + Send>> {
    let path = match path {
        None => return Ok(Box::new(BufWriter::new(io::stdout()))),
        Some(path) => path,
    };
    let file = File::create(path)
        .map_err(|e| format!("Failed to create output {}: {}", path.display(), e))?;
    if is_gzipped(path) {
        Ok(Box::new(BufWriter::new(GzEncoder::new(
            file,
            Compression::default(),
        ))))
    } else {
        Ok(Box::new(BufWriter::new(file)))
    }
}

pub fn open_genome_reader(path: &Path) -> Result<faidx::Reader> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .ok_or_else(|| format!("Reference path has no extension: {}", path.display()))?;
    let fai_path = path.with_extension(extension.to_owned() + ".fai");
    if !fai_path.exists() {
        return Err(format!(
            "Reference index file not found: {}. Create it using 'samtools faidx {}'",
            fai_path.display(),
            path.display()
        ));
    }
    faidx::Reader::from_path(path).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::MultiGzDecoder;
    use std::io::Read;

    #[test]
    fn gz_output_is_compressed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("features.vw.gz");
        {
            let mut writer = open_output_writer(Some(&path)).unwrap();
            writeln!(writer, "1 'chr1_10_A_T |ref 1R:1").unwrap();
            writer.flush().unwrap();
        }
        let mut decoded = String::new();
        MultiGzDecoder::new(File::open(&path).unwrap())
            .read_to_string(&mut decoded)
            .unwrap();
        assert_eq!(decoded, "1 'chr1_10_A_T |ref 1R:1\n");
    }

    #[test]
    fn missing_fai_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ref.fa");
        std::fs::write(&path, ">chr1\nACGT\n").unwrap();
        let err = open_genome_reader(&path).err().unwrap();
        assert!(err.starts_with("Reference index file not found"));
    }
}
