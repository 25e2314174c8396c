use crate::cli::AnnotateArgs;
use crate::hhga::writers::{Prediction, PredictionWriter};
use crate::utils::Result;
use std::io::{self, BufRead};
use std::path::Path;

pub fn annotate(args: AnnotateArgs) -> Result<()> {
    let predictions = read_predictions(io::stdin().lock())?;
    let contigs = contigs_in_order(&predictions);

    let sample = args.genotypes.then_some(args.sample_name.as_str());
    let mut writer = PredictionWriter::new(
        &contigs,
        sample,
        args.output_path.as_deref().map(Path::new),
    )?;
    for prediction in &predictions {
        writer.write(prediction)?;
    }
    log::info!("Annotated {} predictions", predictions.len());
    Ok(())
}

/// Parses prediction lines, skipping blank and malformed ones and those whose
/// alternates all equal the reference.
fn read_predictions<R: BufRead>(input: R) -> Result<Vec<Prediction>> {
    let mut predictions = Vec::new();
    for (line_number, line) in input.lines().enumerate() {
        let line = line.map_err(|e| format!("Error at input line {}: {}", line_number + 1, e))?;
        if line.trim().is_empty() {
            continue;
        }
        match Prediction::parse(&line) {
            Ok(prediction) if prediction.distinct_alternates().is_empty() => {
                log::debug!("No alternate left at line {}: {}", line_number + 1, line);
            }
            Ok(prediction) => predictions.push(prediction),
            Err(e) => log::warn!("Skipping line {}: {}", line_number + 1, e),
        }
    }
    Ok(predictions)
}

/// Contigs in first-seen order; the VCF header must declare them up front.
fn contigs_in_order(predictions: &[Prediction]) -> Vec<String> {
    let mut contigs: Vec<String> = Vec::new();
    for prediction in predictions {
        if !contigs.contains(&prediction.contig) {
            contigs.push(prediction.contig.clone());
        }
    }
    contigs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_and_reference_only_lines_are_skipped() {
        let input = "1 'chr2_5_A_T\n\nbad line\n3 'chr1_7_G_G\n0.2 'chr1_9_C_A |ref 1R:1\n";
        let predictions = read_predictions(input.as_bytes()).unwrap();
        assert_eq!(predictions.len(), 2);
        assert_eq!(predictions[0].contig, "chr2");
        assert_eq!(predictions[1].position, 9);
        assert_eq!(contigs_in_order(&predictions), vec!["chr2", "chr1"]);
    }

    #[test]
    fn multiclass_lines_carry_genotypes() {
        let input = "2:1 3:1 'chr3_4_G_C,T\n1:2 'chr3_8_A_A,C\n";
        let predictions = read_predictions(input.as_bytes()).unwrap();
        assert_eq!(predictions.len(), 2);
        assert_eq!(predictions[0].genotype(), "1/2");
        assert_eq!(predictions[1].genotype(), "0/0");
    }
}
