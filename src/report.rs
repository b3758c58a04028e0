use log::info;
use ndarray::ArrayView2;

use crate::{dataset::Letter, training::TrainReport};

/// Index of the most activated output unit in the first output row.
pub fn predicted_class(output: ArrayView2<f64>) -> Option<usize> {
    if output.nrows() == 0 {
        return None;
    }
    output
        .row(0)
        .iter()
        .enumerate()
        .max_by(|(_, l), (_, r)| l.partial_cmp(r).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| i)
}

/// Writes the human-readable confirmation for one finished run.
pub fn log_run(file: &str, letter: Letter, target: &[f64], report: &TrainReport, final_error: f64) {
    let predicted = match predicted_class(report.output.view()) {
        Some(class) => class.to_string(),
        None => "-".to_string(),
    };
    info!(
        "{file}: letter={letter:?} predicted={predicted} target={target:?} {:?} after {} iteration(s), error={final_error:.3e}",
        report.termination, report.iterations
    );
}
