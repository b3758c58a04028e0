mod session;

pub use session::{CONVERGENCE_THRESHOLD, Termination, TrainReport, TrainingSession};
